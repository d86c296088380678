//! Host platform capabilities, captured once and passed as data.
//!
//! The WSL/Darwin/Linux branching lives in the consumers (editor fallback,
//! clipboard relay startup); this struct only reports facts.

use std::env;

#[derive(Debug, Clone)]
pub struct Platform {
    /// Running inside a WSL distribution (the clipboard relay then runs as a
    /// Windows executable through a shell indirection).
    pub is_wsl: bool,
    /// `std::env::consts::OS` ("linux", "macos", "windows", ...).
    pub host_os: &'static str,
    /// `std::env::consts::ARCH` ("x86_64", "aarch64", ...).
    pub host_arch: &'static str,
}

impl Platform {
    pub fn detect() -> Self {
        Platform {
            is_wsl: env::var_os("WSL_DISTRO_NAME").is_some(),
            host_os: env::consts::OS,
            host_arch: env::consts::ARCH,
        }
    }

    /// Apple silicon host running an amd64 container through emulation is the
    /// pair where the nvim AppImage is known not to execute.
    pub fn is_darwin_amd64(&self) -> bool {
        self.host_os == "macos" && self.host_arch == "x86_64"
    }
}
