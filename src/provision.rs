//! Tool provisioning: ensure a named helper binary exists in the local cache,
//! downloading it once and reusing it thereafter.
//!
//! Download URLs live in an explicit catalog keyed by (tool, host OS, arch)
//! rather than per-tool globals, so callers pass the lookup result around as
//! plain data. Release tags are pinned; bumping a tool is a one-line edit.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::errors::BootstrapError;
use crate::platform::Platform;

const PORT_FORWARDER_TAG: &str = "v0.0.3";
const CDR_TAG: &str = "v1.3.1";
const VIM_APPIMAGE_TAG: &str = "v9.1.0754";
const VIM_STATIC_TAG: &str = "v9.1.0754";
const NVIM_TAG: &str = "v0.10.2";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolKind {
    /// Runs inside the container; relays an ephemeral local port to a target.
    PortForwarder,
    /// Runs on the host; bridges container clipboard writes to the host.
    ClipboardReceiver,
    Vim,
    Nvim,
}

impl ToolKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolKind::PortForwarder => "port-forwarder",
            ToolKind::ClipboardReceiver => "clipboard-data-receiver",
            ToolKind::Vim => "vim",
            ToolKind::Nvim => "nvim",
        }
    }
}

/// A resolved tool: cache file name plus the URL that provides it.
#[derive(Debug, Clone)]
pub struct Tool {
    pub file_name: String,
    pub download_url: String,
}

struct CatalogEntry {
    kind: ToolKind,
    /// "*" matches any host OS; "wsl" matches a WSL host specifically.
    os: &'static str,
    /// "*" matches any (including unspecified) container arch.
    arch: &'static str,
    file_name: &'static str,
    url: String,
}

/// Download catalog for all external helper binaries.
pub struct ToolCatalog {
    entries: Vec<CatalogEntry>,
}

impl Default for ToolCatalog {
    fn default() -> Self {
        let gh = "https://github.com";
        let entries = vec![
            CatalogEntry {
                kind: ToolKind::PortForwarder,
                os: "*",
                arch: "amd64",
                file_name: "port-forwarder-amd64",
                url: format!(
                    "{gh}/mikoto2000/port-forwarder/releases/download/{PORT_FORWARDER_TAG}/port-forwarder-linux-amd64"
                ),
            },
            CatalogEntry {
                kind: ToolKind::PortForwarder,
                os: "*",
                arch: "aarch64",
                file_name: "port-forwarder-aarch64",
                url: format!(
                    "{gh}/mikoto2000/port-forwarder/releases/download/{PORT_FORWARDER_TAG}/port-forwarder-linux-arm64"
                ),
            },
            // The clipboard receiver runs on the host: a Windows executable
            // under WSL, the linux build elsewhere.
            CatalogEntry {
                kind: ToolKind::ClipboardReceiver,
                os: "wsl",
                arch: "*",
                file_name: "clipboard-data-receiver.exe",
                url: format!(
                    "{gh}/mikoto2000/clipboard-data-receiver/releases/download/{CDR_TAG}/clipboard-data-receiver.windows-amd64.exe"
                ),
            },
            CatalogEntry {
                kind: ToolKind::ClipboardReceiver,
                os: "*",
                arch: "*",
                file_name: "clipboard-data-receiver",
                url: format!(
                    "{gh}/mikoto2000/clipboard-data-receiver/releases/download/{CDR_TAG}/clipboard-data-receiver.linux-amd64"
                ),
            },
            CatalogEntry {
                kind: ToolKind::Vim,
                os: "*",
                arch: "amd64",
                file_name: "vim-amd64",
                url: format!(
                    "{gh}/vim/vim-appimage/releases/download/{VIM_APPIMAGE_TAG}/Vim-{VIM_APPIMAGE_TAG}.glibc2.29-x86_64.AppImage"
                ),
            },
            CatalogEntry {
                kind: ToolKind::Vim,
                os: "*",
                arch: "aarch64",
                file_name: "vim-aarch64",
                url: format!(
                    "{gh}/mikoto2000/vim-static/releases/download/{VIM_STATIC_TAG}/vim-{VIM_STATIC_TAG}-aarch64"
                ),
            },
            // No static nvim build exists for aarch64; EditorSelector falls
            // back to vim before this catalog is consulted.
            CatalogEntry {
                kind: ToolKind::Nvim,
                os: "*",
                arch: "amd64",
                file_name: "nvim-amd64",
                url: format!(
                    "{gh}/neovim/neovim/releases/download/{NVIM_TAG}/nvim-linux-x86_64.appimage"
                ),
            },
        ];
        ToolCatalog { entries }
    }
}

impl ToolCatalog {
    /// Look up the download for (kind, host platform, container arch).
    pub fn resolve(
        &self,
        kind: ToolKind,
        platform: &Platform,
        arch: &str,
    ) -> Result<Tool, BootstrapError> {
        let os_key = if platform.is_wsl { "wsl" } else { platform.host_os };
        for e in &self.entries {
            if e.kind != kind {
                continue;
            }
            if e.os != "*" && e.os != os_key {
                continue;
            }
            if e.arch != "*" && e.arch != arch {
                continue;
            }
            return Ok(Tool {
                file_name: e.file_name.to_string(),
                download_url: e.url.clone(),
            });
        }
        Err(BootstrapError::ToolProvisionFailed(format!(
            "no {} build for {}/{}",
            kind.as_str(),
            os_key,
            if arch.is_empty() { "(any)" } else { arch }
        )))
    }
}

impl Tool {
    /// Ensure the tool exists under `install_dir` and return its path.
    ///
    /// An existing file with `overwrite=false` is returned without any
    /// network access. Downloads are staged into a temp file in the same
    /// directory and only then moved onto the canonical path, so a partial
    /// write never leaves a truncated or non-executable file there.
    pub fn ensure(&self, install_dir: &Path, overwrite: bool) -> Result<PathBuf, BootstrapError> {
        let path = install_dir.join(&self.file_name);
        if path.exists() && !overwrite {
            eprintln!("dcvim: {} already present, reusing", path.display());
            return Ok(path);
        }
        fs::create_dir_all(install_dir).map_err(BootstrapError::Io)?;

        eprintln!(
            "dcvim: downloading {} from {} ...",
            self.file_name, self.download_url
        );
        let resp = reqwest::blocking::get(&self.download_url)
            .and_then(|r| r.error_for_status())
            .map_err(|e| {
                BootstrapError::ToolProvisionFailed(format!("fetch {}: {e}", self.file_name))
            })?;
        let bytes = resp.bytes().map_err(|e| {
            BootstrapError::ToolProvisionFailed(format!("read {}: {e}", self.file_name))
        })?;

        let mut staged =
            tempfile::NamedTempFile::new_in(install_dir).map_err(BootstrapError::Io)?;
        staged.write_all(&bytes).map_err(BootstrapError::Io)?;
        staged.flush().map_err(BootstrapError::Io)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(staged.path(), fs::Permissions::from_mode(0o755))
                .map_err(BootstrapError::Io)?;
        }
        staged.persist(&path).map_err(|e| {
            BootstrapError::ToolProvisionFailed(format!("place {}: {}", path.display(), e.error))
        })?;
        eprintln!("dcvim: installed {}", path.display());
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linux() -> Platform {
        Platform {
            is_wsl: false,
            host_os: "linux",
            host_arch: "x86_64",
        }
    }

    #[test]
    fn test_resolve_port_forwarder_per_arch() {
        let cat = ToolCatalog::default();
        let amd = cat
            .resolve(ToolKind::PortForwarder, &linux(), "amd64")
            .unwrap();
        assert_eq!(amd.file_name, "port-forwarder-amd64");
        assert!(amd.download_url.contains("linux-amd64"));
        let arm = cat
            .resolve(ToolKind::PortForwarder, &linux(), "aarch64")
            .unwrap();
        assert_eq!(arm.file_name, "port-forwarder-aarch64");
        assert!(arm.download_url.contains("linux-arm64"));
    }

    #[test]
    fn test_resolve_unknown_arch_fails() {
        let cat = ToolCatalog::default();
        assert!(cat
            .resolve(ToolKind::PortForwarder, &linux(), "riscv64")
            .is_err());
    }

    #[test]
    fn test_clipboard_receiver_wsl_gets_exe() {
        let cat = ToolCatalog::default();
        let wsl = Platform {
            is_wsl: true,
            host_os: "linux",
            host_arch: "x86_64",
        };
        let t = cat.resolve(ToolKind::ClipboardReceiver, &wsl, "").unwrap();
        assert_eq!(t.file_name, "clipboard-data-receiver.exe");
        let t = cat
            .resolve(ToolKind::ClipboardReceiver, &linux(), "")
            .unwrap();
        assert_eq!(t.file_name, "clipboard-data-receiver");
    }

    #[test]
    fn test_no_nvim_for_arm() {
        let cat = ToolCatalog::default();
        assert!(cat.resolve(ToolKind::Nvim, &linux(), "aarch64").is_err());
    }
}
