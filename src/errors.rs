//! Error taxonomy for the bootstrap pipeline.
//!
//! Every step-level function returns `Result<T, BootstrapError>`; only
//! `main` converts an unrecovered error into a user-visible message and a
//! non-zero exit code. Advisory failures (cleanup, stop of an already-gone
//! process) are logged where they happen and never escalate.

use std::fmt;
use std::io;

#[derive(Debug)]
pub enum BootstrapError {
    /// `devcontainer up` failed or produced unparseable output.
    ContainerStartFailed(String),
    /// `uname -m` reported something we have no tool builds for.
    UnknownArchitecture(String),
    /// Download or placement of an external tool binary failed.
    ToolProvisionFailed(String),
    /// `chmod +x` of a transferred binary failed inside the container.
    ChmodFailed(String),
    /// clipboard-data-receiver never announced its pid/port.
    ClipboardRelayTimeout(String),
    /// The in-container forward marker directory could not be read.
    ForwarderConfigNotFound(String),
    /// The in-container forwarder did not start or never announced a port.
    ForwarderLaunchFailed(String),
    /// The interactive attach command exited with an error.
    InteractiveAttachFailed(String),
    Io(io::Error),
    Message(String),
}

impl fmt::Display for BootstrapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BootstrapError::ContainerStartFailed(s) => write!(f, "container start failed: {s}"),
            BootstrapError::UnknownArchitecture(s) => write!(f, "unknown architecture: {s}"),
            BootstrapError::ToolProvisionFailed(s) => write!(f, "tool provisioning failed: {s}"),
            BootstrapError::ChmodFailed(s) => write!(f, "chmod failed: {s}"),
            BootstrapError::ClipboardRelayTimeout(s) => {
                write!(f, "clipboard-data-receiver did not become ready: {s}")
            }
            BootstrapError::ForwarderConfigNotFound(s) => {
                write!(f, "port-forwarder configuration not found: {s}")
            }
            BootstrapError::ForwarderLaunchFailed(s) => {
                write!(f, "port-forwarder launch failed: {s}")
            }
            BootstrapError::InteractiveAttachFailed(s) => {
                write!(f, "interactive attach failed: {s}")
            }
            BootstrapError::Io(e) => write!(f, "{e}"),
            BootstrapError::Message(s) => write!(f, "{s}"),
        }
    }
}

impl std::error::Error for BootstrapError {}

impl From<io::Error> for BootstrapError {
    fn from(e: io::Error) -> Self {
        BootstrapError::Io(e)
    }
}

/// Map an io::Error to a process exit code:
/// - 127 for NotFound (command not found)
/// - 1 for all other errors
pub fn exit_code_for_io_error(e: &io::Error) -> u8 {
    if e.kind() == io::ErrorKind::NotFound {
        127
    } else {
        1
    }
}

/// Convert BootstrapError to exit code (parity with io::Error mapping).
pub fn exit_code_for_bootstrap_error(e: &BootstrapError) -> u8 {
    match e {
        BootstrapError::Io(ioe) => exit_code_for_io_error(ioe),
        _ => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_not_found_maps_to_127() {
        let e = BootstrapError::Io(io::Error::new(io::ErrorKind::NotFound, "docker"));
        assert_eq!(exit_code_for_bootstrap_error(&e), 127);
    }

    #[test]
    fn test_step_errors_map_to_1() {
        let e = BootstrapError::ChmodFailed("denied".to_string());
        assert_eq!(exit_code_for_bootstrap_error(&e), 1);
        let e = BootstrapError::ClipboardRelayTimeout("10 attempts".to_string());
        assert_eq!(exit_code_for_bootstrap_error(&e), 1);
    }

    #[test]
    fn test_display_carries_cause() {
        let e = BootstrapError::ForwarderConfigNotFound("ls failed".to_string());
        assert!(e.to_string().contains("ls failed"));
    }
}
