//! Container architecture normalization.

use crate::errors::BootstrapError;

/// Map a raw `uname -m` string to the tag used in tool file names and
/// download URLs. Empty input means "not tied to a container arch" (host-side
/// tools) and maps to the empty tag.
pub fn normalize_container_arch(raw: &str) -> Result<&'static str, BootstrapError> {
    match raw {
        "amd64" | "x86_64" => Ok("amd64"),
        "arm64" | "aarch64" => Ok("aarch64"),
        "" => Ok(""),
        other => Err(BootstrapError::UnknownArchitecture(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_arches() {
        assert_eq!(normalize_container_arch("x86_64").unwrap(), "amd64");
        assert_eq!(normalize_container_arch("amd64").unwrap(), "amd64");
        assert_eq!(normalize_container_arch("aarch64").unwrap(), "aarch64");
        assert_eq!(normalize_container_arch("arm64").unwrap(), "aarch64");
    }

    #[test]
    fn test_empty_is_unspecified() {
        assert_eq!(normalize_container_arch("").unwrap(), "");
    }

    #[test]
    fn test_unknown_is_error() {
        for raw in ["riscv64", "i686", "mips", "s390x"] {
            match normalize_container_arch(raw) {
                Err(BootstrapError::UnknownArchitecture(s)) => assert_eq!(s, raw),
                other => panic!("expected UnknownArchitecture, got {other:?}"),
            }
        }
    }
}
