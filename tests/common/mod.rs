use std::fs;
use std::path::{Path, PathBuf};

/// Write an executable stub script used in place of a real external binary.
#[allow(dead_code)]
pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, body).expect("write stub script");
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).expect("chmod stub script");
    }
    path
}

/// Read the invocation log a stub script appended to, or empty if it never
/// ran.
#[allow(dead_code)]
pub fn read_log(path: &Path) -> String {
    fs::read_to_string(path).unwrap_or_default()
}
