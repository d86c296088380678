//! Small utilities: shell escaping for command previews and the cache/config
//! directory layout.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub fn shell_join(args: &[String]) -> String {
    args.iter()
        .map(|a| shell_escape(a))
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn shell_escape(s: &str) -> String {
    if s.is_empty() {
        "''".to_string()
    } else if s
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || "-_=./:@".contains(c))
    {
        s.to_string()
    } else {
        let escaped = s.replace('\'', "'\"'\"'");
        format!("'{}'", escaped)
    }
}

/// Stable 64-bit FNV-1a, hex encoded. Used to key per-workspace config
/// directories by absolute path.
pub fn fnv64_hex(input: &str) -> String {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;
    let mut h = OFFSET;
    for b in input.as_bytes() {
        h ^= u64::from(*b);
        h = h.wrapping_mul(PRIME);
    }
    format!("{h:016x}")
}

fn base_dir(xdg_var: &str, fallback: &[&str]) -> io::Result<PathBuf> {
    if let Some(dir) = std::env::var_os(xdg_var).filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(dir));
    }
    let home = home::home_dir().ok_or_else(|| {
        io::Error::new(io::ErrorKind::NotFound, "could not resolve home directory")
    })?;
    let mut p = home;
    for part in fallback {
        p.push(part);
    }
    Ok(p)
}

/// `~/.cache/dcvim/bin`, created on first use. Downloaded tool binaries land
/// here, qualified by architecture.
pub fn cache_bin_dir() -> io::Result<PathBuf> {
    let dir = base_dir("XDG_CACHE_HOME", &[".cache"])?.join("dcvim").join("bin");
    fs::create_dir_all(&dir)?;
    Ok(dir)
}

/// `~/.config/dcvim`, created on first use.
pub fn config_dir() -> io::Result<PathBuf> {
    let dir = base_dir("XDG_CONFIG_HOME", &[".config"])?.join("dcvim");
    fs::create_dir_all(&dir)?;
    Ok(dir)
}

/// Per-workspace config directory, keyed by the hashed absolute workspace
/// path. Holds the clipboard relay pid/port files and generated editor
/// support files for one workspace.
pub fn workspace_config_dir(workspace: &str) -> io::Result<PathBuf> {
    let abs = fs::canonicalize(workspace).unwrap_or_else(|_| PathBuf::from(workspace));
    let key = fnv64_hex(&abs.display().to_string());
    let dir = config_dir()?.join(key);
    fs::create_dir_all(&dir)?;
    Ok(dir)
}

/// Write `content` to `path`, replacing any previous file.
pub fn write_file(path: &Path, content: &str) -> io::Result<()> {
    fs::write(path, content)
}
