//! Editor selection and installation.
//!
//! Prefer an editor already on the container's PATH; otherwise transfer a
//! statically-built one. Two unconditional fallbacks apply before a
//! transfer, in order: ARM containers always get vim (no static nvim build
//! for aarch64), and a Darwin/amd64 host pair always gets vim (the nvim
//! AppImage does not execute under that emulation).

use std::path::{Path, PathBuf};

use crate::engine::Engine;
use crate::errors::BootstrapError;
use crate::platform::Platform;
use crate::provision::{ToolCatalog, ToolKind};
use crate::util::write_file;

/// The editor resolved for one bootstrap. Read-only once produced.
#[derive(Debug, Clone)]
pub struct EditorDescriptor {
    /// "vim" or "nvim"; also the in-container path (`/<binary_name>`) for a
    /// transferred editor.
    pub binary_name: String,
    /// Host-side cache path of the transferred binary; `None` when the
    /// container's own installation is used.
    pub source_path: Option<PathBuf>,
    pub system_installed: bool,
}

/// Fallback rules as a pure function: which editor is actually transferred
/// when the requested one is not installed in the container.
pub fn resolve_editor_choice(
    want_nvim: bool,
    container_arch: &str,
    platform: &Platform,
) -> &'static str {
    if !want_nvim {
        return "vim";
    }
    if container_arch == "aarch64" {
        return "vim";
    }
    if platform.is_darwin_amd64() {
        return "vim";
    }
    "nvim"
}

/// Probe the container, pick the editor, and transfer it if needed.
pub fn setup_editor(
    engine: &Engine,
    container: &str,
    want_nvim: bool,
    container_arch: &str,
    platform: &Platform,
    catalog: &ToolCatalog,
    install_dir: &Path,
) -> Result<EditorDescriptor, BootstrapError> {
    let requested = if want_nvim { "nvim" } else { "vim" };
    eprint!("dcvim: check system installed {requested} ... ");
    let found = engine
        .exec(container, &["which", requested])
        .map(|out| !out.trim().is_empty())
        .unwrap_or(false);
    if found {
        eprintln!("found");
        return Ok(EditorDescriptor {
            binary_name: requested.to_string(),
            source_path: None,
            system_installed: true,
        });
    }
    eprintln!("not found");

    let name = resolve_editor_choice(want_nvim, container_arch, platform);
    if name != requested {
        eprintln!("dcvim: falling back to {name} for this container");
    }
    let kind = if name == "nvim" {
        ToolKind::Nvim
    } else {
        ToolKind::Vim
    };
    let tool = catalog.resolve(kind, platform, container_arch)?;
    let source = tool.ensure(install_dir, false)?;

    let dest = format!("/{name}");
    engine.copy_in(name, &source, container, &dest)?;
    // docker cp does not reliably preserve the execute bit; set it explicitly
    // as root.
    engine
        .exec_as_root(container, &["sh", "-c", &format!("chmod +x {dest}")])
        .map_err(|e| BootstrapError::ChmodFailed(e.to_string()))?;

    Ok(EditorDescriptor {
        binary_name: name.to_string(),
        source_path: Some(source),
        system_installed: false,
    })
}

const SEND_TO_TCP_VIM: &str = r#"function! SendToCdr(message) abort
  let l:channelToCdr = ch_open("host.docker.internal:__PORT__", {"mode": "raw"})
  call ch_sendraw(channelToCdr, a:message, {})
  call ch_close(l:channelToCdr)
endfunction
"#;

const SEND_TO_TCP_NVIM: &str = r#"function! SendToCdr(message) abort
  let l:channelToCdr = sockconnect("tcp", "host.docker.internal:__PORT__")
  call chansend(l:channelToCdr, a:message)
  call chanclose(l:channelToCdr)
endfunction
"#;

/// Write the clipboard hook script for the given relay port and return its
/// path.
pub fn create_send_to_tcp(
    config_dir: &Path,
    port: u16,
    is_nvim: bool,
) -> std::io::Result<PathBuf> {
    let template = if is_nvim {
        SEND_TO_TCP_NVIM
    } else {
        SEND_TO_TCP_VIM
    };
    let content = template.replace("__PORT__", &port.to_string());
    let path = config_dir.join("SendToTcp.vim");
    write_file(&path, &content)?;
    Ok(path)
}

/// Which support files were placed at the container root before attach.
#[derive(Debug, Clone, Default)]
pub struct SupportFiles {
    pub send_to_tcp: bool,
    pub vimrc: bool,
}

/// Transfer the clipboard hook (when a relay port is known) and the user's
/// vimrc (when one exists) to the container root.
pub fn transfer_support_files(
    engine: &Engine,
    container: &str,
    config_dir: &Path,
    clipboard_port: Option<u16>,
    is_nvim: bool,
    vimrc: Option<&Path>,
) -> Result<SupportFiles, BootstrapError> {
    let mut files = SupportFiles::default();
    if let Some(port) = clipboard_port {
        let script = create_send_to_tcp(config_dir, port, is_nvim).map_err(BootstrapError::Io)?;
        engine.copy_in("SendToTcp.vim", &script, container, "/SendToTcp.vim")?;
        files.send_to_tcp = true;
    }
    if let Some(rc) = vimrc {
        if rc.exists() {
            engine.copy_in("vimrc", rc, container, "/vimrc")?;
            files.vimrc = true;
        }
    }
    Ok(files)
}

/// In-container shell command that launches the editor. Transferred amd64
/// builds are AppImages and need the extract-and-run dance (no FUSE inside
/// containers); the aarch64 build is a plain static binary.
pub fn launch_command(
    desc: &EditorDescriptor,
    container_arch: &str,
    files: &SupportFiles,
) -> String {
    let mut trailing = String::from(" --cmd \"let g:devcontainer_vim = v:true\"");
    if files.send_to_tcp {
        trailing.push_str(" -S /SendToTcp.vim");
    }
    if files.vimrc {
        trailing.push_str(" -S /vimrc");
    }

    if desc.system_installed {
        return format!("{}{}", desc.binary_name, trailing);
    }
    if container_arch == "amd64" {
        format!(
            "cd ~; /{} --appimage-extract > /dev/null 2>&1; cd - > /dev/null; ~/squashfs-root/AppRun{}",
            desc.binary_name, trailing
        )
    } else {
        format!("/{}{}", desc.binary_name, trailing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn platform(os: &'static str, arch: &'static str) -> Platform {
        Platform {
            is_wsl: false,
            host_os: os,
            host_arch: arch,
        }
    }

    #[test]
    fn test_arm_container_never_gets_nvim() {
        for p in [
            platform("linux", "x86_64"),
            platform("macos", "aarch64"),
            platform("macos", "x86_64"),
        ] {
            assert_eq!(resolve_editor_choice(true, "aarch64", &p), "vim");
        }
    }

    #[test]
    fn test_darwin_amd64_host_forces_vim() {
        assert_eq!(
            resolve_editor_choice(true, "amd64", &platform("macos", "x86_64")),
            "vim"
        );
    }

    #[test]
    fn test_nvim_allowed_otherwise() {
        assert_eq!(
            resolve_editor_choice(true, "amd64", &platform("linux", "x86_64")),
            "nvim"
        );
        assert_eq!(
            resolve_editor_choice(true, "amd64", &platform("macos", "aarch64")),
            "nvim"
        );
    }

    #[test]
    fn test_vim_request_is_never_overridden() {
        assert_eq!(
            resolve_editor_choice(false, "amd64", &platform("linux", "x86_64")),
            "vim"
        );
    }

    #[test]
    fn test_send_to_tcp_templates() {
        let dir = tempfile::tempdir().unwrap();
        let p = create_send_to_tcp(dir.path(), 9999, false).unwrap();
        let s = std::fs::read_to_string(&p).unwrap();
        assert!(s.contains("host.docker.internal:9999"));
        assert!(s.contains("ch_open"));

        let p = create_send_to_tcp(dir.path(), 4242, true).unwrap();
        let s = std::fs::read_to_string(&p).unwrap();
        assert!(s.contains("host.docker.internal:4242"));
        assert!(s.contains("sockconnect"));
    }

    #[test]
    fn test_launch_command_variants() {
        let system = EditorDescriptor {
            binary_name: "vim".to_string(),
            source_path: None,
            system_installed: true,
        };
        let files = SupportFiles {
            send_to_tcp: true,
            vimrc: true,
        };
        let cmd = launch_command(&system, "amd64", &files);
        assert!(cmd.starts_with("vim "));
        assert!(cmd.contains("-S /SendToTcp.vim"));
        assert!(cmd.contains("-S /vimrc"));

        let transferred = EditorDescriptor {
            binary_name: "nvim".to_string(),
            source_path: Some(PathBuf::from("/tmp/nvim-amd64")),
            system_installed: false,
        };
        let cmd = launch_command(&transferred, "amd64", &SupportFiles::default());
        assert!(cmd.contains("--appimage-extract"));
        assert!(cmd.contains("squashfs-root/AppRun"));
        assert!(!cmd.contains("-S /vimrc"));

        let cmd = launch_command(
            &EditorDescriptor {
                binary_name: "vim".to_string(),
                source_path: Some(PathBuf::from("/tmp/vim-aarch64")),
                system_installed: false,
            },
            "aarch64",
            &SupportFiles::default(),
        );
        assert!(cmd.starts_with("/vim "));
        assert!(!cmd.contains("appimage"));
    }
}
