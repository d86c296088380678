//! Container engine CLI wrapper.
//!
//! The engine (`docker` or `podman`) is an external collaborator invoked as a
//! subprocess; stdout/stderr are captured and a non-zero exit is an error.
//! `DCVIM_CONTAINER_RUNTIME` overrides the resolved binary, which is also how
//! the integration tests substitute a recording stub.

use std::env;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};

use which::which;

use crate::errors::BootstrapError;
use crate::util::shell_join;

pub fn container_runtime_path() -> io::Result<PathBuf> {
    if let Some(p) = env::var_os("DCVIM_CONTAINER_RUNTIME").filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(p));
    }
    if let Ok(p) = which("docker") {
        return Ok(p);
    }
    if let Ok(p) = which("podman") {
        return Ok(p);
    }
    Err(io::Error::new(
        io::ErrorKind::NotFound,
        "a container engine (docker or podman) is required but was not found in PATH",
    ))
}

pub struct Engine {
    runtime: PathBuf,
    verbose: bool,
}

impl Engine {
    pub fn new(verbose: bool) -> io::Result<Self> {
        Ok(Engine {
            runtime: container_runtime_path()?,
            verbose,
        })
    }

    pub fn runtime(&self) -> &Path {
        &self.runtime
    }

    fn run_captured(&self, args: &[&str]) -> Result<String, BootstrapError> {
        if self.verbose {
            let mut preview = vec!["docker".to_string()];
            preview.extend(args.iter().map(|a| a.to_string()));
            eprintln!("dcvim: engine: {}", shell_join(&preview));
        }
        let out = Command::new(&self.runtime)
            .args(args)
            .output()
            .map_err(BootstrapError::Io)?;
        if !out.status.success() {
            let stderr = String::from_utf8_lossy(&out.stderr).trim().to_string();
            return Err(BootstrapError::Message(format!(
                "engine {} failed ({}): {}",
                args.first().copied().unwrap_or("?"),
                out.status,
                stderr
            )));
        }
        Ok(String::from_utf8_lossy(&out.stdout).to_string())
    }

    /// `docker exec <id> <cmd...>`, captured stdout.
    pub fn exec(&self, container: &str, cmd: &[&str]) -> Result<String, BootstrapError> {
        let mut args = vec!["exec", container];
        args.extend_from_slice(cmd);
        self.run_captured(&args)
    }

    /// `docker exec --user root <id> <cmd...>`, for privileged in-container
    /// steps like chmod after a file transfer.
    pub fn exec_as_root(&self, container: &str, cmd: &[&str]) -> Result<String, BootstrapError> {
        let mut args = vec!["exec", "--user", "root", container];
        args.extend_from_slice(cmd);
        self.run_captured(&args)
    }

    /// `docker exec` with piped stdout, for long-running in-container
    /// processes whose announce line we read asynchronously.
    pub fn spawn_exec(&self, container: &str, cmd: &[&str]) -> io::Result<Child> {
        if self.verbose {
            let mut preview = vec!["docker".to_string(), "exec".to_string(), container.to_string()];
            preview.extend(cmd.iter().map(|a| a.to_string()));
            eprintln!("dcvim: engine: {}", shell_join(&preview));
        }
        Command::new(&self.runtime)
            .arg("exec")
            .arg(container)
            .args(cmd)
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
    }

    /// `docker cp <src> <id>:<dest>`. `label` names the payload in logs.
    pub fn copy_in(
        &self,
        label: &str,
        src: &Path,
        container: &str,
        dest: &str,
    ) -> Result<(), BootstrapError> {
        eprintln!("dcvim: transfer {label} -> {container}:{dest}");
        let src_s = src.display().to_string();
        let dest_s = format!("{container}:{dest}");
        self.run_captured(&["cp", &src_s, &dest_s]).map(|_| ())
    }

    pub fn stop(&self, container: &str) -> Result<(), BootstrapError> {
        self.run_captured(&["stop", container]).map(|_| ())
    }

    pub fn remove(&self, container: &str) -> Result<(), BootstrapError> {
        self.run_captured(&["rm", "-f", container]).map(|_| ())
    }

    /// `docker exec -it <id> sh -c <command>` with inherited stdio, for the
    /// interactive attach. TTY allocation follows whether we have one.
    pub fn exec_interactive(
        &self,
        container: &str,
        workdir: &str,
        command: &str,
    ) -> io::Result<std::process::ExitStatus> {
        let tty_flag = if atty::is(atty::Stream::Stdin) || atty::is(atty::Stream::Stdout) {
            "-it"
        } else {
            "-i"
        };
        if self.verbose {
            let preview = vec![
                "docker".to_string(),
                "exec".to_string(),
                tty_flag.to_string(),
                "-w".to_string(),
                workdir.to_string(),
                container.to_string(),
                "sh".to_string(),
                "-c".to_string(),
                command.to_string(),
            ];
            eprintln!("dcvim: engine: {}", shell_join(&preview));
        }
        Command::new(&self.runtime)
            .arg("exec")
            .arg(tty_flag)
            .arg("-w")
            .arg(workdir)
            .arg(container)
            .arg("sh")
            .arg("-c")
            .arg(command)
            .status()
    }

    /// Container ids carrying the devcontainer CLI's workspace label for the
    /// given host folder. Used by `stop`/`down` to find the session target.
    pub fn ps_by_workspace(&self, workspace: &str, all: bool) -> Result<Vec<String>, BootstrapError> {
        let filter = format!("label=devcontainer.local_folder={workspace}");
        let mut args = vec!["ps", "-q"];
        if all {
            args.push("-a");
        }
        args.push("--filter");
        args.push(&filter);
        let out = self.run_captured(&args)?;
        Ok(out
            .lines()
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
            .collect())
    }
}
