//! clipboard-data-receiver lifecycle.
//!
//! The receiver is a detached helper with no synchronous ready signal: it
//! announces `{pid, address, port}` as a single JSON line on stdout (native
//! path) or writes pid/port files (WSL path, where it is a Windows executable
//! invoked through a shell indirection with `wslpath` translation). Both
//! startup paths wait through the same bounded `await_ready` poll.

use std::fs;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use serde::Deserialize;

use crate::errors::BootstrapError;
use crate::platform::Platform;
use crate::retry::await_ready;
use crate::util::shell_join;

const READY_ATTEMPTS: u32 = 10;
const READY_INTERVAL: Duration = Duration::from_secs(1);

/// A started clipboard relay. The process is killed and the pid/port files
/// removed at session teardown.
#[derive(Debug, Clone)]
pub struct ClipboardRelayHandle {
    pub pid: i32,
    pub port: u16,
    pub config_dir: PathBuf,
}

#[derive(Deserialize)]
struct AnnounceLine {
    pid: i32,
    #[allow(dead_code)]
    address: String,
    port: u16,
}

pub struct ClipboardRelayManager {
    platform: Platform,
    verbose: bool,
}

impl ClipboardRelayManager {
    pub fn new(platform: Platform, verbose: bool) -> Self {
        ClipboardRelayManager { platform, verbose }
    }

    /// Launch the receiver and learn its pid and listening port.
    pub fn start(
        &self,
        binary: &Path,
        config_dir: &Path,
    ) -> Result<ClipboardRelayHandle, BootstrapError> {
        let pid_file = config_dir.join("pid");
        let port_file = config_dir.join("port");
        let (pid, port) = if self.platform.is_wsl {
            self.start_wsl(binary, &pid_file, &port_file)?
        } else {
            self.start_native(binary, &pid_file, &port_file)?
        };
        eprintln!("dcvim: clipboard-data-receiver running (pid {pid}, port {port})");
        Ok(ClipboardRelayHandle {
            pid,
            port,
            config_dir: config_dir.to_path_buf(),
        })
    }

    fn start_native(
        &self,
        binary: &Path,
        pid_file: &Path,
        port_file: &Path,
    ) -> Result<(i32, u16), BootstrapError> {
        let args = [
            "--pid-file".to_string(),
            pid_file.display().to_string(),
            "--port-file".to_string(),
            port_file.display().to_string(),
            "--random-port".to_string(),
        ];
        if self.verbose {
            let mut preview = vec![binary.display().to_string()];
            preview.extend(args.iter().cloned());
            eprintln!("dcvim: clipboard: {}", shell_join(&preview));
        }
        let mut child = Command::new(binary)
            .args(&args)
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .stdin(Stdio::null())
            .spawn()
            .map_err(BootstrapError::Io)?;

        // The announce line arrives asynchronously; shovel it through a
        // channel so the bounded wait below stays uniform with the WSL path.
        let stdout = child.stdout.take().ok_or_else(|| {
            BootstrapError::Message("clipboard-data-receiver stdout unavailable".to_string())
        })?;
        let (tx, rx) = mpsc::channel::<String>();
        thread::Builder::new()
            .name("cdr-announce".to_string())
            .spawn(move || {
                let mut reader = BufReader::new(stdout);
                let mut line = String::new();
                if reader.read_line(&mut line).is_ok() {
                    let _ = tx.send(line);
                }
            })
            .map_err(BootstrapError::Io)?;

        let announce = await_ready(
            || match rx.try_recv() {
                Ok(line) => serde_json::from_str::<AnnounceLine>(line.trim()).ok(),
                Err(_) => None,
            },
            READY_ATTEMPTS,
            READY_INTERVAL,
        )
        .map_err(|_| {
            // Do not leave a half-started receiver behind on timeout.
            let _ = child.kill();
            let _ = child.wait();
            BootstrapError::ClipboardRelayTimeout(format!(
                "no announce line after {READY_ATTEMPTS} attempts"
            ))
        })?;
        Ok((announce.pid, announce.port))
    }

    fn start_wsl(
        &self,
        binary: &Path,
        pid_file: &Path,
        port_file: &Path,
    ) -> Result<(i32, u16), BootstrapError> {
        // The Windows executable cannot take Linux paths; translate through
        // wslpath at invocation time.
        let command = format!(
            "{} --random-port --pid-file $(wslpath -w {}) --port-file $(wslpath -w {})",
            binary.display(),
            pid_file.display(),
            port_file.display()
        );
        if self.verbose {
            eprintln!("dcvim: clipboard: sh -c {}", shell_join(&[command.clone()]));
        }
        Command::new("sh")
            .arg("-c")
            .arg(&command)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .stdin(Stdio::null())
            .spawn()
            .map_err(BootstrapError::Io)?;

        let read_port_pair = || {
            let pid = fs::read_to_string(pid_file)
                .ok()
                .and_then(|s| s.trim().parse::<i32>().ok())?;
            let port = fs::read_to_string(port_file)
                .ok()
                .and_then(|s| s.trim().parse::<u16>().ok())?;
            Some((pid, port))
        };
        await_ready(read_port_pair, READY_ATTEMPTS, READY_INTERVAL).map_err(|_| {
            BootstrapError::ClipboardRelayTimeout(format!(
                "pid/port files not written after {READY_ATTEMPTS} attempts"
            ))
        })
    }

    /// Terminate the receiver and remove its pid/port files. Tolerant of the
    /// process already being gone; never escalates.
    pub fn stop(&self, handle: &ClipboardRelayHandle) {
        if self.platform.is_wsl {
            let command = format!("Stop-Process -Id {} -Force", handle.pid);
            eprintln!("dcvim: stop clipboard-data-receiver: {command}");
            let _ = Command::new("powershell.exe")
                .arg("-Command")
                .arg(&command)
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status();
        } else {
            #[cfg(unix)]
            {
                use nix::sys::signal::{kill, Signal};
                use nix::unistd::Pid;
                match kill(Pid::from_raw(handle.pid), Signal::SIGTERM) {
                    Ok(()) => eprintln!(
                        "dcvim: stopped clipboard-data-receiver (pid {})",
                        handle.pid
                    ),
                    Err(e) => eprintln!(
                        "dcvim: clipboard-data-receiver (pid {}) already gone: {e}",
                        handle.pid
                    ),
                }
            }
        }
        for name in ["pid", "port"] {
            let _ = fs::remove_file(handle.config_dir.join(name));
        }
    }
}
