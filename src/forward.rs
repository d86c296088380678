//! Port forwarding: the in-container marker registry and the host-side
//! relays.
//!
//! Markers are zero-length files under `~/.config/dcvim/pf` inside the
//! container, one per forwarded spec, with all information in the filename:
//! `<hostLabel>:<hostPort>_<containerIP>:<internalPort>`. Presence of a
//! marker proves an in-container forwarder is already serving that spec, so a
//! re-attaching session only restarts the host-side relays. The launch phase
//! itself is serialized by an exclusively-created lock directory rather than
//! a process-table scan, so two racing sessions cannot both start forwarders.

use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::{Shutdown, TcpListener, TcpStream};
use std::process::Child;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use wait_timeout::ChildExt;

use crate::descriptor::ForwardSpec;
use crate::engine::Engine;
use crate::errors::BootstrapError;
use crate::retry::await_ready;
use crate::util::shell_escape;

const MARKER_DIR: &str = "~/.config/dcvim/pf";
const LAUNCH_LOCK: &str = "~/.config/dcvim/pf.lock";

const ANNOUNCE_ATTEMPTS: u32 = 20;
const ANNOUNCE_INTERVAL: Duration = Duration::from_millis(500);

/// One resolved forwarding destination: a spec plus the in-container
/// `ip:port` its forwarder listens on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardTarget {
    pub spec: ForwardSpec,
    pub container_addr: String,
}

pub fn encode_marker(spec: &ForwardSpec, container_ip: &str, internal_port: &str) -> String {
    format!(
        "{}:{}_{}:{}",
        spec.host, spec.port, container_ip, internal_port
    )
}

pub fn parse_marker(name: &str) -> Option<ForwardTarget> {
    let (src, dest) = name.split_once('_')?;
    let (host, port) = src.split_once(':')?;
    // dest must itself be ip:port
    dest.split_once(':')?;
    if host.is_empty() || port.is_empty() {
        return None;
    }
    Some(ForwardTarget {
        spec: ForwardSpec {
            host: host.to_string(),
            port: port.to_string(),
        },
        container_addr: dest.to_string(),
    })
}

pub struct ForwardRegistry<'a> {
    engine: &'a Engine,
    verbose: bool,
}

impl<'a> ForwardRegistry<'a> {
    pub fn new(engine: &'a Engine, verbose: bool) -> Self {
        ForwardRegistry { engine, verbose }
    }

    /// Resolve the container's filesystem-visible IP address.
    pub fn container_ip(&self, container: &str) -> Result<String, BootstrapError> {
        let out = self
            .engine
            .exec(container, &["sh", "-c", "hostname -i"])
            .map_err(|_| {
                BootstrapError::Message(
                    "running `hostname` inside the container failed; the container image \
                     must provide the hostname command for port forwarding"
                        .to_string(),
                )
            })?;
        let ip = out.split_whitespace().next().unwrap_or("").to_string();
        if ip.is_empty() {
            return Err(BootstrapError::Message(
                "container reported an empty IP address".to_string(),
            ));
        }
        Ok(ip)
    }

    /// Launch forwarders for `specs` if this session wins the launch lock,
    /// then return every recorded forwarding target (including ones left by
    /// a previous session against the same container). Forwarder exec
    /// children are appended to `children` so teardown can reap them.
    pub fn ensure_forwarded(
        &self,
        container: &str,
        specs: &[ForwardSpec],
        children: &mut Vec<Child>,
    ) -> Result<Vec<ForwardTarget>, BootstrapError> {
        let ip = self.container_ip(container)?;

        if self.acquire_launch_lock(container) {
            self.engine
                .exec(container, &["sh", "-c", &format!("mkdir -p {MARKER_DIR}")])?;
            for spec in specs {
                self.launch_forwarder(container, &ip, spec, children)?;
            }
        } else if self.verbose {
            eprintln!("dcvim: port-forwarder already running in {container}");
        }

        self.enumerate_markers(container)
    }

    /// Exclusive-create of the lock directory decides which session launches
    /// the forwarders. `mkdir` without `-p` is atomic on the container
    /// filesystem: exactly one concurrent caller succeeds.
    fn acquire_launch_lock(&self, container: &str) -> bool {
        let cmd = format!("mkdir -p ~/.config/dcvim && mkdir {LAUNCH_LOCK}");
        self.engine.exec(container, &["sh", "-c", &cmd]).is_ok()
    }

    fn launch_forwarder(
        &self,
        container: &str,
        ip: &str,
        spec: &ForwardSpec,
        children: &mut Vec<Child>,
    ) -> Result<(), BootstrapError> {
        // The host label comes from user configuration; escape it so a
        // label with whitespace or metacharacters cannot break the command.
        let cmd = format!(
            "/port-forwarder -l 0.0.0.0:0 -f {}",
            shell_escape(&format!("{}:{}", spec.host, spec.port))
        );
        let mut child = self
            .engine
            .spawn_exec(container, &["sh", "-c", &cmd])
            .map_err(|e| BootstrapError::ForwarderLaunchFailed(e.to_string()))?;

        // The forwarder prints its bound port once; read it off a thread so
        // the bounded wait cannot block past its budget.
        let stdout = child.stdout.take().ok_or_else(|| {
            BootstrapError::ForwarderLaunchFailed("forwarder stdout unavailable".to_string())
        })?;
        let (tx, rx) = mpsc::channel::<String>();
        thread::Builder::new()
            .name("forwarder-announce".to_string())
            .spawn(move || {
                let mut reader = BufReader::new(stdout);
                let mut line = String::new();
                if reader.read_line(&mut line).is_ok() {
                    let _ = tx.send(line);
                }
            })
            .map_err(BootstrapError::Io)?;

        let line = await_ready(|| rx.try_recv().ok(), ANNOUNCE_ATTEMPTS, ANNOUNCE_INTERVAL)
            .map_err(|_| {
                let _ = child.kill();
                let _ = child.wait();
                BootstrapError::ForwarderLaunchFailed(format!(
                    "forwarder for {}:{} never announced its port",
                    spec.host, spec.port
                ))
            })?;
        let internal_port = line.trim().to_string();
        if internal_port.parse::<u16>().is_err() {
            let _ = child.kill();
            let _ = child.wait();
            return Err(BootstrapError::ForwarderLaunchFailed(format!(
                "unexpected forwarder announce line: {internal_port:?}"
            )));
        }

        let marker = encode_marker(spec, ip, &internal_port);
        self.engine.exec(
            container,
            &[
                "sh",
                "-c",
                &format!("touch {MARKER_DIR}/{}", shell_escape(&marker)),
            ],
        )?;
        eprintln!(
            "dcvim: port-forwarder started: {ip}:{internal_port} for {}:{}",
            spec.host, spec.port
        );
        children.push(child);
        Ok(())
    }

    fn enumerate_markers(&self, container: &str) -> Result<Vec<ForwardTarget>, BootstrapError> {
        let out = self
            .engine
            .exec(container, &["sh", "-c", &format!("ls --zero {MARKER_DIR}")])
            .map_err(|e| BootstrapError::ForwarderConfigNotFound(e.to_string()))?;
        Ok(out
            .split('\0')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .filter_map(parse_marker)
            .collect())
    }
}

/// Kill and reap forwarder exec children at teardown. The in-container
/// forwarder processes die with the container; these are only the host-side
/// `engine exec` wrappers.
pub fn stop_forwarder_children(children: &mut Vec<Child>) {
    for child in children.iter_mut() {
        let _ = child.kill();
        match child.wait_timeout(Duration::from_secs(2)) {
            Ok(Some(_)) => {}
            _ => {
                let _ = child.kill();
                let _ = child.wait();
            }
        }
    }
    children.clear();
}

/// A host-side bidirectional TCP relay for one forwarded spec.
pub struct Relay {
    listen_addr: String,
    target_addr: String,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

/// Bind `listen_addr` and relay each accepted connection to `target_addr`.
/// `Relay::cancel` stops accepting; in-flight copies drain on their own.
pub fn start_relay(listen_addr: &str, target_addr: &str, verbose: bool) -> io::Result<Relay> {
    let listener = TcpListener::bind(listen_addr)?;
    let local = listener.local_addr()?;
    listener.set_nonblocking(true)?;

    let running = Arc::new(AtomicBool::new(true));
    let running_cl = running.clone();
    let target = target_addr.to_string();
    let handle = thread::Builder::new()
        .name(format!("relay-{}", local.port()))
        .spawn(move || {
            while running_cl.load(Ordering::SeqCst) {
                let (stream, _peer) = match listener.accept() {
                    Ok(pair) => pair,
                    Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                        thread::sleep(Duration::from_millis(50));
                        continue;
                    }
                    Err(e) => {
                        if verbose {
                            eprintln!("dcvim: relay accept error: {e}");
                        }
                        thread::sleep(Duration::from_millis(50));
                        continue;
                    }
                };
                let _ = stream.set_nonblocking(false);
                let target = target.clone();
                thread::spawn(move || relay_connection(stream, &target, verbose));
            }
        })?;

    if verbose {
        eprintln!("dcvim: relay listening on {local}, forwarding to {target_addr}");
    }
    Ok(Relay {
        listen_addr: local.to_string(),
        target_addr: target_addr.to_string(),
        running,
        handle: Some(handle),
    })
}

/// Copy bytes both ways until either side closes; closing one side always
/// shuts the other down so no half-open socket leaks.
fn relay_connection(inbound: TcpStream, target: &str, verbose: bool) {
    let outbound = match TcpStream::connect(target) {
        Ok(s) => s,
        Err(e) => {
            if verbose {
                eprintln!("dcvim: relay dial {target} failed: {e}");
            }
            let _ = inbound.shutdown(Shutdown::Both);
            return;
        }
    };

    let mut in_read = match inbound.try_clone() {
        Ok(s) => s,
        Err(_) => return,
    };
    let mut out_write = match outbound.try_clone() {
        Ok(s) => s,
        Err(_) => return,
    };
    let upstream = thread::spawn(move || {
        let _ = copy_stream(&mut in_read, &mut out_write);
        let _ = out_write.shutdown(Shutdown::Both);
    });

    let mut out_read = outbound;
    let mut in_write = inbound;
    let _ = copy_stream(&mut out_read, &mut in_write);
    let _ = in_write.shutdown(Shutdown::Both);
    let _ = upstream.join();
}

fn copy_stream<R: Read, W: Write>(reader: &mut R, writer: &mut W) -> io::Result<u64> {
    io::copy(reader, writer)
}

impl Relay {
    /// The actual bound address (useful when started on port 0).
    pub fn listen_addr(&self) -> &str {
        &self.listen_addr
    }

    pub fn target_addr(&self) -> &str {
        &self.target_addr
    }

    /// Stop accepting new connections. In-flight copies drain; they are not
    /// forcibly severed.
    pub fn cancel(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(h) = self.handle.take() {
            let _ = h.join();
        }
    }
}

impl Drop for Relay {
    fn drop(&mut self) {
        self.cancel();
    }
}
