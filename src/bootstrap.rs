//! The bootstrap orchestrator: a linear state machine with rollback.
//!
//! `Idle → ContainerStarted → ArchResolved → ForwarderBinaryInstalled →
//! ClipboardRelayStarted → PortsForwarded → EditorReady → SessionActive`.
//! A failure at any step unwinds everything successfully created so far in
//! reverse order and surfaces the causal error; cleanup failures are logged
//! but never mask it. Teardown after a completed session runs the same
//! unwind, so a full start→stop cycle leaks nothing.

use std::fs;
use std::path::Path;
use std::process::Child;

use crate::clipboard::{ClipboardRelayHandle, ClipboardRelayManager};
use crate::descriptor::DescriptorCli;
use crate::editor::{launch_command, setup_editor, transfer_support_files};
use crate::engine::Engine;
use crate::errors::BootstrapError;
use crate::forward::{start_relay, stop_forwarder_children, ForwardRegistry, Relay};
use crate::normalize_container_arch;
use crate::platform::Platform;
use crate::provision::{ToolCatalog, ToolKind};
use crate::util;

pub struct StartOptions {
    pub workspace: String,
    /// Request nvim instead of vim (subject to the fallback rules).
    pub nvim: bool,
    /// Launch the editor through this shell instead of `sh`.
    pub shell: Option<String>,
    pub no_clipboard: bool,
    pub verbose: bool,
}

/// Everything the interactive-attach collaborator needs; the orchestrator is
/// not involved once this is handed over.
pub struct AttachContext {
    pub container_id: String,
    /// In-container workspace folder used as the exec working directory.
    pub workspace_folder: String,
    /// Shell command that launches the editor.
    pub command: String,
}

pub trait AttachService {
    fn attach(&self, engine: &Engine, ctx: &AttachContext) -> Result<(), BootstrapError>;
}

/// Attaches by running the launch command in the container with inherited
/// stdio. Terminal interrupts reach the foreground child first; the
/// orchestrator resumes (and tears down) when it returns.
pub struct DefaultAttachService;

impl AttachService for DefaultAttachService {
    fn attach(&self, engine: &Engine, ctx: &AttachContext) -> Result<(), BootstrapError> {
        let status = engine
            .exec_interactive(&ctx.container_id, &ctx.workspace_folder, &ctx.command)
            .map_err(|e| BootstrapError::InteractiveAttachFailed(e.to_string()))?;
        if !status.success() {
            return Err(BootstrapError::InteractiveAttachFailed(format!(
                "editor session exited with {status}"
            )));
        }
        Ok(())
    }
}

/// What has succeeded so far in one bootstrap run. Consulted for
/// reverse-order cleanup on failure, then discarded. Never persisted.
#[derive(Default)]
pub struct BootstrapState {
    container_id: Option<String>,
    clipboard: Option<ClipboardRelayHandle>,
    relays: Vec<Relay>,
    forwarder_children: Vec<Child>,
}

/// Full bootstrap, interactive session, and teardown for one workspace.
pub fn start(opts: &StartOptions, attach: &dyn AttachService) -> Result<(), BootstrapError> {
    let platform = Platform::detect();
    let engine = Engine::new(opts.verbose)?;
    let cli = DescriptorCli::new(opts.verbose)?;
    let catalog = ToolCatalog::default();
    let bin_dir = util::cache_bin_dir()?;
    let ws_config_dir = util::workspace_config_dir(&opts.workspace)?;
    let clipboard_mgr = ClipboardRelayManager::new(platform.clone(), opts.verbose);

    let mut state = BootstrapState::default();
    let bootstrapped = run_steps(
        opts,
        &platform,
        &engine,
        &cli,
        &catalog,
        &bin_dir,
        &ws_config_dir,
        &clipboard_mgr,
        &mut state,
    );

    let result = match bootstrapped {
        Ok(ctx) => {
            eprintln!("dcvim: session ready, attaching ...");
            attach.attach(&engine, &ctx)
        }
        Err(e) => {
            eprintln!("dcvim: bootstrap failed, rolling back");
            Err(e)
        }
    };

    teardown(&mut state, &engine, &clipboard_mgr);
    result
}

#[allow(clippy::too_many_arguments)]
fn run_steps(
    opts: &StartOptions,
    platform: &Platform,
    engine: &Engine,
    cli: &DescriptorCli,
    catalog: &ToolCatalog,
    bin_dir: &Path,
    ws_config_dir: &Path,
    clipboard_mgr: &ClipboardRelayManager,
    state: &mut BootstrapState,
) -> Result<AttachContext, BootstrapError> {
    // ContainerStarted
    let container_id = cli.up(&opts.workspace)?;
    state.container_id = Some(container_id.clone());

    // ArchResolved
    let uname = engine.exec(&container_id, &["uname", "-m"])?;
    let arch = normalize_container_arch(uname.trim())?.to_string();
    eprintln!("dcvim: container arch: {arch}");

    // ForwarderBinaryInstalled
    let forwarder = catalog.resolve(ToolKind::PortForwarder, platform, &arch)?;
    let forwarder_path = forwarder.ensure(bin_dir, false)?;
    engine.copy_in("port-forwarder", &forwarder_path, &container_id, "/port-forwarder")?;
    engine
        .exec_as_root(&container_id, &["sh", "-c", "chmod +x /port-forwarder"])
        .map_err(|e| BootstrapError::ChmodFailed(e.to_string()))?;

    // ClipboardRelayStarted
    if !opts.no_clipboard {
        let cdr = catalog.resolve(ToolKind::ClipboardReceiver, platform, "")?;
        let cdr_path = cdr.ensure(bin_dir, false)?;
        let handle = clipboard_mgr.start(&cdr_path, ws_config_dir)?;
        state.clipboard = Some(handle);
    }

    // PortsForwarded
    let session = cli.read_configuration(&opts.workspace)?;
    let registry = ForwardRegistry::new(engine, opts.verbose);
    let targets = registry.ensure_forwarded(
        &container_id,
        &session.forward_specs,
        &mut state.forwarder_children,
    )?;
    for t in &targets {
        let listen = format!("0.0.0.0:{}", t.spec.port);
        let relay =
            start_relay(&listen, &t.container_addr, opts.verbose).map_err(BootstrapError::Io)?;
        eprintln!(
            "dcvim: forwarding {} -> {}",
            relay.listen_addr(),
            relay.target_addr()
        );
        state.relays.push(relay);
    }

    // EditorReady
    let editor = setup_editor(
        engine,
        &container_id,
        opts.nvim,
        &arch,
        platform,
        catalog,
        bin_dir,
    )?;
    let vimrc = util::config_dir()?.join("vimrc");
    let files = transfer_support_files(
        engine,
        &container_id,
        ws_config_dir,
        state.clipboard.as_ref().map(|h| h.port),
        editor.binary_name == "nvim",
        Some(&vimrc),
    )?;

    let mut command = launch_command(&editor, &arch, &files);
    if let Some(shell) = &opts.shell {
        command = format!("{shell} -c {}", util::shell_escape(&command));
    }

    // SessionActive: hand off to the attach collaborator.
    Ok(AttachContext {
        container_id,
        workspace_folder: session.workspace_folder,
        command,
    })
}

/// Reverse-order unwind of everything the bootstrap created. Shared by the
/// failure rollback and normal session teardown. Each step is best-effort;
/// failures are logged and the unwind continues.
fn teardown(state: &mut BootstrapState, engine: &Engine, clipboard_mgr: &ClipboardRelayManager) {
    for relay in state.relays.iter_mut() {
        relay.cancel();
    }
    state.relays.clear();

    stop_forwarder_children(&mut state.forwarder_children);

    if let Some(handle) = state.clipboard.take() {
        clipboard_mgr.stop(&handle);
        if let Err(e) = fs::remove_dir_all(&handle.config_dir) {
            eprintln!(
                "dcvim: could not remove {} (continuing): {e}",
                handle.config_dir.display()
            );
        }
    }

    if let Some(id) = state.container_id.take() {
        if let Err(e) = engine.stop(&id) {
            eprintln!("dcvim: container stop failed (continuing): {e}");
        }
        if let Err(e) = engine.remove(&id) {
            eprintln!("dcvim: container remove failed (continuing): {e}");
        }
    }
}

/// Print the parsed session configuration without starting anything.
pub fn dry_run_config(workspace: &str, verbose: bool) -> Result<(), BootstrapError> {
    let cli = DescriptorCli::new(verbose)?;
    let session = cli.read_configuration(workspace)?;
    println!("workspace folder: {}", session.workspace_folder);
    if session.forward_specs.is_empty() {
        println!("forward ports: (none)");
    } else {
        for spec in &session.forward_specs {
            println!("forward port: {}:{}", spec.host, spec.port);
        }
    }
    Ok(())
}

/// Stop the running container(s) for a workspace.
pub fn stop(workspace: &str, verbose: bool) -> Result<(), BootstrapError> {
    let engine = Engine::new(verbose)?;
    let ws = canonical_workspace(workspace);
    let ids = engine.ps_by_workspace(&ws, false)?;
    if ids.is_empty() {
        eprintln!("dcvim: no running container for {ws}");
        return Ok(());
    }
    for id in ids {
        engine.stop(&id)?;
        eprintln!("dcvim: stopped {id}");
    }
    Ok(())
}

/// Stop and remove the container(s) for a workspace.
pub fn down(workspace: &str, verbose: bool) -> Result<(), BootstrapError> {
    let engine = Engine::new(verbose)?;
    let ws = canonical_workspace(workspace);
    let ids = engine.ps_by_workspace(&ws, true)?;
    if ids.is_empty() {
        eprintln!("dcvim: no container for {ws}");
        return Ok(());
    }
    for id in ids {
        if let Err(e) = engine.stop(&id) {
            eprintln!("dcvim: container stop failed (continuing): {e}");
        }
        engine.remove(&id)?;
        eprintln!("dcvim: removed {id}");
    }
    Ok(())
}

fn canonical_workspace(workspace: &str) -> String {
    fs::canonicalize(workspace)
        .map(|p| p.display().to_string())
        .unwrap_or_else(|_| workspace.to_string())
}
