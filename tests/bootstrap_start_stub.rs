#![cfg(unix)]

use std::env;
use std::fs;
use std::sync::Mutex;

use dcvim::bootstrap::{self, AttachContext, AttachService, StartOptions};
use dcvim::{BootstrapError, Engine};

mod common;

const ENGINE_STUB: &str = r#"#!/bin/sh
STATE="__STATE__"
printf '%s\n' "$*" >> "$STATE/log"
last=""
for a in "$@"; do last="$a"; done
case "$*" in
  *"uname -m"*) echo x86_64 ;;
  *" which vim"*) exit 1 ;;
  *"hostname -i"*) echo 172.18.0.5 ;;
  *"pf.lock"*) mkdir "$STATE/pf.lock" 2>/dev/null || exit 1 ;;
  *"mkdir -p ~/.config/dcvim/pf"*) mkdir -p "$STATE/pf" ;;
  *"/port-forwarder -l"*) echo 40001; exec sleep 30 ;;
  *"touch ~/.config/dcvim/pf/"*) touch "$STATE/pf/${last##*/}" ;;
  *"ls --zero"*) ls --zero "$STATE/pf" ;;
esac
exit 0
"#;

const CLI_STUB: &str = r#"#!/bin/sh
case "$*" in
  "up --workspace-folder"*) echo '{"outcome":"success","containerId":"c1"}' ;;
  "read-configuration"*) echo '{"configuration":{"forwardPorts":[38291]},"workspace":{"workspaceFolder":"/workspaces/proj"}}' ;;
esac
exit 0
"#;

const RECEIVER_STUB: &str = r#"#!/bin/sh
printf '{"pid": %d, "address": "0.0.0.0", "port": 43210}\n' $$
exec sleep 30
"#;

/// Records the attach context instead of running an editor.
#[derive(Default)]
struct RecordingAttach(Mutex<Option<(String, String, String)>>);

impl AttachService for RecordingAttach {
    fn attach(&self, _engine: &Engine, ctx: &AttachContext) -> Result<(), BootstrapError> {
        *self.0.lock().unwrap() = Some((
            ctx.container_id.clone(),
            ctx.workspace_folder.clone(),
            ctx.command.clone(),
        ));
        Ok(())
    }
}

#[test]
fn test_full_bootstrap_reaches_attach_and_tears_down() {
    let dir = tempfile::tempdir().expect("tempdir");
    let state = dir.path().join("state");
    fs::create_dir_all(&state).expect("state dir");
    let workspace = dir.path().join("ws");
    fs::create_dir_all(&workspace).expect("workspace dir");

    let engine_stub = common::write_script(
        dir.path(),
        "docker",
        &ENGINE_STUB.replace("__STATE__", &state.display().to_string()),
    );
    let cli_stub = common::write_script(dir.path(), "devcontainer", CLI_STUB);
    env::set_var("DCVIM_CONTAINER_RUNTIME", &engine_stub);
    env::set_var("DCVIM_DEVCONTAINER_CLI", &cli_stub);
    env::set_var("XDG_CACHE_HOME", dir.path().join("cache"));
    env::set_var("XDG_CONFIG_HOME", dir.path().join("config"));

    let bin = dir.path().join("cache").join("dcvim").join("bin");
    fs::create_dir_all(&bin).expect("cache bin dir");
    fs::write(bin.join("port-forwarder-amd64"), b"binary\n").unwrap();
    fs::write(bin.join("vim-amd64"), b"binary\n").unwrap();
    common::write_script(&bin, "clipboard-data-receiver", RECEIVER_STUB);

    let opts = StartOptions {
        workspace: workspace.display().to_string(),
        nvim: false,
        shell: Some("bash".to_string()),
        no_clipboard: false,
        verbose: false,
    };
    let attach = RecordingAttach::default();
    bootstrap::start(&opts, &attach).expect("bootstrap start");

    let (container, folder, command) = attach.0.lock().unwrap().take().expect("attach recorded");
    assert_eq!(container, "c1");
    assert_eq!(folder, "/workspaces/proj");
    // The transferred vim is an AppImage on amd64 and runs through extraction,
    // wrapped in the requested shell.
    assert!(command.starts_with("bash -c "), "command: {command}");
    assert!(command.contains("--appimage-extract"), "command: {command}");
    assert!(command.contains("squashfs-root/AppRun"), "command: {command}");
    assert!(command.contains("let g:devcontainer_vim = v:true"), "command: {command}");
    assert!(command.contains("-S /SendToTcp.vim"), "command: {command}");

    let log = common::read_log(&state.join("log"));
    // The forwarder launched for the declared port and its marker was
    // recorded.
    assert!(
        log.contains("/port-forwarder -l 0.0.0.0:0 -f localhost:38291"),
        "no forwarder launch in:\n{log}"
    );
    assert!(
        log.contains("touch ~/.config/dcvim/pf/localhost:38291_172.18.0.5:40001"),
        "no marker in:\n{log}"
    );
    // The editor and support files were transferred.
    assert!(log.contains("c1:/vim"), "no editor transfer in:\n{log}");
    assert!(log.contains("c1:/SendToTcp.vim"), "no hook transfer in:\n{log}");
    // Teardown after a completed session stops and removes the container.
    assert!(log.contains("stop c1"), "no container stop in:\n{log}");
    assert!(log.contains("rm -f c1"), "no container remove in:\n{log}");

    // No per-workspace state survives teardown.
    let config_root = dir.path().join("config").join("dcvim");
    let leftovers: Vec<_> = fs::read_dir(&config_root)
        .map(|rd| rd.filter_map(|e| e.ok()).collect())
        .unwrap_or_default();
    assert!(
        leftovers.is_empty(),
        "workspace state left behind: {leftovers:?}"
    );
}
