#![cfg(unix)]

use std::fs;

use dcvim::{ClipboardRelayManager, Platform};

mod common;

const RECEIVER_STUB: &str = r#"#!/bin/sh
printf '{"pid": %d, "address": "0.0.0.0", "port": 43210}\n' $$
exec sleep 30
"#;

fn linux_platform() -> Platform {
    Platform {
        is_wsl: false,
        host_os: "linux",
        host_arch: "x86_64",
    }
}

#[test]
fn test_receiver_announce_is_parsed_and_stop_cleans_up() {
    let dir = tempfile::tempdir().expect("tempdir");
    let binary = common::write_script(dir.path(), "clipboard-data-receiver", RECEIVER_STUB);
    let config_dir = dir.path().join("ws");
    fs::create_dir_all(&config_dir).expect("config dir");

    let mgr = ClipboardRelayManager::new(linux_platform(), false);
    let handle = mgr.start(&binary, &config_dir).expect("start receiver");
    assert_eq!(handle.port, 43210);
    assert!(handle.pid > 0);

    mgr.stop(&handle);
    assert!(!config_dir.join("pid").exists());
    assert!(!config_dir.join("port").exists());
}

#[test]
fn test_silent_receiver_times_out_with_relay_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    // Never announces; the bounded wait must give up and report it.
    let binary = common::write_script(
        dir.path(),
        "clipboard-data-receiver",
        "#!/bin/sh\nexec sleep 30\n",
    );
    let config_dir = dir.path().join("ws");
    fs::create_dir_all(&config_dir).expect("config dir");

    let mgr = ClipboardRelayManager::new(linux_platform(), false);
    let err = mgr.start(&binary, &config_dir).unwrap_err();
    assert!(
        matches!(err, dcvim::BootstrapError::ClipboardRelayTimeout(_)),
        "unexpected error: {err}"
    );
}
