use std::fs;

use dcvim::{BootstrapError, Tool};

#[test]
fn test_ensure_reuses_cached_file_without_network() {
    let dir = tempfile::tempdir().expect("tempdir");
    // The URL is unroutable on purpose: a cache hit must never fetch.
    let tool = Tool {
        file_name: "port-forwarder-amd64".to_string(),
        download_url: "http://127.0.0.1:1/port-forwarder".to_string(),
    };
    let cached = dir.path().join("port-forwarder-amd64");
    fs::write(&cached, b"#!/bin/sh\n").expect("seed cached tool");

    let first = tool.ensure(dir.path(), false).expect("ensure cached tool");
    let second = tool.ensure(dir.path(), false).expect("ensure cached tool again");
    assert_eq!(first, cached);
    assert_eq!(second, cached);
}

#[test]
fn test_ensure_reports_download_failure() {
    let dir = tempfile::tempdir().expect("tempdir");
    let tool = Tool {
        file_name: "never-cached".to_string(),
        download_url: "http://127.0.0.1:1/never-cached".to_string(),
    };
    let err = tool.ensure(dir.path(), false).unwrap_err();
    assert!(
        matches!(err, BootstrapError::ToolProvisionFailed(_)),
        "unexpected error: {err}"
    );
    assert!(!dir.path().join("never-cached").exists());
}
