use std::process::Command;

#[test]
fn test_cli_doctor_exits_zero() {
    let bin = env!("CARGO_BIN_EXE_dcvim");
    let out = Command::new(bin)
        .arg("doctor")
        .output()
        .expect("failed to run dcvim doctor");
    assert!(
        out.status.success(),
        "dcvim doctor exited non-zero: {:?}\nstdout:\n{}\nstderr:\n{}",
        out.status.code(),
        String::from_utf8_lossy(&out.stdout),
        String::from_utf8_lossy(&out.stderr)
    );
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("dcvim doctor"), "missing header:\n{stderr}");
    assert!(
        stderr.contains("doctor: completed diagnostics."),
        "missing completion line:\n{stderr}"
    );
}

#[test]
fn test_cli_rejects_unknown_subcommand() {
    let bin = env!("CARGO_BIN_EXE_dcvim");
    let out = Command::new(bin)
        .arg("frobnicate")
        .output()
        .expect("failed to run dcvim");
    assert!(!out.status.success());
}
