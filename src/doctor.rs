use atty;
use std::path::PathBuf;
use std::process::Command;

use crate::descriptor::descriptor_cli_path;
use crate::engine::container_runtime_path;
use crate::platform::Platform;
use crate::util;

pub fn run_doctor(verbose: bool) {
    let version = env!("CARGO_PKG_VERSION");
    let platform = Platform::detect();
    eprintln!("dcvim doctor");
    eprintln!();
    eprintln!("  version: v{}", version);
    if verbose {
        eprintln!("  build:   {} ({}, {})",
            option_env!("DCVIM_BUILD_DATE").unwrap_or("unknown"),
            option_env!("DCVIM_BUILD_TARGET").unwrap_or("unknown"),
            option_env!("DCVIM_BUILD_PROFILE").unwrap_or("unknown"),
        );
    }
    eprintln!("  host:    {} / {}", platform.host_os, platform.host_arch);
    eprintln!("  wsl:     {}", if platform.is_wsl { "yes" } else { "no" });
    eprintln!();

    // Container runtime and version
    match container_runtime_path() {
        Ok(p) => {
            eprintln!("  container runtime: {}", p.display());
            if let Ok(out) = Command::new(&p).arg("--version").output() {
                let raw = String::from_utf8_lossy(&out.stdout).trim().to_string();
                // Typical: "Docker version 28.3.3, build 980b856816"
                let pretty = raw.trim_start_matches("Docker version ").to_string();
                eprintln!("  runtime version:   {}", pretty);
            }
        }
        Err(_) => {
            eprintln!("  container runtime: (not found)");
            if verbose {
                eprintln!("    tip: Install Docker or Podman and ensure it is in your PATH, or set DCVIM_CONTAINER_RUNTIME.");
            }
        }
    }

    // devcontainer CLI and version
    match descriptor_cli_path() {
        Ok(p) => {
            eprintln!("  devcontainer cli:  {}", p.display());
            if let Ok(out) = Command::new(&p).arg("--version").output() {
                let v = String::from_utf8_lossy(&out.stdout).trim().to_string();
                if !v.is_empty() {
                    eprintln!("  cli version:       {}", v);
                }
            }
        }
        Err(_) => {
            eprintln!("  devcontainer cli:  (not found)");
            if verbose {
                eprintln!("    tip: npm install -g @devcontainers/cli, or set DCVIM_DEVCONTAINER_CLI.");
            }
        }
    }
    eprintln!();

    // Cache and config locations (display with ~)
    let home = home::home_dir().unwrap_or_else(|| PathBuf::from("~"));
    let home_str = home.to_string_lossy().to_string();
    let show = |label: &str, path: PathBuf| {
        let pstr = path.display().to_string();
        let shown = if pstr.starts_with(&home_str) {
            format!("~{}", &pstr[home_str.len()..])
        } else {
            pstr
        };
        let exists = path.exists();
        let use_color = atty::is(atty::Stream::Stderr);

        // Pad on the plain string; ANSI codes would throw off format-width
        // padding of the colored one.
        let label_width: usize = 16;
        let path_col: usize = 44;
        let padding = " ".repeat(path_col.saturating_sub(shown.chars().count()).max(1));

        let colored_path = if use_color {
            format!("\x1b[34;1m{}\x1b[0m", shown)
        } else {
            shown
        };
        let (icon, text) = if exists {
            ("✅", "found")
        } else {
            ("❌", "missing")
        };
        let status_plain = format!("{} {}", icon, text);
        let status = if use_color {
            if exists {
                format!("\x1b[32m{}\x1b[0m", status_plain)
            } else {
                format!("\x1b[31m{}\x1b[0m", status_plain)
            }
        } else {
            status_plain
        };

        eprintln!(
            "  {:label_width$} {}{} {}",
            label,
            colored_path,
            padding,
            status,
            label_width = label_width
        );
    };

    if let Ok(bin) = util::cache_bin_dir() {
        show("tool cache:", bin);
    }
    if let Ok(cfg) = util::config_dir() {
        show("config dir:", cfg.clone());
        show("vimrc:", cfg.join("vimrc"));
    }

    eprintln!();
    eprintln!("doctor: completed diagnostics.");
    eprintln!();
}
