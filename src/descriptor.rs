//! Devcontainer descriptor CLI wrapper.
//!
//! `devcontainer up` starts (or reuses) the container and reports its id as
//! JSON on stdout; `devcontainer read-configuration` yields the merged
//! configuration, of which we consume `forwardPorts` and the in-container
//! workspace folder. Both are external collaborators; we only parse their
//! output schema.

use std::env;
use std::io;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use serde::Deserialize;

use which::which;

use crate::errors::BootstrapError;
use crate::util::shell_join;

/// One user-declared port to forward, from `forwardPorts` in the descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardSpec {
    pub host: String,
    pub port: String,
}

#[derive(Deserialize)]
struct UpCommandResult {
    #[serde(rename = "containerId")]
    container_id: String,
}

#[derive(Deserialize, Default)]
struct ReadConfigurationResult {
    #[serde(default)]
    configuration: Configuration,
    #[serde(default)]
    workspace: Workspace,
}

#[derive(Deserialize, Default)]
struct Configuration {
    #[serde(rename = "forwardPorts", default)]
    forward_ports: Vec<serde_json::Value>,
}

#[derive(Deserialize, Default)]
struct Workspace {
    #[serde(rename = "workspaceFolder", default)]
    workspace_folder: Option<String>,
}

/// Parsed view of `read-configuration` output.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub forward_specs: Vec<ForwardSpec>,
    /// In-container workspace folder; defaults to `/` when the descriptor
    /// does not report one.
    pub workspace_folder: String,
}

pub fn descriptor_cli_path() -> io::Result<PathBuf> {
    if let Some(p) = env::var_os("DCVIM_DEVCONTAINER_CLI").filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(p));
    }
    which("devcontainer").map_err(|_| {
        io::Error::new(
            io::ErrorKind::NotFound,
            "the devcontainer CLI is required but was not found in PATH",
        )
    })
}

pub struct DescriptorCli {
    path: PathBuf,
    verbose: bool,
}

impl DescriptorCli {
    pub fn new(verbose: bool) -> io::Result<Self> {
        Ok(DescriptorCli {
            path: descriptor_cli_path()?,
            verbose,
        })
    }

    fn run(&self, args: &[&str]) -> Result<String, BootstrapError> {
        if self.verbose {
            let mut preview = vec!["devcontainer".to_string()];
            preview.extend(args.iter().map(|a| a.to_string()));
            eprintln!("dcvim: devcontainer: {}", shell_join(&preview));
        }
        let out = Command::new(&self.path)
            .args(args)
            .stderr(Stdio::inherit())
            .output()
            .map_err(BootstrapError::Io)?;
        if !out.status.success() {
            return Err(BootstrapError::Message(format!(
                "devcontainer {} exited with {}",
                args.first().copied().unwrap_or("?"),
                out.status
            )));
        }
        Ok(String::from_utf8_lossy(&out.stdout).to_string())
    }

    /// `devcontainer up`; returns the container id.
    pub fn up(&self, workspace: &str) -> Result<String, BootstrapError> {
        eprintln!("dcvim: starting container for {workspace} ...");
        let stdout = self
            .run(&["up", "--workspace-folder", workspace])
            .map_err(|e| BootstrapError::ContainerStartFailed(e.to_string()))?;
        // The CLI may print progress lines before the result object; the JSON
        // document is the last non-empty line.
        let json_line = stdout
            .lines()
            .rev()
            .find(|l| l.trim_start().starts_with('{'))
            .unwrap_or("");
        let result: UpCommandResult = serde_json::from_str(json_line).map_err(|e| {
            BootstrapError::ContainerStartFailed(format!("unparseable `up` output: {e}"))
        })?;
        eprintln!("dcvim: container up: {}", result.container_id);
        Ok(result.container_id)
    }

    /// `devcontainer read-configuration`; returns forward specs and the
    /// in-container workspace folder.
    pub fn read_configuration(&self, workspace: &str) -> Result<SessionConfig, BootstrapError> {
        let stdout = self.run(&[
            "read-configuration",
            "--include-merged-configuration",
            "--workspace-folder",
            workspace,
        ])?;
        let json_line = stdout
            .lines()
            .rev()
            .find(|l| l.trim_start().starts_with('{'))
            .unwrap_or("");
        parse_session_config(json_line)
    }
}

pub fn parse_session_config(json: &str) -> Result<SessionConfig, BootstrapError> {
    let result: ReadConfigurationResult = serde_json::from_str(json).map_err(|_| {
        BootstrapError::Message(
            "failed to parse `devcontainer read-configuration` output; check that \
             .devcontainer.json exists and the container engine is running"
                .to_string(),
        )
    })?;
    Ok(SessionConfig {
        forward_specs: forward_specs_from_values(&result.configuration.forward_ports),
        workspace_folder: result
            .workspace
            .workspace_folder
            .unwrap_or_else(|| "/".to_string()),
    })
}

/// `forwardPorts` entries are either bare port numbers (host defaults to
/// `localhost`) or `host:port` strings; anything else is skipped.
fn forward_specs_from_values(values: &[serde_json::Value]) -> Vec<ForwardSpec> {
    let mut specs = Vec::new();
    for v in values {
        match v {
            serde_json::Value::Number(n) => {
                if let Some(port) = n.as_u64() {
                    specs.push(ForwardSpec {
                        host: "localhost".to_string(),
                        port: port.to_string(),
                    });
                }
            }
            serde_json::Value::String(s) => {
                if let Some((host, port)) = s.split_once(':') {
                    if !host.is_empty() && !port.is_empty() {
                        specs.push(ForwardSpec {
                            host: host.to_string(),
                            port: port.to_string(),
                        });
                    }
                }
            }
            _ => {}
        }
    }
    specs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_specs_numbers_and_strings() {
        let json = r#"{
            "configuration": {"forwardPorts": [8080, "db:5432", 3000, true, "bad"]},
            "workspace": {"workspaceFolder": "/work"}
        }"#;
        let cfg = parse_session_config(json).unwrap();
        assert_eq!(
            cfg.forward_specs,
            vec![
                ForwardSpec {
                    host: "localhost".to_string(),
                    port: "8080".to_string()
                },
                ForwardSpec {
                    host: "db".to_string(),
                    port: "5432".to_string()
                },
                ForwardSpec {
                    host: "localhost".to_string(),
                    port: "3000".to_string()
                },
            ]
        );
        assert_eq!(cfg.workspace_folder, "/work");
    }

    #[test]
    fn test_missing_fields_default() {
        let cfg = parse_session_config("{}").unwrap();
        assert!(cfg.forward_specs.is_empty());
        assert_eq!(cfg.workspace_folder, "/");
    }

    #[test]
    fn test_garbage_is_a_descriptive_error() {
        let err = parse_session_config("not json").unwrap_err();
        assert!(err.to_string().contains("read-configuration"));
    }
}
