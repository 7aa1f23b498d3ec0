//! Shell command execution with live output streaming.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::tools::traits::{ProgressSink, Tool};
use crate::tools::types::{ConfirmationDetails, ToolErrorKind, ToolKind, ToolResult};

const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// First token of the command, used as the confirmation identity.
pub(crate) fn root_command(command: &str) -> String {
    shell_words::split(command)
        .ok()
        .and_then(|tokens| tokens.into_iter().next())
        .or_else(|| command.split_whitespace().next().map(str::to_string))
        .map(|token| {
            token
                .rsplit('/')
                .next()
                .unwrap_or(token.as_str())
                .to_string()
        })
        .unwrap_or_default()
}

pub struct RunShellTool {
    workspace_root: PathBuf,
    max_output_bytes: usize,
}

impl RunShellTool {
    pub fn new(workspace_root: PathBuf, max_output_bytes: usize) -> Self {
        Self {
            workspace_root,
            max_output_bytes,
        }
    }
}

#[async_trait]
impl Tool for RunShellTool {
    fn name(&self) -> &str {
        "run_shell"
    }

    fn display_name(&self) -> &str {
        "Run Shell Command"
    }

    fn description(&self) -> &str {
        "Executes a shell command in the workspace and returns its exit code and output. Output streams live while the command runs."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "command": {"type": "string", "description": "Shell command to execute"},
                "timeout_secs": {"type": "integer", "description": "Command timeout in seconds (default: 60)", "default": 60},
                "description": {"type": "string", "description": "Short explanation of what the command does"}
            },
            "required": ["command"]
        })
    }

    fn kind(&self) -> ToolKind {
        ToolKind::Modifying
    }

    fn can_stream_output(&self) -> bool {
        true
    }

    fn validate(&self, args: &Value) -> Option<String> {
        match args.get("command").and_then(Value::as_str) {
            Some(command) if !command.trim().is_empty() => None,
            _ => Some("missing required parameter 'command'".to_string()),
        }
    }

    async fn should_confirm(
        &self,
        args: &Value,
        _cancel: &CancellationToken,
    ) -> Result<Option<ConfirmationDetails>> {
        let command = args
            .get("command")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let description = args
            .get("description")
            .and_then(Value::as_str)
            .map(str::to_string);
        Ok(Some(ConfirmationDetails::ExecuteShell {
            root_command: root_command(&command),
            command,
            description,
        }))
    }

    async fn execute(
        &self,
        args: Value,
        cancel: CancellationToken,
        progress: Option<ProgressSink>,
    ) -> Result<ToolResult> {
        let command = args
            .get("command")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let timeout = Duration::from_secs(
            args.get("timeout_secs")
                .and_then(Value::as_u64)
                .unwrap_or(DEFAULT_TIMEOUT_SECS),
        );

        debug!(%command, "spawning shell command");
        let mut child = tokio::process::Command::new("sh")
            .arg("-c")
            .arg(command)
            .current_dir(&self.workspace_root)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("failed to spawn '{command}'"))?;

        let stdout = child.stdout.take().context("child stdout unavailable")?;
        let mut stderr = child.stderr.take().context("child stderr unavailable")?;

        let mut lines = BufReader::new(stdout).lines();
        let mut collected = String::new();
        let mut truncated = false;
        let deadline = tokio::time::sleep(timeout);
        tokio::pin!(deadline);

        let status = loop {
            tokio::select! {
                line = lines.next_line() => {
                    match line? {
                        Some(line) => {
                            if let Some(sink) = &progress {
                                sink.emit(&line);
                            }
                            if collected.len() < self.max_output_bytes {
                                collected.push_str(&line);
                                collected.push('\n');
                            } else {
                                truncated = true;
                            }
                        }
                        None => break child.wait().await?,
                    }
                }
                _ = cancel.cancelled() => {
                    child.start_kill().ok();
                    return Ok(ToolResult::failure(
                        format!("command cancelled: {command}"),
                        ToolErrorKind::Cancelled,
                    ));
                }
                _ = &mut deadline => {
                    child.start_kill().ok();
                    return Ok(ToolResult::failure(
                        format!("command timed out after {}s: {command}", timeout.as_secs()),
                        ToolErrorKind::ToolFailed,
                    ));
                }
            }
        };

        let mut stderr_output = String::new();
        stderr.read_to_string(&mut stderr_output).await.ok();
        if truncated {
            collected.push_str("... [output truncated]\n");
        }

        let exit_code = status.code().unwrap_or(-1);
        if status.success() {
            Ok(ToolResult::structured(json!({
                "exit_code": exit_code,
                "stdout": collected,
                "stderr": stderr_output,
            }))
            .with_display(format!("$ {command}")))
        } else {
            Ok(ToolResult::failure(
                format!(
                    "command exited with status {exit_code}: {}",
                    if stderr_output.is_empty() {
                        collected.as_str()
                    } else {
                        stderr_output.as_str()
                    }
                ),
                ToolErrorKind::ToolFailed,
            ))
        }
    }
}
