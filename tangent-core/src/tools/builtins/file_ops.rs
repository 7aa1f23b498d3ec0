//! Workspace-rooted file tools: read, write, list.

use std::path::{Component, Path, PathBuf};

use anyhow::{Result, bail};
use async_trait::async_trait;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

use crate::tools::traits::{ProgressSink, Tool};
use crate::tools::types::{ConfirmationDetails, ToolKind, ToolResult};

/// Resolve a user-supplied path against the workspace root, rejecting
/// escapes. Works for paths that do not exist yet.
pub(crate) fn resolve_workspace_path(root: &Path, raw: &str) -> Result<PathBuf> {
    let candidate = Path::new(raw);
    let joined = if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        root.join(candidate)
    };

    let mut normalized = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::ParentDir => {
                if !normalized.pop() {
                    bail!("path '{raw}' escapes the workspace");
                }
            }
            Component::CurDir => {}
            other => normalized.push(other),
        }
    }

    if !normalized.starts_with(root) {
        bail!("path '{raw}' escapes the workspace");
    }
    Ok(normalized)
}

fn require_path(args: &Value) -> Option<String> {
    match args.get("path").and_then(Value::as_str) {
        Some(path) if !path.is_empty() => None,
        _ => Some("missing required parameter 'path'".to_string()),
    }
}

fn truncate_output(mut content: String, max_bytes: usize) -> (String, bool) {
    if content.len() <= max_bytes {
        return (content, false);
    }
    let mut cut = max_bytes;
    while cut > 0 && !content.is_char_boundary(cut) {
        cut -= 1;
    }
    content.truncate(cut);
    (content, true)
}

/// A short line-level preview of a pending overwrite, shown at the
/// confirmation prompt.
fn diff_preview(old: &str, new: &str, max_lines: usize) -> String {
    let old_lines: Vec<&str> = old.lines().collect();
    let new_lines: Vec<&str> = new.lines().collect();

    let mut prefix = 0;
    while prefix < old_lines.len()
        && prefix < new_lines.len()
        && old_lines[prefix] == new_lines[prefix]
    {
        prefix += 1;
    }
    let mut suffix = 0;
    while suffix < old_lines.len() - prefix
        && suffix < new_lines.len() - prefix
        && old_lines[old_lines.len() - 1 - suffix] == new_lines[new_lines.len() - 1 - suffix]
    {
        suffix += 1;
    }

    let mut lines = Vec::new();
    for line in &old_lines[prefix..old_lines.len() - suffix] {
        lines.push(format!("- {line}"));
    }
    for line in &new_lines[prefix..new_lines.len() - suffix] {
        lines.push(format!("+ {line}"));
    }

    let omitted = lines.len().saturating_sub(max_lines);
    lines.truncate(max_lines);
    if omitted > 0 {
        lines.push(format!("... {omitted} more changed lines"));
    }
    lines.join("\n")
}

pub struct ReadFileTool {
    workspace_root: PathBuf,
    max_output_bytes: usize,
}

impl ReadFileTool {
    pub fn new(workspace_root: PathBuf, max_output_bytes: usize) -> Self {
        Self {
            workspace_root,
            max_output_bytes,
        }
    }
}

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn display_name(&self) -> &str {
        "Read File"
    }

    fn description(&self) -> &str {
        "Reads the contents of a file from the workspace. Large files are truncated to keep responses manageable."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string", "description": "File path to read, relative to the workspace"},
                "max_bytes": {"type": "integer", "description": "Optional cap on bytes returned"}
            },
            "required": ["path"]
        })
    }

    fn validate(&self, args: &Value) -> Option<String> {
        require_path(args)
    }

    async fn execute(
        &self,
        args: Value,
        _cancel: CancellationToken,
        _progress: Option<ProgressSink>,
    ) -> Result<ToolResult> {
        let raw = args.get("path").and_then(Value::as_str).unwrap_or_default();
        let path = resolve_workspace_path(&self.workspace_root, raw)?;
        let content = tokio::fs::read_to_string(&path).await?;

        let cap = args
            .get("max_bytes")
            .and_then(Value::as_u64)
            .map(|value| value as usize)
            .unwrap_or(self.max_output_bytes);
        let (content, truncated) = truncate_output(content, cap);
        let result = if truncated {
            ToolResult::text(format!("{content}\n... [output truncated]"))
        } else {
            ToolResult::text(content)
        };
        Ok(result.with_display(format!("read {}", path.display())))
    }
}

pub struct WriteFileTool {
    workspace_root: PathBuf,
}

impl WriteFileTool {
    pub fn new(workspace_root: PathBuf) -> Self {
        Self { workspace_root }
    }
}

#[async_trait]
impl Tool for WriteFileTool {
    fn name(&self) -> &str {
        "write_file"
    }

    fn display_name(&self) -> &str {
        "Write File"
    }

    fn description(&self) -> &str {
        "Creates or overwrites a file with the given content. Use mode 'append' to add to the end instead."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string", "description": "File path to write, relative to the workspace"},
                "content": {"type": "string", "description": "Content to write"},
                "mode": {"type": "string", "description": "'overwrite' (default) or 'append'", "default": "overwrite"}
            },
            "required": ["path", "content"]
        })
    }

    fn kind(&self) -> ToolKind {
        ToolKind::Modifying
    }

    fn validate(&self, args: &Value) -> Option<String> {
        if let Some(failure) = require_path(args) {
            return Some(failure);
        }
        if args.get("content").and_then(Value::as_str).is_none() {
            return Some("missing required parameter 'content'".to_string());
        }
        match args.get("mode").and_then(Value::as_str) {
            None | Some("overwrite") | Some("append") => None,
            Some(other) => Some(format!("unknown write mode '{other}'")),
        }
    }

    async fn should_confirm(
        &self,
        args: &Value,
        _cancel: &CancellationToken,
    ) -> Result<Option<ConfirmationDetails>> {
        let raw = args.get("path").and_then(Value::as_str).unwrap_or_default();
        let new_content = args
            .get("content")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let path = resolve_workspace_path(&self.workspace_root, raw)?;

        let file_diff = match tokio::fs::read_to_string(&path).await {
            Ok(existing) => Some(diff_preview(&existing, new_content, 40)),
            Err(_) => None,
        };
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().to_string());

        Ok(Some(ConfirmationDetails::EditFile {
            file_path: path.display().to_string(),
            file_name,
            file_diff,
            description: Some(format!("{} bytes", new_content.len())),
        }))
    }

    async fn execute(
        &self,
        args: Value,
        _cancel: CancellationToken,
        _progress: Option<ProgressSink>,
    ) -> Result<ToolResult> {
        let raw = args.get("path").and_then(Value::as_str).unwrap_or_default();
        let content = args
            .get("content")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let mode = args
            .get("mode")
            .and_then(Value::as_str)
            .unwrap_or("overwrite");
        let path = resolve_workspace_path(&self.workspace_root, raw)?;

        if mode == "append" {
            use tokio::io::AsyncWriteExt;
            let mut file = tokio::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .await?;
            file.write_all(content.as_bytes()).await?;
        } else {
            tokio::fs::write(&path, content).await?;
        }

        Ok(
            ToolResult::text(format!("wrote {} bytes to {raw}", content.len()))
                .with_display(format!("wrote {}", path.display())),
        )
    }
}

pub struct ListDirectoryTool {
    workspace_root: PathBuf,
}

impl ListDirectoryTool {
    pub fn new(workspace_root: PathBuf) -> Self {
        Self { workspace_root }
    }
}

#[async_trait]
impl Tool for ListDirectoryTool {
    fn name(&self) -> &str {
        "list_directory"
    }

    fn display_name(&self) -> &str {
        "List Directory"
    }

    fn description(&self) -> &str {
        "Lists the entries of a workspace directory, directories marked with a trailing slash."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string", "description": "Directory path, relative to the workspace"}
            },
            "required": ["path"]
        })
    }

    fn validate(&self, args: &Value) -> Option<String> {
        require_path(args)
    }

    async fn execute(
        &self,
        args: Value,
        _cancel: CancellationToken,
        _progress: Option<ProgressSink>,
    ) -> Result<ToolResult> {
        let raw = args.get("path").and_then(Value::as_str).unwrap_or_default();
        let path = resolve_workspace_path(&self.workspace_root, raw)?;

        let mut entries = Vec::new();
        let mut reader = tokio::fs::read_dir(&path).await?;
        while let Some(entry) = reader.next_entry().await? {
            let mut name = entry.file_name().to_string_lossy().to_string();
            if entry.file_type().await?.is_dir() {
                name.push('/');
            }
            entries.push(name);
        }
        entries.sort();

        Ok(ToolResult::text(entries.join("\n"))
            .with_display(format!("{} entries in {raw}", entries.len())))
    }
}
