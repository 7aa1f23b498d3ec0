//! Built-in tools wired into the registry at construction.

mod file_ops;
mod shell;

use std::path::PathBuf;

use anyhow::Result;
use std::sync::Arc;

pub use file_ops::{ListDirectoryTool, ReadFileTool, WriteFileTool};
pub use shell::RunShellTool;

use super::registry::{ToolRegistry, ToolSource};
use super::traits::Tool;

/// Register the built-in tool set. Tools excluded by the registry's filter
/// policy are skipped, not errors.
pub fn register_builtin_tools(
    registry: &mut ToolRegistry,
    workspace_root: PathBuf,
    max_output_bytes: usize,
) -> Result<()> {
    let tools: Vec<Arc<dyn Tool>> = vec![
        Arc::new(ReadFileTool::new(workspace_root.clone(), max_output_bytes)),
        Arc::new(WriteFileTool::new(workspace_root.clone())),
        Arc::new(ListDirectoryTool::new(workspace_root.clone())),
        Arc::new(RunShellTool::new(workspace_root, max_output_bytes)),
    ];

    for tool in tools {
        if !registry.policy().allows(tool.name()) {
            continue;
        }
        registry.register(tool, ToolSource::Builtin, false)?;
    }
    Ok(())
}
