//! TOML configuration (`tangent.toml`) with layered defaults.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::tools::registry::ToolFilterPolicy;

pub const CONFIG_FILE_NAME: &str = "tangent.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TangentConfig {
    pub agent: AgentConfig,
    pub tools: ToolsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Provider name; selects the transport and the credential env var.
    pub provider: String,
    pub model: String,
    /// Overrides the provider's default endpoint.
    pub base_url: Option<String>,
    /// Cap on the outer ask-model/run-tools loop.
    pub max_iterations: usize,
    /// Skip the per-tool confirmation gate entirely.
    pub auto_confirm: bool,
    pub temperature: f32,
    pub max_tokens: u32,
    pub system_prompt: Option<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            provider: "moonshot".to_string(),
            model: "moonshot-v1-8k".to_string(),
            base_url: None,
            max_iterations: 10,
            auto_confirm: false,
            temperature: 0.7,
            max_tokens: 8192,
            system_prompt: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    /// When present, only these tools may register.
    pub allow_list: Option<Vec<String>>,
    pub deny_list: Vec<String>,
    /// Truncation threshold for tool output fed back to the model.
    pub max_output_bytes: usize,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            allow_list: None,
            deny_list: Vec::new(),
            max_output_bytes: 64 * 1024,
        }
    }
}

impl ToolsConfig {
    pub fn filter_policy(&self) -> ToolFilterPolicy {
        ToolFilterPolicy {
            allow_list: self.allow_list.clone(),
            deny_list: self.deny_list.clone(),
        }
    }
}

impl TangentConfig {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        toml::from_str(&raw)
            .with_context(|| format!("failed to parse {}", path.display()))
    }

    /// Load `tangent.toml` from the workspace root, falling back to defaults
    /// when no file exists.
    pub fn load(workspace_root: &Path) -> Result<Self> {
        let path: PathBuf = workspace_root.join(CONFIG_FILE_NAME);
        if path.is_file() {
            Self::load_from_file(&path)
        } else {
            Ok(Self::default())
        }
    }
}
