//! Tool registry: name-unique registration with a reachability filter.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Result, anyhow};
use tracing::debug;

use crate::protocol::schema::FunctionDeclaration;

use super::traits::Tool;

/// Where a registration came from; lets callers clear whole groups at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolSource {
    Builtin,
    Extension,
}

/// Allow/deny filtering applied at registration and lookup.
///
/// A tool is reachable iff it is not denied and, when an allow list is
/// present, the list contains it.
#[derive(Debug, Clone, Default)]
pub struct ToolFilterPolicy {
    pub allow_list: Option<Vec<String>>,
    pub deny_list: Vec<String>,
}

impl ToolFilterPolicy {
    pub fn allows(&self, name: &str) -> bool {
        if self.deny_list.iter().any(|denied| denied == name) {
            return false;
        }
        match &self.allow_list {
            Some(allowed) => allowed.iter().any(|entry| entry == name),
            None => true,
        }
    }
}

struct Registration {
    tool: Arc<dyn Tool>,
    source: ToolSource,
}

/// The set of tools the model may call.
///
/// Immutable once the initial registration phase ends; the scheduler only
/// reads from it.
pub struct ToolRegistry {
    registrations: Vec<Registration>,
    lookup: HashMap<String, usize>,
    policy: ToolFilterPolicy,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::with_policy(ToolFilterPolicy::default())
    }

    pub fn with_policy(policy: ToolFilterPolicy) -> Self {
        Self {
            registrations: Vec::new(),
            lookup: HashMap::new(),
            policy,
        }
    }

    /// Register a tool. Fails when the name is taken (unless `force`
    /// replaces the previous registration) or the filter policy excludes it.
    pub fn register(
        &mut self,
        tool: Arc<dyn Tool>,
        source: ToolSource,
        force: bool,
    ) -> Result<()> {
        let name = tool.name().to_string();
        if !self.policy.allows(&name) {
            return Err(anyhow!("tool '{name}' is excluded by the filter policy"));
        }

        if let Some(&index) = self.lookup.get(&name) {
            if !force {
                return Err(anyhow!("tool '{name}' is already registered"));
            }
            debug!(tool = %name, "replacing existing tool registration");
            self.registrations[index] = Registration { tool, source };
            return Ok(());
        }

        debug!(tool = %name, ?source, "registering tool");
        let index = self.registrations.len();
        self.lookup.insert(name, index);
        self.registrations.push(Registration { tool, source });
        Ok(())
    }

    pub fn policy(&self) -> &ToolFilterPolicy {
        &self.policy
    }

    /// Resolve a reachable tool by name.
    pub fn lookup(&self, name: &str) -> Option<Arc<dyn Tool>> {
        if !self.policy.allows(name) {
            return None;
        }
        self.lookup
            .get(name)
            .and_then(|&index| self.registrations.get(index))
            .map(|registration| Arc::clone(&registration.tool))
    }

    pub fn has_tool(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }

    /// Every reachable tool, in registration order.
    pub fn list_enabled(&self) -> Vec<Arc<dyn Tool>> {
        self.registrations
            .iter()
            .filter(|registration| self.policy.allows(registration.tool.name()))
            .map(|registration| Arc::clone(&registration.tool))
            .collect()
    }

    pub fn enabled_tool_names(&self) -> Vec<String> {
        self.list_enabled()
            .iter()
            .map(|tool| tool.name().to_string())
            .collect()
    }

    pub fn unregister(&mut self, name: &str) -> bool {
        let Some(index) = self.lookup.remove(name) else {
            return false;
        };
        self.registrations.remove(index);
        for value in self.lookup.values_mut() {
            if *value > index {
                *value -= 1;
            }
        }
        true
    }

    /// Drop every registration, or only those from one source.
    pub fn clear(&mut self, source: Option<ToolSource>) {
        match source {
            None => {
                self.registrations.clear();
                self.lookup.clear();
            }
            Some(source) => {
                let names: Vec<String> = self
                    .registrations
                    .iter()
                    .filter(|registration| registration.source == source)
                    .map(|registration| registration.tool.name().to_string())
                    .collect();
                for name in names {
                    self.unregister(&name);
                }
            }
        }
    }

    /// Declarations for every reachable tool, ready for schema wrapping.
    pub fn function_declarations(&self) -> Vec<FunctionDeclaration> {
        self.list_enabled()
            .iter()
            .map(|tool| FunctionDeclaration {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
                parameters: tool.parameters_schema(),
            })
            .collect()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
