//! Confirmation workflow: the callback contract the scheduler's consent gate
//! is wired to, plus session-level trust bookkeeping.
//!
//! The scheduler never prompts anyone; it surfaces details and waits for an
//! outcome. Session "always allow" memory lives here so trust decisions do
//! not leak into the core state machine.

use std::collections::HashSet;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::tools::types::{ConfirmationDetails, ConfirmationOutcome};

/// Answers confirmation requests. Only the returned outcome matters to the
/// scheduler.
#[async_trait]
pub trait ConfirmationHandler: Send + Sync {
    async fn confirm(
        &self,
        tool_name: &str,
        details: &ConfirmationDetails,
    ) -> ConfirmationOutcome;
}

/// Approves everything; used when `auto_confirm` is set and in tests.
pub struct AutoApprove;

#[async_trait]
impl ConfirmationHandler for AutoApprove {
    async fn confirm(
        &self,
        _tool_name: &str,
        _details: &ConfirmationDetails,
    ) -> ConfirmationOutcome {
        ConfirmationOutcome::ProceedOnce
    }
}

/// Command roots that always require explicit consent, regardless of any
/// remembered approval.
pub const DANGEROUS_COMMAND_ROOTS: &[&str] = &[
    "rm", "rmdir", "dd", "sudo", "su", "shutdown", "reboot", "halt", "kill", "killall",
    "mkfs", "format", "fdisk",
];

/// Whether a shell command is flagged as dangerous: its root token is in the
/// list above, or it redirects into `/dev/`.
pub fn is_dangerous_command(command: &str) -> bool {
    let root = command
        .split_whitespace()
        .next()
        .map(|token| token.rsplit('/').next().unwrap_or(token))
        .unwrap_or("");
    if DANGEROUS_COMMAND_ROOTS.contains(&root) {
        return true;
    }
    command.contains("> /dev/") || command.contains(">/dev/")
}

/// Identity under which an approval is remembered for the session.
pub fn approval_key(details: &ConfirmationDetails) -> String {
    match details {
        ConfirmationDetails::ExecuteShell { root_command, .. } => {
            format!("shell:{root_command}")
        }
        ConfirmationDetails::EditFile {
            file_name,
            file_path,
            ..
        } => format!(
            "edit:{}",
            file_name.as_deref().unwrap_or(file_path.as_str())
        ),
        ConfirmationDetails::Generic { kind, .. } => format!("{kind}:generic"),
    }
}

/// Per-session set of remembered `proceed_always_tool` decisions.
#[derive(Default)]
pub struct SessionApprovals {
    allowed: Mutex<HashSet<String>>,
}

impl SessionApprovals {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn remember(&self, key: impl Into<String>) {
        self.allowed.lock().insert(key.into());
    }

    pub fn contains(&self, key: &str) -> bool {
        self.allowed.lock().contains(key)
    }

    /// Record the outcome of a prompt, remembering always-allow answers.
    pub fn record(&self, details: &ConfirmationDetails, outcome: ConfirmationOutcome) {
        if outcome == ConfirmationOutcome::ProceedAlwaysTool {
            self.remember(approval_key(details));
        }
    }
}

/// What the display layer should do with a confirmation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfirmationAssessment {
    /// Remembered session approval applies to this request.
    pub remembered: bool,
    /// Flagged command; must be prompted even when remembered.
    pub dangerous: bool,
}

impl ConfirmationAssessment {
    pub fn requires_prompt(&self) -> bool {
        self.dangerous || !self.remembered
    }
}

/// Decide whether a request needs an interactive prompt. Dangerous commands
/// override the always-allow set.
pub fn assess(
    details: &ConfirmationDetails,
    approvals: &SessionApprovals,
) -> ConfirmationAssessment {
    let remembered = approvals.contains(&approval_key(details));
    let dangerous = match details {
        ConfirmationDetails::ExecuteShell { command, .. } => is_dangerous_command(command),
        _ => false,
    };
    ConfirmationAssessment {
        remembered,
        dangerous,
    }
}
