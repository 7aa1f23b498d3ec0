//! Tool contract, registry, scheduler, and the built-in tool set.

pub mod builtins;
pub mod registry;
pub mod scheduler;
pub mod traits;
pub mod types;

pub use registry::{ToolFilterPolicy, ToolRegistry, ToolSource};
pub use scheduler::{CoreToolScheduler, SchedulerError};
pub use traits::{ProgressSink, Tool};
pub use types::{
    ConfirmationDetails, ConfirmationOutcome, ResponsePayload, ToolCall, ToolCallRequest,
    ToolCallResponse, ToolCallStatus, ToolErrorKind, ToolKind, ToolResult,
};
