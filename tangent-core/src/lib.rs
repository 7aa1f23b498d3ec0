//! Tangent Core Library
//!
//! The agentic tool-calling engine behind the Tangent terminal assistant:
//! a streaming LLM provider layer, a function-call protocol adapter, a tool
//! registry with a confirmation workflow, a deterministic tool scheduler, and
//! the outer agent loop that ties them together.
//!
//! ## Architecture
//!
//! One user request flows through the loop as: ask the model (streaming) →
//! collect the requested tool calls → validate, confirm, and execute them as
//! a batch → feed the results back → repeat until the model answers with no
//! calls, bounded by an iteration cap.
//!
//! - [`llm`] — conversation model, streaming event contract, providers
//! - [`protocol`] — parsing provider shapes, converting results, schemas
//! - [`tools`] — the tool contract, registry, scheduler, and built-ins
//! - [`core::agent`] — the outer loop and the confirmation workflow
//! - [`config`] — `tangent.toml` loading

pub mod config;
pub mod core;
pub mod llm;
pub mod protocol;
pub mod tools;

pub use config::{AgentConfig, TangentConfig, ToolsConfig};
pub use core::agent::{
    AgentEvent, AgentRunner, AutoApprove, ConfirmationHandler, SessionApprovals,
};
pub use llm::{
    ContentGenerator, FinishReason, GenerateRequest, Message, MessageRole, Part,
    ProviderError, ProviderEvent, ProviderEventStream, ProviderKind,
};
pub use protocol::{FunctionDeclaration, ResponseConverter, parse_function_calls};
pub use tools::{
    ConfirmationDetails, ConfirmationOutcome, CoreToolScheduler, ProgressSink,
    SchedulerError, Tool, ToolCall, ToolCallRequest, ToolCallResponse, ToolCallStatus,
    ToolErrorKind, ToolKind, ToolRegistry, ToolResult, ToolSource,
};
