//! LLM provider layer: conversation model, streaming contract, and the
//! shipped OpenAI-compatible transport.

pub mod error;
pub mod factory;
pub mod generator;
pub mod providers;
pub mod types;

pub use error::ProviderError;
pub use factory::{api_key_env_var, create_generator};
pub use generator::{ContentGenerator, ProviderEventStream};
pub use types::{
    FinishReason, FunctionCallPart, FunctionResponsePart, GenerateRequest, Message,
    MessageRole, Part, ProviderEvent, ProviderKind,
};
