//! The streaming contract between the agent loop and a provider.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use super::error::ProviderError;
use super::types::{GenerateRequest, ProviderEvent, ProviderKind};

/// A finite stream of events for one provider turn: zero or more text chunks
/// and function calls, ending with a finish event.
pub type ProviderEventStream =
    Pin<Box<dyn Stream<Item = Result<ProviderEvent, ProviderError>> + Send>>;

/// A streaming LM client.
///
/// Implementations own transport and decoding; the agent loop only consumes
/// the event stream. The kind tag selects the matching parser and response
/// converter once, at construction of the loop.
#[async_trait]
pub trait ContentGenerator: Send + Sync {
    /// Provider name, for logs and key lookup (e.g. "openai", "moonshot").
    fn name(&self) -> &str;

    /// Which response-shape family this generator speaks.
    fn provider_kind(&self) -> ProviderKind;

    /// Run one turn against the provider.
    async fn generate(
        &self,
        request: GenerateRequest,
    ) -> Result<ProviderEventStream, ProviderError>;
}
