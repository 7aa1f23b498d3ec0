//! The agent loop: alternate between asking the model and running the tools
//! it requests, until a turn arrives with no function calls or the iteration
//! cap is hit.

use std::sync::Arc;

use async_stream::stream;
use futures::{Stream, StreamExt, pin_mut};
use tracing::{debug, warn};

use crate::config::AgentConfig;
use crate::llm::generator::ContentGenerator;
use crate::llm::types::{GenerateRequest, Message, Part, ProviderEvent, ProviderKind};
use crate::llm::error::ProviderError;
use crate::protocol::converter::ResponseConverter;
use crate::protocol::parser::parse_text_function_calls;
use crate::tools::registry::ToolRegistry;
use crate::tools::scheduler::{CoreToolScheduler, OutputHandler};
use crate::tools::types::{ConfirmationOutcome, ToolCallRequest, ToolCallResponse};

use super::confirmation::ConfirmationHandler;
use super::events::AgentEvent;

/// Drives the multi-turn loop between one model and one tool registry.
///
/// Conversation history is owned here; the scheduler never sees it.
pub struct AgentRunner {
    generator: Arc<dyn ContentGenerator>,
    registry: Arc<ToolRegistry>,
    scheduler: Arc<CoreToolScheduler>,
    converter: ResponseConverter,
    confirmer: Arc<dyn ConfirmationHandler>,
    config: AgentConfig,
    history: Vec<Message>,
}

impl AgentRunner {
    pub fn new(
        generator: Arc<dyn ContentGenerator>,
        registry: Arc<ToolRegistry>,
        confirmer: Arc<dyn ConfirmationHandler>,
        config: AgentConfig,
    ) -> Self {
        let scheduler = Arc::new(CoreToolScheduler::new(
            Arc::clone(&registry),
            config.auto_confirm,
        ));
        let converter = ResponseConverter::new(generator.provider_kind());
        Self {
            generator,
            registry,
            scheduler,
            converter,
            confirmer,
            config,
            history: Vec::new(),
        }
    }

    pub fn history(&self) -> &[Message] {
        &self.history
    }

    /// Handle to the scheduler, e.g. for aborting a batch from outside.
    pub fn scheduler(&self) -> Arc<CoreToolScheduler> {
        Arc::clone(&self.scheduler)
    }

    /// Forward live tool output (chunks tagged with the call id).
    pub fn set_tool_output_handler(&self, handler: OutputHandler) {
        self.scheduler.set_output_handler(handler);
    }

    /// Run one user request to completion, yielding events lazily.
    ///
    /// The stream is finite and ends with exactly one `Finished` or `Error`
    /// event.
    pub fn run(&mut self, input: impl Into<String>) -> impl Stream<Item = AgentEvent> + '_ {
        let input = input.into();
        stream! {
            self.history.push(Message::user_text(input));
            let declarations = self.registry.function_declarations();
            let max_iterations = self.config.max_iterations.max(1);
            let mut turn = 0usize;
            let mut protocol_retry_available = true;

            'turns: loop {
                if turn >= max_iterations {
                    yield AgentEvent::Error(format!(
                        "maximum tool-call turns exceeded ({max_iterations})"
                    ));
                    break 'turns;
                }

                repair_history(&mut self.history, &self.converter);

                let request = GenerateRequest {
                    messages: self.history.clone(),
                    system_prompt: self.config.system_prompt.clone(),
                    tools: declarations.clone(),
                    model: self.config.model.clone(),
                    temperature: Some(self.config.temperature),
                    max_tokens: Some(self.config.max_tokens),
                };

                let events = match self.generator.generate(request).await {
                    Ok(events) => events,
                    Err(err) => {
                        yield AgentEvent::Error(err.to_string());
                        break 'turns;
                    }
                };

                let mut text = String::new();
                let mut batch: Vec<ToolCallRequest> = Vec::new();
                let mut stream_error: Option<ProviderError> = None;
                {
                    pin_mut!(events);
                    while let Some(event) = events.next().await {
                        match event {
                            Ok(ProviderEvent::TextChunk(chunk)) => {
                                text.push_str(&chunk);
                                yield AgentEvent::Content(chunk);
                            }
                            Ok(ProviderEvent::FunctionCall(request)) => {
                                batch.push(request);
                            }
                            Ok(ProviderEvent::Finish(reason)) => {
                                debug!(?reason, "provider turn finished");
                                break;
                            }
                            Err(err) => {
                                stream_error = Some(err);
                                break;
                            }
                        }
                    }
                }

                if let Some(err) = stream_error {
                    // A protocol violation aborts only the current turn; one
                    // retry happens against the repaired history.
                    if matches!(err, ProviderError::Protocol(_)) && protocol_retry_available {
                        warn!(error = %err, "provider protocol error, retrying turn");
                        protocol_retry_available = false;
                        continue;
                    }
                    yield AgentEvent::Error(err.to_string());
                    break 'turns;
                }

                // Text-marker models embed their calls in the prose.
                if batch.is_empty()
                    && self.generator.provider_kind() == ProviderKind::TextMarkers
                {
                    batch = parse_text_function_calls(&text);
                }

                if batch.is_empty() {
                    if !text.is_empty() {
                        self.history.push(Message::model_text(text.clone()));
                    }
                    yield AgentEvent::Finished { text };
                    break 'turns;
                }

                let mut parts = Vec::with_capacity(batch.len() + 1);
                if !text.is_empty() {
                    parts.push(Part::text(text.clone()));
                }
                for request in &batch {
                    parts.push(Part::function_call(
                        Some(request.call_id.clone()),
                        request.name.clone(),
                        request.args.clone(),
                    ));
                }
                self.history.push(Message::model_parts(parts));

                for request in &batch {
                    yield AgentEvent::ToolCallRequest(request.clone());
                }

                // Drop results of batches abandoned by an earlier
                // interrupted turn; history repair already accounted for
                // them.
                while self.scheduler.take_completed().is_some() {}

                if let Err(err) = self.scheduler.schedule(batch).await {
                    yield AgentEvent::Error(err.to_string());
                    break 'turns;
                }

                // Resolve consent for every waiting call, then the batch can
                // only finish.
                loop {
                    let awaiting = self.scheduler.awaiting_calls();
                    if awaiting.is_empty() {
                        break;
                    }
                    for call in awaiting {
                        let outcome = match call.confirmation_details.as_ref() {
                            Some(details) => {
                                self.confirmer
                                    .confirm(&call.request.name, details)
                                    .await
                            }
                            None => ConfirmationOutcome::ProceedOnce,
                        };
                        self.scheduler
                            .handle_confirmation(&call.request.call_id, outcome)
                            .await;
                    }
                }

                let Some(completed) = self.scheduler.take_completed() else {
                    yield AgentEvent::Error("tool batch did not complete".to_string());
                    break 'turns;
                };

                let responses: Vec<ToolCallResponse> = completed
                    .iter()
                    .map(|call| {
                        call.response.clone().unwrap_or_else(|| {
                            self.converter.synthesize_cancelled(
                                &call.request.call_id,
                                &call.request.name,
                            )
                        })
                    })
                    .collect();

                for response in &responses {
                    yield AgentEvent::ToolCallResponse(response.clone());
                }
                for message in self.converter.convert_batch(&responses) {
                    self.history.push(message);
                }

                turn += 1;
            }
        }
    }

    /// Convenience wrapper: drain the event stream and return the final
    /// text, or the error description.
    pub async fn run_to_completion(
        &mut self,
        input: impl Into<String>,
    ) -> Result<String, String> {
        let events = self.run(input);
        pin_mut!(events);
        let mut content = String::new();
        while let Some(event) = events.next().await {
            match event {
                AgentEvent::Content(chunk) => content.push_str(&chunk),
                AgentEvent::Finished { text } => {
                    return Ok(if text.is_empty() { content } else { text });
                }
                AgentEvent::Error(message) => return Err(message),
                _ => {}
            }
        }
        Ok(content)
    }
}

/// Restore the call/response count invariant before a provider request.
///
/// Any model message whose function calls lack matching responses (a batch
/// interrupted by cancellation) gets synthesized `{"error": "cancelled"}`
/// responses inserted right after it.
pub fn repair_history(history: &mut Vec<Message>, converter: &ResponseConverter) {
    let answered: std::collections::HashSet<String> = history
        .iter()
        .flat_map(|message| message.function_responses())
        .map(|response| response.id.clone())
        .collect();

    let mut insertions: Vec<(usize, Vec<Message>)> = Vec::new();
    for (index, message) in history.iter().enumerate() {
        let unanswered: Vec<ToolCallResponse> = message
            .function_calls()
            .iter()
            .filter(|call| {
                call.id
                    .as_ref()
                    .map(|id| !answered.contains(id))
                    .unwrap_or(false)
            })
            .map(|call| {
                converter.synthesize_cancelled(
                    call.id.as_deref().unwrap_or_default(),
                    &call.name,
                )
            })
            .collect();
        if !unanswered.is_empty() {
            warn!(
                count = unanswered.len(),
                "synthesizing responses for interrupted tool calls"
            );
            insertions.push((index + 1, converter.convert_batch(&unanswered)));
        }
    }

    for (position, messages) in insertions.into_iter().rev() {
        for (offset, message) in messages.into_iter().enumerate() {
            history.insert(position + offset, message);
        }
    }
}
