//! Tool scheduler: drives a batch of calls through validation, optional
//! confirmation, concurrent execution, and terminal reporting.
//!
//! One batch is in flight at a time. All call-state mutation is serialized
//! behind a single lock; executions run concurrently and report back through
//! that lock. Terminal states are absorbing, so late results from cancelled
//! executions are discarded.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;
use parking_lot::Mutex;
use serde_json::Value;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::registry::ToolRegistry;
use super::traits::{ProgressSink, Tool};
use super::types::{
    ConfirmationOutcome, ToolCall, ToolCallRequest, ToolCallResponse, ToolCallStatus,
    ToolErrorKind,
};

/// Snapshot listener invoked after status transitions.
pub type UpdateHandler = Arc<dyn Fn(&[ToolCall]) + Send + Sync>;
/// Invoked exactly once per batch, after every call reaches a terminal state.
pub type CompleteHandler = Arc<dyn Fn(&[ToolCall]) + Send + Sync>;
/// Receives live output chunks tagged with the emitting call id.
pub type OutputHandler = Arc<dyn Fn(&str, &str) + Send + Sync>;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("cannot schedule new tool calls while a batch is in flight")]
    Busy,
}

#[derive(Default)]
struct Handlers {
    on_update: Option<UpdateHandler>,
    on_complete: Option<CompleteHandler>,
    on_output: Option<OutputHandler>,
}

struct Inner {
    calls: Mutex<Vec<ToolCall>>,
    completed: Mutex<VecDeque<Vec<ToolCall>>>,
    cancel: Mutex<CancellationToken>,
    handlers: Mutex<Handlers>,
}

impl Inner {
    fn notify_update(&self) {
        let handler = self.handlers.lock().on_update.clone();
        if let Some(handler) = handler {
            let snapshot = self.calls.lock().clone();
            handler(&snapshot);
        }
    }

    /// Apply a transition unless the call is already terminal. Duration is
    /// stamped exactly when a call becomes terminal.
    fn set_status(
        &self,
        call_id: &str,
        new_status: ToolCallStatus,
        apply: impl FnOnce(&mut ToolCall),
    ) {
        {
            let mut calls = self.calls.lock();
            let Some(call) = calls
                .iter_mut()
                .find(|call| call.request.call_id == call_id)
            else {
                return;
            };
            if call.is_terminal() {
                debug!(call_id, ?new_status, "ignoring transition on terminal call");
                return;
            }
            if new_status.is_terminal() {
                call.duration_ms = Some(
                    call.start_time
                        .map(|start| start.elapsed().as_millis() as u64)
                        .unwrap_or(0),
                );
            }
            call.status = new_status;
            apply(call);
        }
        self.notify_update();
        self.check_completion();
    }

    /// Drain the batch and fire the completion callback once every call is
    /// terminal.
    fn check_completion(&self) {
        let batch = {
            let mut calls = self.calls.lock();
            if calls.is_empty() || calls.iter().any(|call| !call.is_terminal()) {
                return;
            }
            std::mem::take(&mut *calls)
        };
        self.completed.lock().push_back(batch.clone());
        let handler = self.handlers.lock().on_complete.clone();
        if let Some(handler) = handler {
            handler(&batch);
        }
    }
}

/// The core scheduler. See the module docs for the lifecycle.
pub struct CoreToolScheduler {
    registry: Arc<ToolRegistry>,
    auto_confirm: bool,
    inner: Arc<Inner>,
}

impl CoreToolScheduler {
    pub fn new(registry: Arc<ToolRegistry>, auto_confirm: bool) -> Self {
        Self {
            registry,
            auto_confirm,
            inner: Arc::new(Inner {
                calls: Mutex::new(Vec::new()),
                completed: Mutex::new(VecDeque::new()),
                cancel: Mutex::new(CancellationToken::new()),
                handlers: Mutex::new(Handlers::default()),
            }),
        }
    }

    pub fn set_update_handler(&self, handler: UpdateHandler) {
        self.inner.handlers.lock().on_update = Some(handler);
    }

    pub fn set_complete_handler(&self, handler: CompleteHandler) {
        self.inner.handlers.lock().on_complete = Some(handler);
    }

    pub fn set_output_handler(&self, handler: OutputHandler) {
        self.inner.handlers.lock().on_output = Some(handler);
    }

    pub fn is_idle(&self) -> bool {
        self.inner
            .calls
            .lock()
            .iter()
            .all(|call| call.is_terminal())
    }

    /// Snapshot of the active batch.
    pub fn active_calls(&self) -> Vec<ToolCall> {
        self.inner.calls.lock().clone()
    }

    /// Calls currently waiting for a confirmation outcome.
    pub fn awaiting_calls(&self) -> Vec<ToolCall> {
        self.inner
            .calls
            .lock()
            .iter()
            .filter(|call| call.status == ToolCallStatus::AwaitingApproval)
            .cloned()
            .collect()
    }

    /// The oldest drained batch, if any.
    pub fn take_completed(&self) -> Option<Vec<ToolCall>> {
        self.inner.completed.lock().pop_front()
    }

    /// Schedule a batch. Fails with [`SchedulerError::Busy`] while any call
    /// from a previous batch is still non-terminal.
    pub async fn schedule(
        &self,
        requests: Vec<ToolCallRequest>,
    ) -> Result<(), SchedulerError> {
        {
            let calls = self.inner.calls.lock();
            if calls.iter().any(|call| !call.is_terminal()) {
                return Err(SchedulerError::Busy);
            }
        }

        // Fresh signal per batch so a new batch can run after an abort.
        let cancel = CancellationToken::new();
        *self.inner.cancel.lock() = cancel.clone();

        let mut new_calls = Vec::with_capacity(requests.len());
        for request in requests {
            match self.registry.lookup(&request.name) {
                Some(tool) => new_calls.push(ToolCall {
                    request,
                    tool: Some(tool),
                    status: ToolCallStatus::Validating,
                    response: None,
                    confirmation_details: None,
                    start_time: Some(Instant::now()),
                    duration_ms: None,
                    outcome: None,
                    live_output: None,
                }),
                None => {
                    warn!(tool = %request.name, "model requested unknown tool");
                    let response = ToolCallResponse::error(
                        &request.call_id,
                        &request.name,
                        format!("Tool '{}' not found", request.name),
                        ToolErrorKind::UnknownTool,
                    );
                    new_calls.push(ToolCall {
                        request,
                        tool: None,
                        status: ToolCallStatus::Error,
                        response: Some(response),
                        confirmation_details: None,
                        start_time: Some(Instant::now()),
                        duration_ms: Some(0),
                        outcome: None,
                        live_output: None,
                    });
                }
            }
        }
        self.inner.calls.lock().extend(new_calls);
        self.inner.notify_update();

        // Validation and consent, in input order.
        let pending: Vec<(String, String, Arc<dyn Tool>, Value)> = self
            .inner
            .calls
            .lock()
            .iter()
            .filter(|call| call.status == ToolCallStatus::Validating)
            .filter_map(|call| {
                call.tool.as_ref().map(|tool| {
                    (
                        call.request.call_id.clone(),
                        call.request.name.clone(),
                        Arc::clone(tool),
                        call.request.args.clone(),
                    )
                })
            })
            .collect();

        for (call_id, name, tool, args) in pending {
            if !args.is_object() {
                self.inner.set_status(&call_id, ToolCallStatus::Error, |call| {
                    call.response = Some(ToolCallResponse::error(
                        &call.request.call_id,
                        &call.request.name,
                        "Invalid arguments: expected a JSON object",
                        ToolErrorKind::InvalidArgs,
                    ));
                });
                continue;
            }

            if let Some(failure) = tool.validate(&args) {
                debug!(tool = %name, %failure, "argument validation failed");
                self.inner.set_status(&call_id, ToolCallStatus::Error, |call| {
                    call.response = Some(ToolCallResponse::error(
                        &call.request.call_id,
                        &call.request.name,
                        failure.clone(),
                        ToolErrorKind::InvalidArgs,
                    ));
                });
                continue;
            }

            if self.auto_confirm {
                self.inner
                    .set_status(&call_id, ToolCallStatus::Scheduled, |_| {});
                continue;
            }

            match tool.should_confirm(&args, &cancel).await {
                Ok(Some(details)) => {
                    self.inner
                        .set_status(&call_id, ToolCallStatus::AwaitingApproval, |call| {
                            call.confirmation_details = Some(details.clone());
                        });
                }
                Ok(None) => {
                    self.inner
                        .set_status(&call_id, ToolCallStatus::Scheduled, |_| {});
                }
                Err(err) => {
                    self.inner.set_status(&call_id, ToolCallStatus::Error, |call| {
                        call.response = Some(ToolCallResponse::error(
                            &call.request.call_id,
                            &call.request.name,
                            err.to_string(),
                            ToolErrorKind::ToolFailed,
                        ));
                    });
                }
            }
        }

        self.run_executor_pass().await;
        self.inner.check_completion();
        Ok(())
    }

    /// Resolve a call waiting for consent. Ignored unless the call is in
    /// `awaiting_approval`.
    pub async fn handle_confirmation(&self, call_id: &str, outcome: ConfirmationOutcome) {
        let awaiting = {
            let calls = self.inner.calls.lock();
            calls
                .iter()
                .find(|call| call.request.call_id == call_id)
                .map(|call| call.status == ToolCallStatus::AwaitingApproval)
                .unwrap_or(false)
        };
        if !awaiting {
            debug!(call_id, "confirmation outcome for call not awaiting approval");
            return;
        }

        match outcome {
            ConfirmationOutcome::Cancel => {
                self.inner
                    .set_status(call_id, ToolCallStatus::Cancelled, |call| {
                        call.outcome = Some(outcome);
                        call.response = Some(ToolCallResponse::error(
                            &call.request.call_id,
                            &call.request.name,
                            "Operation cancelled by user",
                            ToolErrorKind::ConfirmationCancelled,
                        ));
                    });
            }
            ConfirmationOutcome::ProceedOnce | ConfirmationOutcome::ProceedAlwaysTool => {
                self.inner
                    .set_status(call_id, ToolCallStatus::Scheduled, |call| {
                        call.outcome = Some(outcome);
                    });
            }
        }

        self.run_executor_pass().await;
    }

    /// Cancel the batch: every non-terminal call is driven to `cancelled`
    /// and in-flight executions are signalled to stop.
    pub fn abort_all(&self) {
        self.inner.cancel.lock().cancel();

        let pending_ids: Vec<String> = self
            .inner
            .calls
            .lock()
            .iter()
            .filter(|call| !call.is_terminal())
            .map(|call| call.request.call_id.clone())
            .collect();

        for call_id in pending_ids {
            self.inner
                .set_status(&call_id, ToolCallStatus::Cancelled, |call| {
                    call.response = Some(ToolCallResponse::error(
                        &call.request.call_id,
                        &call.request.name,
                        "Operation aborted by user",
                        ToolErrorKind::Cancelled,
                    ));
                });
        }
    }

    /// Move every scheduled call to executing and run them concurrently.
    /// Failures of one call never abort its siblings.
    async fn run_executor_pass(&self) {
        let cancel = self.inner.cancel.lock().clone();

        let ready: Vec<(String, String, Arc<dyn Tool>, Value)> = {
            let mut calls = self.inner.calls.lock();
            calls
                .iter_mut()
                .filter(|call| call.status == ToolCallStatus::Scheduled)
                .filter_map(|call| {
                    call.tool.as_ref().map(Arc::clone).map(|tool| {
                        call.status = ToolCallStatus::Executing;
                        (
                            call.request.call_id.clone(),
                            call.request.name.clone(),
                            tool,
                            call.request.args.clone(),
                        )
                    })
                })
                .collect()
        };
        if ready.is_empty() {
            return;
        }
        self.inner.notify_update();

        let executions = ready.into_iter().map(|(call_id, name, tool, args)| {
            self.execute_single(call_id, name, tool, args, cancel.clone())
        });
        join_all(executions).await;
    }

    async fn execute_single(
        &self,
        call_id: String,
        name: String,
        tool: Arc<dyn Tool>,
        args: Value,
        cancel: CancellationToken,
    ) {
        if cancel.is_cancelled() {
            return;
        }

        let progress = if tool.can_stream_output() {
            let inner = Arc::clone(&self.inner);
            let sink_call_id = call_id.clone();
            Some(ProgressSink::new(move |chunk: &str| {
                let handler = inner.handlers.lock().on_output.clone();
                if let Some(handler) = handler {
                    handler(&sink_call_id, chunk);
                }
                {
                    let mut calls = inner.calls.lock();
                    if let Some(call) = calls
                        .iter_mut()
                        .find(|call| call.request.call_id == sink_call_id)
                    {
                        call.live_output = Some(chunk.to_string());
                    }
                }
                inner.notify_update();
            }))
        } else {
            None
        };

        debug!(tool = %name, call_id, "executing tool");
        match tool.execute(args, cancel, progress).await {
            Ok(result) if result.success => {
                let mut response =
                    ToolCallResponse::output(&call_id, &name, result.llm_content_string());
                response.display_content = result.display_content.clone();
                self.inner
                    .set_status(&call_id, ToolCallStatus::Success, |call| {
                        call.response = Some(response.clone());
                    });
            }
            Ok(result) => {
                let kind = result.error_kind.unwrap_or(ToolErrorKind::ToolFailed);
                let mut response = ToolCallResponse::error(
                    &call_id,
                    &name,
                    result.llm_content_string(),
                    kind,
                );
                response.display_content = result.display_content.clone();
                self.inner
                    .set_status(&call_id, ToolCallStatus::Error, |call| {
                        call.response = Some(response.clone());
                    });
            }
            Err(err) => {
                warn!(tool = %name, call_id, error = %err, "tool execution failed");
                let response = ToolCallResponse::error(
                    &call_id,
                    &name,
                    err.to_string(),
                    ToolErrorKind::ToolFailed,
                );
                self.inner
                    .set_status(&call_id, ToolCallStatus::Error, |call| {
                        call.response = Some(response.clone());
                    });
            }
        }
    }
}
