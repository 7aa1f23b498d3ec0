//! End-to-end agent loop scenarios against a scripted provider.

mod common;

use std::sync::Arc;

use futures::{StreamExt, pin_mut};
use serde_json::json;
use tempfile::TempDir;

use common::{ScriptedConfirmer, ScriptedGenerator, ToolCallRequest, stub_registry};
use tangent_core::llm::ProviderKind;
use tangent_core::{
    AgentConfig, AgentEvent, AgentRunner, AutoApprove, ConfirmationOutcome, MessageRole,
};

fn agent_config(max_iterations: usize, auto_confirm: bool) -> AgentConfig {
    AgentConfig {
        max_iterations,
        auto_confirm,
        ..AgentConfig::default()
    }
}

async fn collect_events(runner: &mut AgentRunner, input: &str) -> Vec<AgentEvent> {
    let events = runner.run(input.to_string());
    pin_mut!(events);
    let mut collected = Vec::new();
    while let Some(event) = events.next().await {
        collected.push(event);
    }
    collected
}

#[tokio::test]
async fn happy_path_single_call() {
    let dir = TempDir::new().expect("tempdir");
    for name in ["a", "b", "c"] {
        std::fs::write(dir.path().join(name), "").expect("seed file");
    }

    let generator = Arc::new(ScriptedGenerator::new(
        ProviderKind::Native,
        vec![
            ScriptedGenerator::call_turn(
                None,
                vec![ToolCallRequest::new(
                    "c1",
                    "list_directory",
                    json!({"path": "."}),
                )],
            ),
            ScriptedGenerator::text_turn("Your directory has a, b, c."),
        ],
    ));

    let mut runner = AgentRunner::new(
        generator,
        stub_registry(dir.path()),
        Arc::new(AutoApprove),
        agent_config(10, true),
    );

    let events = collect_events(&mut runner, "list files here").await;

    match &events[..] {
        [
            AgentEvent::ToolCallRequest(request),
            AgentEvent::ToolCallResponse(response),
            AgentEvent::Content(text),
            AgentEvent::Finished { .. },
        ] => {
            assert_eq!(request.name, "list_directory");
            assert!(response.is_success());
            assert_eq!(response.payload.content(), "a\nb\nc");
            assert_eq!(text, "Your directory has a, b, c.");
        }
        other => panic!("unexpected event sequence: {other:?}"),
    }

    // user, model+call, user+response, model+text
    let history = runner.history();
    assert_eq!(history.len(), 4);
    assert_eq!(history[0].role, MessageRole::User);
    assert!(history[1].has_function_calls());
    assert_eq!(history[2].function_responses().len(), 1);
    assert_eq!(history[3].text(), "Your directory has a, b, c.");
}

#[tokio::test]
async fn unknown_tool_is_reported_back_to_the_model() {
    let dir = TempDir::new().expect("tempdir");
    let generator = Arc::new(ScriptedGenerator::new(
        ProviderKind::Native,
        vec![
            ScriptedGenerator::call_turn(
                None,
                vec![ToolCallRequest::new("c1", "quux", json!({}))],
            ),
            ScriptedGenerator::text_turn("That tool does not exist."),
        ],
    ));

    let mut runner = AgentRunner::new(
        generator.clone(),
        stub_registry(dir.path()),
        Arc::new(AutoApprove),
        agent_config(10, true),
    );

    let events = collect_events(&mut runner, "call quux").await;
    let response = events
        .iter()
        .find_map(|event| match event {
            AgentEvent::ToolCallResponse(response) => Some(response),
            _ => None,
        })
        .expect("response event");
    assert!(!response.is_success());
    assert_eq!(response.payload.content(), "Tool 'quux' not found");
    assert!(matches!(events.last(), Some(AgentEvent::Finished { .. })));

    // The error went back in the continuation request.
    let requests = generator.requests_seen.lock().expect("requests lock");
    let continuation = &requests[1].messages;
    let responses: Vec<_> = continuation
        .iter()
        .flat_map(|message| message.function_responses())
        .collect();
    assert_eq!(responses.len(), 1);
    assert_eq!(responses[0].response["error"], "Tool 'quux' not found");
}

#[tokio::test]
async fn user_cancels_one_of_two_calls() {
    let dir = TempDir::new().expect("tempdir");
    let generator = Arc::new(ScriptedGenerator::new(
        ProviderKind::Native,
        vec![
            ScriptedGenerator::call_turn(
                None,
                vec![
                    ToolCallRequest::new("c1", "delete_file", json!({"path": "x"})),
                    ToolCallRequest::new("c2", "fetch_fact", json!({})),
                ],
            ),
            ScriptedGenerator::text_turn("Kept the file, fetched the fact."),
        ],
    ));

    let confirmer = Arc::new(ScriptedConfirmer::new(vec![(
        "delete_file",
        ConfirmationOutcome::Cancel,
    )]));
    let mut runner = AgentRunner::new(
        generator,
        stub_registry(dir.path()),
        confirmer.clone(),
        agent_config(10, false),
    );

    let events = collect_events(&mut runner, "delete x and fetch a fact").await;

    let responses: Vec<_> = events
        .iter()
        .filter_map(|event| match event {
            AgentEvent::ToolCallResponse(response) => Some(response),
            _ => None,
        })
        .collect();
    assert_eq!(responses.len(), 2);
    assert_eq!(responses[0].call_id, "c1");
    assert_eq!(
        responses[0].payload.content(),
        "Operation cancelled by user"
    );
    assert_eq!(responses[1].call_id, "c2");
    assert!(responses[1].is_success());

    // Both responses ride in one user message, in batch order.
    let history = runner.history();
    let carrier = &history[2];
    assert_eq!(carrier.role, MessageRole::User);
    let parts = carrier.function_responses();
    assert_eq!(parts.len(), 2);
    assert_eq!(parts[0].id, "c1");
    assert_eq!(parts[1].id, "c2");

    // Only the guarded tool prompted.
    assert_eq!(
        *confirmer.prompted.lock().expect("prompted lock"),
        vec!["delete_file".to_string()]
    );
}

#[tokio::test]
async fn iteration_cap_stops_a_looping_model() {
    let dir = TempDir::new().expect("tempdir");
    let call_turns: Vec<_> = (0..6)
        .map(|index| {
            ScriptedGenerator::call_turn(
                None,
                vec![ToolCallRequest::new(
                    format!("c{index}"),
                    "fetch_fact",
                    json!({}),
                )],
            )
        })
        .collect();
    let generator = Arc::new(ScriptedGenerator::new(ProviderKind::Native, call_turns));

    let mut runner = AgentRunner::new(
        generator.clone(),
        stub_registry(dir.path()),
        Arc::new(AutoApprove),
        agent_config(3, true),
    );

    let events = collect_events(&mut runner, "loop forever").await;

    let responses = events
        .iter()
        .filter(|event| matches!(event, AgentEvent::ToolCallResponse(_)))
        .count();
    assert_eq!(responses, 3, "three batches complete before the cap");

    match events.last() {
        Some(AgentEvent::Error(message)) => {
            assert!(message.contains("maximum tool-call turns exceeded"));
        }
        other => panic!("expected error event, got {other:?}"),
    }

    // The cap fires before the fourth model call.
    assert_eq!(generator.requests_seen.lock().expect("requests lock").len(), 3);
}

#[tokio::test]
async fn text_marker_models_get_their_calls_parsed_from_prose() {
    let dir = TempDir::new().expect("tempdir");
    let marker_text = "Let me fetch that.\n<|tool_calls_section_begin|>\
        <|tool_call_begin|>{\"name\": \"fetch_fact\", \"arguments\": {}}<|tool_call_end|>\
        <|tool_calls_section_end|>";

    let generator = Arc::new(ScriptedGenerator::new(
        ProviderKind::TextMarkers,
        vec![
            ScriptedGenerator::text_turn(marker_text),
            ScriptedGenerator::text_turn("The fact is HELLO."),
        ],
    ));

    let mut runner = AgentRunner::new(
        generator,
        stub_registry(dir.path()),
        Arc::new(AutoApprove),
        agent_config(10, true),
    );

    let events = collect_events(&mut runner, "fetch the fact").await;
    let response = events
        .iter()
        .find_map(|event| match event {
            AgentEvent::ToolCallResponse(response) => Some(response),
            _ => None,
        })
        .expect("tool ran from marker text");
    assert_eq!(response.name, "fetch_fact");
    assert_eq!(response.payload.content(), "HELLO");
    assert!(matches!(events.last(), Some(AgentEvent::Finished { .. })));
}

#[tokio::test]
async fn call_and_response_counts_agree_on_every_request() {
    let dir = TempDir::new().expect("tempdir");
    let generator = Arc::new(ScriptedGenerator::new(
        ProviderKind::Native,
        vec![
            ScriptedGenerator::call_turn(
                Some("Two at once."),
                vec![
                    ToolCallRequest::new("c1", "fetch_fact", json!({})),
                    ToolCallRequest::new("c2", "quux", json!({})),
                ],
            ),
            ScriptedGenerator::text_turn("done"),
        ],
    ));

    let mut runner = AgentRunner::new(
        generator.clone(),
        stub_registry(dir.path()),
        Arc::new(AutoApprove),
        agent_config(10, true),
    );
    collect_events(&mut runner, "go").await;

    for request in generator.requests_seen.lock().expect("requests lock").iter() {
        let calls: usize = request
            .messages
            .iter()
            .map(|message| message.function_calls().len())
            .sum();
        let responses: usize = request
            .messages
            .iter()
            .map(|message| message.function_responses().len())
            .sum();
        assert_eq!(calls, responses, "history sent to provider is unbalanced");
    }
}
