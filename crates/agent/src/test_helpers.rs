//! Shared test helpers for the step and loop tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use toolchat_core::agent::AgentSettings;
use toolchat_core::error::{ProviderError, ToolError};
use toolchat_core::provider::{
    CompletionRequest, DecisionOutcome, Provider, ProviderResponse, Usage,
};
use toolchat_core::tool::{Capability, CapabilityRegistry, FnCapability};

use crate::steps::StepContext;

type Scripted = Result<ProviderResponse, ProviderError>;

/// A mock provider that returns a sequence of scripted responses.
///
/// Each call to `complete` returns the next response in the queue and
/// records the request it was given.
/// Panics if more calls are made than responses provided.
pub struct ScriptedProvider {
    responses: Mutex<VecDeque<Scripted>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedProvider {
    pub fn new(responses: Vec<Scripted>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted_mock"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<ProviderResponse, ProviderError> {
        let mut requests = self.requests.lock().unwrap();
        requests.push(request);
        let call = requests.len();
        drop(requests);

        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| panic!("ScriptedProvider: no response left for call #{call}"))
    }
}

/// A provider that never answers.
pub struct HangingProvider;

#[async_trait::async_trait]
impl Provider for HangingProvider {
    fn name(&self) -> &str {
        "hanging_mock"
    }

    async fn complete(&self, _request: CompletionRequest) -> Result<ProviderResponse, ProviderError> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Err(ProviderError::Network("unreachable".into()))
    }
}

fn respond(outcome: DecisionOutcome) -> Scripted {
    Ok(ProviderResponse {
        outcome,
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
        model: "mock-model".into(),
    })
}

/// A scripted direct answer.
pub fn answer(text: &str) -> Scripted {
    respond(DecisionOutcome::Answer(text.into()))
}

/// A scripted capability request.
pub fn use_capability(identifier: &str) -> Scripted {
    respond(DecisionOutcome::UseCapability(identifier.into()))
}

/// Stub capabilities: `echo`, `wikipedia`, `arxiv`, `broken`, `slow`.
pub fn stub_registry() -> CapabilityRegistry {
    let mut registry = CapabilityRegistry::new();
    registry
        .register_fn("echo", "Echoes the query", |q| async move {
            Ok(format!("echo: {q}"))
        })
        .unwrap();
    registry
        .register_fn("wikipedia", "Encyclopedia lookup", |_q| async move {
            Ok("Quantum computing is...".to_string())
        })
        .unwrap();
    registry
        .register_fn("arxiv", "Paper lookup", |_q| async move {
            Ok("Published: 2017-06-12\nTitle: Attention Is All You Need".to_string())
        })
        .unwrap();
    registry
        .register_fn("broken", "Always fails", |_q| async move {
            Err(ToolError::ExecutionFailed {
                tool_name: "broken".into(),
                reason: "upstream returned HTTP 503".into(),
            })
        })
        .unwrap();
    registry
        .register_fn("slow", "Never finishes in time", |_q| async move {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok("too late".to_string())
        })
        .unwrap();
    registry
}

/// A capability that fails `failures` times, then succeeds. Also returns
/// its call counter.
pub fn flaky_capability(identifier: &str, failures: usize) -> (Arc<dyn Capability>, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let name = identifier.to_string();
    let capability = FnCapability::new(identifier, "Fails at first", move |_q| {
        let counter = Arc::clone(&counter);
        let name = name.clone();
        async move {
            let call = counter.fetch_add(1, Ordering::SeqCst);
            if call < failures {
                Err(ToolError::RateLimited { tool_name: name })
            } else {
                Ok("recovered".to_string())
            }
        }
    });
    (Arc::new(capability), calls)
}

pub fn test_settings() -> AgentSettings {
    AgentSettings::new("mock-model")
}

pub fn context<'a>(
    provider: &'a dyn Provider,
    registry: &'a CapabilityRegistry,
    settings: &'a AgentSettings,
) -> StepContext<'a> {
    StepContext {
        provider,
        registry,
        settings,
        events: None,
        conversation_id: "test-conversation".into(),
    }
}
