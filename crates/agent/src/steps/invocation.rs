//! Invocation step — run the requested capability against the user's query.

use chrono::Utc;
use std::time::Instant;
use toolchat_core::agent::InvocationFailurePolicy;
use toolchat_core::error::ToolError;
use toolchat_core::event::DomainEvent;
use toolchat_core::message::{Conversation, Turn};
use toolchat_core::tool::Capability;
use tracing::{debug, info, warn};

use super::StepContext;

/// What the invocation step produced.
#[derive(Debug)]
pub enum Invocation {
    /// The capability returned text, not yet recorded
    Succeeded { result: String },
    /// The call failed; the failure is already recorded as evidence
    Failed {
        conversation: Conversation,
        halt: bool,
    },
    /// No capability by that name; already recorded as evidence
    Unknown { conversation: Conversation },
}

pub async fn run(ctx: &StepContext<'_>, conversation: &Conversation, identifier: &str) -> Invocation {
    let capability = match ctx.registry.get(identifier) {
        Ok(capability) => capability,
        Err(_) => {
            warn!(
                conversation_id = %ctx.conversation_id,
                capability = %identifier,
                "Model named an unknown capability"
            );
            let evidence = format!(
                "Capability '{identifier}' does not exist. Available capabilities: {}.",
                ctx.registry.identifiers().join(", ")
            );
            return Invocation::Unknown {
                conversation: conversation.append(Turn::tool_evidence(evidence)),
            };
        }
    };

    // The model only picks the tool; the question itself is the query.
    let query = conversation.last_user_content().unwrap_or_default();

    let max_attempts = match ctx.settings.failure_policy {
        InvocationFailurePolicy::RetryOnce => 2,
        InvocationFailurePolicy::Report | InvocationFailurePolicy::Halt => 1,
    };

    let start = Instant::now();
    let mut attempts = 0;
    let outcome = loop {
        attempts += 1;
        let result = invoke_with_timeout(ctx, capability.as_ref(), query).await;
        match result {
            Err(ref e) if attempts < max_attempts => {
                debug!(capability = %identifier, error = %e, "Retrying capability");
            }
            other => break other,
        }
    };
    let duration_ms = start.elapsed().as_millis() as u64;

    ctx.publish(DomainEvent::CapabilityInvoked {
        identifier: identifier.to_string(),
        success: outcome.is_ok(),
        attempts,
        duration_ms,
        timestamp: Utc::now(),
    });

    match outcome {
        Ok(result) => {
            info!(
                capability = %identifier,
                attempts,
                duration_ms,
                chars = result.len(),
                "Capability returned"
            );
            Invocation::Succeeded { result }
        }
        Err(e) => {
            warn!(capability = %identifier, attempts, error = %e, "Capability failed");
            let evidence = format!("Capability {identifier} failed: {e}");
            Invocation::Failed {
                conversation: conversation.append(Turn::tool_evidence(evidence)),
                halt: ctx.settings.failure_policy == InvocationFailurePolicy::Halt,
            }
        }
    }
}

async fn invoke_with_timeout(
    ctx: &StepContext<'_>,
    capability: &dyn Capability,
    query: &str,
) -> Result<String, ToolError> {
    let timeout = ctx.settings.tool_timeout;
    tokio::time::timeout(timeout, capability.invoke(query))
        .await
        .map_err(|_| ToolError::Timeout {
            tool_name: capability.identifier().to_string(),
            timeout_secs: timeout.as_secs(),
        })?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::*;
    use std::time::Duration;
    use toolchat_core::message::Role;

    fn asked(question: &str) -> Conversation {
        Conversation::new().append(Turn::user(question))
    }

    #[tokio::test]
    async fn user_question_is_the_query() {
        let provider = ScriptedProvider::new(vec![]);
        let registry = stub_registry();
        let settings = test_settings();
        let ctx = context(&provider, &registry, &settings);

        match run(&ctx, &asked("quantum computing"), "echo").await {
            Invocation::Succeeded { result } => assert_eq!(result, "echo: quantum computing"),
            other => panic!("unexpected invocation: {other:?}"),
        }
    }

    #[tokio::test]
    async fn unknown_capability_is_recorded_as_evidence() {
        let provider = ScriptedProvider::new(vec![]);
        let registry = stub_registry();
        let settings = test_settings();
        let ctx = context(&provider, &registry, &settings);

        match run(&ctx, &asked("hi"), "unknown_tool").await {
            Invocation::Unknown { conversation } => {
                let last = conversation.last().unwrap();
                assert_eq!(last.role, Role::ToolEvidence);
                assert!(last.content.contains("unknown_tool"));
                assert!(last.content.contains("wikipedia"));
            }
            other => panic!("unexpected invocation: {other:?}"),
        }
    }

    #[tokio::test]
    async fn failure_is_reported_as_evidence() {
        let provider = ScriptedProvider::new(vec![]);
        let registry = stub_registry();
        let settings = test_settings();
        let ctx = context(&provider, &registry, &settings);

        match run(&ctx, &asked("anything"), "broken").await {
            Invocation::Failed { conversation, halt } => {
                assert!(!halt);
                let last = conversation.last().unwrap();
                assert_eq!(last.role, Role::ToolEvidence);
                assert!(last.content.starts_with("Capability broken failed:"));
            }
            other => panic!("unexpected invocation: {other:?}"),
        }
    }

    #[tokio::test]
    async fn retry_once_recovers_from_a_single_failure() {
        let provider = ScriptedProvider::new(vec![]);
        let (flaky, calls) = flaky_capability("flaky", 1);
        let mut registry = stub_registry();
        registry.register(flaky).unwrap();
        let settings =
            test_settings().with_failure_policy(InvocationFailurePolicy::RetryOnce);
        let ctx = context(&provider, &registry, &settings);

        let outcome = run(&ctx, &asked("q"), "flaky").await;
        assert!(matches!(outcome, Invocation::Succeeded { .. }));
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn report_policy_does_not_retry() {
        let provider = ScriptedProvider::new(vec![]);
        let (flaky, calls) = flaky_capability("flaky", 1);
        let mut registry = stub_registry();
        registry.register(flaky).unwrap();
        let settings = test_settings();
        let ctx = context(&provider, &registry, &settings);

        let outcome = run(&ctx, &asked("q"), "flaky").await;
        assert!(matches!(outcome, Invocation::Failed { .. }));
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn halt_policy_flags_the_failure() {
        let provider = ScriptedProvider::new(vec![]);
        let registry = stub_registry();
        let settings = test_settings().with_failure_policy(InvocationFailurePolicy::Halt);
        let ctx = context(&provider, &registry, &settings);

        assert!(matches!(
            run(&ctx, &asked("q"), "broken").await,
            Invocation::Failed { halt: true, .. }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_capability_times_out() {
        let provider = ScriptedProvider::new(vec![]);
        let registry = stub_registry();
        let settings = test_settings().with_timeouts(Duration::from_secs(60), Duration::from_secs(5));
        let ctx = context(&provider, &registry, &settings);

        match run(&ctx, &asked("q"), "slow").await {
            Invocation::Failed { conversation, .. } => {
                assert!(conversation.last().unwrap().content.contains("timed out"));
            }
            other => panic!("unexpected invocation: {other:?}"),
        }
    }
}
