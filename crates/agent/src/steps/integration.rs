//! Integration step — record the capability result and compose the answer.

use chrono::Utc;
use toolchat_core::agent::LoopPolicy;
use toolchat_core::error::LoopFailure;
use toolchat_core::event::DomainEvent;
use toolchat_core::message::{Conversation, Turn};
use toolchat_core::provider::DecisionOutcome;
use tracing::debug;

use super::StepContext;

/// What the integration step produced.
#[derive(Debug)]
pub enum Integration {
    /// A final answer is appended
    Answered(Conversation),
    /// Evidence is recorded; the model decides again
    Continue(Conversation),
    /// The answer call failed; the evidence is still recorded
    Failed {
        conversation: Conversation,
        failure: LoopFailure,
    },
}

/// Evidence line for a successful capability call.
pub fn evidence_text(identifier: &str, result: &str) -> String {
    format!("Capability {identifier} returned: {result}")
}

/// `result` is `None` when the invocation step already recorded a failure.
pub async fn run(
    ctx: &StepContext<'_>,
    conversation: &Conversation,
    identifier: &str,
    result: Option<String>,
) -> Integration {
    let conversation = match result {
        Some(result) => conversation.append(Turn::tool_evidence(evidence_text(identifier, &result))),
        None => conversation.clone(),
    };

    if ctx.settings.loop_policy == LoopPolicy::KeepDeciding {
        debug!(capability = %identifier, "Evidence recorded, deciding again");
        return Integration::Continue(conversation);
    }

    match ctx.call_model(&conversation, false).await {
        Ok(DecisionOutcome::Answer(text)) => {
            ctx.publish(DomainEvent::DecisionMade {
                conversation_id: ctx.conversation_id.clone(),
                capability: None,
                timestamp: Utc::now(),
            });
            Integration::Answered(conversation.append(Turn::assistant(text)))
        }
        // call_model rejects capability requests when no menu is offered
        Ok(DecisionOutcome::UseCapability(id)) => Integration::Failed {
            conversation,
            failure: LoopFailure::MalformedModelResponse(format!("unexpected capability '{id}'")),
        },
        Err(failure) => Integration::Failed {
            conversation,
            failure,
        },
    }
}
