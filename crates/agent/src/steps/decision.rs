//! Decision step — ask the model to answer or to pick a capability.

use chrono::Utc;
use toolchat_core::error::LoopFailure;
use toolchat_core::event::DomainEvent;
use toolchat_core::message::{Conversation, Turn};
use toolchat_core::provider::DecisionOutcome;
use tracing::info;

use super::StepContext;

/// What the decision step produced.
#[derive(Debug)]
pub enum Decision {
    /// The model answered; the answer is already appended
    Answered(Conversation),
    /// The model wants this capability
    Requested(String),
    /// The model call failed
    Failed(LoopFailure),
}

pub async fn run(ctx: &StepContext<'_>, conversation: &Conversation) -> Decision {
    match ctx.call_model(conversation, true).await {
        Ok(DecisionOutcome::Answer(text)) => {
            info!(conversation_id = %ctx.conversation_id, "Model answered directly");
            ctx.publish(DomainEvent::DecisionMade {
                conversation_id: ctx.conversation_id.clone(),
                capability: None,
                timestamp: Utc::now(),
            });
            Decision::Answered(conversation.append(Turn::assistant(text)))
        }
        Ok(DecisionOutcome::UseCapability(identifier)) => {
            info!(
                conversation_id = %ctx.conversation_id,
                capability = %identifier,
                "Model requested a capability"
            );
            ctx.publish(DomainEvent::DecisionMade {
                conversation_id: ctx.conversation_id.clone(),
                capability: Some(identifier.clone()),
                timestamp: Utc::now(),
            });
            Decision::Requested(identifier)
        }
        Err(failure) => Decision::Failed(failure),
    }
}
