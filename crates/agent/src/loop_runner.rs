//! The control loop: an explicit state machine over the three steps.
//!
//! ```text
//!  Deciding ──Answer──────────────────────────────▶ Done
//!     │  ▲
//!     │  └──unknown capability── Invoking
//!     └──UseCapability (counted)──▶ Invoking ──▶ Integrating ──▶ Done
//!                                                     │  (single pass)
//!                                                     └──▶ Deciding (keep deciding)
//! ```
//!
//! A capability request arriving after the invocation bound is spent ends
//! the run with a request to rephrase.

use chrono::Utc;
use toolchat_core::error::{LoopFailure, ToolError};
use toolchat_core::event::DomainEvent;
use toolchat_core::message::Conversation;
use tracing::{debug, info, warn};

use crate::steps::decision::{self, Decision};
use crate::steps::integration::{self, Integration};
use crate::steps::invocation::{self, Invocation};
use crate::steps::{StepContext, fallback_turn};

/// Where the loop currently is, with the data that state needs.
#[derive(Debug)]
pub enum LoopState {
    Deciding(Conversation),
    Invoking {
        conversation: Conversation,
        capability: String,
    },
    Integrating {
        conversation: Conversation,
        capability: String,
        /// `None` when the call failed and the failure is already recorded
        result: Option<String>,
    },
    Done(Conversation),
}

impl LoopState {
    fn name(&self) -> &'static str {
        match self {
            Self::Deciding(_) => "deciding",
            Self::Invoking { .. } => "invoking",
            Self::Integrating { .. } => "integrating",
            Self::Done(_) => "done",
        }
    }
}

/// Result of one run of the loop.
#[derive(Debug)]
pub struct LoopReport {
    pub conversation: Conversation,
    pub invocations: u32,
}

/// Drive the loop from `Deciding` to `Done`.
///
/// `conversation` must already end with the user turn being answered.
pub async fn run(ctx: &StepContext<'_>, conversation: Conversation) -> LoopReport {
    let started_with = conversation.len();
    let mut invocations: u32 = 0;
    let mut state = LoopState::Deciding(conversation);

    let conversation = loop {
        debug!(
            conversation_id = %ctx.conversation_id,
            state = state.name(),
            invocations,
            "Loop transition"
        );

        state = match state {
            LoopState::Done(conversation) => break conversation,

            LoopState::Deciding(conversation) => match decision::run(ctx, &conversation).await {
                Decision::Answered(conversation) => LoopState::Done(conversation),
                Decision::Requested(capability) => {
                    if invocations >= ctx.settings.max_invocations {
                        let failure = LoopFailure::InvocationLimitExceeded {
                            limit: ctx.settings.max_invocations,
                        };
                        LoopState::Done(fallback(ctx, &conversation, failure))
                    } else {
                        invocations += 1;
                        LoopState::Invoking {
                            conversation,
                            capability,
                        }
                    }
                }
                Decision::Failed(failure) => LoopState::Done(fallback(ctx, &conversation, failure)),
            },

            LoopState::Invoking {
                conversation,
                capability,
            } => match invocation::run(ctx, &conversation, &capability).await {
                Invocation::Succeeded { result } => LoopState::Integrating {
                    conversation,
                    capability,
                    result: Some(result),
                },
                Invocation::Unknown { conversation } => {
                    let failure = LoopFailure::from(ToolError::UnknownCapability(capability));
                    ctx.publish(DomainEvent::FallbackIssued {
                        conversation_id: ctx.conversation_id.clone(),
                        kind: failure.kind().into(),
                        detail: failure.to_string(),
                        timestamp: Utc::now(),
                    });
                    LoopState::Deciding(conversation)
                }
                Invocation::Failed {
                    conversation,
                    halt: true,
                } => {
                    let failure = LoopFailure::TransportFailure(format!(
                        "capability {capability} failed and the failure policy halts"
                    ));
                    LoopState::Done(fallback(ctx, &conversation, failure))
                }
                Invocation::Failed {
                    conversation,
                    halt: false,
                } => LoopState::Integrating {
                    conversation,
                    capability,
                    result: None,
                },
            },

            LoopState::Integrating {
                conversation,
                capability,
                result,
            } => match integration::run(ctx, &conversation, &capability, result).await {
                Integration::Answered(conversation) => LoopState::Done(conversation),
                Integration::Continue(conversation) => LoopState::Deciding(conversation),
                Integration::Failed {
                    conversation,
                    failure,
                } => LoopState::Done(fallback(ctx, &conversation, failure)),
            },
        };
    };

    let turns_added = conversation.len().saturating_sub(started_with);
    info!(
        conversation_id = %ctx.conversation_id,
        invocations,
        turns_added,
        "Loop finished"
    );
    ctx.publish(DomainEvent::LoopFinished {
        conversation_id: ctx.conversation_id.clone(),
        invocations,
        turns_added,
        timestamp: Utc::now(),
    });

    LoopReport {
        conversation,
        invocations,
    }
}

/// Log the failure and close the run with a fallback assistant turn.
fn fallback(ctx: &StepContext<'_>, conversation: &Conversation, failure: LoopFailure) -> Conversation {
    warn!(
        conversation_id = %ctx.conversation_id,
        kind = failure.kind(),
        error = %failure,
        "Loop step failed, answering with fallback"
    );
    ctx.publish(DomainEvent::FallbackIssued {
        conversation_id: ctx.conversation_id.clone(),
        kind: failure.kind().into(),
        detail: failure.to_string(),
        timestamp: Utc::now(),
    });
    conversation.append(fallback_turn(&failure))
}
