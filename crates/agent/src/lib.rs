//! The control loop of toolchat.
//!
//! For each user turn the agent runs a small state machine:
//!
//! 1. **Decide**: show the model the conversation and the capability menu;
//!    it either answers or names one capability
//! 2. **Invoke**: run that capability with the user's question as the query
//! 3. **Integrate**: record the result as evidence, then either ask for the
//!    final answer or go back to deciding, depending on [`LoopPolicy`]
//!
//! Every failure along the way is converted into a conversational turn, so
//! [`Agent::send_message`] always returns a conversation and never an error.
//!
//! [`LoopPolicy`]: toolchat_core::agent::LoopPolicy

pub mod loop_runner;
pub mod session;
pub mod steps;

#[cfg(test)]
mod test_helpers;

pub use loop_runner::{LoopReport, LoopState};
pub use session::Agent;
