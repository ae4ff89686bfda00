//! Multi-step conversation flows
//!
//! - `state` - Flow and step types plus the collected context
//! - `store` - Per-user conversation storage and turn locks
//! - `engine` - Step validation and transitions

pub mod engine;
pub mod state;
pub mod store;

pub use engine::{ConversationEngine, FlowAction, StepOutcome, SubmissionForm};
pub use state::{Conversation, Flow, FlowContext, Step};
pub use store::ConversationStore;
