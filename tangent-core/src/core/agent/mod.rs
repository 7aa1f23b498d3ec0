//! Agent loop and its confirmation workflow.

pub mod confirmation;
pub mod events;
pub mod runner;

pub use confirmation::{
    AutoApprove, ConfirmationAssessment, ConfirmationHandler, SessionApprovals,
};
pub use events::AgentEvent;
pub use runner::AgentRunner;
