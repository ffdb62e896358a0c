//! State machine module.

pub mod handlers;
pub mod machine;

pub use handlers::{CrcReference, HandlerContext, ProgramSummary, VerifyReport};
pub use machine::PhaseTracker;
