//! Staged request processing. A pipeline runs its stages in order over a shared
//! [`Context`]; any stage may skip the rest, and the terminal stage always runs once.

mod context;
mod stage;

pub use context::{Context, FlowState, Payload, StageOutcome, StageRecord};
pub use stage::{Flow, Pipeline, RequestView, Stage};
