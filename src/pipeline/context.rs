//! Per-request state threaded through the stages of one pipeline run.

use crate::config::{IncludeNode, Record};
use crate::error::AppError;
use crate::response::ResponseSink;
use crate::store::Instance;
use axum::http::StatusCode;
use serde_json::Value;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FlowState {
    Continue,
    Skip,
}

/// What the fetch/write stages produced.
#[derive(Clone, Debug, PartialEq)]
pub enum Payload {
    Instance(Instance),
    Collection(Vec<Instance>),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StageOutcome {
    Continued,
    Skipped,
    /// Not invoked: an earlier stage skipped or stored an error.
    NotRun,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StageRecord {
    pub stage: &'static str,
    pub outcome: StageOutcome,
}

#[derive(Debug)]
pub struct Context {
    pub attributes: Record,
    pub criteria: Record,
    pub instance: Option<Payload>,
    pub error: Option<AppError>,
    pub flow: FlowState,
    /// Relations to eager-load; starts as the resource's include tree.
    pub includes: Vec<IncludeNode>,
    /// Rendered outbound body, set by the shaping stage.
    pub body: Option<Value>,
    history: Vec<StageRecord>,
}

impl Context {
    pub fn new(includes: Vec<IncludeNode>) -> Self {
        Self {
            attributes: Record::new(),
            criteria: Record::new(),
            instance: None,
            error: None,
            flow: FlowState::Continue,
            includes,
            body: None,
            history: Vec::new(),
        }
    }

    /// Store `error` and the status that reports it.
    pub fn fail(&mut self, res: &mut ResponseSink, status: StatusCode, error: AppError) {
        tracing::debug!(status = status.as_u16(), error = %error, "stage failed");
        res.set_status(status);
        self.error = Some(error);
    }

    pub fn single(&self) -> Option<&Instance> {
        match &self.instance {
            Some(Payload::Instance(i)) => Some(i),
            _ => None,
        }
    }

    pub fn take_single(&mut self) -> Option<Instance> {
        match self.instance.take() {
            Some(Payload::Instance(i)) => Some(i),
            other => {
                self.instance = other;
                None
            }
        }
    }

    pub fn history(&self) -> &[StageRecord] {
        &self.history
    }

    /// Outcome recorded for `stage`, if it was reached at all.
    pub fn outcome_of(&self, stage: &str) -> Option<StageOutcome> {
        self.history.iter().find(|r| r.stage == stage).map(|r| r.outcome)
    }

    pub(crate) fn record(&mut self, stage: &'static str, outcome: StageOutcome) {
        tracing::debug!(stage, ?outcome, "stage");
        self.history.push(StageRecord { stage, outcome });
    }
}
