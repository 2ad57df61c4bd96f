use super::context::{Context, FlowState, StageOutcome};
use crate::config::Record;
use crate::response::ResponseSink;
use async_trait::async_trait;
use std::collections::HashMap;

/// Result of one stage.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Flow {
    Continue,
    /// Bypass every remaining stage except the terminal one.
    Skip,
}

/// Transport-independent view of an inbound request.
#[derive(Clone, Debug, Default)]
pub struct RequestView {
    pub path_params: HashMap<String, String>,
    /// Query pairs in arrival order; a key may repeat.
    pub query: Vec<(String, String)>,
    pub body: Record,
}

impl RequestView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_path_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.path_params.insert(name.into(), value.into());
        self
    }

    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: Record) -> Self {
        self.body = body;
        self
    }
}

#[async_trait]
pub trait Stage: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether the stage still runs once an error is stored on the context.
    fn runs_after_error(&self) -> bool {
        false
    }

    async fn run(&self, req: &RequestView, res: &mut ResponseSink, ctx: &mut Context) -> Flow;
}

/// Ordered stages plus a terminal stage that always runs exactly once.
pub struct Pipeline {
    stages: Vec<Box<dyn Stage>>,
    terminal: Box<dyn Stage>,
}

impl Pipeline {
    pub fn new(terminal: impl Stage + 'static) -> Self {
        Self {
            stages: Vec::new(),
            terminal: Box::new(terminal),
        }
    }

    pub fn stage(mut self, stage: impl Stage + 'static) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    /// Stage names in execution order, terminal last.
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages
            .iter()
            .map(|s| s.name())
            .chain(std::iter::once(self.terminal.name()))
            .collect()
    }

    pub async fn run(&self, req: &RequestView, mut ctx: Context) -> (ResponseSink, Context) {
        let mut res = ResponseSink::new();
        for stage in &self.stages {
            let blocked = ctx.flow == FlowState::Skip || (ctx.error.is_some() && !stage.runs_after_error());
            if blocked {
                ctx.flow = FlowState::Skip;
                ctx.record(stage.name(), StageOutcome::NotRun);
                continue;
            }
            match stage.run(req, &mut res, &mut ctx).await {
                Flow::Continue => ctx.record(stage.name(), StageOutcome::Continued),
                Flow::Skip => {
                    ctx.flow = FlowState::Skip;
                    ctx.record(stage.name(), StageOutcome::Skipped);
                }
            }
        }
        let outcome = match self.terminal.run(req, &mut res, &mut ctx).await {
            Flow::Continue => StageOutcome::Continued,
            Flow::Skip => StageOutcome::Skipped,
        };
        ctx.record(self.terminal.name(), outcome);
        (res, ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use axum::http::StatusCode;
    use serde_json::json;

    struct Step {
        name: &'static str,
        flow: Flow,
        fail: bool,
        after_error: bool,
    }

    impl Step {
        fn ok(name: &'static str) -> Self {
            Self {
                name,
                flow: Flow::Continue,
                fail: false,
                after_error: false,
            }
        }
    }

    #[async_trait]
    impl Stage for Step {
        fn name(&self) -> &'static str {
            self.name
        }

        fn runs_after_error(&self) -> bool {
            self.after_error
        }

        async fn run(&self, _req: &RequestView, res: &mut ResponseSink, ctx: &mut Context) -> Flow {
            if self.fail {
                ctx.fail(res, StatusCode::BAD_REQUEST, AppError::BadRequest(self.name.into()));
            }
            self.flow
        }
    }

    struct Emit;

    #[async_trait]
    impl Stage for Emit {
        fn name(&self) -> &'static str {
            "send"
        }

        async fn run(&self, _req: &RequestView, res: &mut ResponseSink, _ctx: &mut Context) -> Flow {
            res.send(Some(json!("done")));
            Flow::Continue
        }
    }

    #[tokio::test]
    async fn skip_bypasses_rest_but_not_terminal() {
        let pipeline = Pipeline::new(Emit)
            .stage(Step {
                flow: Flow::Skip,
                ..Step::ok("a")
            })
            .stage(Step::ok("b"));
        let (res, ctx) = pipeline.run(&RequestView::new(), Context::new(Vec::new())).await;
        assert_eq!(ctx.outcome_of("a"), Some(StageOutcome::Skipped));
        assert_eq!(ctx.outcome_of("b"), Some(StageOutcome::NotRun));
        assert_eq!(ctx.outcome_of("send"), Some(StageOutcome::Continued));
        assert!(res.is_sent());
    }

    #[tokio::test]
    async fn error_blocks_stages_that_did_not_opt_in() {
        let pipeline = Pipeline::new(Emit)
            .stage(Step {
                fail: true,
                ..Step::ok("a")
            })
            .stage(Step {
                after_error: true,
                ..Step::ok("render")
            })
            .stage(Step::ok("c"));
        let (res, ctx) = pipeline.run(&RequestView::new(), Context::new(Vec::new())).await;
        assert_eq!(ctx.outcome_of("a"), Some(StageOutcome::Continued));
        assert_eq!(ctx.outcome_of("render"), Some(StageOutcome::Continued));
        assert_eq!(ctx.outcome_of("c"), Some(StageOutcome::NotRun));
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn names_list_terminal_last() {
        let pipeline = Pipeline::new(Emit).stage(Step::ok("fetch")).stage(Step::ok("shape"));
        assert_eq!(pipeline.stage_names(), vec!["fetch", "shape", "send"]);
    }
}
