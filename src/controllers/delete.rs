use super::read::Fetch;
use super::render::{Emit, Shape};
use super::ResourceScope;
use crate::config::Action;
use crate::error::AppError;
use crate::pipeline::{Context, Flow, Pipeline, RequestView, Stage};
use crate::response::ResponseSink;
use async_trait::async_trait;
use axum::http::StatusCode;

pub(super) fn pipeline(scope: &ResourceScope) -> Pipeline {
    Pipeline::new(Emit)
        .stage(Fetch::new(scope, Action::Delete))
        .stage(Write::new(scope))
        .stage(Shape::new(scope))
}

struct Write {
    scope: ResourceScope,
}

impl Write {
    fn new(scope: &ResourceScope) -> Self {
        Self { scope: scope.clone() }
    }
}

#[async_trait]
impl Stage for Write {
    fn name(&self) -> &'static str {
        "write"
    }

    async fn run(&self, _req: &RequestView, res: &mut ResponseSink, ctx: &mut Context) -> Flow {
        let entity = self.scope.entity();
        let Some(instance) = ctx.take_single() else {
            return Flow::Skip;
        };
        match self.scope.store.destroy(entity, &instance).await {
            Ok(()) => {
                res.set_status(StatusCode::NO_CONTENT);
                Flow::Continue
            }
            Err(e) => {
                tracing::warn!(entity = %entity.name, error = %e, "destroy failed");
                ctx.fail(res, StatusCode::INTERNAL_SERVER_ERROR, AppError::from(e));
                Flow::Skip
            }
        }
    }
}
