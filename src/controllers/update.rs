use super::create::reject;
use super::read::Fetch;
use super::render::{Emit, Shape};
use super::{merge_attributes, ResourceScope};
use crate::config::Action;
use crate::error::AppError;
use crate::pipeline::{Context, Flow, Payload, Pipeline, RequestView, Stage};
use crate::response::ResponseSink;
use async_trait::async_trait;
use axum::http::StatusCode;

pub(super) fn pipeline(scope: &ResourceScope) -> Pipeline {
    Pipeline::new(Emit)
        .stage(Fetch::new(scope, Action::Update))
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

    async fn run(&self, req: &RequestView, res: &mut ResponseSink, ctx: &mut Context) -> Flow {
        if ctx.error.is_some() {
            return Flow::Skip;
        }
        let entity = self.scope.entity();
        let Some(mut instance) = ctx.take_single() else {
            return Flow::Skip;
        };
        let relations = instance.relations(&ctx.includes);
        ctx.attributes = merge_attributes(entity, self.scope.endpoint_attributes(Action::Update), req);
        // The stored key identifies the row being updated; it is never rewritten.
        let mut changes = ctx.attributes.clone();
        changes.remove(&entity.primary_key);
        instance.set_attributes(entity, &changes);
        let validated = match self.scope.store.validate(entity, instance).await {
            Ok(instance) => instance,
            Err(e) => {
                reject(res, ctx, e);
                return Flow::Continue;
            }
        };
        match self.scope.store.persist(entity, validated).await {
            Ok(mut saved) => {
                // the store returns the bare row; keep what the fetch loaded
                saved.attach_relations(relations);
                res.set_status(StatusCode::OK);
                ctx.instance = Some(Payload::Instance(saved));
                Flow::Continue
            }
            Err(e) => {
                tracing::warn!(entity = %entity.name, error = %e, "persist failed");
                ctx.fail(res, StatusCode::INTERNAL_SERVER_ERROR, AppError::from(e));
                Flow::Skip
            }
        }
    }
}
