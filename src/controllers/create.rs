use super::render::{Emit, Shape};
use super::{merge_attributes, ResourceScope};
use crate::config::Action;
use crate::error::{AppError, DataError};
use crate::pipeline::{Context, Flow, Payload, Pipeline, RequestView, Stage};
use crate::response::ResponseSink;
use crate::store::Instance;
use async_trait::async_trait;
use axum::http::{header::LOCATION, StatusCode};

pub(super) fn pipeline(scope: &ResourceScope) -> Pipeline {
    Pipeline::new(Emit).stage(Write::new(scope)).stage(Shape::new(scope))
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
        let entity = self.scope.entity();
        ctx.attributes = merge_attributes(entity, self.scope.endpoint_attributes(Action::Create), req);
        let built = self.scope.store.build(entity, &ctx.attributes);
        let validated = match self.scope.store.validate(entity, built).await {
            Ok(instance) => instance,
            Err(e) => {
                reject(res, ctx, e);
                return Flow::Continue;
            }
        };
        match self.scope.store.persist(entity, validated).await {
            Ok(saved) => {
                res.set_status(StatusCode::CREATED);
                set_location(&self.scope, res, &saved);
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

/// Validation failures are the client's (400); anything else raised while validating is ours (500).
pub(super) fn reject(res: &mut ResponseSink, ctx: &mut Context, e: DataError) {
    let status = if e.is_validation() {
        StatusCode::BAD_REQUEST
    } else {
        tracing::warn!(error = %e, "validation could not run");
        StatusCode::INTERNAL_SERVER_ERROR
    };
    ctx.fail(res, status, AppError::from(e));
}

fn set_location(scope: &ResourceScope, res: &mut ResponseSink, saved: &Instance) {
    let Some(singular) = &scope.resource.singular else {
        return;
    };
    match singular.substitute(saved.values()) {
        Some(location) => res.set_header(LOCATION, &location),
        None => tracing::debug!(template = %singular.path, "no location for saved instance"),
    }
}
