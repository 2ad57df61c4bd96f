use super::render::{Emit, Shape};
use super::{criteria_from_path, malformed_path_value, ResourceScope};
use crate::config::Action;
use crate::error::AppError;
use crate::pipeline::{Context, Flow, Payload, Pipeline, RequestView, Stage};
use crate::response::ResponseSink;
use crate::store::FindQuery;
use async_trait::async_trait;
use axum::http::StatusCode;

pub(super) fn pipeline(scope: &ResourceScope) -> Pipeline {
    Pipeline::new(Emit).stage(Fetch::new(scope, Action::Read)).stage(Shape::new(scope))
}

/// Load the single instance addressed by the path. Shared with update and delete.
pub(super) struct Fetch {
    scope: ResourceScope,
    action: Action,
}

impl Fetch {
    pub(super) fn new(scope: &ResourceScope, action: Action) -> Self {
        Self {
            scope: scope.clone(),
            action,
        }
    }
}

#[async_trait]
impl Stage for Fetch {
    fn name(&self) -> &'static str {
        "fetch"
    }

    async fn run(&self, req: &RequestView, res: &mut ResponseSink, ctx: &mut Context) -> Flow {
        let entity = self.scope.entity();
        let endpoint_attributes = self.scope.endpoint_attributes(self.action);
        // a key of the wrong type cannot match any instance
        if let Some((name, raw)) = malformed_path_value(entity, endpoint_attributes, req) {
            tracing::debug!(entity = %entity.name, attribute = name, value = raw, "malformed path value");
            let what = format!("{} {}={}", entity.name, name, raw);
            ctx.fail(res, StatusCode::NOT_FOUND, AppError::NotFound(what));
            return Flow::Continue;
        }
        ctx.criteria = criteria_from_path(entity, endpoint_attributes, req);
        let query = FindQuery::new(entity)
            .with_criteria(ctx.criteria.clone())
            .with_includes(ctx.includes.clone());
        match self.scope.store.find_one(entity, &query).await {
            Ok(Some(instance)) => ctx.instance = Some(Payload::Instance(instance)),
            Ok(None) => {
                let what = format!("{} {}", entity.name, serde_json::Value::Object(ctx.criteria.clone()));
                ctx.fail(res, StatusCode::NOT_FOUND, AppError::NotFound(what));
            }
            Err(e) => {
                tracing::warn!(entity = %entity.name, error = %e, "lookup failed");
                ctx.fail(res, StatusCode::INTERNAL_SERVER_ERROR, e.into());
            }
        }
        Flow::Continue
    }
}
