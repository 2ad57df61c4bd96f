//! Shared tail of every pipeline: render the outcome into a body, then emit it.

use super::ResourceScope;
use crate::pipeline::{Context, Flow, Payload, RequestView, Stage};
use crate::response::{error_body, ResponseSink};
use crate::store::Instance;
use async_trait::async_trait;
use axum::http::StatusCode;
use serde_json::Value;
use std::collections::HashSet;

/// Instance values minus hidden attributes. Included relations are kept as loaded.
pub fn shape_instance(instance: &Instance, hidden: &HashSet<String>) -> Value {
    Value::Object(
        instance
            .values()
            .iter()
            .filter(|(k, _)| !hidden.contains(*k))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect(),
    )
}

pub(super) struct Shape {
    scope: ResourceScope,
}

impl Shape {
    pub(super) fn new(scope: &ResourceScope) -> Self {
        Self { scope: scope.clone() }
    }
}

#[async_trait]
impl Stage for Shape {
    fn name(&self) -> &'static str {
        "shape"
    }

    fn runs_after_error(&self) -> bool {
        true
    }

    async fn run(&self, _req: &RequestView, _res: &mut ResponseSink, ctx: &mut Context) -> Flow {
        let hidden = &self.scope.resource.hidden_attributes;
        ctx.body = match (&ctx.error, &ctx.instance) {
            (Some(err), _) => Some(error_body(err)),
            (None, Some(Payload::Instance(i))) => Some(shape_instance(i, hidden)),
            (None, Some(Payload::Collection(items))) => {
                Some(Value::Array(items.iter().map(|i| shape_instance(i, hidden)).collect()))
            }
            (None, None) => None,
        };
        Flow::Continue
    }
}

/// Terminal stage. Falls back to the error envelope when the pipeline skipped before shaping.
pub(super) struct Emit;

#[async_trait]
impl Stage for Emit {
    fn name(&self) -> &'static str {
        "send"
    }

    async fn run(&self, _req: &RequestView, res: &mut ResponseSink, ctx: &mut Context) -> Flow {
        if let Some(err) = &ctx.error {
            if !res.status().is_client_error() && !res.status().is_server_error() {
                res.set_status(err.status());
            }
            if ctx.body.is_none() {
                ctx.body = Some(error_body(err));
            }
        }
        let body = if res.status() == StatusCode::NO_CONTENT {
            None
        } else {
            ctx.body.take()
        };
        if !res.send(body) {
            tracing::warn!("response already sent");
        }
        Flow::Continue
    }
}
