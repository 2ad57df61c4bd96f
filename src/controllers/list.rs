use super::render::{Emit, Shape};
use super::{criteria_from_path, ResourceScope};
use crate::config::{merge_includes, Action, ResourceDescriptor};
use crate::error::AppError;
use crate::pipeline::{Context, Flow, Payload, Pipeline, RequestView, Stage};
use crate::response::ResponseSink;
use crate::search::{occurrences, parse_terms, value_text, Condition, Filter, PredicateCompiler, PredicateNode};
use crate::store::FindQuery;
use async_trait::async_trait;
use axum::http::StatusCode;

pub(super) fn pipeline(scope: &ResourceScope) -> Pipeline {
    Pipeline::new(Emit).stage(Fetch::new(scope)).stage(Shape::new(scope))
}

struct Fetch {
    scope: ResourceScope,
}

impl Fetch {
    fn new(scope: &ResourceScope) -> Self {
        Self { scope: scope.clone() }
    }
}

#[async_trait]
impl Stage for Fetch {
    fn name(&self) -> &'static str {
        "fetch"
    }

    async fn run(&self, req: &RequestView, res: &mut ResponseSink, ctx: &mut Context) -> Flow {
        let resource = &self.scope.resource;
        let entity = self.scope.entity();
        let terms = parse_terms(occurrences(&req.query, &resource.search.param));
        let compiler = PredicateCompiler::new(&self.scope.model.graph, &self.scope.model.entities);
        let compiled = compiler.compile(resource, &terms);

        if resource.search.strict && !compiled.unresolved.is_empty() {
            let listed = compiled
                .unresolved
                .iter()
                .map(|u| format!("{} ({})", u.raw, u.reason))
                .collect::<Vec<_>>()
                .join(", ");
            ctx.fail(res, StatusCode::BAD_REQUEST, AppError::UnresolvedSearchPath(listed));
            return Flow::Continue;
        }

        merge_includes(&mut ctx.includes, &compiled.joins());
        ctx.criteria = criteria_from_path(entity, self.scope.endpoint_attributes(Action::List), req);
        let mut filter = compiled.predicate;
        for (attribute, value) in &ctx.criteria {
            if let Some(text) = value_text(value) {
                filter.filters.push(Filter::Condition(Condition::equals(attribute.clone(), text)));
            }
        }
        add_attribute_filters(resource, req, &mut filter);

        let query = FindQuery::new(entity)
            .with_filter(filter)
            .with_includes(ctx.includes.clone());
        match self.scope.store.find_all(entity, &query).await {
            Ok(items) => {
                res.set_status(StatusCode::OK);
                ctx.instance = Some(Payload::Collection(items));
            }
            Err(e) => {
                tracing::warn!(entity = %entity.name, error = %e, "listing failed");
                ctx.fail(res, StatusCode::INTERNAL_SERVER_ERROR, e.into());
            }
        }
        Flow::Continue
    }
}

/// `?name=value` for an exposed, visible attribute narrows the listing to exact matches.
fn add_attribute_filters(resource: &ResourceDescriptor, req: &RequestView, filter: &mut PredicateNode) {
    for (key, value) in &req.query {
        if *key == resource.search.param || resource.hidden_attributes.contains(key) {
            continue;
        }
        if resource.attributes.iter().any(|a| a == key) {
            filter.filters.push(Filter::Condition(Condition::equals(key.clone(), value.clone())));
        }
    }
}
