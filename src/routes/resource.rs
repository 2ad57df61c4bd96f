//! Resource routes built from the resolved model: one route per declared endpoint, one
//! method per allowed action.

use crate::config::Action;
use crate::handlers::resource::{create, delete, list, read, update, ResourceControllers};
use crate::state::AppState;
use axum::{routing::MethodRouter, Router};
use std::sync::Arc;
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};

pub fn resource_routes(state: AppState) -> Router {
    let mut router = Router::new();
    for resource in &state.model.resources {
        let controllers = Arc::new(ResourceControllers::new(&state, resource));

        let mut plural = MethodRouter::new();
        if resource.allows(Action::Create) {
            plural = plural.post(create);
        }
        if resource.allows(Action::List) {
            plural = plural.get(list);
        }
        tracing::debug!(path = %resource.plural.path, entity = %resource.entity.name, "route");
        router = router.route(&resource.plural.path, plural.with_state(controllers.clone()));

        if let Some(singular) = &resource.singular {
            let mut method = MethodRouter::new();
            if resource.allows(Action::Read) {
                method = method.get(read);
            }
            if resource.allows(Action::Update) {
                method = method.put(update).patch(update);
            }
            if resource.allows(Action::Delete) {
                method = method.delete(delete);
            }
            tracing::debug!(path = %singular.path, entity = %resource.entity.name, "route");
            router = router.route(&singular.path, method.with_state(controllers));
        }
    }
    router
        .layer(RequestBodyLimitLayer::new(state.body_limit))
        .layer(TraceLayer::new_for_http())
}
