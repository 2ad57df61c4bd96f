//! Resource handlers: translate an axum request into a `RequestView` and hand it to the
//! controller registered for the action.

use crate::config::{Action, Record, ResourceDescriptor};
use crate::controllers::Controller;
use crate::error::AppError;
use crate::pipeline::RequestView;
use crate::state::AppState;
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Controllers for the allowed actions of one resource.
pub struct ResourceControllers {
    resource: Arc<ResourceDescriptor>,
    controllers: HashMap<Action, Controller>,
}

impl ResourceControllers {
    pub fn new(state: &AppState, resource: &Arc<ResourceDescriptor>) -> Self {
        let controllers = Action::ALL
            .into_iter()
            .filter(|a| resource.allows(*a) && resource.endpoint_for(*a).is_some())
            .map(|a| (a, Controller::new(a, state.scope(resource))))
            .collect();
        Self {
            resource: resource.clone(),
            controllers,
        }
    }

    pub fn resource(&self) -> &ResourceDescriptor {
        &self.resource
    }

    pub fn get(&self, action: Action) -> Option<&Controller> {
        self.controllers.get(&action)
    }
}

type Controllers = State<Arc<ResourceControllers>>;
type PathParams = Path<HashMap<String, String>>;
type QueryPairs = Query<Vec<(String, String)>>;

/// Empty body is an empty attribute map; anything but a JSON object is rejected.
fn body_to_record(body: &Bytes) -> Result<Record, AppError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Record::new());
    }
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(m)) => Ok(m),
        Ok(_) => Err(AppError::BadRequest("body must be a JSON object".into())),
        Err(e) => Err(AppError::BadRequest(format!("invalid JSON body: {e}"))),
    }
}

async fn dispatch(
    controllers: &ResourceControllers,
    action: Action,
    path_params: HashMap<String, String>,
    query: Vec<(String, String)>,
    body: Record,
) -> Response {
    let Some(controller) = controllers.get(action) else {
        return AppError::NotFound(format!("{} on {}", action, controllers.resource.entity.name)).into_response();
    };
    let req = RequestView {
        path_params,
        query,
        body,
    };
    controller.handle(&req).await.into_response()
}

pub async fn create(
    State(controllers): Controllers,
    Path(params): PathParams,
    Query(query): QueryPairs,
    body: Bytes,
) -> Response {
    match body_to_record(&body) {
        Ok(body) => dispatch(&controllers, Action::Create, params, query, body).await,
        Err(e) => e.into_response(),
    }
}

pub async fn list(State(controllers): Controllers, Path(params): PathParams, Query(query): QueryPairs) -> Response {
    dispatch(&controllers, Action::List, params, query, Record::new()).await
}

pub async fn read(State(controllers): Controllers, Path(params): PathParams, Query(query): QueryPairs) -> Response {
    dispatch(&controllers, Action::Read, params, query, Record::new()).await
}

pub async fn update(
    State(controllers): Controllers,
    Path(params): PathParams,
    Query(query): QueryPairs,
    body: Bytes,
) -> Response {
    match body_to_record(&body) {
        Ok(body) => dispatch(&controllers, Action::Update, params, query, body).await,
        Err(e) => e.into_response(),
    }
}

pub async fn delete(State(controllers): Controllers, Path(params): PathParams, Query(query): QueryPairs) -> Response {
    dispatch(&controllers, Action::Delete, params, query, Record::new()).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_body_is_empty_record() {
        assert!(body_to_record(&Bytes::new()).unwrap().is_empty());
        assert!(body_to_record(&Bytes::from_static(b"  \n")).unwrap().is_empty());
    }

    #[test]
    fn non_object_body_is_rejected() {
        let err = body_to_record(&Bytes::from_static(b"[1,2]")).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
        assert!(body_to_record(&Bytes::from_static(b"{nope")).is_err());
    }

    #[test]
    fn object_body_is_kept() {
        let rec = body_to_record(&Bytes::from_static(br#"{"name":"Ada"}"#)).unwrap();
        assert_eq!(rec["name"], "Ada");
    }
}
