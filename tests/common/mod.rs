//! Shared fixtures: declared models, seeded stores, a recording store wrapper and HTTP helpers.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{HeaderMap, Request, StatusCode},
    Router,
};
use resource_rest::config::{EntityModel, Record};
use resource_rest::{
    resolve, resource_routes, AppState, DataError, DataStore, FindQuery, FullConfig, Instance, MemoryStore,
    ResolvedModel,
};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

pub fn users_config() -> Value {
    json!({
        "entities": [{
            "name": "user",
            "table": "users",
            "attributes": [
                { "name": "id", "type": "integer", "generated": true },
                { "name": "username", "nullable": false },
                { "name": "email" },
                { "name": "secret" }
            ],
            "validation": { "email": { "format": "email" } }
        }],
        "resources": [{
            "entity": "user",
            "endpoints": ["/users", "/users/:id"],
            "hidden_attributes": ["secret"]
        }]
    })
}

pub fn school_config() -> Value {
    json!({
        "entities": [
            { "name": "student", "attributes": [
                { "name": "id", "type": "integer", "generated": true },
                { "name": "name", "nullable": false } ] },
            { "name": "course", "attributes": [
                { "name": "id", "type": "integer", "generated": true },
                { "name": "name", "nullable": false } ] },
            { "name": "course_student", "attributes": [
                { "name": "id", "type": "integer", "generated": true },
                { "name": "student_id", "type": "integer" },
                { "name": "course_id", "type": "integer" } ] },
            { "name": "requiredTextbook", "attributes": [
                { "name": "id", "type": "integer", "generated": true },
                { "name": "name", "nullable": false },
                { "name": "course_id", "type": "integer" } ] }
        ],
        "associations": [
            { "from": "student", "name": "courses", "to": "course", "cardinality": "many",
              "through": { "entity": "course_student" } },
            { "from": "course", "name": "students", "to": "student", "cardinality": "many",
              "through": { "entity": "course_student" } },
            { "from": "course", "name": "requiredTextbooks", "to": "requiredTextbook", "cardinality": "many" },
            { "from": "requiredTextbook", "name": "course", "to": "course", "cardinality": "one" }
        ],
        "resources": [
            { "entity": "student", "endpoints": ["/student", "/student/:id"],
              "include": [{ "relation": "courses", "include": [{ "relation": "requiredTextbooks" }] }] },
            { "entity": "course", "endpoints": ["/courses", "/courses/:id"] },
            { "entity": "requiredTextbook", "endpoints": ["/course/:course_id/textbooks"],
              "actions": ["create", "list"] }
        ]
    })
}

pub fn model(config: Value) -> ResolvedModel {
    let config: FullConfig = serde_json::from_value(config).expect("config json");
    resolve(&config).expect("config resolves")
}

pub const USERS: [(&str, &str); 7] = [
    ("arthur", "arthur@gmail.com"),
    ("james", "james@gmail.com"),
    ("james", "jim@gmail.com"),
    ("henry", "henry@gmail.com"),
    ("william", "william@gmail.com"),
    ("edward", "edward@gmail.com"),
    ("arthur", "aaaaarthur@gmail.com"),
];

pub async fn seeded_users() -> MemoryStore {
    let store = MemoryStore::new();
    store
        .seed(
            "user",
            USERS.iter().enumerate().map(|(i, (username, email))| {
                json!({ "id": i + 1, "username": username, "email": email, "secret": "s3cr3t" })
            }),
        )
        .await;
    store
}

/// Students S1..S3, courses math(1)/science(2); S1→math, S2→math+science, S3→science.
/// Textbooks algebra and geometry belong to math, intro to biology to science.
pub async fn seeded_school() -> MemoryStore {
    let store = MemoryStore::new();
    store
        .seed(
            "student",
            [
                json!({ "id": 1, "name": "John Public" }),
                json!({ "id": 2, "name": "Joe Smith" }),
                json!({ "id": 3, "name": "Jane Smith" }),
            ],
        )
        .await;
    store
        .seed("course", [json!({ "id": 1, "name": "math" }), json!({ "id": 2, "name": "science" })])
        .await;
    store
        .seed(
            "course_student",
            [
                json!({ "id": 1, "student_id": 1, "course_id": 1 }),
                json!({ "id": 2, "student_id": 2, "course_id": 1 }),
                json!({ "id": 3, "student_id": 2, "course_id": 2 }),
                json!({ "id": 4, "student_id": 3, "course_id": 2 }),
            ],
        )
        .await;
    store
        .seed(
            "requiredTextbook",
            [
                json!({ "id": 1, "name": "algebra", "course_id": 1 }),
                json!({ "id": 2, "name": "geometry", "course_id": 1 }),
                json!({ "id": 3, "name": "intro to biology", "course_id": 2 }),
            ],
        )
        .await;
    store
}

/// Wraps a `MemoryStore`, recording every data-access call and optionally failing some.
#[derive(Default)]
pub struct RecordingStore {
    pub inner: MemoryStore,
    pub calls: Mutex<Vec<&'static str>>,
    pub fail_persist: bool,
    pub fail_find: bool,
}

impl RecordingStore {
    pub fn new(inner: MemoryStore) -> Self {
        Self {
            inner,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, call: &str) -> usize {
        self.calls().iter().filter(|c| **c == call).count()
    }

    fn note(&self, call: &'static str) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl DataStore for RecordingStore {
    fn build(&self, entity: &EntityModel, attributes: &Record) -> Instance {
        self.note("build");
        self.inner.build(entity, attributes)
    }

    async fn find_one(&self, entity: &EntityModel, query: &FindQuery) -> Result<Option<Instance>, DataError> {
        self.note("find_one");
        if self.fail_find {
            return Err(DataError::Backend("lookup unavailable".into()));
        }
        self.inner.find_one(entity, query).await
    }

    async fn find_all(&self, entity: &EntityModel, query: &FindQuery) -> Result<Vec<Instance>, DataError> {
        self.note("find_all");
        if self.fail_find {
            return Err(DataError::Backend("lookup unavailable".into()));
        }
        self.inner.find_all(entity, query).await
    }

    async fn validate(&self, entity: &EntityModel, instance: Instance) -> Result<Instance, DataError> {
        self.note("validate");
        self.inner.validate(entity, instance).await
    }

    async fn persist(&self, entity: &EntityModel, instance: Instance) -> Result<Instance, DataError> {
        self.note("persist");
        if self.fail_persist {
            return Err(DataError::Backend("disk full".into()));
        }
        self.inner.persist(entity, instance).await
    }

    async fn destroy(&self, entity: &EntityModel, instance: &Instance) -> Result<(), DataError> {
        self.note("destroy");
        self.inner.destroy(entity, instance).await
    }
}

pub fn app(model: ResolvedModel, store: Arc<dyn DataStore>) -> Router {
    resource_routes(AppState::new(model, store))
}

pub struct Reply {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

pub async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> Reply {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(b) => builder
            .header("content-type", "application/json")
            .body(Body::from(b.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    Reply { status, headers, body }
}

/// Sorted values of `attribute` across a JSON array of records.
pub fn pluck(records: &Value, attribute: &str) -> Vec<Value> {
    let mut out: Vec<Value> = records
        .as_array()
        .map(|a| a.iter().map(|r| r[attribute].clone()).collect())
        .unwrap_or_default();
    out.sort_by_key(|v| v.to_string());
    out
}
