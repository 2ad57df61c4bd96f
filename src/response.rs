//! Outbound response sink written by pipeline stages, and the JSON error envelope.

use crate::error::AppError;
use axum::{
    body::Body,
    http::{header::HeaderName, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::Value;

#[derive(Debug)]
pub struct ResponseSink {
    status: StatusCode,
    headers: HeaderMap,
    body: Option<Value>,
    sent: bool,
}

impl Default for ResponseSink {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseSink {
    pub fn new() -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: None,
            sent: false,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    /// Values that are not valid header text are dropped with a warning.
    pub fn set_header(&mut self, name: HeaderName, value: &str) {
        match HeaderValue::from_str(value) {
            Ok(v) => {
                self.headers.insert(name, v);
            }
            Err(_) => tracing::warn!(header = %name, value, "invalid header value dropped"),
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> Option<&Value> {
        self.body.as_ref()
    }

    pub fn is_sent(&self) -> bool {
        self.sent
    }

    /// Emit the body. Only the first call has any effect; returns whether this call sent.
    pub fn send(&mut self, body: Option<Value>) -> bool {
        if self.sent {
            return false;
        }
        self.body = body;
        self.sent = true;
        true
    }
}

impl IntoResponse for ResponseSink {
    fn into_response(self) -> Response {
        let mut response = match self.body {
            Some(body) if self.status != StatusCode::NO_CONTENT => Json(body).into_response(),
            _ => Response::new(Body::empty()),
        };
        *response.status_mut() = self.status;
        response.headers_mut().extend(self.headers);
        response
    }
}

pub fn error_body(error: &AppError) -> Value {
    serde_json::to_value(error.to_body()).unwrap_or_else(|_| {
        serde_json::json!({ "error": { "code": error.code(), "message": error.to_string() } })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header::LOCATION;
    use serde_json::json;

    #[test]
    fn send_is_exactly_once() {
        let mut res = ResponseSink::new();
        assert!(res.send(Some(json!({ "a": 1 }))));
        assert!(!res.send(Some(json!({ "b": 2 }))));
        assert_eq!(res.body(), Some(&json!({ "a": 1 })));
    }

    #[test]
    fn headers_round_trip() {
        let mut res = ResponseSink::new();
        res.set_header(LOCATION, "/users/1");
        res.set_header(LOCATION, "/users/\n2");
        assert_eq!(res.header("location"), Some("/users/1"));
    }

    #[test]
    fn error_envelope_carries_code_and_details() {
        let err = AppError::Validation(vec![crate::error::FieldError::new("email", "must be a valid email")]);
        let body = error_body(&err);
        assert_eq!(body["error"]["code"], "validation_error");
        assert_eq!(body["error"]["details"][0]["field"], "email");
    }
}
