use anyhow::Error as AnyError;
use serde_json::json;
use thiserror::Error;

use crate::body::Body;
use crate::http::{header::CONTENT_TYPE, HeaderValue, Response, StatusCode};

/// Error returned by service-style handlers. Each variant maps onto an HTTP
/// status so it can be rendered as a response instead of failing the
/// invocation.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("{message}")]
    BadRequest { message: String },
    #[error("not found: {path}")]
    NotFound { path: String },
    #[error("upstream unavailable: {message}")]
    Unavailable { message: String },
    #[error("internal error: {source}")]
    Internal {
        #[from]
        source: AnyError,
    },
}

impl HandlerError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        HandlerError::BadRequest {
            message: message.into(),
        }
    }

    pub fn not_found(path: impl Into<String>) -> Self {
        HandlerError::NotFound { path: path.into() }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        HandlerError::Unavailable {
            message: message.into(),
        }
    }

    pub fn internal<E>(error: E) -> Self
    where
        E: Into<AnyError>,
    {
        HandlerError::Internal {
            source: error.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            HandlerError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            HandlerError::NotFound { .. } => StatusCode::NOT_FOUND,
            HandlerError::Unavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            HandlerError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn message(&self) -> String {
        match self {
            HandlerError::BadRequest { message } => message.clone(),
            other => other.to_string(),
        }
    }

    /// Render the error as a JSON response carrying its status.
    pub fn into_response(self) -> Response {
        let status = self.status();
        let payload = json!({
            "error": {
                "status": status.as_u16(),
                "message": self.message(),
            }
        });

        let body = Body::json(&payload).unwrap_or_else(|_| Body::text("internal error"));
        let mut response = Response::new(body);
        *response.status_mut() = status;
        response
            .headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bad_request_sets_status_and_message() {
        let err = HandlerError::bad_request("oops");
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.message(), "oops");
    }

    #[test]
    fn internal_wraps_source_error() {
        let err = HandlerError::internal(anyhow::anyhow!("boom"));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.message().contains("internal error: boom"));
    }

    #[test]
    fn unavailable_maps_to_503() {
        let err = HandlerError::unavailable("renderer offline");
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(err.message().contains("renderer offline"));
    }

    #[test]
    fn into_response_sets_json_payload() {
        let response = HandlerError::not_found("/missing").into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            response.headers().get(CONTENT_TYPE),
            Some(&HeaderValue::from_static("application/json"))
        );

        let body = response.body().as_bytes().expect("buffered body");
        let payload: serde_json::Value = serde_json::from_slice(body).expect("json");
        assert_eq!(payload["error"]["status"], 404);
        assert_eq!(payload["error"]["message"], "not found: /missing");
    }
}
