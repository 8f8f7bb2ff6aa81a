//! Per-request panic containment.
//!
//! A panicking handler must cost exactly one request, not the process. The
//! recovery layer catches the unwind, logs the payload server-side, and
//! replies with a sanitized 500 in the standard error body shape. The
//! response never carries internals in production; outside production the
//! panic detail rides along in the `stack` field to speed up local
//! debugging, mirroring how the error body behaves for other 500s.
//!
//! Attached close to the routes so the outer layers (correlation id, trace,
//! CORS) still decorate the recovery response.

use std::any::Any;

use axum::body::Body;
use axum::http::{Response, StatusCode};
use axum::response::IntoResponse;
use tower_http::catch_panic::{CatchPanicLayer, ResponseForPanic};
use tracing::error;

use crate::error::ErrorBody;

/// Build the recovery layer. `include_stack` leaks the panic detail into the
/// response body and must stay off in production.
pub fn catch_panic_layer(include_stack: bool) -> CatchPanicLayer<PanicResponder> {
    CatchPanicLayer::custom(PanicResponder { include_stack })
}

/// Turns a caught panic payload into the sanitized 500 response.
#[derive(Clone, Copy)]
pub struct PanicResponder {
    include_stack: bool,
}

impl ResponseForPanic for PanicResponder {
    type ResponseBody = Body;

    fn response_for_panic(&mut self, err: Box<dyn Any + Send + 'static>) -> Response<Body> {
        let detail = panic_message(err.as_ref());

        error!(panic = %detail, "Handler panicked, replying with sanitized 500");

        let body = ErrorBody {
            message: "Internal server error".to_string(),
            stack: self.include_stack.then_some(detail),
        };

        (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(body)).into_response()
    }
}

/// Panics carry `String` or `&str` payloads in practice; anything else is
/// reported by type only.
fn panic_message(err: &(dyn Any + Send)) -> String {
    if let Some(message) = err.downcast_ref::<String>() {
        message.clone()
    } else if let Some(message) = err.downcast_ref::<&str>() {
        (*message).to_string()
    } else {
        "panic payload of unknown type".to_string()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    async fn body_json(response: Response<Body>) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_panic_response_is_sanitized_500() {
        let mut responder = PanicResponder {
            include_stack: false,
        };

        let response = responder.response_for_panic(Box::new("database handle poisoned".to_string()));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let json = body_json(response).await;
        assert_eq!(json["message"], "Internal server error");
        // The payload never reaches the client in production mode
        assert!(json.get("stack").is_none());
    }

    #[tokio::test]
    async fn test_panic_detail_included_outside_production() {
        let mut responder = PanicResponder {
            include_stack: true,
        };

        let response = responder.response_for_panic(Box::new("index out of bounds"));
        let json = body_json(response).await;

        assert_eq!(json["message"], "Internal server error");
        assert_eq!(json["stack"], "index out of bounds");
    }

    #[test]
    fn test_unknown_payload_type_is_reported_generically() {
        let payload: Box<dyn Any + Send> = Box::new(42_u64);
        assert_eq!(panic_message(payload.as_ref()), "panic payload of unknown type");
    }
}
