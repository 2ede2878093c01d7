use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use std::sync::Arc;

use super::{AdmissionResult, AdmissionReview, AdmissionValidator};

/// `GET /status` and `POST /validate`.
pub fn router(validator: Arc<AdmissionValidator>) -> Router {
    Router::new()
        .route("/status", get(status))
        .route("/validate", post(validate))
        .with_state(validator)
}

async fn status() -> &'static str {
    "OK"
}

async fn validate(
    State(validator): State<Arc<AdmissionValidator>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if !content_type.starts_with("application/json") {
        log::warn!("admission request with content type {:?}", content_type);
        return (
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            "invalid Content-Type, expect `application/json`",
        )
            .into_response();
    }

    let review = match serde_json::from_slice::<AdmissionReview>(&body) {
        Ok(review) => validator.review(review),
        Err(e) => {
            log::warn!("could not decode admission review: {}", e);
            let result = AdmissionResult::reject(e.to_string(), Vec::new());
            AdmissionReview::respond(result.into_response(""))
        }
    };

    Json(review).into_response()
}
