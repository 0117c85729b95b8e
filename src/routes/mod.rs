//! HTTP routes for the task board

pub mod actor;
pub mod health;
pub mod inbox;
pub mod ledger;
pub mod outbox;
pub mod tasks;
pub mod webfinger;
pub mod webhook;

pub use actor::{handle_actor, handle_contributors, handle_followers};
pub use health::{health_check, version_info};
pub use inbox::handle_inbox;
pub use ledger::{handle_ledger, handle_ledger_verify};
pub use outbox::handle_outbox;
pub use tasks::handle_task;
pub use webfinger::handle_webfinger;
pub use webhook::handle_github_webhook;

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use serde::Serialize;

use crate::types::BoardError;

/// ActivityPub media type
pub const AP_CONTENT_TYPE: &str = "application/activity+json";

/// Serialize to a plain JSON response
pub fn json_response<T: Serialize>(data: &T) -> Response<Full<Bytes>> {
    json_response_with(StatusCode::OK, "application/json", data)
}

/// Serialize to an ActivityPub response
pub fn ap_response<T: Serialize>(data: &T) -> Response<Full<Bytes>> {
    json_response_with(StatusCode::OK, AP_CONTENT_TYPE, data)
}

fn json_response_with<T: Serialize>(
    status: StatusCode,
    content_type: &str,
    data: &T,
) -> Response<Full<Bytes>> {
    match serde_json::to_string_pretty(data) {
        Ok(json) => Response::builder()
            .status(status)
            .header("Content-Type", content_type)
            .body(Full::new(Bytes::from(json)))
            .unwrap(),
        Err(e) => json_error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            &format!("Serialization failed: {e}"),
        ),
    }
}

/// JSON error body with an explicit status
pub fn json_error_response(status: StatusCode, message: &str) -> Response<Full<Bytes>> {
    let body = serde_json::json!({ "error": message });
    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .body(Full::new(Bytes::from(body.to_string())))
        .unwrap()
}

/// Map a board error to its HTTP response
pub fn error_response(err: BoardError) -> Response<Full<Bytes>> {
    let (status, message) = err.into_status_code_and_body();
    json_error_response(status, &message)
}

pub fn not_found_response(path: &str) -> Response<Full<Bytes>> {
    json_error_response(StatusCode::NOT_FOUND, &format!("Not found: {path}"))
}

/// CORS preflight response
pub fn preflight_response() -> Response<Full<Bytes>> {
    Response::builder()
        .status(StatusCode::NO_CONTENT)
        .header("Access-Control-Allow-Origin", "*")
        .header("Access-Control-Allow-Methods", "GET, POST, OPTIONS")
        .header("Access-Control-Allow-Headers", "Content-Type, Signature, Digest, Date")
        .body(Full::new(Bytes::new()))
        .unwrap()
}
