//! WebFinger actor discovery

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};

use super::{json_error_response, AP_CONTENT_TYPE};
use crate::server::AppState;

/// Handle GET /.well-known/webfinger?resource=...
///
/// 404 when the resource does not reference this actor.
pub fn handle_webfinger(state: &AppState, query: &str) -> Response<Full<Bytes>> {
    let resource = query
        .split('&')
        .find_map(|pair| pair.strip_prefix("resource="))
        .unwrap_or("");

    if !resource.contains(&state.args.actor_name) {
        return json_error_response(StatusCode::NOT_FOUND, "unknown resource");
    }

    let body = serde_json::json!({
        "subject": format!("acct:{}@{}", state.args.actor_name, state.args.domain),
        "links": [{
            "rel": "self",
            "type": AP_CONTENT_TYPE,
            "href": state.args.actor_url(),
        }],
    });

    Response::builder()
        .status(StatusCode::OK)
        .header("Content-Type", "application/jrd+json")
        .body(Full::new(Bytes::from(body.to_string())))
        .unwrap()
}
