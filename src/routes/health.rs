//! Health and version endpoints

use bytes::Bytes;
use http_body_util::Full;
use hyper::Response;
use serde::Serialize;

use super::json_response;
use crate::server::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub domain: String,
    pub node_id: String,
    pub ledger_entries: usize,
    pub followers: usize,
}

/// Handle GET /health
pub async fn health_check(state: &AppState) -> Response<Full<Bytes>> {
    let ledger_entries = state.ledger.load().await.map(|c| c.len()).unwrap_or(0);
    let followers = state.followers.list().await.len();

    json_response(&HealthResponse {
        status: "ok",
        domain: state.args.domain.clone(),
        node_id: state.args.node_id.to_string(),
        ledger_entries,
        followers,
    })
}

#[derive(Serialize)]
pub struct VersionResponse {
    pub name: &'static str,
    pub version: &'static str,
}

/// Handle GET /version
pub fn version_info() -> Response<Full<Bytes>> {
    json_response(&VersionResponse {
        name: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::testing::{body_json, test_state};

    #[tokio::test]
    async fn test_health_reports_counts() {
        let (_dir, state) = test_state().await;
        let response = health_check(&state).await;
        assert_eq!(response.status(), 200);

        let json = body_json(response).await;
        assert_eq!(json["status"], "ok");
        assert_eq!(json["ledger_entries"], 0);
    }

    #[tokio::test]
    async fn test_version_reports_package() {
        let json = body_json(version_info()).await;
        assert_eq!(json["name"], "taskboard");
    }
}
