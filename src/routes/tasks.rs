//! Single-task status endpoint

use bytes::Bytes;
use chrono::Utc;
use http_body_util::Full;
use hyper::Response;
use serde_json::json;

use super::outbox::annotate_status;
use super::{error_response, json_response};
use crate::server::AppState;
use crate::tasks::{derive_status, is_valid_task_id};
use crate::types::BoardError;

/// Handle GET /<actor>/tasks/{id}
///
/// 400 when the id fails the fixed identifier pattern.
pub async fn handle_task(state: &AppState, task_id: &str) -> Response<Full<Bytes>> {
    if !is_valid_task_id(task_id, &state.args.task_prefix) {
        return error_response(BoardError::BadRequest(format!(
            "invalid task identifier: {}",
            task_id
        )));
    }

    let chain = match state.ledger.load().await {
        Ok(chain) => chain,
        Err(e) => return error_response(e),
    };
    let status = derive_status(&chain, task_id, state.args.claim_ttl(), Utc::now());

    let mut body = json!({
        "board:taskId": task_id,
        "board:status": status.label(),
    });
    annotate_status(&mut body, &status);

    json_response(&body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{EntryCandidate, EntryKind};
    use crate::routes::testing::{body_json, test_state};

    #[tokio::test]
    async fn test_unknown_task_is_open() {
        let (_dir, state) = test_state().await;
        let response = handle_task(&state, "TASK-001").await;
        assert_eq!(response.status(), 200);

        let json = body_json(response).await;
        assert_eq!(json["board:taskId"], "TASK-001");
        assert_eq!(json["board:status"], "open");
        assert!(json.get("board:claimedBy").is_none());
    }

    #[tokio::test]
    async fn test_claimed_task_shows_agent_and_expiry() {
        let (_dir, state) = test_state().await;
        state
            .ledger
            .append(EntryCandidate::new(EntryKind::Claim, "TASK-001", "bot-x"))
            .await
            .unwrap();

        let json = body_json(handle_task(&state, "TASK-001").await).await;
        assert_eq!(json["board:status"], "claimed");
        assert_eq!(json["board:claimedBy"], "bot-x");
        assert!(json["board:expiresAt"].is_string());
    }

    #[tokio::test]
    async fn test_invalid_task_id_is_400() {
        let (_dir, state) = test_state().await;
        let response = handle_task(&state, "INVALID").await;
        assert_eq!(response.status(), 400);
    }
}
