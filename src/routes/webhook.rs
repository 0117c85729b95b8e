//! GitHub webhook intake
//!
//! Merged pull requests become completion entries. The payload is
//! trusted only after its HMAC signature verifies.

use bytes::Bytes;
use http_body_util::Full;
use hyper::{HeaderMap, Response};
use serde_json::{json, Value};
use tracing::info;

use super::{error_response, json_response};
use crate::github::{find_task_id, parse_pr_meta, verify_webhook_signature};
use crate::ledger::{EntryCandidate, EntryKind};
use crate::server::AppState;
use crate::tasks::is_valid_task_id;
use crate::types::BoardError;

/// Handle POST /<actor>/github-webhook
pub async fn handle_github_webhook(
    state: &AppState,
    headers: &HeaderMap,
    body: Bytes,
) -> Response<Full<Bytes>> {
    let secret = state.args.webhook_secret.as_deref().unwrap_or("");
    let sig_header = headers
        .get("x-hub-signature-256")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    if !verify_webhook_signature(secret, &body, sig_header) {
        return error_response(BoardError::Unauthorized(
            "invalid webhook signature".to_string(),
        ));
    }

    let event = headers
        .get("x-github-event")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    let payload: Value = match serde_json::from_slice(&body) {
        Ok(value) => value,
        Err(e) => return error_response(e.into()),
    };

    if event != "pull_request" {
        return json_response(&json!({ "status": "ignored", "event": event }));
    }

    let pr = payload.get("pull_request").cloned().unwrap_or(Value::Null);
    let merged = pr.get("merged").and_then(|v| v.as_bool()).unwrap_or(false);
    if payload.get("action").and_then(|v| v.as_str()) != Some("closed") || !merged {
        return json_response(&json!({ "status": "ignored", "reason": "not a merge" }));
    }

    let pr_body = pr.get("body").and_then(|v| v.as_str()).unwrap_or("");
    let pr_title = pr.get("title").and_then(|v| v.as_str()).unwrap_or("");
    let pr_url = pr.get("html_url").and_then(|v| v.as_str()).unwrap_or("");
    let author = pr
        .pointer("/user/login")
        .and_then(|v| v.as_str())
        .unwrap_or("unknown");
    let commit_sha = pr
        .get("merge_commit_sha")
        .and_then(|v| v.as_str())
        .unwrap_or("");

    // Structured footers first, then a pattern scan of title + body
    let meta = parse_pr_meta(pr_body);
    let agent = meta.agent.unwrap_or_else(|| author.to_string());
    let task = meta
        .task
        .filter(|candidate| is_valid_task_id(candidate, &state.args.task_prefix))
        .or_else(|| {
            find_task_id(
                &format!("{} {}", pr_title, pr_body),
                &state.args.task_prefix,
            )
        });
    let Some(task) = task else {
        return json_response(&json!({ "status": "ignored", "reason": "no task identifier" }));
    };

    let mut candidate = EntryCandidate::new(EntryKind::Completion, task.clone(), agent.clone());
    candidate.contributor_github = Some(author.to_string());
    candidate.commit_hash = (!commit_sha.is_empty()).then(|| commit_sha.to_string());
    candidate.pr_url = (!pr_url.is_empty()).then(|| pr_url.to_string());
    candidate.pr_title = (!pr_title.is_empty()).then(|| pr_title.to_string());
    candidate.verification = meta.verification;

    let entry = match state.ledger.append(candidate).await {
        Ok(entry) => entry,
        Err(e) => return error_response(e),
    };

    info!(task = %task, agent = %agent, pr = %pr_url, "Webhook completion recorded");
    state.notify(format!("merged: {} by {} ({})", task, agent, pr_url));
    state
        .fan_out(json!({
            "@context": "https://www.w3.org/ns/activitystreams",
            "type": "Create",
            "actor": state.args.actor_url(),
            "board:type": "completion",
            "board:taskId": task,
            "board:prUrl": pr_url,
        }))
        .await;

    json_response(&json!({
        "status": "recorded",
        "ledger_entry": entry.id,
        "entry_hash": entry.entry_hash,
        "task": task,
        "agent": agent,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::testing::{body_json, test_state};
    use crate::server::AppState;
    use clap::Parser;
    use hmac::Mac;
    use std::sync::Arc;

    const SECRET: &str = "webhook-secret";

    async fn secret_state() -> (tempfile::TempDir, Arc<AppState>) {
        let dir = tempfile::tempdir().unwrap();
        let args = crate::config::Args::parse_from([
            "taskboard",
            "--domain",
            "board.example.org",
            "--data-dir",
            dir.path().to_str().unwrap(),
            "--webhook-secret",
            SECRET,
        ]);
        let state = AppState::new(args).await.unwrap();
        (dir, Arc::new(state))
    }

    fn signed_headers(body: &[u8], event: &str) -> HeaderMap {
        let mut mac = hmac::Hmac::<sha2::Sha256>::new_from_slice(SECRET.as_bytes()).unwrap();
        mac.update(body);
        let signature = format!("sha256={}", hex::encode(mac.finalize().into_bytes()));

        let mut headers = HeaderMap::new();
        headers.insert("x-hub-signature-256", signature.parse().unwrap());
        headers.insert("x-github-event", event.parse().unwrap());
        headers
    }

    fn merged_pr_payload(body_text: &str, title: &str) -> Value {
        json!({
            "action": "closed",
            "pull_request": {
                "merged": true,
                "body": body_text,
                "title": title,
                "html_url": "https://github.com/owner/name/pull/7",
                "user": {"login": "octocat"},
                "merge_commit_sha": "deadbeef",
            },
        })
    }

    #[tokio::test]
    async fn test_bad_signature_is_401_before_parsing() {
        let (_dir, state) = secret_state().await;
        let mut headers = HeaderMap::new();
        headers.insert("x-hub-signature-256", "sha256=bogus".parse().unwrap());
        headers.insert("x-github-event", "pull_request".parse().unwrap());

        let response =
            handle_github_webhook(&state, &headers, Bytes::from_static(b"not json")).await;
        assert_eq!(response.status(), 401);
        assert!(state.ledger.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_secret_rejects_everything() {
        let (_dir, state) = test_state().await;
        let body = merged_pr_payload("Task: TASK-001", "t").to_string();
        let headers = signed_headers(body.as_bytes(), "pull_request");

        let response = handle_github_webhook(&state, &headers, Bytes::from(body)).await;
        assert_eq!(response.status(), 401);
    }

    #[tokio::test]
    async fn test_non_pr_event_is_ignored() {
        let (_dir, state) = secret_state().await;
        let body = json!({"zen": "Design for failure."}).to_string();
        let headers = signed_headers(body.as_bytes(), "ping");

        let response = handle_github_webhook(&state, &headers, Bytes::from(body)).await;
        assert_eq!(response.status(), 200);
        assert_eq!(body_json(response).await["status"], "ignored");
        assert!(state.ledger.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unmerged_close_is_ignored() {
        let (_dir, state) = secret_state().await;
        let mut payload = merged_pr_payload("Task: TASK-001", "t");
        payload["pull_request"]["merged"] = json!(false);
        let body = payload.to_string();
        let headers = signed_headers(body.as_bytes(), "pull_request");

        let response = handle_github_webhook(&state, &headers, Bytes::from(body)).await;
        assert_eq!(body_json(response).await["reason"], "not a merge");
        assert!(state.ledger.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_merged_pr_with_footers_records_completion() {
        let (_dir, state) = secret_state().await;
        let body = merged_pr_payload(
            "Done.\n\nContribution-Agent: agent-a\nTask: TASK-003\nVerification: cargo test",
            "fix things",
        )
        .to_string();
        let headers = signed_headers(body.as_bytes(), "pull_request");

        let response = handle_github_webhook(&state, &headers, Bytes::from(body)).await;
        assert_eq!(response.status(), 200);
        let json = body_json(response).await;
        assert_eq!(json["status"], "recorded");
        assert_eq!(json["task"], "TASK-003");
        assert_eq!(json["agent"], "agent-a");

        let chain = state.ledger.load().await.unwrap();
        assert_eq!(chain.len(), 1);
        assert_eq!(chain[0].kind, EntryKind::Completion);
        assert_eq!(chain[0].contributor_github.as_deref(), Some("octocat"));
        assert_eq!(chain[0].commit_hash.as_deref(), Some("deadbeef"));
        assert_eq!(chain[0].verification.as_deref(), Some("cargo test"));
    }

    #[tokio::test]
    async fn test_merged_pr_falls_back_to_title_scan() {
        let (_dir, state) = secret_state().await;
        let body = merged_pr_payload("no footers here", "Implement TASK-011 parser").to_string();
        let headers = signed_headers(body.as_bytes(), "pull_request");

        let response = handle_github_webhook(&state, &headers, Bytes::from(body)).await;
        let json = body_json(response).await;
        assert_eq!(json["task"], "TASK-011");
        // No footer agent: attributed to the PR author
        assert_eq!(json["agent"], "octocat");
    }

    #[tokio::test]
    async fn test_merged_pr_without_task_id_is_ignored() {
        let (_dir, state) = secret_state().await;
        let body = merged_pr_payload("nothing to see", "general cleanup").to_string();
        let headers = signed_headers(body.as_bytes(), "pull_request");

        let response = handle_github_webhook(&state, &headers, Bytes::from(body)).await;
        assert_eq!(body_json(response).await["reason"], "no task identifier");
        assert!(state.ledger.load().await.unwrap().is_empty());
    }
}
