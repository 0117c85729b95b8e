//! Inbox: the write side of the protocol
//!
//! Accepts Follow, Announce (claim), Create+patch (submission),
//! Create+completion, and claim-refresh activities. Every accepted event
//! is appended to the ledger; claim conflict checks run inside the
//! ledger's append critical section. Follower fan-out and chat
//! notifications are detached and never affect the response.

use bytes::Bytes;
use chrono::Utc;
use http_body_util::Full;
use hyper::{HeaderMap, Response};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use tracing::{debug, info};

use super::{error_response, json_response};
use crate::activity::InboxActivity;
use crate::ledger::{Contributor, EntryCandidate, EntryKind};
use crate::server::AppState;
use crate::signing::{key_id_of, verify_signature};
use crate::submission::validate_files;
use crate::tasks::{claim_allowed, holds_active_claim, is_valid_task_id};
use crate::types::BoardError;

/// Handle POST /<actor>/inbox
pub async fn handle_inbox(
    state: &AppState,
    headers: &HeaderMap,
    body: Bytes,
) -> Response<Full<Bytes>> {
    // Authenticate federation traffic. Verification failures collapse to
    // a single boolean; the request is rejected only when the board is
    // configured to require signatures.
    let verified = verify_inbox_signature(state, headers, &body).await;
    if state.args.require_signatures && !verified {
        return error_response(BoardError::Unauthorized(
            "HTTP signature verification failed".to_string(),
        ));
    }

    let raw: Value = match serde_json::from_slice(&body) {
        Ok(value) => value,
        Err(e) => return error_response(e.into()),
    };
    let activity = match InboxActivity::parse(&raw) {
        Ok(activity) => activity,
        Err(e) => return error_response(e),
    };

    match activity {
        InboxActivity::Follow { actor } => handle_follow(state, actor, raw).await,
        InboxActivity::Claim {
            agent,
            task,
            contributor,
        } => handle_claim(state, agent, task, contributor, raw, false).await,
        InboxActivity::Refresh { agent, task } => {
            handle_claim(state, agent, task, None, raw, true).await
        }
        InboxActivity::Submission {
            agent,
            task,
            files,
            contributor,
        } => handle_submission(state, agent, task, files, contributor, raw).await,
        InboxActivity::Completion {
            agent,
            task,
            commit_hash,
            pr_url,
            contributor,
        } => handle_completion(state, agent, task, commit_hash, pr_url, contributor, raw).await,
        InboxActivity::Other { kind } => {
            debug!(kind = %kind, "Unhandled activity type acknowledged");
            json_response(&json!({ "status": "accepted" }))
        }
    }
}

/// Verify the request's HTTP signature against the claimed key.
async fn verify_inbox_signature(state: &AppState, headers: &HeaderMap, body: &[u8]) -> bool {
    let Some(key_id) = key_id_of(headers) else {
        return false;
    };
    let key = state.key_directory.resolve(&key_id).await;
    let inbox_path = format!("{}/inbox", state.base_path());
    verify_signature(headers, "POST", &inbox_path, body, |claimed| {
        key.filter(|_| claimed == key_id)
    })
}

/// Follow: register the follower and reply `Accept` asynchronously.
async fn handle_follow(state: &AppState, actor: String, raw: Value) -> Response<Full<Bytes>> {
    match state.followers.register(&actor).await {
        Ok(true) => state.notify(format!("new follower: {}", actor)),
        Ok(false) => debug!(follower = %actor, "Repeat follow"),
        Err(e) => return error_response(e),
    }

    let accept = json!({
        "@context": "https://www.w3.org/ns/activitystreams",
        "type": "Accept",
        "actor": state.args.actor_url(),
        "object": raw,
        "to": [actor.clone()],
    });
    crate::federation::spawn_deliver(
        state.http.clone(),
        std::sync::Arc::clone(&state.keys),
        actor,
        accept,
    );

    json_response(&json!({
        "status": "following",
        "outbox": state.args.outbox_url(),
    }))
}

/// Announce (claim) and claim-refresh. Both append a claim entry; the
/// admission rule differs: a claim needs the task open or held by the
/// same agent, a refresh needs an existing active claim by the agent.
async fn handle_claim(
    state: &AppState,
    agent: String,
    task: String,
    contributor: Option<Contributor>,
    raw: Value,
    refresh: bool,
) -> Response<Full<Bytes>> {
    if !is_valid_task_id(&task, &state.args.task_prefix) {
        return error_response(BoardError::BadRequest(format!(
            "invalid task identifier: {}",
            task
        )));
    }

    let ttl = state.args.claim_ttl();
    let now = Utc::now();

    let mut candidate = EntryCandidate::new(EntryKind::Claim, task.clone(), agent.clone());
    candidate.contributor = contributor;
    candidate.refresh = refresh;

    let check_task = task.clone();
    let check_agent = agent.clone();
    let result = state
        .ledger
        .append_checked(candidate, move |chain| {
            if refresh {
                if holds_active_claim(chain, &check_task, &check_agent, ttl, now) {
                    Ok(())
                } else {
                    Err(BoardError::Forbidden(format!(
                        "no active claim on {} by {} (missing or expired)",
                        check_task, check_agent
                    )))
                }
            } else {
                claim_allowed(chain, &check_task, &check_agent, ttl, now)
            }
        })
        .await;

    let entry = match result {
        Ok(entry) => entry,
        Err(e) => return error_response(e),
    };

    let expires_at = entry.timestamp + ttl;
    info!(task = %task, agent = %agent, refresh = refresh, "Claim recorded");
    state.notify(format!(
        "{} {} claimed by {} until {}",
        if refresh { "refresh:" } else { "claim:" },
        task,
        agent,
        expires_at
    ));
    state.fan_out(raw).await;

    json_response(&json!({
        "status": if refresh { "refreshed" } else { "claimed" },
        "ledger_entry": entry.id,
        "entry_hash": entry.entry_hash,
        "board:expiresAt": expires_at.to_rfc3339(),
    }))
}

/// Create+patch: run the submission guard, open the external PR, and
/// only then append the submission entry.
async fn handle_submission(
    state: &AppState,
    agent: String,
    task: String,
    files: BTreeMap<String, String>,
    contributor: Option<Contributor>,
    raw: Value,
) -> Response<Full<Bytes>> {
    if !is_valid_task_id(&task, &state.args.task_prefix) {
        return error_response(BoardError::BadRequest(format!(
            "invalid task identifier: {}",
            task
        )));
    }

    let ttl = state.args.claim_ttl();

    // Permission gate before any expensive work
    let chain = match state.ledger.load().await {
        Ok(chain) => chain,
        Err(e) => return error_response(e),
    };
    if !holds_active_claim(&chain, &task, &agent, ttl, Utc::now()) {
        return error_response(BoardError::Forbidden(format!(
            "no active claim on {} by {} (missing or expired)",
            task, agent
        )));
    }

    let normalized = match validate_files(&files) {
        Ok(normalized) => normalized,
        Err(e) => return error_response(e),
    };

    // The ledger records a submission only after the PR exists
    let pr = match state
        .pr_opener
        .open_pull_request(&task, &agent, &normalized)
        .await
    {
        Ok(pr) => pr,
        Err(e) => return error_response(e),
    };

    let mut candidate = EntryCandidate::new(EntryKind::Submission, task.clone(), agent.clone());
    candidate.contributor = contributor;
    candidate.pr_url = Some(pr.url.clone());

    let check_task = task.clone();
    let check_agent = agent.clone();
    let now = Utc::now();
    let result = state
        .ledger
        .append_checked(candidate, move |chain| {
            // The claim must still be active at append time
            if holds_active_claim(chain, &check_task, &check_agent, ttl, now) {
                Ok(())
            } else {
                Err(BoardError::Forbidden(format!(
                    "claim on {} lapsed before the submission was recorded",
                    check_task
                )))
            }
        })
        .await;

    let entry = match result {
        Ok(entry) => entry,
        Err(e) => return error_response(e),
    };

    info!(task = %task, agent = %agent, pr = %pr.url, "Submission recorded");
    state.notify(format!("submission: {} by {} -> {}", task, agent, pr.url));
    state.fan_out(raw).await;

    json_response(&json!({
        "status": "submitted",
        "ledger_entry": entry.id,
        "entry_hash": entry.entry_hash,
        "board:prUrl": pr.url,
    }))
}

/// Create+completion: completions are always recorded and terminal.
async fn handle_completion(
    state: &AppState,
    agent: String,
    task: String,
    commit_hash: Option<String>,
    pr_url: Option<String>,
    contributor: Option<Contributor>,
    raw: Value,
) -> Response<Full<Bytes>> {
    if !is_valid_task_id(&task, &state.args.task_prefix) {
        return error_response(BoardError::BadRequest(format!(
            "invalid task identifier: {}",
            task
        )));
    }

    let mut candidate = EntryCandidate::new(EntryKind::Completion, task.clone(), agent.clone());
    candidate.contributor = contributor;
    candidate.commit_hash = commit_hash;
    candidate.pr_url = pr_url;

    let entry = match state.ledger.append(candidate).await {
        Ok(entry) => entry,
        Err(e) => return error_response(e),
    };

    info!(task = %task, agent = %agent, "Completion recorded");
    state.notify(format!("completion: {} by {}", task, agent));
    state.fan_out(raw).await;

    json_response(&json!({
        "status": "recorded",
        "ledger_entry": entry.id,
        "entry_hash": entry.entry_hash,
    }))
}
