//! Outbox: open tasks as a subscribable activity collection

use bytes::Bytes;
use chrono::Utc;
use http_body_util::Full;
use hyper::Response;
use serde_json::{json, Value};

use super::{ap_response, error_response};
use crate::ledger::LedgerEntry;
use crate::server::AppState;
use crate::tasks::{derive_status, OpenTask, TaskStatus};

/// Handle GET /<actor>/outbox
///
/// Every open task is published as a `Create(Note)` activity annotated
/// with its derived status.
pub async fn handle_outbox(state: &AppState) -> Response<Full<Bytes>> {
    let chain = match state.ledger.load().await {
        Ok(chain) => chain,
        Err(e) => return error_response(e),
    };

    let tasks = state.feed.fetch_open_tasks().await;
    let items: Vec<Value> = tasks
        .iter()
        .map(|task| task_to_activity(state, task, &chain))
        .collect();

    let collection = json!({
        "@context": "https://www.w3.org/ns/activitystreams",
        "type": "OrderedCollection",
        "id": state.args.outbox_url(),
        "totalItems": items.len(),
        "orderedItems": items,
    });

    ap_response(&collection)
}

/// Build the `Create(Note)` activity for one open task
fn task_to_activity(state: &AppState, task: &OpenTask, chain: &[LedgerEntry]) -> Value {
    let actor_url = state.args.actor_url();
    let task_id = state.feed.task_id_for(task.number);
    let status = derive_status(chain, &task_id, state.args.claim_ttl(), Utc::now());

    let mut note = json!({
        "type": "Note",
        "id": format!("{}/tasks/{}", actor_url, task_id),
        "attributedTo": actor_url,
        "name": task.title,
        "content": task.body,
        "url": task.url,
        "board:taskId": task_id,
        "board:status": status.label(),
        "board:claimUrl": state.args.inbox_url(),
        "board:ledgerUrl": state.args.ledger_url(),
    });
    annotate_status(&mut note, &status);

    json!({
        "@context": "https://www.w3.org/ns/activitystreams",
        "type": "Create",
        "actor": actor_url,
        "published": Utc::now().to_rfc3339(),
        "object": note,
    })
}

/// Attach claim holder and expiry to a note when the task is held
pub fn annotate_status(note: &mut Value, status: &TaskStatus) {
    let Value::Object(map) = note else {
        return;
    };
    if let Some(agent) = status.active_agent() {
        map.insert("board:claimedBy".to_string(), json!(agent));
    }
    if let Some(expires_at) = status.expires_at() {
        map.insert("board:expiresAt".to_string(), json!(expires_at.to_rfc3339()));
    }
}
