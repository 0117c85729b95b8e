//! Actor document, follower collection, and contributor directory

use bytes::Bytes;
use http_body_util::Full;
use hyper::Response;
use serde_json::json;

use super::{ap_response, error_response, json_response};
use crate::ledger::contributor_directory;
use crate::server::AppState;

/// Handle GET /<actor>
///
/// The actor document: endpoint URLs, the public key block counterparts
/// verify signatures against, and board extension fields.
pub fn handle_actor(state: &AppState) -> Response<Full<Bytes>> {
    let actor_url = state.args.actor_url();

    let doc = json!({
        "@context": [
            "https://www.w3.org/ns/activitystreams",
            "https://w3id.org/security/v1",
        ],
        "type": "Service",
        "id": actor_url,
        "name": state.args.actor_name,
        "preferredUsername": state.args.actor_name,
        "summary": "Federated task feed with a hash-chained contribution ledger",
        "inbox": state.args.inbox_url(),
        "outbox": state.args.outbox_url(),
        "followers": state.args.followers_url(),
        "publicKey": {
            "id": state.args.key_id(),
            "owner": actor_url,
            "publicKeyBase64": state.keys.public_key_base64(),
        },
        "board:genesisSlots": state.args.genesis_slots,
        "board:ledger": state.args.ledger_url(),
    });

    ap_response(&doc)
}

/// Handle GET /<actor>/followers
pub async fn handle_followers(state: &AppState) -> Response<Full<Bytes>> {
    let followers = state.followers.list().await;

    let collection = json!({
        "@context": "https://www.w3.org/ns/activitystreams",
        "type": "OrderedCollection",
        "id": state.args.followers_url(),
        "totalItems": followers.len(),
        "orderedItems": followers,
    });

    ap_response(&collection)
}

/// Handle GET /<actor>/contributors
///
/// Named contributors grouped from ledger attributions, genesis slots
/// flagged in discovery order.
pub async fn handle_contributors(state: &AppState) -> Response<Full<Bytes>> {
    let chain = match state.ledger.load().await {
        Ok(chain) => chain,
        Err(e) => return error_response(e),
    };
    let directory = contributor_directory(&chain, state.args.genesis_slots);

    json_response(&json!({
        "contributors": directory,
        "total": directory.len(),
        "genesis_slots": state.args.genesis_slots,
    }))
}
