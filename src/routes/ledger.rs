//! Ledger endpoints

use bytes::Bytes;
use http_body_util::Full;
use hyper::Response;
use serde_json::json;

use super::{error_response, json_response};
use crate::ledger::{verify_chain, EntryKind};
use crate::server::AppState;

/// Handle GET /<actor>/ledger
///
/// Full entry sequence plus chain validity and remaining genesis
/// completion slots.
pub async fn handle_ledger(state: &AppState) -> Response<Full<Bytes>> {
    let chain = match state.ledger.load().await {
        Ok(chain) => chain,
        Err(e) => return error_response(e),
    };
    let valid = verify_chain(&chain);

    let completions = chain
        .iter()
        .filter(|entry| entry.kind == EntryKind::Completion)
        .count();
    let slots_remaining = state.args.genesis_slots.saturating_sub(completions);

    json_response(&json!({
        "board:ledger": state.args.ledger_url(),
        "board:valid": valid,
        "board:entries": chain.len(),
        "board:genesisSlots": state.args.genesis_slots,
        "board:slotsRemaining": slots_remaining,
        "chain": chain,
    }))
}

/// Handle GET /<actor>/ledger/verify
pub async fn handle_ledger_verify(state: &AppState) -> Response<Full<Bytes>> {
    let chain = match state.ledger.load().await {
        Ok(chain) => chain,
        Err(e) => return error_response(e),
    };

    json_response(&json!({
        "valid": verify_chain(&chain),
        "entries": chain.len(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::EntryCandidate;
    use crate::routes::testing::{body_json, test_state};

    #[tokio::test]
    async fn test_empty_ledger_is_valid() {
        let (_dir, state) = test_state().await;

        let json = body_json(handle_ledger(&state).await).await;
        assert_eq!(json["board:valid"], true);
        assert_eq!(json["board:entries"], 0);
        assert_eq!(json["board:slotsRemaining"], 50);

        let json = body_json(handle_ledger_verify(&state).await).await;
        assert_eq!(json["valid"], true);
        assert_eq!(json["entries"], 0);
    }

    #[tokio::test]
    async fn test_completions_consume_slots() {
        let (_dir, state) = test_state().await;
        state
            .ledger
            .append(EntryCandidate::new(EntryKind::Claim, "TASK-001", "agent-a"))
            .await
            .unwrap();
        state
            .ledger
            .append(EntryCandidate::new(
                EntryKind::Completion,
                "TASK-001",
                "agent-a",
            ))
            .await
            .unwrap();

        let json = body_json(handle_ledger(&state).await).await;
        assert_eq!(json["board:entries"], 2);
        assert_eq!(json["board:slotsRemaining"], 49);
        assert_eq!(json["chain"][0]["type"], "claim");
        assert_eq!(json["chain"][1]["type"], "completion");
    }
}
