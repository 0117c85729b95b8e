//! GitHub webhook helpers
//!
//! Signature verification (HMAC-SHA256, constant-time compare) and
//! extraction of completion metadata from merged pull requests.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::tasks::is_valid_task_id;

type HmacSha256 = Hmac<Sha256>;

/// Verify an `X-Hub-Signature-256` header (`sha256=<hex>`) over the raw
/// request body. An empty secret or header never verifies.
pub fn verify_webhook_signature(secret: &str, body: &[u8], sig_header: &str) -> bool {
    if secret.is_empty() || sig_header.is_empty() {
        return false;
    }

    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    let expected = format!("sha256={}", hex::encode(mac.finalize().into_bytes()));

    expected.as_bytes().ct_eq(sig_header.as_bytes()).into()
}

/// Structured metadata from a PR body's footer lines
#[derive(Debug, Default, Clone, PartialEq)]
pub struct PrMeta {
    pub agent: Option<String>,
    pub task: Option<String>,
    pub verification: Option<String>,
}

/// Parse `Contribution-Agent:`, `Task:`, and `Verification:` footer lines.
pub fn parse_pr_meta(text: &str) -> PrMeta {
    let mut meta = PrMeta::default();
    for line in text.lines() {
        let line = line.trim();
        for (key, slot) in [
            ("Contribution-Agent:", &mut meta.agent),
            ("Task:", &mut meta.task),
            ("Verification:", &mut meta.verification),
        ] {
            if let Some(rest) = line.strip_prefix(key) {
                *slot = Some(rest.trim().to_string());
            }
        }
    }
    meta
}

/// Scan free text for the first `PREFIX-NNN` task identifier.
pub fn find_task_id(text: &str, prefix: &str) -> Option<String> {
    let bytes = text.as_bytes();
    let mut search_from = 0;

    while let Some(offset) = text[search_from..].find(prefix) {
        let start = search_from + offset;
        let after = start + prefix.len();
        search_from = after.max(start + 1);

        if after >= bytes.len() || bytes[after] != b'-' {
            continue;
        }
        let digits_start = after + 1;
        let digits_end = digits_start
            + text[digits_start..]
                .bytes()
                .take_while(|b| b.is_ascii_digit())
                .count();

        let candidate = &text[start..digits_end];
        if is_valid_task_id(candidate, prefix) {
            return Some(candidate.to_string());
        }
    }
    None
}
