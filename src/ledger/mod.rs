//! Append-only hash-chained contribution ledger
//!
//! Every accepted claim, submission, and completion event becomes one
//! immutable entry. Each entry stores the SHA-256 digest of its predecessor
//! and its own digest over a canonical serialization, making retroactive
//! edits computationally evident.

pub mod contributors;
pub mod store;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fmt;

use crate::types::{BoardError, Result};

pub use contributors::{contributor_directory, ContributorRecord};
pub use store::Ledger;

/// `prev_hash` of the first entry in a chain
pub const ZERO_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// Maximum length of a contributor display name or handle
pub const MAX_ATTRIBUTION_LEN: usize = 200;

/// Event kind recorded by a ledger entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Claim,
    Submission,
    Completion,
}

impl Default for EntryKind {
    fn default() -> Self {
        Self::Claim
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Claim => write!(f, "claim"),
            Self::Submission => write!(f, "submission"),
            Self::Completion => write!(f, "completion"),
        }
    }
}

/// Free-form display attribution carried by claim/completion entries.
/// Never required, never unique-constrained.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contributor {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handle: Option<String>,
}

impl Contributor {
    /// Grouping key for the contributor directory: handle, else name
    pub fn key(&self) -> Option<&str> {
        self.handle.as_deref().or(self.name.as_deref())
    }

    /// Reject attributions exceeding the display-field length limit
    pub fn validate(&self) -> Result<()> {
        for (label, field) in [("name", &self.name), ("handle", &self.handle)] {
            if let Some(value) = field {
                if value.len() > MAX_ATTRIBUTION_LEN {
                    return Err(BoardError::BadRequest(format!(
                        "contributor {} exceeds {} characters",
                        label, MAX_ATTRIBUTION_LEN
                    )));
                }
            }
        }
        Ok(())
    }
}

/// One immutable, hash-linked ledger record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// 1-based dense sequence number
    pub id: u64,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    /// Task identifier, PREFIX-NNN
    pub task: String,
    /// Identity of the acting agent
    pub contributor_agent: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contributor: Option<Contributor>,
    /// GitHub login of the PR author, recorded by webhook completions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contributor_github: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pr_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pr_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification: Option<String>,
    /// Set on claim entries appended by a claim-refresh activity
    #[serde(default, skip_serializing_if = "is_false")]
    pub refresh: bool,
    pub timestamp: DateTime<Utc>,
    /// `entry_hash` of the previous entry, or [`ZERO_HASH`] for the first
    pub prev_hash: String,
    /// SHA-256 over the canonical form of every other field
    pub entry_hash: String,
}

fn is_false(b: &bool) -> bool {
    !*b
}

/// Partial entry supplied to the append operation; the store fills
/// `id`, `timestamp`, `prev_hash`, and `entry_hash`.
#[derive(Debug, Clone, Default)]
pub struct EntryCandidate {
    pub kind: EntryKind,
    pub task: String,
    pub contributor_agent: String,
    pub contributor: Option<Contributor>,
    pub contributor_github: Option<String>,
    pub commit_hash: Option<String>,
    pub pr_url: Option<String>,
    pub pr_title: Option<String>,
    pub verification: Option<String>,
    pub refresh: bool,
}

impl EntryCandidate {
    pub fn new(kind: EntryKind, task: impl Into<String>, agent: impl Into<String>) -> Self {
        Self {
            kind,
            task: task.into(),
            contributor_agent: agent.into(),
            ..Self::default()
        }
    }
}

/// Compute the canonical digest of an entry: SHA-256 over the entry's JSON
/// form with `entry_hash` removed and all object keys in lexicographic
/// order, so the digest is reproducible on both ends of a federation link.
pub fn canonical_digest(entry: &LedgerEntry) -> Result<String> {
    let mut value = serde_json::to_value(entry)
        .map_err(|e| BoardError::Internal(format!("entry serialization failed: {}", e)))?;
    if let Value::Object(map) = &mut value {
        map.remove("entry_hash");
    }
    let canonical = canonical_json(&value);
    Ok(hex::encode(Sha256::digest(canonical.as_bytes())))
}

/// Serialize a JSON value with object keys sorted at every level.
/// Explicit sorting keeps the output stable regardless of the map
/// implementation behind `serde_json::Map`.
fn canonical_json(value: &Value) -> String {
    fn sort(value: &Value) -> Value {
        match value {
            Value::Object(map) => {
                let mut keys: Vec<&String> = map.keys().collect();
                keys.sort();
                let mut sorted = serde_json::Map::new();
                for key in keys {
                    sorted.insert(key.clone(), sort(&map[key]));
                }
                Value::Object(sorted)
            }
            Value::Array(items) => Value::Array(items.iter().map(sort).collect()),
            other => other.clone(),
        }
    }
    sort(value).to_string()
}

/// Recompute every link and digest of a chain. The empty chain is valid.
pub fn verify_chain(entries: &[LedgerEntry]) -> bool {
    let mut prev_hash = ZERO_HASH;
    for entry in entries {
        if entry.prev_hash != prev_hash {
            return false;
        }
        match canonical_digest(entry) {
            Ok(expected) if expected == entry.entry_hash => {}
            _ => return false,
        }
        prev_hash = &entry.entry_hash;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) fn make_entry(
        id: u64,
        kind: EntryKind,
        task: &str,
        agent: &str,
        prev_hash: &str,
    ) -> LedgerEntry {
        let mut entry = LedgerEntry {
            id,
            kind,
            task: task.to_string(),
            contributor_agent: agent.to_string(),
            contributor: None,
            contributor_github: None,
            commit_hash: None,
            pr_url: None,
            pr_title: None,
            verification: None,
            refresh: false,
            timestamp: Utc::now(),
            prev_hash: prev_hash.to_string(),
            entry_hash: String::new(),
        };
        entry.entry_hash = canonical_digest(&entry).unwrap();
        entry
    }

    #[test]
    fn test_empty_chain_is_valid() {
        assert!(verify_chain(&[]));
    }

    #[test]
    fn test_linked_chain_verifies() {
        let first = make_entry(1, EntryKind::Claim, "TASK-001", "agent-a", ZERO_HASH);
        let second = make_entry(2, EntryKind::Completion, "TASK-001", "agent-a", &first.entry_hash);
        assert!(verify_chain(&[first, second]));
    }

    #[test]
    fn test_mutated_field_breaks_chain() {
        let first = make_entry(1, EntryKind::Claim, "TASK-001", "agent-a", ZERO_HASH);
        let mut second = make_entry(2, EntryKind::Claim, "TASK-002", "agent-b", &first.entry_hash);
        second.contributor_agent = "agent-c".to_string();
        assert!(!verify_chain(&[first, second]));
    }

    #[test]
    fn test_reordered_entries_break_chain() {
        let first = make_entry(1, EntryKind::Claim, "TASK-001", "agent-a", ZERO_HASH);
        let second = make_entry(2, EntryKind::Claim, "TASK-002", "agent-b", &first.entry_hash);
        assert!(!verify_chain(&[second, first]));
    }

    #[test]
    fn test_digest_ignores_entry_hash_field() {
        let mut entry = make_entry(1, EntryKind::Claim, "TASK-001", "agent-a", ZERO_HASH);
        let digest = canonical_digest(&entry).unwrap();
        entry.entry_hash = "tampered".to_string();
        assert_eq!(canonical_digest(&entry).unwrap(), digest);
    }

    #[test]
    fn test_canonical_json_sorts_keys() {
        let value: Value = serde_json::from_str(r#"{"b":1,"a":{"z":2,"y":3}}"#).unwrap();
        assert_eq!(canonical_json(&value), r#"{"a":{"y":3,"z":2},"b":1}"#);
    }

    #[test]
    fn test_contributor_key_prefers_handle() {
        let contributor = Contributor {
            name: Some("Ada".to_string()),
            handle: Some("@ada".to_string()),
        };
        assert_eq!(contributor.key(), Some("@ada"));

        let unnamed = Contributor::default();
        assert_eq!(unnamed.key(), None);
    }

    #[test]
    fn test_contributor_length_limit() {
        let contributor = Contributor {
            name: Some("x".repeat(MAX_ATTRIBUTION_LEN + 1)),
            handle: None,
        };
        assert!(contributor.validate().is_err());
    }

    #[test]
    fn test_entry_kind_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&EntryKind::Completion).unwrap(),
            "\"completion\""
        );
        assert_eq!(EntryKind::Submission.to_string(), "submission");
    }
}
