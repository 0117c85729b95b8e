//! Typed inbox activities
//!
//! Inbound federation payloads are arbitrary JSON with a type tag. They
//! are converted to this tagged union at the protocol boundary; unknown
//! shapes are rejected there, and only required fields travel further in.

use serde_json::Value;
use std::collections::BTreeMap;

use crate::ledger::Contributor;
use crate::types::{BoardError, Result};

/// Extension vocabulary prefix used in activity payloads
pub const NS: &str = "board";

/// The activity kinds the inbox understands
#[derive(Debug, Clone, PartialEq)]
pub enum InboxActivity {
    /// Subscription request from a remote actor
    Follow { actor: String },
    /// Claim on a task (`Announce`)
    Claim {
        agent: String,
        task: String,
        contributor: Option<Contributor>,
    },
    /// Code submission (`Create` with a patch marker)
    Submission {
        agent: String,
        task: String,
        files: BTreeMap<String, String>,
        contributor: Option<Contributor>,
    },
    /// Completion report (`Create` with a completion marker)
    Completion {
        agent: String,
        task: String,
        commit_hash: Option<String>,
        pr_url: Option<String>,
        contributor: Option<Contributor>,
    },
    /// Extension of the sender's own active claim
    Refresh { agent: String, task: String },
    /// Anything else; acknowledged without a ledger mutation
    Other { kind: String },
}

impl InboxActivity {
    /// Interpret a raw activity document.
    pub fn parse(value: &Value) -> Result<Self> {
        let kind = value
            .get("type")
            .and_then(|v| v.as_str())
            .ok_or_else(|| BoardError::BadRequest("activity without a type".to_string()))?;

        match kind {
            "Follow" => Ok(Self::Follow {
                actor: required_str(value, "actor")?,
            }),
            "Announce" => Ok(Self::Claim {
                agent: required_str(value, "actor")?,
                task: task_id(value)?,
                contributor: contributor(value)?,
            }),
            "Create" => match marker(value) {
                Some("patch") => Ok(Self::Submission {
                    agent: required_str(value, "actor")?,
                    task: task_id(value)?,
                    files: files(value)?,
                    contributor: contributor(value)?,
                }),
                Some("completion") => Ok(Self::Completion {
                    agent: required_str(value, "actor")?,
                    task: task_id(value)?,
                    commit_hash: optional_str(value, &ns("commitHash")),
                    pr_url: optional_str(value, &ns("prUrl")),
                    contributor: contributor(value)?,
                }),
                _ => Ok(Self::Other {
                    kind: kind.to_string(),
                }),
            },
            "Refresh" => Ok(Self::Refresh {
                agent: required_str(value, "actor")?,
                task: task_id(value)?,
            }),
            other if other == ns("Refresh") => Ok(Self::Refresh {
                agent: required_str(value, "actor")?,
                task: task_id(value)?,
            }),
            other => Ok(Self::Other {
                kind: other.to_string(),
            }),
        }
    }
}

/// Namespaced property name, e.g. `board:taskId`
pub fn ns(name: &str) -> String {
    format!("{}:{}", NS, name)
}

fn required_str(value: &Value, field: &str) -> Result<String> {
    value
        .get(field)
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(String::from)
        .ok_or_else(|| BoardError::BadRequest(format!("activity missing field: {}", field)))
}

fn optional_str(value: &Value, field: &str) -> Option<String> {
    value.get(field).and_then(|v| v.as_str()).map(String::from)
}

/// Task identifier: the namespaced property, else a plain `object` string
fn task_id(value: &Value) -> Result<String> {
    optional_str(value, &ns("taskId"))
        .or_else(|| optional_str(value, "object"))
        .filter(|s| !s.is_empty())
        .ok_or_else(|| BoardError::BadRequest("activity missing task identifier".to_string()))
}

fn marker(value: &Value) -> Option<&str> {
    value.get(ns("type")).and_then(|v| v.as_str())
}

fn contributor(value: &Value) -> Result<Option<Contributor>> {
    let Some(block) = value.get(ns("contributor")) else {
        return Ok(None);
    };
    let Value::Object(map) = block else {
        return Err(BoardError::BadRequest(
            "contributor attribution must be an object".to_string(),
        ));
    };

    let contributor = Contributor {
        name: map.get("name").and_then(|v| v.as_str()).map(String::from),
        handle: map.get("handle").and_then(|v| v.as_str()).map(String::from),
    };
    contributor.validate()?;
    Ok(Some(contributor))
}

fn files(value: &Value) -> Result<BTreeMap<String, String>> {
    let Some(Value::Object(map)) = value.get(ns("files")) else {
        return Err(BoardError::BadRequest(
            "submission without a file map".to_string(),
        ));
    };

    let mut files = BTreeMap::new();
    for (path, content) in map {
        let Some(content) = content.as_str() else {
            return Err(BoardError::BadRequest(format!(
                "file content must be text: {}",
                path
            )));
        };
        files.insert(path.clone(), content.to_string());
    }
    Ok(files)
}
