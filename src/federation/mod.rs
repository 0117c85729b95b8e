//! Federation directory
//!
//! Tracks follower boards and pushes activities to their inboxes.
//! Deliveries are best-effort: each one is an independent detached task
//! bounded by the HTTP client timeout, and failures are logged and
//! swallowed without ever affecting the caller's response. There is no
//! retry queue and no delivery receipt tracking.

use serde_json::Value;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::signing::{sign_request, ActorKeys};
use crate::types::{BoardError, Result};

/// Persisted, deduplicated, insertion-ordered follower list
pub struct FollowerStore {
    path: PathBuf,
    followers: RwLock<Vec<String>>,
}

impl FollowerStore {
    /// Open the store, loading any persisted list.
    pub async fn open(path: PathBuf) -> Result<Self> {
        let followers = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| BoardError::Internal(format!("follower file corrupt: {}", e)))?,
            Err(e) if e.kind() == ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self {
            path,
            followers: RwLock::new(followers),
        })
    }

    /// Follower actor URLs in discovery order
    pub async fn list(&self) -> Vec<String> {
        self.followers.read().await.clone()
    }

    /// Idempotently add a follower; true when newly registered.
    pub async fn register(&self, actor_url: &str) -> Result<bool> {
        let mut followers = self.followers.write().await;
        if followers.iter().any(|existing| existing == actor_url) {
            return Ok(false);
        }
        followers.push(actor_url.to_string());

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_string_pretty(&*followers)
            .map_err(|e| BoardError::Internal(format!("follower serialization failed: {}", e)))?;
        tokio::fs::write(&self.path, json).await?;

        info!(follower = %actor_url, total = followers.len(), "Follower registered");
        Ok(true)
    }
}

/// Deliver an activity to every known follower. Spawns one detached task
/// per follower; returns immediately.
pub fn spawn_fan_out(
    client: reqwest::Client,
    keys: Arc<ActorKeys>,
    followers: Vec<String>,
    activity: Value,
) {
    for follower in followers {
        let client = client.clone();
        let keys = Arc::clone(&keys);
        let activity = activity.clone();
        tokio::spawn(async move {
            if let Err(e) = deliver_to_actor(&client, &keys, &follower, &activity).await {
                debug!(follower = %follower, error = %e, "Federation delivery failed");
            }
        });
    }
}

/// Deliver a single activity to one actor; used for the asynchronous
/// `Accept` reply of the Follow handshake.
pub fn spawn_deliver(
    client: reqwest::Client,
    keys: Arc<ActorKeys>,
    actor_url: String,
    activity: Value,
) {
    tokio::spawn(async move {
        if let Err(e) = deliver_to_actor(&client, &keys, &actor_url, &activity).await {
            warn!(actor = %actor_url, error = %e, "Delivery failed");
        }
    });
}

/// Resolve an actor's inbox and POST the signed activity to it.
pub async fn deliver_to_actor(
    client: &reqwest::Client,
    keys: &ActorKeys,
    actor_url: &str,
    activity: &Value,
) -> std::result::Result<(), String> {
    let inbox = resolve_inbox(client, actor_url).await?;
    post_signed(client, keys, &inbox, activity).await
}

/// Fetch a remote actor document and read its inbox URL
pub async fn resolve_inbox(
    client: &reqwest::Client,
    actor_url: &str,
) -> std::result::Result<String, String> {
    let resp = client
        .get(actor_url)
        .header("Accept", "application/activity+json")
        .send()
        .await
        .map_err(|e| format!("HTTP error: {}", e))?;

    if !resp.status().is_success() {
        return Err(format!("Non-200 status: {}", resp.status()));
    }

    let doc: Value = resp
        .json()
        .await
        .map_err(|e| format!("JSON parse error: {}", e))?;

    doc.get("inbox")
        .and_then(|v| v.as_str())
        .map(String::from)
        .ok_or_else(|| format!("actor document without inbox: {}", actor_url))
}

/// POST a signed activity to an inbox URL
pub async fn post_signed(
    client: &reqwest::Client,
    keys: &ActorKeys,
    inbox_url: &str,
    activity: &Value,
) -> std::result::Result<(), String> {
    let (host, path) = split_host_path(inbox_url)
        .ok_or_else(|| format!("unparseable inbox URL: {}", inbox_url))?;

    let body = serde_json::to_vec(activity).map_err(|e| format!("serialization error: {}", e))?;
    let signed = sign_request(keys, "POST", &path, &host, &body);

    let resp = client
        .post(inbox_url)
        .header("Content-Type", "application/activity+json")
        .header("Date", signed.date)
        .header("Digest", signed.digest)
        .header("Signature", signed.signature)
        .body(body)
        .send()
        .await
        .map_err(|e| format!("HTTP error: {}", e))?;

    if !resp.status().is_success() {
        return Err(format!("Non-200 status: {}", resp.status()));
    }
    Ok(())
}

/// Split a URL into (host, path) for the signing string
fn split_host_path(url: &str) -> Option<(String, String)> {
    let without_scheme = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))?;

    match without_scheme.split_once('/') {
        Some((host, rest)) if !host.is_empty() => Some((host.to_string(), format!("/{}", rest))),
        None if !without_scheme.is_empty() => Some((without_scheme.to_string(), "/".to_string())),
        _ => None,
    }
}
