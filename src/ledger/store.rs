//! Durable ledger storage
//!
//! The ledger is a single JSON file under an injected data directory. The
//! file is the one piece of shared mutable state with a real invariant to
//! protect: concurrent appends must never produce duplicate ids or
//! out-of-order `prev_hash` linkage. All writes therefore go through one
//! async mutex; reads bypass it.

use chrono::Utc;
use std::io::ErrorKind;
use std::path::PathBuf;
use tokio::sync::Mutex;
use tracing::debug;

use super::{canonical_digest, verify_chain, EntryCandidate, LedgerEntry, ZERO_HASH};
use crate::types::{BoardError, Result};

/// Append-only ledger repository. The single mutation point for task state.
pub struct Ledger {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl Ledger {
    /// Create a ledger backed by the given file. The file (and its parent
    /// directory) is created on first append.
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            write_lock: Mutex::new(()),
        }
    }

    /// Load all entries in ascending id order; empty if nothing persisted yet.
    pub async fn load(&self) -> Result<Vec<LedgerEntry>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| BoardError::Internal(format!("ledger file corrupt: {}", e))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Recompute every link and digest; true if the whole chain checks out.
    pub async fn verify(&self) -> Result<bool> {
        Ok(verify_chain(&self.load().await?))
    }

    /// Append a candidate entry unconditionally.
    pub async fn append(&self, candidate: EntryCandidate) -> Result<LedgerEntry> {
        self.append_checked(candidate, |_| Ok(())).await
    }

    /// Append a candidate entry after running `check` against the current
    /// chain, with both evaluated under the single writer lock. Claim
    /// conflict decisions go through here so that two concurrent claims
    /// cannot both observe an open task.
    pub async fn append_checked<F>(&self, candidate: EntryCandidate, check: F) -> Result<LedgerEntry>
    where
        F: FnOnce(&[LedgerEntry]) -> Result<()>,
    {
        let _guard = self.write_lock.lock().await;

        let mut chain = self.load().await?;
        check(&chain)?;

        let prev_hash = chain
            .last()
            .map(|entry| entry.entry_hash.clone())
            .unwrap_or_else(|| ZERO_HASH.to_string());

        let mut entry = LedgerEntry {
            id: chain.len() as u64 + 1,
            kind: candidate.kind,
            task: candidate.task,
            contributor_agent: candidate.contributor_agent,
            contributor: candidate.contributor,
            contributor_github: candidate.contributor_github,
            commit_hash: candidate.commit_hash,
            pr_url: candidate.pr_url,
            pr_title: candidate.pr_title,
            verification: candidate.verification,
            refresh: candidate.refresh,
            timestamp: Utc::now(),
            prev_hash,
            entry_hash: String::new(),
        };
        entry.entry_hash = canonical_digest(&entry)?;

        chain.push(entry.clone());
        self.persist(&chain).await?;

        debug!(
            id = entry.id,
            kind = %entry.kind,
            task = %entry.task,
            "Ledger entry appended"
        );
        Ok(entry)
    }

    async fn persist(&self, chain: &[LedgerEntry]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_string_pretty(chain)
            .map_err(|e| BoardError::Internal(format!("ledger serialization failed: {}", e)))?;
        tokio::fs::write(&self.path, json).await?;
        Ok(())
    }
}
