//! Claim lifecycle derived from the ledger
//!
//! A task's status is never stored; it is recomputed from the subsequence
//! of ledger entries naming the task. Completions are terminal. A claim or
//! submission stays active for one TTL window anchored at its timestamp; a
//! submission restarts the clock and counts as an active claim held by the
//! submitting agent.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::ledger::{EntryKind, LedgerEntry};
use crate::types::{BoardError, Result};

/// Effective status of a task, synthesized on read
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum TaskStatus {
    Open,
    Claimed {
        agent: String,
        expires_at: DateTime<Utc>,
    },
    Submitted {
        agent: String,
        expires_at: DateTime<Utc>,
    },
    Done {
        agent: String,
    },
}

impl TaskStatus {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Claimed { .. } => "claimed",
            Self::Submitted { .. } => "submitted",
            Self::Done { .. } => "done",
        }
    }

    /// The agent holding an active (unexpired, uncompleted) claim, if any
    pub fn active_agent(&self) -> Option<&str> {
        match self {
            Self::Claimed { agent, .. } | Self::Submitted { agent, .. } => Some(agent),
            _ => None,
        }
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Claimed { expires_at, .. } | Self::Submitted { expires_at, .. } => {
                Some(*expires_at)
            }
            _ => None,
        }
    }
}

/// Derive a task's status at instant `now` from the full chain.
pub fn derive_status(
    entries: &[LedgerEntry],
    task: &str,
    ttl: Duration,
    now: DateTime<Utc>,
) -> TaskStatus {
    let mut last_active: Option<&LedgerEntry> = None;
    for entry in entries.iter().filter(|e| e.task == task) {
        if entry.kind == EntryKind::Completion {
            // Terminal regardless of elapsed time
            return TaskStatus::Done {
                agent: entry.contributor_agent.clone(),
            };
        }
        last_active = Some(entry);
    }

    let Some(entry) = last_active else {
        return TaskStatus::Open;
    };

    let expires_at = entry.timestamp + ttl;
    if expires_at <= now {
        return TaskStatus::Open;
    }

    match entry.kind {
        EntryKind::Claim => TaskStatus::Claimed {
            agent: entry.contributor_agent.clone(),
            expires_at,
        },
        EntryKind::Submission => TaskStatus::Submitted {
            agent: entry.contributor_agent.clone(),
            expires_at,
        },
        EntryKind::Completion => unreachable!("completions returned above"),
    }
}

/// Does `agent` hold a currently active claim (or submission) on `task`?
pub fn holds_active_claim(
    entries: &[LedgerEntry],
    task: &str,
    agent: &str,
    ttl: Duration,
    now: DateTime<Utc>,
) -> bool {
    derive_status(entries, task, ttl, now).active_agent() == Some(agent)
}

/// Decide whether a claim by `agent` on `task` may be accepted: the task
/// must be open, or the active claim must already belong to the same agent
/// (idempotent re-claim). Evaluated inside the ledger's append critical
/// section so concurrent claims cannot both observe an open task.
pub fn claim_allowed(
    entries: &[LedgerEntry],
    task: &str,
    agent: &str,
    ttl: Duration,
    now: DateTime<Utc>,
) -> Result<()> {
    match derive_status(entries, task, ttl, now) {
        TaskStatus::Open => Ok(()),
        TaskStatus::Claimed {
            agent: holder,
            expires_at,
        }
        | TaskStatus::Submitted {
            agent: holder,
            expires_at,
        } => {
            if holder == agent {
                Ok(())
            } else {
                Err(BoardError::Conflict(format!(
                    "task {} is claimed by {} until {}",
                    task, holder, expires_at
                )))
            }
        }
        TaskStatus::Done { .. } => Err(BoardError::Conflict(format!(
            "task {} is already completed",
            task
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{canonical_digest, EntryKind, ZERO_HASH};

    const TTL_MINUTES: i64 = 30;

    fn ttl() -> Duration {
        Duration::minutes(TTL_MINUTES)
    }

    fn entry(id: u64, kind: EntryKind, task: &str, agent: &str, minutes_ago: i64) -> LedgerEntry {
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
            timestamp: Utc::now() - Duration::minutes(minutes_ago),
            prev_hash: ZERO_HASH.to_string(),
            entry_hash: String::new(),
        };
        entry.entry_hash = canonical_digest(&entry).unwrap();
        entry
    }

    #[test]
    fn test_no_entries_is_open() {
        assert_eq!(derive_status(&[], "TASK-001", ttl(), Utc::now()), TaskStatus::Open);
    }

    #[test]
    fn test_fresh_claim_is_claimed() {
        let chain = vec![entry(1, EntryKind::Claim, "TASK-001", "agent-a", 5)];
        let status = derive_status(&chain, "TASK-001", ttl(), Utc::now());
        assert_eq!(status.label(), "claimed");
        assert_eq!(status.active_agent(), Some("agent-a"));
        assert!(status.expires_at().is_some());
    }

    #[test]
    fn test_expired_claim_is_open() {
        let chain = vec![entry(1, EntryKind::Claim, "TASK-001", "agent-a", 60)];
        assert_eq!(
            derive_status(&chain, "TASK-001", ttl(), Utc::now()),
            TaskStatus::Open
        );
    }

    #[test]
    fn test_completion_is_done_regardless_of_age() {
        let chain = vec![
            entry(1, EntryKind::Claim, "TASK-001", "agent-a", 2000),
            entry(2, EntryKind::Completion, "TASK-001", "agent-a", 1990),
        ];
        let status = derive_status(&chain, "TASK-001", ttl(), Utc::now());
        assert_eq!(status.label(), "done");
    }

    #[test]
    fn test_other_tasks_are_ignored() {
        let chain = vec![entry(1, EntryKind::Claim, "TASK-002", "agent-a", 5)];
        assert_eq!(
            derive_status(&chain, "TASK-001", ttl(), Utc::now()),
            TaskStatus::Open
        );
    }

    #[test]
    fn test_submission_restarts_the_expiry_clock() {
        // Claim is about to expire; the submission 5 minutes ago keeps the
        // task active and anchored at the submission timestamp.
        let chain = vec![
            entry(1, EntryKind::Claim, "TASK-001", "agent-a", 25),
            entry(2, EntryKind::Submission, "TASK-001", "agent-a", 5),
        ];
        let status = derive_status(&chain, "TASK-001", ttl(), Utc::now());
        assert_eq!(status.label(), "submitted");
        assert_eq!(status.active_agent(), Some("agent-a"));

        let anchor = chain[1].timestamp;
        assert_eq!(status.expires_at(), Some(anchor + ttl()));
    }

    #[test]
    fn test_expired_submission_is_open() {
        let chain = vec![
            entry(1, EntryKind::Claim, "TASK-001", "agent-a", 90),
            entry(2, EntryKind::Submission, "TASK-001", "agent-a", 60),
        ];
        assert_eq!(
            derive_status(&chain, "TASK-001", ttl(), Utc::now()),
            TaskStatus::Open
        );
    }

    #[test]
    fn test_claim_conflict_for_other_agent() {
        let chain = vec![entry(1, EntryKind::Claim, "TASK-001", "agent-a", 5)];
        let result = claim_allowed(&chain, "TASK-001", "agent-b", ttl(), Utc::now());
        assert!(matches!(result, Err(BoardError::Conflict(_))));
    }

    #[test]
    fn test_same_agent_reclaim_allowed() {
        let chain = vec![entry(1, EntryKind::Claim, "TASK-001", "agent-a", 5)];
        assert!(claim_allowed(&chain, "TASK-001", "agent-a", ttl(), Utc::now()).is_ok());
    }

    #[test]
    fn test_claim_after_expiry_allowed_for_anyone() {
        let chain = vec![entry(1, EntryKind::Claim, "TASK-001", "agent-a", 60)];
        assert!(claim_allowed(&chain, "TASK-001", "agent-b", ttl(), Utc::now()).is_ok());
    }

    #[test]
    fn test_claim_on_done_task_conflicts() {
        let chain = vec![entry(1, EntryKind::Completion, "TASK-001", "agent-a", 5)];
        let result = claim_allowed(&chain, "TASK-001", "agent-b", ttl(), Utc::now());
        assert!(matches!(result, Err(BoardError::Conflict(_))));
    }

    #[test]
    fn test_active_claim_query() {
        let chain = vec![entry(1, EntryKind::Claim, "TASK-001", "agent-a", 5)];
        assert!(holds_active_claim(&chain, "TASK-001", "agent-a", ttl(), Utc::now()));
        assert!(!holds_active_claim(&chain, "TASK-001", "agent-b", ttl(), Utc::now()));

        let expired = vec![entry(1, EntryKind::Claim, "TASK-001", "agent-a", 60)];
        assert!(!holds_active_claim(&expired, "TASK-001", "agent-a", ttl(), Utc::now()));
    }
}
