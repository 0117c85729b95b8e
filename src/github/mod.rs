//! GitHub integration: webhook intake and pull-request creation
//!
//! Thin wrappers around the GitHub API with no state machine of their
//! own. The pull-request opener is a trait so tests can stand in for the
//! network.

pub mod client;
pub mod webhook;

pub use client::{DisabledOpener, GitHubClient, PullRequest, PullRequestOpener};
pub use webhook::{find_task_id, parse_pr_meta, verify_webhook_signature, PrMeta};
