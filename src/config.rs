//! Configuration for the task board
//!
//! CLI arguments and environment variable handling using clap.

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use uuid::Uuid;

/// taskboard - federated ActivityPub task board
#[derive(Parser, Debug, Clone)]
#[command(name = "taskboard")]
#[command(about = "Federated task feed with a hash-chained contribution ledger")]
pub struct Args {
    /// Unique node identifier for this board instance
    #[arg(long, env = "NODE_ID", default_value_t = Uuid::new_v4())]
    pub node_id: Uuid,

    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "127.0.0.1:8420")]
    pub listen: SocketAddr,

    /// Public domain this board is served under (e.g. "board.example.org")
    #[arg(long, env = "DOMAIN", default_value = "localhost:8420")]
    pub domain: String,

    /// Actor name; all protocol endpoints are rooted at /<actor-name>
    #[arg(long, env = "ACTOR_NAME", default_value = "board")]
    pub actor_name: String,

    /// Explicit public base URL override (e.g. "http://localhost:8420/board").
    /// Defaults to https://<domain>/<actor-name>.
    #[arg(long, env = "PUBLIC_URL")]
    pub public_url: Option<String>,

    /// Directory holding ledger, follower list, and actor key material
    #[arg(long, env = "DATA_DIR", default_value = "./data")]
    pub data_dir: PathBuf,

    /// Task identifier prefix; task ids match <PREFIX>-NNN
    #[arg(long, env = "TASK_PREFIX", default_value = "TASK")]
    pub task_prefix: String,

    /// Claim time-to-live in minutes; an unconfirmed claim reverts to open after this
    #[arg(long, env = "CLAIM_TTL_MINUTES", default_value = "30")]
    pub claim_ttl_minutes: i64,

    /// Number of genesis contributor slots
    #[arg(long, env = "GENESIS_SLOTS", default_value = "50")]
    pub genesis_slots: usize,

    /// GitHub repository ("owner/name") used as the task source and PR target
    #[arg(long, env = "GITHUB_REPO")]
    pub github_repo: Option<String>,

    /// GitHub API token for PR creation
    #[arg(long, env = "GITHUB_TOKEN")]
    pub github_token: Option<String>,

    /// Issue label marking open tasks in the GitHub repository
    #[arg(long, env = "GITHUB_TASK_LABEL", default_value = "good-first-task")]
    pub github_task_label: String,

    /// Shared secret for GitHub webhook signature verification
    #[arg(long, env = "WEBHOOK_SECRET")]
    pub webhook_secret: Option<String>,

    /// Chat webhook URL for best-effort event notifications
    #[arg(long, env = "CHAT_WEBHOOK_URL")]
    pub chat_webhook_url: Option<String>,

    /// Reject inbox posts whose HTTP signature fails verification
    #[arg(long, env = "REQUIRE_SIGNATURES", default_value = "false")]
    pub require_signatures: bool,

    /// Timeout in seconds for outbound deliveries and third-party API calls
    #[arg(long, env = "DELIVERY_TIMEOUT_SECS", default_value = "10")]
    pub delivery_timeout_secs: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Args {
    /// Public URL of the actor (protocol root of all endpoints)
    pub fn actor_url(&self) -> String {
        match &self.public_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("https://{}/{}", self.domain, self.actor_name),
        }
    }

    pub fn inbox_url(&self) -> String {
        format!("{}/inbox", self.actor_url())
    }

    pub fn outbox_url(&self) -> String {
        format!("{}/outbox", self.actor_url())
    }

    pub fn followers_url(&self) -> String {
        format!("{}/followers", self.actor_url())
    }

    pub fn ledger_url(&self) -> String {
        format!("{}/ledger", self.actor_url())
    }

    /// Key id advertised in the actor document and in outgoing signatures
    pub fn key_id(&self) -> String {
        format!("{}#main-key", self.actor_url())
    }

    pub fn ledger_path(&self) -> PathBuf {
        self.data_dir.join("ledger.json")
    }

    pub fn followers_path(&self) -> PathBuf {
        self.data_dir.join("followers.json")
    }

    pub fn actor_key_path(&self) -> PathBuf {
        self.data_dir.join("actor_key.json")
    }

    /// Claim TTL as a chrono duration
    pub fn claim_ttl(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.claim_ttl_minutes)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.actor_name.is_empty()
            || !self
                .actor_name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err("ACTOR_NAME must be non-empty and URL-safe".to_string());
        }

        if self.task_prefix.is_empty()
            || !self.task_prefix.chars().all(|c| c.is_ascii_uppercase())
        {
            return Err("TASK_PREFIX must be non-empty uppercase ASCII".to_string());
        }

        if self.claim_ttl_minutes <= 0 {
            return Err("CLAIM_TTL_MINUTES must be positive".to_string());
        }

        if let Some(repo) = &self.github_repo {
            if repo.split('/').filter(|s| !s.is_empty()).count() != 2 {
                return Err("GITHUB_REPO must be of the form owner/name".to_string());
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_urls() {
        let args = Args::parse_from(["taskboard", "--domain", "board.example.org"]);
        assert_eq!(args.actor_url(), "https://board.example.org/board");
        assert_eq!(args.inbox_url(), "https://board.example.org/board/inbox");
        assert_eq!(args.key_id(), "https://board.example.org/board#main-key");
    }

    #[test]
    fn test_public_url_override() {
        let args = Args::parse_from([
            "taskboard",
            "--public-url",
            "http://localhost:8420/board/",
        ]);
        assert_eq!(args.actor_url(), "http://localhost:8420/board");
    }

    #[test]
    fn test_validate_rejects_bad_prefix() {
        let args = Args::parse_from(["taskboard", "--task-prefix", "bad-prefix"]);
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_repo() {
        let args = Args::parse_from(["taskboard", "--github-repo", "not-a-repo"]);
        assert!(args.validate().is_err());

        let args = Args::parse_from(["taskboard", "--github-repo", "owner/name"]);
        assert!(args.validate().is_ok());
    }
}
