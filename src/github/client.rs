//! Pull-request creation
//!
//! A submission that passes the guard becomes a branch + pull request in
//! the configured repository. The ledger entry is appended only after PR
//! creation succeeds.

use async_trait::async_trait;
use base64::Engine;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use tracing::info;
use uuid::Uuid;

use crate::types::{BoardError, Result};

/// An opened pull request
#[derive(Debug, Clone)]
pub struct PullRequest {
    pub url: String,
    pub branch: String,
}

/// Seam for opening pull requests from validated submissions.
#[async_trait]
pub trait PullRequestOpener: Send + Sync {
    async fn open_pull_request(
        &self,
        task: &str,
        agent: &str,
        files: &BTreeMap<String, String>,
    ) -> Result<PullRequest>;
}

/// Opener used when no repository or token is configured: every
/// submission fails as an external-dependency error, and nothing is
/// recorded.
pub struct DisabledOpener;

#[async_trait]
impl PullRequestOpener for DisabledOpener {
    async fn open_pull_request(
        &self,
        _task: &str,
        _agent: &str,
        _files: &BTreeMap<String, String>,
    ) -> Result<PullRequest> {
        Err(BoardError::External(
            "pull-request creation is not configured".to_string(),
        ))
    }
}

/// Thin GitHub API client
pub struct GitHubClient {
    repo: String,
    token: String,
    client: reqwest::Client,
}

impl GitHubClient {
    pub fn new(repo: String, token: String, client: reqwest::Client) -> Self {
        Self {
            repo,
            token,
            client,
        }
    }

    fn api(&self, rest: &str) -> String {
        format!("https://api.github.com/repos/{}/{}", self.repo, rest)
    }

    async fn get(&self, url: &str) -> Result<Value> {
        let resp = self
            .client
            .get(url)
            .bearer_auth(&self.token)
            .header("Accept", "application/vnd.github+json")
            .header("User-Agent", "taskboard")
            .send()
            .await?;
        Self::json_or_error(resp).await
    }

    async fn send(&self, request: reqwest::RequestBuilder, payload: &Value) -> Result<Value> {
        let resp = request
            .bearer_auth(&self.token)
            .header("Accept", "application/vnd.github+json")
            .header("User-Agent", "taskboard")
            .json(payload)
            .send()
            .await?;
        Self::json_or_error(resp).await
    }

    async fn json_or_error(resp: reqwest::Response) -> Result<Value> {
        let status = resp.status();
        if !status.is_success() {
            let detail = resp.text().await.unwrap_or_default();
            return Err(BoardError::External(format!(
                "GitHub API returned {}: {}",
                status, detail
            )));
        }
        Ok(resp.json().await?)
    }

    fn str_field<'a>(value: &'a Value, pointer: &str) -> Result<&'a str> {
        value.pointer(pointer).and_then(|v| v.as_str()).ok_or_else(|| {
            BoardError::External(format!("GitHub API response missing {}", pointer))
        })
    }
}

#[async_trait]
impl PullRequestOpener for GitHubClient {
    async fn open_pull_request(
        &self,
        task: &str,
        agent: &str,
        files: &BTreeMap<String, String>,
    ) -> Result<PullRequest> {
        // Base branch and its head commit
        let repo = self
            .get(&format!("https://api.github.com/repos/{}", self.repo))
            .await?;
        let base = Self::str_field(&repo, "/default_branch")?.to_string();

        let base_ref = self
            .get(&self.api(&format!("git/ref/heads/{}", base)))
            .await?;
        let base_sha = Self::str_field(&base_ref, "/object/sha")?.to_string();

        // Submission branch
        let branch = format!(
            "submission/{}-{}",
            task.to_lowercase(),
            &Uuid::new_v4().simple().to_string()[..8]
        );
        self.send(
            self.client.post(self.api("git/refs")),
            &json!({ "ref": format!("refs/heads/{}", branch), "sha": base_sha }),
        )
        .await?;

        // One commit per file via the contents API
        for (path, content) in files {
            let encoded = base64::engine::general_purpose::STANDARD.encode(content.as_bytes());
            self.send(
                self.client.put(self.api(&format!("contents/{}", path))),
                &json!({
                    "message": format!("{}: add {}", task, path),
                    "content": encoded,
                    "branch": branch,
                }),
            )
            .await?;
        }

        let body = format!(
            "Automated submission.\n\nContribution-Agent: {}\nTask: {}\n",
            agent, task
        );
        let pr = self
            .send(
                self.client.post(self.api("pulls")),
                &json!({
                    "title": format!("{}: submission from {}", task, agent),
                    "head": branch,
                    "base": base,
                    "body": body,
                }),
            )
            .await?;
        let url = Self::str_field(&pr, "/html_url")?.to_string();

        info!(task = %task, agent = %agent, pr = %url, "Pull request opened");
        Ok(PullRequest { url, branch })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_disabled_opener_fails_as_external() {
        let result = DisabledOpener
            .open_pull_request("TASK-001", "agent-a", &BTreeMap::new())
            .await;
        assert!(matches!(result, Err(BoardError::External(_))));
    }

    #[test]
    fn test_api_url_construction() {
        let client = GitHubClient::new(
            "owner/name".to_string(),
            "token".to_string(),
            reqwest::Client::new(),
        );
        assert_eq!(
            client.api("git/refs"),
            "https://api.github.com/repos/owner/name/git/refs"
        );
    }
}
