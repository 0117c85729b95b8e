//! Open-task feed
//!
//! Tasks originate as labeled GitHub issues. The fetch is a thin wrapper
//! around the issues API; when no repository is configured or the fetch
//! fails, a built-in genesis list keeps the outbox non-empty.

use serde::Deserialize;
use tracing::warn;

/// An open work item as published in the outbox
#[derive(Debug, Clone)]
pub struct OpenTask {
    pub number: u64,
    pub title: String,
    pub url: String,
    pub body: String,
}

/// GitHub issue shape (the fields we read)
#[derive(Debug, Deserialize)]
struct Issue {
    number: u64,
    title: String,
    html_url: String,
    #[serde(default)]
    body: Option<String>,
    /// Present when the "issue" is actually a pull request
    #[serde(default)]
    pull_request: Option<serde_json::Value>,
}

/// Source of open tasks for the outbox
pub struct TaskFeed {
    repo: Option<String>,
    label: String,
    prefix: String,
    client: reqwest::Client,
}

impl TaskFeed {
    pub fn new(repo: Option<String>, label: String, prefix: String, client: reqwest::Client) -> Self {
        Self {
            repo,
            label,
            prefix,
            client,
        }
    }

    /// Task identifier for an issue number, `PREFIX-NNN`
    pub fn task_id_for(&self, number: u64) -> String {
        format!("{}-{:03}", self.prefix, number)
    }

    /// Fetch open tasks, falling back to the genesis list on any failure.
    pub async fn fetch_open_tasks(&self) -> Vec<OpenTask> {
        let Some(repo) = &self.repo else {
            return self.genesis_tasks();
        };

        match self.fetch_issues(repo).await {
            Ok(tasks) if !tasks.is_empty() => tasks,
            Ok(_) => self.genesis_tasks(),
            Err(e) => {
                warn!(repo = %repo, error = %e, "Task fetch failed, serving genesis list");
                self.genesis_tasks()
            }
        }
    }

    async fn fetch_issues(&self, repo: &str) -> Result<Vec<OpenTask>, String> {
        let url = format!("https://api.github.com/repos/{}/issues", repo);
        let resp = self
            .client
            .get(&url)
            .query(&[("state", "open"), ("labels", self.label.as_str())])
            .header("Accept", "application/vnd.github+json")
            .header("User-Agent", "taskboard")
            .send()
            .await
            .map_err(|e| format!("HTTP error: {}", e))?;

        if !resp.status().is_success() {
            return Err(format!("Non-200 status: {}", resp.status()));
        }

        let issues: Vec<Issue> = resp.json().await.map_err(|e| format!("JSON parse error: {}", e))?;

        Ok(issues
            .into_iter()
            .filter(|issue| issue.pull_request.is_none())
            .map(|issue| OpenTask {
                number: issue.number,
                title: issue.title,
                url: issue.html_url,
                body: issue.body.unwrap_or_default(),
            })
            .collect())
    }

    /// Built-in seed tasks served until the issue tracker is reachable
    fn genesis_tasks(&self) -> Vec<OpenTask> {
        [
            (1, "Ledger chain explorer", "Render the contribution ledger as a browsable page with per-entry hash links."),
            (2, "Follower directory export", "Expose the follower list as a portable ActivityPub collection dump."),
            (3, "Interop probe", "Exercise claim, submission, and completion against a second board instance."),
        ]
        .into_iter()
        .map(|(number, title, body)| OpenTask {
            number,
            title: format!("{}: {}", self.task_id_for(number), title),
            url: String::new(),
            body: body.to_string(),
        })
        .collect()
    }
}
