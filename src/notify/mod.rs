//! Chat notifications
//!
//! Best-effort pings to an operator chat webhook when the board accepts
//! an event. Fire-and-forget: failures are logged and never surface to
//! the triggering request.

use tracing::debug;

/// Notifier bound to one chat webhook URL
#[derive(Clone)]
pub struct ChatNotifier {
    webhook_url: String,
    client: reqwest::Client,
}

impl ChatNotifier {
    pub fn new(webhook_url: String, client: reqwest::Client) -> Self {
        Self {
            webhook_url,
            client,
        }
    }

    /// Send a message on a detached task; returns immediately.
    pub fn spawn_notify(&self, text: String) {
        let client = self.client.clone();
        let url = self.webhook_url.clone();
        tokio::spawn(async move {
            let result = client
                .post(&url)
                .json(&serde_json::json!({ "text": text }))
                .send()
                .await;
            match result {
                Ok(resp) if resp.status().is_success() => {}
                Ok(resp) => debug!(status = %resp.status(), "Chat notification rejected"),
                Err(e) => debug!(error = %e, "Chat notification failed"),
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_notify_to_unreachable_url_does_not_panic() {
        let notifier = ChatNotifier::new(
            "http://127.0.0.1:1/webhook".to_string(),
            reqwest::Client::new(),
        );
        notifier.spawn_notify("claim accepted".to_string());
        // The spawned task swallows the connection error
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    }
}
