//! HTTP server implementation
//!
//! hyper http1 with TokioIo for async handling. Requests are handled
//! concurrently; the only cross-request serialization point is the
//! ledger's append lock.

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response};
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::config::Args;
use crate::federation::{spawn_fan_out, FollowerStore};
use crate::github::{DisabledOpener, GitHubClient, PullRequestOpener};
use crate::ledger::Ledger;
use crate::notify::ChatNotifier;
use crate::routes;
use crate::signing::{ActorKeys, KeyDirectory};
use crate::tasks::TaskFeed;
use crate::types::{BoardError, Result};

/// Shared application state
pub struct AppState {
    pub args: Args,
    /// The single source of truth for task state
    pub ledger: Arc<Ledger>,
    /// Persisted follower directory
    pub followers: Arc<FollowerStore>,
    /// This board's signing identity
    pub keys: Arc<ActorKeys>,
    /// Counterpart public keys for signature verification
    pub key_directory: Arc<KeyDirectory>,
    /// Open-task source for the outbox
    pub feed: TaskFeed,
    /// Pull-request creation seam
    pub pr_opener: Arc<dyn PullRequestOpener>,
    /// Optional operator chat notifications
    pub notifier: Option<ChatNotifier>,
    /// Shared outbound HTTP client (bounded timeout)
    pub http: reqwest::Client,
}

impl AppState {
    /// Build state from configuration: load or generate the actor key,
    /// open the ledger and follower stores under the data directory, and
    /// wire the external seams.
    pub async fn new(args: Args) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(args.delivery_timeout_secs))
            .build()
            .map_err(|e| BoardError::Config(format!("HTTP client build failed: {}", e)))?;

        let keys = Arc::new(ActorKeys::load_or_generate(
            &args.actor_key_path(),
            args.key_id(),
        )?);
        let key_directory = Arc::new(KeyDirectory::new(http.clone()));
        key_directory.insert(&keys.key_id, keys.verifying_key());

        let ledger = Arc::new(Ledger::new(args.ledger_path()));
        let followers = Arc::new(FollowerStore::open(args.followers_path()).await?);

        let feed = TaskFeed::new(
            args.github_repo.clone(),
            args.github_task_label.clone(),
            args.task_prefix.clone(),
            http.clone(),
        );

        let pr_opener: Arc<dyn PullRequestOpener> = match (&args.github_repo, &args.github_token) {
            (Some(repo), Some(token)) => {
                Arc::new(GitHubClient::new(repo.clone(), token.clone(), http.clone()))
            }
            _ => Arc::new(DisabledOpener),
        };

        let notifier = args
            .chat_webhook_url
            .clone()
            .map(|url| ChatNotifier::new(url, http.clone()));

        Ok(Self {
            args,
            ledger,
            followers,
            keys,
            key_directory,
            feed,
            pr_opener,
            notifier,
            http,
        })
    }

    /// Path of the protocol root, `/<actor-name>`
    pub fn base_path(&self) -> String {
        format!("/{}", self.args.actor_name)
    }

    /// Best-effort chat notification
    pub fn notify(&self, text: String) {
        if let Some(notifier) = &self.notifier {
            notifier.spawn_notify(text);
        }
    }

    /// Best-effort signed fan-out of an activity to all followers
    pub async fn fan_out(&self, activity: serde_json::Value) {
        let followers = self.followers.list().await;
        if followers.is_empty() {
            return;
        }
        spawn_fan_out(
            self.http.clone(),
            Arc::clone(&self.keys),
            followers,
            activity,
        );
    }
}

/// Start the HTTP server
pub async fn run(state: Arc<AppState>) -> Result<()> {
    let listener = TcpListener::bind(state.args.listen).await?;

    info!(
        "Task board listening on {} as node {}",
        state.args.listen, state.args.node_id
    );
    info!("Actor: {}", state.args.actor_url());

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    let io = TokioIo::new(stream);

                    let service = service_fn(move |req| {
                        let state = Arc::clone(&state);
                        async move { handle_request(state, addr, req).await }
                    });

                    if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                        error!("Error serving connection from {}: {:?}", addr, err);
                    }
                });
            }
            Err(e) => {
                error!("Error accepting connection: {:?}", e);
            }
        }
    }
}

/// Route incoming HTTP requests
async fn handle_request(
    state: Arc<AppState>,
    addr: SocketAddr,
    req: Request<Incoming>,
) -> std::result::Result<Response<Full<Bytes>>, hyper::Error> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let query = req.uri().query().unwrap_or("").to_string();

    info!("[{}] {} {}", addr, method, path);

    let base = state.base_path();
    let followers_path = format!("{}/followers", base);
    let contributors_path = format!("{}/contributors", base);
    let outbox_path = format!("{}/outbox", base);
    let inbox_path = format!("{}/inbox", base);
    let ledger_path = format!("{}/ledger", base);
    let ledger_verify_path = format!("{}/ledger/verify", base);
    let tasks_prefix = format!("{}/tasks/", base);
    let webhook_path = format!("{}/github-webhook", base);

    let response = match (method, path.as_str()) {
        (Method::GET, "/health") | (Method::GET, "/healthz") => {
            routes::health_check(&state).await
        }

        (Method::GET, "/version") => routes::version_info(),

        (Method::GET, "/.well-known/webfinger") => routes::handle_webfinger(&state, &query),

        (Method::GET, p) if p == base => routes::handle_actor(&state),

        (Method::GET, p) if p == followers_path => routes::handle_followers(&state).await,

        (Method::GET, p) if p == contributors_path => routes::handle_contributors(&state).await,

        (Method::GET, p) if p == outbox_path => routes::handle_outbox(&state).await,

        (Method::GET, p) if p == ledger_verify_path => routes::handle_ledger_verify(&state).await,

        (Method::GET, p) if p == ledger_path => routes::handle_ledger(&state).await,

        (Method::GET, p) if p.starts_with(&tasks_prefix) => {
            let task_id = p.strip_prefix(&tasks_prefix).unwrap_or("");
            routes::handle_task(&state, task_id).await
        }

        (Method::POST, p) if p == inbox_path => {
            let headers = req.headers().clone();
            let body = req.into_body().collect().await?.to_bytes();
            routes::handle_inbox(&state, &headers, body).await
        }

        (Method::POST, p) if p == webhook_path => {
            let headers = req.headers().clone();
            let body = req.into_body().collect().await?.to_bytes();
            routes::handle_github_webhook(&state, &headers, body).await
        }

        // CORS preflight
        (Method::OPTIONS, _) => routes::preflight_response(),

        _ => routes::not_found_response(&path),
    };

    Ok(response)
}
