//! Local OAuth redirect listener
//!
//! A single-use HTTP server bound on the loopback interface. The identity
//! provider redirects the browser to `/callback?code=...`; the first code
//! received is kept and exposed through [`CallbackListener::access_code`].
//! `/ready` lets the foreground task probe that the socket is actually
//! accepting connections before the browser is opened.

use std::collections::HashMap;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::error::Result;

/// Whatever the redirect carried. Lives only as long as the listener.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CallbackState {
    pub code: Option<String>,
    pub state: Option<String>,
}

type SharedState = Arc<Mutex<CallbackState>>;

pub struct CallbackListener {
    host: String,
    port: u16,
    state: SharedState,
    local_addr: Option<SocketAddr>,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
    http: reqwest::Client,
}

impl CallbackListener {
    /// Port `0` binds an ephemeral port; [`base_url`](Self::base_url) reports
    /// the real one once started.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            state: SharedState::default(),
            local_addr: None,
            shutdown: None,
            task: None,
            // The probe must reach our own socket, never an HTTP(S)_PROXY.
            http: reqwest::Client::builder()
                .no_proxy()
                .timeout(Duration::from_secs(1))
                .build()
                .unwrap_or_default(),
        }
    }

    /// Bind and serve in the background. Returns as soon as the socket is bound.
    pub async fn start(&mut self) -> Result<()> {
        let listener = TcpListener::bind((self.host.as_str(), self.port)).await?;
        let addr = listener.local_addr()?;
        let (tx, rx) = oneshot::channel::<()>();

        let app = router(self.state.clone());
        let task = tokio::spawn(async move {
            let server = axum::serve(listener, app).with_graceful_shutdown(async {
                let _ = rx.await;
            });
            if let Err(e) = server.await {
                tracing::warn!("Callback listener stopped with error: {}", e);
            }
        });

        tracing::debug!("Callback listener started on {}", addr);
        self.local_addr = Some(addr);
        self.shutdown = Some(tx);
        self.task = Some(task);
        Ok(())
    }

    pub fn base_url(&self) -> String {
        let port = self.local_addr.map_or(self.port, |a| a.port());
        format!("http://{}:{}", self.host, port)
    }

    pub fn redirect_uri(&self) -> String {
        format!("{}/callback", self.base_url())
    }

    /// Self-probe `GET /ready`; binding can race with probing.
    pub async fn ready(&self) -> bool {
        if self.task.is_none() {
            return false;
        }
        match self.http.get(format!("{}/ready", self.base_url())).send().await {
            Ok(resp) => resp.status() == reqwest::StatusCode::OK,
            Err(e) => {
                tracing::trace!("Callback listener not ready yet: {}", e);
                false
            }
        }
    }

    pub fn called(&self) -> bool {
        self.snapshot().code.is_some()
    }

    pub fn access_code(&self) -> Option<String> {
        self.snapshot().code
    }

    /// `state` parameter of the captured redirect, if it carried one.
    pub fn returned_state(&self) -> Option<String> {
        self.snapshot().state
    }

    fn snapshot(&self) -> CallbackState {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Stop serving, close the socket and wait for the server task.
    pub async fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::warn!("Callback listener task failed: {}", e);
            }
            tracing::debug!("Callback listener on {} stopped", self.base_url());
        }
    }
}

impl Drop for CallbackListener {
    // Covers early returns and panics that skip `shutdown()`.
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

fn router(state: SharedState) -> Router {
    Router::new()
        .route("/ready", get(|| async { (StatusCode::OK, "ready") }))
        .route("/callback", get(handle_callback))
        .fallback(|| async { (StatusCode::NOT_FOUND, "Not found") })
        .with_state(state)
}

async fn handle_callback(
    State(state): State<SharedState>,
    Query(params): Query<HashMap<String, String>>,
) -> (StatusCode, &'static str) {
    let Some(code) = params.get("code").filter(|c| !c.is_empty()) else {
        return (StatusCode::BAD_REQUEST, "Missing auth code");
    };

    let mut guard = state.lock().unwrap_or_else(|e| e.into_inner());
    if guard.code.is_some() {
        // First request wins.
        return (StatusCode::OK, "Authentication code already received");
    }
    guard.code = Some(code.clone());
    guard.state = params.get("state").cloned();
    tracing::debug!("Authorization code received");
    (
        StatusCode::OK,
        "Authentication code received. You can close this window.",
    )
}

/// Poll `predicate` every `period` until it holds or `timeout` elapses.
/// The predicate is always evaluated at least once.
pub async fn wait_until<F, Fut>(mut predicate: F, timeout: Duration, period: Duration) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = Instant::now() + timeout;
    loop {
        if predicate().await {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(period).await;
    }
}
