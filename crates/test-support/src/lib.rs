use anyhow::Context as _;
use axum::Router;
use axum::body::Bytes;
use axum::http::{HeaderMap, Method, Uri};
use serde_json::{Map, Value, json};
use std::path::{Path, PathBuf};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// In-process HTTP server bound to an ephemeral localhost port.
///
/// The server shuts down when the value is dropped.
pub struct EchoServer {
    base_url: String,
    shutdown: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl EchoServer {
    /// Start a server that answers every request with a JSON description of what it received:
    /// `{ method, path, query, headers, body, json }`.
    ///
    /// # Panics
    ///
    /// Panics if the listener cannot be bound.
    pub async fn start() -> Self {
        Self::start_with(Router::new()).await
    }

    /// Start a server with custom routes; unmatched requests fall back to the echo handler.
    ///
    /// # Panics
    ///
    /// Panics if the listener cannot be bound.
    pub async fn start_with(routes: Router) -> Self {
        Self::try_start(routes).await.expect("start echo server")
    }

    async fn try_start(routes: Router) -> anyhow::Result<Self> {
        let app = routes.fallback(echo_handler);
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .context("bind ephemeral port")?;
        let addr = listener.local_addr().context("local_addr")?;

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let server = axum::serve(listener, app).with_graceful_shutdown(async move {
            let _ = shutdown_rx.await;
        });
        let handle = tokio::spawn(async move {
            let _ = server.await;
        });

        Ok(Self {
            base_url: format!("http://{addr}"),
            shutdown: Some(shutdown_tx),
            handle: Some(handle),
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl Drop for EchoServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

async fn echo_handler(
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> axum::Json<Value> {
    let mut header_map = Map::new();
    for (name, value) in &headers {
        if let Ok(v) = value.to_str() {
            header_map.insert(name.as_str().to_string(), json!(v));
        }
    }
    let text = String::from_utf8_lossy(&body).to_string();
    let parsed: Value = serde_json::from_str(&text).unwrap_or(Value::Null);

    axum::Json(json!({
        "method": method.as_str(),
        "path": uri.path(),
        "query": uri.query().unwrap_or(""),
        "headers": header_map,
        "body": text,
        "json": parsed,
    }))
}

/// Write `config` as pretty JSON into `dir/name` and return the path.
///
/// # Errors
///
/// Returns an error if serialization or the write fails.
pub fn write_json_file(dir: &Path, name: &str, config: &Value) -> anyhow::Result<PathBuf> {
    let path = dir.join(name);
    let bytes = serde_json::to_vec_pretty(config).context("serialize json")?;
    std::fs::write(&path, bytes).with_context(|| format!("write {}", path.display()))?;
    Ok(path)
}
