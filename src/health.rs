//! Liveness endpoint for container platforms.
//!
//! Answers `GET /` and `GET /health` with `alive`.  Runs as its own task and
//! knows nothing about the poll loop, so a slow tick never makes the process
//! look dead.

use std::future::Future;
use std::net::SocketAddr;

use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

pub fn router() -> Router {
    Router::new()
        .route("/", get(alive))
        .route("/health", get(alive))
}

async fn alive() -> &'static str {
    "alive"
}

/// Serve the liveness routes on `listener` until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, router())
        .with_graceful_shutdown(shutdown)
        .await
}

/// Bind `addr` and spawn the liveness server.
///
/// A bind failure is logged and ends the task; polling carries on without it.
pub fn spawn_health_server<F>(addr: SocketAddr, shutdown: F) -> JoinHandle<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        let listener = match TcpListener::bind(addr).await {
            Ok(l) => l,
            Err(e) => {
                tracing::error!(%addr, error = %e, "failed to bind health listener");
                return;
            }
        };

        tracing::info!(%addr, "health listener ready");
        if let Err(e) = serve(listener, shutdown).await {
            tracing::error!(error = %e, "health listener failed");
        }
        tracing::info!("health listener stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn handler_says_alive() {
        assert_eq!(alive().await, "alive");
    }

    #[tokio::test]
    async fn serves_both_paths_until_shutdown() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let server = tokio::spawn(serve(listener, async move {
            let _ = rx.await;
        }));

        for path in ["/", "/health"] {
            let body = reqwest::get(format!("http://{addr}{path}"))
                .await
                .unwrap()
                .text()
                .await
                .unwrap();
            assert_eq!(body, "alive");
        }

        let missing = reqwest::get(format!("http://{addr}/nope")).await.unwrap();
        assert_eq!(missing.status(), reqwest::StatusCode::NOT_FOUND);

        tx.send(()).unwrap();
        server.await.unwrap().unwrap();
    }
}
