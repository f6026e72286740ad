//! Liveness endpoint for container orchestration.

use std::net::SocketAddr;

use axum::routing::get;
use axum::Router;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Build the health router.
pub fn router() -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .layer(TraceLayer::new_for_http())
}

/// GET /health
async fn health_handler() -> &'static str {
    "Ok!"
}

/// A running health listener.
pub struct HealthServer {
    pub port: u16,
    handle: JoinHandle<()>,
}

impl HealthServer {
    /// Bind `0.0.0.0:port` (0 picks a free port) and serve until `shutdown`
    /// is cancelled.
    pub async fn start(port: u16, shutdown: CancellationToken) -> std::io::Result<Self> {
        let addr = SocketAddr::from(([0, 0, 0, 0], port));
        let listener = tokio::net::TcpListener::bind(addr).await?;
        let port = listener.local_addr()?.port();
        info!(port, "health endpoint listening");

        let handle = tokio::spawn(async move {
            let served = axum::serve(listener, router())
                .with_graceful_shutdown(shutdown.cancelled_owned())
                .await;
            if let Err(e) = served {
                error!(error = %e, "health server failed");
            }
        });

        Ok(Self { port, handle })
    }

    pub fn into_handle(self) -> JoinHandle<()> {
        self.handle
    }
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use super::*;

    #[tokio::test]
    async fn health_returns_ok() {
        let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let resp = router().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let body = axum::body::to_bytes(resp.into_body(), 1024).await.unwrap();
        assert_eq!(&body[..], b"Ok!");
    }

    #[tokio::test]
    async fn unknown_route_returns_404() {
        let req = Request::builder().uri("/nope").body(Body::empty()).unwrap();
        let resp = router().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn serves_until_cancelled() {
        let token = CancellationToken::new();
        let server = HealthServer::start(0, token.clone()).await.unwrap();

        let body = reqwest::get(format!("http://127.0.0.1:{}/health", server.port))
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        assert_eq!(body, "Ok!");

        token.cancel();
        tokio::time::timeout(std::time::Duration::from_secs(5), server.into_handle())
            .await
            .unwrap()
            .unwrap();
    }
}
