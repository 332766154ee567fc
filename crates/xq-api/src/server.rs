use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use axum::http::{Method, header};
use axum::routing::get;
use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use xq_core::Store;

use crate::handlers;

/// Default bound on concurrently running filter queries.
pub const DEFAULT_MAX_QUERIES: u32 = 16;

/// Shared by every request.
#[derive(Debug)]
pub struct ServerState {
    pub store: Arc<Store>,
    /// Bounds concurrently running filter and search queries.
    pub permits: Semaphore,
}

impl ServerState {
    pub fn new(store: Arc<Store>, max_queries: u32) -> Self {
        Self {
            store,
            permits: Semaphore::new(max_queries.max(1) as usize),
        }
    }

    /// Stop admitting queries. Waiting and later ones fail with 503.
    pub fn close(&self) {
        self.permits.close();
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub max_queries: u32,
    pub access_log: bool,
    pub gzip: bool,
    pub cors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            max_queries: DEFAULT_MAX_QUERIES,
            access_log: false,
            gzip: true,
            cors: false,
        }
    }
}

/// Build the HTTP routes over `state`.
pub fn router(state: Arc<ServerState>, config: &ServerConfig) -> Router {
    let mut app = Router::new()
        .route("/v1/archs", get(handlers::archs))
        .route("/v1/packages/:arch", get(handlers::packages))
        .route("/v1/packages/:arch/:package", get(handlers::package))
        .route("/v1/query/:arch", get(handlers::query))
        .route("/v1/search/:arch", get(handlers::search))
        .fallback(handlers::not_found)
        .with_state(state);

    if config.gzip {
        app = app.layer(CompressionLayer::new());
    }
    if config.cors {
        app = app.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET, Method::HEAD])
                .allow_headers(Any)
                .expose_headers([header::ETAG]),
        );
    }
    if config.access_log {
        app = app.layer(TraceLayer::new_for_http());
    }
    app
}

/// Serve `app` until `shutdown` resolves.
///
/// # Errors
///
/// Returns the listener's I/O error.
pub async fn serve<F>(listener: TcpListener, app: Router, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
}

/// Rebuild the store from `paths` on every SIGHUP.
///
/// A failed reload is logged and the previous snapshot keeps serving.
///
/// # Errors
///
/// Fails if the signal handler cannot be installed.
#[cfg(unix)]
pub fn reload_on_hangup(
    store: Arc<Store>,
    paths: Vec<PathBuf>,
) -> std::io::Result<tokio::task::JoinHandle<()>> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut hangup = signal(SignalKind::hangup())?;
    Ok(tokio::spawn(async move {
        while hangup.recv().await.is_some() {
            tracing::info!("SIGHUP received, reloading repodata");
            if let Err(err) = store.reload(&paths).await {
                tracing::error!("reload failed, keeping previous repodata: {err}");
            }
        }
    }))
}

/// Resolves on Ctrl-C or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::warn!("unable to listen for Ctrl-C: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(err) => {
                tracing::warn!("unable to listen for SIGTERM: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
    tracing::info!("shutting down");
}
