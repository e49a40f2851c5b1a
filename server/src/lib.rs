//! HTTP JSON API for todo items.
//!
//! # Overview
//! `app` assembles the axum router: the todo resource under `/api/todos`,
//! a status payload at `/`, a JSON 404 for everything else, and the
//! middleware stack (CORS, request tracing, panic recovery and
//! development-only error detail). The store is passed in through
//! `AppState`; nothing in the crate holds a global connection.

pub mod config;
pub mod error;
pub mod model;
pub mod routes;
pub mod store;

use std::future::Future;

use axum::{
    http::{header, HeaderValue, Method},
    middleware,
    routing::get,
    Router,
};
use tokio::net::TcpListener;
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};

pub use config::{Config, ConfigError, Environment};
pub use error::AppError;
pub use model::{Todo, TodoPatch, ValidationError};
pub use routes::{ApiStatus, AppState, DeletedTodo};
pub use store::{MemoryStore, SqliteStore, StoreError, StoreLocation, TodoStore};

/// Build the full application router.
///
/// `frontend_url` is the allowed CORS origin; `*` allows any origin.
pub fn app(state: AppState, frontend_url: &str) -> Router {
    Router::new()
        .route("/", get(routes::api_status))
        .nest("/api/todos", routes::todo_routes())
        .fallback(routes::route_not_found)
        .method_not_allowed_fallback(routes::route_not_found)
        .layer(CatchPanicLayer::custom(error::handle_panic))
        .layer(middleware::from_fn_with_state(
            state.environment,
            error::expose_error_detail,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(frontend_url))
        .with_state(state)
}

fn cors_layer(frontend_url: &str) -> CorsLayer {
    let methods = [
        Method::GET,
        Method::POST,
        Method::PUT,
        Method::DELETE,
        Method::OPTIONS,
    ];
    if frontend_url.trim() == "*" {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(methods)
            .allow_headers(Any);
    }
    match frontend_url.trim().parse::<HeaderValue>() {
        Ok(origin) => CorsLayer::new()
            .allow_origin(origin)
            .allow_credentials(true)
            .allow_methods(methods)
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]),
        Err(err) => {
            warn!(origin = frontend_url, error = %err, "invalid CORS origin; cross-origin requests disabled");
            CorsLayer::new()
        }
    }
}

/// Serve `app` on `listener` until `shutdown` resolves, then drain
/// in-flight requests.
pub async fn run<F>(listener: TcpListener, app: Router, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "listening");
    }
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
}

/// Resolves on Ctrl+C or SIGTERM.
pub async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            warn!(error = %err, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("received Ctrl+C"),
        () = terminate => info!("received SIGTERM"),
    }
}
