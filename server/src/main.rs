use anyhow::Context;
use tokio::net::TcpListener;
use todo_server::{app, config::Config, routes::AppState, run, shutdown_signal, store};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,todo_server=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().context("loading configuration")?;
    tracing::info!(
        environment = %config.environment,
        store = %config.store,
        frontend = %config.frontend_url,
        "configuration loaded"
    );

    let store = store::open_for(config.environment, &config.store)
        .await
        .context("connecting to storage")?;

    let router = app(
        AppState::new(store.clone(), config.environment),
        &config.frontend_url,
    );
    let listener = TcpListener::bind(config.addr)
        .await
        .with_context(|| format!("binding {}", config.addr))?;
    tracing::info!(addr = %config.addr, environment = %config.environment, "server running");

    run(listener, router, shutdown_signal()).await?;
    tracing::info!("HTTP server closed");

    store.close().await.context("closing storage")?;
    tracing::info!("storage connection closed");
    Ok(())
}
