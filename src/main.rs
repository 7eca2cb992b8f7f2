use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser; // for cli
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use redirect_relay::sweeper::sweeper;
use redirect_relay::{AppState, Args, RelayConfig, router};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // parse cli arguments
    let args = Args::parse();

    let filter = EnvFilter::try_new(&args.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = RelayConfig::from_args(&args).context("invalid configuration")?;
    if config.encryption_key.is_none() {
        info!("no encryption key configured, generated one for this process");
    }

    // creating shared state
    let state = AppState::new(&config).context("failed to initialize relay state")?;

    // spawn the background sweeper
    let sweeper_task = tokio::spawn(sweeper(Arc::clone(&state), config.sweep_interval));

    let app = router(Arc::clone(&state), config.allowed_origin.clone());

    let listener = tokio::net::TcpListener::bind(config.listen)
        .await
        .with_context(|| format!("failed to bind {}", config.listen))?;

    info!(addr = %config.listen, profile = ?config.profile, "redirect relay listening");
    info!(ttl_secs = config.token_ttl.as_secs(), "token TTL");
    info!(
        limit = config.rate_limit,
        window_secs = config.rate_window.as_secs(),
        "rate limit"
    );

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("server error")?;

    sweeper_task.abort();
    info!("redirect relay stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}
