use chat_relay::app::{DEFAULT_LOG_FILTER, build_app};
use chat_relay::config::{Args, load_env_file};
use chat_relay::rate_limit::RateLimiter;
use chat_relay::state::AppState;
use chat_relay::upstream::Upstream;
use clap::Parser; // for cli
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // before the filter is built, so RUST_LOG may come from the file too
    let env_file = load_env_file(None);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Some(path) = &env_file {
        info!("loaded environment from {}", path.display());
    }

    // parse cli arguments / environment
    let args = Args::parse();

    let rate_limiter = RateLimiter::new(args.daily_limit);
    let sweeper = rate_limiter.spawn_sweeper(Duration::from_secs(args.sweep_interval));

    let upstream = Upstream::new(
        &args.upstream_url,
        &args.model,
        args.api_key.clone(),
        Duration::from_secs(args.upstream_timeout),
    )?;
    if !upstream.has_credential() {
        warn!("DEEPSEEK_API_KEY is not set, chat requests will fail");
    }

    info!("Forwarding to {} (model: {})", upstream.url(), upstream.model());
    info!(
        "Daily limit: {} requests per client ({})",
        args.daily_limit,
        if args.enforce_rate_limit { "enforced" } else { "not enforced" }
    );

    // creating shared state
    let state = Arc::new(AppState {
        upstream,
        rate_limiter,
        enforce_rate_limit: args.enforce_rate_limit,
    });

    let app = build_app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("Relay running on http://localhost:{}", args.port);
    info!("Health check: http://localhost:{}/health", args.port);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    sweeper.shutdown().await;
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown signal received");
}
