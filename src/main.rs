mod config;
mod email;
mod helloasso;
mod igloo;
mod logsink;
mod webhook;
mod window;

use std::sync::Arc;

use axum::Router;
use tower_http::trace::{DefaultOnResponse, TraceLayer};
use tracing::{info, Level};

use config::Config;
use email::Mailer;
use igloo::Igloohome;
use logsink::LogSink;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub mailer: Mailer,
    pub igloo: Igloohome,
    pub logsink: LogSink,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present (development); in production the deployment
    // environment provides the variables.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "padel_access=info,tower_http=info".into()),
        )
        .init();

    let config = Arc::new(Config::from_env()?);
    if !config.pin_generation_enabled {
        info!("PIN generation disabled — notifications will be acknowledged, not processed");
    }

    let mailer = Mailer::new(&config)?;
    let igloo = Igloohome::new(
        config.igloo_device_id.clone(),
        config.igloo_client_id.clone(),
        config.igloo_client_secret.clone(),
    );
    let logsink = LogSink::new(&config);

    let addr = format!("0.0.0.0:{}", config.port);
    let state = AppState {
        config,
        mailer,
        igloo,
        logsink,
    };

    let app = Router::new()
        .nest("/api", webhook::router())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    let client_ip = request
                        .headers()
                        .get("x-forwarded-for")
                        .and_then(|v| v.to_str().ok())
                        .and_then(|s| s.split(',').next())
                        .map(|s| s.trim().to_string())
                        .unwrap_or_else(|| "-".into());
                    tracing::info_span!(
                        "request",
                        method = %request.method(),
                        uri = %request.uri(),
                        client_ip = %client_ip,
                    )
                })
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .with_state(state);

    info!("padel-access listening on {addr}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
