// Web-based AI quote generator: upload an image, pick a platform, get captions
// written by Google Gemini.

mod api;
mod config;
mod error;
mod gemini;
mod parser;
mod prompt;

use clap::Parser;
use std::sync::Arc;
use tokio::net::TcpListener;

use api::AppState;
use config::Config;
use gemini::GeminiClient;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,quote_generator=debug".into()),
        )
        .init();

    let config = Config::parse();
    tracing::info!("Starting quote generator with config: {:?}", config);

    let api_key = config.api_key_source();
    if api_key.resolve().is_none() {
        tracing::warn!(
            "{} is not set; caption requests will be rejected until it is",
            config.api_key_var
        );
    }

    let state = Arc::new(AppState {
        model: Arc::new(GeminiClient::new(&config.api_base, &config.model)),
        api_key,
    });
    let app = api::router(state, config.max_upload_bytes);

    let listener = TcpListener::bind(&config.server_address()).await?;
    tracing::info!("Server running on http://{}", config.server_address());

    axum::serve(listener, app).await?;
    Ok(())
}
