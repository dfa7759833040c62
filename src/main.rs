//! Vaporvibe - session and A/B fork state server
//!
//! CLI entry point for the Vaporvibe server.

#![forbid(unsafe_code)]

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod cli;
mod cookies;
mod server;

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    // VAPORVIBE_LOG_FORMAT=json for structured output
    let json = std::env::var("VAPORVIBE_LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json"));
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "vaporvibe=info,vaporvibe_session=info,tower_http=info".into()
            }),
        )
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(tracing_subscriber::fmt::layer))
        .init();

    let cli = cli::Cli::parse();
    info!("Starting Vaporvibe v{}", env!("CARGO_PKG_VERSION"));

    cli::run(cli).await
}
