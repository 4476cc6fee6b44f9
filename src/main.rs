//! Print-on-Demand Storefront - backend service

use anyhow::Result;
use pod_storefront::config::Config;
use pod_storefront::{api, AppState};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    if config.printful_token.is_none() {
        tracing::warn!("PRINTFUL_TOKEN is not set; fulfillment provider calls will fail");
    }
    if config.stripe_secret_key.is_none() {
        tracing::warn!("STRIPE_SECRET_KEY is not set; checkout calls will fail");
    }

    let port = config.port;
    let app = api::router(AppState::new(config));

    tracing::info!("🚀 pod-storefront listening on 0.0.0.0:{}", port);
    axum::serve(tokio::net::TcpListener::bind(format!("0.0.0.0:{port}")).await?, app).await?;
    Ok(())
}
