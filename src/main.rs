//! Weixin Pay upload media demo
//!
//! Uploads the configured media file once and prints the gateway's answer.

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use wxpay_uploadmedia::upload::{SignedUploadRequestBuilder, UploadClient};
use wxpay_uploadmedia::{Config, Credentials, UploadError};

#[tokio::main]
async fn main() {
    // Load .env first so RUST_LOG and WXPAY_* overrides from it apply
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "wxpay_uploadmedia=info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("===start===");

    if let Err(e) = run().await {
        let code = e
            .downcast_ref::<UploadError>()
            .map(UploadError::code)
            .unwrap_or("UNKNOWN");
        tracing::error!(code = code, "Upload failed: {:#}", e);
        std::process::exit(1);
    }

    tracing::info!("===done===");
}

async fn run() -> anyhow::Result<()> {
    let config_path = Config::resolve_path(std::env::args().nth(1));
    let config = Config::load(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;
    tracing::debug!(config = ?config, "Configuration loaded");

    let credentials = Credentials::load(&config).await?;

    let upload = SignedUploadRequestBuilder::new(&credentials)
        .with_algorithm(config.digest)
        .build(&config.img_file)
        .await?;
    tracing::info!("Request in XML:\n{}", upload.request.to_xml()?);

    let client = UploadClient::from_config(&credentials, &config)?;
    tracing::info!(endpoint = %client.endpoint(), "Uploading media");

    let response = client.send_request(upload.body).await?;
    if !response.is_success() {
        tracing::warn!(status = response.status, "Gateway returned a non-success status");
    }

    Ok(())
}
