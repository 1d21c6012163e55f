use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = epistle_core::Config::load()?;
    info!(
        "Configuration loaded (generation model: {}, embedding model: {})",
        config.settings.generation.model, config.settings.embedding.model
    );

    epistle_responder::app::run(config).await
}
