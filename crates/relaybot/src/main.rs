use std::sync::Arc;

use tracing::info;

use relaybot_chat::{HttpChatBackend, SessionController};
use relaybot_core::RelayConfig;
use relaybot_discord::{Dispatcher, RelayAdapter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "relaybot=info".into()),
        )
        .init();

    // load config: explicit path via RELAYBOT_CONFIG > ~/.relaybot/relaybot.toml
    let config_path = std::env::var("RELAYBOT_CONFIG").ok();
    let config = RelayConfig::load(config_path.as_deref())?;

    info!(
        identities = config.upstream.identities.len(),
        base_url = %config.upstream.base_url,
        "connecting to upstream chat service"
    );

    let backend = Arc::new(HttpChatBackend::new(config.upstream.base_url.clone()));
    let controller = SessionController::connect(
        backend,
        config.upstream.identities.clone(),
        config.format.clone(),
        config.session.idle_reset_minutes,
    )
    .await?;

    let dispatcher = Arc::new(Dispatcher::new(controller));
    RelayAdapter::new(&config.discord, dispatcher).run().await;

    Ok(())
}
