use frame_relay_server::{ServerConfig, serve};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,frame_relay=debug")))
        .init();

    let config = ServerConfig::from_env();
    serve(config).await
}
