use std::sync::Arc;
use std::time::Duration;

use plc_core::{Logic, Memory};
use plc_server::{Server, ServerConfig};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let config = ServerConfig::load()?;
    let bind_addr = config.bind_addr.parse()?;

    let memory = Arc::new(Memory::new());
    let heartbeat_interval = config.heartbeat_interval_ms.map(Duration::from_millis);
    let controller = plc_core::Controller::new(memory.clone(), heartbeat_interval, config.heartbeat_key).await;
    let logic = Logic::new(controller);

    tokio::spawn({
        let logic_memory = logic;
        async move {
            logic_memory.wait_until_connected(None).await;
            tracing::info!("first client connection observed");
        }
    });

    let server = Server::new(memory, bind_addr);
    server.start().await?;
    tracing::info!("plc-server running, press ctrl-c to stop");

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown signal received");
    server.stop().await;

    Ok(())
}
