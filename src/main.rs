//! Demo: publish a service and browse for peers on the local network.

use anyhow::Result;
use dnssd::{BrowseEvent, Mdns, MdnsConfig, ServiceConfig};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let mdns = Mdns::new(MdnsConfig::default())?;

    let mut config = ServiceConfig::new("dnssd demo", "http", 8080);
    config.txt.insert("path", "/");
    let service = mdns.publish(config)?;
    info!("publishing {:?}", service.fqdn());

    let browser = mdns.browse(None);
    let mut events = browser.events();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            event = events.recv() => match event {
                Ok(BrowseEvent::Up(peer)) => {
                    info!("up: {} ({}:{})", peer.fqdn, peer.host, peer.port)
                }
                Ok(BrowseEvent::Update(peer)) => info!("update: {}", peer.fqdn),
                Ok(BrowseEvent::Down(peer)) => info!("down: {}", peer.fqdn),
                Err(_) => break,
            }
        }
    }

    info!("shutting down");
    browser.stop();
    mdns.unpublish_all().await?;
    mdns.destroy();
    Ok(())
}
