//! nmosim daemon entry point: every configured NMOS mock device plus the
//! registry, each on its own port.

use std::sync::Arc;

use log::{error, info};
use tokio::signal;
use tokio::task::JoinHandle;

mod catalog;
mod channel_mapping;
mod config;
mod connection;
mod device;
mod error;
mod event_tally;
mod http;
mod registry;
mod sdp;
mod types;

use catalog::profiles;
use channel_mapping::{run_channel_mapping, ChannelMapping};
use config::{Config, DeviceConfig};
use device::{run_device, DeviceContext};
use event_tally::{run_event_tally, EventTally};
use registry::{run_registry, Aggregator};
use types::DeviceProfile;

/// Spawn a service task that logs instead of propagating its failure.
fn spawn_service<F>(name: String, service: F) -> JoinHandle<()>
where
    F: std::future::Future<Output = anyhow::Result<()>> + Send + 'static,
{
    tokio::spawn(async move {
        if let Err(e) = service.await {
            error!("{} failed: {}", name, e);
        }
    })
}

fn spawn_device(cfg: &Config, device: &DeviceConfig) -> JoinHandle<()> {
    let identity = cfg.identity(device);
    let addr = cfg.bind_addr(device.port);
    let name = identity.label.clone();
    match device.profile {
        DeviceProfile::EventTally => {
            let service = Arc::new(EventTally::seeded(identity.node_id, &cfg.versions.events));
            spawn_service(name, run_event_tally(addr, service))
        }
        DeviceProfile::ChannelMapping => {
            let service = Arc::new(ChannelMapping::seeded(
                identity.node_id,
                &cfg.versions.channelmapping,
            ));
            spawn_service(name, run_channel_mapping(addr, service))
        }
        profile => {
            let service = async move {
                let catalog = profiles::build(profile, identity.clone())
                    .ok_or_else(|| anyhow::anyhow!("{:?} has no node catalog", profile))?;
                run_device(addr, Arc::new(DeviceContext::new(identity, catalog))).await
            };
            spawn_service(name, service)
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    env_logger::init();

    // Load configuration
    let cfg = Config::load()?;
    info!("Starting nmosim with config: {:?}", cfg);

    let mut handles: Vec<JoinHandle<()>> = cfg
        .devices
        .iter()
        .map(|device| spawn_device(&cfg, device))
        .collect();

    // Registry
    if let Some(registry) = &cfg.registry {
        let aggregator = Arc::new(Aggregator::from_config(registry, &cfg.versions.node)?);
        let addr = cfg.bind_addr(registry.port);
        let version = cfg.versions.query.clone();
        handles.push(spawn_service("Registry".into(), async move {
            run_registry(addr, aggregator, &version).await
        }));
    }

    // Graceful Shutdown
    match signal::ctrl_c().await {
        Ok(()) => {
            info!("Received Ctrl+C, shutting down...");
        }
        Err(err) => {
            error!("Unable to listen for shutdown signal: {}", err);
        }
    }

    for handle in &handles {
        handle.abort();
    }

    info!("Shutdown complete.");
    Ok(())
}
