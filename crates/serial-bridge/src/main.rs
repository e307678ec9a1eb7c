//! Serial-Over-IP server entry point.
//!
//! Opens and configures the device once, binds the listener, then serves
//! one forwarding session at a time until the process is killed. Every
//! startup failure (device open/setup, bind, bad settings) is fatal and
//! reported with its cause chain.

use clap::Parser;
use std::net::SocketAddr;
use tracing::info;
use tracing_subscriber::EnvFilter;

use serial_bridge::listener::Listener;
use serial_bridge::server::serve;
use serial_bridge::settings::Args;

// Sessions are strictly serialized, so one thread is all the runtime needs.
#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let settings = Args::parse().into_settings()?;
    info!(
        device = %settings.device.path.display(),
        kind = %settings.device.kind,
        raw = settings.device.raw_mode,
        "serial bridge starting"
    );

    let mut device = serial_core::open_device(&settings.device)?;
    let listener = Listener::bind(SocketAddr::new(settings.bind_address, settings.port))?;

    serve(&mut device, &listener).await?;
    Ok(())
}
