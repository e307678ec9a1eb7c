//! Serial-Over-IP client entry point.
//!
//! Connects to a remote bridge, allocates a pty pair, reports the follower
//! path, and forwards until either side goes away. Resolution or connection
//! failure is fatal; when the session ends, so does the process.

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use serial_core::forward;
use serial_pty::{pty::Pty, remote};

/// Command-line options: `serial-pty <host> <port>`.
#[derive(Debug, Parser)]
#[command(
    name = "serial-pty",
    about = "Present a remote serial bridge as a local pseudo-terminal"
)]
struct Args {
    /// Host running the serial bridge.
    host: String,

    /// TCP port the bridge listens on.
    port: u16,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let mut stream = remote::connect(&args.host, args.port).await?;
    let mut pty = Pty::allocate()?;
    info!(
        path = %pty.follower_path().display(),
        "pty ready; attach your terminal program here"
    );

    let reason = forward::run(&mut stream, pty.master_mut()).await;
    info!(?reason, "session ended");
    Ok(())
}
