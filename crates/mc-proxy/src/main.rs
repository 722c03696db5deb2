mod config;
mod error;
mod forwarder;
mod frame;
mod handlers;
mod packet;
mod queue;
mod session;
mod status;
mod supervisor;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::info;

use config::{PreferenceValue, Preferences};
use status::TracingStatusSink;
use supervisor::Supervisor;

/// MITM proxy for the Minecraft Java Edition 1.15.2 protocol: sits between
/// a client and a real server, inspecting and rewriting packets in flight.
#[derive(Parser, Clone, Debug)]
#[command(name = "mc-proxy")]
struct CommandLineArguments {
    /// Address the proxy listens on for the client.
    #[arg(long, env = "MC_PROXY_LISTEN", default_value = "0.0.0.0:25565")]
    listen: SocketAddr,

    /// Address of the real server the proxy connects onward to.
    #[arg(long, env = "MC_PROXY_SERVER", default_value = "127.0.0.1:25566")]
    server: SocketAddr,

    /// Flat JSON file preferences are loaded from and saved back to.
    #[arg(long, env = "MC_PROXY_PREFS", default_value = "preferences.json")]
    preferences: PathBuf,

    /// Shorthand for `EnableFakename` + `FakenameInput`: login as this name
    /// instead of whatever the client presents.
    #[arg(long, env = "MC_PROXY_FAKENAME")]
    fakename: Option<String>,
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive("mc_proxy=info".parse()?),
        )
        .init();

    let args = CommandLineArguments::parse();

    let mut preferences = Preferences::load_from_file(&args.preferences);
    if let Some(fakename) = &args.fakename {
        preferences.set("EnableFakename", PreferenceValue::Bool(true))?;
        preferences.set("FakenameInput", PreferenceValue::Text(fakename.clone()))?;
    }
    preferences.save_to_file(&args.preferences)?;

    info!(listen = %args.listen, server = %args.server, "starting proxy");

    let supervisor = Supervisor::new(
        args.listen,
        args.server,
        preferences,
        Arc::new(TracingStatusSink),
    );
    supervisor.run().await?;
    Ok(())
}
