//! bayeux-tail - subscribe to Bayeux channels and print what arrives.
//!
//! Connects, handshakes with the given authentication fields, subscribes to
//! every `--channel` and prints each message as one JSON line until Ctrl-C,
//! which disconnects cleanly.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use bayeux_client::{BayeuxClient, ChannelDelegate, ClientConfig, ClientEvent, LogRecorder};
use clap::Parser;
use mimalloc::MiMalloc;

/// Global allocator configured per M-MIMALLOC-APPS guideline.
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[derive(Parser)]
#[command(name = "bayeux-tail")]
#[command(version)]
#[command(about = "Tail Bayeux (CometD) channels over WebSocket")]
struct Cli {
    /// Server URL, e.g. https://example.com/cometd (overrides the config file)
    #[arg(long)]
    url: Option<String>,

    /// Connect with wss:// instead of ws://
    #[arg(long)]
    secure: bool,

    /// Channel to subscribe to (repeatable)
    #[arg(long = "channel", short = 'c', required = true)]
    channels: Vec<String>,

    /// Handshake authentication fields as a JSON object
    #[arg(long, default_value = "{}")]
    auth: String,

    /// JSON config file
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_secs()
        .init();

    let cli = Cli::parse();

    let mut config = ClientConfig::load(cli.config.as_deref())?;
    if let Some(url) = cli.url {
        config.url = url;
    }
    if cli.secure {
        config.force_secure = true;
    }
    if config.url.is_empty() {
        anyhow::bail!("No server URL: pass --url, set BAYEUX_URL or use --config");
    }

    let auth: serde_json::Value =
        serde_json::from_str(&cli.auth).context("--auth must be a JSON object")?;

    let client = BayeuxClient::configure(config, Some(Arc::new(LogRecorder)))
        .context("Invalid client configuration")?;
    let (delegate, mut events) = ChannelDelegate::new();
    client.set_delegate(Arc::new(delegate));

    for channel in &cli.channels {
        client.subscribe_to_channel(channel, None);
    }
    client.handshake(auth);

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                match event {
                    ClientEvent::Message { channel, data } => {
                        println!("{}", serde_json::json!({"channel": channel, "data": data}));
                    }
                    ClientEvent::HandshakeSucceeded(_) => {
                        log::info!("Handshake succeeded (clientId={})", client.client_id());
                    }
                    ClientEvent::HandshakeFailed(error) => {
                        anyhow::bail!("Handshake failed: {}", error);
                    }
                    ClientEvent::AdvisedToRehandshake => {
                        log::warn!("Server requested a new handshake, exiting");
                        break;
                    }
                    ClientEvent::Subscribed(channel) => log::info!("Subscribed to {}", channel),
                    ClientEvent::SubscriptionFailed(error) => log::warn!("{}", error),
                    other => log::debug!("{:?}", other),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                log::info!("Interrupted, disconnecting");
                client.disconnect_from_server();
                break;
            }
        }
    }

    Ok(())
}
