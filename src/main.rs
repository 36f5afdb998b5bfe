//! `chatbridge` CLI entry point.
//!
//! Provides `backends`, `inspect` and `watch` subcommands for listing the
//! registered backends, connecting once to print what the session sees, or
//! streaming canonical events until interrupted.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use futures::StreamExt;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use chatbridge::backends::LoopbackClient;
use chatbridge::{
    Bridge, BackendRegistry, BackendSelection, BridgeConfig, ChannelKind, EventKind,
};

/// Chatbridge: one chat API over interchangeable platform backends.
#[derive(Parser)]
#[command(name = "chatbridge", version, about)]
struct Cli {
    /// Backend identifier or `auto`; overrides the config file.
    #[arg(long, global = true)]
    backend: Option<BackendSelection>,
    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

/// Available CLI subcommands.
#[derive(Subcommand)]
enum Command {
    /// List registered backends in selection order.
    Backends {
        /// Print one JSON object per backend instead of a table.
        #[arg(long)]
        json: bool,
    },
    /// Connect, print guilds and channels, then shut down.
    Inspect,
    /// Print canonical events until Ctrl-C.
    Watch {
        /// Event kinds to listen for (default: every supported kind).
        #[arg(long = "kind")]
        kinds: Vec<EventKind>,
        /// Post a message every few seconds (loopback backend only).
        #[arg(long)]
        simulate: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = BridgeConfig::load().context("failed to load configuration")?;
    if let Some(backend) = cli.backend {
        config.bridge.backend = backend;
    }

    match cli.command {
        Command::Backends { json } => {
            chatbridge::logging::init_cli(&config.logging.level);
            handle_backends(json)
        }
        Command::Inspect => {
            chatbridge::logging::init_cli(&config.logging.level);
            handle_inspect(&config).await
        }
        Command::Watch { kinds, simulate } => {
            let _logging_guard = match &config.logging.directory {
                Some(dir) => Some(chatbridge::logging::init_production(dir, &config.logging.level)?),
                None => {
                    chatbridge::logging::init_cli(&config.logging.level);
                    None
                }
            };
            handle_watch(&config, kinds, simulate).await
        }
    }
}

/// Print every discovered backend.
fn handle_backends(json: bool) -> anyhow::Result<()> {
    let registry = BackendRegistry::discover().context("backend discovery failed")?;
    if json {
        for descriptor in registry.descriptors() {
            let capabilities: Vec<String> = descriptor
                .capabilities()
                .iter()
                .map(ToString::to_string)
                .collect();
            let kinds: Vec<String> = descriptor
                .supported_channel_kinds()
                .iter()
                .map(|kind| format!("{kind:?}"))
                .collect();
            let line = serde_json::json!({
                "id": descriptor.id,
                "name": descriptor.name,
                "priority": descriptor.priority,
                "capabilities": capabilities,
                "channel_kinds": kinds,
            });
            println!("{line}");
        }
        return Ok(());
    }
    if registry.is_empty() {
        println!("no backends registered");
        return Ok(());
    }
    for descriptor in registry.descriptors() {
        let capabilities: Vec<String> = descriptor
            .capabilities()
            .iter()
            .map(ToString::to_string)
            .collect();
        println!(
            "{:<12} priority={:<4} {} [{}]",
            descriptor.id,
            descriptor.priority,
            descriptor.name,
            capabilities.join(", ")
        );
    }
    Ok(())
}

/// Connect and print what the session can see.
async fn handle_inspect(config: &BridgeConfig) -> anyhow::Result<()> {
    let bridge = connect(config).await?;

    let capabilities: Vec<String> = bridge.capabilities().iter().map(ToString::to_string).collect();
    println!("backend: {} (session {})", bridge.backend_id(), bridge.session());
    println!("capabilities: [{}]", capabilities.join(", "));

    for guild in bridge.guilds().await? {
        println!("guild {} '{}'", guild.id, guild.name);
        for channel in bridge.channels(&guild).await? {
            let name = channel.name.known().cloned().flatten().unwrap_or_default();
            println!("  #{name} {} ({:?})", channel.id, channel.kind);
        }
        for role in bridge.roles(&guild).await? {
            println!("  @{} {}", role.name, role.id);
        }
    }

    bridge.shutdown().await?;
    Ok(())
}

/// Stream events of `kinds` until Ctrl-C.
async fn handle_watch(config: &BridgeConfig, kinds: Vec<EventKind>, simulate: bool) -> anyhow::Result<()> {
    let bridge = connect(config).await?;

    let kinds = if kinds.is_empty() {
        EventKind::ALL.to_vec()
    } else {
        kinds
    };
    let mut streams = Vec::new();
    for kind in kinds {
        match bridge.listen(kind) {
            Ok(stream) => streams.push(stream),
            Err(e) => warn!(%kind, error = %e, "skipping event kind"),
        }
    }
    if streams.is_empty() {
        anyhow::bail!("none of the requested event kinds is supported by {}", bridge.backend_id());
    }
    let mut events = futures::stream::select_all(streams);
    let mut diagnostics = bridge.diagnostics();

    let simulation = if simulate {
        Some(spawn_simulation(&bridge).await?)
    } else {
        None
    };

    info!(backend = %bridge.backend_id(), "watching events, press Ctrl-C to stop");
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            event = events.next() => match event {
                Some(event) => println!(
                    "[{} #{} / {}] {}",
                    event.kind, event.sequence, event.session_sequence, event.summary()
                ),
                None => {
                    warn!("event streams ended");
                    break;
                }
            },
            diagnostic = diagnostics.recv() => match diagnostic {
                Ok(d) => warn!(
                    kind = %d.kind,
                    sequence = d.sequence,
                    subscription = %d.subscription,
                    message = %d.message,
                    "subscriber failed"
                ),
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "diagnostics lagged"),
                Err(RecvError::Closed) => {}
            },
        }
    }

    if let Some(task) = simulation {
        task.abort();
    }
    bridge.shutdown().await?;
    Ok(())
}

/// Discover backends and connect the configured one.
async fn connect(config: &BridgeConfig) -> anyhow::Result<Bridge> {
    let registry = BackendRegistry::discover().context("backend discovery failed")?;
    let bridge = registry
        .connect(config)
        .await
        .with_context(|| format!("failed to connect backend '{}'", config.selection()))?;
    Ok(bridge)
}

/// Post to the first text channel of the loopback platform on an interval.
async fn spawn_simulation(bridge: &Bridge) -> anyhow::Result<tokio::task::JoinHandle<()>> {
    let platform = bridge
        .extension::<LoopbackClient>()
        .map(|client| client.platform().clone())
        .context("--simulate requires the loopback backend")?;

    let mut target = None;
    for guild in bridge.guilds().await? {
        let channels = bridge.channels(&guild).await?;
        if let Some(channel) = channels.into_iter().find(|c| c.kind == ChannelKind::Text) {
            target = Some(channel.id);
            break;
        }
    }
    let channel = target.context("loopback platform has no text channel")?;
    let author = platform.add_user("simulator");

    Ok(tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(2));
        let mut count: u64 = 0;
        loop {
            interval.tick().await;
            count = count.saturating_add(1);
            if platform
                .post_message(channel, author, &format!("simulated message {count}"))
                .is_none()
            {
                warn!(%channel, "simulation channel is gone, stopping");
                break;
            }
        }
    }))
}
