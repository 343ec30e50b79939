use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::sync::mpsc;
use tokio::time::interval;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use chatrelay::bridge::{serve_events, HttpBridgeClient};
use chatrelay::{
    DispatchLoop, InboundHandler, MessagingClient, QueueStore, RedisQueueStore, RelayConfig,
    RelayContext,
};

#[derive(Parser)]
#[command(name = "chatrelay-agent")]
#[command(version)]
#[command(about = "Relay outbound queue commands to a chat account and archive its traffic")]
struct Cli {
    /// TOML configuration file; defaults apply when omitted.
    #[arg(long, short, env = "CHATRELAY_CONFIG")]
    config: Option<PathBuf>,

    #[arg(long, env = "CHATRELAY_LOG", default_value = "info")]
    log_filter: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    Serve(ServeArgs),
    /// Print the effective configuration and exit.
    Config,
}

#[derive(Parser)]
struct ServeArgs {
    #[arg(long)]
    redis_url: Option<String>,

    #[arg(long)]
    bridge_url: Option<String>,

    #[arg(long)]
    events_bind_addr: Option<String>,

    #[arg(long)]
    poll_interval_secs: Option<u64>,

    #[arg(long)]
    recall_window_secs: Option<u64>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(&cli.log_filter);

    let result = match load_config(cli.config.as_ref()) {
        Ok(config) => match cli.command {
            Commands::Serve(args) => serve(config, args).await,
            Commands::Config => print_config(&config),
        },
        Err(e) => Err(e),
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn init_tracing(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<RelayConfig> {
    let mut config = match path {
        Some(path) => RelayConfig::from_file(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => RelayConfig::default(),
    };
    config.apply_env().context("invalid CHATRELAY_* environment")?;
    Ok(config)
}

fn print_config(config: &RelayConfig) -> anyhow::Result<()> {
    let rendered = toml::to_string_pretty(config).context("failed to render config")?;
    println!("{}", rendered);
    Ok(())
}

async fn serve(mut config: RelayConfig, args: ServeArgs) -> anyhow::Result<()> {
    if let Some(url) = args.redis_url {
        config.redis_url = url;
    }
    if let Some(url) = args.bridge_url {
        config.bridge.base_url = url;
    }
    if let Some(addr) = args.events_bind_addr {
        config.bridge.bind_addr = addr;
    }
    if let Some(secs) = args.poll_interval_secs {
        config.poll_interval_secs = secs;
    }
    if let Some(secs) = args.recall_window_secs {
        config.recall_window_secs = secs;
    }
    config.validate()?;

    info!("[Agent] Bridge: {}", config.bridge.base_url);
    info!("[Agent] Queue store: {}", config.redis_url);

    let client: Arc<dyn MessagingClient> = Arc::new(HttpBridgeClient::new(&config.bridge));
    let queue: Arc<dyn QueueStore> = Arc::new(RedisQueueStore::connect(&config.redis_url).await?);
    let ctx = Arc::new(RelayContext::new(&config, client, queue)?);

    ctx.dump_directory().await;

    let (events_tx, events_rx) = mpsc::channel(256);
    let bind_addr = config.bridge.bind_addr.clone();
    let secret = config.bridge.shared_secret.clone();
    tokio::spawn(async move {
        if let Err(e) = serve_events(&bind_addr, secret, events_tx).await {
            error!("[Agent] Event webhook failed: {}", e);
        }
    });

    let inbound = InboundHandler::new(Arc::clone(&ctx));
    tokio::spawn(async move { inbound.run(events_rx).await });

    let dump_ctx = Arc::clone(&ctx);
    let dump_every = config.directory_dump_interval();
    if dump_every > Duration::ZERO {
        tokio::spawn(async move {
            let mut ticker = interval(dump_every);
            // first tick fires immediately; the startup dump already ran
            ticker.tick().await;
            loop {
                ticker.tick().await;
                dump_ctx.dump_directory().await;
            }
        });
    }

    let dispatch = DispatchLoop::new(Arc::clone(&ctx), config.poll_interval());
    tokio::select! {
        _ = dispatch.run() => {}
        _ = tokio::signal::ctrl_c() => {
            info!("[Agent] Interrupted, shutting down");
        }
    }
    Ok(())
}
