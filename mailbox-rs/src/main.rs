use anyhow::Context;
use clap::Parser;
use mailbox_rs::api::{ApiServer, AppState};
use mailbox_rs::config::{Config, LoggingConfig};
use mailbox_rs::dispatch::HttpDispatcher;
use mailbox_rs::mailbox::MailboxIndex;
use mailbox_rs::storage::FsStore;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "mailbox-rs", version, about = "Webmail backend over a blob store")]
struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Override the listen address
    #[arg(short, long)]
    listen: Option<String>,
}

fn init_logging(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("mailbox_rs={},tower_http=info", logging.level)));

    let registry = tracing_subscriber::registry().with(filter);
    if logging.format == "json" {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Load configuration
    let mut config = if args.config.exists() {
        Config::from_file(&args.config)
            .with_context(|| format!("Failed to load {}", args.config.display()))?
    } else {
        Config::default()
    };
    config.apply_env();
    if let Some(listen) = args.listen {
        config.server.listen_addr = listen;
    }

    init_logging(&config.logging);

    info!("Starting mailbox-rs");
    info!("  Listening on: {}", config.server.listen_addr);
    info!("  Store root: {}", config.store.root);
    info!("  Outbound service: {}", config.dispatch.outbound_url);

    let store = Arc::new(
        FsStore::new(&config.store.root).with_inline_metadata(config.store.inline_metadata),
    );
    let index = MailboxIndex::new(store).with_message_suffix(config.store.message_suffix.clone());

    let dispatcher = HttpDispatcher::new(
        config.dispatch.outbound_url.clone(),
        Duration::from_secs(config.dispatch.timeout_seconds),
    )
    .context("Failed to create reply dispatcher")?;

    let state = AppState::new(index, Arc::new(dispatcher), config.defaults.clone());
    let server = ApiServer::new(state, config.server.listen_addr.clone())
        .with_static_dir(config.server.static_dir.clone());

    server.run().await.context("API server failed")?;

    Ok(())
}
