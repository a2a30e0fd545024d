use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tracing::{error, info};

mod config;
mod error;
mod guard;
mod mask;
mod observability;
mod proxy;

use config::Config;
use guard::{guards_from_groups, RuleDecoder};
use mask::{JsonInspector, JsonMasker, PiiClassifier};
use observability::ExchangeLogger;
use proxy::{HttpForwarder, ReverseProxy};

#[derive(Parser, Debug)]
#[command(name = "masking-proxy")]
#[command(about = "Reverse proxy that blocks configured requests and masks PII in JSON responses")]
struct Args {
    #[arg(short, long, env = "CONFIG_FILE", default_value = "config.yaml")]
    config: String,

    /// Overrides the configured listen port
    #[arg(short, long, env = "PORT")]
    port: Option<u16>,

    #[arg(short, long)]
    validate_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = Config::load(&args.config).await?;
    if let Some(port) = args.port {
        config.server.port = port;
        config.validate()?;
    }

    observability::init_tracing(&config.logging)?;

    info!("Starting masking proxy");

    let guard = guards_from_groups(&config.block, &RuleDecoder)
        .context("failed to instantiate blocking guards")?;
    let classifier = PiiClassifier::from_patterns(&config.masking.patterns)?;
    let masker = JsonMasker::new(config.masking.string_placeholder.clone());
    let inspector = JsonInspector::new(Arc::new(masker), Arc::new(classifier));

    if args.validate_config {
        info!("Configuration is valid");
        return Ok(());
    }

    let forwarder = HttpForwarder::new(&config.upstream)?;
    let exchange_log = ExchangeLogger::new(&config.logging.exchange_log).await?;

    let reverse_proxy = Arc::new(ReverseProxy::new(
        &config.upstream,
        Arc::new(guard),
        Arc::new(inspector),
        Arc::new(forwarder),
        Arc::new(exchange_log),
    ));

    let server_config = config.server.clone();
    let server_task = tokio::spawn(async move { reverse_proxy.start(&server_config).await });

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
        result = server_task => {
            let result = result.context("Server task panicked")?;
            if let Err(e) = &result {
                error!("Server error: {:#}", e);
            }
            result?;
            anyhow::bail!("Server task exited unexpectedly");
        }
    }

    info!("Masking proxy shutdown complete");
    Ok(())
}
