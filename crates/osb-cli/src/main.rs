//! 🚀 osb-cli: the front door. Loads config, sets up logging, then gets out of the way.
//!
//! 🎬 *[narrator voice]* "It read one file. It made some bulk calls. Nobody was paged."

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use osb::transport::InMemoryTransportConfig;
use osb::TransportConfig;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// 📦 Bulk-load NDJSON records into an Elasticsearch-compatible cluster.
#[derive(Debug, Parser)]
#[command(name = "osb", version, about)]
struct Cli {
    /// Path to the TOML config. If it doesn't exist, only `OSB_*` env vars are used.
    #[arg(default_value = "osb.toml")]
    config: PathBuf,

    /// 🧪 Swap the configured transport for the in-memory one. Nothing leaves the process.
    #[arg(long)]
    dry_run: bool,
}

/// 🚀 main(): trace, parse, load, run, and if it all goes wrong, explain why at 3am volume.
#[tokio::main]
async fn main() -> Result<()> {
    // 📡 println! debugging is a lifestyle choice we're trying to move past
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    // 🔒 Check the file exists before we get emotionally attached
    let config_file = match cli.config.try_exists().with_context(|| {
        format!(
            "💀 Couldn't tell whether the config file exists. If it's a relative path, \
             try an absolute one. Was checking here: '{}'",
            cli.config.display()
        )
    })? {
        true => Some(cli.config.as_path()),
        false => {
            info!(
                "🤷 '{}' not found, configuring from OSB_* env vars alone",
                cli.config.display()
            );
            None
        }
    };

    let mut app_config = osb::load_config(config_file)
        .context("💀 In osb-cli, main, we couldn't load the config. Check the file and the OSB_* env vars.")?;

    if cli.dry_run {
        info!("🧪 dry run: the configured transport is benched for this one");
        app_config.transport = TransportConfig::InMemory(InMemoryTransportConfig::default());
    }

    if let Err(err) = osb::run(app_config).await {
        error!("💀 error: {}", err);
        // -- 🧅 peel the onion, one layer at a time
        let mut the_vibes_are_giving_connection_issues = false;
        for cause in err.chain().skip(1) {
            error!("⚠️  cause: {}", cause);
            let cause_str = cause.to_string();
            if cause_str.contains("error sending request")
                || cause_str.contains("connection refused")
                || cause_str.contains("Connection refused")
                || cause_str.contains("tcp connect error")
                || cause_str.contains("dns error")
            {
                the_vibes_are_giving_connection_issues = true;
            }
        }

        if the_vibes_are_giving_connection_issues {
            error!(
                "🔧 hint: the cluster doesn't seem reachable. Check the url in \
                 [transport.Elasticsearch] and that the cluster is actually up. \
                 `docker ps` is a good first step if it lives in a container. ☕"
            );
        }

        std::process::exit(1);
    }

    Ok(())
}
