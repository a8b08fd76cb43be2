//! 🔧 App Configuration: the sacred TOML-to-struct pipeline.
//!
//! 🏗️ Powered by Figment, because hand-parsing env vars is a form of self-harm that even
//! the borrow checker wouldn't approve of.
//!
//! 📐 Layering:
//!   - `OSB_*` environment variables first. Nested keys use `__`: `OSB_TRANSPORT__ELASTICSEARCH__URL`.
//!   - The TOML file, if one was given, merged on top. TOML wins on conflicts.

use std::path::{Path, PathBuf};

use anyhow::Context;
use figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use serde::Deserialize;
use tracing::info;

use crate::transport::TransportConfig;

/// 📦 Everything the ingest run needs to know about itself.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    /// 📡 Where the bulk calls go.
    pub transport: TransportConfig,
    /// 📥 What to read and where to write it.
    pub ingest: IngestConfig,
    #[serde(default)]
    pub runtime: RuntimeConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct IngestConfig {
    /// NDJSON records, one object per line. `.gz` is inflated on read.
    pub input_file: PathBuf,
    /// Destination template, e.g. `logs-%{YYYY.MM.DD}`.
    pub destination: String,
    /// 📦 Records per bulk call.
    #[serde(default = "default_max_batch_size_docs")]
    pub max_batch_size_docs: usize,
}

fn default_max_batch_size_docs() -> usize {
    1000
}

/// 🧵 Knobs for the submission queue.
#[derive(Debug, Deserialize, Clone)]
pub struct RuntimeConfig {
    /// How many encoded batches may wait for the single writer.
    #[serde(default = "default_queue_capacity", alias = "channel_size")]
    pub queue_capacity: usize,
}

fn default_queue_capacity() -> usize {
    10
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
        }
    }
}

/// 🚀 Load the config from `OSB_*` env vars plus an optional TOML file.
///
/// `None` means env vars only. No file is assumed.
pub fn load_config(config_file_name: Option<&Path>) -> anyhow::Result<AppConfig> {
    info!(
        "🔧 Loading configuration: {:#?}",
        config_file_name.unwrap_or(Path::new(""))
    );

    let config = Figment::new().merge(Env::prefixed("OSB_").split("__"));
    let config = match config_file_name {
        Some(file_name) => config.merge(Toml::file(file_name)),
        None => config,
    };

    let context_msg = match config_file_name {
        Some(path) => format!(
            "💀 Failed to parse configuration from file '{}' and environment variables (OSB_*). \
             Check the section names: [transport.Elasticsearch] (or [transport.InMemory]), [ingest], [runtime].",
            path.display()
        ),
        None => "💀 Failed to parse configuration from environment variables (OSB_*). \
                 No file was provided, so this one's all on the environment."
            .to_string(),
    };

    config.extract().context(context_msg)
}
