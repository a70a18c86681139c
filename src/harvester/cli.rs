use std::time::Duration;

use clap::Args;

use crate::oai::{DEFAULT_ENDPOINT, DEFAULT_METADATA_PREFIX, OaiConfig};

#[derive(Debug, Args)]
pub struct OaiArgs {
    /// OAI endpoint url
    #[arg(short, long, default_value = DEFAULT_ENDPOINT, env = "OAI_ENDPOINT")]
    pub endpoint: String,

    /// Request timeout in seconds (no timeout when unset)
    #[arg(long, env = "OAI_TIMEOUT")]
    pub timeout: Option<u64>,
}

#[derive(Debug, Args)]
pub struct HarvesterArgs {
    /// OAI set to report on
    #[arg(default_value = "illustrierte.liedflugschriften")]
    pub set: String,

    #[command(flatten)]
    pub oai: OaiArgs,

    /// OAI metadata prefix
    #[arg(short, long, default_value = DEFAULT_METADATA_PREFIX, env = "METADATA_PREFIX")]
    pub metadata_prefix: String,

    /// Stop after this many records
    #[arg(short, long)]
    pub limit: Option<usize>,
}

#[derive(Debug, Args)]
pub struct StatusArgs {
    #[command(flatten)]
    pub oai: OaiArgs,
}

impl OaiArgs {
    pub fn config(&self) -> OaiConfig {
        OaiConfig {
            endpoint: self.endpoint.clone(),
            timeout: self.timeout.map(Duration::from_secs),
            ..OaiConfig::default()
        }
    }
}

impl HarvesterArgs {
    pub fn config(&self) -> OaiConfig {
        OaiConfig {
            metadata_prefix: self.metadata_prefix.clone(),
            ..self.oai.config()
        }
    }
}
