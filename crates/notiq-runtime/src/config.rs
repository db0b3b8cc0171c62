//! File config merged with command-line overrides.

use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use notiq_core::{ArbiterConfig, QueueConfig};

use crate::cli::Cli;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotiqConfig {
    pub queue: QueueConfig,
    pub arbiter: ArbiterConfig,
    /// Queue-level signatures.
    pub filters: Vec<String>,
    /// Arbiter-level signatures (`filter_out_messages`).
    pub filter_out_messages: Vec<String>,
}

impl NotiqConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: Self = serde_json::from_str(&raw)
            .map_err(notiq_core::ConfigError::from)
            .with_context(|| format!("parsing config {}", path.display()))?;
        Ok(config)
    }

    /// Config file (if any) with CLI flags applied on top, validated.
    pub fn resolve(cli: &Cli) -> anyhow::Result<Self> {
        let mut config = match &cli.config {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        if let Some(ms) = cli.interval_ms {
            config.queue.despatch_interval_ms = ms;
        }
        if let Some(ms) = cli.modal_timeout_ms {
            config.arbiter.modal_wait_timeout_ms = ms;
        }
        if cli.collapse_duplicates {
            config.queue.collapse_duplicates = true;
        }
        config.filters.extend(cli.filters.iter().cloned());
        config
            .filter_out_messages
            .extend(cli.global_filters.iter().cloned());

        config.queue.validate()?;
        config.arbiter.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::io::Write;

    #[test]
    fn defaults_without_file() {
        let cli = Cli::parse_from(["notiq"]);
        let config = NotiqConfig::resolve(&cli).expect("resolve");
        assert_eq!(config, NotiqConfig::default());
        assert_eq!(config.queue.despatch_interval_ms, 2_000);
    }

    #[test]
    fn file_then_flags() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        write!(
            file,
            r#"{{"queue":{{"despatch_interval_ms":750}},"filters":["from-file"],"arbiter":{{"defer":{{"capacity":4}}}}}}"#
        )
        .expect("write");

        let path = file.path().to_string_lossy().into_owned();
        let cli = Cli::parse_from(["notiq", "-c", path.as_str(), "--filter", "from-flag"]);
        let config = NotiqConfig::resolve(&cli).expect("resolve");
        assert_eq!(config.queue.despatch_interval_ms, 750);
        assert_eq!(config.arbiter.defer.capacity, 4);
        assert_eq!(config.filters, vec!["from-file", "from-flag"]);

        let cli = Cli::parse_from(["notiq", "-c", path.as_str(), "--interval-ms", "100"]);
        let config = NotiqConfig::resolve(&cli).expect("resolve");
        assert_eq!(config.queue.despatch_interval_ms, 100);
    }

    #[test]
    fn zero_interval_rejected() {
        let cli = Cli::parse_from(["notiq", "--interval-ms", "0"]);
        assert!(NotiqConfig::resolve(&cli).is_err());
    }

    #[test]
    fn malformed_file_rejected() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        write!(file, "{{not json").expect("write");
        let path = file.path().to_string_lossy().into_owned();
        let cli = Cli::parse_from(["notiq", "-c", path.as_str()]);
        let err = NotiqConfig::resolve(&cli).unwrap_err();
        assert!(err.to_string().contains("parsing config"));
    }
}
