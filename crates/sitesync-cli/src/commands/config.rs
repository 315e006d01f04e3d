use std::path::Path;

use sitesync_core::{ClientConfig, CollectionName};

use crate::cli::ConfigCommands;
use crate::commands::common::load_config;
use crate::error::CliError;

pub fn run_config(command: ConfigCommands, config_path: &Path) -> Result<(), CliError> {
    match command {
        ConfigCommands::Init {
            endpoint,
            refresh_interval_ms,
            max_cache_age_ms,
            request_timeout_ms,
            probe_interval_ms,
            collections,
            reported_by,
        } => {
            let overrides = ConfigOverrides {
                refresh_interval_ms,
                max_cache_age_ms,
                request_timeout_ms,
                probe_interval_ms,
                collections,
                reported_by,
            };
            let config = run_config_init(config_path, &endpoint, overrides)?;
            println!(
                "Saved config for {} to {}",
                config.endpoint.as_deref().unwrap_or_default(),
                config_path.display()
            );
            Ok(())
        }
        ConfigCommands::Show => run_config_show(config_path),
    }
}

#[derive(Debug, Default)]
pub struct ConfigOverrides {
    pub refresh_interval_ms: Option<u64>,
    pub max_cache_age_ms: Option<u64>,
    pub request_timeout_ms: Option<u64>,
    pub probe_interval_ms: Option<u64>,
    pub collections: Option<Vec<String>>,
    pub reported_by: Option<String>,
}

/// Write the config file, keeping existing values that were not overridden.
pub fn run_config_init(
    config_path: &Path,
    endpoint: &str,
    overrides: ConfigOverrides,
) -> Result<ClientConfig, CliError> {
    let mut config = ClientConfig::load_from_path(config_path)?;
    config.endpoint = Some(endpoint.to_string());

    if let Some(value) = overrides.refresh_interval_ms {
        config.refresh_interval_ms = value;
    }
    if let Some(value) = overrides.max_cache_age_ms {
        config.max_cache_age_ms = value;
    }
    if let Some(value) = overrides.request_timeout_ms {
        config.request_timeout_ms = value;
    }
    if let Some(value) = overrides.probe_interval_ms {
        config.probe_interval_ms = value;
    }
    if let Some(collections) = overrides.collections {
        config.collections = collections
            .iter()
            .map(|name| CollectionName::new(name.as_str()))
            .collect::<Result<Vec<_>, _>>()?;
        if config.collections.is_empty() {
            return Err(CliError::Config(
                "at least one collection is required".to_string(),
            ));
        }
    }
    if let Some(reported_by) = overrides.reported_by {
        config.reported_by = reported_by;
    }

    config.save_to_path(config_path)?;
    Ok(ClientConfig::load_from_path(config_path)?)
}

pub fn run_config_show(config_path: &Path) -> Result<(), CliError> {
    let config = load_config(config_path)?;
    println!("# {}", config_path.display());
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}
