//! Explicit plugin update pass

use anyhow::Result;
use clap::Args;
use murmur_core::config::InstanceConfig;
use murmur_core::notify::NotifyStack;
use murmur_core::plugins::{PluginHost, PluginHostConfig, UpdateStatus};
use std::sync::Arc;

/// Update arguments
#[derive(Args)]
pub struct UpdateArgs {}

pub async fn run(_args: UpdateArgs) -> Result<()> {
    let config_path = murmur_paths::config_dir().join("config.toml");
    let config = InstanceConfig::load(&config_path)?;

    let mut host = PluginHost::new(
        PluginHostConfig::default(),
        config,
        Arc::new(NotifyStack::new()),
    );

    let results = host.update_all().await?;
    if results.is_empty() {
        println!("No plugins installed");
        return Ok(());
    }

    for (name, status) in results {
        match status {
            UpdateStatus::Updated => println!("{name}: updated"),
            UpdateStatus::UpToDate => println!("{name}: up to date"),
            UpdateStatus::NoSource => println!("{name}: no update source"),
        }
    }

    Ok(())
}
