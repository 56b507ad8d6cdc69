//! Run the bot on the console loopback transport

use crate::client::LoopbackClient;
use anyhow::Result;
use clap::Args;
use murmur_core::config::InstanceConfig;
use murmur_core::dispatch::Dispatcher;
use murmur_core::notify::NotifyStack;
use murmur_core::plugins::{PluginHost, PluginHostConfig};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

/// Run arguments
#[derive(Args)]
pub struct RunArgs {
    /// Path to the instance config (defaults to the murmur config dir)
    #[arg(long)]
    pub config: Option<std::path::PathBuf>,
}

pub async fn run(args: RunArgs) -> Result<()> {
    let config_path = args
        .config
        .unwrap_or_else(|| murmur_paths::config_dir().join("config.toml"));
    let mut config = InstanceConfig::load(&config_path)?;

    // the console user acts as an owner
    let owner = config.owner_ids.iter().next().copied().unwrap_or(0);
    config.owner_ids.insert(owner);

    let notify = Arc::new(NotifyStack::new());
    let mut host = PluginHost::new(PluginHostConfig::default(), config.clone(), notify.clone());

    let permissions_path = murmur_paths::data_dir().join("permissions.toml");
    host.commands_mut().load_permissions(&permissions_path)?;

    let report = host.activate_all().await?;
    tracing::info!(
        active = report.active_count(),
        discovered = report.entries.len(),
        "Plugin activation finished"
    );

    let client = Arc::new(LoopbackClient::new(owner));
    let mut dispatcher = Dispatcher::new(host, client.clone(), notify, &config);

    println!(
        "murmur {} ready. Prefixes: {}. Ctrl-D to quit.",
        config.version_display(),
        config.prefixes.join(", ")
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let event = client.record_line(&line);
        if let Err(e) = dispatcher.handle_message(&event).await {
            tracing::error!(error = %e, "Dispatch failed");
        }
    }

    dispatcher
        .host()
        .commands()
        .save_permissions(&permissions_path)?;
    tracing::info!("Shutting down");
    Ok(())
}
