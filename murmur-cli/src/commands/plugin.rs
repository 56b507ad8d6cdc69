//! Plugin management commands

use anyhow::Result;
use clap::{Args, Subcommand};
use murmur_core::config::InstanceConfig;
use murmur_core::notify::NotifyStack;
use murmur_core::plugins::{LifecycleState, PluginHost, PluginHostConfig};
use std::sync::Arc;

/// Plugin management arguments
#[derive(Args)]
pub struct PluginArgs {
    #[command(subcommand)]
    pub command: PluginCommands,
}

/// Plugin subcommands
#[derive(Subcommand)]
pub enum PluginCommands {
    /// List installed plugins and their activation state
    List,
    /// Enable a plugin
    Enable {
        /// Plugin name to enable
        name: String,
    },
    /// Disable a plugin
    Disable {
        /// Plugin name to disable
        name: String,
    },
    /// Show plugin details
    Info {
        /// Plugin name
        name: String,
    },
}

fn make_host() -> Result<PluginHost> {
    let config_path = murmur_paths::config_dir().join("config.toml");
    let mut config = InstanceConfig::load(&config_path)?;
    // management commands never hit update sources
    config.auto_update = false;

    Ok(PluginHost::new(
        PluginHostConfig::default(),
        config,
        Arc::new(NotifyStack::new()),
    ))
}

/// Run plugin command
pub async fn run(args: PluginArgs) -> Result<()> {
    let mut host = make_host()?;

    match args.command {
        PluginCommands::List => list_plugins(&mut host).await,
        PluginCommands::Enable { name } => enable_plugin(&mut host, &name),
        PluginCommands::Disable { name } => disable_plugin(&mut host, &name),
        PluginCommands::Info { name } => show_plugin_info(&mut host, &name).await,
    }
}

async fn list_plugins(host: &mut PluginHost) -> Result<()> {
    let report = host.activate_all().await?;

    if report.entries.is_empty() {
        println!("No plugins installed");
        println!();
        println!("Plugin directory: {}", murmur_paths::data_dir().join("plugins").display());
        println!();
        println!("To install a plugin:");
        println!("  1. Create a plugin directory with a manifest.toml");
        println!("  2. Copy the plugin library next to it");
        println!("  3. Run 'murmur plugin list' to verify it activates");
        return Ok(());
    }

    for (name, state) in &report.entries {
        let (status, detail) = match state {
            LifecycleState::Active => ("✓", String::new()),
            LifecycleState::Skipped { reason } => ("○", format!("({reason})")),
            LifecycleState::Errored { error } => ("✗", format!("({error})")),
        };

        match host.plugin_info(name) {
            Some(info) => println!(
                "{} {} v{}    {} {}",
                status, name, info.version, info.description, detail
            ),
            None => println!("{status} {name}    {detail}"),
        }
    }

    Ok(())
}

fn enable_plugin(host: &mut PluginHost, name: &str) -> Result<()> {
    host.enable_plugin(name)?;
    println!("Enabled plugin: {name}");
    println!("Run 'murmur plugin list' to verify the plugin activates correctly.");
    Ok(())
}

fn disable_plugin(host: &mut PluginHost, name: &str) -> Result<()> {
    host.disable_plugin(name)?;
    println!("Disabled plugin: {name}");
    Ok(())
}

async fn show_plugin_info(host: &mut PluginHost, name: &str) -> Result<()> {
    host.activate_all().await?;

    if let Some(info) = host.plugin_info(name) {
        println!("Name:        {}", info.name);
        println!("Version:     {}", info.version);
        println!(
            "Author:      {}",
            if info.author.is_empty() {
                "Unknown"
            } else {
                &info.author
            }
        );
        println!(
            "Description: {}",
            if info.description.is_empty() {
                "No description"
            } else {
                &info.description
            }
        );
        println!();

        match &info.state {
            LifecycleState::Active => println!("Status:      Active"),
            LifecycleState::Skipped { reason } => println!("Status:      Skipped ({reason})"),
            LifecycleState::Errored { error } => println!("Status:      Errored ({error})"),
        }

        let commands: Vec<_> = host
            .commands()
            .commands()
            .into_iter()
            .filter(|c| c.plugin == name)
            .collect();
        if !commands.is_empty() {
            println!();
            println!("Commands:");
            for cmd in commands {
                println!(
                    "  {}    {}",
                    cmd.spec.aliases.join(", "),
                    cmd.spec.description
                );
            }
        }
    } else {
        println!("Plugin '{name}' not found");
        println!();
        println!("The plugin might not be installed or enabled.");
        println!("Run 'murmur plugin list' to see all plugins.");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plugin_args_parsing() {
        use clap::Parser;

        #[derive(Parser)]
        struct TestCli {
            #[command(subcommand)]
            cmd: PluginCommands,
        }

        let cli = TestCli::parse_from(["test", "list"]);
        assert!(matches!(cli.cmd, PluginCommands::List));

        let cli = TestCli::parse_from(["test", "enable", "my-plugin"]);
        assert!(matches!(cli.cmd, PluginCommands::Enable { name } if name == "my-plugin"));

        let cli = TestCli::parse_from(["test", "disable", "my-plugin"]);
        assert!(matches!(cli.cmd, PluginCommands::Disable { name } if name == "my-plugin"));

        let cli = TestCli::parse_from(["test", "info", "my-plugin"]);
        assert!(matches!(cli.cmd, PluginCommands::Info { name } if name == "my-plugin"));
    }
}
