//! murmur-essentials - basic commands for a murmur instance
//!
//! Ships the small set of commands every instance wants: ping, echo,
//! quoting a replied-to message, a persistent notes store, and a
//! danger-flagged shell escape for the owner.

use murmur_plugin_api::{
    ArgKind, ArgSpec, ArgValue, ChatMessage, CommandReply, CommandSpec, ParsedArgs, Plugin,
    PluginContext, PluginError, export_plugin,
};

#[derive(Default)]
pub struct Essentials;

impl Essentials {
    fn cmd_ping(&self) -> Result<CommandReply, PluginError> {
        Ok(CommandReply::Text("pong".to_string()))
    }

    fn cmd_echo(&self, args: &ParsedArgs) -> Result<CommandReply, PluginError> {
        let text = args
            .get("text")
            .and_then(ArgValue::as_str)
            .ok_or_else(|| PluginError::InvalidInput("text argument missing".to_string()))?;
        Ok(CommandReply::Text(text.to_string()))
    }

    fn cmd_quote(&self, args: &ParsedArgs) -> Result<CommandReply, PluginError> {
        let original = args
            .get("original")
            .and_then(ArgValue::as_str)
            .ok_or_else(|| PluginError::InvalidInput("nothing to quote".to_string()))?;
        Ok(CommandReply::Text(format!("> {original}")))
    }

    fn cmd_note(
        &self,
        action: &str,
        args: &ParsedArgs,
        ctx: &mut PluginContext,
    ) -> Result<CommandReply, PluginError> {
        let key = args
            .get("key")
            .and_then(ArgValue::as_str)
            .ok_or_else(|| PluginError::InvalidInput("key argument missing".to_string()))?
            .to_string();

        match action {
            "set" => {
                let value = args
                    .get("value")
                    .and_then(ArgValue::as_str)
                    .ok_or_else(|| PluginError::InvalidInput("value argument missing".to_string()))?
                    .to_string();
                ctx.config_set(&format!("note.{key}"), value)?;
                let config_path = ctx.plugin_dir().join("config.toml");
                ctx.config_mut().save(&config_path)?;
                Ok(CommandReply::Success(format!("Saved note {key}")))
            }
            "get" => match ctx.config_get::<String>(&format!("note.{key}")) {
                Some(value) => Ok(CommandReply::Text(value)),
                None => Ok(CommandReply::Unsuccess(format!("No note named {key}"))),
            },
            other => Err(PluginError::UnknownCommand(other.to_string())),
        }
    }

    fn cmd_sh(&self, args: &ParsedArgs) -> Result<CommandReply, PluginError> {
        let command = args
            .get("command")
            .and_then(ArgValue::as_str)
            .ok_or_else(|| PluginError::InvalidInput("command argument missing".to_string()))?;

        let output = std::process::Command::new("sh")
            .arg("-c")
            .arg(command)
            .output()
            .map_err(|e| PluginError::Command(e.to_string()))?;

        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        text.push_str(&String::from_utf8_lossy(&output.stderr));
        if text.trim().is_empty() {
            text = format!("(no output, {})", output.status);
        }
        Ok(CommandReply::Text(text))
    }
}

impl Plugin for Essentials {
    fn on_load(&mut self, ctx: &mut PluginContext) -> Result<(), PluginError> {
        ctx.register_command(CommandSpec::new("ping", "Check that the bot is alive"))?;
        ctx.register_command(
            CommandSpec::new("echo", "Repeat the given text")
                .alias("say")
                .arg(ArgSpec::required("text", ArgKind::Str).describe("Text to repeat"))
                .escaping(),
        )?;
        ctx.register_command(
            CommandSpec::new("quote", "Quote the replied-to message")
                .arg(ArgSpec::reply_to("original", ArgKind::Str)),
        )?;
        ctx.register_command(
            CommandSpec::new("note", "Persistent notes")
                .subcommand(
                    CommandSpec::new("set", "Store a note")
                        .arg(ArgSpec::required("key", ArgKind::Str))
                        .arg(ArgSpec::required("value", ArgKind::Str)),
                )
                .subcommand(
                    CommandSpec::new("get", "Read a note")
                        .arg(ArgSpec::required("key", ArgKind::Str)),
                ),
        )?;
        ctx.register_command(
            CommandSpec::new("sh", "Run a shell command on the host")
                .arg(ArgSpec::required("command", ArgKind::Str).describe("Command line to run"))
                .escaping()
                .danger(),
        )?;

        ctx.log_info("essentials loaded");
        Ok(())
    }

    fn handle_command(
        &mut self,
        path: &[String],
        args: &ParsedArgs,
        _event: &ChatMessage,
        ctx: &mut PluginContext,
    ) -> Result<CommandReply, PluginError> {
        match path {
            [cmd] if cmd == "ping" => self.cmd_ping(),
            [cmd] if cmd == "echo" => self.cmd_echo(args),
            [cmd] if cmd == "quote" => self.cmd_quote(args),
            [cmd, action] if cmd == "note" => self.cmd_note(action, args, ctx),
            [cmd] if cmd == "sh" => self.cmd_sh(args),
            other => Err(PluginError::UnknownCommand(other.join(" "))),
        }
    }
}

export_plugin!(Essentials);
