//! Binding tokenized command bodies to declared arguments
//!
//! Routing happens first: while the matched command declares
//! sub-commands, the next word selects one of them and parsing recurses
//! into the selected spec. At a leaf, the remaining body is tokenized
//! and bound positionally to the declared arguments.

use super::cast::{CastError, cast};
use super::tokenizer::Tokenizer;
use crate::chat::ChatClient;
use murmur_plugin_api::{ArgSpec, ChatMessage, CommandSpec, ParsedArgs};
use thiserror::Error;

/// Why an invocation could not be bound to its command's arguments
#[derive(Error, Debug)]
pub enum ArgumentParseError {
    #[error("Too many arguments")]
    TooManyArguments,

    #[error("Too little arguments")]
    TooLittleArguments,

    #[error("Incorrect argument type: {0}")]
    IncorrectType(#[from] CastError),

    #[error("Unknown subcommand: {0}")]
    IncorrectSubcommand(String),

    #[error("This command requires a reply to a message")]
    ReplyToRequired,

    #[error("Can't find the original message")]
    CantFindOriginalMessage,

    #[error("History lookup failed: {0}")]
    History(String),
}

/// A routed and bound invocation, ready to hand to the plugin
#[derive(Debug)]
pub struct Invocation {
    /// Primary-alias path of the matched command and sub-commands
    pub path: Vec<String>,
    /// Bound arguments
    pub args: ParsedArgs,
}

/// Route `body` through sub-commands and bind the remainder to the
/// leaf command's declared arguments.
///
/// `body` is the raw message text after the command token and the space
/// that follows it, untouched so quoted spans keep their interior
/// spacing. Routing splits off one single-space-delimited word per
/// sub-command level; quoting only applies past routing, so sub-command
/// names can never be quoted.
pub async fn parse_invocation(
    spec: &CommandSpec,
    prefix: &str,
    body: &str,
    event: &ChatMessage,
    client: &dyn ChatClient,
    history_lookback: usize,
    tokenizer: &Tokenizer,
) -> Result<Invocation, ArgumentParseError> {
    let mut spec = spec;
    let mut body = body;
    let mut path = vec![spec.primary_alias().to_string()];

    while !spec.subcommands.is_empty() {
        if body.is_empty() {
            return Err(ArgumentParseError::TooLittleArguments);
        }
        let (name, rest) = body.split_once(' ').unwrap_or((body, ""));
        let sub = spec
            .subcommands
            .iter()
            .find(|s| s.aliases.iter().any(|a| a == name))
            .ok_or_else(|| ArgumentParseError::IncorrectSubcommand(name.to_string()))?;

        path.push(sub.primary_alias().to_string());
        spec = sub;
        body = rest;
    }

    let mut args = ParsedArgs::new(prefix, path[0].clone());
    args.command_path = path.clone();

    let tokens = if body.is_empty() {
        Vec::new()
    } else {
        tokenizer.tokenize(body, spec.escaping)
    };

    // the reply pseudo-argument is resolved from the replied-to message
    // and never consumes tokens
    let (reply_arg, positional): (Vec<&ArgSpec>, Vec<&ArgSpec>) =
        spec.args.iter().partition(|a| a.from_reply);

    if let Some(arg) = reply_arg.first() {
        resolve_reply_arg(arg, event, client, history_lookback, &mut args).await?;
    }

    let required = positional.iter().filter(|a| a.is_required()).count();
    if tokens.len() < required {
        return Err(ArgumentParseError::TooLittleArguments);
    }
    if tokens.len() > positional.len() {
        return Err(ArgumentParseError::TooManyArguments);
    }

    // defaults first, so a later empty token leaves them in place
    for arg in spec.args.iter().filter(|a| !a.is_required()) {
        if let Some(default) = &arg.default {
            args.set(arg.name.clone(), cast(&arg.kind, default)?);
        }
    }

    for (arg, token) in positional.iter().zip(&tokens) {
        if token.is_empty() && !arg.is_required() {
            continue;
        }
        args.set(arg.name.clone(), cast(&arg.kind, token)?);
    }

    Ok(Invocation { path, args })
}

async fn resolve_reply_arg(
    arg: &ArgSpec,
    event: &ChatMessage,
    client: &dyn ChatClient,
    history_lookback: usize,
    args: &mut ParsedArgs,
) -> Result<(), ArgumentParseError> {
    let Some(reply_to) = event.reply_to else {
        if arg.is_required() {
            return Err(ArgumentParseError::ReplyToRequired);
        }
        return Ok(());
    };

    let history = client
        .recent_messages(event.chat_id, history_lookback)
        .await
        .map_err(|e| ArgumentParseError::History(e.to_string()))?;
    let original = history
        .into_iter()
        .find(|m| m.id == reply_to)
        .ok_or(ArgumentParseError::CantFindOriginalMessage)?;

    args.set(arg.name.clone(), cast(&arg.kind, &original.text)?);
    args.reply_to_message = Some(original);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::ChatError;
    use async_trait::async_trait;
    use murmur_plugin_api::{ArgKind, ArgValue};
    use std::path::Path;

    struct FakeClient {
        history: Vec<ChatMessage>,
    }

    #[async_trait]
    impl ChatClient for FakeClient {
        async fn send_message(&self, _chat_id: i64, _text: &str) -> Result<(), ChatError> {
            Ok(())
        }

        async fn recent_messages(
            &self,
            _chat_id: i64,
            _limit: usize,
        ) -> Result<Vec<ChatMessage>, ChatError> {
            Ok(self.history.clone())
        }

        async fn download_media(
            &self,
            _message: &ChatMessage,
            _dest: &Path,
        ) -> Result<(), ChatError> {
            Ok(())
        }

        async fn disconnect(&self) -> Result<(), ChatError> {
            Ok(())
        }
    }

    fn empty_client() -> FakeClient {
        FakeClient {
            history: Vec::new(),
        }
    }

    async fn parse(
        spec: &CommandSpec,
        body: &str,
        event: &ChatMessage,
        client: &FakeClient,
    ) -> Result<Invocation, ArgumentParseError> {
        let tokenizer = Tokenizer::new(16);
        parse_invocation(spec, "mur", body, event, client, 50, &tokenizer).await
    }

    #[tokio::test]
    async fn test_required_and_default_binding() {
        let spec = CommandSpec::new("take", "Take values")
            .arg(ArgSpec::required("x", ArgKind::Int))
            .arg(ArgSpec::optional("y", ArgKind::Int, "5"));
        let event = ChatMessage::new(1, 1, 1, "mur take 10");

        let inv = parse(&spec, "10", &event, &empty_client()).await.unwrap();
        assert_eq!(inv.args.get("x"), Some(&ArgValue::Int(10)));
        assert_eq!(inv.args.get("y"), Some(&ArgValue::Int(5)));
        assert_eq!(inv.args.prefix, "mur");
    }

    #[tokio::test]
    async fn test_argument_count_gates() {
        let spec = CommandSpec::new("take", "Take values")
            .arg(ArgSpec::required("x", ArgKind::Int))
            .arg(ArgSpec::optional("y", ArgKind::Int, "5"));
        let event = ChatMessage::new(1, 1, 1, "x");
        let client = empty_client();

        assert!(matches!(
            parse(&spec, "", &event, &client).await,
            Err(ArgumentParseError::TooLittleArguments)
        ));
        assert!(matches!(
            parse(&spec, "10 20 30", &event, &client).await,
            Err(ArgumentParseError::TooManyArguments)
        ));
        assert!(matches!(
            parse(&spec, "abc", &event, &client).await,
            Err(ArgumentParseError::IncorrectType(_))
        ));
    }

    #[tokio::test]
    async fn test_subcommand_routing() {
        let spec = CommandSpec::new("perm", "Permissions").subcommand(
            CommandSpec::new("add", "Add")
                .alias("a")
                .arg(ArgSpec::required("user", ArgKind::Int)),
        );
        let event = ChatMessage::new(1, 1, 1, "x");
        let client = empty_client();

        let inv = parse(&spec, "add 42", &event, &client).await.unwrap();
        assert_eq!(inv.path, vec!["perm", "add"]);
        assert_eq!(inv.args.get("user"), Some(&ArgValue::Int(42)));

        // alias routes to the same sub-command, path keeps the primary name
        let inv = parse(&spec, "a 42", &event, &client).await.unwrap();
        assert_eq!(inv.path, vec!["perm", "add"]);

        assert!(matches!(
            parse(&spec, "drop 42", &event, &client).await,
            Err(ArgumentParseError::IncorrectSubcommand(_))
        ));
        assert!(matches!(
            parse(&spec, "", &event, &client).await,
            Err(ArgumentParseError::TooLittleArguments)
        ));
    }

    #[tokio::test]
    async fn test_reply_arg_resolved_from_history() {
        let spec = CommandSpec::new("quote", "Quote the replied message")
            .arg(ArgSpec::reply_to("text", ArgKind::Str));
        let event = ChatMessage::reply(10, 1, 1, "mur quote", 7);
        let client = FakeClient {
            history: vec![
                ChatMessage::new(9, 1, 2, "later"),
                ChatMessage::new(7, 1, 2, "the original"),
            ],
        };

        let inv = parse(&spec, "", &event, &client).await.unwrap();
        assert_eq!(
            inv.args.get("text").and_then(ArgValue::as_str),
            Some("the original")
        );
        assert_eq!(inv.args.reply_to_message.as_ref().unwrap().id, 7);
    }

    #[tokio::test]
    async fn test_reply_arg_required_without_reply() {
        let spec = CommandSpec::new("quote", "Quote")
            .arg(ArgSpec::reply_to("text", ArgKind::Str));
        let event = ChatMessage::new(10, 1, 1, "mur quote");

        assert!(matches!(
            parse(&spec, "", &event, &empty_client()).await,
            Err(ArgumentParseError::ReplyToRequired)
        ));
    }

    #[tokio::test]
    async fn test_reply_arg_original_message_gone() {
        let spec = CommandSpec::new("quote", "Quote")
            .arg(ArgSpec::reply_to("text", ArgKind::Str));
        let event = ChatMessage::reply(10, 1, 1, "mur quote", 7);
        let client = FakeClient {
            history: vec![ChatMessage::new(9, 1, 2, "later")],
        };

        assert!(matches!(
            parse(&spec, "", &event, &client).await,
            Err(ArgumentParseError::CantFindOriginalMessage)
        ));
    }

    #[tokio::test]
    async fn test_reply_arg_never_consumes_tokens() {
        let spec = CommandSpec::new("annotate", "Annotate the replied message")
            .arg(ArgSpec::reply_to("original", ArgKind::Str))
            .arg(ArgSpec::required("note", ArgKind::Str));
        let event = ChatMessage::reply(10, 1, 1, "mur annotate hi", 7);
        let client = FakeClient {
            history: vec![ChatMessage::new(7, 1, 2, "target")],
        };

        let inv = parse(&spec, "hi", &event, &client).await.unwrap();
        assert_eq!(
            inv.args.get("original").and_then(ArgValue::as_str),
            Some("target")
        );
        assert_eq!(inv.args.get("note").and_then(ArgValue::as_str), Some("hi"));
    }

    #[tokio::test]
    async fn test_quoted_span_keeps_interior_spacing() {
        let spec = CommandSpec::new("say", "Say").arg(ArgSpec::required("text", ArgKind::Str));
        let event = ChatMessage::new(1, 1, 1, "x");

        let inv = parse(&spec, "\"a  b\"", &event, &empty_client()).await.unwrap();
        assert_eq!(inv.args.get("text").and_then(ArgValue::as_str), Some("a  b"));
    }

    #[tokio::test]
    async fn test_consecutive_spaces_reach_the_tokenizer() {
        let spec = CommandSpec::new("pair", "Pair")
            .arg(ArgSpec::required("a", ArgKind::Str))
            .arg(ArgSpec::optional("b", ArgKind::Str, "fallback"))
            .arg(ArgSpec::required("c", ArgKind::Str));
        let event = ChatMessage::new(1, 1, 1, "x");

        // the empty token between the double spaces skips the optional slot
        let inv = parse(&spec, "x  z", &event, &empty_client()).await.unwrap();
        assert_eq!(inv.args.get("a").and_then(ArgValue::as_str), Some("x"));
        assert_eq!(inv.args.get("b").and_then(ArgValue::as_str), Some("fallback"));
        assert_eq!(inv.args.get("c").and_then(ArgValue::as_str), Some("z"));
    }

    #[tokio::test]
    async fn test_quoted_body_binds_as_one_token() {
        let spec = CommandSpec::new("say", "Say").arg(ArgSpec::required("text", ArgKind::Str));
        let event = ChatMessage::new(1, 1, 1, "x");

        let inv = parse(&spec, "\"two words\"", &event, &empty_client())
            .await
            .unwrap();
        assert_eq!(
            inv.args.get("text").and_then(ArgValue::as_str),
            Some("two words")
        );
    }
}
