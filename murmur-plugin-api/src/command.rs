//! Command and argument declarations for plugin registration
//!
//! Commands are declared as plain data so the specs can cross the C ABI
//! boundary and be validated by the host without calling back into the
//! plugin. Argument types are described by [`ArgKind`]; the host's
//! argument parser casts raw tokens into [`ArgValue`]s accordingly.

use crate::event::ChatMessage;
use std::collections::HashMap;

/// Specification for a chat command
#[derive(Debug, Clone)]
pub struct CommandSpec {
    /// Aliases this command answers to; the first is the primary name
    pub aliases: Vec<String>,
    /// Short description for help text
    pub description: String,
    /// Declared arguments, bound positionally after the command token
    pub args: Vec<ArgSpec>,
    /// Sub-commands; when non-empty the token after the command routes
    /// into this list and `args` is ignored at this level
    pub subcommands: Vec<CommandSpec>,
    /// Key into the permission lists; defaults to the primary alias
    pub permission_key: Option<String>,
    /// Danger commands can never be opened up via the trust mechanism
    pub danger: bool,
    /// Enable backslash escapes when tokenizing this command's body
    pub escaping: bool,
}

impl CommandSpec {
    /// Create a spec with a single alias and no arguments
    pub fn new(alias: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            aliases: vec![alias.into()],
            description: description.into(),
            args: Vec::new(),
            subcommands: Vec::new(),
            permission_key: None,
            danger: false,
            escaping: false,
        }
    }

    /// Add an alias
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    /// Declare an argument
    pub fn arg(mut self, arg: ArgSpec) -> Self {
        self.args.push(arg);
        self
    }

    /// Declare a sub-command
    pub fn subcommand(mut self, sub: CommandSpec) -> Self {
        self.subcommands.push(sub);
        self
    }

    /// Override the permission key
    pub fn permission_key(mut self, key: impl Into<String>) -> Self {
        self.permission_key = Some(key.into());
        self
    }

    /// Mark as a danger command
    pub fn danger(mut self) -> Self {
        self.danger = true;
        self
    }

    /// Enable backslash escaping for this command's arguments
    pub fn escaping(mut self) -> Self {
        self.escaping = true;
        self
    }

    /// Primary alias, used for permission keys and display
    pub fn primary_alias(&self) -> &str {
        self.aliases.first().map(String::as_str).unwrap_or("")
    }

    /// Permission key this command's list is stored under
    pub fn effective_permission_key(&self) -> &str {
        self.permission_key
            .as_deref()
            .unwrap_or_else(|| self.primary_alias())
    }
}

/// Specification for one declared argument
#[derive(Debug, Clone)]
pub struct ArgSpec {
    /// Name the bound value is stored under
    pub name: String,
    /// How to cast the raw token
    pub kind: ArgKind,
    /// Default value (as raw text, cast like a token); an argument
    /// without a default is required
    pub default: Option<String>,
    /// Resolve this argument from the replied-to message instead of a
    /// token; only valid on the first declared argument
    pub from_reply: bool,
    /// Description for help text
    pub description: String,
}

impl ArgSpec {
    /// A required positional argument
    pub fn required(name: impl Into<String>, kind: ArgKind) -> Self {
        Self {
            name: name.into(),
            kind,
            default: None,
            from_reply: false,
            description: String::new(),
        }
    }

    /// An optional positional argument with a default
    pub fn optional(name: impl Into<String>, kind: ArgKind, default: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            default: Some(default.into()),
            from_reply: false,
            description: String::new(),
        }
    }

    /// A reply-to pseudo-argument: the replied-to message's text is
    /// cast as this argument's value
    pub fn reply_to(name: impl Into<String>, kind: ArgKind) -> Self {
        Self {
            name: name.into(),
            kind,
            default: None,
            from_reply: true,
            description: String::new(),
        }
    }

    /// Attach a description
    pub fn describe(mut self, text: impl Into<String>) -> Self {
        self.description = text.into();
        self
    }

    /// Required iff no default is declared
    pub fn is_required(&self) -> bool {
        self.default.is_none()
    }
}

/// Boolean literal configuration for [`ArgKind::Bool`]
#[derive(Debug, Clone)]
pub struct BoolLiterals {
    /// Strings accepted as true
    pub truthy: Vec<String>,
    /// Strings accepted as false
    pub falsy: Vec<String>,
    /// Compare case-sensitively
    pub match_case: bool,
}

impl Default for BoolLiterals {
    fn default() -> Self {
        Self {
            truthy: ["yes", "yea", "+", "true"].map(String::from).to_vec(),
            falsy: ["no", "nop", "-", "false"].map(String::from).to_vec(),
            match_case: false,
        }
    }
}

/// Declared type of an argument
#[derive(Debug, Clone)]
pub enum ArgKind {
    /// Keep the token as-is
    Str,
    /// Cast to a signed integer
    Int,
    /// Cast to a float
    Float,
    /// Cast via configurable true/false literal lists
    Bool(BoolLiterals),
    /// Split on `splitter` and cast every element
    List {
        splitter: String,
        item: Box<ArgKind>,
    },
    /// Split `key=value` pairs; `==` inside values stays literal
    Dict {
        pair_splitter: String,
        kv_splitter: String,
        key: Box<ArgKind>,
        value: Box<ArgKind>,
    },
}

impl ArgKind {
    /// Bool with the default literal lists
    pub fn bool() -> Self {
        Self::Bool(BoolLiterals::default())
    }

    /// List with the default `", "` splitter
    pub fn list(item: ArgKind) -> Self {
        Self::List {
            splitter: ", ".to_string(),
            item: Box::new(item),
        }
    }

    /// Dict with the default `","` / `"="` splitters
    pub fn dict(key: ArgKind, value: ArgKind) -> Self {
        Self::Dict {
            pair_splitter: ",".to_string(),
            kv_splitter: "=".to_string(),
            key: Box::new(key),
            value: Box::new(value),
        }
    }
}

/// A value produced by casting a token
#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    List(Vec<ArgValue>),
    Dict(Vec<(ArgValue, ArgValue)>),
}

impl ArgValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[ArgValue]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }
}

/// The bound argument bag handed to a command handler.
///
/// Always carries the invoking prefix and the matched command path;
/// declared arguments appear under their names.
#[derive(Debug, Clone, Default)]
pub struct ParsedArgs {
    /// Prefix the command was invoked with
    pub prefix: String,
    /// Matched command path (command, then any sub-commands)
    pub command_path: Vec<String>,
    /// The replied-to message, when a reply-to argument was resolved
    pub reply_to_message: Option<ChatMessage>,
    values: HashMap<String, ArgValue>,
}

impl ParsedArgs {
    /// Create an empty bag for the given invocation
    pub fn new(prefix: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            command_path: vec![command.into()],
            reply_to_message: None,
            values: HashMap::new(),
        }
    }

    /// Store a bound value
    pub fn set(&mut self, name: impl Into<String>, value: ArgValue) {
        self.values.insert(name.into(), value);
    }

    /// Look up a bound value
    pub fn get(&self, name: &str) -> Option<&ArgValue> {
        self.values.get(name)
    }

    /// Number of bound values
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True when no values are bound
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// What a command handler asks the host to do with its result
#[derive(Debug, Clone, PartialEq)]
pub enum CommandReply {
    /// Send plain text to the chat
    Text(String),
    /// Send text formatted as a successful action
    Success(String),
    /// Send text formatted as an unsuccessful action
    Unsuccess(String),
    /// Send nothing
    Silent,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spec_builder() {
        let spec = CommandSpec::new("calc", "Evaluate an expression")
            .alias("c")
            .arg(ArgSpec::required("expr", ArgKind::Str))
            .danger();

        assert_eq!(spec.aliases, vec!["calc", "c"]);
        assert!(spec.danger);
        assert_eq!(spec.effective_permission_key(), "calc");
    }

    #[test]
    fn test_permission_key_override() {
        let spec = CommandSpec::new("cfg", "Config").permission_key("config");
        assert_eq!(spec.effective_permission_key(), "config");
    }

    #[test]
    fn test_arg_required_iff_no_default() {
        assert!(ArgSpec::required("x", ArgKind::Int).is_required());
        assert!(!ArgSpec::optional("y", ArgKind::Int, "5").is_required());
    }

    #[test]
    fn test_parsed_args_carries_prefix_and_command() {
        let mut args = ParsedArgs::new("mur", "echo");
        args.set("text", ArgValue::Str("hello".into()));

        assert_eq!(args.prefix, "mur");
        assert_eq!(args.command_path, vec!["echo"]);
        assert_eq!(args.get("text").and_then(ArgValue::as_str), Some("hello"));
        assert!(args.get("missing").is_none());
    }

    #[test]
    fn test_bool_literals_default() {
        let literals = BoolLiterals::default();
        assert!(literals.truthy.contains(&"+".to_string()));
        assert!(literals.falsy.contains(&"nop".to_string()));
        assert!(!literals.match_case);
    }

    #[test]
    fn test_arg_value_accessors() {
        assert_eq!(ArgValue::Int(3).as_int(), Some(3));
        assert_eq!(ArgValue::Str("x".into()).as_int(), None);
        assert_eq!(ArgValue::Bool(true).as_bool(), Some(true));
    }
}
