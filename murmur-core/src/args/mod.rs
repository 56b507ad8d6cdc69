//! Argument parsing: tokenization, type-casting, and binding

pub mod cast;
pub mod parser;
pub mod tokenizer;

pub use cast::{CastError, cast};
pub use parser::{ArgumentParseError, Invocation, parse_invocation};
pub use tokenizer::{Tokenizer, tokenize};
