//! Token type-casting
//!
//! Casts a raw token into an [`ArgValue`] according to the declared
//! [`ArgKind`]. List and dict kinds recurse into their element kinds.

use murmur_plugin_api::{ArgKind, ArgValue, BoolLiterals};
use thiserror::Error;

/// Placeholder used to keep `==` literal inside dict values while the
/// pairs are split on `=`
const DICT_PLACEHOLDER: char = '\u{FFFF}';

/// A token could not be cast to its declared kind
#[derive(Error, Debug)]
#[error("Can't cast {input:?} to {expected}")]
pub struct CastError {
    pub input: String,
    pub expected: &'static str,
}

impl CastError {
    fn new(input: &str, expected: &'static str) -> Self {
        Self {
            input: input.to_string(),
            expected,
        }
    }
}

/// Cast a raw token to the declared kind
pub fn cast(kind: &ArgKind, input: &str) -> Result<ArgValue, CastError> {
    match kind {
        ArgKind::Str => Ok(ArgValue::Str(input.to_string())),
        ArgKind::Int => input
            .parse::<i64>()
            .map(ArgValue::Int)
            .map_err(|_| CastError::new(input, "int")),
        ArgKind::Float => input
            .parse::<f64>()
            .map(ArgValue::Float)
            .map_err(|_| CastError::new(input, "float")),
        ArgKind::Bool(literals) => cast_bool(literals, input),
        ArgKind::List { splitter, item } => {
            let items = input
                .split(splitter.as_str())
                .map(|piece| cast(item, piece))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(ArgValue::List(items))
        }
        ArgKind::Dict {
            pair_splitter,
            kv_splitter,
            key,
            value,
        } => cast_dict(pair_splitter, kv_splitter, key, value, input),
    }
}

fn cast_bool(literals: &BoolLiterals, input: &str) -> Result<ArgValue, CastError> {
    let candidate = if literals.match_case {
        input.to_string()
    } else {
        input.to_lowercase()
    };

    if literals.truthy.contains(&candidate) {
        Ok(ArgValue::Bool(true))
    } else if literals.falsy.contains(&candidate) {
        Ok(ArgValue::Bool(false))
    } else {
        Err(CastError::new(input, "bool"))
    }
}

fn cast_dict(
    pair_splitter: &str,
    kv_splitter: &str,
    key_kind: &ArgKind,
    value_kind: &ArgKind,
    input: &str,
) -> Result<ArgValue, CastError> {
    // `==` inside values must survive the key/value split
    let masked = input.replace("==", &DICT_PLACEHOLDER.to_string());

    let mut pairs = Vec::new();
    for pair in masked.split(pair_splitter) {
        let (raw_key, raw_value) = pair
            .split_once(kv_splitter)
            .ok_or_else(|| CastError::new(input, "dict"))?;
        let raw_value = raw_value.replace(DICT_PLACEHOLDER, "==");
        pairs.push((cast(key_kind, raw_key)?, cast(value_kind, &raw_value)?));
    }
    Ok(ArgValue::Dict(pairs))
}
