//! Command body tokenization
//!
//! A single left-to-right scan with quote tracking. `'` and `"` both
//! delimit quoted spans; the opening character owns the span, the other
//! kind stays literal inside it. An optional escape mode turns `\"` and
//! `\'` into literal quote characters. Results are memoized in a bounded
//! LRU cache since identical command bodies recur.

use lru::LruCache;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::num::NonZeroUsize;
use std::sync::Mutex;

/// Appended to the input before scanning; flushes the final non-empty
/// token
const SENTINEL: char = '\0';

/// Characters that may follow `\` in escape mode
fn escape_char(c: char) -> Option<char> {
    match c {
        '"' => Some('"'),
        '\'' => Some('\''),
        _ => None,
    }
}

/// Split a command body into tokens.
///
/// Spaces outside quoted spans end the current token; empty tokens
/// produced by consecutive spaces are kept. When `escaping` is off a
/// backslash is dropped from the output entirely.
pub fn tokenize(input: &str, escaping: bool) -> Vec<String> {
    let mut in_string = false;
    let mut open_char = None;
    let mut current = String::new();
    let mut tokens = Vec::new();
    let mut escaped = false;

    for c in input.chars().chain(std::iter::once(SENTINEL)) {
        if escaped {
            match escape_char(c) {
                Some(literal) => current.push(literal),
                None => {
                    // not escapable, keep the two-character sequence
                    current.push('\\');
                    current.push(c);
                }
            }
            escaped = false;
            continue;
        }

        match c {
            '\\' => {
                if escaping {
                    escaped = true;
                }
            }
            '\'' | '"' => {
                if let Some(open) = open_char
                    && open != c
                {
                    current.push(c);
                    continue;
                }
                if in_string {
                    in_string = false;
                    open_char = None;
                } else {
                    in_string = true;
                    open_char = Some(c);
                }
            }
            ' ' if !in_string => {
                tokens.push(std::mem::take(&mut current));
            }
            SENTINEL => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            _ => current.push(c),
        }
    }

    tokens
}

/// Tokenizer with a bounded memoization cache.
///
/// Keyed by a hash of the input and the escape flag. Bounding the cache
/// caps memory growth under adversarial or merely long-running input
/// streams.
pub struct Tokenizer {
    cache: Mutex<LruCache<u64, Vec<String>>>,
}

impl Tokenizer {
    /// Create a tokenizer whose cache holds up to `capacity` entries
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Tokenize with memoization
    pub fn tokenize(&self, input: &str, escaping: bool) -> Vec<String> {
        let mut hasher = DefaultHasher::new();
        input.hash(&mut hasher);
        escaping.hash(&mut hasher);
        let key = hasher.finish();

        let mut cache = self.cache.lock().expect("tokenizer cache poisoned");
        if let Some(tokens) = cache.get(&key) {
            return tokens.clone();
        }
        let tokens = tokenize(input, escaping);
        cache.put(key, tokens.clone());
        tokens
    }

    /// Number of cached entries
    pub fn cached_len(&self) -> usize {
        self.cache.lock().expect("tokenizer cache poisoned").len()
    }
}
