//! Version triples with wildcard support and range admission.
//!
//! Versions are (major, minor, patch) where each component is either a
//! number or the wildcard `*`. Wildcards match any value in equality
//! comparisons, and a wildcard patch never blocks a less/greater match
//! once major and minor tie — that asymmetry is what makes ranges like
//! `1.4.0 .. 1.4.*` mean "any patch in the 1.4 line".

use serde::de::{self, Deserializer, SeqAccess, Visitor};
use serde::ser::{Serialize, Serializer};
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// One component of a version triple
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionPart {
    /// A concrete numeric component
    Num(u64),
    /// Matches any value
    Wildcard,
}

/// A (major, minor, patch) version, immutable once parsed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Version(pub [VersionPart; 3]);

/// Relational operation for [`compare_versions`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Equals,
    LessThan,
    GreaterThan,
}

impl CompareOp {
    /// Convert a requirement-list operator character (`=`, `<`, `>`)
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            '=' => Some(Self::Equals),
            '<' => Some(Self::LessThan),
            '>' => Some(Self::GreaterThan),
            _ => None,
        }
    }
}

/// Error parsing a version from text or TOML
#[derive(Error, Debug)]
#[error("Invalid version component: {0:?}")]
pub struct VersionParseError(String);

impl Version {
    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self([
            VersionPart::Num(major),
            VersionPart::Num(minor),
            VersionPart::Num(patch),
        ])
    }

    /// True when the host version lies in the closed interval
    /// `[min, max]`.
    ///
    /// Each bound is admitted by two OR'd tests: strictly inside, or
    /// equal (where wildcards count as equal).
    pub fn in_range(&self, min: &Version, max: &Version) -> bool {
        (compare_versions(self, min, CompareOp::GreaterThan)
            || compare_versions(min, self, CompareOp::Equals))
            && (compare_versions(max, self, CompareOp::GreaterThan)
                || compare_versions(max, self, CompareOp::Equals))
    }
}

impl FromStr for Version {
    type Err = VersionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = [VersionPart::Num(0); 3];
        let mut split = s.split('.');
        for part in &mut parts {
            let piece = split.next().unwrap_or("0");
            *part = parse_part(piece)?;
        }
        if split.next().is_some() {
            return Err(VersionParseError(s.to_string()));
        }
        Ok(Self(parts))
    }
}

fn parse_part(piece: &str) -> Result<VersionPart, VersionParseError> {
    if piece == "*" {
        Ok(VersionPart::Wildcard)
    } else {
        piece
            .parse::<u64>()
            .map(VersionPart::Num)
            .map_err(|_| VersionParseError(piece.to_string()))
    }
}

impl fmt::Display for VersionPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Num(n) => write!(f, "{n}"),
            Self::Wildcard => write!(f, "*"),
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.0[0], self.0[1], self.0[2])
    }
}

/// Outcome of comparing two components under an ordering operation
enum PartOrder {
    /// Equal, including via wildcard on either side
    Equal,
    /// Strictly ordered in the direction the operation asked for
    Ordered(bool),
}

fn order_part(a: VersionPart, b: VersionPart, op: CompareOp) -> PartOrder {
    match (a, b) {
        (VersionPart::Wildcard, _) | (_, VersionPart::Wildcard) => PartOrder::Equal,
        (VersionPart::Num(x), VersionPart::Num(y)) if x == y => PartOrder::Equal,
        (VersionPart::Num(x), VersionPart::Num(y)) => match op {
            CompareOp::LessThan => PartOrder::Ordered(x < y),
            CompareOp::GreaterThan => PartOrder::Ordered(x > y),
            CompareOp::Equals => PartOrder::Ordered(false),
        },
    }
}

fn part_equal(a: VersionPart, b: VersionPart) -> bool {
    matches!(order_part(a, b, CompareOp::Equals), PartOrder::Equal)
}

/// Compare two version triples under the given operation.
///
/// Equality is componentwise equal-or-either-wildcard. Less/greater
/// compares major first and returns immediately on a strict order,
/// falls through to minor the same way, and lets the patch decide a
/// full tie — unless either patch is a wildcard, in which case the
/// comparison holds.
pub fn compare_versions(v1: &Version, v2: &Version, op: CompareOp) -> bool {
    match op {
        CompareOp::Equals => {
            part_equal(v1.0[0], v2.0[0])
                && part_equal(v1.0[1], v2.0[1])
                && part_equal(v1.0[2], v2.0[2])
        }
        CompareOp::LessThan | CompareOp::GreaterThan => {
            for i in 0..2 {
                match order_part(v1.0[i], v2.0[i], op) {
                    PartOrder::Ordered(result) => return result,
                    PartOrder::Equal => {}
                }
            }
            // major and minor tie: a wildcard patch never blocks the match
            match order_part(v1.0[2], v2.0[2], op) {
                PartOrder::Equal => {
                    matches!(v1.0[2], VersionPart::Wildcard)
                        || matches!(v2.0[2], VersionPart::Wildcard)
                }
                PartOrder::Ordered(result) => result,
            }
        }
    }
}

// Versions appear in manifests both as strings ("1.4.*") and as arrays
// ([1, 4, "*"]), matching the original info-block format.
impl<'de> Deserialize<'de> for Version {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct VersionVisitor;

        impl<'de> Visitor<'de> for VersionVisitor {
            type Value = Version;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a version string like \"1.4.*\" or an array like [1, 4, \"*\"]")
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<Version, E> {
                value.parse().map_err(de::Error::custom)
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Version, A::Error> {
                #[derive(Deserialize)]
                #[serde(untagged)]
                enum RawPart {
                    Int(i64),
                    Str(String),
                }

                let mut parts = [VersionPart::Num(0); 3];
                for (i, part) in parts.iter_mut().enumerate() {
                    let value: RawPart = seq
                        .next_element()?
                        .ok_or_else(|| de::Error::invalid_length(i, &self))?;
                    *part = match value {
                        RawPart::Int(n) if n >= 0 => VersionPart::Num(n as u64),
                        RawPart::Int(n) => {
                            return Err(de::Error::custom(format!(
                                "negative version component: {n}"
                            )));
                        }
                        RawPart::Str(s) => parse_part(&s).map_err(de::Error::custom)?,
                    };
                }
                if seq.next_element::<de::IgnoredAny>()?.is_some() {
                    return Err(de::Error::custom("version has more than 3 components"));
                }
                Ok(Version(parts))
            }
        }

        deserializer.deserialize_any(VersionVisitor)
    }
}

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
