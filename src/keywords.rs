//! Keyword and level vocabulary.
//!
//! Keywords are named bits; an event's mask is the OR of the bits of every keyword it lists.
//! Levels are a fixed ordinal scale shared by every provider.

use std::fmt;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::FastMap;
use crate::err::{SchemaError, SchemaResult};

/// Process-wide keyword name to bitmask table.
///
/// Populated once from the schema and read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct KeywordTable {
    masks: FastMap<String, u64>,
}

impl KeywordTable {
    pub fn new() -> Self {
        KeywordTable::default()
    }

    /// Builds a table from `(name, mask)` pairs. Later duplicates replace earlier ones.
    pub fn from_masks<I, S>(masks: I) -> Self
    where
        I: IntoIterator<Item = (S, u64)>,
        S: Into<String>,
    {
        let mut table = KeywordTable::new();
        for (name, mask) in masks {
            table.insert(name, mask);
        }
        table
    }

    /// Sets the mask of `name`, returning the mask it replaced.
    pub fn insert(&mut self, name: impl Into<String>, mask: u64) -> Option<u64> {
        self.masks.insert(name.into(), mask)
    }

    pub fn mask(&self, name: &str) -> Option<u64> {
        self.masks.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.masks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.masks.is_empty()
    }

    /// OR-reduces the masks of `names`. An empty set encodes to `0`.
    pub fn encode_keywords<I, S>(&self, names: I) -> SchemaResult<u64>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        names.into_iter().try_fold(0u64, |acc, name| {
            let name = name.as_ref();
            self.mask(name)
                .map(|mask| acc | mask)
                .ok_or_else(|| SchemaError::UnknownKeyword {
                    keyword: name.to_owned(),
                })
        })
    }

    /// Encodes a space-separated keyword attribute, e.g. `"GCKeyword TypeKeyword"`.
    pub fn encode_str(&self, keywords: &str) -> SchemaResult<u64> {
        self.encode_keywords(keywords.split_whitespace())
    }
}

/// Parses a keyword mask written either as a number or as a `0x`/`0o`/`0b` prefixed string.
pub fn parse_mask(keyword: &str, text: &str) -> SchemaResult<u64> {
    let invalid = || SchemaError::InvalidMask {
        keyword: keyword.to_owned(),
        mask: text.to_owned(),
    };

    let text = text.trim();
    let (digits, radix) = if let Some(rest) = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
    {
        (rest, 16)
    } else if let Some(rest) = text.strip_prefix("0o") {
        (rest, 8)
    } else if let Some(rest) = text.strip_prefix("0b") {
        (rest, 2)
    } else {
        (text, 10)
    };

    let mask = u64::from_str_radix(digits, radix).map_err(|_| invalid())?;
    debug!("keyword `{}` -> {:#x}", keyword, mask);
    Ok(mask)
}

/// Event verbosity, ordered from most to least severe.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Level {
    LogAlways = 0,
    Critical = 1,
    Error = 2,
    Warning = 3,
    Informational = 4,
    Verbose = 5,
}

impl Level {
    /// Resolves a canonical level name, with or without the `win:` prefix.
    pub fn from_name(name: &str) -> SchemaResult<Level> {
        let bare = name.trim();
        let bare = bare.strip_prefix("win:").unwrap_or(bare);
        let level = match bare {
            "LogAlways" => Level::LogAlways,
            "Critical" => Level::Critical,
            "Error" => Level::Error,
            "Warning" => Level::Warning,
            "Informational" => Level::Informational,
            "Verbose" => Level::Verbose,
            _ => {
                return Err(SchemaError::UnknownLevel {
                    level: name.to_owned(),
                });
            }
        };
        Ok(level)
    }

    pub fn ordinal(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        match self {
            Level::LogAlways => "LogAlways",
            Level::Critical => "Critical",
            Level::Error => "Error",
            Level::Warning => "Warning",
            Level::Informational => "Informational",
            Level::Verbose => "Verbose",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
