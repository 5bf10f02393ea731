//! TXT record codec
//!
//! DNS-SD TXT records carry a list of `key=value` character-strings
//! (RFC 6763 §6). Keys are case-insensitive and only the first occurrence
//! of a key counts. A bare `key` is a boolean attribute.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A decoded TXT attribute value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TxtValue {
    /// Key present without `=`; `Flag(false)` only appears in patterns
    Flag(bool),
    Text(String),
    Binary(Vec<u8>),
}

impl TxtValue {
    /// The textual value, if this is a `Text` value
    pub fn as_text(&self) -> Option<&str> {
        match self {
            TxtValue::Text(s) => Some(s),
            _ => None,
        }
    }

    fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            TxtValue::Text(s) => Some(s.as_bytes()),
            TxtValue::Binary(b) => Some(b),
            TxtValue::Flag(_) => None,
        }
    }
}

impl From<&str> for TxtValue {
    fn from(value: &str) -> Self {
        TxtValue::Text(value.to_string())
    }
}

impl From<String> for TxtValue {
    fn from(value: String) -> Self {
        TxtValue::Text(value)
    }
}

impl From<bool> for TxtValue {
    fn from(value: bool) -> Self {
        TxtValue::Flag(value)
    }
}

/// Decoded TXT content; ordered so equality ignores wire order
pub type TxtRecord = BTreeMap<String, TxtValue>;

/// Decode TXT character-strings into a key/value mapping
///
/// With `binary` set, values are kept as raw bytes instead of being
/// interpreted as UTF-8.
pub fn decode(strings: &[Vec<u8>], binary: bool) -> TxtRecord {
    let mut record = TxtRecord::new();

    for entry in strings {
        if entry.is_empty() {
            continue;
        }

        let (key, value) = match entry.iter().position(|b| *b == b'=') {
            // missing key
            Some(0) => continue,
            Some(i) => {
                let raw = &entry[i + 1..];
                let value = if binary {
                    TxtValue::Binary(raw.to_vec())
                } else {
                    TxtValue::Text(String::from_utf8_lossy(raw).into_owned())
                };
                (&entry[..i], value)
            }
            None => (entry.as_slice(), TxtValue::Flag(true)),
        };

        let key = String::from_utf8_lossy(key).to_lowercase();
        record.entry(key).or_insert(value);
    }

    record
}

/// Encode a mapping back into TXT character-strings
///
/// An empty mapping encodes as a single empty string, as required for an
/// empty TXT record.
pub fn encode(record: &TxtRecord) -> Vec<Vec<u8>> {
    let mut strings: Vec<Vec<u8>> = record
        .iter()
        .filter_map(|(key, value)| match value {
            TxtValue::Flag(true) => Some(key.as_bytes().to_vec()),
            TxtValue::Flag(false) => None,
            other => {
                let mut entry = key.as_bytes().to_vec();
                entry.push(b'=');
                entry.extend_from_slice(other.as_bytes().unwrap_or_default());
                Some(entry)
            }
        })
        .collect();

    if strings.is_empty() {
        strings.push(Vec::new());
    }
    strings
}
