//! Pattern preparation: validation and conversion of a domain pattern into the
//! byte key consumed by the trie.

use std::fmt;

use super::alphabet::{Alphabet, TERMINATOR};
use super::node::Rank;
use crate::error::{Result, SniError};

/// Maximum length of a pattern or queried name, in bytes.
pub const MAX_NAME_LEN: usize = 256;

/// Maximum length of a single label.
pub const MAX_LABEL_LEN: usize = 63;

/// Wildcard label marker.
pub const WILDCARD: u8 = b'*';

/// A validated pattern in trie key form.
///
/// Bytes are kept in string order. Exact patterns carry a leading terminator
/// (`a.b.com` becomes `\0a.b.com`); leading wildcards drop their `*`
/// (`*.b.com` becomes `.b.com`). Interior `*` labels are kept in place.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PreparedKey {
    bytes: Vec<u8>,
}

impl PreparedKey {
    /// Validate and prepare a registration pattern.
    pub fn from_pattern(pattern: &str) -> Result<Self> {
        let mut raw = pattern.as_bytes();
        if let Some((&TERMINATOR, rest)) = raw.split_last() {
            raw = rest;
        }
        raw = strip_root_dot(raw);
        if raw.len() > MAX_NAME_LEN {
            return Err(SniError::NameTooLong {
                len: raw.len(),
                max: MAX_NAME_LEN,
            });
        }
        if raw.is_empty() {
            return Err(SniError::InvalidPattern("empty pattern".to_string()));
        }

        let alphabet = Alphabet::get();
        for (position, &byte) in raw.iter().enumerate() {
            let valid = byte == WILDCARD || (byte != TERMINATOR && alphabet.symbol(byte).is_some());
            if !valid {
                return Err(SniError::InvalidCharacter { byte, position });
            }
        }

        for label in raw.split(|&b| b == b'.') {
            if label.is_empty() {
                return Err(SniError::InvalidPattern(format!("empty label in '{}'", pattern)));
            }
            if label.len() > MAX_LABEL_LEN {
                return Err(SniError::InvalidPattern(format!(
                    "label longer than {} bytes in '{}'",
                    MAX_LABEL_LEN, pattern
                )));
            }
            if label.len() > 1 && label.contains(&WILDCARD) {
                return Err(SniError::InvalidPattern(format!(
                    "wildcard must span a whole label in '{}'",
                    pattern
                )));
            }
        }

        let lower = raw.to_ascii_lowercase();
        let bytes = match lower.split_first() {
            Some((&WILDCARD, rest)) => rest.to_vec(),
            _ => {
                let mut bytes = Vec::with_capacity(lower.len() + 1);
                bytes.push(TERMINATOR);
                bytes.extend_from_slice(&lower);
                bytes
            }
        };

        Ok(Self { bytes })
    }

    /// Prepared bytes, in string order.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// True if the pattern only matches names with exactly its labels on the
    /// left (no leading wildcard).
    pub fn is_exact(&self) -> bool {
        self.bytes.first() == Some(&TERMINATOR)
    }

    /// True if some label other than the leftmost is a wildcard.
    pub fn has_interior_wildcard(&self) -> bool {
        self.bytes.contains(&WILDCARD)
    }

    /// Precedence of the pattern's leaf, one code per label from the right.
    /// The stripped leading `*` shows up as an empty first label, which ends
    /// the literal and interior-wildcard run.
    pub fn rank(&self) -> Rank {
        let codes = self
            .bytes
            .rsplit(|&b| b == b'.')
            .map_while(|label| match label {
                [] => None,
                [WILDCARD] => Some(Rank::WILDCARD),
                _ => Some(Rank::LITERAL),
            });
        Rank::from_codes(codes, self.is_exact() && !self.has_interior_wildcard())
    }

    /// Symbols in consumption order (right to left), split at interior
    /// wildcard labels. The `.` closing each wildcard label is dropped, so
    /// every segment after the first starts at the next literal label.
    pub(crate) fn segments(&self) -> Vec<Vec<u8>> {
        let alphabet = Alphabet::get();
        let mut segments = vec![Vec::new()];
        let mut after_wildcard = false;
        for &byte in self.bytes.iter().rev() {
            if byte == WILDCARD {
                segments.push(Vec::new());
                after_wildcard = true;
                continue;
            }
            if std::mem::take(&mut after_wildcard) && byte == b'.' {
                continue;
            }
            if let Some(current) = segments.last_mut() {
                current.push(alphabet.symbol_or_invalid(byte));
            }
        }
        segments
    }
}

/// Drop the single trailing `.` of a fully-qualified name.
pub(crate) fn strip_root_dot(name: &[u8]) -> &[u8] {
    match name.split_last() {
        Some((&b'.', rest)) => rest,
        _ => name,
    }
}

impl fmt::Display for PreparedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.bytes.split_first() {
            Some((&TERMINATOR, rest)) => f.write_str(&String::from_utf8_lossy(rest)),
            _ => write!(f, "*{}", String::from_utf8_lossy(&self.bytes)),
        }
    }
}
