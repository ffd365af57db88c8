//! Mapping between hostname bytes and dense trie symbols.
//!
//! Symbol 0 is the terminator; `a`-`z`, `0`-`9`, `-` and `.` follow in that
//! order. Upper-case ASCII letters share the symbols of their lower-case forms.

use once_cell::sync::Lazy;

/// Characters accepted in domain names, in symbol order (after the terminator).
pub const ALLOWED_CHARS: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789-.";

/// Number of symbols, terminator included.
pub const ARITY: usize = ALLOWED_CHARS.len() + 1;

/// Terminator symbol (and byte) marking the left end of an exact name.
pub const TERMINATOR: u8 = 0;

/// Symbol of the label separator `.`.
pub const DOT: u8 = ARITY as u8 - 1;

/// Returned for bytes outside the alphabet; never a valid child slot.
pub const INVALID_SYMBOL: u8 = u8::MAX;

static ALPHABET: Lazy<Alphabet> = Lazy::new(Alphabet::build);

/// Bidirectional byte/symbol tables.
pub struct Alphabet {
    to_symbol: [u8; 256],
    to_byte: [u8; ARITY],
}

impl Alphabet {
    fn build() -> Self {
        let mut to_symbol = [INVALID_SYMBOL; 256];
        let mut to_byte = [0u8; ARITY];

        to_symbol[TERMINATOR as usize] = 0;
        for (i, &c) in ALLOWED_CHARS.iter().enumerate() {
            let symbol = (i + 1) as u8;
            to_symbol[c as usize] = symbol;
            to_symbol[c.to_ascii_uppercase() as usize] = symbol;
            to_byte[symbol as usize] = c;
        }

        Self {
            to_symbol,
            to_byte,
        }
    }

    /// Process-wide tables.
    #[inline]
    pub fn get() -> &'static Alphabet {
        &ALPHABET
    }

    /// Symbol for `byte`, or `INVALID_SYMBOL`.
    #[inline(always)]
    pub fn symbol_or_invalid(&self, byte: u8) -> u8 {
        self.to_symbol[byte as usize]
    }

    /// Symbol for `byte`, if the byte is part of the alphabet.
    #[inline]
    pub fn symbol(&self, byte: u8) -> Option<u8> {
        match self.to_symbol[byte as usize] {
            INVALID_SYMBOL => None,
            symbol => Some(symbol),
        }
    }

    /// Canonical (lower-case) byte for `symbol`.
    #[inline]
    pub fn byte(&self, symbol: u8) -> u8 {
        self.to_byte[symbol as usize]
    }
}

/// True for symbols that may appear inside a label (everything but the
/// terminator and `.`).
#[inline]
pub fn is_label_symbol(symbol: u8) -> bool {
    symbol != TERMINATOR && symbol < DOT
}

/// Iterator over all label symbols in index order.
pub fn label_symbols() -> impl Iterator<Item = u8> {
    1..DOT
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arity() {
        assert_eq!(ARITY, 39);
        assert_eq!(DOT, 38);
    }

    #[test]
    fn test_round_trip_allowed_chars() {
        let alphabet = Alphabet::get();
        for &c in ALLOWED_CHARS {
            let symbol = alphabet.symbol(c).unwrap();
            assert_eq!(alphabet.byte(symbol), c);
        }
        assert_eq!(alphabet.symbol(b'.'), Some(DOT));
        assert_eq!(alphabet.symbol(0), Some(TERMINATOR));
    }

    #[test]
    fn test_uppercase_folds() {
        let alphabet = Alphabet::get();
        assert_eq!(alphabet.symbol(b'A'), alphabet.symbol(b'a'));
        assert_eq!(alphabet.symbol(b'Z'), alphabet.symbol(b'z'));
    }

    #[test]
    fn test_rejects_unmapped_bytes() {
        let alphabet = Alphabet::get();
        for b in [b'_', b'*', b' ', b'/', 0x80, 0xff] {
            assert_eq!(alphabet.symbol(b), None, "byte {:#x}", b);
            assert_eq!(alphabet.symbol_or_invalid(b), INVALID_SYMBOL);
        }
    }

    #[test]
    fn test_label_symbols() {
        assert_eq!(label_symbols().count(), 37);
        assert!(!is_label_symbol(TERMINATOR));
        assert!(!is_label_symbol(DOT));
        assert!(label_symbols().all(is_label_symbol));
    }
}
