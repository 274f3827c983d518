//! Variable keys.

use std::fmt;

const CHR_BITS: u32 = 8;
const INDEX_BITS: u32 = u64::BITS - CHR_BITS;
const INDEX_MASK: u64 = (1 << INDEX_BITS) - 1;

/// Opaque, totally ordered identifier of an optimization variable.
///
/// A key built with [`Key::symbol`] packs a character tag into the top byte and an index
/// into the remaining 56 bits, so `Key::symbol('x', 3)` prints as `x3`. Plain keys built
/// with [`Key::new`] print as their raw integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Key(u64);

impl Key {
    pub const fn new(raw: u64) -> Self {
        Key(raw)
    }

    /// Symbol-style key: an ASCII tag plus an index.
    pub const fn symbol(chr: char, index: u64) -> Self {
        Key(((chr as u64 & 0xff) << INDEX_BITS) | (index & INDEX_MASK))
    }

    pub const fn raw(&self) -> u64 {
        self.0
    }

    /// Character tag, if this key was built as a symbol.
    pub fn chr(&self) -> Option<char> {
        let tag = (self.0 >> INDEX_BITS) as u8;
        (tag != 0).then_some(tag as char)
    }

    pub const fn index(&self) -> u64 {
        self.0 & INDEX_MASK
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.chr() {
            Some(chr) => write!(f, "{}{}", chr, self.index()),
            None => write!(f, "{}", self.0),
        }
    }
}

impl From<u64> for Key {
    fn from(raw: u64) -> Self {
        Key(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbol_roundtrip() {
        let key = Key::symbol('e', 42);
        assert_eq!(key.chr(), Some('e'));
        assert_eq!(key.index(), 42);
        assert_eq!(key.to_string(), "e42");
    }

    #[test]
    fn test_plain_key_display() {
        assert_eq!(Key::new(17).to_string(), "17");
        assert_eq!(Key::from(5).chr(), None);
    }

    #[test]
    fn test_symbol_ordering_groups_by_tag() {
        assert!(Key::symbol('e', 100) < Key::symbol('x', 0));
        assert!(Key::symbol('x', 1) < Key::symbol('x', 2));
    }
}
