//! Clan tag handling
//!
//! This module provides the canonical `ClanTag` identity, tag normalization,
//! the total order over the tag space, and the resumable brute-force
//! enumerator that walks it.

mod enumerator;
mod normalize;

pub use enumerator::{next_tag, TagEnumerator};
pub use normalize::{compare_tags, normalize_tag, symbol_index};

use crate::TagResult;
use std::cmp::Ordering;
use std::fmt;

/// Symbols a tag body may contain, in enumeration order
pub const ALPHABET: &[u8; 14] = b"0289PYLQGRJCUV";

/// Prefix marker that starts every canonical tag
pub const TAG_PREFIX: char = '#';

/// Fewest body symbols a valid tag carries (8 characters with the prefix)
pub const MIN_BODY_LEN: usize = 7;

/// Most body symbols a valid tag carries (10 characters with the prefix)
pub const MAX_BODY_LEN: usize = 9;

/// A validated clan tag in canonical form (`#` followed by 7-9 symbols)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClanTag(String);

impl ClanTag {
    /// Parses and canonicalizes a tag
    ///
    /// # Examples
    ///
    /// ```
    /// use clanwar_archiver::tag::ClanTag;
    ///
    /// let tag = ClanTag::parse("2pp2pq9l").unwrap();
    /// assert_eq!(tag.as_str(), "#2PP2PQ9L");
    /// ```
    pub fn parse(raw: &str) -> TagResult<Self> {
        normalize_tag(raw).map(Self)
    }

    /// Returns the canonical tag string including the prefix
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the tag body without the prefix
    pub fn body(&self) -> &str {
        &self.0[TAG_PREFIX.len_utf8()..]
    }
}

impl fmt::Display for ClanTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ClanTag {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Ord for ClanTag {
    fn cmp(&self, other: &Self) -> Ordering {
        // Both sides are validated, so the enumeration order is always defined
        compare_tags(&self.0, &other.0).unwrap_or_else(|| self.0.cmp(&other.0))
    }
}

impl PartialOrd for ClanTag {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
