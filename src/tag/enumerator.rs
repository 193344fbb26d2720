//! Resumable brute-force tag enumeration
//!
//! The tag body is treated as an odometer over the alphabet. Tags of one
//! length are visited in digit order, then the length grows by one, until the
//! maximum length is exhausted. The last emitted tag is the only state needed
//! to resume.

use crate::tag::{ALPHABET, TAG_PREFIX};
use crate::TagError;
use std::cmp::Ordering;

/// Enumerates tags in a deterministic total order
#[derive(Debug, Clone)]
pub struct TagEnumerator {
    alphabet: Vec<u8>,
    min_length: usize,
    max_length: usize,
}

impl TagEnumerator {
    /// Creates an enumerator over the API alphabet
    ///
    /// # Arguments
    ///
    /// * `min_length` - Fewest body symbols to emit (at least 1)
    /// * `max_length` - Most body symbols to emit (at least `min_length`)
    pub fn new(min_length: usize, max_length: usize) -> Result<Self, TagError> {
        Self::with_alphabet(ALPHABET, min_length, max_length)
    }

    /// Creates an enumerator over a custom alphabet
    ///
    /// The alphabet must hold at least two distinct ASCII symbols; its order is
    /// the digit order of the odometer.
    pub fn with_alphabet(
        alphabet: &[u8],
        min_length: usize,
        max_length: usize,
    ) -> Result<Self, TagError> {
        if min_length == 0 || min_length > max_length {
            return Err(TagError::Bounds {
                min: min_length,
                max: max_length,
            });
        }

        let mut seen = Vec::with_capacity(alphabet.len());
        for &symbol in alphabet {
            if !symbol.is_ascii_graphic() || symbol == TAG_PREFIX as u8 || seen.contains(&symbol)
            {
                return Err(TagError::InvalidSymbol {
                    tag: String::from_utf8_lossy(alphabet).into_owned(),
                    symbol: symbol as char,
                });
            }
            seen.push(symbol);
        }
        if seen.len() < 2 {
            return Err(TagError::Bounds {
                min: min_length,
                max: max_length,
            });
        }

        Ok(Self {
            alphabet: seen,
            min_length,
            max_length,
        })
    }

    pub fn min_length(&self) -> usize {
        self.min_length
    }

    pub fn max_length(&self) -> usize {
        self.max_length
    }

    /// Returns the first tag of the enumeration (all-zero at `min_length`)
    pub fn first(&self) -> String {
        self.render(&vec![0; self.min_length])
    }

    /// Returns the tag that follows `previous`
    ///
    /// A missing or unrecognized previous tag (foreign symbols, wrong prefix,
    /// or a length outside the bounds) restarts at [`TagEnumerator::first`].
    ///
    /// # Returns
    ///
    /// * `Some(String)` - The next tag
    /// * `None` - The tag space is exhausted
    pub fn next_after(&self, previous: Option<&str>) -> Option<String> {
        let mut digits = match previous.and_then(|p| self.digits(p)) {
            Some(d) => d,
            None => return Some(self.first()),
        };

        let base = self.alphabet.len();
        for position in (0..digits.len()).rev() {
            if digits[position] + 1 < base {
                digits[position] += 1;
                return Some(self.render(&digits));
            }
            digits[position] = 0;
        }

        // Carry ran off the most significant digit
        if digits.len() < self.max_length {
            Some(self.render(&vec![0; digits.len() + 1]))
        } else {
            None
        }
    }

    /// Compares two tags in this enumerator's order
    ///
    /// Returns None if either tag is not part of the enumeration.
    pub fn compare(&self, a: &str, b: &str) -> Option<Ordering> {
        let da = self.digits(a)?;
        let db = self.digits(b)?;
        Some(da.len().cmp(&db.len()).then_with(|| da.cmp(&db)))
    }

    /// Counts the tags in the bounded space
    pub fn space_size(&self) -> u128 {
        let base = self.alphabet.len() as u128;
        (self.min_length..=self.max_length)
            .map(|len| base.pow(len as u32))
            .sum()
    }

    fn digits(&self, tag: &str) -> Option<Vec<usize>> {
        let body = tag.strip_prefix(TAG_PREFIX)?;
        if body.len() < self.min_length || body.len() > self.max_length {
            return None;
        }
        body.bytes()
            .map(|b| self.alphabet.iter().position(|&s| s == b))
            .collect()
    }

    fn render(&self, digits: &[usize]) -> String {
        let mut tag = String::with_capacity(digits.len() + 1);
        tag.push(TAG_PREFIX);
        tag.extend(digits.iter().map(|&d| self.alphabet[d] as char));
        tag
    }
}

/// Returns the API-alphabet tag that follows `previous`
///
/// Convenience wrapper over [`TagEnumerator::next_after`]; invalid bounds
/// yield None.
pub fn next_tag(previous: Option<&str>, min_length: usize, max_length: usize) -> Option<String> {
    TagEnumerator::new(min_length, max_length)
        .ok()?
        .next_after(previous)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_first_tag_is_all_zero() {
        let e = TagEnumerator::new(7, 9).unwrap();
        assert_eq!(e.next_after(None), Some("#0000000".to_string()));
    }

    #[test]
    fn test_increments_last_symbol() {
        let e = TagEnumerator::new(7, 9).unwrap();
        assert_eq!(e.next_after(Some("#0000000")), Some("#0000002".to_string()));
        assert_eq!(e.next_after(Some("#000000U")), Some("#000000V".to_string()));
    }

    #[test]
    fn test_carry_propagates() {
        let e = TagEnumerator::new(7, 9).unwrap();
        assert_eq!(e.next_after(Some("#000000V")), Some("#0000020".to_string()));
        assert_eq!(e.next_after(Some("#00VVVVV")), Some("#0200000".to_string()));
    }

    #[test]
    fn test_decimal_like_alphabet_steps_to_one() {
        let e = TagEnumerator::with_alphabet(b"0123456789ABCD", 7, 9).unwrap();
        assert_eq!(e.next_after(Some("#0000000")), Some("#0000001".to_string()));
    }

    #[test]
    fn test_all_max_grows_length() {
        let e = TagEnumerator::new(7, 9).unwrap();
        assert_eq!(e.next_after(Some("#VVVVVVV")), Some("#00000000".to_string()));
        assert_eq!(
            e.next_after(Some("#VVVVVVVV")),
            Some("#000000000".to_string())
        );
    }

    #[test]
    fn test_exhaustion_at_max_length() {
        let e = TagEnumerator::new(7, 9).unwrap();
        assert_eq!(e.next_after(Some("#VVVVVVVVV")), None);
    }

    #[test]
    fn test_invalid_previous_restarts() {
        let e = TagEnumerator::new(7, 9).unwrap();
        let first = Some("#0000000".to_string());
        assert_eq!(e.next_after(Some("garbage")), first);
        assert_eq!(e.next_after(Some("#ABCDEFG")), first);
        assert_eq!(e.next_after(Some("#000")), first);
        assert_eq!(e.next_after(Some("0000000")), first);
    }

    #[test]
    fn test_visits_every_tag_exactly_once() {
        let e = TagEnumerator::new(1, 3).unwrap();
        let mut seen = HashSet::new();
        let mut previous: Option<String> = None;
        let mut count = 0u128;

        while let Some(tag) = e.next_after(previous.as_deref()) {
            if let Some(prev) = &previous {
                assert_eq!(e.compare(prev, &tag), Some(Ordering::Less));
            }
            assert!(seen.insert(tag.clone()), "tag {} visited twice", tag);
            previous = Some(tag);
            count += 1;
        }

        assert_eq!(count, e.space_size());
        assert_eq!(count, 14 + 14 * 14 + 14 * 14 * 14);
        assert_eq!(previous.as_deref(), Some("#VVV"));
    }

    #[test]
    fn test_rejects_bad_bounds() {
        assert!(TagEnumerator::new(0, 3).is_err());
        assert!(TagEnumerator::new(5, 4).is_err());
        assert!(TagEnumerator::with_alphabet(b"00", 1, 2).is_err());
        assert!(TagEnumerator::with_alphabet(b"0", 1, 2).is_err());
    }

    #[test]
    fn test_next_tag_wrapper() {
        assert_eq!(next_tag(None, 7, 9), Some("#0000000".to_string()));
        assert_eq!(next_tag(Some("#0000000"), 0, 9), None);
    }
}
