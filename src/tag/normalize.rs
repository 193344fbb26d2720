use crate::tag::{ALPHABET, MAX_BODY_LEN, MIN_BODY_LEN, TAG_PREFIX};
use crate::TagError;
use std::cmp::Ordering;

/// Returns the position of a symbol in the tag alphabet
pub fn symbol_index(symbol: u8) -> Option<usize> {
    ALPHABET.iter().position(|&s| s == symbol)
}

/// Normalizes a tag according to the API's tag rules
///
/// # Normalization Steps
///
/// 1. Trim surrounding whitespace
/// 2. Strip a leading `#` if present
/// 3. Uppercase the body
/// 4. Map the letter `O` to the digit `0` (players routinely confuse them)
/// 5. Reject any symbol outside the alphabet
/// 6. Enforce 7-9 body symbols
/// 7. Re-attach the `#` prefix
///
/// # Arguments
///
/// * `raw` - The tag as typed or as received from the API
///
/// # Returns
///
/// * `Ok(String)` - Canonical tag
/// * `Err(TagError)` - The tag cannot be canonicalized
pub fn normalize_tag(raw: &str) -> Result<String, TagError> {
    let trimmed = raw.trim();
    let body = trimmed.strip_prefix(TAG_PREFIX).unwrap_or(trimmed);

    if body.is_empty() {
        return Err(TagError::Empty);
    }

    let body: String = body
        .chars()
        .map(|c| match c.to_ascii_uppercase() {
            'O' => '0',
            other => other,
        })
        .collect();

    if let Some(symbol) = body
        .chars()
        .find(|c| !c.is_ascii() || symbol_index(*c as u8).is_none())
    {
        return Err(TagError::InvalidSymbol {
            tag: raw.to_string(),
            symbol,
        });
    }

    let len = body.len();
    if !(MIN_BODY_LEN..=MAX_BODY_LEN).contains(&len) {
        return Err(TagError::Length {
            tag: raw.to_string(),
            len,
            min: MIN_BODY_LEN,
            max: MAX_BODY_LEN,
        });
    }

    Ok(format!("{}{}", TAG_PREFIX, body))
}

/// Digit representation of a prefixed tag, or None if any symbol is foreign
pub(crate) fn digits_of(tag: &str) -> Option<Vec<usize>> {
    let body = tag.strip_prefix(TAG_PREFIX)?;
    if body.is_empty() {
        return None;
    }
    body.bytes().map(symbol_index).collect()
}

/// Compares two tags in enumeration order
///
/// Shorter bodies come first; bodies of equal length compare digit by digit
/// using alphabet positions. Returns None if either tag has foreign symbols.
pub fn compare_tags(a: &str, b: &str) -> Option<Ordering> {
    let da = digits_of(a)?;
    let db = digits_of(b)?;
    Some(da.len().cmp(&db.len()).then_with(|| da.cmp(&db)))
}
