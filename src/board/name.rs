//! Board naming policy.
//!
//! A board name is accepted when either:
//! - the whole name consists of ASCII letters, digits and dots, or
//! - the part before the first dot is an ISO 639-1 language code, in which
//!   case the rest may use any script.
//!
//! The second rule exists so that readers who cannot type a board's script
//! can still filter boards by their language prefix (NNTP clients in
//! particular). Independently of the rule, names may not start or end with a
//! dot, contain empty segments, or contain whitespace/control characters.

use crate::board::constants::MAX_BOARD_NAME_LENGTH;
use crate::error::{BoardError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// ISO 639-1 two-letter language codes, including the legacy aliases
/// `in`, `iw` and `ji` that older locale tables still report.
const ISO_639_1_CODES: &[&str] = &[
    "aa", "ab", "ae", "af", "ak", "am", "an", "ar", "as", "av", "ay", "az", "ba", "be", "bg", "bh",
    "bi", "bm", "bn", "bo", "br", "bs", "ca", "ce", "ch", "co", "cr", "cs", "cu", "cv", "cy", "da",
    "de", "dv", "dz", "ee", "el", "en", "eo", "es", "et", "eu", "fa", "ff", "fi", "fj", "fo", "fr",
    "fy", "ga", "gd", "gl", "gn", "gu", "gv", "ha", "he", "hi", "ho", "hr", "ht", "hu", "hy", "hz",
    "ia", "id", "ie", "ig", "ii", "ik", "in", "io", "is", "it", "iu", "iw", "ja", "ji", "jv", "ka",
    "kg", "ki", "kj", "kk", "kl", "km", "kn", "ko", "kr", "ks", "ku", "kv", "kw", "ky", "la", "lb",
    "lg", "li", "ln", "lo", "lt", "lu", "lv", "mg", "mh", "mi", "mk", "ml", "mn", "mr", "ms", "mt",
    "my", "na", "nb", "nd", "ne", "ng", "nl", "nn", "no", "nr", "nv", "ny", "oc", "oj", "om", "or",
    "os", "pa", "pi", "pl", "ps", "pt", "qu", "rm", "rn", "ro", "ru", "rw", "sa", "sc", "sd", "se",
    "sg", "si", "sk", "sl", "sm", "sn", "so", "sq", "sr", "ss", "st", "su", "sv", "sw", "ta", "te",
    "tg", "th", "ti", "tk", "tl", "tn", "to", "tr", "ts", "tt", "tw", "ty", "ug", "uk", "ur", "uz",
    "ve", "vi", "vo", "wa", "wo", "xh", "yi", "yo", "za", "zh", "zu",
];

/// A validated board name.
///
/// Ordering is plain byte ordering of the name; cross-posted insertions use it
/// as the global lock order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BoardName(String);

impl BoardName {
    /// Validates and wraps a board name.
    ///
    /// # Errors
    /// Returns `InvalidName` if the name is empty, longer than
    /// `MAX_BOARD_NAME_LENGTH` bytes, malformed, or fails the naming policy.
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();

        if name.is_empty() {
            return Err(BoardError::invalid_name("Board name cannot be empty"));
        }
        if name.len() > MAX_BOARD_NAME_LENGTH {
            return Err(BoardError::invalid_name(format!(
                "Board name exceeds maximum length of {} bytes",
                MAX_BOARD_NAME_LENGTH
            )));
        }
        if name.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(BoardError::invalid_name(format!(
                "Board name '{}' contains whitespace or control characters",
                name
            )));
        }
        if name.split('.').any(str::is_empty) {
            return Err(BoardError::invalid_name(format!(
                "Board name '{}' has an empty segment",
                name
            )));
        }
        if !is_name_valid(&name) {
            return Err(BoardError::invalid_name(format!(
                "Board name '{}' must be ASCII letters, digits and dots, \
                 or start with an ISO 639-1 language code followed by a dot",
                name
            )));
        }

        Ok(Self(name))
    }

    /// Returns the name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if NNTP readers can display this name unchanged.
    pub fn is_nntp_name(&self) -> bool {
        is_ascii_name(&self.0)
    }

    /// Returns the language prefix (the part before the first dot) if it is an
    /// ISO 639-1 code.
    pub fn language(&self) -> Option<&str> {
        let prefix = self.0.split('.').next()?;
        is_language_code(prefix).then_some(prefix)
    }
}

/// Checks the naming policy without the structural checks.
pub fn is_name_valid(name: &str) -> bool {
    if is_ascii_name(name) {
        return true;
    }
    let first_part = name.split('.').next().unwrap_or(name);
    // A bare language code with nothing after it is covered by the ASCII rule.
    first_part.len() < name.len() && is_language_code(first_part)
}

fn is_ascii_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'.')
}

fn is_language_code(code: &str) -> bool {
    ISO_639_1_CODES.binary_search(&code).is_ok()
}

impl fmt::Display for BoardName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for BoardName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for BoardName {
    type Error = BoardError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl TryFrom<&str> for BoardName {
    type Error = BoardError;

    fn try_from(value: &str) -> Result<Self> {
        Self::new(value)
    }
}

impl From<BoardName> for String {
    fn from(name: BoardName) -> Self {
        name.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_codes_sorted() {
        let mut sorted = ISO_639_1_CODES.to_vec();
        sorted.sort_unstable();
        assert_eq!(sorted, ISO_639_1_CODES, "binary search needs a sorted table");
    }

    #[test]
    fn test_ascii_names_accepted() {
        for name in ["freenet", "test.board", "en.politics", "a1.b2.c3", "FREETALK"] {
            let board = BoardName::new(name).expect(name);
            assert!(board.is_nntp_name());
        }
    }

    #[test]
    fn test_language_prefixed_names_accepted() {
        let board = BoardName::new("de.Übersicht").unwrap();
        assert!(!board.is_nntp_name());
        assert_eq!(board.language(), Some("de"));

        let board = BoardName::new("ru.новости").unwrap();
        assert_eq!(board.language(), Some("ru"));
    }

    #[test]
    fn test_non_ascii_without_language_rejected() {
        assert!(BoardName::new("Übersicht").is_err());
        assert!(BoardName::new("xx.новости").is_err());
        assert!(BoardName::new("DE.Übersicht").is_err());
    }

    #[test]
    fn test_malformed_names_rejected() {
        for name in ["", ".", ".board", "board.", "a..b", "has space", "tab\tname"] {
            assert!(
                matches!(BoardName::new(name), Err(BoardError::InvalidName(_))),
                "{:?} should be rejected",
                name
            );
        }
    }

    #[test]
    fn test_name_too_long() {
        let long_name = "x".repeat(MAX_BOARD_NAME_LENGTH + 1);
        assert!(BoardName::new(long_name).is_err());

        let max_name = "x".repeat(MAX_BOARD_NAME_LENGTH);
        assert!(BoardName::new(max_name).is_ok());
    }

    #[test]
    fn test_serde_validates() {
        let name: BoardName = serde_json::from_str("\"en.test\"").unwrap();
        assert_eq!(name.as_str(), "en.test");

        assert!(serde_json::from_str::<BoardName>("\"bad name\"").is_err());
    }

    #[test]
    fn test_ordering_is_lexicographic() {
        let a = BoardName::new("alpha").unwrap();
        let b = BoardName::new("beta").unwrap();
        assert!(a < b);
    }
}
