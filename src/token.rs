//! Verification-code extraction from email bodies.
//!
//! A [`TokenExtractor`] holds an ordered list of patterns, most specific first,
//! and returns the first capture-group match. The ordering is the tie-break:
//! contextual phrases ("Gunakan kode OTP ...", "verification code: ...") win over
//! the bare 6-digit catch-all, so an unrelated digit run elsewhere in the same
//! message (a date, an amount) cannot shadow the real code.
//!
//! # Example
//!
//! ```
//! use otp_inbox::TokenExtractor;
//!
//! let extractor = TokenExtractor::default();
//! assert_eq!(
//!     extractor.extract("Your verification code is: 123456").as_deref(),
//!     Some("123456")
//! );
//! assert_eq!(extractor.extract("no codes here"), None);
//! ```

use crate::error::{Error, Result};
use regex::Regex;
use std::borrow::Cow;

/// A single compiled extraction pattern with a description for logging.
#[derive(Debug, Clone)]
pub struct TokenPattern {
    regex: Regex,
    description: String,
}

impl TokenPattern {
    /// Compiles a pattern. The first capture group is the extracted code.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPattern`] if the regex does not compile.
    pub fn new(pattern: &str, description: impl Into<String>) -> Result<Self> {
        let regex = Regex::new(pattern).map_err(|source| Error::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        })?;
        Ok(Self {
            regex,
            description: description.into(),
        })
    }

    /// Compiles a statically-known-valid pattern.
    fn builtin(pattern: &str, description: &str) -> Self {
        Self {
            regex: Regex::new(pattern).expect("valid builtin pattern"),
            description: description.to_string(),
        }
    }

    /// Returns the first capture group of the first match, if any.
    fn capture<'a>(&self, text: &'a str) -> Option<Cow<'a, str>> {
        self.regex
            .captures(text)
            .and_then(|caps| caps.get(1))
            .map(|m| Cow::Borrowed(m.as_str()))
    }

    /// Human-readable description, used in logging.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }
}

/// Ordered pattern cascade for extracting verification codes from message text.
///
/// Pure and stateless: the same input always yields the same output, and a
/// non-match is `None`, never an error - the caller keeps polling.
#[derive(Debug, Clone)]
pub struct TokenExtractor {
    patterns: Vec<TokenPattern>,
}

impl Default for TokenExtractor {
    /// The built-in cascade, covering the English and Indonesian transactional
    /// mails the suite encounters: specific phrases first, then generic
    /// "code:"/"token:" labels, then a bare 6-digit run as last resort, then
    /// 6-8 character alphanumeric variants.
    fn default() -> Self {
        Self {
            patterns: vec![
                TokenPattern::builtin(r"(?i)Gunakan\s+kode\s+OTP[^\d]*?(\d{6})", "kode OTP phrase"),
                TokenPattern::builtin(
                    r"(?i)Instruksi\s+Reset\s+Password[\s\S]*?(\d{6})",
                    "reset password instructions",
                ),
                TokenPattern::builtin(r"(?i)Reset\s+Password[\s\S]*?(\d{6})", "reset password"),
                TokenPattern::builtin(r"(?i)kode\s+OTP[^\d]*?(\d{6})", "kode OTP"),
                TokenPattern::builtin(r"(?i)kode\s+verifikasi[:\s]+(\d{6})", "kode verifikasi"),
                TokenPattern::builtin(
                    r"(?i)verification\s+code[:\s]+(\d{6})",
                    "verification code label",
                ),
                TokenPattern::builtin(r"(?i)token[:\s]+(\d{6})", "numeric token label"),
                TokenPattern::builtin(r"(?i)kode[:\s]+(\d{6})", "kode label"),
                TokenPattern::builtin(r"(?i)code[:\s]+(\d{6})", "code label"),
                TokenPattern::builtin(r"(\d{6})", "bare 6-digit run"),
                TokenPattern::builtin(
                    r"(?i)verification\s+code[:\s]+([A-Z0-9]{6,8})",
                    "alphanumeric verification code",
                ),
                TokenPattern::builtin(r"(?i)token[:\s]+([A-Z0-9]{6,8})", "alphanumeric token"),
            ],
        }
    }
}

impl TokenExtractor {
    /// Creates an extractor from a custom ordered pattern list.
    ///
    /// Patterns are tried in the given order; put the most specific first.
    #[must_use]
    pub fn new(patterns: Vec<TokenPattern>) -> Self {
        Self { patterns }
    }

    /// Appends a lower-priority pattern to the cascade.
    pub fn push(&mut self, pattern: TokenPattern) {
        self.patterns.push(pattern);
    }

    /// Extracts a code from raw message text.
    ///
    /// Evaluates the cascade in order and returns the first capture-group
    /// match. Empty text or no match yields `None`.
    #[must_use]
    pub fn extract<'a>(&self, text: &'a str) -> Option<Cow<'a, str>> {
        if text.is_empty() {
            return None;
        }
        for pattern in &self.patterns {
            if let Some(code) = pattern.capture(text) {
                tracing::debug!(
                    pattern = %pattern.description(),
                    code_len = code.len(),
                    "Pattern matched"
                );
                return Some(code);
            }
        }
        None
    }

    /// Extracts a code from a sequence of message body parts.
    ///
    /// Runs the full cascade over each part in order and returns on the first
    /// part that yields a match. A multipart message is not flattened: an early
    /// part that matches wins even if a later part would match a higher-priority
    /// pattern.
    #[must_use]
    pub fn extract_from_parts<'a>(&self, parts: &'a [String]) -> Option<Cow<'a, str>> {
        parts.iter().find_map(|part| self.extract(part))
    }
}
