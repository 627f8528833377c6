//! Internal module for parsing email content.
//!
//! The extraction cascade must see every body part of a message, not just the
//! first: transactional mails routinely carry a terse text/plain part and an
//! HTML part with the actual code. [`body_parts`] returns the decoded text of
//! all text parts in part order; a part that fails to decode is skipped rather
//! than failing the message.

use crate::error::{Error, Result};
use mailparse::{parse_mail, ParsedMail};
use tracing::{debug, warn};

/// Parses a raw RFC 822 message and collects the text of every body part.
///
/// Text parts (`text/plain`, `text/html`) are collected in part order,
/// recursing into nested multiparts. A message with no recognizable text parts
/// falls back to its top-level body. The result may be empty; the caller
/// treats that as an extraction miss, not an error.
pub(crate) fn body_parts(raw: &[u8]) -> Result<Vec<String>> {
    let parsed = parse_mail(raw).map_err(|source| Error::ParseEmail { source })?;

    let mut parts = Vec::new();
    collect_text_parts(&parsed, &mut parts);

    if parts.is_empty() {
        match parsed.get_body() {
            Ok(body) if !body.is_empty() => parts.push(body),
            Ok(_) => {}
            Err(e) => warn!(error = %e, "Failed to decode message body"),
        }
    }

    debug!(part_count = parts.len(), "Collected body parts");

    Ok(parts)
}

fn collect_text_parts(part: &ParsedMail<'_>, out: &mut Vec<String>) {
    if part.subparts.is_empty() {
        let content_type = part.ctype.mimetype.to_lowercase();
        if content_type == "text/plain" || content_type == "text/html" {
            match part.get_body() {
                Ok(body) => out.push(body),
                Err(e) => warn!(
                    content_type = %content_type,
                    error = %e,
                    "Failed to decode body part, skipping"
                ),
            }
        }
        return;
    }

    for subpart in &part.subparts {
        collect_text_parts(subpart, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_part_message() {
        let raw = b"From: noreply@noriba.id\r\nTo: suite@gmail.com\r\n\r\nYour code is 123456.";
        let parts = body_parts(raw).unwrap();
        assert_eq!(parts.len(), 1);
        assert!(parts[0].contains("123456"));
    }

    #[test]
    fn test_multipart_alternative_order() {
        let raw = b"From: noreply@noriba.id\r\n\
To: suite@gmail.com\r\n\
MIME-Version: 1.0\r\n\
Content-Type: multipart/alternative; boundary=\"b1\"\r\n\
\r\n\
--b1\r\n\
Content-Type: text/plain; charset=utf-8\r\n\
\r\n\
Gunakan kode OTP 482913 untuk transaksi\r\n\
--b1\r\n\
Content-Type: text/html; charset=utf-8\r\n\
\r\n\
<p>Gunakan kode OTP 482913</p>\r\n\
--b1--\r\n";
        let parts = body_parts(raw).unwrap();
        assert_eq!(parts.len(), 2);
        assert!(parts[0].contains("untuk transaksi"));
        assert!(parts[1].contains("<p>"));
    }

    #[test]
    fn test_base64_part_is_decoded() {
        let raw = b"From: noreply@noriba.id\r\n\
To: suite@gmail.com\r\n\
MIME-Version: 1.0\r\n\
Content-Type: text/plain; charset=utf-8\r\n\
Content-Transfer-Encoding: base64\r\n\
\r\n\
Q29kZTogNTU1MjIy\r\n";
        let parts = body_parts(raw).unwrap();
        assert_eq!(parts.len(), 1);
        assert!(parts[0].contains("Code: 555222"));
    }

    #[test]
    fn test_non_text_parts_are_skipped() {
        let raw = b"From: noreply@noriba.id\r\n\
MIME-Version: 1.0\r\n\
Content-Type: multipart/mixed; boundary=\"b2\"\r\n\
\r\n\
--b2\r\n\
Content-Type: application/pdf\r\n\
Content-Transfer-Encoding: base64\r\n\
\r\n\
JVBERi0xLjQ=\r\n\
--b2\r\n\
Content-Type: text/plain\r\n\
\r\n\
Token: ABC123\r\n\
--b2--\r\n";
        let parts = body_parts(raw).unwrap();
        assert_eq!(parts.len(), 1);
        assert!(parts[0].contains("Token: ABC123"));
    }

    #[test]
    fn test_extractor_integration() {
        use crate::token::TokenExtractor;

        let raw = b"From: noreply@noriba.id\r\nTo: suite@gmail.com\r\n\r\nYour verification code is: 654321";
        let parts = body_parts(raw).unwrap();

        let extractor = TokenExtractor::default();
        assert_eq!(extractor.extract_from_parts(&parts).as_deref(), Some("654321"));
    }
}
