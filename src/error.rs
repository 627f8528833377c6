//! Error types for the otp-inbox crate.
//!
//! All errors implement [`std::error::Error`] and provide context about what went wrong.
//! Errors are categorized by their retryability - see [`Error::is_retryable`].
//!
//! The polling loops treat most mid-poll failures (search, fetch, parse, HTTP) as
//! transient: they are logged and the loop continues until the deadline. The errors
//! that actually reach callers are the fatal connection/authentication variants and
//! [`Error::WaitTimeout`].

use std::time::Duration;
use thiserror::Error;

/// Result type alias using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during verification-code retrieval.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    // ─────────────────────────────────────────────────────────────────────────
    // Configuration / validation errors (NOT retryable)
    // ─────────────────────────────────────────────────────────────────────────
    /// Invalid email address format.
    #[error("invalid email format: {email}")]
    InvalidEmailFormat {
        /// The invalid email address.
        email: String,
    },

    /// Invalid configuration provided.
    #[error("invalid configuration: {message}")]
    InvalidConfig {
        /// Description of the configuration error.
        message: String,
    },

    /// No usable mailbox credentials in the environment.
    #[error("no mailbox credentials: set GMAIL_* for the API backend or TEST_EMAIL_ADDRESS/TEST_EMAIL_PASSWORD for IMAP")]
    MissingCredentials,

    /// Invalid DNS name for TLS.
    #[error("invalid DNS name for host '{host}'")]
    InvalidDnsName {
        /// The invalid hostname.
        host: String,
        /// The underlying DNS name error.
        #[source]
        source: rustls::client::InvalidDnsNameError,
    },

    /// Invalid token extraction pattern.
    #[error("invalid token pattern '{pattern}'")]
    InvalidPattern {
        /// The pattern that failed to compile.
        pattern: String,
        /// The underlying regex error.
        #[source]
        source: regex::Error,
    },

    // ─────────────────────────────────────────────────────────────────────────
    // Connection errors (fatal for the call that hit them; a fresh connect
    // attempt may succeed, so they classify as retryable)
    // ─────────────────────────────────────────────────────────────────────────
    /// Failed to establish TCP connection.
    #[error("failed to connect to {target}")]
    TcpConnect {
        /// The target address that failed.
        target: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to establish TLS connection.
    #[error("failed to establish TLS connection to {target}")]
    TlsConnect {
        /// The target address that failed.
        target: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Connection timeout.
    #[error("connection timeout to {target} after {timeout:?}")]
    ConnectTimeout {
        /// The target address.
        target: String,
        /// The timeout duration that was exceeded.
        timeout: Duration,
    },

    /// Authentication timeout.
    #[error("authentication timeout for {account} after {timeout:?}")]
    AuthTimeout {
        /// The account used for authentication.
        account: String,
        /// The timeout duration that was exceeded.
        timeout: Duration,
    },

    /// Mailbox selection timeout.
    #[error("mailbox selection timeout for '{mailbox}' after {timeout:?}")]
    SelectTimeout {
        /// The mailbox name.
        mailbox: String,
        /// The timeout duration that was exceeded.
        timeout: Duration,
    },

    // ─────────────────────────────────────────────────────────────────────────
    // Poll-terminal errors (NOT retryable: the budget is already spent)
    // ─────────────────────────────────────────────────────────────────────────
    /// No qualifying message yielded a code within the polling budget.
    #[error("no verification code found after {waited:?} ({candidates} candidate message(s) inspected)")]
    WaitTimeout {
        /// Total wall-clock time spent polling.
        waited: Duration,
        /// Number of candidate messages inspected across all polls.
        candidates: usize,
    },

    // ─────────────────────────────────────────────────────────────────────────
    // IMAP protocol errors (RETRYABLE - could be transient server issues)
    // ─────────────────────────────────────────────────────────────────────────
    /// IMAP login failed.
    #[error("IMAP login failed for {account}")]
    ImapLogin {
        /// The account used for login.
        account: String,
        /// The underlying IMAP error.
        #[source]
        source: async_imap::error::Error,
    },

    /// Failed to select mailbox.
    #[error("failed to select mailbox '{mailbox}'")]
    SelectMailbox {
        /// The mailbox name.
        mailbox: String,
        /// The underlying IMAP error.
        #[source]
        source: async_imap::error::Error,
    },

    /// IMAP search failed.
    #[error("IMAP search failed")]
    ImapSearch {
        /// The underlying IMAP error.
        #[source]
        source: async_imap::error::Error,
    },

    /// IMAP search timed out.
    #[error("IMAP search timeout after {timeout:?}")]
    SearchTimeout {
        /// The timeout duration that was exceeded.
        timeout: Duration,
    },

    /// IMAP fetch failed.
    #[error("IMAP fetch failed for UID {uid}")]
    ImapFetch {
        /// The UID that failed.
        uid: u32,
        /// The underlying IMAP error.
        #[source]
        source: async_imap::error::Error,
    },

    /// Message fetch timed out.
    #[error("message fetch timeout for UID {uid} after {timeout:?}")]
    FetchTimeout {
        /// The UID being fetched.
        uid: u32,
        /// The timeout duration that was exceeded.
        timeout: Duration,
    },

    /// Failed to read a message from the fetch stream.
    #[error("failed to fetch message from stream")]
    FetchMessage {
        /// The underlying IMAP error.
        #[source]
        source: async_imap::error::Error,
    },

    /// IMAP logout failed.
    #[error("IMAP logout failed")]
    ImapLogout {
        /// The underlying IMAP error.
        #[source]
        source: async_imap::error::Error,
    },

    /// Logout timed out (not critical).
    #[error("logout timeout after {timeout:?}")]
    LogoutTimeout {
        /// The timeout duration that was exceeded.
        timeout: Duration,
    },

    // ─────────────────────────────────────────────────────────────────────────
    // Mail provider API errors
    // ─────────────────────────────────────────────────────────────────────────
    /// OAuth2 token refresh failed (fatal: the backend cannot authorize).
    #[error("OAuth2 token refresh failed: {detail}")]
    TokenRefresh {
        /// Status or transport detail of the failure.
        detail: String,
    },

    /// The provider API request failed at the transport level.
    #[error("mail API request to {endpoint} failed")]
    ApiRequest {
        /// The endpoint that failed.
        endpoint: String,
        /// The underlying HTTP error.
        #[source]
        source: reqwest::Error,
    },

    /// The provider API returned a non-success status.
    #[error("mail API returned {status} for {endpoint}")]
    ApiStatus {
        /// The endpoint that failed.
        endpoint: String,
        /// The HTTP status code.
        status: reqwest::StatusCode,
    },

    // ─────────────────────────────────────────────────────────────────────────
    // Email parsing errors (NOT retryable - malformed content won't change)
    // ─────────────────────────────────────────────────────────────────────────
    /// Failed to parse email message.
    #[error("failed to parse email")]
    ParseEmail {
        /// The underlying parse error.
        #[source]
        source: mailparse::MailParseError,
    },
}

impl Error {
    /// Returns `true` if this error represents a transient failure that might succeed on retry.
    ///
    /// The polling loops use this internally; callers can use it to decide whether a
    /// whole scenario is worth re-running:
    ///
    /// ```ignore
    /// if error.is_retryable() {
    ///     // Backoff and retry
    /// } else {
    ///     // Fail permanently
    /// }
    /// ```
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            // RETRYABLE errors: network, connection timeouts, protocol operations
            Error::TcpConnect { .. }
            | Error::TlsConnect { .. }
            | Error::ConnectTimeout { .. }
            | Error::AuthTimeout { .. }
            | Error::SelectTimeout { .. }
            | Error::ImapLogin { .. }
            | Error::SelectMailbox { .. }
            | Error::ImapSearch { .. }
            | Error::SearchTimeout { .. }
            | Error::ImapFetch { .. }
            | Error::FetchTimeout { .. }
            | Error::FetchMessage { .. }
            | Error::ApiRequest { .. }
            | Error::ApiStatus { .. } => true,

            // NOT retryable: config errors, exhausted wait budget, parsing, local state
            Error::InvalidEmailFormat { .. }
            | Error::InvalidConfig { .. }
            | Error::MissingCredentials
            | Error::InvalidDnsName { .. }
            | Error::InvalidPattern { .. }
            | Error::WaitTimeout { .. }
            | Error::ImapLogout { .. }
            | Error::LogoutTimeout { .. }
            | Error::TokenRefresh { .. }
            | Error::ParseEmail { .. } => false,
        }
    }

    /// Returns the error category for metrics/logging purposes.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::InvalidEmailFormat { .. }
            | Error::InvalidConfig { .. }
            | Error::MissingCredentials
            | Error::InvalidDnsName { .. }
            | Error::InvalidPattern { .. } => ErrorCategory::Configuration,

            Error::TcpConnect { .. } | Error::TlsConnect { .. } => ErrorCategory::Network,

            Error::ConnectTimeout { .. }
            | Error::AuthTimeout { .. }
            | Error::SelectTimeout { .. }
            | Error::SearchTimeout { .. }
            | Error::FetchTimeout { .. }
            | Error::WaitTimeout { .. }
            | Error::LogoutTimeout { .. } => ErrorCategory::Timeout,

            Error::ImapLogin { .. }
            | Error::SelectMailbox { .. }
            | Error::ImapSearch { .. }
            | Error::ImapFetch { .. }
            | Error::FetchMessage { .. }
            | Error::ImapLogout { .. }
            | Error::TokenRefresh { .. }
            | Error::ApiRequest { .. }
            | Error::ApiStatus { .. } => ErrorCategory::Protocol,

            Error::ParseEmail { .. } => ErrorCategory::Parse,
        }
    }
}

/// Error categories for metrics and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Configuration or validation errors.
    Configuration,
    /// Network connectivity errors.
    Network,
    /// Timeout errors.
    Timeout,
    /// IMAP or provider-API protocol errors.
    Protocol,
    /// Email parsing errors.
    Parse,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCategory::Configuration => write!(f, "configuration"),
            ErrorCategory::Network => write!(f, "network"),
            ErrorCategory::Timeout => write!(f, "timeout"),
            ErrorCategory::Protocol => write!(f, "protocol"),
            ErrorCategory::Parse => write!(f, "parse"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        // Configuration errors are not retryable
        let err = Error::InvalidEmailFormat {
            email: "bad".into(),
        };
        assert!(!err.is_retryable());

        // Network errors are retryable
        let err = Error::TcpConnect {
            target: "imap.gmail.com:993".into(),
            source: std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused"),
        };
        assert!(err.is_retryable());

        // Wait timeout is not retryable (the budget is already spent)
        let err = Error::WaitTimeout {
            waited: Duration::from_secs(60),
            candidates: 3,
        };
        assert!(!err.is_retryable());

        // Token refresh failure means the credentials are bad
        let err = Error::TokenRefresh {
            detail: "401 invalid_grant".into(),
        };
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_error_categories() {
        let err = Error::MissingCredentials;
        assert_eq!(err.category(), ErrorCategory::Configuration);

        let err = Error::ConnectTimeout {
            target: "imap.gmail.com:993".into(),
            timeout: Duration::from_secs(10),
        };
        assert_eq!(err.category(), ErrorCategory::Timeout);

        let err = Error::TokenRefresh {
            detail: "500".into(),
        };
        assert_eq!(err.category(), ErrorCategory::Protocol);
    }

    #[test]
    fn test_wait_timeout_carries_diagnostics() {
        let err = Error::WaitTimeout {
            waited: Duration::from_secs(180),
            candidates: 2,
        };
        let msg = err.to_string();
        assert!(msg.contains("180"));
        assert!(msg.contains("2 candidate"));
    }
}
