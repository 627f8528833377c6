//! # otp-inbox
//!
//! Email verification-code retrieval for end-to-end test suites.
//!
//! This crate gives UI test scenarios a high-level, async API for:
//! - Connecting to the suite's mailbox over IMAP or the provider's REST API
//! - Waiting for a verification email and extracting the one-time code from it
//! - Generating collision-free test identities across suite runs
//!
//! ## Quick Start
//!
//! ```no_run
//! use otp_inbox::{connect_from_env, MailboxClient, PollOptions};
//! use std::time::Duration;
//!
//! # async fn example() -> otp_inbox::Result<()> {
//! // Backend is selected from the environment (API credentials win over IMAP)
//! let mut mailbox = connect_from_env().await?;
//!
//! // Capture an anchor, then trigger the action that sends the email
//! let anchor = mailbox.anchor().await?;
//! // ... app.tap_send_otp() ...
//!
//! let options = PollOptions::new("Reset Password")
//!     .timeout(Duration::from_secs(180))
//!     .anchor(anchor);
//! let code = mailbox.verification_code("suite+run42@gmail.com", &options).await?;
//! println!("Got code: {}", code);
//!
//! // Clean up
//! mailbox.disconnect().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Choosing a backend
//!
//! Both backends implement [`MailboxClient`] and share one contract; pick one
//! explicitly with [`connect`] and [`MailboxCredentials`], or let
//! [`connect_from_env`] decide from the environment:
//!
//! - `GMAIL_CLIENT_ID` / `GMAIL_CLIENT_SECRET` / `GMAIL_REFRESH_TOKEN`
//!   (optionally `GMAIL_REDIRECT_URI`) select [`ApiMailboxClient`]
//! - `TEST_EMAIL_ADDRESS` / `TEST_EMAIL_PASSWORD` select [`ImapMailboxClient`]
//!
//! ## Anchors
//!
//! The mailbox is a shared, append-only resource: earlier scenarios leave
//! qualifying messages behind. Capturing an [`Anchor`] right before the
//! code-triggering action and passing it in [`PollOptions`] guarantees that
//! only mail arriving *after* the action can satisfy the poll.
//!
//! ## Unique test identities
//!
//! ```no_run
//! use otp_inbox::SequenceCounter;
//!
//! let counter = SequenceCounter::at_default_location();
//! let run = counter.next("register");
//! let email = format!("suite+reg{run}@gmail.com");
//! let phone = format!("081234{run:06}");
//! ```
//!
//! ## Error Handling
//!
//! All errors implement `std::error::Error` and provide context. A retrieval
//! either returns the code or fails with a connection error (fatal, surfaced
//! immediately) or [`Error::WaitTimeout`] (the budget elapsed; carries the
//! elapsed time and how many candidates were inspected). Transient mid-poll
//! failures are logged and retried internally. Use [`Error::is_retryable`] to
//! decide whether a whole scenario is worth re-running.
//!
//! ## Observability
//!
//! The crate uses `tracing` for instrumentation. All major operations emit
//! spans with structured fields suitable for filtering.
//!
//! ### Span Naming Convention
//!
//! - `ImapMailboxClient::connect` / `ApiMailboxClient::connect` - backend setup
//! - `ImapMailboxClient::verification_code` / `ApiMailboxClient::verification_code` - polling
//! - `session::authenticate` - IMAP authentication
//! - `connection::establish_tls` - TLS connection
//!
//! ### Standard Fields
//!
//! - `recipient` - address the email must be delivered to
//! - `subject_keyword` - subject filter
//! - `uid` / `id` - message identity per backend
//! - `host` - IMAP server hostname

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Public modules
pub mod config;
pub mod error;
pub mod sequence;
pub mod token;

// Internal modules
mod api;
mod client;
mod connection;
mod imap;
mod parser;
mod poll;
mod session;

// Re-exports for ergonomic API
pub use api::ApiMailboxClient;
pub use client::{
    connect, connect_from_env, Anchor, MailboxClient, PollOptions, DEFAULT_POLL_TIMEOUT,
    DEFAULT_SUBJECT_KEYWORD,
};
pub use config::{
    ApiConfig, ApiConfigBuilder, ImapConfig, ImapConfigBuilder, MailboxCredentials,
    PollingConfig, TimeoutConfig,
};
pub use error::{Error, ErrorCategory, Result};
pub use imap::ImapMailboxClient;
pub use sequence::SequenceCounter;
pub use token::{TokenExtractor, TokenPattern};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_api_accessible() {
        // Ensure all public types are accessible
        let _ = ImapConfig::builder();
        let _ = ApiConfig::builder();
        let _ = TokenExtractor::default();
        let _ = PollOptions::default();
        let _ = SequenceCounter::at_default_location();
    }
}
