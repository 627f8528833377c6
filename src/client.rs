//! The mailbox-client contract shared by both backends.
//!
//! A test scenario captures an [`Anchor`] right before triggering the action
//! that sends the email, then asks the client for the code:
//!
//! ```no_run
//! use otp_inbox::{connect, MailboxClient, MailboxCredentials, PollOptions};
//! use std::time::Duration;
//!
//! # async fn example() -> otp_inbox::Result<()> {
//! let credentials = MailboxCredentials::from_env()?;
//! let mut mailbox = connect(credentials).await?;
//!
//! let anchor = mailbox.anchor().await?;
//! // ... tap the "send OTP" button in the app under test ...
//!
//! let options = PollOptions::new("Reset Password")
//!     .timeout(Duration::from_secs(180))
//!     .anchor(anchor);
//! let code = mailbox.verification_code("suite+run42@gmail.com", &options).await?;
//!
//! mailbox.disconnect().await?;
//! # Ok(())
//! # }
//! ```
//!
//! The anchor is what makes a shared, append-only mailbox safe to poll: without
//! it, a leftover message from an earlier scenario with the same recipient and
//! subject could satisfy the search and hand back a stale code.

use crate::api::ApiMailboxClient;
use crate::config::MailboxCredentials;
use crate::error::Result;
use crate::imap::ImapMailboxClient;
use async_trait::async_trait;
use std::time::Duration;

/// Default subject keyword when the caller does not supply one.
pub const DEFAULT_SUBJECT_KEYWORD: &str = "verification";

/// Default polling budget per retrieval call.
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(60);

/// Backend-specific cursor marking "now" in the mailbox.
///
/// Captured immediately before the action that triggers the email, never reused
/// across unrelated actions. The two backends order messages differently, so the
/// semantic distinction stays explicit in the type rather than being collapsed
/// onto one representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    /// IMAP: the mailbox's next UID at capture time. Messages with
    /// UID >= this value arrived after the anchor was taken.
    NextUid(u32),
    /// Provider API: epoch milliseconds at capture time. Messages with an
    /// internal send-time strictly greater than this arrived after the anchor.
    Timestamp(i64),
}

impl std::fmt::Display for Anchor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Anchor::NextUid(uid) => write!(f, "uid>={uid}"),
            Anchor::Timestamp(millis) => write!(f, "after {millis}ms"),
        }
    }
}

/// Per-call options for [`MailboxClient::verification_code`].
#[derive(Debug, Clone)]
pub struct PollOptions {
    /// Case-insensitive substring the email subject must contain.
    pub subject_keyword: String,
    /// Wall-clock budget for the whole retrieval.
    pub timeout: Duration,
    /// Excludes messages that existed before the anchor was captured.
    pub anchor: Option<Anchor>,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            subject_keyword: DEFAULT_SUBJECT_KEYWORD.to_string(),
            timeout: DEFAULT_POLL_TIMEOUT,
            anchor: None,
        }
    }
}

impl PollOptions {
    /// Creates options with the given subject keyword and default timeout.
    #[must_use]
    pub fn new(subject_keyword: impl Into<String>) -> Self {
        Self {
            subject_keyword: subject_keyword.into(),
            ..Self::default()
        }
    }

    /// Sets the polling budget. Scenarios that exercise OTP expiry use budgets
    /// up to eight minutes; the default is one minute.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Restricts the search to messages newer than the anchor.
    #[must_use]
    pub fn anchor(mut self, anchor: Anchor) -> Self {
        self.anchor = Some(anchor);
        self
    }
}

/// A mailbox that can be polled for verification codes.
///
/// Two implementations exist - [`ApiMailboxClient`] and [`ImapMailboxClient`] -
/// selected by [`connect`] from the credentials variant.
///
/// # Contract
///
/// A code returned by [`verification_code`](Self::verification_code) comes from
/// a message that is addressed to the requested recipient, carries the subject
/// keyword, is newer than the anchor when one is supplied, was unread when
/// inspected, and matched the extraction cascade. At most one message per
/// successful call ends up consumed (marked read); the backends differ in when
/// that happens - see each implementation.
#[async_trait]
pub trait MailboxClient: Send {
    /// Captures an [`Anchor`] marking "now" in the mailbox.
    ///
    /// Call this right before triggering the action that sends the email.
    async fn anchor(&mut self) -> Result<Anchor>;

    /// Polls the mailbox until a qualifying message yields a code.
    ///
    /// # Errors
    ///
    /// [`Error::WaitTimeout`](crate::Error::WaitTimeout) once the budget in
    /// `options.timeout` is exhausted; transient search/fetch failures inside
    /// the loop are logged and retried until then.
    async fn verification_code(&mut self, recipient: &str, options: &PollOptions)
        -> Result<String>;

    /// Releases the backend's resources.
    ///
    /// For IMAP this performs a clean LOGOUT and resolves once the server
    /// confirms; for the API backend it is a no-op. Callers are responsible for
    /// invoking this on both success and failure paths of a scenario.
    async fn disconnect(&mut self) -> Result<()>;
}

/// Connects the backend selected by the credentials.
///
/// # Errors
///
/// Connection and authentication failures are fatal here - they are not retried
/// by the subsystem; the caller decides whether a scenario is worth re-running.
pub async fn connect(credentials: MailboxCredentials) -> Result<Box<dyn MailboxClient>> {
    match credentials {
        MailboxCredentials::Api(config) => {
            Ok(Box::new(ApiMailboxClient::connect(config).await?))
        }
        MailboxCredentials::Imap(config) => {
            Ok(Box::new(ImapMailboxClient::connect(config).await?))
        }
    }
}

/// Connects the backend selected by the process environment.
///
/// See [`MailboxCredentials::from_env`] for the selection rule.
///
/// # Errors
///
/// Propagates credential-selection and connection errors.
pub async fn connect_from_env() -> Result<Box<dyn MailboxClient>> {
    connect(MailboxCredentials::from_env()?).await
}
