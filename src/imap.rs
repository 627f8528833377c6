//! IMAP backend for verification-code retrieval.
//!
//! [`ImapMailboxClient`] holds one long-lived TLS session per suite run:
//! opened by [`connect`](ImapMailboxClient::connect) in the setup phase,
//! released by [`disconnect`](MailboxClient::disconnect) in teardown. A
//! connection or login failure during `connect` is fatal and not retried here;
//! search and fetch failures during a poll are logged and retried until the
//! polling budget runs out.
//!
//! # Consumption semantics
//!
//! The poll fetches the newest qualifying message with `BODY[]`, which marks it
//! `\Seen` before extraction is attempted. A candidate whose extraction fails
//! is therefore consumed - it drops out of the next `UNSEEN` search instead of
//! being re-inspected forever. This differs from the API backend, which only
//! consumes the message that actually produced the returned code.

use crate::client::{Anchor, MailboxClient, PollOptions};
use crate::config::ImapConfig;
use crate::connection;
use crate::error::{Error, Result};
use crate::parser;
use crate::poll::Poller;
use crate::session::{self, AuthConfig, ImapSession};
use crate::token::TokenExtractor;
use async_trait::async_trait;
use tracing::{debug, instrument, warn};

const MAILBOX: &str = "INBOX";

/// Stateful IMAP client polling one mailbox for verification codes.
///
/// Create using [`ImapMailboxClient::connect`].
pub struct ImapMailboxClient {
    session: Box<ImapSession>,
    config: ImapConfig,
    extractor: TokenExtractor,
}

impl ImapMailboxClient {
    /// Connects to the IMAP server: TCP, TLS handshake, LOGIN, SELECT INBOX,
    /// each step under its own timeout.
    ///
    /// # Errors
    ///
    /// Connection, authentication, and selection failures are fatal - the
    /// subsystem does not retry them; the caller owns that decision.
    #[instrument(
        name = "ImapMailboxClient::connect",
        skip_all,
        fields(account = %config.account(), host = %config.host)
    )]
    pub async fn connect(config: ImapConfig) -> Result<Self> {
        let session = Self::initialize_session(&config).await?;

        debug!("Client connected and ready");

        Ok(Self {
            session: Box::new(session),
            config,
            extractor: TokenExtractor::default(),
        })
    }

    /// Replaces the default extraction cascade.
    #[must_use]
    pub fn with_extractor(mut self, extractor: TokenExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    /// Returns the account address used for this connection.
    #[must_use]
    pub fn account(&self) -> &str {
        self.config.account()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Private methods
    // ─────────────────────────────────────────────────────────────────────────

    /// Initializes IMAP session with connection, authentication, and mailbox selection.
    async fn initialize_session(config: &ImapConfig) -> Result<ImapSession> {
        let target_addr = config.server_address();
        let timeouts = &config.timeouts;

        let tls_stream = tokio::time::timeout(
            timeouts.connect,
            connection::establish_tls_connection(&config.host, &target_addr),
        )
        .await
        .map_err(|_| Error::ConnectTimeout {
            target: target_addr.clone(),
            timeout: timeouts.connect,
        })??;

        debug!("TLS connection established");

        let auth_config = AuthConfig {
            account: config.account(),
            password: config.password(),
        };

        let mut session = tokio::time::timeout(
            timeouts.auth,
            session::authenticate(tls_stream, &auth_config),
        )
        .await
        .map_err(|_| Error::AuthTimeout {
            account: config.account().to_string(),
            timeout: timeouts.auth,
        })??;

        debug!("Authenticated");

        tokio::time::timeout(
            timeouts.select,
            session::select_mailbox(&mut session, MAILBOX),
        )
        .await
        .map_err(|_| Error::SelectTimeout {
            mailbox: MAILBOX.to_string(),
            timeout: timeouts.select,
        })??;

        debug!("Selected {MAILBOX}");

        Ok(session)
    }

    /// One poll attempt: search, filter by anchor, fetch the newest candidate,
    /// extract.
    ///
    /// Parse failures and extraction misses are not errors - they leave the
    /// loop running. The fetched candidate is already `\Seen` either way.
    async fn check_mailbox(
        &mut self,
        recipient: &str,
        options: &PollOptions,
        poller: &mut Poller,
    ) -> Result<Option<String>> {
        let timeouts = self.config.timeouts.clone();

        let uids = tokio::time::timeout(
            timeouts.search,
            session::search_unseen(&mut self.session, recipient, &options.subject_keyword),
        )
        .await
        .map_err(|_| Error::SearchTimeout {
            timeout: timeouts.search,
        })??;

        let anchor_uid = match options.anchor {
            Some(Anchor::NextUid(uid)) => Some(uid),
            Some(Anchor::Timestamp(_)) => {
                warn!("Timestamp anchor ignored by the IMAP backend");
                None
            }
            None => None,
        };

        let Some(uid) = newest_qualifying(&uids, anchor_uid) else {
            debug!(found = uids.len(), "No qualifying message yet");
            return Ok(None);
        };

        poller.record_candidates(1);

        let body = tokio::time::timeout(timeouts.fetch, session::fetch_body(&mut self.session, uid))
            .await
            .map_err(|_| Error::FetchTimeout {
                uid,
                timeout: timeouts.fetch,
            })??;

        let Some(raw) = body else {
            debug!(uid, "Message had no body");
            return Ok(None);
        };

        let parts = match parser::body_parts(&raw) {
            Ok(parts) => parts,
            Err(e) => {
                warn!(uid, error = %e, "Failed to parse message, skipping");
                return Ok(None);
            }
        };

        match self.extractor.extract_from_parts(&parts) {
            Some(code) => {
                debug!(uid, "Extracted verification code");
                Ok(Some(code.into_owned()))
            }
            None => {
                debug!(uid, "No pattern matched; message is now seen");
                Ok(None)
            }
        }
    }
}

/// Picks the newest UID at or above the anchor, if any.
fn newest_qualifying(uids: &[u32], anchor_uid: Option<u32>) -> Option<u32> {
    uids.iter()
        .copied()
        .filter(|&uid| anchor_uid.is_none_or(|anchor| uid >= anchor))
        .max()
}

#[async_trait]
impl MailboxClient for ImapMailboxClient {
    /// Captures the mailbox's next UID as the anchor baseline.
    ///
    /// Any message with UID >= the returned value arrived after this call.
    #[instrument(name = "ImapMailboxClient::anchor", skip(self))]
    async fn anchor(&mut self) -> Result<Anchor> {
        let timeout = self.config.timeouts.search;

        let uid_next =
            tokio::time::timeout(timeout, session::next_uid(&mut self.session, MAILBOX))
                .await
                .map_err(|_| Error::SearchTimeout { timeout })??;

        debug!(uid_next, "Captured anchor");

        Ok(Anchor::NextUid(uid_next))
    }

    #[instrument(
        name = "ImapMailboxClient::verification_code",
        skip(self, options),
        fields(
            recipient = %recipient,
            subject_keyword = %options.subject_keyword,
            timeout_secs = options.timeout.as_secs()
        )
    )]
    async fn verification_code(
        &mut self,
        recipient: &str,
        options: &PollOptions,
    ) -> Result<String> {
        let mut poller = Poller::start(options.timeout, self.config.polling.interval);

        loop {
            match self.check_mailbox(recipient, options, &mut poller).await {
                Ok(Some(code)) => return Ok(code),
                Ok(None) => {}
                // A transient search/fetch failure never ends the poll early;
                // only the deadline does.
                Err(e) if e.is_retryable() => {
                    warn!(error = %e, "Poll attempt failed, will retry");
                }
                Err(e) => return Err(e),
            }

            poller.wait().await?;
        }
    }

    /// Closes the session with a clean LOGOUT; resolves once the server
    /// confirms (or the logout timeout fires).
    #[instrument(name = "ImapMailboxClient::disconnect", skip(self))]
    async fn disconnect(&mut self) -> Result<()> {
        let timeout = self.config.timeouts.logout;

        tokio::time::timeout(timeout, session::logout(&mut self.session))
            .await
            .map_err(|_| Error::LogoutTimeout { timeout })?
    }
}

impl std::fmt::Debug for ImapMailboxClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImapMailboxClient")
            .field("account", &self.config.account())
            .field("host", &self.config.host)
            .finish_non_exhaustive()
    }
}
