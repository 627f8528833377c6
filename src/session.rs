//! Internal IMAP session management.
//!
//! This module wraps async-imap operations with proper error handling. The
//! search criteria and fetch shape mirror what the retrieval loop needs: unseen
//! messages for a recipient/subject pair, fetched one UID at a time with
//! `BODY[]` (which marks the message `\Seen` as a side effect).

use crate::connection::TlsStream;
use crate::error::{Error, Result};
use async_imap::types::Mailbox;
use async_imap::Session;
use futures::StreamExt;
use tracing::{debug, instrument};

/// Type alias for IMAP session over TLS.
pub(crate) type ImapSession = Session<TlsStream>;

/// Authentication configuration for IMAP.
pub(crate) struct AuthConfig<'a> {
    pub account: &'a str,
    pub password: &'a str,
}

/// Authenticates to IMAP server and returns a session.
#[instrument(
    name = "session::authenticate",
    skip_all,
    fields(account = %config.account)
)]
pub(crate) async fn authenticate(
    tls_stream: TlsStream,
    config: &AuthConfig<'_>,
) -> Result<ImapSession> {
    let client = async_imap::Client::new(tls_stream);

    debug!("Authenticating to IMAP server");

    client
        .login(config.account, config.password)
        .await
        .map_err(|e| Error::ImapLogin {
            account: config.account.to_string(),
            source: e.0,
        })
}

/// Selects a mailbox (typically "INBOX") and returns its status.
///
/// The returned [`Mailbox`] carries `UIDNEXT`, which is the anchor baseline.
#[instrument(name = "session::select", skip(session), fields(mailbox = %mailbox))]
pub(crate) async fn select_mailbox(session: &mut ImapSession, mailbox: &str) -> Result<Mailbox> {
    debug!("Selecting mailbox");

    session
        .select(mailbox)
        .await
        .map_err(|source| Error::SelectMailbox {
            mailbox: mailbox.to_string(),
            source,
        })
}

/// Returns the UID the next arriving message will be assigned.
///
/// Re-selects the mailbox so the value reflects the server's current state.
/// Servers are allowed to omit `UIDNEXT` from the select response; the
/// fallback derives it as max existing UID + 1.
#[instrument(name = "session::next_uid", skip(session))]
pub(crate) async fn next_uid(session: &mut ImapSession, mailbox: &str) -> Result<u32> {
    let status = select_mailbox(session, mailbox).await?;

    if let Some(uid_next) = status.uid_next {
        debug!(uid_next, "UIDNEXT from select");
        return Ok(uid_next);
    }

    let uids = session
        .uid_search("ALL")
        .await
        .map_err(|source| Error::ImapSearch { source })?;
    let max_uid = uids.iter().max().copied().unwrap_or(0);

    debug!(max_uid, "UIDNEXT derived from max UID");

    Ok(max_uid + 1)
}

/// Builds the search criteria for unseen messages to a recipient with a
/// subject keyword.
pub(crate) fn search_criteria(recipient: &str, subject_keyword: &str) -> String {
    format!(
        "UNSEEN TO \"{}\" SUBJECT \"{}\"",
        escape_quoted(recipient),
        escape_quoted(subject_keyword)
    )
}

/// Escapes a value for use inside an IMAP quoted string.
fn escape_quoted(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Searches for unseen messages matching the recipient and subject keyword.
#[instrument(
    name = "session::search_unseen",
    skip(session),
    fields(recipient = %recipient, subject_keyword = %subject_keyword)
)]
pub(crate) async fn search_unseen(
    session: &mut ImapSession,
    recipient: &str,
    subject_keyword: &str,
) -> Result<Vec<u32>> {
    let query = search_criteria(recipient, subject_keyword);

    let uids = session
        .uid_search(&query)
        .await
        .map_err(|source| Error::ImapSearch { source })?;

    let uids_vec: Vec<u32> = uids.into_iter().collect();

    debug!(uid_count = uids_vec.len(), "Search complete");

    Ok(uids_vec)
}

/// Fetches one message's full body by UID.
///
/// Fetching `BODY[]` (not `BODY.PEEK[]`) marks the message `\Seen`; the
/// retrieval loop relies on this to avoid re-inspecting a candidate whose
/// extraction failed.
#[instrument(name = "session::fetch_body", skip(session), fields(uid))]
pub(crate) async fn fetch_body(session: &mut ImapSession, uid: u32) -> Result<Option<Vec<u8>>> {
    let uid_str = uid.to_string();

    let stream = session
        .uid_fetch(&uid_str, "BODY[]")
        .await
        .map_err(|source| Error::ImapFetch { uid, source })?;

    let messages: Vec<_> = stream.collect().await;

    let mut body = None;
    for message_result in messages {
        let message = message_result.map_err(|source| Error::FetchMessage { source })?;
        if body.is_none() {
            body = message.body().map(<[u8]>::to_vec);
        }
    }

    debug!(found = body.is_some(), "Fetch complete");

    Ok(body)
}

/// Logs out from IMAP session.
#[instrument(name = "session::logout", skip(session))]
pub(crate) async fn logout(session: &mut ImapSession) -> Result<()> {
    debug!("Logging out");

    session
        .logout()
        .await
        .map_err(|source| Error::ImapLogout { source })?;

    Ok(())
}
