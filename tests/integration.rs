//! Integration tests for otp-inbox.
//!
//! The live tests require a real mailbox and are disabled by default.
//! To run them:
//!
//! ```bash
//! # IMAP backend
//! export TEST_EMAIL_ADDRESS="suite@gmail.com"
//! export TEST_EMAIL_PASSWORD="app-password"
//!
//! # ...or the API backend
//! export GMAIL_CLIENT_ID="..."
//! export GMAIL_CLIENT_SECRET="..."
//! export GMAIL_REFRESH_TOKEN="..."
//!
//! # Run with the integration-tests feature
//! cargo test --features integration-tests -- --ignored
//! ```

use otp_inbox::{
    connect, connect_from_env, Anchor, ImapConfig, ImapMailboxClient, MailboxClient,
    MailboxCredentials, PollOptions,
};
use std::env;
use std::time::Duration;

// ─────────────────────────────────────────────────────────────────────────────
// Test Configuration Helpers
// ─────────────────────────────────────────────────────────────────────────────

fn imap_credentials() -> Option<(String, String)> {
    dotenvy::dotenv().ok();
    let account = env::var("TEST_EMAIL_ADDRESS").ok()?;
    let password = env::var("TEST_EMAIL_PASSWORD").ok()?;
    Some((account, password))
}

fn imap_config() -> Option<ImapConfig> {
    let (account, password) = imap_credentials()?;
    ImapConfig::builder()
        .account(account)
        .password(password)
        .build()
        .ok()
}

fn imap_config_with_short_timeouts() -> Option<ImapConfig> {
    let (account, password) = imap_credentials()?;
    ImapConfig::builder()
        .account(account)
        .password(password)
        .poll_interval(Duration::from_secs(1))
        .build()
        .ok()
}

// ─────────────────────────────────────────────────────────────────────────────
// Connection Tests
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
#[ignore = "requires real IMAP mailbox"]
async fn test_imap_connect_and_disconnect() {
    let config = imap_config().expect("IMAP credentials from environment variables");

    let mut client = ImapMailboxClient::connect(config)
        .await
        .expect("Failed to connect");

    assert!(!client.account().is_empty());

    client.disconnect().await.expect("Failed to disconnect");
}

#[tokio::test]
#[ignore = "requires mailbox credentials in the environment"]
async fn test_connect_from_env_selects_a_backend() {
    dotenvy::dotenv().ok();

    let mut mailbox = connect_from_env()
        .await
        .expect("Failed to connect with env credentials");

    // Whatever backend was selected, the anchor capability must work.
    let anchor = mailbox.anchor().await.expect("Failed to capture anchor");
    match anchor {
        Anchor::NextUid(uid) => assert!(uid > 0),
        Anchor::Timestamp(millis) => assert!(millis > 0),
    }

    mailbox.disconnect().await.expect("Failed to disconnect");
}

// ─────────────────────────────────────────────────────────────────────────────
// Anchor Tests
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
#[ignore = "requires real IMAP mailbox"]
async fn test_imap_anchor_is_stable_on_quiet_mailbox() {
    let config = imap_config().expect("IMAP credentials from environment variables");

    let mut mailbox = connect(MailboxCredentials::Imap(config))
        .await
        .expect("Failed to connect");

    // Two captures with no interleaved mail must not go backwards.
    let first = mailbox.anchor().await.expect("first anchor");
    let second = mailbox.anchor().await.expect("second anchor");

    match (first, second) {
        (Anchor::NextUid(a), Anchor::NextUid(b)) => assert!(b >= a),
        other => panic!("expected UID anchors, got {other:?}"),
    }

    mailbox.disconnect().await.expect("Failed to disconnect");
}

// ─────────────────────────────────────────────────────────────────────────────
// Polling Tests
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
#[ignore = "requires real IMAP mailbox"]
async fn test_imap_wait_times_out_without_matching_mail() {
    let config =
        imap_config_with_short_timeouts().expect("IMAP credentials from environment variables");

    let mut mailbox = connect(MailboxCredentials::Imap(config))
        .await
        .expect("Failed to connect");

    // Anchor now: any pre-existing mail is excluded, so nothing can match.
    let anchor = mailbox.anchor().await.expect("anchor");

    let options = PollOptions::new("NO_SUCH_SUBJECT_XYZ123")
        .timeout(Duration::from_secs(5))
        .anchor(anchor);
    let result = mailbox
        .verification_code("nobody+nothing@gmail.com", &options)
        .await;

    let err = result.expect_err("must time out");
    assert!(!err.is_retryable());

    mailbox.disconnect().await.expect("Failed to disconnect");
}

// ─────────────────────────────────────────────────────────────────────────────
// Offline validation tests (no mailbox required)
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_invalid_account_format() {
    let result = ImapConfig::builder()
        .account("not-an-email")
        .password("password")
        .build();

    assert!(result.is_err());
}

#[tokio::test]
async fn test_missing_required_fields() {
    // Missing account
    let result = ImapConfig::builder().password("password").build();
    assert!(result.is_err());

    // Missing password
    let result = ImapConfig::builder().account("suite@example.com").build();
    assert!(result.is_err());
}

#[tokio::test]
async fn test_missing_credentials_error() {
    let result = MailboxCredentials::from_lookup(|_| None);
    let err = result.expect_err("no credentials anywhere");
    assert!(!err.is_retryable());
}
