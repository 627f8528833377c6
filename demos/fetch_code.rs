//! Basic demo: wait for a verification code from email.
//!
//! This walks the flow a test scenario uses - pick a backend from the
//! environment, capture an anchor, then poll for the code.
//!
//! # Usage
//!
//! ```bash
//! # IMAP backend
//! export TEST_EMAIL_ADDRESS="suite@gmail.com"
//! export TEST_EMAIL_PASSWORD="app-password"
//!
//! # ...or API backend (wins when both are set)
//! export GMAIL_CLIENT_ID="..."
//! export GMAIL_CLIENT_SECRET="..."
//! export GMAIL_REFRESH_TOKEN="..."
//!
//! cargo run --example fetch_code
//! ```
//!
//! For Gmail IMAP you'll need an [App Password](https://support.google.com/accounts/answer/185833).

use otp_inbox::{connect_from_env, MailboxClient, PollOptions};
use std::env;
use std::time::Duration;

#[tokio::main]
async fn main() -> otp_inbox::Result<()> {
    let recipient =
        env::var("TEST_EMAIL_ADDRESS").expect("TEST_EMAIL_ADDRESS environment variable required");

    println!("Connecting to mailbox backend...");

    let mut mailbox = connect_from_env().await?;

    // Anchor first: only mail arriving after this point can satisfy the poll.
    let anchor = mailbox.anchor().await?;
    println!("Anchor captured ({anchor}). Waiting for a verification email...");
    println!("(Trigger one now - e.g. request a password reset - or press Ctrl+C)");

    let options = PollOptions::new("verification")
        .timeout(Duration::from_secs(180))
        .anchor(anchor);
    let code = mailbox.verification_code(&recipient, &options).await?;

    println!("Got verification code: {code}");

    // Clean up
    mailbox.disconnect().await?;

    Ok(())
}
