//! Demo: structured logging during code retrieval.
//!
//! All major operations in otp-inbox emit tracing spans and events; this shows
//! how a suite wires up a subscriber to watch the polling loop work.
//!
//! # Usage
//!
//! ```bash
//! export TEST_EMAIL_ADDRESS="suite@gmail.com"
//! export TEST_EMAIL_PASSWORD="app-password"
//! # Set log level (trace, debug, info, warn, error)
//! export RUST_LOG=otp_inbox=debug
//!
//! cargo run --example with_tracing
//! ```

use otp_inbox::{connect_from_env, MailboxClient, PollOptions};
use std::env;
use std::time::Duration;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> otp_inbox::Result<()> {
    // Initialize tracing subscriber with environment filter
    // Use RUST_LOG environment variable to control log levels
    // Example: RUST_LOG=otp_inbox=debug,info
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("otp_inbox=info")),
        )
        .with_span_events(FmtSpan::ENTER | FmtSpan::EXIT)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    let recipient =
        env::var("TEST_EMAIL_ADDRESS").expect("TEST_EMAIL_ADDRESS environment variable required");

    let mut mailbox = connect_from_env().await?;

    let anchor = mailbox.anchor().await?;
    tracing::info!(%anchor, "Anchor captured, polling for mail");

    let options = PollOptions::new("verification")
        .timeout(Duration::from_secs(120))
        .anchor(anchor);

    match mailbox.verification_code(&recipient, &options).await {
        Ok(code) => tracing::info!(code, "Verification code retrieved"),
        Err(e) => tracing::error!(error = %e, category = %e.category(), "Retrieval failed"),
    }

    mailbox.disconnect().await?;

    Ok(())
}
