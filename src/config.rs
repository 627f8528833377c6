//! Configuration for the mailbox backends.
//!
//! Use the builders to create a configuration with sensible defaults:
//!
//! ```
//! use otp_inbox::ImapConfig;
//!
//! let config = ImapConfig::builder()
//!     .account("suite@gmail.com")
//!     .password("app-password")
//!     .build()
//!     .expect("valid config");
//! ```
//!
//! [`MailboxCredentials`] is the union the suite selects once at startup: either
//! OAuth2 credentials for the provider API or account credentials for IMAP.
//! [`MailboxCredentials::from_env`] reproduces the suite's selection rule from
//! environment variables.

use crate::error::{Error, Result};
use email_address::EmailAddress;
use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;

/// Default IMAP host; the suite's mailbox lives on Gmail.
pub const DEFAULT_IMAP_HOST: &str = "imap.gmail.com";

/// Default IMAPS port.
pub const DEFAULT_IMAP_PORT: u16 = 993;

/// Default Gmail REST endpoint base.
pub const DEFAULT_API_BASE_URL: &str = "https://gmail.googleapis.com";

/// Default OAuth2 token endpoint.
pub const DEFAULT_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// Credentials union selecting the mailbox backend.
///
/// Selected once at suite start and immutable for the suite's lifetime.
#[derive(Debug, Clone)]
pub enum MailboxCredentials {
    /// Mail-provider REST API with OAuth2 refresh-token credentials.
    Api(ApiConfig),
    /// Stateful IMAP session credentials.
    Imap(ImapConfig),
}

impl MailboxCredentials {
    /// Selects a backend from the process environment.
    ///
    /// `GMAIL_CLIENT_ID` + `GMAIL_CLIENT_SECRET` + `GMAIL_REFRESH_TOKEN` select
    /// the API backend (with optional `GMAIL_REDIRECT_URI`); otherwise
    /// `TEST_EMAIL_ADDRESS` + `TEST_EMAIL_PASSWORD` select IMAP.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingCredentials`] when neither set is present, or a
    /// validation error from the underlying builder.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) but over an injectable lookup,
    /// so the selection rule is testable without mutating process globals.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api = (
            lookup("GMAIL_CLIENT_ID"),
            lookup("GMAIL_CLIENT_SECRET"),
            lookup("GMAIL_REFRESH_TOKEN"),
        );
        if let (Some(client_id), Some(client_secret), Some(refresh_token)) = api {
            let mut builder = ApiConfig::builder()
                .client_id(client_id)
                .client_secret(client_secret)
                .refresh_token(refresh_token);
            if let Some(redirect_uri) = lookup("GMAIL_REDIRECT_URI") {
                builder = builder.redirect_uri(redirect_uri);
            }
            return Ok(Self::Api(builder.build()?));
        }

        if let (Some(account), Some(password)) =
            (lookup("TEST_EMAIL_ADDRESS"), lookup("TEST_EMAIL_PASSWORD"))
        {
            let config = ImapConfig::builder()
                .account(account)
                .password(password)
                .build()?;
            return Ok(Self::Imap(config));
        }

        Err(Error::MissingCredentials)
    }
}

/// Timeout configuration for individual IMAP operations.
#[derive(Debug, Clone)]
pub struct TimeoutConfig {
    /// Timeout for establishing TCP/TLS connection.
    pub connect: Duration,
    /// Timeout for IMAP authentication.
    pub auth: Duration,
    /// Timeout for selecting a mailbox.
    pub select: Duration,
    /// Timeout for a single UID search.
    pub search: Duration,
    /// Timeout for fetching message content.
    pub fetch: Duration,
    /// Timeout for logout operation.
    pub logout: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(30),
            auth: Duration::from_secs(30),
            select: Duration::from_secs(10),
            search: Duration::from_secs(10),
            fetch: Duration::from_secs(30),
            logout: Duration::from_secs(5),
        }
    }
}

/// Polling cadence for verification-code retrieval.
#[derive(Debug, Clone)]
pub struct PollingConfig {
    /// Interval between polling attempts while waiting for the email.
    pub interval: Duration,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
        }
    }
}

/// Validates an email address format.
fn validate_email(email: &str) -> Result<EmailAddress> {
    EmailAddress::parse_with_options(email, email_address::Options::default()).map_err(|_| {
        Error::InvalidEmailFormat {
            email: email.to_string(),
        }
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// IMAP configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Configuration for the IMAP backend.
///
/// Create using [`ImapConfig::builder()`].
///
/// The `password` field is stored as a [`SecretString`] to prevent accidental
/// logging of credentials; the `account` field is a validated [`EmailAddress`].
/// Connections are always TLS - there is no plaintext mode.
#[derive(Clone)]
pub struct ImapConfig {
    /// Mailbox account (used for login).
    account: EmailAddress,
    /// Account password or app-specific password.
    password: SecretString,
    /// IMAP server hostname.
    pub host: String,
    /// IMAP server port.
    pub port: u16,
    /// Per-operation timeouts.
    pub timeouts: TimeoutConfig,
    /// Polling cadence.
    pub polling: PollingConfig,
}

impl std::fmt::Debug for ImapConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImapConfig")
            .field("account", &self.account.as_str())
            .field("password", &"[REDACTED]")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("timeouts", &self.timeouts)
            .field("polling", &self.polling)
            .finish()
    }
}

impl ImapConfig {
    /// Creates a new configuration builder.
    #[must_use]
    pub fn builder() -> ImapConfigBuilder {
        ImapConfigBuilder::default()
    }

    /// Returns the account address as a string slice.
    #[must_use]
    pub fn account(&self) -> &str {
        self.account.as_str()
    }

    /// Returns the password for authentication.
    ///
    /// Intentionally not a public field, to keep it out of `Debug` output.
    #[must_use]
    pub fn password(&self) -> &str {
        self.password.expose_secret()
    }

    /// Returns the full server address as "host:port".
    #[must_use]
    pub fn server_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Builder for [`ImapConfig`].
#[derive(Debug, Default)]
pub struct ImapConfigBuilder {
    account: Option<String>,
    password: Option<String>,
    host: Option<String>,
    port: Option<u16>,
    timeouts: Option<TimeoutConfig>,
    polling: Option<PollingConfig>,
}

impl ImapConfigBuilder {
    /// Sets the mailbox account address (required).
    #[must_use]
    pub fn account(mut self, account: impl Into<String>) -> Self {
        self.account = Some(account.into());
        self
    }

    /// Sets the password (required). For Gmail, use an app-specific password.
    #[must_use]
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Sets the IMAP server hostname. Default: `imap.gmail.com`.
    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Sets the IMAP server port. Default: 993 (IMAPS).
    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Sets per-operation timeouts.
    #[must_use]
    pub fn timeouts(mut self, timeouts: TimeoutConfig) -> Self {
        self.timeouts = Some(timeouts);
        self
    }

    /// Sets the connection timeout.
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts
            .get_or_insert_with(TimeoutConfig::default)
            .connect = timeout;
        self
    }

    /// Sets the polling configuration.
    #[must_use]
    pub fn polling(mut self, polling: PollingConfig) -> Self {
        self.polling = Some(polling);
        self
    }

    /// Sets the interval between polling attempts. Default: 5 s.
    #[must_use]
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.polling
            .get_or_insert_with(PollingConfig::default)
            .interval = interval;
        self
    }

    /// Builds the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if required fields are missing or the account address
    /// is not a valid email address.
    pub fn build(self) -> Result<ImapConfig> {
        let account_raw = self.account.ok_or_else(|| Error::InvalidConfig {
            message: "account is required".into(),
        })?;
        let account = validate_email(&account_raw)?;

        let password = self.password.ok_or_else(|| Error::InvalidConfig {
            message: "password is required".into(),
        })?;

        Ok(ImapConfig {
            account,
            password: SecretString::from(password),
            host: self.host.unwrap_or_else(|| DEFAULT_IMAP_HOST.to_string()),
            port: self.port.unwrap_or(DEFAULT_IMAP_PORT),
            timeouts: self.timeouts.unwrap_or_default(),
            polling: self.polling.unwrap_or_default(),
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// API configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Configuration for the mail-provider API backend.
///
/// Create using [`ApiConfig::builder()`]. The client secret and refresh token
/// are stored as [`SecretString`]s. The endpoint URLs are overridable so tests
/// can point the client at a local HTTP stub.
#[derive(Clone)]
pub struct ApiConfig {
    /// OAuth2 client id.
    pub client_id: String,
    /// OAuth2 client secret.
    client_secret: SecretString,
    /// OAuth2 redirect URI registered with the provider.
    pub redirect_uri: Option<String>,
    /// Long-lived refresh token.
    refresh_token: SecretString,
    /// Base URL of the provider's REST surface.
    pub api_base_url: String,
    /// OAuth2 token endpoint.
    pub token_url: String,
    /// Per-request HTTP timeout.
    pub http_timeout: Duration,
    /// Polling cadence.
    pub polling: PollingConfig,
}

impl std::fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("redirect_uri", &self.redirect_uri)
            .field("refresh_token", &"[REDACTED]")
            .field("api_base_url", &self.api_base_url)
            .field("token_url", &self.token_url)
            .field("http_timeout", &self.http_timeout)
            .field("polling", &self.polling)
            .finish()
    }
}

impl ApiConfig {
    /// Creates a new configuration builder.
    #[must_use]
    pub fn builder() -> ApiConfigBuilder {
        ApiConfigBuilder::default()
    }

    /// Returns the client secret for the token exchange.
    #[must_use]
    pub fn client_secret(&self) -> &str {
        self.client_secret.expose_secret()
    }

    /// Returns the refresh token for the token exchange.
    #[must_use]
    pub fn refresh_token(&self) -> &str {
        self.refresh_token.expose_secret()
    }
}

/// Builder for [`ApiConfig`].
#[derive(Debug, Default)]
pub struct ApiConfigBuilder {
    client_id: Option<String>,
    client_secret: Option<String>,
    redirect_uri: Option<String>,
    refresh_token: Option<String>,
    api_base_url: Option<String>,
    token_url: Option<String>,
    http_timeout: Option<Duration>,
    polling: Option<PollingConfig>,
}

impl ApiConfigBuilder {
    /// Sets the OAuth2 client id (required).
    #[must_use]
    pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    /// Sets the OAuth2 client secret (required).
    #[must_use]
    pub fn client_secret(mut self, client_secret: impl Into<String>) -> Self {
        self.client_secret = Some(client_secret.into());
        self
    }

    /// Sets the OAuth2 redirect URI.
    #[must_use]
    pub fn redirect_uri(mut self, redirect_uri: impl Into<String>) -> Self {
        self.redirect_uri = Some(redirect_uri.into());
        self
    }

    /// Sets the refresh token (required).
    #[must_use]
    pub fn refresh_token(mut self, refresh_token: impl Into<String>) -> Self {
        self.refresh_token = Some(refresh_token.into());
        self
    }

    /// Overrides the provider REST base URL (tests point this at a stub).
    #[must_use]
    pub fn api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = Some(url.into());
        self
    }

    /// Overrides the OAuth2 token endpoint.
    #[must_use]
    pub fn token_url(mut self, url: impl Into<String>) -> Self {
        self.token_url = Some(url.into());
        self
    }

    /// Sets the per-request HTTP timeout. Default: 30 s.
    #[must_use]
    pub fn http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = Some(timeout);
        self
    }

    /// Sets the polling configuration.
    #[must_use]
    pub fn polling(mut self, polling: PollingConfig) -> Self {
        self.polling = Some(polling);
        self
    }

    /// Sets the interval between polling attempts. Default: 5 s.
    #[must_use]
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.polling
            .get_or_insert_with(PollingConfig::default)
            .interval = interval;
        self
    }

    /// Builds the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if a required field is missing.
    pub fn build(self) -> Result<ApiConfig> {
        let client_id = self.client_id.ok_or_else(|| Error::InvalidConfig {
            message: "client_id is required".into(),
        })?;
        let client_secret = self.client_secret.ok_or_else(|| Error::InvalidConfig {
            message: "client_secret is required".into(),
        })?;
        let refresh_token = self.refresh_token.ok_or_else(|| Error::InvalidConfig {
            message: "refresh_token is required".into(),
        })?;

        Ok(ApiConfig {
            client_id,
            client_secret: SecretString::from(client_secret),
            redirect_uri: self.redirect_uri,
            refresh_token: SecretString::from(refresh_token),
            api_base_url: self
                .api_base_url
                .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string()),
            token_url: self
                .token_url
                .unwrap_or_else(|| DEFAULT_TOKEN_URL.to_string()),
            http_timeout: self.http_timeout.unwrap_or(Duration::from_secs(30)),
            polling: self.polling.unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_imap_builder_minimal() {
        let config = ImapConfig::builder()
            .account("suite@gmail.com")
            .password("secret")
            .build()
            .unwrap();

        assert_eq!(config.account(), "suite@gmail.com");
        assert_eq!(config.password(), "secret");
        assert_eq!(config.host, DEFAULT_IMAP_HOST);
        assert_eq!(config.port, 993);
        assert_eq!(config.polling.interval, Duration::from_secs(5));
    }

    #[test]
    fn test_imap_builder_full() {
        let config = ImapConfig::builder()
            .account("suite@example.com")
            .password("secret")
            .host("mail.example.com")
            .port(994)
            .connect_timeout(Duration::from_secs(60))
            .poll_interval(Duration::from_secs(2))
            .build()
            .unwrap();

        assert_eq!(config.host, "mail.example.com");
        assert_eq!(config.port, 994);
        assert_eq!(config.server_address(), "mail.example.com:994");
        assert_eq!(config.timeouts.connect, Duration::from_secs(60));
        assert_eq!(config.polling.interval, Duration::from_secs(2));
    }

    #[test]
    fn test_imap_builder_missing_fields() {
        assert!(ImapConfig::builder().password("secret").build().is_err());
        assert!(ImapConfig::builder()
            .account("suite@example.com")
            .build()
            .is_err());
    }

    #[test]
    fn test_imap_builder_invalid_account() {
        let result = ImapConfig::builder()
            .account("not-an-email")
            .password("secret")
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_imap_password_not_in_debug() {
        let config = ImapConfig::builder()
            .account("suite@example.com")
            .password("super-secret-password")
            .build()
            .unwrap();

        let debug_str = format!("{config:?}");
        assert!(!debug_str.contains("super-secret-password"));
        assert!(debug_str.contains("[REDACTED]"));
    }

    #[test]
    fn test_api_builder_defaults() {
        let config = ApiConfig::builder()
            .client_id("id")
            .client_secret("cs")
            .refresh_token("rt")
            .build()
            .unwrap();

        assert_eq!(config.api_base_url, DEFAULT_API_BASE_URL);
        assert_eq!(config.token_url, DEFAULT_TOKEN_URL);
        assert!(config.redirect_uri.is_none());
        assert_eq!(config.refresh_token(), "rt");
    }

    #[test]
    fn test_api_builder_missing_fields() {
        assert!(ApiConfig::builder().client_id("id").build().is_err());
        assert!(ApiConfig::builder()
            .client_id("id")
            .client_secret("cs")
            .build()
            .is_err());
    }

    #[test]
    fn test_api_secrets_not_in_debug() {
        let config = ApiConfig::builder()
            .client_id("id")
            .client_secret("very-secret")
            .refresh_token("also-secret")
            .build()
            .unwrap();

        let debug_str = format!("{config:?}");
        assert!(!debug_str.contains("very-secret"));
        assert!(!debug_str.contains("also-secret"));
    }

    #[test]
    fn test_credentials_prefer_api_backend() {
        let lookup = |key: &str| match key {
            "GMAIL_CLIENT_ID" => Some("id".to_string()),
            "GMAIL_CLIENT_SECRET" => Some("cs".to_string()),
            "GMAIL_REFRESH_TOKEN" => Some("rt".to_string()),
            "GMAIL_REDIRECT_URI" => Some("urn:ietf:wg:oauth:2.0:oob".to_string()),
            "TEST_EMAIL_ADDRESS" => Some("suite@gmail.com".to_string()),
            "TEST_EMAIL_PASSWORD" => Some("pw".to_string()),
            _ => None,
        };

        // With both sets present, the API backend wins.
        match MailboxCredentials::from_lookup(lookup).unwrap() {
            MailboxCredentials::Api(config) => {
                assert_eq!(config.client_id, "id");
                assert_eq!(
                    config.redirect_uri.as_deref(),
                    Some("urn:ietf:wg:oauth:2.0:oob")
                );
            }
            MailboxCredentials::Imap(_) => panic!("expected API backend"),
        }
    }

    #[test]
    fn test_credentials_fall_back_to_imap() {
        let lookup = |key: &str| match key {
            "TEST_EMAIL_ADDRESS" => Some("suite@gmail.com".to_string()),
            "TEST_EMAIL_PASSWORD" => Some("pw".to_string()),
            _ => None,
        };

        match MailboxCredentials::from_lookup(lookup).unwrap() {
            MailboxCredentials::Imap(config) => {
                assert_eq!(config.account(), "suite@gmail.com");
                assert_eq!(config.host, DEFAULT_IMAP_HOST);
            }
            MailboxCredentials::Api(_) => panic!("expected IMAP backend"),
        }
    }

    #[test]
    fn test_credentials_missing() {
        let result = MailboxCredentials::from_lookup(|_| None);
        assert!(matches!(result, Err(Error::MissingCredentials)));
    }

    #[test]
    fn test_partial_api_credentials_fall_through() {
        // An incomplete GMAIL_* set must not shadow valid IMAP credentials.
        let lookup = |key: &str| match key {
            "GMAIL_CLIENT_ID" => Some("id".to_string()),
            "TEST_EMAIL_ADDRESS" => Some("suite@gmail.com".to_string()),
            "TEST_EMAIL_PASSWORD" => Some("pw".to_string()),
            _ => None,
        };

        assert!(matches!(
            MailboxCredentials::from_lookup(lookup).unwrap(),
            MailboxCredentials::Imap(_)
        ));
    }
}
