//! Mail-provider API backend for verification-code retrieval.
//!
//! [`ApiMailboxClient`] talks to the Gmail REST surface with OAuth2
//! refresh-token credentials. It is connectionless per call - one authorized
//! [`reqwest::Client`] is shared across calls within a suite - and the access
//! token is cached and refreshed shortly before expiry.
//!
//! # Consumption semantics
//!
//! Candidates are inspected without consuming them; only the message that
//! produced the returned code has its `UNREAD` label removed, and even that is
//! best-effort (a missing modify scope must not fail the retrieval). Contrast
//! with the IMAP backend, where the fetch itself marks a candidate seen.
//!
//! The endpoint URLs are taken from [`ApiConfig`], so tests can point the
//! client at a local HTTP stub.

use crate::client::{Anchor, MailboxClient, PollOptions};
use crate::config::ApiConfig;
use crate::error::{Error, Result};
use crate::poll::Poller;
use crate::token::TokenExtractor;
use async_trait::async_trait;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use chrono::Utc;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::time::{Duration, Instant};
use tracing::{debug, instrument, warn};

/// Refresh the access token this long before the provider-reported expiry.
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// Mail-provider API client polling one mailbox for verification codes.
///
/// Create using [`ApiMailboxClient::connect`].
pub struct ApiMailboxClient {
    http: reqwest::Client,
    config: ApiConfig,
    extractor: TokenExtractor,
    access_token: Option<AccessToken>,
}

struct AccessToken {
    secret: SecretString,
    expires_at: Instant,
}

// ─────────────────────────────────────────────────────────────────────────────
// Wire types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct MessageList {
    #[serde(default)]
    messages: Option<Vec<MessageRef>>,
}

#[derive(Debug, Deserialize)]
struct MessageRef {
    id: String,
}

#[derive(Debug, Deserialize)]
struct Message {
    id: String,
    #[serde(rename = "internalDate", default)]
    internal_date: Option<String>,
    #[serde(default)]
    payload: Option<MessagePart>,
}

#[derive(Debug, Deserialize)]
struct MessagePart {
    #[serde(default)]
    body: Option<PartBody>,
    #[serde(default)]
    parts: Option<Vec<MessagePart>>,
}

#[derive(Debug, Deserialize)]
struct PartBody {
    #[serde(default)]
    data: Option<String>,
}

impl Message {
    /// The provider's internal send-time in epoch milliseconds.
    fn internal_date_millis(&self) -> i64 {
        self.internal_date
            .as_deref()
            .and_then(|s| s.parse::<i64>().ok())
            .unwrap_or(0)
    }

    /// Decoded text of the primary body and every nested part, in part order.
    fn body_texts(&self) -> Vec<String> {
        let mut texts = Vec::new();
        if let Some(payload) = &self.payload {
            collect_part_texts(payload, &mut texts);
        }
        texts
    }
}

fn collect_part_texts(part: &MessagePart, out: &mut Vec<String>) {
    if let Some(data) = part.body.as_ref().and_then(|body| body.data.as_deref()) {
        if let Some(text) = decode_part_data(data) {
            out.push(text);
        }
    }
    if let Some(parts) = &part.parts {
        for subpart in parts {
            collect_part_texts(subpart, out);
        }
    }
}

/// Decodes a provider body-part payload.
///
/// The provider sends base64url without padding; standard base64 is accepted
/// as a fallback. A payload that decodes to no valid text is skipped - an
/// extraction miss, not an error.
fn decode_part_data(data: &str) -> Option<String> {
    let bytes = URL_SAFE_NO_PAD
        .decode(data.trim_end_matches('='))
        .or_else(|_| STANDARD.decode(data))
        .ok()?;
    Some(String::from_utf8_lossy(&bytes).into_owned())
}

// ─────────────────────────────────────────────────────────────────────────────
// Client
// ─────────────────────────────────────────────────────────────────────────────

impl ApiMailboxClient {
    /// Authorizes the client by exchanging the refresh token for an access
    /// token. This is the backend's connection check: a failed exchange is
    /// fatal and surfaced immediately.
    ///
    /// # Errors
    ///
    /// [`Error::TokenRefresh`] when the exchange fails.
    #[instrument(
        name = "ApiMailboxClient::connect",
        skip_all,
        fields(client_id = %config.client_id)
    )]
    pub async fn connect(config: ApiConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .build()
            .map_err(|e| Error::InvalidConfig {
                message: format!("failed to build HTTP client: {e}"),
            })?;

        let mut client = Self {
            http,
            config,
            extractor: TokenExtractor::default(),
            access_token: None,
        };
        client.refresh_access_token().await?;

        debug!("Client authorized and ready");

        Ok(client)
    }

    /// Replaces the default extraction cascade.
    #[must_use]
    pub fn with_extractor(mut self, extractor: TokenExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Private methods
    // ─────────────────────────────────────────────────────────────────────────

    async fn refresh_access_token(&mut self) -> Result<()> {
        let mut form = vec![
            ("client_id", self.config.client_id.clone()),
            ("client_secret", self.config.client_secret().to_string()),
            ("refresh_token", self.config.refresh_token().to_string()),
            ("grant_type", "refresh_token".to_string()),
        ];
        if let Some(redirect_uri) = &self.config.redirect_uri {
            form.push(("redirect_uri", redirect_uri.clone()));
        }

        let response = self
            .http
            .post(&self.config.token_url)
            .form(&form)
            .send()
            .await
            .map_err(|e| Error::TokenRefresh {
                detail: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = format!("{status}: {}", &body[..body.len().min(200)]);
            return Err(Error::TokenRefresh { detail });
        }

        let token: TokenResponse =
            response.json().await.map_err(|e| Error::TokenRefresh {
                detail: format!("malformed token response: {e}"),
            })?;

        let lifetime = Duration::from_secs(token.expires_in.unwrap_or(3600))
            .saturating_sub(TOKEN_EXPIRY_MARGIN);

        debug!(lifetime_secs = lifetime.as_secs(), "Access token refreshed");

        self.access_token = Some(AccessToken {
            secret: SecretString::from(token.access_token),
            expires_at: Instant::now() + lifetime,
        });

        Ok(())
    }

    /// Returns a valid bearer token, refreshing it when close to expiry.
    async fn bearer(&mut self) -> Result<String> {
        let expired = self
            .access_token
            .as_ref()
            .is_none_or(|token| Instant::now() >= token.expires_at);
        if expired {
            self.refresh_access_token().await?;
        }

        Ok(self
            .access_token
            .as_ref()
            .expect("token refreshed above")
            .secret
            .expose_secret()
            .to_string())
    }

    fn messages_url(&self) -> String {
        format!("{}/gmail/v1/users/me/messages", self.config.api_base_url)
    }

    /// Lists unread message ids for the recipient/subject pair, in the
    /// provider's default newest-first order.
    async fn list_messages(&mut self, recipient: &str, subject_keyword: &str) -> Result<Vec<String>> {
        let endpoint = self.messages_url();
        let query = format!("to:{recipient} subject:{subject_keyword} is:unread");
        let bearer = self.bearer().await?;

        let response = self
            .http
            .get(&endpoint)
            .bearer_auth(bearer)
            .query(&[("q", query.as_str())])
            .send()
            .await
            .map_err(|source| Error::ApiRequest {
                endpoint: endpoint.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::ApiStatus { endpoint, status });
        }

        let list: MessageList = response.json().await.map_err(|source| Error::ApiRequest {
            endpoint: endpoint.clone(),
            source,
        })?;

        let ids = list
            .messages
            .unwrap_or_default()
            .into_iter()
            .map(|m| m.id)
            .collect::<Vec<_>>();

        debug!(count = ids.len(), "Listed unread messages");

        Ok(ids)
    }

    /// Fetches one message in full.
    async fn get_message(&mut self, id: &str) -> Result<Message> {
        let endpoint = format!("{}/{id}", self.messages_url());
        let bearer = self.bearer().await?;

        let response = self
            .http
            .get(&endpoint)
            .bearer_auth(bearer)
            .send()
            .await
            .map_err(|source| Error::ApiRequest {
                endpoint: endpoint.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::ApiStatus { endpoint, status });
        }

        response.json().await.map_err(|source| Error::ApiRequest {
            endpoint,
            source,
        })
    }

    /// Removes the `UNREAD` label from a message.
    async fn mark_read(&mut self, id: &str) -> Result<()> {
        let endpoint = format!("{}/{id}/modify", self.messages_url());
        let bearer = self.bearer().await?;

        let response = self
            .http
            .post(&endpoint)
            .bearer_auth(bearer)
            .json(&serde_json::json!({ "removeLabelIds": ["UNREAD"] }))
            .send()
            .await
            .map_err(|source| Error::ApiRequest {
                endpoint: endpoint.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::ApiStatus { endpoint, status });
        }

        debug!(id, "Marked message read");

        Ok(())
    }

    /// One poll attempt: list candidates, inspect newest to oldest, extract.
    async fn check_messages(
        &mut self,
        recipient: &str,
        options: &PollOptions,
        poller: &mut Poller,
    ) -> Result<Option<String>> {
        let ids = self
            .list_messages(recipient, &options.subject_keyword)
            .await?;

        let anchor_millis = match options.anchor {
            Some(Anchor::Timestamp(millis)) => Some(millis),
            Some(Anchor::NextUid(_)) => {
                warn!("UID anchor ignored by the API backend");
                None
            }
            None => None,
        };

        for id in ids {
            let message = self.get_message(&id).await?;

            if let Some(anchor) = anchor_millis {
                if message.internal_date_millis() <= anchor {
                    debug!(id = %message.id, "Message predates anchor, skipping");
                    continue;
                }
            }

            poller.record_candidates(1);

            let parts = message.body_texts();
            let Some(code) = self.extractor.extract_from_parts(&parts) else {
                debug!(id = %message.id, "No pattern matched");
                continue;
            };
            let code = code.into_owned();

            // Best-effort: a missing modify scope must not fail the retrieval.
            if let Err(e) = self.mark_read(&message.id).await {
                warn!(id = %message.id, error = %e, "Could not mark message read");
            }

            return Ok(Some(code));
        }

        Ok(None)
    }
}

#[async_trait]
impl MailboxClient for ApiMailboxClient {
    /// Captures the current wall-clock time as the anchor.
    ///
    /// Only messages with an internal send-time strictly after this instant
    /// qualify.
    async fn anchor(&mut self) -> Result<Anchor> {
        Ok(Anchor::Timestamp(Utc::now().timestamp_millis()))
    }

    #[instrument(
        name = "ApiMailboxClient::verification_code",
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
            match self.check_messages(recipient, options, &mut poller).await {
                Ok(Some(code)) => return Ok(code),
                Ok(None) => {}
                // A transient list/fetch failure never ends the poll early;
                // only the deadline does.
                Err(e) if e.is_retryable() => {
                    warn!(error = %e, "Poll attempt failed, will retry");
                }
                Err(e) => return Err(e),
            }

            poller.wait().await?;
        }
    }

    /// No-op: the API backend holds no connection.
    async fn disconnect(&mut self) -> Result<()> {
        Ok(())
    }
}

impl std::fmt::Debug for ApiMailboxClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiMailboxClient")
            .field("client_id", &self.config.client_id)
            .field("api_base_url", &self.config.api_base_url)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(text: &str) -> String {
        base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(text)
    }

    #[test]
    fn test_decode_part_data_variants() {
        // Unpadded base64url (the provider's encoding)
        assert_eq!(
            decode_part_data(&encode("Code: 123456")).as_deref(),
            Some("Code: 123456")
        );
        // Padded input is tolerated
        assert_eq!(
            decode_part_data("Q29kZTogMTIzNDU2").as_deref(),
            Some("Code: 123456")
        );
        // Garbage decodes to nothing
        assert_eq!(decode_part_data("!!not-base64!!"), None);
    }

    #[test]
    fn test_body_texts_walks_nested_parts() {
        let message = Message {
            id: "m1".into(),
            internal_date: Some("1722960000000".into()),
            payload: Some(MessagePart {
                body: Some(PartBody {
                    data: Some(encode("outer body")),
                }),
                parts: Some(vec![
                    MessagePart {
                        body: Some(PartBody {
                            data: Some(encode("first part")),
                        }),
                        parts: None,
                    },
                    MessagePart {
                        body: None,
                        parts: Some(vec![MessagePart {
                            body: Some(PartBody {
                                data: Some(encode("nested part")),
                            }),
                            parts: None,
                        }]),
                    },
                ]),
            }),
        };

        assert_eq!(
            message.body_texts(),
            vec!["outer body", "first part", "nested part"]
        );
    }

    #[test]
    fn test_internal_date_parsing() {
        let message = Message {
            id: "m1".into(),
            internal_date: Some("1722960000000".into()),
            payload: None,
        };
        assert_eq!(message.internal_date_millis(), 1_722_960_000_000);

        let missing = Message {
            id: "m2".into(),
            internal_date: None,
            payload: None,
        };
        assert_eq!(missing.internal_date_millis(), 0);
    }
}
