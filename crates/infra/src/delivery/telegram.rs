//! Telegram Bot API delivery sink.
//!
//! Each send is a single `sendMessage` call. `parse_mode` is set only for
//! HTML bodies, so plain text containing `<` or `&` is never rejected as
//! malformed markup. Requests are never retried
//! here: a retry after an ambiguous failure could post the message twice,
//! so a failed item is left to the next dispatch cycle instead.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use herald_core::DeliverySink;
use herald_domain::{
    DeliveryError, Destination, HeraldError, Result as DomainResult, TelegramConfig, TextFormat,
};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use url::Url;

use crate::errors::{delivery_error_from_http, InfraError};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: i64,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    parse_mode: Option<&'static str>,
    disable_notification: bool,
}

const fn parse_mode(format: TextFormat) -> Option<&'static str> {
    match format {
        TextFormat::Plain => None,
        TextFormat::Html => Some("HTML"),
    }
}

#[derive(Debug, Default, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

/// Delivers messages through `POST {api_base}/bot{token}/sendMessage`.
#[derive(Clone)]
pub struct TelegramSink {
    client: Client,
    endpoint: Url,
}

impl TelegramSink {
    /// Build a sink from configuration.
    ///
    /// # Errors
    /// Returns `HeraldError::Config` when no token is configured or the API
    /// base is not a valid URL.
    pub fn new(config: &TelegramConfig) -> DomainResult<Self> {
        let token = config
            .bot_token
            .as_deref()
            .ok_or_else(|| HeraldError::Config("telegram bot token is not configured".into()))?;
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| HeraldError::from(InfraError::from(e)))?;
        Self::with_client(client, &config.api_base, token)
    }

    /// Build a sink around an existing client.
    pub fn with_client(client: Client, api_base: &str, token: &str) -> DomainResult<Self> {
        let raw = format!("{}/bot{token}/sendMessage", api_base.trim_end_matches('/'));
        let endpoint = Url::parse(&raw)
            .map_err(|e| HeraldError::Config(format!("invalid telegram api base: {e}")))?;
        Ok(Self { client, endpoint })
    }
}

impl fmt::Debug for TelegramSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelegramSink")
            .field("host", &self.endpoint.host_str())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl DeliverySink for TelegramSink {
    async fn send(
        &self,
        destination: Destination,
        text: &str,
        silent: bool,
    ) -> Result<(), DeliveryError> {
        self.send_formatted(destination, text, silent, TextFormat::Plain).await
    }

    async fn send_formatted(
        &self,
        destination: Destination,
        text: &str,
        silent: bool,
        format: TextFormat,
    ) -> Result<(), DeliveryError> {
        let body = SendMessageRequest {
            chat_id: destination.0,
            text,
            parse_mode: parse_mode(format),
            disable_notification: silent,
        };

        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&body)
            .send()
            .await
            .map_err(|e| delivery_error_from_http(&e.without_url()))?;

        let status = response.status();
        let payload: ApiResponse = response.json().await.unwrap_or_default();

        if status.is_success() && payload.ok {
            debug!(destination = %destination, "Telegram message sent");
            return Ok(());
        }

        let description = payload
            .description
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("unknown status").to_string());
        warn!(
            destination = %destination,
            status = status.as_u16(),
            description = %description,
            "Telegram rejected message"
        );
        Err(DeliveryError::Rejected { status: status.as_u16(), description })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_embeds_token_and_tolerates_trailing_slash() {
        let sink = TelegramSink::with_client(Client::new(), "https://api.telegram.org/", "42:xyz")
            .expect("sink builds");
        assert_eq!(sink.endpoint.as_str(), "https://api.telegram.org/bot42:xyz/sendMessage");
        assert!(!format!("{sink:?}").contains("42:xyz"));
    }

    #[test]
    fn missing_token_is_a_config_error() {
        let err = TelegramSink::new(&TelegramConfig::default()).unwrap_err();
        assert!(matches!(err, HeraldError::Config(_)));
    }

    #[test]
    fn html_body_carries_parse_mode() {
        let body = SendMessageRequest {
            chat_id: -100,
            text: "<b>hi</b>",
            parse_mode: parse_mode(TextFormat::Html),
            disable_notification: true,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "chat_id": -100,
                "text": "<b>hi</b>",
                "parse_mode": "HTML",
                "disable_notification": true
            })
        );
    }

    #[test]
    fn plain_body_omits_parse_mode() {
        let body = SendMessageRequest {
            chat_id: 7,
            text: "a < b & c",
            parse_mode: parse_mode(TextFormat::Plain),
            disable_notification: false,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "chat_id": 7, "text": "a < b & c", "disable_notification": false })
        );
    }
}
