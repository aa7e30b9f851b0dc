//! Outbound provider clients: WhatsApp Cloud API for customer messages and
//! OneSignal for staff push notifications.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use thiserror::Error;

use crate::config::Config;

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);
const PUSH_SEGMENT: &str = "Subscribed Users";

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("{service} error ({status}): {body}")]
    Api {
        service: &'static str,
        status: u16,
        body: String,
    },
}

/// Sends a text message to a phone number in international digits form.
#[async_trait]
pub trait MessageSender: Send + Sync {
    async fn send_text(&self, to_phone: &str, body: &str) -> Result<(), ProviderError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushNotification {
    pub title: String,
    pub message: String,
    pub url: Option<String>,
}

/// Broadcasts a notification to every subscribed staff device.
#[async_trait]
pub trait PushNotifier: Send + Sync {
    async fn notify_subscribers(&self, notification: &PushNotification)
        -> Result<(), ProviderError>;
}

fn http_client() -> Result<Client, ProviderError> {
    Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .map_err(|e| ProviderError::Configuration(format!("Failed to create HTTP client: {}", e)))
}

async fn error_from_response(service: &'static str, response: reqwest::Response) -> ProviderError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    ProviderError::Api {
        service,
        status,
        body,
    }
}

// ============ WhatsApp Cloud API ============

pub struct WhatsAppService {
    client: Client,
    base_url: String,
    token: Option<String>,
    phone_number_id: Option<String>,
}

impl WhatsAppService {
    pub fn new(
        base_url: String,
        token: Option<String>,
        phone_number_id: Option<String>,
    ) -> Result<Self, ProviderError> {
        Ok(Self {
            client: http_client()?,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            phone_number_id,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, ProviderError> {
        Self::new(
            config.whatsapp_api_base_url.clone(),
            config.whatsapp_token.clone(),
            config.whatsapp_phone_number_id.clone(),
        )
    }

    /// Credentials are checked per send so a misconfigured deployment fails
    /// each recipient instead of refusing to start.
    fn credentials(&self) -> Result<(&str, &str), ProviderError> {
        match (self.token.as_deref(), self.phone_number_id.as_deref()) {
            (Some(token), Some(sender)) => {
                if !sender.chars().all(|c| c.is_ascii_digit()) {
                    return Err(ProviderError::Configuration(
                        "WHATSAPP_PHONE_NUMBER_ID must be numeric".to_string(),
                    ));
                }
                Ok((token, sender))
            }
            _ => Err(ProviderError::Configuration(
                "Missing WHATSAPP_TOKEN or WHATSAPP_PHONE_NUMBER_ID".to_string(),
            )),
        }
    }
}

#[derive(Debug, Deserialize)]
struct WhatsAppSendResponse {
    #[serde(default)]
    messages: Vec<WhatsAppMessageId>,
}

#[derive(Debug, Deserialize)]
struct WhatsAppMessageId {
    id: String,
}

#[async_trait]
impl MessageSender for WhatsAppService {
    async fn send_text(&self, to_phone: &str, body: &str) -> Result<(), ProviderError> {
        let (token, sender) = self.credentials()?;
        let url = format!("{}/{}/messages", self.base_url, sender);

        let payload = json!({
            "messaging_product": "whatsapp",
            "to": to_phone,
            "type": "text",
            "text": { "body": body },
        });

        let response = self
            .client
            .post(&url)
            .bearer_auth(token)
            .json(&payload)
            .send()
            .await
            .map_err(|e| ProviderError::Connection(format!("WhatsApp request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(error_from_response("WhatsApp API", response).await);
        }

        // The body only carries the message id; a missing or odd body is not a failure.
        match response.json::<WhatsAppSendResponse>().await {
            Ok(parsed) => {
                let id = parsed.messages.first().map(|m| m.id.as_str()).unwrap_or("-");
                tracing::debug!("WhatsApp message accepted for {} (id {})", to_phone, id);
            }
            Err(e) => tracing::debug!("Unparsed WhatsApp response: {}", e),
        }

        Ok(())
    }
}

// ============ OneSignal ============

pub struct OneSignalService {
    client: Client,
    api_url: String,
    app_id: Option<String>,
    api_key: Option<String>,
}

impl OneSignalService {
    pub fn new(
        api_url: String,
        app_id: Option<String>,
        api_key: Option<String>,
    ) -> Result<Self, ProviderError> {
        Ok(Self {
            client: http_client()?,
            api_url,
            app_id,
            api_key,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, ProviderError> {
        Self::new(
            config.onesignal_api_url.clone(),
            config.onesignal_app_id.clone(),
            config.onesignal_rest_api_key.clone(),
        )
    }
}

#[derive(Debug, Serialize)]
struct OneSignalRequest<'a> {
    app_id: &'a str,
    included_segments: [&'a str; 1],
    headings: LocalizedText<'a>,
    contents: LocalizedText<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    url: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct LocalizedText<'a> {
    en: &'a str,
}

#[async_trait]
impl PushNotifier for OneSignalService {
    async fn notify_subscribers(
        &self,
        notification: &PushNotification,
    ) -> Result<(), ProviderError> {
        let (Some(app_id), Some(api_key)) = (self.app_id.as_deref(), self.api_key.as_deref())
        else {
            return Err(ProviderError::Configuration(
                "Missing ONESIGNAL_APP_ID or ONESIGNAL_REST_API_KEY".to_string(),
            ));
        };

        let payload = OneSignalRequest {
            app_id,
            included_segments: [PUSH_SEGMENT],
            headings: LocalizedText {
                en: &notification.title,
            },
            contents: LocalizedText {
                en: &notification.message,
            },
            url: notification.url.as_deref(),
        };

        let response = self
            .client
            .post(&self.api_url)
            .header("Authorization", format!("Basic {}", api_key))
            .json(&payload)
            .send()
            .await
            .map_err(|e| ProviderError::Connection(format!("OneSignal request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(error_from_response("OneSignal", response).await);
        }

        tracing::debug!("Push notification queued: {}", notification.title);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_whatsapp_missing_credentials_is_configuration_error() {
        let service =
            WhatsAppService::new("https://example.com".to_string(), None, None).unwrap();
        let err = service.send_text("9613158798", "hi").await.unwrap_err();
        assert!(matches!(err, ProviderError::Configuration(_)));
        assert_eq!(
            err.to_string(),
            "Configuration error: Missing WHATSAPP_TOKEN or WHATSAPP_PHONE_NUMBER_ID"
        );
    }

    #[tokio::test]
    async fn test_whatsapp_non_numeric_sender_is_configuration_error() {
        let service = WhatsAppService::new(
            "https://example.com".to_string(),
            Some("token".to_string()),
            Some("abc".to_string()),
        )
        .unwrap();
        let err = service.send_text("9613158798", "hi").await.unwrap_err();
        assert!(matches!(err, ProviderError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_onesignal_missing_credentials_is_configuration_error() {
        let service =
            OneSignalService::new("https://example.com".to_string(), Some("app".to_string()), None)
                .unwrap();
        let notification = PushNotification {
            title: "t".to_string(),
            message: "m".to_string(),
            url: None,
        };
        let err = service.notify_subscribers(&notification).await.unwrap_err();
        assert!(matches!(err, ProviderError::Configuration(_)));
    }

    #[test]
    fn test_api_error_message() {
        let err = ProviderError::Api {
            service: "WhatsApp API",
            status: 400,
            body: "bad".to_string(),
        };
        assert_eq!(err.to_string(), "WhatsApp API error (400): bad");
    }
}
