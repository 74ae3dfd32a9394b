use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, Secret};
use std::time;

use crate::domain::subscriber_email::SubscriberEmail;

const REQUEST_TIMEOUT: time::Duration = time::Duration::from_secs(10);
const MESSAGE_ID_HEADER: &str = "X-Message-Id";

/// What the provider hands back for an accepted message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SendReceipt {
    pub provider_message_id: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum SendEmailError {
    #[error("The email provider rejected the message with status {0}.")]
    Rejected(StatusCode),
    #[error("Failed to reach the email provider.")]
    Transport(#[from] reqwest::Error),
}

/// Single-message send capability. Implementations do not retry.
#[async_trait]
pub trait EmailProvider: Send + Sync {
    async fn send_email(
        &self,
        recipient: &SubscriberEmail,
        subject: &str,
        html_content: &str,
    ) -> Result<SendReceipt, SendEmailError>;

    /// Upper bound for a single `send_email` call.
    fn timeout(&self) -> time::Duration {
        REQUEST_TIMEOUT
    }
}

pub struct EmailClient {
    http_client: Client,
    base_url: String,
    sender: SubscriberEmail,
    api_key: Secret<String>,
    timeout: time::Duration,
}

#[derive(serde::Serialize)]
pub struct SendEmailBody {
    personalizations: Vec<SengridPersonalization>,
    from: SengridEmail,
    subject: String,
    content: Vec<SengridContent>,
}

#[derive(serde::Serialize)]
struct SengridEmail {
    email: String,
}

#[derive(serde::Serialize)]
struct SengridPersonalization {
    to: Vec<SengridEmail>,
}

#[derive(serde::Serialize)]
struct SengridContent {
    #[serde(rename = "type")]
    content_type: String,
    value: String,
}

impl EmailClient {
    pub fn new(
        base_url: String,
        sender: SubscriberEmail,
        api_key: Secret<String>,
        timeout: Option<time::Duration>,
    ) -> Result<EmailClient, reqwest::Error> {
        let timeout = timeout.unwrap_or(REQUEST_TIMEOUT);
        let http_client = Client::builder().timeout(timeout).build()?;

        Ok(EmailClient {
            http_client,
            base_url,
            sender,
            api_key,
            timeout,
        })
    }
}

#[async_trait]
impl EmailProvider for EmailClient {
    #[tracing::instrument(
        name = "Send an email through the provider",
        skip(self, html_content),
        fields(recipient = %recipient, subject = %subject)
    )]
    async fn send_email(
        &self,
        recipient: &SubscriberEmail,
        subject: &str,
        html_content: &str,
    ) -> Result<SendReceipt, SendEmailError> {
        let url = format!("{}/mail/send", self.base_url);
        let body = SendEmailBody {
            from: SengridEmail {
                email: String::from(self.sender.as_ref()),
            },
            personalizations: vec![SengridPersonalization {
                to: vec![SengridEmail {
                    email: String::from(recipient.as_ref()),
                }],
            }],
            subject: String::from(subject),
            content: vec![SengridContent {
                content_type: String::from("text/html"),
                value: String::from(html_content),
            }],
        };

        let response = self
            .http_client
            .post(&url)
            .header(
                "Authorization",
                format!("Bearer {}", self.api_key.expose_secret()),
            )
            .json(&body)
            .send()
            .await?;

        // 4xx and 5xx both mean the message was not accepted
        if !response.status().is_success() {
            return Err(SendEmailError::Rejected(response.status()));
        }

        let provider_message_id = response
            .headers()
            .get(MESSAGE_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(String::from);

        Ok(SendReceipt {
            provider_message_id,
        })
    }

    fn timeout(&self) -> time::Duration {
        self.timeout
    }
}
