//! Outbound email (Resend) and SMS (Twilio) delivery.
//!
//! Providers never return errors to their callers: every send resolves to a
//! [`SendOutcome`]. Missing credentials mean the send is skipped.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::{EmailConfig, SmsConfig};

const RESEND_ENDPOINT: &str = "https://api.resend.com/emails";
const TWILIO_API: &str = "https://api.twilio.com/2010-04-01";

#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("invalid sender address: {0}")]
    InvalidSender(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    Sent { id: Option<String> },
    Skipped { reason: String },
    Failed { error: String },
}

impl SendOutcome {
    pub fn skipped(reason: impl Into<String>) -> Self {
        SendOutcome::Skipped { reason: reason.into() }
    }

    pub fn success(&self) -> bool {
        matches!(self, SendOutcome::Sent { .. })
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            SendOutcome::Sent { .. } => None,
            SendOutcome::Skipped { reason } => Some(reason),
            SendOutcome::Failed { error } => Some(error),
        }
    }
}

/// `{success, error}` view of a [`SendOutcome`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SendReport {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&SendOutcome> for SendReport {
    fn from(outcome: &SendOutcome) -> Self {
        Self {
            success: outcome.success(),
            error: outcome.error().map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub to: Vec<String>,
    pub reply_to: Option<String>,
    pub subject: String,
    pub html: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmsMessage {
    pub to: String,
    pub body: String,
}

#[async_trait]
pub trait EmailProvider: Send + Sync {
    async fn send_email(&self, message: &EmailMessage) -> SendOutcome;

    fn is_configured(&self) -> bool;
}

#[async_trait]
pub trait SmsProvider: Send + Sync {
    async fn send_sms(&self, message: &SmsMessage) -> SendOutcome;

    fn is_configured(&self) -> bool;
}

/// "Name <address>", or the bare address when no name is set.
pub fn format_from_address(email: &str, name: &str) -> Result<String, NotificationError> {
    let email = email.trim();
    if email.is_empty() {
        return Err(NotificationError::InvalidSender(
            "FROM_EMAIL is required and must be a valid email address".to_string(),
        ));
    }
    if !email.contains('@') || email.len() < 5 {
        return Err(NotificationError::InvalidSender(format!(
            "{email:?} must look like noreply@yourdomain.com"
        )));
    }

    let name = name.trim();
    if name.is_empty() {
        Ok(email.to_string())
    } else {
        Ok(format!("{name} <{email}>"))
    }
}

#[derive(Serialize)]
struct ResendPayload<'a> {
    from: &'a str,
    to: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_to: Option<&'a str>,
    subject: &'a str,
    html: &'a str,
}

#[derive(Deserialize)]
struct ResendResponse {
    id: Option<String>,
}

#[derive(Clone)]
pub struct ResendClient {
    client: reqwest::Client,
    config: EmailConfig,
}

impl ResendClient {
    pub fn new(client: reqwest::Client, config: EmailConfig) -> Self {
        Self { client, config }
    }

    async fn deliver(&self, api_key: &str, message: &EmailMessage) -> Result<Option<String>, NotificationError> {
        let from = format_from_address(&self.config.from_email, &self.config.from_name)?;
        let reply_to = message
            .reply_to
            .as_deref()
            .or(Some(self.config.reply_to.as_str()))
            .filter(|address| !address.trim().is_empty());

        let payload = ResendPayload {
            from: &from,
            to: &message.to,
            reply_to,
            subject: &message.subject,
            html: &message.html,
        };

        let response = self
            .client
            .post(RESEND_ENDPOINT)
            .bearer_auth(api_key)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(NotificationError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: ResendResponse = response.json().await?;
        Ok(body.id)
    }
}

#[async_trait]
impl EmailProvider for ResendClient {
    async fn send_email(&self, message: &EmailMessage) -> SendOutcome {
        let Some(api_key) = self.config.resend_api_key.as_deref() else {
            warn!("RESEND_API_KEY not set, skipping email notification");
            return SendOutcome::skipped("RESEND_API_KEY not configured");
        };

        match self.deliver(api_key, message).await {
            Ok(id) => SendOutcome::Sent { id },
            Err(e) => SendOutcome::Failed { error: e.to_string() },
        }
    }

    fn is_configured(&self) -> bool {
        self.config.resend_api_key.is_some()
    }
}

#[derive(Debug, Clone)]
struct TwilioCredentials {
    account_sid: String,
    auth_token: String,
    from_number: String,
}

#[derive(Deserialize)]
struct TwilioMessage {
    sid: Option<String>,
}

#[derive(Clone)]
pub struct TwilioClient {
    client: reqwest::Client,
    credentials: Option<TwilioCredentials>,
}

impl TwilioClient {
    pub fn new(client: reqwest::Client, config: &SmsConfig) -> Self {
        let credentials = match (
            config.twilio_account_sid.clone(),
            config.twilio_auth_token.clone(),
            config.twilio_phone_number.clone(),
        ) {
            (Some(account_sid), Some(auth_token), Some(from_number)) => Some(TwilioCredentials {
                account_sid,
                auth_token,
                from_number,
            }),
            _ => None,
        };
        Self { client, credentials }
    }

    async fn deliver(&self, credentials: &TwilioCredentials, message: &SmsMessage) -> Result<Option<String>, NotificationError> {
        let url = format!("{TWILIO_API}/Accounts/{}/Messages.json", credentials.account_sid);
        let form = [
            ("To", message.to.as_str()),
            ("From", credentials.from_number.as_str()),
            ("Body", message.body.as_str()),
        ];

        let response = self
            .client
            .post(&url)
            .basic_auth(&credentials.account_sid, Some(&credentials.auth_token))
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(NotificationError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: TwilioMessage = response.json().await?;
        Ok(body.sid)
    }
}

#[async_trait]
impl SmsProvider for TwilioClient {
    async fn send_sms(&self, message: &SmsMessage) -> SendOutcome {
        let Some(credentials) = self.credentials.as_ref() else {
            warn!("Twilio credentials not set, skipping SMS notification");
            return SendOutcome::skipped("Twilio credentials not configured");
        };

        match self.deliver(credentials, message).await {
            Ok(id) => SendOutcome::Sent { id },
            Err(e) => SendOutcome::Failed { error: e.to_string() },
        }
    }

    fn is_configured(&self) -> bool {
        self.credentials.is_some()
    }
}
