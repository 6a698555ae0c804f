use clap::{ArgAction, Args};
use shared::BusinessHours;

#[derive(Debug, Clone, Args)]
pub struct BusinessConfig {
    #[arg(long = "business-name", env = "BUSINESS_NAME", default_value = "Pickmeup")]
    pub name: String,

    #[arg(long = "business-email", env = "BUSINESS_EMAIL", default_value = "orders@pickmeup.com")]
    pub email: String,

    #[arg(long = "business-phone", env = "BUSINESS_PHONE", default_value = "(555) 123-4567")]
    pub phone: String,

    #[arg(long = "business-address", env = "BUSINESS_ADDRESS", default_value = "123 Main St, City, State 12345")]
    pub address: String,
}

#[derive(Debug, Clone, Args)]
pub struct HoursConfig {
    #[arg(long, env = "BUSINESS_OPEN_HOUR", default_value_t = 10)]
    pub open_hour: u32,

    #[arg(long, env = "BUSINESS_CLOSE_HOUR", default_value_t = 20)]
    pub close_hour: u32,

    #[arg(long, env = "ORDER_CUTOFF_MINUTES", default_value_t = 30)]
    pub order_cutoff_minutes: u32,

    #[arg(long, env = "TIME_SLOT_INTERVAL", default_value_t = 15)]
    pub time_slot_interval: u32,
}

impl HoursConfig {
    pub fn business_hours(&self) -> BusinessHours {
        BusinessHours {
            open_hour: self.open_hour,
            close_hour: self.close_hour,
            order_cutoff_minutes: self.order_cutoff_minutes,
            time_slot_interval: self.time_slot_interval,
        }
    }
}

#[derive(Debug, Clone, Args)]
pub struct FeatureConfig {
    #[arg(long = "enable-email-notifications", env = "ENABLE_EMAIL_NOTIFICATIONS", default_value_t = false, action = ArgAction::Set)]
    pub email_notifications: bool,

    #[arg(long = "enable-sms-notifications", env = "ENABLE_SMS_NOTIFICATIONS", default_value_t = false, action = ArgAction::Set)]
    pub sms_notifications: bool,

    #[arg(long, env = "REQUIRE_ZIP_CODE", default_value_t = true, action = ArgAction::Set)]
    pub require_zip_code: bool,
}

#[derive(Debug, Clone, Args)]
pub struct EmailConfig {
    #[arg(long, env = "RESEND_API_KEY", hide_env_values = true)]
    pub resend_api_key: Option<String>,

    #[arg(long, env = "FROM_EMAIL", default_value = "noreply@pickmeup.com")]
    pub from_email: String,

    #[arg(long, env = "FROM_NAME", default_value = "Pickmeup")]
    pub from_name: String,

    #[arg(long = "reply-to-email", env = "REPLY_TO_EMAIL", default_value = "support@pickmeup.com")]
    pub reply_to: String,
}

#[derive(Debug, Clone, Args)]
pub struct SmsConfig {
    #[arg(long, env = "TWILIO_ACCOUNT_SID")]
    pub twilio_account_sid: Option<String>,

    #[arg(long, env = "TWILIO_AUTH_TOKEN", hide_env_values = true)]
    pub twilio_auth_token: Option<String>,

    #[arg(long, env = "TWILIO_PHONE_NUMBER")]
    pub twilio_phone_number: Option<String>,
}

#[cfg(test)]
impl BusinessConfig {
    pub fn sample() -> Self {
        Self {
            name: "Pickmeup".to_string(),
            email: "orders@pickmeup.com".to_string(),
            phone: "(555) 123-4567".to_string(),
            address: "123 Main St, City, State 12345".to_string(),
        }
    }
}
