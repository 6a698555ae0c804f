use serde::{Deserialize, Serialize};

pub const NOTIFICATIONS_KEY: &str = "notifications";
pub const EMAIL_SMS_KEY: &str = "email_sms";

pub const REMINDER_MINUTE_CHOICES: [u32; 6] = [5, 10, 15, 20, 25, 30];
pub const DEFAULT_REMINDER_MINUTES: u32 = 15;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReminderMethod {
    /// Checked whenever the admin order list is fetched.
    #[default]
    Simple,
    /// Checked on a fixed timer as well as on list fetches.
    Polling,
    /// Only sent when an admin asks for it.
    Manual,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PreferenceTiming {
    #[default]
    PreOrder,
    PostOrder,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("reminderMinutes must be one of {REMINDER_MINUTE_CHOICES:?}, got {0}")]
pub struct InvalidReminderMinutes(pub u32);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NotificationSettings {
    pub status_change_enabled: bool,
    pub reminder_enabled: bool,
    pub reminder_minutes: u32,
    pub reminder_method: ReminderMethod,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            status_change_enabled: true,
            reminder_enabled: true,
            reminder_minutes: DEFAULT_REMINDER_MINUTES,
            reminder_method: ReminderMethod::Simple,
        }
    }
}

impl NotificationSettings {
    pub fn validate(&self) -> Result<(), InvalidReminderMinutes> {
        if REMINDER_MINUTE_CHOICES.contains(&self.reminder_minutes) {
            Ok(())
        } else {
            Err(InvalidReminderMinutes(self.reminder_minutes))
        }
    }

    /// Replaces an out-of-range reminder lead time with the default.
    /// Returns whether anything changed.
    pub fn normalize(&mut self) -> bool {
        if self.validate().is_err() {
            self.reminder_minutes = DEFAULT_REMINDER_MINUTES;
            return true;
        }
        false
    }

    pub fn automatic_reminders(&self) -> bool {
        self.reminder_enabled && self.reminder_method != ReminderMethod::Manual
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EmailSmsSettings {
    pub admin_emails: Vec<String>,
    pub admin_phones: Vec<String>,
    pub customer_preference_timing: PreferenceTiming,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    pub notifications: NotificationSettings,
    pub email_sms: EmailSmsSettings,
}
