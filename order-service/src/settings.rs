use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use shared::settings::{EMAIL_SMS_KEY, NOTIFICATIONS_KEY};
use shared::{EmailSmsSettings, NotificationSettings, Settings};
use std::sync::Arc;
use tracing::{info, warn};

use crate::store::{SettingsStore, StoreError};

pub const MIGRATION_HINT: &str =
    "The settings table does not exist. Run the database migrations (2024-06-01-000100_create_settings) and restart the service.";

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("{0}")]
    Validation(String),

    #[error("settings table is missing: {0}")]
    MissingTable(String),

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for SettingsError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::MissingTable(message) => SettingsError::MissingTable(message),
            other => SettingsError::Store(other),
        }
    }
}

/// Aggregates to replace. Absent aggregates are left untouched.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SettingsUpdate {
    pub notifications: Option<NotificationSettings>,
    pub email_sms: Option<EmailSmsSettings>,
}

/// Reads and writes the two settings aggregates. Nothing is cached; every
/// call goes to the store.
pub struct SettingsResolver {
    store: Arc<dyn SettingsStore>,
}

impl SettingsResolver {
    pub fn new(store: Arc<dyn SettingsStore>) -> Self {
        Self { store }
    }

    /// Current settings, or the defaults when either record is missing or
    /// the store cannot be read.
    pub async fn get_settings(&self) -> Settings {
        let notifications = self.read::<NotificationSettings>(NOTIFICATIONS_KEY).await;
        let email_sms = self.read::<EmailSmsSettings>(EMAIL_SMS_KEY).await;

        match (notifications, email_sms) {
            (Ok(Some(notifications)), Ok(Some(email_sms))) => Settings {
                notifications: normalized(notifications),
                email_sms,
            },
            (Err(e), _) | (_, Err(e)) => {
                warn!(error = %e, "Failed to read settings, using defaults");
                Settings::default()
            }
            _ => Settings::default(),
        }
    }

    pub async fn update_settings(&self, update: SettingsUpdate) -> Result<Settings, SettingsError> {
        if let Some(notifications) = &update.notifications {
            notifications
                .validate()
                .map_err(|e| SettingsError::Validation(e.to_string()))?;
        }
        let email_sms = update.email_sms.map(|mut email_sms| {
            email_sms.admin_emails = trimmed(email_sms.admin_emails);
            email_sms.admin_phones = trimmed(email_sms.admin_phones);
            email_sms
        });

        if let Some(notifications) = &update.notifications {
            self.write(NOTIFICATIONS_KEY, notifications).await?;
        }
        if let Some(email_sms) = &email_sms {
            self.write(EMAIL_SMS_KEY, email_sms).await?;
        }
        info!(
            notifications = update.notifications.is_some(),
            email_sms = email_sms.is_some(),
            "Settings updated"
        );

        let notifications = self
            .read::<NotificationSettings>(NOTIFICATIONS_KEY)
            .await
            .ok()
            .flatten()
            .or(update.notifications)
            .unwrap_or_default();
        let email_sms = self
            .read::<EmailSmsSettings>(EMAIL_SMS_KEY)
            .await
            .ok()
            .flatten()
            .or(email_sms)
            .unwrap_or_default();

        Ok(Settings {
            notifications: normalized(notifications),
            email_sms,
        })
    }

    async fn read<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StoreError> {
        match self.store.read_setting(key).await? {
            Some(value) => serde_json::from_value(value)
                .map(Some)
                .map_err(|e| StoreError::Corrupt(format!("setting {key}: {e}"))),
            None => Ok(None),
        }
    }

    async fn write<T: Serialize>(&self, key: &str, aggregate: &T) -> Result<(), SettingsError> {
        let value = serde_json::to_value(aggregate).map_err(|e| StoreError::Corrupt(format!("setting {key}: {e}")))?;
        self.store.upsert_setting(key, value).await?;
        Ok(())
    }
}

fn normalized(mut notifications: NotificationSettings) -> NotificationSettings {
    let stored = notifications.reminder_minutes;
    if notifications.normalize() {
        warn!(stored, "Stored reminderMinutes is out of range, using the default");
    }
    notifications
}

fn trimmed(values: Vec<String>) -> Vec<String> {
    values
        .into_iter()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MemoryStore;
    use serde_json::json;
    use shared::ReminderMethod;
    use std::sync::atomic::Ordering;

    fn resolver(store: &Arc<MemoryStore>) -> SettingsResolver {
        SettingsResolver::new(store.clone())
    }

    #[tokio::test]
    async fn empty_store_yields_defaults() {
        let store = Arc::new(MemoryStore::default());
        assert_eq!(resolver(&store).get_settings().await, Settings::default());
    }

    #[tokio::test]
    async fn one_missing_record_yields_defaults() {
        let store = Arc::new(MemoryStore::default());
        store.seed_setting(NOTIFICATIONS_KEY, json!({ "reminderMethod": "manual" }));

        assert_eq!(resolver(&store).get_settings().await, Settings::default());
    }

    #[tokio::test]
    async fn unreadable_store_yields_defaults() {
        let store = Arc::new(MemoryStore::default());
        store.missing_settings_table.store(true, Ordering::SeqCst);
        assert_eq!(resolver(&store).get_settings().await, Settings::default());

        let store = Arc::new(MemoryStore::default());
        store.seed_setting(NOTIFICATIONS_KEY, json!("not an object"));
        store.seed_setting(EMAIL_SMS_KEY, json!({}));
        assert_eq!(resolver(&store).get_settings().await, Settings::default());
    }

    #[tokio::test]
    async fn stored_records_are_normalized() {
        let store = Arc::new(MemoryStore::default());
        store.seed_setting(
            NOTIFICATIONS_KEY,
            json!({ "reminderMinutes": 42, "reminderMethod": "polling", "statusChangeEnabled": false }),
        );
        store.seed_setting(EMAIL_SMS_KEY, json!({ "adminEmails": ["owner@shop.io"] }));

        let settings = resolver(&store).get_settings().await;
        assert_eq!(settings.notifications.reminder_minutes, 15);
        assert_eq!(settings.notifications.reminder_method, ReminderMethod::Polling);
        assert!(!settings.notifications.status_change_enabled);
        assert!(settings.notifications.reminder_enabled);
        assert_eq!(settings.email_sms.admin_emails, vec!["owner@shop.io".to_string()]);
    }

    #[tokio::test]
    async fn update_writes_each_aggregate_independently() {
        let store = Arc::new(MemoryStore::default());
        let update = SettingsUpdate {
            notifications: None,
            email_sms: Some(EmailSmsSettings {
                admin_emails: vec![" owner@shop.io ".to_string(), "  ".to_string()],
                admin_phones: vec!["+15550000001".to_string()],
                ..Default::default()
            }),
        };

        let settings = resolver(&store).update_settings(update).await.unwrap();

        assert_eq!(settings.email_sms.admin_emails, vec!["owner@shop.io".to_string()]);
        assert_eq!(settings.notifications, NotificationSettings::default());
        assert!(store.setting(NOTIFICATIONS_KEY).is_none());
        assert_eq!(store.setting(EMAIL_SMS_KEY).unwrap()["adminEmails"], json!(["owner@shop.io"]));
    }

    #[tokio::test]
    async fn invalid_reminder_minutes_are_rejected_before_writing() {
        let store = Arc::new(MemoryStore::default());
        let update = SettingsUpdate {
            notifications: Some(NotificationSettings {
                reminder_minutes: 7,
                ..Default::default()
            }),
            email_sms: Some(EmailSmsSettings::default()),
        };

        let result = resolver(&store).update_settings(update).await;
        assert!(matches!(result, Err(SettingsError::Validation(_))));
        assert_eq!(store.writes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn missing_table_is_a_distinct_error() {
        let store = Arc::new(MemoryStore::default());
        store.missing_settings_table.store(true, Ordering::SeqCst);

        let result = resolver(&store)
            .update_settings(SettingsUpdate {
                notifications: Some(NotificationSettings::default()),
                email_sms: None,
            })
            .await;
        assert!(matches!(result, Err(SettingsError::MissingTable(_))));
    }

    #[tokio::test]
    async fn other_write_failures_are_store_errors() {
        let store = Arc::new(MemoryStore::default());
        store.fail_settings_writes.store(true, Ordering::SeqCst);

        let result = resolver(&store)
            .update_settings(SettingsUpdate {
                notifications: Some(NotificationSettings::default()),
                email_sms: None,
            })
            .await;
        assert!(matches!(result, Err(SettingsError::Store(StoreError::Unavailable(_)))));
    }

    #[tokio::test]
    async fn update_falls_back_to_submitted_when_reread_fails() {
        let store = Arc::new(MemoryStore::default());
        let resolver = resolver(&store);
        let submitted = NotificationSettings {
            reminder_method: ReminderMethod::Manual,
            ..Default::default()
        };
        resolver
            .update_settings(SettingsUpdate {
                notifications: Some(submitted.clone()),
                email_sms: None,
            })
            .await
            .unwrap();

        store.fail_reads.store(true, Ordering::SeqCst);
        let settings = resolver
            .update_settings(SettingsUpdate {
                notifications: Some(submitted.clone()),
                email_sms: None,
            })
            .await
            .unwrap();
        assert_eq!(settings.notifications, submitted);
        assert_eq!(settings.email_sms, EmailSmsSettings::default());
    }
}
