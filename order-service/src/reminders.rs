use chrono::NaiveDateTime;
use shared::clock::{parse_pickup_time, pickup_today, within_reminder_window};
use shared::{NotificationSettings, Order, ReminderMethod};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

use crate::clock::Clock;
use crate::notifications::{ChannelFlags, NotificationJob};
use crate::orders::{OrderError, OrderService};
use crate::outbox::NotificationQueue;
use crate::settings::SettingsResolver;

/// Whether `order` should get a pickup reminder at local time `now`.
pub fn is_reminder_due(order: &Order, now: NaiveDateTime, lead_minutes: u32) -> bool {
    if !order.status.awaiting_pickup() {
        return false;
    }
    match parse_pickup_time(&order.pickup_time) {
        Ok(time) => within_reminder_window(now, pickup_today(now, time), lead_minutes),
        Err(_) => false,
    }
}

pub struct ReminderScheduler {
    orders: Arc<OrderService>,
    settings: Arc<SettingsResolver>,
    queue: NotificationQueue,
    channels: ChannelFlags,
    clock: Clock,
}

impl ReminderScheduler {
    pub fn new(
        orders: Arc<OrderService>,
        settings: Arc<SettingsResolver>,
        queue: NotificationQueue,
        channels: ChannelFlags,
        clock: Clock,
    ) -> Self {
        Self {
            orders,
            settings,
            queue,
            channels,
            clock,
        }
    }

    /// Runs a sweep over a freshly fetched order list when automatic
    /// reminders are on. Returns how many reminders were queued.
    pub async fn on_list_fetch(&self, orders: &[Order]) -> usize {
        let settings = self.settings.get_settings().await.notifications;
        if !self.sweeps_enabled(&settings) {
            return 0;
        }
        self.sweep(orders, &settings).await
    }

    /// Timer-driven sweep, active only under the polling method.
    pub async fn poll(&self) -> usize {
        let settings = self.settings.get_settings().await.notifications;
        if settings.reminder_method != ReminderMethod::Polling || !self.sweeps_enabled(&settings) {
            return 0;
        }
        let orders = self.orders.list_orders().await;
        self.sweep(&orders, &settings).await
    }

    fn sweeps_enabled(&self, settings: &NotificationSettings) -> bool {
        settings.automatic_reminders() && self.channels.any()
    }

    async fn sweep(&self, orders: &[Order], settings: &NotificationSettings) -> usize {
        let now = self.clock.local_now();
        let mut queued = 0;
        for order in orders {
            if order.reminder_sent_at.is_some()
                || !self.channels.reaches(order.notification_preference)
                || !is_reminder_due(order, now, settings.reminder_minutes)
            {
                continue;
            }
            self.queue.enqueue(NotificationJob::reminder(order.clone()));
            self.mark_sent(&order.id).await;
            queued += 1;
        }

        if queued > 0 {
            info!(queued, lead_minutes = settings.reminder_minutes, "Queued pickup reminders");
        } else {
            debug!(checked = orders.len(), "No pickup reminders due");
        }
        queued
    }

    /// Sends a reminder for one order on request, regardless of method or
    /// earlier reminders.
    pub async fn send_manual(&self, order_id: &str) -> Result<Order, OrderError> {
        let order = self.orders.get_order(order_id).await?;
        if !order.status.awaiting_pickup() {
            return Err(OrderError::Validation(format!(
                "reminders can only be sent for pending or confirmed orders, this one is {}",
                order.status
            )));
        }

        self.queue.enqueue(NotificationJob::reminder(order.clone()));
        self.mark_sent(&order.id).await;
        info!(order_id, "Queued manual pickup reminder");
        Ok(order)
    }

    async fn mark_sent(&self, order_id: &str) {
        if let Err(e) = self.orders.mark_reminder_sent(order_id).await {
            error!(order_id, error = %e, "Failed to record reminder");
        }
    }
}

/// Drives [`ReminderScheduler::poll`] on a fixed interval.
pub struct ReminderPoller {
    scheduler: Arc<ReminderScheduler>,
    every: Duration,
}

impl ReminderPoller {
    pub fn new(scheduler: Arc<ReminderScheduler>, every: Duration) -> Self {
        Self { scheduler, every }
    }

    pub async fn run(&self) {
        info!(every_secs = self.every.as_secs(), "Starting reminder poller");
        let mut ticker = tokio::time::interval(self.every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            self.scheduler.poll().await;
        }
    }
}
