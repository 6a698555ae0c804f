use futures::future::join_all;
use shared::{EmailSmsSettings, NotificationPreference, Order, OrderStatus};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::config::BusinessConfig;
use crate::providers::{EmailMessage, EmailProvider, SendOutcome, SmsMessage, SmsProvider};
use crate::templates::{self, EmailContent};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Email,
    Sms,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Audience {
    Customer,
    Admin,
}

/// System-wide switches, independent of per-order preference.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChannelFlags {
    pub email: bool,
    pub sms: bool,
}

impl ChannelFlags {
    pub fn any(&self) -> bool {
        self.email || self.sms
    }

    /// Whether at least one enabled channel is one the customer asked for.
    pub fn reaches(&self, preference: NotificationPreference) -> bool {
        (self.email && preference.wants_email()) || (self.sms && preference.wants_sms())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NotificationEvent {
    OrderCreated { recipients: EmailSmsSettings },
    StatusChanged {
        previous: OrderStatus,
        current: OrderStatus,
        enabled: bool,
    },
    Reminder,
}

impl NotificationEvent {
    fn kind(&self) -> &'static str {
        match self {
            NotificationEvent::OrderCreated { .. } => "order_created",
            NotificationEvent::StatusChanged { .. } => "status_changed",
            NotificationEvent::Reminder => "reminder",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NotificationJob {
    pub order: Order,
    pub event: NotificationEvent,
}

impl NotificationJob {
    pub fn order_created(order: Order, recipients: EmailSmsSettings) -> Self {
        Self {
            order,
            event: NotificationEvent::OrderCreated { recipients },
        }
    }

    pub fn status_changed(order: Order, previous: OrderStatus, enabled: bool) -> Self {
        let current = order.status;
        Self {
            order,
            event: NotificationEvent::StatusChanged {
                previous,
                current,
                enabled,
            },
        }
    }

    pub fn reminder(order: Order) -> Self {
        Self {
            order,
            event: NotificationEvent::Reminder,
        }
    }
}

/// One provider call and what came of it.
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub channel: Channel,
    pub audience: Audience,
    pub recipients: Vec<String>,
    pub outcome: SendOutcome,
}

#[derive(Clone)]
pub struct Dispatcher {
    email: Arc<dyn EmailProvider>,
    sms: Arc<dyn SmsProvider>,
    channels: ChannelFlags,
    business: BusinessConfig,
}

impl Dispatcher {
    pub fn new(
        email: Arc<dyn EmailProvider>,
        sms: Arc<dyn SmsProvider>,
        channels: ChannelFlags,
        business: BusinessConfig,
    ) -> Self {
        Self {
            email,
            sms,
            channels,
            business,
        }
    }

    pub fn channels(&self) -> ChannelFlags {
        self.channels
    }

    pub fn email_configured(&self) -> bool {
        self.email.is_configured()
    }

    pub fn sms_configured(&self) -> bool {
        self.sms.is_configured()
    }

    /// Performs every send the event calls for. Sends are independent: a
    /// failed email does not prevent the SMS and vice versa.
    pub async fn dispatch(&self, job: &NotificationJob) -> Vec<Delivery> {
        let order = &job.order;
        let deliveries = match &job.event {
            NotificationEvent::OrderCreated { recipients } => {
                let customer = self.notify_customer(
                    order,
                    rendered(order, templates::confirmation_email(order, &self.business)),
                    Some(templates::confirmation_sms(order, &self.business)),
                );
                let admins = self.notify_admins(order, recipients);
                let (mut customer, admins) = futures::join!(customer, admins);
                customer.extend(admins);
                customer
            }
            NotificationEvent::StatusChanged {
                previous,
                current,
                enabled,
            } => {
                if !enabled || previous == current {
                    return Vec::new();
                }
                self.notify_customer(
                    order,
                    templates::status_email(order, *current, &self.business)
                        .and_then(|content| rendered(order, content)),
                    templates::status_sms(order, *current, &self.business),
                )
                .await
            }
            NotificationEvent::Reminder => {
                self.notify_customer(
                    order,
                    rendered(order, templates::reminder_email(order, &self.business)),
                    Some(templates::reminder_sms(order, &self.business)),
                )
                .await
            }
        };

        for delivery in &deliveries {
            log_delivery(job, delivery);
        }
        deliveries
    }

    /// Confirmation email for the `/test-email` diagnostic. Ignores the
    /// channel flags; the caller checks them.
    pub async fn send_confirmation_email(&self, order: &Order) -> SendOutcome {
        let content = match templates::confirmation_email(order, &self.business) {
            Ok(content) => content,
            Err(e) => {
                return SendOutcome::Failed {
                    error: format!("Template error: {e}"),
                }
            }
        };
        self.email
            .send_email(&EmailMessage {
                to: vec![order.email.clone()],
                reply_to: None,
                subject: content.subject,
                html: content.html,
            })
            .await
    }

    async fn notify_customer(&self, order: &Order, email: Option<EmailContent>, sms: Option<String>) -> Vec<Delivery> {
        let preference = order.notification_preference;

        let email_send = async {
            let content = email.filter(|_| self.channels.email && preference.wants_email())?;
            let message = EmailMessage {
                to: vec![order.email.clone()],
                reply_to: None,
                subject: content.subject,
                html: content.html,
            };
            let outcome = self.email.send_email(&message).await;
            Some(Delivery {
                channel: Channel::Email,
                audience: Audience::Customer,
                recipients: message.to,
                outcome,
            })
        };

        let sms_send = async {
            let body = sms.filter(|_| self.channels.sms && preference.wants_sms())?;
            let message = SmsMessage {
                to: order.phone.clone(),
                body,
            };
            let outcome = self.sms.send_sms(&message).await;
            Some(Delivery {
                channel: Channel::Sms,
                audience: Audience::Customer,
                recipients: vec![message.to],
                outcome,
            })
        };

        let (email, sms) = futures::join!(email_send, sms_send);
        email.into_iter().chain(sms).collect()
    }

    /// One batched email to every admin address; one SMS per admin phone.
    async fn notify_admins(&self, order: &Order, recipients: &EmailSmsSettings) -> Vec<Delivery> {
        let email_send = async {
            if !self.channels.email || recipients.admin_emails.is_empty() {
                return None;
            }
            let content = rendered(order, templates::admin_order_email(order))?;
            let message = EmailMessage {
                to: recipients.admin_emails.clone(),
                reply_to: Some(order.email.clone()),
                subject: content.subject,
                html: content.html,
            };
            let outcome = self.email.send_email(&message).await;
            Some(Delivery {
                channel: Channel::Email,
                audience: Audience::Admin,
                recipients: message.to,
                outcome,
            })
        };

        let sms_sends = async {
            if !self.channels.sms {
                return Vec::new();
            }
            let body = templates::admin_order_sms(order);
            join_all(recipients.admin_phones.iter().map(|phone| {
                let message = SmsMessage {
                    to: phone.clone(),
                    body: body.clone(),
                };
                async move {
                    let outcome = self.sms.send_sms(&message).await;
                    Delivery {
                        channel: Channel::Sms,
                        audience: Audience::Admin,
                        recipients: vec![message.to],
                        outcome,
                    }
                }
            }))
            .await
        };

        let (email, sms) = futures::join!(email_send, sms_sends);
        email.into_iter().chain(sms).collect()
    }
}

fn rendered(order: &Order, content: askama::Result<EmailContent>) -> Option<EmailContent> {
    content
        .map_err(|e| error!(order_id = %order.id, error = %e, "Failed to render email"))
        .ok()
}

fn log_delivery(job: &NotificationJob, delivery: &Delivery) {
    let order_id = job.order.id.as_str();
    let event = job.event.kind();
    let channel = delivery.channel;
    let audience = delivery.audience;
    let recipients = delivery.recipients.len();

    match &delivery.outcome {
        SendOutcome::Sent { id } => info!(
            order_id, event, ?channel, ?audience, recipients, provider_id = ?id,
            "Notification sent"
        ),
        SendOutcome::Skipped { reason } => warn!(
            order_id, event, ?channel, ?audience, recipients, reason = %reason,
            "Notification skipped"
        ),
        SendOutcome::Failed { error } => error!(
            order_id, event, ?channel, ?audience, recipients, error = %error,
            "Notification failed"
        ),
    }
}
