use askama::Template;
use shared::pricing::format_currency;
use shared::{Order, OrderItem, OrderStatus};

use crate::config::BusinessConfig;

const SMS_ITEMS_LIMIT: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailContent {
    pub subject: String,
    pub html: String,
}

/// A priced row of the items table.
struct ItemLine {
    quantity: i32,
    name: String,
    subtotal: String,
}

fn item_lines(order: &Order) -> Vec<ItemLine> {
    order
        .items
        .iter()
        .map(|item| ItemLine {
            quantity: item.quantity,
            name: item.name.clone(),
            subtotal: format_currency(&item.subtotal()),
        })
        .collect()
}

#[derive(Template)]
#[template(path = "email/confirmation.html")]
struct ConfirmationEmailHtml<'a> {
    order: &'a Order,
    business: &'a BusinessConfig,
    items: Vec<ItemLine>,
    total: String,
}

#[derive(Template)]
#[template(path = "email/admin_order.html")]
struct AdminOrderEmailHtml<'a> {
    order: &'a Order,
    items: Vec<ItemLine>,
    total: String,
}

#[derive(Template)]
#[template(path = "email/status.html")]
struct StatusEmailHtml<'a> {
    order: &'a Order,
    business: &'a BusinessConfig,
    status: OrderStatus,
    message: String,
    total: String,
}

#[derive(Template)]
#[template(path = "email/reminder.html")]
struct ReminderEmailHtml<'a> {
    order: &'a Order,
    business: &'a BusinessConfig,
    total: String,
}

pub fn confirmation_email(order: &Order, business: &BusinessConfig) -> askama::Result<EmailContent> {
    let html = ConfirmationEmailHtml {
        order,
        business,
        items: item_lines(order),
        total: format_currency(&order.total),
    }
    .render()?;

    Ok(EmailContent {
        subject: format!("Order Confirmation - {}", order.short_id()),
        html,
    })
}

pub fn admin_order_email(order: &Order) -> askama::Result<EmailContent> {
    let html = AdminOrderEmailHtml {
        order,
        items: item_lines(order),
        total: format_currency(&order.total),
    }
    .render()?;

    Ok(EmailContent {
        subject: format!("New Order Received - {}", order.short_id()),
        html,
    })
}

fn status_message(order: &Order, status: OrderStatus, business: &BusinessConfig) -> Option<(String, String)> {
    let short_id = order.short_id();
    match status {
        OrderStatus::Ready => Some((
            format!("Your Order is Ready for Pickup - {short_id}"),
            format!(
                "Great news! Your order is ready for pickup at {}. Please come by {} to collect your order.",
                order.pickup_time, business.address
            ),
        )),
        OrderStatus::Completed => Some((
            format!("Order Completed - {short_id}"),
            "Thank you for your order! We hope you enjoyed your meal. We'd love to see you again soon!".to_string(),
        )),
        OrderStatus::Cancelled => Some((
            format!("Order Cancelled - {short_id}"),
            format!(
                "Your order has been cancelled. If you have any questions, please contact us at {} or {}.",
                business.phone, business.email
            ),
        )),
        OrderStatus::Pending | OrderStatus::Confirmed => None,
    }
}

/// `None` for statuses customers are not told about.
pub fn status_email(
    order: &Order,
    status: OrderStatus,
    business: &BusinessConfig,
) -> Option<askama::Result<EmailContent>> {
    let (subject, message) = status_message(order, status, business)?;
    let rendered = StatusEmailHtml {
        order,
        business,
        status,
        message,
        total: format_currency(&order.total),
    }
    .render();

    Some(rendered.map(|html| EmailContent { subject, html }))
}

pub fn reminder_email(order: &Order, business: &BusinessConfig) -> askama::Result<EmailContent> {
    let html = ReminderEmailHtml {
        order,
        business,
        total: format_currency(&order.total),
    }
    .render()?;

    Ok(EmailContent {
        subject: format!("Reminder: Order Ready Soon - {}", order.short_id()),
        html,
    })
}

fn describe_items<'a>(items: impl Iterator<Item = &'a OrderItem>) -> String {
    items
        .map(|item| format!("{}x {}", item.quantity, item.name))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Item list for an SMS body; long lists keep the first two items.
pub fn sms_items(items: &[OrderItem]) -> String {
    let all = describe_items(items.iter());
    if all.chars().count() <= SMS_ITEMS_LIMIT || items.len() <= 2 {
        return all;
    }
    format!("{} +{} more", describe_items(items.iter().take(2)), items.len() - 2)
}

pub fn confirmation_sms(order: &Order, business: &BusinessConfig) -> String {
    format!(
        "Order {} confirmed!\n\nItems: {}\nPickup: {}\nLocation: {}\nTotal: {}\n\n{}",
        order.short_id(),
        sms_items(&order.items),
        order.pickup_time,
        business.address,
        format_currency(&order.total),
        business.name
    )
}

pub fn admin_order_sms(order: &Order) -> String {
    format!(
        "New Order {}\n{}\n{}\nPickup: {}\nTotal: {}",
        order.short_id(),
        order.customer_name,
        sms_items(&order.items),
        order.pickup_time,
        format_currency(&order.total)
    )
}

pub fn status_sms(order: &Order, status: OrderStatus, business: &BusinessConfig) -> Option<String> {
    let short_id = order.short_id();
    match status {
        OrderStatus::Ready => Some(format!(
            "Your order {short_id} is ready! Pickup at {}. {}",
            order.pickup_time, business.address
        )),
        OrderStatus::Completed => Some(format!("Thank you for your order {short_id}! We hope you enjoyed it.")),
        OrderStatus::Cancelled => Some(format!(
            "Order {short_id} has been cancelled. Contact us: {}",
            business.phone
        )),
        OrderStatus::Pending | OrderStatus::Confirmed => None,
    }
}

pub fn reminder_sms(order: &Order, business: &BusinessConfig) -> String {
    format!(
        "Reminder: Your order {} pickup is at {}. {}",
        order.short_id(),
        order.pickup_time,
        business.address
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::sample_order;

    fn item(name: &str, quantity: i32) -> OrderItem {
        OrderItem {
            product_id: name.to_lowercase(),
            name: name.to_string(),
            price: "1.00".parse().unwrap(),
            quantity,
        }
    }

    #[test]
    fn short_item_lists_are_kept_whole() {
        let items = vec![item("Burger", 2), item("Fries", 1)];
        assert_eq!(sms_items(&items), "2x Burger, 1x Fries");
    }

    #[test]
    fn long_item_lists_are_truncated_to_two() {
        let items: Vec<_> = (0..6)
            .map(|i| item(&format!("Extremely Long Menu Item Number {i}"), 1))
            .collect();
        assert_eq!(
            sms_items(&items),
            "1x Extremely Long Menu Item Number 0, 1x Extremely Long Menu Item Number 1 +4 more"
        );
    }

    #[test]
    fn only_ready_completed_cancelled_have_templates() {
        let order = sample_order("ORD-1700000000000-abcdefghi");
        let business = BusinessConfig::sample();
        for status in [OrderStatus::Ready, OrderStatus::Completed, OrderStatus::Cancelled] {
            assert!(matches!(status_email(&order, status, &business), Some(Ok(_))));
            assert!(status_sms(&order, status, &business).is_some());
        }
        for status in [OrderStatus::Pending, OrderStatus::Confirmed] {
            assert!(status_email(&order, status, &business).is_none());
            assert!(status_sms(&order, status, &business).is_none());
        }
    }

    #[test]
    fn subjects_use_short_order_id() {
        let order = sample_order("ORD-1700000000000-abcdefghi");
        let business = BusinessConfig::sample();
        assert_eq!(
            confirmation_email(&order, &business).unwrap().subject,
            "Order Confirmation - ORD-1700"
        );
        assert_eq!(admin_order_email(&order).unwrap().subject, "New Order Received - ORD-1700");
        assert_eq!(
            reminder_email(&order, &business).unwrap().subject,
            "Reminder: Order Ready Soon - ORD-1700"
        );
        assert!(reminder_sms(&order, &business).starts_with("Reminder: Your order ORD-1700 pickup is at"));
    }

    #[test]
    fn customer_text_is_escaped_in_html() {
        let mut order = sample_order("ORD-1");
        order.customer_name = "<script>alert(1)</script>".to_string();
        let html = confirmation_email(&order, &BusinessConfig::sample()).unwrap().html;
        assert!(!html.contains("<script>"));
        assert!(html.contains("alert(1)"));
    }

    #[test]
    fn confirmation_lists_items_and_total() {
        let order = sample_order("ORD-1");
        let html = confirmation_email(&order, &BusinessConfig::sample()).unwrap().html;
        assert!(html.contains("2x Classic Burger"));
        assert!(html.contains("$25.98"));
        assert!(html.contains(&order.pickup_time));

        let sms = confirmation_sms(&order, &BusinessConfig::sample());
        assert!(sms.contains("Total: $30.97"));
    }

    #[test]
    fn admin_email_shows_contact_details() {
        let order = sample_order("ORD-1");
        let html = admin_order_email(&order).unwrap().html;
        assert!(html.contains("#dc2626"));
        assert!(html.contains("ada@example.com"));
        assert!(html.contains("(555) 010-2000"));
        assert!(html.contains("Notify By:</strong> email"));
        assert!(html.contains("$30.97"));
    }

    #[test]
    fn status_and_reminder_emails_use_business_details() {
        let order = sample_order("ORD-1");
        let business = BusinessConfig::sample();

        let ready = status_email(&order, OrderStatus::Ready, &business).unwrap().unwrap();
        assert!(ready.subject.starts_with("Your Order is Ready for Pickup"));
        assert!(ready.html.contains("Order Update"));
        assert!(ready.html.contains("<strong>Status:</strong> ready"));

        let reminder = reminder_email(&order, &business).unwrap();
        assert!(reminder.html.contains("Pickup Reminder"));
        assert!(reminder.html.contains(&format!("Pickup Location:</strong> {}", business.address)));
    }
}
