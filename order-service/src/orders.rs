use bigdecimal::BigDecimal;
use num_traits::Zero;
use serde::Deserialize;
use shared::clock::parse_pickup_time;
use shared::pricing::is_valid_zip_code;
use shared::{compute_total, new_order_id, CustomerInfo, NotificationPreference, Order, OrderItem, OrderStatus, Product};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::clock::Clock;
use crate::store::{CustomerLookup, OrderStore, ProductCatalog, StoreError};

/// How many recent orders a phone lookup scans.
const PHONE_LOOKUP_WINDOW: i64 = 100;

#[derive(Debug, thiserror::Error)]
pub enum OrderError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Which status changes an admin may make.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum TransitionPolicy {
    /// Any status may follow any other.
    #[default]
    Unconstrained,
    /// pending → confirmed → ready → completed, with cancellation allowed
    /// until the order is completed.
    ForwardOnly,
}

impl TransitionPolicy {
    pub fn allows(self, from: OrderStatus, to: OrderStatus) -> bool {
        match self {
            TransitionPolicy::Unconstrained => true,
            TransitionPolicy::ForwardOnly => {
                if from == to {
                    return true;
                }
                if from.is_terminal() {
                    return false;
                }
                match (forward_rank(from), forward_rank(to)) {
                    (_, None) => true,
                    (Some(a), Some(b)) => b > a,
                    (None, Some(_)) => false,
                }
            }
        }
    }
}

fn forward_rank(status: OrderStatus) -> Option<u8> {
    match status {
        OrderStatus::Pending => Some(0),
        OrderStatus::Confirmed => Some(1),
        OrderStatus::Ready => Some(2),
        OrderStatus::Completed => Some(3),
        OrderStatus::Cancelled => None,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    #[serde(alias = "id")]
    pub product_id: String,
    pub quantity: i32,
}

/// A checkout whose required fields are all present.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub customer: CustomerInfo,
    pub lines: Vec<CartLine>,
    pub pickup_time: String,
    pub preference: NotificationPreference,
}

#[derive(Debug, Clone)]
pub struct StatusChange {
    pub order: Order,
    pub previous: OrderStatus,
}

pub struct OrderService {
    orders: Arc<dyn OrderStore>,
    catalog: Arc<dyn ProductCatalog>,
    policy: TransitionPolicy,
    require_zip_code: bool,
    clock: Clock,
}

impl OrderService {
    pub fn new(
        orders: Arc<dyn OrderStore>,
        catalog: Arc<dyn ProductCatalog>,
        policy: TransitionPolicy,
        require_zip_code: bool,
        clock: Clock,
    ) -> Self {
        Self {
            orders,
            catalog,
            policy,
            require_zip_code,
            clock,
        }
    }

    /// Prices the cart from the catalog and persists header then items. If
    /// the items cannot be written the header is removed again.
    pub async fn create_order(&self, new_order: NewOrder) -> Result<Order, OrderError> {
        self.validate(&new_order)?;
        let items = self.price_lines(&new_order.lines).await?;
        let total = compute_total(&items);

        let now = self.clock.now();
        let customer = new_order.customer;
        let order = Order {
            id: new_order_id(now),
            customer_name: customer.name.trim().to_string(),
            email: customer.email.trim().to_string(),
            phone: customer.phone.trim().to_string(),
            zip_code: customer.zip_code.trim().to_string(),
            items,
            total,
            pickup_time: new_order.pickup_time.trim().to_string(),
            status: OrderStatus::Pending,
            notification_preference: new_order.preference,
            created_at: now,
            reminder_sent_at: None,
        };

        self.orders.insert_order(&order).await?;
        if let Err(e) = self.orders.insert_order_items(&order.id, &order.items).await {
            error!(order_id = %order.id, error = %e, "Failed to insert order items, removing order");
            if let Err(cleanup) = self.orders.delete_order(&order.id).await {
                error!(order_id = %order.id, error = %cleanup, "Failed to remove order after item insert failure");
            }
            return Err(e.into());
        }

        info!(order_id = %order.id, total = %order.total, items = order.items.len(), "Order created");
        Ok(order)
    }

    fn validate(&self, new_order: &NewOrder) -> Result<(), OrderError> {
        let customer = &new_order.customer;
        for (field, value) in [
            ("customerInfo.name", &customer.name),
            ("customerInfo.email", &customer.email),
            ("customerInfo.phone", &customer.phone),
        ] {
            if value.trim().is_empty() {
                return Err(OrderError::Validation(format!("{field} is required")));
            }
        }
        if !customer.email.contains('@') {
            return Err(OrderError::Validation("customerInfo.email is not a valid email address".to_string()));
        }
        if self.require_zip_code && !is_valid_zip_code(customer.zip_code.trim()) {
            return Err(OrderError::Validation("customerInfo.zipCode must be 5 digits".to_string()));
        }

        if new_order.lines.is_empty() {
            return Err(OrderError::Validation("items must not be empty".to_string()));
        }
        if let Some(line) = new_order.lines.iter().find(|line| line.quantity <= 0) {
            return Err(OrderError::Validation(format!(
                "quantity for {} must be positive",
                line.product_id
            )));
        }

        parse_pickup_time(&new_order.pickup_time).map_err(|e| OrderError::Validation(e.to_string()))?;
        Ok(())
    }

    async fn price_lines(&self, lines: &[CartLine]) -> Result<Vec<OrderItem>, OrderError> {
        let mut ids: Vec<String> = lines.iter().map(|line| line.product_id.clone()).collect();
        ids.sort();
        ids.dedup();

        let products: HashMap<String, Product> = self
            .catalog
            .products_by_ids(&ids)
            .await?
            .into_iter()
            .map(|product| (product.id.clone(), product))
            .collect();

        lines
            .iter()
            .map(|line| {
                let product = products
                    .get(&line.product_id)
                    .ok_or_else(|| OrderError::NotFound(format!("product {} not found", line.product_id)))?;
                if !product.is_available {
                    return Err(OrderError::Validation(format!("{} is not available", product.name)));
                }
                if product.price <= BigDecimal::zero() {
                    return Err(OrderError::Validation(format!("{} has no valid price", product.name)));
                }
                Ok(OrderItem {
                    product_id: product.id.clone(),
                    name: product.name.clone(),
                    price: product.price.clone(),
                    quantity: line.quantity,
                })
            })
            .collect()
    }

    /// Newest first. A store failure yields an empty list.
    pub async fn list_orders(&self) -> Vec<Order> {
        match self.orders.list_orders().await {
            Ok(orders) => orders,
            Err(e) => {
                error!(error = %e, "Failed to list orders");
                Vec::new()
            }
        }
    }

    pub async fn get_order(&self, order_id: &str) -> Result<Order, OrderError> {
        self.orders
            .find_order(order_id)
            .await?
            .ok_or_else(|| OrderError::NotFound(format!("order {order_id} not found")))
    }

    pub async fn update_status(&self, order_id: &str, status: OrderStatus) -> Result<StatusChange, OrderError> {
        let mut order = self.get_order(order_id).await?;
        let previous = order.status;
        if !self.policy.allows(previous, status) {
            return Err(OrderError::Validation(format!(
                "cannot move order from {previous} to {status}"
            )));
        }

        if !self.orders.set_status(order_id, status).await? {
            return Err(OrderError::NotFound(format!("order {order_id} not found")));
        }
        order.status = status;

        info!(order_id, %previous, %status, "Order status updated");
        Ok(StatusChange { order, previous })
    }

    pub async fn mark_reminder_sent(&self, order_id: &str) -> Result<bool, OrderError> {
        Ok(self.orders.set_reminder_sent(order_id, self.clock.now()).await?)
    }

    /// Customer details from the most recent order placed with this email or
    /// phone number. Lookup failures read as "not found".
    pub async fn find_customer(&self, lookup: CustomerLookup) -> Option<CustomerInfo> {
        let result = match &lookup {
            CustomerLookup::Email(email) => self
                .orders
                .recent_customers(&lookup, 1)
                .await
                .map(|customers| customers.into_iter().find(|c| c.email == *email)),
            CustomerLookup::Phone(phone) => {
                let wanted = phone_digits(phone);
                if wanted.is_empty() {
                    return None;
                }
                self.orders
                    .recent_customers(&lookup, PHONE_LOOKUP_WINDOW)
                    .await
                    .map(|customers| customers.into_iter().find(|c| phone_digits(&c.phone) == wanted))
            }
        };

        result.unwrap_or_else(|e| {
            warn!(error = %e, "Customer lookup failed");
            None
        })
    }
}

fn phone_digits(phone: &str) -> String {
    phone.chars().filter(char::is_ascii_digit).collect()
}
