use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use shared::clock::available_pickup_slots;
use shared::{BusinessHours, CustomerInfo, NotificationPreference, Order, OrderItem, OrderStatus, Settings};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::clock::Clock;
use crate::config::EmailConfig;
use crate::notifications::{Dispatcher, NotificationJob};
use crate::orders::{CartLine, NewOrder, OrderError, OrderService};
use crate::outbox::NotificationQueue;
use crate::providers::SendReport;
use crate::reminders::ReminderScheduler;
use crate::settings::{SettingsError, SettingsResolver, SettingsUpdate, MIGRATION_HINT};
use crate::store::CustomerLookup;

#[derive(Clone)]
pub struct AppState {
    pub orders: Arc<OrderService>,
    pub settings: Arc<SettingsResolver>,
    pub reminders: Arc<ReminderScheduler>,
    pub queue: NotificationQueue,
    pub dispatcher: Dispatcher,
    pub email: EmailConfig,
    pub hours: BusinessHours,
    pub clock: Clock,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Internal { error: String, details: String },
}

impl From<OrderError> for ApiError {
    fn from(e: OrderError) -> Self {
        match e {
            OrderError::Validation(message) => ApiError::BadRequest(message),
            OrderError::NotFound(message) => ApiError::NotFound(message),
            OrderError::Store(e) => ApiError::Internal {
                error: "Database error".to_string(),
                details: e.to_string(),
            },
        }
    }
}

impl From<SettingsError> for ApiError {
    fn from(e: SettingsError) -> Self {
        match e {
            SettingsError::Validation(message) => ApiError::BadRequest(message),
            SettingsError::MissingTable(details) => ApiError::Internal {
                error: MIGRATION_HINT.to_string(),
                details,
            },
            SettingsError::Store(e) => ApiError::Internal {
                error: "Failed to update settings".to_string(),
                details: e.to_string(),
            },
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::BadRequest(error) => (StatusCode::BAD_REQUEST, ErrorResponse { error, details: None }),
            ApiError::NotFound(error) => (StatusCode::NOT_FOUND, ErrorResponse { error, details: None }),
            ApiError::Internal { error, details } => {
                error!(error = %error, details = %details, "Request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse {
                        error,
                        details: Some(details),
                    },
                )
            }
        };
        (status, Json(body)).into_response()
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CustomerInput {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub zip_code: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CreateOrderRequest {
    pub customer_info: Option<CustomerInput>,
    pub items: Option<Vec<CartLine>>,
    pub pickup_time: Option<String>,
    #[serde(alias = "notification_preference")]
    pub notification_preference: Option<NotificationPreference>,
}

impl CreateOrderRequest {
    fn into_new_order(self) -> Result<NewOrder, ApiError> {
        let missing = |field: &str| ApiError::BadRequest(format!("Missing required field: {field}"));
        let customer = self.customer_info.ok_or_else(|| missing("customerInfo"))?;
        let lines = self.items.ok_or_else(|| missing("items"))?;
        let pickup_time = self
            .pickup_time
            .filter(|time| !time.trim().is_empty())
            .ok_or_else(|| missing("pickupTime"))?;

        Ok(NewOrder {
            customer: CustomerInfo {
                name: customer.name,
                email: customer.email,
                phone: customer.phone,
                zip_code: customer.zip_code,
            },
            lines,
            pickup_time,
            preference: self.notification_preference.unwrap_or_default(),
        })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdateOrderRequest {
    pub order_id: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CustomerQuery {
    pub email: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CustomerResponse {
    pub customer: Option<CustomerInfo>,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/orders", get(list_orders).post(create_order).patch(update_order))
        .route("/orders/:id", get(get_order))
        .route("/orders/:id/reminder", post(send_reminder))
        .route("/settings", get(get_settings).patch(update_settings))
        .route("/customers", get(find_customer))
        .route("/pickup-times", get(pickup_times))
        .route("/test-email", get(test_email))
        .route("/health", get(health_check))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
}

pub async fn list_orders(State(state): State<AppState>) -> Json<Vec<Order>> {
    let orders = state.orders.list_orders().await;
    state.reminders.on_list_fetch(&orders).await;
    Json(orders)
}

pub async fn create_order(
    State(state): State<AppState>,
    body: Result<Json<CreateOrderRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Order>), ApiError> {
    let Json(request) = body?;
    let new_order = request.into_new_order()?;

    let order = state.orders.create_order(new_order).await.map_err(|e| match e {
        OrderError::Store(e) => ApiError::Internal {
            error: "Failed to create order".to_string(),
            details: e.to_string(),
        },
        other => other.into(),
    })?;

    let recipients = state.settings.get_settings().await.email_sms;
    state.queue.enqueue(NotificationJob::order_created(order.clone(), recipients));

    Ok((StatusCode::CREATED, Json(order)))
}

pub async fn get_order(State(state): State<AppState>, Path(order_id): Path<String>) -> Result<Json<Order>, ApiError> {
    Ok(Json(state.orders.get_order(&order_id).await?))
}

pub async fn update_order(
    State(state): State<AppState>,
    body: Result<Json<UpdateOrderRequest>, JsonRejection>,
) -> Result<Json<Order>, ApiError> {
    let Json(request) = body?;
    let (Some(order_id), Some(status)) = (request.order_id, request.status) else {
        return Err(ApiError::BadRequest("Missing orderId or status".to_string()));
    };
    let status: OrderStatus = status
        .parse()
        .map_err(|e: shared::ParseEnumError| ApiError::BadRequest(e.to_string()))?;

    let change = state.orders.update_status(&order_id, status).await?;

    let enabled = state.settings.get_settings().await.notifications.status_change_enabled;
    state
        .queue
        .enqueue(NotificationJob::status_changed(change.order.clone(), change.previous, enabled));

    Ok(Json(change.order))
}

pub async fn send_reminder(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.reminders.send_manual(&order_id).await?;
    Ok(Json(json!({ "success": true })))
}

pub async fn get_settings(State(state): State<AppState>) -> Json<Settings> {
    Json(state.settings.get_settings().await)
}

pub async fn update_settings(
    State(state): State<AppState>,
    body: Result<Json<SettingsUpdate>, JsonRejection>,
) -> Result<Json<Settings>, ApiError> {
    let Json(update) = body?;
    Ok(Json(state.settings.update_settings(update).await?))
}

pub async fn find_customer(State(state): State<AppState>, Query(query): Query<CustomerQuery>) -> Json<CustomerResponse> {
    let lookup = match (query.email, query.phone) {
        (Some(email), _) if !email.trim().is_empty() => CustomerLookup::Email(email.trim().to_string()),
        (_, Some(phone)) if !phone.trim().is_empty() => CustomerLookup::Phone(phone),
        _ => return Json(CustomerResponse { customer: None }),
    };
    Json(CustomerResponse {
        customer: state.orders.find_customer(lookup).await,
    })
}

pub async fn pickup_times(State(state): State<AppState>) -> Json<Vec<String>> {
    Json(available_pickup_slots(state.clock.local_now(), &state.hours).collect())
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailDiagnostics {
    pub resend_api_key: bool,
    pub enable_email_notifications: bool,
    pub from_email: String,
    pub from_name: String,
    pub reply_to: String,
    pub twilio_configured: bool,
    pub enable_sms_notifications: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestEmailResult {
    pub attempted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<SendReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestEmailResponse {
    pub diagnostics: EmailDiagnostics,
    pub test_email: TestEmailResult,
}

/// Reports the email configuration and, when it is complete, sends a sample
/// confirmation to the sender address.
pub async fn test_email(State(state): State<AppState>) -> Json<TestEmailResponse> {
    let diagnostics = EmailDiagnostics {
        resend_api_key: state.dispatcher.email_configured(),
        enable_email_notifications: state.dispatcher.channels().email,
        from_email: state.email.from_email.clone(),
        from_name: state.email.from_name.clone(),
        reply_to: state.email.reply_to.clone(),
        twilio_configured: state.dispatcher.sms_configured(),
        enable_sms_notifications: state.dispatcher.channels().sms,
    };

    let ready = diagnostics.resend_api_key
        && diagnostics.enable_email_notifications
        && !diagnostics.from_email.trim().is_empty();
    if !ready {
        return Json(TestEmailResponse {
            diagnostics,
            test_email: TestEmailResult {
                attempted: false,
                result: None,
                message: Some("Email configuration incomplete - cannot send test email".to_string()),
            },
        });
    }

    let order = diagnostic_order(&diagnostics.from_email, &state.clock);
    let outcome = state.dispatcher.send_confirmation_email(&order).await;
    info!(success = outcome.success(), "Sent test email");

    Json(TestEmailResponse {
        diagnostics,
        test_email: TestEmailResult {
            attempted: true,
            result: Some(SendReport::from(&outcome)),
            message: None,
        },
    })
}

fn diagnostic_order(to: &str, clock: &Clock) -> Order {
    let items = vec![OrderItem {
        product_id: "test-item".to_string(),
        name: "Test Item".to_string(),
        price: bigdecimal::BigDecimal::from(10),
        quantity: 1,
    }];
    Order {
        id: "test-order-123".to_string(),
        customer_name: "Test Customer".to_string(),
        email: to.to_string(),
        phone: "5551234567".to_string(),
        zip_code: "12345".to_string(),
        total: shared::compute_total(&items),
        items,
        pickup_time: "12:00 PM".to_string(),
        status: OrderStatus::Pending,
        notification_preference: NotificationPreference::Email,
        created_at: clock.now(),
        reminder_sent_at: None,
    }
}

pub async fn health_check() -> &'static str {
    "OK"
}
