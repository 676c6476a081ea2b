//! REST API server for the TextAHBAR trading gateway
//!
//! Exposes the chat interpreter, SMS gateway, token ledger, and transaction
//! log over HTTP. Integrates with the frontend UI.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use uuid::Uuid;

use crate::audit::TransactionLog;
use crate::chat::{ChatRouter, InboundMessage};
use crate::config::GatewayConfig;
use crate::hedera::{self, TokenLedger};
use crate::models::ChatReply;
use crate::sms::{phone, SmsNotifier};
use crate::state::{PurchaseTracker, DEFAULT_SESSION};
use crate::stocks;

/// =============================
/// Request Models
/// =============================

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    pub convo_id: Option<String>,
    pub recipient_name: Option<String>,
    pub recipient_number: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PinRequest {
    #[serde(default)]
    pub pin: String,
}

#[derive(Debug, Deserialize)]
pub struct TestSmsRequest {
    pub phone: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PhoneValidateRequest {
    #[serde(default)]
    pub phone_number: String,
}

#[derive(Debug, Deserialize)]
pub struct BuyStockRequest {
    pub ticker: Option<String>,
    pub quantity: Option<u32>,
    pub phone_number: Option<String>,
    pub hedera_account: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SendSmsRequest {
    pub to: Option<String>,
    pub message: Option<String>,
    pub sender_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TransferRequest {
    pub to_account: Option<String>,
    pub amount: Option<u64>,
    pub memo: Option<String>,
    pub notify_phone: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TransactionsQuery {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub limit: Option<usize>,
}

/// =============================
/// Response Wrapper
/// =============================

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse {
    pub success: bool,
    pub data: Option<Value>,
    pub error: Option<String>,
    pub timestamp: String,
}

impl ApiResponse {
    pub fn success<T: Serialize>(data: T) -> Self {
        Self {
            success: true,
            data: serde_json::to_value(data).ok(),
            error: None,
            timestamp: Utc::now().to_rfc3339(),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

/// =============================
/// API State
/// =============================

#[derive(Clone)]
pub struct AppState {
    pub chat: Arc<ChatRouter>,
    pub tracker: Arc<dyn PurchaseTracker>,
    pub ledger: Arc<dyn TokenLedger>,
    pub notifier: Arc<SmsNotifier>,
    pub log: Arc<TransactionLog>,
    pub config: Arc<GatewayConfig>,
    pub started_at: DateTime<Utc>,
}

/// =============================
/// Service Info
/// =============================

async fn index() -> Json<Value> {
    Json(json!({
        "service": "TextAHBAR API",
        "version": "2.0.0",
        "description": "SMS-enabled HBAR trading platform with AfricasTalking integration",
        "features": [
            "SMS notifications via AfricasTalking API",
            "Hedera HBAR token transfers",
            "Stock trading with instant notifications",
            "M-PESA payment simulation",
            "AI-powered chat responses",
            "Phone number validation and formatting",
            "Transaction logging and reporting"
        ],
        "endpoints": {
            "chat": "/api/chat - Send chat messages",
            "sms": "/api/sms - SMS operations",
            "stocks": "/api/stocks - Stock trading",
            "hedera": "/api/hedera - HBAR operations",
            "dashboard": "/api/dashboard - Service status",
            "docs": "/api/docs - API documentation"
        },
        "status": "operational",
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

async fn api_docs() -> Json<Value> {
    Json(json!({
        "TextAHBAR API Documentation": {
            "version": "2.0.0",
            "content_type": "application/json"
        },
        "endpoints": {
            "/api/chat": {
                "method": "POST",
                "description": "Send chat messages to AI assistants",
                "parameters": {
                    "message": "string - The message to send",
                    "convo_id": "string - Conversation identifier",
                    "recipient_name": "string - Persona label (Stock Trader, Kamba Bot, ...)",
                    "recipient_number": "string - Display number of the persona"
                },
                "example": {
                    "message": "What is the price of Safaricom stock?",
                    "recipient_name": "Stock Trader"
                }
            },
            "/enter_pin": {
                "method": "POST",
                "description": "Confirm a pending M-PESA STK push",
                "parameters": { "pin": "string - Mobile money PIN" }
            },
            "/api/sms/send": {
                "method": "POST",
                "description": "Send SMS messages via AfricasTalking",
                "parameters": {
                    "to": "string - Recipient phone number",
                    "message": "string - SMS content",
                    "sender_id": "string - Optional sender ID"
                }
            },
            "/api/stocks/list": {
                "method": "GET",
                "description": "Get list of available stocks"
            },
            "/api/stocks/price/{ticker}": {
                "method": "GET",
                "description": "Get stock price",
                "parameters": { "ticker": "string - Stock ticker symbol" }
            },
            "/api/stocks/buy": {
                "method": "POST",
                "description": "Purchase stocks with HBAR token delivery",
                "parameters": {
                    "ticker": "string - Stock ticker",
                    "quantity": "integer - Number of shares",
                    "phone_number": "string - For SMS notifications",
                    "hedera_account": "string - Hedera account for token delivery"
                }
            },
            "/api/hedera/balance/{account_id}": {
                "method": "GET",
                "description": "Get Hedera account balance"
            },
            "/api/hedera/transfer": {
                "method": "POST",
                "description": "Transfer HBAR tokens",
                "parameters": {
                    "to_account": "string - Recipient Hedera account",
                    "amount": "integer - Token amount",
                    "memo": "string - Transaction memo",
                    "notify_phone": "string - Phone for SMS notification"
                }
            },
            "/api/transactions": {
                "method": "GET",
                "description": "Transaction history",
                "parameters": {
                    "type": "string - Filter by transaction type",
                    "limit": "integer - Max entries (default 50)"
                }
            }
        },
        "response_format": {
            "success": "boolean - Operation success status",
            "data": "object - Response data",
            "error": "string - Error message when success is false",
            "timestamp": "string - ISO timestamp"
        },
        "error_codes": {
            "400": "Bad Request - Invalid parameters",
            "404": "Not Found - Unknown resource",
            "500": "Internal Server Error - Server error"
        }
    }))
}

/// =============================
/// Chat + Payment Flow
/// =============================

async fn chat_handler(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Json<ChatReply> {
    let inbound = InboundMessage {
        session_id: DEFAULT_SESSION.to_string(),
        convo_id: request.convo_id.unwrap_or_else(|| "default".to_string()),
        recipient_name: request
            .recipient_name
            .unwrap_or_else(|| "Unknown Recipient".to_string()),
        recipient_number: request
            .recipient_number
            .unwrap_or_else(|| "Unknown Number".to_string()),
        message: request.message,
    };

    info!(
        "Received message for convo_id: {}, recipient: {}",
        inbound.convo_id, inbound.recipient_name
    );

    match state.chat.handle(inbound).await {
        Ok(reply) => Json(reply),
        Err(e) => {
            warn!("Chat handling failed: {}", e);
            Json(ChatReply::text(
                "Sorry, I am having trouble connecting to the AI at the moment.",
            ))
        }
    }
}

async fn enter_pin(
    State(state): State<AppState>,
    Json(request): Json<PinRequest>,
) -> Response {
    info!("PIN entered. Processing STK push.");

    if request.pin != "0000" {
        return Json(json!({
            "status": "error",
            "message": "Incorrect PIN. Transaction failed."
        }))
        .into_response();
    }

    // Simulated processing delay before the confirmation lands.
    tokio::time::sleep(Duration::from_secs(1)).await;

    let confirmation = match state.tracker.take_confirmation(DEFAULT_SESSION).await {
        Ok(Some(confirmation)) => confirmation,
        Ok(None) => {
            return Json(json!({
                "status": "error",
                "message": "No pending M-PESA transaction."
            }))
            .into_response();
        }
        Err(e) => return internal_error(e).into_response(),
    };

    let congrats_message = match state.tracker.confirm_purchase(DEFAULT_SESSION).await {
        Ok(Some(purchase)) => format!(
            "Payment confirmed (simulated). You purchased {} unit(s) of {}. \
             Please enter your Hedera account ID (format: 0.x.y) so we can deliver your token.",
            purchase.quantity, purchase.stock_name
        ),
        Ok(None) => "Payment confirmed (simulated). No pending purchase found - if you \
                     intended to buy stock, please start a new order."
            .to_string(),
        Err(e) => return internal_error(e).into_response(),
    };

    Json(json!({
        "status": "success",
        "type": "mpesa_confirmation_available",
        "confirmation_message": confirmation.message,
        "sender": confirmation.sender_label,
        "congrats_message": congrats_message,
    }))
    .into_response()
}

/// =============================
/// Service Status
/// =============================

async fn sms_status(State(state): State<AppState>) -> Json<Value> {
    let client = state.notifier.client();
    let api_stats = client.api_stats().await;
    let history = state.notifier.message_history(10).await;
    let balance_info = client.account_balance().await;

    let recent: Vec<_> = history.iter().rev().take(5).rev().collect();

    Json(json!({
        "service_status": "active",
        "api_stats": api_stats,
        "recent_messages": history.len(),
        "message_history": recent,
        "balance_info": balance_info,
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

async fn send_test_sms(
    State(state): State<AppState>,
    Json(request): Json<TestSmsRequest>,
) -> Response {
    let phone = request
        .phone
        .unwrap_or_else(|| "+254700000000".to_string());
    let message = request
        .message
        .unwrap_or_else(|| "Test message from TextAHBAR app".to_string());

    let result = state.notifier.client().send(&phone, &message, None).await;

    if let Err(e) = state
        .log
        .record(
            "sms",
            json!({
                "to": result.recipient.clone(),
                "message": message,
                "message_id": result.message_id.clone(),
                "success": result.success,
            }),
        )
        .await
    {
        return internal_error(e).into_response();
    }

    Json(json!({
        "test_result": result,
        "timestamp": Utc::now().to_rfc3339(),
    }))
    .into_response()
}

async fn hedera_status(State(state): State<AppState>) -> Json<Value> {
    let balance_info = state.ledger.balance(None).await;
    let recent = state.ledger.recent_transfers(5).await;
    let report = state.config.report();

    Json(json!({
        "network": state.ledger.network(),
        "account_id": state.ledger.operator_account(),
        "token_id": state.ledger.token_id(),
        "balance_info": balance_info,
        "recent_transactions": recent,
        "config_validation": report.validation,
        "service_status": if report.all_valid { "active" } else { "configuration_error" },
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

async fn api_dashboard(State(state): State<AppState>) -> Json<Value> {
    let report = state.config.report();
    let transactions = state.log.query(None, 100).await;

    let count_kind = |kind: &str| transactions.iter().filter(|tx| tx.kind == kind).count();
    let recent: Vec<_> = transactions.iter().rev().take(10).rev().collect();

    let transaction_stats = json!({
        "total_transactions": transactions.len(),
        "sms_transactions": count_kind("sms"),
        "stock_purchases": count_kind("stock_purchase"),
        "mpesa_payments": count_kind("mpesa_payment"),
        "token_transfers": count_kind("token_transfer"),
        "recent_activity": recent,
    });

    let sms_history = state.notifier.message_history(50).await;
    let sms_stats = json!({
        "service_enabled": true,
        "recent_messages": sms_history.len(),
        "africastalking_mode": report.environment_summary.africastalking_mode,
    });

    let hedera_stats = json!({
        "network": state.ledger.network(),
        "account_id": state.ledger.operator_account(),
        "token_id": state.ledger.token_id(),
        "service_enabled": report.all_valid,
    });

    Json(json!({
        "application": {
            "name": "TextAHBAR",
            "version": "2.0.0",
            "uptime_start": state.started_at.to_rfc3339(),
            "status": "operational",
        },
        "configuration": report,
        "statistics": {
            "transactions": transaction_stats,
            "sms": sms_stats,
            "hedera": hedera_stats,
        },
        "services": {
            "sms_service": "active",
            "hedera_service": if report.all_valid { "active" } else { "inactive" },
            "stock_trading": "active",
            "ai_chat": "active",
        },
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

/// =============================
/// Phone Utilities
/// =============================

async fn validate_phone(Json(request): Json<PhoneValidateRequest>) -> Json<Value> {
    let number = request.phone_number;
    let validation = phone::validate(&number);
    let formatted = phone::format_international(&number, "KE");
    let network = phone::identify_kenyan_network(&number);
    let display_format = phone::format_display(&number);

    let sample_message = "Test message from TextAHBAR";
    let cost_info = phone::calculate_cost(&number, sample_message.len());

    Json(json!({
        "original": number,
        "formatted": formatted,
        "display_format": display_format,
        "validation": validation,
        "network": network,
        "cost_estimate": cost_info,
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

/// =============================
/// Stocks
/// =============================

async fn stocks_list() -> (StatusCode, Json<ApiResponse>) {
    (
        StatusCode::OK,
        Json(ApiResponse::success(json!({
            "stocks": &*stocks::KENYA_STOCKS,
            "total_count": stocks::KENYA_STOCKS.len(),
            "market": "Nairobi Securities Exchange (NSE)",
        }))),
    )
}

async fn stock_price(Path(ticker): Path<String>) -> (StatusCode, Json<ApiResponse>) {
    match stocks::find(&ticker) {
        Some(stock) => (
            StatusCode::OK,
            Json(ApiResponse::success(json!({
                "stock": stock,
                "advice": stocks::advice(stock),
                "market_status": "open",
                "last_updated": Utc::now().to_rfc3339(),
            }))),
        ),
        None => (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::error(format!(
                "Stock ticker {} not found",
                ticker
            ))),
        ),
    }
}

async fn buy_stock(
    State(state): State<AppState>,
    Json(request): Json<BuyStockRequest>,
) -> Response {
    let mut missing = Vec::new();
    if request.ticker.as_deref().unwrap_or("").is_empty() {
        missing.push("ticker");
    }
    if request.quantity.is_none() {
        missing.push("quantity");
    }
    if request.phone_number.as_deref().unwrap_or("").is_empty() {
        missing.push("phone_number");
    }
    if request.hedera_account.as_deref().unwrap_or("").is_empty() {
        missing.push("hedera_account");
    }
    if !missing.is_empty() {
        return bad_request(format!("Missing required fields: {}", missing.join(", ")));
    }

    let ticker = request.ticker.unwrap_or_default().to_uppercase();
    let quantity = request.quantity.unwrap_or_default();
    let phone_number = request.phone_number.unwrap_or_default();
    let hedera_account = request.hedera_account.unwrap_or_default();

    if !hedera::validate_account_id(&hedera_account) {
        return bad_request("Invalid Hedera account ID format".to_string());
    }

    let Some(stock) = stocks::find(&ticker) else {
        return (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::error(format!(
                "Stock ticker {} not found",
                ticker
            ))),
        )
            .into_response();
    };

    let total_cost = stock.price * quantity as f64;
    let transaction_reference = format!(
        "STOCK_{}",
        Uuid::new_v4().simple().to_string()[..8].to_uppercase()
    );

    info!(
        "Processing stock purchase: {} {} for {}",
        quantity, stock.name, phone_number
    );

    let memo = format!("Stock purchase: {} {}", quantity, stock.name);
    let transfer = state.ledger.transfer(&hedera_account, quantity as u64, &memo).await;

    let mut sms_notifications = Vec::new();
    if transfer.success {
        let transfer_id = transfer.transaction_id.clone().unwrap_or_default();
        sms_notifications.push(
            state
                .notifier
                .notify_stock_purchase(
                    &phone_number,
                    &stock.name,
                    quantity,
                    total_cost,
                    &transaction_reference,
                )
                .await,
        );
        sms_notifications.push(
            state
                .notifier
                .notify_token_transfer(&phone_number, quantity as u64, &hedera_account, &transfer_id)
                .await,
        );
    }

    if let Err(e) = state
        .log
        .record(
            "stock_purchase",
            json!({
                "transaction_reference": transaction_reference,
                "stock_name": stock.name,
                "quantity": quantity,
                "total_cost": total_cost,
                "recipient_account": hedera_account,
                "hedera_transaction_id": transfer.transaction_id.clone(),
                "success": transfer.success,
            }),
        )
        .await
    {
        return internal_error(e).into_response();
    }

    let message = if transfer.success {
        "Stock purchase completed successfully"
    } else {
        "Stock purchase failed"
    };

    Json(json!({
        "success": transfer.success,
        "data": {
            "transaction_reference": transaction_reference,
            "stock": stock,
            "quantity": quantity,
            "total_cost": total_cost,
            "hedera_transaction": transfer,
            "sms_notifications": sms_notifications,
        },
        "message": message,
        "timestamp": Utc::now().to_rfc3339(),
    }))
    .into_response()
}

/// =============================
/// SMS
/// =============================

async fn send_sms(
    State(state): State<AppState>,
    Json(request): Json<SendSmsRequest>,
) -> Response {
    let (Some(to), Some(message)) = (request.to, request.message) else {
        return bad_request("Missing required fields: to, message".to_string());
    };
    if to.is_empty() || message.is_empty() {
        return bad_request("Missing required fields: to, message".to_string());
    }

    let validation = phone::validate(&to);
    if !validation.is_valid {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "success": false,
                "error": "Invalid phone number format",
                "validation": validation,
                "timestamp": Utc::now().to_rfc3339(),
            })),
        )
            .into_response();
    }

    let cost_info = phone::calculate_cost(&to, message.len());
    let result = state
        .notifier
        .client()
        .send(&to, &message, request.sender_id.as_deref())
        .await;

    if let Err(e) = state
        .log
        .record(
            "sms",
            json!({
                "to": result.recipient.clone(),
                "message": message,
                "message_id": result.message_id.clone(),
                "cost": result.cost.clone(),
                "success": result.success,
            }),
        )
        .await
    {
        return internal_error(e).into_response();
    }

    Json(json!({
        "success": result.success,
        "data": {
            "message_id": result.message_id,
            "recipient": result.recipient,
            "cost_info": cost_info,
            "delivery_status": result.status,
        },
        "message": if result.success { "SMS sent successfully" } else { "SMS sending failed" },
        "error": result.error,
        "timestamp": Utc::now().to_rfc3339(),
    }))
    .into_response()
}

/// =============================
/// Hedera
/// =============================

async fn hedera_balance(
    State(state): State<AppState>,
    Path(account_id): Path<String>,
) -> Response {
    if !hedera::validate_account_id(&account_id) {
        return bad_request("Invalid Hedera account ID format".to_string());
    }

    let balance_info = state.ledger.balance(Some(&account_id)).await;

    Json(json!({
        "success": balance_info.success,
        "data": balance_info,
        "timestamp": Utc::now().to_rfc3339(),
    }))
    .into_response()
}

async fn hedera_transfer(
    State(state): State<AppState>,
    Json(request): Json<TransferRequest>,
) -> Response {
    let mut missing = Vec::new();
    if request.to_account.as_deref().unwrap_or("").is_empty() {
        missing.push("to_account");
    }
    if request.amount.is_none() {
        missing.push("amount");
    }
    if !missing.is_empty() {
        return bad_request(format!("Missing required fields: {}", missing.join(", ")));
    }

    let to_account = request.to_account.unwrap_or_default();
    let amount = request.amount.unwrap_or_default();
    let memo = request
        .memo
        .unwrap_or_else(|| "API token transfer".to_string());

    if !hedera::validate_account_id(&to_account) {
        return bad_request("Invalid recipient Hedera account ID format".to_string());
    }

    let transfer = state.ledger.transfer(&to_account, amount, &memo).await;

    let mut sms_notification = None;
    if transfer.success {
        if let Some(notify_phone) = request.notify_phone.as_deref() {
            let transfer_id = transfer.transaction_id.clone().unwrap_or_default();
            sms_notification = Some(
                state
                    .notifier
                    .notify_token_transfer(notify_phone, amount, &to_account, &transfer_id)
                    .await,
            );
        }
    }

    if let Err(e) = state
        .log
        .record(
            "token_transfer",
            json!({
                "to_account": to_account,
                "amount": amount,
                "memo": memo,
                "transaction_id": transfer.transaction_id.clone(),
                "error": transfer.error.clone(),
                "success": transfer.success,
            }),
        )
        .await
    {
        return internal_error(e).into_response();
    }

    Json(json!({
        "success": transfer.success,
        "data": {
            "transfer": transfer,
            "sms_notification": sms_notification,
        },
        "message": if transfer.success { "Token transfer completed" } else { "Token transfer failed" },
        "timestamp": Utc::now().to_rfc3339(),
    }))
    .into_response()
}

/// =============================
/// Transactions
/// =============================

async fn transactions(
    State(state): State<AppState>,
    Query(query): Query<TransactionsQuery>,
) -> Json<Value> {
    let limit = query.limit.unwrap_or(50);
    let entries = state.log.query(query.kind.as_deref(), limit).await;

    let successful = entries.iter().filter(|tx| tx.status).count();
    let mut by_type: BTreeMap<String, usize> = BTreeMap::new();
    for tx in &entries {
        *by_type.entry(tx.kind.clone()).or_insert(0) += 1;
    }

    Json(json!({
        "success": true,
        "data": {
            "transactions": entries,
            "statistics": {
                "total_transactions": entries.len(),
                "successful_transactions": successful,
                "failed_transactions": entries.len() - successful,
                "transaction_types": by_type,
            },
            "filters": {
                "type": query.kind,
                "limit": limit,
            },
        },
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

async fn sms_webhook(
    State(state): State<AppState>,
    Json(payload): Json<Value>,
) -> Response {
    info!("SMS webhook received: {}", payload);

    let message_id = payload
        .get("id")
        .and_then(Value::as_str)
        .map(str::to_string);
    let status = payload
        .get("status")
        .and_then(Value::as_str)
        .unwrap_or("unknown")
        .to_string();

    if let Some(message_id) = message_id {
        let delivered = matches!(status.to_lowercase().as_str(), "success" | "delivered");
        if let Err(e) = state
            .log
            .record(
                "sms_delivery_report",
                json!({
                    "message_id": message_id,
                    "delivery_status": status,
                    "webhook_data": payload,
                    "success": delivered,
                }),
            )
            .await
        {
            return internal_error(e).into_response();
        }
    }

    Json(json!({
        "success": true,
        "message": "Webhook processed successfully",
        "timestamp": Utc::now().to_rfc3339(),
    }))
    .into_response()
}

/// =============================
/// Helpers
/// =============================

fn bad_request(message: String) -> Response {
    (StatusCode::BAD_REQUEST, Json(ApiResponse::error(message))).into_response()
}

fn internal_error(e: crate::error::GatewayError) -> (StatusCode, Json<ApiResponse>) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ApiResponse::error(e.to_string())),
    )
}

/// =============================
/// Router
/// =============================

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api/docs", get(api_docs))
        .route("/api/chat", post(chat_handler))
        .route("/enter_pin", post(enter_pin))
        .route("/sms_status", get(sms_status))
        .route("/send_test_sms", post(send_test_sms))
        .route("/hedera_status", get(hedera_status))
        .route("/api/dashboard", get(api_dashboard))
        .route("/api/phone/validate", post(validate_phone))
        .route("/api/stocks/list", get(stocks_list))
        .route("/api/stocks/price/:ticker", get(stock_price))
        .route("/api/stocks/buy", post(buy_stock))
        .route("/api/sms/send", post(send_sms))
        .route("/api/hedera/balance/:account_id", get(hedera_balance))
        .route("/api/hedera/transfer", post(hedera_transfer))
        .route("/api/transactions", get(transactions))
        .route("/api/webhook/sms", post(sms_webhook))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// =============================
/// Server Startup
/// =============================

pub async fn start_server(
    state: AppState,
    port: u16,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!("API Server listening on http://0.0.0.0:{}", port);
    info!("Local: http://127.0.0.1:{}", port);

    axum::serve(listener, router).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bedrock::BedrockClient;
    use crate::chat::sessions::SessionStore;
    use crate::config::SmsConfig;
    use crate::hedera::SimulatedLedger;
    use crate::models::{PendingConfirmation, PendingPurchase};
    use crate::sms::AfricasTalkingClient;
    use crate::state::InMemoryTracker;

    fn test_state(dir: &tempfile::TempDir) -> AppState {
        let config = Arc::new(GatewayConfig::from_env());
        let tracker: Arc<dyn PurchaseTracker> = Arc::new(InMemoryTracker::new());
        let ledger: Arc<dyn TokenLedger> = Arc::new(SimulatedLedger::new(config.hedera.clone()));
        let notifier = Arc::new(SmsNotifier::new(Arc::new(AfricasTalkingClient::new(
            SmsConfig {
                username: "sandbox".to_string(),
                api_key: "test".to_string(),
                sender_id: "TEXTAHBAR".to_string(),
            },
        ))));
        let log = Arc::new(TransactionLog::open(dir.path().join("transactions.json")));
        let llm = Arc::new(BedrockClient::new(
            String::new(),
            "anthropic.claude-3-haiku-20240307-v1:0".to_string(),
            "us-east-1",
        ));

        let chat = Arc::new(ChatRouter::new(
            tracker.clone(),
            Arc::new(SessionStore::new()),
            ledger.clone(),
            notifier.clone(),
            log.clone(),
            llm,
        ));

        AppState {
            chat,
            tracker,
            ledger,
            notifier,
            log,
            config,
            started_at: Utc::now(),
        }
    }

    async fn seed_purchase(state: &AppState) {
        state
            .tracker
            .put_purchase(
                DEFAULT_SESSION,
                PendingPurchase {
                    ticker: "SAF".to_string(),
                    quantity: 5,
                    unit_price: 22.50,
                    total_amount: 112.50,
                    recipient_name: "Stock Trader".to_string(),
                    recipient_number: "40404".to_string(),
                    stock_name: "Safaricom PLC".to_string(),
                    mpesa_confirmed: false,
                },
            )
            .await
            .unwrap();
        state
            .tracker
            .put_confirmation(
                DEFAULT_SESSION,
                PendingConfirmation {
                    message: "TJTGAB12CD Confirmed.".to_string(),
                    sender_label: "M-PESA".to_string(),
                },
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn correct_pin_confirms_purchase() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(&dir);
        seed_purchase(&state).await;

        let response = enter_pin(
            State(state.clone()),
            Json(PinRequest {
                pin: "0000".to_string(),
            }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let purchase = state
            .tracker
            .pending_purchase(DEFAULT_SESSION)
            .await
            .unwrap()
            .expect("purchase kept");
        assert!(purchase.mpesa_confirmed);

        // Confirmation is consumed.
        assert!(state
            .tracker
            .take_confirmation(DEFAULT_SESSION)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn wrong_pin_leaves_state_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(&dir);
        seed_purchase(&state).await;

        let response = enter_pin(
            State(state.clone()),
            Json(PinRequest {
                pin: "1234".to_string(),
            }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let purchase = state
            .tracker
            .pending_purchase(DEFAULT_SESSION)
            .await
            .unwrap()
            .expect("purchase kept");
        assert!(!purchase.mpesa_confirmed);
        assert!(state
            .tracker
            .take_confirmation(DEFAULT_SESSION)
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn stock_price_404_for_unknown_ticker() {
        let (status, Json(body)) = stock_price(Path("TSLA".to_string())).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(!body.success);
        assert!(body.error.unwrap().contains("TSLA"));
    }

    #[tokio::test]
    async fn buy_rejects_missing_fields_and_bad_account() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(&dir);

        let response = buy_stock(
            State(state.clone()),
            Json(BuyStockRequest {
                ticker: Some("SAF".to_string()),
                quantity: None,
                phone_number: Some("+254712345678".to_string()),
                hedera_account: Some("0.0.5005".to_string()),
            }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = buy_stock(
            State(state),
            Json(BuyStockRequest {
                ticker: Some("SAF".to_string()),
                quantity: Some(2),
                phone_number: Some("+254712345678".to_string()),
                hedera_account: Some("not-an-account".to_string()),
            }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn send_sms_rejects_invalid_number() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(&dir);

        let response = send_sms(
            State(state),
            Json(SendSmsRequest {
                to: Some("12".to_string()),
                message: Some("hello".to_string()),
                sender_id: None,
            }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn balance_validates_account_format() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(&dir);

        let response = hedera_balance(State(state.clone()), Path("bogus".to_string())).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = hedera_balance(State(state), Path("0.0.5005".to_string())).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn webhook_logs_delivery_report() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(&dir);

        let response = sms_webhook(
            State(state.clone()),
            Json(json!({"id": "ATXid_abc123", "status": "Delivered"})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let entries = state.log.query(Some("sms_delivery_report"), 10).await;
        assert_eq!(entries.len(), 1);
        assert!(entries[0].status);
    }
}
