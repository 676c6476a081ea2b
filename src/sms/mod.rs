//! SMS gateway adapter (AfricasTalking-style)
//!
//! The client keeps a long-lived reqwest connection pool for the real
//! endpoint, but every response in this demo is simulated; nothing reported
//! here reflects real delivery. `SmsNotifier` layers the message templates
//! and a send history on top.

pub mod phone;

use crate::config::SmsConfig;
use crate::models::{DeliveryReport, SmsOutcome};
use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use reqwest::Client;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
pub struct ApiStats {
    pub request_count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_request: Option<DateTime<Utc>>,
    pub mode: &'static str,
}

/// Thin client over the AfricasTalking messaging API.
pub struct AfricasTalkingClient {
    config: SmsConfig,
    #[allow(dead_code)]
    client: Client,
    stats: RwLock<ApiStats>,
}

impl AfricasTalkingClient {
    pub fn new(config: SmsConfig) -> Self {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(60))
            .pool_max_idle_per_host(8)
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();

        info!(
            "AfricasTalking client initialized - username: {}, mode: {}",
            config.username,
            if config.is_sandbox() { "sandbox" } else { "production" }
        );

        Self {
            config,
            client,
            stats: RwLock::new(ApiStats {
                request_count: 0,
                last_request: None,
                mode: "sandbox",
            }),
        }
    }

    async fn count_request(&self) {
        let mut stats = self.stats.write().await;
        stats.request_count += 1;
        stats.last_request = Some(Utc::now());
        stats.mode = if self.config.is_sandbox() {
            "sandbox"
        } else {
            "production"
        };
    }

    /// Send one SMS. The number is normalized to international format first.
    pub async fn send(&self, to: &str, message: &str, sender_id: Option<&str>) -> SmsOutcome {
        self.count_request().await;

        let to = phone::format_international(to, "KE");
        let sender = sender_id.unwrap_or(&self.config.sender_id);
        info!("Sending SMS to {} from {}: {:.50}", to, sender, message);

        // Simulated gateway response; a live integration would POST the
        // form payload to `config.base_url()/messaging` here.
        let message_id = format!("ATXid_{}", &Uuid::new_v4().simple().to_string()[..16]);
        let cost = ["KES 1.00", "KES 2.00", "KES 1.50"]
            .choose(&mut rand::thread_rng())
            .copied()
            .unwrap_or("KES 1.00");

        SmsOutcome {
            success: true,
            message_id: Some(message_id),
            status: "sent".to_string(),
            cost: Some(cost.to_string()),
            recipient: to,
            error: None,
        }
    }

    pub async fn send_bulk(
        &self,
        recipients: &[String],
        message: &str,
        sender_id: Option<&str>,
    ) -> Vec<SmsOutcome> {
        let mut results = Vec::with_capacity(recipients.len());
        for recipient in recipients {
            results.push(self.send(recipient, message, sender_id).await);
        }
        results
    }

    /// Delivery report for a previously sent message (simulated).
    pub async fn delivery_report(&self, message_id: &str) -> DeliveryReport {
        self.count_request().await;

        let status = ["Success", "Pending", "Failed", "Delivered"]
            .choose(&mut rand::thread_rng())
            .copied()
            .unwrap_or("Pending");

        DeliveryReport {
            message_id: message_id.to_string(),
            status: status.to_string(),
            delivered_at: matches!(status, "Success" | "Delivered").then(Utc::now),
            failure_reason: (status == "Failed").then(|| "Network error".to_string()),
        }
    }

    /// Gateway account balance (simulated).
    pub async fn account_balance(&self) -> Value {
        self.count_request().await;
        let amount = rand::thread_rng().gen_range(100..=1000);
        json!({
            "balance": format!("KES {}.00", amount),
            "username": self.config.username,
        })
    }

    pub async fn api_stats(&self) -> ApiStats {
        self.stats.read().await.clone()
    }
}

//
// ================= Message Templates =================
//

pub mod templates {
    use chrono::Local;

    pub fn stock_purchase_confirmation(
        stock_name: &str,
        quantity: u32,
        price: f64,
        transaction_id: &str,
    ) -> String {
        format!(
            "STOCK PURCHASE CONFIRMED\nStock: {}\nQty: {} shares\nAmount: KES {:.2}\nRef: {}\nTokens will be sent to your Hedera account.",
            stock_name, quantity, price, transaction_id
        )
    }

    pub fn token_transfer_notification(
        amount: u64,
        recipient_account: &str,
        transaction_id: &str,
    ) -> String {
        let short_id: String = transaction_id.chars().take(16).collect();
        format!(
            "TOKEN TRANSFER COMPLETE\nAmount: {} tokens\nTo: {}\nTxID: {}...\nCheck your Hedera wallet for confirmation.",
            amount, recipient_account, short_id
        )
    }

    pub fn mpesa_confirmation(
        amount: f64,
        recipient: &str,
        balance: f64,
        transaction_id: &str,
    ) -> String {
        let timestamp = Local::now().format("%d/%m/%y at %I:%M %p");
        format!(
            "{} Confirmed. Ksh{:.2} sent to {} on {}. New M-pesa balance is Ksh{:.2}. Transaction cost, Ksh0.00.",
            transaction_id, amount, recipient, timestamp, balance
        )
    }
}

//
// ================= Notification Service =================
//

#[derive(Debug, Clone, Serialize)]
pub struct SentMessage {
    #[serde(rename = "type")]
    pub kind: String,
    pub recipient: String,
    pub message: String,
    pub result: SmsOutcome,
    pub timestamp: DateTime<Utc>,
}

/// High-level notification service: applies templates, sends via the gateway
/// client, and keeps a history of everything sent.
pub struct SmsNotifier {
    client: Arc<AfricasTalkingClient>,
    history: RwLock<Vec<SentMessage>>,
}

impl SmsNotifier {
    pub fn new(client: Arc<AfricasTalkingClient>) -> Self {
        Self {
            client,
            history: RwLock::new(Vec::new()),
        }
    }

    pub fn client(&self) -> &Arc<AfricasTalkingClient> {
        &self.client
    }

    async fn send_and_log(
        &self,
        kind: &str,
        recipient: &str,
        message: String,
        sender_id: &str,
    ) -> SmsOutcome {
        let result = self.client.send(recipient, &message, Some(sender_id)).await;

        self.history.write().await.push(SentMessage {
            kind: kind.to_string(),
            recipient: recipient.to_string(),
            message,
            result: result.clone(),
            timestamp: Utc::now(),
        });

        info!(
            "{} SMS sent to {} - success: {}",
            kind, recipient, result.success
        );
        result
    }

    pub async fn notify_stock_purchase(
        &self,
        recipient_phone: &str,
        stock_name: &str,
        quantity: u32,
        price: f64,
        transaction_id: &str,
    ) -> SmsOutcome {
        let message =
            templates::stock_purchase_confirmation(stock_name, quantity, price, transaction_id);
        self.send_and_log("stock_purchase", recipient_phone, message, "STOCKS")
            .await
    }

    pub async fn notify_token_transfer(
        &self,
        recipient_phone: &str,
        amount: u64,
        recipient_account: &str,
        transaction_id: &str,
    ) -> SmsOutcome {
        let message =
            templates::token_transfer_notification(amount, recipient_account, transaction_id);
        self.send_and_log("token_transfer", recipient_phone, message, "HBAR")
            .await
    }

    pub async fn send_mpesa_confirmation(
        &self,
        recipient_phone: &str,
        amount: f64,
        recipient_name: &str,
        balance: f64,
        transaction_id: &str,
    ) -> SmsOutcome {
        let message =
            templates::mpesa_confirmation(amount, recipient_name, balance, transaction_id);
        self.send_and_log("mpesa_confirmation", recipient_phone, message, "MPESA")
            .await
    }

    /// Recent send history, oldest first.
    pub async fn message_history(&self, limit: usize) -> Vec<SentMessage> {
        let history = self.history.read().await;
        let start = history.len().saturating_sub(limit);
        history[start..].to_vec()
    }

    pub async fn delivery_status(&self, message_id: &str) -> DeliveryReport {
        self.client.delivery_report(message_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_client() -> Arc<AfricasTalkingClient> {
        Arc::new(AfricasTalkingClient::new(SmsConfig {
            username: "sandbox".to_string(),
            api_key: "test_key".to_string(),
            sender_id: "TEXTAHBAR".to_string(),
        }))
    }

    #[tokio::test]
    async fn send_normalizes_number_and_returns_message_id() {
        let client = test_client();
        let outcome = client.send("0712345678", "hello", None).await;

        assert!(outcome.success);
        assert_eq!(outcome.recipient, "+254712345678");
        assert!(outcome.message_id.as_deref().unwrap().starts_with("ATXid_"));
        assert_eq!(outcome.status, "sent");
    }

    #[tokio::test]
    async fn requests_are_counted() {
        let client = test_client();
        client.send("0712345678", "one", None).await;
        client.send("0712345678", "two", None).await;
        client.delivery_report("ATXid_abc").await;

        let stats = client.api_stats().await;
        assert_eq!(stats.request_count, 3);
        assert!(stats.last_request.is_some());
        assert_eq!(stats.mode, "sandbox");
    }

    #[tokio::test]
    async fn notifier_keeps_history() {
        let notifier = SmsNotifier::new(test_client());

        notifier
            .notify_stock_purchase("+254712345678", "Safaricom PLC", 5, 112.50, "STOCK_ABC123")
            .await;
        notifier
            .notify_token_transfer("+254712345678", 5, "0.0.5005", "0.0.1234@17000.5")
            .await;

        let history = notifier.message_history(10).await;
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].kind, "stock_purchase");
        assert!(history[0].message.contains("Safaricom PLC"));
        assert!(history[0].message.contains("KES 112.50"));
        assert_eq!(history[1].kind, "token_transfer");
    }

    #[test]
    fn mpesa_template_carries_amount_and_balance() {
        let text = templates::mpesa_confirmation(112.50, "Safaricom PLC", 287.50, "TJTGAB12CD");
        assert!(text.starts_with("TJTGAB12CD Confirmed."));
        assert!(text.contains("Ksh112.50 sent to Safaricom PLC"));
        assert!(text.contains("New M-pesa balance is Ksh287.50"));
    }
}
