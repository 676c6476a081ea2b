//! Core data models for the trading gateway

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

//
// ================= Pending State =================
//

/// An in-flight stock purchase awaiting payment confirmation and token
/// delivery. Exactly one per session id; a new buy command overwrites it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingPurchase {
    pub ticker: String,
    pub quantity: u32,
    pub unit_price: f64,
    pub total_amount: f64,
    pub recipient_name: String,
    pub recipient_number: String,
    pub stock_name: String,
    pub mpesa_confirmed: bool,
}

/// A simulated M-PESA confirmation message waiting for the PIN-entry step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingConfirmation {
    pub message: String,
    pub sender_label: String,
}

//
// ================= Chat =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub text: String,
}

impl ChatTurn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            text: text.into(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            text: text.into(),
        }
    }
}

/// Typed reply from the chat interpreter. Either a plain chat reply or a
/// directive telling the client to raise the mobile-money PIN prompt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatReply {
    ChatReply {
        reply: String,
    },
    StkPrompt {
        amount: f64,
        recipient: String,
        recipient_number: String,
        prompt_message: String,
    },
}

impl ChatReply {
    pub fn text(reply: impl Into<String>) -> Self {
        ChatReply::ChatReply {
            reply: reply.into(),
        }
    }
}

//
// ================= Ledger =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LedgerNetwork {
    Testnet,
    Mainnet,
}

impl fmt::Display for LedgerNetwork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LedgerNetwork::Testnet => write!(f, "testnet"),
            LedgerNetwork::Mainnet => write!(f, "mainnet"),
        }
    }
}

/// Result of a debit/credit token transfer attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub recipient: String,
    pub amount: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memo: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explorer_url: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceInfo {
    pub success: bool,
    pub account_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hbar_balance: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_balance: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

//
// ================= SMS =================
//

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmsOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost: Option<String>,
    pub recipient: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryReport {
    pub message_id: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivered_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
}

//
// ================= Transaction Log =================
//

/// One append-only transaction log entry. The `data` payload is free-form;
/// `status` mirrors the payload's `success` flag at record time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub transaction_id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub timestamp: DateTime<Utc>,
    pub data: serde_json::Value,
    pub status: bool,
}
