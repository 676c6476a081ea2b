//! Token transfer adapter for the Hedera-style ledger
//!
//! The gateway performs a debit/credit pair on a shared operator account and
//! token. The demo ships the simulated ledger the way the original service
//! ran without SDK credentials: artificial delay, 90% success, canned failure
//! reasons. `TokenLedger` is the seam where a real network client would go.

use crate::config::HederaConfig;
use crate::models::{BalanceInfo, LedgerNetwork, TransferOutcome};
use chrono::Utc;
use lazy_static::lazy_static;
use rand::Rng;
use regex::Regex;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{error, info};

lazy_static! {
    // Ledger account id: three dot-separated numeric segments, leading "0".
    static ref ACCOUNT_ID_RE: Regex = Regex::new(r"^0\.\d+\.\d+$").expect("valid account id regex");
}

/// Validate a ledger account id of the form `0.X.Y`.
pub fn validate_account_id(account_id: &str) -> bool {
    ACCOUNT_ID_RE.is_match(account_id)
}

const FAILURE_REASONS: &[&str] = &[
    "Insufficient token balance",
    "Account not associated with token",
    "Network congestion",
    "Invalid recipient account",
];

#[async_trait::async_trait]
pub trait TokenLedger: Send + Sync {
    /// Transfer `amount` tokens to `recipient`, returning success with a
    /// transaction id and status, or failure with a reason.
    async fn transfer(&self, recipient: &str, amount: u64, memo: &str) -> TransferOutcome;

    /// Query HBAR and token balance for an account (operator account when
    /// `account_id` is `None`).
    async fn balance(&self, account_id: Option<&str>) -> BalanceInfo;

    /// Recent transfer attempts, oldest first.
    async fn recent_transfers(&self, limit: usize) -> Vec<TransferOutcome>;

    fn network(&self) -> LedgerNetwork;

    fn operator_account(&self) -> &str;

    fn token_id(&self) -> &str;
}

/// Simulated ledger used when no real network credentials are present.
pub struct SimulatedLedger {
    config: HederaConfig,
    history: RwLock<Vec<TransferOutcome>>,
}

impl SimulatedLedger {
    pub fn new(config: HederaConfig) -> Self {
        info!(
            "Ledger adapter in simulation mode - network: {}, account: {}",
            config.network, config.account_id
        );
        Self {
            config,
            history: RwLock::new(Vec::new()),
        }
    }

    fn explorer_url(&self, transaction_id: &str) -> String {
        match self.config.network {
            LedgerNetwork::Mainnet => {
                format!("https://hashscan.io/mainnet/transaction/{}", transaction_id)
            }
            LedgerNetwork::Testnet => {
                format!("https://hashscan.io/testnet/transaction/{}", transaction_id)
            }
        }
    }

    fn mock_transaction_id() -> String {
        let mut rng = rand::thread_rng();
        format!(
            "0.0.{}@{}.{}",
            rng.gen_range(1000..10000),
            Utc::now().timestamp(),
            rng.gen_range(100_000_000..1_000_000_000u64)
        )
    }
}

#[async_trait::async_trait]
impl TokenLedger for SimulatedLedger {
    async fn transfer(&self, recipient: &str, amount: u64, memo: &str) -> TransferOutcome {
        let memo = format!("{}{}", self.config.memo_prefix, memo);
        info!("Initiating token transfer: {} tokens to {}", amount, recipient);

        // Processing delay; rng must not be held across the await.
        let delay_ms = rand::thread_rng().gen_range(1_000..=3_000);
        tokio::time::sleep(Duration::from_millis(delay_ms)).await;

        let succeeded = rand::thread_rng().gen_bool(0.9);

        let outcome = if succeeded {
            let transaction_id = Self::mock_transaction_id();
            info!(
                "Token transfer complete: {} tokens to {} - TX {}",
                amount, recipient, transaction_id
            );
            TransferOutcome {
                success: true,
                explorer_url: Some(self.explorer_url(&transaction_id)),
                transaction_id: Some(transaction_id),
                status: Some("SUCCESS".to_string()),
                error: None,
                recipient: recipient.to_string(),
                amount,
                memo: Some(memo),
                timestamp: Utc::now(),
            }
        } else {
            let reason = {
                let mut rng = rand::thread_rng();
                FAILURE_REASONS[rng.gen_range(0..FAILURE_REASONS.len())]
            };
            error!("Token transfer failed: {}", reason);
            TransferOutcome {
                success: false,
                transaction_id: None,
                status: None,
                error: Some(reason.to_string()),
                recipient: recipient.to_string(),
                amount,
                memo: Some(memo),
                explorer_url: None,
                timestamp: Utc::now(),
            }
        };

        self.history.write().await.push(outcome.clone());
        outcome
    }

    async fn balance(&self, account_id: Option<&str>) -> BalanceInfo {
        let target = account_id.unwrap_or(&self.config.account_id).to_string();
        let (hbar, tokens) = {
            let mut rng = rand::thread_rng();
            (
                (rng.gen_range(10.0..1000.0) * 100.0f64).round() / 100.0,
                rng.gen_range(0..=10_000u64),
            )
        };

        BalanceInfo {
            success: true,
            account_id: target,
            hbar_balance: Some(format!("{:.2} HBAR", hbar)),
            token_balance: Some(tokens),
            token_id: Some(self.config.token_id.clone()),
            error: None,
            timestamp: Utc::now(),
        }
    }

    async fn recent_transfers(&self, limit: usize) -> Vec<TransferOutcome> {
        let history = self.history.read().await;
        let start = history.len().saturating_sub(limit);
        history[start..].to_vec()
    }

    fn network(&self) -> LedgerNetwork {
        self.config.network
    }

    fn operator_account(&self) -> &str {
        &self.config.account_id
    }

    fn token_id(&self) -> &str {
        &self.config.token_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> HederaConfig {
        HederaConfig {
            account_id: "0.0.1001".to_string(),
            private_key: String::new(),
            token_id: "0.0.2001".to_string(),
            network: LedgerNetwork::Testnet,
            memo_prefix: "TextAHBAR-".to_string(),
        }
    }

    #[test]
    fn account_id_format() {
        assert!(validate_account_id("0.0.1234"));
        assert!(validate_account_id("0.12.7055059"));
        assert!(!validate_account_id("1.0.1234"));
        assert!(!validate_account_id("0.0"));
        assert!(!validate_account_id("0.0.12.3"));
        assert!(!validate_account_id("0.0.abc"));
        assert!(!validate_account_id(" 0.0.1234"));
    }

    #[test]
    fn mock_transaction_id_shape() {
        let id = SimulatedLedger::mock_transaction_id();
        assert!(id.starts_with("0.0."));
        assert!(id.contains('@'));
    }

    #[tokio::test]
    async fn transfer_records_history_and_prefixes_memo() {
        let ledger = SimulatedLedger::new(test_config());

        // Includes the simulated processing delay (up to three seconds).
        let outcome = ledger.transfer("0.0.5005", 3, "Safaricom PLC stock").await;

        assert_eq!(outcome.amount, 3);
        assert_eq!(outcome.recipient, "0.0.5005");
        assert!(outcome
            .memo
            .as_deref()
            .unwrap()
            .starts_with("TextAHBAR-"));
        if outcome.success {
            assert!(outcome.transaction_id.is_some());
            assert_eq!(outcome.status.as_deref(), Some("SUCCESS"));
            assert!(outcome
                .explorer_url
                .as_deref()
                .unwrap()
                .contains("testnet"));
        } else {
            assert!(outcome.error.is_some());
        }

        let history = ledger.recent_transfers(10).await;
        assert_eq!(history.len(), 1);
    }

    #[tokio::test]
    async fn balance_reports_configured_token() {
        let ledger = SimulatedLedger::new(test_config());
        let info = ledger.balance(None).await;
        assert!(info.success);
        assert_eq!(info.account_id, "0.0.1001");
        assert_eq!(info.token_id.as_deref(), Some("0.0.2001"));
        assert!(info.token_balance.unwrap() <= 10_000);
    }
}
