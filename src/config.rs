//! Environment configuration for the gateway and its three external services
//!
//! Everything is loaded once at startup. `GatewayConfig::report` produces the
//! validation summary surfaced on `/api/dashboard`.

use crate::models::LedgerNetwork;
use serde::Serialize;
use std::env;

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_LOG_FILE: &str = "transactions.json";

#[derive(Debug, Clone)]
pub struct BedrockConfig {
    pub bearer_token: String,
    pub model_id: String,
    pub region: String,
}

impl BedrockConfig {
    fn from_env() -> Self {
        let bearer_token = env::var("BEDROCK_BEARER_TOKEN")
            .or_else(|_| env::var("AWS_BEARER_TOKEN_BEDROCK"))
            .unwrap_or_default();

        Self {
            bearer_token,
            model_id: env::var("BEDROCK_MODEL_ID")
                .unwrap_or_else(|_| "anthropic.claude-3-haiku-20240307-v1:0".to_string()),
            region: env::var("AWS_REGION").unwrap_or_else(|_| "us-east-1".to_string()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct HederaConfig {
    pub account_id: String,
    pub private_key: String,
    pub token_id: String,
    pub network: LedgerNetwork,
    pub memo_prefix: String,
}

impl HederaConfig {
    fn from_env() -> Self {
        let network = match env::var("HEDERA_NETWORK").as_deref() {
            Ok("mainnet") => LedgerNetwork::Mainnet,
            _ => LedgerNetwork::Testnet,
        };

        Self {
            account_id: env::var("MY_ACCOUNT_ID").unwrap_or_else(|_| "0.0.1001".to_string()),
            private_key: env::var("MY_PRIVATE_KEY").unwrap_or_default(),
            token_id: env::var("TOKEN_ID").unwrap_or_else(|_| "0.0.2001".to_string()),
            network,
            memo_prefix: "TextAHBAR-".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SmsConfig {
    pub username: String,
    pub api_key: String,
    pub sender_id: String,
}

impl SmsConfig {
    fn from_env() -> Self {
        Self {
            username: env::var("AFRICASTALKING_USERNAME").unwrap_or_else(|_| "sandbox".to_string()),
            api_key: env::var("AFRICASTALKING_API_KEY").unwrap_or_default(),
            sender_id: env::var("AFRICASTALKING_SENDER_ID")
                .unwrap_or_else(|_| "TEXTAHBAR".to_string()),
        }
    }

    pub fn is_sandbox(&self) -> bool {
        self.username == "sandbox"
    }

    pub fn base_url(&self) -> &'static str {
        if self.is_sandbox() {
            "https://api.sandbox.africastalking.com/version1"
        } else {
            "https://api.africastalking.com/version1"
        }
    }
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub port: u16,
    pub log_file: String,
    pub bedrock: BedrockConfig,
    pub hedera: HederaConfig,
    pub sms: SmsConfig,
}

impl GatewayConfig {
    pub fn from_env() -> Self {
        let port = env::var("PORT")
            .or_else(|_| env::var("API_PORT"))
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_PORT);

        Self {
            port,
            log_file: env::var("TRANSACTION_LOG_FILE")
                .unwrap_or_else(|_| DEFAULT_LOG_FILE.to_string()),
            bedrock: BedrockConfig::from_env(),
            hedera: HederaConfig::from_env(),
            sms: SmsConfig::from_env(),
        }
    }

    pub fn report(&self) -> ConfigReport {
        let validation = ConfigValidation {
            bedrock_token_set: is_real_value(&self.bedrock.bearer_token),
            hedera_account_format: is_ledger_id(&self.hedera.account_id),
            hedera_key_set: is_real_value(&self.hedera.private_key),
            token_id_format: is_ledger_id(&self.hedera.token_id),
            sms_username_set: !self.sms.username.is_empty(),
            sms_api_key_set: is_real_value(&self.sms.api_key),
            sender_id_valid: !self.sms.sender_id.is_empty() && self.sms.sender_id.len() <= 11,
        };

        let mut recommendations = Vec::new();
        if !validation.all_valid() {
            recommendations
                .push("Some environment variables are missing or invalid".to_string());
        }
        if self.sms.is_sandbox() {
            recommendations.push(
                "Using AfricasTalking sandbox mode - switch to production for live SMS"
                    .to_string(),
            );
        }
        if self.hedera.network == LedgerNetwork::Testnet {
            recommendations
                .push("Using Hedera testnet - switch to mainnet for production".to_string());
        }

        ConfigReport {
            all_valid: validation.all_valid(),
            validation,
            environment_summary: EnvironmentSummary {
                hedera_network: self.hedera.network,
                africastalking_mode: if self.sms.is_sandbox() {
                    "sandbox"
                } else {
                    "production"
                },
                aws_region: self.bedrock.region.clone(),
            },
            recommendations,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ConfigValidation {
    pub bedrock_token_set: bool,
    pub hedera_account_format: bool,
    pub hedera_key_set: bool,
    pub token_id_format: bool,
    pub sms_username_set: bool,
    pub sms_api_key_set: bool,
    pub sender_id_valid: bool,
}

impl ConfigValidation {
    pub fn all_valid(&self) -> bool {
        self.bedrock_token_set
            && self.hedera_account_format
            && self.hedera_key_set
            && self.token_id_format
            && self.sms_username_set
            && self.sms_api_key_set
            && self.sender_id_valid
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EnvironmentSummary {
    pub hedera_network: LedgerNetwork,
    pub africastalking_mode: &'static str,
    pub aws_region: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConfigReport {
    pub validation: ConfigValidation,
    pub all_valid: bool,
    pub environment_summary: EnvironmentSummary,
    pub recommendations: Vec<String>,
}

/// Placeholder values like "your_api_key_here" don't count as configured.
fn is_real_value(value: &str) -> bool {
    !value.is_empty() && !value.to_lowercase().contains("your_")
}

fn is_ledger_id(value: &str) -> bool {
    crate::hedera::validate_account_id(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_values_are_not_configured() {
        assert!(!is_real_value(""));
        assert!(!is_real_value("your_api_key_here"));
        assert!(is_real_value("atsk_live_abc123"));
    }

    #[test]
    fn sandbox_switch_selects_base_url() {
        let sandbox = SmsConfig {
            username: "sandbox".into(),
            api_key: "k".into(),
            sender_id: "TEXTAHBAR".into(),
        };
        assert!(sandbox.is_sandbox());
        assert!(sandbox.base_url().contains("sandbox"));

        let live = SmsConfig {
            username: "acme".into(),
            ..sandbox
        };
        assert!(!live.is_sandbox());
        assert!(!live.base_url().contains("sandbox"));
    }
}
