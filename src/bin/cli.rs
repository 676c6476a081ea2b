//! Management CLI for the TextAHBAR gateway: drive the SMS gateway, token
//! ledger, stock table, and transaction log from the command line without
//! going through the HTTP server.

use std::sync::Arc;

use chrono::Local;
use clap::{Parser, Subcommand};
use textahbar_gateway::{
    audit::TransactionLog,
    config::GatewayConfig,
    hedera::{self, SimulatedLedger, TokenLedger},
    sms::{phone, AfricasTalkingClient, SmsNotifier},
    stocks,
};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "textahbar")]
#[command(about = "TextAHBAR CLI management tool", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// SMS operations
    Sms {
        #[command(subcommand)]
        action: SmsAction,
    },
    /// Hedera token operations
    Hbar {
        #[command(subcommand)]
        action: HbarAction,
    },
    /// Stock operations
    Stocks {
        #[command(subcommand)]
        action: StockAction,
    },
    /// Utility operations
    Utils {
        #[command(subcommand)]
        action: UtilAction,
    },
}

#[derive(Subcommand)]
enum SmsAction {
    /// Send an SMS message
    Send {
        /// Recipient phone number
        #[arg(long)]
        to: String,
        /// SMS message content
        #[arg(long)]
        message: String,
        /// Sender ID
        #[arg(long, default_value = "TEXTAHBAR")]
        sender_id: String,
    },
    /// Check SMS service status
    Status,
    /// View SMS send history
    History {
        /// Number of messages to show
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
}

#[derive(Subcommand)]
enum HbarAction {
    /// Check account balance
    Balance {
        /// Hedera account ID (defaults to the operator account)
        #[arg(long)]
        account: Option<String>,
    },
    /// Transfer tokens
    Transfer {
        /// Recipient account ID
        #[arg(long)]
        to: String,
        /// Token amount
        #[arg(long)]
        amount: u64,
        /// Transaction memo
        #[arg(long)]
        memo: Option<String>,
        /// Phone number for SMS notification
        #[arg(long)]
        notify: Option<String>,
    },
}

#[derive(Subcommand)]
enum StockAction {
    /// List available stocks
    List,
    /// Get stock price
    Price { ticker: String },
    /// Buy stock with token delivery
    Buy {
        /// Stock ticker
        #[arg(long)]
        ticker: String,
        /// Number of shares
        #[arg(long)]
        quantity: u32,
        /// Phone for notifications
        #[arg(long)]
        phone: String,
        /// Hedera account for tokens
        #[arg(long)]
        account: String,
    },
}

#[derive(Subcommand)]
enum UtilAction {
    /// Check configuration
    Config,
    /// Validate a phone number
    Phone { number: String },
    /// View transaction history
    Transactions {
        /// Filter by transaction type
        #[arg(long = "type")]
        kind: Option<String>,
        /// Number of transactions
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Calculate SMS cost
    Cost {
        /// Phone number
        #[arg(long)]
        phone: String,
        /// Message content
        #[arg(long)]
        message: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Keep service logging quiet unless asked for; the CLI reports via stdout.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    dotenv::dotenv().ok();

    let cli = Cli::parse();
    let config = GatewayConfig::from_env();

    println!("🚀 TextAHBAR CLI Tool");
    println!("{}", "=".repeat(40));

    match cli.command {
        Commands::Sms { action } => run_sms(action, &config).await,
        Commands::Hbar { action } => run_hbar(action, &config).await,
        Commands::Stocks { action } => run_stocks(action, &config).await,
        Commands::Utils { action } => run_utils(action, &config).await,
    }

    println!("{}", "=".repeat(40));
    Ok(())
}

fn notifier(config: &GatewayConfig) -> SmsNotifier {
    SmsNotifier::new(Arc::new(AfricasTalkingClient::new(config.sms.clone())))
}

async fn run_sms(action: SmsAction, config: &GatewayConfig) {
    match action {
        SmsAction::Send {
            to,
            message,
            sender_id,
        } => {
            println!("📱 Sending SMS to {}...", to);

            let validation = phone::validate(&to);
            if !validation.is_valid {
                println!("❌ Invalid phone number: {}", to);
                return;
            }

            let cost = phone::calculate_cost(&to, message.len());
            println!(
                "💰 Estimated cost: {} {:.2}",
                cost.currency, cost.total_cost
            );

            let service = notifier(config);
            let result = service.client().send(&to, &message, Some(&sender_id)).await;

            if result.success {
                println!("✅ SMS sent successfully!");
                println!("   Message ID: {}", result.message_id.unwrap_or_default());
                println!("   Status: {}", result.status);
                println!("   Cost: {}", result.cost.unwrap_or_else(|| "N/A".to_string()));
            } else {
                println!(
                    "❌ SMS sending failed: {}",
                    result.error.unwrap_or_else(|| "Unknown error".to_string())
                );
            }
        }
        SmsAction::Status => {
            println!("📊 SMS Service Status:");
            let service = notifier(config);
            let stats = service.client().api_stats().await;
            println!("   Mode: {}", stats.mode);
            println!("   Requests made: {}", stats.request_count);
            println!(
                "   Last request: {}",
                stats
                    .last_request
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_else(|| "Never".to_string())
            );
        }
        SmsAction::History { limit } => {
            println!("📜 Recent SMS History (last {}):", limit);
            let service = notifier(config);
            let history = service.message_history(limit).await;

            if history.is_empty() {
                println!("   No SMS messages found");
                return;
            }

            for (i, msg) in history.iter().enumerate() {
                println!("   {}. {} to {}", i + 1, msg.kind, msg.recipient);
                println!("      Status: {}", msg.result.status);
                println!("      Time: {}", msg.timestamp.to_rfc3339());
            }
        }
    }
}

async fn run_hbar(action: HbarAction, config: &GatewayConfig) {
    let ledger = SimulatedLedger::new(config.hedera.clone());

    match action {
        HbarAction::Balance { account } => {
            let target = account
                .clone()
                .unwrap_or_else(|| ledger.operator_account().to_string());
            println!("💰 Checking balance for account: {}", target);

            let info = ledger.balance(account.as_deref()).await;
            if info.success {
                println!("✅ Account Balance:");
                println!("   Account: {}", info.account_id);
                println!(
                    "   HBAR: {}",
                    info.hbar_balance.unwrap_or_else(|| "N/A".to_string())
                );
                println!(
                    "   Tokens: {}",
                    info.token_balance
                        .map(|t| t.to_string())
                        .unwrap_or_else(|| "N/A".to_string())
                );
                println!(
                    "   Token ID: {}",
                    info.token_id.unwrap_or_else(|| "N/A".to_string())
                );
            } else {
                println!(
                    "❌ Balance query failed: {}",
                    info.error.unwrap_or_else(|| "Unknown error".to_string())
                );
            }
        }
        HbarAction::Transfer {
            to,
            amount,
            memo,
            notify,
        } => {
            println!("⚡ Transferring {} tokens to {}...", amount, to);

            if !hedera::validate_account_id(&to) {
                println!("❌ Invalid Hedera account ID format: {}", to);
                return;
            }

            let memo = memo.unwrap_or_else(|| {
                format!("CLI transfer - {}", Local::now().format("%Y%m%d_%H%M%S"))
            });
            let result = ledger.transfer(&to, amount, &memo).await;

            if result.success {
                let transaction_id = result.transaction_id.unwrap_or_default();
                println!("✅ Transfer completed!");
                println!("   Transaction ID: {}", transaction_id);
                println!("   Status: {}", result.status.unwrap_or_default());
                println!(
                    "   Explorer: {}",
                    result.explorer_url.unwrap_or_else(|| "N/A".to_string())
                );

                if let Some(notify_phone) = notify {
                    println!("📱 Sending SMS notification to {}...", notify_phone);
                    let service = notifier(config);
                    let sms = service
                        .notify_token_transfer(&notify_phone, amount, &to, &transaction_id)
                        .await;
                    println!("   SMS sent: {}", sms.success);
                }
            } else {
                println!(
                    "❌ Transfer failed: {}",
                    result.error.unwrap_or_else(|| "Unknown error".to_string())
                );
            }
        }
    }
}

async fn run_stocks(action: StockAction, config: &GatewayConfig) {
    match action {
        StockAction::List => {
            println!("📈 Available Kenyan Stocks (NSE):");
            for (i, stock) in stocks::KENYA_STOCKS.iter().enumerate() {
                println!("   {:2}. {} ({})", i + 1, stock.name, stock.ticker);
                println!(
                    "       Price: KES {:.2} | Sector: {}",
                    stock.price, stock.sector
                );
                println!("       Market Cap: {}", stock.market_cap);
                println!();
            }
        }
        StockAction::Price { ticker } => {
            println!("💹 Getting price for {}...", ticker.to_uppercase());

            match stocks::find(&ticker) {
                Some(stock) => {
                    println!("✅ {} ({})", stock.name, stock.ticker);
                    println!("   Current Price: KES {:.2}", stock.price);
                    println!("   Sector: {}", stock.sector);
                    println!("   Market Cap: {}", stock.market_cap);
                    println!("   Advice: {}", stocks::advice(stock));
                }
                None => println!("❌ Stock not found: {}", ticker.to_uppercase()),
            }
        }
        StockAction::Buy {
            ticker,
            quantity,
            phone,
            account,
        } => {
            println!(
                "🛒 Purchasing {} shares of {}...",
                quantity,
                ticker.to_uppercase()
            );

            if !hedera::validate_account_id(&account) {
                println!("❌ Invalid Hedera account ID format: {}", account);
                return;
            }

            let Some(stock) = stocks::find(&ticker) else {
                println!("❌ Stock not found: {}", ticker.to_uppercase());
                return;
            };

            let total_cost = stock.price * quantity as f64;
            println!("   Stock: {}", stock.name);
            println!("   Quantity: {}", quantity);
            println!("   Unit Price: KES {:.2}", stock.price);
            println!("   Total Cost: KES {:.2}", total_cost);

            let transaction_reference = format!(
                "STOCK_{}",
                Uuid::new_v4().simple().to_string()[..8].to_uppercase()
            );
            let ledger = SimulatedLedger::new(config.hedera.clone());
            let memo = format!("Stock purchase: {} {}", quantity, stock.name);
            let transfer = ledger.transfer(&account, quantity as u64, &memo).await;

            let mut sms_count = 0;
            if transfer.success {
                let transfer_id = transfer.transaction_id.clone().unwrap_or_default();
                let service = notifier(config);
                service
                    .notify_stock_purchase(
                        &phone,
                        &stock.name,
                        quantity,
                        total_cost,
                        &transaction_reference,
                    )
                    .await;
                service
                    .notify_token_transfer(&phone, quantity as u64, &account, &transfer_id)
                    .await;
                sms_count = 2;
            }

            let log = TransactionLog::open(&config.log_file);
            let record = log
                .record(
                    "stock_purchase",
                    serde_json::json!({
                        "transaction_reference": transaction_reference.clone(),
                        "stock_name": stock.name.clone(),
                        "quantity": quantity,
                        "total_cost": total_cost,
                        "recipient_account": account,
                        "hedera_transaction_id": transfer.transaction_id,
                        "success": transfer.success,
                    }),
                )
                .await;

            if let Err(e) = record {
                println!("❌ Could not write transaction log: {}", e);
            }

            if transfer.success {
                println!("✅ Stock purchase completed!");
                println!("   Reference: {}", transaction_reference);
                println!("   HBAR Transfer: true");
                println!("   SMS Notifications: {}", sms_count);
            } else {
                println!(
                    "❌ Stock purchase failed: {}",
                    transfer.error.unwrap_or_else(|| "Unknown error".to_string())
                );
            }
        }
    }
}

async fn run_utils(action: UtilAction, config: &GatewayConfig) {
    match action {
        UtilAction::Config => {
            println!("⚙️ Configuration Status:");
            let report = config.report();

            println!(
                "   Overall Status: {}",
                if report.all_valid {
                    "✅ Valid"
                } else {
                    "❌ Invalid"
                }
            );
            println!("\n   Individual Checks:");
            let v = &report.validation;
            for (label, ok) in [
                ("Bedrock Token Set", v.bedrock_token_set),
                ("Hedera Account Format", v.hedera_account_format),
                ("Hedera Key Set", v.hedera_key_set),
                ("Token Id Format", v.token_id_format),
                ("Sms Username Set", v.sms_username_set),
                ("Sms Api Key Set", v.sms_api_key_set),
                ("Sender Id Valid", v.sender_id_valid),
            ] {
                println!("   {} {}", if ok { "✅" } else { "❌" }, label);
            }

            if !report.recommendations.is_empty() {
                println!("\n💡 Recommendations:");
                for rec in &report.recommendations {
                    println!("   • {}", rec);
                }
            }
        }
        UtilAction::Phone { number } => {
            println!("📞 Validating phone number: {}", number);

            let validation = phone::validate(&number);
            let formatted = phone::format_international(&number, "KE");
            let network = phone::identify_kenyan_network(&number);
            let display = phone::format_display(&number);

            println!("   Original: {}", number);
            println!("   Formatted: {}", formatted);
            println!("   Display Format: {}", display);
            println!("   Network: {}", network);
            println!(
                "   Valid: {}",
                if validation.is_valid { "✅" } else { "❌" }
            );

            if !validation.is_valid {
                println!("   Issues:");
                for (label, ok) in [
                    ("Has Digits", validation.has_digits),
                    ("Valid Length", validation.valid_length),
                    ("Valid Format", validation.valid_format),
                    ("Supported Country", validation.supported_country),
                ] {
                    if !ok {
                        println!("   • {}", label);
                    }
                }
            }
        }
        UtilAction::Transactions { kind, limit } => {
            println!("📊 Transaction History (last {}):", limit);
            let log = TransactionLog::open(&config.log_file);
            let entries = log.query(kind.as_deref(), limit).await;

            if entries.is_empty() {
                println!("   No transactions found");
                return;
            }

            for tx in entries {
                let status = if tx.status { "✅" } else { "❌" };
                println!("   {} {} ({})", status, tx.transaction_id, tx.kind);
                println!("      Time: {}", tx.timestamp.format("%Y-%m-%d %H:%M:%S"));
                for key in ["amount", "recipient", "phone_number", "stock_name"] {
                    if let Some(value) = tx.data.get(key) {
                        println!("      {}: {}", key, value);
                    }
                }
                println!();
            }
        }
        UtilAction::Cost { phone: number, message } => {
            println!("💰 Calculating SMS cost...");
            let cost = phone::calculate_cost(&number, message.len());

            println!("   Phone: {}", number);
            println!("   Message Length: {} characters", message.len());
            println!("   SMS Count: {} SMS", cost.sms_count);
            println!(
                "   Cost per SMS: {} {:.2}",
                cost.currency, cost.cost_per_sms
            );
            println!("   Total Cost: {} {:.2}", cost.currency, cost.total_cost);
            println!("   Network: {}", cost.network);
            println!("   Local: {}", if cost.is_local { "Yes" } else { "No" });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_definitions_are_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_sms_send() {
        let cli = Cli::try_parse_from([
            "textahbar", "sms", "send", "--to", "+254712345678", "--message", "hello",
        ])
        .unwrap();

        match cli.command {
            Commands::Sms {
                action: SmsAction::Send {
                    to,
                    message,
                    sender_id,
                },
            } => {
                assert_eq!(to, "+254712345678");
                assert_eq!(message, "hello");
                assert_eq!(sender_id, "TEXTAHBAR");
            }
            _ => panic!("expected sms send"),
        }
    }

    #[test]
    fn parses_hbar_transfer_with_notify() {
        let cli = Cli::try_parse_from([
            "textahbar", "hbar", "transfer", "--to", "0.0.5005", "--amount", "10", "--notify",
            "0712345678",
        ])
        .unwrap();

        match cli.command {
            Commands::Hbar {
                action: HbarAction::Transfer {
                    to,
                    amount,
                    memo,
                    notify,
                },
            } => {
                assert_eq!(to, "0.0.5005");
                assert_eq!(amount, 10);
                assert!(memo.is_none());
                assert_eq!(notify.as_deref(), Some("0712345678"));
            }
            _ => panic!("expected hbar transfer"),
        }
    }

    #[test]
    fn stock_buy_requires_all_flags() {
        let result = Cli::try_parse_from([
            "textahbar", "stocks", "buy", "--ticker", "SAF", "--quantity", "5",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn transactions_filter_uses_type_flag() {
        let cli = Cli::try_parse_from([
            "textahbar", "utils", "transactions", "--type", "sms", "--limit", "5",
        ])
        .unwrap();

        match cli.command {
            Commands::Utils {
                action: UtilAction::Transactions { kind, limit },
            } => {
                assert_eq!(kind.as_deref(), Some("sms"));
                assert_eq!(limit, 5);
            }
            _ => panic!("expected utils transactions"),
        }
    }
}
