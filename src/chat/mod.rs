//! Chat message interpreter
//!
//! Routes each inbound message through the command grammar and drives the
//! purchase state machine: buy/pay commands open a pending purchase and
//! return an STK prompt, the PIN endpoint confirms it, and a follow-up
//! ledger account id triggers the token transfer and clears the session.

pub mod command;
pub mod sessions;

use crate::audit::TransactionLog;
use crate::bedrock::BedrockClient;
use crate::hedera::TokenLedger;
use crate::models::{ChatReply, PendingConfirmation, PendingPurchase};
use crate::sms::SmsNotifier;
use crate::state::PurchaseTracker;
use crate::stocks;
use chrono::Local;
use command::Command;
use rand::seq::SliceRandom;
use rand::Rng;
use serde_json::json;
use sessions::SessionStore;
use std::sync::Arc;
use tracing::{info, warn};

const APOLOGY_REPLY: &str = "Sorry, I am having trouble connecting to the AI at the moment.";

const DAILY_LIMIT_LINE: &str = "Amount you can transact within the day is 499,230.";

/// Inbound chat message with its conversation metadata.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub session_id: String,
    pub convo_id: String,
    pub recipient_name: String,
    pub recipient_number: String,
    pub message: String,
}

pub struct ChatRouter {
    tracker: Arc<dyn PurchaseTracker>,
    sessions: Arc<SessionStore>,
    ledger: Arc<dyn TokenLedger>,
    notifier: Arc<SmsNotifier>,
    log: Arc<TransactionLog>,
    llm: Arc<BedrockClient>,
}

impl ChatRouter {
    pub fn new(
        tracker: Arc<dyn PurchaseTracker>,
        sessions: Arc<SessionStore>,
        ledger: Arc<dyn TokenLedger>,
        notifier: Arc<SmsNotifier>,
        log: Arc<TransactionLog>,
        llm: Arc<BedrockClient>,
    ) -> Self {
        Self {
            tracker,
            sessions,
            ledger,
            notifier,
            log,
            llm,
        }
    }

    pub async fn handle(&self, inbound: InboundMessage) -> crate::Result<ChatReply> {
        let stock_trader = command::is_stock_trader(&inbound.recipient_name);

        match command::parse(&inbound.message, stock_trader) {
            Command::AccountId(account_id) => self.handle_account_id(&inbound, &account_id).await,
            Command::ListStocks => Ok(ChatReply::text(list_stocks_reply())),
            Command::PriceQuery(target) => Ok(ChatReply::text(price_reply(&target))),
            Command::Buy { quantity, ticker } => {
                self.handle_buy(&inbound, quantity, &ticker).await
            }
            Command::PayFor { amount, target } => {
                self.handle_pay_for(&inbound, amount, &target).await
            }
            Command::Pay { amount } => self.handle_bare_pay(&inbound, amount).await,
            Command::TraderHelp => Ok(ChatReply::text(TRADER_HELP)),
            Command::Fallback => self.handle_fallback(&inbound).await,
        }
    }

    /// Account id received: deliver tokens if a confirmed purchase is waiting.
    async fn handle_account_id(
        &self,
        inbound: &InboundMessage,
        account_id: &str,
    ) -> crate::Result<ChatReply> {
        info!("Ledger account id detected: {}", account_id);

        let Some(purchase) = self.tracker.pending_purchase(&inbound.session_id).await? else {
            return Ok(ChatReply::text(
                "No pending purchase found. Please start a new stock purchase with \
                 'buy [quantity] [ticker]'",
            ));
        };

        if !purchase.mpesa_confirmed {
            return Ok(ChatReply::text(
                "Payment not confirmed yet. Please complete the M-PESA STK push first by \
                 entering your PIN.",
            ));
        }

        // One token per stock unit.
        let tokens_to_send = purchase.quantity as u64;
        info!(
            "Initiating token transfer: {} units to {} for {}",
            tokens_to_send, account_id, purchase.stock_name
        );

        let memo = format!(
            "{} stock token transfer of {} units.",
            purchase.stock_name, tokens_to_send
        );
        let transfer = self.ledger.transfer(account_id, tokens_to_send, &memo).await;

        if transfer.success {
            let transaction_id = transfer.transaction_id.clone().unwrap_or_default();
            let status = transfer.status.clone().unwrap_or_default();

            let tx_log_id = self
                .log
                .record(
                    "stock_purchase",
                    json!({
                        "stock_name": purchase.stock_name.clone(),
                        "quantity": purchase.quantity,
                        "tokens_sent": tokens_to_send,
                        "recipient_account": account_id,
                        "hedera_transaction_id": transaction_id.clone(),
                        "success": true,
                    }),
                )
                .await?;

            let phone = demo_phone();
            self.notifier
                .notify_stock_purchase(
                    phone,
                    &purchase.stock_name,
                    purchase.quantity,
                    purchase.total_amount,
                    &tx_log_id,
                )
                .await;
            self.notifier
                .notify_token_transfer(phone, tokens_to_send, account_id, &transaction_id)
                .await;

            self.tracker.clear_purchase(&inbound.session_id).await?;

            Ok(ChatReply::text(format!(
                "Stock Purchase Complete!\n\n\
                 {}: {} unit(s) purchased\n\
                 Tokens Sent: {} token units\n\
                 To Account: {}\n\
                 Transaction ID: {}\n\
                 Status: {}\n\
                 SMS Confirmation: Sent to your registered number\n\n\
                 Your tokens have been delivered to your Hedera account. \
                 Thank you for trading with us!",
                purchase.stock_name,
                purchase.quantity,
                tokens_to_send,
                account_id,
                transaction_id,
                status
            )))
        } else {
            let reason = transfer.error.unwrap_or_else(|| "unknown".to_string());
            Ok(ChatReply::text(format!(
                "Token Delivery Issue\n\n\
                 Error: {}\n\n\
                 Your purchase of {} unit(s) of {} was confirmed, but we couldn't deliver \
                 tokens to {}. Please contact support with your transaction details.",
                reason, purchase.quantity, purchase.stock_name, account_id
            )))
        }
    }

    /// "buy N TICKER": open a pending purchase and raise the STK prompt.
    async fn handle_buy(
        &self,
        inbound: &InboundMessage,
        quantity: u32,
        ticker: &str,
    ) -> crate::Result<ChatReply> {
        let Some(stock) = stocks::find(ticker) else {
            return Ok(ChatReply::text(format!(
                "Sorry, I couldn't find stock ticker '{}'. Please check the ticker and try again.",
                ticker
            )));
        };

        let total = stock.price * quantity as f64;
        self.tracker
            .put_purchase(
                &inbound.session_id,
                PendingPurchase {
                    ticker: stock.ticker.clone(),
                    quantity,
                    unit_price: stock.price,
                    total_amount: total,
                    recipient_name: inbound.recipient_name.clone(),
                    recipient_number: inbound.recipient_number.clone(),
                    stock_name: stock.name.clone(),
                    mpesa_confirmed: false,
                },
            )
            .await?;

        self.open_stk_push(inbound, total, &stock.name).await
    }

    /// "pay AMOUNT for TARGET": single-unit purchase at the quoted amount.
    async fn handle_pay_for(
        &self,
        inbound: &InboundMessage,
        amount: f64,
        target: &str,
    ) -> crate::Result<ChatReply> {
        let Some(stock) = stocks::find(target) else {
            // Unknown target falls through to the generic trader help.
            return Ok(ChatReply::text(TRADER_HELP));
        };

        self.tracker
            .put_purchase(
                &inbound.session_id,
                PendingPurchase {
                    ticker: stock.ticker.clone(),
                    quantity: 1,
                    unit_price: amount,
                    total_amount: amount,
                    recipient_name: inbound.recipient_name.clone(),
                    recipient_number: inbound.recipient_number.clone(),
                    stock_name: stock.name.clone(),
                    mpesa_confirmed: false,
                },
            )
            .await?;

        self.open_stk_push(inbound, amount, &stock.name).await
    }

    /// Bare "pay AMOUNT" with no purchase attached.
    async fn handle_bare_pay(
        &self,
        inbound: &InboundMessage,
        amount: f64,
    ) -> crate::Result<ChatReply> {
        let recipient = inbound.recipient_name.clone();
        let new_balance = self.tracker.debit(&inbound.session_id, amount).await?;
        let confirmation = mpesa_confirmation_text(amount, &recipient, &inbound.recipient_number, new_balance);

        self.tracker
            .put_confirmation(
                &inbound.session_id,
                PendingConfirmation {
                    message: confirmation,
                    sender_label: "M-PESA".to_string(),
                },
            )
            .await?;

        Ok(ChatReply::StkPrompt {
            amount,
            recipient: recipient.clone(),
            recipient_number: inbound.recipient_number.clone(),
            prompt_message: format!(
                "STK Push for Ksh {:.2} to {} ({}). Enter PIN.",
                amount, recipient, inbound.recipient_number
            ),
        })
    }

    /// Shared buy/pay tail: debit the simulated balance, log the payment,
    /// stash the confirmation text, and return the STK prompt directive.
    async fn open_stk_push(
        &self,
        inbound: &InboundMessage,
        amount: f64,
        recipient: &str,
    ) -> crate::Result<ChatReply> {
        let new_balance = self.tracker.debit(&inbound.session_id, amount).await?;
        let transaction_id = mpesa_transaction_id();
        let confirmation =
            mpesa_confirmation_with_id(&transaction_id, amount, recipient, &inbound.recipient_number, new_balance);

        self.log
            .record(
                "mpesa_payment",
                json!({
                    "amount": amount,
                    "recipient": recipient,
                    "recipient_number": inbound.recipient_number.clone(),
                    "transaction_id": transaction_id.clone(),
                    "new_balance": new_balance,
                    "success": true,
                }),
            )
            .await?;

        self.tracker
            .put_confirmation(
                &inbound.session_id,
                PendingConfirmation {
                    message: confirmation,
                    sender_label: "M-PESA".to_string(),
                },
            )
            .await?;

        Ok(ChatReply::StkPrompt {
            amount,
            recipient: recipient.to_string(),
            recipient_number: inbound.recipient_number.clone(),
            prompt_message: format!(
                "STK Push for Ksh {:.2} to {} ({}). Enter PIN.",
                amount, recipient, inbound.recipient_number
            ),
        })
    }

    /// Everything else goes to the AI chat with the session history.
    async fn handle_fallback(&self, inbound: &InboundMessage) -> crate::Result<ChatReply> {
        let history = self
            .sessions
            .history_with(&inbound.convo_id, &inbound.recipient_name, &inbound.message)
            .await;

        match self.llm.converse(&history).await {
            Ok(reply) => {
                self.sessions
                    .append_exchange(&inbound.convo_id, &inbound.message, &reply)
                    .await;
                Ok(ChatReply::text(reply))
            }
            Err(e) => {
                warn!("Chat completion failed: {}", e);
                Ok(ChatReply::text(APOLOGY_REPLY))
            }
        }
    }
}

const TRADER_HELP: &str = "Welcome to Stock Trader!\n\n\
I'm your personal stock trading assistant. I can help you with:\n\n\
- Check stock prices (e.g., 'Safaricom stock price' or 'price of SAF')\n\
- List available stocks ('list stocks' or 'top Kenyan stocks')\n\
- Buy stocks ('buy 5 SAF')\n\
- Investment advice and market insights\n\n\
What would you like to know about the market today?";

fn list_stocks_reply() -> String {
    let mut lines = vec!["Available Kenyan Stocks (NSE)\n".to_string()];
    for (idx, s) in stocks::KENYA_STOCKS.iter().enumerate() {
        lines.push(format!(
            "{}. {} ({}) - KES {:.2} | {}",
            idx + 1,
            s.name,
            s.ticker,
            s.price,
            s.sector
        ));
    }
    lines.join("\n")
}

fn price_reply(target: &str) -> String {
    match stocks::find(target) {
        Some(stock) => format!(
            "{} ({})\n\n\
             Current Price: KES {:.2}\n\
             Sector: {}\n\
             Market Cap: {}\n\n\
             {}\n\n\
             Would you like to buy {}? Reply 'buy [quantity] {}'",
            stock.name,
            stock.ticker,
            stock.price,
            stock.sector,
            stock.market_cap,
            stocks::advice(stock),
            stock.ticker,
            stock.ticker
        ),
        None => {
            let (price, sector) = stocks::estimate_unknown();
            format!(
                "{}\n\n\
                 Current Price: KES {:.2}\n\
                 Sector: {}\n\n\
                 This stock is currently trading at KES {:.2}. Would you like more \
                 information or to place an order?",
                title_case(target),
                price,
                sector,
                price
            )
        }
    }
}

fn title_case(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// M-PESA-style id: "TJTG" plus six uppercase alphanumerics.
fn mpesa_transaction_id() -> String {
    const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
    let mut rng = rand::thread_rng();
    let suffix: String = (0..6)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect();
    format!("TJTG{}", suffix)
}

fn mpesa_confirmation_text(
    amount: f64,
    recipient: &str,
    recipient_number: &str,
    new_balance: f64,
) -> String {
    mpesa_confirmation_with_id(&mpesa_transaction_id(), amount, recipient, recipient_number, new_balance)
}

fn mpesa_confirmation_with_id(
    transaction_id: &str,
    amount: f64,
    recipient: &str,
    recipient_number: &str,
    new_balance: f64,
) -> String {
    let current_time = Local::now().format("%d/%m/%y at %I:%M %p");
    format!(
        "{} Confirmed. Ksh{:.2} sent to {} {} on {}. New M-pesa balance is ksh{:.2}. \
         Transaction cost, Ksh0.00. {}",
        transaction_id, amount, recipient, recipient_number, current_time, new_balance, DAILY_LIMIT_LINE
    )
}

/// Demo phone for SMS notifications; a real deployment would read this from
/// the user's session.
fn demo_phone() -> &'static str {
    ["+254700000000", "+254722000000", "+254733000000"]
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or("+254700000000")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SmsConfig;
    use crate::models::{BalanceInfo, LedgerNetwork, TransferOutcome};
    use crate::sms::AfricasTalkingClient;
    use crate::state::{InMemoryTracker, DEFAULT_SESSION};
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Deterministic ledger double counting transfer attempts.
    struct FakeLedger {
        succeed: bool,
        attempts: AtomicUsize,
    }

    impl FakeLedger {
        fn new(succeed: bool) -> Self {
            Self {
                succeed,
                attempts: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait::async_trait]
    impl TokenLedger for FakeLedger {
        async fn transfer(&self, recipient: &str, amount: u64, memo: &str) -> TransferOutcome {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            if self.succeed {
                TransferOutcome {
                    success: true,
                    transaction_id: Some("0.0.1234@1700000000.123456789".to_string()),
                    status: Some("SUCCESS".to_string()),
                    error: None,
                    recipient: recipient.to_string(),
                    amount,
                    memo: Some(memo.to_string()),
                    explorer_url: None,
                    timestamp: Utc::now(),
                }
            } else {
                TransferOutcome {
                    success: false,
                    transaction_id: None,
                    status: None,
                    error: Some("Network congestion".to_string()),
                    recipient: recipient.to_string(),
                    amount,
                    memo: Some(memo.to_string()),
                    explorer_url: None,
                    timestamp: Utc::now(),
                }
            }
        }

        async fn balance(&self, account_id: Option<&str>) -> BalanceInfo {
            BalanceInfo {
                success: true,
                account_id: account_id.unwrap_or("0.0.1001").to_string(),
                hbar_balance: Some("100.00 HBAR".to_string()),
                token_balance: Some(0),
                token_id: Some("0.0.2001".to_string()),
                error: None,
                timestamp: Utc::now(),
            }
        }

        async fn recent_transfers(&self, _limit: usize) -> Vec<TransferOutcome> {
            Vec::new()
        }

        fn network(&self) -> LedgerNetwork {
            LedgerNetwork::Testnet
        }

        fn operator_account(&self) -> &str {
            "0.0.1001"
        }

        fn token_id(&self) -> &str {
            "0.0.2001"
        }
    }

    struct Harness {
        router: ChatRouter,
        tracker: Arc<InMemoryTracker>,
        ledger: Arc<FakeLedger>,
        _dir: tempfile::TempDir,
    }

    fn harness(ledger_succeeds: bool) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let tracker = Arc::new(InMemoryTracker::new());
        let ledger = Arc::new(FakeLedger::new(ledger_succeeds));
        let notifier = Arc::new(SmsNotifier::new(Arc::new(AfricasTalkingClient::new(
            SmsConfig {
                username: "sandbox".to_string(),
                api_key: "test".to_string(),
                sender_id: "TEXTAHBAR".to_string(),
            },
        ))));
        let log = Arc::new(TransactionLog::open(dir.path().join("transactions.json")));
        // Empty token: fallback degrades to the apology without any network call.
        let llm = Arc::new(BedrockClient::new(
            String::new(),
            "anthropic.claude-3-haiku-20240307-v1:0".to_string(),
            "us-east-1",
        ));

        let router = ChatRouter::new(
            tracker.clone(),
            Arc::new(SessionStore::new()),
            ledger.clone(),
            notifier,
            log,
            llm,
        );

        Harness {
            router,
            tracker,
            ledger,
            _dir: dir,
        }
    }

    fn inbound(message: &str, recipient: &str) -> InboundMessage {
        InboundMessage {
            session_id: DEFAULT_SESSION.to_string(),
            convo_id: "convo-1".to_string(),
            recipient_name: recipient.to_string(),
            recipient_number: "40404".to_string(),
            message: message.to_string(),
        }
    }

    #[tokio::test]
    async fn buy_creates_unconfirmed_purchase_with_total() {
        let h = harness(true);

        let reply = h
            .router
            .handle(inbound("buy 5 SAF", "Stock Trader"))
            .await
            .unwrap();

        match reply {
            ChatReply::StkPrompt { amount, .. } => assert!((amount - 112.50).abs() < 1e-9),
            other => panic!("expected stk prompt, got {:?}", other),
        }

        let purchase = h
            .tracker
            .pending_purchase(DEFAULT_SESSION)
            .await
            .unwrap()
            .expect("pending purchase");
        assert_eq!(purchase.ticker, "SAF");
        assert_eq!(purchase.quantity, 5);
        assert!((purchase.total_amount - 5.0 * 22.50).abs() < 1e-9);
        assert!(!purchase.mpesa_confirmed);
    }

    #[tokio::test]
    async fn unknown_ticker_is_rejected() {
        let h = harness(true);
        let reply = h
            .router
            .handle(inbound("buy 2 TSLA", "Stock Trader"))
            .await
            .unwrap();

        match reply {
            ChatReply::ChatReply { reply } => assert!(reply.contains("couldn't find stock ticker")),
            other => panic!("expected chat reply, got {:?}", other),
        }
        assert!(h
            .tracker
            .pending_purchase(DEFAULT_SESSION)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn account_id_without_purchase_has_no_side_effects() {
        let h = harness(true);
        let reply = h
            .router
            .handle(inbound("0.0.5005", "Stock Trader"))
            .await
            .unwrap();

        match reply {
            ChatReply::ChatReply { reply } => assert!(reply.contains("No pending purchase")),
            other => panic!("expected chat reply, got {:?}", other),
        }
        assert_eq!(h.ledger.attempts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unconfirmed_purchase_blocks_delivery() {
        let h = harness(true);
        h.router
            .handle(inbound("buy 5 SAF", "Stock Trader"))
            .await
            .unwrap();

        let reply = h
            .router
            .handle(inbound("0.0.5005", "Stock Trader"))
            .await
            .unwrap();

        match reply {
            ChatReply::ChatReply { reply } => assert!(reply.contains("Payment not confirmed")),
            other => panic!("expected chat reply, got {:?}", other),
        }
        assert_eq!(h.ledger.attempts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn confirmed_purchase_transfers_once_and_clears_state() {
        let h = harness(true);
        h.router
            .handle(inbound("buy 5 SAF", "Stock Trader"))
            .await
            .unwrap();
        h.tracker.confirm_purchase(DEFAULT_SESSION).await.unwrap();

        let reply = h
            .router
            .handle(inbound("0.0.5005", "Stock Trader"))
            .await
            .unwrap();

        match reply {
            ChatReply::ChatReply { reply } => assert!(reply.contains("Stock Purchase Complete")),
            other => panic!("expected chat reply, got {:?}", other),
        }
        assert_eq!(h.ledger.attempts.load(Ordering::SeqCst), 1);
        assert!(h
            .tracker
            .pending_purchase(DEFAULT_SESSION)
            .await
            .unwrap()
            .is_none());
        assert!(h
            .tracker
            .take_confirmation(DEFAULT_SESSION)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn failed_transfer_keeps_purchase_pending() {
        let h = harness(false);
        h.router
            .handle(inbound("buy 2 KCB", "Stock Trader"))
            .await
            .unwrap();
        h.tracker.confirm_purchase(DEFAULT_SESSION).await.unwrap();

        let reply = h
            .router
            .handle(inbound("0.0.5005", "Stock Trader"))
            .await
            .unwrap();

        match reply {
            ChatReply::ChatReply { reply } => {
                assert!(reply.contains("Token Delivery Issue"));
                assert!(reply.contains("Network congestion"));
            }
            other => panic!("expected chat reply, got {:?}", other),
        }
        // Purchase stays so the user can retry with another account id.
        assert!(h
            .tracker
            .pending_purchase(DEFAULT_SESSION)
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn bare_pay_prompts_without_purchase() {
        let h = harness(true);
        let reply = h
            .router
            .handle(inbound("pay 150", "Kamba Bot"))
            .await
            .unwrap();

        match reply {
            ChatReply::StkPrompt {
                amount,
                prompt_message,
                ..
            } => {
                assert!((amount - 150.0).abs() < 1e-9);
                assert!(prompt_message.contains("Enter PIN"));
            }
            other => panic!("expected stk prompt, got {:?}", other),
        }
        assert!(h
            .tracker
            .pending_purchase(DEFAULT_SESSION)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn fallback_degrades_to_apology_without_llm() {
        let h = harness(true);
        let reply = h
            .router
            .handle(inbound("tell me a story", "Kamba Bot"))
            .await
            .unwrap();

        assert_eq!(reply, ChatReply::text(APOLOGY_REPLY));
    }

    #[tokio::test]
    async fn price_query_for_known_stock_offers_buy() {
        let h = harness(true);
        let reply = h
            .router
            .handle(inbound("what is the price of safaricom", "Stock Trader"))
            .await
            .unwrap();

        match reply {
            ChatReply::ChatReply { reply } => {
                assert!(reply.contains("Safaricom PLC (SAF)"));
                assert!(reply.contains("KES 22.50"));
                assert!(reply.contains("buy [quantity] SAF"));
            }
            other => panic!("expected chat reply, got {:?}", other),
        }
    }
}
