//! Chat command grammar
//!
//! Free text is parsed into a tagged `Command` so the precedence rules stay
//! testable. Priority order:
//!
//! 1. bare ledger account id (any persona)
//! 2. stock-trader persona only: list stocks, price query, buy, pay-for,
//!    trader help
//! 3. bare "pay AMOUNT" (any persona)
//! 4. fallback to the AI chat

use lazy_static::lazy_static;
use regex::Regex;

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// A message that is exactly a ledger account id (`0.X.Y`).
    AccountId(String),
    /// "list stocks", "top Kenyan stocks", ...
    ListStocks,
    /// Price/quote query with the extracted stock name or ticker.
    PriceQuery(String),
    /// "buy N TICKER" / "buy N units of TICKER"
    Buy { quantity: u32, ticker: String },
    /// "pay AMOUNT for TARGET"
    PayFor { amount: f64, target: String },
    /// Bare "pay AMOUNT" STK push.
    Pay { amount: f64 },
    /// Stock-trader persona message that matched nothing specific.
    TraderHelp,
    /// Hand the message to the AI chat with session history.
    Fallback,
}

lazy_static! {
    static ref ACCOUNT_RE: Regex = Regex::new(r"^(0\.\d+\.\d+)$").expect("account regex");
    static ref LIST_RE: Regex =
        Regex::new(r"(?i)(list|show|top|all|available|kenyan).*stocks?").expect("list regex");
    static ref BUY_RE: Regex =
        Regex::new(r"(?i)buy\s+(\d+)\s+(?:units?\s+(?:of\s+)?)?([A-Za-z0-9\s]+)")
            .expect("buy regex");
    static ref PAY_FOR_RE: Regex =
        Regex::new(r"(?i)pay\s+([\d.]+)\s+for\s+(.+)").expect("pay-for regex");
    static ref PAY_RE: Regex = Regex::new(r"(?i)^pay\s+([\d.]+)\s*$").expect("pay regex");
}

const STOCK_KEYWORDS: &[&str] = &[
    "price", "quote", "value", "cost", "worth", "stock", "share", "trading",
];

/// Filler words stripped when extracting the stock name from a price query.
const QUERY_FILLER: &[&str] = &[
    "what", "is", "the", "of", "for", "price", "quote", "stock", "share", "shares", "current",
    "today", "trading", "at", "how", "much", "a",
];

/// Whether the sender label denotes the stock-trader persona.
pub fn is_stock_trader(recipient_name: &str) -> bool {
    recipient_name.to_lowercase().contains("stock trader")
}

/// Parse a message into a command, honoring the documented priority order.
pub fn parse(message: &str, stock_trader: bool) -> Command {
    let trimmed = message.trim();

    if let Some(caps) = ACCOUNT_RE.captures(trimmed) {
        return Command::AccountId(caps[1].to_string());
    }

    if stock_trader {
        if LIST_RE.is_match(trimmed) {
            return Command::ListStocks;
        }

        let lowered = trimmed.to_lowercase();
        if STOCK_KEYWORDS.iter().any(|kw| lowered.contains(kw)) {
            if let Some(target) = extract_stock_target(&lowered) {
                return Command::PriceQuery(target);
            }
        }

        if let Some(caps) = BUY_RE.captures(trimmed) {
            if let Ok(quantity) = caps[1].parse::<u32>() {
                return Command::Buy {
                    quantity,
                    ticker: caps[2].trim().to_uppercase(),
                };
            }
        }

        if let Some(caps) = PAY_FOR_RE.captures(trimmed) {
            if let Ok(amount) = caps[1].parse::<f64>() {
                return Command::PayFor {
                    amount,
                    target: caps[2].trim().to_string(),
                };
            }
        }

        return Command::TraderHelp;
    }

    if let Some(caps) = PAY_RE.captures(trimmed) {
        if let Ok(amount) = caps[1].parse::<f64>() {
            return Command::Pay { amount };
        }
    }

    Command::Fallback
}

/// Strip filler words and punctuation; whatever remains is the stock the
/// user asked about.
fn extract_stock_target(lowered: &str) -> Option<String> {
    let words: Vec<&str> = lowered
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| !w.is_empty() && !QUERY_FILLER.contains(w))
        .collect();

    if words.is_empty() {
        None
    } else {
        Some(words.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn account_id_beats_everything() {
        assert_eq!(
            parse("0.0.7055059", true),
            Command::AccountId("0.0.7055059".to_string())
        );
        assert_eq!(
            parse("  0.12.34  ", false),
            Command::AccountId("0.12.34".to_string())
        );
        // Embedded ids don't count; the message must be exactly the id.
        assert_eq!(parse("send to 0.0.1234 please", false), Command::Fallback);
    }

    #[test]
    fn list_stocks_variants() {
        assert_eq!(parse("list stocks", true), Command::ListStocks);
        assert_eq!(parse("show me all stocks", true), Command::ListStocks);
        assert_eq!(parse("top Kenyan stocks", true), Command::ListStocks);
    }

    #[test]
    fn price_query_extracts_target() {
        assert_eq!(
            parse("what is the price of safaricom", true),
            Command::PriceQuery("safaricom".to_string())
        );
        assert_eq!(
            parse("KCB stock quote", true),
            Command::PriceQuery("kcb".to_string())
        );
    }

    #[test]
    fn buy_command_forms() {
        assert_eq!(
            parse("buy 5 SAF", true),
            Command::Buy {
                quantity: 5,
                ticker: "SAF".to_string()
            }
        );
        assert_eq!(
            parse("buy 10 units of KCB", true),
            Command::Buy {
                quantity: 10,
                ticker: "KCB".to_string()
            }
        );
        assert_eq!(
            parse("please buy 3 equity group", true),
            Command::Buy {
                quantity: 3,
                ticker: "EQUITY GROUP".to_string()
            }
        );
    }

    #[test]
    fn pay_for_command() {
        assert_eq!(
            parse("pay 20 for safaricom", true),
            Command::PayFor {
                amount: 20.0,
                target: "safaricom".to_string()
            }
        );
    }

    #[test]
    fn bare_pay_works_for_any_persona() {
        assert_eq!(parse("pay 150", false), Command::Pay { amount: 150.0 });
        assert_eq!(parse("PAY 99.5", false), Command::Pay { amount: 99.5 });
        // With trailing text it is not a bare pay.
        assert_eq!(parse("pay 150 now", false), Command::Fallback);
    }

    #[test]
    fn trader_commands_require_trader_persona() {
        assert_eq!(parse("buy 5 SAF", false), Command::Fallback);
        assert_eq!(parse("list stocks", false), Command::Fallback);
    }

    #[test]
    fn unmatched_trader_message_gets_help() {
        assert_eq!(parse("good morning", true), Command::TraderHelp);
    }

    #[test]
    fn non_trader_chitchat_falls_back() {
        assert_eq!(parse("tell me about Kamba culture", false), Command::Fallback);
    }
}
