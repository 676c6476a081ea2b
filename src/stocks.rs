//! Static NSE stock table and lookup helpers
//!
//! The demo trades against a fixed table of Nairobi Securities Exchange
//! listings. Lookups match exact ticker first, then flexible name containment
//! in either direction.

use lazy_static::lazy_static;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Stock {
    pub ticker: String,
    pub name: String,
    pub price: f64,
    pub sector: String,
    pub market_cap: String,
}

fn stock(ticker: &str, name: &str, price: f64, sector: &str, market_cap: &str) -> Stock {
    Stock {
        ticker: ticker.to_string(),
        name: name.to_string(),
        price,
        sector: sector.to_string(),
        market_cap: market_cap.to_string(),
    }
}

lazy_static! {
    pub static ref KENYA_STOCKS: Vec<Stock> = vec![
        stock("SAF", "Safaricom PLC", 22.50, "Telecommunications", "902B KES"),
        stock("EQTY", "Equity Group Holdings", 45.75, "Banking", "172B KES"),
        stock("KCB", "KCB Group", 38.25, "Banking", "156B KES"),
        stock("EABL", "East African Breweries", 185.00, "Consumer Goods", "140B KES"),
        stock("BAT", "British American Tobacco Kenya", 425.00, "Consumer Goods", "85B KES"),
        stock("COOP", "Co-operative Bank", 14.50, "Banking", "95B KES"),
        stock("ABSA", "ABSA Bank Kenya", 12.80, "Banking", "72B KES"),
        stock("BAMB", "Bamburi Cement", 28.50, "Construction", "35B KES"),
        stock("KPLC", "Kenya Power & Lighting", 1.85, "Energy", "12B KES"),
        stock("SCBK", "Standard Chartered Bank Kenya", 165.00, "Banking", "58B KES"),
        stock("DTBK", "Diamond Trust Bank", 65.00, "Banking", "26B KES"),
        stock("NBK", "National Bank of Kenya", 6.50, "Banking", "8B KES"),
        stock("SASINI", "Sasini PLC", 11.25, "Agriculture", "4B KES"),
        stock("TOTL", "TotalEnergies Marketing Kenya", 4.20, "Energy", "3.5B KES"),
        stock("UNGA", "Unga Group", 32.00, "Consumer Goods", "6B KES"),
    ];
}

const ESTIMATE_SECTORS: &[&str] = &[
    "Technology",
    "Banking",
    "Energy",
    "Manufacturing",
    "Retail",
    "Agriculture",
];

/// Find a stock by ticker or name (flexible matching).
pub fn find(query: &str) -> Option<&'static Stock> {
    let query = query.trim().to_uppercase();
    if query.is_empty() {
        return None;
    }

    KENYA_STOCKS
        .iter()
        .find(|s| s.ticker == query)
        .or_else(|| {
            KENYA_STOCKS.iter().find(|s| {
                let name = s.name.to_uppercase();
                name.contains(&query) || query.contains(&name)
            })
        })
}

/// Canned advice line for a known stock.
pub fn advice(stock: &Stock) -> String {
    let templates = [
        format!(
            "{} is showing stable performance in the {} sector.",
            stock.name, stock.sector
        ),
        format!(
            "With a market cap of {}, {} is a solid choice for medium-term investment.",
            stock.market_cap, stock.name
        ),
        format!(
            "{} has been performing well in recent trading sessions.",
            stock.name
        ),
        format!(
            "As a leader in {}, {} offers good growth potential.",
            stock.sector, stock.name
        ),
        format!(
            "{} is a blue-chip stock worth considering for your portfolio.",
            stock.name
        ),
    ];

    templates
        .choose(&mut rand::thread_rng())
        .cloned()
        .unwrap_or_default()
}

/// Plausible made-up quote for a stock we don't carry.
pub fn estimate_unknown() -> (f64, &'static str) {
    let mut rng = rand::thread_rng();
    let price = (rng.gen_range(10.0..500.0) * 100.0f64).round() / 100.0;
    let sector = ESTIMATE_SECTORS
        .choose(&mut rng)
        .copied()
        .unwrap_or("Technology");
    (price, sector)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_by_exact_ticker() {
        let s = find("SAF").expect("SAF listed");
        assert_eq!(s.name, "Safaricom PLC");
        assert!((s.price - 22.50).abs() < f64::EPSILON);
    }

    #[test]
    fn finds_by_partial_name_case_insensitive() {
        let s = find("safaricom").expect("name match");
        assert_eq!(s.ticker, "SAF");

        let s = find("equity group").expect("partial name match");
        assert_eq!(s.ticker, "EQTY");
    }

    #[test]
    fn unknown_query_returns_none() {
        assert!(find("TESLA").is_none());
        assert!(find("").is_none());
        assert!(find("   ").is_none());
    }

    #[test]
    fn estimate_stays_in_range() {
        for _ in 0..50 {
            let (price, sector) = estimate_unknown();
            assert!((10.0..=500.0).contains(&price));
            assert!(ESTIMATE_SECTORS.contains(&sector));
        }
    }
}
