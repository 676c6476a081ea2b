//! Phone number formatting, validation, and SMS cost estimation
//!
//! Covers the East African country codes the gateway serves. Formatting to
//! international form is idempotent: an already-international number comes
//! back unchanged.

use serde::{Deserialize, Serialize};

/// Supported country dialling codes, Kenya first as the default market.
const COUNTRY_CODES: &[(&str, &str)] = &[
    ("KE", "254"),
    ("UG", "256"),
    ("TZ", "255"),
    ("RW", "250"),
    ("NG", "234"),
    ("GH", "233"),
    ("ZA", "27"),
];

/// Kenyan two-digit prefix to carrier. The upstream data had prefixes listed
/// under two carriers; the effective mapping (last writer wins) is kept here,
/// one carrier per prefix.
const KENYAN_PREFIXES: &[(&str, &str)] = &[
    ("70", "Safaricom"),
    ("71", "Safaricom"),
    ("72", "Safaricom"),
    ("74", "Safaricom"),
    ("75", "Safaricom"),
    ("76", "Safaricom"),
    ("79", "Safaricom"),
    ("78", "Airtel"),
    ("10", "Airtel"),
    ("73", "Telkom"),
    ("77", "Telkom"),
];

pub const LOCAL_RATE_KES: f64 = 1.00;
pub const INTERNATIONAL_RATE_KES: f64 = 5.00;
const CHARS_PER_SMS: usize = 160;

fn digits(phone: &str) -> String {
    phone.chars().filter(|c| c.is_ascii_digit()).collect()
}

fn country_code(country: &str) -> &'static str {
    COUNTRY_CODES
        .iter()
        .find(|(code, _)| *code == country)
        .map(|(_, dial)| *dial)
        .unwrap_or("254")
}

/// Format a phone number to international `+<code><subscriber>` form.
pub fn format_international(phone: &str, country: &str) -> String {
    let clean = digits(phone);
    let code = country_code(country);

    if clean.starts_with(code) {
        format!("+{}", clean)
    } else if let Some(rest) = clean.strip_prefix('0') {
        format!("+{}{}", code, rest)
    } else {
        format!("+{}{}", code, clean)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhoneValidation {
    pub has_digits: bool,
    pub valid_length: bool,
    pub valid_format: bool,
    pub supported_country: bool,
    pub is_valid: bool,
}

pub fn validate(phone: &str) -> PhoneValidation {
    let clean = digits(phone);

    let has_digits = !clean.is_empty();
    let valid_length = (9..=15).contains(&clean.len());
    let valid_format =
        phone.starts_with('+') || phone.starts_with('0') || phone.chars().all(|c| c.is_ascii_digit());
    let supported_country = COUNTRY_CODES
        .iter()
        .any(|(_, dial)| clean.starts_with(dial));

    PhoneValidation {
        has_digits,
        valid_length,
        valid_format,
        supported_country,
        is_valid: has_digits && valid_length && valid_format && supported_country,
    }
}

/// Identify the mobile network for a Kenyan number, "Unknown" otherwise.
pub fn identify_kenyan_network(phone: &str) -> &'static str {
    let clean = digits(phone);

    let prefix = if let Some(rest) = clean.strip_prefix("254") {
        rest.get(..2)
    } else if let Some(rest) = clean.strip_prefix('0') {
        rest.get(..2)
    } else {
        clean.get(..2)
    };

    prefix
        .and_then(|p| {
            KENYAN_PREFIXES
                .iter()
                .find(|(k, _)| *k == p)
                .map(|(_, net)| *net)
        })
        .unwrap_or("Unknown")
}

/// Human-readable grouping, e.g. `+254 712 345 678` or `0712 345 678`.
pub fn format_display(phone: &str) -> String {
    let clean = digits(phone);

    if clean.starts_with("254") && clean.len() >= 12 {
        format!("+254 {} {} {}", &clean[3..6], &clean[6..9], &clean[9..])
    } else if clean.len() == 10 && clean.starts_with('0') {
        format!("0{} {} {}", &clean[1..4], &clean[4..7], &clean[7..])
    } else {
        phone.to_string()
    }
}

pub fn is_kenyan(phone: &str) -> bool {
    let clean = digits(phone);
    clean.starts_with("254") || (clean.starts_with('0') && clean.len() == 10)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmsCost {
    pub phone_number: String,
    pub is_local: bool,
    pub message_length: usize,
    pub sms_count: usize,
    pub cost_per_sms: f64,
    pub total_cost: f64,
    pub currency: String,
    pub network: String,
}

/// Cost estimate: 160 characters per SMS unit, local vs international rate.
pub fn calculate_cost(phone: &str, message_length: usize) -> SmsCost {
    let is_local = is_kenyan(phone);
    let sms_count = std::cmp::max(1, message_length.div_ceil(CHARS_PER_SMS));
    let cost_per_sms = if is_local {
        LOCAL_RATE_KES
    } else {
        INTERNATIONAL_RATE_KES
    };

    SmsCost {
        phone_number: phone.to_string(),
        is_local,
        message_length,
        sms_count,
        cost_per_sms,
        total_cost: cost_per_sms * sms_count as f64,
        currency: "KES".to_string(),
        network: if is_local {
            identify_kenyan_network(phone).to_string()
        } else {
            "International".to_string()
        },
    }
}
