//! TextAHBAR trading gateway
//!
//! Demo web backend stitching together an SMS gateway, a Hedera-style token
//! ledger, and an AI chat API behind HTTP endpoints: SMS-triggered stock
//! purchases paid via simulated mobile money, settled with token transfers.

pub mod api;
pub mod audit;
pub mod bedrock;
pub mod chat;
pub mod config;
pub mod error;
pub mod hedera;
pub mod models;
pub mod sms;
pub mod state;
pub mod stocks;

pub use error::{GatewayError, Result};
