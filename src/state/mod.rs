//! Purchase/payment tracking keyed by session id
//!
//! Handlers never touch a shared map directly; everything goes through the
//! `PurchaseTracker` trait so concurrent sessions stay safe. The demo UI pins
//! itself to `DEFAULT_SESSION`, but any session id works.

use crate::models::{PendingConfirmation, PendingPurchase};
use crate::Result;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// The single session id the demo frontend uses.
pub const DEFAULT_SESSION: &str = "default_user_session";

/// Starting simulated mobile-money balance per session.
pub const STARTING_BALANCE: f64 = 400.00;

/// Keyed store for in-flight purchases, PIN confirmations, and the simulated
/// mobile-money balance.
#[async_trait::async_trait]
pub trait PurchaseTracker: Send + Sync {
    async fn pending_purchase(&self, session: &str) -> Result<Option<PendingPurchase>>;

    /// Record a pending purchase; overwrites any existing one for the session.
    async fn put_purchase(&self, session: &str, purchase: PendingPurchase) -> Result<()>;

    /// Flip the confirmation flag. Returns the updated purchase, or `None`
    /// when the session has nothing pending.
    async fn confirm_purchase(&self, session: &str) -> Result<Option<PendingPurchase>>;

    async fn clear_purchase(&self, session: &str) -> Result<()>;

    async fn put_confirmation(&self, session: &str, confirmation: PendingConfirmation)
        -> Result<()>;

    /// Remove and return the pending confirmation, if any.
    async fn take_confirmation(&self, session: &str) -> Result<Option<PendingConfirmation>>;

    async fn balance(&self, session: &str) -> Result<f64>;

    /// Debit the session balance, clamped at zero. Returns the new balance.
    async fn debit(&self, session: &str, amount: f64) -> Result<f64>;
}

/// In-memory tracker for the demo deployment.
pub struct InMemoryTracker {
    purchases: Arc<RwLock<HashMap<String, PendingPurchase>>>,
    confirmations: Arc<RwLock<HashMap<String, PendingConfirmation>>>,
    balances: Arc<RwLock<HashMap<String, f64>>>,
}

impl InMemoryTracker {
    pub fn new() -> Self {
        Self {
            purchases: Arc::new(RwLock::new(HashMap::new())),
            confirmations: Arc::new(RwLock::new(HashMap::new())),
            balances: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for InMemoryTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl PurchaseTracker for InMemoryTracker {
    async fn pending_purchase(&self, session: &str) -> Result<Option<PendingPurchase>> {
        let purchases = self.purchases.read().await;
        Ok(purchases.get(session).cloned())
    }

    async fn put_purchase(&self, session: &str, purchase: PendingPurchase) -> Result<()> {
        let mut purchases = self.purchases.write().await;
        purchases.insert(session.to_string(), purchase);
        Ok(())
    }

    async fn confirm_purchase(&self, session: &str) -> Result<Option<PendingPurchase>> {
        let mut purchases = self.purchases.write().await;
        Ok(purchases.get_mut(session).map(|purchase| {
            purchase.mpesa_confirmed = true;
            purchase.clone()
        }))
    }

    async fn clear_purchase(&self, session: &str) -> Result<()> {
        self.purchases.write().await.remove(session);
        self.confirmations.write().await.remove(session);
        Ok(())
    }

    async fn put_confirmation(
        &self,
        session: &str,
        confirmation: PendingConfirmation,
    ) -> Result<()> {
        let mut confirmations = self.confirmations.write().await;
        confirmations.insert(session.to_string(), confirmation);
        Ok(())
    }

    async fn take_confirmation(&self, session: &str) -> Result<Option<PendingConfirmation>> {
        let mut confirmations = self.confirmations.write().await;
        Ok(confirmations.remove(session))
    }

    async fn balance(&self, session: &str) -> Result<f64> {
        let balances = self.balances.read().await;
        Ok(balances.get(session).copied().unwrap_or(STARTING_BALANCE))
    }

    async fn debit(&self, session: &str, amount: f64) -> Result<f64> {
        let mut balances = self.balances.write().await;
        let balance = balances.entry(session.to_string()).or_insert(STARTING_BALANCE);
        *balance = (*balance - amount).max(0.0);
        Ok(*balance)
    }
}
