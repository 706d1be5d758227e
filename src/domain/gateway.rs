use {
    super::error::LedgerError,
    super::id::StripeMode,
    super::money::MoneyAmount,
    std::{collections::HashMap, future::Future, pin::Pin, sync::Arc},
};

pub type GatewayFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, LedgerError>> + Send + 'a>>;

pub type Metadata = HashMap<String, String>;

#[derive(Debug, Clone)]
pub struct SubscriptionSnapshot {
    pub id: String,
    /// Unit price of the first line item, when Stripe reports one.
    pub unit_amount: Option<MoneyAmount>,
    pub quantity: u64,
    pub metadata: Metadata,
}

impl SubscriptionSnapshot {
    pub fn line_item_total(&self) -> Option<MoneyAmount> {
        let unit = self.unit_amount?;
        let total = unit.cents().checked_mul(self.quantity.max(1) as i64)?;
        MoneyAmount::new(total).ok().filter(|a| a.cents() > 0)
    }
}

#[derive(Debug, Clone)]
pub struct PaymentIntentSnapshot {
    pub id: String,
    pub amount: MoneyAmount,
    pub currency: String,
    pub customer_id: Option<String>,
    pub created: i64,
    pub metadata: Metadata,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChargeState {
    Succeeded,
    Pending,
    Failed,
}

#[derive(Debug, Clone)]
pub struct ChargeSnapshot {
    pub id: String,
    pub amount: MoneyAmount,
    pub state: ChargeState,
    pub created: i64,
    pub payment_intent_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SetupIntentSnapshot {
    pub id: String,
    pub customer_id: Option<String>,
    pub payment_method_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct OffSessionChargeRequest {
    pub amount: MoneyAmount,
    pub currency: String,
    pub customer_id: String,
    pub payment_method_id: String,
    pub description: String,
    pub metadata: Metadata,
    /// Sent as Stripe's `Idempotency-Key`, so a retried settlement run
    /// cannot charge the same pledge twice.
    pub idempotency_key: String,
}

#[derive(Debug, Clone)]
pub struct OffSessionChargeResult {
    pub payment_intent_id: String,
    pub succeeded: bool,
    pub status: String,
}

/// The subset of the Stripe API the reconciliation code consumes.
pub trait PaymentGateway: Send + Sync {
    fn retrieve_subscription(&self, id: &str) -> GatewayFuture<'_, SubscriptionSnapshot>;

    fn retrieve_payment_intent(&self, id: &str) -> GatewayFuture<'_, PaymentIntentSnapshot>;

    fn list_charges_for_payment_intent(
        &self,
        payment_intent_id: &str,
    ) -> GatewayFuture<'_, Vec<ChargeSnapshot>>;

    /// Charges of `customer_id` created within `[from, to]` (unix seconds).
    fn list_customer_charges(
        &self,
        customer_id: &str,
        from: i64,
        to: i64,
    ) -> GatewayFuture<'_, Vec<ChargeSnapshot>>;

    fn retrieve_setup_intent(&self, id: &str) -> GatewayFuture<'_, SetupIntentSnapshot>;

    fn create_off_session_charge(
        &self,
        request: OffSessionChargeRequest,
    ) -> GatewayFuture<'_, OffSessionChargeResult>;
}

/// One gateway per Stripe environment; either may be unconfigured.
#[derive(Clone, Default)]
pub struct GatewayRegistry {
    test: Option<Arc<dyn PaymentGateway>>,
    live: Option<Arc<dyn PaymentGateway>>,
}

impl GatewayRegistry {
    pub fn new(
        test: Option<Arc<dyn PaymentGateway>>,
        live: Option<Arc<dyn PaymentGateway>>,
    ) -> Self {
        Self { test, live }
    }

    pub fn for_mode(&self, mode: StripeMode) -> Result<&dyn PaymentGateway, LedgerError> {
        let gateway = match mode {
            StripeMode::Test => self.test.as_deref(),
            StripeMode::Live => self.live.as_deref(),
        };
        gateway.ok_or_else(|| LedgerError::MissingCredential(mode.to_string()))
    }
}

/// Amount a donor asked for, as recorded in Stripe metadata by checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetadataAmount {
    pub amount: MoneyAmount,
    pub cover_stripe_fee: bool,
}

impl MetadataAmount {
    pub fn from_metadata(metadata: &Metadata) -> Option<Self> {
        let amount = metadata
            .get("amount")
            .and_then(|raw| MoneyAmount::from_dollars_str(raw))?;
        let cover_stripe_fee = metadata
            .get("coverStripeFee")
            .or_else(|| metadata.get("cover_stripe_fee"))
            .is_some_and(|flag| is_truthy(flag));
        Some(Self {
            amount,
            cover_stripe_fee,
        })
    }

    /// What the card was actually charged for this gift.
    pub fn charged(&self) -> MoneyAmount {
        if self.cover_stripe_fee {
            self.amount.with_fee_covered()
        } else {
            self.amount
        }
    }
}

pub fn is_truthy(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "yes" | "on"
    )
}
