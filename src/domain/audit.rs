use {
    super::id::StripeMode,
    super::money::MoneyAmount,
    chrono::{DateTime, Utc},
    serde::Serialize,
    uuid::Uuid,
};

/// Denormalized snapshot of every raw gateway object behind one
/// donation/receipt pair. Append-only; replayable for forensics.
#[derive(Debug, Clone, Serialize)]
pub struct CombinedTransaction {
    pub id: Uuid,
    pub stripe_mode: StripeMode,
    pub invoice_id: Option<String>,
    pub payment_intent_id: Option<String>,
    pub charge_id: Option<String>,
    pub checkout_session_id: Option<String>,
    pub subscription_id: Option<String>,
    pub customer_id: Option<String>,
    pub donation_id: Option<Uuid>,
    pub receipt_id: Option<Uuid>,
    pub amount: MoneyAmount,
    pub currency: String,
    pub raw_invoice: Option<serde_json::Value>,
    pub raw_charge: Option<serde_json::Value>,
    pub raw_payment_intent: Option<serde_json::Value>,
    pub raw_checkout_session: Option<serde_json::Value>,
    pub merged_metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Which column of the audit table an idempotency key lives in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionKey {
    Invoice(String),
    PaymentIntent(String),
    Charge(String),
}

impl TransactionKey {
    /// First present of invoice, payment intent, charge.
    pub fn pick(
        invoice_id: Option<&str>,
        payment_intent_id: Option<&str>,
        charge_id: Option<&str>,
    ) -> Option<Self> {
        invoice_id
            .map(|id| Self::Invoice(id.to_string()))
            .or_else(|| payment_intent_id.map(|id| Self::PaymentIntent(id.to_string())))
            .or_else(|| charge_id.map(|id| Self::Charge(id.to_string())))
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Invoice(id) | Self::PaymentIntent(id) | Self::Charge(id) => id,
        }
    }

    pub fn column(&self) -> &'static str {
        match self {
            Self::Invoice(_) => "invoice_id",
            Self::PaymentIntent(_) => "payment_intent_id",
            Self::Charge(_) => "charge_id",
        }
    }
}
