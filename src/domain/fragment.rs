use {
    super::audit::TransactionKey,
    super::donation::Frequency,
    super::error::LedgerError,
    super::money::{MoneyAmount, as_dollars},
    serde::{Deserialize, Serialize},
    serde_json::{Map, Value},
};

/// Kind of gateway object handed to ingest. Declaration order is merge
/// precedence: earlier kinds win when sources disagree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FragmentKind {
    Invoice,
    CheckoutSession,
    Charge,
    PaymentIntent,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeItem {
    #[serde(rename = "type")]
    pub kind: FragmentKind,
    pub raw: Value,
}

/// What one gateway object says about the transaction. Every field is
/// optional; the merge decides which source wins.
#[derive(Debug, Clone)]
pub struct TransactionFragment {
    pub kind: FragmentKind,
    pub amount: Option<MoneyAmount>,
    pub currency: Option<String>,
    pub customer_id: Option<String>,
    pub customer_email: Option<String>,
    pub invoice_id: Option<String>,
    pub payment_intent_id: Option<String>,
    pub charge_id: Option<String>,
    pub checkout_session_id: Option<String>,
    pub subscription_id: Option<String>,
    pub billing_reason: Option<String>,
    pub session_mode: Option<String>,
    pub created: Option<i64>,
    pub metadata: Map<String, Value>,
    pub raw: Value,
}

impl TransactionFragment {
    pub fn from_item(item: &StripeItem) -> Result<Self, LedgerError> {
        let raw = &item.raw;
        if !raw.is_object() {
            return Err(LedgerError::Validation(format!(
                "{:?} payload must be a JSON object",
                item.kind
            )));
        }

        let mut fragment = Self {
            kind: item.kind,
            amount: None,
            currency: str_at(raw, &["currency"]).map(|c| c.to_ascii_lowercase()),
            customer_id: expandable_id(raw.get("customer")),
            customer_email: None,
            invoice_id: None,
            payment_intent_id: None,
            charge_id: None,
            checkout_session_id: None,
            subscription_id: None,
            billing_reason: None,
            session_mode: None,
            created: raw.get("created").and_then(Value::as_i64),
            metadata: object_at(raw, &["metadata"]),
            raw: raw.clone(),
        };
        let own_id = str_at(raw, &["id"]);

        match item.kind {
            FragmentKind::Invoice => {
                fragment.invoice_id = own_id;
                fragment.amount = amount_at(raw, "amount_paid");
                fragment.customer_email = str_at(raw, &["customer_email"]);
                fragment.payment_intent_id = expandable_id(raw.get("payment_intent"));
                fragment.charge_id = expandable_id(raw.get("charge"));
                fragment.subscription_id = expandable_id(raw.get("subscription")).or_else(|| {
                    str_at(raw, &["parent", "subscription_details", "subscription"])
                });
                fragment.billing_reason = str_at(raw, &["billing_reason"]);
                fragment.metadata = invoice_metadata(raw);
            }
            FragmentKind::CheckoutSession => {
                fragment.checkout_session_id = own_id;
                fragment.amount = amount_at(raw, "amount_total");
                fragment.customer_email = str_at(raw, &["customer_details", "email"])
                    .or_else(|| str_at(raw, &["customer_email"]));
                fragment.payment_intent_id = expandable_id(raw.get("payment_intent"));
                fragment.subscription_id = expandable_id(raw.get("subscription"));
                fragment.invoice_id = expandable_id(raw.get("invoice"));
                fragment.session_mode = str_at(raw, &["mode"]);
            }
            FragmentKind::Charge => {
                fragment.charge_id = own_id;
                fragment.amount = amount_at(raw, "amount");
                fragment.customer_email = str_at(raw, &["billing_details", "email"])
                    .or_else(|| str_at(raw, &["receipt_email"]));
                fragment.payment_intent_id = expandable_id(raw.get("payment_intent"));
                fragment.invoice_id = expandable_id(raw.get("invoice"));
            }
            FragmentKind::PaymentIntent => {
                fragment.payment_intent_id = own_id;
                fragment.amount = amount_at(raw, "amount");
                fragment.customer_email = str_at(raw, &["receipt_email"]);
                fragment.invoice_id = expandable_id(raw.get("invoice"));
                fragment.charge_id = expandable_id(raw.get("latest_charge"));
            }
        }

        Ok(fragment)
    }
}

/// Result of merging every fragment of one transaction.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MergedTransaction {
    #[serde(serialize_with = "serialize_opt_dollars")]
    pub amount: Option<MoneyAmount>,
    pub currency: Option<String>,
    pub customer_id: Option<String>,
    pub customer_email: Option<String>,
    pub invoice_id: Option<String>,
    pub payment_intent_id: Option<String>,
    pub charge_id: Option<String>,
    pub checkout_session_id: Option<String>,
    pub subscription_id: Option<String>,
    pub billing_reason: Option<String>,
    pub session_mode: Option<String>,
    pub created: Option<i64>,
    pub metadata: Map<String, Value>,
}

/// Merges fragments with precedence invoice > checkout session > charge >
/// payment intent. For each field the highest-precedence fragment that has
/// it wins; metadata is merged key by key under the same order.
pub fn merge_fragments(fragments: &[TransactionFragment]) -> MergedTransaction {
    let mut ordered: Vec<&TransactionFragment> = fragments.iter().collect();
    ordered.sort_by_key(|f| f.kind);

    fn first<T>(
        ordered: &[&TransactionFragment],
        pick: impl Fn(&TransactionFragment) -> Option<T>,
    ) -> Option<T> {
        ordered.iter().find_map(|&f| pick(f))
    }

    let mut metadata = Map::new();
    for fragment in ordered.iter().rev() {
        for (key, value) in &fragment.metadata {
            metadata.insert(key.clone(), value.clone());
        }
    }

    MergedTransaction {
        amount: first(&ordered, |f| f.amount),
        currency: first(&ordered, |f| f.currency.clone()),
        customer_id: first(&ordered, |f| f.customer_id.clone()),
        customer_email: first(&ordered, |f| f.customer_email.clone()),
        invoice_id: first(&ordered, |f| f.invoice_id.clone()),
        payment_intent_id: first(&ordered, |f| f.payment_intent_id.clone()),
        charge_id: first(&ordered, |f| f.charge_id.clone()),
        checkout_session_id: first(&ordered, |f| f.checkout_session_id.clone()),
        subscription_id: first(&ordered, |f| f.subscription_id.clone()),
        billing_reason: first(&ordered, |f| f.billing_reason.clone()),
        session_mode: first(&ordered, |f| f.session_mode.clone()),
        created: first(&ordered, |f| f.created),
        metadata,
    }
}

const DONATION_TYPES: [&str; 2] = ["donation", "general"];

impl MergedTransaction {
    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Declared transaction type, if the checkout recorded one.
    pub fn declared_type(&self) -> Option<&str> {
        self.metadata_str("type")
            .or_else(|| self.metadata_str("donation_type"))
    }

    /// Rejects sponsorships, shop orders and anything else that is not a
    /// plain donation.
    pub fn ensure_donation(&self) -> Result<(), LedgerError> {
        match self.declared_type() {
            Some(kind) if !DONATION_TYPES.contains(&kind.to_ascii_lowercase().as_str()) => {
                Err(LedgerError::WrongTransactionType(kind.to_string()))
            }
            _ => Ok(()),
        }
    }

    /// Explicit `frequency` metadata wins; otherwise a subscription context
    /// (renewal or first invoice, subscription-mode checkout) means monthly.
    pub fn frequency(&self) -> Frequency {
        if let Some(raw) = self.metadata_str("frequency") {
            match Frequency::try_from(raw) {
                Ok(frequency) => return frequency,
                Err(e) => tracing::warn!(error = %e, "ignoring unreadable frequency metadata"),
            }
        }
        let subscription_invoice = matches!(
            self.billing_reason.as_deref(),
            Some("subscription_cycle") | Some("subscription_create")
        );
        let subscription_session = self.session_mode.as_deref() == Some("subscription");
        if subscription_invoice || subscription_session {
            Frequency::Monthly
        } else {
            Frequency::OneTime
        }
    }

    pub fn transaction_key(&self) -> Option<TransactionKey> {
        TransactionKey::pick(
            self.invoice_id.as_deref(),
            self.payment_intent_id.as_deref(),
            self.charge_id.as_deref(),
        )
    }
}

fn serialize_opt_dollars<S: serde::Serializer>(
    amount: &Option<MoneyAmount>,
    s: S,
) -> Result<S::Ok, S::Error> {
    match amount {
        Some(amount) => as_dollars(amount, s),
        None => s.serialize_none(),
    }
}

fn str_at(value: &Value, path: &[&str]) -> Option<String> {
    path.iter()
        .try_fold(value, |v, key| v.get(key))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn object_at(value: &Value, path: &[&str]) -> Map<String, Value> {
    path.iter()
        .try_fold(value, |v, key| v.get(key))
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default()
}

fn amount_at(value: &Value, key: &str) -> Option<MoneyAmount> {
    value
        .get(key)
        .and_then(Value::as_i64)
        .and_then(|cents| MoneyAmount::new(cents).ok())
}

/// Stripe expandable field: either the bare id or the expanded object.
fn expandable_id(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(id) if !id.is_empty() => Some(id.clone()),
        Value::Object(obj) => obj.get("id").and_then(Value::as_str).map(str::to_string),
        _ => None,
    }
}

/// Invoice metadata is spread over the line items, the subscription details
/// and the invoice itself; the invoice's own keys take priority.
fn invoice_metadata(raw: &Value) -> Map<String, Value> {
    let mut merged = Map::new();
    let lines = raw
        .get("lines")
        .and_then(|l| l.get("data"))
        .and_then(Value::as_array);
    for line in lines.into_iter().flatten() {
        merged.extend(object_at(line, &["metadata"]));
    }
    merged.extend(object_at(raw, &["subscription_details", "metadata"]));
    merged.extend(object_at(raw, &["parent", "subscription_details", "metadata"]));
    merged.extend(object_at(raw, &["metadata"]));
    merged
}
