use {
    crate::domain::{
        audit::CombinedTransaction,
        donation::{Donation, DonorIdentity, NewDonation, NewReceipt, Receipt},
        error::LedgerError,
        fragment::{FragmentKind, MergedTransaction, StripeItem, TransactionFragment, merge_fragments},
        id::StripeMode,
        money::MoneyAmount,
        principal::Principal,
        store::{DonationStore, ProfileStore},
        trace::Trace,
    },
    chrono::{DateTime, Utc},
    serde::{Deserialize, Serialize},
    serde_json::json,
    uuid::Uuid,
};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestRequest {
    pub stripe_items: Vec<StripeItem>,
    #[serde(default)]
    pub email: Option<String>,
    pub stripe_mode: StripeMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestAction {
    Created,
    AlreadyExists,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestOutcome {
    pub success: bool,
    pub action: IngestAction,
    pub donation: Option<Donation>,
    pub receipt: Option<Receipt>,
    pub combined_transaction: Option<CombinedTransaction>,
    pub existing_donation: bool,
    pub extracted_data: MergedTransaction,
}

/// Turns a bundle of Stripe objects describing one payment into a donation,
/// a receipt and an audit snapshot. Re-ingesting the same transaction is a
/// no-op that returns the snapshot recorded the first time.
#[tracing::instrument(
    name = "ingest_donation",
    skip_all,
    fields(stripe_mode = %request.stripe_mode, items = request.stripe_items.len())
)]
pub async fn ingest_donation(
    store: &dyn DonationStore,
    profiles: &dyn ProfileStore,
    principal: &Principal,
    request: IngestRequest,
    trace: &mut Trace,
) -> Result<IngestOutcome, LedgerError> {
    principal.require_staff()?;
    trace.record("authorized", json!({ "user_id": principal.user_id, "role": principal.role.as_str() }));

    if request.stripe_items.is_empty() {
        return Err(LedgerError::Validation("stripeItems must not be empty".into()));
    }
    let mode = request.stripe_mode;

    let fragments = request
        .stripe_items
        .iter()
        .map(TransactionFragment::from_item)
        .collect::<Result<Vec<_>, _>>()?;
    let merged = merge_fragments(&fragments);
    trace.record(
        "merged",
        json!({
            "kinds": fragments.iter().map(|f| f.kind).collect::<Vec<_>>(),
            "amount_cents": merged.amount.map(|a| a.cents()),
            "invoice_id": merged.invoice_id,
            "payment_intent_id": merged.payment_intent_id,
            "charge_id": merged.charge_id,
        }),
    );

    merged.ensure_donation()?;

    let amount = merged
        .amount
        .filter(|a| a.cents() > 0)
        .ok_or_else(|| LedgerError::Validation("no positive amount found in stripeItems".into()))?;
    let key = merged.transaction_key().ok_or_else(|| {
        LedgerError::Validation("stripeItems carry no invoice, payment intent or charge id".into())
    })?;
    trace.record("transaction_key", json!({ "column": key.column(), "value": key.as_str() }));

    if let Some(existing) = store.find_combined(mode, &key).await? {
        tracing::info!(key = %key.as_str(), combined_id = %existing.id, "transaction already ingested");
        trace.record("already_exists", json!({ "combined_id": existing.id }));
        let donation = match existing.donation_id {
            Some(id) => store.find_donation(id).await?,
            None => None,
        };
        let receipt = match existing.receipt_id {
            Some(id) => store.find_receipt_by_id(id).await?,
            None => None,
        };
        return Ok(IngestOutcome {
            success: true,
            action: IngestAction::AlreadyExists,
            donation,
            receipt,
            combined_transaction: Some(existing),
            existing_donation: true,
            extracted_data: merged,
        });
    }

    let email = request
        .email
        .as_deref()
        .map(str::trim)
        .filter(|e| !e.is_empty())
        .map(str::to_string)
        .or_else(|| merged.customer_email.clone())
        .ok_or_else(|| LedgerError::Validation("donor email is required".into()))?;

    let occurred_at = merged
        .created
        .and_then(|ts| DateTime::<Utc>::from_timestamp(ts, 0))
        .unwrap_or_else(Utc::now);

    let (donation, existing_donation) = match find_existing_donation(store, mode, &merged).await? {
        Some(donation) => {
            trace.record("donation_reused", json!({ "donation_id": donation.id }));
            (donation, true)
        }
        None => {
            let donor = match profiles.find_user_id_by_email(&email).await? {
                Some(user_id) => DonorIdentity::User(user_id),
                None => DonorIdentity::Email(email.clone()),
            };
            let new = NewDonation {
                id: Uuid::now_v7(),
                donor,
                amount,
                currency: merged.currency.clone().unwrap_or_else(|| "usd".into()),
                frequency: merged.frequency(),
                stripe_mode: mode,
                stripe_subscription_id: merged.subscription_id.clone(),
                stripe_payment_intent_id: merged.payment_intent_id.clone(),
                stripe_customer_id: merged.customer_id.clone(),
                start_date: occurred_at,
                metadata: serde_json::Value::Object(merged.metadata.clone()),
            };
            let donation = store.insert_donation(new).await?;
            tracing::info!(donation_id = %donation.id, amount = %amount, "donation created");
            trace.record("donation_created", json!({ "donation_id": donation.id }));
            (donation, false)
        }
    };

    let receipt = match ensure_receipt(store, mode, key.as_str(), &donation, amount, occurred_at).await {
        Ok(receipt) => {
            trace.record("receipt", json!({ "receipt_id": receipt.id, "number": receipt.receipt_number }));
            Some(receipt)
        }
        Err(e) => {
            tracing::warn!(donation_id = %donation.id, error = %e, "receipt creation failed");
            trace.record("receipt_failed", json!({ "error": e.to_string() }));
            None
        }
    };

    let snapshot = combined_snapshot(mode, &fragments, &merged, amount, &donation, receipt.as_ref());
    let combined_transaction = match store.insert_combined(snapshot).await {
        Ok(row) => {
            trace.record("combined_transaction_created", json!({ "combined_id": row.id }));
            Some(row)
        }
        Err(e) => {
            tracing::warn!(donation_id = %donation.id, error = %e, "audit snapshot insert failed");
            trace.record("combined_transaction_failed", json!({ "error": e.to_string() }));
            None
        }
    };

    Ok(IngestOutcome {
        success: true,
        action: IngestAction::Created,
        donation: Some(donation),
        receipt,
        combined_transaction,
        existing_donation,
        extracted_data: merged,
    })
}

/// Renewal invoices of a subscription and repeated events of a payment
/// intent attach to the donation recorded first.
async fn find_existing_donation(
    store: &dyn DonationStore,
    mode: StripeMode,
    merged: &MergedTransaction,
) -> Result<Option<Donation>, LedgerError> {
    if let Some(subscription_id) = &merged.subscription_id {
        if let Some(donation) = store.find_donation_by_subscription(mode, subscription_id).await? {
            return Ok(Some(donation));
        }
    }
    if let Some(payment_intent_id) = &merged.payment_intent_id {
        return store.find_donation_by_payment_intent(mode, payment_intent_id).await;
    }
    Ok(None)
}

async fn ensure_receipt(
    store: &dyn DonationStore,
    mode: StripeMode,
    transaction_id: &str,
    donation: &Donation,
    amount: MoneyAmount,
    issued_at: DateTime<Utc>,
) -> Result<Receipt, LedgerError> {
    if let Some(receipt) = store.find_receipt(mode, transaction_id).await? {
        return Ok(receipt);
    }
    let id = Uuid::now_v7();
    store
        .insert_receipt(NewReceipt {
            id,
            donation_id: donation.id,
            transaction_id: transaction_id.to_string(),
            stripe_mode: mode,
            receipt_number: NewReceipt::number_for(id, issued_at),
            donor: donation.donor.clone(),
            amount,
            currency: donation.currency.clone(),
            frequency: donation.frequency,
            issued_at,
        })
        .await
}

fn combined_snapshot(
    mode: StripeMode,
    fragments: &[TransactionFragment],
    merged: &MergedTransaction,
    amount: MoneyAmount,
    donation: &Donation,
    receipt: Option<&Receipt>,
) -> CombinedTransaction {
    let raw_of = |kind: FragmentKind| {
        fragments
            .iter()
            .find(|f| f.kind == kind)
            .map(|f| f.raw.clone())
    };

    CombinedTransaction {
        id: Uuid::now_v7(),
        stripe_mode: mode,
        invoice_id: merged.invoice_id.clone(),
        payment_intent_id: merged.payment_intent_id.clone(),
        charge_id: merged.charge_id.clone(),
        checkout_session_id: merged.checkout_session_id.clone(),
        subscription_id: merged.subscription_id.clone(),
        customer_id: merged.customer_id.clone(),
        donation_id: Some(donation.id),
        receipt_id: receipt.map(|r| r.id),
        amount,
        currency: donation.currency.clone(),
        raw_invoice: raw_of(FragmentKind::Invoice),
        raw_charge: raw_of(FragmentKind::Charge),
        raw_payment_intent: raw_of(FragmentKind::PaymentIntent),
        raw_checkout_session: raw_of(FragmentKind::CheckoutSession),
        merged_metadata: serde_json::Value::Object(merged.metadata.clone()),
        created_at: Utc::now(),
    }
}
