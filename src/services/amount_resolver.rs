use {
    crate::domain::{
        donation::Donation,
        error::LedgerError,
        gateway::{ChargeState, GatewayRegistry, MetadataAmount, PaymentGateway},
        id::GatewayRef,
        money::{MoneyAmount, as_dollars},
        principal::Principal,
        store::DonationStore,
    },
    serde::{Deserialize, Serialize},
    uuid::Uuid,
};

/// Half-width of the window searched for a customer's charges around the
/// donation's recorded start.
const CUSTOMER_CHARGE_WINDOW_SECS: i64 = 60 * 60;

/// How far a customer charge may be from the expected amount and still be
/// taken as this donation's charge.
const CUSTOMER_CHARGE_TOLERANCE: i64 = 100;

/// Which piece of gateway evidence produced the amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AmountSource {
    SubscriptionPrice,
    SubscriptionMetadata,
    PaymentIntentMetadata,
    PaymentIntentCharge,
    CustomerChargeWindow,
    PaymentIntentAmount,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedAmount {
    pub amount: MoneyAmount,
    pub source: AmountSource,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Resolved(ResolvedAmount),
    /// No evidence source produced an amount; carries the reason.
    Unresolvable(String),
}

/// Walks the evidence chain for one donation, strongest source first.
pub async fn resolve_amount(
    gateway: &dyn PaymentGateway,
    donation: &Donation,
) -> Result<Resolution, LedgerError> {
    let Some(raw) = donation.gateway_reference() else {
        return Ok(Resolution::Unresolvable("no gateway reference".into()));
    };
    let reference = match GatewayRef::parse(raw) {
        Ok(r) => r,
        Err(e) => return Ok(Resolution::Unresolvable(e.to_string())),
    };

    match reference {
        GatewayRef::Subscription(id) => resolve_subscription(gateway, &id).await,
        GatewayRef::PaymentIntent(id) => resolve_payment_intent(gateway, donation, &id).await,
        other => Ok(Resolution::Unresolvable(format!(
            "reference {other} is neither a subscription nor a payment intent"
        ))),
    }
}

async fn resolve_subscription(
    gateway: &dyn PaymentGateway,
    id: &str,
) -> Result<Resolution, LedgerError> {
    let subscription = gateway.retrieve_subscription(id).await?;

    if let Some(amount) = subscription.line_item_total() {
        return Ok(resolved(amount, AmountSource::SubscriptionPrice));
    }
    if let Some(meta) = MetadataAmount::from_metadata(&subscription.metadata) {
        return Ok(resolved(meta.charged(), AmountSource::SubscriptionMetadata));
    }
    Ok(Resolution::Unresolvable(format!(
        "subscription {id} has neither a line item price nor a metadata amount"
    )))
}

async fn resolve_payment_intent(
    gateway: &dyn PaymentGateway,
    donation: &Donation,
    id: &str,
) -> Result<Resolution, LedgerError> {
    let intent = gateway.retrieve_payment_intent(id).await?;

    if let Some(meta) = MetadataAmount::from_metadata(&intent.metadata) {
        return Ok(resolved(meta.charged(), AmountSource::PaymentIntentMetadata));
    }

    let charges = gateway.list_charges_for_payment_intent(id).await?;
    if let Some(charge) = charges.iter().find(|c| c.state == ChargeState::Succeeded) {
        return Ok(resolved(charge.amount, AmountSource::PaymentIntentCharge));
    }

    let customer = donation
        .stripe_customer_id
        .as_deref()
        .or(intent.customer_id.as_deref());
    if let Some(customer) = customer {
        let start = donation.start_date.timestamp();
        let window = gateway
            .list_customer_charges(
                customer,
                start - CUSTOMER_CHARGE_WINDOW_SECS,
                start + CUSTOMER_CHARGE_WINDOW_SECS,
            )
            .await?;
        let expected = [donation.amount, donation.amount.with_fee_covered()];
        let tolerance = MoneyAmount::new(CUSTOMER_CHARGE_TOLERANCE)?;
        let matched = window.iter().find(|c| {
            c.state == ChargeState::Succeeded
                && expected.iter().any(|e| c.amount.within(*e, tolerance))
        });
        if let Some(charge) = matched {
            return Ok(resolved(charge.amount, AmountSource::CustomerChargeWindow));
        }
    }

    if intent.amount.cents() > 0 {
        return Ok(resolved(intent.amount, AmountSource::PaymentIntentAmount));
    }
    Ok(Resolution::Unresolvable(format!(
        "payment intent {id} yielded no usable amount"
    )))
}

fn resolved(amount: MoneyAmount, source: AmountSource) -> Resolution {
    Resolution::Resolved(ResolvedAmount { amount, source })
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveRequest {
    #[serde(default)]
    pub dry_run: bool,
    /// Restricts the sweep to these donations; all referenced donations
    /// otherwise.
    #[serde(default)]
    pub donation_ids: Option<Vec<Uuid>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AmountUpdate {
    pub id: Uuid,
    #[serde(serialize_with = "as_dollars")]
    pub old_amount: MoneyAmount,
    #[serde(serialize_with = "as_dollars")]
    pub new_amount: MoneyAmount,
    pub source: AmountSource,
    pub receipts_updated: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SkippedDonation {
    pub id: Uuid,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct FailedDonation {
    pub id: Uuid,
    pub error: String,
}

/// Per-donation result of a sweep.
#[derive(Debug, Clone)]
pub enum DonationResolution {
    Updated(AmountUpdate),
    Unchanged,
    Skipped(SkippedDonation),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepReport {
    pub success: bool,
    pub dry_run: bool,
    pub updated_count: usize,
    pub unchanged_count: usize,
    pub updates: Vec<AmountUpdate>,
    pub skipped: Vec<SkippedDonation>,
    pub failed: Vec<FailedDonation>,
}

/// Re-derives the charged amount of every referenced donation and corrects
/// the stored donation and its receipts where they disagree by more than a
/// cent. One donation's failure never stops the sweep.
#[tracing::instrument(name = "resolve_amounts", skip_all, fields(dry_run = request.dry_run))]
pub async fn resolve_donation_amounts(
    store: &dyn DonationStore,
    gateways: &GatewayRegistry,
    principal: &Principal,
    request: ResolveRequest,
) -> Result<SweepReport, LedgerError> {
    principal.require_staff()?;

    let donations = store.donations_for_resolution(request.donation_ids).await?;
    tracing::info!(count = donations.len(), "resolving donation amounts");

    let mut report = SweepReport {
        success: true,
        dry_run: request.dry_run,
        updated_count: 0,
        unchanged_count: 0,
        updates: Vec::new(),
        skipped: Vec::new(),
        failed: Vec::new(),
    };

    for donation in &donations {
        match reconcile_donation(store, gateways, donation, request.dry_run).await {
            Ok(DonationResolution::Updated(update)) => report.updates.push(update),
            Ok(DonationResolution::Unchanged) => report.unchanged_count += 1,
            Ok(DonationResolution::Skipped(skip)) => {
                tracing::info!(donation_id = %skip.id, reason = %skip.reason, "donation skipped");
                report.skipped.push(skip);
            }
            Err(e) => {
                tracing::warn!(donation_id = %donation.id, error = %e, "amount resolution failed");
                report.failed.push(FailedDonation {
                    id: donation.id,
                    error: e.to_string(),
                });
            }
        }
    }

    report.updated_count = report.updates.len();
    tracing::info!(
        updated = report.updated_count,
        unchanged = report.unchanged_count,
        skipped = report.skipped.len(),
        failed = report.failed.len(),
        "amount sweep finished"
    );
    Ok(report)
}

async fn reconcile_donation(
    store: &dyn DonationStore,
    gateways: &GatewayRegistry,
    donation: &Donation,
    dry_run: bool,
) -> Result<DonationResolution, LedgerError> {
    let skip = |reason: String| {
        Ok(DonationResolution::Skipped(SkippedDonation {
            id: donation.id,
            reason,
        }))
    };

    let gateway = match gateways.for_mode(donation.stripe_mode) {
        Ok(g) => g,
        Err(e) => return skip(e.to_string()),
    };

    let resolved = match resolve_amount(gateway, donation).await? {
        Resolution::Resolved(r) => r,
        Resolution::Unresolvable(reason) => return skip(reason),
    };

    if !resolved.amount.differs_materially(donation.amount) {
        return Ok(DonationResolution::Unchanged);
    }

    let mut receipts_updated = 0;
    if !dry_run {
        store
            .update_donation_amount(donation.id, resolved.amount)
            .await?;
        receipts_updated = match store
            .update_receipt_amounts(donation.id, resolved.amount)
            .await
        {
            Ok(n) => n,
            Err(e) => {
                tracing::warn!(donation_id = %donation.id, error = %e, "receipt amount update failed");
                0
            }
        };
    }

    tracing::info!(
        donation_id = %donation.id,
        old = %donation.amount,
        new = %resolved.amount,
        source = ?resolved.source,
        dry_run,
        "donation amount corrected"
    );

    Ok(DonationResolution::Updated(AmountUpdate {
        id: donation.id,
        old_amount: donation.amount,
        new_amount: resolved.amount,
        source: resolved.source,
        receipts_updated,
    }))
}
