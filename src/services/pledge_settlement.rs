use {
    crate::domain::{
        error::LedgerError,
        gateway::{GatewayRegistry, Metadata, OffSessionChargeRequest, PaymentGateway},
        money::{MoneyAmount, as_dollars},
        pledge::{Pledge, PledgeEvent, PledgeOutcome},
        principal::Principal,
        store::PledgeStore,
    },
    serde::{Deserialize, Serialize},
    uuid::Uuid,
};

#[derive(Debug, Clone, Deserialize)]
pub struct SettleRequest {
    pub event_id: Uuid,
    pub actual_miles: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PledgeResult {
    pub pledge_id: Uuid,
    pub pledger_name: String,
    pub status: &'static str,
    #[serde(serialize_with = "as_dollars")]
    pub amount: MoneyAmount,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_intent_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SettlementSummary {
    pub total: usize,
    pub charged: usize,
    pub failed: usize,
    pub skipped: usize,
    #[serde(serialize_with = "as_dollars")]
    pub total_collected: MoneyAmount,
}

#[derive(Debug, Clone, Serialize)]
pub struct SettlementReport {
    pub summary: SettlementSummary,
    pub results: Vec<PledgeResult>,
    /// False when every pledge was processed but the event could not be
    /// moved to `charges_processed`.
    pub event_settled: bool,
}

/// Charges every pending pledge of an event for the measured distance.
///
/// Pledges are processed one after another; each one ends `charged` or
/// `failed` regardless of what happened to the others, and the event is
/// marked settled once the loop completes.
#[tracing::instrument(name = "settle_event", skip_all, fields(event_id = %request.event_id))]
pub async fn settle_event(
    store: &dyn PledgeStore,
    gateways: &GatewayRegistry,
    principal: &Principal,
    request: SettleRequest,
) -> Result<SettlementReport, LedgerError> {
    principal.require_staff()?;

    let event = store
        .find_event(request.event_id)
        .await?
        .ok_or_else(|| LedgerError::NotFound(format!("event {}", request.event_id)))?;
    event.validate_outcome(request.actual_miles)?;

    store
        .record_event_outcome(event.id, request.actual_miles)
        .await?;
    let pending = store.pending_pledges(event.id).await?;
    tracing::info!(pledges = pending.len(), actual_miles = request.actual_miles, "settling pledges");

    let mut results = Vec::with_capacity(pending.len());
    for pledge in &pending {
        results.push(settle_pledge(store, gateways, &event, pledge, request.actual_miles).await);
    }

    let event_settled = match store.mark_event_settled(event.id).await {
        Ok(()) => true,
        Err(e) => {
            tracing::error!(error = %e, "pledges processed but event status update failed");
            false
        }
    };

    let summary = summarize(&results);
    tracing::info!(
        charged = summary.charged,
        failed = summary.failed,
        skipped = summary.skipped,
        collected = %summary.total_collected,
        "settlement finished"
    );

    Ok(SettlementReport {
        summary,
        results,
        event_settled,
    })
}

fn summarize(results: &[PledgeResult]) -> SettlementSummary {
    results
        .iter()
        .fold(SettlementSummary::default(), |mut summary, r| {
            summary.total += 1;
            match r.status {
                "charged" => {
                    summary.charged += 1;
                    summary.total_collected = summary.total_collected + r.amount;
                }
                "skipped" => summary.skipped += 1,
                _ => summary.failed += 1,
            }
            summary
        })
}

/// Settles one pledge. Never fails: every error becomes a `failed` result.
async fn settle_pledge(
    store: &dyn PledgeStore,
    gateways: &GatewayRegistry,
    event: &PledgeEvent,
    pledge: &Pledge,
    actual_miles: f64,
) -> PledgeResult {
    let amount = pledge.total_for(actual_miles);

    let outcome = match PledgeOutcome::classify_total(amount) {
        Some(below_minimum) => below_minimum,
        None => match charge_pledge(gateways, event, pledge, amount, actual_miles).await {
            Ok(payment_intent_id) => PledgeOutcome::Charged {
                amount,
                payment_intent_id,
            },
            Err(e) => {
                tracing::warn!(pledge_id = %pledge.id, error = %e, "pledge charge failed");
                PledgeOutcome::Failed {
                    amount,
                    error: e.to_string(),
                }
            }
        },
    };

    let mut result = PledgeResult {
        pledge_id: pledge.id,
        pledger_name: pledge.pledger_name.clone(),
        status: outcome.label(),
        amount: outcome.amount(),
        payment_intent_id: outcome.payment_intent_id().map(str::to_string),
        error: outcome.failure_reason().map(str::to_string),
    };

    match store.record_pledge_outcome(pledge.id, outcome).await {
        Ok(true) => {}
        Ok(false) => {
            tracing::warn!(pledge_id = %pledge.id, "pledge left pending before its outcome was written");
        }
        Err(e) => {
            tracing::error!(pledge_id = %pledge.id, error = %e, "failed to record pledge outcome");
            let prefix = match &result.payment_intent_id {
                Some(pi) => format!("charged as {pi} but "),
                None => String::new(),
            };
            result.status = "failed";
            result.error = Some(format!("{prefix}recording the outcome failed: {e}"));
        }
    }

    result
}

async fn charge_pledge(
    gateways: &GatewayRegistry,
    event: &PledgeEvent,
    pledge: &Pledge,
    amount: MoneyAmount,
    actual_miles: f64,
) -> Result<String, LedgerError> {
    let gateway = gateways.for_mode(pledge.stripe_mode)?;
    let (customer_id, payment_method_id) = resolve_payment_method(gateway, pledge).await?;

    let metadata: Metadata = [
        ("type", "pledge".to_string()),
        ("pledge_id", pledge.id.to_string()),
        ("event_id", event.id.to_string()),
        ("cents_per_mile", pledge.cents_per_mile.to_string()),
        ("actual_miles", actual_miles.to_string()),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect();

    let charge = gateway
        .create_off_session_charge(OffSessionChargeRequest {
            amount,
            currency: "usd".into(),
            customer_id,
            payment_method_id,
            description: format!("{} pledge: {actual_miles} miles", event.name),
            metadata,
            idempotency_key: format!("pledge-{}-{}", pledge.id, amount.cents()),
        })
        .await?;

    if !charge.succeeded {
        return Err(LedgerError::Gateway(format!(
            "payment intent {} ended in status {}",
            charge.payment_intent_id, charge.status
        )));
    }
    Ok(charge.payment_intent_id)
}

/// Stored payment method first, else whatever the saved setup intent
/// collected. The customer falls back the same way.
async fn resolve_payment_method(
    gateway: &dyn PaymentGateway,
    pledge: &Pledge,
) -> Result<(String, String), LedgerError> {
    let mut customer_id = pledge.stripe_customer_id.clone();
    let mut payment_method_id = pledge.stripe_payment_method_id.clone();

    if customer_id.is_none() || payment_method_id.is_none() {
        if let Some(setup_intent_id) = &pledge.stripe_setup_intent_id {
            let setup = gateway.retrieve_setup_intent(setup_intent_id).await?;
            customer_id = customer_id.or(setup.customer_id);
            payment_method_id = payment_method_id.or(setup.payment_method_id);
        }
    }

    let payment_method_id = payment_method_id
        .ok_or_else(|| LedgerError::Validation("no payment method on file".into()))?;
    let customer_id = customer_id
        .ok_or_else(|| LedgerError::Validation("no Stripe customer on file".into()))?;
    Ok((customer_id, payment_method_id))
}
