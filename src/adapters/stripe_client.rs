use {
    crate::domain::{
        error::LedgerError,
        gateway::{
            ChargeSnapshot, ChargeState, GatewayFuture, Metadata, OffSessionChargeRequest,
            OffSessionChargeResult, PaymentGateway, PaymentIntentSnapshot, SetupIntentSnapshot,
            SubscriptionSnapshot,
        },
        money::MoneyAmount,
    },
    serde::Serialize,
};

/// Page size for charge listings. Both listings are narrow (one intent, or
/// one customer over two hours), so the first page is enough.
const CHARGE_PAGE_LIMIT: u64 = 100;

/// [`PaymentGateway`] backed by one Stripe account key.
pub struct StripeGateway {
    client: stripe::Client,
}

impl StripeGateway {
    pub fn new(secret_key: &str) -> Self {
        Self {
            client: stripe::Client::new(secret_key),
        }
    }
}

impl PaymentGateway for StripeGateway {
    fn retrieve_subscription(&self, id: &str) -> GatewayFuture<'_, SubscriptionSnapshot> {
        let id = id.to_string();
        Box::pin(async move {
            let sub_id = parse_id::<stripe::SubscriptionId>(&id, "Subscription")?;
            let sub = stripe::Subscription::retrieve(&self.client, &sub_id, &[]).await?;

            // First line item only: donation subscriptions carry one price.
            let items = serde_json::to_value(&sub.items)?;
            let first = &items["data"][0];
            let unit_amount = first["price"]["unit_amount"]
                .as_i64()
                .map(convert_amount)
                .transpose()?;
            let quantity = first["quantity"].as_u64().unwrap_or(1);

            Ok(SubscriptionSnapshot {
                id: sub.id.to_string(),
                unit_amount,
                quantity,
                metadata: convert_metadata(&sub.metadata)?,
            })
        })
    }

    fn retrieve_payment_intent(&self, id: &str) -> GatewayFuture<'_, PaymentIntentSnapshot> {
        let id = id.to_string();
        Box::pin(async move {
            let pi_id = parse_id::<stripe::PaymentIntentId>(&id, "PaymentIntent")?;
            let pi = stripe::PaymentIntent::retrieve(&self.client, &pi_id, &[]).await?;

            Ok(PaymentIntentSnapshot {
                id: pi.id.to_string(),
                amount: convert_amount(pi.amount)?,
                currency: pi.currency.to_string(),
                customer_id: pi.customer.as_ref().map(expandable_id),
                created: pi.created,
                metadata: convert_metadata(&pi.metadata)?,
            })
        })
    }

    fn list_charges_for_payment_intent(
        &self,
        payment_intent_id: &str,
    ) -> GatewayFuture<'_, Vec<ChargeSnapshot>> {
        let payment_intent_id = payment_intent_id.to_string();
        Box::pin(async move {
            let pi_id = parse_id::<stripe::PaymentIntentId>(&payment_intent_id, "PaymentIntent")?;
            let mut params = stripe::ListCharges::new();
            params.payment_intent = Some(pi_id);
            params.limit = Some(CHARGE_PAGE_LIMIT);

            let charges = stripe::Charge::list(&self.client, &params).await?;
            charges.data.iter().map(convert_charge).collect()
        })
    }

    fn list_customer_charges(
        &self,
        customer_id: &str,
        from: i64,
        to: i64,
    ) -> GatewayFuture<'_, Vec<ChargeSnapshot>> {
        let customer_id = customer_id.to_string();
        Box::pin(async move {
            let customer = parse_id::<stripe::CustomerId>(&customer_id, "Customer")?;
            let mut params = stripe::ListCharges::new();
            params.customer = Some(customer);
            params.created = Some(stripe::RangeQuery::Bounds(stripe::RangeBounds {
                gt: None,
                gte: Some(from),
                lt: None,
                lte: Some(to),
            }));
            params.limit = Some(CHARGE_PAGE_LIMIT);

            let charges = stripe::Charge::list(&self.client, &params).await?;
            charges.data.iter().map(convert_charge).collect()
        })
    }

    fn retrieve_setup_intent(&self, id: &str) -> GatewayFuture<'_, SetupIntentSnapshot> {
        let id = id.to_string();
        Box::pin(async move {
            let si_id = parse_id::<stripe::SetupIntentId>(&id, "SetupIntent")?;
            let si = stripe::SetupIntent::retrieve(&self.client, &si_id, &[]).await?;

            Ok(SetupIntentSnapshot {
                id: si.id.to_string(),
                customer_id: si.customer.as_ref().map(expandable_id),
                payment_method_id: si.payment_method.as_ref().map(expandable_id),
            })
        })
    }

    fn create_off_session_charge(
        &self,
        request: OffSessionChargeRequest,
    ) -> GatewayFuture<'_, OffSessionChargeResult> {
        Box::pin(async move {
            let currency = request
                .currency
                .parse::<stripe::Currency>()
                .map_err(|_| LedgerError::Validation(format!("unsupported currency: {}", request.currency)))?;
            let customer = parse_id::<stripe::CustomerId>(&request.customer_id, "Customer")?;
            let payment_method =
                parse_id::<stripe::PaymentMethodId>(&request.payment_method_id, "PaymentMethod")?;

            let mut params = stripe::CreatePaymentIntent::new(request.amount.cents(), currency);
            params.customer = Some(customer);
            params.payment_method = Some(payment_method);
            params.confirm = Some(true);
            params.off_session = Some(stripe::PaymentIntentOffSession::Exists(true));
            params.description = Some(request.description.as_str());
            params.metadata = Some(request.metadata.clone());

            let client = self
                .client
                .clone()
                .with_strategy(stripe::RequestStrategy::Idempotent(request.idempotency_key.clone()));
            let pi = stripe::PaymentIntent::create(&client, params).await?;

            Ok(OffSessionChargeResult {
                payment_intent_id: pi.id.to_string(),
                succeeded: pi.status == stripe::PaymentIntentStatus::Succeeded,
                status: pi.status.as_str().to_string(),
            })
        })
    }
}

// ── Conversion helpers ──────────────────────────────────────────────────────

fn parse_id<T>(raw: &str, kind: &str) -> Result<T, LedgerError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse::<T>()
        .map_err(|e| LedgerError::Validation(format!("invalid {kind} id `{raw}`: {e}")))
}

fn expandable_id<T: stripe::Object>(e: &stripe::Expandable<T>) -> String
where
    T::Id: ToString,
{
    match e {
        stripe::Expandable::Id(id) => id.to_string(),
        stripe::Expandable::Object(obj) => obj.id().to_string(),
    }
}

pub fn convert_amount(amount: i64) -> Result<MoneyAmount, LedgerError> {
    if amount < 0 {
        return Err(LedgerError::Validation("negative amount".into()));
    }
    MoneyAmount::new(amount)
}

/// Flattens whatever metadata shape the object carries into string pairs.
/// Absent metadata is an empty map.
pub fn convert_metadata<M: Serialize>(metadata: &M) -> Result<Metadata, LedgerError> {
    let value = serde_json::to_value(metadata)?;
    Ok(value
        .as_object()
        .map(|map| {
            map.iter()
                .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                .collect()
        })
        .unwrap_or_default())
}

pub fn convert_charge_status(status: stripe::ChargeStatus) -> ChargeState {
    #[allow(unreachable_patterns)]
    match status {
        stripe::ChargeStatus::Succeeded => ChargeState::Succeeded,
        stripe::ChargeStatus::Pending => ChargeState::Pending,
        stripe::ChargeStatus::Failed => ChargeState::Failed,
        other => {
            tracing::warn!("unknown ChargeStatus: {other:?}, treating as pending");
            ChargeState::Pending
        }
    }
}

fn convert_charge(charge: &stripe::Charge) -> Result<ChargeSnapshot, LedgerError> {
    Ok(ChargeSnapshot {
        id: charge.id.to_string(),
        amount: convert_amount(charge.amount)?,
        state: convert_charge_status(charge.status),
        created: charge.created,
        payment_intent_id: charge.payment_intent.as_ref().map(expandable_id),
    })
}
