use {
    crate::domain::{
        error::LedgerError,
        id::StripeMode,
        money::MoneyAmount,
        pledge::{EventStatus, Pledge, PledgeEvent, PledgeOutcome, PledgeStatus},
    },
    chrono::{DateTime, Utc},
    sqlx::PgPool,
    uuid::Uuid,
};

#[derive(Debug, sqlx::FromRow)]
struct EventRow {
    id: Uuid,
    name: String,
    target_miles: f64,
    actual_miles: Option<f64>,
    status: String,
}

impl TryFrom<EventRow> for PledgeEvent {
    type Error = LedgerError;

    fn try_from(row: EventRow) -> Result<Self, Self::Error> {
        Ok(PledgeEvent {
            id: row.id,
            name: row.name,
            target_miles: row.target_miles,
            actual_miles: row.actual_miles,
            status: EventStatus::try_from(row.status.as_str())?,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PledgeRow {
    id: Uuid,
    event_id: Uuid,
    pledger_name: String,
    pledger_email: Option<String>,
    cents_per_mile: i64,
    max_amount_cents: Option<i64>,
    stripe_customer_id: Option<String>,
    stripe_setup_intent_id: Option<String>,
    stripe_payment_method_id: Option<String>,
    stripe_mode: String,
    status: String,
    computed_total_cents: Option<i64>,
    stripe_payment_intent_id: Option<String>,
    failure_reason: Option<String>,
    charged_at: Option<DateTime<Utc>>,
}

impl TryFrom<PledgeRow> for Pledge {
    type Error = LedgerError;

    fn try_from(row: PledgeRow) -> Result<Self, Self::Error> {
        Ok(Pledge {
            id: row.id,
            event_id: row.event_id,
            pledger_name: row.pledger_name,
            pledger_email: row.pledger_email,
            cents_per_mile: row.cents_per_mile,
            max_amount: row.max_amount_cents.map(MoneyAmount::new).transpose()?,
            stripe_customer_id: row.stripe_customer_id,
            stripe_setup_intent_id: row.stripe_setup_intent_id,
            stripe_payment_method_id: row.stripe_payment_method_id,
            stripe_mode: StripeMode::try_from(row.stripe_mode.as_str())?,
            status: PledgeStatus::try_from(row.status.as_str())?,
            computed_total: row.computed_total_cents.map(MoneyAmount::new).transpose()?,
            stripe_payment_intent_id: row.stripe_payment_intent_id,
            failure_reason: row.failure_reason,
            charged_at: row.charged_at,
        })
    }
}

pub async fn find_event(pool: &PgPool, id: Uuid) -> Result<Option<PledgeEvent>, LedgerError> {
    sqlx::query_as::<_, EventRow>(
        "SELECT id, name, target_miles, actual_miles, status FROM pledge_events WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .map(PledgeEvent::try_from)
    .transpose()
}

pub async fn record_event_outcome(pool: &PgPool, id: Uuid, actual_miles: f64) -> Result<(), LedgerError> {
    let result = sqlx::query(
        "UPDATE pledge_events SET actual_miles = $2, status = $3, updated_at = now() \
         WHERE id = $1 AND status <> $4",
    )
    .bind(id)
    .bind(actual_miles)
    .bind(EventStatus::Completed.as_str())
    .bind(EventStatus::ChargesProcessed.as_str())
    .execute(pool)
    .await?;
    if result.rows_affected() == 0 {
        return Err(LedgerError::Conflict(format!(
            "event {id} was settled concurrently"
        )));
    }
    Ok(())
}

pub async fn pending_pledges(pool: &PgPool, event_id: Uuid) -> Result<Vec<Pledge>, LedgerError> {
    sqlx::query_as::<_, PledgeRow>(
        r#"
        SELECT id, event_id, pledger_name, pledger_email, cents_per_mile, max_amount_cents,
               stripe_customer_id, stripe_setup_intent_id, stripe_payment_method_id,
               stripe_mode, status, computed_total_cents, stripe_payment_intent_id,
               failure_reason, charged_at
        FROM pledges
        WHERE event_id = $1 AND status = $2
        ORDER BY created_at
        "#,
    )
    .bind(event_id)
    .bind(PledgeStatus::Pending.as_str())
    .fetch_all(pool)
    .await?
    .into_iter()
    .map(Pledge::try_from)
    .collect()
}

/// Only a pending pledge is written; the `status = 'pending'` guard keeps a
/// concurrent run from overwriting a terminal outcome.
pub async fn record_pledge_outcome(
    pool: &PgPool,
    pledge_id: Uuid,
    outcome: &PledgeOutcome,
) -> Result<bool, LedgerError> {
    let charged_at = matches!(outcome, PledgeOutcome::Charged { .. }).then(Utc::now);
    let result = sqlx::query(
        r#"
        UPDATE pledges
        SET status = $2,
            computed_total_cents = $3,
            stripe_payment_intent_id = $4,
            failure_reason = $5,
            charged_at = $6,
            updated_at = now()
        WHERE id = $1 AND status = $7
        "#,
    )
    .bind(pledge_id)
    .bind(outcome.stored_status().as_str())
    .bind(outcome.amount().cents())
    .bind(outcome.payment_intent_id())
    .bind(outcome.failure_reason())
    .bind(charged_at)
    .bind(PledgeStatus::Pending.as_str())
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn mark_event_settled(pool: &PgPool, id: Uuid) -> Result<(), LedgerError> {
    sqlx::query("UPDATE pledge_events SET status = $2, updated_at = now() WHERE id = $1")
        .bind(id)
        .bind(EventStatus::ChargesProcessed.as_str())
        .execute(pool)
        .await?;
    Ok(())
}
