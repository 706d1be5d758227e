use {
    crate::domain::{
        audit::{CombinedTransaction, TransactionKey},
        donation::{Donation, DonationStatus, DonorIdentity, Frequency, NewDonation, NewReceipt, Receipt},
        error::LedgerError,
        id::StripeMode,
        money::MoneyAmount,
    },
    chrono::{DateTime, Utc},
    sqlx::PgPool,
    uuid::Uuid,
};

const DONATION_COLUMNS: &str = "id, user_id, donor_email, amount_cents, currency, frequency, status, \
     stripe_mode, stripe_subscription_id, stripe_payment_intent_id, stripe_customer_id, \
     start_date, metadata, created_at";

const RECEIPT_COLUMNS: &str = "id, donation_id, transaction_id, stripe_mode, receipt_number, \
     user_id, donor_email, amount_cents, currency, frequency, issued_at";

const COMBINED_COLUMNS: &str = "id, stripe_mode, invoice_id, payment_intent_id, charge_id, \
     checkout_session_id, subscription_id, customer_id, donation_id, receipt_id, amount_cents, \
     currency, raw_invoice, raw_charge, raw_payment_intent, raw_checkout_session, \
     merged_metadata, created_at";

#[derive(Debug, sqlx::FromRow)]
struct DonationRow {
    id: Uuid,
    user_id: Option<Uuid>,
    donor_email: Option<String>,
    amount_cents: i64,
    currency: String,
    frequency: String,
    status: String,
    stripe_mode: String,
    stripe_subscription_id: Option<String>,
    stripe_payment_intent_id: Option<String>,
    stripe_customer_id: Option<String>,
    start_date: DateTime<Utc>,
    metadata: serde_json::Value,
    created_at: DateTime<Utc>,
}

impl TryFrom<DonationRow> for Donation {
    type Error = LedgerError;

    fn try_from(row: DonationRow) -> Result<Self, Self::Error> {
        Ok(Donation {
            id: row.id,
            donor: DonorIdentity::from_columns(row.user_id, row.donor_email)?,
            amount: MoneyAmount::new(row.amount_cents)?,
            currency: row.currency,
            frequency: Frequency::try_from(row.frequency.as_str())?,
            status: DonationStatus::try_from(row.status.as_str())?,
            stripe_mode: StripeMode::try_from(row.stripe_mode.as_str())?,
            stripe_subscription_id: row.stripe_subscription_id,
            stripe_payment_intent_id: row.stripe_payment_intent_id,
            stripe_customer_id: row.stripe_customer_id,
            start_date: row.start_date,
            metadata: row.metadata,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ReceiptRow {
    id: Uuid,
    donation_id: Uuid,
    transaction_id: String,
    stripe_mode: String,
    receipt_number: String,
    user_id: Option<Uuid>,
    donor_email: Option<String>,
    amount_cents: i64,
    currency: String,
    frequency: String,
    issued_at: DateTime<Utc>,
}

impl TryFrom<ReceiptRow> for Receipt {
    type Error = LedgerError;

    fn try_from(row: ReceiptRow) -> Result<Self, Self::Error> {
        Ok(Receipt {
            id: row.id,
            donation_id: row.donation_id,
            transaction_id: row.transaction_id,
            stripe_mode: StripeMode::try_from(row.stripe_mode.as_str())?,
            receipt_number: row.receipt_number,
            donor: DonorIdentity::from_columns(row.user_id, row.donor_email)?,
            amount: MoneyAmount::new(row.amount_cents)?,
            currency: row.currency,
            frequency: Frequency::try_from(row.frequency.as_str())?,
            issued_at: row.issued_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CombinedRow {
    id: Uuid,
    stripe_mode: String,
    invoice_id: Option<String>,
    payment_intent_id: Option<String>,
    charge_id: Option<String>,
    checkout_session_id: Option<String>,
    subscription_id: Option<String>,
    customer_id: Option<String>,
    donation_id: Option<Uuid>,
    receipt_id: Option<Uuid>,
    amount_cents: i64,
    currency: String,
    raw_invoice: Option<serde_json::Value>,
    raw_charge: Option<serde_json::Value>,
    raw_payment_intent: Option<serde_json::Value>,
    raw_checkout_session: Option<serde_json::Value>,
    merged_metadata: serde_json::Value,
    created_at: DateTime<Utc>,
}

impl TryFrom<CombinedRow> for CombinedTransaction {
    type Error = LedgerError;

    fn try_from(row: CombinedRow) -> Result<Self, Self::Error> {
        Ok(CombinedTransaction {
            id: row.id,
            stripe_mode: StripeMode::try_from(row.stripe_mode.as_str())?,
            invoice_id: row.invoice_id,
            payment_intent_id: row.payment_intent_id,
            charge_id: row.charge_id,
            checkout_session_id: row.checkout_session_id,
            subscription_id: row.subscription_id,
            customer_id: row.customer_id,
            donation_id: row.donation_id,
            receipt_id: row.receipt_id,
            amount: MoneyAmount::new(row.amount_cents)?,
            currency: row.currency,
            raw_invoice: row.raw_invoice,
            raw_charge: row.raw_charge,
            raw_payment_intent: row.raw_payment_intent,
            raw_checkout_session: row.raw_checkout_session,
            merged_metadata: row.merged_metadata,
            created_at: row.created_at,
        })
    }
}

/// Audit row already recorded for this transaction key, if any. The key
/// column comes from a closed set, never from input.
pub async fn find_combined(
    pool: &PgPool,
    mode: StripeMode,
    key: &TransactionKey,
) -> Result<Option<CombinedTransaction>, LedgerError> {
    let sql = format!(
        "SELECT {COMBINED_COLUMNS} FROM combined_transactions \
         WHERE stripe_mode = $1 AND {} = $2 ORDER BY created_at LIMIT 1",
        key.column()
    );
    sqlx::query_as::<_, CombinedRow>(&sql)
        .bind(mode.as_str())
        .bind(key.as_str())
        .fetch_optional(pool)
        .await?
        .map(CombinedTransaction::try_from)
        .transpose()
}

pub async fn insert_combined(
    pool: &PgPool,
    row: &CombinedTransaction,
) -> Result<CombinedTransaction, LedgerError> {
    let sql = format!(
        r#"
        INSERT INTO combined_transactions
            (id, stripe_mode, invoice_id, payment_intent_id, charge_id, checkout_session_id,
             subscription_id, customer_id, donation_id, receipt_id, amount_cents, currency,
             raw_invoice, raw_charge, raw_payment_intent, raw_checkout_session,
             merged_metadata, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
        RETURNING {COMBINED_COLUMNS}
        "#
    );
    let inserted = sqlx::query_as::<_, CombinedRow>(&sql)
        .bind(row.id)
        .bind(row.stripe_mode.as_str())
        .bind(row.invoice_id.as_deref())
        .bind(row.payment_intent_id.as_deref())
        .bind(row.charge_id.as_deref())
        .bind(row.checkout_session_id.as_deref())
        .bind(row.subscription_id.as_deref())
        .bind(row.customer_id.as_deref())
        .bind(row.donation_id)
        .bind(row.receipt_id)
        .bind(row.amount.cents())
        .bind(&row.currency)
        .bind(&row.raw_invoice)
        .bind(&row.raw_charge)
        .bind(&row.raw_payment_intent)
        .bind(&row.raw_checkout_session)
        .bind(&row.merged_metadata)
        .bind(row.created_at)
        .fetch_one(pool)
        .await?;
    inserted.try_into()
}

pub async fn find_donation(pool: &PgPool, id: Uuid) -> Result<Option<Donation>, LedgerError> {
    let sql = format!("SELECT {DONATION_COLUMNS} FROM donations WHERE id = $1");
    sqlx::query_as::<_, DonationRow>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .map(Donation::try_from)
        .transpose()
}

/// Oldest donation in `mode` whose `column` equals `value`. Used for the
/// subscription and payment intent lookups.
async fn find_donation_by(
    pool: &PgPool,
    mode: StripeMode,
    column: &'static str,
    value: &str,
) -> Result<Option<Donation>, LedgerError> {
    let sql = format!(
        "SELECT {DONATION_COLUMNS} FROM donations \
         WHERE stripe_mode = $1 AND {column} = $2 ORDER BY created_at LIMIT 1"
    );
    sqlx::query_as::<_, DonationRow>(&sql)
        .bind(mode.as_str())
        .bind(value)
        .fetch_optional(pool)
        .await?
        .map(Donation::try_from)
        .transpose()
}

pub async fn find_donation_by_subscription(
    pool: &PgPool,
    mode: StripeMode,
    subscription_id: &str,
) -> Result<Option<Donation>, LedgerError> {
    find_donation_by(pool, mode, "stripe_subscription_id", subscription_id).await
}

pub async fn find_donation_by_payment_intent(
    pool: &PgPool,
    mode: StripeMode,
    payment_intent_id: &str,
) -> Result<Option<Donation>, LedgerError> {
    find_donation_by(pool, mode, "stripe_payment_intent_id", payment_intent_id).await
}

pub async fn insert_donation(pool: &PgPool, donation: &NewDonation) -> Result<Donation, LedgerError> {
    let sql = format!(
        r#"
        INSERT INTO donations
            (id, user_id, donor_email, amount_cents, currency, frequency, status, stripe_mode,
             stripe_subscription_id, stripe_payment_intent_id, stripe_customer_id,
             start_date, metadata)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
        RETURNING {DONATION_COLUMNS}
        "#
    );
    let row = sqlx::query_as::<_, DonationRow>(&sql)
        .bind(donation.id)
        .bind(donation.donor.user_id())
        .bind(donation.donor.email())
        .bind(donation.amount.cents())
        .bind(&donation.currency)
        .bind(donation.frequency.as_str())
        .bind(donation.status().as_str())
        .bind(donation.stripe_mode.as_str())
        .bind(donation.stripe_subscription_id.as_deref())
        .bind(donation.stripe_payment_intent_id.as_deref())
        .bind(donation.stripe_customer_id.as_deref())
        .bind(donation.start_date)
        .bind(&donation.metadata)
        .fetch_one(pool)
        .await?;
    row.try_into()
}

pub async fn find_receipt(
    pool: &PgPool,
    mode: StripeMode,
    transaction_id: &str,
) -> Result<Option<Receipt>, LedgerError> {
    let sql = format!(
        "SELECT {RECEIPT_COLUMNS} FROM receipts WHERE stripe_mode = $1 AND transaction_id = $2"
    );
    sqlx::query_as::<_, ReceiptRow>(&sql)
        .bind(mode.as_str())
        .bind(transaction_id)
        .fetch_optional(pool)
        .await?
        .map(Receipt::try_from)
        .transpose()
}

pub async fn find_receipt_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Receipt>, LedgerError> {
    let sql = format!("SELECT {RECEIPT_COLUMNS} FROM receipts WHERE id = $1");
    sqlx::query_as::<_, ReceiptRow>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .map(Receipt::try_from)
        .transpose()
}

pub async fn insert_receipt(pool: &PgPool, receipt: &NewReceipt) -> Result<Receipt, LedgerError> {
    let sql = format!(
        r#"
        INSERT INTO receipts
            (id, donation_id, transaction_id, stripe_mode, receipt_number,
             user_id, donor_email, amount_cents, currency, frequency, issued_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        RETURNING {RECEIPT_COLUMNS}
        "#
    );
    let row = sqlx::query_as::<_, ReceiptRow>(&sql)
        .bind(receipt.id)
        .bind(receipt.donation_id)
        .bind(&receipt.transaction_id)
        .bind(receipt.stripe_mode.as_str())
        .bind(&receipt.receipt_number)
        .bind(receipt.donor.user_id())
        .bind(receipt.donor.email())
        .bind(receipt.amount.cents())
        .bind(&receipt.currency)
        .bind(receipt.frequency.as_str())
        .bind(receipt.issued_at)
        .fetch_one(pool)
        .await?;
    row.try_into()
}

pub async fn donations_for_resolution(
    pool: &PgPool,
    ids: Option<Vec<Uuid>>,
) -> Result<Vec<Donation>, LedgerError> {
    let sql = format!(
        "SELECT {DONATION_COLUMNS} FROM donations \
         WHERE (stripe_subscription_id IS NOT NULL OR stripe_payment_intent_id IS NOT NULL) \
           AND ($1::uuid[] IS NULL OR id = ANY($1)) \
         ORDER BY created_at"
    );
    sqlx::query_as::<_, DonationRow>(&sql)
        .bind(ids)
        .fetch_all(pool)
        .await?
        .into_iter()
        .map(Donation::try_from)
        .collect()
}

pub async fn update_donation_amount(
    pool: &PgPool,
    id: Uuid,
    amount: MoneyAmount,
) -> Result<(), LedgerError> {
    let result = sqlx::query("UPDATE donations SET amount_cents = $2, updated_at = now() WHERE id = $1")
        .bind(id)
        .bind(amount.cents())
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(LedgerError::NotFound(format!("donation {id}")));
    }
    Ok(())
}

pub async fn update_receipt_amounts(
    pool: &PgPool,
    donation_id: Uuid,
    amount: MoneyAmount,
) -> Result<u64, LedgerError> {
    let result = sqlx::query(
        "UPDATE receipts SET amount_cents = $2, updated_at = now() \
         WHERE donation_id = $1 AND amount_cents <> $2",
    )
    .bind(donation_id)
    .bind(amount.cents())
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}
