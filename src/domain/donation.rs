use {
    super::error::LedgerError,
    super::id::StripeMode,
    super::money::MoneyAmount,
    chrono::{DateTime, Utc},
    serde::{Deserialize, Serialize},
    std::fmt,
    uuid::Uuid,
};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Frequency {
    #[serde(rename = "one-time")]
    OneTime,
    #[serde(rename = "monthly")]
    Monthly,
}

impl Frequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OneTime => "one-time",
            Self::Monthly => "monthly",
        }
    }

    /// Recurring gifts stay active until cancelled; one-time gifts are done
    /// the moment they are paid.
    pub fn initial_status(&self) -> DonationStatus {
        match self {
            Self::OneTime => DonationStatus::Completed,
            Self::Monthly => DonationStatus::Active,
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for Frequency {
    type Error = LedgerError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s.trim().to_ascii_lowercase().as_str() {
            "one-time" | "one_time" | "onetime" | "once" => Ok(Self::OneTime),
            "monthly" | "month" | "recurring" => Ok(Self::Monthly),
            other => Err(LedgerError::Validation(format!(
                "unknown donation frequency: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DonationStatus {
    Active,
    Completed,
}

impl DonationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Completed => "completed",
        }
    }
}

impl TryFrom<&str> for DonationStatus {
    type Error = LedgerError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "active" => Ok(Self::Active),
            "completed" => Ok(Self::Completed),
            other => Err(LedgerError::Validation(format!(
                "unknown donation status: {other}"
            ))),
        }
    }
}

/// Who gave. A donation belongs either to a registered profile or to a bare
/// email address, never both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DonorIdentity {
    User(Uuid),
    Email(String),
}

impl DonorIdentity {
    pub fn user_id(&self) -> Option<Uuid> {
        match self {
            Self::User(id) => Some(*id),
            Self::Email(_) => None,
        }
    }

    pub fn email(&self) -> Option<&str> {
        match self {
            Self::User(_) => None,
            Self::Email(email) => Some(email),
        }
    }

    /// Rebuilds the identity from the two mutually exclusive columns.
    pub fn from_columns(user_id: Option<Uuid>, email: Option<String>) -> Result<Self, LedgerError> {
        match (user_id, email) {
            (Some(id), None) => Ok(Self::User(id)),
            (None, Some(email)) => Ok(Self::Email(email)),
            (Some(_), Some(_)) => Err(LedgerError::Validation(
                "donor has both user_id and email".into(),
            )),
            (None, None) => Err(LedgerError::Validation(
                "donor has neither user_id nor email".into(),
            )),
        }
    }
}

impl Serialize for DonorIdentity {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;
        let mut s = serializer.serialize_struct("DonorIdentity", 2)?;
        s.serialize_field("user_id", &self.user_id())?;
        s.serialize_field("donor_email", &self.email())?;
        s.end()
    }
}

/// Canonical ledger record of a gift.
#[derive(Debug, Clone, Serialize)]
pub struct Donation {
    pub id: Uuid,
    #[serde(flatten)]
    pub donor: DonorIdentity,
    pub amount: MoneyAmount,
    pub currency: String,
    pub frequency: Frequency,
    pub status: DonationStatus,
    pub stripe_mode: StripeMode,
    pub stripe_subscription_id: Option<String>,
    pub stripe_payment_intent_id: Option<String>,
    pub stripe_customer_id: Option<String>,
    pub start_date: DateTime<Utc>,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl Donation {
    /// The gateway object the resolver should interrogate: the subscription
    /// when there is one, else the one-time payment intent.
    pub fn gateway_reference(&self) -> Option<&str> {
        self.stripe_subscription_id
            .as_deref()
            .or(self.stripe_payment_intent_id.as_deref())
            .filter(|r| !r.trim().is_empty())
    }
}

#[derive(Debug, Clone)]
pub struct NewDonation {
    pub id: Uuid,
    pub donor: DonorIdentity,
    pub amount: MoneyAmount,
    pub currency: String,
    pub frequency: Frequency,
    pub stripe_mode: StripeMode,
    pub stripe_subscription_id: Option<String>,
    pub stripe_payment_intent_id: Option<String>,
    pub stripe_customer_id: Option<String>,
    pub start_date: DateTime<Utc>,
    pub metadata: serde_json::Value,
}

impl NewDonation {
    pub fn status(&self) -> DonationStatus {
        self.frequency.initial_status()
    }
}

/// Tax receipt for one calendar transaction.
#[derive(Debug, Clone, Serialize)]
pub struct Receipt {
    pub id: Uuid,
    pub donation_id: Uuid,
    pub transaction_id: String,
    pub stripe_mode: StripeMode,
    pub receipt_number: String,
    #[serde(flatten)]
    pub donor: DonorIdentity,
    pub amount: MoneyAmount,
    pub currency: String,
    pub frequency: Frequency,
    pub issued_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewReceipt {
    pub id: Uuid,
    pub donation_id: Uuid,
    pub transaction_id: String,
    pub stripe_mode: StripeMode,
    pub receipt_number: String,
    pub donor: DonorIdentity,
    pub amount: MoneyAmount,
    pub currency: String,
    pub frequency: Frequency,
    pub issued_at: DateTime<Utc>,
}

impl NewReceipt {
    /// Receipt numbers read `R-<year>-<last 8 hex of the receipt id>`. The
    /// leading hex of a v7 id is its timestamp, so the random tail is used.
    pub fn number_for(id: Uuid, issued_at: DateTime<Utc>) -> String {
        let hex = id.simple().to_string();
        format!("R-{}-{}", issued_at.format("%Y"), hex[hex.len() - 8..].to_ascii_uppercase())
    }
}
