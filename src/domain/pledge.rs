use {
    super::error::LedgerError,
    super::id::StripeMode,
    super::money::{MINIMUM_CHARGE, MoneyAmount},
    chrono::{DateTime, Utc},
    serde::{Deserialize, Serialize},
    std::fmt,
    uuid::Uuid,
};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PledgeStatus {
    Pending,
    Charged,
    Failed,
}

impl PledgeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Charged => "charged",
            Self::Failed => "failed",
        }
    }

    /// Pledges settle exactly once.
    pub fn can_transition_to(&self, next: &PledgeStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Charged) | (Self::Pending, Self::Failed)
        )
    }
}

impl fmt::Display for PledgeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for PledgeStatus {
    type Error = LedgerError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "pending" => Ok(Self::Pending),
            "charged" => Ok(Self::Charged),
            "failed" => Ok(Self::Failed),
            other => Err(LedgerError::Validation(format!(
                "unknown pledge status: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    Scheduled,
    Completed,
    ChargesProcessed,
}

impl EventStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Scheduled => "scheduled",
            Self::Completed => "completed",
            Self::ChargesProcessed => "charges_processed",
        }
    }

    pub fn is_settled(&self) -> bool {
        matches!(self, Self::ChargesProcessed)
    }
}

impl TryFrom<&str> for EventStatus {
    type Error = LedgerError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "scheduled" => Ok(Self::Scheduled),
            "completed" => Ok(Self::Completed),
            "charges_processed" => Ok(Self::ChargesProcessed),
            other => Err(LedgerError::Validation(format!(
                "unknown event status: {other}"
            ))),
        }
    }
}

/// A pledge drive milestone (e.g. a sponsored bike ride).
#[derive(Debug, Clone, Serialize)]
pub struct PledgeEvent {
    pub id: Uuid,
    pub name: String,
    pub target_miles: f64,
    pub actual_miles: Option<f64>,
    pub status: EventStatus,
}

impl PledgeEvent {
    /// Checks the measured outcome can be settled against this event.
    pub fn validate_outcome(&self, actual_miles: f64) -> Result<(), LedgerError> {
        if self.status.is_settled() {
            return Err(LedgerError::Conflict(format!(
                "charges for event {} were already processed",
                self.id
            )));
        }
        if !actual_miles.is_finite() || actual_miles < 0.0 {
            return Err(LedgerError::Validation(format!(
                "actual_miles must be a non-negative number, got {actual_miles}"
            )));
        }
        if actual_miles > self.target_miles {
            return Err(LedgerError::Validation(format!(
                "actual_miles ({actual_miles}) exceeds the event target ({})",
                self.target_miles
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Pledge {
    pub id: Uuid,
    pub event_id: Uuid,
    pub pledger_name: String,
    pub pledger_email: Option<String>,
    pub cents_per_mile: i64,
    pub max_amount: Option<MoneyAmount>,
    pub stripe_customer_id: Option<String>,
    pub stripe_setup_intent_id: Option<String>,
    pub stripe_payment_method_id: Option<String>,
    pub stripe_mode: StripeMode,
    pub status: PledgeStatus,
    /// Computed total, recorded for failed pledges too.
    pub computed_total: Option<MoneyAmount>,
    pub stripe_payment_intent_id: Option<String>,
    pub failure_reason: Option<String>,
    pub charged_at: Option<DateTime<Utc>>,
}

impl Pledge {
    /// `cents_per_mile × miles`, rounded to the cent and capped at the
    /// pledger's maximum when one was set.
    pub fn total_for(&self, actual_miles: f64) -> MoneyAmount {
        let raw = (self.cents_per_mile.max(0) as f64 * actual_miles).round() as i64;
        let total = MoneyAmount::new(raw.max(0)).unwrap_or(MoneyAmount::ZERO);
        match self.max_amount {
            Some(cap) => total.min(cap),
            None => total,
        }
    }
}

pub const BELOW_MINIMUM_REASON: &str = "below minimum";

/// Terminal result of settling one pledge.
#[derive(Debug, Clone, PartialEq)]
pub enum PledgeOutcome {
    Charged {
        amount: MoneyAmount,
        payment_intent_id: String,
    },
    /// Computed total is under the gateway minimum; no charge attempted.
    BelowMinimum { amount: MoneyAmount },
    Failed { amount: MoneyAmount, error: String },
}

impl PledgeOutcome {
    pub fn classify_total(amount: MoneyAmount) -> Option<PledgeOutcome> {
        (amount < MINIMUM_CHARGE).then_some(PledgeOutcome::BelowMinimum { amount })
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Charged { .. } => "charged",
            Self::BelowMinimum { .. } => "skipped",
            Self::Failed { .. } => "failed",
        }
    }

    pub fn stored_status(&self) -> PledgeStatus {
        match self {
            Self::Charged { .. } => PledgeStatus::Charged,
            Self::BelowMinimum { .. } | Self::Failed { .. } => PledgeStatus::Failed,
        }
    }

    pub fn failure_reason(&self) -> Option<&str> {
        match self {
            Self::Charged { .. } => None,
            Self::BelowMinimum { .. } => Some(BELOW_MINIMUM_REASON),
            Self::Failed { error, .. } => Some(error),
        }
    }

    pub fn payment_intent_id(&self) -> Option<&str> {
        match self {
            Self::Charged {
                payment_intent_id, ..
            } => Some(payment_intent_id),
            _ => None,
        }
    }

    pub fn amount(&self) -> MoneyAmount {
        match self {
            Self::Charged { amount, .. }
            | Self::BelowMinimum { amount }
            | Self::Failed { amount, .. } => *amount,
        }
    }
}
