use {
    super::error::LedgerError,
    serde::{Deserialize, Serialize},
    std::fmt,
    std::ops::Add,
};

/// Stripe's fixed per-charge fee, in cents.
pub const STRIPE_FIXED_FEE_CENTS: i64 = 30;

/// Share of the charge the payer keeps after the 2.9% percentage fee, in
/// thousandths.
const NET_SHARE_PER_MILLE: i64 = 971;

/// Smallest amount Stripe accepts for a USD charge.
pub const MINIMUM_CHARGE: MoneyAmount = MoneyAmount(50);

/// Largest amount the fee arithmetic handles without overflow.
pub const MAX_AMOUNT: MoneyAmount = MoneyAmount(i64::MAX / 4_000);

/// Amount in minor currency units (cents).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MoneyAmount(i64);

impl MoneyAmount {
    pub const ZERO: MoneyAmount = MoneyAmount(0);

    pub fn new(cents: i64) -> Result<Self, LedgerError> {
        if cents < 0 {
            return Err(LedgerError::Validation(format!(
                "MoneyAmount cannot be negative, got: {cents}"
            )));
        }
        Ok(Self(cents))
    }

    /// Parses a dollar amount as Stripe metadata carries it (`"100"`,
    /// `"100.5"`, `"103.30"`). Returns `None` for blanks, garbage,
    /// non-positive values and anything above [`MAX_AMOUNT`].
    pub fn from_dollars_str(raw: &str) -> Option<Self> {
        let dollars: f64 = raw.trim().parse().ok()?;
        let cents = (dollars * 100.0).round();
        if !cents.is_finite() || dollars <= 0.0 || cents > MAX_AMOUNT.0 as f64 {
            return None;
        }
        Some(Self(cents as i64))
    }

    pub fn cents(&self) -> i64 {
        self.0
    }

    pub fn dollars(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    pub fn checked_add(self, other: MoneyAmount) -> Option<MoneyAmount> {
        self.0.checked_add(other.0).map(MoneyAmount)
    }

    pub fn checked_sub(self, other: MoneyAmount) -> Option<MoneyAmount> {
        self.0
            .checked_sub(other.0)
            .filter(|&v| v >= 0)
            .map(MoneyAmount)
    }

    /// What gets charged when the donor covers processing fees for `self`:
    /// `(base + 0.30) / 0.971`, rounded half-up to the cent.
    /// Saturates above [`MAX_AMOUNT`].
    pub fn with_fee_covered(self) -> MoneyAmount {
        let numerator = (self.0.min(MAX_AMOUNT.0) + STRIPE_FIXED_FEE_CENTS) * 1000;
        MoneyAmount((2 * numerator + NET_SHARE_PER_MILLE) / (2 * NET_SHARE_PER_MILLE))
    }

    /// Inverse of [`with_fee_covered`](Self::with_fee_covered): the base the
    /// donor intended to give, given what was charged.
    pub fn without_fee(self) -> MoneyAmount {
        let net = (2 * self.0.min(MAX_AMOUNT.0) * NET_SHARE_PER_MILLE + 1000) / 2000;
        MoneyAmount((net - STRIPE_FIXED_FEE_CENTS).max(0))
    }

    /// True when the two amounts disagree by more than one cent.
    pub fn differs_materially(self, other: MoneyAmount) -> bool {
        (self.0 - other.0).abs() > 1
    }

    pub fn within(self, other: MoneyAmount, tolerance: MoneyAmount) -> bool {
        (self.0 - other.0).abs() <= tolerance.0
    }
}

/// Serializes an amount as a dollar number (`103.3`), the unit the admin
/// dashboards read.
pub fn as_dollars<S: serde::Serializer>(amount: &MoneyAmount, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(amount.dollars())
}

impl Add for MoneyAmount {
    type Output = MoneyAmount;

    fn add(self, rhs: MoneyAmount) -> MoneyAmount {
        self.checked_add(rhs).expect("MoneyAmount overflow")
    }
}

impl fmt::Display for MoneyAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}
