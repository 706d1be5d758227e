use {
    super::error::LedgerError,
    derive_more::Display,
    serde::{Deserialize, Serialize},
};

/// Handle to a Stripe object. Several of these can denote the same logical
/// transaction (an invoice paid through a payment intent that produced a
/// charge).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Display)]
pub enum GatewayRef {
    #[display("{_0}")]
    Subscription(String),
    #[display("{_0}")]
    Invoice(String),
    #[display("{_0}")]
    PaymentIntent(String),
    #[display("{_0}")]
    Charge(String),
    #[display("{_0}")]
    CheckoutSession(String),
}

impl GatewayRef {
    pub fn parse(raw: &str) -> Result<Self, LedgerError> {
        let raw = raw.trim();
        let id = raw.to_string();
        let (prefix, rest) = raw.split_once('_').unwrap_or((raw, ""));
        if rest.is_empty() {
            return Err(LedgerError::Validation(format!(
                "unrecognized gateway reference: {raw:?}"
            )));
        }
        match prefix {
            "sub" => Ok(Self::Subscription(id)),
            "in" => Ok(Self::Invoice(id)),
            "pi" => Ok(Self::PaymentIntent(id)),
            "ch" | "py" => Ok(Self::Charge(id)),
            // Checkout session ids carry the mode in the prefix (`cs_test_`, `cs_live_`).
            "cs" => Ok(Self::CheckoutSession(id)),
            _ => Err(LedgerError::Validation(format!(
                "unrecognized gateway reference: {raw:?}"
            ))),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Subscription(id)
            | Self::Invoice(id)
            | Self::PaymentIntent(id)
            | Self::Charge(id)
            | Self::CheckoutSession(id) => id,
        }
    }
}

/// Which Stripe account environment an object lives in. Test and live
/// objects never mix: each has its own credentials and idempotency space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StripeMode {
    #[display("test")]
    Test,
    #[display("live")]
    Live,
}

impl StripeMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Test => "test",
            Self::Live => "live",
        }
    }
}

impl TryFrom<&str> for StripeMode {
    type Error = LedgerError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "test" => Ok(Self::Test),
            "live" => Ok(Self::Live),
            other => Err(LedgerError::Validation(format!(
                "unknown stripe mode: {other}"
            ))),
        }
    }
}
