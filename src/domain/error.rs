use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("validation: {0}")]
    Validation(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    /// Metadata marks the bundle as something other than a general donation
    /// (sponsorship, marketplace order, ...).
    #[error("transaction type `{0}` is not a donation")]
    WrongTransactionType(String),

    #[error("gateway: {0}")]
    Gateway(String),

    #[error("missing gateway credential for {0} mode")]
    MissingCredential(String),

    #[error("database: {0}")]
    Database(#[from] sqlx::Error),

    #[error("serialization: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<stripe::StripeError> for LedgerError {
    fn from(err: stripe::StripeError) -> Self {
        Self::Gateway(err.to_string())
    }
}
