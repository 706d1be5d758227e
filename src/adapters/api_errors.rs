use crate::domain::{error::LedgerError, trace::Trace};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

/// HTTP face of a [`LedgerError`]. Ingest failures carry the trace collected
/// up to the point of failure.
pub struct ApiError {
    pub error: LedgerError,
    pub trace: Option<Trace>,
}

impl ApiError {
    pub fn with_trace(error: LedgerError, trace: Trace) -> Self {
        Self {
            error,
            trace: Some(trace),
        }
    }

    pub fn status(&self) -> StatusCode {
        match &self.error {
            LedgerError::Validation(_) | LedgerError::WrongTransactionType(_) => {
                StatusCode::BAD_REQUEST
            }
            LedgerError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            LedgerError::Forbidden(_) => StatusCode::FORBIDDEN,
            LedgerError::NotFound(_) => StatusCode::NOT_FOUND,
            LedgerError::Conflict(_) => StatusCode::CONFLICT,
            LedgerError::Gateway(_) | LedgerError::MissingCredential(_) => StatusCode::BAD_GATEWAY,
            LedgerError::Database(_) | LedgerError::Serialization(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<LedgerError> for ApiError {
    fn from(error: LedgerError) -> Self {
        Self { error, trace: None }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (error_code, message) = match &self.error {
            LedgerError::Validation(msg) => ("validation_error", msg.clone()),
            LedgerError::WrongTransactionType(_) => ("wrong_transaction_type", self.error.to_string()),
            LedgerError::Unauthorized(msg) => ("unauthorized", msg.clone()),
            LedgerError::Forbidden(msg) => ("forbidden", msg.clone()),
            LedgerError::NotFound(msg) => ("not_found", msg.clone()),
            LedgerError::Conflict(msg) => ("conflict", msg.clone()),
            LedgerError::Gateway(msg) => {
                tracing::warn!("gateway error: {msg}");
                ("gateway_error", msg.clone())
            }
            LedgerError::MissingCredential(_) => ("missing_credential", self.error.to_string()),
            LedgerError::Database(err) => {
                tracing::error!("database error: {err}");
                ("internal_error", "internal error".to_string())
            }
            LedgerError::Serialization(err) => {
                tracing::error!("serialization error: {err}");
                ("internal_error", "internal error".to_string())
            }
        };

        let mut body = serde_json::json!({
            "success": false,
            "error_code": error_code,
            "error": message,
        });
        if let Some(trace) = &self.trace {
            body["trace"] = serde_json::to_value(trace).unwrap_or_default();
        }

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_domain_errors_to_status_codes() {
        let cases = [
            (LedgerError::Validation("x".into()), StatusCode::BAD_REQUEST),
            (LedgerError::WrongTransactionType("sponsorship".into()), StatusCode::BAD_REQUEST),
            (LedgerError::Unauthorized("x".into()), StatusCode::UNAUTHORIZED),
            (LedgerError::Forbidden("x".into()), StatusCode::FORBIDDEN),
            (LedgerError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (LedgerError::Conflict("x".into()), StatusCode::CONFLICT),
            (LedgerError::MissingCredential("live".into()), StatusCode::BAD_GATEWAY),
        ];
        for (error, expected) in cases {
            assert_eq!(ApiError::from(error).status(), expected);
        }
    }
}
