use {
    crate::{
        AppState,
        adapters::api_errors::ApiError,
        domain::{error::LedgerError, principal::Principal, trace::Trace},
        services::{
            amount_resolver::{ResolveRequest, SweepReport, resolve_donation_amounts},
            donation_ingest::{IngestOutcome, IngestRequest, ingest_donation},
            pledge_settlement::{SettleRequest, SettlementReport, settle_event},
        },
    },
    axum::{
        Json, Router,
        extract::{DefaultBodyLimit, State, rejection::JsonRejection},
        routing::{get, post},
    },
    serde::Serialize,
    serde_json::json,
    std::time::Duration,
    tower_http::{timeout::TimeoutLayer, trace::TraceLayer},
};

/// Stripe objects are a few KB each; an ingest bundle holds at most four.
const BODY_LIMIT_BYTES: usize = 256 * 1024;

pub fn router(state: AppState, request_timeout: Duration) -> Router {
    Router::new()
        .route("/", get(|| async { "ok" }))
        .route("/admin/donations/ingest", post(ingest_handler))
        .route("/admin/donations/resolve-amounts", post(resolve_amounts_handler))
        .route("/admin/pledges/settle", post(settle_handler))
        .layer(DefaultBodyLimit::max(BODY_LIMIT_BYTES))
        .layer(TimeoutLayer::new(request_timeout))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Body rejections answer 400 with the standard error shape.
fn body_error(rejection: JsonRejection) -> LedgerError {
    LedgerError::Validation(format!("invalid request body: {}", rejection.body_text()))
}

#[derive(Serialize)]
pub struct IngestResponse {
    #[serde(flatten)]
    pub outcome: IngestOutcome,
    pub trace: Trace,
}

pub async fn ingest_handler(
    State(state): State<AppState>,
    principal: Result<Principal, ApiError>,
    body: Result<Json<IngestRequest>, JsonRejection>,
) -> Result<Json<IngestResponse>, ApiError> {
    let mut trace = Trace::new();

    let principal = match principal {
        Ok(p) => p,
        Err(rejection) => {
            trace.record("unauthenticated", json!({ "error": rejection.error.to_string() }));
            return Err(ApiError::with_trace(rejection.error, trace));
        }
    };

    let request = match body {
        Ok(Json(request)) => request,
        Err(rejection) => {
            let error = body_error(rejection);
            trace.record("invalid_body", json!({ "error": error.to_string() }));
            return Err(ApiError::with_trace(error, trace));
        }
    };
    trace.record(
        "received",
        json!({ "items": request.stripe_items.len(), "stripe_mode": request.stripe_mode }),
    );

    match ingest_donation(
        state.donations.as_ref(),
        state.profiles.as_ref(),
        &principal,
        request,
        &mut trace,
    )
    .await
    {
        Ok(outcome) => Ok(Json(IngestResponse { outcome, trace })),
        Err(error) => {
            trace.record("failed", json!({ "error": error.to_string() }));
            Err(ApiError::with_trace(error, trace))
        }
    }
}

pub async fn resolve_amounts_handler(
    State(state): State<AppState>,
    principal: Principal,
    body: Result<Option<Json<ResolveRequest>>, JsonRejection>,
) -> Result<Json<SweepReport>, ApiError> {
    let request = body.map_err(body_error)?.map(|Json(r)| r).unwrap_or_default();
    let report =
        resolve_donation_amounts(state.donations.as_ref(), &state.gateways, &principal, request)
            .await?;
    Ok(Json(report))
}

pub async fn settle_handler(
    State(state): State<AppState>,
    principal: Principal,
    body: Result<Json<SettleRequest>, JsonRejection>,
) -> Result<Json<SettlementReport>, ApiError> {
    let Json(request) = body.map_err(body_error)?;
    let report = settle_event(state.pledges.as_ref(), &state.gateways, &principal, request).await?;
    Ok(Json(report))
}
