use {
    crate::{
        AppState,
        adapters::api_errors::ApiError,
        domain::{
            error::LedgerError,
            principal::{Principal, Role},
        },
    },
    axum::{
        extract::FromRequestParts,
        http::{header::AUTHORIZATION, request::Parts},
    },
    jsonwebtoken::{Algorithm, DecodingKey, Validation, decode},
    serde::{Deserialize, Serialize},
    uuid::Uuid,
};

/// Claims of a Supabase access token.
#[derive(Debug, Serialize, Deserialize)]
pub struct SupabaseClaims {
    pub sub: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    pub aud: String,
    pub exp: usize,
}

pub fn validate_jwt(token: &str, secret: &str) -> Result<SupabaseClaims, LedgerError> {
    let key = DecodingKey::from_secret(secret.as_bytes());
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_audience(&["authenticated"]);

    decode::<SupabaseClaims>(token, &key, &validation)
        .map(|data| data.claims)
        .map_err(|e| LedgerError::Unauthorized(format!("invalid token: {e}")))
}

fn bearer_token(parts: &Parts) -> Result<&str, LedgerError> {
    let header = parts
        .headers
        .get(AUTHORIZATION)
        .ok_or_else(|| LedgerError::Unauthorized("missing Authorization header".into()))?
        .to_str()
        .map_err(|_| LedgerError::Unauthorized("invalid Authorization header".into()))?;

    header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| LedgerError::Unauthorized("expected a Bearer token".into()))
}

/// Resolves the caller from the bearer token. The role comes from the
/// caller's profile row; a caller without one is a plain member.
impl FromRequestParts<AppState> for Principal {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let claims = validate_jwt(bearer_token(parts)?, &state.jwt_secret)?;
        let user_id = Uuid::parse_str(&claims.sub)
            .map_err(|_| LedgerError::Unauthorized("token subject is not a user id".into()))?;

        let role = state
            .profiles
            .role_of(user_id)
            .await?
            .unwrap_or(Role::Member);
        tracing::debug!(%user_id, role = role.as_str(), "caller authenticated");

        Ok(Principal { user_id, role })
    }
}
