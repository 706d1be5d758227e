use {
    std::{env, net::SocketAddr, time::Duration},
    thiserror::Error,
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} is invalid: {reason}")]
    Invalid { name: &'static str, reason: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub database_max_connections: u32,
    pub jwt_secret: String,
    pub stripe_secret_key_test: Option<String>,
    pub stripe_secret_key_live: Option<String>,
    pub bind_addr: SocketAddr,
    pub request_timeout: Duration,
}

impl Config {
    /// Reads the process environment, after loading `.env` if present.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let optional = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let required = |name: &'static str| optional(name).ok_or(ConfigError::Missing(name));

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            database_max_connections: parse_or("DATABASE_MAX_CONNECTIONS", optional("DATABASE_MAX_CONNECTIONS"), 20)?,
            jwt_secret: required("SUPABASE_JWT_SECRET")?,
            stripe_secret_key_test: optional("STRIPE_SECRET_KEY_TEST"),
            stripe_secret_key_live: optional("STRIPE_SECRET_KEY_LIVE"),
            bind_addr: parse_or("BIND_ADDR", optional("BIND_ADDR"), SocketAddr::from(([0, 0, 0, 0], 3000)))?,
            request_timeout: Duration::from_secs(parse_or(
                "REQUEST_TIMEOUT_SECS",
                optional("REQUEST_TIMEOUT_SECS"),
                60,
            )?),
        })
    }
}

fn parse_or<T>(name: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            name,
            reason: e.to_string(),
        }),
    }
}
