pub mod api_errors;
pub mod auth;
pub mod http;
pub mod stripe_client;
