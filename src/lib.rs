pub mod adapters;
pub mod config;
pub mod domain;
pub mod infra;
pub mod services;

use {
    domain::{
        gateway::GatewayRegistry,
        store::{DonationStore, PledgeStore, ProfileStore},
    },
    std::sync::Arc,
};

#[derive(Clone)]
pub struct AppState {
    pub donations: Arc<dyn DonationStore>,
    pub profiles: Arc<dyn ProfileStore>,
    pub pledges: Arc<dyn PledgeStore>,
    pub gateways: GatewayRegistry,
    pub jwt_secret: Arc<str>,
}
