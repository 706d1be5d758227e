pub mod audit;
pub mod donation;
pub mod error;
pub mod fragment;
pub mod gateway;
pub mod id;
pub mod money;
pub mod pledge;
pub mod principal;
pub mod store;
pub mod trace;
