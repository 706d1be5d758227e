pub mod amount_resolver;
pub mod donation_ingest;
pub mod pledge_settlement;
