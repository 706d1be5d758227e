pub mod donation_repo;
pub mod pledge_repo;
pub mod profile_repo;

use {
    crate::domain::{
        audit::{CombinedTransaction, TransactionKey},
        donation::{Donation, NewDonation, NewReceipt, Receipt},
        id::StripeMode,
        money::MoneyAmount,
        pledge::{Pledge, PledgeEvent, PledgeOutcome},
        principal::Role,
        store::{DonationStore, PledgeStore, ProfileStore, StoreFuture},
    },
    sqlx::PgPool,
    uuid::Uuid,
};

/// Postgres implementation of every store trait, one pool shared by all.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

impl DonationStore for PgStore {
    fn find_combined(
        &self,
        mode: StripeMode,
        key: &TransactionKey,
    ) -> StoreFuture<'_, Option<CombinedTransaction>> {
        let key = key.clone();
        Box::pin(async move { donation_repo::find_combined(&self.pool, mode, &key).await })
    }

    fn find_donation(&self, id: Uuid) -> StoreFuture<'_, Option<Donation>> {
        Box::pin(donation_repo::find_donation(&self.pool, id))
    }

    fn find_donation_by_subscription(
        &self,
        mode: StripeMode,
        subscription_id: &str,
    ) -> StoreFuture<'_, Option<Donation>> {
        let subscription_id = subscription_id.to_string();
        Box::pin(async move {
            donation_repo::find_donation_by_subscription(&self.pool, mode, &subscription_id).await
        })
    }

    fn find_donation_by_payment_intent(
        &self,
        mode: StripeMode,
        payment_intent_id: &str,
    ) -> StoreFuture<'_, Option<Donation>> {
        let payment_intent_id = payment_intent_id.to_string();
        Box::pin(async move {
            donation_repo::find_donation_by_payment_intent(&self.pool, mode, &payment_intent_id)
                .await
        })
    }

    fn insert_donation(&self, donation: NewDonation) -> StoreFuture<'_, Donation> {
        Box::pin(async move { donation_repo::insert_donation(&self.pool, &donation).await })
    }

    fn find_receipt(
        &self,
        mode: StripeMode,
        transaction_id: &str,
    ) -> StoreFuture<'_, Option<Receipt>> {
        let transaction_id = transaction_id.to_string();
        Box::pin(async move { donation_repo::find_receipt(&self.pool, mode, &transaction_id).await })
    }

    fn find_receipt_by_id(&self, id: Uuid) -> StoreFuture<'_, Option<Receipt>> {
        Box::pin(donation_repo::find_receipt_by_id(&self.pool, id))
    }

    fn insert_receipt(&self, receipt: NewReceipt) -> StoreFuture<'_, Receipt> {
        Box::pin(async move { donation_repo::insert_receipt(&self.pool, &receipt).await })
    }

    fn insert_combined(
        &self,
        combined: CombinedTransaction,
    ) -> StoreFuture<'_, CombinedTransaction> {
        Box::pin(async move { donation_repo::insert_combined(&self.pool, &combined).await })
    }

    fn donations_for_resolution(&self, ids: Option<Vec<Uuid>>) -> StoreFuture<'_, Vec<Donation>> {
        Box::pin(donation_repo::donations_for_resolution(&self.pool, ids))
    }

    fn update_donation_amount(&self, id: Uuid, amount: MoneyAmount) -> StoreFuture<'_, ()> {
        Box::pin(donation_repo::update_donation_amount(&self.pool, id, amount))
    }

    fn update_receipt_amounts(
        &self,
        donation_id: Uuid,
        amount: MoneyAmount,
    ) -> StoreFuture<'_, u64> {
        Box::pin(donation_repo::update_receipt_amounts(&self.pool, donation_id, amount))
    }
}

impl ProfileStore for PgStore {
    fn find_user_id_by_email(&self, email: &str) -> StoreFuture<'_, Option<Uuid>> {
        let email = email.to_string();
        Box::pin(async move { profile_repo::find_user_id_by_email(&self.pool, &email).await })
    }

    fn role_of(&self, user_id: Uuid) -> StoreFuture<'_, Option<Role>> {
        Box::pin(profile_repo::role_of(&self.pool, user_id))
    }
}

impl PledgeStore for PgStore {
    fn find_event(&self, id: Uuid) -> StoreFuture<'_, Option<PledgeEvent>> {
        Box::pin(pledge_repo::find_event(&self.pool, id))
    }

    fn record_event_outcome(&self, id: Uuid, actual_miles: f64) -> StoreFuture<'_, ()> {
        Box::pin(pledge_repo::record_event_outcome(&self.pool, id, actual_miles))
    }

    fn pending_pledges(&self, event_id: Uuid) -> StoreFuture<'_, Vec<Pledge>> {
        Box::pin(pledge_repo::pending_pledges(&self.pool, event_id))
    }

    fn record_pledge_outcome(
        &self,
        pledge_id: Uuid,
        outcome: PledgeOutcome,
    ) -> StoreFuture<'_, bool> {
        Box::pin(async move { pledge_repo::record_pledge_outcome(&self.pool, pledge_id, &outcome).await })
    }

    fn mark_event_settled(&self, id: Uuid) -> StoreFuture<'_, ()> {
        Box::pin(pledge_repo::mark_event_settled(&self.pool, id))
    }
}
