use {
    super::audit::{CombinedTransaction, TransactionKey},
    super::donation::{Donation, NewDonation, NewReceipt, Receipt},
    super::error::LedgerError,
    super::id::StripeMode,
    super::money::MoneyAmount,
    super::pledge::{Pledge, PledgeEvent, PledgeOutcome},
    super::principal::Role,
    std::{future::Future, pin::Pin},
    uuid::Uuid,
};

pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, LedgerError>> + Send + 'a>>;

/// Donations, receipts and their audit snapshots.
pub trait DonationStore: Send + Sync {
    fn find_combined(
        &self,
        mode: StripeMode,
        key: &TransactionKey,
    ) -> StoreFuture<'_, Option<CombinedTransaction>>;

    fn find_donation(&self, id: Uuid) -> StoreFuture<'_, Option<Donation>>;

    fn find_donation_by_subscription(
        &self,
        mode: StripeMode,
        subscription_id: &str,
    ) -> StoreFuture<'_, Option<Donation>>;

    fn find_donation_by_payment_intent(
        &self,
        mode: StripeMode,
        payment_intent_id: &str,
    ) -> StoreFuture<'_, Option<Donation>>;

    fn insert_donation(&self, donation: NewDonation) -> StoreFuture<'_, Donation>;

    fn find_receipt(
        &self,
        mode: StripeMode,
        transaction_id: &str,
    ) -> StoreFuture<'_, Option<Receipt>>;

    fn find_receipt_by_id(&self, id: Uuid) -> StoreFuture<'_, Option<Receipt>>;

    fn insert_receipt(&self, receipt: NewReceipt) -> StoreFuture<'_, Receipt>;

    fn insert_combined(
        &self,
        combined: CombinedTransaction,
    ) -> StoreFuture<'_, CombinedTransaction>;

    /// Donations carrying a gateway reference, optionally narrowed to `ids`.
    fn donations_for_resolution(&self, ids: Option<Vec<Uuid>>) -> StoreFuture<'_, Vec<Donation>>;

    fn update_donation_amount(&self, id: Uuid, amount: MoneyAmount) -> StoreFuture<'_, ()>;

    /// Rewrites the amount on every receipt of the donation that disagrees,
    /// renewal receipts of a recurring gift included. Returns how many
    /// changed.
    fn update_receipt_amounts(
        &self,
        donation_id: Uuid,
        amount: MoneyAmount,
    ) -> StoreFuture<'_, u64>;
}

/// Identity lookups against the `profiles` table.
pub trait ProfileStore: Send + Sync {
    /// Case-insensitive match on the profile email.
    fn find_user_id_by_email(&self, email: &str) -> StoreFuture<'_, Option<Uuid>>;

    fn role_of(&self, user_id: Uuid) -> StoreFuture<'_, Option<Role>>;
}

pub trait PledgeStore: Send + Sync {
    fn find_event(&self, id: Uuid) -> StoreFuture<'_, Option<PledgeEvent>>;

    /// Stores the measured quantity and moves the event to `completed`.
    fn record_event_outcome(&self, id: Uuid, actual_miles: f64) -> StoreFuture<'_, ()>;

    fn pending_pledges(&self, event_id: Uuid) -> StoreFuture<'_, Vec<Pledge>>;

    /// Writes the terminal status of a still-pending pledge. Returns `false`
    /// when the pledge had already left `pending`.
    fn record_pledge_outcome(
        &self,
        pledge_id: Uuid,
        outcome: PledgeOutcome,
    ) -> StoreFuture<'_, bool>;

    fn mark_event_settled(&self, id: Uuid) -> StoreFuture<'_, ()>;
}
