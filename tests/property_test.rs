use donor_sync::domain::fragment::{FragmentKind, StripeItem, TransactionFragment, merge_fragments};
use donor_sync::domain::id::StripeMode;
use donor_sync::domain::money::MoneyAmount;
use donor_sync::domain::pledge::{Pledge, PledgeStatus};
use proptest::prelude::*;
use serde_json::json;
use uuid::Uuid;

fn arb_status() -> impl Strategy<Value = PledgeStatus> {
    prop_oneof![
        Just(PledgeStatus::Pending),
        Just(PledgeStatus::Charged),
        Just(PledgeStatus::Failed),
    ]
}

fn arb_kind() -> impl Strategy<Value = FragmentKind> {
    prop_oneof![
        Just(FragmentKind::Invoice),
        Just(FragmentKind::CheckoutSession),
        Just(FragmentKind::Charge),
        Just(FragmentKind::PaymentIntent),
    ]
}

fn amount_field(kind: FragmentKind) -> &'static str {
    match kind {
        FragmentKind::Invoice => "amount_paid",
        FragmentKind::CheckoutSession => "amount_total",
        FragmentKind::Charge | FragmentKind::PaymentIntent => "amount",
    }
}

fn fragment(kind: FragmentKind, cents: i64, tag: &str) -> TransactionFragment {
    let mut raw = json!({ "id": format!("obj_{tag}"), "metadata": { "source": tag } });
    raw[amount_field(kind)] = json!(cents);
    TransactionFragment::from_item(&StripeItem { kind, raw }).unwrap()
}

fn pledge(cents_per_mile: i64, cap: Option<i64>) -> Pledge {
    Pledge {
        id: Uuid::now_v7(),
        event_id: Uuid::now_v7(),
        pledger_name: "Prop".into(),
        pledger_email: None,
        cents_per_mile,
        max_amount: cap.map(|c| MoneyAmount::new(c).unwrap()),
        stripe_customer_id: None,
        stripe_setup_intent_id: None,
        stripe_payment_method_id: None,
        stripe_mode: StripeMode::Test,
        status: PledgeStatus::Pending,
        computed_total: None,
        stripe_payment_intent_id: None,
        failure_reason: None,
        charged_at: None,
    }
}

proptest! {
    /// Grossing up for fees and backing them out again lands on the base
    /// amount to within a cent.
    #[test]
    fn fee_gross_up_round_trips(base in 0i64..=100_000_000) {
        let base = MoneyAmount::new(base).unwrap();
        let charged = base.with_fee_covered();
        prop_assert!(charged > base);
        let back = charged.without_fee();
        prop_assert!(!back.differs_materially(base), "{base} -> {charged} -> {back}");
    }

    /// A larger gift never costs less once fees are covered.
    #[test]
    fn fee_gross_up_is_monotonic(a in 0i64..=10_000_000, b in 0i64..=10_000_000) {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        let lo = MoneyAmount::new(lo).unwrap().with_fee_covered();
        let hi = MoneyAmount::new(hi).unwrap().with_fee_covered();
        prop_assert!(lo <= hi);
    }

    /// Only differences strictly greater than one cent are material.
    #[test]
    fn material_difference_threshold(a in 0i64..=1_000_000, delta in -5i64..=5) {
        let b = (a + delta).max(0);
        let x = MoneyAmount::new(a).unwrap();
        let y = MoneyAmount::new(b).unwrap();
        prop_assert_eq!(x.differs_materially(y), (a - b).abs() > 1);
        prop_assert_eq!(x.differs_materially(y), y.differs_materially(x));
    }

    /// Whatever the arrival order, the amount and metadata of the
    /// highest-precedence fragment win.
    #[test]
    fn merge_prefers_highest_precedence_fragment(
        entries in prop::collection::vec((arb_kind(), 1i64..1_000_000), 1..6)
    ) {
        let fragments: Vec<_> = entries
            .iter()
            .enumerate()
            .map(|(i, (kind, cents))| fragment(*kind, *cents, &i.to_string()))
            .collect();
        let merged = merge_fragments(&fragments);

        let best = entries.iter().map(|(kind, _)| *kind).min().unwrap();
        let (winner_index, (_, winner_cents)) = entries
            .iter()
            .enumerate()
            .find(|(_, (kind, _))| *kind == best)
            .unwrap();
        let winner_tag = winner_index.to_string();
        prop_assert_eq!(merged.amount.map(|a| a.cents()), Some(*winner_cents));
        prop_assert_eq!(merged.metadata["source"].as_str(), Some(winner_tag.as_str()));
    }

    /// Pledges settle at most once along any sequence of attempted moves.
    #[test]
    fn pledge_settles_at_most_once(steps in prop::collection::vec(arb_status(), 1..20)) {
        let mut current = PledgeStatus::Pending;
        let mut transitions = 0u32;
        for next in &steps {
            if current.can_transition_to(next) {
                current = *next;
                transitions += 1;
            }
        }
        prop_assert!(transitions <= 1, "got {transitions} transitions in walk: {steps:?}");
    }

    #[test]
    fn pledge_status_roundtrip(status in arb_status()) {
        prop_assert_eq!(PledgeStatus::try_from(status.as_str()).unwrap(), status);
    }

    /// The computed total respects the pledger's cap and is never negative.
    #[test]
    fn pledge_total_respects_cap(
        cents_per_mile in 0i64..10_000,
        miles in 0.0f64..500.0,
        cap in prop::option::of(0i64..100_000),
    ) {
        let total = pledge(cents_per_mile, cap).total_for(miles);
        prop_assert!(total.cents() >= 0);
        if let Some(cap) = cap {
            prop_assert!(total.cents() <= cap);
        }
    }
}
