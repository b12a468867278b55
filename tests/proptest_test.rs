//! Property-based tests for clustercost using proptest

use chrono::{DateTime, Duration, TimeZone, Utc};
use clustercost_core::breakdown::{CostBreakdown, CostCategory};
use clustercost_pricing::spot::{SpotPriceHistory, integrate};
use clustercost_pricing::storage::{GIB_FACTOR, HOURS_PER_MONTH, rate_per_gb_month};
use clustercost_pricing::StorageCostEstimator;
use proptest::prelude::*;

// Strategies for generating test data

fn base() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

prop_compose! {
    fn arb_breakdown()(
        entries in prop::collection::vec(
            (
                prop::sample::select(vec!["MASTER", "CORE", "TASK"]),
                prop::sample::select(CostCategory::ALL.to_vec()),
                0u32..10_000,
            ),
            0..8,
        )
    ) -> CostBreakdown {
        let mut breakdown = CostBreakdown::new();
        for (role, category, cents) in entries {
            breakdown.add(role, category, f64::from(cents) / 100.0);
        }
        breakdown
    }
}

prop_compose! {
    // always observed at base() so no window starts before the first observation
    fn arb_history()(
        opening in 0.01f64..2.0,
        points in prop::collection::vec((1i64..48 * 3600, 0.01f64..2.0), 0..20)
    ) -> SpotPriceHistory {
        std::iter::once((base(), opening))
            .chain(
                points
                    .into_iter()
                    .map(|(offset, price)| (base() + Duration::seconds(offset), price)),
            )
            .collect()
    }
}

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-9 * a.abs().max(b.abs()).max(1.0)
}

proptest! {
    #[test]
    fn add_costs_is_commutative(a in arb_breakdown(), b in arb_breakdown()) {
        prop_assert_eq!(
            CostBreakdown::add_costs([&a, &b]),
            CostBreakdown::add_costs([&b, &a])
        );
    }

    #[test]
    fn add_costs_is_associative(a in arb_breakdown(), b in arb_breakdown(), c in arb_breakdown()) {
        let left = CostBreakdown::add_costs([&CostBreakdown::add_costs([&a, &b]), &c]);
        let right = CostBreakdown::add_costs([&a, &CostBreakdown::add_costs([&b, &c])]);
        prop_assert_eq!(left.len(), right.len());
        for (key, value) in left.iter() {
            prop_assert!(close(value, right.get(key)));
        }
    }

    #[test]
    fn zero_breakdown_is_identity(a in arb_breakdown()) {
        let zero = CostBreakdown::new();
        let sum = CostBreakdown::add_costs([&a, &zero]);
        prop_assert_eq!(sum, a);
    }

    #[test]
    fn storage_is_linear_in_size_and_hours(
        size in 1u32..16_384,
        hours in 0.0f64..10_000.0,
        volume_type in prop::sample::select(vec!["gp2", "gp3", "io1", "st1", "sc1"]),
    ) {
        let rate = rate_per_gb_month(volume_type).unwrap();
        let cost = StorageCostEstimator::volume_cost(hours, volume_type, size);
        let expected = f64::from(size) * rate * GIB_FACTOR * hours / HOURS_PER_MONTH;
        prop_assert!(close(cost, expected));

        let doubled = StorageCostEstimator::volume_cost(hours * 2.0, volume_type, size);
        prop_assert!(close(doubled, 2.0 * cost));
    }

    #[test]
    fn single_observation_is_flat_rate(
        at in 0i64..100_000,
        price in 0.001f64..5.0,
        start in 0i64..100_000,
        len in 1i64..100_000,
    ) {
        let history: SpotPriceHistory =
            std::iter::once((base() + Duration::seconds(at), price)).collect();
        let from = base() + Duration::seconds(start);
        let to = from + Duration::seconds(len);
        prop_assert!(close(integrate(&history, from, to), len as f64 * price / 3600.0));
    }

    #[test]
    fn observations_after_end_do_not_matter(
        history in arb_history(),
        start in 0i64..24 * 3600,
        len in 1i64..24 * 3600,
        extra_price in 0.01f64..2.0,
    ) {
        let from = base() + Duration::seconds(start);
        let to = from + Duration::seconds(len);
        let before = integrate(&history, from, to);

        let mut extended = history.clone();
        extended.insert(to + Duration::seconds(1), extra_price);
        extended.insert(to + Duration::hours(5), extra_price);
        prop_assert!(close(integrate(&extended, from, to), before));
    }

    #[test]
    fn integral_is_bounded_by_price_range(
        history in arb_history(),
        start in 0i64..48 * 3600,
        len in 1i64..24 * 3600,
    ) {
        let from = base() + Duration::seconds(start);
        let to = from + Duration::seconds(len);
        let hours = len as f64 / 3600.0;
        let (lo, hi) = history
            .iter()
            .fold((f64::MAX, f64::MIN), |(lo, hi), (_, p)| (lo.min(p), hi.max(p)));

        let total = integrate(&history, from, to);
        prop_assert!(total >= lo * hours - 1e-9);
        prop_assert!(total <= hi * hours + 1e-9);
    }
}
