//! Property-based tests for ScheduleGenerator.
//!
//! Amounts are drawn in whole cents, rates in basis points, so every input is
//! something a clinic could actually quote.

use chrono::NaiveDate;
use proptest::prelude::*;
use rust_decimal::{Decimal, RoundingStrategy};

use crate::financing::error::FinancingError;
use crate::financing::schedule::ScheduleGenerator;

/// Principal between 100.00 and 1,000,000.00.
fn arb_principal() -> impl Strategy<Value = Decimal> {
    (10_000i64..=100_000_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

/// Annual rate between 0% and 36%, two decimal places.
fn arb_rate() -> impl Strategy<Value = Decimal> {
    (0i64..=3_600i64).prop_map(|bp| Decimal::new(bp, 2))
}

/// Principal between 0.01 and 100.00, where rounding dominates the payment.
fn arb_small_principal() -> impl Strategy<Value = Decimal> {
    (1i64..=10_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

/// Whole units or cents.
fn arb_scale() -> impl Strategy<Value = u32> {
    prop_oneof![Just(0u32), Just(2u32)]
}

fn arb_count() -> impl Strategy<Value = u32> {
    1u32..=60
}

/// Start dates across several years, month ends included.
fn arb_start_date() -> impl Strategy<Value = NaiveDate> {
    (2020i32..=2030, 1u32..=12, 1u32..=31).prop_map(|(y, m, d)| {
        (1..=d)
            .rev()
            .find_map(|day| NaiveDate::from_ymd_opt(y, m, day))
            .unwrap()
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Principal portions sum to the amount financed, to the cent.
    #[test]
    fn prop_principal_sum_is_exact(
        principal in arb_principal(),
        rate in arb_rate(),
        count in arb_count(),
        start in arb_start_date(),
    ) {
        let schedule = ScheduleGenerator::new().generate(principal, rate, count, start).unwrap();
        let sum: Decimal = schedule.installments.iter().map(|i| i.principal_portion).sum();
        prop_assert_eq!(sum, principal);
        prop_assert_eq!(schedule.total_payable, principal + schedule.total_interest);
    }

    /// The schedule ends with nothing owed.
    #[test]
    fn prop_terminal_balance_is_zero(
        principal in arb_principal(),
        rate in arb_rate(),
        count in arb_count(),
        start in arb_start_date(),
    ) {
        let schedule = ScheduleGenerator::new().generate(principal, rate, count, start).unwrap();
        prop_assert_eq!(schedule.installments.len(), count as usize);
        prop_assert!(schedule.last().unwrap().remaining_principal_after.is_zero());
    }

    /// Due dates strictly increase and numbering is contiguous from 1.
    #[test]
    fn prop_due_dates_increase(
        principal in arb_principal(),
        rate in arb_rate(),
        count in arb_count(),
        start in arb_start_date(),
    ) {
        let schedule = ScheduleGenerator::new().generate(principal, rate, count, start).unwrap();
        prop_assert!(schedule.installments[0].due_date > start);
        for pair in schedule.installments.windows(2) {
            prop_assert!(pair[0].due_date < pair[1].due_date);
            prop_assert_eq!(pair[0].number + 1, pair[1].number);
        }
    }

    /// Every installment but the last pays exactly the level amount.
    #[test]
    fn prop_interior_installments_are_level(
        principal in arb_principal(),
        rate in arb_rate(),
        count in arb_count(),
        start in arb_start_date(),
    ) {
        let schedule = ScheduleGenerator::new().generate(principal, rate, count, start).unwrap();
        let (last, interior) = schedule.installments.split_last().unwrap();
        for installment in interior {
            prop_assert_eq!(installment.total_amount, schedule.installment_amount);
            prop_assert_eq!(
                installment.total_amount,
                installment.principal_portion + installment.interest_portion
            );
        }
        prop_assert_eq!(last.total_amount, last.principal_portion + last.interest_portion);
    }

    /// Principal portions are positive and balances never go negative.
    #[test]
    fn prop_balances_stay_non_negative(
        principal in arb_principal(),
        rate in arb_rate(),
        count in arb_count(),
        start in arb_start_date(),
    ) {
        let schedule = ScheduleGenerator::new().generate(principal, rate, count, start).unwrap();
        for installment in &schedule.installments {
            prop_assert!(installment.principal_portion > Decimal::ZERO);
            prop_assert!(installment.interest_portion >= Decimal::ZERO);
            prop_assert!(installment.remaining_principal_after >= Decimal::ZERO);
        }
    }

    /// With no interest the principal is split evenly.
    #[test]
    fn prop_zero_rate_has_no_interest(
        principal in arb_principal(),
        count in arb_count(),
        start in arb_start_date(),
    ) {
        let schedule = ScheduleGenerator::new()
            .generate(principal, Decimal::ZERO, count, start)
            .unwrap();
        let even_split = (principal / Decimal::from(count))
            .round_dp_with_strategy(2, RoundingStrategy::MidpointNearestEven);

        prop_assert!(schedule.total_interest.is_zero());
        prop_assert_eq!(schedule.installment_amount, even_split);
        let (_, interior) = schedule.installments.split_last().unwrap();
        for installment in interior {
            prop_assert!(installment.interest_portion.is_zero());
            prop_assert_eq!(installment.principal_portion, even_split);
        }
    }

    /// Generation is deterministic.
    #[test]
    fn prop_generation_is_pure(
        principal in arb_principal(),
        rate in arb_rate(),
        count in arb_count(),
        start in arb_start_date(),
    ) {
        let generator = ScheduleGenerator::new();
        let first = generator.generate(principal, rate, count, start).unwrap();
        let second = generator.generate(principal, rate, count, start).unwrap();
        prop_assert_eq!(first.installments, second.installments);
    }

    /// Tiny amounts either amortize cleanly or are rejected; they never
    /// produce negative portions or balances.
    #[test]
    fn prop_small_amounts_never_go_negative(
        principal in arb_small_principal(),
        rate in arb_rate(),
        count in arb_count(),
        scale in arb_scale(),
        start in arb_start_date(),
    ) {
        match ScheduleGenerator::with_scale(scale).generate(principal, rate, count, start) {
            Ok(schedule) => {
                let sum: Decimal = schedule.installments.iter().map(|i| i.principal_portion).sum();
                prop_assert_eq!(sum, principal);
                for installment in &schedule.installments {
                    prop_assert!(installment.principal_portion > Decimal::ZERO);
                    prop_assert!(installment.interest_portion >= Decimal::ZERO);
                    prop_assert!(installment.total_amount > Decimal::ZERO);
                    prop_assert!(installment.remaining_principal_after >= Decimal::ZERO);
                }
            }
            Err(err) => {
                let is_principal_rejection = matches!(
                    err,
                    FinancingError::InvalidTerms { field: "principal", .. }
                );
                prop_assert!(is_principal_rejection);
            }
        }
    }
}
