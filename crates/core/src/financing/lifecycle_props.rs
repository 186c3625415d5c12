//! Property-based tests for the installment lifecycle.

use chrono::NaiveDate;
use proptest::prelude::*;
use rust_decimal_macros::dec;

use medfin_shared::FinancingConfig;
use medfin_shared::types::{BudgetId, PatientId, PaymentRef, PlanTemplateId};

use crate::financing::error::FinancingError;
use crate::financing::ledger::AgreementLedger;
use crate::financing::lifecycle::InstallmentLifecycle;
use crate::financing::types::{
    FinancingPlanTemplate, FinancingTerms, OpenAgreementRequest, PaymentEvent, PaymentState,
    PlanStatus,
};

fn arb_state() -> impl Strategy<Value = PaymentState> {
    prop_oneof![
        Just(PaymentState::Pending),
        Just(PaymentState::Paid),
        Just(PaymentState::Overdue),
        Just(PaymentState::Default),
    ]
}

fn arb_date() -> impl Strategy<Value = NaiveDate> {
    (0u64..3_650).prop_map(|offset| {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .checked_add_days(chrono::Days::new(offset))
            .unwrap()
    })
}

fn arb_payment_ref() -> impl Strategy<Value = PaymentRef> {
    "pay_[a-z0-9]{8}".prop_map(|s| PaymentRef::new(s))
}

fn open_plan() -> FinancingPlanTemplate {
    FinancingPlanTemplate {
        id: PlanTemplateId::new(),
        name: "General 1-24".to_string(),
        annual_interest_rate_percent: dec!(12),
        min_installments: 1,
        max_installments: 24,
        min_amount: dec!(100),
        max_amount: dec!(50000),
        requires_down_payment: false,
        down_payment_percentage: dec!(0),
        status: PlanStatus::Active,
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Paid is terminal: no operation leaves it.
    #[test]
    fn prop_paid_is_terminal(date in arb_date(), payment_ref in arb_payment_ref()) {
        prop_assert!(InstallmentLifecycle::pay(PaymentState::Paid, date, payment_ref).is_err());
        prop_assert!(InstallmentLifecycle::mark_overdue(PaymentState::Paid, date).is_err());
        prop_assert!(InstallmentLifecycle::mark_default(PaymentState::Paid, date).is_err());
    }

    /// Pending never jumps straight to default.
    #[test]
    fn prop_pending_never_defaults_directly(date in arb_date()) {
        let result = InstallmentLifecycle::mark_default(PaymentState::Pending, date);
        let is_invalid_transition = matches!(
            result,
            Err(FinancingError::InvalidTransition {
                from: PaymentState::Pending,
                to: PaymentState::Default,
            })
        );
        prop_assert!(is_invalid_transition);
    }

    /// Every operation succeeds exactly when the transition table allows it.
    #[test]
    fn prop_operations_follow_transition_table(
        state in arb_state(),
        date in arb_date(),
        payment_ref in arb_payment_ref(),
    ) {
        prop_assert_eq!(
            InstallmentLifecycle::pay(state, date, payment_ref).is_ok(),
            InstallmentLifecycle::is_valid_transition(state, PaymentState::Paid)
        );
        prop_assert_eq!(
            InstallmentLifecycle::mark_overdue(state, date).is_ok(),
            InstallmentLifecycle::is_valid_transition(state, PaymentState::Overdue)
        );
        prop_assert_eq!(
            InstallmentLifecycle::mark_default(state, date).is_ok(),
            InstallmentLifecycle::is_valid_transition(state, PaymentState::Default)
        );
    }

    /// Unpaid installments can always be settled.
    #[test]
    fn prop_pay_succeeds_unless_paid(
        state in arb_state(),
        date in arb_date(),
        payment_ref in arb_payment_ref(),
    ) {
        let result = InstallmentLifecycle::pay(state, date, payment_ref);
        prop_assert_eq!(result.is_ok(), state != PaymentState::Paid);
        if let Ok(action) = result {
            prop_assert_eq!(action.new_state(), PaymentState::Paid);
        }
    }

    /// A second payment for the same installment is rejected and changes nothing.
    #[test]
    fn prop_double_payment_rejected(
        (count, number) in (1u32..=24).prop_flat_map(|c| (Just(c), 1..=c)),
        date in arb_date(),
        payment_ref in arb_payment_ref(),
    ) {
        let ledger = AgreementLedger::new(FinancingConfig::new(30, 3));
        let agreement = ledger
            .open_agreement_on(
                &open_plan(),
                OpenAgreementRequest {
                    patient_id: PatientId::new(),
                    budget_id: BudgetId::new(),
                    terms: FinancingTerms {
                        requested_amount: dec!(2400),
                        installment_count: count,
                        down_payment: dec!(0),
                    },
                },
                date,
            )
            .unwrap();
        let event = PaymentEvent {
            installment_number: number,
            payment_ref,
            paid_date: date,
        };

        let first = ledger.apply_payment(agreement.id, event.clone()).unwrap();
        let second = ledger.apply_payment(agreement.id, event);

        let is_already_paid = matches!(
            second,
            Err(FinancingError::InstallmentAlreadyPaid { number: n, .. }) if n == number
        );
        prop_assert!(is_already_paid);
        let stored = ledger.get(agreement.id).unwrap();
        prop_assert_eq!(stored.schedule, first.schedule);
    }
}
