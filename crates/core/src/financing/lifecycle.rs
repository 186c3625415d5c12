//! Installment repayment state machine.
//!
//! This module validates state changes of a single installment and returns
//! the action to apply; it never touches an agreement itself.

use chrono::NaiveDate;

use medfin_shared::types::PaymentRef;

use crate::financing::error::FinancingError;
use crate::financing::types::{Installment, PaymentState};

/// A validated installment state change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleAction {
    /// Settle the installment.
    Pay {
        /// The new state (Paid).
        new_state: PaymentState,
        /// Settlement date.
        paid_date: NaiveDate,
        /// Gateway reference of the settling payment.
        payment_ref: PaymentRef,
    },
    /// Flag the installment as past due.
    MarkOverdue {
        /// The new state (Overdue).
        new_state: PaymentState,
        /// Date the sweep ran against.
        as_of: NaiveDate,
    },
    /// Flag the installment as defaulted.
    MarkDefault {
        /// The new state (Default).
        new_state: PaymentState,
        /// Date the sweep ran against.
        as_of: NaiveDate,
    },
}

impl LifecycleAction {
    /// Returns the new state resulting from this action.
    #[must_use]
    pub fn new_state(&self) -> PaymentState {
        match self {
            Self::Pay { new_state, .. }
            | Self::MarkOverdue { new_state, .. }
            | Self::MarkDefault { new_state, .. } => *new_state,
        }
    }
}

/// Stateless service for installment state transitions.
pub struct InstallmentLifecycle;

impl InstallmentLifecycle {
    /// Settle an unpaid installment.
    ///
    /// Valid from Pending, Overdue, and Default: a late payment always clears
    /// delinquency.
    ///
    /// # Errors
    ///
    /// Returns `FinancingError::InvalidTransition` if the installment is already paid.
    pub fn pay(
        current: PaymentState,
        paid_date: NaiveDate,
        payment_ref: PaymentRef,
    ) -> Result<LifecycleAction, FinancingError> {
        Self::guard(current, PaymentState::Paid)?;
        Ok(LifecycleAction::Pay {
            new_state: PaymentState::Paid,
            paid_date,
            payment_ref,
        })
    }

    /// Flag a pending installment as overdue.
    ///
    /// # Errors
    ///
    /// Returns `FinancingError::InvalidTransition` unless the installment is pending.
    pub fn mark_overdue(
        current: PaymentState,
        as_of: NaiveDate,
    ) -> Result<LifecycleAction, FinancingError> {
        Self::guard(current, PaymentState::Overdue)?;
        Ok(LifecycleAction::MarkOverdue {
            new_state: PaymentState::Overdue,
            as_of,
        })
    }

    /// Flag an overdue installment as defaulted.
    ///
    /// # Errors
    ///
    /// Returns `FinancingError::InvalidTransition` unless the installment is overdue.
    pub fn mark_default(
        current: PaymentState,
        as_of: NaiveDate,
    ) -> Result<LifecycleAction, FinancingError> {
        Self::guard(current, PaymentState::Default)?;
        Ok(LifecycleAction::MarkDefault {
            new_state: PaymentState::Default,
            as_of,
        })
    }

    /// Check if a state transition is valid.
    ///
    /// Valid transitions:
    /// - Pending → Paid | Overdue
    /// - Overdue → Paid | Default
    /// - Default → Paid
    #[must_use]
    pub fn is_valid_transition(from: PaymentState, to: PaymentState) -> bool {
        matches!(
            (from, to),
            (
                PaymentState::Pending,
                PaymentState::Paid | PaymentState::Overdue
            ) | (
                PaymentState::Overdue,
                PaymentState::Paid | PaymentState::Default
            ) | (PaymentState::Default, PaymentState::Paid)
        )
    }

    fn guard(from: PaymentState, to: PaymentState) -> Result<(), FinancingError> {
        if Self::is_valid_transition(from, to) {
            Ok(())
        } else {
            Err(FinancingError::InvalidTransition { from, to })
        }
    }
}

impl Installment {
    /// Applies a validated action to this installment.
    pub(crate) fn apply(&mut self, action: LifecycleAction) {
        self.payment_state = action.new_state();
        if let LifecycleAction::Pay {
            paid_date,
            payment_ref,
            ..
        } = action
        {
            self.paid_date = Some(paid_date);
            self.payment_ref = Some(payment_ref);
        }
    }
}
