//! Financing error types.
//!
//! Every rejection carries the bound or value that caused it so callers can
//! render a precise message without re-running the check.

use rust_decimal::Decimal;
use std::fmt;
use thiserror::Error;

use medfin_shared::AppError;
use medfin_shared::types::{AgreementId, BudgetId, PatientId, PlanTemplateId};

use crate::financing::types::PaymentState;

/// Which amount rule an agreement request broke.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AmountViolation {
    /// Requested amount is outside the template's `[min, max]`.
    OutsideTemplateRange {
        /// Requested amount.
        amount: Decimal,
        /// Template minimum.
        min: Decimal,
        /// Template maximum.
        max: Decimal,
    },
    /// Down payment leaves nothing to finance.
    NothingToFinance {
        /// Requested amount.
        requested: Decimal,
        /// Down payment offered.
        down_payment: Decimal,
    },
}

impl fmt::Display for AmountViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutsideTemplateRange { amount, min, max } => {
                write!(f, "amount {amount} is outside the plan range {min}..={max}")
            }
            Self::NothingToFinance {
                requested,
                down_payment,
            } => write!(
                f,
                "down payment {down_payment} leaves nothing to finance from {requested}"
            ),
        }
    }
}

/// Errors raised by schedule generation and the agreement ledger.
#[derive(Debug, Error)]
pub enum FinancingError {
    /// Malformed numeric input to the schedule generator.
    #[error("Invalid terms: {field}: {reason}")]
    InvalidTerms {
        /// Offending input.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },

    /// The plan template is not active.
    #[error("Plan template {template_id} is inactive")]
    InactiveTemplate {
        /// Template requested.
        template_id: PlanTemplateId,
    },

    /// Amount outside what the plan allows.
    #[error("Amount out of range: {0}")]
    AmountOutOfRange(AmountViolation),

    /// Installment count outside the plan's bounds.
    #[error("Installment count {count} is outside the plan range {min}..={max}")]
    InstallmentCountOutOfRange {
        /// Requested count.
        count: u32,
        /// Template minimum.
        min: u32,
        /// Template maximum.
        max: u32,
    },

    /// The plan requires a down payment and none was offered.
    #[error("Plan template {template_id} requires a down payment")]
    DownPaymentRequired {
        /// Template requested.
        template_id: PlanTemplateId,
    },

    /// Down payment below the template's recommendation while enforcement is on.
    #[error("Down payment {provided} is below the required minimum {recommended}")]
    DownPaymentBelowRecommended {
        /// Down payment offered.
        provided: Decimal,
        /// Minimum derived from the template percentage.
        recommended: Decimal,
    },

    /// Installment number outside `1..=count`.
    #[error("Installment {number} not found in agreement {agreement_id} ({count} installments)")]
    InstallmentNotFound {
        /// Agreement addressed.
        agreement_id: AgreementId,
        /// Requested installment number.
        number: u32,
        /// Installments in the agreement.
        count: u32,
    },

    /// Installment was already settled.
    #[error("Installment {number} of agreement {agreement_id} is already paid")]
    InstallmentAlreadyPaid {
        /// Agreement addressed.
        agreement_id: AgreementId,
        /// Installment number.
        number: u32,
    },

    /// Installment state change not allowed by the lifecycle.
    #[error("Invalid installment transition from {from} to {to}")]
    InvalidTransition {
        /// Current state.
        from: PaymentState,
        /// Attempted state.
        to: PaymentState,
    },

    /// Agreement not found.
    #[error("Agreement {0} not found")]
    AgreementNotFound(AgreementId),

    /// The patient/budget pair already has an agreement.
    #[error("Patient {patient_id} already has an agreement for budget {budget_id}")]
    AgreementAlreadyExists {
        /// Patient.
        patient_id: PatientId,
        /// Budget.
        budget_id: BudgetId,
    },

    /// Template not present in the catalog.
    #[error("Plan template {0} not found")]
    TemplateNotFound(PlanTemplateId),

    /// Unexpected internal failure.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl FinancingError {
    /// Returns the HTTP status code for this error.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidTerms { .. } => 400,

            Self::InactiveTemplate { .. }
            | Self::AmountOutOfRange(_)
            | Self::InstallmentCountOutOfRange { .. }
            | Self::DownPaymentRequired { .. }
            | Self::DownPaymentBelowRecommended { .. }
            | Self::InvalidTransition { .. } => 422,

            Self::InstallmentNotFound { .. }
            | Self::AgreementNotFound(_)
            | Self::TemplateNotFound(_) => 404,

            Self::InstallmentAlreadyPaid { .. } | Self::AgreementAlreadyExists { .. } => 409,

            Self::Internal(_) => 500,
        }
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidTerms { .. } => "INVALID_TERMS",
            Self::InactiveTemplate { .. } => "INACTIVE_TEMPLATE",
            Self::AmountOutOfRange(_) => "AMOUNT_OUT_OF_RANGE",
            Self::InstallmentCountOutOfRange { .. } => "INSTALLMENT_COUNT_OUT_OF_RANGE",
            Self::DownPaymentRequired { .. } => "DOWN_PAYMENT_REQUIRED",
            Self::DownPaymentBelowRecommended { .. } => "DOWN_PAYMENT_BELOW_RECOMMENDED",
            Self::InstallmentNotFound { .. } => "INSTALLMENT_NOT_FOUND",
            Self::InstallmentAlreadyPaid { .. } => "INSTALLMENT_ALREADY_PAID",
            Self::InvalidTransition { .. } => "INVALID_TRANSITION",
            Self::AgreementNotFound(_) => "AGREEMENT_NOT_FOUND",
            Self::AgreementAlreadyExists { .. } => "AGREEMENT_ALREADY_EXISTS",
            Self::TemplateNotFound(_) => "TEMPLATE_NOT_FOUND",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<FinancingError> for AppError {
    fn from(err: FinancingError) -> Self {
        let message = err.to_string();
        match err.status_code() {
            400 => Self::Validation(message),
            404 => Self::NotFound(message),
            409 => Self::Conflict(message),
            422 => Self::BusinessRule(message),
            _ => Self::Internal(message),
        }
    }
}
