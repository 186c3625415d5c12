//! Installment financing for treatment budgets.
//!
//! Turns a requested amount and a plan template into a level-payment
//! amortization schedule, then tracks each installment through repayment.
//!
//! # Modules
//!
//! - `types` - Plan templates, agreements, installments, and read models
//! - `error` - Financing error types
//! - `schedule` - Level-payment schedule generation
//! - `validation` - Plan rules applied to requested terms
//! - `lifecycle` - Installment repayment state machine
//! - `catalog` - Plan template source
//! - `ledger` - Agreement store and its operations

pub mod catalog;
pub mod error;
pub mod ledger;
pub mod lifecycle;
pub mod schedule;
pub mod types;
pub mod validation;

#[cfg(test)]
mod lifecycle_props;
#[cfg(test)]
mod schedule_props;

pub use catalog::{InMemoryTemplateCatalog, TemplateCatalog};
pub use error::{AmountViolation, FinancingError};
pub use ledger::AgreementLedger;
pub use lifecycle::{InstallmentLifecycle, LifecycleAction};
pub use schedule::{DEFAULT_MONEY_SCALE, ScheduleGenerator};
pub use types::{
    AgreementStatus, AgreementSummary, AmortizationSchedule, FinancingAgreement,
    FinancingPlanTemplate, FinancingQuote, FinancingTerms, Installment, NextInstallment,
    OpenAgreementRequest, PaymentEvent, PaymentState, PlanStatus, RefreshReport,
};
pub use validation::{ValidatedTerms, validate_terms};
