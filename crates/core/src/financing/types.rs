//! Financing domain types.
//!
//! Plan templates, agreements, their installment schedules, and the read
//! models the ledger hands back to callers.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;

use medfin_shared::types::{AgreementId, BudgetId, PatientId, PaymentRef, PlanTemplateId};

use crate::financing::error::FinancingError;

/// Availability of a plan template for new agreements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanStatus {
    /// Template may be used to open new agreements.
    Active,
    /// Template is kept for history only.
    Inactive,
}

/// A financing plan offered by the clinic.
///
/// Owned by the external catalog; the engine only reads it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinancingPlanTemplate {
    /// Unique identifier.
    pub id: PlanTemplateId,
    /// Display name (e.g., "12 months, 12% APR").
    pub name: String,
    /// Nominal annual rate as a percentage (12 means 12% APR).
    pub annual_interest_rate_percent: Decimal,
    /// Fewest installments allowed.
    pub min_installments: u32,
    /// Most installments allowed.
    pub max_installments: u32,
    /// Smallest requested amount allowed.
    pub min_amount: Decimal,
    /// Largest requested amount allowed.
    pub max_amount: Decimal,
    /// Whether a positive down payment is mandatory.
    pub requires_down_payment: bool,
    /// Recommended down payment as a percentage of the requested amount.
    pub down_payment_percentage: Decimal,
    /// Availability.
    pub status: PlanStatus,
}

impl FinancingPlanTemplate {
    /// Returns true if the template can open new agreements.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == PlanStatus::Active
    }

    /// Recommended down payment for a requested amount, rounded to `scale` places.
    ///
    /// # Errors
    ///
    /// Returns `FinancingError::InvalidTerms` if the product exceeds the
    /// decimal range.
    pub fn recommended_down_payment(
        &self,
        requested_amount: Decimal,
        scale: u32,
    ) -> Result<Decimal, FinancingError> {
        requested_amount
            .checked_mul(self.down_payment_percentage)
            .and_then(|v| v.checked_div(Decimal::ONE_HUNDRED))
            .map(|v| v.round_dp_with_strategy(scale, RoundingStrategy::MidpointNearestEven))
            .ok_or_else(|| FinancingError::InvalidTerms {
                field: "requested_amount",
                reason: format!(
                    "{}% of {requested_amount} exceeds decimal range",
                    self.down_payment_percentage
                ),
            })
    }
}

/// Repayment state of a single installment.
///
/// Valid transitions:
/// - Pending → Paid
/// - Pending → Overdue
/// - Overdue → Paid
/// - Overdue → Default
/// - Default → Paid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentState {
    /// Not yet due, or due today.
    Pending,
    /// Settled by a confirmed payment (terminal).
    Paid,
    /// Past its due date and unpaid.
    Overdue,
    /// Unpaid beyond the grace period.
    Default,
}

impl PaymentState {
    /// Returns the string representation of the state.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Overdue => "overdue",
            Self::Default => "default",
        }
    }

    /// Parses a state from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "paid" => Some(Self::Paid),
            "overdue" => Some(Self::Overdue),
            "default" => Some(Self::Default),
            _ => None,
        }
    }

    /// Returns true if no further transition is possible.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Paid)
    }

    /// Returns true if the installment is past due and unpaid.
    #[must_use]
    pub fn is_delinquent(&self) -> bool {
        matches!(self, Self::Overdue | Self::Default)
    }
}

impl fmt::Display for PaymentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Aggregate status of a financing agreement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgreementStatus {
    /// Repayment in progress.
    Active,
    /// Every installment is paid.
    Paid,
    /// Defaulted installments reached the configured threshold.
    Default,
}

impl AgreementStatus {
    /// Returns the string representation of the status.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Paid => "paid",
            Self::Default => "default",
        }
    }
}

impl fmt::Display for AgreementStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One due period of an amortization schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Installment {
    /// Position in the schedule, starting at 1.
    pub number: u32,
    /// Date the installment falls due.
    pub due_date: NaiveDate,
    /// Principal repaid by this installment.
    pub principal_portion: Decimal,
    /// Interest charged for the period.
    pub interest_portion: Decimal,
    /// `principal_portion + interest_portion`.
    pub total_amount: Decimal,
    /// Principal still owed once this installment is paid as scheduled.
    pub remaining_principal_after: Decimal,
    /// Repayment state.
    pub payment_state: PaymentState,
    /// Settlement date, set only when paid.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paid_date: Option<NaiveDate>,
    /// External payment that settled this installment.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_ref: Option<PaymentRef>,
}

impl Installment {
    /// Returns true if the installment has been paid.
    #[must_use]
    pub fn is_paid(&self) -> bool {
        self.payment_state == PaymentState::Paid
    }
}

/// Output of the schedule generator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AmortizationSchedule {
    /// Amount amortized by the schedule.
    pub principal: Decimal,
    /// Per-period rate derived from the annual rate.
    pub monthly_rate: Decimal,
    /// Level payment quoted for every installment but the last.
    pub installment_amount: Decimal,
    /// Installments in due-date order.
    pub installments: Vec<Installment>,
    /// Sum of all interest portions.
    pub total_interest: Decimal,
    /// Sum of all installment totals.
    pub total_payable: Decimal,
}

impl AmortizationSchedule {
    /// Returns the final installment.
    #[must_use]
    pub fn last(&self) -> Option<&Installment> {
        self.installments.last()
    }
}

/// Amount, count, and down payment a patient asks to finance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinancingTerms {
    /// Treatment amount before the down payment.
    pub requested_amount: Decimal,
    /// Number of monthly installments.
    pub installment_count: u32,
    /// Amount paid upfront, outside the schedule.
    pub down_payment: Decimal,
}

/// Input for opening an agreement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenAgreementRequest {
    /// Patient being financed.
    pub patient_id: PatientId,
    /// Budget the financing covers.
    pub budget_id: BudgetId,
    /// Requested terms.
    pub terms: FinancingTerms,
}

/// Settlement confirmation delivered by the payment subsystem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentEvent {
    /// Installment the payment settles.
    pub installment_number: u32,
    /// Gateway reference of the settled payment.
    pub payment_ref: PaymentRef,
    /// Date the payment settled.
    pub paid_date: NaiveDate,
}

/// A financing decision for one patient/budget pairing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinancingAgreement {
    /// Unique identifier.
    pub id: AgreementId,
    /// Patient being financed.
    pub patient_id: PatientId,
    /// Budget the financing covers.
    pub budget_id: BudgetId,
    /// Template the agreement was opened from.
    pub template_id: PlanTemplateId,
    /// Amount amortized (requested amount minus down payment).
    pub total_financed_amount: Decimal,
    /// Amount paid upfront.
    pub down_payment_amount: Decimal,
    /// Number of installments.
    pub installment_count: u32,
    /// Level payment computed at creation.
    pub installment_amount: Decimal,
    /// Template rate at creation time, never updated.
    pub applied_annual_rate_percent: Decimal,
    /// Date the schedule counts from.
    pub start_date: NaiveDate,
    /// Aggregate status.
    pub status: AgreementStatus,
    /// Installments in due-date order.
    pub schedule: Vec<Installment>,
    /// When the agreement was opened.
    pub created_at: DateTime<Utc>,
}

impl FinancingAgreement {
    /// Returns the installment with the given number.
    #[must_use]
    pub fn installment(&self, number: u32) -> Option<&Installment> {
        let index = usize::try_from(number.checked_sub(1)?).ok()?;
        self.schedule.get(index)
    }

    pub(crate) fn installment_mut(&mut self, number: u32) -> Option<&mut Installment> {
        let index = usize::try_from(number.checked_sub(1)?).ok()?;
        self.schedule.get_mut(index)
    }

    /// Counts installments in the given state.
    #[must_use]
    pub fn count_in_state(&self, state: PaymentState) -> usize {
        self.schedule
            .iter()
            .filter(|i| i.payment_state == state)
            .count()
    }

    /// Status implied by the current installment states.
    ///
    /// All paid wins over default; otherwise the agreement defaults once
    /// `default_threshold` installments are in default.
    #[must_use]
    pub fn derive_status(&self, default_threshold: u32) -> AgreementStatus {
        if self.schedule.iter().all(Installment::is_paid) {
            return AgreementStatus::Paid;
        }
        let defaulted = self.count_in_state(PaymentState::Default);
        if u32::try_from(defaulted).unwrap_or(u32::MAX) >= default_threshold {
            AgreementStatus::Default
        } else {
            AgreementStatus::Active
        }
    }

    /// Principal not yet covered by paid installments.
    #[must_use]
    pub fn principal_outstanding(&self) -> Decimal {
        let repaid: Decimal = self
            .schedule
            .iter()
            .filter(|i| i.is_paid())
            .map(|i| i.principal_portion)
            .sum();
        self.total_financed_amount - repaid
    }

    /// Builds a read-only summary of repayment progress.
    #[must_use]
    pub fn summary(&self) -> AgreementSummary {
        let amount_paid = self
            .schedule
            .iter()
            .filter(|i| i.is_paid())
            .map(|i| i.total_amount)
            .sum();

        let next_installment = self
            .schedule
            .iter()
            .find(|i| !i.is_paid())
            .map(|i| NextInstallment {
                number: i.number,
                due_date: i.due_date,
                amount: i.total_amount,
                payment_state: i.payment_state,
            });

        AgreementSummary {
            agreement_id: self.id,
            status: self.status,
            installment_count: self.installment_count,
            paid_count: self.count_in_state(PaymentState::Paid),
            overdue_count: self.count_in_state(PaymentState::Overdue),
            defaulted_count: self.count_in_state(PaymentState::Default),
            amount_paid,
            principal_outstanding: self.principal_outstanding(),
            next_installment,
        }
    }
}

/// Earliest unpaid installment of an agreement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NextInstallment {
    /// Installment number.
    pub number: u32,
    /// Due date.
    pub due_date: NaiveDate,
    /// Amount due.
    pub amount: Decimal,
    /// Current state (pending, overdue, or default).
    pub payment_state: PaymentState,
}

/// Repayment progress of an agreement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgreementSummary {
    /// Agreement summarised.
    pub agreement_id: AgreementId,
    /// Aggregate status.
    pub status: AgreementStatus,
    /// Number of installments.
    pub installment_count: u32,
    /// Installments paid.
    pub paid_count: usize,
    /// Installments overdue.
    pub overdue_count: usize,
    /// Installments in default.
    pub defaulted_count: usize,
    /// Sum of paid installment totals.
    pub amount_paid: Decimal,
    /// Principal not yet repaid.
    pub principal_outstanding: Decimal,
    /// Earliest unpaid installment, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_installment: Option<NextInstallment>,
}

/// Preview of an agreement that is not stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinancingQuote {
    /// Template quoted.
    pub template_id: PlanTemplateId,
    /// Requested amount before the down payment.
    pub requested_amount: Decimal,
    /// Down payment applied.
    pub down_payment: Decimal,
    /// Down payment suggested by the template's percentage.
    pub recommended_down_payment: Decimal,
    /// Rate the schedule was computed with.
    pub annual_interest_rate_percent: Decimal,
    /// Schedule the agreement would get.
    pub schedule: AmortizationSchedule,
}

/// Outcome of an overdue sweep over one agreement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshReport {
    /// Agreement swept.
    pub agreement_id: AgreementId,
    /// Date the sweep evaluated against.
    pub as_of: NaiveDate,
    /// Installments that moved from pending to overdue.
    pub newly_overdue: Vec<u32>,
    /// Installments that moved from overdue to default.
    pub newly_defaulted: Vec<u32>,
    /// Status before the sweep.
    pub previous_status: AgreementStatus,
    /// Status after the sweep.
    pub status: AgreementStatus,
}

impl RefreshReport {
    /// Returns true if the sweep changed anything.
    #[must_use]
    pub fn has_changes(&self) -> bool {
        !self.newly_overdue.is_empty()
            || !self.newly_defaulted.is_empty()
            || self.previous_status != self.status
    }
}
