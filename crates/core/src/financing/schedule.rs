//! Level-payment (French) amortization.
//!
//! The generator is a pure function of its inputs. Every monetary step is
//! rounded to the money scale with banker's rounding; the drift that rounding
//! leaves behind is absorbed by the final installment so the principal
//! portions always sum to the amount financed.

use chrono::{Months, NaiveDate};
use rust_decimal::prelude::*;
use tracing::debug;

use crate::financing::error::FinancingError;
use crate::financing::types::{AmortizationSchedule, Installment, PaymentState};

const MONTHS_PER_YEAR: u32 = 12;

/// Default number of decimal places for money.
pub const DEFAULT_MONEY_SCALE: u32 = 2;

/// Builds amortization schedules at a fixed money scale.
#[derive(Debug, Clone, Copy)]
pub struct ScheduleGenerator {
    scale: u32,
}

impl ScheduleGenerator {
    /// Creates a generator rounding money to two decimal places.
    #[must_use]
    pub const fn new() -> Self {
        Self::with_scale(DEFAULT_MONEY_SCALE)
    }

    /// Creates a generator rounding money to `scale` decimal places.
    #[must_use]
    pub const fn with_scale(scale: u32) -> Self {
        Self { scale }
    }

    /// Decimal places money is rounded to.
    #[must_use]
    pub const fn scale(&self) -> u32 {
        self.scale
    }

    /// Generates the amortization schedule.
    ///
    /// # Arguments
    ///
    /// * `principal` - Amount to amortize, must be positive
    /// * `annual_rate_percent` - Nominal annual rate as a percentage, must not be negative
    /// * `installment_count` - Number of monthly installments, at least 1
    /// * `start_date` - Installment `i` falls due `i` months after this date
    ///
    /// # Errors
    ///
    /// Returns `FinancingError::InvalidTerms` if an input is out of range or
    /// the principal is too small to amortize at this scale: the rounded
    /// payment is zero, an installment before the last would repay it in full,
    /// or an installment would repay no principal.
    pub fn generate(
        &self,
        principal: Decimal,
        annual_rate_percent: Decimal,
        installment_count: u32,
        start_date: NaiveDate,
    ) -> Result<AmortizationSchedule, FinancingError> {
        if principal <= Decimal::ZERO {
            return Err(invalid("principal", format!("must be positive, got {principal}")));
        }
        if installment_count == 0 {
            return Err(invalid("installment_count", "must be at least 1".to_string()));
        }
        if annual_rate_percent < Decimal::ZERO {
            return Err(invalid(
                "annual_rate_percent",
                format!("must not be negative, got {annual_rate_percent}"),
            ));
        }

        let monthly_rate =
            annual_rate_percent / Decimal::ONE_HUNDRED / Decimal::from(MONTHS_PER_YEAR);
        let installment_amount =
            self.round(Self::level_payment(principal, monthly_rate, installment_count)?);

        if installment_amount.is_zero() {
            return Err(invalid(
                "principal",
                format!(
                    "{principal} is too small to spread over {installment_count} installments"
                ),
            ));
        }

        debug!(
            principal = %principal,
            monthly_rate = %monthly_rate,
            installment_count,
            installment_amount = %installment_amount,
            "Generating amortization schedule"
        );

        let mut installments = Vec::with_capacity(installment_count as usize);
        let mut remaining = principal;

        for number in 1..=installment_count {
            let interest = self.round(remaining * monthly_rate);
            let principal_portion = installment_amount - interest;
            if principal_portion <= Decimal::ZERO {
                return Err(invalid(
                    "principal",
                    format!(
                        "installment {number} of {installment_amount} repays no principal \
                         after {interest} interest at {} decimal places",
                        self.scale
                    ),
                ));
            }
            remaining -= principal_portion;

            // Every interior installment must leave principal for the last one.
            if number < installment_count && remaining <= Decimal::ZERO {
                return Err(invalid(
                    "principal",
                    format!(
                        "{principal} is repaid by installment {number} of {installment_count} \
                         at {} decimal places",
                        self.scale
                    ),
                ));
            }

            let due_date = start_date
                .checked_add_months(Months::new(number))
                .ok_or_else(|| {
                    invalid(
                        "start_date",
                        format!("installment {number} due date is out of range"),
                    )
                })?;

            installments.push(Installment {
                number,
                due_date,
                principal_portion,
                interest_portion: interest,
                total_amount: installment_amount,
                remaining_principal_after: remaining,
                payment_state: PaymentState::Pending,
                paid_date: None,
                payment_ref: None,
            });
        }

        // Drift lands on the last installment only.
        if let Some(last) = installments.last_mut() {
            last.principal_portion += last.remaining_principal_after;
            last.remaining_principal_after = Decimal::ZERO;
            last.total_amount = last.principal_portion + last.interest_portion;
        }

        let total_interest = installments.iter().map(|i| i.interest_portion).sum();
        let total_payable = installments.iter().map(|i| i.total_amount).sum();

        Ok(AmortizationSchedule {
            principal,
            monthly_rate,
            installment_amount,
            installments,
            total_interest,
            total_payable,
        })
    }

    /// Unrounded level payment for `count` periods at `monthly_rate`.
    fn level_payment(
        principal: Decimal,
        monthly_rate: Decimal,
        count: u32,
    ) -> Result<Decimal, FinancingError> {
        let periods = Decimal::from(count);
        if monthly_rate.is_zero() {
            return Ok(principal / periods);
        }

        let growth = (Decimal::ONE + monthly_rate)
            .checked_powu(u64::from(count))
            .ok_or_else(|| {
                invalid(
                    "installment_count",
                    format!("compounding over {count} periods exceeds decimal range"),
                )
            })?;
        let denominator = growth - Decimal::ONE;

        // A rate this small no longer moves (1 + r)^n at 28 digits.
        if denominator.is_zero() {
            return Ok(principal / periods);
        }

        principal
            .checked_mul(monthly_rate)
            .and_then(|v| v.checked_mul(growth))
            .and_then(|v| v.checked_div(denominator))
            .ok_or_else(|| {
                invalid(
                    "principal",
                    format!("level payment for {principal} exceeds decimal range"),
                )
            })
    }

    fn round(&self, value: Decimal) -> Decimal {
        value.round_dp_with_strategy(self.scale, RoundingStrategy::MidpointNearestEven)
    }
}

impl Default for ScheduleGenerator {
    fn default() -> Self {
        Self::new()
    }
}

fn invalid(field: &'static str, reason: String) -> FinancingError {
    FinancingError::InvalidTerms { field, reason }
}
