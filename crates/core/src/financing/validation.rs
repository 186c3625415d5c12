//! Business rule validation for financing requests.

use rust_decimal::Decimal;

use medfin_shared::DownPaymentPolicy;

use crate::financing::error::{AmountViolation, FinancingError};
use crate::financing::types::{FinancingPlanTemplate, FinancingTerms};

/// Terms that passed every plan rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidatedTerms {
    /// Amount to amortize.
    pub financed_amount: Decimal,
    /// Down payment accepted.
    pub down_payment: Decimal,
    /// Down payment suggested by the template.
    pub recommended_down_payment: Decimal,
    /// Installment count accepted.
    pub installment_count: u32,
}

/// Validates requested terms against a plan template.
///
/// Rules run in a fixed order and the first failure is returned:
/// 1. Template is active
/// 2. Requested amount within the template range
/// 3. Installment count within the template range
/// 4. Down payment present when the template requires one, and not
///    below the recommendation when the policy enforces it
/// 5. Something is left to finance
///
/// # Errors
///
/// Returns the `FinancingError` of the first rule that fails.
pub fn validate_terms(
    template: &FinancingPlanTemplate,
    terms: &FinancingTerms,
    policy: DownPaymentPolicy,
    scale: u32,
) -> Result<ValidatedTerms, FinancingError> {
    if !template.is_active() {
        return Err(FinancingError::InactiveTemplate {
            template_id: template.id,
        });
    }

    if terms.requested_amount < template.min_amount || terms.requested_amount > template.max_amount
    {
        return Err(FinancingError::AmountOutOfRange(
            AmountViolation::OutsideTemplateRange {
                amount: terms.requested_amount,
                min: template.min_amount,
                max: template.max_amount,
            },
        ));
    }

    if terms.installment_count < template.min_installments
        || terms.installment_count > template.max_installments
    {
        return Err(FinancingError::InstallmentCountOutOfRange {
            count: terms.installment_count,
            min: template.min_installments,
            max: template.max_installments,
        });
    }

    if template.requires_down_payment && terms.down_payment <= Decimal::ZERO {
        return Err(FinancingError::DownPaymentRequired {
            template_id: template.id,
        });
    }

    if terms.down_payment < Decimal::ZERO {
        return Err(FinancingError::InvalidTerms {
            field: "down_payment",
            reason: format!("must not be negative, got {}", terms.down_payment),
        });
    }

    let recommended_down_payment =
        template.recommended_down_payment(terms.requested_amount, scale)?;

    if template.requires_down_payment
        && policy == DownPaymentPolicy::Enforced
        && terms.down_payment < recommended_down_payment
    {
        return Err(FinancingError::DownPaymentBelowRecommended {
            provided: terms.down_payment,
            recommended: recommended_down_payment,
        });
    }

    let financed_amount = terms.requested_amount - terms.down_payment;
    if financed_amount <= Decimal::ZERO {
        return Err(FinancingError::AmountOutOfRange(
            AmountViolation::NothingToFinance {
                requested: terms.requested_amount,
                down_payment: terms.down_payment,
            },
        ));
    }

    Ok(ValidatedTerms {
        financed_amount,
        down_payment: terms.down_payment,
        recommended_down_payment,
        installment_count: terms.installment_count,
    })
}
