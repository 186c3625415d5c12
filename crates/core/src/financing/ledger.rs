//! Agreement ledger.
//!
//! Owns every financing agreement, one per patient/budget pair. Each agreement
//! sits behind its own mutex so payments and overdue sweeps on one agreement
//! serialise while different agreements proceed in parallel.
//!
//! Lock order is pair index, then agreement map, then agreement mutex. No
//! map guard is held while waiting on an agreement mutex.

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{Days, NaiveDate, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use rayon::prelude::*;
use tracing::{debug, info, warn};

use medfin_shared::FinancingConfig;
use medfin_shared::types::{AgreementId, BudgetId, PatientId, PlanTemplateId};

use crate::financing::catalog::{InMemoryTemplateCatalog, TemplateCatalog};
use crate::financing::error::FinancingError;
use crate::financing::lifecycle::InstallmentLifecycle;
use crate::financing::schedule::ScheduleGenerator;
use crate::financing::types::{
    AgreementStatus, AgreementSummary, FinancingAgreement, FinancingPlanTemplate, FinancingQuote,
    FinancingTerms, OpenAgreementRequest, PaymentEvent, PaymentState, RefreshReport,
};
use crate::financing::validation::{ValidatedTerms, validate_terms};

type AgreementHandle = Arc<Mutex<FinancingAgreement>>;

/// In-process store of financing agreements.
pub struct AgreementLedger {
    config: FinancingConfig,
    generator: ScheduleGenerator,
    catalog: Arc<dyn TemplateCatalog>,
    agreements: DashMap<AgreementId, AgreementHandle>,
    pairs: DashMap<(PatientId, BudgetId), AgreementId>,
}

impl AgreementLedger {
    /// Create an empty ledger with an empty template catalog.
    #[must_use]
    pub fn new(config: FinancingConfig) -> Self {
        Self {
            generator: ScheduleGenerator::with_scale(config.money_scale),
            config,
            catalog: Arc::new(InMemoryTemplateCatalog::new()),
            agreements: DashMap::new(),
            pairs: DashMap::new(),
        }
    }

    /// Use `catalog` for [`Self::open_from_catalog`].
    #[must_use]
    pub fn with_catalog(mut self, catalog: Arc<dyn TemplateCatalog>) -> Self {
        self.catalog = catalog;
        self
    }

    /// Financing configuration in effect.
    #[must_use]
    pub fn config(&self) -> &FinancingConfig {
        &self.config
    }

    /// Injected template catalog.
    #[must_use]
    pub fn catalog(&self) -> &Arc<dyn TemplateCatalog> {
        &self.catalog
    }

    /// Open an agreement whose schedule starts today.
    ///
    /// # Errors
    ///
    /// See [`Self::open_agreement_on`].
    pub fn open_agreement(
        &self,
        template: &FinancingPlanTemplate,
        request: OpenAgreementRequest,
    ) -> Result<FinancingAgreement, FinancingError> {
        self.open_agreement_on(template, request, Utc::now().date_naive())
    }

    /// Open an agreement whose installments fall due monthly after `start_date`.
    ///
    /// The template's rate is copied onto the agreement; later template edits
    /// never reach an open agreement. Nothing is stored unless every rule
    /// passes and the schedule is generated.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The terms break a template rule (see [`validate_terms`])
    /// - The patient already has an agreement for this budget
    /// - The schedule cannot be generated
    pub fn open_agreement_on(
        &self,
        template: &FinancingPlanTemplate,
        request: OpenAgreementRequest,
        start_date: NaiveDate,
    ) -> Result<FinancingAgreement, FinancingError> {
        let validated = self.validate(template, &request.terms).inspect_err(|err| {
            warn!(
                patient_id = %request.patient_id,
                budget_id = %request.budget_id,
                template_id = %template.id,
                error = %err,
                "Financing request rejected"
            );
        })?;

        // The pair entry stays locked until the agreement is stored.
        let slot = match self.pairs.entry((request.patient_id, request.budget_id)) {
            Entry::Occupied(existing) => {
                warn!(
                    patient_id = %request.patient_id,
                    budget_id = %request.budget_id,
                    existing = %existing.get(),
                    "Agreement already exists for budget"
                );
                return Err(FinancingError::AgreementAlreadyExists {
                    patient_id: request.patient_id,
                    budget_id: request.budget_id,
                });
            }
            Entry::Vacant(slot) => slot,
        };

        let schedule = self.generator.generate(
            validated.financed_amount,
            template.annual_interest_rate_percent,
            validated.installment_count,
            start_date,
        )?;

        let agreement = FinancingAgreement {
            id: AgreementId::new(),
            patient_id: request.patient_id,
            budget_id: request.budget_id,
            template_id: template.id,
            total_financed_amount: validated.financed_amount,
            down_payment_amount: validated.down_payment,
            installment_count: validated.installment_count,
            installment_amount: schedule.installment_amount,
            applied_annual_rate_percent: template.annual_interest_rate_percent,
            start_date,
            status: AgreementStatus::Active,
            schedule: schedule.installments,
            created_at: Utc::now(),
        };

        self.agreements
            .insert(agreement.id, Arc::new(Mutex::new(agreement.clone())));
        slot.insert(agreement.id);

        info!(
            agreement_id = %agreement.id,
            patient_id = %agreement.patient_id,
            budget_id = %agreement.budget_id,
            financed = %agreement.total_financed_amount,
            installments = agreement.installment_count,
            installment_amount = %agreement.installment_amount,
            "Financing agreement opened"
        );

        Ok(agreement)
    }

    /// Open an agreement from a catalog template, starting today.
    ///
    /// # Errors
    ///
    /// Returns `FinancingError::TemplateNotFound` if the catalog has no such
    /// template, otherwise as [`Self::open_agreement_on`].
    pub fn open_from_catalog(
        &self,
        template_id: PlanTemplateId,
        request: OpenAgreementRequest,
    ) -> Result<FinancingAgreement, FinancingError> {
        let template = self
            .catalog
            .get(template_id)
            .ok_or(FinancingError::TemplateNotFound(template_id))?;
        self.open_agreement(&template, request)
    }

    /// Preview the schedule `terms` would get, without storing anything.
    ///
    /// # Errors
    ///
    /// Returns the same validation and generation errors as opening an
    /// agreement, except the duplicate-pair check.
    pub fn quote(
        &self,
        template: &FinancingPlanTemplate,
        terms: &FinancingTerms,
        start_date: NaiveDate,
    ) -> Result<FinancingQuote, FinancingError> {
        let validated = self.validate(template, terms)?;
        let schedule = self.generator.generate(
            validated.financed_amount,
            template.annual_interest_rate_percent,
            validated.installment_count,
            start_date,
        )?;

        Ok(FinancingQuote {
            template_id: template.id,
            requested_amount: terms.requested_amount,
            down_payment: validated.down_payment,
            recommended_down_payment: validated.recommended_down_payment,
            annual_interest_rate_percent: template.annual_interest_rate_percent,
            schedule,
        })
    }

    /// Record a confirmed payment against one installment.
    ///
    /// Settles pending, overdue, and defaulted installments alike, then
    /// recomputes the agreement status.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The agreement does not exist
    /// - The installment number is outside the schedule
    /// - The installment is already paid
    pub fn apply_payment(
        &self,
        agreement_id: AgreementId,
        event: PaymentEvent,
    ) -> Result<FinancingAgreement, FinancingError> {
        let handle = self.handle(agreement_id)?;
        let mut agreement = lock(&handle)?;
        let count = agreement.installment_count;
        let number = event.installment_number;

        let installment =
            agreement
                .installment_mut(number)
                .ok_or(FinancingError::InstallmentNotFound {
                    agreement_id,
                    number,
                    count,
                })?;

        if installment.is_paid() {
            warn!(
                agreement_id = %agreement_id,
                installment = number,
                payment_ref = %event.payment_ref,
                "Duplicate payment for installment"
            );
            return Err(FinancingError::InstallmentAlreadyPaid {
                agreement_id,
                number,
            });
        }

        let previous_state = installment.payment_state;
        let action =
            InstallmentLifecycle::pay(previous_state, event.paid_date, event.payment_ref.clone())?;
        installment.apply(action);

        let previous_status = agreement.status;
        agreement.status = agreement.derive_status(self.config.default_threshold);

        info!(
            agreement_id = %agreement_id,
            installment = number,
            payment_ref = %event.payment_ref,
            previous_state = %previous_state,
            status = %agreement.status,
            "Installment paid"
        );
        if previous_status != agreement.status {
            info!(
                agreement_id = %agreement_id,
                from = %previous_status,
                to = %agreement.status,
                "Agreement status changed"
            );
        }

        Ok(agreement.clone())
    }

    /// Move past-due installments of one agreement to overdue or default.
    ///
    /// Pending installments due before `as_of` become overdue. Overdue
    /// installments due before `as_of` minus the grace period become default,
    /// so a long-unpaid installment can pass through both in one sweep.
    ///
    /// # Errors
    ///
    /// Returns `FinancingError::AgreementNotFound` if the agreement does not exist.
    pub fn refresh_overdue_status(
        &self,
        agreement_id: AgreementId,
        as_of: NaiveDate,
    ) -> Result<RefreshReport, FinancingError> {
        let handle = self.handle(agreement_id)?;
        let mut agreement = lock(&handle)?;
        self.sweep(&mut agreement, as_of)
    }

    /// Sweep every agreement in parallel, one report per agreement.
    ///
    /// Reports are ordered by agreement ID.
    ///
    /// # Errors
    ///
    /// Returns `FinancingError::Internal` if an agreement lock is poisoned.
    pub fn refresh_all(&self, as_of: NaiveDate) -> Result<Vec<RefreshReport>, FinancingError> {
        let mut reports = self
            .handles()
            .par_iter()
            .map(|handle| {
                let mut agreement = lock(handle)?;
                self.sweep(&mut agreement, as_of)
            })
            .collect::<Result<Vec<_>, _>>()?;
        reports.sort_by_key(|report| report.agreement_id);

        debug!(
            as_of = %as_of,
            agreements = reports.len(),
            changed = reports.iter().filter(|r| r.has_changes()).count(),
            "Overdue sweep finished"
        );
        Ok(reports)
    }

    /// Snapshot of one agreement.
    ///
    /// # Errors
    ///
    /// Returns `FinancingError::AgreementNotFound` if the agreement does not exist.
    pub fn get(&self, agreement_id: AgreementId) -> Result<FinancingAgreement, FinancingError> {
        let handle = self.handle(agreement_id)?;
        let agreement = lock(&handle)?;
        Ok(agreement.clone())
    }

    /// Snapshot of the agreement covering a patient's budget, if any.
    ///
    /// # Errors
    ///
    /// Returns `FinancingError::Internal` if the agreement lock is poisoned.
    pub fn find_by_patient_budget(
        &self,
        patient_id: PatientId,
        budget_id: BudgetId,
    ) -> Result<Option<FinancingAgreement>, FinancingError> {
        let Some(agreement_id) = self.pairs.get(&(patient_id, budget_id)).map(|e| *e.value())
        else {
            return Ok(None);
        };
        match self.get(agreement_id) {
            Ok(agreement) => Ok(Some(agreement)),
            // Purged between the two lookups.
            Err(FinancingError::AgreementNotFound(_)) => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Snapshots of a patient's agreements, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `FinancingError::Internal` if an agreement lock is poisoned.
    pub fn list_by_patient(
        &self,
        patient_id: PatientId,
    ) -> Result<Vec<FinancingAgreement>, FinancingError> {
        let mut agreements = Vec::new();
        for handle in self.handles() {
            let agreement = lock(&handle)?;
            if agreement.patient_id == patient_id {
                agreements.push(agreement.clone());
            }
        }
        agreements.sort_by_key(|a| (a.created_at, a.id));
        Ok(agreements)
    }

    /// Repayment progress of one agreement.
    ///
    /// # Errors
    ///
    /// Returns `FinancingError::AgreementNotFound` if the agreement does not exist.
    pub fn summary(&self, agreement_id: AgreementId) -> Result<AgreementSummary, FinancingError> {
        let handle = self.handle(agreement_id)?;
        let agreement = lock(&handle)?;
        Ok(agreement.summary())
    }

    /// Remove an agreement together with its patient/budget entry.
    ///
    /// # Errors
    ///
    /// Returns `FinancingError::AgreementNotFound` if the agreement does not exist.
    pub fn purge(&self, agreement_id: AgreementId) -> Result<FinancingAgreement, FinancingError> {
        let handle = self.handle(agreement_id)?;
        let pair = {
            let agreement = lock(&handle)?;
            (agreement.patient_id, agreement.budget_id)
        };

        match self.pairs.entry(pair) {
            Entry::Occupied(entry) if *entry.get() == agreement_id => {
                let (_, removed) = self
                    .agreements
                    .remove(&agreement_id)
                    .ok_or(FinancingError::AgreementNotFound(agreement_id))?;
                entry.remove();
                let agreement = lock(&removed)?.clone();
                info!(
                    agreement_id = %agreement_id,
                    patient_id = %agreement.patient_id,
                    budget_id = %agreement.budget_id,
                    "Financing agreement purged"
                );
                Ok(agreement)
            }
            _ => Err(FinancingError::AgreementNotFound(agreement_id)),
        }
    }

    /// Number of agreements held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.agreements.len()
    }

    /// Returns true if the ledger holds no agreements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.agreements.is_empty()
    }

    fn validate(
        &self,
        template: &FinancingPlanTemplate,
        terms: &FinancingTerms,
    ) -> Result<ValidatedTerms, FinancingError> {
        validate_terms(
            template,
            terms,
            self.config.down_payment_policy,
            self.generator.scale(),
        )
    }

    fn handle(&self, agreement_id: AgreementId) -> Result<AgreementHandle, FinancingError> {
        self.agreements
            .get(&agreement_id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or(FinancingError::AgreementNotFound(agreement_id))
    }

    fn handles(&self) -> Vec<AgreementHandle> {
        self.agreements
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }

    fn sweep(
        &self,
        agreement: &mut FinancingAgreement,
        as_of: NaiveDate,
    ) -> Result<RefreshReport, FinancingError> {
        let default_cutoff =
            as_of.checked_sub_days(Days::new(u64::from(self.config.grace_period_days)));
        let previous_status = agreement.status;
        let mut newly_overdue = Vec::new();
        let mut newly_defaulted = Vec::new();

        for installment in &mut agreement.schedule {
            if installment.payment_state == PaymentState::Pending && installment.due_date < as_of {
                let action = InstallmentLifecycle::mark_overdue(installment.payment_state, as_of)?;
                installment.apply(action);
                newly_overdue.push(installment.number);
            }
            if installment.payment_state == PaymentState::Overdue
                && default_cutoff.is_some_and(|cutoff| installment.due_date < cutoff)
            {
                let action = InstallmentLifecycle::mark_default(installment.payment_state, as_of)?;
                installment.apply(action);
                newly_defaulted.push(installment.number);
            }
        }

        agreement.status = agreement.derive_status(self.config.default_threshold);

        let report = RefreshReport {
            agreement_id: agreement.id,
            as_of,
            newly_overdue,
            newly_defaulted,
            previous_status,
            status: agreement.status,
        };

        if !report.newly_overdue.is_empty() || !report.newly_defaulted.is_empty() {
            info!(
                agreement_id = %report.agreement_id,
                as_of = %as_of,
                overdue = ?report.newly_overdue,
                defaulted = ?report.newly_defaulted,
                "Installments past due"
            );
        }
        if report.status == AgreementStatus::Default && previous_status != AgreementStatus::Default
        {
            warn!(
                agreement_id = %report.agreement_id,
                defaulted = agreement.count_in_state(PaymentState::Default),
                threshold = self.config.default_threshold,
                "Agreement in default"
            );
        }

        Ok(report)
    }
}

fn lock(handle: &Mutex<FinancingAgreement>) -> Result<MutexGuard<'_, FinancingAgreement>, FinancingError> {
    handle
        .lock()
        .map_err(|_| FinancingError::Internal("agreement lock poisoned".to_string()))
}
