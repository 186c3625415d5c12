//! Plan template catalog.

use dashmap::DashMap;

use medfin_shared::types::PlanTemplateId;

use crate::financing::types::FinancingPlanTemplate;

/// Read-only source of plan templates.
///
/// Implemented by whatever owns the clinic's plan configuration. The ledger
/// only reads templates and snapshots the rate it needs at creation time.
pub trait TemplateCatalog: Send + Sync {
    /// Find a template by ID.
    fn get(&self, id: PlanTemplateId) -> Option<FinancingPlanTemplate>;

    /// List templates that can open new agreements.
    fn active(&self) -> Vec<FinancingPlanTemplate>;
}

/// Catalog held in memory.
#[derive(Debug, Default)]
pub struct InMemoryTemplateCatalog {
    templates: DashMap<PlanTemplateId, FinancingPlanTemplate>,
}

impl InMemoryTemplateCatalog {
    /// Create an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a template, returning the previous version.
    pub fn insert(&self, template: FinancingPlanTemplate) -> Option<FinancingPlanTemplate> {
        self.templates.insert(template.id, template)
    }

    /// Remove a template.
    pub fn remove(&self, id: PlanTemplateId) -> Option<FinancingPlanTemplate> {
        self.templates.remove(&id).map(|(_, template)| template)
    }

    /// Number of templates held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.templates.len()
    }

    /// Returns true if the catalog holds no templates.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

impl TemplateCatalog for InMemoryTemplateCatalog {
    fn get(&self, id: PlanTemplateId) -> Option<FinancingPlanTemplate> {
        self.templates.get(&id).map(|entry| entry.value().clone())
    }

    fn active(&self) -> Vec<FinancingPlanTemplate> {
        let mut templates: Vec<FinancingPlanTemplate> = self
            .templates
            .iter()
            .filter(|entry| entry.is_active())
            .map(|entry| entry.value().clone())
            .collect();
        templates.sort_by(|a, b| a.name.cmp(&b.name));
        templates
    }
}

impl FromIterator<FinancingPlanTemplate> for InMemoryTemplateCatalog {
    fn from_iter<I: IntoIterator<Item = FinancingPlanTemplate>>(iter: I) -> Self {
        Self {
            templates: iter.into_iter().map(|t| (t.id, t)).collect(),
        }
    }
}
