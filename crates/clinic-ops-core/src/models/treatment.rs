//! Treatment catalog models.

use serde::{Deserialize, Serialize};

use super::new_id;

/// A treatment in the clinic catalog.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Treatment {
    pub id: String,
    pub name: String,
    /// Grouping shown in the picker (e.g., "IV therapy", "injectables")
    pub category: String,
    /// Unit doses are recorded in (e.g., "mg", "ml", "units")
    pub dosage_unit: String,
    /// Preset doses offered as quick picks
    pub common_doses: Vec<String>,
    /// Dose prefilled when the treatment is selected
    pub default_dose: Option<String>,
    /// Consent template that must be signed before administration
    pub consent_template_id: Option<String>,
    pub active: bool,
}

impl Treatment {
    /// Create a new catalog entry with required fields.
    pub fn new(name: String, category: String, dosage_unit: String) -> Self {
        Self {
            id: new_id(),
            name,
            category,
            dosage_unit,
            common_doses: Vec::new(),
            default_dose: None,
            consent_template_id: None,
            active: true,
        }
    }

    pub fn requires_consent(&self) -> bool {
        self.consent_template_id.is_some()
    }

    /// Dose to prefill: the configured default, else the first preset.
    pub fn suggested_dose(&self) -> Option<&str> {
        self.default_dose
            .as_deref()
            .or_else(|| self.common_doses.first().map(String::as_str))
    }
}

/// A consumable normally used when administering a treatment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TreatmentConsumable {
    pub treatment_id: String,
    pub stock_item_id: String,
    /// Quantity in the stock item's base unit
    pub default_quantity: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suggested_dose() {
        let mut treatment = Treatment::new("Glutathione".into(), "IV therapy".into(), "mg".into());
        assert_eq!(treatment.suggested_dose(), None);

        treatment.common_doses = vec!["600".into(), "1200".into()];
        assert_eq!(treatment.suggested_dose(), Some("600"));

        treatment.default_dose = Some("1200".into());
        assert_eq!(treatment.suggested_dose(), Some("1200"));
    }

    #[test]
    fn test_requires_consent() {
        let mut treatment = Treatment::new("Botox".into(), "injectables".into(), "units".into());
        assert!(!treatment.requires_consent());
        treatment.consent_template_id = Some("tpl-1".into());
        assert!(treatment.requires_consent());
    }
}
