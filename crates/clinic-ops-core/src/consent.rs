//! Consent capture: template storage, signing and integrity checks.

use std::collections::BTreeMap;

use clinic_ops_consent::{parse_template_json, ConsentTemplate, TemplateError};
use thiserror::Error;
use tracing::{info, warn};

use crate::db::{Database, DbError};
use crate::models::ConsentForm;

/// Consent errors.
#[derive(Error, Debug)]
pub enum ConsentError {
    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("Template error: {0}")]
    Template(#[from] TemplateError),

    #[error("Consent template not found: {0}")]
    TemplateNotFound(String),

    #[error("Consent form not found: {0}")]
    FormNotFound(String),

    #[error("Patient not found: {0}")]
    PatientNotFound(String),

    #[error("A signature is required")]
    MissingSignature,
}

pub type ConsentResult<T> = Result<T, ConsentError>;

/// Consent template and signed-form operations.
pub struct ConsentDesk<'a> {
    db: &'a Database,
}

impl<'a> ConsentDesk<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Validate and store a template.
    pub fn save_template(&self, template: &ConsentTemplate) -> ConsentResult<()> {
        template.validate()?;
        self.db.upsert_consent_template(template)?;
        info!(template_id = %template.id, sections = template.sections.len(), "consent template saved");
        Ok(())
    }

    /// Parse template JSON (surrounding text is ignored) and store it.
    pub fn import_template_json(&self, json: &str) -> ConsentResult<ConsentTemplate> {
        let template = parse_template_json(json)?;
        self.save_template(&template)?;
        Ok(template)
    }

    pub fn template(&self, template_id: &str) -> ConsentResult<ConsentTemplate> {
        self.db
            .get_consent_template(template_id)?
            .ok_or_else(|| ConsentError::TemplateNotFound(template_id.to_string()))
    }

    /// Render a template for a patient and store the signed result.
    ///
    /// `patient_name`, `patient_phone` and `date` are filled from the patient
    /// record unless `values` supplies them.
    pub fn sign_consent(
        &self,
        patient_id: &str,
        template_id: &str,
        treatment_id: Option<&str>,
        values: &BTreeMap<String, String>,
        signature_data: &str,
    ) -> ConsentResult<ConsentForm> {
        if signature_data.trim().is_empty() {
            return Err(ConsentError::MissingSignature);
        }

        let patient = self
            .db
            .get_patient(patient_id)?
            .ok_or_else(|| ConsentError::PatientNotFound(patient_id.to_string()))?;
        let template = self.template(template_id)?;

        let mut merged = BTreeMap::new();
        merged.insert("patient_name".to_string(), patient.full_name.clone());
        merged.insert("patient_phone".to_string(), patient.phone.clone());
        merged.insert(
            "date".to_string(),
            chrono::Utc::now().format("%Y-%m-%d").to_string(),
        );
        merged.extend(values.iter().map(|(k, v)| (k.clone(), v.clone())));

        let rendered = template.render(&merged)?;
        let form = ConsentForm::sign(
            patient.id,
            treatment_id.map(str::to_string),
            &rendered,
            signature_data.to_string(),
        );
        self.db.insert_consent_form(&form)?;

        info!(
            consent_form_id = %form.id,
            patient_id,
            template_id,
            languages = ?form.languages,
            "consent signed"
        );
        Ok(form)
    }

    /// Re-hash the stored text and compare with the hash taken at signing.
    pub fn verify_consent(&self, form_id: &str) -> ConsentResult<bool> {
        let form = self
            .db
            .get_consent_form(form_id)?
            .ok_or_else(|| ConsentError::FormNotFound(form_id.to_string()))?;

        let intact = form.is_intact();
        if !intact {
            warn!(consent_form_id = form_id, "consent form hash mismatch");
        }
        Ok(intact)
    }

    pub fn forms_for_patient(&self, patient_id: &str) -> ConsentResult<Vec<ConsentForm>> {
        Ok(self.db.list_consent_forms_for_patient(patient_id)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Patient;
    use clinic_ops_consent::TemplateSection;

    fn bilingual() -> ConsentTemplate {
        ConsentTemplate::new(
            "tpl-iv".into(),
            "IV therapy consent".into(),
            TemplateSection {
                language: "en".into(),
                title: "Consent for {{treatment}}".into(),
                body: "I, {{patient_name}}, consent on {{date}}.".into(),
            },
        )
        .with_section(TemplateSection {
            language: "ar".into(),
            title: "موافقة على {{treatment}}".into(),
            body: "أنا {{patient_name}} أوافق.".into(),
        })
    }

    fn setup_db() -> (Database, Patient) {
        let db = Database::open_in_memory().unwrap();
        let patient = Patient::new("Jane Doe".into(), "555".into());
        db.insert_patient(&patient).unwrap();
        (db, patient)
    }

    #[test]
    fn test_sign_fills_patient_values() {
        let (db, patient) = setup_db();
        let desk = ConsentDesk::new(&db);
        desk.save_template(&bilingual()).unwrap();

        let mut values = BTreeMap::new();
        values.insert("treatment".to_string(), "NAD+".to_string());

        let form = desk
            .sign_consent(&patient.id, "tpl-iv", None, &values, "data:image/png;base64,AAA")
            .unwrap();

        assert_eq!(form.languages, vec!["en", "ar"]);
        assert!(form.document_text.contains("I, Jane Doe, consent"));
        assert!(form.document_text.contains("موافقة على NAD+"));
        assert!(desk.verify_consent(&form.id).unwrap());
        assert_eq!(desk.forms_for_patient(&patient.id).unwrap().len(), 1);
    }

    #[test]
    fn test_sign_errors() {
        let (db, patient) = setup_db();
        let desk = ConsentDesk::new(&db);
        desk.save_template(&bilingual()).unwrap();
        let empty = BTreeMap::new();

        assert!(matches!(
            desk.sign_consent(&patient.id, "tpl-iv", None, &empty, " "),
            Err(ConsentError::MissingSignature)
        ));
        assert!(matches!(
            desk.sign_consent(&patient.id, "missing", None, &empty, "sig"),
            Err(ConsentError::TemplateNotFound(_))
        ));
        assert!(matches!(
            desk.sign_consent("nobody", "tpl-iv", None, &empty, "sig"),
            Err(ConsentError::PatientNotFound(_))
        ));
        // {{treatment}} has no value
        assert!(matches!(
            desk.sign_consent(&patient.id, "tpl-iv", None, &empty, "sig"),
            Err(ConsentError::Template(TemplateError::MissingValue(_)))
        ));
        assert!(matches!(
            desk.verify_consent("missing"),
            Err(ConsentError::FormNotFound(_))
        ));
    }

    #[test]
    fn test_import_rejects_invalid_templates() {
        let (db, _) = setup_db();
        let desk = ConsentDesk::new(&db);

        let json = format!("Here is the template:\n{}\n", bilingual().to_json().unwrap());
        let imported = desk.import_template_json(&json).unwrap();
        assert_eq!(desk.template("tpl-iv").unwrap(), imported);

        let mut broken = bilingual();
        broken.sections[0].body = "Hello {{patient_name".into();
        assert!(desk.save_template(&broken).is_err());
    }
}
