//! Consent template and signed form database operations.

use clinic_ops_consent::ConsentTemplate;
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{Database, DbError, DbResult};
use crate::models::{now, ConsentForm};

const FORM_COLUMNS: &str = r#"
    id, patient_id, treatment_id, template_id, languages, document_text,
    content_hash, signature_data, signed_at
"#;

impl Database {
    /// Insert or replace a consent template.
    ///
    /// Forms already signed keep their own copy of the text, so editing a
    /// template never changes what a patient signed.
    pub fn upsert_consent_template(&self, template: &ConsentTemplate) -> DbResult<()> {
        let json = serde_json::to_string(template)?;

        self.conn.execute(
            r#"
            INSERT INTO consent_templates (id, name, template, updated_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                template = excluded.template,
                updated_at = excluded.updated_at
            "#,
            params![template.id, template.name, json, now()],
        )?;
        Ok(())
    }

    /// Get a consent template by ID.
    pub fn get_consent_template(&self, id: &str) -> DbResult<Option<ConsentTemplate>> {
        let json: Option<String> = self
            .conn
            .query_row(
                "SELECT template FROM consent_templates WHERE id = ?",
                [id],
                |row| row.get(0),
            )
            .optional()?;

        json.map(|s| serde_json::from_str(&s).map_err(DbError::from))
            .transpose()
    }

    /// All consent templates, by name.
    pub fn list_consent_templates(&self) -> DbResult<Vec<ConsentTemplate>> {
        let mut stmt = self
            .conn
            .prepare("SELECT template FROM consent_templates ORDER BY name")?;

        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

        let mut templates = Vec::new();
        for row in rows {
            templates.push(serde_json::from_str(&row?)?);
        }
        Ok(templates)
    }

    /// Store a signed consent form. Forms are write-once.
    pub fn insert_consent_form(&self, form: &ConsentForm) -> DbResult<()> {
        let languages_json = serde_json::to_string(&form.languages)?;

        self.conn.execute(
            r#"
            INSERT INTO consent_forms (
                id, patient_id, treatment_id, template_id, languages, document_text,
                content_hash, signature_data, signed_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
            params![
                form.id,
                form.patient_id,
                form.treatment_id,
                form.template_id,
                languages_json,
                form.document_text,
                form.content_hash,
                form.signature_data,
                form.signed_at,
            ],
        )?;
        Ok(())
    }

    /// Get a signed consent form by ID.
    pub fn get_consent_form(&self, id: &str) -> DbResult<Option<ConsentForm>> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM consent_forms WHERE id = ?", FORM_COLUMNS),
                [id],
                read_row,
            )
            .optional()?
            .map(|row| row.try_into())
            .transpose()
    }

    /// Signed forms for a patient, newest first.
    pub fn list_consent_forms_for_patient(&self, patient_id: &str) -> DbResult<Vec<ConsentForm>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM consent_forms WHERE patient_id = ? ORDER BY signed_at DESC",
            FORM_COLUMNS
        ))?;

        let rows = stmt.query_map([patient_id], read_row)?;

        let mut forms = Vec::new();
        for row in rows {
            forms.push(row?.try_into()?);
        }
        Ok(forms)
    }

    /// Whether the patient has signed consent for a treatment.
    pub fn has_consent_for_treatment(&self, patient_id: &str, treatment_id: &str) -> DbResult<bool> {
        has_consent_in(&self.conn, patient_id, treatment_id)
    }
}

pub(crate) fn has_consent_in(conn: &Connection, patient_id: &str, treatment_id: &str) -> DbResult<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM consent_forms WHERE patient_id = ? AND treatment_id = ?",
        [patient_id, treatment_id],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Intermediate row struct for database mapping.
struct ConsentFormRow {
    id: String,
    patient_id: String,
    treatment_id: Option<String>,
    template_id: String,
    languages: String,
    document_text: String,
    content_hash: String,
    signature_data: String,
    signed_at: String,
}

fn read_row(row: &Row<'_>) -> rusqlite::Result<ConsentFormRow> {
    Ok(ConsentFormRow {
        id: row.get(0)?,
        patient_id: row.get(1)?,
        treatment_id: row.get(2)?,
        template_id: row.get(3)?,
        languages: row.get(4)?,
        document_text: row.get(5)?,
        content_hash: row.get(6)?,
        signature_data: row.get(7)?,
        signed_at: row.get(8)?,
    })
}

impl TryFrom<ConsentFormRow> for ConsentForm {
    type Error = DbError;

    fn try_from(row: ConsentFormRow) -> Result<Self, Self::Error> {
        Ok(ConsentForm {
            id: row.id,
            patient_id: row.patient_id,
            treatment_id: row.treatment_id,
            template_id: row.template_id,
            languages: serde_json::from_str(&row.languages)?,
            document_text: row.document_text,
            content_hash: row.content_hash,
            signature_data: row.signature_data,
            signed_at: row.signed_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Patient;
    use clinic_ops_consent::TemplateSection;
    use std::collections::BTreeMap;

    fn template() -> ConsentTemplate {
        ConsentTemplate::new(
            "tpl-iv".into(),
            "IV therapy consent".into(),
            TemplateSection {
                language: "en".into(),
                title: "Consent".into(),
                body: "I, {{patient_name}}, agree.".into(),
            },
        )
    }

    fn setup_db() -> (Database, Patient) {
        let db = Database::open_in_memory().unwrap();
        let patient = Patient::new("Jane Doe".into(), "555".into());
        db.insert_patient(&patient).unwrap();
        db.upsert_consent_template(&template()).unwrap();
        (db, patient)
    }

    #[test]
    fn test_template_upsert_roundtrip() {
        let (db, _) = setup_db();

        let mut updated = template();
        updated.name = "IV consent v2".into();
        db.upsert_consent_template(&updated).unwrap();

        let loaded = db.get_consent_template("tpl-iv").unwrap().unwrap();
        assert_eq!(loaded, updated);
        assert_eq!(db.list_consent_templates().unwrap().len(), 1);
        assert!(db.get_consent_template("missing").unwrap().is_none());
    }

    #[test]
    fn test_signed_form_is_write_once() {
        let (db, patient) = setup_db();

        let mut values = BTreeMap::new();
        values.insert("patient_name".to_string(), "Jane Doe".to_string());
        let rendered = template().render(&values).unwrap();

        let form = ConsentForm::sign(patient.id.clone(), None, &rendered, "sig".into());
        db.insert_consent_form(&form).unwrap();

        let loaded = db.get_consent_form(&form.id).unwrap().unwrap();
        assert_eq!(loaded, form);
        assert!(loaded.is_intact());

        let result = db.conn().execute(
            "UPDATE consent_forms SET document_text = 'tampered' WHERE id = ?",
            [&form.id],
        );
        assert!(result.is_err());

        assert_eq!(db.list_consent_forms_for_patient(&patient.id).unwrap().len(), 1);
    }
}
