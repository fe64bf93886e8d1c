//! Patient database operations.

use rusqlite::{params, OptionalExtension, Row};

use super::{parse_status, Database, DbError, DbResult};
use crate::models::{now, ConsultationStatus, DoctorReviewStatus, Patient};

const PATIENT_COLUMNS: &str = r#"
    id, full_name, phone, date_of_birth, gender, address, emergency_contact,
    allergies, medical_history, review_status, consultation_status, created_at, updated_at
"#;

impl Database {
    /// Insert a new patient.
    pub fn insert_patient(&self, patient: &Patient) -> DbResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO patients (
                id, full_name, phone, date_of_birth, gender, address, emergency_contact,
                allergies, medical_history, review_status, consultation_status,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            "#,
            params![
                patient.id,
                patient.full_name,
                patient.phone,
                patient.date_of_birth,
                patient.gender,
                patient.address,
                patient.emergency_contact,
                patient.allergies,
                patient.medical_history,
                patient.review_status.as_str(),
                patient.consultation_status.as_str(),
                patient.created_at,
                patient.updated_at,
            ],
        )?;
        Ok(())
    }

    /// Update an existing patient, including review and consultation status.
    pub fn update_patient(&self, patient: &Patient) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            r#"
            UPDATE patients SET
                full_name = ?2,
                phone = ?3,
                date_of_birth = ?4,
                gender = ?5,
                address = ?6,
                emergency_contact = ?7,
                allergies = ?8,
                medical_history = ?9,
                review_status = ?10,
                consultation_status = ?11,
                updated_at = ?12
            WHERE id = ?1
            "#,
            params![
                patient.id,
                patient.full_name,
                patient.phone,
                patient.date_of_birth,
                patient.gender,
                patient.address,
                patient.emergency_contact,
                patient.allergies,
                patient.medical_history,
                patient.review_status.as_str(),
                patient.consultation_status.as_str(),
                now(),
            ],
        )?;
        Ok(rows_affected > 0)
    }

    /// Get a patient by ID.
    pub fn get_patient(&self, id: &str) -> DbResult<Option<Patient>> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM patients WHERE id = ?", PATIENT_COLUMNS),
                [id],
                read_row,
            )
            .optional()?
            .map(|row| row.try_into())
            .transpose()
    }

    /// Search patients by name or phone (prefix match).
    pub fn search_patients(&self, query: &str, limit: usize) -> DbResult<Vec<Patient>> {
        let pattern = format!("{}%", escape_like(query.trim()));
        let mut stmt = self.conn.prepare(&format!(
            r#"
            SELECT {} FROM patients
            WHERE full_name LIKE ?1 ESCAPE '\' OR phone LIKE ?1 ESCAPE '\'
            ORDER BY full_name
            LIMIT ?2
            "#,
            PATIENT_COLUMNS
        ))?;

        let rows = stmt.query_map(params![pattern, limit as i64], read_row)?;

        let mut patients = Vec::new();
        for row in rows {
            patients.push(row?.try_into()?);
        }
        Ok(patients)
    }

    /// Patients waiting on doctor review, oldest registration first.
    pub fn list_patients_pending_review(&self) -> DbResult<Vec<Patient>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM patients WHERE review_status = 'pending' ORDER BY created_at",
            PATIENT_COLUMNS
        ))?;

        let rows = stmt.query_map([], read_row)?;

        let mut patients = Vec::new();
        for row in rows {
            patients.push(row?.try_into()?);
        }
        Ok(patients)
    }
}

/// Escape LIKE wildcards so they match literally (paired with `ESCAPE '\'`).
fn escape_like(query: &str) -> String {
    let mut escaped = String::with_capacity(query.len());
    for c in query.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Intermediate row struct for database mapping.
struct PatientRow {
    id: String,
    full_name: String,
    phone: String,
    date_of_birth: Option<String>,
    gender: Option<String>,
    address: Option<String>,
    emergency_contact: Option<String>,
    allergies: Option<String>,
    medical_history: Option<String>,
    review_status: String,
    consultation_status: String,
    created_at: String,
    updated_at: String,
}

fn read_row(row: &Row<'_>) -> rusqlite::Result<PatientRow> {
    Ok(PatientRow {
        id: row.get(0)?,
        full_name: row.get(1)?,
        phone: row.get(2)?,
        date_of_birth: row.get(3)?,
        gender: row.get(4)?,
        address: row.get(5)?,
        emergency_contact: row.get(6)?,
        allergies: row.get(7)?,
        medical_history: row.get(8)?,
        review_status: row.get(9)?,
        consultation_status: row.get(10)?,
        created_at: row.get(11)?,
        updated_at: row.get(12)?,
    })
}

impl TryFrom<PatientRow> for Patient {
    type Error = DbError;

    fn try_from(row: PatientRow) -> Result<Self, Self::Error> {
        Ok(Patient {
            id: row.id,
            full_name: row.full_name,
            phone: row.phone,
            date_of_birth: row.date_of_birth,
            gender: row.gender,
            address: row.address,
            emergency_contact: row.emergency_contact,
            allergies: row.allergies,
            medical_history: row.medical_history,
            review_status: parse_status(
                &row.review_status,
                "review status",
                DoctorReviewStatus::parse,
            )?,
            consultation_status: parse_status(
                &row.consultation_status,
                "consultation status",
                ConsultationStatus::parse,
            )?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_db() -> Database {
        Database::open_in_memory().unwrap()
    }

    #[test]
    fn test_insert_and_get() {
        let db = setup_db();

        let mut patient = Patient::new("Jane Doe".into(), "+15550100".into());
        patient.allergies = Some("Penicillin".into());
        patient.date_of_birth = Some("1990-04-12".into());

        db.insert_patient(&patient).unwrap();

        let retrieved = db.get_patient(&patient.id).unwrap().unwrap();
        assert_eq!(retrieved.full_name, "Jane Doe");
        assert_eq!(retrieved.allergies, Some("Penicillin".into()));
        assert_eq!(retrieved.review_status, DoctorReviewStatus::Pending);
    }

    #[test]
    fn test_update_persists_status() {
        let db = setup_db();

        let mut patient = Patient::new("Jane Doe".into(), "+15550100".into());
        db.insert_patient(&patient).unwrap();

        patient.set_review_status(DoctorReviewStatus::Approved).unwrap();
        patient.request_consultation().unwrap();
        assert!(db.update_patient(&patient).unwrap());

        let retrieved = db.get_patient(&patient.id).unwrap().unwrap();
        assert_eq!(retrieved.review_status, DoctorReviewStatus::Approved);
        assert_eq!(retrieved.consultation_status, ConsultationStatus::Requested);
    }

    #[test]
    fn test_update_missing_patient() {
        let db = setup_db();
        let patient = Patient::new("Ghost".into(), "000".into());
        assert!(!db.update_patient(&patient).unwrap());
    }

    #[test]
    fn test_search_by_name_or_phone() {
        let db = setup_db();

        db.insert_patient(&Patient::new("Maria Lopez".into(), "+15550001".into()))
            .unwrap();
        db.insert_patient(&Patient::new("Mariam Ali".into(), "+15550002".into()))
            .unwrap();
        db.insert_patient(&Patient::new("Omar Said".into(), "+449990003".into()))
            .unwrap();

        let results = db.search_patients("Mari", 10).unwrap();
        assert_eq!(results.len(), 2);

        let results = db.search_patients("+44", 10).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].full_name, "Omar Said");
    }

    #[test]
    fn test_search_wildcards_match_literally() {
        let db = setup_db();

        db.insert_patient(&Patient::new("Ann_Lee".into(), "+15550010".into()))
            .unwrap();
        db.insert_patient(&Patient::new("AnnaLee".into(), "+15550011".into()))
            .unwrap();

        let results = db.search_patients("Ann_", 10).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].full_name, "Ann_Lee");

        assert!(db.search_patients("%", 10).unwrap().is_empty());
        assert!(db.search_patients("Ann\\", 10).unwrap().is_empty());
    }

    #[test]
    fn test_pending_review_list() {
        let db = setup_db();

        let pending = Patient::new("Pending".into(), "1".into());
        let mut approved = Patient::new("Approved".into(), "2".into());
        approved.set_review_status(DoctorReviewStatus::Approved).unwrap();

        db.insert_patient(&pending).unwrap();
        db.insert_patient(&approved).unwrap();

        let list = db.list_patients_pending_review().unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].id, pending.id);
    }
}
