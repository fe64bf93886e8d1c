//! Patient registration and review workflow.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::db::{Database, DbError};
use crate::models::{DoctorReviewStatus, Patient, TransitionError};

/// Patient errors.
#[derive(Error, Debug)]
pub enum PatientError {
    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("{0}")]
    Transition(#[from] TransitionError),

    #[error("Patient not found: {0}")]
    NotFound(String),

    #[error("Invalid patient: {0}")]
    Invalid(String),
}

pub type PatientResult<T> = Result<T, PatientError>;

/// Demographic fields captured at registration or edited later.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PatientDetails {
    pub full_name: String,
    pub phone: String,
    pub date_of_birth: Option<String>,
    pub gender: Option<String>,
    pub address: Option<String>,
    pub emergency_contact: Option<String>,
    pub allergies: Option<String>,
    pub medical_history: Option<String>,
}

impl PatientDetails {
    fn validate(&self) -> PatientResult<()> {
        if self.full_name.trim().is_empty() {
            return Err(PatientError::Invalid("full name is required".into()));
        }
        if self.phone.trim().is_empty() {
            return Err(PatientError::Invalid("phone is required".into()));
        }
        if let Some(dob) = self.date_of_birth.as_deref() {
            if chrono::NaiveDate::parse_from_str(dob, "%Y-%m-%d").is_err() {
                return Err(PatientError::Invalid(format!(
                    "date of birth must be YYYY-MM-DD, got {}",
                    dob
                )));
            }
        }
        Ok(())
    }

    fn apply_to(self, patient: &mut Patient) {
        patient.full_name = self.full_name.trim().to_string();
        patient.phone = self.phone.trim().to_string();
        patient.date_of_birth = self.date_of_birth;
        patient.gender = self.gender;
        patient.address = self.address;
        patient.emergency_contact = self.emergency_contact;
        patient.allergies = self.allergies;
        patient.medical_history = self.medical_history;
    }
}

/// Patient registry.
pub struct PatientRegistry<'a> {
    db: &'a Database,
}

impl<'a> PatientRegistry<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Register a new patient, pending doctor review.
    pub fn register(&self, details: PatientDetails) -> PatientResult<Patient> {
        details.validate()?;

        let mut patient = Patient::new(String::new(), String::new());
        details.apply_to(&mut patient);
        self.db.insert_patient(&patient)?;

        info!(patient_id = %patient.id, "patient registered");
        Ok(patient)
    }

    /// Replace demographic fields. Review and consultation status are untouched.
    pub fn update_details(&self, patient_id: &str, details: PatientDetails) -> PatientResult<Patient> {
        details.validate()?;

        let mut patient = self.load(patient_id)?;
        details.apply_to(&mut patient);
        patient.touch();
        self.save(&patient)?;

        info!(patient_id, "patient details updated");
        Ok(patient)
    }

    pub fn get(&self, patient_id: &str) -> PatientResult<Patient> {
        self.load(patient_id)
    }

    /// Prefix search on name or phone.
    pub fn search(&self, query: &str, limit: usize) -> PatientResult<Vec<Patient>> {
        if query.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(self.db.search_patients(query, limit)?)
    }

    pub fn pending_review(&self) -> PatientResult<Vec<Patient>> {
        Ok(self.db.list_patients_pending_review()?)
    }

    /// Record a doctor's review decision.
    pub fn review(&self, patient_id: &str, decision: DoctorReviewStatus) -> PatientResult<Patient> {
        let mut patient = self.load(patient_id)?;
        patient.set_review_status(decision)?;
        self.save(&patient)?;

        info!(patient_id, review_status = decision.as_str(), "patient reviewed");
        Ok(patient)
    }

    pub fn request_consultation(&self, patient_id: &str) -> PatientResult<Patient> {
        let mut patient = self.load(patient_id)?;
        patient.request_consultation()?;
        self.save(&patient)?;

        info!(patient_id, "consultation requested");
        Ok(patient)
    }

    pub fn complete_consultation(&self, patient_id: &str) -> PatientResult<Patient> {
        let mut patient = self.load(patient_id)?;
        patient.complete_consultation()?;
        self.save(&patient)?;

        info!(patient_id, "consultation completed");
        Ok(patient)
    }

    fn load(&self, patient_id: &str) -> PatientResult<Patient> {
        self.db
            .get_patient(patient_id)?
            .ok_or_else(|| PatientError::NotFound(patient_id.to_string()))
    }

    fn save(&self, patient: &Patient) -> PatientResult<()> {
        if !self.db.update_patient(patient)? {
            return Err(PatientError::NotFound(patient.id.clone()));
        }
        Ok(())
    }
}
