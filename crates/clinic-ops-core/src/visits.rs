//! Visit lifecycle before completion: check-in, consultation, vitals, notes.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::db::{Database, DbError};
use crate::models::{TransitionError, Visit, VisitConsumable, VisitStatus, VisitTreatment, Vitals};

/// Visit errors.
#[derive(Error, Debug)]
pub enum VisitError {
    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("{0}")]
    Transition(#[from] TransitionError),

    #[error("Visit not found: {0}")]
    VisitNotFound(String),

    #[error("Patient not found: {0}")]
    PatientNotFound(String),

    #[error("Visit is locked: {0}")]
    VisitLocked(String),

    #[error("Implausible vitals: {0}")]
    ImplausibleVitals(String),
}

pub type VisitResult<T> = Result<T, VisitError>;

/// A visit with the records written at completion.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VisitDetail {
    pub visit: Visit,
    pub treatments: Vec<VisitTreatment>,
    pub consumables: Vec<VisitConsumable>,
}

/// Visit lifecycle operations.
pub struct VisitManager<'a> {
    db: &'a Database,
}

impl<'a> VisitManager<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Check a patient in; the visit starts in `waiting`.
    pub fn start_visit(&self, patient_id: &str) -> VisitResult<Visit> {
        if self.db.get_patient(patient_id)?.is_none() {
            return Err(VisitError::PatientNotFound(patient_id.to_string()));
        }

        let visit = Visit::new(patient_id.to_string());
        self.db.insert_visit(&visit)?;

        info!(visit_id = %visit.id, patient_id, "visit started");
        Ok(visit)
    }

    /// Move a waiting visit to `in_progress` and assign staff.
    pub fn begin_consultation(
        &self,
        visit_id: &str,
        doctor_id: Option<&str>,
        nurse_id: Option<&str>,
    ) -> VisitResult<Visit> {
        let mut visit = self.load_editable(visit_id)?;
        visit.transition(VisitStatus::InProgress)?;
        if let Some(doctor_id) = doctor_id {
            visit.doctor_id = Some(doctor_id.to_string());
        }
        if let Some(nurse_id) = nurse_id {
            visit.nurse_id = Some(nurse_id.to_string());
        }

        self.save(&visit)?;
        info!(visit_id, "consultation started");
        Ok(visit)
    }

    /// Store vitals. Out-of-range readings are rejected.
    pub fn record_vitals(&self, visit_id: &str, vitals: Vitals) -> VisitResult<Visit> {
        let implausible = vitals.implausible_fields();
        if !implausible.is_empty() {
            warn!(visit_id, fields = ?implausible, "implausible vitals rejected");
            return Err(VisitError::ImplausibleVitals(implausible.join(", ")));
        }

        let mut visit = self.load_editable(visit_id)?;
        visit.vitals = Some(vitals);

        self.save(&visit)?;
        info!(visit_id, "vitals recorded");
        Ok(visit)
    }

    /// Replace the visit notes.
    pub fn update_notes(&self, visit_id: &str, notes: &str) -> VisitResult<Visit> {
        let mut visit = self.load_editable(visit_id)?;
        let notes = notes.trim();
        visit.notes = (!notes.is_empty()).then(|| notes.to_string());

        self.save(&visit)?;
        debug!(visit_id, "visit notes updated");
        Ok(visit)
    }

    /// Visit with its dose and consumable records.
    pub fn visit_detail(&self, visit_id: &str) -> VisitResult<VisitDetail> {
        let visit = self
            .db
            .get_visit(visit_id)?
            .ok_or_else(|| VisitError::VisitNotFound(visit_id.to_string()))?;

        Ok(VisitDetail {
            treatments: self.db.list_visit_treatments(visit_id)?,
            consumables: self.db.list_visit_consumables(visit_id)?,
            visit,
        })
    }

    /// Patients waiting to be seen, in arrival order.
    pub fn waiting_queue(&self) -> VisitResult<Vec<Visit>> {
        Ok(self.db.list_visits_by_status(VisitStatus::Waiting)?)
    }

    /// Visits currently with a clinician.
    pub fn in_progress(&self) -> VisitResult<Vec<Visit>> {
        Ok(self.db.list_visits_by_status(VisitStatus::InProgress)?)
    }

    pub fn visits_for_patient(&self, patient_id: &str) -> VisitResult<Vec<Visit>> {
        Ok(self.db.list_visits_for_patient(patient_id)?)
    }

    fn load_editable(&self, visit_id: &str) -> VisitResult<Visit> {
        let visit = self
            .db
            .get_visit(visit_id)?
            .ok_or_else(|| VisitError::VisitNotFound(visit_id.to_string()))?;

        if visit.is_locked {
            warn!(visit_id, "edit attempted on locked visit");
            return Err(VisitError::VisitLocked(visit_id.to_string()));
        }
        Ok(visit)
    }

    fn save(&self, visit: &Visit) -> VisitResult<()> {
        // The lock may have landed between load and save
        if !self.db.update_visit(visit)? {
            return Err(VisitError::VisitLocked(visit.id.clone()));
        }
        Ok(())
    }
}
