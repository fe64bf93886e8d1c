//! Appointment scheduling.

use chrono::{DateTime, NaiveDate, Utc};
use thiserror::Error;
use tracing::{info, warn};

use crate::db::{Database, DbError};
use crate::models::{Appointment, AppointmentStatus, TransitionError};

/// Scheduling errors.
#[derive(Error, Debug)]
pub enum ScheduleError {
    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("{0}")]
    Transition(#[from] TransitionError),

    #[error("Appointment not found: {0}")]
    NotFound(String),

    #[error("Patient not found: {0}")]
    PatientNotFound(String),

    #[error("Duration must be greater than zero")]
    InvalidDuration,

    #[error("Overlaps appointment {0}")]
    Overlap(String),
}

pub type ScheduleResult<T> = Result<T, ScheduleError>;

/// Books and tracks appointments.
pub struct Scheduler<'a> {
    db: &'a Database,
    default_minutes: u32,
}

impl<'a> Scheduler<'a> {
    pub fn new(db: &'a Database, default_minutes: u32) -> Self {
        Self {
            db,
            default_minutes,
        }
    }

    /// Book a slot. `duration_minutes` falls back to the clinic default.
    pub fn schedule(
        &self,
        patient_id: &str,
        treatment_id: Option<&str>,
        scheduled_at: DateTime<Utc>,
        duration_minutes: Option<u32>,
        notes: Option<&str>,
    ) -> ScheduleResult<Appointment> {
        let duration_minutes = duration_minutes.unwrap_or(self.default_minutes);
        if duration_minutes == 0 {
            return Err(ScheduleError::InvalidDuration);
        }
        if self.db.get_patient(patient_id)?.is_none() {
            return Err(ScheduleError::PatientNotFound(patient_id.to_string()));
        }

        let mut appointment = Appointment::new(patient_id.to_string(), scheduled_at, duration_minutes);
        appointment.treatment_id = treatment_id.map(str::to_string);
        appointment.notes = notes.map(str::to_string);

        let clash = self
            .db
            .list_appointments_for_patient(patient_id)?
            .into_iter()
            .find(|existing| existing.status.occupies_slot() && existing.overlaps(&appointment));
        if let Some(existing) = clash {
            warn!(patient_id, existing_id = %existing.id, "overlapping appointment refused");
            return Err(ScheduleError::Overlap(existing.id));
        }

        self.db.insert_appointment(&appointment)?;
        info!(
            appointment_id = %appointment.id,
            patient_id,
            scheduled_at = %appointment.scheduled_at,
            duration_minutes,
            "appointment scheduled"
        );
        Ok(appointment)
    }

    /// Appointments on a UTC day, in time order.
    pub fn day(&self, day: NaiveDate) -> ScheduleResult<Vec<Appointment>> {
        Ok(self.db.list_appointments_on(day)?)
    }

    pub fn for_patient(&self, patient_id: &str) -> ScheduleResult<Vec<Appointment>> {
        Ok(self.db.list_appointments_for_patient(patient_id)?)
    }

    pub fn cancel(&self, appointment_id: &str) -> ScheduleResult<Appointment> {
        self.transition(appointment_id, AppointmentStatus::Cancelled)
    }

    pub fn complete(&self, appointment_id: &str) -> ScheduleResult<Appointment> {
        self.transition(appointment_id, AppointmentStatus::Completed)
    }

    pub fn mark_no_show(&self, appointment_id: &str) -> ScheduleResult<Appointment> {
        self.transition(appointment_id, AppointmentStatus::NoShow)
    }

    fn transition(
        &self,
        appointment_id: &str,
        next: AppointmentStatus,
    ) -> ScheduleResult<Appointment> {
        let mut appointment = self
            .db
            .get_appointment(appointment_id)?
            .ok_or_else(|| ScheduleError::NotFound(appointment_id.to_string()))?;

        let rejected = TransitionError {
            entity: "appointment",
            from: appointment.status.as_str(),
            to: next.as_str(),
        };
        if !appointment.status.can_transition_to(next) {
            return Err(rejected.into());
        }
        // Lost to a concurrent status change
        if !self.db.set_appointment_status(appointment_id, next)? {
            return Err(rejected.into());
        }

        appointment.status = next;
        info!(appointment_id, status = next.as_str(), "appointment status changed");
        Ok(appointment)
    }
}
