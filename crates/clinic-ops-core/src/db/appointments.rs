//! Appointment database operations.

use chrono::{DateTime, Duration, NaiveDate, SecondsFormat, Utc};
use rusqlite::{params, OptionalExtension, Row};

use super::{parse_status, Database, DbError, DbResult};
use crate::models::{Appointment, AppointmentStatus};

const APPOINTMENT_COLUMNS: &str = r#"
    id, patient_id, treatment_id, scheduled_at, duration_minutes, status, notes, created_at
"#;

/// Fixed-width UTC form so text ordering matches time ordering.
fn to_stored(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

impl Database {
    /// Insert a new appointment.
    pub fn insert_appointment(&self, appointment: &Appointment) -> DbResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO appointments (
                id, patient_id, treatment_id, scheduled_at, duration_minutes, status,
                notes, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                appointment.id,
                appointment.patient_id,
                appointment.treatment_id,
                to_stored(appointment.scheduled_at),
                appointment.duration_minutes,
                appointment.status.as_str(),
                appointment.notes,
                appointment.created_at,
            ],
        )?;
        Ok(())
    }

    /// Get an appointment by ID.
    pub fn get_appointment(&self, id: &str) -> DbResult<Option<Appointment>> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM appointments WHERE id = ?", APPOINTMENT_COLUMNS),
                [id],
                read_row,
            )
            .optional()?
            .map(|row| row.try_into())
            .transpose()
    }

    /// Appointments starting on a UTC calendar day, in time order.
    pub fn list_appointments_on(&self, day: NaiveDate) -> DbResult<Vec<Appointment>> {
        let start = day.and_hms_opt(0, 0, 0).map(|t| t.and_utc()).ok_or_else(|| {
            DbError::Constraint(format!("Invalid day: {}", day))
        })?;
        let end = start + Duration::days(1);

        let mut stmt = self.conn.prepare(&format!(
            r#"
            SELECT {} FROM appointments
            WHERE scheduled_at >= ?1 AND scheduled_at < ?2
            ORDER BY scheduled_at
            "#,
            APPOINTMENT_COLUMNS
        ))?;

        let rows = stmt.query_map(params![to_stored(start), to_stored(end)], read_row)?;

        let mut appointments = Vec::new();
        for row in rows {
            appointments.push(row?.try_into()?);
        }
        Ok(appointments)
    }

    /// All appointments for a patient, in time order.
    pub fn list_appointments_for_patient(&self, patient_id: &str) -> DbResult<Vec<Appointment>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM appointments WHERE patient_id = ? ORDER BY scheduled_at",
            APPOINTMENT_COLUMNS
        ))?;

        let rows = stmt.query_map([patient_id], read_row)?;

        let mut appointments = Vec::new();
        for row in rows {
            appointments.push(row?.try_into()?);
        }
        Ok(appointments)
    }

    /// Move a still-scheduled appointment to `status`.
    ///
    /// Returns `false` when the appointment is missing or no longer scheduled.
    pub fn set_appointment_status(&self, id: &str, status: AppointmentStatus) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            "UPDATE appointments SET status = ?2 WHERE id = ?1 AND status = 'scheduled'",
            params![id, status.as_str()],
        )?;
        Ok(rows_affected > 0)
    }
}

/// Intermediate row struct for database mapping.
struct AppointmentRow {
    id: String,
    patient_id: String,
    treatment_id: Option<String>,
    scheduled_at: String,
    duration_minutes: u32,
    status: String,
    notes: Option<String>,
    created_at: String,
}

fn read_row(row: &Row<'_>) -> rusqlite::Result<AppointmentRow> {
    Ok(AppointmentRow {
        id: row.get(0)?,
        patient_id: row.get(1)?,
        treatment_id: row.get(2)?,
        scheduled_at: row.get(3)?,
        duration_minutes: row.get(4)?,
        status: row.get(5)?,
        notes: row.get(6)?,
        created_at: row.get(7)?,
    })
}

impl TryFrom<AppointmentRow> for Appointment {
    type Error = DbError;

    fn try_from(row: AppointmentRow) -> Result<Self, Self::Error> {
        let scheduled_at = DateTime::parse_from_rfc3339(&row.scheduled_at)
            .map_err(|e| {
                DbError::Constraint(format!(
                    "Bad scheduled_at on appointment {}: {}",
                    row.id, e
                ))
            })?
            .with_timezone(&Utc);

        Ok(Appointment {
            id: row.id,
            patient_id: row.patient_id,
            treatment_id: row.treatment_id,
            scheduled_at,
            duration_minutes: row.duration_minutes,
            status: parse_status(&row.status, "appointment status", AppointmentStatus::parse)?,
            notes: row.notes,
            created_at: row.created_at,
        })
    }
}
