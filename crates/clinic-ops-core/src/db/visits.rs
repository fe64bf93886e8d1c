//! Visit database operations.

use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{parse_status, Database, DbError, DbResult};
use crate::models::{now, Visit, VisitConsumable, VisitStatus, VisitTreatment, Vitals};

const VISIT_COLUMNS: &str = r#"
    id, patient_id, status, vitals, notes, doctor_id, nurse_id, is_locked,
    created_at, updated_at, completed_at
"#;

impl Database {
    /// Insert a new visit.
    pub fn insert_visit(&self, visit: &Visit) -> DbResult<()> {
        let vitals_json = visit
            .vitals
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        self.conn.execute(
            r#"
            INSERT INTO visits (
                id, patient_id, status, vitals, notes, doctor_id, nurse_id, is_locked,
                created_at, updated_at, completed_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
            params![
                visit.id,
                visit.patient_id,
                visit.status.as_str(),
                vitals_json,
                visit.notes,
                visit.doctor_id,
                visit.nurse_id,
                visit.is_locked,
                visit.created_at,
                visit.updated_at,
                visit.completed_at,
            ],
        )?;
        Ok(())
    }

    /// Update the editable fields of an unlocked visit.
    ///
    /// Returns `false` when the visit is missing or already locked.
    pub fn update_visit(&self, visit: &Visit) -> DbResult<bool> {
        let vitals_json = visit
            .vitals
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        let rows_affected = self.conn.execute(
            r#"
            UPDATE visits SET
                status = ?2,
                vitals = ?3,
                notes = ?4,
                doctor_id = ?5,
                nurse_id = ?6,
                updated_at = ?7
            WHERE id = ?1 AND is_locked = 0
            "#,
            params![
                visit.id,
                visit.status.as_str(),
                vitals_json,
                visit.notes,
                visit.doctor_id,
                visit.nurse_id,
                now(),
            ],
        )?;
        Ok(rows_affected > 0)
    }

    /// Get a visit by ID.
    pub fn get_visit(&self, id: &str) -> DbResult<Option<Visit>> {
        load_visit(&self.conn, id)
    }

    /// Visits in a given status, oldest first (the waiting-room queue).
    pub fn list_visits_by_status(&self, status: VisitStatus) -> DbResult<Vec<Visit>> {
        self.query_visits(
            "WHERE status = ? ORDER BY created_at",
            status.as_str(),
        )
    }

    /// All visits for a patient, newest first.
    pub fn list_visits_for_patient(&self, patient_id: &str) -> DbResult<Vec<Visit>> {
        self.query_visits(
            "WHERE patient_id = ? ORDER BY created_at DESC",
            patient_id,
        )
    }

    /// Visits completed on a calendar day (`YYYY-MM-DD`, UTC).
    pub fn list_visits_completed_on(&self, date: &str) -> DbResult<Vec<Visit>> {
        self.query_visits(
            "WHERE status = 'completed' AND substr(completed_at, 1, 10) = ? ORDER BY completed_at",
            date,
        )
    }

    fn query_visits(&self, filter: &str, arg: &str) -> DbResult<Vec<Visit>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {} FROM visits {}", VISIT_COLUMNS, filter))?;

        let rows = stmt.query_map([arg], read_row)?;

        let mut visits = Vec::new();
        for row in rows {
            visits.push(row?.try_into()?);
        }
        Ok(visits)
    }

    /// Dose records for a visit.
    pub fn list_visit_treatments(&self, visit_id: &str) -> DbResult<Vec<VisitTreatment>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, visit_id, treatment_id, package_id, dose_administered, dose_unit,
                   sessions_deducted, created_at
            FROM visit_treatments
            WHERE visit_id = ?
            ORDER BY created_at, id
            "#,
        )?;

        let rows = stmt.query_map([visit_id], |row| {
            Ok(VisitTreatment {
                id: row.get(0)?,
                visit_id: row.get(1)?,
                treatment_id: row.get(2)?,
                package_id: row.get(3)?,
                dose_administered: row.get(4)?,
                dose_unit: row.get(5)?,
                sessions_deducted: row.get(6)?,
                created_at: row.get(7)?,
            })
        })?;

        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Consumable usage records for a visit.
    pub fn list_visit_consumables(&self, visit_id: &str) -> DbResult<Vec<VisitConsumable>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, visit_id, stock_item_id, quantity_used, notes, created_at
            FROM visit_consumables
            WHERE visit_id = ?
            ORDER BY created_at, id
            "#,
        )?;

        let rows = stmt.query_map([visit_id], |row| {
            Ok(VisitConsumable {
                id: row.get(0)?,
                visit_id: row.get(1)?,
                stock_item_id: row.get(2)?,
                quantity_used: row.get(3)?,
                notes: row.get(4)?,
                created_at: row.get(5)?,
            })
        })?;

        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }
}

pub(crate) fn load_visit(conn: &Connection, id: &str) -> DbResult<Option<Visit>> {
    conn.query_row(
        &format!("SELECT {} FROM visits WHERE id = ?", VISIT_COLUMNS),
        [id],
        read_row,
    )
    .optional()?
    .map(|row| row.try_into())
    .transpose()
}

/// Mark an unlocked, not yet completed visit as completed.
///
/// Returns `false` if another session already completed or locked it.
pub(crate) fn complete_visit_row(
    conn: &Connection,
    id: &str,
    notes: Option<&str>,
    doctor_id: Option<&str>,
    nurse_id: Option<&str>,
    completed_at: &str,
) -> DbResult<bool> {
    let rows_affected = conn.execute(
        r#"
        UPDATE visits SET
            status = 'completed',
            notes = COALESCE(?2, notes),
            doctor_id = COALESCE(?3, doctor_id),
            nurse_id = COALESCE(?4, nurse_id),
            completed_at = ?5,
            updated_at = ?5
        WHERE id = ?1 AND is_locked = 0 AND status != 'completed'
        "#,
        params![id, notes, doctor_id, nurse_id, completed_at],
    )?;
    Ok(rows_affected > 0)
}

pub(crate) fn lock_visit_row(conn: &Connection, id: &str) -> DbResult<bool> {
    let rows_affected = conn.execute(
        "UPDATE visits SET is_locked = 1, updated_at = ?2 WHERE id = ?1 AND is_locked = 0",
        params![id, now()],
    )?;
    Ok(rows_affected > 0)
}

pub(crate) fn insert_visit_treatment(conn: &Connection, record: &VisitTreatment) -> DbResult<()> {
    conn.execute(
        r#"
        INSERT INTO visit_treatments (
            id, visit_id, treatment_id, package_id, dose_administered, dose_unit,
            sessions_deducted, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        "#,
        params![
            record.id,
            record.visit_id,
            record.treatment_id,
            record.package_id,
            record.dose_administered,
            record.dose_unit,
            record.sessions_deducted,
            record.created_at,
        ],
    )?;
    Ok(())
}

pub(crate) fn insert_visit_consumable(conn: &Connection, record: &VisitConsumable) -> DbResult<()> {
    conn.execute(
        r#"
        INSERT INTO visit_consumables (
            id, visit_id, stock_item_id, quantity_used, notes, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        "#,
        params![
            record.id,
            record.visit_id,
            record.stock_item_id,
            record.quantity_used,
            record.notes,
            record.created_at,
        ],
    )?;
    Ok(())
}

/// Intermediate row struct for database mapping.
struct VisitRow {
    id: String,
    patient_id: String,
    status: String,
    vitals: Option<String>,
    notes: Option<String>,
    doctor_id: Option<String>,
    nurse_id: Option<String>,
    is_locked: bool,
    created_at: String,
    updated_at: String,
    completed_at: Option<String>,
}

fn read_row(row: &Row<'_>) -> rusqlite::Result<VisitRow> {
    Ok(VisitRow {
        id: row.get(0)?,
        patient_id: row.get(1)?,
        status: row.get(2)?,
        vitals: row.get(3)?,
        notes: row.get(4)?,
        doctor_id: row.get(5)?,
        nurse_id: row.get(6)?,
        is_locked: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
        completed_at: row.get(10)?,
    })
}

impl TryFrom<VisitRow> for Visit {
    type Error = DbError;

    fn try_from(row: VisitRow) -> Result<Self, Self::Error> {
        let vitals: Option<Vitals> = row
            .vitals
            .map(|s| serde_json::from_str(&s))
            .transpose()?;

        Ok(Visit {
            id: row.id,
            patient_id: row.patient_id,
            status: parse_status(&row.status, "visit status", VisitStatus::parse)?,
            vitals,
            notes: row.notes,
            doctor_id: row.doctor_id,
            nurse_id: row.nurse_id,
            is_locked: row.is_locked,
            created_at: row.created_at,
            updated_at: row.updated_at,
            completed_at: row.completed_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Patient;

    fn setup_db() -> (Database, Patient) {
        let db = Database::open_in_memory().unwrap();
        let patient = Patient::new("Jane Doe".into(), "555".into());
        db.insert_patient(&patient).unwrap();
        (db, patient)
    }

    #[test]
    fn test_insert_and_get_with_vitals() {
        let (db, patient) = setup_db();

        let mut visit = Visit::new(patient.id.clone());
        visit.vitals = Some(Vitals {
            blood_pressure: Some("118/76".into()),
            heart_rate_bpm: Some(70),
            ..Default::default()
        });
        db.insert_visit(&visit).unwrap();

        let loaded = db.get_visit(&visit.id).unwrap().unwrap();
        assert_eq!(loaded, visit);
    }

    #[test]
    fn test_update_refused_after_lock() {
        let (db, patient) = setup_db();

        let mut visit = Visit::new(patient.id.clone());
        db.insert_visit(&visit).unwrap();

        visit.notes = Some("Hydrated well".into());
        assert!(db.update_visit(&visit).unwrap());

        assert!(lock_visit_row(db.conn(), &visit.id).unwrap());
        assert!(!lock_visit_row(db.conn(), &visit.id).unwrap());

        visit.notes = Some("Edited after lock".into());
        assert!(!db.update_visit(&visit).unwrap());

        let loaded = db.get_visit(&visit.id).unwrap().unwrap();
        assert_eq!(loaded.notes, Some("Hydrated well".into()));
        assert!(loaded.is_locked);
        assert!(chrono::DateTime::parse_from_rfc3339(&loaded.updated_at).is_ok());
    }

    #[test]
    fn test_complete_row_only_once() {
        let (db, patient) = setup_db();

        let visit = Visit::new(patient.id.clone());
        db.insert_visit(&visit).unwrap();

        let at = "2026-03-02T10:00:00+00:00";
        assert!(complete_visit_row(db.conn(), &visit.id, Some("done"), Some("dr-1"), None, at).unwrap());
        assert!(!complete_visit_row(db.conn(), &visit.id, None, None, None, at).unwrap());

        let loaded = db.get_visit(&visit.id).unwrap().unwrap();
        assert_eq!(loaded.status, VisitStatus::Completed);
        assert_eq!(loaded.notes, Some("done".into()));
        assert_eq!(loaded.doctor_id, Some("dr-1".into()));

        let on_day = db.list_visits_completed_on("2026-03-02").unwrap();
        assert_eq!(on_day.len(), 1);
        assert!(db.list_visits_completed_on("2026-03-03").unwrap().is_empty());
    }

    #[test]
    fn test_queue_by_status() {
        let (db, patient) = setup_db();

        let first = Visit::new(patient.id.clone());
        let mut second = Visit::new(patient.id.clone());
        second.status = VisitStatus::InProgress;
        db.insert_visit(&first).unwrap();
        db.insert_visit(&second).unwrap();

        let waiting = db.list_visits_by_status(VisitStatus::Waiting).unwrap();
        assert_eq!(waiting.len(), 1);
        assert_eq!(waiting[0].id, first.id);
        assert_eq!(db.list_visits_for_patient(&patient.id).unwrap().len(), 2);
    }
}
