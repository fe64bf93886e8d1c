//! Package database operations.

use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{parse_status, Database, DbError, DbResult};
use crate::models::{now, Package, PackageStatus, PaymentStatus};

const PACKAGE_COLUMNS: &str = r#"
    id, patient_id, treatment_id, sessions_purchased, sessions_remaining, status,
    payment_status, total_amount, amount_paid, created_at, updated_at
"#;

impl Database {
    /// Get a package by ID.
    pub fn get_package(&self, id: &str) -> DbResult<Option<Package>> {
        load_package(&self.conn, id)
    }

    /// All packages for a patient, newest first.
    pub fn list_packages_for_patient(&self, patient_id: &str) -> DbResult<Vec<Package>> {
        self.query_packages(
            "WHERE patient_id = ? ORDER BY created_at DESC",
            patient_id,
        )
    }

    /// Packages that can still be administered from, oldest first.
    pub fn list_available_packages(&self, patient_id: &str) -> DbResult<Vec<Package>> {
        self.query_packages(
            "WHERE patient_id = ? AND sessions_remaining > 0 ORDER BY created_at",
            patient_id,
        )
    }

    fn query_packages(&self, filter: &str, patient_id: &str) -> DbResult<Vec<Package>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {} FROM packages {}", PACKAGE_COLUMNS, filter))?;

        let rows = stmt.query_map([patient_id], read_row)?;

        let mut packages = Vec::new();
        for row in rows {
            packages.push(row?.try_into()?);
        }
        Ok(packages)
    }
}

pub(crate) fn load_package(conn: &Connection, id: &str) -> DbResult<Option<Package>> {
    conn.query_row(
        &format!("SELECT {} FROM packages WHERE id = ?", PACKAGE_COLUMNS),
        [id],
        read_row,
    )
    .optional()?
    .map(|row| row.try_into())
    .transpose()
}

pub(crate) fn insert_package_row(conn: &Connection, package: &Package) -> DbResult<()> {
    conn.execute(
        r#"
        INSERT INTO packages (
            id, patient_id, treatment_id, sessions_purchased, sessions_remaining, status,
            payment_status, total_amount, amount_paid, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
        "#,
        params![
            package.id,
            package.patient_id,
            package.treatment_id,
            package.sessions_purchased,
            package.sessions_remaining,
            package.status.as_str(),
            package.payment_status.as_str(),
            package.total_amount,
            package.amount_paid,
            package.created_at,
            package.updated_at,
        ],
    )?;
    Ok(())
}

/// Add `amount` to the paid total in place, so concurrent payments accumulate.
///
/// Returns `false` when the package is missing.
pub(crate) fn add_payment_row(conn: &Connection, id: &str, amount: f64) -> DbResult<bool> {
    let rows_affected = conn.execute(
        r#"
        UPDATE packages SET
            amount_paid = amount_paid + ?2,
            updated_at = ?3
        WHERE id = ?1
        "#,
        params![id, amount, now()],
    )?;
    Ok(rows_affected > 0)
}

pub(crate) fn set_payment_status_row(
    conn: &Connection,
    id: &str,
    payment_status: PaymentStatus,
) -> DbResult<()> {
    conn.execute(
        "UPDATE packages SET payment_status = ?2 WHERE id = ?1",
        params![id, payment_status.as_str()],
    )?;
    Ok(())
}

/// Write the post-session counter, only if the counter still reads `expected_remaining`.
///
/// Returns `false` when another writer got there first.
pub(crate) fn consume_session_row(
    conn: &Connection,
    id: &str,
    expected_remaining: u32,
    remaining: u32,
    status: PackageStatus,
) -> DbResult<bool> {
    let rows_affected = conn.execute(
        r#"
        UPDATE packages SET
            sessions_remaining = ?3,
            status = ?4,
            updated_at = ?5
        WHERE id = ?1 AND sessions_remaining = ?2
        "#,
        params![id, expected_remaining, remaining, status.as_str(), now()],
    )?;
    Ok(rows_affected > 0)
}

/// Intermediate row struct for database mapping.
struct PackageRow {
    id: String,
    patient_id: String,
    treatment_id: String,
    sessions_purchased: u32,
    sessions_remaining: u32,
    status: String,
    payment_status: String,
    total_amount: f64,
    amount_paid: f64,
    created_at: String,
    updated_at: String,
}

fn read_row(row: &Row<'_>) -> rusqlite::Result<PackageRow> {
    Ok(PackageRow {
        id: row.get(0)?,
        patient_id: row.get(1)?,
        treatment_id: row.get(2)?,
        sessions_purchased: row.get(3)?,
        sessions_remaining: row.get(4)?,
        status: row.get(5)?,
        payment_status: row.get(6)?,
        total_amount: row.get(7)?,
        amount_paid: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

impl TryFrom<PackageRow> for Package {
    type Error = DbError;

    fn try_from(row: PackageRow) -> Result<Self, Self::Error> {
        Ok(Package {
            id: row.id,
            patient_id: row.patient_id,
            treatment_id: row.treatment_id,
            sessions_purchased: row.sessions_purchased,
            sessions_remaining: row.sessions_remaining,
            status: parse_status(&row.status, "package status", PackageStatus::parse)?,
            payment_status: parse_status(
                &row.payment_status,
                "payment status",
                PaymentStatus::parse,
            )?,
            total_amount: row.total_amount,
            amount_paid: row.amount_paid,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
