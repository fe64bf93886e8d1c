//! Package ledger: purchased versus remaining treatment sessions.
//!
//! A package is decremented by exactly one session per administered
//! treatment. Decrements are conditional on the counter value that was read,
//! so two sessions racing on the same package cannot both succeed from the
//! same starting count. Payments are added to the stored total in SQL rather
//! than written back as an absolute amount.

use rusqlite::Connection;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::db::{self, Database, DbError};
use crate::models::{Package, PackageStatus, PaymentStatus};

/// Ledger errors.
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("Invalid package: {0}")]
    InvalidPackage(String),

    #[error("Package not found: {0}")]
    PackageNotFound(String),

    #[error("Package has no sessions remaining: {0}")]
    PackageDepleted(String),

    #[error("Package was modified concurrently: {0}")]
    ConcurrentUpdate(String),
}

pub type LedgerResult<T> = Result<T, LedgerError>;

/// Session accounting for treatment packages.
pub struct PackageLedger<'a> {
    db: &'a Database,
}

impl<'a> PackageLedger<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Sell a new package with every session available.
    pub fn purchase_package(
        &self,
        patient_id: &str,
        treatment_id: &str,
        sessions_purchased: u32,
        total_amount: f64,
        amount_paid: f64,
    ) -> LedgerResult<Package> {
        self.migrate_package(
            patient_id,
            treatment_id,
            sessions_purchased,
            0,
            total_amount,
            amount_paid,
        )
    }

    /// Record a package bought before the patient was on this system,
    /// with `sessions_used` already taken.
    pub fn migrate_package(
        &self,
        patient_id: &str,
        treatment_id: &str,
        sessions_purchased: u32,
        sessions_used: u32,
        total_amount: f64,
        amount_paid: f64,
    ) -> LedgerResult<Package> {
        validate_purchase(sessions_purchased, sessions_used, total_amount, amount_paid)?;

        if self.db.get_patient(patient_id)?.is_none() {
            return Err(DbError::NotFound(format!("patient {}", patient_id)).into());
        }
        if self.db.get_treatment(treatment_id)?.is_none() {
            return Err(DbError::NotFound(format!("treatment {}", treatment_id)).into());
        }

        let mut package = Package::new(
            patient_id.to_string(),
            treatment_id.to_string(),
            sessions_purchased,
            total_amount,
            amount_paid,
        );
        package.sessions_remaining = sessions_purchased - sessions_used;
        package.status = PackageStatus::for_remaining(package.sessions_remaining);

        db::insert_package_row(self.db.conn(), &package)?;

        info!(
            package_id = %package.id,
            patient_id,
            treatment_id,
            sessions_purchased,
            sessions_remaining = package.sessions_remaining,
            payment_status = package.payment_status.as_str(),
            "package recorded"
        );
        Ok(package)
    }

    /// Take one session from a package.
    pub fn consume_session(&self, package_id: &str) -> LedgerResult<Package> {
        let tx = self.db.begin()?;
        let package = consume_session_in(&tx, package_id)?;
        tx.commit().map_err(DbError::from)?;
        Ok(package)
    }

    /// Record a payment against a package.
    pub fn record_payment(&self, package_id: &str, amount: f64) -> LedgerResult<Package> {
        if !amount.is_finite() || amount <= 0.0 {
            return Err(LedgerError::InvalidPackage(format!(
                "payment must be positive, got {}",
                amount
            )));
        }

        let tx = self.db.begin()?;
        if !db::add_payment_row(&tx, package_id, amount)? {
            return Err(LedgerError::PackageNotFound(package_id.to_string()));
        }

        // The increment holds the write lock, so this read sees every earlier payment
        let mut package = db::load_package(&tx, package_id)?
            .ok_or_else(|| LedgerError::PackageNotFound(package_id.to_string()))?;
        package.payment_status =
            PaymentStatus::for_amounts(package.total_amount, package.amount_paid);
        db::set_payment_status_row(&tx, package_id, package.payment_status)?;
        tx.commit().map_err(DbError::from)?;

        info!(
            package_id,
            amount,
            payment_status = package.payment_status.as_str(),
            "payment recorded"
        );
        Ok(package)
    }

    /// Packages a patient can still be treated from, oldest first.
    pub fn available_packages(&self, patient_id: &str) -> LedgerResult<Vec<Package>> {
        let packages = self.db.list_available_packages(patient_id)?;
        debug!(patient_id, count = packages.len(), "available packages");
        Ok(packages)
    }

    /// Available packages for one treatment.
    pub fn available_for_treatment(
        &self,
        patient_id: &str,
        treatment_id: &str,
    ) -> LedgerResult<Vec<Package>> {
        Ok(self
            .available_packages(patient_id)?
            .into_iter()
            .filter(|p| p.treatment_id == treatment_id)
            .collect())
    }
}

fn validate_purchase(
    sessions_purchased: u32,
    sessions_used: u32,
    total_amount: f64,
    amount_paid: f64,
) -> LedgerResult<()> {
    if sessions_purchased == 0 {
        return Err(LedgerError::InvalidPackage(
            "at least one session must be purchased".into(),
        ));
    }
    if sessions_used > sessions_purchased {
        return Err(LedgerError::InvalidPackage(format!(
            "{} sessions used exceeds {} purchased",
            sessions_used, sessions_purchased
        )));
    }
    if !total_amount.is_finite() || total_amount < 0.0 {
        return Err(LedgerError::InvalidPackage(format!(
            "total amount must be non-negative, got {}",
            total_amount
        )));
    }
    if !amount_paid.is_finite() || amount_paid < 0.0 {
        return Err(LedgerError::InvalidPackage(format!(
            "amount paid must be non-negative, got {}",
            amount_paid
        )));
    }
    Ok(())
}

/// Decrement a package inside the caller's transaction.
pub(crate) fn consume_session_in(conn: &Connection, package_id: &str) -> LedgerResult<Package> {
    let package = db::load_package(conn, package_id)?
        .ok_or_else(|| LedgerError::PackageNotFound(package_id.to_string()))?;
    take_session(conn, package)
}

/// Write one session off `package`, as read. Fails if the stored counter has moved since.
fn take_session(conn: &Connection, mut package: Package) -> LedgerResult<Package> {
    let package_id = package.id.clone();
    let package_id = package_id.as_str();

    let Some((remaining, status)) = package.after_session() else {
        warn!(package_id, "session requested from depleted package");
        return Err(LedgerError::PackageDepleted(package_id.to_string()));
    };

    if !db::consume_session_row(conn, package_id, package.sessions_remaining, remaining, status)? {
        warn!(package_id, expected = package.sessions_remaining, "package counter moved");
        return Err(LedgerError::ConcurrentUpdate(package_id.to_string()));
    }

    package.sessions_remaining = remaining;
    package.status = status;

    info!(
        package_id,
        sessions_remaining = remaining,
        status = status.as_str(),
        "session consumed"
    );
    Ok(package)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Patient, Treatment};

    fn setup_db() -> (Database, Patient, Treatment) {
        let db = Database::open_in_memory().unwrap();
        let patient = Patient::new("Jane Doe".into(), "555".into());
        db.insert_patient(&patient).unwrap();
        let treatment = Treatment::new("NAD+".into(), "IV therapy".into(), "mg".into());
        db.upsert_treatment(&treatment).unwrap();
        (db, patient, treatment)
    }

    #[test]
    fn test_purchase_sets_payment_status() {
        let (db, patient, treatment) = setup_db();
        let ledger = PackageLedger::new(&db);

        let paid = ledger
            .purchase_package(&patient.id, &treatment.id, 6, 900.0, 900.0)
            .unwrap();
        assert_eq!(paid.payment_status, PaymentStatus::Paid);
        assert_eq!(paid.sessions_remaining, 6);
        assert_eq!(paid.status, PackageStatus::Active);

        let pending = ledger
            .purchase_package(&patient.id, &treatment.id, 6, 900.0, 300.0)
            .unwrap();
        assert_eq!(pending.payment_status, PaymentStatus::Pending);
        assert_eq!(pending.balance_due(), 600.0);
    }

    #[test]
    fn test_purchase_validation() {
        let (db, patient, treatment) = setup_db();
        let ledger = PackageLedger::new(&db);

        assert!(matches!(
            ledger.purchase_package(&patient.id, &treatment.id, 0, 0.0, 0.0),
            Err(LedgerError::InvalidPackage(_))
        ));
        assert!(matches!(
            ledger.purchase_package(&patient.id, &treatment.id, 3, -1.0, 0.0),
            Err(LedgerError::InvalidPackage(_))
        ));
        assert!(matches!(
            ledger.purchase_package("nobody", &treatment.id, 3, 0.0, 0.0),
            Err(LedgerError::Database(DbError::NotFound(_)))
        ));
    }

    #[test]
    fn test_migrate_computes_remaining() {
        let (db, patient, treatment) = setup_db();
        let ledger = PackageLedger::new(&db);

        let package = ledger
            .migrate_package(&patient.id, &treatment.id, 10, 4, 0.0, 0.0)
            .unwrap();
        assert_eq!(package.sessions_remaining, 6);
        assert_eq!(package.sessions_used(), 4);

        let used_up = ledger
            .migrate_package(&patient.id, &treatment.id, 5, 5, 0.0, 0.0)
            .unwrap();
        assert_eq!(used_up.sessions_remaining, 0);
        assert_eq!(used_up.status, PackageStatus::Depleted);

        assert!(matches!(
            ledger.migrate_package(&patient.id, &treatment.id, 5, 6, 0.0, 0.0),
            Err(LedgerError::InvalidPackage(_))
        ));
    }

    #[test]
    fn test_last_session_depletes() {
        let (db, patient, treatment) = setup_db();
        let ledger = PackageLedger::new(&db);

        let package = ledger
            .migrate_package(&patient.id, &treatment.id, 6, 5, 0.0, 0.0)
            .unwrap();

        let after = ledger.consume_session(&package.id).unwrap();
        assert_eq!(after.sessions_remaining, 0);
        assert_eq!(after.status, PackageStatus::Depleted);

        assert!(matches!(
            ledger.consume_session(&package.id),
            Err(LedgerError::PackageDepleted(_))
        ));

        let stored = db.get_package(&package.id).unwrap().unwrap();
        assert_eq!(stored.sessions_remaining, 0);
        assert!(ledger.available_packages(&patient.id).unwrap().is_empty());
    }

    #[test]
    fn test_record_payment() {
        let (db, patient, treatment) = setup_db();
        let ledger = PackageLedger::new(&db);

        let package = ledger
            .purchase_package(&patient.id, &treatment.id, 3, 300.0, 100.0)
            .unwrap();
        let package = ledger.record_payment(&package.id, 200.0).unwrap();
        assert_eq!(package.payment_status, PaymentStatus::Paid);

        let stored = db.get_package(&package.id).unwrap().unwrap();
        assert_eq!(stored.amount_paid, 300.0);
        assert!(ledger.record_payment(&package.id, 0.0).is_err());
    }

    #[test]
    fn test_stale_read_loses_to_other_writer() {
        let (db, patient, treatment) = setup_db();
        let ledger = PackageLedger::new(&db);

        let package = ledger
            .purchase_package(&patient.id, &treatment.id, 3, 0.0, 0.0)
            .unwrap();
        let stale = db.get_package(&package.id).unwrap().unwrap();

        ledger.consume_session(&package.id).unwrap();

        assert!(matches!(
            take_session(db.conn(), stale),
            Err(LedgerError::ConcurrentUpdate(_))
        ));
        let stored = db.get_package(&package.id).unwrap().unwrap();
        assert_eq!(stored.sessions_remaining, 2);
    }

    #[test]
    fn test_unknown_package() {
        let (db, _, _) = setup_db();
        let ledger = PackageLedger::new(&db);
        assert!(matches!(
            ledger.consume_session("missing"),
            Err(LedgerError::PackageNotFound(_))
        ));
    }
}
