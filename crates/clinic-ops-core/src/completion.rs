//! Visit completion: every write needed to close a visit, in one transaction.
//!
//! Order of writes:
//! 1. Visit status, notes and staff assignment (only while unlocked and not completed)
//! 2. Per administered treatment: consent check, dose record, then one session off its package
//! 3. Visit lock
//! 4. Consumable usage records, with optional stock deduction
//!
//! Any failure rolls back all of the above.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::db::{self, Database, DbError};
use crate::inventory::{self, InventoryError};
use crate::ledger::{self, LedgerError};
use crate::models::{now, Package, VisitConsumable, VisitTreatment};

/// Completion errors.
#[derive(Error, Debug)]
pub enum CompletionError {
    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Inventory error: {0}")]
    Inventory(#[from] InventoryError),

    #[error("Visit not found: {0}")]
    VisitNotFound(String),

    #[error("Visit is locked: {0}")]
    VisitLocked(String),

    #[error("Visit already completed: {0}")]
    AlreadyCompleted(String),

    #[error("Invalid completion request: {0}")]
    Invalid(String),

    #[error("Package {package_id} cannot be used for this treatment: {reason}")]
    PackageMismatch { package_id: String, reason: String },

    #[error("Treatment {treatment_id} requires signed consent")]
    ConsentRequired { treatment_id: String },

    #[error("Treatment not found: {0}")]
    TreatmentNotFound(String),
}

pub type CompletionResult<T> = Result<T, CompletionError>;

/// One treatment given during the visit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AdministeredTreatment {
    pub treatment_id: String,
    pub package_id: String,
    /// Blank doses mean "not administered" and are skipped
    pub dose: String,
    pub dose_unit: String,
}

/// One consumable used during the visit, in the item's base unit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConsumableUsage {
    pub stock_item_id: String,
    pub quantity: f64,
    pub notes: Option<String>,
}

/// Everything staff entered on the completion screen.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CompletionRequest {
    pub visit_id: String,
    pub notes: Option<String>,
    pub doctor_id: Option<String>,
    pub nurse_id: Option<String>,
    pub treatments: Vec<AdministeredTreatment>,
    pub consumables: Vec<ConsumableUsage>,
}

impl CompletionRequest {
    /// Treatments with a non-blank dose.
    pub fn administered(&self) -> impl Iterator<Item = &AdministeredTreatment> {
        self.treatments.iter().filter(|t| !t.dose.trim().is_empty())
    }

    /// Checks that need no database access.
    pub fn validate(&self) -> CompletionResult<()> {
        if self.visit_id.trim().is_empty() {
            return Err(CompletionError::Invalid("visit id is required".into()));
        }

        let mut seen_packages = Vec::new();
        for treatment in self.administered() {
            if treatment.package_id.trim().is_empty() {
                return Err(CompletionError::Invalid(format!(
                    "no package selected for treatment {}",
                    treatment.treatment_id
                )));
            }
            if seen_packages.contains(&treatment.package_id.as_str()) {
                return Err(CompletionError::Invalid(format!(
                    "package {} selected more than once",
                    treatment.package_id
                )));
            }
            seen_packages.push(treatment.package_id.as_str());
        }

        for usage in &self.consumables {
            if !usage.quantity.is_finite() || usage.quantity <= 0.0 {
                return Err(CompletionError::Invalid(format!(
                    "quantity for stock item {} must be greater than zero",
                    usage.stock_item_id
                )));
            }
        }
        Ok(())
    }
}

/// What completion wrote.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompletionReport {
    pub visit_id: String,
    pub completed_at: String,
    pub treatments: Vec<VisitTreatment>,
    pub consumables: Vec<VisitConsumable>,
    /// Packages after their session was taken
    pub packages: Vec<Package>,
    /// Whether consumable usage was deducted from stock
    pub stock_deducted: bool,
}

/// Completes visits.
pub struct VisitCompletion<'a> {
    db: &'a Database,
    deduct_consumables: bool,
}

impl<'a> VisitCompletion<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self {
            db,
            deduct_consumables: false,
        }
    }

    /// Also take recorded consumables out of stock.
    pub fn with_stock_deduction(mut self, deduct: bool) -> Self {
        self.deduct_consumables = deduct;
        self
    }

    pub fn complete(&self, request: &CompletionRequest) -> CompletionResult<CompletionReport> {
        request.validate()?;

        let tx = self.db.begin()?;
        let visit_id = request.visit_id.as_str();

        let visit = db::load_visit(&tx, visit_id)?
            .ok_or_else(|| CompletionError::VisitNotFound(visit_id.to_string()))?;
        if visit.is_locked {
            warn!(visit_id, "completion attempted on locked visit");
            return Err(CompletionError::VisitLocked(visit_id.to_string()));
        }

        // Step 1
        let completed_at = now();
        if !db::complete_visit_row(
            &tx,
            visit_id,
            request.notes.as_deref(),
            request.doctor_id.as_deref(),
            request.nurse_id.as_deref(),
            &completed_at,
        )? {
            warn!(visit_id, "visit already completed");
            return Err(CompletionError::AlreadyCompleted(visit_id.to_string()));
        }
        debug!(visit_id, "visit marked completed");

        // Step 2
        let mut treatments = Vec::new();
        let mut packages = Vec::new();
        for administered in request.administered() {
            let package = db::load_package(&tx, &administered.package_id)?
                .ok_or_else(|| LedgerError::PackageNotFound(administered.package_id.clone()))?;

            if package.patient_id != visit.patient_id {
                return Err(CompletionError::PackageMismatch {
                    package_id: package.id,
                    reason: "belongs to another patient".into(),
                });
            }
            if package.treatment_id != administered.treatment_id {
                return Err(CompletionError::PackageMismatch {
                    package_id: package.id,
                    reason: format!("is for treatment {}", package.treatment_id),
                });
            }

            let treatment = db::load_treatment(&tx, &administered.treatment_id)?.ok_or_else(|| {
                CompletionError::TreatmentNotFound(administered.treatment_id.clone())
            })?;
            if treatment.requires_consent()
                && !db::has_consent_in(&tx, &visit.patient_id, &treatment.id)?
            {
                warn!(visit_id, treatment_id = %treatment.id, "consent not signed for treatment");
                return Err(CompletionError::ConsentRequired {
                    treatment_id: treatment.id,
                });
            }

            let record = VisitTreatment::new(
                visit_id.to_string(),
                administered.treatment_id.clone(),
                administered.package_id.clone(),
                administered.dose.trim().to_string(),
                administered.dose_unit.clone(),
            );
            db::insert_visit_treatment(&tx, &record)?;
            packages.push(ledger::consume_session_in(&tx, &administered.package_id)?);
            treatments.push(record);
        }

        // Step 3
        if !db::lock_visit_row(&tx, visit_id)? {
            return Err(CompletionError::VisitLocked(visit_id.to_string()));
        }

        // Step 4
        let mut consumables = Vec::new();
        for usage in &request.consumables {
            let record = VisitConsumable::new(
                visit_id.to_string(),
                usage.stock_item_id.clone(),
                usage.quantity,
                usage.notes.clone(),
            );
            db::insert_visit_consumable(&tx, &record)?;
            if self.deduct_consumables {
                inventory::deduct_stock_in(&tx, &usage.stock_item_id, usage.quantity)?;
            }
            consumables.push(record);
        }

        tx.commit().map_err(DbError::from)?;

        info!(
            visit_id,
            patient_id = %visit.patient_id,
            treatments = treatments.len(),
            consumables = consumables.len(),
            stock_deducted = self.deduct_consumables,
            "visit completed"
        );

        Ok(CompletionReport {
            visit_id: visit_id.to_string(),
            completed_at,
            treatments,
            consumables,
            packages,
            stock_deducted: self.deduct_consumables,
        })
    }
}
