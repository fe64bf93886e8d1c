//! Clinic Ops Core Library
//!
//! Local-first engine for an outpatient wellness clinic: patient intake, visit
//! workflow, prepaid treatment packages, consumable stock and signed consent.
//!
//! # Architecture
//!
//! ```text
//! Registration → Doctor review → Visit (waiting → in_progress)
//!                                        │
//!                              Completion screen
//!                                        │
//!                     ┌──────────────────▼──────────────────┐
//!                     │        One SQLite transaction        │
//!                     │  visit completed → doses recorded    │
//!                     │  package sessions -1 → visit locked  │
//!                     │  consumables recorded (± stock)      │
//!                     └──────────────────┬──────────────────┘
//!                                        │
//!                                 Daily report
//!                               (JSON / CSV)
//! ```
//!
//! # Core Principle
//!
//! **Completed visits are immutable.** Every write after completion is refused,
//! and a failed completion leaves nothing behind.
//!
//! # Modules
//!
//! - [`db`]: SQLite persistence
//! - [`models`]: Domain types (Patient, Visit, Package, StockItem, etc.)
//! - [`ledger`]: Package session accounting
//! - [`inventory`]: Stock conversion, the add-stock wizard and stock writes
//! - [`completion`]: Atomic visit completion
//! - [`visits`], [`patients`], [`appointments`], [`consent`]: Workflow services
//! - [`export`]: Daily report export

pub mod appointments;
pub mod completion;
pub mod config;
pub mod consent;
pub mod db;
pub mod export;
pub mod inventory;
pub mod ledger;
pub mod logging;
pub mod models;
pub mod patients;
pub mod visits;

// Re-export commonly used types
pub use appointments::{ScheduleError, Scheduler};
pub use completion::{
    AdministeredTreatment, CompletionError, CompletionReport, CompletionRequest,
    ConsumableUsage, VisitCompletion,
};
pub use config::{ConfigError, CoreConfig};
pub use consent::{ConsentDesk, ConsentError};
pub use db::{Database, DbError};
pub use export::{DailyReport, DailyReporter};
pub use inventory::{AddStockRequest, AddStockWizard, InventoryError, InventoryManager, PackagingSetup};
pub use ledger::{LedgerError, PackageLedger};
pub use models::{
    Appointment, AppointmentStatus, ConsentForm, ConsultationStatus, DoctorReviewStatus,
    Package, PackageStatus, Packaging, Patient, PaymentStatus, StockItem, StockStatus,
    Treatment, TreatmentConsumable, Visit, VisitConsumable, VisitStatus, VisitTreatment, Vitals,
};
pub use patients::{PatientDetails, PatientError, PatientRegistry};
pub use visits::{VisitDetail, VisitError, VisitManager};

// UniFFI setup - using proc macros
uniffi::setup_scaffolding!();

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, NaiveDate, Utc};

// =========================================================================
// FFI Error Type
// =========================================================================

#[derive(Debug, thiserror::Error, uniffi::Error)]
pub enum ClinicOpsError {
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The record changed state underneath the caller (locked, depleted, taken)
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<DbError> for ClinicOpsError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::NotFound(what) => ClinicOpsError::NotFound(what),
            DbError::Constraint(what) => ClinicOpsError::InvalidInput(what),
            other => ClinicOpsError::DatabaseError(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for ClinicOpsError {
    fn from(e: serde_json::Error) -> Self {
        ClinicOpsError::SerializationError(e.to_string())
    }
}

impl From<ConfigError> for ClinicOpsError {
    fn from(e: ConfigError) -> Self {
        ClinicOpsError::InvalidInput(e.to_string())
    }
}

impl From<LedgerError> for ClinicOpsError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::Database(e) => e.into(),
            LedgerError::PackageNotFound(_) => ClinicOpsError::NotFound(e.to_string()),
            LedgerError::InvalidPackage(_) => ClinicOpsError::InvalidInput(e.to_string()),
            LedgerError::PackageDepleted(_) | LedgerError::ConcurrentUpdate(_) => {
                ClinicOpsError::Conflict(e.to_string())
            }
        }
    }
}

impl From<InventoryError> for ClinicOpsError {
    fn from(e: InventoryError) -> Self {
        match e {
            InventoryError::Database(e) => e.into(),
            InventoryError::ItemNotFound(_) => ClinicOpsError::NotFound(e.to_string()),
            InventoryError::ItemInactive(_)
            | InventoryError::PackagingAlreadyConfigured
            | InventoryError::InsufficientStock { .. } => ClinicOpsError::Conflict(e.to_string()),
            _ => ClinicOpsError::InvalidInput(e.to_string()),
        }
    }
}

impl From<CompletionError> for ClinicOpsError {
    fn from(e: CompletionError) -> Self {
        match e {
            CompletionError::Database(e) => e.into(),
            CompletionError::Ledger(e) => e.into(),
            CompletionError::Inventory(e) => e.into(),
            CompletionError::VisitNotFound(_) | CompletionError::TreatmentNotFound(_) => {
                ClinicOpsError::NotFound(e.to_string())
            }
            CompletionError::VisitLocked(_)
            | CompletionError::AlreadyCompleted(_)
            | CompletionError::ConsentRequired { .. } => {
                ClinicOpsError::Conflict(e.to_string())
            }
            CompletionError::Invalid(_) | CompletionError::PackageMismatch { .. } => {
                ClinicOpsError::InvalidInput(e.to_string())
            }
        }
    }
}

impl From<VisitError> for ClinicOpsError {
    fn from(e: VisitError) -> Self {
        match e {
            VisitError::Database(e) => e.into(),
            VisitError::VisitNotFound(_) | VisitError::PatientNotFound(_) => {
                ClinicOpsError::NotFound(e.to_string())
            }
            VisitError::VisitLocked(_) | VisitError::Transition(_) => {
                ClinicOpsError::Conflict(e.to_string())
            }
            VisitError::ImplausibleVitals(_) => ClinicOpsError::InvalidInput(e.to_string()),
        }
    }
}

impl From<PatientError> for ClinicOpsError {
    fn from(e: PatientError) -> Self {
        match e {
            PatientError::Database(e) => e.into(),
            PatientError::NotFound(_) => ClinicOpsError::NotFound(e.to_string()),
            PatientError::Transition(_) => ClinicOpsError::Conflict(e.to_string()),
            PatientError::Invalid(_) => ClinicOpsError::InvalidInput(e.to_string()),
        }
    }
}

impl From<ScheduleError> for ClinicOpsError {
    fn from(e: ScheduleError) -> Self {
        match e {
            ScheduleError::Database(e) => e.into(),
            ScheduleError::NotFound(_) | ScheduleError::PatientNotFound(_) => {
                ClinicOpsError::NotFound(e.to_string())
            }
            ScheduleError::Transition(_) | ScheduleError::Overlap(_) => {
                ClinicOpsError::Conflict(e.to_string())
            }
            ScheduleError::InvalidDuration => ClinicOpsError::InvalidInput(e.to_string()),
        }
    }
}

impl From<ConsentError> for ClinicOpsError {
    fn from(e: ConsentError) -> Self {
        match e {
            ConsentError::Database(e) => e.into(),
            ConsentError::TemplateNotFound(_)
            | ConsentError::FormNotFound(_)
            | ConsentError::PatientNotFound(_) => ClinicOpsError::NotFound(e.to_string()),
            ConsentError::Template(_) | ConsentError::MissingSignature => {
                ClinicOpsError::InvalidInput(e.to_string())
            }
        }
    }
}

impl<T> From<std::sync::PoisonError<T>> for ClinicOpsError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        ClinicOpsError::DatabaseError(format!("Lock poisoned: {}", e))
    }
}

// =========================================================================
// Factory Functions (exported to FFI)
// =========================================================================

/// Open or create a database at the given path.
///
/// `config_json` is a partial [`CoreConfig`]; omitted fields take defaults.
#[uniffi::export]
pub fn open_database(
    path: String,
    config_json: Option<String>,
) -> Result<Arc<ClinicOpsCore>, ClinicOpsError> {
    let config = match config_json {
        Some(json) => CoreConfig::from_json_str(&json)?,
        None => CoreConfig::default(),
    };
    let db = Database::open(&path)?;
    tracing::info!(path = %path, clinic = %config.clinic_name, "database opened");
    Ok(ClinicOpsCore::wrap(db, config))
}

/// Create an in-memory database (for testing).
#[uniffi::export]
pub fn open_database_in_memory() -> Result<Arc<ClinicOpsCore>, ClinicOpsError> {
    let db = Database::open_in_memory()?;
    Ok(ClinicOpsCore::wrap(db, CoreConfig::default()))
}

// =========================================================================
// Main API Object
// =========================================================================

/// Thread-safe database wrapper for FFI.
#[derive(uniffi::Object)]
pub struct ClinicOpsCore {
    db: Arc<Mutex<Database>>,
    config: CoreConfig,
}

impl ClinicOpsCore {
    fn wrap(db: Database, config: CoreConfig) -> Arc<Self> {
        Arc::new(Self {
            db: Arc::new(Mutex::new(db)),
            config,
        })
    }

    fn log_filter(&self) -> &str {
        &self.config.log_filter
    }
}

#[uniffi::export]
impl ClinicOpsCore {
    /// Effective configuration as JSON.
    pub fn config_json(&self) -> Result<String, ClinicOpsError> {
        Ok(self.config.to_json()?)
    }

    /// Install the log subscriber with the configured filter.
    ///
    /// Returns `false` if one was already installed.
    pub fn enable_logging(&self) -> bool {
        logging::init_logging(self.log_filter())
    }

    // =========================================================================
    // Patient Operations
    // =========================================================================

    pub fn register_patient(&self, details: FfiPatientDetails) -> Result<FfiPatient, ClinicOpsError> {
        let db = self.db.lock()?;
        let patient = PatientRegistry::new(&db).register(details.into())?;
        Ok(patient.into())
    }

    pub fn update_patient(
        &self,
        patient_id: String,
        details: FfiPatientDetails,
    ) -> Result<FfiPatient, ClinicOpsError> {
        let db = self.db.lock()?;
        let patient = PatientRegistry::new(&db).update_details(&patient_id, details.into())?;
        Ok(patient.into())
    }

    pub fn get_patient(&self, patient_id: String) -> Result<Option<FfiPatient>, ClinicOpsError> {
        let db = self.db.lock()?;
        Ok(db.get_patient(&patient_id)?.map(|p| p.into()))
    }

    /// Search patients by name or phone.
    pub fn search_patients(&self, query: String, limit: u32) -> Result<Vec<FfiPatient>, ClinicOpsError> {
        let db = self.db.lock()?;
        let patients = PatientRegistry::new(&db).search(&query, limit as usize)?;
        Ok(patients.into_iter().map(|p| p.into()).collect())
    }

    pub fn patients_pending_review(&self) -> Result<Vec<FfiPatient>, ClinicOpsError> {
        let db = self.db.lock()?;
        let patients = PatientRegistry::new(&db).pending_review()?;
        Ok(patients.into_iter().map(|p| p.into()).collect())
    }

    /// Record the doctor's decision: `approved`, `rejected` or `pending`.
    pub fn review_patient(&self, patient_id: String, decision: String) -> Result<FfiPatient, ClinicOpsError> {
        let decision = DoctorReviewStatus::parse(&decision)
            .ok_or_else(|| ClinicOpsError::InvalidInput(format!("unknown review status: {}", decision)))?;
        let db = self.db.lock()?;
        let patient = PatientRegistry::new(&db).review(&patient_id, decision)?;
        Ok(patient.into())
    }

    pub fn request_consultation(&self, patient_id: String) -> Result<FfiPatient, ClinicOpsError> {
        let db = self.db.lock()?;
        Ok(PatientRegistry::new(&db).request_consultation(&patient_id)?.into())
    }

    pub fn complete_consultation(&self, patient_id: String) -> Result<FfiPatient, ClinicOpsError> {
        let db = self.db.lock()?;
        Ok(PatientRegistry::new(&db).complete_consultation(&patient_id)?.into())
    }

    // =========================================================================
    // Treatment Catalog
    // =========================================================================

    pub fn upsert_treatment(&self, treatment: FfiTreatment) -> Result<(), ClinicOpsError> {
        let db = self.db.lock()?;
        db.upsert_treatment(&treatment.into())?;
        Ok(())
    }

    pub fn list_treatments(&self, active_only: bool) -> Result<Vec<FfiTreatment>, ClinicOpsError> {
        let db = self.db.lock()?;
        let treatments = db.list_treatments(active_only)?;
        Ok(treatments.into_iter().map(|t| t.into()).collect())
    }

    /// Hide a treatment from the picker. Past records keep referring to it.
    pub fn deactivate_treatment(&self, treatment_id: String) -> Result<(), ClinicOpsError> {
        let db = self.db.lock()?;
        if !db.deactivate_treatment(&treatment_id)? {
            return Err(ClinicOpsError::NotFound(format!("treatment {}", treatment_id)));
        }
        Ok(())
    }

    /// Default quantity of a consumable prefilled when the treatment is given.
    pub fn set_treatment_consumable(
        &self,
        treatment_id: String,
        stock_item_id: String,
        default_quantity: f64,
    ) -> Result<(), ClinicOpsError> {
        let db = self.db.lock()?;
        db.set_treatment_consumable(&TreatmentConsumable {
            treatment_id,
            stock_item_id,
            default_quantity,
        })?;
        Ok(())
    }

    pub fn treatment_consumables(
        &self,
        treatment_id: String,
    ) -> Result<Vec<FfiConsumableUsage>, ClinicOpsError> {
        let db = self.db.lock()?;
        let links = db.list_treatment_consumables(&treatment_id)?;
        Ok(links
            .into_iter()
            .map(|l| FfiConsumableUsage {
                stock_item_id: l.stock_item_id,
                quantity: l.default_quantity,
                notes: None,
            })
            .collect())
    }

    // =========================================================================
    // Package Operations
    // =========================================================================

    pub fn purchase_package(
        &self,
        patient_id: String,
        treatment_id: String,
        sessions_purchased: u32,
        total_amount: f64,
        amount_paid: f64,
    ) -> Result<FfiPackage, ClinicOpsError> {
        let db = self.db.lock()?;
        let package = PackageLedger::new(&db).purchase_package(
            &patient_id,
            &treatment_id,
            sessions_purchased,
            total_amount,
            amount_paid,
        )?;
        Ok(package.into())
    }

    /// Record a package bought before the patient was on this system.
    pub fn migrate_package(
        &self,
        patient_id: String,
        treatment_id: String,
        sessions_purchased: u32,
        sessions_used: u32,
        total_amount: f64,
        amount_paid: f64,
    ) -> Result<FfiPackage, ClinicOpsError> {
        let db = self.db.lock()?;
        let package = PackageLedger::new(&db).migrate_package(
            &patient_id,
            &treatment_id,
            sessions_purchased,
            sessions_used,
            total_amount,
            amount_paid,
        )?;
        Ok(package.into())
    }

    pub fn record_payment(&self, package_id: String, amount: f64) -> Result<FfiPackage, ClinicOpsError> {
        let db = self.db.lock()?;
        Ok(PackageLedger::new(&db).record_payment(&package_id, amount)?.into())
    }

    pub fn packages_for_patient(&self, patient_id: String) -> Result<Vec<FfiPackage>, ClinicOpsError> {
        let db = self.db.lock()?;
        let packages = db.list_packages_for_patient(&patient_id)?;
        Ok(packages.into_iter().map(|p| p.into()).collect())
    }

    /// Packages with sessions left, optionally for one treatment.
    pub fn available_packages(
        &self,
        patient_id: String,
        treatment_id: Option<String>,
    ) -> Result<Vec<FfiPackage>, ClinicOpsError> {
        let db = self.db.lock()?;
        let ledger = PackageLedger::new(&db);
        let packages = match treatment_id {
            Some(treatment_id) => ledger.available_for_treatment(&patient_id, &treatment_id)?,
            None => ledger.available_packages(&patient_id)?,
        };
        Ok(packages.into_iter().map(|p| p.into()).collect())
    }

    // =========================================================================
    // Visit Operations
    // =========================================================================

    pub fn start_visit(&self, patient_id: String) -> Result<FfiVisit, ClinicOpsError> {
        let db = self.db.lock()?;
        Ok(VisitManager::new(&db).start_visit(&patient_id)?.into())
    }

    pub fn begin_consultation(
        &self,
        visit_id: String,
        doctor_id: Option<String>,
        nurse_id: Option<String>,
    ) -> Result<FfiVisit, ClinicOpsError> {
        let db = self.db.lock()?;
        let visit = VisitManager::new(&db).begin_consultation(
            &visit_id,
            doctor_id.as_deref(),
            nurse_id.as_deref(),
        )?;
        Ok(visit.into())
    }

    pub fn record_vitals(&self, visit_id: String, vitals: FfiVitals) -> Result<FfiVisit, ClinicOpsError> {
        let db = self.db.lock()?;
        Ok(VisitManager::new(&db).record_vitals(&visit_id, vitals.into())?.into())
    }

    pub fn update_visit_notes(&self, visit_id: String, notes: String) -> Result<FfiVisit, ClinicOpsError> {
        let db = self.db.lock()?;
        Ok(VisitManager::new(&db).update_notes(&visit_id, &notes)?.into())
    }

    pub fn get_visit_detail(&self, visit_id: String) -> Result<FfiVisitDetail, ClinicOpsError> {
        let db = self.db.lock()?;
        Ok(VisitManager::new(&db).visit_detail(&visit_id)?.into())
    }

    /// Waiting visits in arrival order.
    pub fn waiting_queue(&self) -> Result<Vec<FfiVisit>, ClinicOpsError> {
        let db = self.db.lock()?;
        let visits = VisitManager::new(&db).waiting_queue()?;
        Ok(visits.into_iter().map(|v| v.into()).collect())
    }

    pub fn visits_in_progress(&self) -> Result<Vec<FfiVisit>, ClinicOpsError> {
        let db = self.db.lock()?;
        let visits = VisitManager::new(&db).in_progress()?;
        Ok(visits.into_iter().map(|v| v.into()).collect())
    }

    pub fn visits_for_patient(&self, patient_id: String) -> Result<Vec<FfiVisit>, ClinicOpsError> {
        let db = self.db.lock()?;
        let visits = VisitManager::new(&db).visits_for_patient(&patient_id)?;
        Ok(visits.into_iter().map(|v| v.into()).collect())
    }

    /// Complete and lock a visit in one transaction.
    pub fn complete_visit(
        &self,
        request: FfiCompletionRequest,
    ) -> Result<FfiCompletionReport, ClinicOpsError> {
        let db = self.db.lock()?;
        let report = VisitCompletion::new(&db)
            .with_stock_deduction(self.config.deduct_consumables_on_completion)
            .complete(&request.into())?;
        Ok(report.into())
    }

    // =========================================================================
    // Inventory Operations
    // =========================================================================

    pub fn create_stock_item(
        &self,
        item_name: String,
        category: String,
        unit: String,
    ) -> Result<FfiStockItem, ClinicOpsError> {
        let db = self.db.lock()?;
        Ok(self.inventory(&db).create_item(&item_name, &category, &unit)?.into())
    }

    pub fn get_stock_item(&self, stock_item_id: String) -> Result<Option<FfiStockItem>, ClinicOpsError> {
        let db = self.db.lock()?;
        Ok(db.get_stock_item(&stock_item_id)?.map(|i| i.into()))
    }

    pub fn list_stock_items(&self, active_only: bool) -> Result<Vec<FfiStockItem>, ClinicOpsError> {
        let db = self.db.lock()?;
        let items = db.list_stock_items(active_only)?;
        Ok(items.into_iter().map(|i| i.into()).collect())
    }

    pub fn add_stock(
        &self,
        stock_item_id: String,
        request: FfiAddStock,
    ) -> Result<FfiStockItem, ClinicOpsError> {
        let db = self.db.lock()?;
        let item = self.inventory(&db).add_stock(&stock_item_id, &request.into())?;
        Ok(item.into())
    }

    pub fn deactivate_stock_item(&self, stock_item_id: String) -> Result<(), ClinicOpsError> {
        let db = self.db.lock()?;
        self.inventory(&db).deactivate_item(&stock_item_id)?;
        Ok(())
    }

    /// Fuzzy name search over active items, best match first.
    pub fn search_stock(&self, query: String, limit: u32) -> Result<Vec<FfiStockItem>, ClinicOpsError> {
        let db = self.db.lock()?;
        let matches = self.inventory(&db).search(&query, limit as usize)?;
        Ok(matches.into_iter().map(|m| m.item.into()).collect())
    }

    pub fn low_stock(&self, threshold: f64) -> Result<Vec<FfiStockItem>, ClinicOpsError> {
        let db = self.db.lock()?;
        let items = self.inventory(&db).low_stock(threshold)?;
        Ok(items.into_iter().map(|i| i.into()).collect())
    }

    // =========================================================================
    // Appointment Operations
    // =========================================================================

    /// Book an appointment. `scheduled_at` is RFC 3339.
    pub fn schedule_appointment(
        &self,
        patient_id: String,
        treatment_id: Option<String>,
        scheduled_at: String,
        duration_minutes: Option<u32>,
        notes: Option<String>,
    ) -> Result<FfiAppointment, ClinicOpsError> {
        let scheduled_at = parse_timestamp(&scheduled_at)?;
        let db = self.db.lock()?;
        let appointment = self.scheduler(&db).schedule(
            &patient_id,
            treatment_id.as_deref(),
            scheduled_at,
            duration_minutes,
            notes.as_deref(),
        )?;
        Ok(appointment.into())
    }

    /// Appointments on a `YYYY-MM-DD` day.
    pub fn appointments_on(&self, date: String) -> Result<Vec<FfiAppointment>, ClinicOpsError> {
        let date = parse_date(&date)?;
        let db = self.db.lock()?;
        let appointments = self.scheduler(&db).day(date)?;
        Ok(appointments.into_iter().map(|a| a.into()).collect())
    }

    pub fn appointments_for_patient(&self, patient_id: String) -> Result<Vec<FfiAppointment>, ClinicOpsError> {
        let db = self.db.lock()?;
        let appointments = self.scheduler(&db).for_patient(&patient_id)?;
        Ok(appointments.into_iter().map(|a| a.into()).collect())
    }

    pub fn cancel_appointment(&self, appointment_id: String) -> Result<FfiAppointment, ClinicOpsError> {
        let db = self.db.lock()?;
        Ok(self.scheduler(&db).cancel(&appointment_id)?.into())
    }

    pub fn complete_appointment(&self, appointment_id: String) -> Result<FfiAppointment, ClinicOpsError> {
        let db = self.db.lock()?;
        Ok(self.scheduler(&db).complete(&appointment_id)?.into())
    }

    pub fn mark_no_show(&self, appointment_id: String) -> Result<FfiAppointment, ClinicOpsError> {
        let db = self.db.lock()?;
        Ok(self.scheduler(&db).mark_no_show(&appointment_id)?.into())
    }

    // =========================================================================
    // Consent Operations
    // =========================================================================

    /// Import a template from JSON; returns its ID.
    pub fn import_consent_template(&self, json: String) -> Result<String, ClinicOpsError> {
        let db = self.db.lock()?;
        let template = ConsentDesk::new(&db).import_template_json(&json)?;
        Ok(template.id)
    }

    pub fn consent_template_json(&self, template_id: String) -> Result<String, ClinicOpsError> {
        let db = self.db.lock()?;
        let template = ConsentDesk::new(&db).template(&template_id)?;
        Ok(template.to_json()?)
    }

    pub fn sign_consent(
        &self,
        patient_id: String,
        template_id: String,
        treatment_id: Option<String>,
        values: HashMap<String, String>,
        signature_data: String,
    ) -> Result<FfiConsentForm, ClinicOpsError> {
        let values: BTreeMap<String, String> = values.into_iter().collect();
        let db = self.db.lock()?;
        let form = ConsentDesk::new(&db).sign_consent(
            &patient_id,
            &template_id,
            treatment_id.as_deref(),
            &values,
            &signature_data,
        )?;
        Ok(form.into())
    }

    /// True if the stored document still matches its signing hash.
    pub fn verify_consent(&self, form_id: String) -> Result<bool, ClinicOpsError> {
        let db = self.db.lock()?;
        Ok(ConsentDesk::new(&db).verify_consent(&form_id)?)
    }

    pub fn consent_forms_for_patient(&self, patient_id: String) -> Result<Vec<FfiConsentForm>, ClinicOpsError> {
        let db = self.db.lock()?;
        let forms = ConsentDesk::new(&db).forms_for_patient(&patient_id)?;
        Ok(forms.into_iter().map(|f| f.into()).collect())
    }

    // =========================================================================
    // Export Operations
    // =========================================================================

    /// Daily report for a `YYYY-MM-DD` day as JSON.
    pub fn export_daily_report_json(&self, date: String) -> Result<String, ClinicOpsError> {
        let report = self.daily_report(&date)?;
        Ok(report.to_json()?)
    }

    /// Daily report for a `YYYY-MM-DD` day as CSV.
    pub fn export_daily_report_csv(&self, date: String) -> Result<String, ClinicOpsError> {
        Ok(self.daily_report(&date)?.to_csv())
    }
}

impl ClinicOpsCore {
    fn inventory<'a>(&self, db: &'a Database) -> InventoryManager<'a> {
        InventoryManager::new(db).with_search_threshold(self.config.stock_search_threshold)
    }

    fn scheduler<'a>(&self, db: &'a Database) -> Scheduler<'a> {
        Scheduler::new(db, self.config.default_appointment_minutes)
    }

    fn daily_report(&self, date: &str) -> Result<DailyReport, ClinicOpsError> {
        let date = parse_date(date)?;
        let db = self.db.lock()?;
        Ok(DailyReporter::new(&db).report(date, &self.config.clinic_name)?)
    }
}

fn parse_date(date: &str) -> Result<NaiveDate, ClinicOpsError> {
    NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map_err(|e| ClinicOpsError::InvalidInput(format!("date {:?}: {}", date, e)))
}

fn parse_timestamp(ts: &str) -> Result<DateTime<Utc>, ClinicOpsError> {
    DateTime::parse_from_rfc3339(ts)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| ClinicOpsError::InvalidInput(format!("timestamp {:?}: {}", ts, e)))
}

// =========================================================================
// FFI Types
// =========================================================================

/// FFI-safe patient demographics.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiPatientDetails {
    pub full_name: String,
    pub phone: String,
    pub date_of_birth: Option<String>,
    pub gender: Option<String>,
    pub address: Option<String>,
    pub emergency_contact: Option<String>,
    pub allergies: Option<String>,
    pub medical_history: Option<String>,
}

impl From<FfiPatientDetails> for PatientDetails {
    fn from(d: FfiPatientDetails) -> Self {
        PatientDetails {
            full_name: d.full_name,
            phone: d.phone,
            date_of_birth: d.date_of_birth,
            gender: d.gender,
            address: d.address,
            emergency_contact: d.emergency_contact,
            allergies: d.allergies,
            medical_history: d.medical_history,
        }
    }
}

/// FFI-safe patient.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiPatient {
    pub id: String,
    pub full_name: String,
    pub phone: String,
    pub date_of_birth: Option<String>,
    pub gender: Option<String>,
    pub allergies: Option<String>,
    pub review_status: String,
    pub consultation_status: String,
    pub cleared_for_treatment: bool,
}

impl From<Patient> for FfiPatient {
    fn from(patient: Patient) -> Self {
        Self {
            cleared_for_treatment: patient.is_cleared_for_treatment(),
            review_status: patient.review_status.as_str().to_string(),
            consultation_status: patient.consultation_status.as_str().to_string(),
            id: patient.id,
            full_name: patient.full_name,
            phone: patient.phone,
            date_of_birth: patient.date_of_birth,
            gender: patient.gender,
            allergies: patient.allergies,
        }
    }
}

/// FFI-safe treatment.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiTreatment {
    pub id: String,
    pub name: String,
    pub category: String,
    pub dosage_unit: String,
    pub common_doses: Vec<String>,
    pub default_dose: Option<String>,
    pub consent_template_id: Option<String>,
    pub active: bool,
}

impl From<Treatment> for FfiTreatment {
    fn from(t: Treatment) -> Self {
        Self {
            id: t.id,
            name: t.name,
            category: t.category,
            dosage_unit: t.dosage_unit,
            common_doses: t.common_doses,
            default_dose: t.default_dose,
            consent_template_id: t.consent_template_id,
            active: t.active,
        }
    }
}

impl From<FfiTreatment> for Treatment {
    fn from(t: FfiTreatment) -> Self {
        Treatment {
            id: t.id,
            name: t.name,
            category: t.category,
            dosage_unit: t.dosage_unit,
            common_doses: t.common_doses,
            default_dose: t.default_dose,
            consent_template_id: t.consent_template_id,
            active: t.active,
        }
    }
}

/// FFI-safe package.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiPackage {
    pub id: String,
    pub patient_id: String,
    pub treatment_id: String,
    pub sessions_purchased: u32,
    pub sessions_remaining: u32,
    pub status: String,
    pub payment_status: String,
    pub total_amount: f64,
    pub amount_paid: f64,
    pub balance_due: f64,
}

impl From<Package> for FfiPackage {
    fn from(p: Package) -> Self {
        Self {
            status: p.status.as_str().to_string(),
            payment_status: p.payment_status.as_str().to_string(),
            balance_due: p.balance_due(),
            id: p.id,
            patient_id: p.patient_id,
            treatment_id: p.treatment_id,
            sessions_purchased: p.sessions_purchased,
            sessions_remaining: p.sessions_remaining,
            total_amount: p.total_amount,
            amount_paid: p.amount_paid,
        }
    }
}

/// FFI-safe vitals.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiVitals {
    pub blood_pressure: Option<String>,
    pub heart_rate_bpm: Option<u32>,
    pub temperature_c: Option<f64>,
    pub weight_kg: Option<f64>,
    pub oxygen_saturation: Option<u32>,
}

impl From<FfiVitals> for Vitals {
    fn from(v: FfiVitals) -> Self {
        Vitals {
            blood_pressure: v.blood_pressure,
            heart_rate_bpm: v.heart_rate_bpm,
            temperature_c: v.temperature_c,
            weight_kg: v.weight_kg,
            oxygen_saturation: v.oxygen_saturation,
        }
    }
}

impl From<Vitals> for FfiVitals {
    fn from(v: Vitals) -> Self {
        Self {
            blood_pressure: v.blood_pressure,
            heart_rate_bpm: v.heart_rate_bpm,
            temperature_c: v.temperature_c,
            weight_kg: v.weight_kg,
            oxygen_saturation: v.oxygen_saturation,
        }
    }
}

/// FFI-safe visit.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiVisit {
    pub id: String,
    pub patient_id: String,
    pub status: String,
    pub vitals: Option<FfiVitals>,
    pub notes: Option<String>,
    pub doctor_id: Option<String>,
    pub nurse_id: Option<String>,
    pub is_locked: bool,
    pub created_at: String,
    pub completed_at: Option<String>,
}

impl From<Visit> for FfiVisit {
    fn from(v: Visit) -> Self {
        Self {
            status: v.status.as_str().to_string(),
            vitals: v.vitals.map(|v| v.into()),
            id: v.id,
            patient_id: v.patient_id,
            notes: v.notes,
            doctor_id: v.doctor_id,
            nurse_id: v.nurse_id,
            is_locked: v.is_locked,
            created_at: v.created_at,
            completed_at: v.completed_at,
        }
    }
}

/// FFI-safe dose record.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiVisitTreatment {
    pub id: String,
    pub treatment_id: String,
    pub package_id: String,
    pub dose_administered: String,
    pub dose_unit: String,
    pub sessions_deducted: u32,
}

impl From<VisitTreatment> for FfiVisitTreatment {
    fn from(t: VisitTreatment) -> Self {
        Self {
            id: t.id,
            treatment_id: t.treatment_id,
            package_id: t.package_id,
            dose_administered: t.dose_administered,
            dose_unit: t.dose_unit,
            sessions_deducted: t.sessions_deducted,
        }
    }
}

/// FFI-safe consumable usage, used both for input and for stored records.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiConsumableUsage {
    pub stock_item_id: String,
    pub quantity: f64,
    pub notes: Option<String>,
}

impl From<VisitConsumable> for FfiConsumableUsage {
    fn from(c: VisitConsumable) -> Self {
        Self {
            stock_item_id: c.stock_item_id,
            quantity: c.quantity_used,
            notes: c.notes,
        }
    }
}

/// FFI-safe visit with its records.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiVisitDetail {
    pub visit: FfiVisit,
    pub treatments: Vec<FfiVisitTreatment>,
    pub consumables: Vec<FfiConsumableUsage>,
}

impl From<VisitDetail> for FfiVisitDetail {
    fn from(d: VisitDetail) -> Self {
        Self {
            visit: d.visit.into(),
            treatments: d.treatments.into_iter().map(|t| t.into()).collect(),
            consumables: d.consumables.into_iter().map(|c| c.into()).collect(),
        }
    }
}

/// FFI-safe administered treatment.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiAdministeredTreatment {
    pub treatment_id: String,
    pub package_id: String,
    pub dose: String,
    pub dose_unit: String,
}

/// FFI-safe completion request.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiCompletionRequest {
    pub visit_id: String,
    pub notes: Option<String>,
    pub doctor_id: Option<String>,
    pub nurse_id: Option<String>,
    pub treatments: Vec<FfiAdministeredTreatment>,
    pub consumables: Vec<FfiConsumableUsage>,
}

impl From<FfiCompletionRequest> for CompletionRequest {
    fn from(r: FfiCompletionRequest) -> Self {
        CompletionRequest {
            visit_id: r.visit_id,
            notes: r.notes,
            doctor_id: r.doctor_id,
            nurse_id: r.nurse_id,
            treatments: r
                .treatments
                .into_iter()
                .map(|t| AdministeredTreatment {
                    treatment_id: t.treatment_id,
                    package_id: t.package_id,
                    dose: t.dose,
                    dose_unit: t.dose_unit,
                })
                .collect(),
            consumables: r
                .consumables
                .into_iter()
                .map(|c| ConsumableUsage {
                    stock_item_id: c.stock_item_id,
                    quantity: c.quantity,
                    notes: c.notes,
                })
                .collect(),
        }
    }
}

/// FFI-safe completion result.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiCompletionReport {
    pub visit_id: String,
    pub completed_at: String,
    pub treatments: Vec<FfiVisitTreatment>,
    pub consumables: Vec<FfiConsumableUsage>,
    pub packages: Vec<FfiPackage>,
    pub stock_deducted: bool,
}

impl From<CompletionReport> for FfiCompletionReport {
    fn from(r: CompletionReport) -> Self {
        Self {
            visit_id: r.visit_id,
            completed_at: r.completed_at,
            treatments: r.treatments.into_iter().map(|t| t.into()).collect(),
            consumables: r.consumables.into_iter().map(|c| c.into()).collect(),
            packages: r.packages.into_iter().map(|p| p.into()).collect(),
            stock_deducted: r.stock_deducted,
        }
    }
}

/// FFI-safe stock item.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiStockItem {
    pub id: String,
    pub item_name: String,
    pub category: String,
    pub unit: String,
    pub packaging_unit: Option<String>,
    pub units_per_package: Option<f64>,
    pub current_stock: f64,
    pub stock_in_packages: Option<f64>,
    pub status: String,
}

impl From<StockItem> for FfiStockItem {
    fn from(item: StockItem) -> Self {
        Self {
            unit: item.unit().to_string(),
            packaging_unit: item.packaging.packaging_unit().map(str::to_string),
            units_per_package: item.packaging.units_per_package(),
            stock_in_packages: item.stock_in_packages(),
            status: item.status.as_str().to_string(),
            id: item.id,
            item_name: item.item_name,
            category: item.category,
            current_stock: item.current_stock,
        }
    }
}

/// FFI-safe add-stock request.
#[derive(Debug, Clone, uniffi::Enum)]
pub enum FfiAddStock {
    Direct {
        amount: f64,
    },
    Packages {
        count: f64,
    },
    ConfigureAndAdd {
        packaging_unit: String,
        base_unit: String,
        units_per_package: f64,
        count: f64,
    },
}

impl From<FfiAddStock> for AddStockRequest {
    fn from(r: FfiAddStock) -> Self {
        match r {
            FfiAddStock::Direct { amount } => AddStockRequest::Direct { amount },
            FfiAddStock::Packages { count } => AddStockRequest::Packages { count },
            FfiAddStock::ConfigureAndAdd {
                packaging_unit,
                base_unit,
                units_per_package,
                count,
            } => AddStockRequest::ConfigureAndAdd {
                setup: PackagingSetup {
                    packaging_unit,
                    base_unit,
                    units_per_package,
                },
                count,
            },
        }
    }
}

/// FFI-safe appointment.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiAppointment {
    pub id: String,
    pub patient_id: String,
    pub treatment_id: Option<String>,
    pub scheduled_at: String,
    pub duration_minutes: u32,
    pub status: String,
    pub notes: Option<String>,
}

impl From<Appointment> for FfiAppointment {
    fn from(a: Appointment) -> Self {
        Self {
            scheduled_at: a.scheduled_at.to_rfc3339(),
            status: a.status.as_str().to_string(),
            id: a.id,
            patient_id: a.patient_id,
            treatment_id: a.treatment_id,
            duration_minutes: a.duration_minutes,
            notes: a.notes,
        }
    }
}

/// FFI-safe signed consent.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiConsentForm {
    pub id: String,
    pub patient_id: String,
    pub treatment_id: Option<String>,
    pub template_id: String,
    pub languages: Vec<String>,
    pub document_text: String,
    pub content_hash: String,
    pub signed_at: String,
}

impl From<ConsentForm> for FfiConsentForm {
    fn from(f: ConsentForm) -> Self {
        Self {
            id: f.id,
            patient_id: f.patient_id,
            treatment_id: f.treatment_id,
            template_id: f.template_id,
            languages: f.languages,
            document_text: f.document_text,
            content_hash: f.content_hash,
            signed_at: f.signed_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn details(name: &str) -> FfiPatientDetails {
        FfiPatientDetails {
            full_name: name.into(),
            phone: "555-0100".into(),
            date_of_birth: None,
            gender: None,
            address: None,
            emergency_contact: None,
            allergies: None,
            medical_history: None,
        }
    }

    #[test]
    fn test_ffi_visit_flow() {
        let core = open_database_in_memory().unwrap();
        let patient = core.register_patient(details("Jane Doe")).unwrap();

        let treatment = Treatment::new("NAD+".into(), "IV therapy".into(), "mg".into());
        let treatment_id = treatment.id.clone();
        core.upsert_treatment(treatment.into()).unwrap();

        let package = core
            .purchase_package(patient.id.clone(), treatment_id.clone(), 3, 300.0, 100.0)
            .unwrap();
        assert_eq!(package.payment_status, "pending");

        let visit = core.start_visit(patient.id.clone()).unwrap();
        let report = core
            .complete_visit(FfiCompletionRequest {
                visit_id: visit.id.clone(),
                notes: Some("tolerated well".into()),
                doctor_id: None,
                nurse_id: None,
                treatments: vec![FfiAdministeredTreatment {
                    treatment_id,
                    package_id: package.id.clone(),
                    dose: "250".into(),
                    dose_unit: "mg".into(),
                }],
                consumables: vec![],
            })
            .unwrap();
        assert_eq!(report.packages[0].sessions_remaining, 2);

        let detail = core.get_visit_detail(visit.id.clone()).unwrap();
        assert!(detail.visit.is_locked);
        assert_eq!(detail.visit.status, "completed");

        assert!(matches!(
            core.update_visit_notes(visit.id, "late edit".into()),
            Err(ClinicOpsError::Conflict(_))
        ));
    }

    #[test]
    fn test_ffi_input_errors() {
        let core = open_database_in_memory().unwrap();
        assert!(matches!(
            core.appointments_on("03/02/2026".into()),
            Err(ClinicOpsError::InvalidInput(_))
        ));
        assert!(matches!(
            core.review_patient("p1".into(), "maybe".into()),
            Err(ClinicOpsError::InvalidInput(_))
        ));
        assert!(matches!(
            core.start_visit("nobody".into()),
            Err(ClinicOpsError::NotFound(_))
        ));
        assert!(matches!(
            open_database(":memory:".into(), Some(r#"{"default_appointment_minutes": 0}"#.into())),
            Err(ClinicOpsError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_logging_uses_opened_config() {
        let core = open_database(
            ":memory:".into(),
            Some(r#"{"log_filter": "clinic_ops_core=trace"}"#.into()),
        )
        .unwrap();
        assert_eq!(core.log_filter(), "clinic_ops_core=trace");

        let defaults = open_database_in_memory().unwrap();
        assert_eq!(defaults.log_filter(), CoreConfig::default().log_filter);

        core.enable_logging();
        assert!(!defaults.enable_logging());
    }

    #[test]
    fn test_ffi_daily_report() {
        let core = open_database(
            ":memory:".into(),
            Some(r#"{"clinic_name": "Downtown Wellness"}"#.into()),
        )
        .unwrap();
        let json = core.export_daily_report_json("2026-03-02".into()).unwrap();
        assert!(json.contains("Downtown Wellness"));
        assert_eq!(core.export_daily_report_csv("2026-03-02".into()).unwrap().lines().count(), 1);
    }
}
