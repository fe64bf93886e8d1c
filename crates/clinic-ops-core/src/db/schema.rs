//! SQLite schema definition.

/// Complete database schema for the clinic core.
pub const SCHEMA: &str = r#"
-- Enable foreign keys
PRAGMA foreign_keys = ON;

-- ============================================================================
-- Patients
-- ============================================================================

CREATE TABLE IF NOT EXISTS patients (
    id TEXT PRIMARY KEY,
    full_name TEXT NOT NULL,
    phone TEXT NOT NULL,
    date_of_birth TEXT,
    gender TEXT,
    address TEXT,
    emergency_contact TEXT,
    allergies TEXT,
    medical_history TEXT,
    review_status TEXT NOT NULL DEFAULT 'pending',           -- pending, approved, rejected
    consultation_status TEXT NOT NULL DEFAULT 'not_requested', -- not_requested, requested, completed
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_patients_name ON patients(full_name);
CREATE INDEX IF NOT EXISTS idx_patients_phone ON patients(phone);

-- ============================================================================
-- Treatment Catalog
-- ============================================================================

CREATE TABLE IF NOT EXISTS treatments (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    category TEXT NOT NULL,
    dosage_unit TEXT NOT NULL,
    common_doses TEXT NOT NULL DEFAULT '[]',      -- JSON array of strings
    default_dose TEXT,
    consent_template_id TEXT REFERENCES consent_templates(id),
    active INTEGER NOT NULL DEFAULT 1
);

CREATE INDEX IF NOT EXISTS idx_treatments_category ON treatments(category);

-- ============================================================================
-- Consumable Stock
-- ============================================================================

CREATE TABLE IF NOT EXISTS stock_items (
    id TEXT PRIMARY KEY,
    item_name TEXT NOT NULL,
    category TEXT NOT NULL,
    unit TEXT NOT NULL,                           -- base unit, current_stock is counted in it
    packaging_unit TEXT,                          -- NULL until packaging is configured
    units_per_package REAL CHECK (units_per_package IS NULL OR units_per_package > 0),
    current_stock REAL NOT NULL DEFAULT 0 CHECK (current_stock >= 0),
    status TEXT NOT NULL DEFAULT 'active',        -- active, inactive
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
    CHECK ((packaging_unit IS NULL) = (units_per_package IS NULL))
);

CREATE INDEX IF NOT EXISTS idx_stock_status ON stock_items(status);

CREATE TABLE IF NOT EXISTS treatment_consumables (
    treatment_id TEXT NOT NULL REFERENCES treatments(id),
    stock_item_id TEXT NOT NULL REFERENCES stock_items(id),
    default_quantity REAL NOT NULL CHECK (default_quantity > 0),
    PRIMARY KEY (treatment_id, stock_item_id)
);

-- ============================================================================
-- Packages (session ledger)
-- ============================================================================

CREATE TABLE IF NOT EXISTS packages (
    id TEXT PRIMARY KEY,
    patient_id TEXT NOT NULL REFERENCES patients(id),
    treatment_id TEXT NOT NULL REFERENCES treatments(id),
    sessions_purchased INTEGER NOT NULL CHECK (sessions_purchased > 0),
    sessions_remaining INTEGER NOT NULL,
    status TEXT NOT NULL DEFAULT 'active',        -- active, depleted
    payment_status TEXT NOT NULL DEFAULT 'pending', -- paid, pending
    total_amount REAL NOT NULL DEFAULT 0,
    amount_paid REAL NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
    CHECK (sessions_remaining >= 0 AND sessions_remaining <= sessions_purchased),
    CHECK ((status = 'depleted') = (sessions_remaining = 0))
);

CREATE INDEX IF NOT EXISTS idx_packages_patient ON packages(patient_id);

-- ============================================================================
-- Visits
-- ============================================================================

CREATE TABLE IF NOT EXISTS visits (
    id TEXT PRIMARY KEY,
    patient_id TEXT NOT NULL REFERENCES patients(id),
    status TEXT NOT NULL DEFAULT 'waiting',       -- waiting, in_progress, completed
    vitals TEXT,                                  -- JSON object
    notes TEXT,
    doctor_id TEXT,
    nurse_id TEXT,
    is_locked INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
    completed_at TEXT
);

CREATE INDEX IF NOT EXISTS idx_visits_patient ON visits(patient_id);
CREATE INDEX IF NOT EXISTS idx_visits_status ON visits(status);

-- Locked visits keep their clinical fields and their lock
CREATE TRIGGER IF NOT EXISTS visits_locked_guard BEFORE UPDATE ON visits
WHEN old.is_locked = 1
BEGIN
    SELECT RAISE(ABORT, 'Visit is locked');
END;

CREATE TABLE IF NOT EXISTS visit_treatments (
    id TEXT PRIMARY KEY,
    visit_id TEXT NOT NULL REFERENCES visits(id),
    treatment_id TEXT NOT NULL REFERENCES treatments(id),
    package_id TEXT NOT NULL REFERENCES packages(id),
    dose_administered TEXT NOT NULL CHECK (length(trim(dose_administered)) > 0),
    dose_unit TEXT NOT NULL,
    sessions_deducted INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_visit_treatments_visit ON visit_treatments(visit_id);

-- Dose records are append-only
CREATE TRIGGER IF NOT EXISTS visit_treatments_immutable BEFORE UPDATE ON visit_treatments
BEGIN
    SELECT RAISE(ABORT, 'Visit treatments cannot be modified');
END;

CREATE TABLE IF NOT EXISTS visit_consumables (
    id TEXT PRIMARY KEY,
    visit_id TEXT NOT NULL REFERENCES visits(id),
    stock_item_id TEXT NOT NULL REFERENCES stock_items(id),
    quantity_used REAL NOT NULL CHECK (quantity_used > 0),
    notes TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_visit_consumables_visit ON visit_consumables(visit_id);

-- ============================================================================
-- Consent
-- ============================================================================

CREATE TABLE IF NOT EXISTS consent_templates (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    template TEXT NOT NULL,                       -- JSON ConsentTemplate
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS consent_forms (
    id TEXT PRIMARY KEY,
    patient_id TEXT NOT NULL REFERENCES patients(id),
    treatment_id TEXT REFERENCES treatments(id),
    template_id TEXT NOT NULL REFERENCES consent_templates(id),
    languages TEXT NOT NULL DEFAULT '[]',         -- JSON array of language tags
    document_text TEXT NOT NULL,
    content_hash TEXT NOT NULL,
    signature_data TEXT NOT NULL,
    signed_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_consent_patient ON consent_forms(patient_id);

-- Signed consent is never edited
CREATE TRIGGER IF NOT EXISTS consent_forms_immutable BEFORE UPDATE ON consent_forms
BEGIN
    SELECT RAISE(ABORT, 'Signed consent forms cannot be modified');
END;

-- ============================================================================
-- Appointments
-- ============================================================================

CREATE TABLE IF NOT EXISTS appointments (
    id TEXT PRIMARY KEY,
    patient_id TEXT NOT NULL REFERENCES patients(id),
    treatment_id TEXT REFERENCES treatments(id),
    scheduled_at TEXT NOT NULL,                   -- RFC 3339, UTC
    duration_minutes INTEGER NOT NULL CHECK (duration_minutes > 0),
    status TEXT NOT NULL DEFAULT 'scheduled',     -- scheduled, completed, cancelled, no_show
    notes TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_appointments_scheduled ON appointments(scheduled_at);
CREATE INDEX IF NOT EXISTS idx_appointments_patient ON appointments(patient_id);
"#;
