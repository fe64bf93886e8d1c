//! Visit models: encounters, vitals and the records created at completion.

use serde::{Deserialize, Serialize};

use super::{new_id, now, TransitionError};

/// Visit progress. Moves forward only: waiting → in_progress → completed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum VisitStatus {
    Waiting,
    InProgress,
    Completed,
}

impl VisitStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VisitStatus::Waiting => "waiting",
            VisitStatus::InProgress => "in_progress",
            VisitStatus::Completed => "completed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "waiting" => Some(VisitStatus::Waiting),
            "in_progress" => Some(VisitStatus::InProgress),
            "completed" => Some(VisitStatus::Completed),
            _ => None,
        }
    }

    pub fn can_transition_to(&self, next: VisitStatus) -> bool {
        matches!(
            (self, next),
            (VisitStatus::Waiting, VisitStatus::InProgress)
                | (VisitStatus::Waiting, VisitStatus::Completed)
                | (VisitStatus::InProgress, VisitStatus::Completed)
        )
    }
}

/// Vital signs captured at triage.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Vitals {
    /// e.g. "120/80"
    pub blood_pressure: Option<String>,
    pub heart_rate_bpm: Option<u32>,
    pub temperature_c: Option<f64>,
    pub weight_kg: Option<f64>,
    pub oxygen_saturation: Option<u32>,
}

impl Vitals {
    /// Fields that are out of physiological range, by name.
    pub fn implausible_fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if let Some(hr) = self.heart_rate_bpm {
            if !(20..=250).contains(&hr) {
                fields.push("heart_rate_bpm");
            }
        }
        if let Some(t) = self.temperature_c {
            if !(30.0..=45.0).contains(&t) {
                fields.push("temperature_c");
            }
        }
        if let Some(w) = self.weight_kg {
            if !(w > 0.0 && w <= 500.0) {
                fields.push("weight_kg");
            }
        }
        if let Some(spo2) = self.oxygen_saturation {
            if spo2 > 100 {
                fields.push("oxygen_saturation");
            }
        }
        fields
    }
}

/// One clinical encounter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Visit {
    pub id: String,
    pub patient_id: String,
    pub status: VisitStatus,
    pub vitals: Option<Vitals>,
    pub notes: Option<String>,
    pub doctor_id: Option<String>,
    pub nurse_id: Option<String>,
    /// Set once completion finishes; clinical fields are frozen afterwards
    pub is_locked: bool,
    pub created_at: String,
    pub updated_at: String,
    pub completed_at: Option<String>,
}

impl Visit {
    /// Check a patient in.
    pub fn new(patient_id: String) -> Self {
        let now = now();
        Self {
            id: new_id(),
            patient_id,
            status: VisitStatus::Waiting,
            vitals: None,
            notes: None,
            doctor_id: None,
            nurse_id: None,
            is_locked: false,
            created_at: now.clone(),
            updated_at: now,
            completed_at: None,
        }
    }

    pub fn transition(&mut self, next: VisitStatus) -> Result<(), TransitionError> {
        if self.is_locked || !self.status.can_transition_to(next) {
            return Err(TransitionError {
                entity: "visit",
                from: self.status.as_str(),
                to: next.as_str(),
            });
        }
        self.status = next;
        self.updated_at = now();
        Ok(())
    }

    pub fn is_editable(&self) -> bool {
        !self.is_locked
    }
}

/// One administered dose. Written at completion and never changed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VisitTreatment {
    pub id: String,
    pub visit_id: String,
    pub treatment_id: String,
    pub package_id: String,
    /// Dose as entered (e.g., "5")
    pub dose_administered: String,
    pub dose_unit: String,
    pub sessions_deducted: u32,
    pub created_at: String,
}

impl VisitTreatment {
    pub fn new(
        visit_id: String,
        treatment_id: String,
        package_id: String,
        dose_administered: String,
        dose_unit: String,
    ) -> Self {
        Self {
            id: new_id(),
            visit_id,
            treatment_id,
            package_id,
            dose_administered,
            dose_unit,
            sessions_deducted: 1,
            created_at: now(),
        }
    }
}

/// One recorded use of a stock item during a visit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VisitConsumable {
    pub id: String,
    pub visit_id: String,
    pub stock_item_id: String,
    /// In the stock item's base unit
    pub quantity_used: f64,
    pub notes: Option<String>,
    pub created_at: String,
}

impl VisitConsumable {
    pub fn new(
        visit_id: String,
        stock_item_id: String,
        quantity_used: f64,
        notes: Option<String>,
    ) -> Self {
        Self {
            id: new_id(),
            visit_id,
            stock_item_id,
            quantity_used,
            notes,
            created_at: now(),
        }
    }
}
