//! Appointment models.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::{new_id, now};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum AppointmentStatus {
    Scheduled,
    Completed,
    Cancelled,
    NoShow,
}

impl AppointmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Scheduled => "scheduled",
            AppointmentStatus::Completed => "completed",
            AppointmentStatus::Cancelled => "cancelled",
            AppointmentStatus::NoShow => "no_show",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "scheduled" => Some(AppointmentStatus::Scheduled),
            "completed" => Some(AppointmentStatus::Completed),
            "cancelled" => Some(AppointmentStatus::Cancelled),
            "no_show" => Some(AppointmentStatus::NoShow),
            _ => None,
        }
    }

    /// Whether the slot still blocks the calendar.
    pub fn occupies_slot(&self) -> bool {
        !matches!(self, AppointmentStatus::Cancelled)
    }

    /// Only scheduled appointments move, and each terminal state is final.
    pub fn can_transition_to(&self, next: AppointmentStatus) -> bool {
        matches!(self, AppointmentStatus::Scheduled) && next != AppointmentStatus::Scheduled
    }
}

/// A booked time slot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Appointment {
    pub id: String,
    pub patient_id: String,
    pub treatment_id: Option<String>,
    pub scheduled_at: DateTime<Utc>,
    pub duration_minutes: u32,
    pub status: AppointmentStatus,
    pub notes: Option<String>,
    pub created_at: String,
}

impl Appointment {
    pub fn new(patient_id: String, scheduled_at: DateTime<Utc>, duration_minutes: u32) -> Self {
        Self {
            id: new_id(),
            patient_id,
            treatment_id: None,
            scheduled_at,
            duration_minutes,
            status: AppointmentStatus::Scheduled,
            notes: None,
            created_at: now(),
        }
    }

    pub fn ends_at(&self) -> DateTime<Utc> {
        self.scheduled_at + Duration::minutes(i64::from(self.duration_minutes))
    }

    /// Half-open interval overlap; back-to-back slots do not overlap.
    pub fn overlaps(&self, other: &Appointment) -> bool {
        self.scheduled_at < other.ends_at() && other.scheduled_at < self.ends_at()
    }
}
