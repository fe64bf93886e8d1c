//! Patient models.

use serde::{Deserialize, Serialize};

use super::{new_id, now, TransitionError};

/// Doctor sign-off on a newly registered patient.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum DoctorReviewStatus {
    /// Registered, awaiting doctor review
    Pending,
    /// Cleared for treatment
    Approved,
    /// Not cleared; registration must be corrected and resubmitted
    Rejected,
}

impl DoctorReviewStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DoctorReviewStatus::Pending => "pending",
            DoctorReviewStatus::Approved => "approved",
            DoctorReviewStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(DoctorReviewStatus::Pending),
            "approved" => Some(DoctorReviewStatus::Approved),
            "rejected" => Some(DoctorReviewStatus::Rejected),
            _ => None,
        }
    }

    fn can_transition_to(&self, next: DoctorReviewStatus) -> bool {
        matches!(
            (self, next),
            (DoctorReviewStatus::Pending, DoctorReviewStatus::Approved)
                | (DoctorReviewStatus::Pending, DoctorReviewStatus::Rejected)
                | (DoctorReviewStatus::Rejected, DoctorReviewStatus::Pending)
        )
    }
}

/// Whether the patient needs a doctor consultation before treatment.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ConsultationStatus {
    NotRequested,
    Requested,
    Completed,
}

impl ConsultationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConsultationStatus::NotRequested => "not_requested",
            ConsultationStatus::Requested => "requested",
            ConsultationStatus::Completed => "completed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "not_requested" => Some(ConsultationStatus::NotRequested),
            "requested" => Some(ConsultationStatus::Requested),
            "completed" => Some(ConsultationStatus::Completed),
            _ => None,
        }
    }
}

/// A registered patient.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Patient {
    /// Local UUID
    pub id: String,
    pub full_name: String,
    pub phone: String,
    /// ISO date (YYYY-MM-DD)
    pub date_of_birth: Option<String>,
    pub gender: Option<String>,
    pub address: Option<String>,
    pub emergency_contact: Option<String>,
    pub allergies: Option<String>,
    pub medical_history: Option<String>,
    pub review_status: DoctorReviewStatus,
    pub consultation_status: ConsultationStatus,
    pub created_at: String,
    pub updated_at: String,
}

impl Patient {
    /// Create a new patient with required fields.
    pub fn new(full_name: String, phone: String) -> Self {
        let now = now();
        Self {
            id: new_id(),
            full_name,
            phone,
            date_of_birth: None,
            gender: None,
            address: None,
            emergency_contact: None,
            allergies: None,
            medical_history: None,
            review_status: DoctorReviewStatus::Pending,
            consultation_status: ConsultationStatus::NotRequested,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    /// Move the doctor review to `next`.
    pub fn set_review_status(&mut self, next: DoctorReviewStatus) -> Result<(), TransitionError> {
        if !self.review_status.can_transition_to(next) {
            return Err(TransitionError {
                entity: "doctor review",
                from: self.review_status.as_str(),
                to: next.as_str(),
            });
        }
        self.review_status = next;
        self.touch();
        Ok(())
    }

    /// Ask for a doctor consultation. Completed consultations stay completed.
    pub fn request_consultation(&mut self) -> Result<(), TransitionError> {
        if self.consultation_status == ConsultationStatus::Completed {
            return Err(TransitionError {
                entity: "consultation",
                from: self.consultation_status.as_str(),
                to: ConsultationStatus::Requested.as_str(),
            });
        }
        self.consultation_status = ConsultationStatus::Requested;
        self.touch();
        Ok(())
    }

    /// Close a requested consultation.
    pub fn complete_consultation(&mut self) -> Result<(), TransitionError> {
        if self.consultation_status != ConsultationStatus::Requested {
            return Err(TransitionError {
                entity: "consultation",
                from: self.consultation_status.as_str(),
                to: ConsultationStatus::Completed.as_str(),
            });
        }
        self.consultation_status = ConsultationStatus::Completed;
        self.touch();
        Ok(())
    }

    /// Cleared for treatment: approved, with no open consultation request.
    pub fn is_cleared_for_treatment(&self) -> bool {
        self.review_status == DoctorReviewStatus::Approved
            && self.consultation_status != ConsultationStatus::Requested
    }

    pub fn touch(&mut self) {
        self.updated_at = now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_patient() {
        let patient = Patient::new("Jane Doe".into(), "+15550100".into());
        assert_eq!(patient.full_name, "Jane Doe");
        assert_eq!(patient.review_status, DoctorReviewStatus::Pending);
        assert_eq!(patient.consultation_status, ConsultationStatus::NotRequested);
        assert_eq!(patient.id.len(), 36);
        assert!(!patient.is_cleared_for_treatment());
    }

    #[test]
    fn test_review_transitions() {
        let mut patient = Patient::new("Jane Doe".into(), "+15550100".into());
        patient.set_review_status(DoctorReviewStatus::Rejected).unwrap();
        patient.set_review_status(DoctorReviewStatus::Pending).unwrap();
        patient.set_review_status(DoctorReviewStatus::Approved).unwrap();
        assert!(patient.is_cleared_for_treatment());

        let err = patient
            .set_review_status(DoctorReviewStatus::Rejected)
            .unwrap_err();
        assert_eq!(err.from, "approved");
        assert_eq!(err.to, "rejected");
    }

    #[test]
    fn test_consultation_flow() {
        let mut patient = Patient::new("Jane Doe".into(), "+15550100".into());
        patient.set_review_status(DoctorReviewStatus::Approved).unwrap();

        assert!(patient.complete_consultation().is_err());

        patient.request_consultation().unwrap();
        assert!(!patient.is_cleared_for_treatment());

        patient.complete_consultation().unwrap();
        assert!(patient.is_cleared_for_treatment());
        assert!(patient.request_consultation().is_err());
    }

    #[test]
    fn test_status_strings_round_trip() {
        for status in [
            DoctorReviewStatus::Pending,
            DoctorReviewStatus::Approved,
            DoctorReviewStatus::Rejected,
        ] {
            assert_eq!(DoctorReviewStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(ConsultationStatus::parse("bogus"), None);
    }
}
