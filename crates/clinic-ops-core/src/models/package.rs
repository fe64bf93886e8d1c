//! Treatment package models.

use serde::{Deserialize, Serialize};

use super::{new_id, now};

/// Whether a package still has sessions to give.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PackageStatus {
    Active,
    Depleted,
}

impl PackageStatus {
    /// `Depleted` exactly when nothing remains.
    pub fn for_remaining(sessions_remaining: u32) -> Self {
        if sessions_remaining == 0 {
            PackageStatus::Depleted
        } else {
            PackageStatus::Active
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PackageStatus::Active => "active",
            PackageStatus::Depleted => "depleted",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(PackageStatus::Active),
            "depleted" => Some(PackageStatus::Depleted),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PaymentStatus {
    Paid,
    Pending,
}

impl PaymentStatus {
    /// `Paid` once the amount paid covers the total.
    pub fn for_amounts(total_amount: f64, amount_paid: f64) -> Self {
        if amount_paid >= total_amount {
            PaymentStatus::Paid
        } else {
            PaymentStatus::Pending
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Paid => "paid",
            PaymentStatus::Pending => "pending",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "paid" => Some(PaymentStatus::Paid),
            "pending" => Some(PaymentStatus::Pending),
            _ => None,
        }
    }
}

/// A purchased bundle of sessions for one (patient, treatment) pair.
///
/// `sessions_remaining` stays within `[0, sessions_purchased]`, and `status` is
/// `Depleted` exactly when `sessions_remaining == 0`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Package {
    pub id: String,
    pub patient_id: String,
    pub treatment_id: String,
    pub sessions_purchased: u32,
    pub sessions_remaining: u32,
    pub status: PackageStatus,
    pub payment_status: PaymentStatus,
    pub total_amount: f64,
    pub amount_paid: f64,
    pub created_at: String,
    pub updated_at: String,
}

impl Package {
    /// A freshly purchased package with every session available.
    pub fn new(
        patient_id: String,
        treatment_id: String,
        sessions_purchased: u32,
        total_amount: f64,
        amount_paid: f64,
    ) -> Self {
        let now = now();
        Self {
            id: new_id(),
            patient_id,
            treatment_id,
            sessions_purchased,
            sessions_remaining: sessions_purchased,
            status: PackageStatus::for_remaining(sessions_purchased),
            payment_status: PaymentStatus::for_amounts(total_amount, amount_paid),
            total_amount,
            amount_paid,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    pub fn sessions_used(&self) -> u32 {
        self.sessions_purchased - self.sessions_remaining
    }

    /// Counter and status after one administration, or `None` if depleted.
    pub fn after_session(&self) -> Option<(u32, PackageStatus)> {
        let remaining = self.sessions_remaining.checked_sub(1)?;
        Some((remaining, PackageStatus::for_remaining(remaining)))
    }

    pub fn balance_due(&self) -> f64 {
        (self.total_amount - self.amount_paid).max(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_package() {
        let package = Package::new("p-1".into(), "t-1".into(), 6, 600.0, 600.0);
        assert_eq!(package.sessions_remaining, 6);
        assert_eq!(package.status, PackageStatus::Active);
        assert_eq!(package.payment_status, PaymentStatus::Paid);
        assert_eq!(package.sessions_used(), 0);
    }

    #[test]
    fn test_pending_payment() {
        let package = Package::new("p-1".into(), "t-1".into(), 6, 600.0, 250.0);
        assert_eq!(package.payment_status, PaymentStatus::Pending);
        assert_eq!(package.balance_due(), 350.0);
    }

    #[test]
    fn test_after_session() {
        let mut package = Package::new("p-1".into(), "t-1".into(), 6, 600.0, 600.0);
        assert_eq!(package.after_session(), Some((5, PackageStatus::Active)));

        package.sessions_remaining = 1;
        assert_eq!(package.after_session(), Some((0, PackageStatus::Depleted)));

        package.sessions_remaining = 0;
        assert_eq!(package.after_session(), None);
    }
}
