//! End-of-day report for spreadsheet import.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::db::{Database, DbResult};
use crate::models::AppointmentStatus;

/// Everything the clinic did on one day.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyReport {
    pub clinic_name: String,
    /// `YYYY-MM-DD`
    pub date: String,
    pub generated_at: String,
    pub visits: Vec<ReportVisit>,
    pub appointments: AppointmentSummary,
    /// Total treatments administered
    pub total_treatments: usize,
}

/// One completed visit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportVisit {
    pub visit_id: String,
    pub patient_id: String,
    pub patient_name: String,
    pub completed_at: String,
    pub doctor_id: Option<String>,
    pub nurse_id: Option<String>,
    pub treatments: Vec<ReportTreatment>,
    pub consumables: Vec<ReportConsumable>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportTreatment {
    pub treatment_name: String,
    pub dose: String,
    pub dose_unit: String,
    pub package_id: String,
    /// Sessions left on the package when the report was generated
    pub sessions_remaining: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConsumable {
    pub item_name: String,
    pub quantity: f64,
    pub unit: String,
}

/// Appointment outcomes for the day.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AppointmentSummary {
    pub scheduled: usize,
    pub completed: usize,
    pub cancelled: usize,
    pub no_show: usize,
}

impl DailyReport {
    /// Export to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Export to CSV, one row per treatment or consumable line.
    pub fn to_csv(&self) -> String {
        let mut csv = String::new();

        csv.push_str("date,visit_id,patient_name,completed_at,line_type,item,quantity,unit,package_id,sessions_remaining\n");

        for visit in &self.visits {
            for t in &visit.treatments {
                csv.push_str(&format!(
                    "{},{},{},{},treatment,{},{},{},{},{}\n",
                    self.date,
                    escape_csv(&visit.visit_id),
                    escape_csv(&visit.patient_name),
                    escape_csv(&visit.completed_at),
                    escape_csv(&t.treatment_name),
                    escape_csv(&t.dose),
                    escape_csv(&t.dose_unit),
                    escape_csv(&t.package_id),
                    t.sessions_remaining.map(|s| s.to_string()).unwrap_or_default(),
                ));
            }
            for c in &visit.consumables {
                csv.push_str(&format!(
                    "{},{},{},{},consumable,{},{},{},,\n",
                    self.date,
                    escape_csv(&visit.visit_id),
                    escape_csv(&visit.patient_name),
                    escape_csv(&visit.completed_at),
                    escape_csv(&c.item_name),
                    c.quantity,
                    escape_csv(&c.unit),
                ));
            }
        }

        csv
    }
}

/// Builds daily reports.
pub struct DailyReporter<'a> {
    db: &'a Database,
}

impl<'a> DailyReporter<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    pub fn report(&self, date: NaiveDate, clinic_name: &str) -> DbResult<DailyReport> {
        let day = date.format("%Y-%m-%d").to_string();

        let mut treatment_names: HashMap<String, String> = HashMap::new();
        let mut patient_names: HashMap<String, String> = HashMap::new();
        let mut visits = Vec::new();
        let mut total_treatments = 0;

        for visit in self.db.list_visits_completed_on(&day)? {
            let patient_name = match patient_names.get(&visit.patient_id) {
                Some(name) => name.clone(),
                None => {
                    let name = self
                        .db
                        .get_patient(&visit.patient_id)?
                        .map(|p| p.full_name)
                        .unwrap_or_default();
                    patient_names.insert(visit.patient_id.clone(), name.clone());
                    name
                }
            };

            let mut treatments = Vec::new();
            for record in self.db.list_visit_treatments(&visit.id)? {
                let treatment_name = match treatment_names.get(&record.treatment_id) {
                    Some(name) => name.clone(),
                    None => {
                        let name = self
                            .db
                            .get_treatment(&record.treatment_id)?
                            .map(|t| t.name)
                            .unwrap_or_else(|| record.treatment_id.clone());
                        treatment_names.insert(record.treatment_id.clone(), name.clone());
                        name
                    }
                };
                let sessions_remaining = self
                    .db
                    .get_package(&record.package_id)?
                    .map(|p| p.sessions_remaining);

                treatments.push(ReportTreatment {
                    treatment_name,
                    dose: record.dose_administered,
                    dose_unit: record.dose_unit,
                    package_id: record.package_id,
                    sessions_remaining,
                });
            }

            let mut consumables = Vec::new();
            for record in self.db.list_visit_consumables(&visit.id)? {
                let item = self.db.get_stock_item(&record.stock_item_id)?;
                consumables.push(ReportConsumable {
                    item_name: item
                        .as_ref()
                        .map(|i| i.item_name.clone())
                        .unwrap_or_else(|| record.stock_item_id.clone()),
                    quantity: record.quantity_used,
                    unit: item.map(|i| i.unit().to_string()).unwrap_or_default(),
                });
            }

            total_treatments += treatments.len();
            visits.push(ReportVisit {
                visit_id: visit.id,
                patient_id: visit.patient_id,
                patient_name,
                completed_at: visit.completed_at.unwrap_or_default(),
                doctor_id: visit.doctor_id,
                nurse_id: visit.nurse_id,
                treatments,
                consumables,
            });
        }

        let mut appointments = AppointmentSummary::default();
        for appointment in self.db.list_appointments_on(date)? {
            match appointment.status {
                AppointmentStatus::Scheduled => appointments.scheduled += 1,
                AppointmentStatus::Completed => appointments.completed += 1,
                AppointmentStatus::Cancelled => appointments.cancelled += 1,
                AppointmentStatus::NoShow => appointments.no_show += 1,
            }
        }

        Ok(DailyReport {
            clinic_name: clinic_name.to_string(),
            date: day,
            generated_at: chrono::Utc::now().to_rfc3339(),
            visits,
            appointments,
            total_treatments,
        })
    }
}

/// Escape a string for CSV output.
fn escape_csv(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_report() -> DailyReport {
        DailyReport {
            clinic_name: "Test Clinic".into(),
            date: "2026-03-02".into(),
            generated_at: "2026-03-02T18:00:00+00:00".into(),
            visits: vec![ReportVisit {
                visit_id: "v1".into(),
                patient_id: "p1".into(),
                patient_name: "Doe, Jane".into(),
                completed_at: "2026-03-02T10:00:00+00:00".into(),
                doctor_id: None,
                nurse_id: None,
                treatments: vec![ReportTreatment {
                    treatment_name: "NAD+".into(),
                    dose: "250".into(),
                    dose_unit: "mg".into(),
                    package_id: "pkg1".into(),
                    sessions_remaining: Some(4),
                }],
                consumables: vec![ReportConsumable {
                    item_name: "IV cannula".into(),
                    quantity: 1.0,
                    unit: "pcs".into(),
                }],
            }],
            appointments: AppointmentSummary::default(),
            total_treatments: 1,
        }
    }

    #[test]
    fn test_csv_rows() {
        let csv = make_report().to_csv();
        let lines: Vec<&str> = csv.lines().collect();

        assert_eq!(lines.len(), 3); // Header + treatment + consumable
        assert!(lines[0].starts_with("date,visit_id"));
        assert!(lines[1].contains("\"Doe, Jane\""));
        assert!(lines[1].contains(",treatment,NAD+,250,mg,pkg1,4"));
        assert!(lines[2].contains(",consumable,IV cannula,1,pcs,,"));
    }

    #[test]
    fn test_json() {
        let json = make_report().to_json().unwrap();
        assert!(json.contains("\"clinic_name\": \"Test Clinic\""));
        assert!(json.contains("NAD+"));
    }

    #[test]
    fn test_csv_escaping() {
        assert_eq!(escape_csv("simple"), "simple");
        assert_eq!(escape_csv("with,comma"), "\"with,comma\"");
        assert_eq!(escape_csv("with\"quote"), "\"with\"\"quote\"");
    }

    #[test]
    fn test_empty_day() {
        let db = Database::open_in_memory().unwrap();
        let report = DailyReporter::new(&db)
            .report(NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(), "Test Clinic")
            .unwrap();
        assert!(report.visits.is_empty());
        assert_eq!(report.appointments, AppointmentSummary::default());
        assert_eq!(report.to_csv().lines().count(), 1);
    }
}
