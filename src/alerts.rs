use std::cmp::Ordering;
use std::fmt;

use crate::merge::{MergedObservation, MergedTable};

/// cutoffs for flagging a readmitted stay
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlertThresholds {
    /// stays strictly longer than this many days
    pub los_days: i64,
    /// patients strictly older than this
    pub age: u32,
    /// at least this many chronic conditions
    pub chronic_conditions: u32,
    /// rows kept in the ranked list
    pub max_listed: usize,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            los_days: 7,
            age: 65,
            chronic_conditions: 2,
            max_listed: 50,
        }
    }
}

impl AlertThresholds {
    fn long_stay(&self, row: &MergedObservation) -> bool {
        row.length_of_stay > self.los_days
    }

    fn elderly(&self, row: &MergedObservation) -> bool {
        row.patient.as_ref().is_some_and(|p| p.age > self.age)
    }

    fn chronic(&self, row: &MergedObservation) -> bool {
        row.patient
            .as_ref()
            .is_some_and(|p| p.chronic_conditions >= self.chronic_conditions)
    }

    /// readmitted and over at least one cutoff
    pub fn is_high_risk(&self, row: &MergedObservation) -> bool {
        row.readmitted && (self.long_stay(row) || self.elderly(row) || self.chronic(row))
    }
}

/// weighted sum: 0.3 per day, 0.2 per year, 5 per chronic condition, 10 if readmitted
pub fn risk_score(length_of_stay: i64, age: u32, chronic_conditions: u32, readmitted: bool) -> f64 {
    0.3 * length_of_stay as f64
        + 0.2 * age as f64
        + 5.0 * chronic_conditions as f64
        + if readmitted { 10.0 } else { 0.0 }
}

/// one flagged stay
#[derive(Debug, Clone, PartialEq)]
pub struct RiskEntry {
    pub admission_id: u64,
    pub patient_id: u64,
    pub age: Option<u32>,
    pub gender: Option<String>,
    pub department: String,
    pub bed_type: String,
    pub length_of_stay: i64,
    pub chronic_conditions: Option<u32>,
    /// `None` when the patient row never matched
    pub risk_score: Option<f64>,
}

impl RiskEntry {
    fn from_row(row: &MergedObservation) -> Self {
        let patient = row.patient.as_ref();
        Self {
            admission_id: row.admission_id,
            patient_id: row.patient_id,
            age: patient.map(|p| p.age),
            gender: patient.map(|p| p.gender.clone()),
            department: row.department.clone(),
            bed_type: row.bed_type.clone(),
            length_of_stay: row.length_of_stay,
            chronic_conditions: patient.map(|p| p.chronic_conditions),
            risk_score: patient.map(|p| risk_score(row.length_of_stay, p.age, p.chronic_conditions, row.readmitted)),
        }
    }
}

/// readmitted stays that need a second look, plus the headline counts
#[derive(Debug, Clone, PartialEq)]
pub struct HighRiskAlerts {
    pub thresholds: AlertThresholds,
    /// all flagged stays, before the list is cut
    pub high_risk: usize,
    pub extended_stay: usize,
    pub elderly: usize,
    pub icu: usize,
    /// highest score first, at most `max_listed` rows
    pub patients: Vec<RiskEntry>,
}

impl HighRiskAlerts {
    pub fn compute(table: &MergedTable, thresholds: AlertThresholds) -> Self {
        let mut extended_stay = 0;
        let mut elderly = 0;
        let mut icu = 0;
        let mut patients = Vec::new();

        for row in table.iter() {
            if thresholds.long_stay(row) {
                extended_stay += 1;
            }
            if thresholds.elderly(row) {
                elderly += 1;
            }
            if row.bed_type == "ICU" {
                icu += 1;
            }
            if thresholds.is_high_risk(row) {
                patients.push(RiskEntry::from_row(row));
            }
        }

        let high_risk = patients.len();
        // stable, so equal scores keep table order; unscored rows go last
        patients.sort_by(|a, b| match (a.risk_score, b.risk_score) {
            (Some(x), Some(y)) => y.total_cmp(&x),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        });
        patients.truncate(thresholds.max_listed);

        log::info!(
            "{} high-risk stays out of {} ({} listed)",
            high_risk,
            table.len(),
            patients.len()
        );

        Self {
            thresholds,
            high_risk,
            extended_stay,
            elderly,
            icu,
            patients,
        }
    }

    pub fn print(&self) {
        print!("{self}");
    }
}

fn or_na<T: ToString>(value: Option<T>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| v.to_string())
}

impl fmt::Display for HighRiskAlerts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let t = &self.thresholds;
        writeln!(f, "High-Risk Alerts")?;
        writeln!(f, "================")?;
        writeln!(f, "{:<32} {:>8}", "High-risk readmissions", self.high_risk)?;
        writeln!(f, "{:<32} {:>8}", format!("Stays over {} days", t.los_days), self.extended_stay)?;
        writeln!(f, "{:<32} {:>8}", format!("Patients over {}", t.age), self.elderly)?;
        writeln!(f, "{:<32} {:>8}", "ICU stays", self.icu)?;
        writeln!(f)?;

        writeln!(
            f,
            "{:>8} {:>5} {:<8} {:<16} {:<10} {:>5} {:>8} {:>8}",
            "patient", "age", "gender", "department", "bed", "los", "chronic", "score"
        )?;
        writeln!(f, "{}", "-".repeat(75))?;
        for entry in &self.patients {
            writeln!(
                f,
                "{:>8} {:>5} {:<8} {:<16} {:<10} {:>5} {:>8} {:>8}",
                entry.patient_id,
                or_na(entry.age),
                entry.gender.as_deref().unwrap_or("n/a"),
                entry.department,
                entry.bed_type,
                entry.length_of_stay,
                or_na(entry.chronic_conditions),
                or_na(entry.risk_score.map(|s| format!("{s:.1}")))
            )?;
        }
        Ok(())
    }
}
