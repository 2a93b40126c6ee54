use std::collections::{HashMap, HashSet};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::{
    error::{Result, RiskError},
    records::{Admission, Billing, Patient},
};

/// what to do w/ stays that end before they start
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvalidStayPolicy {
    /// filter them out before anything else looks at the table
    #[default]
    Drop,
    /// fail the run
    Reject,
}

/// one admission w/ whatever patient & billing data matched
#[derive(Debug, Clone, PartialEq)]
pub struct MergedObservation {
    pub admission_id: u64,
    pub patient_id: u64,
    pub admitted_at: NaiveDateTime,
    pub discharged_at: NaiveDateTime,
    pub department: String,
    pub bed_type: String,
    pub readmitted: bool,
    /// whole days, never negative for a retained row
    pub length_of_stay: i64,
    pub patient: Option<PatientFields>,
    pub billing: Option<BillingFields>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PatientFields {
    pub age: u32,
    pub gender: String,
    pub chronic_conditions: u32,
    pub admission_type: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BillingFields {
    pub total_charges: f64,
    pub insurance_covered: bool,
    pub claim_status: String,
}

/// the denormalized observation table, one row per retained admission
#[derive(Debug, Clone, Default)]
pub struct MergedTable {
    rows: Vec<MergedObservation>,
    dropped_invalid: usize,
    unmatched_patients: usize,
    unmatched_billing: usize,
}

impl MergedTable {
    /// build a table straight from rows (no join, no filtering)
    pub fn from_rows(rows: Vec<MergedObservation>) -> Result<Self> {
        if let Some(row) = rows.iter().find(|r| r.length_of_stay < 0) {
            return Err(RiskError::data_quality(format!(
                "admission {} has negative length of stay ({} days)",
                row.admission_id, row.length_of_stay
            )));
        }
        let unmatched_patients = rows.iter().filter(|r| r.patient.is_none()).count();
        let unmatched_billing = rows.iter().filter(|r| r.billing.is_none()).count();
        Ok(Self {
            rows,
            dropped_invalid: 0,
            unmatched_patients,
            unmatched_billing,
        })
    }

    pub fn rows(&self) -> &[MergedObservation] {
        &self.rows
    }

    pub fn iter(&self) -> impl Iterator<Item = &MergedObservation> {
        self.rows.iter()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// rows filtered out for discharge-before-admission
    pub fn dropped_invalid(&self) -> usize {
        self.dropped_invalid
    }

    /// rows whose patient id had no match
    pub fn unmatched_patients(&self) -> usize {
        self.unmatched_patients
    }

    /// rows with no billing record
    pub fn unmatched_billing(&self) -> usize {
        self.unmatched_billing
    }

    /// the readmission flags in row order
    pub fn labels(&self) -> Vec<bool> {
        self.rows.iter().map(|r| r.readmitted).collect()
    }
}

/// left-join admissions to patients (on patient id) and billing (on admission id)
pub fn merge_tables(
    admissions: &[Admission],
    patients: &[Patient],
    billing: &[Billing],
    policy: InvalidStayPolicy,
) -> Result<MergedTable> {
    let patients_by_id = index_unique(patients, |p| p.id, "patients", "Patient_ID")?;
    let billing_by_admission = index_unique(billing, |b| b.admission_id, "billing", "Admission_ID")?;

    let mut seen_admissions = HashSet::with_capacity(admissions.len());
    let mut rows = Vec::with_capacity(admissions.len());
    let mut dropped_invalid = 0;

    for admission in admissions {
        if !seen_admissions.insert(admission.id) {
            return Err(RiskError::data_quality(format!(
                "admissions has duplicate Admission_ID {}",
                admission.id
            )));
        }

        if !admission.is_valid_stay() {
            match policy {
                InvalidStayPolicy::Drop => {
                    dropped_invalid += 1;
                    continue;
                }
                InvalidStayPolicy::Reject => {
                    return Err(RiskError::data_quality(format!(
                        "admission {} is discharged ({}) before it was admitted ({})",
                        admission.id, admission.discharged_at, admission.admitted_at
                    )));
                }
            }
        }

        let patient = patients_by_id.get(&admission.patient_id).map(|p| PatientFields {
            age: p.age,
            gender: p.gender.clone(),
            chronic_conditions: p.chronic_conditions,
            admission_type: p.admission_type.clone(),
        });
        let billing = billing_by_admission.get(&admission.id).map(|b| BillingFields {
            total_charges: b.total_charges,
            insurance_covered: b.insurance_covered,
            claim_status: b.claim_status.clone(),
        });

        rows.push(MergedObservation {
            admission_id: admission.id,
            patient_id: admission.patient_id,
            admitted_at: admission.admitted_at,
            discharged_at: admission.discharged_at,
            department: admission.department.clone(),
            bed_type: admission.bed_type.clone(),
            readmitted: admission.readmitted,
            length_of_stay: admission.length_of_stay(),
            patient,
            billing,
        });
    }

    if dropped_invalid > 0 {
        log::warn!(
            "dropped {} of {} admissions discharged before admission",
            dropped_invalid,
            admissions.len()
        );
    }

    let mut table = MergedTable::from_rows(rows)?;
    table.dropped_invalid = dropped_invalid;

    if table.unmatched_patients > 0 {
        log::warn!("{} admissions have no matching patient", table.unmatched_patients);
    }
    if table.unmatched_billing > 0 {
        log::warn!("{} admissions have no billing record", table.unmatched_billing);
    }
    log::info!(
        "merged {} admissions w/ {} patients and {} billing rows -> {} rows",
        admissions.len(),
        patients.len(),
        billing.len(),
        table.len()
    );

    Ok(table)
}

/// key -> row, failing on a repeated key since that would fan out the join
fn index_unique<'a, T>(
    rows: &'a [T],
    key: impl Fn(&T) -> u64,
    table: &str,
    column: &str,
) -> Result<HashMap<u64, &'a T>> {
    let mut index = HashMap::with_capacity(rows.len());
    for row in rows {
        let id = key(row);
        if index.insert(id, row).is_some() {
            return Err(RiskError::data_quality(format!(
                "{table} has duplicate {column} {id}"
            )));
        }
    }
    Ok(index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::parse_timestamp;

    fn patient(id: u64) -> Patient {
        Patient {
            id,
            age: 40 + id as u32,
            gender: "Female".to_string(),
            chronic_conditions: 1,
            admission_type: "OPD".to_string(),
        }
    }

    fn admission(id: u64, patient_id: u64, admitted: &str, discharged: &str) -> Admission {
        Admission {
            id,
            patient_id,
            admitted_at: parse_timestamp(admitted).unwrap(),
            discharged_at: parse_timestamp(discharged).unwrap(),
            department: "Cardiology".to_string(),
            bed_type: "General".to_string(),
            readmitted: id % 2 == 0,
        }
    }

    fn bill(admission_id: u64) -> Billing {
        Billing {
            admission_id,
            total_charges: 1000.0,
            insurance_covered: true,
            claim_status: "Approved".to_string(),
        }
    }

    #[test]
    fn test_left_join_keeps_every_admission() {
        let patients = vec![patient(1)];
        let admissions = vec![
            admission(1, 1, "2025-01-01", "2025-01-05"),
            admission(2, 99, "2025-01-02", "2025-01-03"),
        ];
        let billing = vec![bill(1)];

        let table = merge_tables(&admissions, &patients, &billing, InvalidStayPolicy::Drop).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.rows()[0].length_of_stay, 4);
        assert!(table.rows()[0].patient.is_some());
        assert!(table.rows()[1].patient.is_none());
        assert!(table.rows()[1].billing.is_none());
        assert_eq!(table.unmatched_patients(), 1);
        assert_eq!(table.unmatched_billing(), 1);
    }

    #[test]
    fn test_same_day_discharge_is_kept() {
        let admissions = vec![admission(1, 1, "2025-03-01", "2025-03-01")];
        let table = merge_tables(&admissions, &[patient(1)], &[bill(1)], InvalidStayPolicy::Drop).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.rows()[0].length_of_stay, 0);
        assert_eq!(table.dropped_invalid(), 0);
    }

    #[test]
    fn test_invalid_stays_dropped() {
        let admissions = vec![
            admission(1, 1, "2025-03-05", "2025-03-01"),
            admission(2, 1, "2025-03-01", "2025-03-02"),
        ];
        let table = merge_tables(&admissions, &[patient(1)], &[], InvalidStayPolicy::Drop).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.dropped_invalid(), 1);
        assert!(table.iter().all(|r| r.length_of_stay >= 0));
    }

    #[test]
    fn test_invalid_stays_rejected() {
        let admissions = vec![admission(1, 1, "2025-03-05", "2025-03-01")];
        let result = merge_tables(&admissions, &[patient(1)], &[], InvalidStayPolicy::Reject);
        assert!(matches!(result, Err(RiskError::DataQuality { .. })));
    }

    #[test]
    fn test_duplicate_keys_rejected() {
        let admissions = vec![admission(1, 1, "2025-01-01", "2025-01-02")];

        let dup_patients = vec![patient(1), patient(1)];
        assert!(merge_tables(&admissions, &dup_patients, &[], InvalidStayPolicy::Drop).is_err());

        let dup_billing = vec![bill(1), bill(1)];
        assert!(merge_tables(&admissions, &[patient(1)], &dup_billing, InvalidStayPolicy::Drop).is_err());

        let dup_admissions = vec![
            admission(1, 1, "2025-01-01", "2025-01-02"),
            admission(1, 1, "2025-02-01", "2025-02-02"),
        ];
        assert!(merge_tables(&dup_admissions, &[patient(1)], &[], InvalidStayPolicy::Drop).is_err());
    }

    #[test]
    fn test_from_rows_rejects_negative_stay() {
        let admissions = vec![admission(1, 1, "2025-01-01", "2025-01-02")];
        let table = merge_tables(&admissions, &[patient(1)], &[], InvalidStayPolicy::Drop).unwrap();
        let mut rows = table.rows().to_vec();
        rows[0].length_of_stay = -2;
        assert!(MergedTable::from_rows(rows).is_err());
    }
}
