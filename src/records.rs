use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer, de};

use crate::error::{Result, RiskError};

const SECONDS_PER_DAY: i64 = 86_400;

/// one synthetic patient - immutable once created
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Patient {
    #[serde(rename = "Patient_ID")]
    pub id: u64,
    #[serde(rename = "Age")]
    pub age: u32,
    #[serde(rename = "Gender")]
    pub gender: String,
    #[serde(rename = "Chronic_conditions")]
    pub chronic_conditions: u32,
    #[serde(rename = "Admission_type")]
    pub admission_type: String,
}

/// a single hospital stay
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Admission {
    #[serde(rename = "Admission_ID")]
    pub id: u64,
    #[serde(rename = "Patient_ID")]
    pub patient_id: u64,
    #[serde(rename = "Admission_date", deserialize_with = "timestamp_field")]
    pub admitted_at: NaiveDateTime,
    #[serde(rename = "Discharge_date", deserialize_with = "timestamp_field")]
    pub discharged_at: NaiveDateTime,
    #[serde(rename = "Department")]
    pub department: String,
    #[serde(rename = "Bed_type")]
    pub bed_type: String,
    #[serde(rename = "readmitted_30_days", deserialize_with = "flag_field")]
    pub readmitted: bool,
}

impl Admission {
    /// discharge minus admission in whole days (floored, so it can go negative on bad rows)
    pub fn length_of_stay(&self) -> i64 {
        length_of_stay_days(self.admitted_at, self.discharged_at)
    }

    /// discharge on or after admission
    pub fn is_valid_stay(&self) -> bool {
        self.discharged_at >= self.admitted_at
    }
}

/// billing row - one per admission
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Billing {
    #[serde(rename = "Admission_ID")]
    pub admission_id: u64,
    #[serde(rename = "Total_charges")]
    pub total_charges: f64,
    #[serde(rename = "Insurance_covered", deserialize_with = "flag_field")]
    pub insurance_covered: bool,
    #[serde(rename = "Claim_status")]
    pub claim_status: String,
}

impl Billing {
    /// charges have to be positive & finite
    pub fn validate(&self) -> Result<()> {
        if !self.total_charges.is_finite() || self.total_charges <= 0.0 {
            return Err(RiskError::invalid_record(
                "billing",
                "Total_charges",
                self.total_charges.to_string(),
                format!("admission {} needs positive charges", self.admission_id),
            ));
        }
        Ok(())
    }
}

/// doctor roster row, only the kpi report reads these
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Doctor {
    #[serde(rename = "Doctor_ID")]
    pub id: u64,
    #[serde(rename = "Department")]
    pub department: String,
    #[serde(rename = "Patients_handled")]
    pub patients_handled: u32,
    /// minutes
    #[serde(rename = "Avg_consult_time")]
    pub avg_consult_time: f64,
}

/// whole days between two timestamps, floored toward negative infinity
pub fn length_of_stay_days(admitted_at: NaiveDateTime, discharged_at: NaiveDateTime) -> i64 {
    let seconds = discharged_at
        .signed_duration_since(admitted_at)
        .num_seconds();
    seconds.div_euclid(SECONDS_PER_DAY)
}

/// parse an iso date or datetime - `2025-01-01`, `2025-01-01 08:30:00`, `2025-01-01T08:30:00.5`
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M"] {
        if let Ok(ts) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(ts);
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
}

/// parse a yes/no style flag - `1`/`0`, `Yes`/`No`, `true`/`false`
pub fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "yes" | "y" | "true" => Some(true),
        "0" | "no" | "n" | "false" => Some(false),
        _ => None,
    }
}

fn timestamp_field<'de, D>(deserializer: D) -> std::result::Result<NaiveDateTime, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw)
        .ok_or_else(|| de::Error::custom(format!("not an iso date: {raw:?}")))
}

fn flag_field<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_flag(&raw).ok_or_else(|| de::Error::custom(format!("not a 0/1 or yes/no flag: {raw:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(raw: &str) -> NaiveDateTime {
        parse_timestamp(raw).unwrap()
    }

    #[test]
    fn test_parse_timestamp_formats() {
        assert_eq!(ts("2025-01-01"), ts("2025-01-01 00:00:00"));
        assert_eq!(ts("2025-03-04T10:15:00"), ts("2025-03-04 10:15:00"));
        assert!(parse_timestamp("2025-03-04 10:15:00.250").is_some());
        assert!(parse_timestamp("04/03/2025").is_none());
        assert!(parse_timestamp("").is_none());
    }

    #[test]
    fn test_length_of_stay() {
        assert_eq!(length_of_stay_days(ts("2025-01-01"), ts("2025-01-08")), 7);
        // same day discharge is a zero-length stay, not an error
        assert_eq!(length_of_stay_days(ts("2025-01-01"), ts("2025-01-01")), 0);
        // partial days floor
        assert_eq!(length_of_stay_days(ts("2025-01-01 08:00:00"), ts("2025-01-02 07:00:00")), 0);
        assert_eq!(length_of_stay_days(ts("2025-01-02"), ts("2025-01-01 12:00:00")), -1);
    }

    #[test]
    fn test_parse_flag() {
        assert_eq!(parse_flag("Yes"), Some(true));
        assert_eq!(parse_flag(" no "), Some(false));
        assert_eq!(parse_flag("1"), Some(true));
        assert_eq!(parse_flag("0"), Some(false));
        assert_eq!(parse_flag("maybe"), None);
    }

    #[test]
    fn test_billing_validation() {
        let mut bill = Billing {
            admission_id: 1,
            total_charges: 1200.0,
            insurance_covered: true,
            claim_status: "Approved".to_string(),
        };
        assert!(bill.validate().is_ok());

        bill.total_charges = 0.0;
        assert!(bill.validate().is_err());
        bill.total_charges = f64::NAN;
        assert!(bill.validate().is_err());
    }
}
