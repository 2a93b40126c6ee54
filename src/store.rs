use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, Trim};
use serde::de::DeserializeOwned;

use crate::{
    error::{Result, RiskError},
    records::{Admission, Billing, Doctor, Patient},
};

/// anything that can hand over fresh copies of the hospital tables
pub trait RecordSource {
    fn patients(&self) -> Result<Vec<Patient>>;
    fn admissions(&self) -> Result<Vec<Admission>>;
    fn billing(&self) -> Result<Vec<Billing>>;
    fn doctors(&self) -> Result<Vec<Doctor>>;
}

/// csv files on disk, one per table
#[derive(Debug, Clone)]
pub struct CsvRecordStore {
    patients_path: PathBuf,
    admissions_path: PathBuf,
    billing_path: PathBuf,
    doctors_path: PathBuf,
}

impl CsvRecordStore {
    pub fn new(
        patients_path: impl Into<PathBuf>,
        admissions_path: impl Into<PathBuf>,
        billing_path: impl Into<PathBuf>,
        doctors_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            patients_path: patients_path.into(),
            admissions_path: admissions_path.into(),
            billing_path: billing_path.into(),
            doctors_path: doctors_path.into(),
        }
    }

    /// the usual layout: `patients.csv`, `admissions.csv`, `billing.csv`, `doctors.csv` in one dir
    pub fn from_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self::new(
            dir.join("patients.csv"),
            dir.join("admissions.csv"),
            dir.join("billing.csv"),
            dir.join("doctors.csv"),
        )
    }
}

impl RecordSource for CsvRecordStore {
    fn patients(&self) -> Result<Vec<Patient>> {
        read_table(&self.patients_path)
    }

    fn admissions(&self) -> Result<Vec<Admission>> {
        read_table(&self.admissions_path)
    }

    fn billing(&self) -> Result<Vec<Billing>> {
        let rows: Vec<Billing> = read_table(&self.billing_path)?;
        for row in &rows {
            row.validate()?;
        }
        Ok(rows)
    }

    fn doctors(&self) -> Result<Vec<Doctor>> {
        read_table(&self.doctors_path)
    }
}

/// tables already in memory - handy for tests and for callers that build records themselves
#[derive(Debug, Clone, Default)]
pub struct HospitalRecords {
    pub patients: Vec<Patient>,
    pub admissions: Vec<Admission>,
    pub billing: Vec<Billing>,
    pub doctors: Vec<Doctor>,
}

impl HospitalRecords {
    /// pull every table out of another source in one go
    pub fn load(source: &dyn RecordSource) -> Result<Self> {
        Ok(Self {
            patients: source.patients()?,
            admissions: source.admissions()?,
            billing: source.billing()?,
            doctors: source.doctors()?,
        })
    }
}

impl RecordSource for HospitalRecords {
    fn patients(&self) -> Result<Vec<Patient>> {
        Ok(self.patients.clone())
    }

    fn admissions(&self) -> Result<Vec<Admission>> {
        Ok(self.admissions.clone())
    }

    fn billing(&self) -> Result<Vec<Billing>> {
        for row in &self.billing {
            row.validate()?;
        }
        Ok(self.billing.clone())
    }

    fn doctors(&self) -> Result<Vec<Doctor>> {
        Ok(self.doctors.clone())
    }
}

fn read_table<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let csv_error = |source: csv::Error| RiskError::Csv {
        path: path.to_path_buf(),
        source,
    };

    let mut reader = ReaderBuilder::new()
        .trim(Trim::All)
        .from_path(path)
        .map_err(csv_error)?;

    let rows = reader
        .deserialize()
        .collect::<std::result::Result<Vec<T>, _>>()
        .map_err(csv_error)?;

    log::debug!("read {} rows from {}", rows.len(), path.display());
    Ok(rows)
}
