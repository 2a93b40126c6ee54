//! indicator encoding, fitted once over the whole table before any split

use std::collections::BTreeSet;

use ndarray::Array2;

use crate::{
    data::ReadmissionData,
    error::{Result, RiskError},
    merge::{MergedObservation, MergedTable},
};

/// numeric columns, in design-matrix order
pub const NUMERIC_FEATURES: [&str; 3] = ["Age", "Chronic_conditions", "Length_of_stay"];

/// categorical fields that get indicator-expanded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategoricalField {
    Gender,
    AdmissionType,
    Department,
    BedType,
    InsuranceCovered,
}

impl CategoricalField {
    /// design-matrix order
    pub const ALL: [CategoricalField; 5] = [
        CategoricalField::Gender,
        CategoricalField::AdmissionType,
        CategoricalField::Department,
        CategoricalField::BedType,
        CategoricalField::InsuranceCovered,
    ];

    pub fn column_name(self) -> &'static str {
        match self {
            CategoricalField::Gender => "Gender",
            CategoricalField::AdmissionType => "Admission_type",
            CategoricalField::Department => "Department",
            CategoricalField::BedType => "Bed_type",
            CategoricalField::InsuranceCovered => "Insurance_covered",
        }
    }

    /// this field's level for a row, `None` when the join had no match
    fn level(self, row: &MergedObservation) -> Option<&str> {
        match self {
            CategoricalField::Gender => row.patient.as_ref().map(|p| p.gender.as_str()),
            CategoricalField::AdmissionType => row.patient.as_ref().map(|p| p.admission_type.as_str()),
            CategoricalField::Department => Some(row.department.as_str()),
            CategoricalField::BedType => Some(row.bed_type.as_str()),
            CategoricalField::InsuranceCovered => row
                .billing
                .as_ref()
                .map(|b| if b.insurance_covered { "Yes" } else { "No" }),
        }
    }
}

/// observed levels for one categorical field
#[derive(Debug, Clone, PartialEq)]
pub struct FieldLevels {
    pub field: CategoricalField,
    /// sorted; `levels[0]` is the dropped reference level
    pub levels: Vec<String>,
}

impl FieldLevels {
    /// levels that get their own indicator column
    pub fn indicator_levels(&self) -> &[String] {
        self.levels.get(1..).unwrap_or(&[])
    }
}

/// the fitted column layout of the design matrix
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureSchema {
    fields: Vec<FieldLevels>,
    feature_names: Vec<String>,
}

impl FeatureSchema {
    /// record every observed level of every categorical field
    pub fn fit(table: &MergedTable) -> Self {
        let fields: Vec<FieldLevels> = CategoricalField::ALL
            .iter()
            .map(|&field| {
                let levels: BTreeSet<&str> = table.iter().filter_map(|row| field.level(row)).collect();
                FieldLevels {
                    field,
                    levels: levels.into_iter().map(str::to_string).collect(),
                }
            })
            .collect();

        for field in &fields {
            if field.levels.len() <= 1 {
                log::warn!(
                    "{} has {} observed level(s) - no indicator columns for it",
                    field.field.column_name(),
                    field.levels.len()
                );
            }
        }

        let mut feature_names: Vec<String> = NUMERIC_FEATURES.iter().map(|s| s.to_string()).collect();
        for field in &fields {
            for level in field.indicator_levels() {
                feature_names.push(format!("{}_{}", field.field.column_name(), level));
            }
        }

        log::info!("feature schema: {} columns", feature_names.len());
        Self { fields, feature_names }
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn n_features(&self) -> usize {
        self.feature_names.len()
    }

    pub fn fields(&self) -> &[FieldLevels] {
        &self.fields
    }

    /// levels for one field
    pub fn levels(&self, field: CategoricalField) -> &[String] {
        self.fields
            .iter()
            .find(|f| f.field == field)
            .map(|f| f.levels.as_slice())
            .unwrap_or(&[])
    }

    /// encode rows against this schema - unseen levels are an error, never a silent new column
    pub fn transform(&self, table: &MergedTable) -> Result<ReadmissionData> {
        let n_rows = table.len();
        let n_cols = self.n_features();
        let mut features = Array2::zeros((n_rows, n_cols));

        for (i, row) in table.iter().enumerate() {
            let patient = row.patient.as_ref().ok_or_else(|| {
                RiskError::data_quality(format!(
                    "admission {} has no patient record - Age and Chronic_conditions are missing",
                    row.admission_id
                ))
            })?;

            features[[i, 0]] = patient.age as f64;
            features[[i, 1]] = patient.chronic_conditions as f64;
            features[[i, 2]] = row.length_of_stay as f64;

            let mut offset = NUMERIC_FEATURES.len();
            for field in &self.fields {
                let indicators = field.indicator_levels();
                if let Some(level) = field.field.level(row) {
                    if !field.levels.iter().any(|known| known == level) {
                        return Err(RiskError::schema_mismatch(format!(
                            "admission {} has {} level {:?} that the schema never saw (known: {:?})",
                            row.admission_id,
                            field.field.column_name(),
                            level,
                            field.levels
                        )));
                    }
                    // reference level (and missing values) stay all-zero
                    if let Some(pos) = indicators.iter().position(|known| known == level) {
                        features[[i, offset + pos]] = 1.0;
                    }
                }
                offset += indicators.len();
            }
        }

        let labels = table.labels();
        let row_ids = table.iter().map(|r| r.admission_id).collect();
        ReadmissionData::with_row_ids(features, labels, self.feature_names.clone(), row_ids)
    }
}

/// fit the schema on the full table and encode it in one go
pub fn build_features(table: &MergedTable) -> Result<(FeatureSchema, ReadmissionData)> {
    let schema = FeatureSchema::fit(table);
    let data = schema.transform(table)?;
    Ok((schema, data))
}
