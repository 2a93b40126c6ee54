use ndarray::{Array2, ArrayView2, Axis};
use crate::{
    error::{Result, RiskError},
    split::{SplitIndices, stratified_split},
};

/// labelled design matrix - features, readmission flags, and the column schema
#[derive(Debug, Clone)]
pub struct ReadmissionData {
    features: Array2<f64>,       // n_samples x n_features
    labels: Vec<bool>,           // true = readmitted within 30 days
    feature_names: Vec<String>,  // one per column, fixed by the schema
    row_ids: Vec<u64>,           // admission id per row
}

impl ReadmissionData {
    /// make new data from a feature matrix, labels, and column names
    pub fn new(
        features: Array2<f64>,
        labels: Vec<bool>,
        feature_names: Vec<String>,
    ) -> Result<Self> {
        let n_samples = labels.len();
        let row_ids = (1..=n_samples as u64).collect();
        Self::with_row_ids(features, labels, feature_names, row_ids)
    }

    /// same as `new` but w/ explicit admission ids per row
    pub fn with_row_ids(
        features: Array2<f64>,
        labels: Vec<bool>,
        feature_names: Vec<String>,
        row_ids: Vec<u64>,
    ) -> Result<Self> {
        let n_samples = labels.len();

        if features.nrows() != n_samples {
            return Err(RiskError::invalid_dimensions(
                format!("feature rows ({}) != labels len ({})", features.nrows(), n_samples)
            ));
        }

        if features.ncols() != feature_names.len() {
            return Err(RiskError::invalid_dimensions(
                format!("feature columns ({}) != feature names ({})", features.ncols(), feature_names.len())
            ));
        }

        if row_ids.len() != n_samples {
            return Err(RiskError::invalid_dimensions(
                format!("row ids len ({}) != labels len ({})", row_ids.len(), n_samples)
            ));
        }

        if features.iter().any(|v| !v.is_finite()) {
            return Err(RiskError::numerical_error("features must be finite"));
        }

        Ok(Self {
            features,
            labels,
            feature_names,
            row_ids,
        })
    }

    /// how many admissions
    pub fn n_samples(&self) -> usize {
        self.labels.len()
    }

    /// how many design matrix columns
    pub fn n_features(&self) -> usize {
        self.features.ncols()
    }

    pub fn features(&self) -> ArrayView2<'_, f64> {
        self.features.view()
    }

    pub fn labels(&self) -> &[bool] {
        &self.labels
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn row_ids(&self) -> &[u64] {
        &self.row_ids
    }

    /// number of readmitted rows
    pub fn n_positive(&self) -> usize {
        self.labels.iter().filter(|&&y| y).count()
    }

    /// share of readmitted rows, 0 for empty data
    pub fn positive_rate(&self) -> f64 {
        if self.n_samples() == 0 {
            return 0.0;
        }
        self.n_positive() as f64 / self.n_samples() as f64
    }

    /// grab a subset of rows by index, keeping the column schema
    pub fn subset(&self, indices: &[usize]) -> Result<Self> {
        if indices.iter().any(|&i| i >= self.n_samples()) {
            return Err(RiskError::invalid_dimensions(
                "subset index out of bounds"
            ));
        }

        let features = self.features.select(Axis(0), indices);
        let labels = indices.iter().map(|&i| self.labels[i]).collect();
        let row_ids = indices.iter().map(|&i| self.row_ids[i]).collect();

        Self::with_row_ids(features, labels, self.feature_names.clone(), row_ids)
    }

    /// stratified train/holdout split, returns (train, holdout)
    pub fn split(&self, test_fraction: f64, seed: u64) -> Result<(Self, Self)> {
        let SplitIndices { train, test } = stratified_split(&self.labels, test_fraction, seed)?;
        Ok((self.subset(&train)?, self.subset(&test)?))
    }

    /// same features, different labels - used for label-permutation checks
    pub fn with_labels(&self, labels: Vec<bool>) -> Result<Self> {
        Self::with_row_ids(
            self.features.clone(),
            labels,
            self.feature_names.clone(),
            self.row_ids.clone(),
        )
    }
}
