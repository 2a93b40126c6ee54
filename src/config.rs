use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{
    error::{Result, RiskError},
    forest::RandomForest,
    merge::InvalidStayPolicy,
    model::LogisticModel,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LogisticConfig {
    pub max_iterations: usize,
    pub tolerance: f64,
    pub l2_penalty: f64,
    pub fit_intercept: bool,
}

impl Default for LogisticConfig {
    fn default() -> Self {
        Self {
            max_iterations: 1000,
            tolerance: 1e-6,
            l2_penalty: 1.0,
            fit_intercept: true,
        }
    }
}

impl LogisticConfig {
    pub fn build(&self) -> LogisticModel {
        LogisticModel::new()
            .with_max_iterations(self.max_iterations)
            .with_tolerance(self.tolerance)
            .with_l2_penalty(self.l2_penalty)
            .with_intercept(self.fit_intercept)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ForestConfig {
    pub n_trees: usize,
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// features tried per split, sqrt of the column count when unset
    pub max_features: Option<usize>,
    pub bootstrap: bool,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            n_trees: 2000,
            max_depth: 8,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            bootstrap: true,
        }
    }
}

impl ForestConfig {
    pub fn build(&self, seed: u64, parallel: bool) -> RandomForest {
        RandomForest::new()
            .with_n_trees(self.n_trees)
            .with_max_depth(self.max_depth)
            .with_min_samples_split(self.min_samples_split)
            .with_min_samples_leaf(self.min_samples_leaf)
            .with_max_features(self.max_features)
            .with_bootstrap(self.bootstrap)
            .with_seed(seed)
            .with_parallel(parallel)
    }
}

/// everything one pipeline run needs
///
/// every field has a default, so an empty file is a valid config:
///
/// ```toml
/// data_dir = "data"
/// test_fraction = 0.2
/// seed = 42
/// invalid_stays = "drop"
///
/// [logistic]
/// l2_penalty = 1.0
/// fit_intercept = true
///
/// [forest]
/// n_trees = 2000
/// max_depth = 8
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// directory holding patients.csv, admissions.csv, billing.csv, doctors.csv
    pub data_dir: PathBuf,
    pub test_fraction: f64,
    pub seed: u64,
    pub invalid_stays: InvalidStayPolicy,
    /// train both models at once and grow trees on the rayon pool
    pub parallel: bool,
    pub logistic: LogisticConfig,
    pub forest: ForestConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            test_fraction: 0.2,
            seed: 42,
            invalid_stays: InvalidStayPolicy::default(),
            parallel: true,
            logistic: LogisticConfig::default(),
            forest: ForestConfig::default(),
        }
    }
}

impl PipelineConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        log::debug!("loaded config from {}", path.display());
        Self::from_toml_str(&text)
    }

    /// the effective config, every field spelled out
    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string(self)?)
    }

    /// reject values no run could succeed with
    pub fn validate(&self) -> Result<()> {
        if !(self.test_fraction > 0.0 && self.test_fraction < 1.0) {
            return Err(RiskError::invalid_parameter("test_fraction", self.test_fraction.to_string()));
        }

        let logistic = &self.logistic;
        if logistic.max_iterations == 0 {
            return Err(RiskError::invalid_parameter("logistic.max_iterations", "0"));
        }
        if !(logistic.tolerance > 0.0 && logistic.tolerance.is_finite()) {
            return Err(RiskError::invalid_parameter("logistic.tolerance", logistic.tolerance.to_string()));
        }
        if !(logistic.l2_penalty >= 0.0 && logistic.l2_penalty.is_finite()) {
            return Err(RiskError::invalid_parameter("logistic.l2_penalty", logistic.l2_penalty.to_string()));
        }

        let forest = &self.forest;
        if forest.n_trees == 0 {
            return Err(RiskError::invalid_parameter("forest.n_trees", "0"));
        }
        if forest.max_depth == 0 {
            return Err(RiskError::invalid_parameter("forest.max_depth", "0"));
        }
        if forest.min_samples_split < 2 {
            return Err(RiskError::invalid_parameter(
                "forest.min_samples_split",
                forest.min_samples_split.to_string(),
            ));
        }
        if forest.min_samples_leaf == 0 {
            return Err(RiskError::invalid_parameter("forest.min_samples_leaf", "0"));
        }
        if forest.max_features == Some(0) {
            return Err(RiskError::invalid_parameter("forest.max_features", "0"));
        }

        Ok(())
    }
}
