use std::fmt;

use ndarray::{Array1, ArrayView1, ArrayView2};
use crate::{
    data::ReadmissionData,
    error::{Result, RiskError},
    optimization::{LogisticOptimizer, OptimizationConfig, sigmoid},
};

/// a binary readmission classifier fitted on one column schema
///
/// `predict_proba`/`predict` check the input's feature names against the ones
/// seen at fit time, so a holdout encoded w/ a different schema fails loudly
/// instead of lining coefficients up with the wrong columns.
pub trait Classifier: Send + Sync {
    /// display name for reports
    fn name(&self) -> &str;

    /// fit on a training partition
    fn fit(&mut self, data: &ReadmissionData) -> Result<()>;

    fn is_fitted(&self) -> bool;

    /// feature names seen at fit time
    fn feature_names(&self) -> Option<&[String]>;

    /// class-1 probability per row of a raw matrix (column count is checked)
    fn predict_proba_matrix(&self, features: ArrayView2<f64>) -> Result<Array1<f64>>;

    /// interpretability table, sorted descending
    fn feature_ranking(&self) -> Result<FeatureRanking>;

    /// class-1 probability per row
    fn predict_proba(&self, data: &ReadmissionData) -> Result<Array1<f64>> {
        check_schema(self.feature_names(), data.feature_names())?;
        self.predict_proba_matrix(data.features())
    }

    /// hard predictions, readmitted when p > 0.5
    fn predict(&self, data: &ReadmissionData) -> Result<Array1<bool>> {
        Ok(self.predict_proba(data)?.mapv(|p| p > 0.5))
    }
}

/// make sure prediction columns are the exact columns the model was fit on
pub fn check_schema(fitted: Option<&[String]>, incoming: &[String]) -> Result<()> {
    let fitted = fitted.ok_or(RiskError::ModelNotFitted)?;

    if fitted.len() != incoming.len() {
        return Err(RiskError::schema_mismatch(format!(
            "model was fit on {} columns, got {}",
            fitted.len(),
            incoming.len()
        )));
    }

    if let Some((i, (want, got))) = fitted
        .iter()
        .zip(incoming.iter())
        .enumerate()
        .find(|(_, (want, got))| want != got)
    {
        return Err(RiskError::schema_mismatch(format!(
            "column {i} is {got:?} but the model was fit with {want:?} there"
        )));
    }

    Ok(())
}

/// what the ranking values mean
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RankingKind {
    Coefficient,
    Importance,
}

/// (feature, value) pairs sorted by value, largest first
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRanking {
    pub kind: RankingKind,
    pub entries: Vec<(String, f64)>,
}

impl FeatureRanking {
    /// pair names w/ values and sort descending (stable, so ties keep column order)
    pub fn new(kind: RankingKind, names: &[String], values: ArrayView1<f64>) -> Result<Self> {
        if names.len() != values.len() {
            return Err(RiskError::invalid_dimensions(format!(
                "{} feature names for {} values",
                names.len(),
                values.len()
            )));
        }

        let mut entries: Vec<(String, f64)> = names.iter().cloned().zip(values.iter().copied()).collect();
        entries.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        Ok(Self { kind, entries })
    }

    pub fn top(&self, n: usize) -> &[(String, f64)] {
        &self.entries[..n.min(self.entries.len())]
    }
}

impl fmt::Display for FeatureRanking {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let header = match self.kind {
            RankingKind::Coefficient => "coefficient",
            RankingKind::Importance => "importance",
        };
        writeln!(f, "{:<32} {:>12}", "feature", header)?;
        writeln!(f, "{:-<45}", "")?;
        for (name, value) in &self.entries {
            writeln!(f, "{:<32} {:>12.6}", name, value)?;
        }
        Ok(())
    }
}

/// how the last fit went
#[derive(Debug, Clone, PartialEq)]
pub struct FitDiagnostics {
    pub iterations: usize,
    pub converged: bool,
    pub objective: f64,
}

/// L2-regularized logistic regression
#[derive(Debug, Clone)]
pub struct LogisticModel {
    coefficients: Option<Array1<f64>>,  // fitted weights, one per column
    intercept: f64,                     // unpenalized bias
    l2_penalty: f64,                    // ridge penalty
    max_iterations: usize,              // newton step budget
    tolerance: f64,                     // convergence threshold
    fit_intercept: bool,
    feature_names: Option<Vec<String>>, // schema seen at fit time
    diagnostics: Option<FitDiagnostics>,
}

impl Default for LogisticModel {
    fn default() -> Self {
        Self {
            coefficients: None,
            intercept: 0.0,
            l2_penalty: 1.0,
            max_iterations: 1000,
            tolerance: 1e-6,
            fit_intercept: true,
            feature_names: None,
            diagnostics: None,
        }
    }
}

impl LogisticModel {
    /// new logistic model w/ defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// ridge penalty on the weights - 1.0 matches the usual C = 1 setup
    pub fn with_l2_penalty(mut self, penalty: f64) -> Self {
        self.l2_penalty = penalty.max(0.0);
        self
    }

    /// max newton iterations before giving up (w/ a warning)
    pub fn with_max_iterations(mut self, max_iter: usize) -> Self {
        self.max_iterations = max_iter;
        self
    }

    /// how close is close enough for convergence
    pub fn with_tolerance(mut self, tol: f64) -> Self {
        self.tolerance = tol;
        self
    }

    /// `false` pins the bias at zero
    pub fn with_intercept(mut self, fit_intercept: bool) -> Self {
        self.fit_intercept = fit_intercept;
        self
    }

    /// get the fitted coefficients
    pub fn coefficients(&self) -> Result<ArrayView1<'_, f64>> {
        match &self.coefficients {
            Some(coefs) => Ok(coefs.view()),
            None => Err(RiskError::ModelNotFitted),
        }
    }

    pub fn intercept(&self) -> Result<f64> {
        self.coefficients()?;
        Ok(self.intercept)
    }

    /// iteration count & convergence flag from the last fit
    pub fn diagnostics(&self) -> Option<&FitDiagnostics> {
        self.diagnostics.as_ref()
    }

    /// log-odds per row
    pub fn decision_function(&self, features: ArrayView2<f64>) -> Result<Array1<f64>> {
        let coefs = self.coefficients()?;

        if features.ncols() != coefs.len() {
            return Err(RiskError::invalid_dimensions(
                format!("feature count mismatch: expected {}, got {}",
                       coefs.len(), features.ncols())
            ));
        }

        Ok(features.dot(&coefs) + self.intercept)
    }

    /// get a nice summary of the fitted model
    pub fn summary(&self) -> Result<LogisticModelSummary> {
        let coefs = self.coefficients()?.to_owned();
        let odds_ratios = coefs.mapv(f64::exp);

        Ok(LogisticModelSummary {
            coefficients: coefs,
            odds_ratios,
            intercept: self.intercept,
            l2_penalty: self.l2_penalty,
            feature_names: self.feature_names.clone(),
            diagnostics: self.diagnostics.clone(),
        })
    }

    pub fn l2_penalty(&self) -> f64 {
        self.l2_penalty
    }
}

impl Classifier for LogisticModel {
    fn name(&self) -> &str {
        "Logistic Regression"
    }

    fn fit(&mut self, data: &ReadmissionData) -> Result<()> {
        let config = OptimizationConfig {
            l2_penalty: self.l2_penalty,
            max_iterations: self.max_iterations,
            tolerance: self.tolerance,
            fit_intercept: self.fit_intercept,
        };

        let optimizer = LogisticOptimizer::new(config);
        let fit = optimizer.optimize(data.features(), data.labels())?;

        log::info!(
            "logistic regression: {} iterations, converged = {}, objective {:.4}",
            fit.iterations,
            fit.converged,
            fit.objective
        );

        self.coefficients = Some(fit.coefficients);
        self.intercept = fit.intercept;
        self.feature_names = Some(data.feature_names().to_vec());
        self.diagnostics = Some(FitDiagnostics {
            iterations: fit.iterations,
            converged: fit.converged,
            objective: fit.objective,
        });

        Ok(())
    }

    fn is_fitted(&self) -> bool {
        self.coefficients.is_some()
    }

    fn feature_names(&self) -> Option<&[String]> {
        self.feature_names.as_deref()
    }

    fn predict_proba_matrix(&self, features: ArrayView2<f64>) -> Result<Array1<f64>> {
        Ok(self.decision_function(features)?.mapv(sigmoid))
    }

    fn feature_ranking(&self) -> Result<FeatureRanking> {
        let coefs = self.coefficients()?;
        let names = self.feature_names.as_deref().ok_or(RiskError::ModelNotFitted)?;
        FeatureRanking::new(RankingKind::Coefficient, names, coefs)
    }
}

/// nice summary of what the model learned
#[derive(Debug, Clone)]
pub struct LogisticModelSummary {
    pub coefficients: Array1<f64>,   // the weights
    pub odds_ratios: Array1<f64>,    // exp(weights)
    pub intercept: f64,
    pub l2_penalty: f64,
    pub feature_names: Option<Vec<String>>,
    pub diagnostics: Option<FitDiagnostics>,
}

impl LogisticModelSummary {
    /// print out what we learned
    pub fn print(&self) {
        print!("{self}");
    }
}

impl fmt::Display for LogisticModelSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "logistic regression summary")?;
        writeln!(f, "===========================")?;
        writeln!(f, "l2 penalty: {:.6}", self.l2_penalty)?;
        writeln!(f, "intercept:  {:.6}", self.intercept)?;
        if let Some(diag) = &self.diagnostics {
            writeln!(f, "iterations: {} (converged: {})", diag.iterations, diag.converged)?;
        }
        writeln!(f)?;

        writeln!(f, "{:<32} {:>12} {:>12}", "feature", "coefficient", "odds ratio")?;
        writeln!(f, "{:-<58}", "")?;

        for i in 0..self.coefficients.len() {
            let default_name = format!("x{}", i);
            let feature_name = match &self.feature_names {
                Some(names) => names.get(i).map(|s| s.as_str()).unwrap_or(&default_name),
                None => &default_name,
            };

            writeln!(f, "{:<32} {:>12.6} {:>12.6}",
                    feature_name,
                    self.coefficients[i],
                    self.odds_ratios[i])?;
        }
        Ok(())
    }
}
