use ndarray::{Array1, Array2, ArrayView2};
use crate::error::{Result, RiskError};

/// Configuration for penalized logistic regression fitting
#[derive(Debug, Clone)]
pub struct OptimizationConfig {
    pub l2_penalty: f64,       // ridge strength on the weights (intercept is never penalized)
    pub max_iterations: usize, // newton step budget
    pub tolerance: f64,        // stop once the objective moves less than this
    pub fit_intercept: bool,
}

impl Default for OptimizationConfig {
    fn default() -> Self {
        Self {
            l2_penalty: 1.0,
            max_iterations: 1000,
            tolerance: 1e-6,
            fit_intercept: true,
        }
    }
}

/// what came out of a fit
#[derive(Debug, Clone)]
pub struct LogisticFit {
    pub coefficients: Array1<f64>,
    pub intercept: f64,
    pub iterations: usize,
    pub converged: bool,
    pub objective: f64,
}

/// Newton-Raphson (IRLS) solver for L2-penalized logistic loss
///
/// minimizes `sum(log-loss) + 0.5 * l2_penalty * ||w||^2`
pub struct LogisticOptimizer {
    config: OptimizationConfig,
}

impl LogisticOptimizer {
    pub fn new(config: OptimizationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &OptimizationConfig {
        &self.config
    }

    /// fit weights & intercept; running out of iterations is reported, not an error
    pub fn optimize(&self, x: ArrayView2<f64>, y: &[bool]) -> Result<LogisticFit> {
        let n_samples = x.nrows();
        let n_features = x.ncols();

        if y.len() != n_samples {
            return Err(RiskError::invalid_dimensions(
                format!("labels len ({}) != n_samples ({})", y.len(), n_samples)
            ));
        }
        if n_samples == 0 {
            return Err(RiskError::invalid_dimensions("can't fit on zero rows"));
        }
        if self.config.l2_penalty < 0.0 || !self.config.l2_penalty.is_finite() {
            return Err(RiskError::invalid_parameter("l2_penalty", self.config.l2_penalty.to_string()));
        }
        if self.config.max_iterations == 0 {
            return Err(RiskError::invalid_parameter("max_iterations", "0"));
        }

        let targets: Array1<f64> = y.iter().map(|&label| if label { 1.0 } else { 0.0 }).collect();

        // parameters = [weights..., intercept]; intercept slot stays 0 when not fitted
        let n_params = n_features + 1;
        let mut params = Array1::zeros(n_params);
        let mut objective = self.objective(x, &targets, &params);
        let mut converged = false;
        let mut iterations = 0;

        for iteration in 0..self.config.max_iterations {
            iterations = iteration + 1;

            let (gradient, hessian) = self.derivatives(x, &targets, &params);

            let step = match solve_linear_system(&hessian, &gradient) {
                Ok(step) => step,
                Err(_) => {
                    // singular hessian - fall back to a plain gradient step
                    log::debug!("iteration {iteration}: hessian singular, taking gradient step");
                    gradient.mapv(|g| 0.01 * g)
                }
            };

            // step halving until the objective stops getting worse
            let mut scale = 1.0;
            let mut candidate = &params - &step;
            let mut candidate_objective = self.objective(x, &targets, &candidate);
            let mut halvings = 0;
            while !(candidate_objective <= objective) && halvings < 30 {
                scale *= 0.5;
                candidate = &params - &(scale * &step);
                candidate_objective = self.objective(x, &targets, &candidate);
                halvings += 1;
            }

            if !(candidate_objective <= objective) {
                // can't improve along the newton direction - we're sitting at the optimum
                converged = true;
                break;
            }

            let change = objective - candidate_objective;
            params = candidate;
            objective = candidate_objective;

            log::debug!("iteration {iteration}: objective {objective:.8} (change {change:.3e}, scale {scale})");

            if change < self.config.tolerance {
                converged = true;
                break;
            }
        }

        if params.iter().any(|p| !p.is_finite()) {
            return Err(RiskError::numerical_error("logistic weights went non-finite"));
        }

        if !converged {
            log::warn!(
                "logistic regression did not converge within {} iterations (objective {:.6}) - results are lower confidence",
                self.config.max_iterations,
                objective
            );
        }

        let intercept = params[n_features];
        let coefficients = params.slice(ndarray::s![..n_features]).to_owned();

        Ok(LogisticFit {
            coefficients,
            intercept,
            iterations,
            converged,
            objective,
        })
    }

    /// penalized negative log-likelihood
    fn objective(&self, x: ArrayView2<f64>, targets: &Array1<f64>, params: &Array1<f64>) -> f64 {
        let n_features = x.ncols();
        let eta = self.linear_predictor(x, params);

        let loss: f64 = eta
            .iter()
            .zip(targets.iter())
            .map(|(&z, &t)| softplus(z) - t * z)
            .sum();

        let weights = params.slice(ndarray::s![..n_features]);
        loss + 0.5 * self.config.l2_penalty * weights.dot(&weights)
    }

    /// gradient & hessian of the objective w.r.t. [weights, intercept]
    fn derivatives(
        &self,
        x: ArrayView2<f64>,
        targets: &Array1<f64>,
        params: &Array1<f64>,
    ) -> (Array1<f64>, Array2<f64>) {
        let n_samples = x.nrows();
        let n_features = x.ncols();
        let n_params = n_features + 1;

        let eta = self.linear_predictor(x, params);
        let probs = eta.mapv(sigmoid);

        let mut gradient = Array1::zeros(n_params);
        let mut hessian = Array2::zeros((n_params, n_params));

        for i in 0..n_samples {
            let residual = probs[i] - targets[i];
            let weight = probs[i] * (1.0 - probs[i]);
            let row = x.row(i);

            for j in 0..n_features {
                gradient[j] += residual * row[j];
                for k in j..n_features {
                    hessian[[j, k]] += weight * row[j] * row[k];
                }
                hessian[[j, n_features]] += weight * row[j];
            }
            gradient[n_features] += residual;
            hessian[[n_features, n_features]] += weight;
        }

        // mirror the upper triangle
        for j in 0..n_params {
            for k in 0..j {
                hessian[[j, k]] = hessian[[k, j]];
            }
        }

        // ridge on the weights only
        for j in 0..n_features {
            gradient[j] += self.config.l2_penalty * params[j];
            hessian[[j, j]] += self.config.l2_penalty;
        }

        if !self.config.fit_intercept {
            // pin the intercept at zero: unit curvature, no pull
            gradient[n_features] = 0.0;
            for j in 0..n_params {
                hessian[[j, n_features]] = 0.0;
                hessian[[n_features, j]] = 0.0;
            }
            hessian[[n_features, n_features]] = 1.0;
        }

        (gradient, hessian)
    }

    fn linear_predictor(&self, x: ArrayView2<f64>, params: &Array1<f64>) -> Array1<f64> {
        let n_features = x.ncols();
        let weights = params.slice(ndarray::s![..n_features]);
        x.dot(&weights) + params[n_features]
    }
}

/// numerically stable logistic function
pub fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

/// ln(1 + e^z) without overflow
fn softplus(z: f64) -> f64 {
    if z > 0.0 {
        z + (-z).exp().ln_1p()
    } else {
        z.exp().ln_1p()
    }
}

/// Solve linear system Ax = b by gaussian elimination w/ partial pivoting
pub fn solve_linear_system(a: &Array2<f64>, b: &Array1<f64>) -> Result<Array1<f64>> {
    let n = a.nrows();
    if n != a.ncols() || n != b.len() {
        return Err(RiskError::invalid_dimensions("Matrix dimensions mismatch"));
    }

    let mut a_copy = a.clone();
    let mut b_copy = b.clone();

    // Forward elimination
    for i in 0..n {
        // Find pivot
        let mut max_row = i;
        for k in i + 1..n {
            if a_copy[[k, i]].abs() > a_copy[[max_row, i]].abs() {
                max_row = k;
            }
        }

        if a_copy[[max_row, i]].abs() < 1e-12 {
            return Err(RiskError::numerical_error("Matrix is singular"));
        }

        if max_row != i {
            for j in 0..n {
                a_copy.swap([i, j], [max_row, j]);
            }
            b_copy.swap(i, max_row);
        }

        for k in i + 1..n {
            let factor = a_copy[[k, i]] / a_copy[[i, i]];
            for j in i..n {
                a_copy[[k, j]] -= factor * a_copy[[i, j]];
            }
            b_copy[k] -= factor * b_copy[i];
        }
    }

    // Back substitution
    let mut x = Array1::zeros(n);
    for i in (0..n).rev() {
        x[i] = b_copy[i];
        for j in i + 1..n {
            x[i] -= a_copy[[i, j]] * x[j];
        }
        x[i] /= a_copy[[i, i]];
    }

    Ok(x)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::Array2;

    fn create_test_data() -> (Array2<f64>, Vec<bool>) {
        let x = Array2::from_shape_vec((10, 2), vec![
            -2.0, 1.0,
            -1.5, 0.0,
            -1.0, 1.0,
            -0.5, 0.0,
            0.0, 1.0,
            0.2, 0.0,
            0.5, 1.0,
            1.0, 0.0,
            1.5, 1.0,
            2.0, 0.0,
        ]).unwrap();
        let y = vec![false, false, false, true, false, true, false, true, true, true];
        (x, y)
    }

    #[test]
    fn test_optimizer_creation() {
        let config = OptimizationConfig::default();
        let optimizer = LogisticOptimizer::new(config.clone());
        assert_eq!(optimizer.config().l2_penalty, config.l2_penalty);
        assert_eq!(optimizer.config().max_iterations, 1000);
    }

    #[test]
    fn test_sigmoid() {
        assert_relative_eq!(sigmoid(0.0), 0.5, epsilon = 1e-12);
        assert!(sigmoid(800.0) <= 1.0);
        assert!(sigmoid(-800.0) >= 0.0);
        assert_relative_eq!(sigmoid(2.0) + sigmoid(-2.0), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_softplus_is_stable() {
        assert_relative_eq!(softplus(0.0), 2f64.ln(), epsilon = 1e-12);
        assert_relative_eq!(softplus(1000.0), 1000.0, epsilon = 1e-9);
        assert!(softplus(-1000.0) >= 0.0);
    }

    #[test]
    fn test_fit_converges_and_points_the_right_way() {
        let (x, y) = create_test_data();
        let optimizer = LogisticOptimizer::new(OptimizationConfig {
            l2_penalty: 0.1,
            ..Default::default()
        });

        let fit = optimizer.optimize(x.view(), &y).unwrap();
        assert!(fit.converged);
        assert_eq!(fit.coefficients.len(), 2);
        assert!(fit.coefficients[0] > 0.0, "first feature drives readmission");
        assert!(fit.objective.is_finite());
    }

    #[test]
    fn test_gradient_vanishes_at_optimum() {
        let (x, y) = create_test_data();
        let optimizer = LogisticOptimizer::new(OptimizationConfig {
            l2_penalty: 1.0,
            tolerance: 1e-12,
            ..Default::default()
        });
        let fit = optimizer.optimize(x.view(), &y).unwrap();

        let mut params = fit.coefficients.to_vec();
        params.push(fit.intercept);
        let params = Array1::from(params);
        let targets: Array1<f64> = y.iter().map(|&t| if t { 1.0 } else { 0.0 }).collect();
        let (gradient, _) = optimizer.derivatives(x.view(), &targets, &params);

        for g in gradient.iter() {
            assert_relative_eq!(*g, 0.0, epsilon = 1e-5);
        }
    }

    #[test]
    fn test_heavy_ridge_shrinks_weights() {
        let (x, y) = create_test_data();
        let light = LogisticOptimizer::new(OptimizationConfig { l2_penalty: 0.01, ..Default::default() })
            .optimize(x.view(), &y)
            .unwrap();
        let heavy = LogisticOptimizer::new(OptimizationConfig { l2_penalty: 100.0, ..Default::default() })
            .optimize(x.view(), &y)
            .unwrap();

        assert!(heavy.coefficients.mapv(f64::abs).sum() < light.coefficients.mapv(f64::abs).sum());
    }

    #[test]
    fn test_tiny_budget_reports_not_converged() {
        let (x, y) = create_test_data();
        let optimizer = LogisticOptimizer::new(OptimizationConfig {
            max_iterations: 1,
            tolerance: 0.0,
            ..Default::default()
        });

        let fit = optimizer.optimize(x.view(), &y).unwrap();
        assert!(!fit.converged);
        assert_eq!(fit.iterations, 1);
    }

    #[test]
    fn test_no_intercept() {
        let (x, y) = create_test_data();
        let optimizer = LogisticOptimizer::new(OptimizationConfig {
            fit_intercept: false,
            ..Default::default()
        });
        let fit = optimizer.optimize(x.view(), &y).unwrap();
        assert_eq!(fit.intercept, 0.0);
    }

    #[test]
    fn test_dimension_mismatch() {
        let (x, _) = create_test_data();
        let optimizer = LogisticOptimizer::new(OptimizationConfig::default());
        assert!(optimizer.optimize(x.view(), &[true, false]).is_err());
    }

    #[test]
    fn test_solve_linear_system() {
        let a = Array2::from_shape_vec((2, 2), vec![2.0, 1.0, 1.0, 3.0]).unwrap();
        let b = Array1::from(vec![3.0, 5.0]);
        let x = solve_linear_system(&a, &b).unwrap();
        assert_relative_eq!(x[0], 0.8, epsilon = 1e-12);
        assert_relative_eq!(x[1], 1.4, epsilon = 1e-12);

        let singular = Array2::from_shape_vec((2, 2), vec![1.0, 2.0, 2.0, 4.0]).unwrap();
        assert!(solve_linear_system(&singular, &b).is_err());
    }
}
