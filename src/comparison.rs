use std::fmt;

use crate::evaluation::Evaluation;

/// one line of the comparison table
#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonRow {
    pub model_name: String,
    pub roc_auc: f64,
}

/// models ranked by holdout ROC-AUC, best first
#[derive(Debug, Clone, PartialEq)]
pub struct ModelComparison {
    rows: Vec<ComparisonRow>,
}

impl ModelComparison {
    /// stable sort, so equal AUCs keep the order they came in
    pub fn from_evaluations(evaluations: &[Evaluation]) -> Self {
        let mut rows: Vec<ComparisonRow> = evaluations
            .iter()
            .map(|e| ComparisonRow {
                model_name: e.model_name.clone(),
                roc_auc: e.roc_auc(),
            })
            .collect();
        rows.sort_by(|a, b| b.roc_auc.partial_cmp(&a.roc_auc).unwrap_or(std::cmp::Ordering::Equal));
        Self { rows }
    }

    pub fn rows(&self) -> &[ComparisonRow] {
        &self.rows
    }

    pub fn best(&self) -> Option<&ComparisonRow> {
        self.rows.first()
    }

    pub fn print(&self) {
        print!("{self}");
    }
}

impl fmt::Display for ModelComparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:<24} {:>12}", "model", "roc auc")?;
        writeln!(f, "{:-<37}", "")?;
        for row in &self.rows {
            writeln!(f, "{:<24} {:>12.6}", row.model_name, row.roc_auc)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        metrics::ModelMetrics,
        model::{FeatureRanking, RankingKind},
    };
    use ndarray::array;

    fn evaluation(name: &str, probabilities: ndarray::Array1<f64>) -> Evaluation {
        let y = [false, true, false, true];
        Evaluation {
            model_name: name.to_string(),
            metrics: ModelMetrics::compute(&y, probabilities.view()).unwrap(),
            ranking: FeatureRanking {
                kind: RankingKind::Importance,
                entries: Vec::new(),
            },
        }
    }

    #[test]
    fn test_sorted_by_auc() {
        let evals = vec![
            evaluation("weak", array![0.5, 0.5, 0.5, 0.5]),
            evaluation("strong", array![0.1, 0.9, 0.2, 0.8]),
        ];
        let comparison = ModelComparison::from_evaluations(&evals);
        assert_eq!(comparison.best().unwrap().model_name, "strong");
        assert_eq!(comparison.rows()[1].model_name, "weak");
        assert_eq!(comparison.rows()[1].roc_auc, 0.5);
    }

    #[test]
    fn test_ties_keep_input_order() {
        let evals = vec![
            evaluation("first", array![0.1, 0.9, 0.2, 0.8]),
            evaluation("second", array![0.2, 0.7, 0.3, 0.6]),
        ];
        let comparison = ModelComparison::from_evaluations(&evals);
        let names: Vec<&str> = comparison.rows().iter().map(|r| r.model_name.as_str()).collect();
        assert_eq!(names, vec!["first", "second"]);
    }

    #[test]
    fn test_empty_and_display() {
        let comparison = ModelComparison::from_evaluations(&[]);
        assert!(comparison.best().is_none());

        let evals = vec![evaluation("only", array![0.1, 0.9, 0.2, 0.8])];
        let text = ModelComparison::from_evaluations(&evals).to_string();
        assert!(text.contains("only"));
        assert!(text.contains("1.000000"));
    }
}
