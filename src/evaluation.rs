use std::fmt;

use crate::{
    data::ReadmissionData,
    error::Result,
    metrics::{ClassificationReport, ConfusionMatrix, ModelMetrics},
    model::{Classifier, FeatureRanking},
};

/// everything we know about one model on the holdout
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub model_name: String,
    pub metrics: ModelMetrics,
    pub ranking: FeatureRanking,
}

impl Evaluation {
    pub fn roc_auc(&self) -> f64 {
        self.metrics.roc_auc
    }

    pub fn report(&self) -> &ClassificationReport {
        &self.metrics.report
    }

    pub fn confusion(&self) -> &ConfusionMatrix {
        &self.metrics.confusion
    }

    pub fn print(&self) {
        print!("{self}");
    }
}

impl fmt::Display for Evaluation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.model_name)?;
        writeln!(f, "{}", "=".repeat(self.model_name.len()))?;
        write!(f, "{}", self.metrics)?;
        writeln!(f)?;
        write!(f, "{}", self.ranking)
    }
}

/// score a fitted model on data it never trained on
pub fn evaluate(model: &dyn Classifier, holdout: &ReadmissionData) -> Result<Evaluation> {
    let probabilities = model.predict_proba(holdout)?;
    let metrics = ModelMetrics::compute(holdout.labels(), probabilities.view())?;
    let ranking = model.feature_ranking()?;

    log::info!(
        "{}: holdout roc auc {:.4}, accuracy {:.4} on {} rows",
        model.name(),
        metrics.roc_auc,
        metrics.report.accuracy,
        holdout.n_samples()
    );

    Ok(Evaluation {
        model_name: model.name().to_string(),
        metrics,
        ranking,
    })
}
