use std::fmt;

use ndarray::ArrayView1;
use crate::error::{Result, RiskError};

/// 2x2 counts for a binary classifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConfusionMatrix {
    pub true_negatives: usize,
    pub false_positives: usize,
    pub false_negatives: usize,
    pub true_positives: usize,
}

impl ConfusionMatrix {
    /// `[[tn, fp], [fn, tp]]`, rows are the true class
    pub fn to_array(&self) -> [[usize; 2]; 2] {
        [
            [self.true_negatives, self.false_positives],
            [self.false_negatives, self.true_positives],
        ]
    }

    pub fn total(&self) -> usize {
        self.true_negatives + self.false_positives + self.false_negatives + self.true_positives
    }
}

impl fmt::Display for ConfusionMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:<12} {:>10} {:>10}", "", "pred 0", "pred 1")?;
        writeln!(f, "{:<12} {:>10} {:>10}", "true 0", self.true_negatives, self.false_positives)?;
        writeln!(f, "{:<12} {:>10} {:>10}", "true 1", self.false_negatives, self.true_positives)
    }
}

pub fn confusion_matrix(y_true: &[bool], y_pred: &[bool]) -> Result<ConfusionMatrix> {
    check_lengths(y_true.len(), y_pred.len())?;

    let mut cm = ConfusionMatrix::default();
    for (&truth, &pred) in y_true.iter().zip(y_pred) {
        match (truth, pred) {
            (false, false) => cm.true_negatives += 1,
            (false, true) => cm.false_positives += 1,
            (true, false) => cm.false_negatives += 1,
            (true, true) => cm.true_positives += 1,
        }
    }
    Ok(cm)
}

/// precision / recall / f1 for one class (or an average of them)
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ClassMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

impl ClassMetrics {
    fn from_counts(tp: usize, fp: usize, fn_: usize) -> Self {
        let precision = ratio(tp, tp + fp);
        let recall = ratio(tp, tp + fn_);
        let f1 = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };
        Self {
            precision,
            recall,
            f1,
            support: tp + fn_,
        }
    }
}

/// per-class scores plus accuracy and the two averages
#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationReport {
    pub not_readmitted: ClassMetrics,
    pub readmitted: ClassMetrics,
    pub accuracy: f64,
    pub macro_avg: ClassMetrics,
    pub weighted_avg: ClassMetrics,
}

impl ClassificationReport {
    pub fn from_confusion(cm: &ConfusionMatrix) -> Self {
        let not_readmitted = ClassMetrics::from_counts(cm.true_negatives, cm.false_negatives, cm.false_positives);
        let readmitted = ClassMetrics::from_counts(cm.true_positives, cm.false_positives, cm.false_negatives);
        let total = cm.total();

        let macro_avg = ClassMetrics {
            precision: 0.5 * (not_readmitted.precision + readmitted.precision),
            recall: 0.5 * (not_readmitted.recall + readmitted.recall),
            f1: 0.5 * (not_readmitted.f1 + readmitted.f1),
            support: total,
        };

        let weight = |a: f64, b: f64| {
            if total == 0 {
                0.0
            } else {
                (a * not_readmitted.support as f64 + b * readmitted.support as f64) / total as f64
            }
        };
        let weighted_avg = ClassMetrics {
            precision: weight(not_readmitted.precision, readmitted.precision),
            recall: weight(not_readmitted.recall, readmitted.recall),
            f1: weight(not_readmitted.f1, readmitted.f1),
            support: total,
        };

        Self {
            not_readmitted,
            readmitted,
            accuracy: ratio(cm.true_negatives + cm.true_positives, total),
            macro_avg,
            weighted_avg,
        }
    }
}

impl fmt::Display for ClassificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:<14} {:>10} {:>10} {:>10} {:>10}", "", "precision", "recall", "f1-score", "support")?;
        write_row(f, "0", &self.not_readmitted)?;
        write_row(f, "1", &self.readmitted)?;
        writeln!(f)?;
        writeln!(
            f,
            "{:<14} {:>10} {:>10} {:>10.4} {:>10}",
            "accuracy", "", "", self.accuracy, self.macro_avg.support
        )?;
        write_row(f, "macro avg", &self.macro_avg)?;
        write_row(f, "weighted avg", &self.weighted_avg)
    }
}

fn write_row(f: &mut fmt::Formatter<'_>, label: &str, m: &ClassMetrics) -> fmt::Result {
    writeln!(
        f,
        "{:<14} {:>10.4} {:>10.4} {:>10.4} {:>10}",
        label, m.precision, m.recall, m.f1, m.support
    )
}

pub fn classification_report(y_true: &[bool], y_pred: &[bool]) -> Result<ClassificationReport> {
    let cm = confusion_matrix(y_true, y_pred)?;
    Ok(ClassificationReport::from_confusion(&cm))
}

/// area under the ROC curve via the Mann-Whitney U statistic
///
/// tied scores share their average rank, so a constant scorer gets exactly 0.5.
pub fn roc_auc(y_true: &[bool], scores: ArrayView1<f64>) -> Result<f64> {
    check_lengths(y_true.len(), scores.len())?;
    if scores.iter().any(|s| !s.is_finite()) {
        return Err(RiskError::numerical_error("scores must be finite for roc auc"));
    }

    let n = y_true.len();
    let n_pos = y_true.iter().filter(|&&y| y).count();
    let n_neg = n - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return Err(RiskError::data_quality(format!(
            "roc auc needs both classes, got {n_pos} positive and {n_neg} negative"
        )));
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&i, &j| scores[i].partial_cmp(&scores[j]).unwrap_or(std::cmp::Ordering::Equal));

    let mut ranks = vec![0.0; n];
    let mut i = 0;
    while i < n {
        let mut j = i + 1;
        while j < n && scores[order[j]] == scores[order[i]] {
            j += 1;
        }
        // 1-based ranks i+1..=j share their mean
        let avg_rank = (i + j + 1) as f64 / 2.0;
        for &idx in &order[i..j] {
            ranks[idx] = avg_rank;
        }
        i = j;
    }

    let rank_sum: f64 = ranks
        .iter()
        .zip(y_true)
        .filter(|(_, y)| **y)
        .map(|(r, _)| r)
        .sum();
    let n_pos = n_pos as f64;
    let u = rank_sum - n_pos * (n_pos + 1.0) / 2.0;
    Ok(u / (n_pos * n_neg as f64))
}

fn check_lengths(n_true: usize, n_other: usize) -> Result<()> {
    if n_true != n_other {
        return Err(RiskError::invalid_dimensions(format!(
            "{n_true} labels but {n_other} predictions"
        )));
    }
    Ok(())
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 { 0.0 } else { num as f64 / den as f64 }
}

/// holdout metrics for one set of probabilities
#[derive(Debug, Clone, PartialEq)]
pub struct ModelMetrics {
    pub roc_auc: f64,
    pub confusion: ConfusionMatrix,
    pub report: ClassificationReport,
}

impl ModelMetrics {
    /// score class-1 probabilities against the truth, thresholding at 0.5
    pub fn compute(y_true: &[bool], probabilities: ArrayView1<f64>) -> Result<Self> {
        let y_pred: Vec<bool> = probabilities.iter().map(|&p| p > 0.5).collect();
        let confusion = confusion_matrix(y_true, &y_pred)?;
        let report = ClassificationReport::from_confusion(&confusion);
        let roc_auc = roc_auc(y_true, probabilities)?;
        Ok(Self { roc_auc, confusion, report })
    }

    pub fn print(&self) {
        print!("{self}");
    }
}

impl fmt::Display for ModelMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "ROC-AUC:             {:.6}", self.roc_auc)?;
        writeln!(f)?;
        write!(f, "{}", self.report)?;
        writeln!(f)?;
        write!(f, "{}", self.confusion)
    }
}
