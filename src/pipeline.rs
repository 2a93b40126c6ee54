use std::fmt;

use crate::{
    comparison::ModelComparison,
    config::PipelineConfig,
    data::ReadmissionData,
    error::{Result, RiskError, Stage, StageContext},
    evaluation::{Evaluation, evaluate},
    features::build_features,
    forest::RandomForest,
    merge::{MergedTable, merge_tables},
    model::{Classifier, FitDiagnostics, LogisticModel},
    records::{Admission, Billing, Patient},
    store::RecordSource,
};

/// row counts out of the merge stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeSummary {
    pub admissions: usize,
    pub rows: usize,
    pub dropped_invalid: usize,
    pub unmatched_patients: usize,
    pub unmatched_billing: usize,
}

impl MergeSummary {
    fn new(admissions: usize, table: &MergedTable) -> Self {
        Self {
            admissions,
            rows: table.len(),
            dropped_invalid: table.dropped_invalid(),
            unmatched_patients: table.unmatched_patients(),
            unmatched_billing: table.unmatched_billing(),
        }
    }
}

/// size & prevalence of one partition
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PartitionSummary {
    pub rows: usize,
    pub positives: usize,
    pub prevalence: f64,
}

impl PartitionSummary {
    fn of(data: &ReadmissionData) -> Self {
        Self {
            rows: data.n_samples(),
            positives: data.n_positive(),
            prevalence: data.positive_rate(),
        }
    }
}

/// everything a successful run produced
#[derive(Debug, Clone)]
pub struct PipelineReport {
    pub merge: MergeSummary,
    pub feature_names: Vec<String>,
    pub train: PartitionSummary,
    pub holdout: PartitionSummary,
    pub logistic: Evaluation,
    pub logistic_diagnostics: Option<FitDiagnostics>,
    pub forest: Evaluation,
    pub comparison: ModelComparison,
}

impl PipelineReport {
    pub fn print(&self) {
        print!("{self}");
    }
}

impl fmt::Display for PipelineReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Readmission Risk Report")?;
        writeln!(f, "=======================")?;
        writeln!(f, "{:<20} {:>12}", "Admissions:", self.merge.admissions)?;
        writeln!(f, "{:<20} {:>12}", "Merged rows:", self.merge.rows)?;
        writeln!(f, "{:<20} {:>12}", "Dropped (invalid):", self.merge.dropped_invalid)?;
        writeln!(f, "{:<20} {:>12}", "No patient match:", self.merge.unmatched_patients)?;
        writeln!(f, "{:<20} {:>12}", "No billing match:", self.merge.unmatched_billing)?;
        writeln!(f, "{:<20} {:>12}", "Features:", self.feature_names.len())?;
        writeln!(f, "{:<20} {:>12} ({:.4} readmitted)", "Train rows:", self.train.rows, self.train.prevalence)?;
        writeln!(f, "{:<20} {:>12} ({:.4} readmitted)", "Holdout rows:", self.holdout.rows, self.holdout.prevalence)?;
        if let Some(diag) = &self.logistic_diagnostics {
            writeln!(
                f,
                "{:<20} {:>12} (converged: {})",
                "Newton iterations:", diag.iterations, diag.converged
            )?;
        }
        writeln!(f)?;
        writeln!(f, "{}", self.logistic)?;
        writeln!(f, "{}", self.forest)?;
        write!(f, "{}", self.comparison)
    }
}

/// runs the whole thing once against a record source
#[derive(Debug, Clone, Default)]
pub struct ReadmissionPipeline {
    config: PipelineConfig,
}

impl ReadmissionPipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn run(&self, source: &dyn RecordSource) -> Result<PipelineReport> {
        let config = &self.config;
        config.validate()?;

        let (patients, admissions, billing) = load_tables(source).in_stage(Stage::Load)?;
        log::info!(
            "load: {} patients, {} admissions, {} billing rows",
            patients.len(),
            admissions.len(),
            billing.len()
        );

        let table = merge_tables(&admissions, &patients, &billing, config.invalid_stays).in_stage(Stage::Merge)?;
        if table.is_empty() {
            return Err(RiskError::data_quality("no admissions left after merging")).in_stage(Stage::Merge);
        }
        let merge = MergeSummary::new(admissions.len(), &table);

        let (schema, data) = build_features(&table).in_stage(Stage::Features)?;
        log::info!("features: {} rows x {} columns", data.n_samples(), data.n_features());

        let (train, holdout) = split_both_classes(&data, config.test_fraction, config.seed).in_stage(Stage::Split)?;
        log::info!(
            "split: {} train ({:.4} readmitted), {} holdout ({:.4} readmitted)",
            train.n_samples(),
            train.positive_rate(),
            holdout.n_samples(),
            holdout.positive_rate()
        );

        let mut logistic = config.logistic.build();
        let mut forest = config.forest.build(config.seed, config.parallel);
        train_models(&mut logistic, &mut forest, &train, config.parallel).in_stage(Stage::Train)?;

        let logistic_eval = evaluate(&logistic, &holdout).in_stage(Stage::Evaluate)?;
        let forest_eval = evaluate(&forest, &holdout).in_stage(Stage::Evaluate)?;

        let comparison = ModelComparison::from_evaluations(&[logistic_eval.clone(), forest_eval.clone()]);
        let best = comparison
            .best()
            .ok_or_else(|| RiskError::numerical_error("comparison came out empty"))
            .in_stage(Stage::Compare)?;
        log::info!("compare: best model is {} (roc auc {:.4})", best.model_name, best.roc_auc);

        Ok(PipelineReport {
            merge,
            feature_names: schema.feature_names().to_vec(),
            train: PartitionSummary::of(&train),
            holdout: PartitionSummary::of(&holdout),
            logistic: logistic_eval,
            logistic_diagnostics: logistic.diagnostics().cloned(),
            forest: forest_eval,
            comparison,
        })
    }
}

fn load_tables(source: &dyn RecordSource) -> Result<(Vec<Patient>, Vec<Admission>, Vec<Billing>)> {
    Ok((source.patients()?, source.admissions()?, source.billing()?))
}

/// roc auc is undefined w/o both outcomes, so refuse before training anything
fn split_both_classes(
    data: &ReadmissionData,
    test_fraction: f64,
    seed: u64,
) -> Result<(ReadmissionData, ReadmissionData)> {
    let positives = data.n_positive();
    if positives == 0 || positives == data.n_samples() {
        return Err(RiskError::data_quality(format!(
            "all {} admissions have the same readmission flag - nothing to classify",
            data.n_samples()
        )));
    }
    data.split(test_fraction, seed)
}

/// fit both models on the training partition, concurrently when asked
fn train_models(
    logistic: &mut LogisticModel,
    forest: &mut RandomForest,
    train: &ReadmissionData,
    parallel: bool,
) -> Result<()> {
    if parallel {
        let (a, b) = rayon::join(|| logistic.fit(train), || forest.fit(train));
        a?;
        b?;
    } else {
        logistic.fit(train)?;
        forest.fit(train)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::parse_timestamp;
    use crate::store::HospitalRecords;
    use rand::{Rng, SeedableRng, rngs::StdRng};

    fn records(n: usize, seed: u64) -> HospitalRecords {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut records = HospitalRecords::default();
        for id in 1..=n as u64 {
            let age = rng.gen_range(18..90);
            let chronic = rng.gen_range(0..5);
            records.patients.push(Patient {
                id,
                age,
                gender: if rng.gen_bool(0.5) { "Male" } else { "Female" }.to_string(),
                chronic_conditions: chronic,
                admission_type: if rng.gen_bool(0.6) { "Emergency" } else { "OPD" }.to_string(),
            });
            let stay = rng.gen_range(0..10);
            let admitted_at = parse_timestamp("2025-03-01").unwrap() + chrono::Duration::days(rng.gen_range(0..60));
            records.admissions.push(Admission {
                id,
                patient_id: id,
                admitted_at,
                discharged_at: admitted_at + chrono::Duration::days(stay),
                department: ["Cardiology", "Neurology", "Oncology"][rng.gen_range(0..3)].to_string(),
                bed_type: if rng.gen_bool(0.2) { "ICU" } else { "General" }.to_string(),
                readmitted: (chronic >= 3 && rng.gen_bool(0.7)) || rng.gen_bool(0.1),
            });
            records.billing.push(Billing {
                admission_id: id,
                total_charges: rng.gen_range(100.0..5000.0),
                insurance_covered: rng.gen_bool(0.7),
                claim_status: "Approved".to_string(),
            });
        }
        records
    }

    fn small_config() -> PipelineConfig {
        let mut config = PipelineConfig::default();
        config.forest.n_trees = 20;
        config.forest.max_depth = 4;
        config
    }

    #[test]
    fn test_run_end_to_end() {
        let records = records(300, 42);
        let report = ReadmissionPipeline::new(small_config()).run(&records).unwrap();

        assert_eq!(report.merge.rows, 300);
        assert_eq!(report.holdout.rows, 60);
        assert_eq!(report.train.rows + report.holdout.rows, 300);
        assert_eq!(report.comparison.rows().len(), 2);
        assert!(report.comparison.rows()[0].roc_auc >= report.comparison.rows()[1].roc_auc);
        assert!(report.feature_names.iter().any(|n| n == "Department_Neurology"));
        assert!(report.logistic_diagnostics.is_some());
        assert!(report.to_string().contains("Random Forest"));
    }

    #[test]
    fn test_serial_matches_parallel() {
        let records = records(200, 7);
        let mut serial = small_config();
        serial.parallel = false;

        let a = ReadmissionPipeline::new(small_config()).run(&records).unwrap();
        let b = ReadmissionPipeline::new(serial).run(&records).unwrap();
        assert_eq!(a.comparison, b.comparison);
    }

    #[test]
    fn test_errors_are_stage_tagged() {
        let mut records = records(50, 3);
        let duplicate = records.patients[0].clone();
        records.patients.push(duplicate);

        let err = ReadmissionPipeline::new(small_config()).run(&records).unwrap_err();
        assert_eq!(err.stage(), Some(Stage::Merge));
    }

    #[test]
    fn test_single_class_fails_at_split() {
        let mut records = records(50, 4);
        for admission in &mut records.admissions {
            admission.readmitted = false;
        }
        let err = ReadmissionPipeline::new(small_config()).run(&records).unwrap_err();
        assert_eq!(err.stage(), Some(Stage::Split));
    }

    #[test]
    fn test_invalid_config_rejected_up_front() {
        let mut config = small_config();
        config.test_fraction = 1.5;
        let err = ReadmissionPipeline::new(config).run(&records(10, 5)).unwrap_err();
        assert!(err.stage().is_none());
    }
}
