//! # readmission risk
//!
//! 30-day readmission scoring from flat hospital tables - logistic regression vs random forest
//!
//! ## what you get
//!
//! - csv ingestion behind a `RecordSource` trait
//! - left-join merge w/ length-of-stay & an explicit invalid-stay policy
//! - indicator encoding fitted once, checked again at predict time
//! - seeded stratified train/holdout split
//! - L2 logistic regression (Newton/IRLS) and a parallel gini random forest
//! - classification report, confusion matrix, ROC-AUC, model comparison
//! - hospital KPIs & high-risk readmission alerts
//!
//! ## quick start
//!
//! ```rust
//! use readmission_risk::{Classifier, LogisticModel, ReadmissionData, evaluate};
//! use ndarray::Array2;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // age, length of stay for eight admissions
//! let features = Array2::from_shape_vec((8, 2), vec![
//!     45.0, 2.0,
//!     80.0, 9.0,
//!     30.0, 1.0,
//!     75.0, 7.0,
//!     50.0, 3.0,
//!     85.0, 8.0,
//!     40.0, 2.0,
//!     70.0, 6.0,
//! ])?;
//! let readmitted = vec![false, true, false, true, false, true, false, false];
//! let names = vec!["Age".to_string(), "Length_of_stay".to_string()];
//! let data = ReadmissionData::new(features, readmitted, names)?;
//!
//! let (train, holdout) = data.split(0.5, 42)?;
//!
//! let mut model = LogisticModel::new().with_l2_penalty(1.0);
//! model.fit(&train)?;
//!
//! let evaluation = evaluate(&model, &holdout)?;
//! println!("holdout auc: {:.3}", evaluation.roc_auc());
//! # Ok(())
//! # }
//! ```
//!
//! the full batch run lives in [`ReadmissionPipeline`], fed by a [`CsvRecordStore`].

pub mod alerts;
pub mod comparison;
pub mod config;
pub mod data;
pub mod error;
pub mod evaluation;
pub mod features;
pub mod forest;
pub mod kpi;
pub mod merge;
pub mod metrics;
pub mod model;
pub mod optimization;
pub mod pipeline;
pub mod records;
pub mod split;
pub mod store;
pub mod tree;

pub use alerts::{AlertThresholds, HighRiskAlerts};
pub use comparison::ModelComparison;
pub use config::PipelineConfig;
pub use data::ReadmissionData;
pub use error::{Result, RiskError, Stage};
pub use evaluation::{Evaluation, evaluate};
pub use features::{FeatureSchema, build_features};
pub use forest::RandomForest;
pub use kpi::{HospitalKpis, RevenueStats};
pub use merge::{InvalidStayPolicy, MergedTable, merge_tables};
pub use model::{Classifier, FeatureRanking, LogisticModel};
pub use pipeline::{PipelineReport, ReadmissionPipeline};
pub use split::stratified_split;
pub use store::{CsvRecordStore, HospitalRecords, RecordSource};
