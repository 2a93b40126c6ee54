use thiserror::Error;

pub type Result<T> = std::result::Result<T, RiskError>;

#[derive(Error, Debug)]
pub enum RiskError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("couldn't read {}: {source}", path.display())]
    Csv {
        path: std::path::PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("config file is broken: {0}")]
    Config(#[from] toml::de::Error),

    #[error("couldn't write config: {0}")]
    ConfigWrite(#[from] toml::ser::Error),

    #[error("bad value in {table}.{column}: {value:?} ({reason})")]
    InvalidRecord {
        table: &'static str,
        column: &'static str,
        value: String,
        reason: String,
    },

    #[error("data quality problem: {message}")]
    DataQuality { message: String },

    #[error("feature schema mismatch: {message}")]
    SchemaMismatch { message: String },

    #[error("dimensions don't match: {message}")]
    InvalidDimensions { message: String },

    #[error("bad parameter: {parameter} = {value}")]
    InvalidParameter { parameter: String, value: String },

    #[error("model not fitted yet - call fit() first")]
    ModelNotFitted,

    #[error("numerical issues: {message}")]
    NumericalError { message: String },

    #[error("{stage} stage failed: {source}")]
    Stage {
        stage: Stage,
        #[source]
        source: Box<RiskError>,
    },
}

/// pipeline stage names, used to tag errors from a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Load,
    Merge,
    Features,
    Split,
    Train,
    Evaluate,
    Compare,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Load => "load",
            Stage::Merge => "merge",
            Stage::Features => "features",
            Stage::Split => "split",
            Stage::Train => "train",
            Stage::Evaluate => "evaluate",
            Stage::Compare => "compare",
        };
        f.write_str(name)
    }
}

impl RiskError {
    pub fn invalid_record(
        table: &'static str,
        column: &'static str,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidRecord {
            table,
            column,
            value: value.into(),
            reason: reason.into(),
        }
    }

    pub fn data_quality(message: impl Into<String>) -> Self {
        Self::DataQuality { message: message.into() }
    }

    pub fn schema_mismatch(message: impl Into<String>) -> Self {
        Self::SchemaMismatch { message: message.into() }
    }

    pub fn invalid_dimensions(message: impl Into<String>) -> Self {
        Self::InvalidDimensions { message: message.into() }
    }

    pub fn invalid_parameter(parameter: impl Into<String>, value: impl Into<String>) -> Self {
        Self::InvalidParameter {
            parameter: parameter.into(),
            value: value.into(),
        }
    }

    pub fn numerical_error(message: impl Into<String>) -> Self {
        Self::NumericalError { message: message.into() }
    }

    /// which stage a run failed in, if this error came out of the pipeline
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Self::Stage { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}

/// attach a stage tag to any fallible step
pub(crate) trait StageContext<T> {
    fn in_stage(self, stage: Stage) -> Result<T>;
}

impl<T> StageContext<T> for Result<T> {
    fn in_stage(self, stage: Stage) -> Result<T> {
        self.map_err(|source| RiskError::Stage {
            stage,
            source: Box::new(source),
        })
    }
}
