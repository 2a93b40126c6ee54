use std::error::Error;
use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

use readmission_risk::{
    AlertThresholds, CsvRecordStore, HighRiskAlerts, HospitalKpis, InvalidStayPolicy, PipelineConfig, ReadmissionPipeline, RecordSource,
    Result, merge_tables,
};

#[derive(Parser)]
#[command(
    name = "readmission-risk",
    about = "Score 30-day readmission risk from flat hospital tables",
    long_about = "Merges patients, admissions and billing CSVs, fits a logistic regression and a \
                  random forest on a stratified split, and compares them by holdout ROC-AUC."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Train both models and print the holdout comparison
    Predict {
        /// Directory holding patients.csv, admissions.csv and billing.csv
        #[arg(long, value_name = "DIR")]
        data_dir: Option<PathBuf>,

        /// TOML config file; flags below override it
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Seed for the split and the forest
        #[arg(long, value_name = "N")]
        seed: Option<u64>,

        /// Share of rows held out for evaluation
        #[arg(long, value_name = "F")]
        test_fraction: Option<f64>,

        /// Number of trees in the forest
        #[arg(long, value_name = "N")]
        trees: Option<usize>,

        /// Maximum depth of each tree
        #[arg(long, value_name = "N")]
        max_depth: Option<usize>,

        /// Newton iteration budget for the logistic model
        #[arg(long, value_name = "N")]
        max_iterations: Option<usize>,

        /// Fail on stays discharged before admission instead of dropping them
        #[arg(long)]
        reject_invalid_stays: bool,
    },

    /// Print operational KPIs (needs doctors.csv as well)
    Kpi {
        #[arg(long, value_name = "DIR")]
        data_dir: PathBuf,

        /// Fail on stays discharged before admission instead of dropping them
        #[arg(long)]
        reject_invalid_stays: bool,
    },

    /// List readmitted patients over the risk thresholds
    Alerts {
        #[arg(long, value_name = "DIR")]
        data_dir: PathBuf,

        /// Flag stays longer than this many days
        #[arg(long, value_name = "DAYS", default_value_t = 7)]
        los_threshold: i64,

        /// Flag patients older than this
        #[arg(long, value_name = "YEARS", default_value_t = 65)]
        age_threshold: u32,

        /// Flag patients with at least this many chronic conditions
        #[arg(long, value_name = "N", default_value_t = 2)]
        chronic_threshold: u32,

        /// Rows to list, highest score first
        #[arg(long, value_name = "N", default_value_t = 50)]
        top: usize,

        /// Fail on stays discharged before admission instead of dropping them
        #[arg(long)]
        reject_invalid_stays: bool,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Predict {
            data_dir,
            config,
            seed,
            test_fraction,
            trees,
            max_depth,
            max_iterations,
            reject_invalid_stays,
        } => {
            let overrides = Overrides {
                data_dir,
                seed,
                test_fraction,
                trees,
                max_depth,
                max_iterations,
                reject_invalid_stays,
            };
            predict_command(config, overrides)
        }
        Commands::Kpi {
            data_dir,
            reject_invalid_stays,
        } => kpi_command(data_dir, policy(reject_invalid_stays)),
        Commands::Alerts {
            data_dir,
            los_threshold,
            age_threshold,
            chronic_threshold,
            top,
            reject_invalid_stays,
        } => {
            let thresholds = AlertThresholds {
                los_days: los_threshold,
                age: age_threshold,
                chronic_conditions: chronic_threshold,
                max_listed: top,
            };
            alerts_command(data_dir, thresholds, policy(reject_invalid_stays))
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        let mut source = e.source();
        while let Some(cause) = source {
            eprintln!("  caused by: {cause}");
            source = cause.source();
        }
        process::exit(1);
    }
}

struct Overrides {
    data_dir: Option<PathBuf>,
    seed: Option<u64>,
    test_fraction: Option<f64>,
    trees: Option<usize>,
    max_depth: Option<usize>,
    max_iterations: Option<usize>,
    reject_invalid_stays: bool,
}

fn policy(reject: bool) -> InvalidStayPolicy {
    if reject { InvalidStayPolicy::Reject } else { InvalidStayPolicy::Drop }
}

fn predict_command(config_path: Option<PathBuf>, overrides: Overrides) -> Result<()> {
    let mut config = match config_path {
        Some(path) => PipelineConfig::from_toml_file(path)?,
        None => PipelineConfig::default(),
    };

    if let Some(dir) = overrides.data_dir {
        config.data_dir = dir;
    }
    if let Some(seed) = overrides.seed {
        config.seed = seed;
    }
    if let Some(fraction) = overrides.test_fraction {
        config.test_fraction = fraction;
    }
    if let Some(trees) = overrides.trees {
        config.forest.n_trees = trees;
    }
    if let Some(depth) = overrides.max_depth {
        config.forest.max_depth = depth;
    }
    if let Some(iterations) = overrides.max_iterations {
        config.logistic.max_iterations = iterations;
    }
    if overrides.reject_invalid_stays {
        config.invalid_stays = InvalidStayPolicy::Reject;
    }
    config.validate()?;
    log::debug!("effective config:\n{}", config.to_toml_string()?);

    log::info!("reading tables from {}", config.data_dir.display());
    let store = CsvRecordStore::from_dir(&config.data_dir);
    let report = ReadmissionPipeline::new(config).run(&store)?;
    report.print();
    Ok(())
}

fn kpi_command(data_dir: PathBuf, policy: InvalidStayPolicy) -> Result<()> {
    let store = CsvRecordStore::from_dir(&data_dir);
    let table = merge_tables(&store.admissions()?, &store.patients()?, &store.billing()?, policy)?;
    let kpis = HospitalKpis::compute(&table, &store.doctors()?);
    kpis.print();
    Ok(())
}

fn alerts_command(data_dir: PathBuf, thresholds: AlertThresholds, policy: InvalidStayPolicy) -> Result<()> {
    let store = CsvRecordStore::from_dir(&data_dir);
    let table = merge_tables(&store.admissions()?, &store.patients()?, &store.billing()?, policy)?;
    HighRiskAlerts::compute(&table, thresholds).print();
    Ok(())
}
