//! CLI argument parsing
//!
//! # Usage
//!
//! ```bash
//! conjunto train db.csv --project cn --pools 5 --candidates 10 --processes 4
//! conjunto predict new_rows.csv --project cn
//! conjunto demo --rows 200
//! conjunto validate config.yml
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use super::schema::{Config, SelectionMetric};

/// Conjunto: ensemble training orchestration
#[derive(Parser, Debug, Clone, PartialEq)]
#[command(name = "conjunto")]
#[command(version)]
#[command(about = "Train pools of candidate regressors, keep the best of each pool, average them")]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

/// Available commands
#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Create a project, train it on a database and pack it
    Train(TrainArgs),

    /// Unpack a project, predict rows of a database and pack it again
    Predict(PredictArgs),

    /// Train and predict on synthetic data
    Demo(DemoArgs),

    /// Validate a configuration file
    Validate(ValidateArgs),
}

/// Arguments for the train command
#[derive(Parser, Debug, Clone, PartialEq)]
pub struct TrainArgs {
    /// Two-header CSV database
    #[arg(value_name = "DB")]
    pub database: PathBuf,

    /// Project name
    #[arg(short, long)]
    pub project: String,

    /// Working directory holding config.yml and projects
    #[arg(short, long, default_value = ".")]
    pub workdir: PathBuf,

    #[arg(long, default_value_t = 1)]
    pub processes: usize,

    #[arg(long, default_value_t = 1)]
    pub pools: usize,

    #[arg(long, default_value_t = 1)]
    pub candidates: usize,

    /// Override number of epochs
    #[arg(short, long)]
    pub epochs: Option<usize>,

    /// Override learning rate
    #[arg(short, long)]
    pub lr: Option<f32>,

    /// Learn/valid/test fractions, e.g. 0.7,0.2,0.1
    #[arg(long)]
    pub split: Option<SplitArg>,

    /// Shuffle rows before splitting
    #[arg(long)]
    pub random: bool,

    /// Min-max scale inputs
    #[arg(long)]
    pub normalize: bool,

    /// Replace inputs with principal components
    #[arg(long)]
    pub transform: bool,

    /// Override the selection metric (rmse, mae, med_ae, r2)
    #[arg(long)]
    pub metric: Option<SelectionMetric>,

    /// Random seed for reproducibility
    #[arg(long)]
    pub seed: Option<u64>,
}

/// Arguments for the predict command
#[derive(Parser, Debug, Clone, PartialEq)]
pub struct PredictArgs {
    /// Two-header CSV database with the rows to predict
    #[arg(value_name = "DB")]
    pub database: PathBuf,

    #[arg(short, long)]
    pub project: String,

    #[arg(short, long, default_value = ".")]
    pub workdir: PathBuf,

    /// Write predictions here instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Arguments for the demo command
#[derive(Parser, Debug, Clone, PartialEq)]
pub struct DemoArgs {
    /// Working directory; a temporary one is used when omitted
    #[arg(short, long)]
    pub workdir: Option<PathBuf>,

    #[arg(long, default_value_t = 200)]
    pub rows: usize,

    #[arg(long, default_value_t = 2)]
    pub processes: usize,

    #[arg(long, default_value_t = 3)]
    pub pools: usize,

    #[arg(long, default_value_t = 4)]
    pub candidates: usize,

    #[arg(short, long, default_value_t = 200)]
    pub epochs: usize,
}

/// Arguments for the validate command
#[derive(Parser, Debug, Clone, PartialEq)]
pub struct ValidateArgs {
    /// Path to YAML configuration file
    #[arg(value_name = "CONFIG")]
    pub config: PathBuf,
}

/// Three split fractions given as `learn,valid,test`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SplitArg(pub [f64; 3]);

impl std::str::FromStr for SplitArg {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<f64> = s
            .split(',')
            .map(|p| p.trim().parse::<f64>())
            .collect::<Result<_, _>>()
            .map_err(|e| format!("Invalid split {s:?}: {e}"))?;
        match parts.as_slice() {
            [learn, valid, test] => Ok(SplitArg([*learn, *valid, *test])),
            _ => Err(format!(
                "Invalid split {s:?}: expected three fractions learn,valid,test"
            )),
        }
    }
}

impl std::str::FromStr for SelectionMetric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "rmse" => Ok(SelectionMetric::Rmse),
            "mae" => Ok(SelectionMetric::Mae),
            "med_ae" | "medae" => Ok(SelectionMetric::MedAe),
            "r2" => Ok(SelectionMetric::R2),
            _ => Err(format!(
                "Unknown selection metric: {s}. Valid metrics: rmse, mae, med_ae, r2"
            )),
        }
    }
}

/// Parse CLI arguments from a string slice (for testing)
pub fn parse_args<I, T>(args: I) -> Result<Cli, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    Cli::try_parse_from(args)
}

/// Apply command-line overrides to a Config
pub fn apply_overrides(config: &mut Config, args: &TrainArgs) {
    if let Some(epochs) = args.epochs {
        config.epochs = epochs;
    }
    if let Some(lr) = args.lr {
        config.learning_rate = lr;
    }
    if let Some(SplitArg(split)) = args.split {
        config.split = split;
    }
    if let Some(metric) = args.metric {
        config.selection_metric = metric;
    }
    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    config.random |= args.random;
    config.normalize |= args.normalize;
    config.transform |= args.transform;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_train_command() {
        let cli = parse_args(["conjunto", "train", "db.csv", "--project", "cn"]).unwrap();
        match cli.command {
            Command::Train(args) => {
                assert_eq!(args.database, PathBuf::from("db.csv"));
                assert_eq!(args.project, "cn");
                assert_eq!(args.workdir, PathBuf::from("."));
                assert_eq!((args.pools, args.candidates, args.processes), (1, 1, 1));
                assert!(args.split.is_none());
            }
            _ => panic!("Expected Train command"),
        }
    }

    #[test]
    fn test_parse_train_with_overrides() {
        let cli = parse_args([
            "conjunto",
            "train",
            "db.csv",
            "-p",
            "cn",
            "--pools",
            "5",
            "--candidates",
            "10",
            "--processes",
            "4",
            "--epochs",
            "50",
            "--split",
            "0.6,0.3,0.1",
            "--metric",
            "med_ae",
            "--normalize",
        ])
        .unwrap();
        let Command::Train(args) = cli.command else {
            panic!("Expected Train command");
        };
        assert_eq!((args.pools, args.candidates, args.processes), (5, 10, 4));

        let mut config = Config::default();
        apply_overrides(&mut config, &args);
        assert_eq!(config.epochs, 50);
        assert_eq!(config.split, [0.6, 0.3, 0.1]);
        assert_eq!(config.selection_metric, SelectionMetric::MedAe);
        assert!(config.normalize);
        assert!(!config.transform);
    }

    #[test]
    fn test_parse_predict_and_validate() {
        let cli = parse_args(["conjunto", "-q", "predict", "rows.csv", "-p", "cn"]).unwrap();
        assert!(cli.quiet);
        assert!(matches!(cli.command, Command::Predict(ref a) if a.output.is_none()));

        let cli = parse_args(["conjunto", "validate", "config.yml"]).unwrap();
        assert_eq!(
            cli.command,
            Command::Validate(ValidateArgs {
                config: PathBuf::from("config.yml")
            })
        );
    }

    #[test]
    fn test_demo_defaults() {
        let cli = parse_args(["conjunto", "demo"]).unwrap();
        let Command::Demo(args) = cli.command else {
            panic!("Expected Demo command");
        };
        assert_eq!(args.rows, 200);
        assert!(args.workdir.is_none());
    }

    #[test]
    fn test_split_arg() {
        assert_eq!("0.7, 0.2, 0.1".parse::<SplitArg>(), Ok(SplitArg([0.7, 0.2, 0.1])));
        assert!("0.7,0.3".parse::<SplitArg>().is_err());
        assert!("a,b,c".parse::<SplitArg>().is_err());
    }

    #[test]
    fn test_metric_from_str() {
        assert_eq!("R2".parse::<SelectionMetric>(), Ok(SelectionMetric::R2));
        assert!("f1".parse::<SelectionMetric>().is_err());
    }

    #[test]
    fn test_missing_project_is_an_error() {
        assert!(parse_args(["conjunto", "train", "db.csv"]).is_err());
    }
}
