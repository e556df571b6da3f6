//! Conjunto CLI
//!
//! # Usage
//!
//! ```bash
//! # Create, train and pack a project
//! conjunto train db.csv --project cn --pools 5 --candidates 10 --processes 4
//!
//! # Predict new rows with a packed project
//! conjunto predict new_rows.csv --project cn --output predictions.csv
//!
//! # End-to-end run on synthetic data
//! conjunto demo
//!
//! # Validate config
//! conjunto validate config.yml
//! ```

use clap::Parser;
use conjunto::config::{
    apply_overrides, load_config, Cli, Command, DemoArgs, PredictArgs, TrainArgs, ValidateArgs,
};
use conjunto::train::{Metric, RMSE};
use conjunto::{DataFrame, DataOptions, ProjectOrchestrator, SubsetKind};
use ndarray::Array2;
use std::fs::File;
use std::io::{self, Write};
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.quiet {
        "warn"
    } else if cli.verbose {
        "debug"
    } else {
        "info"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let result = match cli.command {
        Command::Train(args) => run_train(args),
        Command::Predict(args) => run_predict(args),
        Command::Demo(args) => run_demo(args),
        Command::Validate(args) => run_validate(args),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run_train(args: TrainArgs) -> Result<(), String> {
    let mut orch = ProjectOrchestrator::new(&args.workdir, args.processes)
        .map_err(|e| format!("Setup error: {e}"))?;

    let mut config = orch.config().clone();
    apply_overrides(&mut config, &args);
    orch.set_config(config)
        .map_err(|e| format!("Config error: {e}"))?;

    let options = DataOptions::from_config(orch.config());
    orch.load_data(&args.database, &options)
        .map_err(|e| format!("Data error: {e}"))?;
    orch.create_project(&args.project, args.pools, args.candidates)
        .map_err(|e| format!("Project error: {e}"))?;

    let report = orch.train().map_err(|e| format!("Training error: {e}"))?;
    print!("{report}");
    report_test_error(&orch);

    let archive = orch
        .save_project()
        .map_err(|e| format!("Save error: {e}"))?;
    println!("Saved {}", archive.display());
    Ok(())
}

fn run_predict(args: PredictArgs) -> Result<(), String> {
    let mut orch =
        ProjectOrchestrator::open(&args.workdir).map_err(|e| format!("Setup error: {e}"))?;
    let frame = DataFrame::from_csv(&args.database).map_err(|e| format!("Data error: {e}"))?;
    orch.load_project(&args.project)
        .map_err(|e| format!("Load error: {e}"))?;

    let predictions = orch.predict_frame(&frame);
    // pack again whether or not prediction worked
    orch.save_project()
        .map_err(|e| format!("Save error: {e}"))?;
    let predictions = predictions.map_err(|e| format!("Prediction error: {e}"))?;

    let sink: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(File::create(path).map_err(|e| format!("Output error: {e}"))?),
        None => Box::new(io::stdout()),
    };
    write_predictions(sink, &frame, &predictions).map_err(|e| format!("Output error: {e}"))
}

fn write_predictions(
    sink: Box<dyn Write>,
    frame: &DataFrame,
    predictions: &Array2<f32>,
) -> Result<(), csv::Error> {
    let mut writer = csv::Writer::from_writer(sink);
    let mut header = vec!["DATAID".to_string()];
    header.extend(frame.target_names.iter().cloned());
    writer.write_record(&header)?;
    for (id, row) in frame.ids.iter().zip(predictions.rows()) {
        let mut record = vec![id.clone()];
        record.extend(row.iter().map(|v| v.to_string()));
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}

fn report_test_error(orch: &ProjectOrchestrator) {
    let Some(dataset) = orch.dataset() else {
        return;
    };
    if dataset.test.is_empty() {
        return;
    }
    match orch.predict_subset(SubsetKind::Test) {
        Ok(predictions) => println!(
            "Ensemble test RMSE: {:.6}",
            RMSE.compute(predictions.view(), dataset.test.targets.view())
        ),
        Err(e) => log::warn!("Could not score the test subset: {e}"),
    }
}

/// `y = sin(3 x0) + x1² - 0.5 x2`, inputs on a deterministic grid
fn synthetic_frame(rows: usize) -> Result<DataFrame, String> {
    let x = Array2::from_shape_fn((rows, 3), |(r, c)| {
        let t = r as f32 / rows.max(1) as f32;
        match c {
            0 => t,
            1 => (t * 7.0).fract(),
            _ => (t * 13.0).fract(),
        }
    });
    let y = Array2::from_shape_fn((rows, 1), |(r, _)| {
        (3.0 * x[[r, 0]]).sin() + x[[r, 1]].powi(2) - 0.5 * x[[r, 2]]
    });
    DataFrame::new(
        vec!["x0".into(), "x1".into(), "x2".into()],
        vec!["y".into()],
        x,
        y,
    )
    .map_err(|e| format!("Data error: {e}"))
}

fn run_demo(args: DemoArgs) -> Result<(), String> {
    let workdir = args.workdir.clone().unwrap_or_else(|| {
        std::env::temp_dir().join(format!("conjunto-demo-{}", std::process::id()))
    });
    let mut orch = ProjectOrchestrator::new(&workdir, args.processes)
        .map_err(|e| format!("Setup error: {e}"))?;
    let config = orch
        .config()
        .clone()
        .with_epochs(args.epochs)
        .with_hidden_layers(vec![16, 16])
        .with_learning_rate(0.01);
    orch.set_config(config)
        .map_err(|e| format!("Config error: {e}"))?;

    let frame = synthetic_frame(args.rows)?;
    let options = DataOptions::from_config(orch.config())
        .with_normalize(true)
        .with_random(true);
    orch.load_frame(&frame, &options)
        .map_err(|e| format!("Data error: {e}"))?;
    orch.create_project("demo", args.pools, args.candidates)
        .map_err(|e| format!("Project error: {e}"))?;

    let report = orch.train().map_err(|e| format!("Training error: {e}"))?;
    print!("{report}");
    report_test_error(&orch);
    let before = orch
        .predict(None)
        .map_err(|e| format!("Prediction error: {e}"))?;

    let archive = orch
        .save_project()
        .map_err(|e| format!("Save error: {e}"))?;
    println!("Saved {}", archive.display());

    orch.load_project("demo")
        .map_err(|e| format!("Load error: {e}"))?;
    let after = orch
        .predict(None)
        .map_err(|e| format!("Prediction error: {e}"))?;
    if before != after {
        return Err("predictions changed across save and load".to_string());
    }
    println!(
        "Reloaded project reproduces all {} predictions; files kept in {}",
        after.nrows(),
        workdir.display()
    );
    Ok(())
}

fn run_validate(args: ValidateArgs) -> Result<(), String> {
    let config = load_config(&args.config).map_err(|e| format!("{e}"))?;
    println!("Configuration is valid");
    println!("  Epochs: {}", config.epochs);
    println!("  Hidden layers: {:?}", config.hidden_layers);
    println!(
        "  Optimizer: {:?} (lr={})",
        config.optimizer, config.learning_rate
    );
    println!("  Split: {:?}", config.split);
    println!("  Selection metric: {:?}", config.selection_metric);
    Ok(())
}
