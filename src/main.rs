//! Feeder study entry point: CLI wiring, logging setup and config-driven runs.

use std::path::PathBuf;

use anyhow::{Context, bail};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use feeder_study::config::StudyConfig;
use feeder_study::io::export::export_scenario;
use feeder_study::report::StudyReport;
use feeder_study::scenario::{RunOptions, run_study, select_scenarios};
use feeder_study::study::hosting::{Direction, search_hosting_capacity};

/// Hourly feeder loading study with battery dispatch and hosting search.
#[derive(Debug, Parser)]
#[command(name = "feeder-study", version)]
struct Cli {
    /// Load the study from a TOML config file.
    #[arg(long, conflicts_with = "preset")]
    config: Option<PathBuf>,

    /// Use a built-in preset (community, flat).
    #[arg(long)]
    preset: Option<String>,

    /// Run only the named scenario; repeat for several (default: all).
    #[arg(long = "scenario", value_name = "NAME")]
    scenarios: Vec<String>,

    /// Override the artifact directory from the config.
    #[arg(long)]
    out_dir: Option<PathBuf>,

    /// Do not write CSV artifacts.
    #[arg(long)]
    no_export: bool,

    /// Run the hosting-capacity search for PV and EV.
    #[arg(long)]
    hosting: bool,

    /// Evaluate the 24 hours of each sweep in parallel.
    #[cfg(feature = "parallel")]
    #[arg(long)]
    parallel: bool,

    /// Start the REST API after the study completes.
    #[cfg(feature = "api")]
    #[arg(long)]
    serve: bool,

    /// API server port.
    #[cfg(feature = "api")]
    #[arg(long, default_value_t = 3000)]
    port: u16,
}

fn load_config(cli: &Cli) -> anyhow::Result<StudyConfig> {
    let config = match (&cli.config, &cli.preset) {
        (Some(path), _) => StudyConfig::from_toml_file(path)?,
        (None, Some(name)) => StudyConfig::from_preset(name)?,
        (None, None) => StudyConfig::community(),
    };
    let errors = config.validate();
    if !errors.is_empty() {
        for e in &errors {
            eprintln!("{e}");
        }
        bail!("configuration has {} error(s)", errors.len());
    }
    Ok(config)
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;
    let inputs = config.study_inputs()?;
    let feeder = config.feeder_model();
    let scenarios = select_scenarios(&config.scenarios, &cli.scenarios)?;

    let out_dir = cli
        .out_dir
        .clone()
        .unwrap_or_else(|| config.study.output_dir.clone());
    if !cli.no_export {
        std::fs::create_dir_all(&out_dir)
            .with_context(|| format!("cannot create output directory {}", out_dir.display()))?;
    }
    let options = RunOptions {
        artifact_dir: (!cli.no_export).then(|| out_dir.clone()),
        #[cfg(feature = "parallel")]
        parallel: cli.parallel,
        #[cfg(not(feature = "parallel"))]
        parallel: false,
    };

    info!(feeder = feeder.name(), scenarios = scenarios.len(), "starting study");
    let outcomes = run_study(&feeder, &inputs, &scenarios, &options)?;

    if !cli.no_export {
        for outcome in &outcomes {
            let written = export_scenario(outcome, &out_dir)
                .with_context(|| format!("failed to export scenario `{}`", outcome.name))?;
            info!(scenario = %outcome.name, files = written.len(), dir = %out_dir.display(), "artifacts written");
        }
    }

    let usable_kwh = config.battery.usable_capacity_kwh();
    let mut report =
        StudyReport::from_outcomes(&outcomes, config.study.loading_limit_pct, usable_kwh);

    if cli.hosting || config.hosting.is_some() {
        let hosting = config.hosting.unwrap_or_default();
        for (direction, unit_profile) in [
            (Direction::Generation, &inputs.pv_pu),
            (Direction::Load, &inputs.ev_pu),
        ] {
            let result = search_hosting_capacity(
                &feeder,
                &inputs.demand_kw,
                unit_profile,
                direction,
                hosting.step_kw,
                hosting.max_kw,
                config.study.loading_limit_pct,
            )?;
            report = report.with_hosting(result);
        }
    }

    println!("{report}");

    #[cfg(feature = "api")]
    if cli.serve {
        use std::net::SocketAddr;
        use std::sync::Arc;

        let state = Arc::new(feeder_study::api::AppState::new(
            outcomes,
            config.study.loading_limit_pct,
            usable_kwh,
        ));
        let addr = SocketAddr::from(([0, 0, 0, 0], cli.port));
        let rt = tokio::runtime::Runtime::new().context("failed to create tokio runtime")?;
        rt.block_on(feeder_study::api::serve(state, addr))
            .with_context(|| format!("API server on {addr} failed"))?;
    }

    Ok(())
}
