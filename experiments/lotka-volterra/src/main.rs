mod model;

use anyhow::{Context, Result};
use labnote_core::{
    print_configuration, Configuration, ConfigStore, Data, DataOptions, ExperimentArgs,
    ExperimentMode, FigureOptions, LinePlot, DEFAULT_DATA_FORMAT, DEFAULT_FIGURE_FORMAT,
};
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

use model::{ModelParams, Observation, Simulation, State, Summary};

const FOLDER: &str = "lotka-volterra";
const TEST_HORIZON: f64 = 5.0;
const TEST_STEPS: usize = 200;
const PLOT_WIDTH: u32 = 800;
const PLOT_HEIGHT: u32 = 480;

#[derive(Serialize, Deserialize)]
struct NotebookSection {
    name: String,
    version: String,
    desc: String,
}

#[derive(Default, Serialize, Deserialize)]
struct ExperimentSection {
    model: ModelParams,
    simulation: Simulation,
    observation: Observation,
}

#[derive(Serialize)]
struct DefaultConfiguration {
    notebook: NotebookSection,
    exp: ExperimentSection,
}

fn main() -> Result<()> {
    init_tracing();

    let args = ExperimentArgs::parse_from_env()?;
    if args.help_requested() {
        print_usage();
        return Ok(());
    }

    let store = ConfigStore::from_env()
        .context("set DATA_PATH in the environment or a .env file")?;
    let config = store
        .load_or_init_configuration(FOLDER, args.suffix(), || {
            default_configuration(args.suffix())
        })
        .with_context(|| format!("failed to load configuration {FOLDER}/{}", args.suffix()))?;

    println!("configuration {}:", args.suffix());
    print_configuration(&config, 2);

    let notebook = config.section("notebook")?;
    store.initialise_experiment(&notebook.name()?, 1)?;
    let exp: ExperimentSection = config.get_as("exp")?;
    let simulation = simulation_for_mode(&exp.simulation, args.mode());

    tracing::info!(
        mode = args.mode().label(),
        start = simulation.start,
        stop = simulation.stop,
        steps = simulation.steps,
        "running Lotka-Volterra"
    );
    let trajectory = model::simulate(&exp.model, &simulation)?;

    let data_options = DataOptions {
        verbose: 1,
        ..DataOptions::default()
    };
    store.save_data(
        &notebook,
        &Data::Table(model::trajectory_table(&trajectory)?),
        "simulation_results",
        "csv",
        &data_options,
    )?;
    store.save_data(
        &notebook,
        &Data::Table(model::observe(&trajectory, &exp.observation)?),
        "observations",
        "csv",
        &data_options,
    )?;

    let summary = model::summarize(&exp.model, &trajectory)?;
    store.save_data(
        &notebook,
        &Data::from_serialize(&summary)?,
        "summary",
        DEFAULT_DATA_FORMAT,
        &DataOptions {
            pretty_json: true,
            ..data_options.clone()
        },
    )?;

    store.save_figure(
        &notebook,
        &population_plot(&trajectory),
        "populations",
        DEFAULT_FIGURE_FORMAT,
        &FigureOptions {
            verbose: 1,
            ..FigureOptions::default()
        },
    )?;

    let reloaded: Summary = store
        .load_data(&notebook, "summary", DEFAULT_DATA_FORMAT, &DataOptions::default())?
        .deserialize_into()?;
    println!(
        "peak prey {:.3} at t={:.2}, peak predator {:.3} at t={:.2}, final ({:.3}, {:.3}), invariant drift {:.1e}",
        reloaded.peak_prey,
        reloaded.peak_prey_time,
        reloaded.peak_predator,
        reloaded.peak_predator_time,
        reloaded.final_prey,
        reloaded.final_predator,
        reloaded.invariant_drift
    );

    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn print_usage() {
    println!(
        "Usage: cargo run -p labnote-experiment-lotka-volterra -- [--mode full|test] [--suffix v1]"
    );
}

fn default_configuration(suffix: &str) -> labnote_core::Result<Configuration> {
    Configuration::from_serialize(&DefaultConfiguration {
        notebook: NotebookSection {
            name: FOLDER.to_string(),
            version: suffix.to_string(),
            desc: "Predator/prey dynamics integrated with RK4".to_string(),
        },
        exp: ExperimentSection::default(),
    })
}

fn simulation_for_mode(simulation: &Simulation, mode: ExperimentMode) -> Simulation {
    match mode {
        ExperimentMode::Full => simulation.clone(),
        ExperimentMode::Test => Simulation {
            start: simulation.start,
            stop: simulation.stop.min(simulation.start + TEST_HORIZON),
            steps: simulation.steps.min(TEST_STEPS),
        },
    }
}

fn population_plot(trajectory: &[State]) -> LinePlot {
    let prey = trajectory.iter().map(|s| (s.time, s.prey)).collect();
    let predator = trajectory.iter().map(|s| (s.time, s.predator)).collect();
    LinePlot::new(PLOT_WIDTH, PLOT_HEIGHT)
        .series("prey", prey)
        .series("predator", predator)
}
