use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Args, Parser, Subcommand, ValueEnum};
use color_eyre::eyre::{bail, WrapErr};
use color_eyre::Result;
use core_sim::{evaluate_batch, Geography, ObservationLayout, TemplateKind};
use serde::Serialize;
use sim_runtime::{ActionPlan, RunRecord};
use tracing::info;

mod session;

use session::{load_config, load_scenario, PolicyChoice, RunOptions, ScenarioSource};

#[derive(Parser, Debug)]
#[command(author, version, about = "Headless disaster-response scenario runner", long_about = None)]
struct Cli {
    /// Dynamics config JSON (defaults to SIM_DYNAMICS_CONFIG_PATH or the builtin).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a scenario to completion and print its metrics.
    Run(RunArgs),
    /// Re-execute a stored run record and verify its state history.
    Replay {
        #[command(flatten)]
        scenario: ScenarioArgs,
        /// Run record JSON produced by `run --record`.
        #[arg(long)]
        record: PathBuf,
    },
    /// Evaluate a policy over many seeds in parallel.
    Batch {
        #[command(flatten)]
        scenario: ScenarioArgs,
        #[arg(long, value_enum, default_value_t = PolicyChoice::Random)]
        policy: PolicyChoice,
        /// Number of policy seeds, starting at 0.
        #[arg(long, default_value_t = 16)]
        runs: u64,
    },
    /// Print a generated template scenario as JSON.
    Template {
        #[arg(value_enum)]
        kind: TemplateArg,
        #[arg(long, default_value_t = 0)]
        seed: u64,
    },
    /// Print a JSON schema for one of the persisted documents.
    Schema {
        #[arg(value_enum)]
        document: SchemaDocument,
    },
    /// List the observation features of a scenario in encoding order.
    Layout {
        #[command(flatten)]
        scenario: ScenarioArgs,
    },
}

#[derive(Args, Debug)]
struct ScenarioArgs {
    /// Scenario JSON file.
    #[arg(long, conflicts_with = "template")]
    scenario: Option<PathBuf>,
    /// Built-in template to generate instead of a file.
    #[arg(long, value_enum)]
    template: Option<TemplateArg>,
    /// Seed for template generation.
    #[arg(long, default_value_t = 0)]
    template_seed: u64,
}

impl ScenarioArgs {
    fn source(&self) -> Result<ScenarioSource> {
        match (&self.scenario, self.template) {
            (Some(path), _) => Ok(ScenarioSource::File(path.clone())),
            (None, Some(kind)) => Ok(ScenarioSource::Template(kind.into(), self.template_seed)),
            (None, None) => bail!("either --scenario or --template is required"),
        }
    }
}

#[derive(Args, Debug)]
struct RunArgs {
    #[command(flatten)]
    scenario: ScenarioArgs,
    /// Operator action script for the human side.
    #[arg(long)]
    script: Option<PathBuf>,
    #[arg(long, value_enum, default_value_t = ModeArg::Manual)]
    mode: ModeArg,
    /// Policy used for the AI side.
    #[arg(long, value_enum, default_value_t = PolicyChoice::Random)]
    policy: PolicyChoice,
    #[arg(long, default_value_t = 0)]
    policy_seed: u64,
    /// Write the run record JSON here.
    #[arg(long)]
    record: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ModeArg {
    Manual,
    AiAssisted,
    AiOnly,
    Comparison,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum TemplateArg {
    UrbanEarthquake,
    CoastalFlood,
    TropicalCyclone,
}

impl From<TemplateArg> for TemplateKind {
    fn from(value: TemplateArg) -> Self {
        match value {
            TemplateArg::UrbanEarthquake => TemplateKind::UrbanEarthquake,
            TemplateArg::CoastalFlood => TemplateKind::CoastalFlood,
            TemplateArg::TropicalCyclone => TemplateKind::TropicalCyclone,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum SchemaDocument {
    Scenario,
    ActionRecord,
    RunRecord,
    ActionPlan,
}

fn main() -> Result<()> {
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Command::Run(args) => {
            let scenario = load_scenario(&args.scenario.source()?)?;
            let plan = match &args.script {
                Some(path) => Some(session::load_plan(path, &scenario)?),
                None => None,
            };
            let options = RunOptions {
                mode: match args.mode {
                    ModeArg::Manual => sim_runtime::SimulationMode::Manual,
                    ModeArg::AiAssisted => sim_runtime::SimulationMode::AiAssisted,
                    ModeArg::AiOnly => sim_runtime::SimulationMode::AiOnly,
                    ModeArg::Comparison => sim_runtime::SimulationMode::Comparison,
                },
                policy: args.policy,
                policy_seed: args.policy_seed,
            };
            let outcome = session::run(scenario, config, plan.unwrap_or_default(), options)?;
            if let Some(path) = &args.record {
                write_json(path, &outcome.record)?;
                info!(path = %path.display(), "record.written");
            }
            print_json(&outcome.summary)?;
        }
        Command::Replay {
            scenario,
            record: path,
        } => {
            let scenario = load_scenario(&scenario.source()?)?;
            let text = fs::read_to_string(&path)
                .wrap_err_with(|| format!("failed to read record {}", path.display()))?;
            let record: RunRecord = serde_json::from_str(&text)
                .wrap_err_with(|| format!("failed to parse record {}", path.display()))?;
            let metrics = session::verify_replay(scenario, config, &record)?;
            print_json(&metrics)?;
        }
        Command::Batch {
            scenario,
            policy,
            runs,
        } => {
            let scenario = load_scenario(&scenario.source()?)?;
            let geography = Arc::new(Geography::from_scenario(scenario, &config)?);
            let seeds: Vec<u64> = (0..runs).collect();
            let outcomes = evaluate_batch(geography, config, &seeds, |seed| policy.build(seed))?;
            print_json(&outcomes)?;
        }
        Command::Template { kind, seed } => {
            print_json(&core_sim::templates::build(kind.into(), seed))?;
        }
        Command::Schema { document } => match document {
            SchemaDocument::Scenario => print_json(&sim_runtime::scenario_schema())?,
            SchemaDocument::ActionRecord => print_json(&sim_runtime::action_record_schema())?,
            SchemaDocument::RunRecord => print_json(&sim_runtime::run_record_schema())?,
            SchemaDocument::ActionPlan => print_json(&schemars::schema_for!(ActionPlan))?,
        },
        Command::Layout { scenario } => {
            let scenario = load_scenario(&scenario.source()?)?;
            let geography = Geography::from_scenario(scenario, &config)?;
            let layout = ObservationLayout::from_geography(&geography);
            for (index, name) in layout.describe().iter().enumerate() {
                println!("{index:>4} {name}");
            }
        }
    }

    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json).wrap_err_with(|| format!("failed to write {}", path.display()))
}
