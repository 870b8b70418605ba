use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::{info, Level};

use seird::io::report::{write_forecast_report, write_forecast_report_file};
use seird::io::scenario::{load_scenario_json, Scenario};
use seird::{daily_new_cases, forecast, CaseHistory, SeirdParams, SolverConfig};

#[derive(Parser)]
#[command(name = "seird")]
#[command(about = "Deterministic SEIR-D epidemic forecaster")]
#[command(version)]
struct Cli {
    /// Logging level (trace, debug, info, warn, error); defaults to $SEIRD_LOG or info
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a forecast from a scenario file or from explicit parameters
    Forecast(ForecastArgs),
    /// Convert comma-separated cumulative totals into daily new counts
    DailyDelta {
        /// Cumulative totals, e.g. 5,8,8,20
        #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
        values: Vec<i64>,
        /// Optional labels, one per value
        #[arg(long, value_delimiter = ',')]
        dates: Vec<String>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Csv,
    Json,
}

#[derive(Args)]
struct ForecastArgs {
    /// JSON scenario file; when given, the parameter flags are ignored
    #[arg(short, long)]
    scenario: Option<PathBuf>,

    #[arg(long, default_value_t = 59_000_000.0)]
    population: f64,
    #[arg(long, default_value_t = 709.0)]
    infected: f64,
    #[arg(long, default_value_t = 0.0)]
    recovered: f64,
    #[arg(long, default_value_t = 0.0)]
    deceased: f64,
    #[arg(long, default_value_t = 2.3)]
    r0: f64,
    /// Incubation period in days
    #[arg(long, default_value_t = 4.0)]
    tinc: f64,
    /// Infectious period in days
    #[arg(long, default_value_t = 14.0)]
    tinf: f64,
    #[arg(long, default_value_t = 0.02)]
    cfr: f64,
    #[arg(long, default_value_t = 14)]
    days: usize,
    /// Exogenous infections per day as a fraction of the population
    #[arg(long, default_value_t = 0.0)]
    inflow: f64,
    /// Use fixed-step RK4 with this step (days) instead of the adaptive solver
    #[arg(long)]
    rk4_dt: Option<f64>,

    /// Write `seird_<run-id>.csv` into this directory instead of stdout
    #[arg(short, long)]
    out_dir: Option<PathBuf>,
    #[arg(long, default_value = "forecast")]
    run_id: String,
    #[arg(long, value_enum, default_value_t = OutputFormat::Csv)]
    format: OutputFormat,
}

impl ForecastArgs {
    fn scenario(&self) -> anyhow::Result<Scenario> {
        if let Some(path) = &self.scenario {
            return load_scenario_json(path);
        }
        let params = SeirdParams::new(
            self.population,
            self.infected,
            self.recovered,
            self.deceased,
            self.r0,
            self.tinc,
            self.tinf,
            self.cfr,
            self.days,
        )
        .with_inflow(self.inflow);
        let solver = match self.rk4_dt {
            Some(dt) => SolverConfig::Rk4 { dt },
            None => SolverConfig::default(),
        };
        Ok(Scenario { params, solver })
    }
}

fn parse_level(s: &str) -> Level {
    match s.to_ascii_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = cli
        .log_level
        .clone()
        .or_else(|| std::env::var("SEIRD_LOG").ok())
        .map(|s| parse_level(&s))
        .unwrap_or(Level::INFO);
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Forecast(args) => run_forecast(&args),
        Command::DailyDelta { values, dates } => run_daily_delta(values, dates),
    }
}

fn run_forecast(args: &ForecastArgs) -> anyhow::Result<()> {
    let scenario = args.scenario()?;
    let traj = forecast::run(&scenario.params, &scenario.solver).context("forecast failed")?;
    info!(run_id = %args.run_id, days = traj.len(), "forecast complete");

    match (args.format, &args.out_dir) {
        (OutputFormat::Csv, Some(dir)) => {
            let path = write_forecast_report_file(dir, &args.run_id, &scenario.params, &traj)?;
            info!("report written to {}", path.display());
        }
        (OutputFormat::Csv, None) => {
            write_forecast_report(std::io::stdout().lock(), &args.run_id, &scenario.params, &traj)?;
        }
        (OutputFormat::Json, Some(dir)) => {
            std::fs::create_dir_all(dir).context("create output dir failed")?;
            let path = dir.join(format!("seird_{}.json", args.run_id));
            let f = std::fs::File::create(&path)
                .with_context(|| format!("create output file failed (path={:?})", path))?;
            serde_json::to_writer_pretty(f, &traj).context("serialize trajectory failed")?;
            info!("trajectory written to {}", path.display());
        }
        (OutputFormat::Json, None) => {
            println!("{}", serde_json::to_string_pretty(&traj)?);
        }
    }
    Ok(())
}

fn run_daily_delta(values: Vec<i64>, dates: Vec<String>) -> anyhow::Result<()> {
    let dates = if dates.is_empty() {
        (0..values.len()).map(|k| k.to_string()).collect()
    } else {
        dates
    };
    let history = CaseHistory::new(dates, values)?;
    let daily = daily_new_cases(&history)?;
    println!("date,daily_new");
    for (d, v) in daily.dates.iter().zip(&daily.counts) {
        println!("{},{}", d, v);
    }
    Ok(())
}
