use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{ArgGroup, Parser, ValueEnum};
use marco_core::{ConstraintStore, ErrorInfo, Interrupt, MarcoError, Stats};
use marco_enum::{Aim, EnumConfig, Enumerator, Maximize};
use marco_subset::{InProcessSolver, MuserSolver, SubsetSolver};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

const DEFAULT_MINIMIZER: &str = "muser2-static";

#[derive(Parser, Debug)]
#[command(
    name = "marco",
    about = "Enumerate the MUSes and MSSes of a CNF or grouped CNF formula"
)]
#[command(group(ArgGroup::new("maximize").args(["nomax", "max", "max_card", "smus"])))]
struct Cli {
    /// Input in DIMACS CNF or grouped CNF; `-` or nothing reads stdin.
    input: Option<PathBuf>,
    /// Print the 1-based constraint indices of every result.
    #[arg(short, long)]
    verbose: bool,
    /// Print phase timings to stderr when the run ends.
    #[arg(short = 's', long)]
    stats: bool,
    /// Print the statistics report to stderr as JSON.
    #[arg(long)]
    stats_json: bool,
    /// Stop after this many seconds.
    #[arg(short = 'T', long, value_name = "SECS")]
    timeout: Option<f64>,
    /// Stop after this many results.
    #[arg(short, long, value_name = "N")]
    limit: Option<u64>,
    /// Result kind to favour early in the run.
    #[arg(short, long, value_enum)]
    aim: Option<AimArg>,
    /// Do not extremize seeds at all.
    #[arg(long)]
    nomax: bool,
    /// Extremize seeds in the driver, for every seed or only when the check matches the aim.
    #[arg(short = 'm', long = "max", value_enum)]
    max: Option<MaxArg>,
    /// Use cardinality-extremal seeds.
    #[arg(short = 'M', long = "MAX")]
    max_card: bool,
    /// Compute a single smallest MUS.
    #[arg(long)]
    smus: bool,
    /// Look for unexplored immediate supersets of every MSS.
    #[arg(long)]
    mssguided: bool,
    /// Do not treat singleton MCSes as hard constraints.
    #[arg(long)]
    ignore_singletons: bool,
    /// Shrink in-process instead of with the external minimizer.
    #[arg(long)]
    force_minisat: bool,
    /// Path of a MUSer2-compatible minimizer.
    #[arg(long, value_name = "PATH", conflicts_with = "force_minisat")]
    muser: Option<PathBuf>,
    /// Write every clause added to the map formula to FILE.
    #[arg(long, value_name = "FILE")]
    dump_map: Option<PathBuf>,
    /// YAML file with enumeration settings; flags override it.
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
    /// Diagnostics written to stderr.
    #[arg(long, value_enum, default_value_t = LogLevel::Warn)]
    log_level: LogLevel,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum AimArg {
    #[value(name = "MUSes", alias = "muses")]
    Muses,
    #[value(name = "MCSes", alias = "mcses")]
    Mcses,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum MaxArg {
    Always,
    Half,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => Level::ERROR,
            LogLevel::Warn => Level::WARN,
            LogLevel::Info => Level::INFO,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Trace => Level::TRACE,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::from(cli.log_level))
        .with_writer(io::stderr)
        .finish();
    if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("failed to install log subscriber: {err}");
    }

    match run(&cli) {
        Ok(status) => ExitCode::from(status),
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::from(err.exit_status() as u8)
        }
    }
}

fn build_config(cli: &Cli) -> Result<EnumConfig, MarcoError> {
    let mut config = match &cli.config {
        Some(path) => EnumConfig::from_yaml_file(path)?,
        None => EnumConfig::default(),
    };
    if let Some(aim) = cli.aim {
        config.aim = match aim {
            AimArg::Muses => Aim::Muses,
            AimArg::Mcses => Aim::Mcses,
        };
    }
    if cli.nomax {
        config.maximize = Maximize::None;
    }
    if let Some(max) = cli.max {
        config.maximize = match max {
            MaxArg::Always => Maximize::Always,
            MaxArg::Half => Maximize::Half,
        };
    }
    if cli.max_card {
        config.maximize = Maximize::Solver;
        config.optimal_seeds = true;
    }
    if cli.smus {
        config.maximize = Maximize::Solver;
        config.smus = true;
    }
    if cli.mssguided {
        config.mssguided = true;
    }
    if cli.ignore_singletons {
        config.use_singletons = false;
    }
    config.validate()?;
    Ok(config)
}

fn read_store(input: Option<&Path>) -> Result<ConstraintStore, MarcoError> {
    match input {
        None => ConstraintStore::from_dimacs(io::stdin().lock()),
        Some(path) if path == Path::new("-") => ConstraintStore::from_dimacs(io::stdin().lock()),
        Some(path) => {
            let file = File::open(path).map_err(|err| {
                MarcoError::Input(
                    ErrorInfo::new("unreadable-input", err.to_string())
                        .with_context("path", path.display().to_string()),
                )
            })?;
            ConstraintStore::from_dimacs(BufReader::new(file))
        }
    }
}

fn default_minimizer() -> Option<PathBuf> {
    let exe = std::env::current_exe().ok()?;
    Some(exe.parent()?.join(DEFAULT_MINIMIZER))
}

fn subset_solver(
    cli: &Cli,
    store: Arc<ConstraintStore>,
    interrupt: &Interrupt,
) -> Result<Box<dyn SubsetSolver>, MarcoError> {
    if cli.force_minisat {
        return Ok(Box::new(
            InProcessSolver::new(store)?.with_interrupt(interrupt.clone()),
        ));
    }
    if let Some(path) = &cli.muser {
        let solver = MuserSolver::new(store, path)?;
        return Ok(Box::new(solver.with_interrupt(interrupt.clone())));
    }
    let candidate = default_minimizer().unwrap_or_else(|| PathBuf::from(DEFAULT_MINIMIZER));
    match MuserSolver::new(store.clone(), &candidate) {
        Ok(solver) => Ok(Box::new(solver.with_interrupt(interrupt.clone()))),
        Err(err) => {
            warn!(error = %err, "external minimizer unavailable, falling back to in-process shrink");
            Ok(Box::new(
                InProcessSolver::new(store)?.with_interrupt(interrupt.clone()),
            ))
        }
    }
}

fn print_stats(cli: &Cli, stats: &Stats) -> Result<(), MarcoError> {
    if !cli.stats && !cli.stats_json {
        return Ok(());
    }
    let report = stats.report();
    let mut err = io::stderr().lock();
    if cli.stats {
        write!(err, "{}", report.to_text())?;
    }
    if cli.stats_json {
        let json = serde_json::to_string_pretty(&report).map_err(|e| {
            MarcoError::Input(ErrorInfo::new("stats-json", e.to_string()))
        })?;
        writeln!(err, "{json}")?;
    }
    Ok(())
}

/// Routes Ctrl-C into `interrupt`; the default disposition applies before this.
fn install_interrupt_handler(interrupt: &Interrupt) -> Result<(), MarcoError> {
    let handler = interrupt.clone();
    ctrlc::set_handler(move || handler.trigger())
        .map_err(|err| MarcoError::Process(ErrorInfo::new("signal-handler", err.to_string())))
}

fn run(cli: &Cli) -> Result<u8, MarcoError> {
    let config = build_config(cli)?;

    let mut interrupt = Interrupt::new();
    if let Some(secs) = cli.timeout {
        let timeout = Duration::try_from_secs_f64(secs).map_err(|err| {
            MarcoError::Config(
                ErrorInfo::new("bad-timeout", err.to_string()).with_context("timeout", secs.to_string()),
            )
        })?;
        interrupt = interrupt.with_timeout(timeout);
    }

    // Until the handler is installed Ctrl-C keeps its default and ends the
    // process, so an interrupted stdin read or parse never hangs.
    let store = Arc::new(read_store(cli.input.as_deref())?);
    info!(
        constraints = store.len(),
        vars = store.num_vars(),
        hard = store.hard_clauses().len(),
        "input loaded"
    );
    install_interrupt_handler(&interrupt)?;
    let subs = subset_solver(cli, store, &interrupt)?;

    let mut enumerator = Enumerator::new(config, subs)?.with_interrupt(interrupt.clone());
    if let Some(path) = &cli.dump_map {
        let file = File::create(path).map_err(|err| {
            MarcoError::Config(
                ErrorInfo::new("dump-unwritable", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })?;
        enumerator = enumerator.with_map_dump(Box::new(BufWriter::new(file)));
    }

    if cli.limit == Some(0) {
        eprintln!("Result limit reached.");
        print_stats(cli, enumerator.stats())?;
        return Ok(0);
    }

    let mut status = 0u8;
    let mut failure = None;
    let mut emitted = 0u64;
    {
        let mut out = io::stdout().lock();
        for item in enumerator.by_ref() {
            match item {
                Ok(outcome) => {
                    if cli.verbose {
                        let indices: Vec<String> =
                            outcome.subset.iter().map(|idx| (idx + 1).to_string()).collect();
                        writeln!(out, "{} {}", outcome.kind, indices.join(" "))?;
                    } else {
                        writeln!(out, "{}", outcome.kind)?;
                    }
                    emitted += 1;
                    if cli.limit.is_some_and(|limit| emitted >= limit) {
                        out.flush()?;
                        eprintln!("Result limit reached.");
                        break;
                    }
                }
                Err(err) if err.is_interrupted() => {
                    out.flush()?;
                    if err.info().code == "time-limit" {
                        eprintln!("Time limit reached.");
                    } else {
                        eprintln!("Interrupted.");
                    }
                    status = err.exit_status() as u8;
                    break;
                }
                Err(err) => {
                    failure = Some(err);
                    break;
                }
            }
        }
        out.flush()?;
    }

    print_stats(cli, enumerator.stats())?;
    match failure {
        Some(err) => Err(err),
        None => Ok(status),
    }
}
