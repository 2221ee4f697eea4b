//! TrendGate CLI — single runs, parameter sweeps, heatmaps and synthetic data.
//!
//! Commands:
//! - `run` — simulate one parameter set and write the artifact set
//! - `sweep` — rank every point of a parameter grid
//! - `heatmap` — score matrix over two parameters
//! - `synth` — write a seeded synthetic candle series as CSV
//!
//! Candles come from `--data <csv>`; without it a seeded synthetic series is
//! used. Logging goes to stderr and honours `RUST_LOG`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;
use trendgate_core::domain::Candle;
use trendgate_core::synthetic::{self, SyntheticConfig};
use trendgate_core::{RunResult, StrategyParams};
use trendgate_runner::export::write_candles;
use trendgate_runner::{
    load_candles, write_run_artifacts, write_sweep_artifacts, Axis, FitnessMetric, Heatmap,
    Optimizer, ParamGrid, Score, SweepConfig, SweepProgress, SweepReport, WeightedBlend,
};

#[derive(Parser)]
#[command(
    name = "trendgate",
    version,
    about = "TrendGate CLI — trend-following strategy simulation and parameter sweeps"
)]
struct Cli {
    /// Debug-level logging (overridden by RUST_LOG).
    #[arg(long, short, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct DataArgs {
    /// Candle CSV file. Without it, a synthetic series is generated.
    #[arg(long)]
    data: Option<PathBuf>,

    /// Synthetic series length when no --data is given.
    #[arg(long, default_value_t = 2_000)]
    candles: usize,

    /// Synthetic series seed when no --data is given.
    #[arg(long, default_value_t = 42)]
    seed: u64,
}

#[derive(Args)]
struct SweepArgs {
    /// Fitness metric: total_return, sharpe, sortino, profit_factor, win_rate,
    /// expectancy, return_over_drawdown, max_drawdown, or blend.
    #[arg(long, default_value = "total_return")]
    metric: String,

    /// Exact worker count. Defaults to available cores minus --reserve-cores.
    #[arg(long)]
    workers: Option<usize>,

    /// Cores left free when sizing the worker pool.
    #[arg(long, default_value_t = 1)]
    reserve_cores: usize,

    /// Wall-clock budget in seconds; no new point starts once spent.
    #[arg(long)]
    budget_secs: Option<f64>,

    /// Output directory for sweep artifacts.
    #[arg(long, default_value = "results/sweep")]
    output_dir: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Simulate one parameter set.
    Run {
        #[command(flatten)]
        data: DataArgs,

        /// Strategy parameters (TOML, or JSON with a .json extension).
        #[arg(long)]
        params: Option<PathBuf>,

        /// Output directory for result.json, trades.csv, equity.csv, signals.csv.
        #[arg(long, default_value = "results/run")]
        output_dir: PathBuf,
    },
    /// Rank every point of a parameter grid.
    Sweep {
        #[command(flatten)]
        data: DataArgs,

        /// Grid file (TOML with [base] parameters and [[axes]]).
        #[arg(long)]
        grid: Option<PathBuf>,

        /// Base parameters, replacing the grid file's base.
        #[arg(long)]
        params: Option<PathBuf>,

        /// Extra axis, e.g. `atr_length=10:50:5` or `multiplier=2,3,4`. Repeatable.
        #[arg(long = "axis")]
        axes: Vec<String>,

        /// Number of ranked entries to print.
        #[arg(long, default_value_t = 10)]
        top: usize,

        #[command(flatten)]
        sweep: SweepArgs,
    },
    /// Score matrix over two parameters.
    Heatmap {
        #[command(flatten)]
        data: DataArgs,

        /// Base parameters.
        #[arg(long)]
        params: Option<PathBuf>,

        /// Column axis, e.g. `atr_length=10:50:5`.
        #[arg(long)]
        x: String,

        /// Row axis, e.g. `multiplier=1.5:4:0.5`.
        #[arg(long)]
        y: String,

        #[command(flatten)]
        sweep: SweepArgs,
    },
    /// Write a seeded synthetic candle series as CSV.
    Synth {
        #[arg(long, default_value_t = 2_000)]
        candles: usize,

        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// Destination CSV file.
        #[arg(long, default_value = "data/synthetic.csv")]
        output: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Run {
            data,
            params,
            output_dir,
        } => run_cmd(&data, params.as_deref(), &output_dir),
        Commands::Sweep {
            data,
            grid,
            params,
            axes,
            top,
            sweep,
        } => sweep_cmd(&data, grid.as_deref(), params.as_deref(), &axes, top, &sweep),
        Commands::Heatmap {
            data,
            params,
            x,
            y,
            sweep,
        } => heatmap_cmd(&data, params.as_deref(), &x, &y, &sweep),
        Commands::Synth {
            candles,
            seed,
            output,
        } => synth_cmd(candles, seed, &output),
    }
}

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

// ─── Inputs ─────────────────────────────────────────────────────────

fn load_data(args: &DataArgs) -> Result<Vec<Candle>> {
    match &args.data {
        Some(path) => {
            let candles = load_candles(path)
                .with_context(|| format!("failed to load candles from {}", path.display()))?;
            info!(path = %path.display(), candles = candles.len(), "loaded candles");
            Ok(candles)
        }
        None => {
            info!(candles = args.candles, seed = args.seed, "using synthetic candles");
            Ok(synthetic::generate(&SyntheticConfig {
                candles: args.candles,
                seed: args.seed,
                ..SyntheticConfig::default()
            }))
        }
    }
}

fn load_params(path: Option<&Path>) -> Result<StrategyParams> {
    let Some(path) = path else {
        return Ok(StrategyParams::default());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let params = if path.extension().is_some_and(|e| e == "json") {
        StrategyParams::from_json_str(&text)?
    } else {
        StrategyParams::from_toml_str(&text)?
    };
    Ok(params)
}

fn parse_score(name: &str) -> Result<Box<dyn Score>> {
    if name == "blend" {
        return Ok(Box::new(WeightedBlend::default()));
    }
    Ok(Box::new(name.parse::<FitnessMetric>()?))
}

fn parse_budget(secs: Option<f64>) -> Result<Option<Duration>> {
    let Some(secs) = secs else {
        return Ok(None);
    };
    match Duration::try_from_secs_f64(secs) {
        Ok(budget) => Ok(Some(budget)),
        Err(e) => bail!("invalid --budget-secs {secs}: {e}"),
    }
}

fn build_optimizer(args: &SweepArgs) -> Result<Optimizer> {
    Ok(Optimizer::new(SweepConfig {
        reserve_cores: args.reserve_cores,
        workers: args.workers,
        budget: parse_budget(args.budget_secs)?,
        ..SweepConfig::default()
    })?)
}

/// Logs roughly every tenth of the grid, with the leader at that moment.
fn progress_logger() -> impl FnMut(&SweepProgress<'_>) {
    let mut next_report = 0usize;
    move |p: &SweepProgress<'_>| {
        let done = p.finished + p.not_started;
        if done < next_report && done != p.total {
            return;
        }
        next_report = done + (p.total / 10).max(1);
        info!(
            done,
            total = p.total,
            failed = p.failed,
            best = ?p.best.and_then(|b| b.score()),
            elapsed_secs = p.elapsed_secs,
            "sweep progress"
        );
    }
}

// ─── Commands ───────────────────────────────────────────────────────

fn run_cmd(data: &DataArgs, params: Option<&Path>, output_dir: &Path) -> Result<()> {
    let candles = load_data(data)?;
    let params = load_params(params)?;
    let result = trendgate_core::run(&candles, &params)?;

    print_summary(&result);

    let run_dir = write_run_artifacts(&result, output_dir)?;
    info!(dir = %run_dir.display(), "artifacts saved");
    Ok(())
}

fn sweep_cmd(
    data: &DataArgs,
    grid_path: Option<&Path>,
    params: Option<&Path>,
    axes: &[String],
    top: usize,
    args: &SweepArgs,
) -> Result<()> {
    let mut grid = match grid_path {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            ParamGrid::from_toml_str(&text)?
        }
        None => ParamGrid::default(),
    };
    if params.is_some() {
        grid.base = load_params(params)?;
    }
    for axis in axes {
        grid = grid.with_axis(axis.parse::<Axis>()?);
    }
    if grid.axes.is_empty() {
        bail!("no axes: pass --grid or at least one --axis");
    }

    let candles = load_data(data)?;
    let score = parse_score(&args.metric)?;
    let optimizer = build_optimizer(args)?;
    let mut on_progress = progress_logger();

    let report = optimizer.sweep(
        &candles,
        &grid,
        score.as_ref(),
        Some(&mut on_progress),
        None,
    )?;

    print_ranking(&report, top);
    let heatmap = if grid.axes.len() == 2 {
        Some(Heatmap::from_report(&grid, &report)?)
    } else {
        None
    };
    let out = write_sweep_artifacts(&report, heatmap.as_ref(), &args.output_dir)?;
    info!(dir = %out.display(), "artifacts saved");
    Ok(())
}

fn heatmap_cmd(
    data: &DataArgs,
    params: Option<&Path>,
    x: &str,
    y: &str,
    args: &SweepArgs,
) -> Result<()> {
    let candles = load_data(data)?;
    let base = load_params(params)?;
    let x: Axis = x.parse()?;
    let y: Axis = y.parse()?;
    let score = parse_score(&args.metric)?;
    let optimizer = build_optimizer(args)?;
    let mut on_progress = progress_logger();

    // Duplicate parameters are rejected by grid validation.
    let grid = ParamGrid::new(base).with_axis(x).with_axis(y);
    let report = optimizer.sweep(
        &candles,
        &grid,
        score.as_ref(),
        Some(&mut on_progress),
        None,
    )?;
    let map = Heatmap::from_report(&grid, &report)?;

    print_heatmap(&map);
    let out = write_sweep_artifacts(&report, Some(&map), &args.output_dir)?;
    info!(dir = %out.display(), "artifacts saved");
    Ok(())
}

fn synth_cmd(candles: usize, seed: u64, output: &Path) -> Result<()> {
    let series = synthetic::generate(&SyntheticConfig {
        candles,
        seed,
        ..SyntheticConfig::default()
    });
    write_candles(&series, output)?;
    info!(path = %output.display(), candles = series.len(), seed, "synthetic candles written");
    Ok(())
}

// ─── Output ─────────────────────────────────────────────────────────

fn print_summary(result: &RunResult) {
    let m = &result.metrics;
    println!();
    println!("=== Run Result ===");
    println!(
        "Candles:        {} (window starts at {})",
        result.candles_with_indicator.len(),
        result.window_start
    );
    println!(
        "Signals:        {} ({} allowed)",
        result.signals.len(),
        result.signals.iter().filter(|s| s.allowed).count()
    );
    println!(
        "Trades:         {} ({} long, {} short, {} re-entries)",
        m.total_trades, m.long_trades, m.short_trades, m.reentry_trades
    );
    if result.open_trade.is_some() {
        println!("Open trade:     yes (marked to last close)");
    }
    println!();
    println!("--- Performance ---");
    println!("Total Return:   {:.2}%", m.total_return_percent);
    println!("Final Capital:  {:.2}", result.final_capital);
    println!("Max Drawdown:   {:.2}% ({:?})", m.max_drawdown_percent, m.drawdown_basis);
    println!("Win Rate:       {:.1}%", m.win_rate * 100.0);
    println!("Profit Factor:  {:.2}", m.profit_factor);
    println!("Expectancy:     {:.2}%", m.expectancy_percent);
    println!("Sharpe:         {:.3}", m.sharpe);
    println!("Sortino:        {:.3}", m.sortino);
    println!("SL / TP exits:  {} / {}", m.stop_loss_exits, m.take_profit_exits);
    println!("Commission:     {:.2}", m.total_commission);
    if let Some(index) = m.capital_exhausted_at {
        println!();
        println!("WARNING: capital exhausted at candle {index}");
    }
    println!();
}

fn print_ranking(report: &SweepReport, top: usize) {
    println!();
    println!(
        "=== Sweep: {} of {} points, {:?}, {} workers, {:.1}s ===",
        report.entries.len(),
        report.total_points,
        report.stop_reason,
        report.workers,
        report.elapsed_secs
    );
    println!("Score: {}", report.score_name);
    if report.not_started > 0 {
        println!("Not started: {}", report.not_started);
    }
    println!();
    println!(
        "{:>4} {:>6} {:>12} {:>10} {:>8} {:>8}  Parameters",
        "Rank", "Index", "Score", "Return%", "MaxDD%", "Trades"
    );
    println!("{}", "-".repeat(72));
    for (rank, entry) in report.top(top).iter().enumerate() {
        let Some(ev) = entry.evaluation() else {
            continue;
        };
        let params = entry
            .assignments
            .iter()
            .map(|a| format!("{}={}", a.param, a.value))
            .collect::<Vec<_>>()
            .join(" ");
        println!(
            "{:>4} {:>6} {:>12.4} {:>10.2} {:>8.2} {:>8}  {}",
            rank + 1,
            entry.grid_index,
            ev.score,
            ev.metrics.total_return_percent,
            ev.metrics.max_drawdown_percent,
            ev.metrics.total_trades,
            params
        );
    }
    let failed = report.failed().count();
    if failed > 0 {
        println!();
        println!("{failed} point(s) failed; see sweep.csv for reasons");
    }
    println!();
}

fn print_heatmap(map: &Heatmap) {
    println!();
    println!("=== Heatmap: {} ({} \\ {}) ===", map.score_name, map.y.param, map.x.param);
    print!("{:>10}", "");
    for x in &map.x.values {
        print!(" {x:>10}");
    }
    println!();
    for (y, row) in map.y.values.iter().zip(&map.cells) {
        print!("{y:>10}");
        for cell in row {
            match cell {
                Some(score) => print!(" {score:>10.2}"),
                None => print!(" {:>10}", "-"),
            }
        }
        println!();
    }
    if let Some(best) = map.best() {
        println!();
        println!(
            "Best: {}={} {}={} -> {:.4}",
            map.x.param, best.x, map.y.param, best.y, best.score
        );
    }
    println!();
}
