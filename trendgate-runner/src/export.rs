//! Reporting and export — JSON and CSV artifacts for runs, sweeps and heatmaps.
//!
//! String builders (`*_csv`, `*_json`) are pure; the `write_*` functions lay
//! the same content out on disk:
//! - run directory: `result.json`, `trades.csv`, `equity.csv`, `signals.csv`
//! - sweep directory: `sweep.json`, `sweep.csv`, and `heatmap.csv` when given

use std::path::{Path, PathBuf};

use trendgate_core::domain::{Candle, ClosedTrade};
use trendgate_core::ledger::EquityPoint;
use trendgate_core::signal::Signal;
use trendgate_core::RunResult;

use crate::error::ExportError;
use crate::heatmap::Heatmap;
use crate::sweep::{PointOutcome, SweepReport};

// ─── JSON export ────────────────────────────────────────────────────

/// Serialize a run result to pretty JSON.
pub fn result_json(result: &RunResult) -> Result<String, ExportError> {
    Ok(serde_json::to_string_pretty(result)?)
}

/// Serialize a sweep report to pretty JSON.
pub fn sweep_json(report: &SweepReport) -> Result<String, ExportError> {
    Ok(serde_json::to_string_pretty(report)?)
}

// ─── CSV export ─────────────────────────────────────────────────────

fn finish(wtr: csv::Writer<Vec<u8>>) -> Result<String, ExportError> {
    let data = wtr
        .into_inner()
        .map_err(|e| ExportError::Flush(e.error().to_string()))?;
    String::from_utf8(data).map_err(|e| ExportError::Flush(e.to_string()))
}

/// Candle series in the layout `data_loader` reads back.
pub fn candles_csv(candles: &[Candle]) -> Result<String, ExportError> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["timestamp", "open", "high", "low", "close", "volume"])?;
    for c in candles {
        wtr.write_record([
            c.timestamp.to_rfc3339(),
            c.open.to_string(),
            c.high.to_string(),
            c.low.to_string(),
            c.close.to_string(),
            c.volume.to_string(),
        ])?;
    }
    finish(wtr)
}

/// Trade tape, one row per closed trade.
///
/// Columns: trade_id, direction, entry_index, entry_time, entry_price,
/// exit_index, exit_time, exit_price, exit_reason, levels_hit, is_reentry,
/// bars_held, pnl_percent, leveraged_pnl_percent, commission_percent,
/// net_pnl_percent, net_pnl, capital_after
pub fn trades_csv(trades: &[ClosedTrade]) -> Result<String, ExportError> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "trade_id",
        "direction",
        "entry_index",
        "entry_time",
        "entry_price",
        "exit_index",
        "exit_time",
        "exit_price",
        "exit_reason",
        "levels_hit",
        "is_reentry",
        "bars_held",
        "pnl_percent",
        "leveraged_pnl_percent",
        "commission_percent",
        "net_pnl_percent",
        "net_pnl",
        "capital_after",
    ])?;

    for t in trades {
        let levels_hit = t.per_level_outcomes.iter().filter(|o| o.hit).count();
        wtr.write_record([
            t.trade_id.to_string(),
            format!("{:?}", t.direction),
            t.entry_index.to_string(),
            t.entry_time.to_rfc3339(),
            format!("{:.6}", t.entry_price),
            t.exit_index.to_string(),
            t.exit_time.to_rfc3339(),
            format!("{:.6}", t.exit_price),
            format!("{:?}", t.exit_reason),
            levels_hit.to_string(),
            t.is_reentry.to_string(),
            t.bars_held.to_string(),
            format!("{:.4}", t.weighted_pnl_percent),
            format!("{:.4}", t.accounting.leveraged_pnl_percent),
            format!("{:.4}", t.accounting.commission_percent),
            format!("{:.4}", t.accounting.net_pnl_percent),
            format!("{:.2}", t.accounting.net_pnl),
            format!("{:.2}", t.accounting.capital_after),
        ])?;
    }
    finish(wtr)
}

/// Equity curve with per-point drawdown.
pub fn equity_csv(curve: &[EquityPoint]) -> Result<String, ExportError> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["index", "time", "equity", "drawdown_percent"])?;
    for p in curve {
        wtr.write_record([
            p.index.to_string(),
            p.time.to_rfc3339(),
            format!("{:.2}", p.equity),
            format!("{:.4}", p.drawdown_percent),
        ])?;
    }
    finish(wtr)
}

/// Every signal, allowed or blocked, with its blockers and outcome.
pub fn signals_csv(signals: &[Signal]) -> Result<String, ExportError> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["index", "time", "direction", "allowed", "outcome", "blocked_by"])?;
    for s in signals {
        let blocked_by = s
            .blocking_filters
            .iter()
            .map(|b| format!("{}: {}", b.filter, b.reason))
            .collect::<Vec<_>>()
            .join("; ");
        let outcome = s
            .outcome
            .map(|o| format!("{o:?}"))
            .unwrap_or_default();
        wtr.write_record([
            s.index.to_string(),
            s.time.to_rfc3339(),
            format!("{:?}", s.direction),
            s.allowed.to_string(),
            outcome,
            blocked_by,
        ])?;
    }
    finish(wtr)
}

/// Ranked sweep table, one row per finished grid point.
///
/// Parameter columns follow the grid's axis order. Failed points carry their
/// reason and empty metric columns.
pub fn sweep_csv(report: &SweepReport) -> Result<String, ExportError> {
    let params: Vec<String> = report
        .entries
        .first()
        .map(|e| e.assignments.iter().map(|a| a.param.to_string()).collect())
        .unwrap_or_default();

    let mut wtr = csv::Writer::from_writer(vec![]);
    let mut header = vec!["rank".to_string(), "grid_index".to_string()];
    header.extend(params.iter().cloned());
    header.extend(
        [
            "status",
            "score",
            "total_return_percent",
            "win_rate",
            "max_drawdown_percent",
            "profit_factor",
            "sharpe",
            "total_trades",
            "final_capital",
            "reason",
        ]
        .map(String::from),
    );
    wtr.write_record(&header)?;

    for (rank, entry) in report.entries.iter().enumerate() {
        let mut row = vec![(rank + 1).to_string(), entry.grid_index.to_string()];
        row.extend(entry.assignments.iter().map(|a| a.value.to_string()));
        match &entry.outcome {
            PointOutcome::Evaluated(ev) => row.extend([
                "evaluated".to_string(),
                ev.score.to_string(),
                format!("{:.4}", ev.metrics.total_return_percent),
                format!("{:.4}", ev.metrics.win_rate),
                format!("{:.4}", ev.metrics.max_drawdown_percent),
                ev.metrics.profit_factor.to_string(),
                format!("{:.4}", ev.metrics.sharpe),
                ev.metrics.total_trades.to_string(),
                format!("{:.2}", ev.final_capital),
                String::new(),
            ]),
            PointOutcome::Failed { reason } => {
                row.push("failed".to_string());
                row.extend(std::iter::repeat(String::new()).take(8));
                row.push(reason.clone());
            }
        }
        wtr.write_record(&row)?;
    }
    finish(wtr)
}

/// Score matrix: first column holds `y` values, header holds `x` values.
/// Missing cells are empty.
pub fn heatmap_csv(map: &Heatmap) -> Result<String, ExportError> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    let mut header = vec![format!("{}\\{}", map.y.param, map.x.param)];
    header.extend(map.x.values.iter().map(|v| v.to_string()));
    wtr.write_record(&header)?;

    for (y, cells) in map.y.values.iter().zip(&map.cells) {
        let mut row = vec![y.to_string()];
        row.extend(cells.iter().map(|c| c.map(|s| s.to_string()).unwrap_or_default()));
        wtr.write_record(&row)?;
    }
    finish(wtr)
}

// ─── Artifact bundles ───────────────────────────────────────────────

fn write_file(path: &Path, contents: &str) -> Result<(), ExportError> {
    std::fs::write(path, contents).map_err(|source| ExportError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn create_dir(dir: &Path) -> Result<(), ExportError> {
    std::fs::create_dir_all(dir).map_err(|source| ExportError::Io {
        path: dir.to_path_buf(),
        source,
    })
}

/// Write a candle series to `path` as CSV.
pub fn write_candles(candles: &[Candle], path: &Path) -> Result<(), ExportError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        create_dir(parent)?;
    }
    write_file(path, &candles_csv(candles)?)
}

/// Save the artifact set for a single run into `dir`, creating it if needed.
pub fn write_run_artifacts(result: &RunResult, dir: &Path) -> Result<PathBuf, ExportError> {
    create_dir(dir)?;
    write_file(&dir.join("result.json"), &result_json(result)?)?;
    write_file(&dir.join("trades.csv"), &trades_csv(&result.closed_trades)?)?;
    write_file(&dir.join("equity.csv"), &equity_csv(&result.equity_curve)?)?;
    write_file(&dir.join("signals.csv"), &signals_csv(&result.signals)?)?;
    Ok(dir.to_path_buf())
}

/// Save a sweep report, and its heatmap when there is one, into `dir`.
pub fn write_sweep_artifacts(
    report: &SweepReport,
    heatmap: Option<&Heatmap>,
    dir: &Path,
) -> Result<PathBuf, ExportError> {
    create_dir(dir)?;
    write_file(&dir.join("sweep.json"), &sweep_json(report)?)?;
    write_file(&dir.join("sweep.csv"), &sweep_csv(report)?)?;
    if let Some(map) = heatmap {
        write_file(&dir.join("heatmap.csv"), &heatmap_csv(map)?)?;
    }
    Ok(dir.to_path_buf())
}
