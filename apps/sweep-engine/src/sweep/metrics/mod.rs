//! Performance metrics parsed from a trial's emitted logs.
//!
//! A trial writes one or more timestamped run directories under its logs
//! directory. The lexicographically greatest run is treated as the latest.
//! Each run holds:
//! - a tab-delimited value log (timestamp, date, portfolio value, cash)
//! - a tab-delimited trade log with a header naming its columns
//!
//! Parsing is a pure function of the files on disk.

mod equity;
mod math;
mod trades;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::types::MetricSet;

pub use equity::{DEFAULT_INITIAL_VALUE, TRADING_DAYS};
pub use math::{finite_or_zero, round_to};

/// Where a trial's logs live and which columns to read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogLayout {
    /// Logs directory, relative to the trial directory.
    pub logs_dir: String,
    /// Value log file name inside a run directory.
    pub value_log: String,
    /// Trade log file name inside a run directory.
    pub trade_log: String,
    /// Header name of the portfolio value column.
    pub value_column: String,
    /// Header name of the trade "is closed" flag.
    pub closed_column: String,
    /// Header name of the net P&L column.
    pub pnl_column: String,
}

impl Default for LogLayout {
    fn default() -> Self {
        Self {
            logs_dir: "logs".to_string(),
            value_log: "value.log".to_string(),
            trade_log: "trade.log".to_string(),
            value_column: "value".to_string(),
            closed_column: "isclosed".to_string(),
            pnl_column: "pnlcomm".to_string(),
        }
    }
}

/// Pick the most recent run directory under `logs_root`.
pub fn latest_run_dir(logs_root: &Path) -> Option<PathBuf> {
    fs::read_dir(logs_root)
        .ok()?
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_ok_and(|t| t.is_dir()))
        .max_by_key(|entry| entry.file_name())
        .map(|entry| entry.path())
}

/// Parse the latest run's logs into a [`MetricSet`].
///
/// Returns `None` when there is no run directory, when the run has neither
/// log file, or when a log exists but cannot be read. A run with empty logs
/// yields default-valued metrics.
pub fn parse_metrics(trial_dir: &Path, layout: &LogLayout) -> Option<MetricSet> {
    let run_dir = latest_run_dir(&trial_dir.join(&layout.logs_dir))?;
    debug!(run_dir = %run_dir.display(), "Parsing trial logs");

    let value_log = read_optional(&run_dir.join(&layout.value_log)).ok()?;
    let trade_log = read_optional(&run_dir.join(&layout.trade_log)).ok()?;
    if value_log.is_none() && trade_log.is_none() {
        return None;
    }

    let values = value_log
        .as_deref()
        .map(|content| equity::read_values(content, &layout.value_column))
        .unwrap_or_default();
    let equity = equity::equity_stats(&values);

    let trades = trade_log
        .as_deref()
        .map(|content| trades::trade_stats(content, &layout.closed_column, &layout.pnl_column))
        .unwrap_or_default();

    Some(MetricSet {
        total_return_pct: round_to(equity.total_return_pct, 4),
        annual_return_pct: round_to(equity.annual_return_pct, 4),
        sharpe_ratio: round_to(equity.sharpe_ratio, 4),
        max_drawdown_pct: round_to(equity.max_drawdown_pct, 4),
        total_trades: trades.total,
        win_rate_pct: round_to(trades.win_rate_pct(), 2),
        final_value: round_to(equity.final_value, 2),
    })
}

fn read_optional(path: &Path) -> io::Result<Option<String>> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}
