//! Portfolio value series: parsing and return/drawdown/Sharpe statistics.

use super::math::{mean, std_dev};

/// Observations per year used for annualisation.
pub const TRADING_DAYS: f64 = 252.0;

/// Starting value assumed when the value log has no usable rows.
pub const DEFAULT_INITIAL_VALUE: f64 = 100_000.0;

/// Column index used when the header does not name the value column.
const FALLBACK_VALUE_COLUMN: usize = 2;

/// Raw statistics over a value series. Not yet rounded or sanitised.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EquityStats {
    /// Total return (percent).
    pub total_return_pct: f64,
    /// Annualised return (percent).
    pub annual_return_pct: f64,
    /// Largest peak-to-trough decline (percent).
    pub max_drawdown_pct: f64,
    /// Annualised Sharpe ratio.
    pub sharpe_ratio: f64,
    /// Last value.
    pub final_value: f64,
}

/// Read portfolio values from a tab-delimited value log.
///
/// The first line is a header. The value column is found by name, falling
/// back to the third column. Rows that are short or do not parse are skipped.
pub fn read_values(content: &str, value_column: &str) -> Vec<f64> {
    let mut lines = content.lines();
    let Some(header) = lines.next() else {
        return Vec::new();
    };

    let column = header
        .split('\t')
        .position(|name| name.trim().eq_ignore_ascii_case(value_column))
        .unwrap_or(FALLBACK_VALUE_COLUMN);

    lines
        .filter_map(|line| line.trim_end_matches('\r').split('\t').nth(column))
        .filter_map(|field| field.trim().parse::<f64>().ok())
        .filter(|value| value.is_finite())
        .collect()
}

/// Compute return, drawdown and Sharpe statistics over a value series.
pub fn equity_stats(values: &[f64]) -> EquityStats {
    let first = values.first().copied().unwrap_or(DEFAULT_INITIAL_VALUE);
    let last = values.last().copied().unwrap_or(DEFAULT_INITIAL_VALUE);

    let total_return_pct = if first != 0.0 {
        (last - first) / first * 100.0
    } else {
        0.0
    };

    EquityStats {
        total_return_pct,
        annual_return_pct: annual_return_pct(first, last, values.len()),
        max_drawdown_pct: max_drawdown_pct(values),
        sharpe_ratio: sharpe_ratio(values),
        final_value: last,
    }
}

fn annual_return_pct(first: f64, last: f64, observations: usize) -> f64 {
    let years = observations as f64 / TRADING_DAYS;
    if years <= 0.0 || first <= 0.0 {
        return 0.0;
    }
    let growth = last / first;
    if growth <= 0.0 {
        return 0.0;
    }
    (growth.powf(1.0 / years) - 1.0) * 100.0
}

fn max_drawdown_pct(values: &[f64]) -> f64 {
    let mut peak = f64::NEG_INFINITY;
    let mut max_drawdown = 0.0_f64;

    for &value in values {
        peak = peak.max(value);
        if peak > 0.0 {
            max_drawdown = max_drawdown.max((peak - value) / peak * 100.0);
        }
    }

    max_drawdown
}

fn sharpe_ratio(values: &[f64]) -> f64 {
    let returns: Vec<f64> = values
        .windows(2)
        .filter(|pair| pair[0] != 0.0)
        .map(|pair| pair[1] / pair[0] - 1.0)
        .collect();

    let (Some(avg), Some(std)) = (mean(&returns), std_dev(&returns)) else {
        return 0.0;
    };
    if std == 0.0 {
        return 0.0;
    }
    avg / std * TRADING_DAYS.sqrt()
}
