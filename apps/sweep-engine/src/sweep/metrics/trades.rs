//! Trade log parsing.

/// Closed-trade counts from a trade log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TradeStats {
    /// Closed trades.
    pub total: u64,
    /// Closed trades with positive net P&L.
    pub wins: u64,
}

impl TradeStats {
    /// Win rate in percent, zero without trades.
    pub fn win_rate_pct(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.wins as f64 / self.total as f64 * 100.0
        }
    }
}

/// Count closed and winning trades in a tab-delimited trade log.
///
/// Columns are located by header name. A log without the closed-flag or
/// P&L column counts as having no trades.
pub fn trade_stats(content: &str, closed_column: &str, pnl_column: &str) -> TradeStats {
    let mut lines = content.lines();
    let Some(header) = lines.next() else {
        return TradeStats::default();
    };

    let position = |wanted: &str| {
        header
            .split('\t')
            .position(|name| name.trim().eq_ignore_ascii_case(wanted))
    };
    let (Some(closed_idx), Some(pnl_idx)) = (position(closed_column), position(pnl_column)) else {
        return TradeStats::default();
    };

    let mut stats = TradeStats::default();
    for line in lines {
        let fields: Vec<&str> = line.trim_end_matches('\r').split('\t').collect();
        let (Some(closed), Some(pnl)) = (fields.get(closed_idx), fields.get(pnl_idx)) else {
            continue;
        };
        if !is_truthy(closed) {
            continue;
        }

        stats.total += 1;
        if pnl.trim().parse::<f64>().is_ok_and(|pnl| pnl > 0.0) {
            stats.wins += 1;
        }
    }
    stats
}

fn is_truthy(flag: &str) -> bool {
    matches!(
        flag.trim().to_ascii_lowercase().as_str(),
        "1" | "1.0" | "true" | "yes" | "y"
    )
}
