//! Aggregate performance metrics
//!
//! Every function here is a pure fold over a trade slice: the caller decides
//! what view (filtered or full) to hand in, and empty or degenerate inputs
//! produce defined zero values instead of NaN or panics.

use chrono::{Local, NaiveDate};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

use crate::config::DailyGoals;
use crate::types::Trade;

/// Flat notional-risk assumption behind the R-multiple approximation: risk
/// per trade is 2% of entry value, not the trade's actual stop distance.
const RISK_FRACTION: f64 = 0.02;

/// Aggregate statistics over one view of the trade collection
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSummary {
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    /// Percent of trades with positive pnl, 0..=100
    pub win_rate: f64,
    pub total_pnl: f64,
    pub average_win: f64,
    /// Average losing trade as a positive magnitude
    pub average_loss: f64,
    /// Gross profit over gross loss; the raw gross profit when there are no
    /// losing trades
    pub profit_factor: f64,
    pub largest_win: f64,
    pub largest_loss: f64,
    pub max_drawdown: f64,
    pub max_drawdown_percent: f64,
    /// Probability-weighted expected pnl per trade
    pub expectancy: f64,
    /// Longest run of consecutive winners
    pub win_streak: usize,
    /// Longest run of consecutive losers
    pub lose_streak: usize,
    /// Streak still active at the end of the series: positive counts wins,
    /// negative counts losses
    pub current_streak: i64,
    pub avg_r_multiple: f64,
    pub sharpe_ratio: f64,
    /// Kelly bet fraction in percent, clamped to 0..=25 for display
    pub kelly_percent: f64,
}

/// Compute the full summary over the given trades
pub fn compute_metrics(trades: &[Trade]) -> MetricsSummary {
    if trades.is_empty() {
        return MetricsSummary::default();
    }

    let winning: Vec<&Trade> = trades.iter().filter(|t| t.is_win()).collect();
    let losing: Vec<&Trade> = trades.iter().filter(|t| t.is_loss()).collect();

    let total_pnl: f64 = trades.iter().map(|t| t.pnl).sum();
    let gross_wins: f64 = winning.iter().map(|t| t.pnl).sum();
    let gross_losses: f64 = losing.iter().map(|t| t.pnl).sum::<f64>().abs();

    let win_rate_frac = winning.len() as f64 / trades.len() as f64;
    let average_win = if winning.is_empty() {
        0.0
    } else {
        gross_wins / winning.len() as f64
    };
    let average_loss = if losing.is_empty() {
        0.0
    } else {
        gross_losses / losing.len() as f64
    };

    // No losing trades reports the raw gross profit, not infinity
    let profit_factor = if gross_losses > 0.0 {
        gross_wins / gross_losses
    } else {
        gross_wins
    };

    let expectancy = win_rate_frac * average_win - (1.0 - win_rate_frac) * average_loss;

    let sorted = sorted_by_date(trades);
    let (max_drawdown, max_drawdown_percent) = max_drawdown(&sorted);
    let streaks = scan_streaks(&sorted);

    let r_multiples: Vec<f64> = trades
        .iter()
        .filter(|t| t.pnl != 0.0)
        .filter_map(|t| {
            let risk = t.position_value() * RISK_FRACTION;
            (risk > 0.0).then(|| (t.pnl / risk).abs())
        })
        .collect();
    let avg_r_multiple = if r_multiples.is_empty() {
        0.0
    } else {
        r_multiples.iter().sum::<f64>() / r_multiples.len() as f64
    };

    MetricsSummary {
        total_trades: trades.len(),
        winning_trades: winning.len(),
        losing_trades: losing.len(),
        win_rate: win_rate_frac * 100.0,
        total_pnl,
        average_win,
        average_loss,
        profit_factor,
        largest_win: winning.iter().map(|t| t.pnl).fold(0.0, f64::max),
        largest_loss: losing.iter().map(|t| t.pnl).fold(0.0, f64::min),
        max_drawdown,
        max_drawdown_percent,
        expectancy,
        win_streak: streaks.longest_win,
        lose_streak: streaks.longest_loss,
        current_streak: streaks.current,
        avg_r_multiple,
        sharpe_ratio: sharpe(trades),
        kelly_percent: kelly(win_rate_frac, average_win, average_loss),
    }
}

/// Trades with parseable dates in chronological order
///
/// Undated trades cannot participate in time-ordered computations and are
/// dropped here.
pub(crate) fn sorted_by_date(trades: &[Trade]) -> Vec<&Trade> {
    trades
        .iter()
        .filter_map(|t| t.parsed_date().map(|d| (d, t)))
        .sorted_by_key(|(d, _)| *d)
        .map(|(_, t)| t)
        .collect()
}

/// Peak-to-trough decline of the cumulative pnl curve from a zero baseline
fn max_drawdown(sorted: &[&Trade]) -> (f64, f64) {
    let mut cumulative = 0.0;
    let mut peak = 0.0;
    let mut max_dd = 0.0_f64;

    for trade in sorted {
        cumulative += trade.pnl;
        if cumulative > peak {
            peak = cumulative;
        }
        max_dd = max_dd.max(peak - cumulative);
    }

    let percent = if peak > 0.0 { max_dd / peak * 100.0 } else { 0.0 };
    (max_dd, percent)
}

struct Streaks {
    longest_win: usize,
    longest_loss: usize,
    current: i64,
}

/// Scan streaks chronologically; break-even trades neither extend nor reset
/// a running streak
fn scan_streaks(sorted: &[&Trade]) -> Streaks {
    let mut current: i64 = 0;
    let mut longest_win = 0usize;
    let mut longest_loss = 0usize;

    for trade in sorted {
        if trade.pnl > 0.0 {
            current = if current > 0 { current + 1 } else { 1 };
            longest_win = longest_win.max(current as usize);
        } else if trade.pnl < 0.0 {
            current = if current < 0 { current - 1 } else { -1 };
            longest_loss = longest_loss.max(current.unsigned_abs() as usize);
        }
    }

    Streaks {
        longest_win,
        longest_loss,
        current,
    }
}

/// Simplified Sharpe over per-trade pnl, annualized for daily data
fn sharpe(trades: &[Trade]) -> f64 {
    let mean = trades.iter().map(|t| t.pnl).mean();
    let std_dev = trades.iter().map(|t| t.pnl).population_std_dev();
    if std_dev > 0.0 {
        mean / std_dev * (252.0_f64).sqrt()
    } else {
        0.0
    }
}

/// Kelly fraction from win rate and payoff ratio
///
/// Undefined without both winners and losers; clamped so a lucky streak
/// never suggests betting the book.
fn kelly(p: f64, average_win: f64, average_loss: f64) -> f64 {
    if average_win <= 0.0 || average_loss <= 0.0 {
        return 0.0;
    }
    let b = average_win / average_loss;
    let q = 1.0 - p;
    (((b * p - q) / b) * 100.0).clamp(0.0, 25.0)
}

// =============================================================================
// Position Sizing
// =============================================================================

/// Position-value statistics for one symbol
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolSizing {
    pub symbol: String,
    pub average: f64,
    pub min: f64,
    pub max: f64,
    pub count: usize,
}

/// Position-value statistics across the whole view
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionSizingStats {
    pub average: f64,
    pub min: f64,
    pub max: f64,
    /// Per-symbol breakdown, sorted by symbol
    pub per_symbol: Vec<SymbolSizing>,
}

/// Entry notional (entry price times quantity) statistics
pub fn position_sizing(trades: &[Trade]) -> PositionSizingStats {
    if trades.is_empty() {
        return PositionSizingStats::default();
    }

    let values: Vec<f64> = trades.iter().map(|t| t.position_value()).collect();
    let grouped = trades
        .iter()
        .map(|t| (t.symbol.clone(), t.position_value()))
        .into_group_map();

    let mut per_symbol: Vec<SymbolSizing> = grouped
        .into_iter()
        .map(|(symbol, values)| SymbolSizing {
            average: values.iter().sum::<f64>() / values.len() as f64,
            min: values.iter().copied().fold(f64::INFINITY, f64::min),
            max: values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            count: values.len(),
            symbol,
        })
        .collect();
    per_symbol.sort_by(|a, b| a.symbol.cmp(&b.symbol));

    PositionSizingStats {
        average: values.iter().sum::<f64>() / values.len() as f64,
        min: values.iter().copied().fold(f64::INFINITY, f64::min),
        max: values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        per_symbol,
    }
}

// =============================================================================
// Drawdown Periods
// =============================================================================

/// One contiguous stretch where cumulative pnl sat below its running peak
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrawdownPeriod {
    pub start_date: String,
    pub end_date: String,
    pub depth: f64,
    pub depth_percent: f64,
    /// Set when the series ends before the drawdown recovers
    pub is_current: bool,
}

/// Extract below-peak segments of the cumulative curve, deepest first
///
/// A segment opens at the first trade that leaves the curve under its peak
/// and closes at the trade that restores it; at most the five deepest are
/// returned.
pub fn drawdown_periods(trades: &[Trade]) -> Vec<DrawdownPeriod> {
    struct OpenSegment {
        start: String,
        peak: f64,
        depth: f64,
    }

    let sorted = sorted_by_date(trades);
    let mut periods = Vec::new();
    let mut cumulative = 0.0;
    let mut peak = 0.0;
    let mut open: Option<OpenSegment> = None;

    for trade in &sorted {
        cumulative += trade.pnl;
        if cumulative >= peak {
            if let Some(segment) = open.take() {
                periods.push(DrawdownPeriod {
                    start_date: segment.start,
                    end_date: trade.date.clone(),
                    depth: segment.depth,
                    depth_percent: depth_percent(segment.depth, segment.peak),
                    is_current: false,
                });
            }
            peak = cumulative;
        } else {
            let depth = peak - cumulative;
            match open.as_mut() {
                Some(segment) => segment.depth = segment.depth.max(depth),
                None => {
                    open = Some(OpenSegment {
                        start: trade.date.clone(),
                        peak,
                        depth,
                    })
                }
            }
        }
    }

    if let Some(segment) = open {
        periods.push(DrawdownPeriod {
            start_date: segment.start,
            end_date: sorted.last().map(|t| t.date.clone()).unwrap_or_default(),
            depth: segment.depth,
            depth_percent: depth_percent(segment.depth, segment.peak),
            is_current: true,
        });
    }

    periods.sort_by(|a, b| b.depth.partial_cmp(&a.depth).unwrap_or(std::cmp::Ordering::Equal));
    periods.truncate(5);
    periods
}

fn depth_percent(depth: f64, peak: f64) -> f64 {
    if peak > 0.0 {
        depth / peak * 100.0
    } else {
        0.0
    }
}

// =============================================================================
// Daily Goals
// =============================================================================

/// Today's activity measured against the configured daily goals
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TodayStats {
    pub trades: usize,
    pub pnl: f64,
    pub max_loss_hit: bool,
    pub target_hit: bool,
    pub max_trades_hit: bool,
}

/// Evaluate daily goals against today's trades
///
/// Callers pass the full unfiltered collection; goal tracking deliberately
/// ignores the active filter view.
pub fn check_daily_goals(trades: &[Trade], goals: &DailyGoals) -> TodayStats {
    check_daily_goals_on(trades, goals, Local::now().date_naive())
}

/// Evaluate daily goals against the trades dated `today`
pub fn check_daily_goals_on(trades: &[Trade], goals: &DailyGoals, today: NaiveDate) -> TodayStats {
    let today_trades: Vec<&Trade> = trades
        .iter()
        .filter(|t| t.parsed_date() == Some(today))
        .collect();
    let pnl: f64 = today_trades.iter().map(|t| t.pnl).sum();

    TodayStats {
        trades: today_trades.len(),
        pnl,
        max_loss_hit: pnl <= -goals.max_loss,
        target_hit: pnl >= goals.target_profit,
        max_trades_hit: today_trades.len() >= goals.max_trades,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn trade(date: &str, pnl: f64) -> Trade {
        Trade {
            id: format!("{}_{}", date, pnl),
            date: date.to_string(),
            symbol: "TEST".to_string(),
            quantity: 100.0,
            entry_price: 10.0,
            exit_price: 10.0,
            pnl,
            ..Default::default()
        }
    }

    #[test]
    fn test_empty_input_is_all_zero() {
        let m = compute_metrics(&[]);
        assert_eq!(m, MetricsSummary::default());
        assert_eq!(m.win_rate, 0.0);
        assert_eq!(m.profit_factor, 0.0);
        assert_eq!(m.sharpe_ratio, 0.0);
    }

    #[test]
    fn test_drawdown_worked_example() {
        // Cumulative [100, -50, 0], peaks [100, 100, 100], drawdowns [0, 150, 100]
        let trades = vec![
            trade("2024-01-01", 100.0),
            trade("2024-01-02", -150.0),
            trade("2024-01-03", 50.0),
        ];
        let m = compute_metrics(&trades);
        assert_relative_eq!(m.max_drawdown, 150.0);
        assert_relative_eq!(m.max_drawdown_percent, 150.0);
    }

    #[test]
    fn test_drawdown_zero_for_monotonic_curve() {
        let trades = vec![
            trade("2024-01-01", 10.0),
            trade("2024-01-02", 20.0),
            trade("2024-01-03", 5.0),
        ];
        let m = compute_metrics(&trades);
        assert_eq!(m.max_drawdown, 0.0);
    }

    #[test]
    fn test_win_rate_and_partition_bounds() {
        let trades = vec![
            trade("2024-01-01", 100.0),
            trade("2024-01-02", -50.0),
            trade("2024-01-03", 0.0),
            trade("2024-01-04", 25.0),
        ];
        let m = compute_metrics(&trades);
        assert_eq!(m.winning_trades, 2);
        assert_eq!(m.losing_trades, 1);
        // Break-even trades count toward neither partition
        assert!(m.winning_trades + m.losing_trades <= m.total_trades);
        assert_relative_eq!(m.win_rate, 50.0);
        assert!(m.win_rate >= 0.0 && m.win_rate <= 100.0);
    }

    #[test]
    fn test_profit_factor_without_losers_is_gross_profit() {
        let trades = vec![trade("2024-01-01", 60.0), trade("2024-01-02", 40.0)];
        let m = compute_metrics(&trades);
        assert_relative_eq!(m.profit_factor, 100.0);
    }

    #[test]
    fn test_expectancy() {
        let trades = vec![
            trade("2024-01-01", 100.0),
            trade("2024-01-02", 100.0),
            trade("2024-01-03", -50.0),
            trade("2024-01-04", -50.0),
        ];
        let m = compute_metrics(&trades);
        // 0.5 * 100 - 0.5 * 50 = 25
        assert_relative_eq!(m.expectancy, 25.0);
    }

    #[test]
    fn test_streaks_skip_break_even() {
        let trades = vec![
            trade("2024-01-01", 10.0),
            trade("2024-01-02", 0.0),
            trade("2024-01-03", 10.0),
            trade("2024-01-04", -5.0),
            trade("2024-01-05", -5.0),
            trade("2024-01-06", -5.0),
        ];
        let m = compute_metrics(&trades);
        // Break-even day neither extends nor resets the winning run
        assert_eq!(m.win_streak, 2);
        assert_eq!(m.lose_streak, 3);
        assert_eq!(m.current_streak, -3);
    }

    #[test]
    fn test_r_multiple_uses_flat_risk_fraction() {
        // Risk = 10 * 100 * 0.02 = 20, so a 100 pnl is 5R
        let trades = vec![trade("2024-01-01", 100.0)];
        let m = compute_metrics(&trades);
        assert_relative_eq!(m.avg_r_multiple, 5.0);
    }

    #[test]
    fn test_r_multiple_skips_zero_risk_trades() {
        let mut zero_notional = trade("2024-01-01", 100.0);
        zero_notional.entry_price = 0.0;
        let m = compute_metrics(&[zero_notional]);
        assert_eq!(m.avg_r_multiple, 0.0);
        assert!(m.avg_r_multiple.is_finite());
    }

    #[test]
    fn test_sharpe_annualizes_daily_pnl() {
        // Mean 15, population stddev 5
        let trades = vec![trade("2024-01-01", 10.0), trade("2024-01-02", 20.0)];
        let m = compute_metrics(&trades);
        assert_relative_eq!(m.sharpe_ratio, 3.0 * (252.0_f64).sqrt(), epsilon = 1e-9);
    }

    #[test]
    fn test_sharpe_zero_when_flat() {
        let trades = vec![trade("2024-01-01", 10.0), trade("2024-01-02", 10.0)];
        let m = compute_metrics(&trades);
        assert_eq!(m.sharpe_ratio, 0.0);
    }

    #[test]
    fn test_kelly_clamped_for_display() {
        let mut trades: Vec<Trade> = (1..=9)
            .map(|i| trade(&format!("2024-01-0{}", i), 100.0))
            .collect();
        trades.push(trade("2024-01-10", -10.0));
        let m = compute_metrics(&trades);
        // Raw Kelly here is 89%; display value is capped
        assert_relative_eq!(m.kelly_percent, 25.0);

        let all_wins = vec![trade("2024-01-01", 10.0)];
        assert_eq!(compute_metrics(&all_wins).kelly_percent, 0.0);
    }

    #[test]
    fn test_undated_trades_excluded_from_time_ordered_metrics() {
        let trades = vec![
            trade("2024-01-01", 100.0),
            trade("garbage", -1000.0),
            trade("2024-01-02", -150.0),
        ];
        let m = compute_metrics(&trades);
        // The undated loser still counts toward totals but not the curve
        assert_eq!(m.total_trades, 3);
        assert_relative_eq!(m.max_drawdown, 150.0);
        assert_eq!(m.lose_streak, 1);
    }

    #[test]
    fn test_position_sizing_per_symbol() {
        let mut a = trade("2024-01-01", 10.0);
        a.symbol = "AAPL".to_string();
        a.entry_price = 10.0; // notional 1000
        let mut b = trade("2024-01-02", 10.0);
        b.symbol = "AAPL".to_string();
        b.entry_price = 30.0; // notional 3000
        let mut c = trade("2024-01-03", 10.0);
        c.symbol = "TSLA".to_string();
        c.entry_price = 20.0; // notional 2000

        let stats = position_sizing(&[a, b, c]);
        assert_relative_eq!(stats.average, 2000.0);
        assert_relative_eq!(stats.min, 1000.0);
        assert_relative_eq!(stats.max, 3000.0);
        assert_eq!(stats.per_symbol.len(), 2);

        let aapl = &stats.per_symbol[0];
        assert_eq!(aapl.symbol, "AAPL");
        assert_eq!(aapl.count, 2);
        assert_relative_eq!(aapl.average, 2000.0);
    }

    #[test]
    fn test_drawdown_periods_track_recovery_and_current() {
        let trades = vec![
            trade("2024-01-01", 100.0),
            trade("2024-01-02", -50.0),
            trade("2024-01-03", 100.0), // recovers above the old peak
            trade("2024-01-04", -30.0), // still underwater at the end
        ];
        let periods = drawdown_periods(&trades);
        assert_eq!(periods.len(), 2);

        // Deepest first
        assert_eq!(periods[0].start_date, "2024-01-02");
        assert_eq!(periods[0].end_date, "2024-01-03");
        assert_relative_eq!(periods[0].depth, 50.0);
        assert_relative_eq!(periods[0].depth_percent, 50.0);
        assert!(!periods[0].is_current);

        assert_eq!(periods[1].start_date, "2024-01-04");
        assert_eq!(periods[1].end_date, "2024-01-04");
        assert_relative_eq!(periods[1].depth, 30.0);
        assert!(periods[1].is_current);
    }

    #[test]
    fn test_drawdown_periods_keep_top_five() {
        let mut trades = Vec::new();
        let mut day = 1;
        for depth in [10.0, 20.0, 30.0, 40.0, 50.0, 60.0, 70.0] {
            // Each pair digs a dip of `depth` and recovers past the peak
            trades.push(trade(&format!("2024-03-{:02}", day), -depth));
            trades.push(trade(&format!("2024-03-{:02}", day + 1), depth + 1.0));
            day += 2;
        }
        let periods = drawdown_periods(&trades);
        assert_eq!(periods.len(), 5);
        assert_relative_eq!(periods[0].depth, 70.0);
        assert_relative_eq!(periods[4].depth, 30.0);
    }

    #[test]
    fn test_daily_goal_thresholds() {
        let goals = DailyGoals::default();
        let today = NaiveDate::from_ymd_opt(2024, 5, 6).unwrap();
        let trades = vec![
            trade("2024-05-06", -300.0),
            trade("2024-05-06", -200.0),
            trade("2024-05-05", -900.0), // yesterday, ignored
        ];
        let stats = check_daily_goals_on(&trades, &goals, today);
        assert_eq!(stats.trades, 2);
        assert_relative_eq!(stats.pnl, -500.0);
        assert!(stats.max_loss_hit);
        assert!(!stats.target_hit);
        assert!(!stats.max_trades_hit);

        let winners: Vec<Trade> = (0..10).map(|_| trade("2024-05-06", 150.0)).collect();
        let stats = check_daily_goals_on(&winners, &goals, today);
        assert!(stats.target_hit);
        assert!(stats.max_trades_hit);
        assert!(!stats.max_loss_hit);
    }
}
