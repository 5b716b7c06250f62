//! Per-dimension aggregation
//!
//! Groups a trade view by symbol, strategy tag, or time bucket and derives
//! per-group statistics, plus the time-series shapes the host charts
//! (calendar heatmap, rolling win rate, cumulative equity curve).

use std::collections::HashMap;

use chrono::{Datelike, Duration, Local, NaiveDate};
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::metrics::sorted_by_date;
use crate::types::Trade;

/// Days covered by the calendar heatmap: thirteen whole weeks ending today
const CALENDAR_DAYS: u32 = 91;

const WEEKDAY_LABELS: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

/// Statistics for one group of trades
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupStat {
    pub key: String,
    pub trades: usize,
    pub wins: usize,
    pub losses: usize,
    pub total_pnl: f64,
    /// Percent of the group's trades with positive pnl
    pub win_rate: f64,
    pub avg_pnl: f64,
}

impl GroupStat {
    /// Percent of the group's trades with negative pnl
    pub fn loss_rate(&self) -> f64 {
        if self.trades > 0 {
            self.losses as f64 / self.trades as f64 * 100.0
        } else {
            0.0
        }
    }
}

pub(crate) fn group_stat(key: String, pnls: &[f64]) -> GroupStat {
    let trades = pnls.len();
    let wins = pnls.iter().filter(|p| **p > 0.0).count();
    let losses = pnls.iter().filter(|p| **p < 0.0).count();
    let total_pnl: f64 = pnls.iter().sum();
    GroupStat {
        key,
        trades,
        wins,
        losses,
        total_pnl,
        win_rate: if trades > 0 {
            wins as f64 / trades as f64 * 100.0
        } else {
            0.0
        },
        avg_pnl: if trades > 0 {
            total_pnl / trades as f64
        } else {
            0.0
        },
    }
}

/// Group by instrument, most profitable symbol first
pub fn by_symbol(trades: &[Trade]) -> Vec<GroupStat> {
    let grouped = trades
        .iter()
        .map(|t| (t.symbol.clone(), t.pnl))
        .into_group_map();
    sorted_by_pnl(grouped)
}

/// Group by strategy tag, most profitable tag first
///
/// A trade carrying several tags contributes to each of their groups; tag
/// groups are overlapping views, not a partition.
pub fn by_tag(trades: &[Trade]) -> Vec<GroupStat> {
    let grouped = trades
        .iter()
        .flat_map(|t| t.tags.iter().map(|tag| (tag.clone(), t.pnl)))
        .into_group_map();
    sorted_by_pnl(grouped)
}

fn sorted_by_pnl(grouped: HashMap<String, Vec<f64>>) -> Vec<GroupStat> {
    grouped
        .into_iter()
        .map(|(key, pnls)| group_stat(key, &pnls))
        .sorted_by(|a, b| {
            b.total_pnl
                .partial_cmp(&a.total_pnl)
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .collect()
}

/// Group by weekday; all seven groups are always present, zero-filled
pub fn by_day_of_week(trades: &[Trade]) -> Vec<GroupStat> {
    let mut buckets: [Vec<f64>; 7] = Default::default();
    for trade in trades {
        if let Some(date) = trade.parsed_date() {
            buckets[date.weekday().num_days_from_monday() as usize].push(trade.pnl);
        }
    }
    WEEKDAY_LABELS
        .iter()
        .zip(&buckets)
        .map(|(label, pnls)| group_stat(label.to_string(), pnls))
        .collect()
}

/// Group by hour of day; trades without a captured clock time are excluded
pub fn by_hour(trades: &[Trade]) -> Vec<GroupStat> {
    let grouped = trades
        .iter()
        .filter_map(|t| t.hour().map(|h| (format!("{:02}:00", h), t.pnl)))
        .into_group_map();
    grouped
        .into_iter()
        .map(|(key, pnls)| group_stat(key, &pnls))
        .sorted_by(|a, b| a.key.cmp(&b.key))
        .collect()
}

/// Group by calendar month (`YYYY-MM`), oldest first
pub fn by_month(trades: &[Trade]) -> Vec<GroupStat> {
    let grouped = trades
        .iter()
        .filter_map(|t| {
            t.parsed_date()
                .map(|d| (d.format("%Y-%m").to_string(), t.pnl))
        })
        .into_group_map();
    grouped
        .into_iter()
        .map(|(key, pnls)| group_stat(key, &pnls))
        .sorted_by(|a, b| a.key.cmp(&b.key))
        .collect()
}

// =============================================================================
// Calendar Heatmap
// =============================================================================

/// One cell of the daily-pnl calendar grid
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarDay {
    pub date: String,
    pub pnl: f64,
    /// Weekday label, `Mon`..`Sun`
    pub day: String,
    /// Week column, 0 at the window start through 12 at today's week
    pub week: u32,
}

/// Daily pnl over the trailing 13-week window ending today
pub fn calendar_days(trades: &[Trade]) -> Vec<CalendarDay> {
    calendar_days_at(trades, Local::now().date_naive())
}

/// Daily pnl over the 13-week window ending at an explicit date
pub fn calendar_days_at(trades: &[Trade], today: NaiveDate) -> Vec<CalendarDay> {
    let mut daily: HashMap<NaiveDate, f64> = HashMap::new();
    for trade in trades {
        if let Some(date) = trade.parsed_date() {
            *daily.entry(date).or_insert(0.0) += trade.pnl;
        }
    }

    let start = today - Duration::days(i64::from(CALENDAR_DAYS) - 1);
    (0..CALENDAR_DAYS)
        .map(|offset| {
            let date = start + Duration::days(i64::from(offset));
            CalendarDay {
                date: date.format("%Y-%m-%d").to_string(),
                pnl: daily.get(&date).copied().unwrap_or(0.0),
                day: WEEKDAY_LABELS[date.weekday().num_days_from_monday() as usize].to_string(),
                week: offset / 7,
            }
        })
        .collect()
}

// =============================================================================
// Time Series
// =============================================================================

/// One point of the rolling win-rate series
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RollingWinRatePoint {
    /// Date of the window's most recent trade
    pub date: String,
    pub win_rate: f64,
}

/// Win rate over a sliding chronological window
///
/// The window widens with sample size (`n / 20`, at least 10 trades) so the
/// series shows trend instead of single-trade noise. Fewer trades than one
/// window yields no points.
pub fn rolling_win_rate(trades: &[Trade]) -> Vec<RollingWinRatePoint> {
    let sorted = sorted_by_date(trades);
    let window = (sorted.len() / 20).max(10);
    if sorted.len() < window {
        return Vec::new();
    }

    sorted
        .windows(window)
        .map(|w| {
            let wins = w.iter().filter(|t| t.is_win()).count();
            RollingWinRatePoint {
                date: w[window - 1].date.clone(),
                win_rate: wins as f64 / window as f64 * 100.0,
            }
        })
        .collect()
}

/// One point of the cumulative equity series
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EquityPoint {
    /// 1-based trade number in chronological order
    pub index: usize,
    pub date: String,
    pub cumulative_pnl: f64,
    /// Decline from the running peak, always >= 0
    pub drawdown: f64,
    /// Win rate over all trades up to this point
    pub win_rate: f64,
}

/// Running cumulative pnl with peak-relative drawdown and running win rate
pub fn equity_curve(trades: &[Trade]) -> Vec<EquityPoint> {
    let sorted = sorted_by_date(trades);
    let mut cumulative = 0.0;
    let mut peak = 0.0;
    let mut wins = 0usize;

    sorted
        .iter()
        .enumerate()
        .map(|(i, trade)| {
            cumulative += trade.pnl;
            if cumulative > peak {
                peak = cumulative;
            }
            if trade.is_win() {
                wins += 1;
            }
            EquityPoint {
                index: i + 1,
                date: trade.date.clone(),
                cumulative_pnl: cumulative,
                drawdown: peak - cumulative,
                win_rate: wins as f64 / (i + 1) as f64 * 100.0,
            }
        })
        .collect()
}
