//! Trade filtering
//!
//! Compound filter state applied as one pass over a collection. All
//! dimensions AND together; within a dimension, tag selection ORs. Filtering
//! never reorders trades.

use chrono::{Duration, Local, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::types::{Side, Trade};

/// Outcome/direction dimension
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeFilter {
    #[default]
    All,
    Winners,
    Losers,
    Long,
    Short,
}

/// Date-range dimension
///
/// Relative ranges anchor to the evaluation date. A custom range missing
/// either bound applies no date filtering at all.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "range")]
pub enum DateRange {
    #[default]
    All,
    Last7,
    Last30,
    Last90,
    Custom {
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    },
}

/// Active filter selections
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterState {
    pub outcome: OutcomeFilter,
    /// Selected strategy tags; empty means no tag filtering
    pub tags: Vec<String>,
    pub date_range: DateRange,
    /// Case-insensitive substring match over symbol, notes, and tags
    pub search_query: String,
}

/// Apply the filter state against today's date
pub fn apply_filters(trades: &[Trade], state: &FilterState) -> Vec<Trade> {
    apply_filters_at(trades, state, Local::now().date_naive())
}

/// Apply the filter state against an explicit evaluation date
///
/// Stages run search, outcome, tags, then date range; each is an independent
/// predicate, so the order only matters for short-circuit cost.
pub fn apply_filters_at(trades: &[Trade], state: &FilterState, today: NaiveDate) -> Vec<Trade> {
    let query = state.search_query.trim().to_lowercase();
    let date_bounds = resolve_date_bounds(&state.date_range, today);

    trades
        .iter()
        .filter(|t| query.is_empty() || matches_search(t, &query))
        .filter(|t| matches_outcome(t, state.outcome))
        .filter(|t| state.tags.is_empty() || matches_tags(t, &state.tags))
        .filter(|t| matches_date(t, date_bounds))
        .cloned()
        .collect()
}

fn matches_search(trade: &Trade, query: &str) -> bool {
    trade.symbol.to_lowercase().contains(query)
        || trade.trade_notes.to_lowercase().contains(query)
        || trade.notes.to_lowercase().contains(query)
        || trade.tags.iter().any(|tag| tag.to_lowercase().contains(query))
}

fn matches_outcome(trade: &Trade, outcome: OutcomeFilter) -> bool {
    match outcome {
        OutcomeFilter::All => true,
        OutcomeFilter::Winners => trade.pnl > 0.0,
        OutcomeFilter::Losers => trade.pnl < 0.0,
        OutcomeFilter::Long => trade.side == Side::Long,
        OutcomeFilter::Short => trade.side == Side::Short,
    }
}

fn matches_tags(trade: &Trade, selected: &[String]) -> bool {
    selected.iter().any(|tag| trade.tags.contains(tag))
}

/// Resolve the range to inclusive bounds; `None` disables the date stage
fn resolve_date_bounds(
    range: &DateRange,
    today: NaiveDate,
) -> Option<(NaiveDate, Option<NaiveDate>)> {
    match range {
        DateRange::All => None,
        DateRange::Last7 => Some((today - Duration::days(7), None)),
        DateRange::Last30 => Some((today - Duration::days(30), None)),
        DateRange::Last90 => Some((today - Duration::days(90), None)),
        DateRange::Custom {
            start: Some(start),
            end: Some(end),
        } => Some((*start, Some(*end))),
        // Half-specified custom ranges apply no date filtering
        DateRange::Custom { .. } => None,
    }
}

fn matches_date(trade: &Trade, bounds: Option<(NaiveDate, Option<NaiveDate>)>) -> bool {
    let Some((start, end)) = bounds else {
        return true;
    };
    // Trades without a parseable date never pass an active date stage
    let Some(date) = trade.parsed_date() else {
        return false;
    };
    date >= start && end.map_or(true, |end| date <= end)
}
