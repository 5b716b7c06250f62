//! Pattern insights
//!
//! A fixed table of heuristic rules evaluated over the breakdown statistics.
//! Each rule is an independent check with a minimum-sample threshold; table
//! order is the priority order when more rules fire than the output cap.

use chrono::{Datelike, NaiveTime, Timelike, Weekday};
use serde::{Deserialize, Serialize};

use crate::breakdown::{by_day_of_week, by_symbol, by_tag, group_stat, GroupStat};
use crate::metrics::compute_metrics;
use crate::types::{Side, Trade};

/// At most this many insights are reported per evaluation
const MAX_INSIGHTS: usize = 6;

/// Minimum sample sizes per rule family
const MIN_SYMBOL_TRADES: usize = 3;
const MIN_DAY_TRADES: usize = 3;
const MIN_SESSION_BEST: usize = 3;
const MIN_SESSION_WORST: usize = 5;
const MIN_TAG_TRADES: usize = 5;
const MIN_SIDE_TRADES: usize = 5;
const MIN_FRIDAY_PM_TRADES: usize = 5;
const TILT_STREAK: usize = 5;

/// How loud an insight should read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Success,
    Warning,
    Info,
}

/// One human-readable pattern observation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insight {
    pub severity: Severity,
    pub title: String,
    pub detail: String,
}

/// Precomputed breakdowns the rules read from
struct RuleContext {
    symbols: Vec<GroupStat>,
    days: Vec<GroupStat>,
    sessions: Vec<GroupStat>,
    tags: Vec<GroupStat>,
    long: GroupStat,
    short: GroupStat,
    friday_afternoon: GroupStat,
    longest_loss_streak: usize,
}

impl RuleContext {
    fn build(trades: &[Trade]) -> Self {
        let mut session_pnls: [(&str, Vec<f64>); 4] = [
            ("premarket", Vec::new()),
            ("morning", Vec::new()),
            ("afternoon", Vec::new()),
            ("close", Vec::new()),
        ];
        for trade in trades {
            if let Some(time) = trade.parsed_time() {
                let slot = match session_name(time) {
                    "premarket" => 0,
                    "morning" => 1,
                    "afternoon" => 2,
                    _ => 3,
                };
                session_pnls[slot].1.push(trade.pnl);
            }
        }
        let sessions = session_pnls
            .into_iter()
            .filter(|(_, pnls)| !pnls.is_empty())
            .map(|(name, pnls)| group_stat(name.to_string(), &pnls))
            .collect();

        let side_pnls = |side: Side| -> Vec<f64> {
            trades
                .iter()
                .filter(|t| t.side == side)
                .map(|t| t.pnl)
                .collect()
        };

        let friday_pm: Vec<f64> = trades
            .iter()
            .filter(|t| {
                t.parsed_date().is_some_and(|d| d.weekday() == Weekday::Fri)
                    && t.hour().is_some_and(|h| h >= 14)
            })
            .map(|t| t.pnl)
            .collect();

        RuleContext {
            symbols: by_symbol(trades),
            days: by_day_of_week(trades),
            sessions,
            tags: by_tag(trades),
            long: group_stat("long".to_string(), &side_pnls(Side::Long)),
            short: group_stat("short".to_string(), &side_pnls(Side::Short)),
            friday_afternoon: group_stat("friday_pm".to_string(), &friday_pm),
            longest_loss_streak: compute_metrics(trades).lose_streak,
        }
    }
}

/// Intraday session bucket for a fill time
fn session_name(time: NaiveTime) -> &'static str {
    let minutes = time.hour() * 60 + time.minute();
    if minutes < 9 * 60 + 30 {
        "premarket"
    } else if minutes < 12 * 60 {
        "morning"
    } else if minutes < 15 * 60 {
        "afternoon"
    } else {
        "close"
    }
}

type Rule = fn(&RuleContext) -> Vec<Insight>;

/// Rule table; order doubles as the truncation priority
const RULES: &[Rule] = &[
    best_symbol,
    worst_symbol,
    day_of_week,
    sessions,
    tag_edge,
    side_bias,
    friday_afternoon,
    tilt,
];

/// Evaluate every rule over the given trades, capped at six insights
pub fn generate_insights(trades: &[Trade]) -> Vec<Insight> {
    let ctx = RuleContext::build(trades);
    let mut insights = Vec::new();
    for rule in RULES {
        insights.extend(rule(&ctx));
    }
    insights.truncate(MAX_INSIGHTS);
    insights
}

fn best_symbol(ctx: &RuleContext) -> Vec<Insight> {
    // Symbol groups arrive sorted by pnl, best first
    let Some(best) = ctx
        .symbols
        .iter()
        .find(|g| g.trades >= MIN_SYMBOL_TRADES && g.total_pnl > 0.0)
    else {
        return Vec::new();
    };
    vec![Insight {
        severity: Severity::Success,
        title: format!("{} is your strongest symbol", best.key),
        detail: format!(
            "{:.0}% win rate across {} trades for ${:.2} in profit",
            best.win_rate, best.trades, best.total_pnl
        ),
    }]
}

fn worst_symbol(ctx: &RuleContext) -> Vec<Insight> {
    let Some(worst) = ctx
        .symbols
        .iter()
        .rev()
        .find(|g| g.trades >= MIN_SYMBOL_TRADES && g.total_pnl < -100.0)
    else {
        return Vec::new();
    };
    vec![Insight {
        severity: Severity::Warning,
        title: format!("{} keeps costing you", worst.key),
        detail: format!(
            "{:.0}% of {} trades lose money, totaling ${:.2}",
            worst.loss_rate(),
            worst.trades,
            worst.total_pnl.abs()
        ),
    }]
}

fn day_of_week(ctx: &RuleContext) -> Vec<Insight> {
    let qualified: Vec<&GroupStat> = ctx
        .days
        .iter()
        .filter(|g| g.trades >= MIN_DAY_TRADES)
        .collect();
    let mut insights = Vec::new();

    if let Some(best) = qualified
        .iter()
        .max_by(|a, b| a.total_pnl.total_cmp(&b.total_pnl))
    {
        insights.push(Insight {
            severity: Severity::Info,
            title: format!("{} is your best day", best.key),
            detail: format!(
                "${:.2} total pnl across {} trades ({:.0}% win rate)",
                best.total_pnl, best.trades, best.win_rate
            ),
        });
    }

    if let Some(worst) = qualified
        .iter()
        .filter(|g| g.total_pnl < 0.0)
        .min_by(|a, b| a.total_pnl.total_cmp(&b.total_pnl))
    {
        insights.push(Insight {
            severity: Severity::Warning,
            title: format!("{}s are dragging you down", worst.key),
            detail: format!(
                "${:.2} lost across {} trades on that day",
                worst.total_pnl.abs(),
                worst.trades
            ),
        });
    }

    insights
}

fn sessions(ctx: &RuleContext) -> Vec<Insight> {
    let mut insights = Vec::new();

    if let Some(best) = ctx
        .sessions
        .iter()
        .filter(|g| g.trades >= MIN_SESSION_BEST)
        .max_by(|a, b| a.win_rate.total_cmp(&b.win_rate))
    {
        insights.push(Insight {
            severity: Severity::Success,
            title: format!("You trade best in the {}", best.key),
            detail: format!(
                "{:.0}% win rate over {} trades in that session",
                best.win_rate, best.trades
            ),
        });
    }

    if let Some(worst) = ctx
        .sessions
        .iter()
        .filter(|g| g.trades >= MIN_SESSION_WORST && g.loss_rate() >= 60.0)
        .min_by(|a, b| a.win_rate.total_cmp(&b.win_rate))
    {
        insights.push(Insight {
            severity: Severity::Warning,
            title: format!("The {} session works against you", worst.key),
            detail: format!(
                "{:.0}% of {} trades there lose money",
                worst.loss_rate(),
                worst.trades
            ),
        });
    }

    insights
}

fn tag_edge(ctx: &RuleContext) -> Vec<Insight> {
    let qualified: Vec<&GroupStat> = ctx
        .tags
        .iter()
        .filter(|g| g.trades >= MIN_TAG_TRADES)
        .collect();
    let mut insights = Vec::new();

    if let Some(best) = qualified
        .iter()
        .max_by(|a, b| a.win_rate.total_cmp(&b.win_rate))
    {
        insights.push(Insight {
            severity: Severity::Success,
            title: format!("{} is your edge", best.key),
            detail: format!(
                "{:.0}% win rate across {} trades with this setup",
                best.win_rate, best.trades
            ),
        });
    }

    if let Some(worst) = qualified
        .iter()
        .filter(|g| g.loss_rate() >= 60.0)
        .max_by(|a, b| a.loss_rate().total_cmp(&b.loss_rate()))
    {
        insights.push(Insight {
            severity: Severity::Warning,
            title: format!("{} setups aren't working", worst.key),
            detail: format!(
                "{:.0}% of {} trades with this tag lose money",
                worst.loss_rate(),
                worst.trades
            ),
        });
    }

    insights
}

fn side_bias(ctx: &RuleContext) -> Vec<Insight> {
    if ctx.long.trades < MIN_SIDE_TRADES || ctx.short.trades < MIN_SIDE_TRADES {
        return Vec::new();
    }
    let gap = ctx.long.win_rate - ctx.short.win_rate;
    if gap.abs() < 20.0 {
        return Vec::new();
    }
    let (stronger, weaker) = if gap > 0.0 {
        (&ctx.long, &ctx.short)
    } else {
        (&ctx.short, &ctx.long)
    };
    vec![Insight {
        severity: Severity::Info,
        title: format!("You're stronger on the {} side", stronger.key),
        detail: format!(
            "{:.0}% win rate {} vs {:.0}% {}",
            stronger.win_rate, stronger.key, weaker.win_rate, weaker.key
        ),
    }]
}

fn friday_afternoon(ctx: &RuleContext) -> Vec<Insight> {
    let fp = &ctx.friday_afternoon;
    if fp.trades < MIN_FRIDAY_PM_TRADES || fp.loss_rate() < 70.0 {
        return Vec::new();
    }
    vec![Insight {
        severity: Severity::Warning,
        title: "Friday afternoons are hurting you".to_string(),
        detail: format!(
            "{:.0}% of your {} trades after 14:00 on Fridays lose money",
            fp.loss_rate(),
            fp.trades
        ),
    }]
}

fn tilt(ctx: &RuleContext) -> Vec<Insight> {
    if ctx.longest_loss_streak < TILT_STREAK {
        return Vec::new();
    }
    vec![Insight {
        severity: Severity::Warning,
        title: format!("Tilt risk: {} losses in a row", ctx.longest_loss_streak),
        detail: format!(
            "Your longest losing streak reached {} consecutive trades; consider a hard stop after three",
            ctx.longest_loss_streak
        ),
    }]
}
