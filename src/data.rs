//! Trade import and export
//!
//! Normalizes broker CSV exports into canonical `Trade` records, partitions
//! re-imports against an existing collection, and writes collections back
//! out as CSV. Column names vary wildly between brokers, so every logical
//! field resolves through an ordered alias list; the first non-empty match
//! wins.

use std::collections::{HashMap, HashSet};

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{info, warn};

use crate::types::{Side, Trade};

// =============================================================================
// Column Aliases
// =============================================================================

const ID_COLUMNS: &[&str] = &["id", "trade_id", "buyfillid"];
const DATE_COLUMNS: &[&str] = &[
    "boughttimestamp",
    "soldtimestamp",
    "date",
    "entry_date",
    "trade_date",
];
const SYMBOL_COLUMNS: &[&str] = &["symbol", "ticker", "stock"];
const QUANTITY_COLUMNS: &[&str] = &["quantity", "qty", "shares", "size"];
const ENTRY_COLUMNS: &[&str] = &["entry_price", "buyprice", "entry", "buy_price"];
const EXIT_COLUMNS: &[&str] = &["exit_price", "sellprice", "exit", "sell_price"];
const PNL_COLUMNS: &[&str] = &["pnl", "p&l", "profit_loss", "profit"];
const FEE_COLUMNS: &[&str] = &["fees", "commission"];
const NOTES_COLUMNS: &[&str] = &["notes", "comments", "duration"];

/// Header row written by [`export_csv`]
pub const EXPORT_HEADERS: [&str; 11] = [
    "Date",
    "Symbol",
    "Side",
    "Quantity",
    "Entry Price",
    "Exit Price",
    "P&L",
    "Fees",
    "Duration",
    "Tags",
    "Notes",
];

// =============================================================================
// CSV Normalization
// =============================================================================

/// One data row plus the header mapping it resolves against
struct Row<'a> {
    record: &'a csv::StringRecord,
    columns: &'a HashMap<String, usize>,
}

impl Row<'_> {
    /// Value of a named column, or empty when the column is absent or the
    /// row is short
    fn get(&self, name: &str) -> &str {
        self.columns
            .get(name)
            .and_then(|&i| self.record.get(i))
            .unwrap_or("")
    }

    /// First non-empty value across an alias list
    fn first(&self, aliases: &[&str]) -> &str {
        aliases
            .iter()
            .map(|name| self.get(name))
            .find(|value| !value.is_empty())
            .unwrap_or("")
    }
}

/// Normalize raw CSV text into canonical trades
///
/// Tolerant by contract: ragged rows backfill with empty fields, unparseable
/// numbers coerce to zero, and input without at least a header and one data
/// row yields an empty vec rather than an error.
pub fn normalize(raw_text: &str) -> Vec<Trade> {
    let non_empty_lines = raw_text.lines().filter(|l| !l.trim().is_empty()).count();
    if non_empty_lines < 2 {
        return Vec::new();
    }

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(raw_text.as_bytes());

    let columns = match reader.headers() {
        Ok(headers) => header_map(headers),
        Err(err) => {
            warn!("Unreadable CSV header row: {}", err);
            return Vec::new();
        }
    };

    // One stamp per import; row index keeps fallback ids unique within it
    let import_stamp = Utc::now().timestamp_millis();
    let mut trades = Vec::new();
    let mut skipped = 0usize;

    for (row_idx, result) in reader.records().enumerate() {
        let record = match result {
            Ok(record) => record,
            Err(err) => {
                warn!("Skipping unreadable CSV row {}: {}", row_idx + 1, err);
                skipped += 1;
                continue;
            }
        };
        let row = Row {
            record: &record,
            columns: &columns,
        };
        trades.push(normalize_row(&row, import_stamp, row_idx + 1));
    }

    info!(
        "Normalized {} trades from CSV import ({} rows skipped)",
        trades.len(),
        skipped
    );
    trades
}

/// Lowercased header lookup; spaces collapse to underscores so exported
/// headers like `Entry Price` resolve through the same aliases
fn header_map(headers: &csv::StringRecord) -> HashMap<String, usize> {
    let mut columns = HashMap::new();
    for (i, name) in headers.iter().enumerate() {
        let key = name.trim().to_lowercase().replace(' ', "_");
        columns.entry(key).or_insert(i);
    }
    columns
}

fn normalize_row(row: &Row<'_>, import_stamp: i64, row_idx: usize) -> Trade {
    let side = resolve_side(row);

    let stamp = row.first(DATE_COLUMNS);
    let mut stamp_parts = stamp.split_whitespace();
    let date = stamp_parts.next().unwrap_or("").to_string();
    let time = stamp_parts
        .next()
        .map(|t| t.chars().take(5).collect::<String>())
        .filter(|t| !t.is_empty());

    let quantity = parse_number(row.first(QUANTITY_COLUMNS));
    let entry_price = parse_number(row.first(ENTRY_COLUMNS));
    let exit_price = parse_number(row.first(EXIT_COLUMNS));
    let fees = parse_number(row.first(FEE_COLUMNS));

    let mut pnl = parse_pnl(row.first(PNL_COLUMNS));
    if pnl == 0.0 && entry_price != 0.0 && exit_price != 0.0 && quantity != 0.0 {
        pnl = side.derived_pnl(entry_price, exit_price, quantity, fees);
    }

    let id = match row.first(ID_COLUMNS) {
        "" => format!("trade_{}_{}", import_stamp, row_idx),
        explicit => explicit.to_string(),
    };

    Trade {
        id,
        date,
        time,
        symbol: row.first(SYMBOL_COLUMNS).to_uppercase(),
        side,
        quantity,
        entry_price,
        exit_price,
        fees,
        pnl,
        tags: split_tags(row.get("tags")),
        trade_notes: String::new(),
        notes: row.first(NOTES_COLUMNS).to_string(),
        duration: row.get("duration").to_string(),
        screenshots: Vec::new(),
    }
}

/// Explicit side column wins; otherwise paired buy/sell timestamps let us
/// infer direction from fill order (lower buy fill id means the position
/// opened with the buy)
fn resolve_side(row: &Row<'_>) -> Side {
    let explicit = row.get("side");
    if !explicit.is_empty() {
        return Side::parse(explicit);
    }
    if !row.get("boughttimestamp").is_empty() && !row.get("soldtimestamp").is_empty() {
        let buy_id: i64 = row.get("buyfillid").parse().unwrap_or(0);
        let sell_id: i64 = row.get("sellfillid").parse().unwrap_or(0);
        return if buy_id < sell_id { Side::Long } else { Side::Short };
    }
    Side::Unknown
}

/// Parse a pnl cell: dollar signs and whitespace are noise, accounting-style
/// parentheses mean negative, anything else unparseable is zero
fn parse_pnl(raw: &str) -> f64 {
    let cleaned: String = raw
        .chars()
        .filter(|c| *c != '$' && !c.is_whitespace())
        .collect();
    let negated = cleaned.starts_with('(') && cleaned.ends_with(')') && cleaned.len() > 1;
    let body = if negated {
        &cleaned[1..cleaned.len() - 1]
    } else {
        cleaned.as_str()
    };
    let value = body.parse::<f64>().unwrap_or(0.0);
    if negated {
        -value
    } else {
        value
    }
}

fn parse_number(raw: &str) -> f64 {
    raw.trim().parse().unwrap_or(0.0)
}

fn split_tags(raw: &str) -> Vec<String> {
    raw.split(';')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(String::from)
        .collect()
}

// =============================================================================
// Import Deduplication
// =============================================================================

/// Partition of an incoming import against the existing collection
#[derive(Debug, Clone, Default)]
pub struct DedupeResult {
    /// Incoming trades whose ids are new, in incoming order
    pub to_add: Vec<Trade>,
    /// Incoming trades skipped because their id already exists
    pub duplicate_count: usize,
}

/// Partition `incoming` by id against `existing`
///
/// Advisory only: neither input is modified, and the caller decides whether
/// `to_add` actually gets appended after confirming counts with the user.
pub fn dedupe(existing: &[Trade], incoming: &[Trade]) -> DedupeResult {
    let existing_ids: HashSet<&str> = existing.iter().map(|t| t.id.as_str()).collect();

    let mut result = DedupeResult::default();
    for trade in incoming {
        if existing_ids.contains(trade.id.as_str()) {
            result.duplicate_count += 1;
        } else {
            result.to_add.push(trade.clone());
        }
    }

    info!(
        "Import partition: {} new, {} duplicates",
        result.to_add.len(),
        result.duplicate_count
    );
    result
}

// =============================================================================
// CSV Export
// =============================================================================

/// Serialize trades to CSV with the journal's fixed export columns
///
/// Tags re-join with `;`; the notes column prefers per-trade journal notes
/// over imported broker notes. Fields are quoted as needed, so notes with
/// embedded commas survive a later re-import.
pub fn export_csv(trades: &[Trade]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record(EXPORT_HEADERS)
        .context("Failed to write CSV header")?;

    for trade in trades {
        let notes = if trade.trade_notes.is_empty() {
            &trade.notes
        } else {
            &trade.trade_notes
        };
        writer
            .write_record([
                trade.date.clone(),
                trade.symbol.clone(),
                trade.side.to_string(),
                trade.quantity.to_string(),
                trade.entry_price.to_string(),
                trade.exit_price.to_string(),
                trade.pnl.to_string(),
                trade.fees.to_string(),
                trade.duration.clone(),
                trade.tags.join(";"),
                notes.clone(),
            ])
            .context("Failed to write trade row")?;
    }

    writer.flush().context("Failed to flush CSV writer")?;
    let bytes = writer
        .into_inner()
        .map_err(|err| anyhow::anyhow!("Failed to finish CSV export: {}", err))?;
    String::from_utf8(bytes).context("Exported CSV was not valid UTF-8")
}
