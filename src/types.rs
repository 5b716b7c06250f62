//! Core data types used across the journal
//!
//! The canonical `Trade` record plus the small auxiliary shapes that travel
//! with it (screenshots, manual-entry submissions, validation errors).

use chrono::{NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Validation errors for trade records
#[derive(Debug, Error)]
pub enum TradeValidationError {
    #[error("symbol must not be empty")]
    EmptySymbol,

    #[error("{field} ({value}) must be >= 0")]
    NegativeValue { field: &'static str, value: f64 },

    #[error("date '{0}' is not a recognized calendar date")]
    InvalidDate(String),
}

/// Trade direction
///
/// Import sources spell this inconsistently; `buy`/`sell` are accepted as
/// aliases and normalized here. `Unknown` survives normalization when the
/// source carries neither an explicit side nor enough fill data to infer one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Long,
    Short,
    #[default]
    Unknown,
}

impl Side {
    /// Parse a side string, resolving broker aliases
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "long" | "buy" => Side::Long,
            "short" | "sell" => Side::Short,
            _ => Side::Unknown,
        }
    }

    /// Derive pnl from fills when the source did not supply one
    ///
    /// Unknown sides use the short formula, matching how unlabeled imports
    /// have always been booked.
    pub fn derived_pnl(&self, entry: f64, exit: f64, quantity: f64, fees: f64) -> f64 {
        let gross = match self {
            Side::Long => (exit - entry) * quantity,
            Side::Short | Side::Unknown => (entry - exit) * quantity,
        };
        gross - fees
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Side::Long => "long",
            Side::Short => "short",
            Side::Unknown => "unknown",
        };
        write!(f, "{}", s)
    }
}

/// Image attached to a trade
///
/// The payload is whatever encoding the host persisted (typically a data
/// URL); analytics never looks inside it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Screenshot {
    pub id: String,
    pub data: String,
    pub filename: String,
    #[serde(default)]
    pub caption: String,
    #[serde(default)]
    pub timestamp: String,
}

/// A single closed trade
///
/// Field names serialize in camelCase so collections round-trip against the
/// JSON the host has historically persisted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trade {
    pub id: String,
    /// Calendar date, canonical form `YYYY-MM-DD`
    pub date: String,
    /// Clock time `HH:MM`, only present for intraday imports
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    pub symbol: String,
    pub side: Side,
    pub quantity: f64,
    pub entry_price: f64,
    pub exit_price: f64,
    pub fees: f64,
    pub pnl: f64,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub trade_notes: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub duration: String,
    #[serde(default)]
    pub screenshots: Vec<Screenshot>,
}

impl Trade {
    /// Parse the trade date, tolerating the common import spellings
    pub fn parsed_date(&self) -> Option<NaiveDate> {
        let s = self.date.trim();
        NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .or_else(|_| NaiveDate::parse_from_str(s, "%m/%d/%Y"))
            .or_else(|_| NaiveDate::parse_from_str(s, "%Y/%m/%d"))
            .ok()
    }

    /// Parse the clock time, if one was captured
    pub fn parsed_time(&self) -> Option<NaiveTime> {
        let t = self.time.as_deref()?.trim();
        NaiveTime::parse_from_str(t, "%H:%M").ok()
    }

    /// Hour-of-day bucket, if a clock time was captured
    pub fn hour(&self) -> Option<u32> {
        use chrono::Timelike;
        self.parsed_time().map(|t| t.hour())
    }

    pub fn is_win(&self) -> bool {
        self.pnl > 0.0
    }

    pub fn is_loss(&self) -> bool {
        self.pnl < 0.0
    }

    /// Notional value at entry
    pub fn position_value(&self) -> f64 {
        self.entry_price * self.quantity
    }

    /// Validate the record
    pub fn validate(&self) -> Result<(), TradeValidationError> {
        if self.symbol.trim().is_empty() {
            return Err(TradeValidationError::EmptySymbol);
        }
        for (field, value) in [
            ("quantity", self.quantity),
            ("entry price", self.entry_price),
            ("exit price", self.exit_price),
            ("fees", self.fees),
        ] {
            if value < 0.0 {
                return Err(TradeValidationError::NegativeValue { field, value });
            }
        }
        if self.parsed_date().is_none() {
            return Err(TradeValidationError::InvalidDate(self.date.clone()));
        }
        Ok(())
    }

    /// Check validity without the detailed error
    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    /// Build a trade from a manual-entry submission
    ///
    /// Validates the submission, uppercases the symbol, derives pnl from the
    /// fills, and assigns a fresh `manual_` id.
    pub fn from_manual(entry: ManualEntry) -> Result<Self, TradeValidationError> {
        let pnl = entry.side.derived_pnl(
            entry.entry_price,
            entry.exit_price,
            entry.quantity,
            entry.fees,
        );
        let trade = Trade {
            id: format!("manual_{}", Utc::now().timestamp_millis()),
            date: entry.date,
            time: entry.time,
            symbol: entry.symbol.trim().to_uppercase(),
            side: entry.side,
            quantity: entry.quantity,
            entry_price: entry.entry_price,
            exit_price: entry.exit_price,
            fees: entry.fees,
            pnl,
            tags: entry.tags,
            trade_notes: entry.trade_notes,
            notes: entry.notes,
            duration: entry.duration,
            screenshots: Vec::new(),
        };
        trade.validate()?;
        Ok(trade)
    }
}

/// Manual-entry submission: the trade schema minus derived fields
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManualEntry {
    pub date: String,
    #[serde(default)]
    pub time: Option<String>,
    pub symbol: String,
    pub side: Side,
    pub quantity: f64,
    pub entry_price: f64,
    pub exit_price: f64,
    #[serde(default)]
    pub fees: f64,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub trade_notes: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub duration: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_side_aliases() {
        assert_eq!(Side::parse("long"), Side::Long);
        assert_eq!(Side::parse("BUY"), Side::Long);
        assert_eq!(Side::parse(" sell "), Side::Short);
        assert_eq!(Side::parse("short"), Side::Short);
        assert_eq!(Side::parse("flat"), Side::Unknown);
        assert_eq!(Side::parse(""), Side::Unknown);
    }

    #[test]
    fn test_derived_pnl_by_side() {
        // Long: (12 - 10) * 100 - 5 = 195
        assert_eq!(Side::Long.derived_pnl(10.0, 12.0, 100.0, 5.0), 195.0);
        // Short: (10 - 12) * 100 - 5 = -205
        assert_eq!(Side::Short.derived_pnl(10.0, 12.0, 100.0, 5.0), -205.0);
        // Unknown books like a short
        assert_eq!(
            Side::Unknown.derived_pnl(10.0, 12.0, 100.0, 5.0),
            Side::Short.derived_pnl(10.0, 12.0, 100.0, 5.0)
        );
    }

    #[test]
    fn test_parsed_date_formats() {
        let mut trade = Trade {
            date: "2024-01-15".to_string(),
            ..Default::default()
        };
        assert_eq!(trade.parsed_date(), NaiveDate::from_ymd_opt(2024, 1, 15));

        trade.date = "01/15/2024".to_string();
        assert_eq!(trade.parsed_date(), NaiveDate::from_ymd_opt(2024, 1, 15));

        trade.date = "not-a-date".to_string();
        assert_eq!(trade.parsed_date(), None);
    }

    #[test]
    fn test_manual_entry_derives_pnl() {
        let entry = ManualEntry {
            date: "2024-03-01".to_string(),
            symbol: "aapl".to_string(),
            side: Side::Long,
            quantity: 50.0,
            entry_price: 100.0,
            exit_price: 102.0,
            fees: 1.0,
            ..Default::default()
        };
        let trade = Trade::from_manual(entry).unwrap();
        assert_eq!(trade.symbol, "AAPL");
        assert_eq!(trade.pnl, 99.0);
        assert!(trade.id.starts_with("manual_"));
    }

    #[test]
    fn test_manual_entry_rejects_bad_input() {
        let entry = ManualEntry {
            date: "2024-03-01".to_string(),
            symbol: "  ".to_string(),
            side: Side::Long,
            quantity: 1.0,
            entry_price: 10.0,
            exit_price: 11.0,
            ..Default::default()
        };
        assert!(matches!(
            Trade::from_manual(entry),
            Err(TradeValidationError::EmptySymbol)
        ));

        let entry = ManualEntry {
            date: "yesterday".to_string(),
            symbol: "AAPL".to_string(),
            side: Side::Long,
            quantity: 1.0,
            entry_price: 10.0,
            exit_price: 11.0,
            ..Default::default()
        };
        assert!(matches!(
            Trade::from_manual(entry),
            Err(TradeValidationError::InvalidDate(_))
        ));
    }

    #[test]
    fn test_trade_json_round_trip_uses_camel_case() {
        let trade = Trade {
            id: "t1".to_string(),
            date: "2024-01-02".to_string(),
            symbol: "MSFT".to_string(),
            side: Side::Long,
            quantity: 10.0,
            entry_price: 400.0,
            exit_price: 401.5,
            pnl: 15.0,
            trade_notes: "clean breakout".to_string(),
            ..Default::default()
        };
        let json = serde_json::to_string(&trade).unwrap();
        assert!(json.contains("\"entryPrice\":400.0"));
        assert!(json.contains("\"tradeNotes\":\"clean breakout\""));

        let back: Trade = serde_json::from_str(&json).unwrap();
        assert_eq!(back, trade);
    }
}
