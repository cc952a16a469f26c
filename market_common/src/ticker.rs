//! Raw upstream ticks and the price normalizer.
//!
//! A `RawTick` is what the upstream feed sends for one symbol: loosely typed
//! buy/sell/close values that may arrive as numbers or as locale-formatted
//! strings. A `Ticker` is the display-ready record consumers receive. Turning
//! one into the other is total: bad numbers become `0.0`, unknown symbols are
//! filtered out, nothing here fails.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::symbols::Symbol;

/// Latest upstream record for one symbol, merged into the market state as a whole.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawTick {
    /// Buy price.
    #[serde(default)]
    pub alis: Value,
    /// Sell price.
    #[serde(default)]
    pub satis: Value,
    /// Previous close.
    #[serde(default)]
    pub kapanis: Value,
    /// Upstream code, usually equal to the map key it arrived under.
    #[serde(default)]
    pub code: Value,
    /// Any other fields the upstream sends, kept as-is.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Normalized ticker broadcast to consumers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ticker {
    /// Display name, e.g. `Gram Altın`.
    pub symbol: String,
    /// Upstream symbol code, e.g. `KULCEALTIN`.
    pub code: String,
    /// Reference price; equal to the buy price.
    pub price: f64,
    /// Buy price.
    pub buy: f64,
    /// Sell price.
    pub sell: f64,
    /// Buy price change against the previous close, in percent.
    pub change_percent: f64,
}

/// Parse a loosely typed upstream price into a finite float.
///
/// Numbers pass through, strings go through [`parse_price_str`], everything
/// else (null, bool, arrays, objects) is `0.0`.
pub fn parse_price(value: &Value) -> f64 {
    match value {
        Value::Number(n) => finite_or_zero(n.as_f64().unwrap_or(0.0)),
        Value::String(s) => parse_price_str(s),
        _ => 0.0,
    }
}

/// Parse a price string that may use either `,` or `.` as the decimal separator.
///
/// When both separators occur, the last one is the decimal point and the other
/// groups thousands. A lone comma is a decimal point; repeated commas or dots
/// without the other separator group thousands.
pub fn parse_price_str(raw: &str) -> f64 {
    let s = raw.trim();
    if s.is_empty() {
        return 0.0;
    }

    let last_comma = s.rfind(',');
    let last_dot = s.rfind('.');
    let normalized = match (last_comma, last_dot) {
        (Some(comma), Some(dot)) if comma > dot => s.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => s.replace(',', ""),
        (Some(_), None) if s.matches(',').count() == 1 => s.replace(',', "."),
        (Some(_), None) => s.replace(',', ""),
        (None, Some(_)) if s.matches('.').count() > 1 => s.replace('.', ""),
        _ => s.to_string(),
    };

    normalized
        .parse::<f64>()
        .map(finite_or_zero)
        .unwrap_or(0.0)
}

fn finite_or_zero(v: f64) -> f64 {
    if v.is_finite() { v } else { 0.0 }
}

/// Percent change of `buy` against `close`; `0.0` when there is no positive close.
pub fn change_percent(buy: f64, close: f64) -> f64 {
    if close > 0.0 {
        ((buy - close) / close) * 100.0
    } else {
        0.0
    }
}

/// Normalize one tick. Returns `None` when `code` is not a known [`Symbol`].
pub fn normalize(code: &str, raw: &RawTick) -> Option<Ticker> {
    let symbol = Symbol::from_code(code)?;
    Some(normalize_known(symbol, raw))
}

fn normalize_known(symbol: Symbol, raw: &RawTick) -> Ticker {
    let buy = parse_price(&raw.alis);
    let sell = parse_price(&raw.satis);
    let close = parse_price(&raw.kapanis);

    Ticker {
        symbol: symbol.display_name().to_string(),
        code: symbol.code().to_string(),
        price: buy,
        buy,
        sell,
        change_percent: change_percent(buy, close),
    }
}

/// Normalize every known symbol in `ticks`, ordered by the symbol table.
pub fn normalize_all<'a, I>(ticks: I) -> Vec<Ticker>
where
    I: IntoIterator<Item = (&'a String, &'a RawTick)>,
{
    let mut known: Vec<(Symbol, &RawTick)> = ticks
        .into_iter()
        .filter_map(|(code, raw)| Symbol::from_code(code).map(|symbol| (symbol, raw)))
        .collect();
    known.sort_by_key(|(symbol, _)| *symbol);

    known
        .into_iter()
        .map(|(symbol, raw)| normalize_known(symbol, raw))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    fn tick(value: Value) -> RawTick {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn parses_dot_and_comma_decimals() {
        assert_eq!(parse_price(&json!("1235.0")), 1235.0);
        assert_eq!(parse_price(&json!("12,5")), 12.5);
        assert_eq!(parse_price(&json!("1,234.5")), 1234.5);
        assert_eq!(parse_price(&json!("1.234,5")), 1234.5);
        assert_eq!(parse_price(&json!("1.234.567")), 1234567.0);
        assert_eq!(parse_price(&json!(" 42 ")), 42.0);
        assert_eq!(parse_price(&json!(3021.75)), 3021.75);
    }

    #[test]
    fn bad_numbers_default_to_zero() {
        for value in [
            json!(null),
            json!(""),
            json!("   "),
            json!("abc"),
            json!("N/A"),
            json!("NaN"),
            json!("inf"),
            json!(true),
            json!([1]),
            json!({"v": 1}),
        ] {
            let parsed = parse_price(&value);
            assert_eq!(parsed, 0.0, "{}", value);
        }
    }

    #[test]
    fn change_percent_guards_zero_close() {
        assert_eq!(change_percent(100.0, 0.0), 0.0);
        assert_eq!(change_percent(100.0, -5.0), 0.0);
        assert!((change_percent(1234.5, 1200.0) - 2.875).abs() < 1e-9);
        assert!((change_percent(90.0, 100.0) + 10.0).abs() < 1e-9);
    }

    #[test]
    fn normalizes_known_symbol() {
        let raw = tick(json!({
            "alis": "1,234.5",
            "satis": "1235.0",
            "kapanis": "1200.0",
            "code": "ONS"
        }));
        let ticker = normalize("ONS", &raw).unwrap();

        assert_eq!(ticker.symbol, "Altın Ons");
        assert_eq!(ticker.code, "ONS");
        assert_eq!(ticker.price, 1234.5);
        assert_eq!(ticker.buy, 1234.5);
        assert_eq!(ticker.sell, 1235.0);
        assert!((ticker.change_percent - 2.875).abs() < 1e-9);
    }

    #[test]
    fn unknown_symbol_is_filtered() {
        let raw = tick(json!({"alis": "1", "satis": "2"}));
        assert_eq!(normalize("UNKNOWN", &raw), None);
    }

    #[test]
    fn missing_fields_normalize_to_zero() {
        let ticker = normalize("ALTIN", &RawTick::default()).unwrap();
        assert_eq!(ticker.buy, 0.0);
        assert_eq!(ticker.sell, 0.0);
        assert_eq!(ticker.change_percent, 0.0);
    }

    #[test]
    fn normalize_all_orders_by_symbol_table() {
        let mut ticks = HashMap::new();
        ticks.insert("KULCEALTIN".to_string(), tick(json!({"alis": "2500"})));
        ticks.insert("UNKNOWN".to_string(), tick(json!({"alis": "1"})));
        ticks.insert("ALTIN".to_string(), tick(json!({"alis": "2490"})));
        ticks.insert("ONS".to_string(), tick(json!({"alis": "2000"})));

        let codes: Vec<String> = normalize_all(&ticks).into_iter().map(|t| t.code).collect();
        assert_eq!(codes, vec!["ALTIN", "ONS", "KULCEALTIN"]);
    }

    #[test]
    fn ticker_serializes_in_camel_case() {
        let raw = tick(json!({"alis": 10, "satis": 11, "kapanis": 8}));
        let value = serde_json::to_value(normalize("ONS", &raw).unwrap()).unwrap();
        assert_eq!(value["symbol"], "Altın Ons");
        assert_eq!(value["changePercent"], 25.0);
        assert!(value.get("change_percent").is_none());
    }

    #[test]
    fn raw_tick_keeps_unknown_fields() {
        let raw = tick(json!({"alis": "1", "dusuk": "0.9", "tarih": "x"}));
        assert_eq!(raw.extra.get("dusuk"), Some(&json!("0.9")));
        assert_eq!(raw.satis, Value::Null);
    }
}
