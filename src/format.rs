//! Display helpers for KPI values. Absent values render as `N/A`.

use crate::cell::CURRENCY_GLYPH;
use crate::schema::Unit;
use crate::targets::Status;
use num_format::{Locale, ToFormattedString};

pub const MISSING: &str = "N/A";

/// `0.752` -> `75.2%`
pub fn format_percent(value: Option<f64>, decimals: usize) -> String {
    match value {
        Some(v) => format!("{:.*}%", decimals, v * 100.0),
        None => MISSING.to_string(),
    }
}

/// Percentage-point delta: `0.032` -> `+3.2%p`
pub fn format_percent_delta(value: Option<f64>, decimals: usize) -> String {
    match value {
        Some(v) => {
            let points = v * 100.0;
            format!("{}{:.*}%p", sign(points), decimals, points)
        }
        None => MISSING.to_string(),
    }
}

/// `29400` -> `₩29,400`
pub fn format_currency(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{}{}", CURRENCY_GLYPH, group_integer(round_half_up(v))),
        None => MISSING.to_string(),
    }
}

/// `1400` -> `+₩1,400`, `-1400` -> `-₩1,400`
pub fn format_currency_delta(value: Option<f64>) -> String {
    match value {
        Some(v) => {
            let rounded = round_half_up(v);
            let sign = if rounded >= 0.0 { "+" } else { "-" };
            format!("{}{}{}", sign, CURRENCY_GLYPH, group_integer(rounded.abs()))
        }
        None => MISSING.to_string(),
    }
}

/// Fixed decimals with comma-grouped integer part: `1267` -> `1,267`
pub fn format_number(value: Option<f64>, decimals: usize) -> String {
    let Some(v) = value else {
        return MISSING.to_string();
    };

    let fixed = format!("{:.*}", decimals, v.abs());
    let (int_part, frac_part) = match fixed.split_once('.') {
        Some((int_part, frac_part)) => (int_part, Some(frac_part)),
        None => (fixed.as_str(), None),
    };

    let grouped = int_part
        .parse::<u64>()
        .map(|n| n.to_formatted_string(&Locale::en))
        .unwrap_or_else(|_| int_part.to_string());

    let negative = v < 0.0 && fixed.chars().any(|c| c.is_ascii_digit() && c != '0');
    let mut out = String::new();
    if negative {
        out.push('-');
    }
    out.push_str(&grouped);
    if let Some(frac) = frac_part {
        out.push('.');
        out.push_str(frac);
    }
    out
}

/// `0.032` -> `▲ +3.2%`, `-0.019` -> `▼ -1.9%`
pub fn format_change_with_arrow(value: Option<f64>, decimals: usize) -> String {
    match value {
        Some(v) => {
            let pct = v * 100.0;
            let arrow = if pct >= 0.0 { '▲' } else { '▼' };
            format!("{} {}{:.*}%", arrow, sign(pct), decimals, pct)
        }
        None => MISSING.to_string(),
    }
}

pub fn status_emoji(status: Status) -> &'static str {
    match status {
        Status::OnTrack => "🟢",
        Status::AtRisk => "🟡",
        Status::Critical => "🔴",
    }
}

pub fn format_kpi_value(value: Option<f64>, unit: Unit) -> String {
    match unit {
        Unit::Percent => format_percent(value, 1),
        Unit::Currency => format_currency(value),
        Unit::Number => format_number(value, 0),
    }
}

pub fn format_kpi_delta(value: Option<f64>, unit: Unit) -> String {
    match unit {
        Unit::Percent => format_percent_delta(value, 1),
        Unit::Currency => format_currency_delta(value),
        Unit::Number => match value {
            Some(v) => format!("{}{}", sign(v), format_number(Some(v), 0)),
            None => MISSING.to_string(),
        },
    }
}

fn sign(value: f64) -> &'static str {
    if value >= 0.0 {
        "+"
    } else {
        ""
    }
}

/// Halves round toward positive infinity: `-1400.5` -> `-1400`, `2.5` -> `3`.
fn round_half_up(value: f64) -> f64 {
    (value + 0.5).floor()
}

fn group_integer(value: f64) -> String {
    format_number(Some(value), 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent_formats() {
        assert_eq!(format_percent(Some(0.752), 1), "75.2%");
        assert_eq!(format_percent(None, 1), "N/A");
        assert_eq!(format_percent_delta(Some(0.032), 1), "+3.2%p");
        assert_eq!(format_percent_delta(Some(-0.019), 1), "-1.9%p");
    }

    #[test]
    fn test_currency_formats() {
        assert_eq!(format_currency(Some(29400.0)), "₩29,400");
        assert_eq!(format_currency(Some(5_923_600.4)), "₩5,923,600");
        assert_eq!(format_currency_delta(Some(1400.0)), "+₩1,400");
        assert_eq!(format_currency_delta(Some(-1400.0)), "-₩1,400");
        assert_eq!(format_currency_delta(None), "N/A");
    }

    #[test]
    fn test_currency_halves_round_up() {
        assert_eq!(format_currency_delta(Some(-1400.5)), "-₩1,400");
        assert_eq!(format_currency_delta(Some(1400.5)), "+₩1,401");
        assert_eq!(format_currency_delta(Some(-0.4)), "+₩0");
        assert_eq!(format_currency(Some(18170.5)), "₩18,171");
        assert_eq!(format_currency(Some(-2.5)), "₩-2");
    }

    #[test]
    fn test_number_formats() {
        assert_eq!(format_number(Some(1267.0), 0), "1,267");
        assert_eq!(format_number(Some(-1234567.891), 2), "-1,234,567.89");
        assert_eq!(format_number(Some(-0.2), 0), "0");
        assert_eq!(format_number(Some(12.0), 1), "12.0");
    }

    #[test]
    fn test_arrow_formats() {
        assert_eq!(format_change_with_arrow(Some(0.032), 1), "▲ +3.2%");
        assert_eq!(format_change_with_arrow(Some(-0.019), 1), "▼ -1.9%");
    }

    #[test]
    fn test_unit_dispatch() {
        assert_eq!(format_kpi_value(Some(0.75), Unit::Percent), "75.0%");
        assert_eq!(format_kpi_value(Some(28000.0), Unit::Currency), "₩28,000");
        assert_eq!(format_kpi_value(Some(1267.0), Unit::Number), "1,267");
        assert_eq!(format_kpi_delta(Some(-5.0), Unit::Number), "-5");
        assert_eq!(format_kpi_delta(Some(5.0), Unit::Number), "+5");
        assert_eq!(status_emoji(Status::AtRisk), "🟡");
    }
}
