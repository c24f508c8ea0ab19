use crate::anomaly::{AnomalyAlert, AnomalyKind, TrendAlert};
use crate::comparator::PeriodComparison;
use crate::extract::SeriesTable;
use crate::format::{format_kpi_value, format_number, format_percent, MISSING};
use crate::schema::{KpiConfig, Unit};
use crate::targets::{Status, TargetComparison};
use crate::ServiceAnalysis;

/// Number of recent present values quoted per funnel metric.
const FUNNEL_RECENT_VALUES: usize = 3;

/// Plain-text digest of one analysis, used as context for narrative
/// generation. Alert sections are left out when there is nothing to report,
/// the funnel section when the run had no daily table.
pub fn render_context(analysis: &ServiceAnalysis, config: &KpiConfig) -> String {
    let mut sections: Vec<String> = Vec::new();

    sections.push(format!("# {} KPI digest", analysis.service));
    sections.push(format!("Date: {}", analysis.date.format("%Y-%m-%d")));
    sections.push(String::new());

    sections.push("## Target achievement".to_string());
    for comparison in &analysis.target_comparisons {
        let unit = config
            .target_for(&comparison.metric_key)
            .map(|t| t.unit)
            .unwrap_or(Unit::Number);
        sections.push(target_line(comparison, unit));
    }
    sections.push(String::new());

    let cadences = [
        ("## Month over month", &analysis.mom_comparisons),
        ("## Week over week", &analysis.wow_comparisons),
        ("## Day over day", &analysis.dod_comparisons),
    ];
    for (title, comparisons) in cadences {
        sections.push(title.to_string());
        sections.extend(comparisons.iter().map(comparison_line));
        sections.push(String::new());
    }

    if !analysis.anomalies.is_empty() {
        sections.push("## Anomalies".to_string());
        sections.extend(analysis.anomalies.iter().map(anomaly_line));
        sections.push(String::new());
    }

    if !analysis.trends.is_empty() {
        sections.push("## Trend warnings".to_string());
        sections.extend(analysis.trends.iter().map(trend_line));
        sections.push(String::new());
    }

    if let Some(daily) = &analysis.daily_data {
        sections.push("## Funnel data".to_string());
        let lines = funnel_lines(daily, &config.funnel_metrics);
        if lines.is_empty() {
            sections.push("- no funnel data".to_string());
        } else {
            sections.extend(lines);
        }
        sections.push(String::new());
    }

    sections.join("\n")
}

fn status_label(status: Status) -> &'static str {
    match status {
        Status::OnTrack => "on_track",
        Status::AtRisk => "at_risk",
        Status::Critical => "critical",
    }
}

fn target_line(comparison: &TargetComparison, unit: Unit) -> String {
    let rate = comparison
        .achievement_rate
        .map(|r| format!("{:.1}%", r))
        .unwrap_or_else(|| MISSING.to_string());

    format!(
        "- {}: {} (target {}, achievement {}, status: {})",
        comparison.display_name,
        format_kpi_value(comparison.current_value, unit),
        format_kpi_value(Some(comparison.target_value), unit),
        rate,
        status_label(comparison.status)
    )
}

fn raw_value(value: Option<f64>) -> String {
    value
        .map(|v| v.to_string())
        .unwrap_or_else(|| MISSING.to_string())
}

fn comparison_line(comparison: &PeriodComparison) -> String {
    format!(
        "- {}: previous {} -> current {} (change: {})",
        comparison.display_name,
        raw_value(comparison.previous_value),
        raw_value(comparison.current_value),
        format_percent(comparison.percent_change, 1)
    )
}

fn anomaly_line(alert: &AnomalyAlert) -> String {
    let kind = match alert.kind {
        AnomalyKind::Spike => "spike",
        AnomalyKind::Drop => "drop",
    };
    format!(
        "- [{}] {}: {} - {} change ({} -> {})",
        kind,
        alert.display_name,
        alert.period_label,
        format_percent(Some(alert.change_percent), 1),
        alert.previous_value,
        alert.value
    )
}

fn funnel_lines(daily: &SeriesTable, funnel_metrics: &[String]) -> Vec<String> {
    daily
        .metrics
        .iter()
        .filter(|metric| funnel_metrics.contains(&metric.metric_key))
        .filter_map(|metric| {
            let recent = metric.last_n_values(FUNNEL_RECENT_VALUES);
            if recent.is_empty() {
                return None;
            }
            let values: Vec<String> = recent.iter().map(|o| o.value.to_string()).collect();
            Some(format!(
                "- {} ({}): recent {}",
                metric.display_name,
                metric.metric_key,
                values.join(", ")
            ))
        })
        .collect()
}

fn trend_line(alert: &TrendAlert) -> String {
    format!(
        "- [consecutive decline] {}: {} periods ({} ~ {}, total {}%)",
        alert.display_name,
        alert.consecutive_decline_days,
        alert.start_label,
        alert.end_label,
        format_number(Some(alert.total_decline_percent), 1)
    )
}
