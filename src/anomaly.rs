use crate::extract::{MetricSeries, Observation, SeriesTable};
use crate::schema::DetectionThresholds;
use serde::Serialize;
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyKind {
    Spike,
    Drop,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnomalyAlert {
    pub metric_key: String,
    pub display_name: String,
    pub kind: AnomalyKind,
    pub period_label: String,
    pub value: f64,
    pub previous_value: f64,
    /// Fractional step change relative to `|previous_value|`.
    pub change_percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendAlert {
    pub metric_key: String,
    pub display_name: String,
    pub consecutive_decline_days: usize,
    pub start_label: String,
    pub end_label: String,
    /// Decline over the whole run, in percent (e.g. `-12.5`).
    pub total_decline_percent: f64,
}

pub struct AnomalyDetector<'a> {
    thresholds: &'a DetectionThresholds,
    core_metrics: &'a [String],
}

impl<'a> AnomalyDetector<'a> {
    pub fn new(thresholds: &'a DetectionThresholds, core_metrics: &'a [String]) -> Self {
        Self {
            thresholds,
            core_metrics,
        }
    }

    /// Large single-step changes across every metric of the daily table,
    /// most recent first and capped at `max_anomalies`.
    ///
    /// Labels are compared as strings, so they must sort chronologically
    /// (ISO dates do).
    pub fn detect_anomalies(&self, daily: Option<&SeriesTable>) -> Vec<AnomalyAlert> {
        let Some(daily) = daily else {
            return Vec::new();
        };

        let mut alerts: Vec<AnomalyAlert> = daily
            .metrics
            .iter()
            .flat_map(|metric| self.scan_steps(metric))
            .collect();

        alerts.sort_by(|a, b| {
            b.period_label.cmp(&a.period_label).then_with(|| {
                b.change_percent
                    .abs()
                    .partial_cmp(&a.change_percent.abs())
                    .unwrap_or(Ordering::Equal)
            })
        });
        alerts.truncate(self.thresholds.max_anomalies);
        alerts
    }

    fn scan_steps(&self, metric: &MetricSeries) -> Vec<AnomalyAlert> {
        let window = metric.last_n_values(self.thresholds.lookback);

        window
            .windows(2)
            .filter_map(|pair| {
                let (prev, curr) = (&pair[0], &pair[1]);
                if prev.value == 0.0 {
                    return None;
                }

                let change_percent = (curr.value - prev.value) / prev.value.abs();
                if change_percent.abs() < self.thresholds.anomaly_threshold {
                    return None;
                }

                Some(AnomalyAlert {
                    metric_key: metric.metric_key.clone(),
                    display_name: metric.display_name.clone(),
                    kind: if change_percent > 0.0 {
                        AnomalyKind::Spike
                    } else {
                        AnomalyKind::Drop
                    },
                    period_label: curr.label.clone(),
                    value: curr.value,
                    previous_value: prev.value,
                    change_percent,
                })
            })
            .collect()
    }

    /// Sustained declines ending at the most recent period, for core
    /// metrics only. Not capped.
    pub fn detect_trends(&self, daily: Option<&SeriesTable>) -> Vec<TrendAlert> {
        let Some(daily) = daily else {
            return Vec::new();
        };

        self.core_metrics
            .iter()
            .filter_map(|key| daily.find(key))
            .filter_map(|metric| self.trailing_decline(metric))
            .collect()
    }

    fn trailing_decline(&self, metric: &MetricSeries) -> Option<TrendAlert> {
        let min_run = self.thresholds.min_decline_run;
        let window = metric.last_n_values(self.thresholds.lookback);
        if window.len() < min_run {
            return None;
        }

        let declines = count_trailing_declines(&window);
        if declines == 0 || declines < min_run {
            return None;
        }

        let start = &window[window.len() - 1 - declines];
        let end = &window[window.len() - 1];
        let total_decline_percent = if start.value != 0.0 {
            (end.value - start.value) / start.value.abs() * 100.0
        } else {
            0.0
        };

        Some(TrendAlert {
            metric_key: metric.metric_key.clone(),
            display_name: metric.display_name.clone(),
            consecutive_decline_days: declines,
            start_label: start.label.clone(),
            end_label: end.label.clone(),
            total_decline_percent,
        })
    }
}

/// Strictly decreasing steps counted backward from the last observation.
fn count_trailing_declines(window: &[Observation]) -> usize {
    window
        .windows(2)
        .rev()
        .take_while(|pair| pair[1].value < pair[0].value)
        .count()
}
