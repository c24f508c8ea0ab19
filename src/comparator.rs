use crate::extract::SeriesTable;
use crate::review::{ReviewMetric, ReviewTable};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodComparison {
    pub metric_key: String,
    pub display_name: String,
    pub previous_value: Option<f64>,
    pub current_value: Option<f64>,
    pub absolute_delta: Option<f64>,
    /// Fractional change (0.05 means +5%).
    pub percent_change: Option<f64>,
}

impl PeriodComparison {
    /// Placeholder for a key with no matching row; the key doubles as the
    /// display name.
    pub fn missing(metric_key: &str) -> Self {
        Self {
            metric_key: metric_key.to_string(),
            display_name: metric_key.to_string(),
            previous_value: None,
            current_value: None,
            absolute_delta: None,
            percent_change: None,
        }
    }
}

/// Computes day, week and month comparisons for a fixed list of keys.
pub struct PeriodComparator<'a> {
    core_metrics: &'a [String],
}

impl<'a> PeriodComparator<'a> {
    pub fn new(core_metrics: &'a [String]) -> Self {
        Self { core_metrics }
    }

    /// Day-over-day from the two most recent present daily values.
    pub fn day_over_day(&self, daily: Option<&SeriesTable>) -> Vec<PeriodComparison> {
        let Some(daily) = daily else {
            return Vec::new();
        };

        self.core_metrics
            .iter()
            .map(|key| {
                let Some(metric) = daily.find(key) else {
                    return PeriodComparison::missing(key);
                };

                let last_two = metric.last_n_values(2);
                if let [prev, curr] = last_two.as_slice() {
                    let absolute_delta = curr.value - prev.value;
                    PeriodComparison {
                        metric_key: key.clone(),
                        display_name: metric.display_name.clone(),
                        previous_value: Some(prev.value),
                        current_value: Some(curr.value),
                        absolute_delta: Some(absolute_delta),
                        percent_change: (prev.value != 0.0).then(|| absolute_delta / prev.value),
                    }
                } else {
                    PeriodComparison {
                        metric_key: key.clone(),
                        display_name: metric.display_name.clone(),
                        previous_value: last_two.first().map(|obs| obs.value),
                        current_value: None,
                        absolute_delta: None,
                        percent_change: None,
                    }
                }
            })
            .collect()
    }

    /// Week-over-week from the review table's W-2 / W-1 columns.
    pub fn week_over_week(&self, review: Option<&ReviewTable>) -> Vec<PeriodComparison> {
        self.from_review(review, |m| (m.prev_week, m.curr_week, m.week_change))
    }

    /// Month-over-month from the review table's M-1 / M0 columns.
    pub fn month_over_month(&self, review: Option<&ReviewTable>) -> Vec<PeriodComparison> {
        self.from_review(review, |m| (m.prev_month, m.curr_month, m.month_change))
    }

    fn from_review<F>(&self, review: Option<&ReviewTable>, pick: F) -> Vec<PeriodComparison>
    where
        F: Fn(&ReviewMetric) -> (Option<f64>, Option<f64>, Option<f64>),
    {
        let Some(review) = review else {
            return Vec::new();
        };

        self.core_metrics
            .iter()
            .map(|key| match review.find(key) {
                Some(metric) => {
                    let (previous_value, current_value, percent_change) = pick(metric);
                    PeriodComparison {
                        metric_key: key.clone(),
                        display_name: metric.display_name.clone(),
                        previous_value,
                        current_value,
                        absolute_delta: current_value
                            .zip(previous_value)
                            .map(|(curr, prev)| curr - prev),
                        percent_change,
                    }
                }
                None => PeriodComparison::missing(key),
            })
            .collect()
    }
}
