use crate::extract::MonthlyTable;
use crate::schema::TargetDefinition;
use serde::Serialize;

/// Three-level achievement status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    OnTrack,
    AtRisk,
    Critical,
}

impl Status {
    /// `>= 100` is on track, `>= 80` at risk, anything lower or absent is
    /// critical.
    pub fn from_achievement_rate(rate: Option<f64>) -> Self {
        match rate {
            Some(rate) if rate >= 100.0 => Status::OnTrack,
            Some(rate) if rate >= 80.0 => Status::AtRisk,
            _ => Status::Critical,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TargetComparison {
    pub metric_key: String,
    pub display_name: String,
    pub current_value: Option<f64>,
    pub target_value: f64,
    /// Percent of target, e.g. `104.3`.
    pub achievement_rate: Option<f64>,
    pub status: Status,
    /// `current_value - target_value`.
    pub delta: Option<f64>,
}

pub struct TargetScorer<'a> {
    targets: &'a [TargetDefinition],
}

impl<'a> TargetScorer<'a> {
    pub fn new(targets: &'a [TargetDefinition]) -> Self {
        Self { targets }
    }

    /// One comparison per configured target, in configured order.
    ///
    /// The in-table target captured by the monthly extractor is ignored;
    /// only the configured value is compared against.
    pub fn score(&self, monthly: Option<&MonthlyTable>) -> Vec<TargetComparison> {
        self.targets
            .iter()
            .map(|target| {
                let current_value = monthly
                    .and_then(|m| m.find(&target.key))
                    .and_then(|metric| metric.series.latest_value())
                    .map(|obs| obs.value);

                score_value(target, current_value)
            })
            .collect()
    }
}

pub fn score_value(target: &TargetDefinition, current_value: Option<f64>) -> TargetComparison {
    let achievement_rate = current_value.map(|v| v / target.target * 100.0);

    TargetComparison {
        metric_key: target.key.clone(),
        display_name: target.display_name.clone(),
        current_value,
        target_value: target.target,
        achievement_rate,
        status: Status::from_achievement_rate(achievement_rate),
        delta: current_value.map(|v| v - target.target),
    }
}
