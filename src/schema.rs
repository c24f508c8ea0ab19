use crate::error::{KpiDigestError, Result};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::Path;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Cadence {
    #[schemars(description = "One column per calendar day")]
    Daily,

    #[schemars(description = "One column per week")]
    Weekly,

    #[schemars(description = "One column per month, with optional target and benchmark columns")]
    Monthly,
}

impl fmt::Display for Cadence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Cadence::Daily => "daily",
            Cadence::Weekly => "weekly",
            Cadence::Monthly => "monthly",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Unit {
    #[schemars(description = "Ratio stored as a fraction (0.75 means 75%)")]
    Percent,

    #[schemars(description = "Amount in won")]
    Currency,

    #[schemars(description = "Plain count or quantity")]
    Number,
}

/// Where one table variant keeps its keys, labels and data.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct LayoutDescriptor {
    #[schemars(description = "Name of the table in the source, e.g. '[Daily] ZZEM'")]
    pub table_name: String,

    #[schemars(description = "Service this table belongs to")]
    pub service: String,

    pub cadence: Cadence,

    #[schemars(description = "0-indexed column holding the metric key")]
    pub metric_key_column: usize,

    #[schemars(description = "0-indexed column holding the human display name")]
    pub display_name_column: usize,

    #[schemars(description = "0-indexed first column of per-period values")]
    pub data_start_column: usize,

    #[schemars(description = "0-indexed row holding the period labels")]
    pub date_header_row: usize,

    #[schemars(description = "0-indexed first metric row")]
    pub data_start_row: usize,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Column holding the in-table target (monthly tables only)")]
    pub target_column: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Column holding the benchmark value (monthly tables only)")]
    pub benchmark_column: Option<usize>,
}

impl LayoutDescriptor {
    pub fn validate(&self) -> Result<()> {
        let invalid = |details: String| KpiDigestError::InvalidLayout {
            table: self.table_name.clone(),
            details,
        };

        if self.data_start_row <= self.date_header_row {
            return Err(invalid(format!(
                "data_start_row {} must come after date_header_row {}",
                self.data_start_row, self.date_header_row
            )));
        }

        let fixed_columns = [
            ("metric_key_column", Some(self.metric_key_column)),
            ("display_name_column", Some(self.display_name_column)),
            ("target_column", self.target_column),
            ("benchmark_column", self.benchmark_column),
        ];
        for (name, column) in fixed_columns {
            if let Some(column) = column {
                if column >= self.data_start_column {
                    return Err(invalid(format!(
                        "{} {} overlaps the data span starting at column {}",
                        name, column, self.data_start_column
                    )));
                }
            }
        }

        if self.metric_key_column == self.display_name_column {
            return Err(invalid(format!(
                "metric_key_column and display_name_column both point at column {}",
                self.metric_key_column
            )));
        }

        if self.cadence != Cadence::Monthly
            && (self.target_column.is_some() || self.benchmark_column.is_some())
        {
            return Err(invalid(format!(
                "target/benchmark columns are only supported on monthly tables, not {}",
                self.cadence
            )));
        }

        Ok(())
    }
}

/// Six value columns one service occupies in the review table.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
pub struct ReviewColumns {
    #[schemars(description = "Week before last (W-2)")]
    pub prev_week: usize,
    #[schemars(description = "Last completed week (W-1)")]
    pub curr_week: usize,
    #[schemars(description = "Source-provided week-over-week change")]
    pub week_change: usize,
    #[schemars(description = "Previous month (M-1)")]
    pub prev_month: usize,
    #[schemars(description = "Current month (M0)")]
    pub curr_month: usize,
    #[schemars(description = "Source-provided month-over-month change")]
    pub month_change: usize,
}

impl ReviewColumns {
    pub fn as_array(&self) -> [usize; 6] {
        [
            self.prev_week,
            self.curr_week,
            self.week_change,
            self.prev_month,
            self.curr_month,
            self.month_change,
        ]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct ReviewTableLayout {
    pub table_name: String,
    pub weekly_key_column: usize,
    pub monthly_key_column: usize,
    pub display_name_column: usize,
    pub data_start_row: usize,
    pub service_columns: BTreeMap<String, ReviewColumns>,
}

impl ReviewTableLayout {
    pub fn columns_for(&self, service: &str) -> Option<&ReviewColumns> {
        self.service_columns.get(service)
    }

    pub fn validate(&self) -> Result<()> {
        let shared = [
            self.weekly_key_column,
            self.monthly_key_column,
            self.display_name_column,
        ];
        if has_duplicates(&shared) {
            return Err(KpiDigestError::InvalidReviewLayout(format!(
                "key and display columns must be distinct, got {:?}",
                shared
            )));
        }

        for (service, columns) in &self.service_columns {
            let values = columns.as_array();
            if has_duplicates(&values) {
                return Err(KpiDigestError::InvalidReviewLayout(format!(
                    "service '{}' maps two values to the same column: {:?}",
                    service, values
                )));
            }
            if let Some(column) = values.iter().find(|c| shared.contains(*c)) {
                return Err(KpiDigestError::InvalidReviewLayout(format!(
                    "service '{}' value column {} collides with a key/display column",
                    service, column
                )));
            }
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct TargetDefinition {
    #[schemars(description = "Metric key as it appears in the monthly table")]
    pub key: String,
    pub display_name: String,
    #[schemars(description = "Fixed target value; the authoritative goal for scoring")]
    pub target: f64,
    pub unit: Unit,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct DetectionThresholds {
    #[serde(default = "default_anomaly_threshold")]
    #[schemars(description = "Minimum absolute step change (fraction) that raises an anomaly")]
    pub anomaly_threshold: f64,

    #[serde(default = "default_lookback")]
    #[schemars(description = "Number of most recent non-empty periods scanned")]
    pub lookback: usize,

    #[serde(default = "default_min_decline_run")]
    #[schemars(description = "Minimum consecutive declines that raise a trend alert")]
    pub min_decline_run: usize,

    #[serde(default = "default_max_anomalies")]
    #[schemars(description = "Maximum anomaly alerts returned per service")]
    pub max_anomalies: usize,
}

fn default_anomaly_threshold() -> f64 {
    0.20
}

fn default_lookback() -> usize {
    14
}

fn default_min_decline_run() -> usize {
    3
}

fn default_max_anomalies() -> usize {
    5
}

impl Default for DetectionThresholds {
    fn default() -> Self {
        Self {
            anomaly_threshold: default_anomaly_threshold(),
            lookback: default_lookback(),
            min_decline_run: default_min_decline_run(),
            max_anomalies: default_max_anomalies(),
        }
    }
}

impl DetectionThresholds {
    pub fn validate(&self) -> Result<()> {
        if !self.anomaly_threshold.is_finite() || self.anomaly_threshold < 0.0 {
            return Err(KpiDigestError::InvalidThresholds(format!(
                "anomaly_threshold {} must be a finite, non-negative fraction",
                self.anomaly_threshold
            )));
        }
        if self.lookback < 2 {
            return Err(KpiDigestError::InvalidThresholds(format!(
                "lookback {} must cover at least two periods",
                self.lookback
            )));
        }
        if self.min_decline_run == 0 {
            return Err(KpiDigestError::InvalidThresholds(
                "min_decline_run must be at least 1".to_string(),
            ));
        }
        if self.max_anomalies == 0 {
            return Err(KpiDigestError::InvalidThresholds(
                "max_anomalies must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Static, read-only configuration shared by every component.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct KpiConfig {
    #[schemars(description = "Services analysed on every run, in report order")]
    pub services: Vec<String>,

    #[schemars(description = "One layout per (service, cadence) pair")]
    pub layouts: Vec<LayoutDescriptor>,

    pub review: ReviewTableLayout,

    #[schemars(description = "Target definitions in report order")]
    pub targets: Vec<TargetDefinition>,

    #[schemars(description = "Metric keys eligible for period comparison and trend detection")]
    pub core_metrics: Vec<String>,

    #[serde(default)]
    #[schemars(description = "Daily metric keys quoted as funnel context in the narrative digest")]
    pub funnel_metrics: Vec<String>,

    #[serde(default)]
    pub thresholds: DetectionThresholds,
}

impl KpiConfig {
    /// The layout this deployment reads: two services, six time-series tabs
    /// and one shared review tab.
    pub fn reference() -> Self {
        let layouts = vec![
            layout("[Daily] ZZEM", "ZZEM", Cadence::Daily, (0, 1, 2), (2, 3), None),
            layout("[Weekly] ZZEM", "ZZEM", Cadence::Weekly, (0, 1, 2), (1, 2), None),
            layout("[Monthly] ZZEM", "ZZEM", Cadence::Monthly, (0, 1, 4), (0, 1), Some((2, 3))),
            layout("[Daily] 사주", "사주", Cadence::Daily, (1, 2, 3), (1, 2), None),
            layout("[Weekly] 사주", "사주", Cadence::Weekly, (1, 2, 3), (1, 2), None),
            layout("[Monthly] 사주", "사주", Cadence::Monthly, (1, 2, 5), (1, 2), Some((3, 4))),
        ];

        let mut service_columns = BTreeMap::new();
        service_columns.insert(
            "ZZEM".to_string(),
            ReviewColumns {
                prev_week: 3,
                curr_week: 4,
                week_change: 5,
                prev_month: 6,
                curr_month: 7,
                month_change: 8,
            },
        );
        service_columns.insert(
            "사주".to_string(),
            ReviewColumns {
                prev_week: 9,
                curr_week: 10,
                week_change: 11,
                prev_month: 12,
                curr_month: 13,
                month_change: 14,
            },
        );

        let target = |key: &str, display_name: &str, target: f64, unit: Unit| TargetDefinition {
            key: key.to_string(),
            display_name: display_name.to_string(),
            target,
            unit,
        };

        Self {
            services: vec!["ZZEM".to_string(), "사주".to_string()],
            layouts,
            review: ReviewTableLayout {
                table_name: "KPI Review".to_string(),
                weekly_key_column: 0,
                monthly_key_column: 1,
                display_name_column: 2,
                data_start_row: 2,
                service_columns,
            },
            targets: vec![
                target("Paid_Cohort_Retention", "Paid Cohort Retention", 0.75, Unit::Percent),
                target("CVR", "CVR", 0.15, Unit::Percent),
                target("ARPPU", "ARPPU", 28000.0, Unit::Currency),
                target("Margin_Rate", "마진율", 0.30, Unit::Percent),
            ],
            core_metrics: ["Paid_Cohort_Retention", "CVR", "ARPPU", "Margin_Rate"]
                .iter()
                .map(|k| k.to_string())
                .collect(),
            funnel_metrics: [
                "Install_User_New",
                "Sign_Up_User_New",
                "Main_View_User_New",
                "Product_View_User_New",
                "Gen_Done_User_New",
                "Paywall_View_User_New",
                "Purchase_Done_User_New",
                "Main_View_User_Normal",
                "Gen_Done_User_Normal",
                "Purchase_Done_User_Normal",
            ]
            .iter()
            .map(|k| k.to_string())
            .collect(),
            thresholds: DetectionThresholds::default(),
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: KpiConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    pub fn layout_for(&self, service: &str, cadence: Cadence) -> Option<&LayoutDescriptor> {
        self.layouts
            .iter()
            .find(|l| l.service == service && l.cadence == cadence)
    }

    pub fn target_for(&self, key: &str) -> Option<&TargetDefinition> {
        self.targets.iter().find(|t| t.key == key)
    }

    /// Every table name the pipeline may ask the source for.
    pub fn table_names(&self) -> Vec<String> {
        std::iter::once(self.review.table_name.clone())
            .chain(self.layouts.iter().map(|l| l.table_name.clone()))
            .collect()
    }

    /// Rejects configurations that would make extraction meaningless.
    /// Meant to run once at startup.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for layout in &self.layouts {
            layout.validate()?;
            if !seen.insert((layout.service.as_str(), layout.cadence)) {
                return Err(KpiDigestError::DuplicateLayout {
                    service: layout.service.clone(),
                    cadence: layout.cadence.to_string(),
                });
            }
        }

        self.review.validate()?;
        for service in self.review.service_columns.keys() {
            if !self.services.contains(service) {
                return Err(KpiDigestError::UnknownService(service.clone()));
            }
        }
        for layout in &self.layouts {
            if !self.services.contains(&layout.service) {
                return Err(KpiDigestError::UnknownService(layout.service.clone()));
            }
        }

        for target in &self.targets {
            if !target.target.is_finite() || target.target == 0.0 {
                return Err(KpiDigestError::InvalidTarget {
                    key: target.key.clone(),
                    details: format!("target {} must be finite and non-zero", target.target),
                });
            }
        }

        self.thresholds.validate()
    }

    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(KpiConfig)
    }

    pub fn schema_as_json() -> std::result::Result<String, serde_json::Error> {
        let schema = Self::generate_json_schema();
        serde_json::to_string_pretty(&schema)
    }
}

fn layout(
    table_name: &str,
    service: &str,
    cadence: Cadence,
    (metric_key_column, display_name_column, data_start_column): (usize, usize, usize),
    (date_header_row, data_start_row): (usize, usize),
    target_and_benchmark: Option<(usize, usize)>,
) -> LayoutDescriptor {
    LayoutDescriptor {
        table_name: table_name.to_string(),
        service: service.to_string(),
        cadence,
        metric_key_column,
        display_name_column,
        data_start_column,
        date_header_row,
        data_start_row,
        target_column: target_and_benchmark.map(|(t, _)| t),
        benchmark_column: target_and_benchmark.map(|(_, b)| b),
    }
}

fn has_duplicates(columns: &[usize]) -> bool {
    let mut seen = HashSet::new();
    columns.iter().any(|c| !seen.insert(*c))
}
