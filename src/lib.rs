//! # KPI Digest
//!
//! A library for turning loosely formatted KPI spreadsheet tables into
//! normalized time series and the analytics a daily KPI report is built from.
//!
//! ## Core Concepts
//!
//! - **Raw Tables**: 2-D grids of text/number/empty cells as exported from a spreadsheet
//! - **Layouts**: Static row/column maps telling the extractors where keys, labels and data live
//! - **Absent Values**: Blank, sentinel (`#N/A`, `-`, ...) and unparseable cells all become `None`
//! - **Target Scoring**: Latest monthly value against a fixed configured target
//! - **Period Comparison**: Day-over-day computed locally, week/month-over-month taken from the review table
//! - **Alerts**: Large single-step changes and sustained declines over a recent window
//!
//! ## Example
//!
//! ```rust,ignore
//! use kpi_digest::*;
//! use chrono::NaiveDate;
//! use std::collections::BTreeMap;
//!
//! let config = KpiConfig::reference();
//! config.validate()?;
//!
//! let mut tables: BTreeMap<String, RawTable> = BTreeMap::new();
//! tables.insert(
//!     "[Daily] ZZEM".to_string(),
//!     RawTable::from(vec![
//!         vec!["", "", ""],
//!         vec!["", "", ""],
//!         vec!["key", "name", "2025-11-01", "2025-11-02"],
//!         vec!["CVR", "CVR", "14.2%", "15.1%"],
//!     ]),
//! );
//!
//! let analyzer = KpiAnalyzer::new(&config);
//! let analysis = analyzer.analyze_service("ZZEM", &tables, NaiveDate::from_ymd_opt(2025, 11, 2).unwrap())?;
//! println!("{}", serde_json::to_string_pretty(&analysis)?);
//! ```

pub mod anomaly;
pub mod cell;
pub mod comparator;
pub mod error;
pub mod extract;
pub mod format;
pub mod ingestion;
pub mod report;
pub mod review;
pub mod schema;
pub mod targets;

pub use anomaly::{AnomalyAlert, AnomalyDetector, AnomalyKind, TrendAlert};
pub use cell::{normalize_cell, normalize_header, normalize_text, RawCell, RawTable};
pub use comparator::{PeriodComparator, PeriodComparison};
pub use error::{KpiDigestError, Result};
pub use extract::{
    extract_monthly, extract_series, MetricSeries, MonthlyMetricSeries, MonthlyTable,
    Observation, SeriesTable,
};
pub use ingestion::*;
pub use report::render_context;
pub use review::{extract_review, ReviewMetric, ReviewTable};
pub use schema::*;
pub use targets::{Status, TargetComparison, TargetScorer};

use chrono::NaiveDate;
use log::{debug, info, warn};
use serde::Serialize;

/// Everything derived for one service on one run.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceAnalysis {
    pub service: String,
    pub date: NaiveDate,
    pub target_comparisons: Vec<TargetComparison>,
    pub mom_comparisons: Vec<PeriodComparison>,
    pub wow_comparisons: Vec<PeriodComparison>,
    pub dod_comparisons: Vec<PeriodComparison>,
    pub anomalies: Vec<AnomalyAlert>,
    pub trends: Vec<TrendAlert>,
    /// Free-text commentary supplied by a [`NarrativeGenerator`].
    pub narrative: Option<String>,
    pub daily_data: Option<SeriesTable>,
    pub weekly_data: Option<SeriesTable>,
    pub monthly_data: Option<MonthlyTable>,
    pub review_data: Option<ReviewTable>,
}

impl ServiceAnalysis {
    pub fn attach_narrative(&mut self, narrative: impl Into<String>) {
        self.narrative = Some(narrative.into());
    }
}

/// Produces commentary for a finished analysis, typically by calling a
/// language model. Returning `None` leaves the analysis without narrative.
pub trait NarrativeGenerator {
    fn generate(&self, analysis: &ServiceAnalysis) -> Option<String>;
}

pub struct KpiAnalyzer<'a> {
    config: &'a KpiConfig,
}

impl<'a> KpiAnalyzer<'a> {
    /// `config` is expected to have passed [`KpiConfig::validate`].
    pub fn new(config: &'a KpiConfig) -> Self {
        Self { config }
    }

    pub fn analyze_service<S: TableSource + ?Sized>(
        &self,
        service: &str,
        source: &S,
        date: NaiveDate,
    ) -> Result<ServiceAnalysis> {
        if !self.config.services.iter().any(|s| s == service) {
            return Err(KpiDigestError::UnknownService(service.to_string()));
        }

        info!("Analyzing service '{}' for {}", service, date);

        let daily_data = self
            .layout_table(service, Cadence::Daily, source)
            .map(|(table, layout)| extract_series(table, layout));
        let weekly_data = self
            .layout_table(service, Cadence::Weekly, source)
            .map(|(table, layout)| extract_series(table, layout));
        let monthly_data = self
            .layout_table(service, Cadence::Monthly, source)
            .map(|(table, layout)| extract_monthly(table, layout));
        let review_data = self.review_table(service, source);

        let comparator = PeriodComparator::new(&self.config.core_metrics);
        let detector = AnomalyDetector::new(&self.config.thresholds, &self.config.core_metrics);

        let analysis = ServiceAnalysis {
            service: service.to_string(),
            date,
            target_comparisons: TargetScorer::new(&self.config.targets)
                .score(monthly_data.as_ref()),
            mom_comparisons: comparator.month_over_month(review_data.as_ref()),
            wow_comparisons: comparator.week_over_week(review_data.as_ref()),
            dod_comparisons: comparator.day_over_day(daily_data.as_ref()),
            anomalies: detector.detect_anomalies(daily_data.as_ref()),
            trends: detector.detect_trends(daily_data.as_ref()),
            narrative: None,
            daily_data,
            weekly_data,
            monthly_data,
            review_data,
        };

        info!(
            "Service '{}': {} anomalies, {} trend alerts",
            service,
            analysis.anomalies.len(),
            analysis.trends.len()
        );

        Ok(analysis)
    }

    /// Runs every configured service in order. A failing service is logged
    /// and left out.
    pub fn analyze_all<S: TableSource + ?Sized>(
        &self,
        source: &S,
        date: NaiveDate,
    ) -> Vec<ServiceAnalysis> {
        self.config
            .services
            .iter()
            .filter_map(|service| match self.analyze_service(service, source, date) {
                Ok(analysis) => Some(analysis),
                Err(e) => {
                    warn!("Skipping service '{}': {}", service, e);
                    None
                }
            })
            .collect()
    }

    pub fn analyze_all_with_narrative<S: TableSource + ?Sized>(
        &self,
        source: &S,
        date: NaiveDate,
        generator: &dyn NarrativeGenerator,
    ) -> Vec<ServiceAnalysis> {
        let mut analyses = self.analyze_all(source, date);
        for analysis in &mut analyses {
            if let Some(text) = generator.generate(analysis) {
                analysis.attach_narrative(text);
            } else {
                debug!("No narrative produced for '{}'", analysis.service);
            }
        }
        analyses
    }

    fn layout_table<'s, S: TableSource + ?Sized>(
        &self,
        service: &str,
        cadence: Cadence,
        source: &'s S,
    ) -> Option<(&'s RawTable, &'a LayoutDescriptor)> {
        let Some(layout) = self.config.layout_for(service, cadence) else {
            warn!("No {} layout configured for service '{}'", cadence, service);
            return None;
        };
        non_empty_table(source, &layout.table_name).map(|table| (table, layout))
    }

    fn review_table<S: TableSource + ?Sized>(&self, service: &str, source: &S) -> Option<ReviewTable> {
        let review = &self.config.review;
        let Some(columns) = review.columns_for(service) else {
            warn!("No review columns configured for service '{}'", service);
            return None;
        };
        non_empty_table(source, &review.table_name)
            .map(|table| extract_review(table, review, service, columns))
    }
}

fn non_empty_table<'s, S: TableSource + ?Sized>(source: &'s S, name: &str) -> Option<&'s RawTable> {
    match source.table(name) {
        Some(table) if !table.is_empty() => Some(table),
        Some(_) => {
            warn!("Table '{}' is empty", name);
            None
        }
        None => {
            warn!("Table '{}' not provided by source", name);
            None
        }
    }
}
