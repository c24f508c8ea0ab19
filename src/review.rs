use crate::cell::{normalize_cell, normalize_header, RawTable};
use crate::schema::{ReviewColumns, ReviewTableLayout};
use log::debug;
use serde::Serialize;

/// One row of the review table, seen through one service's columns.
///
/// The weekly and monthly keys of the same metric can differ, so a row is
/// addressable by either of them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReviewMetric {
    pub weekly_key: String,
    pub monthly_key: String,
    pub display_name: String,
    pub prev_week: Option<f64>,
    pub curr_week: Option<f64>,
    pub week_change: Option<f64>,
    pub prev_month: Option<f64>,
    pub curr_month: Option<f64>,
    pub month_change: Option<f64>,
}

impl ReviewMetric {
    pub fn matches(&self, metric_key: &str) -> bool {
        self.weekly_key == metric_key || self.monthly_key == metric_key
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReviewTable {
    pub service: String,
    pub metrics: Vec<ReviewMetric>,
}

impl ReviewTable {
    pub fn find(&self, metric_key: &str) -> Option<&ReviewMetric> {
        self.metrics.iter().find(|m| m.matches(metric_key))
    }
}

/// Reads the review table for one service. Change columns are taken as
/// provided and never recomputed.
pub fn extract_review(
    table: &RawTable,
    layout: &ReviewTableLayout,
    service: &str,
    columns: &ReviewColumns,
) -> ReviewTable {
    let metrics: Vec<ReviewMetric> = table
        .rows()
        .iter()
        .skip(layout.data_start_row)
        .filter_map(|row| {
            let weekly_key = normalize_header(row.get(layout.weekly_key_column));
            let monthly_key = normalize_header(row.get(layout.monthly_key_column));
            let display_name = normalize_header(row.get(layout.display_name_column));

            if weekly_key.is_empty() && monthly_key.is_empty() && display_name.is_empty() {
                return None;
            }

            let value = |column: usize| normalize_cell(row.get(column));

            Some(ReviewMetric {
                prev_week: value(columns.prev_week),
                curr_week: value(columns.curr_week),
                week_change: value(columns.week_change),
                prev_month: value(columns.prev_month),
                curr_month: value(columns.curr_month),
                month_change: value(columns.month_change),
                weekly_key,
                monthly_key,
                display_name,
            })
        })
        .collect();

    debug!(
        "Extracted {} review metrics for service '{}'",
        metrics.len(),
        service
    );

    ReviewTable {
        service: service.to_string(),
        metrics,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::KpiConfig;

    fn review_table() -> RawTable {
        RawTable::from(vec![
            vec!["KPI Review"],
            vec!["weekly", "monthly", "name", "W-2", "W-1", "WoW", "M-1", "M0", "MoM",
                 "W-2", "W-1", "WoW", "M-1", "M0", "MoM"],
            vec!["CVR_w", "CVR", "CVR", "12%", "13%", "8.33%", "11%", "12%", "9.09%",
                 "20%", "18%", "-10%", "19%", "21%", "10.53%"],
            vec!["", "", "", "1", "1", "1", "1", "1", "1"],
            vec!["ARPPU", "ARPPU_M", "ARPPU", "₩27,000", "₩28,000", "3.7%", "", "-", "#DIV/0!"],
        ])
    }

    fn extract_for(service: &str) -> ReviewTable {
        let config = KpiConfig::reference();
        let columns = config.review.columns_for(service).copied().unwrap();
        extract_review(&review_table(), &config.review, service, &columns)
    }

    #[test]
    fn test_reads_service_columns() {
        let zzem = extract_for("ZZEM");
        assert_eq!(zzem.metrics.len(), 2);

        let cvr = zzem.find("CVR").unwrap();
        assert_eq!(cvr.weekly_key, "CVR_w");
        assert!((cvr.prev_week.unwrap() - 0.12).abs() < 1e-9);
        assert!((cvr.week_change.unwrap() - 0.0833).abs() < 1e-9);

        let saju = extract_for("사주");
        let cvr = saju.find("CVR").unwrap();
        assert!((cvr.curr_week.unwrap() - 0.18).abs() < 1e-9);
        assert!((cvr.month_change.unwrap() - 0.1053).abs() < 1e-9);
    }

    #[test]
    fn test_lookup_by_either_key() {
        let zzem = extract_for("ZZEM");
        assert_eq!(zzem.find("CVR_w").unwrap().display_name, "CVR");
        assert_eq!(zzem.find("ARPPU_M").unwrap().display_name, "ARPPU");
        assert!(zzem.find("Margin_Rate").is_none());
    }

    #[test]
    fn test_short_rows_and_sentinels_are_absent() {
        let zzem = extract_for("ZZEM");
        let arppu = zzem.find("ARPPU").unwrap();
        assert_eq!(arppu.prev_week, Some(27000.0));
        assert_eq!(arppu.prev_month, None);
        assert_eq!(arppu.curr_month, None);
        assert_eq!(arppu.month_change, None);

        let saju = extract_for("사주");
        let arppu = saju.find("ARPPU").unwrap();
        assert_eq!(arppu.prev_week, None);
        assert_eq!(arppu.month_change, None);
    }

    #[test]
    fn test_source_change_is_trusted() {
        let table = RawTable::from(vec![
            vec![""],
            vec![""],
            vec!["CVR", "CVR", "CVR", "10%", "20%", "5%", "", "", ""],
        ]);
        let config = KpiConfig::reference();
        let columns = config.review.columns_for("ZZEM").copied().unwrap();
        let result = extract_review(&table, &config.review, "ZZEM", &columns);
        assert!((result.metrics[0].week_change.unwrap() - 0.05).abs() < 1e-9);
    }
}
