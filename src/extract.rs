use crate::cell::{normalize_cell, normalize_header, RawCell, RawTable};
use crate::schema::{Cadence, LayoutDescriptor};
use log::debug;
use serde::Serialize;
use std::sync::Arc;

/// One metric row turned into a positional time series.
///
/// `values[i]` belongs to `period_labels[i]`. Rows longer than the header
/// keep their extra values, which then have no label.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricSeries {
    pub metric_key: String,
    pub display_name: String,
    pub period_labels: Arc<[String]>,
    pub values: Vec<Option<f64>>,
}

/// A present value together with the label of the period it came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Observation {
    pub label: String,
    pub value: f64,
}

impl MetricSeries {
    fn label_at(&self, index: usize) -> String {
        self.period_labels
            .get(index)
            .cloned()
            .unwrap_or_else(|| format!("idx:{}", index))
    }

    /// The last `n` present values, oldest first.
    pub fn last_n_values(&self, n: usize) -> Vec<Observation> {
        let mut recent: Vec<Observation> = self
            .values
            .iter()
            .enumerate()
            .rev()
            .filter_map(|(i, v)| {
                v.map(|value| Observation {
                    label: self.label_at(i),
                    value,
                })
            })
            .take(n)
            .collect();
        recent.reverse();
        recent
    }

    /// Most recent present value, scanning backward from the last period.
    pub fn latest_value(&self) -> Option<Observation> {
        self.last_n_values(1).pop()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyMetricSeries {
    #[serde(flatten)]
    pub series: MetricSeries,
    /// In-table target. Informational only, scoring uses configured targets.
    pub target: Option<f64>,
    pub benchmark: Option<f64>,
}

/// All metric rows of one daily or weekly table, in row order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesTable {
    pub table_name: String,
    pub service: String,
    pub cadence: Cadence,
    pub metrics: Vec<MetricSeries>,
}

impl SeriesTable {
    /// First series whose key matches; later duplicates are never returned.
    pub fn find(&self, metric_key: &str) -> Option<&MetricSeries> {
        self.metrics.iter().find(|m| m.metric_key == metric_key)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyTable {
    pub table_name: String,
    pub service: String,
    pub metrics: Vec<MonthlyMetricSeries>,
}

impl MonthlyTable {
    pub fn find(&self, metric_key: &str) -> Option<&MonthlyMetricSeries> {
        self.metrics
            .iter()
            .find(|m| m.series.metric_key == metric_key)
    }
}

/// Reads a daily or weekly table through its layout.
pub fn extract_series(table: &RawTable, layout: &LayoutDescriptor) -> SeriesTable {
    let metrics: Vec<MetricSeries> = read_metric_rows(table, layout)
        .map(|(_, series)| series)
        .collect();

    debug!(
        "Extracted {} metrics from '{}' ({} rows)",
        metrics.len(),
        layout.table_name,
        table.len()
    );

    SeriesTable {
        table_name: layout.table_name.clone(),
        service: layout.service.clone(),
        cadence: layout.cadence,
        metrics,
    }
}

/// Reads a monthly table, attaching the in-table target and benchmark cells
/// when the layout declares those columns.
pub fn extract_monthly(table: &RawTable, layout: &LayoutDescriptor) -> MonthlyTable {
    let parse_optional = |row: &[RawCell], column: Option<usize>| {
        column.and_then(|c| normalize_cell(row.get(c)))
    };

    let metrics: Vec<MonthlyMetricSeries> = read_metric_rows(table, layout)
        .map(|(row, series)| MonthlyMetricSeries {
            target: parse_optional(row, layout.target_column),
            benchmark: parse_optional(row, layout.benchmark_column),
            series,
        })
        .collect();

    debug!(
        "Extracted {} monthly metrics from '{}' ({} rows)",
        metrics.len(),
        layout.table_name,
        table.len()
    );

    MonthlyTable {
        table_name: layout.table_name.clone(),
        service: layout.service.clone(),
        metrics,
    }
}

fn read_period_labels(table: &RawTable, layout: &LayoutDescriptor) -> Arc<[String]> {
    let header = table.row(layout.date_header_row).unwrap_or(&[]);
    header
        .iter()
        .skip(layout.data_start_column)
        .map(|cell| normalize_header(Some(cell)))
        .collect()
}

/// Yields every non-spacer row after `data_start_row` with its series.
fn read_metric_rows<'a>(
    table: &'a RawTable,
    layout: &'a LayoutDescriptor,
) -> impl Iterator<Item = (&'a [RawCell], MetricSeries)> + 'a {
    let labels = read_period_labels(table, layout);
    let span_end = layout.data_start_column + labels.len();

    table
        .rows()
        .iter()
        .skip(layout.data_start_row)
        .filter_map(move |row| {
            let metric_key = normalize_header(row.get(layout.metric_key_column));
            let display_name = normalize_header(row.get(layout.display_name_column));

            if metric_key.is_empty() && display_name.is_empty() {
                return None;
            }

            let values = (layout.data_start_column..row.len().max(span_end))
                .map(|col| normalize_cell(row.get(col)))
                .collect();

            Some((
                row.as_slice(),
                MetricSeries {
                    metric_key,
                    display_name,
                    period_labels: Arc::clone(&labels),
                    values,
                },
            ))
        })
}
