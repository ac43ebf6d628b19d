//! Snapshot filtering and summary statistics
//!
//! Mirrors what the monthly-trends dashboard asks of the sheet: rows for one
//! store / period / metric, and per-metric averages across the snapshot.

use std::collections::{BTreeMap, BTreeSet};

use prism_common::MetricRow;
use serde::{Deserialize, Serialize};

/// Optional equality filters (query string of the snapshot endpoints)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store_id: Option<String>,
    /// Matches `observed_period`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub period: Option<String>,
    /// Matches `metric_name`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metric: Option<String>,
}

impl SnapshotFilter {
    pub fn is_empty(&self) -> bool {
        self.store_id.is_none() && self.period.is_none() && self.metric.is_none()
    }

    pub fn matches(&self, row: &MetricRow) -> bool {
        fn eq(filter: &Option<String>, value: &str) -> bool {
            filter.as_deref().map_or(true, |f| f == value)
        }

        eq(&self.store_id, &row.store_id)
            && eq(&self.period, &row.observed_period)
            && eq(&self.metric, &row.metric_name)
    }
}

/// Count and mean of one metric
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricStats {
    pub count: usize,
    /// Rounded to two decimals
    pub average: f64,
}

/// Summary statistics over a set of rows
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SnapshotSummary {
    pub total_rows: usize,
    pub unique_stores: usize,
    pub unique_periods: Vec<String>,
    pub metrics: BTreeMap<String, MetricStats>,
}

pub fn summarize<'a>(rows: impl IntoIterator<Item = &'a MetricRow>) -> SnapshotSummary {
    let mut total_rows = 0;
    let mut stores = BTreeSet::new();
    let mut periods = BTreeSet::new();
    let mut sums: BTreeMap<&str, (usize, f64)> = BTreeMap::new();

    for row in rows {
        total_rows += 1;
        stores.insert(row.store_id.as_str());
        periods.insert(row.observed_period.as_str());
        if let Some(value) = row.metric_value.as_f64() {
            let entry = sums.entry(row.metric_name.as_str()).or_insert((0, 0.0));
            entry.0 += 1;
            entry.1 += value;
        }
    }

    let metrics = sums
        .into_iter()
        .map(|(name, (count, sum))| {
            let average = (sum / count as f64 * 100.0).round() / 100.0;
            (name.to_string(), MetricStats { count, average })
        })
        .collect();

    SnapshotSummary {
        total_rows,
        unique_stores: stores.len(),
        unique_periods: periods.into_iter().map(str::to_string).collect(),
        metrics,
    }
}
