//! Metric row model
//!
//! A [`MetricRow`] is one observed value for one store, metric and month.
//! Rows are identified by [`MetricKey`]; the authoritative store holds at most
//! one row per key.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

/// Separator used when a key is rendered for humans (reports, logs)
pub const KEY_DISPLAY_SEPARATOR: &str = "|||";

/// One observed metric value as held by the authoritative store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRow {
    pub store_id: String,
    pub metric_name: String,
    /// Integer or decimal, kept exactly as received
    pub metric_value: Number,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub period_type: Option<String>,
    /// Canonical `YYYY-MM`
    pub observed_period: String,
    /// Provenance timestamp from the submitting client
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submission_time_utc: Option<DateTime<Utc>>,
}

impl MetricRow {
    /// Identity key of this row
    pub fn key(&self) -> MetricKey {
        MetricKey::new(&self.store_id, &self.metric_name, &self.observed_period)
    }
}

/// Identity key: (store_id, metric_name, observed_period)
///
/// Compared field by field, so field content can never make two distinct
/// keys equal. The `|||` form from [`fmt::Display`] is for display only.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MetricKey {
    pub store_id: String,
    pub metric_name: String,
    pub observed_period: String,
}

impl MetricKey {
    pub fn new(store_id: &str, metric_name: &str, observed_period: &str) -> Self {
        Self {
            store_id: store_id.to_string(),
            metric_name: metric_name.to_string(),
            observed_period: observed_period.to_string(),
        }
    }
}

impl fmt::Display for MetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{sep}{}{sep}{}",
            self.store_id,
            self.metric_name,
            self.observed_period,
            sep = KEY_DISPLAY_SEPARATOR
        )
    }
}

/// Interpret a JSON value as a metric value.
///
/// Numbers pass through; numeric strings (as the sheet export sometimes
/// stores them) become numbers, integers staying integers. Anything else is
/// not a metric value.
pub fn coerce_metric_value(value: &Value) -> Option<Number> {
    match value {
        Value::Number(n) => Some(n.clone()),
        Value::String(s) => {
            let s = s.trim();
            if let Ok(i) = s.parse::<i64>() {
                return Some(Number::from(i));
            }
            s.parse::<f64>().ok().and_then(Number::from_f64)
        }
        _ => None,
    }
}
