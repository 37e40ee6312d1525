// Copyright 2025 Zenbench Contributors
// SPDX-License-Identifier: Apache-2.0

//! Metric record types.
//!
//! This module provides the record that the benchmarker hands to the
//! property sink, and that the report emitter later reads back.

use serde::{Deserialize, Serialize};
use std::fmt;

/// How a metric should be interpreted when comparing runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricReport {
    /// A constant test parameter, like the number of clients.
    TestParam,
    /// Higher values are an improvement.
    HigherIsBetter,
    /// Lower values are an improvement.
    LowerIsBetter,
}

impl MetricReport {
    /// Wire name of the classification.
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricReport::TestParam => "test_param",
            MetricReport::HigherIsBetter => "higher_is_better",
            MetricReport::LowerIsBetter => "lower_is_better",
        }
    }
}

impl fmt::Display for MetricReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A recorded number.
///
/// Integral and floating point values are kept apart because the summary
/// formats them differently. Serialized as a plain JSON number.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricValue {
    /// Integral value (counts, timestamps, rounded sizes).
    Int(i64),
    /// Floating point value (latencies, durations, rates).
    Float(f64),
}

impl MetricValue {
    /// Value as `f64`, regardless of representation.
    pub fn as_f64(&self) -> f64 {
        match *self {
            MetricValue::Int(v) => v as f64,
            MetricValue::Float(v) => v,
        }
    }

    /// Whether the value is floating point.
    pub fn is_float(&self) -> bool {
        matches!(self, MetricValue::Float(_))
    }
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricValue::Int(v) => write!(f, "{}", v),
            MetricValue::Float(v) => write!(f, "{:?}", v),
        }
    }
}

impl From<i64> for MetricValue {
    fn from(v: i64) -> Self {
        MetricValue::Int(v)
    }
}

impl From<i32> for MetricValue {
    fn from(v: i32) -> Self {
        MetricValue::Int(v.into())
    }
}

impl From<u32> for MetricValue {
    fn from(v: u32) -> Self {
        MetricValue::Int(v.into())
    }
}

impl From<u64> for MetricValue {
    fn from(v: u64) -> Self {
        MetricValue::Int(i64::try_from(v).unwrap_or(i64::MAX))
    }
}

impl From<f64> for MetricValue {
    fn from(v: f64) -> Self {
        MetricValue::Float(v)
    }
}

/// A single named, unit-tagged observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRecord {
    /// Metric name, dotted when recorded under a prefix.
    pub name: String,
    /// Observed value.
    pub value: MetricValue,
    /// Unit, possibly empty.
    pub unit: String,
    /// Comparison hint.
    pub report: MetricReport,
}

impl MetricRecord {
    /// Create a new MetricRecord.
    pub fn new(
        name: impl Into<String>,
        value: impl Into<MetricValue>,
        unit: impl Into<String>,
        report: MetricReport,
    ) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            unit: unit.into(),
            report,
        }
    }
}
