// Copyright 2025 Zenbench Contributors
// SPDX-License-Identifier: Apache-2.0

//! Benchmark session state.
//!
//! A [`BenchmarkSession`] is created when the test session starts and owns a
//! [`TestReport`] per finished test. Each report doubles as the property sink
//! for the recorder of its test, so metrics are attributed to exactly one
//! test.

use crate::recorder::{NeonBenchmarker, PropertyRecorder, PROPERTY_PREFIX};
use crate::result::MetricRecord;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Instant;
use tracing::{debug, warn};

/// Final state of a test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Test passed.
    Passed,
    /// Test failed.
    Failed,
    /// Test was skipped.
    Skipped,
}

/// Everything the report needs to know about one test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestReport {
    /// Fully qualified test id, e.g. `performance/test_perf_pgbench.py::test_pgbench[neon]`.
    pub nodeid: String,
    /// Short name printed in the summary.
    pub head_line: String,
    /// Test outcome.
    pub outcome: Outcome,
    /// Total duration of the test in seconds.
    pub duration: f64,
    /// Properties recorded during the test, in order.
    #[serde(default)]
    pub user_properties: Vec<(String, Value)>,
}

impl TestReport {
    /// Create an empty, passing report for `nodeid`.
    ///
    /// The head line is the node id without its file part, with the
    /// remaining `::` separators replaced by `.`, e.g. `TestX.test_y`.
    pub fn new(nodeid: impl Into<String>) -> Self {
        let nodeid = nodeid.into();
        let head_line = head_line(&nodeid);
        Self {
            nodeid,
            head_line,
            outcome: Outcome::Passed,
            duration: 0.0,
            user_properties: Vec::new(),
        }
    }

    /// Metric records stored by the benchmarker, in recording order.
    ///
    /// Properties written by anything else are skipped.
    pub fn metrics(&self) -> Vec<MetricRecord> {
        self.user_properties
            .iter()
            .filter_map(|(key, value)| {
                if !key.starts_with(PROPERTY_PREFIX) {
                    debug!(nodeid = %self.nodeid, %key, "skipping foreign property");
                    return None;
                }
                match serde_json::from_value(value.clone()) {
                    Ok(record) => Some(record),
                    Err(e) => {
                        warn!(nodeid = %self.nodeid, %key, error = %e, "dropping malformed metric");
                        None
                    }
                }
            })
            .collect()
    }
}

fn head_line(nodeid: &str) -> String {
    match nodeid.split_once("::") {
        Some((_, rest)) => rest.split("::").collect::<Vec<_>>().join("."),
        None => nodeid.to_string(),
    }
}

impl PropertyRecorder for TestReport {
    fn record_property(&mut self, key: String, value: Value) {
        self.user_properties.push((key, value));
    }
}

/// One passed test in the persisted report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuiteResult {
    /// Test node id.
    pub suit: String,
    /// Total duration of the test in seconds.
    pub total_duration: f64,
    /// Metrics recorded by the test.
    pub data: Vec<MetricRecord>,
}

impl SuiteResult {
    /// Build the persisted entry for a test.
    pub fn from_test(test: &TestReport) -> Self {
        Self {
            suit: test.nodeid.clone(),
            total_duration: test.duration,
            data: test.metrics(),
        }
    }
}

/// The JSON artifact written at the end of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionReport {
    /// Revision under test.
    pub revision: String,
    /// Platform the session ran on.
    pub platform: String,
    /// Passed tests and their metrics.
    pub result: Vec<SuiteResult>,
}

impl SessionReport {
    /// Whether any passed test recorded at least one metric.
    pub fn has_metrics(&self) -> bool {
        self.result.iter().any(|suite| !suite.data.is_empty())
    }
}

/// All tests of one session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkSession {
    tests: Vec<TestReport>,
}

impl BenchmarkSession {
    /// Start an empty session.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a finished test.
    pub fn push(&mut self, test: TestReport) {
        self.tests.push(test);
    }

    /// All finished tests, in completion order.
    pub fn tests(&self) -> &[TestReport] {
        &self.tests
    }

    /// Finished tests that passed.
    pub fn passed(&self) -> impl Iterator<Item = &TestReport> {
        self.tests.iter().filter(|t| t.outcome == Outcome::Passed)
    }

    /// Run a test body with a fresh benchmarker and store its report.
    ///
    /// The test counts as passed when `body` returns `Ok`, its properties are
    /// kept either way.
    pub fn run_test<E>(
        &mut self,
        nodeid: impl Into<String>,
        body: impl FnOnce(&mut NeonBenchmarker<'_>) -> Result<(), E>,
    ) -> Result<(), E> {
        let mut test = TestReport::new(nodeid);
        let start = Instant::now();
        let out = {
            let mut zenbenchmark = NeonBenchmarker::new(&mut test);
            body(&mut zenbenchmark)
        };
        test.duration = start.elapsed().as_secs_f64();
        test.outcome = if out.is_ok() {
            Outcome::Passed
        } else {
            Outcome::Failed
        };

        debug!(nodeid = %test.nodeid, outcome = ?test.outcome, "test finished");
        self.tests.push(test);
        out
    }

    /// Build the persisted report from the passed tests.
    pub fn to_report(&self, revision: &str, platform: &str) -> SessionReport {
        SessionReport {
            revision: revision.to_string(),
            platform: platform.to_string(),
            result: self.passed().map(SuiteResult::from_test).collect(),
        }
    }
}
