// Copyright 2025 Zenbench Contributors
// SPDX-License-Identifier: Apache-2.0

//! Benchmark metric recorder.
//!
//! A [`NeonBenchmarker`] is created for each test function. It forwards every
//! measurement straight to the property sink supplied by the test framework;
//! the report emitter reads the properties back once the session is over.
//!
//! # Example
//!
//! ```
//! use zenbench::recorder::NeonBenchmarker;
//! use zenbench::result::MetricReport;
//!
//! let mut properties = Vec::new();
//! let mut sink = |key: String, value: serde_json::Value| properties.push((key, value));
//! let mut zenbenchmark = NeonBenchmarker::new(&mut sink);
//!
//! let rows = zenbenchmark.record_duration("test_query", || 42);
//! zenbenchmark.record("speed_of_light", 300_000, "km/s", MetricReport::TestParam);
//!
//! assert_eq!(rows, 42);
//! assert_eq!(properties.len(), 2);
//! ```

use crate::metrics::{self, MetricsError, MetricsSource, BYTES_PER_MB};
use crate::pgbench::{PgBenchInitResult, PgBenchRunResult};
use crate::result::{MetricRecord, MetricReport, MetricValue};
use serde_json::Value;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, warn};

/// Key prefix that marks a user property as a benchmark metric.
pub const PROPERTY_PREFIX: &str = "neon_benchmarker_";

/// Sink for per-test user properties, provided by the test framework.
pub trait PropertyRecorder {
    /// Store one property for the currently running test.
    fn record_property(&mut self, key: String, value: Value);
}

impl<F> PropertyRecorder for F
where
    F: FnMut(String, Value),
{
    fn record_property(&mut self, key: String, value: Value) {
        self(key, value)
    }
}

/// Records benchmark results for one test.
pub struct NeonBenchmarker<'a> {
    property_recorder: &'a mut dyn PropertyRecorder,
}

impl<'a> NeonBenchmarker<'a> {
    /// Create a recorder that writes into `property_recorder`.
    pub fn new(property_recorder: &'a mut dyn PropertyRecorder) -> Self {
        Self { property_recorder }
    }

    /// Record a benchmark result.
    ///
    /// Recording the same name twice stores two entries.
    pub fn record(
        &mut self,
        metric_name: impl Into<String>,
        metric_value: impl Into<MetricValue>,
        unit: &str,
        report: MetricReport,
    ) {
        let record = MetricRecord::new(metric_name, metric_value, unit, report);
        debug!(name = %record.name, value = %record.value, unit, "recording metric");

        if !record.value.as_f64().is_finite() {
            warn!(name = %record.name, value = %record.value, "non-finite metric value, not recording");
            return;
        }

        let key = format!("{}{}", PROPERTY_PREFIX, record.name);
        match serde_json::to_value(&record) {
            Ok(payload) => self.property_recorder.record_property(key, payload),
            Err(e) => warn!(name = %record.name, error = %e, "failed to serialize metric"),
        }
    }

    /// Run `op` and record its wall-clock duration in seconds.
    ///
    /// Nothing is recorded if `op` panics. For operations that report
    /// failure through `Result`, use [`try_record_duration`](Self::try_record_duration).
    pub fn record_duration<T>(&mut self, metric_name: &str, op: impl FnOnce() -> T) -> T {
        let start = Instant::now();
        let out = op();
        let elapsed = start.elapsed().as_secs_f64();

        self.record(metric_name, elapsed, "s", MetricReport::LowerIsBetter);
        out
    }

    /// Like [`record_duration`](Self::record_duration) for fallible operations.
    ///
    /// The duration is only recorded when `op` returns `Ok`.
    pub fn try_record_duration<T, E>(
        &mut self,
        metric_name: &str,
        op: impl FnOnce() -> Result<T, E>,
    ) -> Result<T, E> {
        let start = Instant::now();
        let out = op()?;
        let elapsed = start.elapsed().as_secs_f64();

        self.record(metric_name, elapsed, "s", MetricReport::LowerIsBetter);
        Ok(out)
    }

    /// Record every field of a pgbench run under `prefix`.
    pub fn record_pg_bench_result(&mut self, prefix: &str, result: &PgBenchRunResult) {
        use MetricReport::*;

        self.record(format!("{prefix}.number_of_clients"), result.number_of_clients, "", TestParam);
        self.record(format!("{prefix}.number_of_threads"), result.number_of_threads, "", TestParam);
        // predefined by the test matrix, doesn't change across runs
        self.record(
            format!("{prefix}.number_of_transactions_actually_processed"),
            result.number_of_transactions_actually_processed,
            "",
            TestParam,
        );
        self.record(format!("{prefix}.latency_average"), result.latency_average, "ms", LowerIsBetter);
        if let Some(latency_stddev) = result.latency_stddev {
            self.record(format!("{prefix}.latency_stddev"), latency_stddev, "ms", LowerIsBetter);
        }
        self.record(format!("{prefix}.tps"), result.tps, "", HigherIsBetter);
        self.record(format!("{prefix}.run_duration"), result.run_duration, "s", LowerIsBetter);
        self.record(format!("{prefix}.run_start_timestamp"), result.run_start_timestamp, "", TestParam);
        self.record(format!("{prefix}.run_end_timestamp"), result.run_end_timestamp, "", TestParam);
        self.record(format!("{prefix}.scale"), result.scale, "", TestParam);
    }

    /// Record the timestamps and every present phase duration of a pgbench init.
    pub fn record_pg_bench_init_result(&mut self, prefix: &str, result: &PgBenchInitResult) {
        let test_params = [
            ("start_timestamp", result.start_timestamp),
            ("end_timestamp", result.end_timestamp),
        ];
        for (name, value) in test_params {
            self.record(format!("{prefix}.{name}"), value, "", MetricReport::TestParam);
        }

        let durations = [
            ("total", Some(result.total)),
            ("duration", Some(result.duration)),
            ("drop_tables", result.drop_tables),
            ("create_tables", result.create_tables),
            ("client_side_generate", result.client_side_generate),
            ("vacuum", result.vacuum),
            ("primary_keys", result.primary_keys),
        ];
        for (name, value) in durations {
            if let Some(value) = value {
                self.record(format!("{prefix}.{name}"), value, "s", MetricReport::LowerIsBetter);
            }
        }
    }

    /// Fetch the value of an integer counter from the pageserver metrics.
    pub fn get_int_counter_value(
        &self,
        source: &dyn MetricsSource,
        metric_name: &str,
    ) -> metrics::Result<i64> {
        metrics::get_int_counter_value(source, metric_name)
    }

    /// Cumulative number of bytes written by the pageserver.
    pub fn get_io_writes(&self, source: &dyn MetricsSource) -> metrics::Result<i64> {
        self.get_int_counter_value(source, metrics::IO_WRITES_METRIC)
    }

    /// Peak resident memory of the pageserver, in kilobytes.
    pub fn get_peak_mem(&self, source: &dyn MetricsSource) -> metrics::Result<i64> {
        self.get_int_counter_value(source, metrics::PEAK_MEM_METRIC)
    }

    /// On-disk size of a timeline in bytes.
    pub fn get_timeline_size(
        &self,
        repo_dir: &Path,
        tenant_id: &str,
        timeline_id: &str,
    ) -> metrics::Result<u64> {
        metrics::get_timeline_size(repo_dir, tenant_id, timeline_id)
    }

    /// Run `op` and record how many megabytes the pageserver wrote meanwhile.
    ///
    /// For operations that report failure through `Result`, use
    /// [`try_record_pageserver_writes`](Self::try_record_pageserver_writes).
    pub fn record_pageserver_writes<T>(
        &mut self,
        source: &dyn MetricsSource,
        metric_name: &str,
        op: impl FnOnce() -> T,
    ) -> metrics::Result<T> {
        let before = self.get_io_writes(source)?;
        let out = op();
        let after = self.get_io_writes(source)?;

        self.record_written_mb(metric_name, before, after);
        Ok(out)
    }

    /// Like [`record_pageserver_writes`](Self::record_pageserver_writes) for
    /// fallible operations.
    ///
    /// The write delta is only recorded when `op` returns `Ok`.
    pub fn try_record_pageserver_writes<T, E>(
        &mut self,
        source: &dyn MetricsSource,
        metric_name: &str,
        op: impl FnOnce() -> Result<T, E>,
    ) -> Result<T, E>
    where
        E: From<MetricsError>,
    {
        let before = self.get_io_writes(source)?;
        let out = op()?;
        let after = self.get_io_writes(source)?;

        self.record_written_mb(metric_name, before, after);
        Ok(out)
    }

    fn record_written_mb(&mut self, metric_name: &str, before: i64, after: i64) {
        let written_mb = metrics::round_to_int((after - before) as f64 / BYTES_PER_MB);
        self.record(metric_name, written_mb, "MB", MetricReport::LowerIsBetter);
    }

    /// Record the peak memory use of the pageserver as `peak_mem`.
    pub fn report_peak_memory_use(&mut self, source: &dyn MetricsSource) -> metrics::Result<()> {
        let peak_mem_kb = self.get_peak_mem(source)?;
        self.record("peak_mem", peak_mem_kb as f64 / 1024.0, "MB", MetricReport::LowerIsBetter);
        Ok(())
    }

    /// Record the timeline size on disk together with its upload counters.
    pub fn report_timeline_size(
        &mut self,
        source: &dyn MetricsSource,
        repo_dir: &Path,
        tenant_id: &str,
        timeline_id: &str,
    ) -> metrics::Result<()> {
        let timeline_size = self.get_timeline_size(repo_dir, tenant_id, timeline_id)?;
        self.record("size", timeline_size as f64 / BYTES_PER_MB, "MB", MetricReport::LowerIsBetter);

        let labels = metrics::timeline_labels(tenant_id, timeline_id);
        let total_files = self.get_int_counter_value(
            source,
            &format!("{}{}", metrics::CREATED_FILES_METRIC, labels),
        )?;
        let total_bytes = self.get_int_counter_value(
            source,
            &format!("{}{}", metrics::WRITTEN_BYTES_METRIC, labels),
        )?;

        self.record(
            "data_uploaded",
            total_bytes as f64 / BYTES_PER_MB,
            "MB",
            MetricReport::LowerIsBetter,
        );
        self.record("num_files_uploaded", total_files, "", MetricReport::LowerIsBetter);
        Ok(())
    }
}
