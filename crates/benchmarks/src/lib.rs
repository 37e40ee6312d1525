// Copyright 2025 Zenbench Contributors
// SPDX-License-Identifier: Apache-2.0

//! Benchmark fixtures for pgbench-driven performance tests.
//!
//! This crate parses `pgbench` output into structured results, records named
//! metrics for each test through a property sink supplied by the test
//! framework, and emits a summary plus an optional JSON report once the
//! session is over.
//!
//! # Quick Start
//!
//! ```no_run
//! use zenbench::pgbench::PgBenchRunResult;
//! use zenbench::{emit_report, BenchmarkSession, ReportConfig};
//!
//! let mut session = BenchmarkSession::new();
//!
//! session.run_test("perf/test_pgbench.py::test_pgbench", |zenbenchmark| {
//!     let stdout = std::fs::read_to_string("pgbench.out").map_err(|e| e.to_string())?;
//!     let result = zenbenchmark.try_record_duration("parse", || {
//!         PgBenchRunResult::parse_from_stdout(&stdout, 60.0, 1_650_000_000, 1_650_000_060)
//!             .map_err(|e| e.to_string())
//!     })?;
//!     zenbenchmark.record_pg_bench_result("pgbench", &result);
//!     Ok::<(), String>(())
//! })?;
//!
//! let config = ReportConfig::from_env(Some("perf-results".into()));
//! emit_report(&session, &config, &mut std::io::stdout())?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Modules
//!
//! - [`pgbench`] - Run and init output parsers
//! - [`result`] - Metric record types
//! - [`recorder`] - The per-test `NeonBenchmarker`
//! - [`metrics`] - Pageserver metrics endpoint and timeline size probes
//! - [`session`] - Session state and per-test reports
//! - [`summary`] - Terminal summary
//! - [`io`] - Report and session files
//! - [`config`] - Report configuration

#![warn(missing_docs, rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod config;
pub mod io;
pub mod metrics;
pub mod pgbench;
pub mod recorder;
pub mod result;
pub mod session;
pub mod summary;

pub use config::ReportConfig;
pub use recorder::{NeonBenchmarker, PropertyRecorder};
pub use result::{MetricRecord, MetricReport, MetricValue};
pub use session::{BenchmarkSession, SessionReport, TestReport};

use std::io::Write;
use std::path::PathBuf;
use tracing::{info, warn};

/// Print the session summary and write the JSON report.
///
/// This is the end-of-session hook. It writes the summary for every passed
/// test to `out`, then stores `{revision, platform, result}` inside
/// `config.out_dir`.
///
/// # Returns
///
/// The path of the written report, or `None` when writing was skipped
/// because no output directory is configured or no passed test recorded a
/// metric. Skipping is logged as a warning, not an error.
///
/// # Errors
///
/// Returns an [`io::ReportError`] if the summary or the report file cannot
/// be written, or if the report file already exists.
pub fn emit_report<W: Write>(
    session: &BenchmarkSession,
    config: &ReportConfig,
    out: &mut W,
) -> io::Result<Option<PathBuf>> {
    summary::write_summary(out, session, config.color)?;

    let report = session.to_report(&config.revision, &config.platform);

    let Some(out_dir) = &config.out_dir else {
        warn!("no out dir provided to store performance test results");
        return Ok(None);
    };

    if !report.has_metrics() {
        warn!("no results to store (no passed test suites)");
        return Ok(None);
    }

    let path = io::get_out_path(out_dir, &config.revision)?;
    io::write_report_json(&report, &path)?;
    info!(path = %path.display(), suites = report.result.len(), "benchmark report written");

    Ok(Some(path))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session_with_metric() -> BenchmarkSession {
        let mut session = BenchmarkSession::new();
        session
            .run_test::<()>("a.py::test_a", |bench| {
                bench.record("x", 1, "", MetricReport::TestParam);
                Ok(())
            })
            .unwrap();
        session
    }

    #[test]
    fn test_emit_report_without_out_dir_skips_file() {
        let config = ReportConfig::new(None).with_color(false);
        let mut out = Vec::new();
        let written = emit_report(&session_with_metric(), &config, &mut out).unwrap();
        assert!(written.is_none());
        assert!(String::from_utf8(out).unwrap().contains("test_a.x: 1 "));
    }

    #[test]
    fn test_emit_report_without_metrics_skips_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = ReportConfig::new(Some(dir.path().to_path_buf())).with_color(false);
        let mut session = BenchmarkSession::new();
        session.run_test::<()>("a.py::quiet", |_| Ok(())).unwrap();

        let written = emit_report(&session, &config, &mut Vec::new()).unwrap();
        assert!(written.is_none());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_emit_report_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = ReportConfig::new(Some(dir.path().to_path_buf()))
            .with_revision("deadbeef")
            .with_platform("ci")
            .with_color(false);

        let path = emit_report(&session_with_metric(), &config, &mut Vec::new())
            .unwrap()
            .unwrap();
        let report = io::read_report_json(&path).unwrap();
        assert_eq!(report.revision, "deadbeef");
        assert_eq!(report.platform, "ci");
        assert_eq!(report.result[0].suit, "a.py::test_a");
        assert_eq!(report.result[0].data[0].name, "x");
    }
}
