// Copyright 2025 Zenbench Contributors
// SPDX-License-Identifier: Apache-2.0

//! Pageserver metrics and on-disk size probes.
//!
//! The metrics endpoint serves plain text, one `<name> <value>` pair per
//! line. Every metric is transported as a float, so integral counters are
//! read as floats and rounded.

use regex::Regex;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use walkdir::WalkDir;

/// Cumulative number of bytes written by the pageserver.
pub const IO_WRITES_METRIC: &str = r#"libmetrics_disk_io_bytes_total{io_operation="write"}"#;

/// Peak resident set size of the pageserver, in kilobytes.
pub const PEAK_MEM_METRIC: &str = "libmetrics_maxrss_kb";

/// Persistent files created for a timeline.
pub const CREATED_FILES_METRIC: &str = "pageserver_created_persistent_files_total";

/// Persistent bytes written for a timeline.
pub const WRITTEN_BYTES_METRIC: &str = "pageserver_written_persistent_bytes_total";

/// Bytes per megabyte, as reported in `MB` metrics.
pub const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Errors that can occur while probing the server under test.
#[derive(Debug, Error)]
pub enum MetricsError {
    /// The metrics request failed.
    #[error("metrics request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The metric is not exposed by the endpoint.
    #[error("metric {0} not found")]
    NotFound(String),

    /// The metric value is not a number.
    #[error("metric {metric} has non-numeric value `{value}`")]
    InvalidValue {
        /// Metric name.
        metric: String,
        /// Raw value.
        value: String,
    },

    /// Filesystem traversal failed.
    #[error("failed to walk {path}: {source}")]
    Walk {
        /// Directory being measured.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: walkdir::Error,
    },
}

/// Result type for metrics operations.
pub type Result<T> = std::result::Result<T, MetricsError>;

/// Anything that can return the full text of a metrics endpoint.
#[cfg_attr(test, mockall::automock)]
pub trait MetricsSource {
    /// Fetch all metrics as plain text.
    fn get_metrics(&self) -> Result<String>;
}

/// Blocking HTTP client for a pageserver management API.
#[derive(Debug, Clone)]
pub struct PageserverHttpClient {
    base_url: String,
    client: reqwest::blocking::Client,
}

impl PageserverHttpClient {
    /// Create a client for `base_url`, e.g. `http://127.0.0.1:9898`.
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    /// Base URL of the management API.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl MetricsSource for PageserverHttpClient {
    fn get_metrics(&self) -> Result<String> {
        let url = format!("{}/metrics", self.base_url);
        debug!(%url, "fetching pageserver metrics");
        let text = self.client.get(&url).send()?.error_for_status()?.text()?;
        Ok(text)
    }
}

/// Round half to even, the way counters transported as floats are read back.
pub fn round_to_int(value: f64) -> i64 {
    value.round_ties_even() as i64
}

/// Find `metric_name` in a metrics dump and return its value rounded to an integer.
///
/// The name is matched literally against a whole line, labels included.
pub fn parse_int_counter_value(all_metrics: &str, metric_name: &str) -> Result<i64> {
    let pattern = format!(r"(?m)^{} (\S+)$", regex::escape(metric_name));
    let re = Regex::new(&pattern).map_err(|_| MetricsError::NotFound(metric_name.to_string()))?;

    let raw = re
        .captures(all_metrics)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .ok_or_else(|| MetricsError::NotFound(metric_name.to_string()))?;

    let value: f64 = raw.parse().map_err(|_| MetricsError::InvalidValue {
        metric: metric_name.to_string(),
        value: raw.to_string(),
    })?;

    Ok(round_to_int(value))
}

/// Fetch the value of an integer counter from `source`.
pub fn get_int_counter_value(source: &dyn MetricsSource, metric_name: &str) -> Result<i64> {
    let all_metrics = source.get_metrics()?;
    parse_int_counter_value(&all_metrics, metric_name)
}

/// Label suffix selecting one timeline, e.g. `{tenant_id="..",timeline_id=".."}`.
pub fn timeline_labels(tenant_id: &str, timeline_id: &str) -> String {
    format!(r#"{{tenant_id="{}",timeline_id="{}"}}"#, tenant_id, timeline_id)
}

/// On-disk directory of a timeline inside a pageserver repository.
pub fn timeline_dir(repo_dir: &Path, tenant_id: &str, timeline_id: &str) -> PathBuf {
    repo_dir
        .join("tenants")
        .join(tenant_id)
        .join("timelines")
        .join(timeline_id)
}

/// Total size in bytes of all regular files below `dir`.
pub fn dir_size(dir: &Path) -> Result<u64> {
    let mut total_bytes = 0;
    for entry in WalkDir::new(dir) {
        let entry = entry.map_err(|source| MetricsError::Walk {
            path: dir.to_path_buf(),
            source,
        })?;
        if entry.file_type().is_file() {
            let metadata = entry.metadata().map_err(|source| MetricsError::Walk {
                path: dir.to_path_buf(),
                source,
            })?;
            total_bytes += metadata.len();
        }
    }
    Ok(total_bytes)
}

/// Calculate the on-disk size of a timeline.
pub fn get_timeline_size(repo_dir: &Path, tenant_id: &str, timeline_id: &str) -> Result<u64> {
    dir_size(&timeline_dir(repo_dir, tenant_id, timeline_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io::{BufRead, BufReader, Write};
    use std::net::TcpListener;
    use std::thread::{self, JoinHandle};

    /// Serve one HTTP response on a local port, returning the request line.
    fn serve_once(status: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let base_url = format!("http://{}/", listener.local_addr().unwrap());
        let handle = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());
            let mut request_line = String::new();
            reader.read_line(&mut request_line).unwrap();
            loop {
                let mut header = String::new();
                reader.read_line(&mut header).unwrap();
                if header == "\r\n" || header.is_empty() {
                    break;
                }
            }
            let mut stream = stream;
            write!(
                stream,
                "HTTP/1.1 {}\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            )
            .unwrap();
            request_line.trim_end().to_string()
        });
        (base_url, handle)
    }

    const METRICS: &str = "\
# HELP libmetrics_disk_io_bytes_total Bytes written and read from disk
# TYPE libmetrics_disk_io_bytes_total counter
libmetrics_disk_io_bytes_total{io_operation=\"read\"} 4096
libmetrics_disk_io_bytes_total{io_operation=\"write\"} 1.048576e7
libmetrics_maxrss_kb 204800
libmetrics_maxrss_kb_extra 1
pageserver_broken 2.5.1
";

    #[test]
    fn test_parse_counter_exact_line() {
        assert_eq!(parse_int_counter_value(METRICS, IO_WRITES_METRIC).unwrap(), 10_485_760);
        assert_eq!(parse_int_counter_value(METRICS, PEAK_MEM_METRIC).unwrap(), 204_800);
    }

    #[test]
    fn test_parse_counter_not_found() {
        let err = parse_int_counter_value(METRICS, "libmetrics_missing").unwrap_err();
        assert_eq!(err.to_string(), "metric libmetrics_missing not found");
    }

    #[test]
    fn test_parse_counter_prefix_does_not_match() {
        let err = parse_int_counter_value(METRICS, "libmetrics_maxrss").unwrap_err();
        assert!(matches!(err, MetricsError::NotFound(_)));
    }

    #[test]
    fn test_parse_counter_invalid_value() {
        let err = parse_int_counter_value(METRICS, "pageserver_broken").unwrap_err();
        assert!(matches!(err, MetricsError::InvalidValue { .. }));
    }

    #[test]
    fn test_round_half_even() {
        assert_eq!(round_to_int(2.5), 2);
        assert_eq!(round_to_int(3.5), 4);
        assert_eq!(round_to_int(2.4999), 2);
    }

    #[test]
    fn test_get_int_counter_value_from_source() {
        let mut source = MockMetricsSource::new();
        source
            .expect_get_metrics()
            .times(1)
            .returning(|| Ok(METRICS.to_string()));
        assert_eq!(get_int_counter_value(&source, PEAK_MEM_METRIC).unwrap(), 204_800);
    }

    #[test]
    fn test_http_client_fetches_metrics() {
        let (base_url, server) = serve_once("200 OK", METRICS);
        let client = PageserverHttpClient::new(base_url).unwrap();
        assert!(!client.base_url().ends_with('/'));

        let writes = get_int_counter_value(&client, IO_WRITES_METRIC).unwrap();
        assert_eq!(writes, 10_485_760);
        assert_eq!(server.join().unwrap(), "GET /metrics HTTP/1.1");
    }

    #[test]
    fn test_http_client_error_status() {
        let (base_url, server) = serve_once("500 Internal Server Error", "oops");
        let client = PageserverHttpClient::new(base_url).unwrap();

        let err = client.get_metrics().unwrap_err();
        assert!(matches!(err, MetricsError::Http(ref e) if e.status().map(|s| s.as_u16()) == Some(500)));
        server.join().unwrap();
    }

    #[test]
    fn test_timeline_labels() {
        assert_eq!(
            format!("{}{}", WRITTEN_BYTES_METRIC, timeline_labels("t1", "tl1")),
            r#"pageserver_written_persistent_bytes_total{tenant_id="t1",timeline_id="tl1"}"#
        );
    }

    #[test]
    fn test_timeline_size_sums_nested_files() {
        let repo = tempfile::tempdir().unwrap();
        let dir = timeline_dir(repo.path(), "tenant", "timeline");
        fs::create_dir_all(dir.join("layers")).unwrap();
        fs::write(dir.join("metadata"), vec![0u8; 512]).unwrap();
        fs::write(dir.join("layers").join("a"), vec![0u8; 1024]).unwrap();
        fs::write(dir.join("layers").join("b"), vec![0u8; 100]).unwrap();

        assert_eq!(get_timeline_size(repo.path(), "tenant", "timeline").unwrap(), 1636);
    }

    #[test]
    fn test_timeline_size_missing_dir() {
        let repo = tempfile::tempdir().unwrap();
        let err = get_timeline_size(repo.path(), "tenant", "nope").unwrap_err();
        assert!(matches!(err, MetricsError::Walk { .. }));
    }
}
