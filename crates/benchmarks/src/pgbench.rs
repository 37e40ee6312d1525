// Copyright 2025 Zenbench Contributors
// SPDX-License-Identifier: Apache-2.0

//! Parsers for `pgbench` output.
//!
//! [`PgBenchRunResult`] is built from the standard output of a benchmark run,
//! [`PgBenchInitResult`] from the standard error of `pgbench -i`. Both are
//! immutable once parsed, and neither parser ever returns a partial record.
//!
//! # Example
//!
//! ```
//! use zenbench::pgbench::PgBenchInitResult;
//!
//! let stderr = "creating tables...\n\
//!     done in 5.66 s (drop tables 0.05 s, create tables 0.31 s, \
//!     client-side generate 2.01 s, vacuum 0.53 s, primary keys 0.38 s).";
//!
//! let result = PgBenchInitResult::parse_from_stderr(stderr, 5.7, 1_650_000_000, 1_650_000_006)?;
//! assert_eq!(result.total, 5.66);
//! assert_eq!(result.vacuum, Some(0.53));
//! # Ok::<(), zenbench::pgbench::ParseError>(())
//! ```

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;
use tracing::debug;

/// Errors that can occur while parsing pgbench output.
#[derive(Debug, Error)]
pub enum ParseError {
    /// A required line never appeared in the run output.
    #[error("missing required field in pgbench output: {0}")]
    MissingField(&'static str),

    /// A recognised line carried a value that is not a number.
    #[error("invalid value for {field} in pgbench output: `{value}`")]
    InvalidNumber {
        /// Field the line maps to.
        field: &'static str,
        /// Offending token.
        value: String,
    },

    /// The last line of the init output is not a `done in` summary.
    #[error("can't parse pgbench initialize results from `{0}`")]
    UnrecognizedInitLine(String),
}

/// Result type for parsing operations.
pub type Result<T> = std::result::Result<T, ParseError>;

/// Statistics of one completed pgbench run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PgBenchRunResult {
    /// Number of client sessions.
    pub number_of_clients: i64,
    /// Number of worker threads.
    pub number_of_threads: i64,
    /// Transactions processed during the run.
    pub number_of_transactions_actually_processed: i64,
    /// Average latency in milliseconds.
    pub latency_average: f64,
    /// Latency standard deviation in milliseconds, only printed with some options.
    pub latency_stddev: Option<f64>,
    /// Transactions per second, without initial connection time.
    pub tps: f64,
    /// Wall-clock duration of the run in seconds, measured by the caller.
    pub run_duration: f64,
    /// Run start, epoch seconds.
    pub run_start_timestamp: i64,
    /// Run end, epoch seconds.
    pub run_end_timestamp: i64,
    /// Scaling factor of the pgbench database.
    pub scale: i64,
}

fn parse_number<T: FromStr>(field: &'static str, token: Option<&str>) -> Result<T> {
    let token = token.unwrap_or_default().trim();
    token.parse().map_err(|_| ParseError::InvalidNumber {
        field,
        value: token.to_string(),
    })
}

/// Like [`parse_number`], rejecting `nan` and `inf`.
fn parse_float(field: &'static str, token: Option<&str>) -> Result<f64> {
    let value: f64 = parse_number(field, token)?;
    if !value.is_finite() {
        return Err(ParseError::InvalidNumber {
            field,
            value: token.unwrap_or_default().trim().to_string(),
        });
    }
    Ok(value)
}

fn last_token(line: &str) -> Option<&str> {
    line.split_whitespace().next_back()
}

fn second_to_last_token(line: &str) -> Option<&str> {
    line.split_whitespace().rev().nth(1)
}

impl PgBenchRunResult {
    /// Parse the standard output of a pgbench run.
    ///
    /// The client, thread and scale values are known from the test input, but
    /// they are taken from the output to be precise.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::MissingField`] if a required line is absent, and
    /// [`ParseError::InvalidNumber`] if a recognised line has a malformed value.
    pub fn parse_from_stdout(
        stdout: &str,
        run_duration: f64,
        run_start_timestamp: i64,
        run_end_timestamp: i64,
    ) -> Result<Self> {
        let mut scale = None;
        let mut number_of_clients = None;
        let mut number_of_threads = None;
        let mut number_of_transactions_actually_processed = None;
        let mut latency_average = None;
        let mut latency_stddev = None;
        let mut tps = None;

        for line in stdout.lines() {
            // scaling factor: 5
            if line.starts_with("scaling factor:") {
                scale = Some(parse_number("scale", last_token(line))?);
            }
            // number of clients: 1
            if line.starts_with("number of clients: ") {
                number_of_clients = Some(parse_number("number_of_clients", last_token(line))?);
            }
            // number of threads: 1
            if line.starts_with("number of threads: ") {
                number_of_threads = Some(parse_number("number_of_threads", last_token(line))?);
            }
            // number of transactions actually processed: 1000/1000
            // or
            // number of transactions actually processed: 1000
            if line.starts_with("number of transactions actually processed") {
                let token = match line.split_once('/') {
                    Some((_, rest)) => Some(rest),
                    None => last_token(line),
                };
                number_of_transactions_actually_processed = Some(parse_number(
                    "number_of_transactions_actually_processed",
                    token,
                )?);
            }
            // latency average = 19.894 ms
            if line.starts_with("latency average") {
                latency_average = Some(parse_float("latency_average", second_to_last_token(line))?);
            }
            // latency stddev = 3.387 ms
            if line.starts_with("latency stddev") {
                latency_stddev = Some(parse_float("latency_stddev", second_to_last_token(line))?);
            }
            // pgbench v13 and below:
            //   tps = 50.264435 (excluding connections establishing)
            // pgbench v14:
            //   tps = 309.281539 (without initial connection time)
            if line.starts_with("tps = ")
                && (line.contains("(excluding connections establishing)")
                    || line.contains("(without initial connection time)"))
            {
                tps = Some(parse_float("tps", line.split_whitespace().nth(2))?);
            }
        }

        let result = Self {
            number_of_clients: number_of_clients.ok_or(ParseError::MissingField("number_of_clients"))?,
            number_of_threads: number_of_threads.ok_or(ParseError::MissingField("number_of_threads"))?,
            number_of_transactions_actually_processed: number_of_transactions_actually_processed
                .ok_or(ParseError::MissingField("number_of_transactions_actually_processed"))?,
            latency_average: latency_average.ok_or(ParseError::MissingField("latency_average"))?,
            latency_stddev,
            tps: tps.ok_or(ParseError::MissingField("tps"))?,
            run_duration,
            run_start_timestamp,
            run_end_timestamp,
            scale: scale.ok_or(ParseError::MissingField("scale"))?,
        };

        debug!(
            tps = result.tps,
            latency_average = result.latency_average,
            "parsed pgbench run result"
        );

        Ok(result)
    }
}

static INIT_DONE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"^done in (?P<total>\d+\.\d+) s ",
        r"\(",
        r"(?:drop tables (?P<drop_tables>\d+\.\d+) s)?(?:, )?",
        r"(?:create tables (?P<create_tables>\d+\.\d+) s)?(?:, )?",
        r"(?:client-side generate (?P<client_side_generate>\d+\.\d+) s)?(?:, )?",
        r"(?:vacuum (?P<vacuum>\d+\.\d+) s)?(?:, )?",
        r"(?:primary keys (?P<primary_keys>\d+\.\d+) s)?(?:, )?",
        r"\)\.",
    ))
    .expect("init summary pattern is valid")
});

/// Phase timings of one `pgbench -i` run.
///
/// Any sub-phase may be absent, pgbench skips steps that were not requested.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PgBenchInitResult {
    /// Total time reported by pgbench, seconds.
    pub total: f64,
    /// `drop tables` step, seconds.
    pub drop_tables: Option<f64>,
    /// `create tables` step, seconds.
    pub create_tables: Option<f64>,
    /// `client-side generate` step, seconds.
    pub client_side_generate: Option<f64>,
    /// `vacuum` step, seconds.
    pub vacuum: Option<f64>,
    /// `primary keys` step, seconds.
    pub primary_keys: Option<f64>,
    /// Wall-clock duration measured by the caller, seconds.
    pub duration: f64,
    /// Start, epoch seconds.
    pub start_timestamp: i64,
    /// End, epoch seconds.
    pub end_timestamp: i64,
}

impl PgBenchInitResult {
    /// Parse the standard error of `pgbench -i`.
    ///
    /// Only the final line is inspected, e.g.
    /// `done in 5.66 s (drop tables 0.05 s, create tables 0.31 s, client-side generate 2.01 s, vacuum 0.53 s, primary keys 0.38 s).`
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::UnrecognizedInitLine`] carrying the final line
    /// verbatim when it does not match.
    pub fn parse_from_stderr(
        stderr: &str,
        duration: f64,
        start_timestamp: i64,
        end_timestamp: i64,
    ) -> Result<Self> {
        let last_line = stderr.lines().next_back().unwrap_or_default();

        let caps = INIT_DONE_RE
            .captures(last_line)
            .ok_or_else(|| ParseError::UnrecognizedInitLine(last_line.to_string()))?;

        let phase = |name: &'static str| -> Result<Option<f64>> {
            caps.name(name)
                .map(|m| parse_number(name, Some(m.as_str())))
                .transpose()
        };

        let result = Self {
            total: parse_number("total", caps.name("total").map(|m| m.as_str()))?,
            drop_tables: phase("drop_tables")?,
            create_tables: phase("create_tables")?,
            client_side_generate: phase("client_side_generate")?,
            vacuum: phase("vacuum")?,
            primary_keys: phase("primary_keys")?,
            duration,
            start_timestamp,
            end_timestamp,
        };

        debug!(total = result.total, "parsed pgbench init result");

        Ok(result)
    }
}
