// Copyright 2025 Zenbench Contributors
// SPDX-License-Identifier: Apache-2.0

//! CLI for zenbench.
//!
//! Lets a harness that only captured pgbench output, or serialized its
//! session, use the parsers and the report emitter.

#![warn(missing_docs, rust_2018_idioms)]
#![deny(unsafe_code)]

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use serde_json::Value;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use zenbench::config::{DEFAULT_TAG, PLATFORM_ENV, REVISION_ENV};
use zenbench::pgbench::{PgBenchInitResult, PgBenchRunResult};
use zenbench::{emit_report, io, NeonBenchmarker, ReportConfig};

/// zenbench CLI.
#[derive(Parser, Debug)]
#[command(name = "zenbench")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Commands,
}

/// Timing of a pgbench invocation, measured by the caller, and output options.
#[derive(Args, Debug, Clone)]
pub struct PgBenchArgs {
    /// Wall-clock duration in seconds.
    #[arg(long)]
    pub duration: f64,

    /// Start timestamp, epoch seconds.
    #[arg(long)]
    pub start: i64,

    /// End timestamp, epoch seconds.
    #[arg(long)]
    pub end: i64,

    /// Print the metric records emitted under this prefix instead of the parsed result.
    #[arg(long)]
    pub prefix: Option<String>,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Parse the captured stdout of a pgbench run.
    ParseRun {
        /// File holding pgbench stdout.
        file: PathBuf,

        #[command(flatten)]
        pgbench: PgBenchArgs,
    },

    /// Parse the captured stderr of `pgbench -i`.
    ParseInit {
        /// File holding pgbench stderr.
        file: PathBuf,

        #[command(flatten)]
        pgbench: PgBenchArgs,
    },

    /// Print the summary of a stored session and write its JSON report.
    Report {
        /// Session file.
        session: PathBuf,

        /// Directory to output performance tests results to.
        #[arg(long = "out-dir")]
        out_dir: Option<PathBuf>,

        /// Revision under test.
        #[arg(long, env = REVISION_ENV, default_value = DEFAULT_TAG)]
        revision: String,

        /// Platform the session ran on.
        #[arg(long, env = PLATFORM_ENV, default_value = DEFAULT_TAG)]
        platform: String,

        /// Do not colour the summary.
        #[arg(long)]
        no_color: bool,
    },
}

fn recorded_metrics(record: impl FnOnce(&mut NeonBenchmarker<'_>)) -> Value {
    let mut properties = Vec::new();
    let mut sink = |_key: String, value: Value| properties.push(value);
    record(&mut NeonBenchmarker::new(&mut sink));
    Value::Array(properties)
}

/// Execute a parsed command, writing its output to `out`.
pub fn execute<W: Write>(cli: Cli, out: &mut W) -> anyhow::Result<()> {
    match cli.command {
        Commands::ParseRun { file, pgbench } => {
            let stdout = fs::read_to_string(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            let result =
                PgBenchRunResult::parse_from_stdout(&stdout, pgbench.duration, pgbench.start, pgbench.end)?;

            let json = match &pgbench.prefix {
                Some(prefix) => recorded_metrics(|b| b.record_pg_bench_result(prefix, &result)),
                None => serde_json::to_value(&result)?,
            };
            writeln!(out, "{}", serde_json::to_string_pretty(&json)?)?;
            Ok(())
        }
        Commands::ParseInit { file, pgbench } => {
            let stderr = fs::read_to_string(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            let result =
                PgBenchInitResult::parse_from_stderr(&stderr, pgbench.duration, pgbench.start, pgbench.end)?;

            let json = match &pgbench.prefix {
                Some(prefix) => recorded_metrics(|b| b.record_pg_bench_init_result(prefix, &result)),
                None => serde_json::to_value(&result)?,
            };
            writeln!(out, "{}", serde_json::to_string_pretty(&json)?)?;
            Ok(())
        }
        Commands::Report {
            session,
            out_dir,
            revision,
            platform,
            no_color,
        } => {
            let loaded = io::load_session(&session)
                .with_context(|| format!("failed to load session {}", session.display()))?;
            let config = ReportConfig::new(out_dir)
                .with_revision(revision)
                .with_platform(platform)
                .with_color(!no_color);

            if let Some(path) = emit_report(&loaded, &config, out)? {
                tracing::info!(path = %path.display(), "report stored");
            }
            Ok(())
        }
    }
}

/// Run the CLI with the process arguments.
///
/// # Returns
///
/// Returns `Ok(())` on success, or an error if the command fails.
pub fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    execute(cli, &mut std::io::stdout().lock())
}

#[cfg(test)]
mod tests {
    use super::*;
    use zenbench::{BenchmarkSession, MetricReport};

    fn run_cli(args: &[&str]) -> anyhow::Result<String> {
        let cli = Cli::try_parse_from(args)?;
        let mut out = Vec::new();
        execute(cli, &mut out)?;
        Ok(String::from_utf8(out)?)
    }

    #[test]
    fn test_parse_run_prints_result() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("stdout.txt");
        fs::write(
            &file,
            "scaling factor: 5\nnumber of clients: 1\nnumber of threads: 1\n\
             number of transactions actually processed: 10\nlatency average = 1.5 ms\n\
             tps = 600.0 (without initial connection time)\n",
        )
        .unwrap();

        let out = run_cli(&[
            "zenbench", "parse-run", file.to_str().unwrap(),
            "--duration", "2.5", "--start", "10", "--end", "12",
        ])
        .unwrap();
        let json: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(json["scale"], 5);
        assert_eq!(json["tps"], 600.0);
        assert_eq!(json["latency_stddev"], Value::Null);
    }

    #[test]
    fn test_parse_init_with_prefix_prints_metrics() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("stderr.txt");
        fs::write(&file, "creating tables...\ndone in 1.00 s (vacuum 0.20 s).\n").unwrap();

        let out = run_cli(&[
            "zenbench", "parse-init", file.to_str().unwrap(),
            "--duration", "1.1", "--start", "1", "--end", "2", "--prefix", "init",
        ])
        .unwrap();
        let json: Value = serde_json::from_str(&out).unwrap();
        let names: Vec<&str> = json
            .as_array()
            .unwrap()
            .iter()
            .map(|r| r["name"].as_str().unwrap())
            .collect();
        assert_eq!(
            names,
            ["init.start_timestamp", "init.end_timestamp", "init.total", "init.duration", "init.vacuum"]
        );
    }

    #[test]
    fn test_pgbench_args_are_shared_by_parse_commands() {
        for command in ["parse-run", "parse-init"] {
            let cli = Cli::try_parse_from([
                "zenbench", command, "out.txt",
                "--duration", "3.5", "--start", "7", "--end", "9", "--prefix", "pgbench",
            ])
            .unwrap();
            let (Commands::ParseRun { pgbench, .. } | Commands::ParseInit { pgbench, .. }) = cli.command
            else {
                panic!("unexpected command for {command}");
            };
            assert_eq!(pgbench.duration, 3.5);
            assert_eq!((pgbench.start, pgbench.end), (7, 9));
            assert_eq!(pgbench.prefix.as_deref(), Some("pgbench"));
        }
        assert!(Cli::try_parse_from(["zenbench", "report", "s.json", "--prefix", "x"]).is_err());
    }

    #[test]
    fn test_parse_init_rejects_unknown_line() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("stderr.txt");
        fs::write(&file, "pgbench: error: connection refused\n").unwrap();

        let err = run_cli(&[
            "zenbench", "parse-init", file.to_str().unwrap(),
            "--duration", "1", "--start", "1", "--end", "2",
        ])
        .unwrap_err();
        assert!(err.to_string().contains("pgbench: error: connection refused"));
    }

    #[test]
    fn test_report_writes_into_out_dir() {
        let dir = tempfile::tempdir().unwrap();
        let session_file = dir.path().join("session.json");
        let out_dir = dir.path().join("results");
        fs::create_dir(&out_dir).unwrap();

        let mut session = BenchmarkSession::new();
        session
            .run_test::<()>("t.py::test_t", |b| {
                b.record("size", 12.0, "MB", MetricReport::LowerIsBetter);
                Ok(())
            })
            .unwrap();
        io::save_session(&session, &session_file).unwrap();

        let out = run_cli(&[
            "zenbench", "report", session_file.to_str().unwrap(),
            "--out-dir", out_dir.to_str().unwrap(),
            "--revision", "abc", "--platform", "test", "--no-color",
        ])
        .unwrap();
        assert!(out.contains("test_t.size: 12 MB"));

        let written: Vec<_> = fs::read_dir(&out_dir).unwrap().collect();
        assert_eq!(written.len(), 1);
    }
}
