// Copyright 2025 Zenbench Contributors
// SPDX-License-Identifier: Apache-2.0

//! I/O operations for benchmark reports.
//!
//! This module picks the report file name, writes the session report as
//! JSON, and stores or loads a whole [`BenchmarkSession`].

use crate::session::{BenchmarkSession, SessionReport};
use chrono::Utc;
use serde::Serialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur while persisting reports.
#[derive(Debug, Error)]
pub enum ReportError {
    /// Filesystem error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The timestamped report file is already there.
    #[error("report file already exists: {}", .0.display())]
    OutputExists(PathBuf),
}

/// Result type for report I/O.
pub type Result<T> = std::result::Result<T, ReportError>;

/// Path of the report file for `revision` inside `target_dir`.
///
/// The file name is `<utc epoch seconds>_<revision>.json`. The file must not
/// exist yet.
pub fn get_out_path(target_dir: &Path, revision: &str) -> Result<PathBuf> {
    let ts = Utc::now().timestamp();
    let path = target_dir.join(format!("{}_{}.json", ts, revision));
    if path.exists() {
        return Err(ReportError::OutputExists(path));
    }
    Ok(path)
}

fn to_json_pretty<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut ser)?;
    Ok(buf)
}

/// Write a session report as indented JSON.
pub fn write_report_json(report: &SessionReport, path: impl AsRef<Path>) -> Result<()> {
    fs::write(path, to_json_pretty(report)?)?;
    Ok(())
}

/// Read a session report back from JSON.
pub fn read_report_json(path: impl AsRef<Path>) -> Result<SessionReport> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

/// Store a whole session, e.g. for a later `report` invocation.
pub fn save_session(session: &BenchmarkSession, path: impl AsRef<Path>) -> Result<()> {
    fs::write(path, to_json_pretty(session)?)?;
    Ok(())
}

/// Load a session stored with [`save_session`].
pub fn load_session(path: impl AsRef<Path>) -> Result<BenchmarkSession> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}
