// Copyright 2025 Zenbench Contributors
// SPDX-License-Identifier: Apache-2.0

//! Terminal summary of a benchmark session.
//!
//! Prints one `<test>.<metric>: <value> <unit>` line per recorded metric of
//! every passed test, with unit-dependent number formatting.

use crate::result::MetricValue;
use crate::session::BenchmarkSession;
use colored::Colorize;
use std::io::{self, Write};

/// Title of the summary section.
pub const SECTION_TITLE: &str = "Benchmark results";

const SECTION_WIDTH: usize = 80;

/// Insert `,` between groups of three digits in the integral part.
fn group_thousands(formatted: &str) -> String {
    let (sign, unsigned) = match formatted.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", formatted),
    };
    let (int_part, frac_part) = match unsigned.split_once('.') {
        Some((int_part, frac)) => (int_part, Some(frac)),
        None => (unsigned, None),
    };

    let mut grouped = String::with_capacity(formatted.len() + int_part.len() / 3);
    grouped.push_str(sign);
    for (i, digit) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }
    if let Some(frac) = frac_part {
        grouped.push('.');
        grouped.push_str(frac);
    }
    grouped
}

fn format_grouped(value: f64, precision: usize) -> String {
    if !value.is_finite() {
        return value.to_string();
    }
    group_thousands(&format!("{:.*}", precision, value))
}

/// Format a metric value for the terminal.
///
/// Megabytes are whole numbers, seconds and milliseconds get three decimals,
/// any other float four. Integers in other units are printed as-is.
pub fn format_value(value: &MetricValue, unit: &str) -> String {
    match (unit, value) {
        ("MB", v) => format_grouped(v.as_f64(), 0),
        ("s" | "ms", MetricValue::Float(v)) => format_grouped(*v, 3),
        (_, MetricValue::Float(v)) => format_grouped(*v, 4),
        (_, MetricValue::Int(v)) => v.to_string(),
    }
}

fn section_header(title: &str) -> String {
    format!("{:-^width$}", format!(" {} ", title), width = SECTION_WIDTH)
}

/// Write the summary section for all passed tests of `session`.
pub fn write_summary<W: Write>(out: &mut W, session: &BenchmarkSession, color: bool) -> io::Result<()> {
    writeln!(out, "{}", section_header(SECTION_TITLE))?;

    for test in session.passed() {
        for record in test.metrics() {
            let value = format_value(&record.value, &record.unit);
            let value = if color {
                value.green().to_string()
            } else {
                value
            };
            writeln!(out, "{}.{}: {} {}", test.head_line, record.name, value, record.unit)?;
        }
    }

    Ok(())
}

/// Render the summary into a string.
pub fn render_summary(session: &BenchmarkSession, color: bool) -> String {
    let mut buf = Vec::new();
    // Writing into a Vec cannot fail.
    let _ = write_summary(&mut buf, session, color);
    String::from_utf8_lossy(&buf).into_owned()
}
