// Copyright 2025 Zenbench Contributors
// SPDX-License-Identifier: Apache-2.0

//! zenbench CLI entry point.

use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "zenbench=info,zenbench_cli=info";

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = zenbench_cli::run() {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
