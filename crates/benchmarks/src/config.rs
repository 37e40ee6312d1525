// Copyright 2025 Zenbench Contributors
// SPDX-License-Identifier: Apache-2.0

//! Report configuration.

use std::env;
use std::path::PathBuf;

/// Environment variable holding the revision under test.
pub const REVISION_ENV: &str = "GITHUB_SHA";

/// Environment variable holding the platform name.
pub const PLATFORM_ENV: &str = "PLATFORM";

/// Value used when the revision or platform is not set.
pub const DEFAULT_TAG: &str = "local";

/// Where and how the session report is emitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportConfig {
    /// Directory for the JSON report. No file is written when unset.
    pub out_dir: Option<PathBuf>,
    /// Revision identifier, part of the report and its file name.
    pub revision: String,
    /// Platform identifier.
    pub platform: String,
    /// Colour values in the terminal summary.
    pub color: bool,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            out_dir: None,
            revision: DEFAULT_TAG.to_string(),
            platform: DEFAULT_TAG.to_string(),
            color: true,
        }
    }
}

impl ReportConfig {
    /// Create a config writing into `out_dir`, tagged `local`.
    pub fn new(out_dir: Option<PathBuf>) -> Self {
        Self {
            out_dir,
            ..Self::default()
        }
    }

    /// Create a config reading revision and platform from the environment.
    pub fn from_env(out_dir: Option<PathBuf>) -> Self {
        Self {
            out_dir,
            revision: env_or_default(REVISION_ENV),
            platform: env_or_default(PLATFORM_ENV),
            color: true,
        }
    }

    /// Set the revision.
    pub fn with_revision(mut self, revision: impl Into<String>) -> Self {
        self.revision = revision.into();
        self
    }

    /// Set the platform.
    pub fn with_platform(mut self, platform: impl Into<String>) -> Self {
        self.platform = platform.into();
        self
    }

    /// Enable or disable colour.
    pub fn with_color(mut self, color: bool) -> Self {
        self.color = color;
        self
    }
}

fn env_or_default(key: &str) -> String {
    env::var(key)
        .ok()
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| DEFAULT_TAG.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_local() {
        let config = ReportConfig::new(None);
        assert_eq!(config.revision, "local");
        assert_eq!(config.platform, "local");
        assert!(config.out_dir.is_none());
    }

    #[test]
    fn test_builders() {
        let config = ReportConfig::new(Some(PathBuf::from("/tmp/out")))
            .with_revision("abc123")
            .with_platform("linux-x86")
            .with_color(false);
        assert_eq!(config.revision, "abc123");
        assert_eq!(config.platform, "linux-x86");
        assert!(!config.color);
    }
}
