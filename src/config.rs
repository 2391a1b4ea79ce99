//=====================================================
// File: config.rs
//=====================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Runtime configuration for the interpreter core
// Objective: Load the profiler bound, backtrace style/format and thread-poll
//            sampling knobs from TOML with sensible defaults
//=====================================================

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::backtrace::{Format, Gather, TraceType};

/// Default configuration file name inside the user's config directory.
const CONFIG_FILE: &str = "interp.toml";

/// Default cap on distinct methods tracked by the profiler.
pub const DEFAULT_MAX_PROFILED_METHODS: usize = 100_000;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct BacktraceConfig {
    /// Which frames are gathered: `raw`, `normal`, `full` or `caller`.
    pub style: Gather,
    /// How traces are printed: `mri`, `jruby` or `rubinius`.
    pub format: Format,
    /// Emit ANSI colours in the `jruby` layout.
    pub color: bool,
}

impl Default for BacktraceConfig {
    fn default() -> Self {
        Self {
            style: Gather::Normal,
            format: Format::Mri,
            color: false,
        }
    }
}

/// Knobs recognised by the interpreter core.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Maximum number of distinct methods the profiler registry will track.
    pub max_profiled_methods: usize,
    pub backtrace: BacktraceConfig,
    /// Count `THREAD_POLL` hits per scope for the hot-scope heuristic.
    pub thread_poll_sampling: bool,
    /// Attach an invocation profiler to every new thread context.
    pub profiling: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_profiled_methods: DEFAULT_MAX_PROFILED_METHODS,
            backtrace: BacktraceConfig::default(),
            thread_poll_sampling: false,
            profiling: false,
        }
    }
}

impl RuntimeConfig {
    /// Location of the per-user configuration file, if a config directory exists.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("solvra").join(CONFIG_FILE))
    }

    /// Load the per-user configuration, falling back to defaults when absent.
    pub fn load_default() -> anyhow::Result<Self> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Load configuration from an explicit TOML file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("reading configuration from {}", path.display()))?;
        Self::from_toml(&data).with_context(|| format!("parsing configuration {}", path.display()))
    }

    pub fn from_toml(data: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(data)?)
    }

    /// Persist the configuration back to disk.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let serialized = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating config directory {}", parent.display()))?;
        }
        fs::write(path, serialized)
            .with_context(|| format!("writing configuration to {}", path.display()))?;
        Ok(())
    }

    pub fn trace_type(&self) -> TraceType {
        TraceType::new(self.backtrace.style, self.backtrace.format)
    }

    pub fn with_max_profiled_methods(mut self, max: usize) -> Self {
        self.max_profiled_methods = max;
        self
    }

    pub fn with_backtrace(mut self, style: Gather, format: Format) -> Self {
        self.backtrace.style = style;
        self.backtrace.format = format;
        self
    }

    pub fn with_thread_poll_sampling(mut self, enabled: bool) -> Self {
        self.thread_poll_sampling = enabled;
        self
    }

    pub fn with_profiling(mut self, enabled: bool) -> Self {
        self.profiling = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_keys_fall_back_to_defaults() {
        let config = RuntimeConfig::from_toml("profiling = true\n").expect("parse");
        assert!(config.profiling);
        assert_eq!(config.max_profiled_methods, DEFAULT_MAX_PROFILED_METHODS);
        assert_eq!(config.backtrace, BacktraceConfig::default());
    }

    #[test]
    fn backtrace_table_parses_lowercase_names() {
        let config = RuntimeConfig::from_toml(
            "[backtrace]\nstyle = \"caller\"\nformat = \"rubinius\"\ncolor = true\n",
        )
        .expect("parse");
        assert_eq!(config.backtrace.style, Gather::Caller);
        assert_eq!(config.backtrace.format, Format::Rubinius);
        assert!(config.backtrace.color);
    }

    #[test]
    fn save_then_load_preserves_values() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join(CONFIG_FILE);
        let config = RuntimeConfig::default()
            .with_max_profiled_methods(12)
            .with_thread_poll_sampling(true);
        config.save(&path).expect("save");
        let loaded = RuntimeConfig::load(&path).expect("load");
        assert_eq!(loaded, config);
    }

    #[test]
    fn unknown_style_is_rejected() {
        let err = RuntimeConfig::from_toml("[backtrace]\nstyle = \"verbose\"\n");
        assert!(err.is_err());
    }
}

//=====================================================
// End of file
//=====================================================
