//! Compiler configuration management

use std::env;

use anyhow::{Context, Result};

use crate::adapter::{Adapter, AdapterId};

/// Default tracing filter when `QUARRY_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "quarry=info";

/// Process-level configuration loaded from environment variables
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilerConfig {
    /// Backend the service compiles for (`QUARRY_ADAPTER`, default `postgres`)
    pub adapter: AdapterId,

    /// Reject unsupported operators instead of ignoring them (`QUARRY_STRICT`)
    pub strict: bool,

    /// Override for the adapter's `_in` list chunk size (`QUARRY_MAX_IN_LIST`,
    /// `0` disables chunking)
    pub max_in_list: Option<Option<usize>>,

    /// Tracing filter directive (`QUARRY_LOG`)
    pub log_filter: String,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            adapter: AdapterId::Postgres,
            strict: false,
            max_in_list: None,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

impl CompilerConfig {
    /// Load `.env` (if present), then read the environment.
    pub fn load() -> Result<Self> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!(path = %path.display(), "Loaded .env file");
        }
        Self::from_env()
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();

        let adapter = match lookup("QUARRY_ADAPTER") {
            Some(name) => name
                .parse::<AdapterId>()
                .map_err(anyhow::Error::msg)
                .context("Invalid QUARRY_ADAPTER")?,
            None => defaults.adapter,
        };

        let strict = match lookup("QUARRY_STRICT") {
            Some(flag) => parse_flag(&flag).context("Invalid QUARRY_STRICT")?,
            None => defaults.strict,
        };

        let max_in_list = match lookup("QUARRY_MAX_IN_LIST") {
            Some(limit) => {
                let limit: usize = limit.trim().parse().context("Invalid QUARRY_MAX_IN_LIST")?;
                Some((limit > 0).then_some(limit))
            }
            None => defaults.max_in_list,
        };

        Ok(Self {
            adapter,
            strict,
            max_in_list,
            log_filter: lookup("QUARRY_LOG").unwrap_or(defaults.log_filter),
        })
    }

    /// The configured adapter with overrides applied.
    pub fn adapter(&self) -> Adapter {
        let mut adapter = Adapter::get(self.adapter).with_strict(self.strict);
        if let Some(limit) = self.max_in_list {
            adapter = adapter.with_max_in_list(limit);
        }
        adapter
    }
}

fn parse_flag(value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => anyhow::bail!("expected a boolean, got `{other}`"),
    }
}

/// Per-call switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompileOptions {
    /// Overrides the adapter's strictness for this call when set.
    pub strict: Option<bool>,
}

impl CompileOptions {
    pub fn strict() -> Self {
        Self { strict: Some(true) }
    }

    pub fn lenient() -> Self {
        Self { strict: Some(false) }
    }

    pub(crate) fn is_strict(&self, adapter: &Adapter) -> bool {
        self.strict.unwrap_or(adapter.capabilities().strict)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = CompilerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, CompilerConfig::default());
        assert_eq!(config.adapter().id(), AdapterId::Postgres);
    }

    #[test]
    fn test_overrides() {
        let config = CompilerConfig::from_lookup(lookup(&[
            ("QUARRY_ADAPTER", "sqlite"),
            ("QUARRY_STRICT", "yes"),
            ("QUARRY_MAX_IN_LIST", "0"),
            ("QUARRY_LOG", "quarry=trace"),
        ]))
        .unwrap();

        assert_eq!(config.adapter, AdapterId::Sqlite);
        assert!(config.strict);
        assert_eq!(config.log_filter, "quarry=trace");

        let adapter = config.adapter();
        assert!(adapter.capabilities().strict);
        assert_eq!(adapter.capabilities().max_in_list, None);
    }

    #[test]
    fn test_invalid_values_report_variable() {
        let err = CompilerConfig::from_lookup(lookup(&[("QUARRY_ADAPTER", "oracle")])).unwrap_err();
        assert!(err.to_string().contains("QUARRY_ADAPTER"));

        let err = CompilerConfig::from_lookup(lookup(&[("QUARRY_MAX_IN_LIST", "lots")])).unwrap_err();
        assert!(err.to_string().contains("QUARRY_MAX_IN_LIST"));
    }

    #[test]
    fn test_options_override_adapter() {
        let adapter = Adapter::get(AdapterId::Postgres).with_strict(false);
        assert!(CompileOptions::strict().is_strict(&adapter));
        assert!(!CompileOptions::default().is_strict(&adapter));
    }
}
