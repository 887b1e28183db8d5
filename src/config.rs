//! # Configuration Module
//!
//! Settings the CLI reads from the environment (and a `.env` file).
//! Command-line flags cover the per-run values; everything about providers,
//! persistence and tracing lives here.

use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;

// =============================================================================
// CONFIGURATION STRUCT
// =============================================================================
/// Application configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    /// OpenAI model used by every generator (default: gpt-4o)
    pub openai_model: String,

    /// Sampling temperature; 0.0 keeps interviews reproducible
    pub openai_temperature: f64,

    /// Enables web search when set
    pub tavily_api_key: Option<String>,

    pub tavily_max_results: u32,

    pub wikipedia_max_docs: u32,

    /// Directory for suspended runs. In-memory when unset.
    pub run_dir: Option<PathBuf>,

    /// zstd-compress saved runs
    pub run_compression: bool,

    /// Directory for LLM request/response traces. Traces only go to the
    /// log when unset.
    pub trace_dir: Option<PathBuf>,

    pub log_level: String,
}

// =============================================================================
// DEFAULT IMPLEMENTATION
// =============================================================================
impl Default for AppConfig {
    fn default() -> Self {
        Self {
            openai_model: "gpt-4o".to_string(),
            openai_temperature: 0.0,
            tavily_api_key: None,
            tavily_max_results: 3,
            wikipedia_max_docs: 2,
            run_dir: None,
            run_compression: false,
            trace_dir: None,
            log_level: "info".to_string(),
        }
    }
}

// =============================================================================
// CONFIGURATION LOADING
// =============================================================================
impl AppConfig {
    /// Load configuration from environment variables, after `.env`.
    pub fn from_env() -> Result<Self> {
        // A missing .env file is fine
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup; `from_env` passes the process environment.
    ///
    /// # Rust Concept: Generic closures
    /// `impl Fn(&str) -> Option<String>` accepts any closure with that
    /// shape, so tests can pass a HashMap lookup instead of mutating the
    /// real environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = AppConfig::default();

        if let Some(val) = lookup("OPENAI_MODEL") {
            config.openai_model = val;
        }

        if let Some(val) = lookup("OPENAI_TEMPERATURE") {
            config.openai_temperature = val
                .parse()
                .context("OPENAI_TEMPERATURE must be a valid floating-point number (e.g., 0.0)")?;
        }

        config.tavily_api_key = lookup("TAVILY_API_KEY").filter(|key| !key.trim().is_empty());

        if let Some(val) = lookup("TAVILY_MAX_RESULTS") {
            config.tavily_max_results = val
                .parse()
                .context("TAVILY_MAX_RESULTS must be a valid positive integer")?;
        }

        if let Some(val) = lookup("WIKIPEDIA_MAX_DOCS") {
            config.wikipedia_max_docs = val
                .parse()
                .context("WIKIPEDIA_MAX_DOCS must be a valid positive integer")?;
        }

        config.run_dir = lookup("RESEARCH_RUN_DIR")
            .filter(|dir| !dir.trim().is_empty())
            .map(PathBuf::from);

        if let Some(val) = lookup("RESEARCH_RUN_COMPRESSION") {
            config.run_compression = parse_flag(&val)
                .with_context(|| format!("RESEARCH_RUN_COMPRESSION must be true or false, got: {}", val))?;
        }

        config.trace_dir = lookup("LLM_TRACE_DIR")
            .filter(|dir| !dir.trim().is_empty())
            .map(PathBuf::from);

        if let Some(val) = lookup("RUST_LOG") {
            config.log_level = val;
        }

        Ok(config)
    }

    /// Validate the configuration before anything is built from it.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=2.0).contains(&self.openai_temperature) {
            anyhow::bail!(
                "OPENAI_TEMPERATURE must be between 0.0 and 2.0, got: {}",
                self.openai_temperature
            );
        }

        if !(1..=20).contains(&self.tavily_max_results) {
            anyhow::bail!(
                "TAVILY_MAX_RESULTS must be between 1 and 20, got: {}",
                self.tavily_max_results
            );
        }

        if self.wikipedia_max_docs == 0 {
            anyhow::bail!("WIKIPEDIA_MAX_DOCS must be at least 1");
        }

        if self.openai_model.trim().is_empty() {
            anyhow::bail!("OPENAI_MODEL cannot be empty");
        }

        Ok(())
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

// =============================================================================
// UNIT TESTS
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();

        assert_eq!(config.openai_model, "gpt-4o");
        assert_eq!(config.openai_temperature, 0.0);
        assert_eq!(config.tavily_max_results, 3);
        assert_eq!(config.wikipedia_max_docs, 2);
        assert!(config.run_dir.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_from_lookup() {
        let config = AppConfig::from_lookup(lookup_from(&[
            ("OPENAI_MODEL", "gpt-4o-mini"),
            ("OPENAI_TEMPERATURE", "0.3"),
            ("TAVILY_API_KEY", "tvly-key"),
            ("TAVILY_MAX_RESULTS", "7"),
            ("RESEARCH_RUN_DIR", "/tmp/runs"),
            ("RESEARCH_RUN_COMPRESSION", "yes"),
            ("LLM_TRACE_DIR", ""),
        ]))
        .unwrap();

        assert_eq!(config.openai_model, "gpt-4o-mini");
        assert!((config.openai_temperature - 0.3).abs() < f64::EPSILON);
        assert_eq!(config.tavily_api_key.as_deref(), Some("tvly-key"));
        assert_eq!(config.tavily_max_results, 7);
        assert_eq!(config.run_dir, Some(PathBuf::from("/tmp/runs")));
        assert!(config.run_compression);
        assert!(config.trace_dir.is_none());
    }

    #[test]
    fn test_config_rejects_bad_values() {
        let err = AppConfig::from_lookup(lookup_from(&[("OPENAI_TEMPERATURE", "warm")])).unwrap_err();
        assert!(err.to_string().contains("OPENAI_TEMPERATURE"));
        assert!(AppConfig::from_lookup(lookup_from(&[("RESEARCH_RUN_COMPRESSION", "maybe")])).is_err());
    }

    #[test]
    fn test_config_validation_ranges() {
        let mut config = AppConfig::default();
        config.openai_temperature = 3.0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.tavily_max_results = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.wikipedia_max_docs = 0;
        assert!(config.validate().is_err());
    }
}
