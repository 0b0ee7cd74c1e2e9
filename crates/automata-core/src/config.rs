use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AutomataError, Result};

/// Top-level Automata configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub relay: RelayConfig,
    #[serde(default)]
    pub log: LogConfig,
}

/// Workflow engine tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// How long a transient success/fail flash stays up before settling (ms).
    #[serde(default = "default_display_delay_ms")]
    pub display_delay_ms: u64,
    /// Deepest chain of nodes a single run may descend.
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
    /// Capacity of the workflow event broadcast channel.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            display_delay_ms: default_display_delay_ms(),
            max_depth: default_max_depth(),
            event_capacity: default_event_capacity(),
        }
    }
}

impl EngineConfig {
    pub fn display_delay(&self) -> Duration {
        Duration::from_millis(self.display_delay_ms)
    }
}

fn default_display_delay_ms() -> u64 { 1500 }
fn default_max_depth() -> usize { 64 }
fn default_event_capacity() -> usize { 256 }

/// Classifier service endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    #[serde(default = "default_classifier_url")]
    pub url: String,
    /// Per-request timeout. None = wait as long as the service does.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            url: default_classifier_url(),
            timeout_secs: None,
        }
    }
}

fn default_classifier_url() -> String { "http://127.0.0.1:3000/api/ai-decision".to_string() }

/// Relay service endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    #[serde(default = "default_relay_url")]
    pub url: String,
    /// Per-request timeout. None = wait as long as the service does.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            url: default_relay_url(),
            timeout_secs: None,
        }
    }
}

fn default_relay_url() -> String { "http://127.0.0.1:3000/api/relay".to_string() }

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// `tracing-subscriber` filter directive, overridden by `RUST_LOG`.
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
        }
    }
}

fn default_log_filter() -> String { "automata=info,warn".to_string() }

impl AppConfig {
    /// Load config from a TOML file, with env var expansion.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|_| AutomataError::ConfigNotFound(path.display().to_string()))?;

        Self::parse(&content)
    }

    /// Parse config from TOML text, with env var expansion.
    pub fn parse(content: &str) -> Result<Self> {
        // Expand ${ENV_VAR} references
        let expanded = expand_env_vars(content);

        let config: Self =
            toml::from_str(&expanded).map_err(|e| AutomataError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.engine.max_depth == 0 {
            return Err(AutomataError::Config(
                "engine.max_depth must be at least 1".into(),
            ));
        }
        if self.engine.event_capacity == 0 {
            return Err(AutomataError::Config(
                "engine.event_capacity must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Expand `${ENV_VAR}` patterns in a string.
fn expand_env_vars(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '$' && chars.peek() == Some(&'{') {
            chars.next(); // consume '{'
            let mut var_name = String::new();
            for c in chars.by_ref() {
                if c == '}' {
                    break;
                }
                var_name.push(c);
            }
            match std::env::var(&var_name) {
                Ok(val) => result.push_str(&val),
                Err(_) => {
                    // Keep original if env var not set
                    result.push_str(&format!("${{{}}}", var_name));
                }
            }
        } else {
            result.push(c);
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_env_vars() {
        std::env::set_var("TEST_AUTOMATA_VAR", "hello");
        let result = expand_env_vars("key = \"${TEST_AUTOMATA_VAR}\"");
        assert_eq!(result, "key = \"hello\"");
        std::env::remove_var("TEST_AUTOMATA_VAR");
    }

    #[test]
    fn test_expand_env_vars_missing() {
        let result = expand_env_vars("key = \"${NONEXISTENT_AUTOMATA_VAR}\"");
        assert_eq!(result, "key = \"${NONEXISTENT_AUTOMATA_VAR}\"");
    }

    #[test]
    fn test_defaults_from_empty_toml() {
        let config = AppConfig::parse("").unwrap();
        assert_eq!(config.engine.display_delay_ms, 1500);
        assert_eq!(config.engine.display_delay(), Duration::from_millis(1500));
        assert_eq!(config.engine.max_depth, 64);
        assert_eq!(config.engine.event_capacity, 256);
        assert!(config.classifier.url.ends_with("/api/ai-decision"));
        assert!(config.relay.url.ends_with("/api/relay"));
        assert!(config.classifier.timeout_secs.is_none());
        assert_eq!(config.log.filter, "automata=info,warn");
    }

    #[test]
    fn test_partial_engine_section() {
        let config = AppConfig::parse(
            r#"
[engine]
display_delay_ms = 10

[relay]
url = "https://relay.example/api"
timeout_secs = 90
"#,
        )
        .unwrap();
        assert_eq!(config.engine.display_delay_ms, 10);
        assert_eq!(config.engine.max_depth, 64);
        assert_eq!(config.relay.url, "https://relay.example/api");
        assert_eq!(config.relay.timeout_secs, Some(90));
    }

    #[test]
    fn test_rejects_zero_depth() {
        let err = AppConfig::parse("[engine]\nmax_depth = 0\n").unwrap_err();
        assert!(matches!(err, AutomataError::Config(_)));
    }

    #[test]
    fn test_rejects_malformed_toml() {
        let err = AppConfig::parse("[engine\n").unwrap_err();
        assert!(matches!(err, AutomataError::Config(_)));
    }
}
