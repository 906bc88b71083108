use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::{Captures, Regex};
use serde_json::{Map, Value};

use super::types::AgentConfig;
use super::validation::validate_config;
use crate::core::errors::{AgentError, AgentResult};

pub const CONFIG_PATH_ENV: &str = "DOCS_AGENT_CONFIG_PATH";
pub const DEFAULT_CONFIG_PATH: &str = "configs/agent.yaml";

const REDACT_PLACEHOLDER: &str = "****";

const SENSITIVE_PATTERNS: [&str; 10] = [
    "api_key",
    "secret",
    "password",
    "_token",
    "token_",
    "credential",
    "private_key",
    "access_key",
    "bearer",
    "engine_id",
];

const SENSITIVE_WHITELIST: [&str; 4] = ["max_tokens", "tokens_per_minute", "token_count", "tokens"];

#[derive(Debug, Clone)]
pub struct ConfigService {
    path: PathBuf,
}

impl ConfigService {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Explicit path, then `DOCS_AGENT_CONFIG_PATH`, then `configs/agent.yaml`.
    pub fn resolve(explicit: Option<&Path>) -> Self {
        if let Some(path) = explicit {
            return Self::new(path);
        }
        if let Ok(path) = env::var(CONFIG_PATH_ENV) {
            return Self::new(path);
        }
        Self::new(DEFAULT_CONFIG_PATH)
    }

    pub fn config_path(&self) -> &Path {
        &self.path
    }

    /// Secrets live next to the public config and are merged over it.
    pub fn secrets_path(&self) -> PathBuf {
        self.path
            .parent()
            .map(|dir| dir.join("secrets.yaml"))
            .unwrap_or_else(|| PathBuf::from("secrets.yaml"))
    }

    pub fn load_value(&self) -> AgentResult<Value> {
        if !self.path.exists() {
            tracing::warn!(
                "Config file {} not found, using defaults",
                self.path.display()
            );
        }
        let public_config = load_yaml_file(&self.path)?;
        let secrets_config = load_yaml_file(&self.secrets_path())?;
        Ok(drop_unresolved_refs(
            deep_merge(&public_config, &secrets_config),
            "",
        ))
    }

    pub fn load(&self) -> AgentResult<AgentConfig> {
        let raw = self.load_value()?;
        validate_config(&raw)?;
        serde_json::from_value(raw).map_err(AgentError::config)
    }

    pub fn redact_sensitive_values(&self, value: &Value) -> Value {
        redact_sensitive_values(value)
    }
}

fn load_yaml_file(path: &Path) -> AgentResult<Value> {
    if !path.exists() {
        return Ok(Value::Object(Map::new()));
    }

    let contents = fs::read_to_string(path)?;
    let expanded = expand_env_vars(&contents);
    let value: Value = serde_yaml::from_str(&expanded)
        .map_err(|e| AgentError::Config(format!("{}: {}", path.display(), e)))?;
    match value {
        Value::Object(_) => Ok(value),
        Value::Null => Ok(Value::Object(Map::new())),
        _ => Err(AgentError::Config(format!(
            "{}: top level must be a mapping",
            path.display()
        ))),
    }
}

/// Replace `${VAR}` and `$VAR` with environment values; unknown variables stay as written.
pub fn expand_env_vars(input: &str) -> String {
    env_var_pattern()
        .replace_all(input, |caps: &Captures| {
            let name = caps
                .get(1)
                .or_else(|| caps.get(2))
                .map(|m| m.as_str())
                .unwrap_or_default();
            env::var(name).unwrap_or_else(|_| caps[0].to_string())
        })
        .into_owned()
}

fn env_var_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}|\$([A-Za-z_][A-Za-z0-9_]*)")
            .expect("env var pattern is valid")
    })
}

fn whole_ref_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^\s*(\$\{[A-Za-z_][A-Za-z0-9_]*\}|\$[A-Za-z_][A-Za-z0-9_]*)\s*$")
            .expect("reference pattern is valid")
    })
}

/// Remove entries whose whole value is a `${VAR}` / `$VAR` reference that
/// expansion could not resolve, so the field falls back to its default
/// (usually "not set") instead of carrying the literal reference.
fn drop_unresolved_refs(value: Value, path: &str) -> Value {
    match value {
        Value::Object(map) => {
            let mut kept = Map::new();
            for (key, val) in map {
                let field_path = if path.is_empty() {
                    key.clone()
                } else {
                    format!("{}.{}", path, key)
                };
                if let Value::String(text) = &val {
                    if whole_ref_pattern().is_match(text) {
                        tracing::warn!(
                            "Config '{}' references unset variable {}; treating it as unset",
                            field_path,
                            text.trim()
                        );
                        continue;
                    }
                }
                kept.insert(key, drop_unresolved_refs(val, &field_path));
            }
            Value::Object(kept)
        }
        other => other,
    }
}

fn deep_merge(base: &Value, override_value: &Value) -> Value {
    match (base, override_value) {
        (Value::Object(base_map), Value::Object(override_map)) => {
            let mut merged: Map<String, Value> = base_map.clone();
            for (key, value) in override_map {
                let merged_value = match merged.get(key) {
                    Some(existing) => deep_merge(existing, value),
                    None => value.clone(),
                };
                merged.insert(key.clone(), merged_value);
            }
            Value::Object(merged)
        }
        _ => override_value.clone(),
    }
}

fn redact_sensitive_values(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut redacted = Map::new();
            for (key, val) in map {
                if is_sensitive_key(key) && !val.is_null() {
                    redacted.insert(key.clone(), Value::String(REDACT_PLACEHOLDER.to_string()));
                } else {
                    redacted.insert(key.clone(), redact_sensitive_values(val));
                }
            }
            Value::Object(redacted)
        }
        Value::Array(items) => Value::Array(items.iter().map(redact_sensitive_values).collect()),
        _ => value.clone(),
    }
}

fn is_sensitive_key(key: &str) -> bool {
    let key_lower = key.to_lowercase();
    if SENSITIVE_WHITELIST
        .iter()
        .any(|allowed| *allowed == key_lower)
    {
        return false;
    }
    SENSITIVE_PATTERNS
        .iter()
        .any(|pattern| key_lower.contains(pattern))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn deep_merge_overrides_nested_scalars() {
        let base = json!({ "llm": { "base_url": "http://a", "api_key": null }, "offline": { "max_retries": 2 } });
        let secrets = json!({ "llm": { "api_key": "k" } });

        let merged = deep_merge(&base, &secrets);

        assert_eq!(
            merged,
            json!({ "llm": { "base_url": "http://a", "api_key": "k" }, "offline": { "max_retries": 2 } })
        );
    }

    #[test]
    fn redact_hides_keys_but_keeps_token_budgets() {
        let input = json!({
            "llm": { "api_key": "secret", "default": { "max_tokens": 1024 } },
            "rate_limit": { "tokens_per_minute": 1000 },
            "web_search": { "api_key": null }
        });

        let redacted = redact_sensitive_values(&input);

        assert_eq!(
            redacted,
            json!({
                "llm": { "api_key": "****", "default": { "max_tokens": 1024 } },
                "rate_limit": { "tokens_per_minute": 1000 },
                "web_search": { "api_key": null }
            })
        );
    }

    #[test]
    fn expand_env_vars_handles_both_forms_and_leaves_unknown() {
        env::set_var("DOCS_AGENT_TEST_KEY", "abc");
        let out = expand_env_vars("a: ${DOCS_AGENT_TEST_KEY}\nb: $DOCS_AGENT_TEST_KEY\nc: ${DOCS_AGENT_UNSET_VAR}");
        assert_eq!(out, "a: abc\nb: abc\nc: ${DOCS_AGENT_UNSET_VAR}");
    }

    #[test]
    fn load_merges_secrets_and_applies_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("agent.yaml");
        fs::write(
            &config_path,
            "llm:\n  base_url: http://localhost:1234/v1\noffline:\n  max_retries: 1\n",
        )
        .unwrap();
        fs::write(dir.path().join("secrets.yaml"), "llm:\n  api_key: sk-test\n").unwrap();

        let config = ConfigService::new(&config_path).load().unwrap();

        assert_eq!(config.llm.base_url, "http://localhost:1234/v1");
        assert_eq!(config.llm.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.offline.max_retries, 1);
        assert_eq!(config.retrieval.top_k, 5);
        assert_eq!(config.online.max_iterations, 6);
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = ConfigService::new(dir.path().join("nope.yaml"))
            .load()
            .unwrap();
        assert_eq!(config.offline.max_retries, 2);
        assert_eq!(config.web_search.provider, "tavily");
    }

    #[test]
    fn invalid_value_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("agent.yaml");
        fs::write(&config_path, "online:\n  max_iterations: 0\n").unwrap();

        let err = ConfigService::new(&config_path).load().unwrap_err();
        assert!(err.to_string().contains("online.max_iterations"));
    }

    #[test]
    fn unset_references_fall_back_to_defaults() {
        let raw = json!({
            "llm": { "api_key": "${DOCS_AGENT_NEVER_SET}", "base_url": "http://a" },
            "web_search": { "provider": "tavily", "api_key": "$DOCS_AGENT_NEVER_SET" }
        });

        let cleaned = drop_unresolved_refs(raw, "");

        assert_eq!(
            cleaned,
            json!({ "llm": { "base_url": "http://a" }, "web_search": { "provider": "tavily" } })
        );
    }

    #[test]
    fn shipped_config_without_keys_uses_duckduckgo() {
        env::remove_var("TAVILY_API_KEY");
        env::remove_var("GOOGLE_API_KEY");
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("configs/agent.yaml");

        let config = ConfigService::new(path).load().unwrap();

        assert_eq!(config.llm.api_key, None);
        assert_eq!(config.web_search.api_key, None);
        assert_eq!(
            crate::tools::search::SearchProvider::from_config(&config.web_search),
            crate::tools::search::SearchProvider::DuckDuckGo
        );
    }
}
