use serde_json::{Map, Value};

use crate::core::errors::AgentError;

const WEB_SEARCH_PROVIDERS: [&str; 4] = ["tavily", "brave", "google", "duckduckgo"];

pub fn validate_config(config: &Value) -> Result<(), AgentError> {
    let root = config
        .as_object()
        .ok_or_else(|| config_type_error("root", "object"))?;

    if let Some(llm) = expect_optional_object(root, "llm")? {
        validate_optional_string_field(llm, "llm.base_url", "base_url")?;
        validate_optional_string_field(llm, "llm.api_key", "api_key")?;
        validate_u64_field(llm, "llm.timeout_secs", "timeout_secs", 1, 3_600)?;
        for purpose in ["default", "generate", "evaluate", "reformulate"] {
            if let Some(settings) = expect_optional_object(llm, purpose)? {
                let prefix = format!("llm.{}", purpose);
                validate_optional_string_field(settings, &format!("{}.model", prefix), "model")?;
                validate_f64_field(
                    settings,
                    &format!("{}.temperature", prefix),
                    "temperature",
                    0.0,
                    2.0,
                )?;
                validate_u64_field(
                    settings,
                    &format!("{}.max_tokens", prefix),
                    "max_tokens",
                    1,
                    1_000_000,
                )?;
            }
        }
    }

    if let Some(rate_limit) = expect_optional_object(root, "rate_limit")? {
        validate_bool_field(rate_limit, "rate_limit.enabled", "enabled")?;
        validate_u64_field(
            rate_limit,
            "rate_limit.requests_per_minute",
            "requests_per_minute",
            1,
            u32::MAX as u64,
        )?;
        validate_u64_field(
            rate_limit,
            "rate_limit.tokens_per_minute",
            "tokens_per_minute",
            1,
            u32::MAX as u64,
        )?;
    }

    if let Some(retrieval) = expect_optional_object(root, "retrieval")? {
        validate_optional_string_field(retrieval, "retrieval.store_path", "store_path")?;
        validate_optional_string_field(retrieval, "retrieval.collection_name", "collection_name")?;
        validate_optional_string_field(retrieval, "retrieval.embedding_model", "embedding_model")?;
        validate_u64_field(
            retrieval,
            "retrieval.embedding_dimension",
            "embedding_dimension",
            1,
            65_536,
        )?;
        validate_u64_field(retrieval, "retrieval.top_k", "top_k", 1, 100)?;
    }

    if let Some(web_search) = expect_optional_object(root, "web_search")? {
        if let Some(provider) = web_search.get("provider") {
            let Some(name) = provider.as_str() else {
                return Err(config_type_error("web_search.provider", "string"));
            };
            if !WEB_SEARCH_PROVIDERS.contains(&name) {
                return Err(AgentError::Config(format!(
                    "Invalid config at 'web_search.provider': expected one of {}",
                    WEB_SEARCH_PROVIDERS.join(", ")
                )));
            }
        }
        validate_optional_string_field(web_search, "web_search.api_key", "api_key")?;
        validate_optional_string_field(
            web_search,
            "web_search.google_engine_id",
            "google_engine_id",
        )?;
        validate_u64_field(web_search, "web_search.max_results", "max_results", 1, 20)?;
        validate_u64_field(web_search, "web_search.timeout_secs", "timeout_secs", 1, 600)?;
    }

    if let Some(offline) = expect_optional_object(root, "offline")? {
        validate_u64_field(offline, "offline.max_retries", "max_retries", 0, 10)?;
    }

    if let Some(online) = expect_optional_object(root, "online")? {
        validate_u64_field(online, "online.max_iterations", "max_iterations", 1, 100)?;
    }

    if let Some(agent) = expect_optional_object(root, "agent")? {
        validate_u64_field(
            agent,
            "agent.collaborator_attempts",
            "collaborator_attempts",
            1,
            10,
        )?;
        validate_u64_field(agent, "agent.retry_backoff_ms", "retry_backoff_ms", 0, 60_000)?;
        validate_optional_string_field(agent, "agent.prompts_dir", "prompts_dir")?;
    }

    if let Some(logging) = expect_optional_object(root, "logging")? {
        validate_optional_string_field(logging, "logging.log_dir", "log_dir")?;
    }

    Ok(())
}

fn expect_optional_object<'a>(
    root: &'a Map<String, Value>,
    key: &str,
) -> Result<Option<&'a Map<String, Value>>, AgentError> {
    match root.get(key) {
        Some(Value::Object(map)) => Ok(Some(map)),
        Some(Value::Null) | None => Ok(None),
        Some(_) => Err(config_type_error(key, "object")),
    }
}

fn validate_bool_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
) -> Result<(), AgentError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    if value.as_bool().is_some() {
        return Ok(());
    }
    Err(config_type_error(path, "boolean"))
}

fn validate_u64_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
    min: u64,
    max: u64,
) -> Result<(), AgentError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    let Some(number) = value.as_u64() else {
        return Err(config_type_error(path, "integer"));
    };
    if number < min || number > max {
        return Err(AgentError::Config(format!(
            "Invalid config at '{}': must be between {} and {}",
            path, min, max
        )));
    }
    Ok(())
}

fn validate_f64_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
    min: f64,
    max: f64,
) -> Result<(), AgentError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    let Some(number) = value.as_f64() else {
        return Err(config_type_error(path, "number"));
    };
    if number < min || number > max {
        return Err(AgentError::Config(format!(
            "Invalid config at '{}': must be between {} and {}",
            path, min, max
        )));
    }
    Ok(())
}

fn validate_optional_string_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
) -> Result<(), AgentError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    if value.is_null() || value.as_str().is_some() {
        return Ok(());
    }
    Err(config_type_error(path, "string"))
}

fn config_type_error(path: &str, expected: &str) -> AgentError {
    AgentError::Config(format!(
        "Invalid config at '{}': expected {}",
        path, expected
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accepts_empty_and_full_configs() {
        assert!(validate_config(&json!({})).is_ok());
        assert!(validate_config(&json!({
            "llm": { "base_url": "http://localhost:1234/v1", "default": { "temperature": 0.2, "max_tokens": 512 } },
            "retrieval": { "top_k": 8 },
            "web_search": { "provider": "duckduckgo", "max_results": 3 },
            "offline": { "max_retries": 2 },
            "online": { "max_iterations": 3 },
            "agent": { "collaborator_attempts": 3 }
        }))
        .is_ok());
    }

    #[test]
    fn rejects_wrong_types_with_dotted_path() {
        let err = validate_config(&json!({ "retrieval": { "top_k": "five" } })).unwrap_err();
        assert_eq!(
            err.to_string(),
            "configuration error: Invalid config at 'retrieval.top_k': expected integer"
        );

        let err = validate_config(&json!({ "llm": { "evaluate": { "temperature": 5.0 } } }))
            .unwrap_err();
        assert!(err.to_string().contains("llm.evaluate.temperature"));
    }

    #[test]
    fn rejects_unknown_search_provider() {
        let err = validate_config(&json!({ "web_search": { "provider": "altavista" } }))
            .unwrap_err();
        assert!(err.to_string().contains("web_search.provider"));
    }

    #[test]
    fn rejects_non_object_section() {
        assert!(validate_config(&json!({ "offline": 3 })).is_err());
    }
}
