use std::future::Future;
use std::time::Duration;

use crate::core::config::types::AgentSettings;
use crate::core::errors::{AgentError, AgentResult};
use crate::graph::GraphError;

/// Step-local attempt budget for collaborator calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttemptPolicy {
    pub attempts: u32,
    pub backoff: Duration,
}

impl AttemptPolicy {
    pub fn new(attempts: u32, backoff: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            backoff,
        }
    }

    pub fn from_settings(settings: &AgentSettings) -> Self {
        Self::new(
            settings.collaborator_attempts,
            Duration::from_millis(settings.retry_backoff_ms),
        )
    }
}

impl Default for AttemptPolicy {
    fn default() -> Self {
        Self::from_settings(&AgentSettings::default())
    }
}

/// Run `op` until it succeeds, fails permanently, or the budget is spent.
///
/// Back-off grows linearly with the attempt number.
pub async fn with_attempts<T, F, Fut>(policy: AttemptPolicy, what: &str, mut op: F) -> AgentResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = AgentResult<T>>,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && attempt < policy.attempts => {
                tracing::warn!(
                    "{} failed (attempt {}/{}): {}",
                    what,
                    attempt,
                    policy.attempts,
                    err
                );
                tokio::time::sleep(policy.backoff * attempt).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

/// A collaborator failure that ends the run, attributed to the step that made the call.
pub fn step_failure(node_id: &str, err: AgentError) -> GraphError {
    GraphError::new(node_id, err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn retries_transient_errors_until_success() {
        let calls = AtomicU32::new(0);
        let policy = AttemptPolicy::new(3, Duration::ZERO);

        let result = with_attempts(policy, "llm", || async {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            if n < 2 {
                Err(AgentError::Llm("503".to_string()))
            } else {
                Ok(n)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_budget() {
        let calls = AtomicU32::new(0);
        let policy = AttemptPolicy::new(2, Duration::ZERO);

        let result: AgentResult<()> = with_attempts(policy, "retrieval", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(AgentError::Retrieval("down".to_string()))
        })
        .await;

        assert!(matches!(result, Err(AgentError::Retrieval(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn permanent_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let policy = AttemptPolicy::new(5, Duration::ZERO);

        let result: AgentResult<()> = with_attempts(policy, "config", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(AgentError::Config("bad".to_string()))
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
