use crate::error::QueryEvaluationError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Cancellation handle for one query evaluation.
///
/// Operators check the token at every produced row (and at every frontier
/// expansion for property paths and `DESCRIBE`). Clones share state: firing
/// any clone stops the evaluation.
///
/// ```
/// use sparexec::QueryToken;
///
/// let token = QueryToken::new();
/// let observer = token.clone();
/// token.cancel();
/// assert!(observer.check().is_err());
/// ```
#[derive(Clone, Debug, Default)]
pub struct QueryToken {
    inner: Arc<TokenInner>,
}

#[derive(Debug, Default)]
struct TokenInner {
    cancelled: AtomicBool,
    deadline: Option<(Instant, Duration)>,
}

impl QueryToken {
    /// A token that only fires on explicit [`QueryToken::cancel`].
    pub fn new() -> Self {
        Self::default()
    }

    /// A token that also fires once `timeout` has elapsed.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            inner: Arc::new(TokenInner {
                cancelled: AtomicBool::new(false),
                deadline: Some((Instant::now() + timeout, timeout)),
            }),
        }
    }

    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Relaxed)
    }

    /// Errors with `Cancelled` or `Timeout` if the token has fired.
    pub fn check(&self) -> Result<(), QueryEvaluationError> {
        if self.inner.cancelled.load(Ordering::Relaxed) {
            return Err(QueryEvaluationError::Cancelled);
        }
        if let Some((deadline, timeout)) = self.inner.deadline {
            if Instant::now() >= deadline {
                return Err(QueryEvaluationError::Timeout(timeout));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_tokens_pass() {
        assert!(QueryToken::new().check().is_ok());
    }

    #[test]
    fn cancellation_is_shared_between_clones() {
        let token = QueryToken::new();
        let clone = token.clone();
        clone.cancel();
        assert!(matches!(
            token.check(),
            Err(QueryEvaluationError::Cancelled)
        ));
    }

    #[test]
    fn elapsed_deadline_fires() {
        let token = QueryToken::with_timeout(Duration::ZERO);
        assert!(matches!(
            token.check(),
            Err(QueryEvaluationError::Timeout(_))
        ));
    }
}
