// §4.5 "the orchestrator uses an independent context whose cancellation is
// not bound to the HTTP request lifecycle; it is cancelled only on
// explicit session stop, explicit orchestrator timeout, or terminal state."
//
// conduit-api must hand orchestrators one of these instead of deriving
// cancellation from the axum request future — dropping the HTTP connection
// must not tear down an in-flight orchestrator run.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

#[derive(Clone)]
pub struct OrchestratorContext {
    token: CancellationToken,
}

impl OrchestratorContext {
    pub fn new() -> Self {
        Self { token: CancellationToken::new() }
    }

    /// Explicit session stop (§6 `POST /api/session/stop`).
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn child(&self) -> Self {
        Self { token: self.token.child_token() }
    }

    /// Cancels after `timeout` elapses unless the context is cancelled or
    /// dropped first — the "explicit orchestrator timeout" cancellation
    /// reason.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        let token = self.token.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(timeout) => token.cancel(),
                _ = token.cancelled() => {}
            }
        });
        self
    }

    pub async fn cancelled(&self) {
        self.token.cancelled().await;
    }
}

impl Default for OrchestratorContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn explicit_cancel_is_observed() {
        let ctx = OrchestratorContext::new();
        assert!(!ctx.is_cancelled());
        ctx.cancel();
        assert!(ctx.is_cancelled());
    }

    #[tokio::test]
    async fn child_context_observes_parent_cancellation() {
        let parent = OrchestratorContext::new();
        let child = parent.child();
        parent.cancel();
        assert!(child.is_cancelled());
    }

    #[tokio::test]
    async fn timeout_cancels_without_explicit_stop() {
        let ctx = OrchestratorContext::new().with_timeout(Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(ctx.is_cancelled());
    }
}
