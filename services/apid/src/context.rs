//! Per-request context threaded through every store call.
//!
//! # Purpose
//! Carries the authenticated principal and a cancellation token. The HTTP layer
//! cancels the token when the handler future is dropped (client disconnect or
//! request timeout), and [`RequestContext::run`] aborts in-flight store work
//! when that happens.
use crate::auth::principal::Principal;
use crate::store::{StoreError, StoreResult};
use std::future::Future;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
pub struct RequestContext {
    principal: Principal,
    cancel: CancellationToken,
}

impl RequestContext {
    pub fn new(principal: Principal) -> Self {
        Self::with_cancellation(principal, CancellationToken::new())
    }

    pub fn with_cancellation(principal: Principal, cancel: CancellationToken) -> Self {
        Self { principal, cancel }
    }

    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Fail fast if the request has already been cancelled.
    pub fn check_cancelled(&self) -> StoreResult<()> {
        if self.cancel.is_cancelled() {
            return Err(StoreError::Cancelled);
        }
        Ok(())
    }

    /// Drive a store future, abandoning it as soon as the request is cancelled.
    pub async fn run<T, F>(&self, fut: F) -> StoreResult<T>
    where
        F: Future<Output = StoreResult<T>>,
    {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(StoreError::Cancelled),
            result = fut => result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn run_returns_store_result_when_not_cancelled() {
        let ctx = RequestContext::new(Principal::new("tester", Vec::new()));
        let value = ctx.run(async { Ok::<_, StoreError>(7) }).await.expect("value");
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn run_aborts_pending_future_on_cancel() {
        let ctx = RequestContext::new(Principal::new("tester", Vec::new()));
        let token = ctx.cancellation().clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            token.cancel();
        });
        let result = ctx
            .run(async {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok::<_, StoreError>(())
            })
            .await;
        assert!(matches!(result, Err(StoreError::Cancelled)));
    }

    #[test]
    fn check_cancelled_reflects_token() {
        let ctx = RequestContext::new(Principal::new("tester", Vec::new()));
        assert!(ctx.check_cancelled().is_ok());
        ctx.cancellation().cancel();
        assert!(ctx.is_cancelled());
        assert!(matches!(ctx.check_cancelled(), Err(StoreError::Cancelled)));
    }
}
