//! Per-tick cancellation context.
//!
//! Every remote call of a tick runs through [`Context::run`]. Once the
//! context is cancelled the pending call is dropped and no later step runs.

use std::future::Future;

use tokio::sync::watch;

use crate::error::ProviderError;

/// Cancellation context handed to every provider entry point.
#[derive(Debug, Clone)]
pub struct Context {
    cancel: Option<watch::Receiver<bool>>,
}

/// Cancels every [`Context`] derived from it.
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }
}

impl Context {
    /// A context that is never cancelled.
    pub fn background() -> Self {
        Self { cancel: None }
    }

    /// A context plus the handle that cancels it.
    pub fn with_cancel() -> (Self, CancelHandle) {
        let (tx, rx) = watch::channel(false);
        (Self { cancel: Some(rx) }, CancelHandle { tx })
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// Resolves once cancelled. Never resolves for a background context or
    /// after the handle is dropped without cancelling.
    pub async fn cancelled(&self) {
        let Some(rx) = &self.cancel else {
            return std::future::pending().await;
        };
        let mut rx = rx.clone();
        let sender_dropped = rx.wait_for(|cancelled| *cancelled).await.is_err();
        if sender_dropped {
            std::future::pending::<()>().await;
        }
    }

    /// Run one step of a tick, aborting it if the context is cancelled.
    pub async fn run<F, T>(&self, step: &str, fut: F) -> Result<T, ProviderError>
    where
        F: Future<Output = T>,
    {
        if self.is_cancelled() {
            return Err(ProviderError::Cancelled(step.to_string()));
        }
        tokio::select! {
            biased;
            _ = self.cancelled() => Err(ProviderError::Cancelled(step.to_string())),
            out = fut => Ok(out),
        }
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::background()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_background_runs_to_completion() {
        let ctx = Context::background();
        let out = ctx.run("step", async { 7 }).await.unwrap();
        assert_eq!(out, 7);
        assert!(!ctx.is_cancelled());
    }

    #[tokio::test]
    async fn test_cancelled_context_skips_step() {
        let (ctx, handle) = Context::with_cancel();
        handle.cancel();

        let err = ctx.run("create", async { 1 }).await.unwrap_err();
        assert!(matches!(err, ProviderError::Cancelled(step) if step == "create"));
    }

    #[tokio::test]
    async fn test_cancel_interrupts_pending_step() {
        let (ctx, handle) = Context::with_cancel();
        let task = tokio::spawn(async move {
            ctx.run("slow", tokio::time::sleep(Duration::from_secs(30)))
                .await
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        handle.cancel();

        let out = tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(out, Err(ProviderError::Cancelled(_))));
    }
}
