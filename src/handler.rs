//! Lifecycle hooks and type erasure.
//!
//! # Two calling conventions, one future
//!
//! A hook either returns a future that resolves to the (possibly modified)
//! context, or takes a [`Done`] completion and calls it when it is finished,
//! possibly from another task. The pipeline should not care which, so both
//! are erased into the same shape at construction time:
//!
//! ```text
//! Hook::future(|ctx| async { Ok(ctx) })         Hook::callback(|ctx, done| done.ok(ctx))
//!        ↓                                               ↓
//! Arc<FutureHook<F>>                             Arc<CallbackHook<F>>
//!        ↓  stored as Arc<dyn ErasedHook>                ↓
//!        └──────── hook.call(ctx) → BoxFuture<'static, HookResult> ──┘
//! ```
//!
//! Each stage then has exactly one suspension point: awaiting that future.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::oneshot;

use crate::context::Context;
use crate::error::HookError;

/// A heap-allocated, type-erased future.
///
/// `Send` so the runtime may move a request's pipeline between worker threads.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// What every hook settles with.
pub type HookResult = Result<Context, HookError>;

trait ErasedHook: Send + Sync {
    fn call(&self, ctx: Context) -> BoxFuture<'static, HookResult>;
}

/// One lifecycle hook, cheap to clone and shared by every request that hits
/// the endpoint.
#[derive(Clone)]
pub struct Hook(Arc<dyn ErasedHook>);

impl Hook {
    /// A hook that returns a future:
    ///
    /// ```rust
    /// use solos::Hook;
    ///
    /// let hook = Hook::future(|mut ctx| async move {
    ///     ctx.state.insert("seen".into(), true.into());
    ///     Ok(ctx)
    /// });
    /// ```
    pub fn future<F, Fut>(f: F) -> Self
    where
        F: Fn(Context) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HookResult> + Send + 'static,
    {
        Self(Arc::new(FutureHook(f)))
    }

    /// A hook that reports through a completion:
    ///
    /// ```rust
    /// use solos::{Hook, HookError};
    ///
    /// let hook = Hook::callback(|ctx, done| {
    ///     if ctx.request().header("authorization").is_some() {
    ///         done.ok(ctx);
    ///     } else {
    ///         done.fail(HookError::new("missing credentials"));
    ///     }
    /// });
    /// ```
    pub fn callback<F>(f: F) -> Self
    where
        F: Fn(Context, Done) + Send + Sync + 'static,
    {
        Self(Arc::new(CallbackHook(f)))
    }

    pub(crate) fn call(&self, ctx: Context) -> BoxFuture<'static, HookResult> {
        self.0.call(ctx)
    }
}

impl fmt::Debug for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Hook")
    }
}

// ── Completion ────────────────────────────────────────────────────────────────

/// Completion handed to callback-style hooks. Consumed by whichever method
/// settles it, so a hook cannot complete twice.
///
/// Dropping it without settling fails the stage.
pub struct Done(oneshot::Sender<HookResult>);

impl Done {
    pub fn done(self, result: HookResult) {
        // The receiver only disappears if the pipeline itself was dropped.
        let _ = self.0.send(result);
    }

    pub fn ok(self, ctx: Context) {
        self.done(Ok(ctx));
    }

    pub fn fail(self, error: HookError) {
        self.done(Err(error));
    }
}

// ── Concrete wrappers ─────────────────────────────────────────────────────────

struct FutureHook<F>(F);

impl<F, Fut> ErasedHook for FutureHook<F>
where
    F: Fn(Context) -> Fut + Send + Sync,
    Fut: Future<Output = HookResult> + Send + 'static,
{
    fn call(&self, ctx: Context) -> BoxFuture<'static, HookResult> {
        Box::pin((self.0)(ctx))
    }
}

struct CallbackHook<F>(F);

impl<F> ErasedHook for CallbackHook<F>
where
    F: Fn(Context, Done) + Send + Sync,
{
    fn call(&self, ctx: Context) -> BoxFuture<'static, HookResult> {
        let (tx, rx) = oneshot::channel();
        (self.0)(ctx, Done(tx));
        Box::pin(async move {
            rx.await
                .unwrap_or_else(|_| Err(HookError::new("hook dropped its completion without settling it")))
        })
    }
}

#[cfg(test)]
mod tests {
    use http::Method;

    use super::*;
    use crate::request::Request;

    fn ctx() -> Context {
        Context::new(Request::new(Method::GET, "/")).0
    }

    #[tokio::test]
    async fn future_hook_resolves_with_context() {
        let hook = Hook::future(|mut ctx: Context| async move {
            ctx.state.insert("stage".into(), "future".into());
            Ok(ctx)
        });
        let ctx = hook.call(ctx()).await.unwrap();
        assert_eq!(ctx.state["stage"], "future");
    }

    #[tokio::test]
    async fn callback_hook_resolves_with_context() {
        let hook = Hook::callback(|mut ctx, done| {
            ctx.state.insert("stage".into(), "callback".into());
            done.ok(ctx);
        });
        let ctx = hook.call(ctx()).await.unwrap();
        assert_eq!(ctx.state["stage"], "callback");
    }

    #[tokio::test]
    async fn callback_may_settle_from_another_task() {
        let hook = Hook::callback(|ctx, done| {
            tokio::spawn(async move {
                tokio::task::yield_now().await;
                done.ok(ctx);
            });
        });
        assert!(hook.call(ctx()).await.is_ok());
    }

    #[tokio::test]
    async fn callback_failure_is_reported() {
        let hook = Hook::callback(|_ctx, done| done.fail(HookError::new("nope")));
        let err = hook.call(ctx()).await.unwrap_err();
        assert_eq!(err.message(), "nope");
    }

    #[tokio::test]
    async fn dropped_completion_fails_the_hook() {
        let hook = Hook::callback(|_ctx, _done| {});
        assert!(hook.call(ctx()).await.is_err());
    }
}
