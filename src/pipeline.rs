//! The request lifecycle.
//!
//! ```text
//! RECEIVED → VALIDATED → AUTHORIZED → (entities) → BEFORE → RESPOND → AFTER
//! ```
//!
//! Stages run one after another, each awaiting its hook before the next one
//! starts. A missing hook passes the context through untouched. The first
//! failing hook aborts the request: nothing after it runs, `after` included.
//!
//! `respond` is the one stage that cannot be skipped. If it is missing, or
//! returns without having sent a response, the pipeline ends with
//! [`Error::UnansweredRequest`] and the boundary answers with its default.
//! `after` only runs once a response has gone out, so its failure is reported
//! but can no longer change what the client received.

use std::fmt;

use tracing::{Instrument, error, trace, warn};

use crate::context::Context;
use crate::error::{Error, HookError};
use crate::module::Hooks;
use crate::registrar::Endpoint;

/// A lifecycle stage, in execution order.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Stage {
    Received,
    Validated,
    Authorized,
    Before,
    Respond,
    After,
}

impl Stage {
    pub const ORDER: [Stage; 6] = [
        Self::Received,
        Self::Validated,
        Self::Authorized,
        Self::Before,
        Self::Respond,
        Self::After,
    ];

    /// The export name of the hook that runs in this stage.
    pub fn hook_name(self) -> &'static str {
        match self {
            Self::Received   => "request_received",
            Self::Validated  => "validate",
            Self::Authorized => "authorize",
            Self::Before     => "before",
            Self::Respond    => "respond",
            Self::After      => "after",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.hook_name())
    }
}

/// How a request that got its response ended.
#[derive(Debug)]
pub enum Outcome {
    /// Every stage ran.
    Completed(Context),
    /// The response was sent, then `after` failed.
    AfterFailed(Error),
}

/// Runs `ctx` through the lifecycle of `endpoint`.
///
/// Returns once the last stage has settled. The response itself is delivered
/// earlier, through the context's [`Reply`](crate::Reply), as soon as
/// `respond` sends it.
pub async fn run(endpoint: &Endpoint, mut ctx: Context) -> Result<Outcome, Error> {
    let span = ctx.log().clone();
    ctx.attach(endpoint.service().clone());

    let result = lifecycle(endpoint, ctx).instrument(span).await;
    match &result {
        Ok(Outcome::AfterFailed(e)) => error!(route = %endpoint.route(), "{e}"),
        Err(e)                      => warn!(route = %endpoint.route(), "{e}"),
        Ok(Outcome::Completed(_))   => trace!(route = %endpoint.route(), "lifecycle complete"),
    }
    result
}

async fn lifecycle(endpoint: &Endpoint, mut ctx: Context) -> Result<Outcome, Error> {
    let hooks = endpoint.module().hooks();

    for stage in [Stage::Received, Stage::Validated, Stage::Authorized] {
        ctx = step(hooks, stage, ctx).await?;
    }

    // `before` and `respond` may read entities, so they are bound first.
    for bound in endpoint.entities() {
        let Some(entity) = bound.module().entity_fn() else {
            trace!(entity = %bound.binding().name, "entity file exports nothing to bind");
            continue;
        };
        let value = entity(ctx.shared_request()).await.map_err(|source| abort(Stage::Before, source))?;
        ctx.entities.insert(bound.binding().name.clone(), value);
    }

    ctx = step(hooks, Stage::Before, ctx).await?;

    let Some(respond) = hooks.get(Stage::Respond) else {
        return Err(Error::UnansweredRequest);
    };
    ctx = respond.call(ctx).await.map_err(|source| abort(Stage::Respond, source))?;
    if !ctx.is_sent() {
        return Err(Error::UnansweredRequest);
    }
    trace!(stage = %Stage::Respond, "response sent");

    match hooks.get(Stage::After) {
        None => Ok(Outcome::Completed(ctx)),
        Some(after) => match after.call(ctx).await {
            Ok(ctx)     => Ok(Outcome::Completed(ctx)),
            Err(source) => Ok(Outcome::AfterFailed(Error::PostResponseFailure { source })),
        },
    }
}

async fn step(hooks: &Hooks, stage: Stage, ctx: Context) -> Result<Context, Error> {
    let Some(hook) = hooks.get(stage) else {
        return Ok(ctx);
    };
    let ctx = hook.call(ctx).await.map_err(|source| abort(stage, source))?;
    trace!(%stage, "stage complete");
    Ok(ctx)
}

fn abort(stage: Stage, source: HookError) -> Error {
    Error::LifecycleAbort { stage, source }
}
