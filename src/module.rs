//! What a service file exports.
//!
//! A [`Module`] is the in-process stand-in for a loaded service file: up to
//! six lifecycle hooks, any of the six CRUD calls, and, for entity files, an
//! `entity` export that produces the value bound into each request.
//!
//! ```rust
//! use solos::{Call, CallArgs, Hook, HookError, Module};
//! use serde_json::json;
//!
//! let users = Module::new()
//!     .call(Call::Get, |args, log| async move {
//!         log.debug("loading user");
//!         Ok(json!({ "id": args.id }))
//!     })
//!     .respond(Hook::future(|mut ctx| async move {
//!         let id = ctx.request().param("usersId").map(str::to_owned);
//!         let user = ctx.service().call(Call::Get, CallArgs::id(id)).await?;
//!         ctx.send(user);
//!         Ok::<_, HookError>(ctx)
//!     }));
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::error::HookError;
use crate::handler::{BoxFuture, Hook};
use crate::pipeline::Stage;
use crate::registrar::CallLog;
use crate::request::Request;

// ── Calls ─────────────────────────────────────────────────────────────────────

/// The CRUD calls a module may export.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Call {
    Remove,
    Get,
    Find,
    Patch,
    Create,
    Update,
}

impl Call {
    pub const ALL: [Call; 6] = [Self::Remove, Self::Get, Self::Find, Self::Patch, Self::Create, Self::Update];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Remove => "remove",
            Self::Get    => "get",
            Self::Find   => "find",
            Self::Patch  => "patch",
            Self::Create => "create",
            Self::Update => "update",
        }
    }
}

impl fmt::Display for Call {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Arguments of a CRUD call. Which fields matter depends on the call:
/// `get`/`remove` read `id`, `create` reads `data`, `update`/`patch` read both.
#[derive(Clone, Debug, Default)]
pub struct CallArgs {
    pub id: Option<String>,
    pub data: Option<Value>,
    pub params: Map<String, Value>,
}

impl CallArgs {
    pub fn id(id: Option<String>) -> Self {
        Self { id, ..Self::default() }
    }

    pub fn data(data: Value) -> Self {
        Self { data: Some(data), ..Self::default() }
    }
}

pub type CallResult = Result<Value, HookError>;

pub(crate) type RawCall = Arc<dyn Fn(CallArgs, CallLog) -> BoxFuture<'static, CallResult> + Send + Sync>;
pub(crate) type EntityFn = Arc<dyn Fn(Arc<Request>) -> BoxFuture<'static, Result<Value, HookError>> + Send + Sync>;

// ── Hooks ─────────────────────────────────────────────────────────────────────

/// The lifecycle hooks a module exports. Every slot is optional here; a
/// missing `respond` only matters once a request arrives.
#[derive(Clone, Debug, Default)]
pub struct Hooks {
    request_received: Option<Hook>,
    validate: Option<Hook>,
    authorize: Option<Hook>,
    before: Option<Hook>,
    respond: Option<Hook>,
    after: Option<Hook>,
}

impl Hooks {
    pub fn get(&self, stage: Stage) -> Option<&Hook> {
        self.slot(stage).as_ref()
    }

    fn slot_mut(&mut self, stage: Stage) -> &mut Option<Hook> {
        match stage {
            Stage::Received   => &mut self.request_received,
            Stage::Validated  => &mut self.validate,
            Stage::Authorized => &mut self.authorize,
            Stage::Before     => &mut self.before,
            Stage::Respond    => &mut self.respond,
            Stage::After      => &mut self.after,
        }
    }

    fn slot(&self, stage: Stage) -> &Option<Hook> {
        match stage {
            Stage::Received   => &self.request_received,
            Stage::Validated  => &self.validate,
            Stage::Authorized => &self.authorize,
            Stage::Before     => &self.before,
            Stage::Respond    => &self.respond,
            Stage::After      => &self.after,
        }
    }
}

// ── Module ────────────────────────────────────────────────────────────────────

/// Export table of one service or entity file.
#[derive(Clone, Default)]
pub struct Module {
    hooks: Hooks,
    calls: BTreeMap<Call, RawCall>,
    entity: Option<EntityFn>,
}

impl Module {
    pub fn new() -> Self {
        Self::default()
    }

    /// Exports `hook` for `stage`, replacing any earlier one.
    pub fn hook(mut self, stage: Stage, hook: Hook) -> Self {
        *self.hooks.slot_mut(stage) = Some(hook);
        self
    }

    pub fn request_received(self, hook: Hook) -> Self { self.hook(Stage::Received, hook) }
    pub fn validate(self, hook: Hook) -> Self { self.hook(Stage::Validated, hook) }
    pub fn authorize(self, hook: Hook) -> Self { self.hook(Stage::Authorized, hook) }
    pub fn before(self, hook: Hook) -> Self { self.hook(Stage::Before, hook) }
    pub fn respond(self, hook: Hook) -> Self { self.hook(Stage::Respond, hook) }
    pub fn after(self, hook: Hook) -> Self { self.hook(Stage::After, hook) }

    /// Exports a CRUD call. The last argument is the call logger the
    /// registrar supplies on every invocation.
    pub fn call<F, Fut>(mut self, call: Call, f: F) -> Self
    where
        F: Fn(CallArgs, CallLog) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = CallResult> + Send + 'static,
    {
        let raw: RawCall = Arc::new(move |args: CallArgs, log: CallLog| -> BoxFuture<'static, CallResult> {
            Box::pin(f(args, log))
        });
        self.calls.insert(call, raw);
        self
    }

    /// Exports the value an entity file binds into each request.
    pub fn entity<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Arc<Request>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, HookError>> + Send + 'static,
    {
        let entity: EntityFn = Arc::new(move |req: Arc<Request>| -> BoxFuture<'static, Result<Value, HookError>> {
            Box::pin(f(req))
        });
        self.entity = Some(entity);
        self
    }

    pub fn hooks(&self) -> &Hooks { &self.hooks }

    pub fn has_call(&self, call: Call) -> bool {
        self.calls.contains_key(&call)
    }

    pub fn is_entity(&self) -> bool {
        self.entity.is_some()
    }

    /// Names of everything exported, hooks first, in lifecycle order.
    pub fn exports(&self) -> Vec<&'static str> {
        let hooks = Stage::ORDER.into_iter()
            .filter(|stage| self.hooks.get(*stage).is_some())
            .map(Stage::hook_name);
        let calls = self.calls.keys().map(|call| call.as_str());
        let entity = self.entity.iter().map(|_| "entity");
        hooks.chain(calls).chain(entity).collect()
    }

    pub(crate) fn raw_calls(&self) -> impl Iterator<Item = (Call, &RawCall)> {
        self.calls.iter().map(|(call, raw)| (*call, raw))
    }

    pub(crate) fn entity_fn(&self) -> Option<&EntityFn> {
        self.entity.as_ref()
    }
}

impl fmt::Debug for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Module").field("exports", &self.exports()).finish()
    }
}
