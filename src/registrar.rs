//! Turns discovered files into endpoints.
//!
//! For every file, in discovery order, the registrar resolves its module
//! through the [`Dispatcher`], derives the route from its path, and wraps
//! its CRUD calls so each invocation is handed a call logger. The wrapped
//! calls live on the new [`Endpoint`]; the loaded module is left as it was,
//! so registering the same module twice wraps each call exactly once.
//!
//! Entity files do not become endpoints. Each one is bound to every endpoint
//! in its own directory or below it.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use http::StatusCode;
use tracing::{Span, debug, trace};

use crate::discover::Discovered;
use crate::dispatcher::{DispatchMessage, Dispatcher, Target};
use crate::error::{Error, HookError};
use crate::handler::BoxFuture;
use crate::method::Verb;
use crate::module::{Call, CallArgs, CallResult, Module, RawCall};
use crate::route::RouteTemplate;
use crate::scanner::Scanner;

// ── Call loggers ──────────────────────────────────────────────────────────────

/// Hands out the logger appended to every CRUD invocation.
pub trait Loggers: Send + Sync + 'static {
    fn logger(&self, call: Call) -> CallLog;
}

/// Default [`Loggers`]: one `solos.call` span per invocation, named after
/// the call.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingLoggers;

impl Loggers for TracingLoggers {
    fn logger(&self, call: Call) -> CallLog {
        CallLog::new(call, tracing::debug_span!("solos.call", call = %call))
    }
}

/// Logger handed to a CRUD call as its last argument.
#[derive(Clone, Debug)]
pub struct CallLog {
    call: Call,
    span: Span,
}

impl CallLog {
    pub fn new(call: Call, span: Span) -> Self {
        Self { call, span }
    }

    pub fn call(&self) -> Call { self.call }
    pub fn span(&self) -> &Span { &self.span }

    pub fn debug(&self, message: &str) {
        debug!(parent: &self.span, call = %self.call, "{message}");
    }

    pub fn trace(&self, message: &str) {
        trace!(parent: &self.span, call = %self.call, "{message}");
    }
}

// ── Service ───────────────────────────────────────────────────────────────────

type InstrumentedCall = Arc<dyn Fn(CallArgs) -> BoxFuture<'static, CallResult> + Send + Sync>;

/// The instrumented CRUD calls of one endpoint.
#[derive(Clone, Default)]
pub struct Service {
    calls: Arc<BTreeMap<Call, InstrumentedCall>>,
}

impl Service {
    fn instrument(module: &Module, loggers: &Arc<dyn Loggers>) -> Self {
        let calls = module.raw_calls()
            .map(|(call, raw)| (call, wrap(call, Arc::clone(raw), Arc::clone(loggers))))
            .collect();
        Self { calls: Arc::new(calls) }
    }

    pub fn has(&self, call: Call) -> bool {
        self.calls.contains_key(&call)
    }

    /// Invokes `call`. A call the module does not export fails with `405`.
    pub async fn call(&self, call: Call, args: CallArgs) -> CallResult {
        match self.calls.get(&call) {
            Some(instrumented) => instrumented(args).await,
            None => Err(HookError::with_status(
                StatusCode::METHOD_NOT_ALLOWED,
                format!("`{call}` is not exported"),
            )),
        }
    }
}

impl fmt::Debug for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.calls.keys()).finish()
    }
}

fn wrap(call: Call, raw: RawCall, loggers: Arc<dyn Loggers>) -> InstrumentedCall {
    Arc::new(move |args: CallArgs| -> BoxFuture<'static, CallResult> {
        let log = loggers.logger(call);
        log.trace("enter");
        raw(args, log)
    })
}

// ── Endpoint ──────────────────────────────────────────────────────────────────

/// A file-derived binding of an entity name into the request context.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct EntityBinding {
    pub name: String,
    pub source: PathBuf,
}

/// An [`EntityBinding`] with its loaded module.
#[derive(Clone, Debug)]
pub struct BoundEntity {
    binding: EntityBinding,
    module: Arc<Module>,
}

impl BoundEntity {
    pub fn binding(&self) -> &EntityBinding { &self.binding }
    pub fn module(&self) -> &Module { &self.module }
}

/// A registered route and everything needed to run requests against it.
/// Read-only once built; share it freely between requests.
#[derive(Clone, Debug)]
pub struct Endpoint {
    route: RouteTemplate,
    verb: Option<Verb>,
    source: PathBuf,
    module: Arc<Module>,
    service: Service,
    entities: Vec<BoundEntity>,
}

impl Endpoint {
    /// Binds `module` to `route`, instrumenting its CRUD calls with `loggers`.
    pub fn bind(
        route: RouteTemplate,
        verb: Option<Verb>,
        source: PathBuf,
        module: Arc<Module>,
        loggers: &Arc<dyn Loggers>,
    ) -> Self {
        let service = Service::instrument(&module, loggers);
        Self { route, verb, source, module, service, entities: Vec::new() }
    }

    pub fn with_entity(mut self, binding: EntityBinding, module: Arc<Module>) -> Self {
        self.entities.push(BoundEntity { binding, module });
        self
    }

    pub fn route(&self) -> &RouteTemplate { &self.route }

    /// The verb this endpoint answers, or `None` for every verb.
    pub fn verb(&self) -> Option<Verb> { self.verb }
    pub fn source(&self) -> &Path { &self.source }
    pub fn module(&self) -> &Module { &self.module }
    pub fn service(&self) -> &Service { &self.service }
    pub fn entities(&self) -> &[BoundEntity] { &self.entities }
}

/// A route string paired with the module serving it.
#[derive(Clone, Debug)]
pub struct Route {
    pub path: String,
    pub module: Arc<Module>,
}

/// The registry as `{path, module}` pairs, in registration order.
pub fn routes(endpoints: &[Endpoint]) -> Vec<Route> {
    endpoints.iter()
        .map(|endpoint| Route { path: endpoint.route.to_string(), module: Arc::clone(&endpoint.module) })
        .collect()
}

// ── Registrar ─────────────────────────────────────────────────────────────────

/// Builds the endpoint registry from discovered files.
pub struct Registrar {
    scanner: Scanner,
    dispatcher: Dispatcher,
    loggers: Arc<dyn Loggers>,
}

impl Registrar {
    pub fn new(scanner: Scanner, dispatcher: Dispatcher) -> Self {
        Self { scanner, dispatcher, loggers: Arc::new(TracingLoggers) }
    }

    pub fn with_loggers(mut self, loggers: impl Loggers) -> Self {
        self.loggers = Arc::new(loggers);
        self
    }

    pub fn scanner(&self) -> &Scanner { &self.scanner }

    /// Registers `files`, preserving their order.
    ///
    /// Routes are relative to `files.base`, or to the working directory when
    /// no base is set. The first module that fails to resolve fails the whole
    /// registration with the dispatcher's error.
    pub async fn register(&self, files: &Discovered) -> Result<Vec<Endpoint>, Error> {
        let base = match &files.base {
            Some(base) => base.clone(),
            None       => std::env::current_dir()?,
        };

        // Resolve in input order; bindings are attached once every entity is known.
        let mut entities = Vec::new();
        let mut methods = Vec::new();
        for file in &files.files {
            match self.entity_name(file) {
                Some(name) => {
                    let module = self.resolve(Target::Entity, file).await?;
                    entities.push((EntityBinding { name: name.to_owned(), source: file.clone() }, module));
                }
                None => methods.push((file, self.resolve(Target::Method, file).await?)),
            }
        }

        let mut endpoints = Vec::new();
        for (file, module) in methods {
            let verb = file_name(file).and_then(|name| self.scanner.verb(name));
            let route = self.scanner.to_route(file, &base);

            let mut endpoint = Endpoint::bind(route, verb, file.clone(), module, &self.loggers);
            for (binding, module) in &entities {
                if in_scope(&binding.source, file) {
                    endpoint = endpoint.with_entity(binding.clone(), Arc::clone(module));
                }
            }

            debug!(
                route = %endpoint.route,
                verb = endpoint.verb.map_or("*", Verb::as_str),
                source = %file.display(),
                exports = ?endpoint.module.exports(),
                entities = endpoint.entities.len(),
                "registered endpoint",
            );
            endpoints.push(endpoint);
        }

        Ok(endpoints)
    }

    fn entity_name<'a>(&self, file: &'a Path) -> Option<&'a str> {
        self.scanner.entity_name(file_name(file)?)
    }

    async fn resolve(&self, target: Target, file: &Path) -> Result<Arc<Module>, Error> {
        let message = self.dispatcher.act(DispatchMessage::process(target, file)).await?;
        message.module.ok_or_else(|| Error::Resolution {
            path: file.to_path_buf(),
            reason: "bind returned no module".to_owned(),
        })
    }
}

fn file_name(path: &Path) -> Option<&str> {
    path.file_name()?.to_str()
}

/// An entity applies to files in its own directory and every directory below.
fn in_scope(entity: &Path, file: &Path) -> bool {
    match (entity.parent(), file.parent()) {
        (Some(scope), Some(dir)) => dir.starts_with(scope),
        _ => false,
    }
}
