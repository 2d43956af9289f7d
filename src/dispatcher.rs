//! Module resolution and binding.
//!
//! A [`DispatchMessage`] asks for one of two actions:
//!
//! | `cmd`     | `target`             | Action                                        |
//! |-----------|----------------------|-----------------------------------------------|
//! | `require` | (none)               | load `path` into `module`, unless already set |
//! | `process` | `entity` \| `method` | `require`, then hand off to that target's bind |
//!
//! The dispatcher keeps no state besides the message in flight and never
//! retries; a failed load comes back to the caller as [`Error::Resolution`].

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::error::Error;
use crate::handler::BoxFuture;
use crate::module::Module;

// ── Message ───────────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cmd {
    Require,
    Process,
}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Target {
    Entity,
    Method,
}

/// The envelope exchanged with the dispatcher.
///
/// Serializes as `{"role":"solos","cmd":"process","target":"method","path":...}`;
/// the loaded module never goes over the wire.
#[derive(Clone, Serialize, Deserialize)]
pub struct DispatchMessage {
    pub role: String,
    pub cmd: Cmd,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<Target>,
    pub path: PathBuf,
    #[serde(skip)]
    pub module: Option<Arc<Module>>,
}

impl DispatchMessage {
    pub const ROLE: &'static str = "solos";

    pub fn require(path: impl Into<PathBuf>) -> Self {
        Self { role: Self::ROLE.to_owned(), cmd: Cmd::Require, target: None, path: path.into(), module: None }
    }

    pub fn process(target: Target, path: impl Into<PathBuf>) -> Self {
        Self { target: Some(target), cmd: Cmd::Process, ..Self::require(path) }
    }
}

impl fmt::Debug for DispatchMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchMessage")
            .field("role", &self.role)
            .field("cmd", &self.cmd)
            .field("target", &self.target)
            .field("path", &self.path)
            .field("loaded", &self.module.is_some())
            .finish()
    }
}

// ── Capabilities ──────────────────────────────────────────────────────────────

/// Loads the module behind a path. Every call yields a fresh module.
///
/// Implemented for [`Catalog`] and for any
/// `Fn(&Path) -> Result<Module, Error>`, which is what tests inject.
pub trait Loader: Send + Sync + 'static {
    fn load<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, Result<Module, Error>>;
}

impl<F> Loader for F
where
    F: Fn(&Path) -> Result<Module, Error> + Send + Sync + 'static,
{
    fn load<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, Result<Module, Error>> {
        Box::pin(std::future::ready(self(path)))
    }
}

/// Finishes a `process` action once its module is loaded.
pub trait Bind: Send + Sync + 'static {
    fn bind(&self, message: DispatchMessage) -> BoxFuture<'static, Result<DispatchMessage, Error>>;
}

impl<F, Fut> Bind for F
where
    F: Fn(DispatchMessage) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<DispatchMessage, Error>> + Send + 'static,
{
    fn bind(&self, message: DispatchMessage) -> BoxFuture<'static, Result<DispatchMessage, Error>> {
        Box::pin(self(message))
    }
}

/// Default bind for both targets: records what the module exports and hands
/// the message back.
#[derive(Clone, Copy, Debug, Default)]
pub struct ExportBind;

impl Bind for ExportBind {
    fn bind(&self, message: DispatchMessage) -> BoxFuture<'static, Result<DispatchMessage, Error>> {
        if let Some(module) = &message.module {
            debug!(
                path = %message.path.display(),
                target = ?message.target,
                exports = ?module.exports(),
                "bound module",
            );
        }
        Box::pin(std::future::ready(Ok(message)))
    }
}

// ── Catalog ───────────────────────────────────────────────────────────────────

type Factory = Arc<dyn Fn() -> Module + Send + Sync>;

/// In-process [`Loader`]: module factories keyed by path relative to a root.
///
/// ```rust
/// use solos::{Catalog, Module};
///
/// let catalog = Catalog::new("/srv/api")
///     .module("users/get.js", Module::new)
///     .module("users/me/get.js", Module::new);
/// ```
#[derive(Clone, Default)]
pub struct Catalog {
    root: PathBuf,
    factories: HashMap<PathBuf, Factory>,
}

impl Catalog {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into(), factories: HashMap::new() }
    }

    pub fn module(mut self, path: impl Into<PathBuf>, factory: impl Fn() -> Module + Send + Sync + 'static) -> Self {
        self.factories.insert(path.into(), Arc::new(factory));
        self
    }

    pub fn root(&self) -> &Path { &self.root }
}

impl Loader for Catalog {
    fn load<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, Result<Module, Error>> {
        let key = path.strip_prefix(&self.root).unwrap_or(path);
        let result = match self.factories.get(key) {
            Some(factory) => Ok(factory()),
            None => Err(Error::Resolution {
                path: path.to_path_buf(),
                reason: "no module is catalogued under this path".to_owned(),
            }),
        };
        Box::pin(std::future::ready(result))
    }
}

impl fmt::Debug for Catalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Catalog")
            .field("root", &self.root)
            .field("modules", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}

// ── Dispatcher ────────────────────────────────────────────────────────────────

/// Resolves dispatch messages.
///
/// Both targets share one bind strategy until [`with_bind`](Self::with_bind)
/// gives either its own.
#[derive(Clone)]
pub struct Dispatcher {
    loader: Arc<dyn Loader>,
    entity: Arc<dyn Bind>,
    method: Arc<dyn Bind>,
}

impl Dispatcher {
    pub fn new(loader: impl Loader) -> Self {
        let bind: Arc<dyn Bind> = Arc::new(ExportBind);
        Self { loader: Arc::new(loader), entity: Arc::clone(&bind), method: bind }
    }

    pub fn with_bind(mut self, target: Target, bind: impl Bind) -> Self {
        match target {
            Target::Entity => self.entity = Arc::new(bind),
            Target::Method => self.method = Arc::new(bind),
        }
        self
    }

    pub async fn act(&self, message: DispatchMessage) -> Result<DispatchMessage, Error> {
        if message.role != DispatchMessage::ROLE {
            return Err(Error::Unmatched(format!("role `{}`", message.role)));
        }
        match (message.cmd, message.target) {
            (Cmd::Require, _) => self.require(message).await,
            (Cmd::Process, Some(target)) => {
                let message = self.require(message).await?;
                let bind = match target {
                    Target::Entity => &self.entity,
                    Target::Method => &self.method,
                };
                bind.bind(message).await
            }
            (Cmd::Process, None) => Err(Error::Unmatched("`process` without a target".to_owned())),
        }
    }

    /// Loads `message.path` unless the message already carries its module.
    async fn require(&self, mut message: DispatchMessage) -> Result<DispatchMessage, Error> {
        if message.module.is_none() {
            trace!(path = %message.path.display(), "loading module");
            let module = self.loader.load(&message.path).await?;
            message.module = Some(Arc::new(module));
        }
        Ok(message)
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::handler::Hook;

    fn counting_loader(count: Arc<AtomicUsize>) -> impl Loader {
        move |path: &Path| {
            count.fetch_add(1, Ordering::SeqCst);
            if path.ends_with("missing.js") {
                Err(Error::Resolution { path: path.to_path_buf(), reason: "not found".to_owned() })
            } else {
                Ok(Module::new().respond(Hook::future(|ctx| async { Ok(ctx) })))
            }
        }
    }

    #[tokio::test]
    async fn require_loads_once_and_memoizes() {
        let count = Arc::new(AtomicUsize::new(0));
        let dispatcher = Dispatcher::new(counting_loader(Arc::clone(&count)));

        let message = dispatcher.act(DispatchMessage::require("/srv/get.js")).await.unwrap();
        assert!(message.module.is_some());
        let message = dispatcher.act(message).await.unwrap();
        assert!(message.module.is_some());

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn load_failure_is_returned_to_the_caller() {
        let count = Arc::new(AtomicUsize::new(0));
        let dispatcher = Dispatcher::new(counting_loader(Arc::clone(&count)));

        let err = dispatcher.act(DispatchMessage::process(Target::Method, "/srv/missing.js")).await.unwrap_err();
        assert!(matches!(err, Error::Resolution { .. }));

        // Still usable, and no retry happened.
        assert!(dispatcher.act(DispatchMessage::require("/srv/get.js")).await.is_ok());
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn process_routes_to_the_target_bind() {
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let record = |label: &'static str, seen: Arc<std::sync::Mutex<Vec<&'static str>>>| {
            move |message: DispatchMessage| {
                seen.lock().unwrap().push(label);
                async move { Ok::<_, Error>(message) }
            }
        };
        let dispatcher = Dispatcher::new(counting_loader(Arc::new(AtomicUsize::new(0))))
            .with_bind(Target::Entity, record("entity", Arc::clone(&seen)))
            .with_bind(Target::Method, record("method", Arc::clone(&seen)));

        dispatcher.act(DispatchMessage::process(Target::Method, "/a/get.js")).await.unwrap();
        dispatcher.act(DispatchMessage::process(Target::Entity, "/a/owner-entity.js")).await.unwrap();
        dispatcher.act(DispatchMessage::require("/a/post.js")).await.unwrap();

        assert_eq!(*seen.lock().unwrap(), ["method", "entity"]);
    }

    #[tokio::test]
    async fn rejects_unknown_role_and_untargeted_process() {
        let dispatcher = Dispatcher::new(counting_loader(Arc::new(AtomicUsize::new(0))));

        let mut foreign = DispatchMessage::require("/a/get.js");
        foreign.role = "other".to_owned();
        assert!(matches!(dispatcher.act(foreign).await, Err(Error::Unmatched(_))));

        let mut untargeted = DispatchMessage::process(Target::Method, "/a/get.js");
        untargeted.target = None;
        assert!(matches!(dispatcher.act(untargeted).await, Err(Error::Unmatched(_))));
    }

    #[tokio::test]
    async fn catalog_resolves_relative_to_its_root() {
        let catalog = Catalog::new("/srv").module("users/get.js", Module::new);

        assert!(catalog.load(Path::new("/srv/users/get.js")).await.is_ok());
        assert!(catalog.load(Path::new("users/get.js")).await.is_ok());
        assert!(matches!(
            catalog.load(Path::new("/srv/users/post.js")).await,
            Err(Error::Resolution { .. })
        ));
    }

    #[test]
    fn message_wire_format() {
        let message = DispatchMessage::process(Target::Entity, "/a/owner-entity.js");
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "role": "solos", "cmd": "process", "target": "entity", "path": "/a/owner-entity.js" })
        );

        let parsed: DispatchMessage =
            serde_json::from_str(r#"{"role":"solos","cmd":"require","path":"/a/get.js"}"#).unwrap();
        assert_eq!(parsed.cmd, Cmd::Require);
        assert_eq!(parsed.target, None);
        assert!(parsed.module.is_none());
    }
}
