//! Discovery and registration against the fixture tree in `tests/resource`.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde_json::json;
use solos::config::DiscoverConfig;
use solos::registrar::{Loggers, TracingLoggers};
use solos::{
    Call, CallArgs, CallLog, Catalog, Config, Discovered, Dispatcher, Error, Hook, Module, Registrar,
    Scanner, Verb, discover, routes,
};

fn resource() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/resource")
}

fn respond_ok() -> Module {
    Module::new().respond(Hook::future(|mut ctx| async move {
        ctx.send("ok");
        Ok(ctx)
    }))
}

fn catalog(root: &Path) -> Catalog {
    Catalog::new(root)
        .module("alpha/me/beta/me/get.js", respond_ok)
        .module("beta/me/sample/delete.js", || {
            respond_ok().call(Call::Remove, |args, _log| async move { Ok(json!({ "removed": args.id })) })
        })
        .module("beta/me/owner-entity.js", || Module::new().entity(|_req| async { Ok(json!({ "name": "owner" })) }))
}

fn relative(files: &Discovered) -> Vec<PathBuf> {
    let base = files.base.clone().unwrap_or_default();
    files.files.iter().map(|file| file.strip_prefix(&base).unwrap_or(file).to_path_buf()).collect()
}

#[derive(Clone, Default)]
struct CountingLoggers(Arc<AtomicUsize>);

impl Loggers for CountingLoggers {
    fn logger(&self, call: Call) -> CallLog {
        self.0.fetch_add(1, Ordering::SeqCst);
        TracingLoggers.logger(call)
    }
}

#[test]
fn discovers_service_files_in_sorted_order() {
    let files = discover(&resource(), &DiscoverConfig::default()).unwrap();

    assert_eq!(
        relative(&files),
        [
            PathBuf::from("alpha/me/beta/me/get.js"),
            PathBuf::from("beta/me/owner-entity.js"),
            PathBuf::from("beta/me/sample/delete.js"),
        ]
    );
    assert!(files.files.iter().all(|file| file.is_absolute()));
    assert_eq!(files.base.as_deref(), Some(std::path::absolute(resource()).unwrap().as_path()));
}

#[test]
fn discovers_relative_paths_on_request() {
    let config = DiscoverConfig { absolute: false, ..DiscoverConfig::default() };
    let files = discover(&resource(), &config).unwrap();

    assert_eq!(files.files.len(), 3);
    assert!(files.files.iter().all(|file| file.is_relative()));
    assert!(files.files.contains(&PathBuf::from("beta/me/sample/delete.js")));
}

#[tokio::test]
async fn registers_routes_from_file_layout() {
    let files = discover(&resource(), &DiscoverConfig::default()).unwrap();
    let base = files.base.clone().unwrap();
    let registrar = Registrar::new(Scanner::default(), Dispatcher::new(catalog(&base)));

    let endpoints = registrar.register(&files).await.unwrap();

    let registered: Vec<_> = endpoints.iter().map(|e| (e.route().to_string(), e.verb())).collect();
    assert_eq!(
        registered,
        [
            ("/alpha/:alphaId/beta/:betaId".to_owned(), Some(Verb::Get)),
            ("/beta/:betaId/sample".to_owned(), Some(Verb::Delete)),
        ]
    );

    let listed: Vec<_> = routes(&endpoints).into_iter().map(|route| route.path).collect();
    assert_eq!(listed, ["/alpha/:alphaId/beta/:betaId", "/beta/:betaId/sample"]);
}

#[tokio::test]
async fn entity_binds_only_within_its_directory() {
    let files = discover(&resource(), &DiscoverConfig::default()).unwrap();
    let base = files.base.clone().unwrap();
    let registrar = Registrar::new(Scanner::default(), Dispatcher::new(catalog(&base)));

    let endpoints = registrar.register(&files).await.unwrap();

    assert!(endpoints[0].entities().is_empty());
    let bound: Vec<_> = endpoints[1].entities().iter().map(|e| e.binding().name.as_str()).collect();
    assert_eq!(bound, ["owner"]);
    assert!(endpoints[1].entities()[0].module().is_entity());
}

#[tokio::test]
async fn first_unresolved_module_fails_registration() {
    let files = discover(&resource(), &DiscoverConfig::default()).unwrap();
    let base = files.base.clone().unwrap();
    let partial = Catalog::new(&base).module("alpha/me/beta/me/get.js", respond_ok);
    let registrar = Registrar::new(Scanner::default(), Dispatcher::new(partial));

    let err = registrar.register(&files).await.unwrap_err();

    match err {
        Error::Resolution { path, .. } => assert!(path.ends_with("owner-entity.js")),
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn modules_resolve_in_input_order() {
    let files = discover(&resource(), &DiscoverConfig::default()).unwrap();
    let base = files.base.clone().unwrap();
    let registrar = Registrar::new(Scanner::default(), Dispatcher::new(Catalog::new(&base)));

    let err = registrar.register(&files).await.unwrap_err();

    match err {
        Error::Resolution { path, .. } => assert!(path.ends_with("alpha/me/beta/me/get.js")),
        other => panic!("unexpected error: {other}"),
    }

    let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
    let loader = {
        let seen = Arc::clone(&seen);
        move |path: &Path| {
            seen.lock().unwrap().push(path.strip_prefix(&base).unwrap_or(path).to_path_buf());
            Ok::<_, Error>(Module::new())
        }
    };
    Registrar::new(Scanner::default(), Dispatcher::new(loader)).register(&files).await.unwrap();

    assert_eq!(*seen.lock().unwrap(), relative(&files));
}

#[tokio::test]
async fn closures_load_modules_and_custom_scanners_shape_routes() {
    let config = Config::from_toml(
        r#"
        [scanner]
        uriParamTemplate = "{{param}Id}"
        "#,
    )
    .unwrap();
    let loader = |_path: &Path| Ok::<_, Error>(respond_ok());
    let registrar = Registrar::new(Scanner::new(&config.scanner).unwrap(), Dispatcher::new(loader));
    let files = Discovered::new(vec![PathBuf::from("/srv/users/me/get.js"), PathBuf::from("/srv/status.js")])
        .with_base("/srv");

    let endpoints = registrar.register(&files).await.unwrap();

    assert_eq!(endpoints[0].route().to_string(), "/users/{usersId}");
    assert_eq!(endpoints[0].verb(), Some(Verb::Get));
    assert_eq!(endpoints[1].route().to_string(), "/status");
    assert_eq!(endpoints[1].verb(), None);
}

#[tokio::test]
async fn shared_module_is_instrumented_once_per_endpoint() {
    let invocations = Arc::new(AtomicUsize::new(0));
    let module = {
        let invocations = Arc::clone(&invocations);
        respond_ok().call(Call::Get, move |_args, log: CallLog| {
            invocations.fetch_add(1, Ordering::SeqCst);
            log.debug("get");
            async { Ok(json!(null)) }
        })
    };
    let loader = move |_path: &Path| Ok::<_, Error>(module.clone());
    let loggers = CountingLoggers::default();
    let registrar = Registrar::new(Scanner::default(), Dispatcher::new(loader)).with_loggers(loggers.clone());
    let files = Discovered::new(vec![PathBuf::from("/srv/a/get.js")]).with_base("/srv");

    let first = registrar.register(&files).await.unwrap();
    let second = registrar.register(&files).await.unwrap();

    first[0].service().call(Call::Get, CallArgs::default()).await.unwrap();
    second[0].service().call(Call::Get, CallArgs::default()).await.unwrap();

    assert_eq!(invocations.load(Ordering::SeqCst), 2);
    assert_eq!(loggers.0.load(Ordering::SeqCst), 2);
}
