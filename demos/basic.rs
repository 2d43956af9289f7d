//! Serves the `demos/services` tree.
//!
//! Run with:
//!   RUST_LOG=solos=debug cargo run --example basic
//!
//! Try:
//!   curl http://localhost:3000/users
//!   curl -X POST http://localhost:3000/users -d '{"name":"alice"}'
//!   curl -H 'authorization: demo' http://localhost:3000/users/42
//!   curl -X DELETE -H 'authorization: demo' http://localhost:3000/users/42

use std::path::Path;

use serde_json::{Value, json};
use solos::{
    Call, CallArgs, Catalog, Config, Context, Dispatcher, Hook, HookError, Module, Registrar, Response,
    Router, Scanner, Server, StatusCode,
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), solos::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::default();
    let files = solos::discover(&Path::new(env!("CARGO_MANIFEST_DIR")).join("demos/services"), &config.discover)?;
    let catalog = catalog(files.base.clone().unwrap_or_default());

    let registrar = Registrar::new(Scanner::new(&config.scanner)?, Dispatcher::new(catalog));
    let endpoints = registrar.register(&files).await?;
    for route in solos::routes(&endpoints) {
        tracing::info!(path = %route.path, exports = ?route.module.exports(), "route");
    }

    Server::bind(([0, 0, 0, 0], 3000)).serve(Router::from_endpoints(endpoints)?).await
}

fn catalog(root: impl Into<std::path::PathBuf>) -> Catalog {
    Catalog::new(root)
        .module("users/account-entity.js", account)
        .module("users/get.js", || users().respond(Hook::future(list_users)))
        .module("users/post.js", || {
            users()
                .validate(Hook::callback(|ctx, done| {
                    let body = serde_json::from_slice::<Value>(ctx.request().body());
                    match body {
                        Ok(Value::Object(_)) => done.ok(ctx),
                        _ => done.fail(HookError::with_status(StatusCode::BAD_REQUEST, "expected a JSON object")),
                    }
                }))
                .respond(Hook::future(create_user))
        })
        .module("users/me/get.js", || {
            users().authorize(Hook::callback(authorize)).respond(Hook::future(get_user))
        })
        .module("users/me/delete.js", || {
            users()
                .authorize(Hook::callback(authorize))
                .respond(Hook::future(|mut ctx: Context| async move {
                    let id = ctx.request().param("usersId").map(str::to_owned);
                    ctx.service().call(Call::Remove, CallArgs::id(id)).await?;
                    ctx.send(StatusCode::NO_CONTENT);
                    Ok(ctx)
                }))
                .after(Hook::future(|ctx: Context| async move {
                    tracing::info!(parent: ctx.log(), "user removed");
                    Ok(ctx)
                }))
        })
}

/// The CRUD calls every users endpoint shares.
fn users() -> Module {
    Module::new()
        .call(Call::Find, |_args, log| async move {
            log.debug("listing users");
            Ok(json!([{ "id": "42", "name": "alice" }]))
        })
        .call(Call::Get, |args, _log| async move {
            Ok(json!({ "id": args.id, "name": "alice" }))
        })
        .call(Call::Create, |args, log| async move {
            log.debug("creating user");
            let mut user = args.data.unwrap_or_else(|| json!({}));
            user["id"] = json!("99");
            Ok(user)
        })
        .call(Call::Remove, |args, _log| async move {
            match args.id.as_deref() {
                Some("42") => Ok(Value::Null),
                _ => Err(HookError::with_status(StatusCode::NOT_FOUND, "no such user")),
            }
        })
}

fn account() -> Module {
    Module::new().entity(|req| async move {
        Ok(json!({ "authorized": req.header("authorization").is_some() }))
    })
}

fn authorize(ctx: Context, done: solos::Done) {
    if ctx.request().header("authorization").is_some() {
        done.ok(ctx);
    } else {
        done.fail(HookError::with_status(StatusCode::UNAUTHORIZED, "missing credentials"));
    }
}

async fn list_users(mut ctx: Context) -> Result<Context, HookError> {
    let users = ctx.service().call(Call::Find, CallArgs::default()).await?;
    ctx.send(users);
    Ok(ctx)
}

async fn create_user(mut ctx: Context) -> Result<Context, HookError> {
    let data: Value = serde_json::from_slice(ctx.request().body()).unwrap_or_default();
    let user = ctx.service().call(Call::Create, CallArgs::data(data)).await?;
    ctx.header("location", "/users/99");
    ctx.send(Response::builder().status(StatusCode::CREATED).json(user.to_string().into_bytes()));
    Ok(ctx)
}

async fn get_user(mut ctx: Context) -> Result<Context, HookError> {
    let id = ctx.request().param("usersId").map(str::to_owned);
    let mut user = ctx.service().call(Call::Get, CallArgs::id(id)).await?;
    if let Some(account) = ctx.entity("account") {
        user["account"] = account.clone();
    }
    ctx.send(user);
    Ok(ctx)
}
