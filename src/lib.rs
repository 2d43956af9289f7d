//! # solos
//!
//! Lay out a directory, get an HTTP API.
//!
//! ```text
//! services/
//! ├── users/
//! │   ├── get.js                GET    /users
//! │   ├── post.js               POST   /users
//! │   ├── account-entity.js     binds `account` into every request below users/
//! │   └── me/
//! │       ├── get.js            GET    /users/:usersId
//! │       └── delete.js         DELETE /users/:usersId
//! ```
//!
//! Files are found by [`discover`], classified by the [`Scanner`], resolved
//! to [`Module`]s through the [`Dispatcher`], and turned into [`Endpoint`]s
//! by the [`Registrar`]. Each request then runs through the endpoint's
//! lifecycle ([`pipeline::run`]):
//!
//! ```text
//! request_received → validate → authorize → before → respond → after
//! ```
//!
//! Every hook is optional except `respond`. The first hook to fail ends the
//! request; a request nobody responded to is answered with `405`.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use solos::{Catalog, Config, Dispatcher, Hook, Module, Registrar, Router, Scanner, Server};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), solos::Error> {
//!     let config = Config::default();
//!     let files = solos::discover(std::path::Path::new("services"), &config.discover)?;
//!
//!     let catalog = Catalog::new(files.base.clone().unwrap_or_default())
//!         .module("users/get.js", || {
//!             Module::new().respond(Hook::future(|mut ctx| async move {
//!                 ctx.send("[]");
//!                 Ok(ctx)
//!             }))
//!         });
//!
//!     let registrar = Registrar::new(Scanner::new(&config.scanner)?, Dispatcher::new(catalog));
//!     let endpoints = registrar.register(&files).await?;
//!
//!     Server::bind(([0, 0, 0, 0], 3000)).serve(Router::from_endpoints(endpoints)?).await
//! }
//! ```

mod context;
mod error;
mod handler;
mod method;
mod module;
mod request;
mod response;
mod route;
mod router;
mod scanner;
mod server;

pub mod config;
pub mod discover;
pub mod dispatcher;
pub mod pipeline;
pub mod registrar;

pub use config::Config;
pub use context::{Context, Reply};
pub use discover::{Discovered, discover};
pub use dispatcher::{Catalog, DispatchMessage, Dispatcher, Loader, Target};
pub use error::{Error, HookError};
pub use handler::{BoxFuture, Done, Hook, HookResult};
pub use http::StatusCode;
pub use method::Verb;
pub use module::{Call, CallArgs, CallResult, Hooks, Module};
pub use pipeline::{Outcome, Stage};
pub use registrar::{CallLog, Endpoint, EntityBinding, Registrar, Service, routes};
pub use request::Request;
pub use response::{ContentType, IntoResponse, Response, ResponseBuilder};
pub use route::{RouteTemplate, Segment};
pub use router::Router;
pub use scanner::Scanner;
pub use server::Server;
