//! HTTP server and graceful shutdown.
//!
//! The server is the boundary layer: it matches a request to an endpoint,
//! runs the endpoint's lifecycle, and answers the client with whatever
//! `respond` sent. When nothing was sent it projects the pipeline's error
//! onto a response instead.
//!
//! On SIGTERM or Ctrl-C it stops accepting connections, lets every in-flight
//! connection finish, waits for `after` hooks still running, and returns from
//! [`Server::serve`].

use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};

use bytes::Bytes;
use http::StatusCode;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::context::Context;
use crate::error::Error;
use crate::pipeline;
use crate::request::Request;
use crate::response::{IntoResponse, Response};
use crate::router::Router;

enum Listen {
    Addr(SocketAddr),
    Listener(TcpListener),
}

/// The HTTP server.
pub struct Server {
    listen: Listen,
}

impl Server {
    /// Configures the server to bind to `addr` when [`serve`](Server::serve)
    /// is called.
    ///
    /// ```rust,no_run
    /// use solos::Server;
    /// let server = Server::bind(([0, 0, 0, 0], 3000));
    /// ```
    pub fn bind(addr: impl Into<SocketAddr>) -> Self {
        Self { listen: Listen::Addr(addr.into()) }
    }

    /// Serves on a listener that is already bound.
    pub fn from_listener(listener: TcpListener) -> Self {
        Self { listen: Listen::Listener(listener) }
    }

    /// Starts accepting connections and dispatching them through `router`
    /// until SIGTERM or Ctrl-C.
    ///
    /// Returns only after a full graceful shutdown.
    pub async fn serve(self, router: Router) -> Result<(), Error> {
        self.serve_with_shutdown(router, shutdown_signal()).await
    }

    /// Like [`serve`](Server::serve), but stops once `signal` resolves.
    ///
    /// Shutdown waits for every open connection and for every lifecycle
    /// still running its `after` hook.
    pub async fn serve_with_shutdown(
        self,
        router: Router,
        signal: impl Future<Output = ()>,
    ) -> Result<(), Error> {
        let listener = match self.listen {
            Listen::Addr(addr) => TcpListener::bind(addr).await?,
            Listen::Listener(listener) => listener,
        };
        let router = Arc::new(router);
        let lifecycles = Lifecycles::default();

        info!(addr = %listener.local_addr()?, "solos listening");

        let mut tasks = JoinSet::new();
        tokio::pin!(signal);

        loop {
            tokio::select! {
                // Check shutdown first so a signal stops accepting at once.
                biased;

                () = &mut signal => {
                    info!(in_flight = tasks.len(), "shutdown signal received, draining connections");
                    break;
                }

                res = listener.accept() => {
                    let (stream, remote_addr) = match res {
                        Ok(v) => v,
                        Err(e) => {
                            error!("accept error: {e}");
                            continue;
                        }
                    };

                    let router = Arc::clone(&router);
                    let lifecycles = lifecycles.clone();
                    let io = TokioIo::new(stream);

                    tasks.spawn(async move {
                        let svc = service_fn(move |req| {
                            let router = Arc::clone(&router);
                            let lifecycles = lifecycles.clone();
                            async move { dispatch(router, lifecycles, req).await }
                        });

                        if let Err(e) = ConnBuilder::new(TokioExecutor::new())
                            .serve_connection(io, svc)
                            .await
                        {
                            error!(peer = %remote_addr, "connection error: {e}");
                        }
                    });
                }

                // Reap finished connection tasks so the set does not grow without bound.
                Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
            }
        }

        while tasks.join_next().await.is_some() {}
        lifecycles.drain().await;

        info!("solos stopped");
        Ok(())
    }
}

// ── Lifecycle tasks ───────────────────────────────────────────────────────────

/// Request lifecycles that may outlive their response while `after` runs.
#[derive(Clone, Default)]
struct Lifecycles(Arc<Mutex<JoinSet<()>>>);

impl Lifecycles {
    fn spawn(&self, task: impl Future<Output = ()> + Send + 'static) {
        let mut set = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        while let Some(finished) = set.try_join_next() {
            log_join(finished);
        }
        set.spawn(task);
    }

    /// Waits for every lifecycle. Only called once no connection is left to
    /// spawn another one.
    async fn drain(&self) {
        let mut set = std::mem::take(&mut *self.0.lock().unwrap_or_else(PoisonError::into_inner));
        if !set.is_empty() {
            info!(pending = set.len(), "waiting for running lifecycles");
        }
        while let Some(finished) = set.join_next().await {
            log_join(finished);
        }
    }
}

fn log_join(result: Result<(), tokio::task::JoinError>) {
    if let Err(e) = result {
        error!("lifecycle task failed: {e}");
    }
}

// ── Request dispatch ──────────────────────────────────────────────────────────

/// Routes one request and produces one response. Every failure is answered
/// here, so hyper never sees an error.
async fn dispatch(
    router: Arc<Router>,
    lifecycles: Lifecycles,
    req: hyper::Request<Incoming>,
) -> Result<http::Response<Full<Bytes>>, Infallible> {
    let (parts, body) = req.into_parts();
    let path = parts.uri.path().to_owned();

    let Some((endpoint, params)) = router.lookup(&parts.method, &path) else {
        let status = if router.knows(&path) { StatusCode::METHOD_NOT_ALLOWED } else { StatusCode::NOT_FOUND };
        return Ok(Response::status(status).into_http());
    };

    let body = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            warn!(%path, "failed to read request body: {e}");
            return Ok(Response::status(StatusCode::BAD_REQUEST).into_http());
        }
    };

    let (ctx, reply) = Context::new(Request::from_parts(parts, body, params));

    // The lifecycle runs on its own task so `after` can keep going once the
    // response is on its way.
    let (outcome_tx, outcome_rx) = oneshot::channel();
    lifecycles.spawn(async move {
        let _ = outcome_tx.send(pipeline::run(&endpoint, ctx).await);
    });

    let response = match reply.recv().await {
        Some(response) => response,
        None => match outcome_rx.await {
            Ok(Err(e)) => e.into_response(),
            Ok(Ok(_))  => Error::UnansweredRequest.into_response(),
            Err(_) => {
                error!(%path, "lifecycle ended without an outcome");
                Response::status(StatusCode::INTERNAL_SERVER_ERROR)
            }
        },
    };

    Ok(response.into_http())
}

// ── Shutdown signal ───────────────────────────────────────────────────────────

/// Resolves on the first SIGTERM or Ctrl-C. A signal handler that cannot be
/// installed leaves that arm pending rather than stopping the server.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("cannot listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let sigterm = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => { signal.recv().await; }
            Err(e) => {
                error!("cannot listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c   => {}
        () = sigterm  => {}
    }
}
