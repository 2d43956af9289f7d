//! Per-request context threaded through every lifecycle stage.

use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};
use tokio::sync::oneshot;
use tracing::{Span, warn};

use crate::registrar::Service;
use crate::request::Request;
use crate::response::{IntoResponse, Response};

/// State of one in-flight request.
///
/// Owned by exactly one pipeline and moved from hook to hook; whatever a
/// stage changes is what the next stage sees. Dropped once the pipeline ends.
pub struct Context {
    request: Arc<Request>,
    /// Values bound by entity files, keyed by entity name.
    pub entities: Map<String, Value>,
    /// Free-form data hooks hand to later stages.
    pub state: Map<String, Value>,
    headers: Vec<(String, String)>,
    service: Service,
    log: Span,
    reply: Option<oneshot::Sender<Response>>,
}

impl Context {
    /// A fresh context plus the [`Reply`] the response will arrive on.
    pub fn new(request: Request) -> (Self, Reply) {
        let (tx, rx) = oneshot::channel();
        let log = tracing::debug_span!("solos.request", method = %request.method(), path = %request.path());
        let ctx = Self {
            request: Arc::new(request),
            entities: Map::new(),
            state: Map::new(),
            headers: Vec::new(),
            service: Service::default(),
            log,
            reply: Some(tx),
        };
        (ctx, Reply(rx))
    }

    pub fn request(&self) -> &Request { &self.request }
    pub fn log(&self) -> &Span { &self.log }

    /// An entity bound for this request, by name.
    pub fn entity(&self, name: &str) -> Option<&Value> {
        self.entities.get(name)
    }

    /// The endpoint's CRUD calls, each invocation handed its call logger.
    pub fn service(&self) -> &Service { &self.service }

    /// Stages a header for the response. Ignored once the response is sent.
    pub fn header(&mut self, name: &str, value: &str) {
        self.headers.push((name.to_owned(), value.to_owned()));
    }

    /// Sends the response. Only the first call is delivered; later calls
    /// return `false`.
    pub fn send(&mut self, response: impl IntoResponse) -> bool {
        let Some(reply) = self.reply.take() else {
            warn!(parent: &self.log, "response already sent, dropping another one");
            return false;
        };
        let mut response = response.into_response();
        response.headers.extend(self.headers.drain(..));
        // The boundary may have given up on the request; nothing left to do.
        let _ = reply.send(response);
        true
    }

    pub fn is_sent(&self) -> bool {
        self.reply.is_none()
    }

    pub(crate) fn shared_request(&self) -> Arc<Request> {
        Arc::clone(&self.request)
    }

    pub(crate) fn attach(&mut self, service: Service) {
        self.service = service;
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("method", self.request.method())
            .field("path", &self.request.path())
            .field("entities", &self.entities)
            .field("sent", &self.is_sent())
            .finish_non_exhaustive()
    }
}

/// Receiving end of [`Context::send`].
pub struct Reply(oneshot::Receiver<Response>);

impl Reply {
    /// Resolves with the response, or `None` once the context is gone
    /// without one having been sent.
    pub async fn recv(self) -> Option<Response> {
        self.0.await.ok()
    }
}
