//! Radix-tree request router.
//!
//! One tree per HTTP method, filled from registered endpoints. An endpoint
//! named after a verb is mounted under that verb only; any other endpoint is
//! mounted under all five.

use std::collections::HashMap;
use std::sync::Arc;

use http::Method;
use matchit::Router as MatchitRouter;

use crate::error::Error;
use crate::method::Verb;
use crate::registrar::Endpoint;

/// The application router. Build it once at startup; pass it to
/// [`Server::serve`](crate::Server::serve).
#[derive(Default)]
pub struct Router {
    routes: HashMap<Method, MatchitRouter<Arc<Endpoint>>>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mounts every endpoint, in order.
    pub fn from_endpoints(endpoints: impl IntoIterator<Item = Endpoint>) -> Result<Self, Error> {
        endpoints.into_iter().try_fold(Self::new(), Self::mount)
    }

    pub fn mount(mut self, endpoint: Endpoint) -> Result<Self, Error> {
        let route = endpoint.route();
        if let Some(name) = route.duplicate_param() {
            return Err(Error::Route {
                route: route.to_string(),
                reason: format!("parameter `{name}` appears twice"),
            });
        }

        let path = route.to_matchit();
        let verbs = match endpoint.verb() {
            Some(verb) => vec![verb],
            None       => Verb::ALL.to_vec(),
        };
        let endpoint = Arc::new(endpoint);
        for verb in verbs {
            self.routes
                .entry(verb.method())
                .or_default()
                .insert(path.clone(), Arc::clone(&endpoint))
                .map_err(|e| Error::Route { route: endpoint.route().to_string(), reason: e.to_string() })?;
        }
        Ok(self)
    }

    pub(crate) fn lookup(
        &self,
        method: &Method,
        path: &str,
    ) -> Option<(Arc<Endpoint>, HashMap<String, String>)> {
        let tree = self.routes.get(method)?;
        let matched = tree.at(path).ok()?;
        let endpoint = Arc::clone(matched.value);
        let params = matched.params.iter()
            .map(|(k, v)| (k.to_owned(), v.to_owned()))
            .collect();
        Some((endpoint, params))
    }

    /// Whether any method serves `path`.
    pub(crate) fn knows(&self, path: &str) -> bool {
        self.routes.values().any(|tree| tree.at(path).is_ok())
    }
}
