//! The network-interception seam.
//!
//! Interceptors never talk to sockets directly; they register URL/method
//! matchers against the [`Intercept`] capability and hand back a reply. The
//! production implementation is [`InterceptRouter`] served over HTTP by
//! [`server`](crate::server); unit tests drive `dispatch` directly.

use crate::params::RequestBody;
use crate::responses::CannedResponse;
use futures::future::BoxFuture;
use hyper::Method;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// A decoded inbound request handed to an interceptor.
#[derive(Debug, Clone)]
pub struct InterceptedRequest {
    pub method: Method,
    /// Path plus query string, e.g. `/api/rtm.start?pretty=1`.
    pub path_and_query: String,
    pub headers: HashMap<String, String>,
    pub body: RequestBody,
}

impl InterceptedRequest {
    /// Path with the query string stripped.
    pub fn path(&self) -> &str {
        self.path_and_query
            .split('?')
            .next()
            .unwrap_or(&self.path_and_query)
    }
}

/// Handler invoked for a matched request.
pub type InterceptHandler =
    Arc<dyn Fn(InterceptedRequest) -> BoxFuture<'static, CannedResponse> + Send + Sync>;

/// Capability for registering URL/method matchers with a reply callback.
pub trait Intercept: Send + Sync {
    fn register_interceptor(&self, methods: &[Method], prefix: &str, handler: InterceptHandler);
}

struct Route {
    methods: Vec<Method>,
    prefix: String,
    handler: InterceptHandler,
}

/// Longest-prefix router over registered interceptors.
#[derive(Default)]
pub struct InterceptRouter {
    routes: RwLock<Vec<Route>>,
}

impl InterceptRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Dispatch a request to the best-matching interceptor, or `None` when no
    /// registered matcher covers it.
    pub async fn dispatch(&self, request: InterceptedRequest) -> Option<CannedResponse> {
        let handler = {
            let routes = self.routes.read();
            routes
                .iter()
                .filter(|route| {
                    route.methods.contains(&request.method)
                        && request.path().starts_with(&route.prefix)
                })
                .max_by_key(|route| route.prefix.len())
                .map(|route| Arc::clone(&route.handler))
        };

        match handler {
            Some(handler) => Some(handler(request).await),
            None => None,
        }
    }
}

impl Intercept for InterceptRouter {
    fn register_interceptor(&self, methods: &[Method], prefix: &str, handler: InterceptHandler) {
        debug!(?methods, %prefix, "registered interceptor");
        self.routes.write().push(Route {
            methods: methods.to_vec(),
            prefix: prefix.to_string(),
            handler,
        });
    }
}
