//! Route registration and dispatch.
//!
//! # Responsibilities
//! - Compile patterns at registration and keep registration order
//! - Resolve method + path to the first matching route
//! - Bind path parameters, run the middleware chain, invoke the handler
//! - Contain handler faults so every request ends in a well-formed response
//!
//! # Design Decisions
//! - Registration happens on [`RouterBuilder`]; `build()` freezes the table
//!   into an immutable [`Router`] that is shared without locks
//! - First match by registration order, not best match
//! - A routing miss is a normal 404 response, not an error
//! - Panics are caught at the dispatch boundary and become 500s

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use http::Method;
use serde::Serialize;

use crate::http::middleware::{run_chain, Flow, Middleware, SharedMiddleware};
use crate::http::request::Request;
use crate::http::response::{Response, DEFAULT_SERVER_NAME};
use crate::routing::handler::{Handler, HandlerResult};
use crate::routing::pattern::{PathPattern, PatternError};

/// A compiled route.
struct Route {
    method: Method,
    pattern: PathPattern,
    middleware: Vec<SharedMiddleware>,
    handler: Handler,
}

/// Registered `(method, pattern)` pair, for introspection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteInfo {
    pub method: String,
    pub path: String,
}

impl Route {
    fn info(&self) -> RouteInfo {
        RouteInfo {
            method: self.method.to_string(),
            path: self.pattern.as_str().to_string(),
        }
    }
}

/// Collects routes before traffic starts.
pub struct RouterBuilder {
    routes: Vec<Route>,
    global: Vec<SharedMiddleware>,
    server_name: String,
}

impl Default for RouterBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RouterBuilder {
    pub fn new() -> Self {
        Self {
            routes: Vec::new(),
            global: Vec::new(),
            server_name: DEFAULT_SERVER_NAME.to_string(),
        }
    }

    /// Value of the `Server` header on every response.
    pub fn server_name(&mut self, name: impl Into<String>) -> &mut Self {
        self.server_name = name.into();
        self
    }

    /// Append `middleware` to the global prefix chain. The prefix is copied
    /// into each route at registration, so only later routes see it.
    pub fn with_global(&mut self, middleware: impl Middleware + 'static) -> &mut Self {
        self.global.push(Arc::new(middleware));
        self
    }

    /// Register a route. Its chain is the current global prefix followed by
    /// `middleware`, in the order given.
    pub fn route<H>(
        &mut self,
        method: Method,
        pattern: &str,
        middleware: Vec<SharedMiddleware>,
        handler: H,
    ) -> Result<&mut Self, PatternError>
    where
        H: Fn(&mut Request, &mut Response) -> HandlerResult + Send + Sync + 'static,
    {
        let pattern = PathPattern::compile(pattern)?;
        let mut chain = self.global.clone();
        chain.extend(middleware);

        tracing::debug!(
            method = %method,
            pattern = pattern.as_str(),
            middleware = chain.len(),
            "Route registered"
        );
        self.routes.push(Route {
            method,
            pattern,
            middleware: chain,
            handler: Arc::new(handler),
        });
        Ok(self)
    }

    pub fn get<H>(
        &mut self,
        pattern: &str,
        middleware: Vec<SharedMiddleware>,
        handler: H,
    ) -> Result<&mut Self, PatternError>
    where
        H: Fn(&mut Request, &mut Response) -> HandlerResult + Send + Sync + 'static,
    {
        self.route(Method::GET, pattern, middleware, handler)
    }

    pub fn post<H>(
        &mut self,
        pattern: &str,
        middleware: Vec<SharedMiddleware>,
        handler: H,
    ) -> Result<&mut Self, PatternError>
    where
        H: Fn(&mut Request, &mut Response) -> HandlerResult + Send + Sync + 'static,
    {
        self.route(Method::POST, pattern, middleware, handler)
    }

    pub fn put<H>(
        &mut self,
        pattern: &str,
        middleware: Vec<SharedMiddleware>,
        handler: H,
    ) -> Result<&mut Self, PatternError>
    where
        H: Fn(&mut Request, &mut Response) -> HandlerResult + Send + Sync + 'static,
    {
        self.route(Method::PUT, pattern, middleware, handler)
    }

    pub fn delete<H>(
        &mut self,
        pattern: &str,
        middleware: Vec<SharedMiddleware>,
        handler: H,
    ) -> Result<&mut Self, PatternError>
    where
        H: Fn(&mut Request, &mut Response) -> HandlerResult + Send + Sync + 'static,
    {
        self.route(Method::DELETE, pattern, middleware, handler)
    }

    /// Routes registered so far.
    pub fn routes(&self) -> Vec<RouteInfo> {
        self.routes.iter().map(Route::info).collect()
    }

    /// Freeze the route table.
    pub fn build(self) -> Router {
        tracing::info!(routes = self.routes.len(), "Router built");
        Router {
            routes: self.routes,
            server_name: self.server_name,
        }
    }
}

/// Immutable route table.
pub struct Router {
    routes: Vec<Route>,
    server_name: String,
}

impl Router {
    /// A fresh 200 response carrying this router's `Server` header.
    pub fn new_response(&self) -> Response {
        Response::with_server_name(&self.server_name)
    }

    pub fn routes(&self) -> Vec<RouteInfo> {
        self.routes.iter().map(Route::info).collect()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// First route matching `method` and `path`, with its decoded captures.
    fn find(&self, method: &Method, path: &str) -> Option<(&Route, Vec<(String, String)>)> {
        self.routes
            .iter()
            .filter(|route| route.method == *method)
            .find_map(|route| {
                route.pattern.matches(path).map(|captures| {
                    let params = captures
                        .into_iter()
                        .map(|(name, raw)| (name.to_string(), decode_segment(raw)))
                        .collect();
                    (route, params)
                })
            })
    }

    /// Run `req` through its route and return the response.
    pub fn dispatch(&self, mut req: Request) -> Response {
        let mut resp = self.new_response();

        let Some((route, params)) = self.find(&req.method, &req.path) else {
            tracing::debug!(method = %req.method, path = %req.path, "No route matched");
            resp.not_found("Route not found");
            return resp;
        };
        req.path_params.extend(params);

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            if run_chain(&route.middleware, &mut req, &mut resp) == Flow::Halt {
                return Ok(());
            }
            (route.handler)(&mut req, &mut resp)
        }));

        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(e)) => e.apply(&mut resp),
            Err(payload) => {
                tracing::error!(
                    method = %req.method,
                    path = %req.path,
                    panic = panic_message(payload.as_ref()),
                    "Handler panicked"
                );
                resp.server_error("Internal server error");
            }
        }
        resp
    }
}

/// Percent-decode a captured segment, keeping it raw if it is not UTF-8.
fn decode_segment(raw: &str) -> String {
    urlencoding::decode(raw)
        .map(|decoded| decoded.into_owned())
        .unwrap_or_else(|_| raw.to_string())
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else {
        "non-string panic payload"
    }
}
