//! Bearer-token authentication middleware.
//! Rejects requests without a known token unless the path is public.

use std::collections::HashSet;
use std::sync::Arc;

use dashmap::DashSet;

use crate::http::middleware::{Flow, Middleware};
use crate::http::request::Request;
use crate::http::response::Response;

/// Source of truth for valid tokens.
pub trait TokenStore: Send + Sync {
    fn is_valid(&self, token: &str) -> bool;
}

/// In-memory token set. Tokens can be added while the server runs.
#[derive(Debug, Default)]
pub struct StaticTokenStore {
    tokens: DashSet<String>,
}

impl StaticTokenStore {
    pub fn new<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let store = Self::default();
        for token in tokens {
            store.add(token);
        }
        store
    }

    pub fn add(&self, token: impl Into<String>) {
        self.tokens.insert(token.into());
    }

    pub fn revoke(&self, token: &str) -> bool {
        self.tokens.remove(token).is_some()
    }
}

impl TokenStore for StaticTokenStore {
    fn is_valid(&self, token: &str) -> bool {
        self.tokens.contains(token)
    }
}

/// Checks the `Authorization` header against a [`TokenStore`].
pub struct BearerAuth {
    store: Arc<dyn TokenStore>,
    public_paths: HashSet<String>,
}

impl BearerAuth {
    pub fn new(store: Arc<dyn TokenStore>) -> Self {
        Self {
            store,
            public_paths: HashSet::new(),
        }
    }

    /// Paths (exact match) that skip authentication.
    pub fn with_public_paths<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.public_paths.extend(paths.into_iter().map(Into::into));
        self
    }

    fn is_public(&self, path: &str) -> bool {
        self.public_paths.contains(path)
    }
}

/// Strip an optional, case-insensitive `Bearer ` prefix.
fn extract_token(header: &str) -> &str {
    const PREFIX: &str = "bearer ";
    match header.get(..PREFIX.len()) {
        Some(prefix) if prefix.eq_ignore_ascii_case(PREFIX) => header[PREFIX.len()..].trim(),
        _ => header.trim(),
    }
}

impl Middleware for BearerAuth {
    fn handle(&self, req: &mut Request, resp: &mut Response) -> Flow {
        if self.is_public(&req.path) {
            return Flow::Continue;
        }

        let token = match req.header("authorization") {
            Some(value) if !value.trim().is_empty() => extract_token(value).to_string(),
            _ => {
                resp.unauthorized("Missing authorization header");
                return Flow::Halt;
            }
        };

        if token.is_empty() || !self.store.is_valid(&token) {
            tracing::warn!(path = %req.path, "Rejected request with invalid token");
            resp.unauthorized("Invalid or expired token");
            return Flow::Halt;
        }

        req.set_context("user_token", token);
        req.set_context("authenticated", true);
        Flow::Continue
    }
}
