//! Incoming HTTP request view.

use std::borrow::Cow;

use http::request::Parts;
use http::{HeaderMap, Uri, Version};
use percent_encoding::percent_decode_str;

use crate::body::{self, Body, Form};
use crate::db::Database;
use crate::router::Params;

/// An incoming request as a handler sees it.
///
/// Wraps the raw request head and adds what the dispatcher works out for
/// it: the decoded path, the query mapping, the route parameters, the parsed
/// body and the database gateway.
pub struct Request {
    parts: Parts,
    path: String,
    query: Form,
    pub(crate) params: Params,
    pub(crate) body: Body,
    pub(crate) db: Database,
}

impl Request {
    /// Build the view from a raw request head.
    ///
    /// `params` start empty, `body` starts as [`Body::None`] and the database
    /// handle is unconfigured until the dispatcher binds the real one.
    pub fn from_parts(parts: Parts) -> Self {
        let path = decode_path(parts.uri.path()).into_owned();
        let query = parts.uri.query().map(|q| body::parse_form(q.as_bytes())).unwrap_or_default();
        Self {
            parts,
            path,
            query,
            params: Params::new(),
            body: Body::None,
            db: Database::default(),
        }
    }

    pub fn method(&self) -> &http::Method { &self.parts.method }
    pub fn uri(&self) -> &Uri { &self.parts.uri }
    pub fn version(&self) -> Version { self.parts.version }
    pub fn headers(&self) -> &HeaderMap { &self.parts.headers }

    /// Case-insensitive header lookup. `None` for values that are not visible
    /// ASCII.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.parts.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Percent-decoded path, without the query string. No trailing-slash
    /// normalization.
    pub fn path(&self) -> &str { &self.path }

    /// The decoded query string.
    pub fn query(&self) -> &Form { &self.query }

    pub fn params(&self) -> &Params { &self.params }

    /// Returns a named path parameter.
    ///
    /// For a route `/users/:id`, `req.param("id")` on `/users/42` returns `Some("42")`.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    pub fn body(&self) -> &Body { &self.body }

    /// Move the body out, leaving [`Body::None`] behind.
    pub fn take_body(&mut self) -> Body {
        std::mem::take(&mut self.body)
    }

    /// The database gateway bound to this request.
    pub fn db(&self) -> &Database { &self.db }

    /// The raw request head.
    pub fn parts(&self) -> &Parts { &self.parts }
}

fn decode_path(raw: &str) -> Cow<'_, str> {
    percent_decode_str(raw).decode_utf8_lossy()
}
