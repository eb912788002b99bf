//! Route table and path matcher.
//!
//! One table per method. A table keeps its patterns in registration order
//! next to an exact-string index, so a lookup is:
//!
//! 1. exact hit on the whole path, O(1), wins over any `:param` pattern;
//! 2. otherwise a scan in registration order, first structural match wins.
//!
//! Patterns are split on `/` and compared segment by segment. A segment
//! starting with `:` binds the request segment under the name after the
//! colon; anything else must be equal byte for byte. Segment counts must
//! agree, so `/users/:id` never matches `/users` or `/users/1/posts`.
//!
//! Nothing is validated at registration time. A pattern that can never match
//! is stored and never matches.

use std::collections::HashMap;
use std::sync::Arc;

use crate::handler::{BoxedHandler, Handler};
use crate::method::Method;

/// Path parameters bound by a `:name` pattern segment. Values are always
/// strings, even when they look numeric.
pub type Params = HashMap<String, String>;

/// The route table.
///
/// `App` builds one as routes are registered. A table can also be built up
/// front with [`Router::get`] / [`Router::post`] and handed to
/// [`App::with_router`](crate::App::with_router).
///
/// Cloning is cheap: handlers are shared, only the pattern strings are copied.
#[derive(Clone, Default)]
pub struct Router {
    routes: HashMap<Method, Table>,
}

#[derive(Clone, Default)]
struct Table {
    routes: Vec<Route>,
    exact: HashMap<String, usize>,
}

#[derive(Clone)]
struct Route {
    pattern: String,
    handler: BoxedHandler,
}

/// A successful lookup: the matched handler plus the parameters it bound.
pub struct RouteMatch {
    pattern: String,
    handler: BoxedHandler,
    params: Params,
}

impl RouteMatch {
    /// The registered pattern that matched, e.g. `/users/:id`.
    pub fn pattern(&self) -> &str { &self.pattern }
    pub fn params(&self) -> &Params { &self.params }

    pub(crate) fn into_parts(self) -> (BoxedHandler, Params) {
        (self.handler, self.params)
    }
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a `GET` handler. Returns `self` for chaining.
    pub fn get(self, pattern: &str, handler: impl Handler) -> Self {
        self.on(Method::Get, pattern, handler)
    }

    /// Register a `POST` handler. Returns `self` for chaining.
    pub fn post(self, pattern: &str, handler: impl Handler) -> Self {
        self.on(Method::Post, pattern, handler)
    }

    /// Register a handler for a method + pattern pair.
    ///
    /// Registering the same pattern twice replaces the handler and keeps the
    /// pattern's original position in the scan order.
    pub fn on(mut self, method: Method, pattern: &str, handler: impl Handler) -> Self {
        self.insert(method, pattern, handler.into_boxed_handler());
        self
    }

    pub(crate) fn insert(&mut self, method: Method, pattern: &str, handler: BoxedHandler) {
        let table = self.routes.entry(method).or_default();
        match table.exact.get(pattern) {
            Some(&index) => table.routes[index].handler = handler,
            None => {
                table.exact.insert(pattern.to_owned(), table.routes.len());
                table.routes.push(Route { pattern: pattern.to_owned(), handler });
            }
        }
    }

    /// Resolve `method` + `path` to a handler.
    ///
    /// `method` is the raw wire string; anything that is not a routable
    /// [`Method`] yields `None`, as does a path nothing matches.
    pub fn lookup(&self, method: &str, path: &str) -> Option<RouteMatch> {
        let method: Method = method.parse().ok()?;
        let table = self.routes.get(&method)?;

        if let Some(&index) = table.exact.get(path) {
            return Some(table.routes[index].matched(Params::new()));
        }

        table.routes.iter().find_map(|route| {
            match_pattern(&route.pattern, path).map(|params| route.matched(params))
        })
    }

    /// Number of registered patterns for `method`.
    pub fn len(&self, method: Method) -> usize {
        self.routes.get(&method).map_or(0, |table| table.routes.len())
    }

    pub fn is_empty(&self) -> bool {
        self.routes.values().all(|table| table.routes.is_empty())
    }
}

impl Route {
    fn matched(&self, params: Params) -> RouteMatch {
        RouteMatch {
            pattern: self.pattern.clone(),
            handler: Arc::clone(&self.handler),
            params,
        }
    }
}

/// Segment-wise comparison of one pattern against one concrete path.
fn match_pattern(pattern: &str, path: &str) -> Option<Params> {
    if pattern.split('/').count() != path.split('/').count() {
        return None;
    }

    let mut params = Params::new();
    for (expected, actual) in pattern.split('/').zip(path.split('/')) {
        match expected.strip_prefix(':') {
            Some(name) => {
                params.insert(name.to_owned(), actual.to_owned());
            }
            None if expected == actual => {}
            None => return None,
        }
    }
    Some(params)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Request, Response};

    async fn noop(_req: Request, _res: Response) {}

    fn router(patterns: &[&str]) -> Router {
        patterns.iter().fold(Router::new(), |r, p| r.get(p, noop))
    }

    #[test]
    fn exact_match_has_no_params() {
        let r = router(&["/", "/users"]);
        let m = r.lookup("GET", "/users").unwrap();
        assert_eq!(m.pattern(), "/users");
        assert!(m.params().is_empty());
    }

    #[test]
    fn exact_match_beats_earlier_param_pattern() {
        let r = router(&["/users/:id", "/users/me"]);
        let m = r.lookup("GET", "/users/me").unwrap();
        assert_eq!(m.pattern(), "/users/me");
        assert!(m.params().is_empty());
    }

    #[test]
    fn binds_params_as_strings() {
        let r = router(&["/users/:id"]);
        let m = r.lookup("GET", "/users/42").unwrap();
        assert_eq!(m.params().get("id").map(String::as_str), Some("42"));
    }

    #[test]
    fn binds_several_params() {
        let r = router(&["/posts/:post/comments/:comment"]);
        let m = r.lookup("GET", "/posts/7/comments/abc").unwrap();
        assert_eq!(m.params()["post"], "7");
        assert_eq!(m.params()["comment"], "abc");
    }

    #[test]
    fn segment_count_must_agree() {
        let r = router(&["/users/:id"]);
        assert!(r.lookup("GET", "/users").is_none());
        assert!(r.lookup("GET", "/users/1/posts").is_none());
        assert!(r.lookup("GET", "/users/1/").is_none());
    }

    #[test]
    fn empty_segment_binds_empty_param() {
        let r = router(&["/users/:id"]);
        let m = r.lookup("GET", "/users/").unwrap();
        assert_eq!(m.params()["id"], "");
    }

    #[test]
    fn literals_are_case_sensitive() {
        let r = router(&["/Users/:id"]);
        assert!(r.lookup("GET", "/users/1").is_none());
    }

    #[test]
    fn first_registered_param_pattern_wins() {
        let r = router(&["/a/:x", "/:y/b"]);
        let m = r.lookup("GET", "/a/b").unwrap();
        assert_eq!(m.pattern(), "/a/:x");
        assert_eq!(m.params()["x"], "b");
    }

    #[test]
    fn reregistering_keeps_scan_position() {
        let r = router(&["/a/:x", "/:y/b", "/a/:x"]);
        assert_eq!(r.len(Method::Get), 2);
        assert_eq!(r.lookup("GET", "/a/b").unwrap().pattern(), "/a/:x");
    }

    #[test]
    fn unknown_method_or_path_is_no_match() {
        let r = router(&["/"]);
        assert!(r.lookup("POST", "/").is_none());
        assert!(r.lookup("DELETE", "/").is_none());
        assert!(r.lookup("GET", "/missing").is_none());
    }

    #[test]
    fn malformed_pattern_never_matches() {
        let r = router(&["users/:id"]);
        assert!(r.lookup("GET", "/users/1").is_none());
        assert!(r.lookup("GET", "/1").is_none());
    }

    #[test]
    fn methods_have_separate_tables() {
        let r = Router::new().get("/x", noop).post("/y", noop);
        assert!(r.lookup("GET", "/y").is_none());
        assert!(r.lookup("POST", "/y").is_some());
        assert_eq!(r.len(Method::Post), 1);
        assert!(!r.is_empty());
    }
}
