//! The trie-based request router.
//!
//! Registration builds a flat pool of nodes addressed by integer index (root is
//! index 0) rather than a tree of owned/`Rc`'d nodes — sidestepping the cyclic-
//! ownership problem a recursive node type would otherwise have, the same idiom the
//! teacher codebase used for its connection-buffer bookkeeping, applied here to
//! routing instead.
//!
//! A prefixed sub-router (see [`Router::route`]) is not a separate object: it's the
//! same `Router`, with its prefix temporarily extended for the duration of a
//! closure. Registrations made inside the closure land in the same node pool and
//! the same middleware list as the parent, satisfying the "derived router shares
//! state with its parent" requirement without an `Rc<RefCell<_>>` indirection.

use crate::http::types::Method;
use crate::middleware::Middleware;
use crate::{Handler, Request, Response, StatusCode};
use std::collections::HashMap;
use std::sync::Arc;

struct Node {
    handlers: HashMap<Method, Arc<dyn Handler>>,
    literal_children: Vec<(String, usize)>,
    param_child: Option<(String, usize)>,
    catch_all: Option<(String, HashMap<Method, Arc<dyn Handler>>)>,
}

impl Node {
    fn empty() -> Self {
        Node { handlers: HashMap::new(), literal_children: Vec::new(), param_child: None, catch_all: None }
    }
}

/// A router: a node pool, an ordered middleware stack, and the path prefix under
/// which the *next* registration made through this handle lands.
pub struct Router {
    nodes: Vec<Node>,
    middleware: Vec<Middleware>,
    prefix: String,
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl Router {
    /// A fresh router with just a root node and no middleware.
    pub fn new() -> Self {
        Router { nodes: vec![Node::empty()], middleware: Vec::new(), prefix: String::new() }
    }

    /// Appends a middleware to this router's stack. Middleware registered earlier
    /// wraps closer to the handler (runs later on the way in, earlier on the way
    /// out) per the "leftmost runs first" composition rule — see
    /// [`Router::compose`].
    pub fn middleware(&mut self, mw: Middleware) -> &mut Self {
        self.middleware.push(mw);
        self
    }

    /// Registers `handler` for `method` at `pattern`, under this router's current
    /// prefix. `pattern` segments are `literal`, `{name}` (single-segment capture),
    /// or a terminal `*` (catch-all).
    pub fn add_route<H: Handler>(&mut self, method: Method, pattern: &str, handler: H) -> &mut Self {
        let full = format!("{}{}", self.prefix, pattern);
        let segments: Vec<&str> = full.split('/').filter(|s| !s.is_empty()).collect();
        let handler: Arc<dyn Handler> = Arc::new(handler);

        let mut idx = 0usize;
        let mut iter = segments.iter().peekable();
        while let Some(&seg) = iter.next() {
            let is_last = iter.peek().is_none();

            if seg == "*" {
                if !is_last {
                    panic!("catch-all `*` must be the final segment of a route pattern");
                }
                let node = &mut self.nodes[idx];
                let map = match &mut node.catch_all {
                    Some((_, map)) => map,
                    None => {
                        node.catch_all = Some(("*".to_string(), HashMap::new()));
                        &mut node.catch_all.as_mut().unwrap().1
                    }
                };
                map.insert(method, handler);
                return self;
            }

            if let Some(name) = seg.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
                let node = &mut self.nodes[idx];
                idx = match &node.param_child {
                    Some((_, child)) => *child,
                    None => {
                        let child = self.nodes.len();
                        self.nodes.push(Node::empty());
                        self.nodes[idx].param_child = Some((name.to_string(), child));
                        child
                    }
                };
            } else {
                let node = &self.nodes[idx];
                idx = match node.literal_children.iter().find(|(s, _)| s == seg) {
                    Some((_, child)) => *child,
                    None => {
                        let child = self.nodes.len();
                        self.nodes.push(Node::empty());
                        self.nodes[idx].literal_children.push((seg.to_string(), child));
                        child
                    }
                };
            }
        }

        self.nodes[idx].handlers.insert(method, handler);
        self
    }

    /// Registers a group of routes under an additional prefix, sharing this
    /// router's node pool and middleware.
    pub fn route<F: FnOnce(&mut Router)>(&mut self, prefix: &str, f: F) {
        let saved_len = self.prefix.len();
        self.prefix.push_str(prefix);
        f(self);
        self.prefix.truncate(saved_len);
    }

    /// Resolves `(method, path)` to a handler and captured params, a method-miss
    /// (404/405 handled by the caller), or a route miss. `path` must already be
    /// percent-decoded and normalized (as [`crate::http::request::Request`]
    /// guarantees).
    pub(crate) fn lookup(&self, method: Method, path: &str) -> Lookup {
        let trimmed = if path != "/" { path.trim_end_matches('/') } else { path };
        let segments: Vec<&str> = trimmed.split('/').filter(|s| !s.is_empty()).collect();

        match resolve(&self.nodes, 0, &segments) {
            Some((map, params)) => {
                if let Some(handler) = map.get(&method) {
                    return Lookup::Matched(handler.clone(), params);
                }
                if method == Method::Head {
                    if let Some(handler) = map.get(&Method::Get) {
                        return Lookup::Matched(handler.clone(), params);
                    }
                }
                if map.is_empty() {
                    Lookup::NotFound
                } else {
                    Lookup::MethodNotAllowed(allowed_methods(map))
                }
            }
            None => Lookup::NotFound,
        }
    }

    /// Runs the full dispatch pipeline: lookup, param binding, middleware
    /// composition, and handler invocation. On a route/method miss, returns the
    /// 404/405 response directly, bypassing middleware entirely — by contract,
    /// middleware (logging, auth, rate-limiting) never runs against a dead path.
    pub async fn dispatch(&self, request: Request) -> Response {
        match self.lookup(request.method(), request.path()) {
            Lookup::Matched(handler, params) => {
                let mut request = request;
                request.set_params(params);
                let composed = self.compose(handler);
                composed.handle(request).await
            }
            Lookup::MethodNotAllowed(mut allowed) => {
                if allowed.contains(&Method::Get) && !allowed.contains(&Method::Head) {
                    allowed.push(Method::Head);
                }
                let allow_header = allowed.iter().map(Method::as_str).collect::<Vec<_>>().join(", ");
                let mut resp = Response::new();
                resp.status(StatusCode::MethodNotAllowed).header("Allow", allow_header).body("");
                resp
            }
            Lookup::NotFound => {
                let mut resp = Response::new();
                resp.status(StatusCode::NotFound).body("");
                resp
            }
        }
    }

    /// Wraps `handler` in this router's middleware stack. The rightmost middleware
    /// wraps the handler first (is "closest" to it), so the leftmost-registered
    /// middleware is the outermost wrapper and therefore runs first on the way in.
    fn compose(&self, handler: Arc<dyn Handler>) -> Arc<dyn Handler> {
        self.middleware.iter().rev().fold(handler, |inner, mw| mw(inner))
    }

    /// Enumerates every registered `(method, pattern)` pair via a depth-first walk
    /// of the pool in edge-insertion order. Intended for diagnostics/tests, not
    /// request-path performance.
    pub fn routes(&self) -> Vec<(Method, String)> {
        let mut out = Vec::new();
        self.walk(0, String::new(), &mut out);
        out
    }

    fn walk(&self, idx: usize, prefix: String, out: &mut Vec<(Method, String)>) {
        let node = &self.nodes[idx];
        let mut methods: Vec<_> = node.handlers.keys().copied().collect();
        methods.sort_by_key(|m| m.as_str());
        for method in methods {
            let pattern = if prefix.is_empty() { "/".to_string() } else { prefix.clone() };
            out.push((method, pattern));
        }
        for (segment, child) in &node.literal_children {
            self.walk(*child, format!("{prefix}/{segment}"), out);
        }
        if let Some((name, child)) = &node.param_child {
            self.walk(*child, format!("{prefix}/{{{name}}}"), out);
        }
        if let Some((_, map)) = &node.catch_all {
            let mut methods: Vec<_> = map.keys().copied().collect();
            methods.sort_by_key(|m| m.as_str());
            for method in methods {
                out.push((method, format!("{prefix}/*")));
            }
        }
    }
}

pub(crate) enum Lookup {
    Matched(Arc<dyn Handler>, HashMap<String, String>),
    MethodNotAllowed(Vec<Method>),
    NotFound,
}

fn allowed_methods(map: &HashMap<Method, Arc<dyn Handler>>) -> Vec<Method> {
    let mut methods: Vec<_> = map.keys().copied().collect();
    methods.sort_by_key(Method::as_str);
    methods
}

/// Backtracking segment-by-segment match: static children are tried first, then
/// the parametric edge, then the catch-all — in that strict order, at every level
/// of the trie, so a request matching both a literal and a parametric route always
/// takes the literal.
fn resolve<'a>(
    nodes: &'a [Node],
    idx: usize,
    segments: &[&str],
) -> Option<(&'a HashMap<Method, Arc<dyn Handler>>, HashMap<String, String>)> {
    let node = &nodes[idx];

    let Some((seg, rest)) = segments.split_first() else {
        return Some((&node.handlers, HashMap::new()));
    };

    if let Some((_, child)) = node.literal_children.iter().find(|(s, _)| s == seg) {
        if let Some(found) = resolve(nodes, *child, rest) {
            if !found.0.is_empty() {
                return Some(found);
            }
        }
    }

    if let Some((name, child)) = &node.param_child {
        if let Some((map, mut params)) = resolve(nodes, *child, rest) {
            params.insert(name.clone(), seg.to_string());
            return Some((map, params));
        }
    }

    if let Some((name, map)) = &node.catch_all {
        let remainder = format!("/{}", segments.join("/"));
        let mut params = HashMap::new();
        params.insert(name.clone(), remainder);
        return Some((map, params));
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn ok_handler(_req: Request) -> Response {
        let mut resp = Response::new();
        resp.body("ok");
        resp
    }

    fn get_body(resp: &Response) -> &[u8] {
        resp.body_bytes()
    }

    #[tokio::test]
    async fn literal_beats_parametric() {
        let mut router = Router::new();
        router.add_route(Method::Get, "/a/x", ok_handler);
        router.add_route(Method::Get, "/a/{id}", |req: Request| {
            let id = req.param("id").unwrap_or("").to_string();
            async move {
                let mut resp = Response::new();
                resp.body(format!("param:{id}"));
                resp
            }
        });

        let req = Request::new(Method::Get, "/a/x".to_string(), vec![], vec![], Default::default());
        let resp = router.dispatch(req).await;
        assert_eq!(get_body(&resp), b"ok");
    }

    #[tokio::test]
    async fn dead_end_literal_falls_through_to_parametric_sibling() {
        let mut router = Router::new();
        router.add_route(Method::Get, "/files/{id}", |req: Request| {
            let id = req.param("id").unwrap_or("").to_string();
            async move {
                let mut resp = Response::new();
                resp.body(format!("param:{id}"));
                resp
            }
        });
        router.add_route(Method::Get, "/files/list/all", ok_handler);

        let req = Request::new(Method::Get, "/files/list".to_string(), vec![], vec![], Default::default());
        let resp = router.dispatch(req).await;
        assert_eq!(get_body(&resp), b"param:list");
    }

    #[tokio::test]
    async fn wildcard_captures_remainder() {
        let mut router = Router::new();
        router.add_route(Method::Get, "/static/*", |req: Request| {
            let star = req.param("*").unwrap_or("").to_string();
            async move {
                let mut resp = Response::new();
                resp.body(star);
                resp
            }
        });

        let req = Request::new(
            Method::Get,
            "/static/css/style.css".to_string(),
            vec![],
            vec![],
            Default::default(),
        );
        let resp = router.dispatch(req).await;
        assert_eq!(get_body(&resp), b"/css/style.css");
    }

    #[tokio::test]
    async fn head_falls_back_to_get() {
        let mut router = Router::new();
        router.add_route(Method::Get, "/hello", ok_handler);

        let req = Request::new(Method::Head, "/hello".to_string(), vec![], vec![], Default::default());
        let resp = router.dispatch(req).await;
        assert_eq!(resp.status_code(), StatusCode::Ok);
    }

    #[tokio::test]
    async fn method_miss_returns_405_with_allow() {
        let mut router = Router::new();
        router.add_route(Method::Get, "/resource", ok_handler);
        router.add_route(Method::Post, "/resource", ok_handler);

        let req = Request::new(Method::Delete, "/resource".to_string(), vec![], vec![], Default::default());
        let resp = router.dispatch(req).await;
        assert_eq!(resp.status_code(), StatusCode::MethodNotAllowed);
        let allow = resp.get_header("allow").unwrap();
        assert!(allow.contains("GET"));
        assert!(allow.contains("POST"));
    }

    #[tokio::test]
    async fn unmatched_path_returns_404() {
        let router = Router::new();
        let req = Request::new(Method::Get, "/missing".to_string(), vec![], vec![], Default::default());
        let resp = router.dispatch(req).await;
        assert_eq!(resp.status_code(), StatusCode::NotFound);
    }

    #[tokio::test]
    async fn trailing_slash_matches_same_route() {
        let mut router = Router::new();
        router.add_route(Method::Get, "/hello", ok_handler);

        let req = Request::new(Method::Get, "/hello/".to_string(), vec![], vec![], Default::default());
        let resp = router.dispatch(req).await;
        assert_eq!(resp.status_code(), StatusCode::Ok);
    }

    #[test]
    fn route_grouping_shares_pool_and_prefix() {
        let mut router = Router::new();
        router.route("/api", |r| {
            r.add_route(Method::Get, "/users", ok_handler);
        });
        let routes = router.routes();
        assert!(routes.iter().any(|(m, p)| *m == Method::Get && p == "/api/users"));
    }
}
