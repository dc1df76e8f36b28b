//! Bound routes and the per-method path-segment tree.
//!
//! Each HTTP method owns one [`RouteNode`] tree. A node is a single path
//! segment; shared prefixes share nodes. A node carries a [`Route`] only when
//! a handler was registered for exactly that path.
//!
//! # Matching
//!
//! Descent is segment by segment, without backtracking. At each level the
//! children are tried in three passes:
//!
//! 1. a literal child equal to the requested segment,
//! 2. the first-registered parameter child (`:name`), capturing the segment,
//! 3. a `*` wildcard child, matching any single segment.
//!
//! Precedence therefore does not depend on registration order: `/v1/widget/list`
//! beats `/v1/widget/:id` for the request `/v1/widget/list` whichever was
//! registered first. Once a child is chosen the decision is final, so a dead
//! end below a literal match is a miss even if a parameter sibling could have
//! matched.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::auth::Authenticator;
use crate::handler::BoxedHandler;
use crate::method::Method;

/// Segment marker matching any single segment.
pub const WILDCARD: &str = "*";

/// Prefix marking a named parameter segment, e.g. `:id`.
pub const PARAM_PREFIX: char = ':';

// ── Route ─────────────────────────────────────────────────────────────────────

/// A handler bound to a method and path template.
///
/// Routes are created during startup registration and are read-only once the
/// registry is handed to the [`Router`](crate::Router).
pub struct Route {
    pub(crate) method: Method,
    pub(crate) path: String,
    pub(crate) version: Option<u16>,
    pub(crate) entity: String,
    pub(crate) action: String,
    pub(crate) handler: BoxedHandler,
    pub(crate) authenticator: Option<Arc<dyn Authenticator>>,
    pub(crate) controller: String,
    pub(crate) handler_name: String,
}

impl Route {
    pub fn method(&self) -> Method { self.method }

    /// Path template as registered, e.g. `/v1/widget/:id/list`.
    pub fn path(&self) -> &str { &self.path }

    /// API version for convention-derived and entity-scoped routes.
    pub fn version(&self) -> Option<u16> { self.version }

    pub fn entity(&self) -> &str { &self.entity }

    /// Lower-cased action segment; empty for the default (collection) action.
    pub fn action(&self) -> &str { &self.action }

    /// A route requires auth exactly when it has an authenticator bound.
    pub fn requires_auth(&self) -> bool { self.authenticator.is_some() }

    pub fn authenticator(&self) -> Option<&Arc<dyn Authenticator>> {
        self.authenticator.as_ref()
    }

    pub fn controller_name(&self) -> &str { &self.controller }
    pub fn handler_name(&self) -> &str { &self.handler_name }

    pub(crate) fn handler(&self) -> &BoxedHandler { &self.handler }

    /// `[AUTH ]METHOD /path → Controller.Handler`
    pub fn description(&self) -> String {
        let auth = if self.requires_auth() { "AUTH " } else { "" };
        if self.controller.is_empty() {
            format!("{auth}{} {} → {}", self.method, self.path, self.handler_name)
        } else {
            format!(
                "{auth}{} {} → {}.{}",
                self.method, self.path, self.controller, self.handler_name
            )
        }
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("version", &self.version)
            .field("entity", &self.entity)
            .field("action", &self.action)
            .field("requires_auth", &self.requires_auth())
            .field("controller", &self.controller)
            .field("handler_name", &self.handler_name)
            .finish_non_exhaustive()
    }
}

// ── RouteNode ─────────────────────────────────────────────────────────────────

/// One path segment in a method's route tree.
#[derive(Debug, Default)]
pub struct RouteNode {
    segment: String,
    children: Vec<RouteNode>,
    route: Option<Route>,
}

impl RouteNode {
    fn new(segment: &str) -> Self {
        Self { segment: segment.to_owned(), ..Self::default() }
    }

    pub fn segment(&self) -> &str { &self.segment }
    pub fn children(&self) -> &[RouteNode] { &self.children }
    pub fn route(&self) -> Option<&Route> { self.route.as_ref() }

    fn is_param(&self) -> bool {
        self.segment.starts_with(PARAM_PREFIX)
    }

    /// Walks (and extends) the tree along `path`, returning the node for its
    /// last segment. Existing children with an identical segment are reused.
    pub(crate) fn insert(&mut self, path: &str) -> &mut RouteNode {
        let mut node = self;
        for part in segments(path) {
            let idx = match node.children.iter().position(|c| c.segment == part) {
                Some(idx) => idx,
                None => {
                    node.children.push(RouteNode::new(part));
                    node.children.len() - 1
                }
            };
            node = &mut node.children[idx];
        }
        node
    }

    /// Binds `route` to this node. Also returns the route it replaced, if any.
    pub(crate) fn bind(&mut self, route: Route) -> (&Route, Option<Route>) {
        let replaced = self.route.take();
        let bound: &Route = self.route.insert(route);
        (bound, replaced)
    }

    /// Descends along `path`, recording `:name` captures into `params`.
    ///
    /// Returns the reached node whether or not it carries a route; callers
    /// decide what an unbound node means.
    pub(crate) fn resolve(&self, path: &str, params: &mut HashMap<String, String>) -> Option<&RouteNode> {
        let mut node = self;
        for part in segments(path) {
            node = node.child_for(part, params)?;
        }
        Some(node)
    }

    fn child_for(&self, part: &str, params: &mut HashMap<String, String>) -> Option<&RouteNode> {
        if let Some(literal) = self.children.iter().find(|c| c.segment == part) {
            return Some(literal);
        }
        if let Some(param) = self.children.iter().find(|c| c.is_param()) {
            params.insert(param.segment[1..].to_owned(), part.to_owned());
            return Some(param);
        }
        self.children.iter().find(|c| c.segment == WILDCARD)
    }

    /// Depth-first, in child-insertion order.
    pub(crate) fn routes<'a>(&'a self, out: &mut Vec<&'a Route>) {
        if let Some(route) = &self.route {
            out.push(route);
        }
        for child in &self.children {
            child.routes(out);
        }
    }
}

/// Splits a path on `/`, skipping empty segments (leading, trailing, doubled).
pub(crate) fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AuthRejection;
    use crate::context::Context;
    use crate::handler::{BoxFuture, Handler, Payloads};
    use crate::request::Request;

    fn route(method: Method, path: &str, name: &str) -> Route {
        let handler = |_req: Request| async { Payloads::new() };
        Route {
            method,
            path: path.to_owned(),
            version: None,
            entity: String::new(),
            action: String::new(),
            handler: handler.into_boxed_handler(),
            authenticator: None,
            controller: String::new(),
            handler_name: name.to_owned(),
        }
    }

    fn tree(paths: &[&str]) -> RouteNode {
        let mut root = RouteNode::default();
        for path in paths {
            root.insert(path).bind(route(Method::Get, path, path));
        }
        root
    }

    fn hit<'a>(root: &'a RouteNode, path: &str) -> Option<(&'a str, HashMap<String, String>)> {
        let mut params = HashMap::new();
        let node = root.resolve(path, &mut params)?;
        node.route().map(|r| (r.handler_name(), params))
    }

    #[test]
    fn shared_prefixes_share_nodes() {
        let root = tree(&["/v1/widget/list", "/v1/widget/:id/list", "/v1/gadget"]);
        assert_eq!(root.children().len(), 1);
        let v1 = &root.children()[0];
        assert_eq!(v1.segment(), "v1");
        assert_eq!(v1.children().len(), 2);
        assert_eq!(v1.children()[0].children().len(), 2);
    }

    #[test]
    fn resolves_registered_paths_exactly() {
        let root = tree(&["/v1/widget", "/v1/widget/:id", "/v1/widget/list"]);
        assert_eq!(hit(&root, "/v1/widget").unwrap().0, "/v1/widget");
        assert_eq!(hit(&root, "/v1/widget/list").unwrap().0, "/v1/widget/list");
        assert_eq!(hit(&root, "/v1/widget/:id").unwrap().0, "/v1/widget/:id");
    }

    #[test]
    fn captures_parameters() {
        let root = tree(&["/v1/widget/:id/list"]);
        let (name, params) = hit(&root, "/v1/widget/42/list").unwrap();
        assert_eq!(name, "/v1/widget/:id/list");
        assert_eq!(params.get("id").map(String::as_str), Some("42"));
    }

    #[test]
    fn literal_wins_over_parameter_regardless_of_order() {
        let param_first = tree(&["/v1/widget/:id", "/v1/widget/list"]);
        let literal_first = tree(&["/v1/widget/list", "/v1/widget/:id"]);
        for root in [&param_first, &literal_first] {
            assert_eq!(hit(root, "/v1/widget/list").unwrap().0, "/v1/widget/list");
            assert_eq!(hit(root, "/v1/widget/7").unwrap().0, "/v1/widget/:id");
        }
    }

    #[test]
    fn parameter_wins_over_wildcard() {
        let root = tree(&["/files/*", "/files/:name"]);
        let (name, params) = hit(&root, "/files/a.txt").unwrap();
        assert_eq!(name, "/files/:name");
        assert_eq!(params["name"], "a.txt");

        let only_wildcard = tree(&["/files/*"]);
        assert_eq!(hit(&only_wildcard, "/files/b.txt").unwrap().0, "/files/*");
    }

    #[test]
    fn does_not_backtrack() {
        let root = tree(&["/v1/widget/list", "/v1/widget/:id/list"]);
        // `list` is taken literally, and the literal node has no `list` child.
        assert!(hit(&root, "/v1/widget/list/list").is_none());
        assert!(hit(&root, "/v1/widget/9/list").is_some());
    }

    #[test]
    fn misses_unregistered_and_intermediate_paths() {
        let root = tree(&["/v1/widget/:id/list"]);
        assert!(hit(&root, "/v2/widget").is_none());
        assert!(hit(&root, "/v1/widget/9").is_none());
        assert!(hit(&root, "/v1").is_none());
    }

    #[test]
    fn ignores_empty_segments() {
        let root = tree(&["/v1/widget/"]);
        assert!(hit(&root, "//v1//widget").is_some());
    }

    struct AllowAll;

    impl Authenticator for AllowAll {
        fn perform_auth<'a>(
            &'a self,
            _: &'a Route,
            _: &'a Context,
        ) -> BoxFuture<'a, Result<(), AuthRejection>> {
            Box::pin(async { Ok(()) })
        }
    }

    #[test]
    fn description_marks_auth_and_controller() {
        let mut r = route(Method::Post, "/v2/widget/create", "AuthPostHandlerV2Create");
        r.controller = "WidgetController".to_owned();
        assert_eq!(
            r.description(),
            "POST /v2/widget/create → WidgetController.AuthPostHandlerV2Create"
        );

        r.authenticator = Some(Arc::new(AllowAll));
        assert!(r.requires_auth());
        assert_eq!(
            r.description(),
            "AUTH POST /v2/widget/create → WidgetController.AuthPostHandlerV2Create"
        );
    }

    #[test]
    fn description_without_controller() {
        let r = route(Method::Get, "/v1/health", "health");
        assert_eq!(r.description(), "GET /v1/health → health");
    }
}
