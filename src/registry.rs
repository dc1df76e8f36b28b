//! The route registry: per-method trees, controller sweeps, diagnostics.
//!
//! # Build, then serve
//!
//! A [`Registry`] is filled single-threaded at startup and then moved into a
//! [`Router`](crate::Router), which shares it behind an `Arc`. Nothing can
//! register routes after that point, so concurrent resolution needs no locks.
//!
//! # Controllers
//!
//! A [`Controller`] lists its capabilities in a table. Each entry is either
//! *declared* (a [`Convention`] built in code) or *named* (a capability name
//! such as `AuthPostHandlerV2Create`, parsed by the
//! [naming convention](crate::convention)). Every routable capability is
//! bound twice, once over the collection and once with an `:id` segment
//! after the entity:
//!
//! ```text
//! GetHandlerV1List  →  GET /v1/widget/list
//!                      GET /v1/widget/:id/list
//! ```

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::Arc;

use tracing::{debug, error, info, trace, warn};

use crate::auth::Authenticator;
use crate::convention::{self, AUTH_MARKER, Convention, HANDLER_KEYWORD};
use crate::handler::{BoxedHandler, Handler, HandlerResult};
use crate::method::Method;
use crate::request::Request;
use crate::route::{Route, RouteNode};

// ── Errors ────────────────────────────────────────────────────────────────────

/// A fatal registration error: a programming mistake in a controller or in
/// the startup code, never bad input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("invalid entity name `{name}`: {reason}")]
    InvalidEntityName { name: String, reason: &'static str },

    #[error(
        "auth-required handler `{handler}` declared for entity `{entity}`, \
         but controller `{controller}` provides no authenticator"
    )]
    MissingAuthenticator {
        entity: String,
        controller: String,
        handler: String,
    },
}

// ── Capabilities ──────────────────────────────────────────────────────────────

enum Source {
    Named(String),
    Declared(Convention),
}

/// One entry in a controller's capability table.
pub struct Capability {
    source: Source,
    handler: Option<BoxedHandler>,
}

impl Capability {
    /// A capability routed by its name, e.g. `"GetHandlerV1List"`.
    ///
    /// Names that do not follow the convention are skipped at registration
    /// with a warning; names without `Handler` are skipped silently.
    pub fn named(name: impl Into<String>, handler: impl Handler) -> Self {
        Self {
            source: Source::Named(name.into()),
            handler: Some(handler.into_boxed_handler()),
        }
    }

    /// A capability routed by an explicit [`Convention`].
    pub fn declared(convention: Convention, handler: impl Handler) -> Self {
        Self {
            source: Source::Declared(convention),
            handler: Some(handler.into_boxed_handler()),
        }
    }

    /// A named capability backed by a controller method taking `Arc<Self>`:
    ///
    /// ```rust,ignore
    /// Capability::method("GetHandlerV1List", &self, Self::list)
    /// ```
    pub fn method<C, F, Fut, R>(name: impl Into<String>, controller: &Arc<C>, f: F) -> Self
    where
        C: Send + Sync + 'static,
        F: Fn(Arc<C>, Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: Into<HandlerResult> + Send + 'static,
    {
        let controller = Arc::clone(controller);
        Self::named(name, move |req| f(Arc::clone(&controller), req))
    }

    /// A listed capability that is not a request handler. Registration skips
    /// it; a helper whose name looks like a handler is reported as such.
    pub fn helper(name: impl Into<String>) -> Self {
        Self { source: Source::Named(name.into()), handler: None }
    }

    fn name(&self) -> String {
        match &self.source {
            Source::Named(name) => name.clone(),
            Source::Declared(convention) => convention.handler_name(),
        }
    }

    /// Auth-marked handler, judged before the rest of the name is parsed: an
    /// `Auth` name that fails later checks still demands an authenticator.
    fn requires_auth(&self) -> bool {
        match &self.source {
            Source::Named(name) => {
                self.handler.is_some() && name.contains(HANDLER_KEYWORD) && name.starts_with(AUTH_MARKER)
            }
            Source::Declared(convention) => convention.requires_auth,
        }
    }
}

/// An object exposing a resource's routes.
///
/// ```rust,ignore
/// struct WidgetController { /* … */ }
///
/// impl Controller for WidgetController {
///     fn capabilities(self: Arc<Self>) -> Vec<Capability> {
///         vec![
///             Capability::method("GetHandlerV1List", &self, Self::list),
///             Capability::declared(Convention::new(Verb::Post, 2, "create").auth(), create),
///         ]
///     }
///
///     fn authenticator(self: Arc<Self>) -> Option<Arc<dyn Authenticator>> {
///         Some(self)
///     }
/// }
/// ```
pub trait Controller: Send + Sync + 'static {
    /// The capability table, swept in order.
    fn capabilities(self: Arc<Self>) -> Vec<Capability>;

    /// The authenticator bound to this controller's auth-required routes.
    fn authenticator(self: Arc<Self>) -> Option<Arc<dyn Authenticator>> {
        None
    }

    /// Hook for routes that do not follow the convention. Runs during
    /// [`Registry::register_entity`], before the swept routes are bound.
    fn register_routes(self: Arc<Self>, _routes: &mut EntityRoutes<'_>) {}

    /// Label used in diagnostics. Defaults to the type's name.
    fn name(&self) -> String {
        short_type_name::<Self>()
    }
}

fn short_type_name<T: ?Sized>() -> String {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base).to_owned()
}

// ── Registry ──────────────────────────────────────────────────────────────────

/// The result of a successful [`Registry::lookup`].
#[derive(Debug)]
pub struct Resolved<'a> {
    pub route: &'a Route,
    /// Values captured by `:name` segments along the matched path.
    pub params: HashMap<String, String>,
}

/// Per-method route trees plus the entities registered into them.
#[derive(Debug, Default)]
pub struct Registry {
    trees: BTreeMap<Method, RouteNode>,
    entities: BTreeMap<String, String>,
}

/// What the sweep decided for one capability, before anything is bound.
struct Planned {
    convention: Convention,
    handler: BoxedHandler,
    handler_name: String,
}

/// Labels and authenticator attached to a binding.
struct Binding<'a> {
    version: Option<u16>,
    entity: &'a str,
    action: &'a str,
    controller: &'a str,
    handler_name: String,
    authenticator: Option<Arc<dyn Authenticator>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Registration ─────────────────────────────────────────────────────────

    /// Binds `handler` to `method` + `path`.
    ///
    /// Passing an authenticator makes the route auth-required. The handler's
    /// type name serves as its diagnostic label.
    pub fn register<H: Handler>(
        &mut self,
        method: Method,
        path: &str,
        handler: H,
        authenticator: Option<Arc<dyn Authenticator>>,
    ) -> &Route {
        let binding = Binding {
            version: None,
            entity: "",
            action: "",
            controller: "",
            handler_name: short_type_name::<H>(),
            authenticator,
        };
        self.bind(method, path, handler.into_boxed_handler(), binding)
    }

    /// Sweeps `controller` into routes under `entity`; see [`try_register_entity`].
    ///
    /// # Panics
    ///
    /// Panics on a [`RegistryError`]. Those are startup-time programming
    /// errors; serving with a half-registered controller is never correct.
    ///
    /// [`try_register_entity`]: Registry::try_register_entity
    pub fn register_entity<C: Controller>(&mut self, entity: &str, controller: Arc<C>) -> usize {
        match self.try_register_entity(entity, controller) {
            Ok(count) => count,
            Err(e) => {
                error!("route registration failed: {e}");
                panic!("route registration failed: {e}");
            }
        }
    }

    /// Sweeps `controller` into routes under `entity`, returning how many
    /// routes were bound.
    ///
    /// Every capability is validated before the first route is bound, so an
    /// error leaves the registry untouched.
    pub fn try_register_entity<C: Controller>(
        &mut self,
        entity: &str,
        controller: Arc<C>,
    ) -> Result<usize, RegistryError> {
        validate_entity_name(entity)?;

        let controller_name = controller.name();
        let authenticator = Arc::clone(&controller).authenticator();

        let mut planned = Vec::new();
        for capability in Arc::clone(&controller).capabilities() {
            if capability.requires_auth() && authenticator.is_none() {
                return Err(RegistryError::MissingAuthenticator {
                    entity: entity.to_owned(),
                    controller: controller_name,
                    handler: capability.name(),
                });
            }
            if let Some(plan) = plan(entity, &controller_name, capability) {
                planned.push(plan);
            }
        }

        if let Some(previous) = self.entities.insert(entity.to_owned(), controller_name.clone()) {
            warn!(entity, previous = %previous, controller = %controller_name, "entity registered twice");
        }

        let mut scope = EntityRoutes {
            registry: self,
            entity,
            controller: &controller_name,
            count: 0,
        };
        controller.register_routes(&mut scope);
        let mut count = scope.count;

        for Planned { convention, handler, handler_name } in planned {
            let auth = convention
                .requires_auth
                .then(|| authenticator.clone())
                .flatten();
            for path in [convention.collection_path(entity), convention.member_path(entity)] {
                let binding = Binding {
                    version: Some(convention.version),
                    entity,
                    action: &convention.action,
                    controller: &controller_name,
                    handler_name: handler_name.clone(),
                    authenticator: auth.clone(),
                };
                self.bind(convention.method(), &path, Arc::clone(&handler), binding);
                count += 1;
            }
        }

        info!(entity, controller = %controller_name, routes = count, "entity registered");
        Ok(count)
    }

    fn bind(&mut self, method: Method, path: &str, handler: BoxedHandler, b: Binding<'_>) -> &Route {
        let route = Route {
            method,
            path: path.to_owned(),
            version: b.version,
            entity: b.entity.to_owned(),
            action: b.action.to_owned(),
            handler,
            authenticator: b.authenticator,
            controller: b.controller.to_owned(),
            handler_name: b.handler_name,
        };
        debug!(route = %route.description(), "route bound");

        let node = self.trees.entry(method).or_default().insert(path);
        let (bound, replaced) = node.bind(route);
        if let Some(replaced) = replaced {
            warn!(replaced = %replaced.description(), "route replaced by a later registration");
        }
        bound
    }

    // ── Resolution ───────────────────────────────────────────────────────────

    /// Finds the route bound for `method` + `path`, with captured parameters.
    pub fn lookup(&self, method: Method, path: &str) -> Option<Resolved<'_>> {
        let tree = self.trees.get(&method)?;
        let mut params = HashMap::new();
        let route = tree.resolve(path, &mut params)?.route()?;
        Some(Resolved { route, params })
    }

    /// Finds the route bound for `method` + `path`.
    pub fn resolve(&self, method: Method, path: &str) -> Option<&Route> {
        self.lookup(method, path).map(|r| r.route)
    }

    // ── Diagnostics ──────────────────────────────────────────────────────────

    /// All bound routes: methods in [`Method`] order, then depth-first in
    /// registration order.
    pub fn routes(&self) -> Vec<&Route> {
        let mut out = Vec::new();
        for tree in self.trees.values() {
            tree.routes(&mut out);
        }
        out
    }

    /// One line per route: `[AUTH ]METHOD /path → Controller.Handler`.
    pub fn describe(&self) -> Vec<String> {
        self.routes().into_iter().map(Route::description).collect()
    }

    pub fn route_count(&self) -> usize {
        self.routes().len()
    }

    /// [`describe`](Self::describe) joined by newlines, with a trailing
    /// newline. Empty when nothing is registered.
    pub fn summary(&self) -> String {
        let lines = self.describe();
        if lines.is_empty() {
            return String::new();
        }
        let mut out = lines.join("\n");
        out.push('\n');
        out
    }

    /// Emits every route description as an `info` event.
    pub fn log_routes(&self) {
        for line in self.describe() {
            info!("{line}");
        }
    }

    /// Registered entity names with their controller labels.
    pub fn entities(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entities.iter().map(|(e, c)| (e.as_str(), c.as_str()))
    }

    /// The tree for `method`, if anything was registered under it.
    pub fn tree(&self, method: Method) -> Option<&RouteNode> {
        self.trees.get(&method)
    }
}

/// Applies the naming convention to one capability. `None` means "not a
/// route"; the reason has been logged.
fn plan(entity: &str, controller: &str, capability: Capability) -> Option<Planned> {
    let handler_name = capability.name();

    let convention = match capability.source {
        Source::Declared(convention) => match convention.validate() {
            Ok(()) => convention,
            Err(reason) => {
                warn!(entity, controller, capability = %handler_name, %reason, "skipping capability");
                return None;
            }
        },
        Source::Named(name) => {
            if !name.contains(HANDLER_KEYWORD) {
                trace!(entity, controller, capability = %name, "not a handler, skipping");
                return None;
            }
            if capability.handler.is_none() {
                warn!(
                    entity, controller, capability = %name,
                    "skipping capability: not a request handler"
                );
                return None;
            }
            match convention::parse(&name) {
                Ok(convention) => convention,
                Err(reason) => {
                    warn!(entity, controller, capability = %name, %reason, "skipping capability");
                    return None;
                }
            }
        }
    };

    let handler = capability.handler?;
    Some(Planned { convention, handler, handler_name })
}

fn validate_entity_name(name: &str) -> Result<(), RegistryError> {
    let invalid = |reason| RegistryError::InvalidEntityName { name: name.to_owned(), reason };
    if name.is_empty() {
        return Err(invalid("name must have at least one character"));
    }
    if !name.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.')) {
        return Err(invalid("only ASCII letters, digits, `_`, `-` and `.` are allowed"));
    }
    Ok(())
}

// ── Entity-scoped registration ────────────────────────────────────────────────

/// Registration handle passed to [`Controller::register_routes`]. Paths are
/// prefixed with `/v{version}/{entity}`.
pub struct EntityRoutes<'r> {
    registry: &'r mut Registry,
    entity: &'r str,
    controller: &'r str,
    count: usize,
}

impl EntityRoutes<'_> {
    pub fn entity(&self) -> &str {
        self.entity
    }

    /// Binds `handler` at `/v{version}/{entity}{suffix}`. `suffix` is empty
    /// or starts with `/`.
    pub fn register<H: Handler>(
        &mut self,
        method: Method,
        version: u16,
        suffix: &str,
        handler: H,
        authenticator: Option<Arc<dyn Authenticator>>,
    ) -> &Route {
        let path = format!("/v{version}/{}{suffix}", self.entity);
        let action = crate::route::segments(suffix).last().unwrap_or_default();
        let binding = Binding {
            version: Some(version),
            entity: self.entity,
            action,
            controller: self.controller,
            handler_name: short_type_name::<H>(),
            authenticator,
        };
        self.count += 1;
        self.registry.bind(method, &path, handler.into_boxed_handler(), binding)
    }
}
