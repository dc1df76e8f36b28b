//! The dispatch pipeline.
//!
//! Every request takes one forward path through fixed stages:
//!
//! ```text
//! 1 pre-processors ─→ 2 path parse ─→ 3 resolve ─→ 4 auth ─→ 5 middleware
//!        │                 │              │           │
//!        │ terminate       │ 400/404/500  │ 404       │ 401
//!        ▼                 ▼              ▼           ▼
//!        └───────────────────────────────────────────────→ 8 post-processors
//!                                                              ▲
//!                     6 handler ─→ 7 translate result ─────────┘
//! ```
//!
//! Stage 8 is not a call at the end of [`Router::dispatch`]: it lives in the
//! `Drop` of a guard that owns the request's context for the whole run. Any
//! way out of stages 1–7, an early `return`, a panic unwinding through the
//! handler, or the transport dropping the request future, runs the
//! post-processors exactly once.

use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use tracing::{debug, error, warn};

use crate::config::RouterConfig;
use crate::context::Context;
use crate::endpoint::{PathError, PathParser, VersionedPathParser};
use crate::error::{ApiError, codes};
use crate::handler::{HandlerResult, Payloads};
use crate::processor::{AccessLog, Middleware, Outcome, PostProcessor, PreProcessor};
use crate::registry::Registry;
use crate::request::Request;
use crate::response::Response;
use crate::status::Status;

/// The application: a frozen [`Registry`] plus the processors around it.
///
/// Build it once at startup; pass it to [`Server::serve`](crate::Server::serve)
/// or call [`dispatch`](Router::dispatch) from any other transport. Each
/// builder method returns `self` so configuration chains naturally.
pub struct Router {
    registry: Arc<Registry>,
    parser: Box<dyn PathParser>,
    pre: Vec<Box<dyn PreProcessor>>,
    middleware: Vec<Box<dyn Middleware>>,
    post: Vec<Box<dyn PostProcessor>>,
}

impl Router {
    /// A router with the default configuration: no base path, access log on.
    pub fn new(registry: Registry) -> Self {
        Self::from_config(&RouterConfig::default(), registry)
    }

    pub fn from_config(config: &RouterConfig, registry: Registry) -> Self {
        let mut router = Self {
            registry: Arc::new(registry),
            parser: Box::new(VersionedPathParser::new(&config.base_path)),
            pre: Vec::new(),
            middleware: Vec::new(),
            post: Vec::new(),
        };
        if config.access_log {
            router = router.post(AccessLog);
        }
        router
    }

    /// Replaces the path parser.
    pub fn parser(mut self, parser: impl PathParser) -> Self {
        self.parser = Box::new(parser);
        self
    }

    /// Appends a pre-processor. Pre-processors run in registration order.
    pub fn pre(mut self, processor: impl PreProcessor) -> Self {
        self.pre.push(Box::new(processor));
        self
    }

    /// Appends a middleware processor.
    pub fn middleware(mut self, processor: impl Middleware) -> Self {
        self.middleware.push(Box::new(processor));
        self
    }

    /// Appends a post-processor. Post-processors run in registration order,
    /// after any already present (such as the default access log).
    pub fn post(mut self, processor: impl PostProcessor) -> Self {
        self.post.push(Box::new(processor));
        self
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Runs the pipeline for one request and returns its single response.
    pub async fn dispatch(&self, request: Request) -> Response {
        let mut ctx = Context::new(request, Arc::clone(&self.registry));
        {
            let mut guard = PostProcessing { ctx: &mut ctx, processors: &self.post };
            self.run(&mut guard).await;
        }
        ctx.into_response()
    }

    /// Stages 1–7. Every `return` lands in the post-processing guard.
    async fn run(&self, ctx: &mut Context) {
        // 1. Pre-processing
        for processor in &self.pre {
            let outcome = processor.process(ctx);
            log_processor_error("pre-processor", &outcome);
            if outcome.terminate {
                debug!(path = %ctx.request().path(), "pre-processor ended the request");
                return;
            }
        }

        // 2. Path parsing
        let method = ctx.request().method();
        let raw_path = ctx.request().path().to_owned();
        match self.parser.parse(method, &raw_path) {
            Ok(endpoint) => ctx.set_endpoint(endpoint),
            Err(PathError::Client(e)) => {
                e.log();
                ctx.respond(e.into_response());
                return;
            }
            Err(PathError::Server(e)) => {
                error!(path = %raw_path, "path parser failed: {e}");
                ctx.respond(e.into_response());
                return;
            }
        }

        // 3. Resolution
        let route_path = self.parser.route_path(&raw_path);
        let Some(resolved) = self.registry.lookup(method, route_path) else {
            debug!(%method, path = %raw_path, "no route");
            let e = ApiError::not_found(codes::NOT_FOUND, Status::NotFound.line());
            ctx.respond(e.into_response());
            return;
        };
        let route = resolved.route;
        ctx.request_mut().set_params(resolved.params);
        ctx.refine_endpoint(route.action());

        // 4. Auth gate
        if let Some(authenticator) = route.authenticator() {
            if let Err(rejection) = authenticator.perform_auth(route, ctx).await {
                debug!(route = %route.path(), code = rejection.code, "authentication rejected");
                let e = ApiError::unauthorized(rejection.code, rejection.message);
                ctx.respond(e.into_response());
                return;
            }
        }

        // 5. Middleware
        for processor in &self.middleware {
            let outcome = processor.process(route, ctx);
            log_processor_error("middleware", &outcome);
            if outcome.terminate {
                warn!(route = %route.path(), "middleware cannot end a request, continuing");
            }
        }

        // 6. Handler
        let result = route.handler().call(ctx.request().clone()).await;

        // 7. Result translation
        translate(result, ctx);
    }
}

fn translate(result: HandlerResult, ctx: &mut Context) {
    match result {
        HandlerResult::Error(e) => {
            e.log();
            ctx.respond(e.into_response());
        }
        HandlerResult::Payload(payloads) => ctx.respond(success(&payloads)),
        HandlerResult::Custom(responder) => {
            responder(ctx);
            if !ctx.has_response() {
                error!(path = %ctx.request().path(), "custom responder wrote no response");
                let e = ApiError::internal(codes::INVALID_HANDLER_RESPONSE, "Invalid Handler response");
                ctx.respond(e.into_response());
            }
        }
    }
}

/// Success body: `{"payloads": {...}}`.
fn success(payloads: &Payloads) -> Response {
    #[derive(serde::Serialize)]
    struct Body<'a> {
        payloads: &'a Payloads,
    }

    match serde_json::to_vec(&Body { payloads }) {
        Ok(bytes) => Response::json(bytes),
        Err(e) => {
            let e = ApiError::internal(codes::PAYLOAD_SERIALIZATION, format!("payload serialization failed: {e}"));
            e.log();
            e.into_response()
        }
    }
}

fn log_processor_error(kind: &'static str, outcome: &Outcome) {
    if let Some(e) = &outcome.error {
        warn!(kind, status = e.status(), code = e.code(), "processor error: {}", e.message());
    }
}

// ── Guaranteed post-processing ────────────────────────────────────────────────

/// Owns the context for stages 1–7 and runs the post-processors when dropped.
struct PostProcessing<'a> {
    ctx: &'a mut Context,
    processors: &'a [Box<dyn PostProcessor>],
}

impl Deref for PostProcessing<'_> {
    type Target = Context;

    fn deref(&self) -> &Context {
        self.ctx
    }
}

impl DerefMut for PostProcessing<'_> {
    fn deref_mut(&mut self) -> &mut Context {
        self.ctx
    }
}

impl Drop for PostProcessing<'_> {
    fn drop(&mut self) {
        self.ctx.ensure_response();
        for processor in self.processors {
            let outcome = processor.process(self.ctx);
            log_processor_error("post-processor", &outcome);
            if outcome.terminate {
                break;
            }
        }
    }
}
