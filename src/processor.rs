//! Pipeline extension points.
//!
//! Three kinds of processor run around resolution and handler invocation:
//!
//! | Kind | Runs | Receives | Can end the request |
//! |---|---|---|---|
//! | [`PreProcessor`] | before path parsing | context | yes |
//! | [`Middleware`] | after auth, before the handler | route + context | no |
//! | [`PostProcessor`] | always, last, exactly once | context | ends only the post chain |
//!
//! Every processor returns an [`Outcome`]. Errors it carries are logged and
//! never replace the response. Closures of the right shape implement the
//! traits directly:
//!
//! ```rust,ignore
//! router.pre(|ctx: &mut Context| {
//!     if ctx.request().header("x-api-key").is_none() {
//!         ctx.respond(Response::status(Status::Forbidden));
//!         return Outcome::terminate();
//!     }
//!     Outcome::proceed()
//! })
//! ```

use tracing::info;

use crate::context::Context;
use crate::error::ApiError;
use crate::route::Route;

/// What a processor asks of the pipeline.
#[derive(Clone, Debug, Default, PartialEq)]
#[must_use]
pub struct Outcome {
    pub terminate: bool,
    pub error: Option<ApiError>,
}

impl Outcome {
    /// Continue with the next processor / stage.
    pub fn proceed() -> Self {
        Self::default()
    }

    /// Stop here. For pre-processors this skips straight to post-processing;
    /// for post-processors it skips the remaining post-processors.
    pub fn terminate() -> Self {
        Self { terminate: true, error: None }
    }

    /// Attaches an error to be logged.
    pub fn with_error(mut self, error: ApiError) -> Self {
        self.error = Some(error);
        self
    }
}

pub trait PreProcessor: Send + Sync + 'static {
    fn process(&self, ctx: &mut Context) -> Outcome;
}

pub trait Middleware: Send + Sync + 'static {
    fn process(&self, route: &Route, ctx: &mut Context) -> Outcome;
}

pub trait PostProcessor: Send + Sync + 'static {
    fn process(&self, ctx: &mut Context) -> Outcome;
}

impl<F> PreProcessor for F
where
    F: Fn(&mut Context) -> Outcome + Send + Sync + 'static,
{
    fn process(&self, ctx: &mut Context) -> Outcome {
        self(ctx)
    }
}

impl<F> Middleware for F
where
    F: Fn(&Route, &mut Context) -> Outcome + Send + Sync + 'static,
{
    fn process(&self, route: &Route, ctx: &mut Context) -> Outcome {
        self(route, ctx)
    }
}

// `PostProcessor` has the same closure shape as `PreProcessor`, so closures
// are wrapped in `post_fn` instead of getting a second blanket impl.

/// Adapts a closure into a [`PostProcessor`].
pub fn post_fn<F>(f: F) -> PostFn<F>
where
    F: Fn(&mut Context) -> Outcome + Send + Sync + 'static,
{
    PostFn(f)
}

/// See [`post_fn`].
pub struct PostFn<F>(F);

impl<F> PostProcessor for PostFn<F>
where
    F: Fn(&mut Context) -> Outcome + Send + Sync + 'static,
{
    fn process(&self, ctx: &mut Context) -> Outcome {
        (self.0)(ctx)
    }
}

// ── Access log ────────────────────────────────────────────────────────────────

/// Logs one `info` event per request: method, path, status, latency.
///
/// Installed by default; see [`RouterConfig::access_log`](crate::RouterConfig).
#[derive(Clone, Copy, Debug, Default)]
pub struct AccessLog;

impl PostProcessor for AccessLog {
    fn process(&self, ctx: &mut Context) -> Outcome {
        let status = ctx.response().map_or(0, |r| r.status_code());
        info!(
            target: "crudroute::access",
            method = %ctx.request().method(),
            path = %ctx.request().path(),
            status,
            elapsed_us = ctx.elapsed().as_micros() as u64,
            "request"
        );
        Outcome::proceed()
    }
}
