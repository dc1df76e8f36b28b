//! The authentication capability.
//!
//! A controller that can authenticate requests returns itself (or any other
//! [`Authenticator`]) from [`Controller::authenticator`](crate::Controller::authenticator).
//! The registry binds that authenticator to every auth-required route the
//! controller declares, and the pipeline consults it before middleware runs.

use crate::context::Context;
use crate::handler::BoxFuture;
use crate::route::Route;

/// Why an authenticator refused a request. Sent to the client as a `401`
/// error payload carrying this code and message.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("[{code}] {message}")]
pub struct AuthRejection {
    pub code: i64,
    pub message: String,
}

impl AuthRejection {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self { code, message: message.into() }
    }
}

/// Verifies whether a request may proceed to the given route.
///
/// ```rust,ignore
/// impl Authenticator for WidgetController {
///     fn perform_auth<'a>(&'a self, _route: &'a Route, ctx: &'a Context)
///         -> BoxFuture<'a, Result<(), AuthRejection>>
///     {
///         Box::pin(async move {
///             match ctx.request().header("authorization") {
///                 Some(token) if self.tokens.contains(token) => Ok(()),
///                 _ => Err(AuthRejection::new(1323798307, "missing or unknown token")),
///             }
///         })
///     }
/// }
/// ```
pub trait Authenticator: Send + Sync + 'static {
    fn perform_auth<'a>(
        &'a self,
        route: &'a Route,
        ctx: &'a Context,
    ) -> BoxFuture<'a, Result<(), AuthRejection>>;
}
