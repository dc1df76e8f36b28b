//! Handler trait, type erasure, and the tagged handler result.
//!
//! # How async handlers are stored
//!
//! Route trees hold handlers of *different* types, so each one is hidden
//! behind a trait object (`dyn ErasedHandler`) and stored uniformly:
//!
//! ```text
//! async fn list(req: Request) -> HandlerResult { … }   ← user writes this
//!        ↓ Capability::declared(convention, list)
//! list.into_boxed_handler()                             ← Handler blanket impl
//!        ↓
//! Arc::new(FnHandler(list))                             ← shared by both bindings
//!        ↓  stored as BoxedHandler = Arc<dyn ErasedHandler>
//! handler.call(req)  at request time                    ← one vtable dispatch
//! ```
//!
//! The collection route and the `:id` route of a capability share the same
//! `Arc`, so a controller method is erased exactly once.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::context::Context;
use crate::error::{ApiError, codes};
use crate::request::Request;

// ── Internal types ────────────────────────────────────────────────────────────

/// A heap-allocated, type-erased future.
///
/// `Send` lets tokio move the future across threads; `'a` lets trait objects
/// such as [`Authenticator`](crate::Authenticator) borrow the route and
/// context for the duration of the call.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Internal dispatch interface.
///
/// `#[doc(hidden)] pub` rather than `pub(crate)` because it appears in the
/// return type of the public `Handler` trait's `into_boxed_handler` method.
#[doc(hidden)]
pub trait ErasedHandler {
    fn call(&self, req: Request) -> BoxFuture<'static, HandlerResult>;
}

/// A type-erased handler shared across concurrent requests and across the
/// collection / single-resource bindings of one capability.
#[doc(hidden)]
pub type BoxedHandler = Arc<dyn ErasedHandler + Send + Sync + 'static>;

// ── Public Handler trait ──────────────────────────────────────────────────────

/// Implemented for every valid route handler.
///
/// Automatically satisfied for any `async fn` (or closure) with the shape:
///
/// ```text
/// async fn name(req: Request) -> impl Into<HandlerResult>
/// ```
///
/// This is the handler signature check: a controller method of any other
/// shape cannot be placed in a capability table at all. The trait is sealed.
pub trait Handler: private::Sealed + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_boxed_handler(self) -> BoxedHandler;
}

mod private {
    pub trait Sealed {}
}

impl<F, Fut, R> private::Sealed for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: Into<HandlerResult> + Send + 'static,
{
}

impl<F, Fut, R> Handler for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: Into<HandlerResult> + Send + 'static,
{
    fn into_boxed_handler(self) -> BoxedHandler {
        Arc::new(FnHandler(self))
    }
}

/// Newtype wrapper bridging a concrete handler `F` to [`ErasedHandler`].
struct FnHandler<F>(F);

impl<F, Fut, R> ErasedHandler for FnHandler<F>
where
    F: Fn(Request) -> Fut + Send + Sync,
    Fut: Future<Output = R> + Send + 'static,
    R: Into<HandlerResult> + Send + 'static,
{
    fn call(&self, req: Request) -> BoxFuture<'static, HandlerResult> {
        let fut = (self.0)(req);
        Box::pin(async move { fut.await.into() })
    }
}

// ── HandlerResult ─────────────────────────────────────────────────────────────

/// A responder given full control over the response.
pub type Responder = Box<dyn FnOnce(&mut Context) + Send + 'static>;

/// What a handler produced. Exactly one outcome, checked by the compiler.
pub enum HandlerResult {
    /// Logged at its severity, rendered as an error payload at its status.
    Error(ApiError),
    /// Serialized as `{"payloads": {...}}` with `200 OK`.
    Payload(Payloads),
    /// Delegated: the responder writes the response itself. A responder that
    /// writes nothing is answered with `500`.
    Custom(Responder),
}

impl HandlerResult {
    pub fn custom(responder: impl FnOnce(&mut Context) + Send + 'static) -> Self {
        Self::Custom(Box::new(responder))
    }
}

impl fmt::Debug for HandlerResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error(e) => f.debug_tuple("Error").field(e).finish(),
            Self::Payload(p) => f.debug_tuple("Payload").field(p).finish(),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

impl From<ApiError> for HandlerResult {
    fn from(e: ApiError) -> Self { Self::Error(e) }
}

impl From<Payloads> for HandlerResult {
    fn from(p: Payloads) -> Self { Self::Payload(p) }
}

/// Lets handlers use `?` on [`ApiError`]s and return `Ok(payloads)`.
impl From<Result<Payloads, ApiError>> for HandlerResult {
    fn from(r: Result<Payloads, ApiError>) -> Self {
        match r {
            Ok(p) => Self::Payload(p),
            Err(e) => Self::Error(e),
        }
    }
}

// ── Payloads ──────────────────────────────────────────────────────────────────

/// Named JSON values returned on the success path.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Payloads(Map<String, Value>);

impl Payloads {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an already-built JSON value.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(name.into(), value.into());
        self
    }

    /// Serializes `value` and adds it; a serialization failure becomes a
    /// `500` [`ApiError`] ready to be returned with `?`.
    pub fn try_with<T: Serialize + ?Sized>(
        mut self,
        name: impl Into<String>,
        value: &T,
    ) -> Result<Self, ApiError> {
        let name = name.into();
        let value = serde_json::to_value(value).map_err(|e| {
            ApiError::internal(
                codes::PAYLOAD_SERIALIZATION,
                format!("payload `{name}` could not be serialized: {e}"),
            )
        })?;
        self.0.insert(name, value);
        Ok(self)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::method::Method;

    #[derive(Serialize)]
    struct Widget {
        id: u32,
        name: &'static str,
    }

    #[tokio::test]
    async fn closures_and_fns_become_handlers() {
        async fn list(_req: Request) -> Payloads {
            Payloads::new().with("count", 2)
        }
        let boxed = list.into_boxed_handler();
        let result = boxed.call(Request::new(Method::Get, "/v1/widget/list")).await;
        match result {
            HandlerResult::Payload(p) => assert_eq!(p.get("count"), Some(&Value::from(2))),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn question_mark_errors_become_error_results() {
        let handler = |req: Request| async move {
            let id = req.param("id").ok_or_else(|| ApiError::bad_request(1, "missing id"))?;
            Payloads::new().try_with("id", id)
        };
        let result = handler.into_boxed_handler().call(Request::new(Method::Get, "/")).await;
        assert!(matches!(result, HandlerResult::Error(e) if e.code() == 1));
    }

    #[test]
    fn try_with_serializes_structs() {
        let p = Payloads::new()
            .try_with("widget", &Widget { id: 4, name: "gear" })
            .unwrap();
        assert_eq!(p.get("widget").unwrap()["name"], "gear");
        assert_eq!(p.len(), 1);
    }
}
