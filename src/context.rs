//! Per-request scratch state shared by the pipeline stages.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::endpoint::Endpoint;
use crate::error::{ApiError, codes};
use crate::registry::Registry;
use crate::request::Request;
use crate::response::Response;

/// State for one in-flight request.
///
/// Owned by exactly one pipeline run. Holds the inbound request, the
/// response slot, the parsed [`Endpoint`] once path parsing succeeded, and a
/// read-only handle on the route registry.
///
/// The response slot is write-once: the first [`respond`](Self::respond)
/// wins and later attempts are logged and dropped, so every request is
/// answered exactly once. Processors that need to decorate an existing
/// response use [`response_mut`](Self::response_mut).
pub struct Context {
    request: Request,
    response: Option<Response>,
    endpoint: Option<Endpoint>,
    registry: Arc<Registry>,
    started: Instant,
}

impl Context {
    pub fn new(request: Request, registry: Arc<Registry>) -> Self {
        Self {
            request,
            response: None,
            endpoint: None,
            registry,
            started: Instant::now(),
        }
    }

    pub fn request(&self) -> &Request { &self.request }
    pub fn request_mut(&mut self) -> &mut Request { &mut self.request }

    /// The parsed request target; `None` before (or after a failed) path parse.
    pub fn endpoint(&self) -> Option<&Endpoint> { self.endpoint.as_ref() }

    pub fn registry(&self) -> &Registry { &self.registry }

    /// Time since the context was created.
    pub fn elapsed(&self) -> Duration { self.started.elapsed() }

    /// Writes the response for this request. Only the first write counts.
    pub fn respond(&mut self, response: Response) {
        if let Some(existing) = &self.response {
            tracing::warn!(
                path = %self.request.path(),
                kept = existing.status_code(),
                dropped = response.status_code(),
                "response already written, ignoring second write"
            );
            return;
        }
        self.response = Some(response);
    }

    pub fn has_response(&self) -> bool { self.response.is_some() }
    pub fn response(&self) -> Option<&Response> { self.response.as_ref() }
    pub fn response_mut(&mut self) -> Option<&mut Response> { self.response.as_mut() }

    pub(crate) fn set_endpoint(&mut self, endpoint: Endpoint) {
        self.endpoint = Some(endpoint);
    }

    /// Replaces the parsed action with the resolved route's action.
    pub(crate) fn refine_endpoint(&mut self, action: &str) {
        if let Some(endpoint) = &mut self.endpoint {
            endpoint.action = action.to_owned();
        }
    }

    /// Writes a `500` if no stage wrote a response, so post-processors and
    /// the transport always see one.
    pub(crate) fn ensure_response(&mut self) {
        if self.response.is_none() {
            self.response = Some(missing_response(&self.request));
        }
    }

    /// Consumes the context, yielding its response.
    pub(crate) fn into_response(self) -> Response {
        match self.response {
            Some(response) => response,
            None => missing_response(&self.request),
        }
    }
}

fn missing_response(request: &Request) -> Response {
    tracing::error!(
        method = %request.method(),
        path = %request.path(),
        "request finished without a response"
    );
    ApiError::internal(codes::NO_RESPONSE, "500 Internal Server Error: no response").into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::method::Method;
    use crate::status::Status;

    fn ctx() -> Context {
        Context::new(Request::new(Method::Get, "/v1/widget"), Arc::new(Registry::new()))
    }

    #[test]
    fn first_response_wins() {
        let mut ctx = ctx();
        ctx.respond(Response::status(Status::Accepted));
        ctx.respond(Response::status(Status::Conflict));
        assert_eq!(ctx.into_response().status_code(), 202);
    }

    #[test]
    fn missing_response_becomes_500() {
        let resp = ctx().into_response();
        assert_eq!(resp.status_code(), 500);
        let body: serde_json::Value = serde_json::from_slice(resp.body()).unwrap();
        assert_eq!(body["error"]["code"], codes::NO_RESPONSE);
    }

    #[test]
    fn response_can_be_decorated() {
        let mut ctx = ctx();
        ctx.respond(Response::text("ok"));
        ctx.response_mut().unwrap().insert_header("x-trace", "abc");
        assert_eq!(ctx.response().unwrap().header("x-trace"), Some("abc"));
    }
}
