//! # crudroute
//!
//! Convention-driven, versioned REST routing with a request pipeline that
//! always answers, and always cleans up.
//!
//! ## Routes from names
//!
//! A [`Controller`] lists capabilities. A capability named
//! `[Auth]<Verb>HandlerV<version><Action>` becomes two routes under the
//! entity it is registered for:
//!
//! ```text
//! GetHandlerV1List         →  GET  /v1/widget/list        GET  /v1/widget/:id/list
//! AuthPostHandlerV2Create  →  POST /v2/widget/create      POST /v2/widget/:id/create   (auth)
//! ```
//!
//! Names that do not parse are skipped with a warning. An `Auth` capability on
//! a controller without an [`Authenticator`] stops registration.
//!
//! ## The pipeline
//!
//! [`Router::dispatch`] runs pre-processors, path parsing, resolution, the
//! auth gate, middleware, the handler, and result translation, in that
//! order. Whichever stage ends the request, post-processors run exactly once
//! and the request gets exactly one response.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use crudroute::{Capability, Controller, Payloads, Registry, Request, Router, Server};
//!
//! struct Widgets;
//!
//! impl Controller for Widgets {
//!     fn capabilities(self: Arc<Self>) -> Vec<Capability> {
//!         vec![Capability::named("GetHandlerV1List", list)]
//!     }
//! }
//!
//! async fn list(_req: Request) -> Payloads {
//!     Payloads::new().with("widgets", Vec::<String>::new())
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), crudroute::Error> {
//!     let mut registry = Registry::new();
//!     registry.register_entity("widget", Arc::new(Widgets));
//!
//!     Server::bind("0.0.0.0:8080")?.serve(Router::new(registry)).await
//! }
//! ```

mod auth;
mod config;
mod context;
mod endpoint;
mod error;
mod handler;
mod method;
mod processor;
mod registry;
mod request;
mod response;
mod route;
mod router;
mod server;
mod status;

pub mod convention;

pub use auth::{AuthRejection, Authenticator};
pub use config::{ConfigError, RouterConfig};
pub use context::Context;
pub use convention::{Convention, Verb};
pub use endpoint::{Endpoint, PathError, PathParser, VersionedPathParser};
pub use error::{ApiError, Error, Severity, codes};
pub use handler::{BoxFuture, Handler, HandlerResult, Payloads, Responder};
pub use method::{Method, UnknownMethod};
pub use processor::{AccessLog, Middleware, Outcome, PostFn, PostProcessor, PreProcessor, post_fn};
pub use registry::{Capability, Controller, EntityRoutes, Registry, RegistryError, Resolved};
pub use request::Request;
pub use response::{ContentType, Response, ResponseBuilder};
pub use route::{Route, RouteNode};
pub use router::Router;
pub use server::Server;
pub use status::Status;
