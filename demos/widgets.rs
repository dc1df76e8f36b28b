//! Widget API: convention-named capabilities, an auth-gated route, a custom
//! route, and processors around the pipeline.
//!
//! Run with:
//!   RUST_LOG=info cargo run --example widgets [config.toml]
//!
//! Try:
//!   curl http://localhost:8080/v1/widget/list
//!   curl http://localhost:8080/v1/widget/7/list
//!   curl -X POST http://localhost:8080/v2/widget/create                       # 401
//!   curl -X POST -H 'authorization: Bearer s3cret' \
//!        -d '{"name":"sprocket"}' http://localhost:8080/v2/widget/create
//!   curl http://localhost:8080/v1/widget/stats/daily
//!   curl http://localhost:8080/v1/gizmo/list                                  # 404

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crudroute::{
    ApiError, AuthRejection, Authenticator, BoxFuture, Capability, Context, Controller,
    EntityRoutes, HandlerResult, Method, Outcome, Payloads, Registry, Request, Response, Route,
    Router, RouterConfig, Server, Status, post_fn,
};

const UNAUTHORIZED: i64 = 4_010_000_001;
const INVALID_WIDGET: i64 = 4_000_000_100;

struct WidgetController {
    token: String,
    created: AtomicU64,
}

impl WidgetController {
    async fn list(self: Arc<Self>, req: Request) -> Payloads {
        let mut payloads = Payloads::new().with("widgets", vec!["sprocket", "flange"]);
        if let Some(id) = req.param("id") {
            payloads = payloads.with("id", id);
        }
        payloads
    }

    async fn create(self: Arc<Self>, req: Request) -> Result<Payloads, ApiError> {
        #[derive(serde::Deserialize, serde::Serialize)]
        struct NewWidget {
            name: String,
        }

        let widget: NewWidget = serde_json::from_slice(req.body())
            .map_err(|e| ApiError::bad_request(INVALID_WIDGET, format!("invalid widget: {e}")))?;
        let id = self.created.fetch_add(1, Ordering::Relaxed) + 1;
        Payloads::new().with("id", id).try_with("widget", &widget)
    }
}

impl Authenticator for WidgetController {
    fn perform_auth<'a>(
        &'a self,
        _route: &'a Route,
        ctx: &'a Context,
    ) -> BoxFuture<'a, Result<(), AuthRejection>> {
        Box::pin(async move {
            let expected = format!("Bearer {}", self.token);
            match ctx.request().header("authorization") {
                Some(given) if given == expected => Ok(()),
                _ => Err(AuthRejection::new(UNAUTHORIZED, "401 Unauthorized")),
            }
        })
    }
}

impl Controller for WidgetController {
    fn capabilities(self: Arc<Self>) -> Vec<Capability> {
        vec![
            Capability::method("GetHandlerV1List", &self, Self::list),
            Capability::method("AuthPostHandlerV2Create", &self, Self::create),
            Capability::helper("RecountWidgets"),
        ]
    }

    fn authenticator(self: Arc<Self>) -> Option<Arc<dyn Authenticator>> {
        Some(self)
    }

    fn register_routes(self: Arc<Self>, routes: &mut EntityRoutes<'_>) {
        routes.register(Method::Get, 1, "/stats/daily", daily_stats, None);
    }
}

async fn daily_stats(_req: Request) -> HandlerResult {
    HandlerResult::custom(|ctx| {
        ctx.respond(Response::builder().status(Status::Ok).text("widgets,42\n"));
    })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let config = match std::env::args().nth(1) {
        Some(path) => RouterConfig::load(path)?,
        None => RouterConfig::default(),
    };

    let mut registry = Registry::new();
    registry.register_entity(
        "widget",
        Arc::new(WidgetController { token: "s3cret".to_owned(), created: AtomicU64::new(0) }),
    );

    let app = Router::from_config(&config, registry)
        .pre(|ctx: &mut Context| {
            if ctx.request().path().contains("..") {
                ctx.respond(Response::status(Status::BadRequest));
                return Outcome::terminate();
            }
            Outcome::proceed()
        })
        .middleware(|route: &Route, ctx: &mut Context| {
            ctx.request_mut().extensions_mut().insert(route.handler_name().to_owned());
            Outcome::proceed()
        })
        .post(post_fn(|ctx: &mut Context| {
            if let Some(response) = ctx.response_mut() {
                response.insert_header("x-powered-by", "crudroute");
            }
            Outcome::proceed()
        }));

    Server::from_config(&config)?.serve(app).await?;
    Ok(())
}
