use axum::{
    extract::{Extension, State},
    http::HeaderValue,
    routing::get,
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use institute_api::database::PgEstablisher;
use institute_api::middleware::resolve_institute_middleware;
use institute_api::registry::PgInstituteRegistry;
use institute_api::router::{InstituteRouter, RequestInstituteContext};
use institute_api::schema::SchemaRegistry;

#[tokio::main]
async fn main() {
    // Load .env if present so cargo run picks up REGISTRY_DATABASE_URL etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt::init();

    // Initialize configuration (this loads the config singleton)
    let config = institute_api::config::config();
    tracing::info!("Starting Institute API in {:?} mode", config.environment);

    let registry = Arc::new(
        PgInstituteRegistry::from_env()
            .unwrap_or_else(|e| panic!("failed to open institute registry: {}", e)),
    );
    let establisher = Arc::new(PgEstablisher::new(SchemaRegistry::shared()));
    let router = Arc::new(InstituteRouter::new(registry.clone(), establisher));

    let app = app(registry, router);

    // Allow tests or deployments to override port via env
    let port = std::env::var("INSTITUTE_API_PORT")
        .ok()
        .or_else(|| std::env::var("PORT").ok())
        .and_then(|s| s.parse::<u16>().ok())
        .unwrap_or(3000);

    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .unwrap_or_else(|e| panic!("failed to bind {}: {}", bind_addr, e));

    println!("Institute API server listening on http://{}", bind_addr);

    axum::serve(listener, app).await.expect("server");
}

fn app(registry: Arc<PgInstituteRegistry>, router: Arc<InstituteRouter>) -> Router {
    let api = &institute_api::config::config().api;

    // Everything under /api runs behind the tenant routing middleware
    let tenant_routes = Router::new()
        .route("/api/whoami", get(whoami))
        .layer(axum::middleware::from_fn_with_state(
            router.clone(),
            resolve_institute_middleware,
        ));

    let mut app = Router::new()
        // Public
        .route("/", get(root))
        .route("/health", get(health))
        .merge(tenant_routes)
        .with_state(registry);

    // Global middleware, gated by config
    if api.enable_cors {
        app = app.layer(cors_layer(&api.cors_origins));
    }
    if api.enable_request_logging {
        app = app.layer(TraceLayer::new_for_http());
    }
    app
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins = parse_origins(origins);
    if origins.is_empty() {
        CorsLayer::permissive()
    } else {
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

fn parse_origins(origins: &[String]) -> Vec<HeaderValue> {
    origins.iter().filter_map(|o| o.parse().ok()).collect()
}

async fn root() -> axum::response::Json<Value> {
    let version = env!("CARGO_PKG_VERSION");

    axum::response::Json(json!({
        "success": true,
        "data": {
            "name": "Institute API (Rust)",
            "version": version,
            "description": "Multi-tenant backend routing each request to its institute's database",
            "endpoints": {
                "home": "/ (public)",
                "health": "/health (public)",
                "whoami": "/api/whoami (requires X-Institute-Code header)",
            }
        }
    }))
}

async fn health(
    State(registry): State<Arc<PgInstituteRegistry>>,
) -> impl axum::response::IntoResponse {
    let now = chrono::Utc::now();

    match registry.ping().await {
        Ok(_) => (
            axum::http::StatusCode::OK,
            axum::response::Json(json!({
                "success": true,
                "data": {
                    "status": "ok",
                    "timestamp": now,
                    "registry": "ok"
                }
            })),
        ),
        Err(e) => (
            axum::http::StatusCode::SERVICE_UNAVAILABLE,
            axum::response::Json(json!({
                "success": false,
                "error": "registry unavailable",
                "data": {
                    "status": "degraded",
                    "timestamp": now,
                    "registry_error": e.to_string()
                }
            })),
        ),
    }
}

/// Minimal downstream consumer of the resolved context: reports which
/// institute the request was routed to and what the handle carries.
async fn whoami(
    Extension(context): Extension<RequestInstituteContext>,
) -> axum::response::Json<Value> {
    axum::response::Json(json!({
        "success": true,
        "data": {
            "institute_code": context.institute_code,
            "db_name": context.handle.db_name(),
            "health": format!("{:?}", context.handle.health()),
            "models": context.handle.registered_models(),
        }
    }))
}
