//! Snowflake SQL 查询服务
//!
//! 通过 REST 接口执行 SQL 查询：
//! - `POST /execute_query` 在 Snowflake 上执行查询并以 JSON 返回结果行
//! - `GET /health` 检查 Snowflake 连接

mod handlers;
mod routes;
mod service;
mod state;
mod warehouse;

use anyhow::Context;
use axum::{middleware, routing::get, Json, Router};
use common::config::{self, AppConfig};
use common::middleware::request_id::request_id_middleware;
use state::AppState;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;

const SERVICE_NAME: &str = "snowflake-query-service";

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Snowflake 查询服务 API",
        version = "0.1.0",
        description = "在 Snowflake 上执行 SQL 查询"
    ),
    paths(
        handlers::execute_query,
        handlers::health_check,
    ),
    components(schemas(
        common::models::QueryRequest,
        common::response::QueryResponse,
        common::response::HealthResponse,
        common::response::ErrorResponse,
    )),
    tags(
        (name = "query", description = "查询执行端点"),
        (name = "health", description = "健康检查端点")
    )
)]
struct ApiDoc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 加载配置（启动时读取一次）
    let dotenv_error = config::load_dotenv();
    let config = AppConfig::load_with_service(SERVICE_NAME).context("加载配置失败")?;

    // 初始化日志追踪
    init_tracing(&config);
    if let Some(e) = dotenv_error {
        tracing::warn!(error = %e, "Failed to read .env file");
    }
    info!(snowflake = ?config.snowflake, "配置已加载");

    // 创建应用状态
    let state = AppState::new(&config).context("创建应用状态失败")?;

    // 创建路由
    let app = create_router(state);

    // 启动服务
    let addr = config.bind_address();
    info!(service = %config.service_name, address = %addr, "启动服务");

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("绑定地址失败: {}", addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("服务启动失败")?;

    info!(service = SERVICE_NAME, "服务已停止");
    Ok(())
}

fn init_tracing(config: &AppConfig) {
    let default_level = if config.debug { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_level.into());

    let registry = tracing_subscriber::registry().with(filter);
    if config.json_logs {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(routes::router())
        .route("/api-docs/openapi.json", get(openapi_json))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("收到停止信号，正在关闭");
}
