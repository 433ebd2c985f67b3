//! Handler模块

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Json,
};

use common::errors::AppError;
use common::models::QueryRequest;
use common::response::{ErrorResponse, HealthResponse, QueryResponse};

use crate::service::QueryService;
use crate::state::AppState;

const HEALTHY_MESSAGE: &str = "Connected to Snowflake successfully";

/// 执行 SQL 查询
#[utoipa::path(
    post,
    path = "/execute_query",
    tag = "query",
    request_body = QueryRequest,
    responses(
        (status = 200, description = "查询执行成功", body = QueryResponse),
        (status = 400, description = "请求格式错误或缺少 query", body = ErrorResponse),
        (status = 500, description = "Snowflake 执行失败", body = ErrorResponse)
    )
)]
pub async fn execute_query(
    State(state): State<AppState>,
    payload: Result<Json<QueryRequest>, JsonRejection>,
) -> Result<Json<QueryResponse>, AppError> {
    let Json(req) = payload.map_err(|rejection| {
        tracing::debug!(error = %rejection, "Rejected request body");
        AppError::InvalidRequest("Invalid request format".to_string())
    })?;

    let service = QueryService::new(state.warehouse.clone());
    let result = service.execute(req).await?;
    Ok(Json(result))
}

/// 健康检查端点
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Snowflake 连接正常", body = HealthResponse),
        (status = 500, description = "Snowflake 连接失败", body = HealthResponse)
    )
)]
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let service = QueryService::new(state.warehouse.clone());
    match service.probe().await {
        Ok(()) => (StatusCode::OK, Json(HealthResponse::healthy(HEALTHY_MESSAGE))),
        Err(e) => {
            tracing::warn!(error = %e, "Health check failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(HealthResponse::unhealthy(e.message())),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use axum::{body::Body, http::Request, Router};
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use common::errors::AppResult;
    use common::models::{BindValue, Row};

    use crate::state::AppState;
    use crate::warehouse::Warehouse;

    /// Warehouse double that replays a canned outcome and records its inputs.
    struct FakeWarehouse {
        outcome: Result<Value, String>,
        calls: AtomicUsize,
        seen: Mutex<Vec<(String, Vec<BindValue>)>>,
    }

    impl FakeWarehouse {
        fn returning(rows: Value) -> Arc<Self> {
            Arc::new(Self {
                outcome: Ok(rows),
                calls: AtomicUsize::new(0),
                seen: Mutex::default(),
            })
        }

        fn failing(message: &str) -> Arc<Self> {
            Arc::new(Self {
                outcome: Err(message.to_string()),
                calls: AtomicUsize::new(0),
                seen: Mutex::default(),
            })
        }
    }

    #[async_trait]
    impl Warehouse for FakeWarehouse {
        async fn execute(&self, sql: &str, params: &[BindValue]) -> AppResult<Vec<Row>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen
                .lock()
                .unwrap()
                .push((sql.to_string(), params.to_vec()));
            match &self.outcome {
                Ok(rows) => Ok(serde_json::from_value(rows.clone()).unwrap()),
                Err(message) => Err(common::errors::AppError::WarehouseConnection(message.clone())),
            }
        }
    }

    fn app(warehouse: Arc<FakeWarehouse>) -> Router {
        crate::create_router(AppState::with_warehouse(warehouse))
    }

    async fn post_json(app: Router, body: &str) -> (u16, Value) {
        let response = app
            .oneshot(
                Request::post("/execute_query")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        read(response).await
    }

    async fn read(response: axum::response::Response) -> (u16, Value) {
        let status = response.status().as_u16();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_execute_query_success() {
        let warehouse = FakeWarehouse::returning(json!([
            {"col1": 1, "col2": "a"},
            {"col1": 2, "col2": "b"}
        ]));
        let (status, body) =
            post_json(app(warehouse.clone()), r#"{"query": "SELECT * FROM test"}"#).await;

        assert_eq!(status, 200);
        assert_eq!(
            body,
            json!({
                "status": "success",
                "results": [{"col1": 1, "col2": "a"}, {"col1": 2, "col2": "b"}],
                "row_count": 2
            })
        );
        let seen = warehouse.seen.lock().unwrap();
        assert_eq!(seen[0].0, "SELECT * FROM test");
        assert!(seen[0].1.is_empty());
    }

    #[tokio::test]
    async fn test_execute_query_keeps_column_order() {
        let warehouse = FakeWarehouse::returning(json!([{"Z": 1, "A": 2}]));
        let response = app(warehouse)
            .oneshot(
                Request::post("/execute_query")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"query": "SELECT 1 AS Z, 2 AS A"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(text.find("\"Z\"").unwrap() < text.find("\"A\"").unwrap());
    }

    #[tokio::test]
    async fn test_execute_query_empty_result() {
        let warehouse = FakeWarehouse::returning(json!([]));
        let (status, body) = post_json(app(warehouse), r#"{"query": "SELECT 1 WHERE FALSE"}"#).await;
        assert_eq!(status, 200);
        assert_eq!(body["results"], json!([]));
        assert_eq!(body["row_count"], 0);
    }

    #[tokio::test]
    async fn test_execute_query_without_query_skips_warehouse() {
        let warehouse = FakeWarehouse::returning(json!([]));
        for body in [r#"{}"#, r#"{"query": ""}"#, r#"{"query": null}"#] {
            let (status, json) = post_json(app(warehouse.clone()), body).await;
            assert_eq!(status, 400);
            assert_eq!(json, json!({"status": "error", "message": "No query provided"}));
        }
        assert_eq!(warehouse.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_execute_query_malformed_body() {
        let warehouse = FakeWarehouse::returning(json!([]));
        for body in ["not json", "null", r#"{"query": 5}"#, r#"{"query": "x", "params": [{}]}"#] {
            let (status, json) = post_json(app(warehouse.clone()), body).await;
            assert_eq!(status, 400);
            assert_eq!(json["message"], "Invalid request format");
        }
        assert_eq!(warehouse.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_execute_query_passes_params() {
        let warehouse = FakeWarehouse::returning(json!([]));
        let (status, _) = post_json(
            app(warehouse.clone()),
            r#"{"query": "SELECT ? , ?", "params": ["a", 1]}"#,
        )
        .await;
        assert_eq!(status, 200);
        assert_eq!(
            warehouse.seen.lock().unwrap()[0].1,
            vec![BindValue::Text("a".into()), BindValue::Integer(1)]
        );
    }

    #[tokio::test]
    async fn test_execute_query_failure_has_no_results() {
        let warehouse = FakeWarehouse::failing("Connection error");
        let (status, body) = post_json(app(warehouse), r#"{"query": "SELECT 1"}"#).await;
        assert_eq!(status, 500);
        assert_eq!(body, json!({"status": "error", "message": "Connection error"}));
    }

    #[tokio::test]
    async fn test_health_success() {
        let warehouse = FakeWarehouse::returning(json!([{"1": 1}]));
        let response = app(warehouse.clone())
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let (status, body) = read(response).await;
        assert_eq!(status, 200);
        assert_eq!(
            body,
            json!({"status": "healthy", "message": "Connected to Snowflake successfully"})
        );
        assert_eq!(warehouse.seen.lock().unwrap()[0].0, crate::warehouse::PROBE_SQL);
    }

    #[tokio::test]
    async fn test_health_failure() {
        let warehouse = FakeWarehouse::failing("Connection error");
        let response = app(warehouse)
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let (status, body) = read(response).await;
        assert_eq!(status, 500);
        assert_eq!(body, json!({"status": "unhealthy", "message": "Connection error"}));
    }

    #[tokio::test]
    async fn test_responses_carry_request_id() {
        let warehouse = FakeWarehouse::returning(json!([]));
        let response = app(warehouse)
            .oneshot(
                Request::get("/health")
                    .header("x-request-id", "req-42")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.headers()["x-request-id"], "req-42");
    }

    #[tokio::test]
    async fn test_openapi_document_lists_routes() {
        let warehouse = FakeWarehouse::returning(json!([]));
        let response = app(warehouse)
            .oneshot(Request::get("/api-docs/openapi.json").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let (status, body) = read(response).await;
        assert_eq!(status, 200);
        assert!(body["paths"]["/execute_query"].is_object());
        assert!(body["paths"]["/health"].is_object());
    }
}
