//! 查询执行服务模块

use std::sync::Arc;
use std::time::Instant;

use validator::Validate;

use common::errors::AppResult;
use common::models::QueryRequest;
use common::response::QueryResponse;

use crate::warehouse::Warehouse;

/// SQL 查询执行服务
pub struct QueryService {
    warehouse: Arc<dyn Warehouse>,
}

impl QueryService {
    pub fn new(warehouse: Arc<dyn Warehouse>) -> Self {
        Self { warehouse }
    }

    /// Validates the request and runs the query. The warehouse is not
    /// contacted when validation fails.
    pub async fn execute(&self, req: QueryRequest) -> AppResult<QueryResponse> {
        req.validate()?;
        let sql = req.query.unwrap_or_default();
        let params = req.params.unwrap_or_default();

        let start = Instant::now();
        let rows = self.warehouse.execute(&sql, &params).await?;
        tracing::info!(
            rows = rows.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Query executed"
        );
        Ok(QueryResponse::success(rows))
    }

    /// Runs the health probe against the warehouse.
    pub async fn probe(&self) -> AppResult<()> {
        self.warehouse.probe().await
    }
}
