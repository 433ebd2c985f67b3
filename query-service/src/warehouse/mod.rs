//! Warehouse access.

mod protocol;
mod snowflake;
mod value;

use async_trait::async_trait;

use common::errors::AppResult;
use common::models::{BindValue, Row};

pub use snowflake::SnowflakeWarehouse;

/// Statement used by the health probe.
pub const PROBE_SQL: &str = "SELECT 1";

/// Something that can run SQL and hand back row mappings.
#[async_trait]
pub trait Warehouse: Send + Sync {
    /// Executes `sql` verbatim and returns every row in engine order.
    async fn execute(&self, sql: &str, params: &[BindValue]) -> AppResult<Vec<Row>>;

    /// Confirms the warehouse is reachable and accepts our credentials.
    async fn probe(&self) -> AppResult<()> {
        self.execute(PROBE_SQL, &[]).await.map(|_| ())
    }
}
