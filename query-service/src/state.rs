//! Application state for query service.

use std::sync::Arc;

use common::config::AppConfig;
use common::errors::AppResult;

use crate::warehouse::{SnowflakeWarehouse, Warehouse};

/// Application state shared across handlers.
///
/// Connection parameters live inside the warehouse; they are fixed once the
/// state is built.
#[derive(Clone)]
pub struct AppState {
    pub warehouse: Arc<dyn Warehouse>,
}

impl AppState {
    /// Creates the state backed by a Snowflake warehouse.
    pub fn new(config: &AppConfig) -> AppResult<Self> {
        let warehouse = SnowflakeWarehouse::new(config.snowflake.clone())?;
        Ok(Self::with_warehouse(Arc::new(warehouse)))
    }

    pub fn with_warehouse(warehouse: Arc<dyn Warehouse>) -> Self {
        Self { warehouse }
    }
}
