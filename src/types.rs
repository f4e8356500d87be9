use crate::config::{AdminAccount, DatabaseConnection};
use crate::error::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Reference to a created query: the server-assigned id plus the version
/// token required by the publish-by-version update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryRef {
    pub id: i64,
    pub version: i64,
}

/// Operations the provisioning workflow needs from the BI service.
///
/// All ids are server-assigned. Implementations own the session state
/// established by `setup`; every other call relies on it.
#[async_trait::async_trait]
pub trait BiService: Send + Sync {
    /// Create the initial admin user and organization on a fresh instance
    /// and establish the authenticated session.
    async fn setup(&self, admin: &AdminAccount) -> Result<()>;

    /// Register a database connection; returns its server-assigned id.
    async fn create_datasource(&self, name: &str, db: &DatabaseConnection) -> Result<i64>;

    /// Create an empty dashboard container; returns its id.
    async fn create_dashboard(&self, name: &str) -> Result<i64>;

    /// Create a query against the given datasource. The SQL body is
    /// submitted exactly as passed, byte for byte.
    async fn create_query(
        &self,
        name: &str,
        description: &str,
        sql: &str,
        datasource_id: i64,
    ) -> Result<QueryRef>;

    /// Create a visualization from a descriptor that already carries its
    /// `query_id`; returns the visualization id.
    async fn create_visualization(&self, descriptor: &Value) -> Result<i64>;

    /// Create a widget from a descriptor that already carries its
    /// `dashboard_id` (and `visualization_id` for chart widgets).
    async fn create_widget(&self, descriptor: &Value) -> Result<i64>;

    /// Run the query against the datasource so cached results exist for the
    /// visualization to render.
    async fn execute_query(&self, datasource_id: i64, sql: &str, query_id: i64) -> Result<()>;

    /// Flip the query's draft flag to false, guarded by its version token.
    async fn publish_query(&self, query: QueryRef) -> Result<()>;

    /// Mark the dashboard published.
    async fn publish_dashboard(&self, dashboard_id: i64) -> Result<()>;
}
