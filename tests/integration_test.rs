use anyhow::Result;
use serde_json::{json, Value};
use std::fs;
use std::sync::Mutex;
use tempfile::tempdir;

use dashboard_provisioner::config::{AdminAccount, Config, DatabaseConnection};
use dashboard_provisioner::types::{BiService, QueryRef};
use dashboard_provisioner::workflow::Provisioner;

/// In-memory stand-in for the BI service, keeping one ordered event log so
/// cross-object ordering can be asserted.
#[derive(Default)]
struct InMemoryService {
    events: Mutex<Vec<String>>,
    queries: Mutex<Vec<Value>>,
    visualizations: Mutex<Vec<Value>>,
    widgets: Mutex<Vec<Value>>,
}

impl InMemoryService {
    fn log(&self, event: impl Into<String>) {
        self.events.lock().unwrap().push(event.into());
    }
}

#[async_trait::async_trait]
impl BiService for InMemoryService {
    async fn setup(&self, admin: &AdminAccount) -> dashboard_provisioner::error::Result<()> {
        self.log(format!("setup:{}", admin.org_name));
        Ok(())
    }

    async fn create_datasource(
        &self,
        name: &str,
        _db: &DatabaseConnection,
    ) -> dashboard_provisioner::error::Result<i64> {
        self.log(format!("datasource:{name}"));
        Ok(5)
    }

    async fn create_dashboard(&self, name: &str) -> dashboard_provisioner::error::Result<i64> {
        self.log(format!("dashboard:{name}"));
        Ok(13)
    }

    async fn create_query(
        &self,
        name: &str,
        description: &str,
        sql: &str,
        datasource_id: i64,
    ) -> dashboard_provisioner::error::Result<QueryRef> {
        let mut queries = self.queries.lock().unwrap();
        queries.push(json!({
            "name": name,
            "description": description,
            "query": sql,
            "data_source_id": datasource_id,
        }));
        let id = 100 + queries.len() as i64;
        self.log(format!("query:{name}"));
        Ok(QueryRef { id, version: 3 })
    }

    async fn create_visualization(
        &self,
        descriptor: &Value,
    ) -> dashboard_provisioner::error::Result<i64> {
        let mut visualizations = self.visualizations.lock().unwrap();
        visualizations.push(descriptor.clone());
        let id = 200 + visualizations.len() as i64;
        self.log(format!("visualization:{id}"));
        Ok(id)
    }

    async fn create_widget(&self, descriptor: &Value) -> dashboard_provisioner::error::Result<i64> {
        let mut widgets = self.widgets.lock().unwrap();
        widgets.push(descriptor.clone());
        let id = 300 + widgets.len() as i64;
        self.log(format!("widget:{id}"));
        Ok(id)
    }

    async fn execute_query(
        &self,
        _datasource_id: i64,
        _sql: &str,
        query_id: i64,
    ) -> dashboard_provisioner::error::Result<()> {
        self.log(format!("execute:{query_id}"));
        Ok(())
    }

    async fn publish_query(&self, query: QueryRef) -> dashboard_provisioner::error::Result<()> {
        self.log(format!("publish_query:{}:v{}", query.id, query.version));
        Ok(())
    }

    async fn publish_dashboard(
        &self,
        dashboard_id: i64,
    ) -> dashboard_provisioner::error::Result<()> {
        self.log(format!("publish_dashboard:{dashboard_id}"));
        Ok(())
    }
}

#[tokio::test]
async fn gas_price_scenario_end_to_end() -> Result<()> {
    let dir = tempdir()?;
    fs::write(
        dir.path().join("gas_price.sql"),
        "-- Gas Price\n-- avg\n-- {\"type\":\"chart\"}\n-- {\"width\":2}\nSELECT 1;",
    )?;

    let service = InMemoryService::default();
    let config = Config::from_lookup(|_| None)?;
    let report = Provisioner::new(&service, &config).run(dir.path()).await?;

    assert_eq!(report.queries_created, 1);
    assert_eq!(report.visualizations_created, 1);
    assert_eq!(report.widgets_created, 1);

    let queries = service.queries.lock().unwrap();
    assert_eq!(queries[0]["name"], "Gas Price");
    assert_eq!(queries[0]["description"], "avg");
    assert_eq!(queries[0]["query"], "SELECT 1;");
    assert_eq!(queries[0]["data_source_id"], 5);

    let visualizations = service.visualizations.lock().unwrap();
    assert_eq!(visualizations[0]["query_id"], 101);

    let widgets = service.widgets.lock().unwrap();
    assert_eq!(widgets[0]["dashboard_id"], 13);
    assert_eq!(widgets[0]["visualization_id"], 201);
    assert_eq!(widgets[0]["width"], 2);

    // Dependency order: query before visualization, results and publish
    // before the widget, dashboard publish last.
    let events = service.events.lock().unwrap();
    assert_eq!(
        *events,
        vec![
            "setup:p2p",
            "datasource:default",
            "dashboard:dashboard",
            "query:Gas Price",
            "visualization:201",
            "execute:101",
            "publish_query:101:v3",
            "widget:301",
            "publish_dashboard:13",
        ]
    );
    Ok(())
}

#[tokio::test]
async fn mixed_directory_processes_widgets_then_queries_in_name_order() -> Result<()> {
    let dir = tempdir()?;
    fs::write(dir.path().join("z_text.json"), r#"{"text":"note"}"#)?;
    fs::write(
        dir.path().join("b.sql"),
        "-- B\n-- second\n-- {}\n--\nSELECT 2;",
    )?;
    fs::write(
        dir.path().join("a.sql"),
        "-- A\n-- first\n-- {\"type\":\"table\"}\n--\nSELECT 1;",
    )?;

    let service = InMemoryService::default();
    let config = Config::from_lookup(|_| None)?;
    let report = Provisioner::new(&service, &config).run(dir.path()).await?;

    assert_eq!(report.widgets_created, 1);
    assert_eq!(report.queries_created, 2);
    // Only a.sql carries a visualization; b.sql's query stays a draft.
    assert_eq!(report.visualizations_created, 1);

    let queries = service.queries.lock().unwrap();
    assert_eq!(queries[0]["name"], "A");
    assert_eq!(queries[1]["name"], "B");

    let events = service.events.lock().unwrap();
    // The standalone widget pass runs before any query is created.
    let widget_pos = events.iter().position(|e| e == "widget:301").unwrap();
    let query_pos = events.iter().position(|e| e == "query:A").unwrap();
    assert!(widget_pos < query_pos);
    assert_eq!(events.last().map(String::as_str), Some("publish_dashboard:13"));
    Ok(())
}
