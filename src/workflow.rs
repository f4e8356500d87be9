use crate::config::Config;
use crate::definitions::{definition_files, inject_id, QueryDefinition};
use crate::error::Result;
use crate::types::BiService;
use serde::Serialize;
use serde_json::Value;
use std::fs;
use std::path::Path;
use tracing::{info, instrument, warn};

/// Identifiers produced by the bootstrap stages and threaded into content
/// loading. The datasource id is the one the server actually assigned, not
/// an assumed constant.
#[derive(Debug, Clone, Copy)]
pub struct ProvisionedIds {
    pub datasource_id: i64,
    pub dashboard_id: i64,
}

/// Counts of remote objects created during one run.
#[derive(Debug, Default, Serialize)]
pub struct RunReport {
    pub queries_created: usize,
    pub visualizations_created: usize,
    pub widgets_created: usize,
}

/// Drives the four-stage pipeline: account bootstrap, datasource
/// registration, dashboard creation, then content loading and publish.
///
/// Every stage is fallible and the run aborts on the first error. Nothing
/// already created is rolled back; a failed run leaves the dashboard
/// partially populated and unpublished.
pub struct Provisioner<'a> {
    service: &'a dyn BiService,
    config: &'a Config,
}

impl<'a> Provisioner<'a> {
    pub fn new(service: &'a dyn BiService, config: &'a Config) -> Self {
        Self { service, config }
    }

    /// Runs the whole workflow over the definition files in `dir`.
    pub async fn run(&self, dir: &Path) -> Result<RunReport> {
        let ids = self.bootstrap().await?;

        let mut report = RunReport::default();
        self.load_widget_files(dir, ids.dashboard_id, &mut report)
            .await?;
        self.load_query_files(dir, &ids, &mut report).await?;

        self.service.publish_dashboard(ids.dashboard_id).await?;
        info!(dashboard_id = ids.dashboard_id, "dashboard published");
        Ok(report)
    }

    /// Stages 1-3: admin account, datasource, empty dashboard container.
    #[instrument(skip(self))]
    async fn bootstrap(&self) -> Result<ProvisionedIds> {
        self.service.setup(&self.config.admin).await?;
        info!(user = %self.config.admin.name, "admin account created");
        println!("User created");

        let datasource_id = self
            .service
            .create_datasource(&self.config.datasource_name, &self.config.database)
            .await?;
        info!(datasource_id, "datasource registered");
        println!("Datasource created");

        let dashboard_id = self
            .service
            .create_dashboard(&self.config.dashboard_name)
            .await?;
        info!(dashboard_id, name = %self.config.dashboard_name, "dashboard created");
        println!("Created dashboard {}", self.config.dashboard_name);

        Ok(ProvisionedIds {
            datasource_id,
            dashboard_id,
        })
    }

    /// Pass A: every `*.json` file is one freestanding widget. The file's
    /// object is forwarded verbatim apart from the injected `dashboard_id`.
    async fn load_widget_files(
        &self,
        dir: &Path,
        dashboard_id: i64,
        report: &mut RunReport,
    ) -> Result<()> {
        for path in definition_files(dir, "json")? {
            let contents = fs::read_to_string(&path)?;
            if contents.is_empty() {
                warn!(file = %path.display(), "skipping empty widget file");
                continue;
            }
            let mut widget: Value = serde_json::from_str(&contents)?;
            inject_id(&mut widget, "dashboard_id", dashboard_id)?;
            self.service.create_widget(&widget).await?;
            report.widgets_created += 1;
            println!("Created widget from {}", path.display());
        }
        Ok(())
    }

    /// Pass B: every `*.sql` file drives query, visualization, and widget
    /// creation in dependency order.
    async fn load_query_files(
        &self,
        dir: &Path,
        ids: &ProvisionedIds,
        report: &mut RunReport,
    ) -> Result<()> {
        for path in definition_files(dir, "sql")? {
            let contents = fs::read_to_string(&path)?;
            let definition = QueryDefinition::parse(&contents)?;
            info!(file = %path.display(), name = %definition.name, "processing query definition");
            self.load_query(&definition, ids, report).await?;
        }
        Ok(())
    }

    async fn load_query(
        &self,
        definition: &QueryDefinition,
        ids: &ProvisionedIds,
        report: &mut RunReport,
    ) -> Result<()> {
        let query = self
            .service
            .create_query(
                &definition.name,
                &definition.description,
                &definition.sql,
                ids.datasource_id,
            )
            .await?;
        report.queries_created += 1;
        println!("Created query {} id: {}", definition.name, query.id);

        if definition.visualization.is_trivial() {
            // Without a visualization the query stays an unpublished draft
            // with no dashboard presence. Documented behavior, kept as-is.
            info!(query_id = query.id, "no visualization descriptor; query left as draft");
            return Ok(());
        }

        let mut visualization = definition.visualization.parse()?;
        inject_id(&mut visualization, "query_id", query.id)?;
        let visualization_id = self.service.create_visualization(&visualization).await?;
        report.visualizations_created += 1;
        println!(
            "Created visualization for {} query. Visualization id: {}",
            definition.name, visualization_id
        );

        self.service
            .execute_query(ids.datasource_id, &definition.sql, query.id)
            .await?;
        info!(query_id = query.id, "query results generated");

        self.service.publish_query(query).await?;

        if !definition.widget.is_trivial() {
            let mut widget = definition.widget.parse()?;
            inject_id(&mut widget, "dashboard_id", ids.dashboard_id)?;
            inject_id(&mut widget, "visualization_id", visualization_id)?;
            self.service.create_widget(&widget).await?;
            report.widgets_created += 1;
            println!("Created widget for {} query", definition.name);
        }
        Ok(())
    }
}
