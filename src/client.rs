use crate::config::{AdminAccount, DatabaseConnection};
use crate::error::{ProvisionError, Result};
use crate::types::{BiService, QueryRef};
use reqwest::redirect::Policy;
use serde_json::{json, Value};
use std::sync::OnceLock;
use tracing::{debug, instrument};

/// HTTP client for a Redash instance.
///
/// Authentication happens in two steps, matching the service: the `/setup`
/// form establishes a session cookie (held in the client's cookie store),
/// which is then used once to look up the admin's API key. All content
/// endpoints authenticate with that key.
pub struct RedashClient {
    client: reqwest::Client,
    base_url: String,
    api_key: OnceLock<String>,
}

impl RedashClient {
    pub fn new(base_url: &str) -> Result<Self> {
        // The setup endpoint answers with a redirect we must not follow,
        // and its Set-Cookie is the session we keep.
        let client = reqwest::Client::builder()
            .cookie_store(true)
            .redirect(Policy::none())
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: OnceLock::new(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post_json(&self, path: &str, body: &Value) -> Result<Value> {
        let mut request = self.client.post(self.url(path)).json(body);
        if let Some(key) = self.api_key.get() {
            request = request.header("Authorization", format!("Key {key}"));
        }
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ProvisionError::Api {
                endpoint: path.to_string(),
                message: format!("server returned {status}"),
            });
        }
        Ok(response.json().await?)
    }

    async fn get_json(&self, path: &str) -> Result<Value> {
        let response = self.client.get(self.url(path)).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ProvisionError::Api {
                endpoint: path.to_string(),
                message: format!("server returned {status}"),
            });
        }
        Ok(response.json().await?)
    }

    fn id_field(value: &Value, endpoint: &str) -> Result<i64> {
        value["id"]
            .as_i64()
            .ok_or_else(|| ProvisionError::MissingField(format!("id in {endpoint} response")))
    }

    fn datasource_payload(name: &str, db: &DatabaseConnection) -> Value {
        let mut options = json!({
            "host": db.host,
            "port": db.port,
            "user": db.user,
            "password": db.password,
            "dbname": db.dbname,
        });
        if let Some(mode) = &db.ssl_mode {
            options["sslmode"] = json!(mode);
        }
        json!({ "options": options, "type": db.dialect, "name": name })
    }
}

#[async_trait::async_trait]
impl BiService for RedashClient {
    #[instrument(skip(self, admin))]
    async fn setup(&self, admin: &AdminAccount) -> Result<()> {
        let form = [
            ("name", admin.name.as_str()),
            ("email", admin.email.as_str()),
            ("password", admin.password.as_str()),
            ("security_notifications", "y"),
            ("org_name", admin.org_name.as_str()),
        ];
        let response = self
            .client
            .post(self.url("/setup"))
            .form(&form)
            .send()
            .await?;
        let status = response.status();
        // A fresh instance answers the setup form with a redirect.
        if !status.is_success() && !status.is_redirection() {
            return Err(ProvisionError::Api {
                endpoint: "/setup".to_string(),
                message: format!("server returned {status}"),
            });
        }

        // The session cookie is now in the store; use it once to fetch the
        // admin's API key for everything that follows.
        let user = self.get_json("/api/users/1").await?;
        let key = user["api_key"].as_str().ok_or_else(|| {
            ProvisionError::MissingField("api_key in /api/users/1 response".to_string())
        })?;
        let _ = self.api_key.set(key.to_string());
        debug!("obtained admin api key");
        Ok(())
    }

    #[instrument(skip(self, db))]
    async fn create_datasource(&self, name: &str, db: &DatabaseConnection) -> Result<i64> {
        let payload = Self::datasource_payload(name, db);
        let response = self.post_json("/api/data_sources", &payload).await?;
        Self::id_field(&response, "/api/data_sources")
    }

    #[instrument(skip(self))]
    async fn create_dashboard(&self, name: &str) -> Result<i64> {
        let response = self.post_json("/api/dashboards", &json!({ "name": name })).await?;
        Self::id_field(&response, "/api/dashboards")
    }

    #[instrument(skip(self, description, sql))]
    async fn create_query(
        &self,
        name: &str,
        description: &str,
        sql: &str,
        datasource_id: i64,
    ) -> Result<QueryRef> {
        let payload = json!({
            "data_source_id": datasource_id,
            "name": name,
            "query": sql,
            "description": description,
        });
        let response = self.post_json("/api/queries", &payload).await?;
        let id = Self::id_field(&response, "/api/queries")?;
        let version = response["version"].as_i64().ok_or_else(|| {
            ProvisionError::MissingField("version in /api/queries response".to_string())
        })?;
        Ok(QueryRef { id, version })
    }

    #[instrument(skip(self, descriptor))]
    async fn create_visualization(&self, descriptor: &Value) -> Result<i64> {
        let response = self.post_json("/api/visualizations", descriptor).await?;
        Self::id_field(&response, "/api/visualizations")
    }

    #[instrument(skip(self, descriptor))]
    async fn create_widget(&self, descriptor: &Value) -> Result<i64> {
        let response = self.post_json("/api/widgets", descriptor).await?;
        Self::id_field(&response, "/api/widgets")
    }

    #[instrument(skip(self, sql))]
    async fn execute_query(&self, datasource_id: i64, sql: &str, query_id: i64) -> Result<()> {
        let payload = json!({
            "query_id": query_id,
            "data_source_id": datasource_id,
            "query": sql,
            "max_age": 0,
        });
        self.post_json("/api/query_results", &payload).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn publish_query(&self, query: QueryRef) -> Result<()> {
        let payload = json!({
            "id": query.id,
            "version": query.version,
            "is_draft": false,
        });
        self.post_json(&format!("/api/queries/{}", query.id), &payload)
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn publish_dashboard(&self, dashboard_id: i64) -> Result<()> {
        self.post_json(
            &format!("/api/dashboards/{dashboard_id}"),
            &json!({ "is_draft": false }),
        )
        .await?;
        Ok(())
    }
}
