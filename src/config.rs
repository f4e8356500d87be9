use crate::error::{ProvisionError, Result};

/// Identity used to bootstrap the initial admin user and organization.
#[derive(Debug, Clone)]
pub struct AdminAccount {
    pub name: String,
    pub email: String,
    pub password: String,
    pub org_name: String,
}

/// Connection parameters for the database registered as the datasource.
#[derive(Debug, Clone)]
pub struct DatabaseConnection {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub dbname: String,
    pub dialect: String,
    /// Forwarded as the `sslmode` option when set; omitted otherwise.
    pub ssl_mode: Option<String>,
}

/// Full run configuration, constructed once at startup and passed into each
/// stage. No other component reads the environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub redash_url: String,
    pub admin: AdminAccount,
    pub database: DatabaseConnection,
    pub datasource_name: String,
    pub dashboard_name: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable lookup, applying
    /// the documented defaults for anything unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let port_raw = get("DB_PORT", "5432");
        let port: u16 = port_raw
            .parse()
            .map_err(|e| ProvisionError::Config(format!("invalid DB_PORT '{port_raw}': {e}")))?;

        Ok(Self {
            redash_url: get("REDASH_URL", "http://localhost:5000"),
            admin: AdminAccount {
                name: get("USER_NAME", "admin"),
                email: get("USER_EMAIL", "admin@p2p.org"),
                password: get("USER_PASS", "supersecret123"),
                org_name: get("ORG_NAME", "p2p"),
            },
            database: DatabaseConnection {
                host: get("DB_HOST", "localhost"),
                port,
                user: get("DB_USER", "postgres"),
                password: get("DB_PASS", ""),
                dbname: get("DB_NAME", "public"),
                dialect: get("DB_TYPE", "pg"),
                ssl_mode: lookup("DB_SSL_MODE"),
            },
            datasource_name: get("DATASOURCE_NAME", "default"),
            dashboard_name: get("DASHBOARD_NAME", "dashboard"),
        })
    }
}
