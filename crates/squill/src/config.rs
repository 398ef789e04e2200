//! Connection settings for the target database.

use crate::{Error, Result};

/// How to reach the database whose schema is being exported.
#[derive(Debug, Clone)]
pub struct DbConfig {
    pub user: String,
    pub password: String,
    pub host: String,
    pub port: u16,
    /// Unix socket directory; takes precedence over host/port when set.
    pub socket: Option<String>,
    pub dbname: String,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            user: "postgres".to_string(),
            password: String::new(),
            host: "127.0.0.1".to_string(),
            port: 5432,
            socket: None,
            dbname: "postgres".to_string(),
        }
    }
}

impl DbConfig {
    /// Build the tokio-postgres configuration for these settings.
    pub fn pg_config(&self) -> tokio_postgres::Config {
        let mut config = tokio_postgres::Config::new();
        config
            .user(&self.user)
            .password(&self.password)
            .dbname(&self.dbname);
        match &self.socket {
            Some(dir) => {
                config.host(dir);
            }
            None => {
                config.host(&self.host);
                config.port(self.port);
            }
        }
        config
    }

    /// Open a connection and drive it on a background task.
    ///
    /// The returned client is the single shared session for one export
    /// invocation; issue the catalog accessors on it sequentially.
    pub async fn connect(&self) -> Result<tokio_postgres::Client> {
        let (client, connection) = self
            .pg_config()
            .connect(tokio_postgres::NoTls)
            .await
            .map_err(Error::Connection)?;
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::error!("database connection error: {e}");
            }
        });
        Ok(client)
    }
}
