//! Disposable PostgreSQL provisioning.
//!
//! An externally managed database wins when `DATABASE_URL` (or
//! `LEDGER__DATABASE__URL`) is set. Otherwise a throwaway container is
//! started and removed again on teardown.

use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, ImageExt, TestcontainersError};
use testcontainers_modules::postgres::Postgres;
use tracing::{info, warn};

/// Image tag of the disposable database.
pub const POSTGRES_TAG: &str = "16-alpine";

const POSTGRES_PORT: u16 = 5432;

/// Errors raised while provisioning a database.
#[derive(Debug, thiserror::Error)]
pub enum ProvisionError {
    /// The container could not be started or inspected.
    #[error("Failed to start PostgreSQL container: {0}")]
    Container(#[from] TestcontainersError),
}

/// A reachable PostgreSQL endpoint.
pub struct PostgresEndpoint {
    url: String,
    container: Option<ContainerAsync<Postgres>>,
}

impl PostgresEndpoint {
    /// Returns an endpoint, starting a container when no URL is configured.
    ///
    /// Returns once the database accepts connections.
    pub async fn provision() -> Result<Self, ProvisionError> {
        if let Some(url) = external_database_url() {
            info!("Using externally provided database");
            return Ok(Self {
                url,
                container: None,
            });
        }

        let container = Postgres::default().with_tag(POSTGRES_TAG).start().await?;
        let host = container.get_host().await?;
        let port = container.get_host_port_ipv4(POSTGRES_PORT).await?;
        let url = format!("postgres://postgres:postgres@{host}:{port}/postgres");

        info!(container = container.id(), %host, port, "Started disposable PostgreSQL");
        Ok(Self {
            url,
            container: Some(container),
        })
    }

    /// Connection URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// True when the endpoint is a container owned by this process.
    #[must_use]
    pub fn is_disposable(&self) -> bool {
        self.container.is_some()
    }

    /// Removes the container, if one was started.
    pub async fn teardown(self) {
        let Some(container) = self.container else {
            return;
        };

        let id = container.id().to_owned();
        match container.rm().await {
            Ok(()) => info!(container = %id, "Removed disposable PostgreSQL"),
            Err(err) => warn!(container = %id, error = %err, "Failed to remove PostgreSQL container"),
        }
    }
}

fn external_database_url() -> Option<String> {
    ["DATABASE_URL", "LEDGER__DATABASE__URL"]
        .into_iter()
        .find_map(|name| std::env::var(name).ok().filter(|url| !url.trim().is_empty()))
}
