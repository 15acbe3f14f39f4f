//! Connection handle and schema management.

use tokio::sync::{Mutex, MutexGuard};
use tokio_postgres::{Client, NoTls};
use tracing::{debug, error, info};

use crate::error::Result;
use crate::schema;

/// Main database handle.
///
/// A single connection behind a mutex: loads run in one transaction, which
/// needs exclusive access to the client.
pub struct Database {
    client: Mutex<Client>,
}

impl Database {
    /// Connect and spawn the connection driver on the current runtime.
    pub async fn connect(url: &str) -> Result<Self> {
        let (client, connection) = tokio_postgres::connect(url, NoTls).await?;
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                error!(error = %e, "PostgreSQL connection closed with error");
            }
        });
        info!("connected to PostgreSQL");
        Ok(Self { client: Mutex::new(client) })
    }

    pub(crate) async fn client(&self) -> MutexGuard<'_, Client> {
        self.client.lock().await
    }

    /// Create any missing tables.
    pub async fn ensure_schema(&self) -> Result<()> {
        let client = self.client().await;
        for statement in schema::CREATE_STATEMENTS {
            client.batch_execute(statement).await?;
        }
        debug!("schema ensured");
        Ok(())
    }

    /// Drop every table and recreate the schema from scratch.
    pub async fn reset_schema(&self) -> Result<()> {
        {
            let client = self.client().await;
            for statement in schema::DROP_STATEMENTS {
                client.batch_execute(statement).await?;
            }
        }
        self.ensure_schema().await?;
        info!("schema reset");
        Ok(())
    }

    /// Round-trip a trivial query.
    pub async fn ping(&self) -> Result<()> {
        self.client().await.simple_query("SELECT 1").await?;
        Ok(())
    }
}
