use std::time::{Duration, Instant};
use tokio_postgres::{Client, NoTls};
use tracing::{debug, error, info, warn};

use crate::error::postgres_message;
use crate::{Config, Error, Result};

/// Connections are not expected to be held longer than this.
pub const MAX_CONNECTION_LIFETIME: Duration = Duration::from_secs(3 * 60);

/// Bounded retry with exponential backoff for the initial connection.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_secs(3),
        }
    }
}

/// The single database connection owned by a setup run.
pub struct Database {
    client: Client,
    connection_task: tokio::task::JoinHandle<()>,
    established_at: Instant,
}

impl Database {
    pub async fn connect_with_retry(config: &Config, policy: RetryPolicy) -> Result<Self> {
        let pg_config = config.pg_config();
        let mut delay = policy.initial_delay;
        let mut last_error: Option<tokio_postgres::Error> = None;

        for attempt in 1..=policy.max_attempts {
            info!(
                attempt,
                max_attempts = policy.max_attempts,
                host = %config.postgres.host,
                port = config.postgres.port,
                "Attempting to connect to PostgreSQL"
            );

            match Self::try_connect(&pg_config).await {
                Ok(db) => {
                    info!("Successfully connected to PostgreSQL");
                    return Ok(db);
                }
                Err(e) => {
                    warn!(attempt, "Failed to connect: {}", postgres_message(&e));
                    last_error = Some(e);
                }
            }

            if attempt < policy.max_attempts {
                info!("Retrying in {:?}", delay);
                tokio::time::sleep(delay).await;
                delay *= 2;
            }
        }

        let reason = last_error
            .map(|e| postgres_message(&e))
            .unwrap_or_else(|| "no attempts were made".to_string());
        Err(Error::Connection(format!(
            "failed to connect after {} attempts: {}",
            policy.max_attempts, reason
        )))
    }

    async fn try_connect(
        pg_config: &tokio_postgres::Config,
    ) -> std::result::Result<Self, tokio_postgres::Error> {
        let (client, connection) = pg_config.connect(NoTls).await?;

        let connection_task = tokio::spawn(async move {
            if let Err(e) = connection.await {
                error!("Connection error: {}", postgres_message(&e));
            }
        });

        // Fails fast if the session cannot run a query.
        if let Err(e) = client.simple_query("SELECT 1").await {
            connection_task.abort();
            return Err(e);
        }

        Ok(Self {
            client,
            connection_task,
            established_at: Instant::now(),
        })
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Fails with [`Error::Authorization`] unless the current role is a superuser.
    pub async fn ensure_superuser(&self) -> Result<()> {
        let row = self
            .client
            .query_one(
                "SELECT usesuper FROM pg_user WHERE usename = current_user",
                &[],
            )
            .await
            .map_err(|e| {
                Error::Authorization(format!(
                    "failed to check superuser privileges: {}",
                    postgres_message(&e)
                ))
            })?;

        let is_superuser: bool = row.get(0);
        if !is_superuser {
            return Err(Error::Authorization(
                "current user does not have superuser privileges".to_string(),
            ));
        }

        debug!("Connected role has superuser privileges");
        Ok(())
    }

    /// Reads a server setting as text.
    pub async fn setting(&self, name: &str) -> Result<String> {
        let row = self
            .client
            .query_one("SELECT current_setting($1)", &[&name])
            .await?;
        Ok(row.get(0))
    }

    pub fn age(&self) -> Duration {
        self.established_at.elapsed()
    }

    pub async fn close(self) -> Result<()> {
        info!("Closing PostgreSQL connection");

        if self.age() > MAX_CONNECTION_LIFETIME {
            warn!(
                "Connection was held for {:?}, longer than its {:?} lifetime",
                self.age(),
                MAX_CONNECTION_LIFETIME
            );
        }

        drop(self.client);
        self.connection_task.abort();
        Ok(())
    }
}
