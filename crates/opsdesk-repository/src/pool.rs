//! Database connection pool management.

use opsdesk_config::DatabaseConfig;
use opsdesk_core::{Interface, OpsError, OpsResult};
use async_trait::async_trait;
use shaku::Component;
use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions};
use std::str::FromStr;
use tracing::{debug, info, warn};

/// Shared MySQL pool, resolved from the processor's DI module.
#[async_trait]
pub trait DatabasePoolInterface: Interface + Send + Sync {
    /// Returns a reference to the underlying MySQL pool.
    fn inner(&self) -> &MySqlPool;

    /// Round-trips `SELECT 1`; the job store's setup ping.
    async fn health_check(&self) -> OpsResult<()>;

    /// Applies the embedded `migrations/` directory.
    async fn run_migrations(&self) -> OpsResult<()>;

    /// Closes the pool; later calls are no-ops.
    async fn close(&self);
}

/// Database pool wrapper.
#[derive(Component)]
#[shaku(interface = DatabasePoolInterface)]
pub struct DatabasePool {
    pool: MySqlPool,
}

impl DatabasePool {
    /// Connects to MySQL using the `database` section.
    ///
    /// The URL is parsed up front so a malformed URL is a configuration
    /// error rather than a connection failure.
    pub async fn new(config: &DatabaseConfig) -> OpsResult<Self> {
        let options = MySqlConnectOptions::from_str(&config.url)
            .map_err(|e| OpsError::configuration(format!("Invalid database.url: {}", e)))?;
        let host = options.get_host().to_string();
        let database = options.get_database().unwrap_or_default().to_string();

        info!(%host, %database, max_connections = config.max_connections, "Connecting to MySQL");

        let pool = MySqlPoolOptions::new()
            .min_connections(config.min_connections)
            .max_connections(config.max_connections)
            .acquire_timeout(config.connect_timeout())
            .idle_timeout(Some(config.idle_timeout()))
            .connect_with(options)
            .await
            .map_err(|e| {
                warn!(%host, %database, error = %e, "MySQL connection failed");
                OpsError::Database(format!("Failed to connect to {}/{}: {}", host, database, e))
            })?;

        info!(%host, %database, "MySQL pool ready");
        Ok(Self { pool })
    }

    /// Creates DatabasePool with a pre-existing pool (for Shaku injection).
    #[must_use]
    pub fn with_pool(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DatabasePoolInterface for DatabasePool {
    fn inner(&self) -> &MySqlPool {
        &self.pool
    }

    async fn health_check(&self) -> OpsResult<()> {
        let one: i32 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| OpsError::Database(format!("MySQL ping failed: {}", e)))?;
        debug!(result = one, idle = self.pool.num_idle(), "MySQL ping");
        Ok(())
    }

    async fn run_migrations(&self) -> OpsResult<()> {
        info!("Applying migrations from ./migrations");
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| OpsError::Database(format!("Migration failed: {}", e)))?;
        info!("Migrations applied");
        Ok(())
    }

    async fn close(&self) {
        if !self.pool.is_closed() {
            self.pool.close().await;
            info!("MySQL pool closed");
        }
    }
}

impl std::fmt::Debug for DatabasePool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabasePool")
            .field("size", &self.pool.size())
            .field("num_idle", &self.pool.num_idle())
            .finish()
    }
}
