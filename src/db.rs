//! Database connection management
//!
//! Builds the connection pool backing the migration history store.

use crate::config::DatabaseConfig;
use crate::error::{MigrateError, MigrateResult};
use deadpool_postgres::{Config, ManagerConfig, Pool, PoolConfig, RecyclingMethod, Runtime};
use tokio_postgres::NoTls;
use tracing::{debug, info};

/// Create a pool from the database configuration, with TLS when requested
pub fn create_pool(config: &DatabaseConfig) -> MigrateResult<Pool> {
    let mut cfg = Config::new();
    cfg.host = Some(config.host.clone());
    cfg.port = Some(config.port);
    cfg.user = Some(config.user.clone());
    cfg.password = Some(config.password.clone());
    cfg.dbname = Some(config.database.clone());
    cfg.manager = Some(ManagerConfig {
        recycling_method: RecyclingMethod::Fast,
    });
    cfg.pool = Some(PoolConfig::new(config.max_pool_size));

    let pool = if config.tls {
        let certs = rustls_native_certs::load_native_certs();
        let mut root_store = rustls::RootCertStore::empty();
        for cert in certs.certs {
            root_store.add(cert).ok();
        }

        let tls_config = rustls::ClientConfig::builder()
            .with_root_certificates(root_store)
            .with_no_client_auth();

        let tls = tokio_postgres_rustls::MakeRustlsConnect::new(tls_config);
        cfg.create_pool(Some(Runtime::Tokio1), tls)
    } else {
        cfg.create_pool(Some(Runtime::Tokio1), NoTls)
    }
    .map_err(|e| MigrateError::StateStore(format!("Failed to create pool: {}", e)))?;

    debug!(
        "Pool configured for {}:{}/{} (max {})",
        config.host, config.port, config.database, config.max_pool_size
    );
    info!("Database pool created (TLS: {})", config.tls);
    Ok(pool)
}

/// Check a pooled connection answers a trivial query
pub async fn test_connection(pool: &Pool) -> MigrateResult<()> {
    let client = pool.get().await?;
    client.query_one("SELECT 1", &[]).await?;
    Ok(())
}
