//! Oracle-backed signer lookup.

use async_trait::async_trait;
use oracle::pool::{GetMode, Pool, PoolBuilder};
use oracle::Connection;
use std::sync::Arc;
use tracing::{debug, info};

use super::{SignerError, SignerLookup};
use crate::config::SignerConfig;

const SIGNER_QUERY: &str =
    "SELECT USUARIOGENERADOR FROM GEDO_GED.GEDO_DOCUMENTO WHERE NUMERO = :1";

enum Connector {
    /// Session pool shared by every lookup of the run.
    Pooled(Pool),
    /// One connection per lookup.
    Scoped {
        user: String,
        password: String,
        connect_string: String,
    },
}

impl Connector {
    fn connection(&self) -> Result<Connection, SignerError> {
        match self {
            Connector::Pooled(pool) => pool
                .get()
                .map_err(|e| SignerError::Unavailable(e.to_string())),
            Connector::Scoped {
                user,
                password,
                connect_string,
            } => Connection::connect(user, password, connect_string)
                .map_err(|e| SignerError::Unavailable(e.to_string())),
        }
    }

    // The connection is dropped on every path out of this function, which
    // returns it to the pool or closes the scoped session.
    fn query(&self, document_id: &str) -> Result<String, SignerError> {
        let conn = self.connection()?;
        match conn.query_row_as::<String>(SIGNER_QUERY, &[&document_id]) {
            Ok(user) => Ok(user),
            Err(oracle::Error::NoDataFound) => Err(SignerError::NotFound(document_id.to_string())),
            Err(e) => Err(SignerError::Query(e.to_string())),
        }
    }
}

/// Looks up `USUARIOGENERADOR` in the GEDO document table.
#[derive(Clone)]
pub struct OracleSignerLookup {
    connector: Arc<Connector>,
}

impl OracleSignerLookup {
    /// Builds a pooled lookup, or a scoped one when `pool_size` is 0.
    pub fn connect(config: &SignerConfig) -> Result<Self, SignerError> {
        if config.pool_size == 0 {
            return Ok(Self::scoped(config));
        }

        let pool = PoolBuilder::new(
            config.user.clone(),
            config.password.clone(),
            config.connect_string(),
        )
        .min_connections(config.pool_size)
        .max_connections(config.pool_size)
        .get_mode(GetMode::Wait)
        .build()
        .map_err(|e| SignerError::Unavailable(e.to_string()))?;

        info!(
            connect_string = %config.connect_string(),
            size = config.pool_size,
            "Signer connection pool created"
        );
        Ok(Self::with_pool(pool))
    }

    /// Uses a caller-supplied session pool.
    pub fn with_pool(pool: Pool) -> Self {
        Self {
            connector: Arc::new(Connector::Pooled(pool)),
        }
    }

    /// Opens and closes a connection for each lookup.
    pub fn scoped(config: &SignerConfig) -> Self {
        Self {
            connector: Arc::new(Connector::Scoped {
                user: config.user.clone(),
                password: config.password.clone(),
                connect_string: config.connect_string(),
            }),
        }
    }
}

#[async_trait]
impl SignerLookup for OracleSignerLookup {
    async fn lookup(&self, document_id: &str) -> Result<String, SignerError> {
        let connector = Arc::clone(&self.connector);
        let document = document_id.to_string();
        let user = tokio::task::spawn_blocking(move || connector.query(&document))
            .await
            .map_err(|e| SignerError::Query(format!("lookup task failed: {}", e)))??;
        debug!(document_id, signer = %user, "Resolved signer");
        Ok(user)
    }
}
