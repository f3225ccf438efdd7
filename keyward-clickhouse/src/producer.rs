//! Connection producer.
//!
//! Owns the decoded configuration and at most one administrative handle.
//! The handle is opened on first use, probed on every reuse, and replaced
//! when the probe fails.

use keyward_core::sanitize::PASSWORD_MASK;
use keyward_core::{ConfigMap, DatabaseError, DatabaseResult, Placeholders, SecretValues};
use tracing::{debug, info, warn};

use crate::config::ConnectionConfig;
use crate::conn_string::ConnString;
use crate::connector::{AdminConnection, Connector};

/// Produces administrative connections from a decoded configuration.
pub struct ConnectionProducer<C: Connector> {
    connector: C,
    config: ConnectionConfig,
    target: Option<ConnString>,
    connection: Option<C::Connection>,
}

impl<C: Connector> ConnectionProducer<C> {
    /// Create an uninitialized producer.
    pub fn new(connector: C) -> Self {
        Self {
            connector,
            config: ConnectionConfig::default(),
            target: None,
            connection: None,
        }
    }

    /// Whether [`init`](Self::init) has succeeded.
    pub fn is_initialized(&self) -> bool {
        self.target.is_some()
    }

    /// Decode `raw`, resolve the target, and optionally verify connectivity.
    ///
    /// A failed verification leaves the producer uninitialized.
    pub async fn init(&mut self, raw: &ConfigMap, verify: bool) -> DatabaseResult<()> {
        let mut config = ConnectionConfig::from_map(raw)?;
        config.apply_defaults();

        let target = if config.connection_url.is_empty() {
            let target = config.to_conn_string();
            target.check()?;
            target
        } else {
            config.connection_url =
                substitute_credentials(&config.connection_url, &config.username, &config.password);
            ConnString::parse(&config.connection_url)?
        };

        info!(
            host = %target.host(),
            port = target.port(),
            database = %target.database(),
            tls = target.tls(),
            verify,
            "Connection producer initialized"
        );

        self.release().await;
        self.config = config;
        self.target = Some(target);

        if verify {
            if let Err(e) = self.verify().await {
                self.release().await;
                self.target = None;
                return Err(e);
            }
        }

        Ok(())
    }

    async fn verify(&mut self) -> DatabaseResult<()> {
        let conn = self.connection().await?;
        conn.ping()
            .await
            .map_err(|e| DatabaseError::connectivity(format!("failed to verify connection: {}", e)))
    }

    /// Return a live administrative handle, opening or replacing it as needed.
    pub async fn connection(&mut self) -> DatabaseResult<&C::Connection> {
        let Some(target) = &self.target else {
            return Err(DatabaseError::NotInitialized);
        };

        if let Some(conn) = self.connection.take() {
            match conn.ping().await {
                Ok(()) => {
                    debug!("Reusing admin connection");
                    return Ok(self.connection.insert(conn));
                }
                Err(e) => {
                    warn!(error = %e, "Admin connection failed its probe, replacing it");
                    if let Err(e) = conn.close().await {
                        debug!(error = %e, "Error closing stale admin connection");
                    }
                }
            }
        }

        let limits = self.config.pool_limits();
        let conn = self.connector.open(target, &limits).await.map_err(|e| {
            DatabaseError::connectivity(format!("failed to open connection: {}", e))
        })?;
        Ok(self.connection.insert(conn))
    }

    /// Release the handle. Calling this again is a no-op.
    pub async fn close(&mut self) -> DatabaseResult<()> {
        if let Some(conn) = self.connection.take() {
            conn.close().await.map_err(|e| {
                DatabaseError::connectivity(format!("failed to close connection: {}", e))
            })?;
        }
        Ok(())
    }

    /// Release the handle, logging instead of failing.
    async fn release(&mut self) {
        if let Err(e) = self.close().await {
            warn!(error = %e, "Error releasing admin connection");
        }
    }

    /// Secrets that may appear in error text: the configured password, its
    /// URL-encoded form, and any password embedded in the connection URL.
    pub fn secret_values(&self) -> SecretValues {
        let mut secrets = SecretValues::new().password(&self.config.password);
        secrets.insert(urlencoding::encode(&self.config.password), PASSWORD_MASK);
        if let Some(target) = &self.target {
            secrets.insert(target.password(), PASSWORD_MASK);
        }
        secrets
    }
}

/// Replace `{{username}}` and `{{password}}` in a connection URL with their
/// URL-encoded values.
fn substitute_credentials(url: &str, username: &str, password: &str) -> String {
    Placeholders::new()
        .with("username", urlencoding::encode(username))
        .with("password", urlencoding::encode(password))
        .apply(url)
}
