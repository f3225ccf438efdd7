//! `mysql_async`-backed connector.
//!
//! ClickHouse speaks the MySQL wire protocol on its MySQL interface port,
//! which is enough for administrative DDL such as `CREATE USER` and `GRANT`.

use async_trait::async_trait;
use keyward_core::DriverError;
use keyward_core::logging;
use mysql_async::prelude::*;
use mysql_async::{Opts, OptsBuilder, Pool, PoolConstraints, PoolOpts, SslOpts};
use tracing::{debug, info, trace};

use crate::config::PoolLimits;
use crate::conn_string::ConnString;
use crate::connector::{AdminConnection, Connector};

/// Default port of the ClickHouse MySQL interface.
pub const DEFAULT_MYSQL_PORT: u16 = 9004;

/// Connector speaking to ClickHouse's MySQL-compatible interface.
#[derive(Debug, Clone, Copy, Default)]
pub struct MysqlConnector;

impl MysqlConnector {
    /// Create a connector.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Connector for MysqlConnector {
    type Connection = MysqlAdminConnection;

    async fn open(
        &self,
        target: &ConnString,
        limits: &PoolLimits,
    ) -> Result<MysqlAdminConnection, DriverError> {
        let opts = to_opts_builder(target).pool_opts(to_pool_opts(limits)?);
        let pool = Pool::new(Opts::from(opts));

        info!(
            host = %target.host(),
            port = %port_or_default(target),
            database = %target.database(),
            tls = target.tls(),
            max_open = limits.max_open,
            max_idle = limits.max_idle,
            "ClickHouse admin pool created"
        );

        Ok(MysqlAdminConnection {
            pool,
            debug: target.debug(),
        })
    }
}

/// A `mysql_async` pool used as an administrative handle.
pub struct MysqlAdminConnection {
    pool: Pool,
    debug: bool,
}

#[async_trait]
impl AdminConnection for MysqlAdminConnection {
    async fn ping(&self) -> Result<(), DriverError> {
        let mut conn = self.pool.get_conn().await?;
        conn.ping().await?;
        Ok(())
    }

    async fn execute(&self, statement: &str) -> Result<(), DriverError> {
        if self.debug || logging::is_debug_enabled() {
            debug!(len = statement.len(), "Executing admin statement");
        } else {
            trace!(len = statement.len(), "Executing admin statement");
        }
        let mut conn = self.pool.get_conn().await?;
        conn.query_drop(statement).await?;
        Ok(())
    }

    async fn close(self) -> Result<(), DriverError> {
        self.pool.disconnect().await?;
        info!("ClickHouse admin pool closed");
        Ok(())
    }
}

fn port_or_default(target: &ConnString) -> u16 {
    match target.port() {
        0 => DEFAULT_MYSQL_PORT,
        port => port,
    }
}

/// Map a connection target onto driver options.
fn to_opts_builder(target: &ConnString) -> OptsBuilder {
    let mut builder = OptsBuilder::default()
        .ip_or_hostname(target.host())
        .tcp_port(port_or_default(target))
        .prefer_socket(false);

    if !target.database().is_empty() {
        builder = builder.db_name(Some(target.database()));
    }
    if !target.username().is_empty() {
        builder = builder.user(Some(target.username()));
    }
    if !target.password().is_empty() {
        builder = builder.pass(Some(target.password()));
    }

    if target.tls() {
        let skip = target.tls_skip_verify();
        builder = builder.ssl_opts(
            SslOpts::default()
                .with_danger_accept_invalid_certs(skip)
                .with_danger_skip_domain_validation(skip),
        );
    }

    builder
}

/// Map pool limits onto driver pool options.
fn to_pool_opts(limits: &PoolLimits) -> Result<PoolOpts, DriverError> {
    if limits.max_open == 0 {
        return Err("max_open must be greater than zero".into());
    }
    let constraints = PoolConstraints::new(limits.max_idle.min(limits.max_open), limits.max_open)
        .ok_or_else(|| {
            format!(
                "invalid pool limits: max_idle={} max_open={}",
                limits.max_idle, limits.max_open
            )
        })?;

    Ok(PoolOpts::new()
        .with_constraints(constraints)
        .with_abs_conn_ttl(limits.max_lifetime))
}
