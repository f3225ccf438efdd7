//! The administrative connection seam.
//!
//! The producer only needs three things from a connection: a liveness probe,
//! a way to execute one statement, and a way to release it. Keeping those
//! behind a trait lets the lifecycle run against a recording fake in tests.

use async_trait::async_trait;
use keyward_core::DriverError;

use crate::config::PoolLimits;
use crate::conn_string::ConnString;

/// A pooled administrative connection handle.
#[async_trait]
pub trait AdminConnection: Send + Sync + 'static {
    /// Probe the server.
    async fn ping(&self) -> Result<(), DriverError>;

    /// Execute a single statement, discarding any result rows.
    async fn execute(&self, statement: &str) -> Result<(), DriverError>;

    /// Release the handle and every pooled connection behind it.
    async fn close(self) -> Result<(), DriverError>
    where
        Self: Sized;
}

/// Opens administrative connection handles.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// The handle type produced.
    type Connection: AdminConnection;

    /// Open a handle for `target` with the given pool limits.
    ///
    /// Opening may be lazy; callers probe with [`AdminConnection::ping`].
    async fn open(
        &self,
        target: &ConnString,
        limits: &PoolLimits,
    ) -> Result<Self::Connection, DriverError>;
}
