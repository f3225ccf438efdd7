//! ClickHouse credential plugin for Keyward.
//!
//! [`ClickhouseDatabase`] issues, rotates and revokes ClickHouse users by
//! executing templated SQL through a pooled administrative connection.
//!
//! # Configuration
//!
//! | Key | Meaning |
//! |---|---|
//! | `connection_url` | Full URL; `{{username}}`/`{{password}}` are substituted |
//! | `host`, `port`, `database` | Target, used when no URL is given |
//! | `username`, `password` | Administrative credentials |
//! | `tls`, `tls_skip_verify` | Transport security |
//! | `max_open_connections` | Pool size, default 4 |
//! | `max_idle_connections` | Idle connections kept, default `max_open_connections` |
//! | `max_connection_lifetime` | Seconds or `"30s"`/`"5m"`/`"1h"`, default unbounded |
//! | `username_template` | Username template, default [`default_username_template`] |
//! | `username_max_length` | Optional overall username length limit |
//! | `debug` | Raise per-statement driver logging |
//!
//! # Statements
//!
//! Statement templates may use `{{name}}` (alias `{{username}}`),
//! `{{password}}` and `{{expiration}}`. Each template is split on `;`
//! outside quotes and the fragments run in order; the first failure aborts
//! the call without rolling back what already ran.

pub mod config;
pub mod conn_string;
pub mod connector;
pub mod database;
pub mod mysql;
pub mod producer;

pub use config::{ConnectionConfig, PoolLimits, UsernameSettings};
pub use conn_string::ConnString;
pub use connector::{AdminConnection, Connector};
pub use database::{
    CLICKHOUSE_TYPE_NAME, ClickhouseDatabase, DEFAULT_REVOCATION_STATEMENT,
    DEFAULT_ROTATE_CREDENTIALS_STATEMENT, LifecycleState, default_username_template,
};
pub use mysql::{MysqlAdminConnection, MysqlConnector};
pub use producer::ConnectionProducer;
