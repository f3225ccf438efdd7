//! # Keyward
//!
//! Ephemeral database credentials: issue, rotate and revoke database users
//! on demand from templated SQL.
//!
//! Keyward provides:
//! - A host-facing plugin contract with typed errors and error sanitizing
//! - A small username template language with parse-time validation
//! - A ClickHouse plugin with a pooled, self-healing administrative connection
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use keyward::prelude::*;
//! use serde_json::json;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let db = ClickhouseDatabase::new("0.1.0")?.sanitized();
//!
//! let config = json!({ "host": "clickhouse", "port": 9004, "username": "admin", "password": "..." });
//! db.initialize(InitializeRequest {
//!     config: config.as_object().cloned().unwrap_or_default(),
//!     verify_connection: true,
//! })
//! .await?;
//!
//! let user = db
//!     .new_user(NewUserRequest {
//!         username_config: UsernameMetadata {
//!             display_name: "token".into(),
//!             role_name: "reader".into(),
//!         },
//!         statements: Statements::new(["CREATE USER '{{name}}' IDENTIFIED BY '{{password}}'"]),
//!         rollback_statements: Statements::default(),
//!         password: "generated".into(),
//!         expiration: chrono::Utc::now(),
//!     })
//!     .await?;
//! println!("created {}", user.username);
//! # Ok(())
//! # }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

/// Plugin contract, requests, errors and statement handling.
pub mod core {
    pub use keyward_core::*;
}

/// Username template language.
pub mod template {
    pub use keyward_template::*;
}

/// The ClickHouse plugin.
pub mod clickhouse {
    pub use keyward_clickhouse::*;
}

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::clickhouse::{ClickhouseDatabase, ConnString, ConnectionConfig};
    pub use crate::core::{
        ChangeExpiration, ChangePassword, Database, DatabaseError, DatabaseResult,
        DeleteUserRequest, ErrorSanitizer, InitializeRequest, NewUserRequest, Statements,
        UpdateUserRequest, UsernameMetadata,
    };
    pub use crate::template::{UsernameGenerator, validate_username};
}

// Re-export key types at the crate root
pub use crate::clickhouse::ClickhouseDatabase;
pub use crate::core::logging::init as init_logging;
pub use crate::core::{Database, DatabaseError, DatabaseResult};
