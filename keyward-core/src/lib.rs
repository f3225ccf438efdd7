//! Core contract for Keyward credential plugins.
//!
//! This crate defines what a credential plugin looks like to its host:
//!
//! - [`Database`] - the lifecycle trait (Initialize, NewUser, UpdateUser,
//!   DeleteUser, Close)
//! - [`request`] - the structured request/response records
//! - [`DatabaseError`] - the typed error taxonomy
//! - [`ErrorSanitizer`] - a decorator that scrubs secrets from errors
//! - [`statement`] - placeholder substitution and quote-aware splitting
//!
//! # Example
//!
//! ```rust
//! use keyward_core::statement::{Placeholders, split_statements};
//!
//! let sql = Placeholders::for_user("v-token-reader")
//!     .password("p;w")
//!     .apply("CREATE USER '{{name}}' IDENTIFIED BY '{{password}}'; GRANT reader TO '{{name}}'");
//!
//! let fragments = split_statements(&sql);
//! assert_eq!(fragments.len(), 2);
//! assert_eq!(fragments[1], "GRANT reader TO 'v-token-reader'");
//! ```

pub mod database;
pub mod error;
pub mod logging;
pub mod request;
pub mod sanitize;
pub mod statement;

pub use database::Database;
pub use error::{DatabaseError, DatabaseResult, DriverError};
pub use request::{
    ChangeExpiration, ChangePassword, ConfigMap, CredentialRequest, CredentialResponse,
    DeleteUserRequest, DeleteUserResponse, InitializeRequest, InitializeResponse, NewUserRequest,
    NewUserResponse, Statements, UpdateUserRequest, UpdateUserResponse, UsernameMetadata,
    dispatch,
};
pub use sanitize::{ErrorSanitizer, SecretValues};
pub use statement::{Placeholders, split_statements};
