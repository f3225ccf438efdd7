//! Request and response records exchanged with the host.
//!
//! The host transport treats these as opaque structured values, so every
//! record is serde-serializable.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::database::Database;
use crate::error::{DatabaseError, DatabaseResult};

/// Raw configuration map passed to Initialize.
pub type ConfigMap = Map<String, Value>;

/// A list of templated SQL statements.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statements {
    /// Statement templates, executed in order.
    #[serde(default)]
    pub commands: Vec<String>,
}

impl Statements {
    /// Create a statement list.
    pub fn new<I, S>(commands: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            commands: commands.into_iter().map(Into::into).collect(),
        }
    }

    /// Check if no statements were supplied.
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

/// Metadata available to the username template.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsernameMetadata {
    /// Display name of the requesting token or entity.
    #[serde(default)]
    pub display_name: String,
    /// Name of the role the credential is issued for.
    #[serde(default)]
    pub role_name: String,
}

/// Initialize request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InitializeRequest {
    /// Connection and plugin configuration.
    #[serde(default)]
    pub config: ConfigMap,
    /// Whether to probe the connection before returning.
    #[serde(default)]
    pub verify_connection: bool,
}

/// Initialize response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InitializeResponse {
    /// The effective configuration, kept by the host.
    pub config: ConfigMap,
}

/// NewUser request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewUserRequest {
    /// Inputs to the username template.
    #[serde(default)]
    pub username_config: UsernameMetadata,
    /// Creation statements.
    #[serde(default)]
    pub statements: Statements,
    /// Statements the host may run if creation fails part way.
    #[serde(default)]
    pub rollback_statements: Statements,
    /// Password for the new user.
    pub password: String,
    /// When the credential expires.
    pub expiration: DateTime<Utc>,
}

/// NewUser response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewUserResponse {
    /// The generated username.
    pub username: String,
}

/// A requested password change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangePassword {
    /// The new password.
    pub new_password: String,
    /// Rotation statements; a default is used when empty.
    #[serde(default)]
    pub statements: Statements,
}

/// A requested expiration change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeExpiration {
    /// The new expiration.
    pub new_expiration: DateTime<Utc>,
    /// Renewal statements; nothing is executed when empty.
    #[serde(default)]
    pub statements: Statements,
}

/// UpdateUser request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateUserRequest {
    /// The user to update.
    pub username: String,
    /// Password change, if any.
    #[serde(default)]
    pub password: Option<ChangePassword>,
    /// Expiration change, if any.
    #[serde(default)]
    pub expiration: Option<ChangeExpiration>,
}

impl UpdateUserRequest {
    /// Check if the request carries at least one change.
    pub fn has_changes(&self) -> bool {
        self.password.is_some() || self.expiration.is_some()
    }
}

/// UpdateUser response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateUserResponse {}

/// DeleteUser request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteUserRequest {
    /// The user to revoke.
    pub username: String,
    /// Revocation statements; a default is used when empty.
    #[serde(default)]
    pub statements: Statements,
}

/// DeleteUser response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteUserResponse {}

/// A credential lifecycle request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum CredentialRequest {
    /// Create a user.
    NewUser(NewUserRequest),
    /// Rotate a password or renew an expiration.
    UpdateUser(UpdateUserRequest),
    /// Revoke a user.
    DeleteUser(DeleteUserRequest),
}

impl CredentialRequest {
    /// Check the request's structural invariants without touching a database.
    pub fn validate(&self) -> DatabaseResult<()> {
        match self {
            Self::NewUser(req) if req.statements.is_empty() => {
                Err(DatabaseError::NoCreationStatements)
            }
            Self::UpdateUser(req) if !req.has_changes() => Err(DatabaseError::NoChanges),
            _ => Ok(()),
        }
    }
}

/// Response to a [`CredentialRequest`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum CredentialResponse {
    /// A user was created.
    NewUser(NewUserResponse),
    /// A user was updated.
    UpdateUser(UpdateUserResponse),
    /// A user was revoked.
    DeleteUser(DeleteUserResponse),
}

/// Route a [`CredentialRequest`] to the matching lifecycle operation.
///
/// The request is validated first, so a malformed request never reaches
/// the plugin.
pub async fn dispatch<D>(db: &D, request: CredentialRequest) -> DatabaseResult<CredentialResponse>
where
    D: Database + ?Sized,
{
    request.validate()?;

    match request {
        CredentialRequest::NewUser(req) => db.new_user(req).await.map(CredentialResponse::NewUser),
        CredentialRequest::UpdateUser(req) => db
            .update_user(req)
            .await
            .map(CredentialResponse::UpdateUser),
        CredentialRequest::DeleteUser(req) => db
            .delete_user(req)
            .await
            .map(CredentialResponse::DeleteUser),
    }
}
