//! The credential plugin contract.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::DatabaseResult;
use crate::request::{
    DeleteUserRequest, DeleteUserResponse, InitializeRequest, InitializeResponse, NewUserRequest,
    NewUserResponse, UpdateUserRequest, UpdateUserResponse,
};

/// A database plugin that issues, rotates and revokes credentials.
///
/// Implementations serialize their own lifecycle calls; callers may invoke
/// any method concurrently from many tasks.
#[async_trait]
pub trait Database: Send + Sync {
    /// Short type name of the plugin, such as `"clickhouse"`.
    fn type_name(&self) -> &'static str;

    /// Configure the plugin and optionally verify connectivity.
    async fn initialize(&self, req: InitializeRequest) -> DatabaseResult<InitializeResponse>;

    /// Create a user and return its generated username.
    async fn new_user(&self, req: NewUserRequest) -> DatabaseResult<NewUserResponse>;

    /// Change a user's password and/or expiration.
    async fn update_user(&self, req: UpdateUserRequest) -> DatabaseResult<UpdateUserResponse>;

    /// Revoke a user.
    async fn delete_user(&self, req: DeleteUserRequest) -> DatabaseResult<DeleteUserResponse>;

    /// Release the administrative connection. Repeated calls are no-ops.
    async fn close(&self) -> DatabaseResult<()>;
}

#[async_trait]
impl<D: Database + ?Sized> Database for Arc<D> {
    fn type_name(&self) -> &'static str {
        (**self).type_name()
    }

    async fn initialize(&self, req: InitializeRequest) -> DatabaseResult<InitializeResponse> {
        (**self).initialize(req).await
    }

    async fn new_user(&self, req: NewUserRequest) -> DatabaseResult<NewUserResponse> {
        (**self).new_user(req).await
    }

    async fn update_user(&self, req: UpdateUserRequest) -> DatabaseResult<UpdateUserResponse> {
        (**self).update_user(req).await
    }

    async fn delete_user(&self, req: DeleteUserRequest) -> DatabaseResult<DeleteUserResponse> {
        (**self).delete_user(req).await
    }

    async fn close(&self) -> DatabaseResult<()> {
        (**self).close().await
    }
}
