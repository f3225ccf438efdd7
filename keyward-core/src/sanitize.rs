//! Error sanitizing decorator.
//!
//! The lifecycle core never scrubs its own errors. Instead, [`ErrorSanitizer`]
//! wraps any [`Database`] and rewrites errors at the boundary using the
//! secret values the core reports.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::database::Database;
use crate::error::DatabaseResult;
use crate::request::{
    DeleteUserRequest, DeleteUserResponse, InitializeRequest, InitializeResponse, NewUserRequest,
    NewUserResponse, UpdateUserRequest, UpdateUserResponse,
};

/// Mask used for password values.
pub const PASSWORD_MASK: &str = "[password]";

/// A set of secret values and the masks that replace them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SecretValues {
    values: BTreeMap<String, String>,
}

impl SecretValues {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a secret. Empty secrets are ignored.
    pub fn insert(&mut self, secret: impl Into<String>, mask: impl Into<String>) {
        let secret = secret.into();
        if !secret.is_empty() {
            self.values.insert(secret, mask.into());
        }
    }

    /// Register a password with the standard mask.
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.insert(password, PASSWORD_MASK);
        self
    }

    /// Check if no secrets are registered.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Number of registered secrets.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Iterate over `(secret, mask)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Replace every occurrence of every secret in `text`.
    ///
    /// Longer secrets are replaced first so that a secret containing another
    /// secret is masked whole.
    pub fn scrub(&self, text: &str) -> String {
        let mut ordered: Vec<_> = self.values.iter().collect();
        ordered.sort_by(|a, b| b.0.len().cmp(&a.0.len()));

        let mut out = text.to_string();
        for (secret, mask) in ordered {
            if out.contains(secret.as_str()) {
                out = out.replace(secret.as_str(), mask);
            }
        }
        out
    }
}

/// Source of the secret values to scrub, queried after every call.
pub type SecretsFn = Arc<dyn Fn() -> SecretValues + Send + Sync>;

/// Decorator that scrubs secret values out of every error a [`Database`] returns.
pub struct ErrorSanitizer<D> {
    inner: D,
    secrets: SecretsFn,
}

impl<D: Database> ErrorSanitizer<D> {
    /// Wrap `inner`, scrubbing the values `secrets` reports.
    pub fn new<F>(inner: D, secrets: F) -> Self
    where
        F: Fn() -> SecretValues + Send + Sync + 'static,
    {
        Self {
            inner,
            secrets: Arc::new(secrets),
        }
    }

    /// Get the wrapped database.
    pub fn inner(&self) -> &D {
        &self.inner
    }

    /// Consume the decorator and return the wrapped database.
    pub fn into_inner(self) -> D {
        self.inner
    }

    fn sanitize<T>(&self, result: DatabaseResult<T>) -> DatabaseResult<T> {
        result.map_err(|err| err.redact(&(self.secrets.as_ref())()))
    }
}

#[async_trait]
impl<D: Database> Database for ErrorSanitizer<D> {
    fn type_name(&self) -> &'static str {
        self.inner.type_name()
    }

    async fn initialize(&self, req: InitializeRequest) -> DatabaseResult<InitializeResponse> {
        let result = self.inner.initialize(req).await;
        self.sanitize(result)
    }

    async fn new_user(&self, req: NewUserRequest) -> DatabaseResult<NewUserResponse> {
        let result = self.inner.new_user(req).await;
        self.sanitize(result)
    }

    async fn update_user(&self, req: UpdateUserRequest) -> DatabaseResult<UpdateUserResponse> {
        let result = self.inner.update_user(req).await;
        self.sanitize(result)
    }

    async fn delete_user(&self, req: DeleteUserRequest) -> DatabaseResult<DeleteUserResponse> {
        let result = self.inner.delete_user(req).await;
        self.sanitize(result)
    }

    async fn close(&self) -> DatabaseResult<()> {
        let result = self.inner.close().await;
        self.sanitize(result)
    }
}
