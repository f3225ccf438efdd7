//! The ClickHouse credential lifecycle.
//!
//! Every lifecycle call holds one instance-wide lock for its full duration,
//! so statements from concurrent calls never interleave on the server.

use std::sync::Arc;

use async_trait::async_trait;
use keyward_core::{
    Database, DatabaseError, DatabaseResult, DeleteUserRequest, DeleteUserResponse,
    ErrorSanitizer, InitializeRequest, InitializeResponse, NewUserRequest, NewUserResponse,
    Placeholders, SecretValues, UpdateUserRequest, UpdateUserResponse, split_statements,
};
use keyward_template::{DEFAULT_USERNAME_TEMPLATE, TemplateInput, UsernameGenerator};
use parking_lot::RwLock;
use serde_json::{Map, Value};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::config::UsernameSettings;
use crate::connector::{AdminConnection, Connector};
use crate::mysql::MysqlConnector;
use crate::producer::ConnectionProducer;

/// Plugin type name.
pub const CLICKHOUSE_TYPE_NAME: &str = "clickhouse";

/// Rotation statement used when UpdateUser supplies none.
pub const DEFAULT_ROTATE_CREDENTIALS_STATEMENT: &str =
    "ALTER USER IF EXISTS '{{name}}' IDENTIFIED BY '{{password}}'";

/// Revocation statement used when DeleteUser supplies none.
pub const DEFAULT_REVOCATION_STATEMENT: &str = "DROP USER IF EXISTS '{{name}}'";

/// The default username template.
pub fn default_username_template() -> &'static str {
    DEFAULT_USERNAME_TEMPLATE
}

/// Lifecycle state of a plugin instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// Created, Initialize has not succeeded yet.
    Uninitialized,
    /// Ready to serve credential requests.
    Initialized,
    /// Closed. Every further call fails with [`DatabaseError::Closed`].
    Closed,
}

struct Inner<C: Connector> {
    producer: ConnectionProducer<C>,
    default_usernames: UsernameGenerator,
    usernames: UsernameGenerator,
    state: LifecycleState,
}

impl<C: Connector> Inner<C> {
    fn ensure_ready(&self) -> DatabaseResult<()> {
        match self.state {
            LifecycleState::Initialized => Ok(()),
            LifecycleState::Uninitialized => Err(DatabaseError::NotInitialized),
            LifecycleState::Closed => Err(DatabaseError::Closed),
        }
    }

    /// Substitute, split and execute each statement in order, stopping at the
    /// first failing fragment.
    async fn execute(
        &mut self,
        statements: &[String],
        placeholders: &Placeholders,
    ) -> DatabaseResult<()> {
        let conn = self.producer.connection().await?;

        for (index, statement) in statements.iter().enumerate() {
            let rendered = placeholders.apply(statement);
            let fragments = split_statements(&rendered);
            for (fragment_index, fragment) in fragments.iter().enumerate() {
                debug!(
                    statement = index,
                    fragment = fragment_index,
                    len = fragment.len(),
                    "Executing fragment"
                );
                conn.execute(fragment)
                    .await
                    .map_err(|e| DatabaseError::execution(fragment.as_str(), e))?;
            }
        }

        Ok(())
    }
}

/// ClickHouse credential plugin.
///
/// # Example
///
/// ```rust,no_run
/// use keyward_clickhouse::ClickhouseDatabase;
/// use keyward_core::{Database, InitializeRequest};
/// use serde_json::json;
///
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let db = ClickhouseDatabase::new("0.1.0")?.sanitized();
///
/// let config = json!({ "host": "clickhouse", "port": 9004, "username": "admin" });
/// db.initialize(InitializeRequest {
///     config: config.as_object().cloned().unwrap_or_default(),
///     verify_connection: true,
/// })
/// .await?;
/// # Ok(())
/// # }
/// ```
pub struct ClickhouseDatabase<C: Connector = MysqlConnector> {
    inner: Mutex<Inner<C>>,
    secrets: RwLock<SecretValues>,
    version: String,
}

impl ClickhouseDatabase<MysqlConnector> {
    /// Create an instance using the MySQL-interface connector and the
    /// default username template.
    pub fn new(version: impl Into<String>) -> DatabaseResult<Self> {
        Self::with_connector(MysqlConnector::new(), DEFAULT_USERNAME_TEMPLATE, version)
    }
}

impl<C: Connector> ClickhouseDatabase<C> {
    /// Create an instance with a custom connector and username template.
    pub fn with_connector(
        connector: C,
        username_template: &str,
        version: impl Into<String>,
    ) -> DatabaseResult<Self> {
        let usernames = UsernameGenerator::new(username_template)
            .map_err(|e| DatabaseError::username_template(e.to_string()))?;

        Ok(Self {
            inner: Mutex::new(Inner {
                producer: ConnectionProducer::new(connector),
                default_usernames: usernames.clone(),
                usernames,
                state: LifecycleState::Uninitialized,
            }),
            secrets: RwLock::new(SecretValues::new()),
            version: version.into(),
        })
    }

    /// Wrap this instance so every error is scrubbed of secret values.
    pub fn sanitized(self) -> ErrorSanitizer<Arc<Self>> {
        let db = Arc::new(self);
        let source = Arc::clone(&db);
        ErrorSanitizer::new(db, move || source.secret_values())
    }

    /// Plugin version.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Plugin metadata: `type` and `version`.
    pub fn metadata(&self) -> Map<String, Value> {
        let mut metadata = Map::new();
        metadata.insert("type".into(), Value::String(CLICKHOUSE_TYPE_NAME.into()));
        metadata.insert("version".into(), Value::String(self.version.clone()));
        metadata
    }

    /// Secret values that must never appear in error text.
    ///
    /// Reads a snapshot refreshed by Initialize, so it never waits on an
    /// in-flight lifecycle call.
    pub fn secret_values(&self) -> SecretValues {
        self.secrets.read().clone()
    }

    /// Current lifecycle state.
    pub async fn state(&self) -> LifecycleState {
        self.inner.lock().await.state
    }
}

#[async_trait]
impl<C: Connector> Database for ClickhouseDatabase<C> {
    fn type_name(&self) -> &'static str {
        CLICKHOUSE_TYPE_NAME
    }

    async fn initialize(&self, req: InitializeRequest) -> DatabaseResult<InitializeResponse> {
        let mut inner = self.inner.lock().await;
        if inner.state == LifecycleState::Closed {
            return Err(DatabaseError::Closed);
        }

        let settings = UsernameSettings::from_map(&req.config)?;
        let mut usernames = if settings.username_template.is_empty() {
            inner.default_usernames.clone()
        } else {
            UsernameGenerator::new(&settings.username_template)
                .map_err(|e| DatabaseError::username_template(e.to_string()))?
        };
        if let Some(max) = settings.username_max_length {
            usernames = usernames.with_max_length(max);
        }

        let result = inner.producer.init(&req.config, req.verify_connection).await;
        *self.secrets.write() = inner.producer.secret_values();
        if let Err(e) = result {
            if !inner.producer.is_initialized() {
                inner.state = LifecycleState::Uninitialized;
            }
            return Err(e);
        }

        inner.usernames = usernames;
        inner.state = LifecycleState::Initialized;
        info!(
            verify = req.verify_connection,
            "ClickHouse plugin initialized"
        );

        Ok(InitializeResponse { config: req.config })
    }

    async fn new_user(&self, req: NewUserRequest) -> DatabaseResult<NewUserResponse> {
        if req.statements.is_empty() {
            return Err(DatabaseError::NoCreationStatements);
        }

        let mut inner = self.inner.lock().await;
        inner.ensure_ready()?;

        let username = inner.usernames.generate(&TemplateInput::new(
            &req.username_config.display_name,
            &req.username_config.role_name,
        ));
        let placeholders = Placeholders::for_user(&username)
            .password(&req.password)
            .expiration(&req.expiration);

        inner
            .execute(&req.statements.commands, &placeholders)
            .await?;

        info!(username = %username, "Created user");
        Ok(NewUserResponse { username })
    }

    async fn update_user(&self, req: UpdateUserRequest) -> DatabaseResult<UpdateUserResponse> {
        if !req.has_changes() {
            return Err(DatabaseError::NoChanges);
        }

        let mut inner = self.inner.lock().await;
        inner.ensure_ready()?;

        if let Some(change) = &req.password {
            let statements = if change.statements.is_empty() {
                vec![DEFAULT_ROTATE_CREDENTIALS_STATEMENT.to_string()]
            } else {
                change.statements.commands.clone()
            };
            let placeholders = Placeholders::for_user(&req.username).password(&change.new_password);
            inner.execute(&statements, &placeholders).await?;
            info!(username = %req.username, "Rotated user password");
        }

        if let Some(change) = &req.expiration {
            if change.statements.is_empty() {
                debug!(username = %req.username, "No renewal statements, expiration unchanged");
            } else {
                let placeholders =
                    Placeholders::for_user(&req.username).expiration(&change.new_expiration);
                inner
                    .execute(&change.statements.commands, &placeholders)
                    .await?;
                info!(username = %req.username, "Updated user expiration");
            }
        }

        Ok(UpdateUserResponse {})
    }

    async fn delete_user(&self, req: DeleteUserRequest) -> DatabaseResult<DeleteUserResponse> {
        let mut inner = self.inner.lock().await;
        inner.ensure_ready()?;

        let statements = if req.statements.is_empty() {
            vec![DEFAULT_REVOCATION_STATEMENT.to_string()]
        } else {
            req.statements.commands.clone()
        };

        inner
            .execute(&statements, &Placeholders::for_user(&req.username))
            .await
            .map_err(|e| {
                if e.is_execution() {
                    DatabaseError::revocation(&req.username, e)
                } else {
                    e
                }
            })?;

        info!(username = %req.username, "Deleted user");
        Ok(DeleteUserResponse {})
    }

    async fn close(&self) -> DatabaseResult<()> {
        let mut inner = self.inner.lock().await;
        if inner.state == LifecycleState::Closed {
            return Ok(());
        }
        inner.state = LifecycleState::Closed;
        inner.producer.close().await?;
        info!("ClickHouse plugin closed");
        Ok(())
    }
}
