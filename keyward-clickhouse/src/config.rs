//! ClickHouse plugin configuration.
//!
//! The Initialize config map arrives as loosely typed JSON, so every field is
//! decoded with a weak deserializer: numbers may arrive as strings, booleans
//! as `"1"`/`"true"`, and durations as seconds or `"30s"`/`"5m"`/`"1h"`.

use std::time::Duration;

use keyward_core::{ConfigMap, DatabaseError, DatabaseResult};
use serde::Deserialize;
use serde_json::Value;

use crate::conn_string::ConnString;

/// Default maximum number of open administrative connections.
pub const DEFAULT_MAX_OPEN_CONNECTIONS: usize = 4;

/// Connection settings decoded from the Initialize config map.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Full connection URL. May contain `{{username}}`/`{{password}}`.
    #[serde(deserialize_with = "weak::string")]
    pub connection_url: String,
    /// Server host, used when no URL is given.
    #[serde(deserialize_with = "weak::string")]
    pub host: String,
    /// Server port, used when no URL is given.
    #[serde(deserialize_with = "weak::port")]
    pub port: u16,
    /// Administrative username.
    #[serde(deserialize_with = "weak::string")]
    pub username: String,
    /// Administrative password.
    #[serde(deserialize_with = "weak::string")]
    pub password: String,
    /// Default database.
    #[serde(deserialize_with = "weak::string")]
    pub database: String,
    /// Connect over TLS.
    #[serde(deserialize_with = "weak::boolean")]
    pub tls: bool,
    /// Skip certificate verification. Only honored together with `tls`.
    #[serde(deserialize_with = "weak::boolean")]
    pub tls_skip_verify: bool,
    /// Maximum open connections. Zero means the default of four.
    #[serde(deserialize_with = "weak::count")]
    pub max_open_connections: usize,
    /// Maximum idle connections. Zero means `max_open_connections`.
    #[serde(deserialize_with = "weak::count")]
    pub max_idle_connections: usize,
    /// Maximum connection lifetime. `None` means unbounded.
    #[serde(deserialize_with = "weak::lifetime")]
    pub max_connection_lifetime: Option<Duration>,
    /// Raise driver logging.
    #[serde(deserialize_with = "weak::boolean")]
    pub debug: bool,
}

impl ConnectionConfig {
    /// Create an empty configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode a configuration from the Initialize config map.
    ///
    /// Unknown keys are ignored.
    pub fn from_map(map: &ConfigMap) -> DatabaseResult<Self> {
        serde_json::from_value(Value::Object(map.clone()))
            .map_err(|e| DatabaseError::config(format!("failed to decode configuration: {}", e)))
    }

    /// Fill in pool defaults.
    pub fn apply_defaults(&mut self) {
        if self.max_open_connections == 0 {
            self.max_open_connections = DEFAULT_MAX_OPEN_CONNECTIONS;
        }
        if self.max_idle_connections == 0 || self.max_idle_connections > self.max_open_connections
        {
            self.max_idle_connections = self.max_open_connections;
        }
    }

    /// Pool limits for the connector.
    pub fn pool_limits(&self) -> PoolLimits {
        PoolLimits::new(self.max_open_connections)
            .max_idle(self.max_idle_connections)
            .max_lifetime(self.max_connection_lifetime)
    }

    /// Build a connection string from the discrete fields.
    pub fn to_conn_string(&self) -> ConnString {
        ConnString::new()
            .with_host(&self.host)
            .with_port(self.port)
            .with_database(&self.database)
            .with_username(&self.username)
            .with_password(&self.password)
            .with_tls(self.tls)
            .with_tls_skip_verify(self.tls_skip_verify)
            .with_debug(self.debug)
    }

    /// Set the connection URL.
    pub fn connection_url(mut self, url: impl Into<String>) -> Self {
        self.connection_url = url.into();
        self
    }

    /// Set the host.
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Set the port.
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the username.
    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = username.into();
        self
    }

    /// Set the password.
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = password.into();
        self
    }

    /// Set the database.
    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self
    }

    /// Enable TLS.
    pub fn tls(mut self, tls: bool) -> Self {
        self.tls = tls;
        self
    }
}

/// Settings for the username generator, read from the same config map.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct UsernameSettings {
    /// Username template. Empty means the default template.
    #[serde(deserialize_with = "weak::string")]
    pub username_template: String,
    /// Overall length limit applied after rendering.
    #[serde(deserialize_with = "weak::optional_count")]
    pub username_max_length: Option<usize>,
}

impl UsernameSettings {
    /// Decode username settings from the Initialize config map.
    pub fn from_map(map: &ConfigMap) -> DatabaseResult<Self> {
        serde_json::from_value(Value::Object(map.clone()))
            .map_err(|e| DatabaseError::config(format!("failed to decode configuration: {}", e)))
    }
}

/// Limits applied to the administrative connection pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolLimits {
    /// Maximum open connections.
    pub max_open: usize,
    /// Connections retained while idle.
    pub max_idle: usize,
    /// Maximum lifetime of a connection.
    pub max_lifetime: Option<Duration>,
}

impl Default for PoolLimits {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_OPEN_CONNECTIONS)
    }
}

impl PoolLimits {
    /// Limits with `max_open` connections, all of which may idle.
    pub fn new(max_open: usize) -> Self {
        Self {
            max_open,
            max_idle: max_open,
            max_lifetime: None,
        }
    }

    /// Set the idle limit.
    pub fn max_idle(mut self, max_idle: usize) -> Self {
        self.max_idle = max_idle;
        self
    }

    /// Set the connection lifetime.
    pub fn max_lifetime(mut self, lifetime: Option<Duration>) -> Self {
        self.max_lifetime = lifetime;
        self
    }
}

mod weak {
    use std::time::Duration;

    use serde::de::Error;
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    fn kind(value: &Value) -> &'static str {
        match value {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        }
    }

    pub fn string<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
        match Value::deserialize(d)? {
            Value::Null => Ok(String::new()),
            Value::String(s) => Ok(s),
            Value::Number(n) => Ok(n.to_string()),
            Value::Bool(b) => Ok(b.to_string()),
            other => Err(D::Error::custom(format!(
                "expected a string, got {}",
                kind(&other)
            ))),
        }
    }

    pub fn boolean<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
        match Value::deserialize(d)? {
            Value::Null => Ok(false),
            Value::Bool(b) => Ok(b),
            Value::Number(n) => Ok(n.as_f64().is_some_and(|f| f != 0.0)),
            Value::String(s) => match s.trim() {
                "" | "0" | "f" | "F" | "false" | "FALSE" | "False" => Ok(false),
                "1" | "t" | "T" | "true" | "TRUE" | "True" => Ok(true),
                other => Err(D::Error::custom(format!(
                    "cannot parse {:?} as a boolean",
                    other
                ))),
            },
            other => Err(D::Error::custom(format!(
                "expected a boolean, got {}",
                kind(&other)
            ))),
        }
    }

    fn integer<E: Error>(value: Value) -> Result<i64, E> {
        match value {
            Value::Null => Ok(0),
            Value::Bool(b) => Ok(i64::from(b)),
            Value::Number(n) => match (n.as_i64(), n.as_f64()) {
                (Some(i), _) => Ok(i),
                (None, Some(f)) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => Ok(f as i64),
                _ => Err(E::custom(format!("{} is not an integer", n))),
            },
            Value::String(s) => {
                let s = s.trim();
                if s.is_empty() {
                    return Ok(0);
                }
                s.parse::<i64>()
                    .map_err(|_| E::custom(format!("cannot parse {:?} as an integer", s)))
            }
            other => Err(E::custom(format!(
                "expected an integer, got {}",
                kind(&other)
            ))),
        }
    }

    pub fn port<'de, D: Deserializer<'de>>(d: D) -> Result<u16, D::Error> {
        let n = integer::<D::Error>(Value::deserialize(d)?)?;
        u16::try_from(n).map_err(|_| D::Error::custom(format!("port {} is out of range", n)))
    }

    pub fn count<'de, D: Deserializer<'de>>(d: D) -> Result<usize, D::Error> {
        let n = integer::<D::Error>(Value::deserialize(d)?)?;
        usize::try_from(n).map_err(|_| D::Error::custom(format!("{} must not be negative", n)))
    }

    pub fn optional_count<'de, D: Deserializer<'de>>(d: D) -> Result<Option<usize>, D::Error> {
        match Value::deserialize(d)? {
            Value::Null => Ok(None),
            value => {
                let n = integer::<D::Error>(value)?;
                match usize::try_from(n) {
                    Ok(0) => Ok(None),
                    Ok(n) => Ok(Some(n)),
                    Err(_) => Err(D::Error::custom(format!("{} must not be negative", n))),
                }
            }
        }
    }

    pub fn lifetime<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        let value = Value::deserialize(d)?;
        let secs = match value {
            Value::String(s) => parse_duration_secs(s.trim()).map_err(D::Error::custom)?,
            other => {
                let n = integer::<D::Error>(other)?;
                u64::try_from(n)
                    .map_err(|_| D::Error::custom(format!("lifetime {} is negative", n)))?
            }
        };
        Ok((secs > 0).then(|| Duration::from_secs(secs)))
    }

    /// Parse `"90"`, `"30s"`, `"5m"`, `"1h"` or a combination such as `"1h30m"`.
    fn parse_duration_secs(s: &str) -> Result<u64, String> {
        if s.is_empty() {
            return Ok(0);
        }
        if let Ok(secs) = s.parse::<u64>() {
            return Ok(secs);
        }

        let mut total: u64 = 0;
        let mut digits = String::new();
        for ch in s.chars() {
            if ch.is_ascii_digit() {
                digits.push(ch);
                continue;
            }
            let unit = match ch {
                's' => 1,
                'm' => 60,
                'h' => 3600,
                _ => return Err(format!("invalid duration {:?}", s)),
            };
            let n: u64 = digits
                .parse()
                .map_err(|_| format!("invalid duration {:?}", s))?;
            total = total.saturating_add(n.saturating_mul(unit));
            digits.clear();
        }
        if !digits.is_empty() {
            return Err(format!("invalid duration {:?}: missing unit", s));
        }
        Ok(total)
    }

}
