//! ClickHouse connection string builder.
//!
//! Connection strings take the form
//! `clickhouse://host:port[/database][?key=value&...]`. Query keys are
//! emitted in sorted order so a given configuration always builds the same
//! string.

use std::collections::BTreeMap;

use keyward_core::{DatabaseError, DatabaseResult};
use url::Url;
use url::form_urlencoded;

/// Default URL scheme.
pub const DEFAULT_SCHEME: &str = "clickhouse";

const KEY_USERNAME: &str = "username";
const KEY_PASSWORD: &str = "password";
const KEY_SECURE: &str = "secure";
const KEY_SKIP_VERIFY: &str = "skip_verify";
const KEY_DEBUG: &str = "debug";

/// A ClickHouse connection target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnString {
    scheme: String,
    host: String,
    port: u16,
    database: String,
    username: String,
    password: String,
    tls: bool,
    tls_skip_verify: bool,
    debug: bool,
    extra_params: BTreeMap<String, String>,
}

impl Default for ConnString {
    fn default() -> Self {
        Self {
            scheme: DEFAULT_SCHEME.to_string(),
            host: String::new(),
            port: 0,
            database: String::new(),
            username: String::new(),
            password: String::new(),
            tls: false,
            tls_skip_verify: false,
            debug: false,
            extra_params: BTreeMap::new(),
        }
    }
}

impl ConnString {
    /// Create an empty connection string with the default scheme.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a connection URL.
    ///
    /// Credentials in the userinfo take precedence over `username`/`password`
    /// query keys. Flags are set only by the literal value `true`. Other
    /// query keys are kept as extra parameters.
    pub fn parse(input: &str) -> DatabaseResult<Self> {
        let url = Url::parse(input).map_err(|e| {
            DatabaseError::config(format!("failed to parse connection string: {}", e))
        })?;

        let mut conn = Self {
            scheme: url.scheme().to_string(),
            host: url.host_str().unwrap_or_default().to_string(),
            port: url.port().unwrap_or(0),
            database: decode(url.path().trim_start_matches('/')),
            ..Self::default()
        };

        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                KEY_USERNAME => conn.username = value.into_owned(),
                KEY_PASSWORD => conn.password = value.into_owned(),
                KEY_SECURE => conn.tls = value == "true",
                KEY_SKIP_VERIFY => conn.tls_skip_verify = value == "true",
                KEY_DEBUG => conn.debug = value == "true",
                _ => {
                    conn.extra_params
                        .insert(key.into_owned(), value.into_owned());
                }
            }
        }

        if !url.username().is_empty() {
            conn.username = decode(url.username());
        }
        if let Some(password) = url.password() {
            conn.password = decode(password);
        }

        Ok(conn)
    }

    /// Set the scheme.
    pub fn with_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.scheme = scheme.into();
        self
    }

    /// Set the host.
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Set the port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the database.
    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self
    }

    /// Set the username.
    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = username.into();
        self
    }

    /// Set the password.
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = password.into();
        self
    }

    /// Enable TLS (`secure=true`).
    pub fn with_tls(mut self, tls: bool) -> Self {
        self.tls = tls;
        self
    }

    /// Skip certificate verification (`skip_verify=true`, only with TLS).
    pub fn with_tls_skip_verify(mut self, skip: bool) -> Self {
        self.tls_skip_verify = skip;
        self
    }

    /// Enable driver debugging (`debug=true`).
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Add an arbitrary query parameter.
    pub fn with_extra_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_params.insert(key.into(), value.into());
        self
    }

    /// Check that the target is complete enough to connect.
    pub fn check(&self) -> DatabaseResult<()> {
        if self.host.is_empty() {
            return Err(DatabaseError::config("host is required"));
        }
        if self.port == 0 {
            return Err(DatabaseError::config("port is required"));
        }
        Ok(())
    }

    /// Render the connection string.
    pub fn build(&self) -> String {
        let mut out = format!("{}://{}:{}", self.scheme, self.host, self.port);
        if !self.database.is_empty() {
            out.push('/');
            out.push_str(&urlencoding::encode(&self.database));
        }

        let mut query: BTreeMap<&str, &str> = self
            .extra_params
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        if !self.username.is_empty() {
            query.insert(KEY_USERNAME, &self.username);
        }
        if !self.password.is_empty() {
            query.insert(KEY_PASSWORD, &self.password);
        }
        if self.tls {
            query.insert(KEY_SECURE, "true");
            if self.tls_skip_verify {
                query.insert(KEY_SKIP_VERIFY, "true");
            }
        }
        if self.debug {
            query.insert(KEY_DEBUG, "true");
        }

        if !query.is_empty() {
            let mut serializer = form_urlencoded::Serializer::new(String::new());
            for (key, value) in &query {
                serializer.append_pair(key, value);
            }
            out.push('?');
            out.push_str(&serializer.finish());
        }

        out
    }

    /// The scheme.
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// The host.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// The port, zero when unset.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// The database, empty when unset.
    pub fn database(&self) -> &str {
        &self.database
    }

    /// The username.
    pub fn username(&self) -> &str {
        &self.username
    }

    /// The password.
    pub fn password(&self) -> &str {
        &self.password
    }

    /// Whether TLS is enabled.
    pub fn tls(&self) -> bool {
        self.tls
    }

    /// Whether certificate verification is skipped. Always false without TLS.
    pub fn tls_skip_verify(&self) -> bool {
        self.tls && self.tls_skip_verify
    }

    /// Whether driver debugging is enabled.
    pub fn debug(&self) -> bool {
        self.debug
    }

    /// Extra query parameters.
    pub fn extra_params(&self) -> &BTreeMap<String, String> {
        &self.extra_params
    }
}

fn decode(s: &str) -> String {
    urlencoding::decode(s)
        .map(|c| c.into_owned())
        .unwrap_or_else(|_| s.to_string())
}
