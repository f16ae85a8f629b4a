//! Connection configuration

use super::tls::TlsBundle;
use sqlx::mysql::{MySqlConnectOptions, MySqlSslMode};
use std::time::Duration;

/// Default MySQL port
pub const DEFAULT_PORT: u16 = 3306;

/// Connection configuration
///
/// Built once at startup (usually by [`crate::config::load_config`]) and never
/// mutated afterwards. Use `ConnectionConfig::builder()` to set the optional
/// port, schema, timeout and TLS bundle.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// Server host name or address
    pub host: String,
    /// Server port (default: 3306)
    pub port: u16,
    /// Username
    pub user: String,
    /// Password
    pub password: String,
    /// Schema to select on connect (None = no default schema)
    pub database: Option<String>,
    /// Connection timeout per attempt
    pub connect_timeout: Option<Duration>,
    /// TLS bundle; when present TLS is required
    pub tls: Option<TlsBundle>,
}

impl ConnectionConfig {
    /// Create new configuration with defaults
    ///
    /// # Arguments
    ///
    /// * `host` - Server host
    /// * `user` - Username
    /// * `password` - Password
    ///
    /// # Defaults
    ///
    /// - `port`: 3306
    /// - `database`: None
    /// - `connect_timeout`: None
    /// - `tls`: None
    pub fn new(
        host: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self::builder(host, user, password).build()
    }

    /// Create a builder for advanced configuration
    ///
    /// # Examples
    ///
    /// ```ignore
    /// let config = ConnectionConfig::builder("db.internal", "app", "secret")
    ///     .database("app_db")
    ///     .connect_timeout(Duration::from_secs(5))
    ///     .build();
    /// ```
    pub fn builder(
        host: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> ConnectionConfigBuilder {
        ConnectionConfigBuilder {
            host: host.into(),
            port: DEFAULT_PORT,
            user: user.into(),
            password: password.into(),
            database: None,
            connect_timeout: None,
            tls: None,
        }
    }

    /// Whether connecting must negotiate TLS
    pub fn tls_required(&self) -> bool {
        self.tls.is_some()
    }

    /// Build driver connect options.
    ///
    /// With a TLS bundle the driver is told to require TLS before any
    /// credentials are sent, and is given the CA, certificate and key paths.
    /// Without one the session is plaintext, even if the server offers TLS.
    pub fn to_connect_options(&self) -> MySqlConnectOptions {
        let mut options = MySqlConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .password(&self.password);

        if let Some(database) = &self.database {
            options = options.database(database);
        }

        options = match &self.tls {
            Some(bundle) => options
                .ssl_mode(bundle.mode().to_mysql())
                .ssl_ca(bundle.ca_path())
                .ssl_client_cert(bundle.cert_path())
                .ssl_client_key(bundle.key_path()),
            None => options.ssl_mode(MySqlSslMode::Disabled),
        };

        options
    }
}

impl std::fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("database", &self.database)
            .field("connect_timeout", &self.connect_timeout)
            .field("tls", &self.tls)
            .finish()
    }
}

/// Builder for creating `ConnectionConfig`
#[derive(Debug, Clone)]
pub struct ConnectionConfigBuilder {
    host: String,
    port: u16,
    user: String,
    password: String,
    database: Option<String>,
    connect_timeout: Option<Duration>,
    tls: Option<TlsBundle>,
}

impl ConnectionConfigBuilder {
    /// Set the server port
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Select a schema on connect
    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    /// Set the per-attempt connection timeout
    ///
    /// Default: None (driver default)
    pub fn connect_timeout(mut self, duration: Duration) -> Self {
        self.connect_timeout = Some(duration);
        self
    }

    /// Require TLS using the given bundle
    pub fn tls(mut self, bundle: TlsBundle) -> Self {
        self.tls = Some(bundle);
        self
    }

    /// Build the configuration
    pub fn build(self) -> ConnectionConfig {
        ConnectionConfig {
            host: self.host,
            port: self.port,
            user: self.user,
            password: self.password,
            database: self.database,
            connect_timeout: self.connect_timeout,
            tls: self.tls,
        }
    }
}
