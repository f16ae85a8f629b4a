//! TLS bundle and mode for secure connections to MySQL-compatible servers.
//!
//! A bundle is the {client key, client certificate, CA certificate} triple. When
//! one is configured the connection must be encrypted; how strictly the server
//! certificate is checked is controlled by [`TlsMode`].

use crate::{Error, Result};
use rustls::{ClientConfig, RootCertStore};
use rustls_pemfile::Item;
use rustls_pki_types::{CertificateDer, PrivateKeyDer};
use sqlx::mysql::MySqlSslMode;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// SSL/TLS connection mode matching the MySQL `--ssl-mode` option.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TlsMode {
    /// No TLS (plaintext connection)
    Disabled,
    /// TLS required, but server certificate is not verified
    Required,
    /// TLS required, server certificate must be signed by the bundle's CA
    #[default]
    VerifyCa,
    /// TLS required, CA-signed certificate whose identity must match the host
    VerifyIdentity,
}

impl TlsMode {
    /// Whether this mode requires certificate verification (CA or identity)
    pub fn requires_verification(&self) -> bool {
        matches!(self, Self::VerifyCa | Self::VerifyIdentity)
    }

    /// Driver-level equivalent of this mode
    pub fn to_mysql(self) -> MySqlSslMode {
        match self {
            Self::Disabled => MySqlSslMode::Disabled,
            Self::Required => MySqlSslMode::Required,
            Self::VerifyCa => MySqlSslMode::VerifyCa,
            Self::VerifyIdentity => MySqlSslMode::VerifyIdentity,
        }
    }
}

impl std::fmt::Display for TlsMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disabled => write!(f, "disabled"),
            Self::Required => write!(f, "required"),
            Self::VerifyCa => write!(f, "verify-ca"),
            Self::VerifyIdentity => write!(f, "verify-identity"),
        }
    }
}

impl std::str::FromStr for TlsMode {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "disabled" => Ok(Self::Disabled),
            "required" => Ok(Self::Required),
            "verify-ca" => Ok(Self::VerifyCa),
            "verify-identity" => Ok(Self::VerifyIdentity),
            _ => Err(Error::Config(format!(
                "invalid ssl mode '{}': expected disabled, required, verify-ca, or verify-identity",
                s
            ))),
        }
    }
}

/// Client key, client certificate and CA certificate used to require TLS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsBundle {
    key_path: PathBuf,
    cert_path: PathBuf,
    ca_path: PathBuf,
    mode: TlsMode,
}

impl TlsBundle {
    /// Create a bundle from the three PEM file paths.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if any path is empty.
    pub fn new(
        key_path: impl Into<PathBuf>,
        cert_path: impl Into<PathBuf>,
        ca_path: impl Into<PathBuf>,
    ) -> Result<Self> {
        let bundle = Self {
            key_path: key_path.into(),
            cert_path: cert_path.into(),
            ca_path: ca_path.into(),
            mode: TlsMode::default(),
        };

        for (name, path) in [
            ("client key", &bundle.key_path),
            ("client certificate", &bundle.cert_path),
            ("CA certificate", &bundle.ca_path),
        ] {
            if path.as_os_str().is_empty() {
                return Err(Error::Config(format!("TLS bundle {} path is empty", name)));
            }
        }

        Ok(bundle)
    }

    /// Set how the server certificate is checked.
    ///
    /// # Errors
    ///
    /// A bundle always requires TLS, so [`TlsMode::Disabled`] is rejected.
    pub fn with_mode(mut self, mode: TlsMode) -> Result<Self> {
        if mode == TlsMode::Disabled {
            return Err(Error::Config(
                "a TLS bundle is configured but ssl mode is 'disabled'".into(),
            ));
        }
        self.mode = mode;
        Ok(self)
    }

    /// Path to the client private key
    pub fn key_path(&self) -> &Path {
        &self.key_path
    }

    /// Path to the client certificate
    pub fn cert_path(&self) -> &Path {
        &self.cert_path
    }

    /// Path to the CA certificate
    pub fn ca_path(&self) -> &Path {
        &self.ca_path
    }

    /// Certificate checking mode
    pub fn mode(&self) -> TlsMode {
        self.mode
    }

    /// Read and parse the three PEM files and check that they form a usable
    /// client configuration.
    ///
    /// The driver only opens these files during the handshake, where a bad file
    /// would look like any other network failure and be retried. Checking up
    /// front turns it into a configuration error.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a file cannot be read, holds no usable PEM
    /// item, or the key does not fit the certificate.
    pub fn validate(&self) -> Result<()> {
        let roots = load_ca(&self.ca_path)?;
        let chain = load_certs(&self.cert_path)?;
        let key = load_key(&self.key_path)?;

        let provider = Arc::new(rustls::crypto::ring::default_provider());
        ClientConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()
            .and_then(|builder| {
                builder
                    .with_root_certificates(roots)
                    .with_client_auth_cert(chain, key)
            })
            .map_err(|e| Error::Config(format!("unusable TLS bundle: {}", e)))?;

        tracing::debug!(mode = %self.mode, "TLS bundle validated");
        Ok(())
    }
}

fn read_pem(path: &Path, what: &str) -> Result<Vec<Item>> {
    let data = fs::read(path).map_err(|e| {
        Error::Config(format!(
            "Failed to read {} file '{}': {}",
            what,
            path.display(),
            e
        ))
    })?;

    let mut reader = std::io::Cursor::new(data);
    let mut items = Vec::new();
    loop {
        match rustls_pemfile::read_one(&mut reader) {
            Ok(Some(item)) => items.push(item),
            Ok(None) => break,
            Err(_) => {
                return Err(Error::Config(format!(
                    "Failed to parse {} from '{}'",
                    what,
                    path.display()
                )));
            }
        }
    }
    Ok(items)
}

fn certs_in(items: Vec<Item>) -> Vec<CertificateDer<'static>> {
    items
        .into_iter()
        .filter_map(|item| match item {
            Item::X509Certificate(cert) => Some(cert),
            _ => None,
        })
        .collect()
}

fn load_ca(path: &Path) -> Result<RootCertStore> {
    let certs = certs_in(read_pem(path, "CA certificate")?);
    let mut store = RootCertStore::empty();
    let (added, _ignored) = store.add_parsable_certificates(certs);
    if added == 0 {
        return Err(Error::Config(format!(
            "No valid certificates found in '{}'",
            path.display()
        )));
    }
    Ok(store)
}

fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>> {
    let certs = certs_in(read_pem(path, "client certificate")?);
    if certs.is_empty() {
        return Err(Error::Config(format!(
            "No valid certificates found in '{}'",
            path.display()
        )));
    }
    Ok(certs)
}

fn load_key(path: &Path) -> Result<PrivateKeyDer<'static>> {
    read_pem(path, "client key")?
        .into_iter()
        .find_map(|item| match item {
            Item::Pkcs1Key(key) => Some(PrivateKeyDer::from(key)),
            Item::Pkcs8Key(key) => Some(PrivateKeyDer::from(key)),
            Item::Sec1Key(key) => Some(PrivateKeyDer::from(key)),
            _ => None,
        })
        .ok_or_else(|| Error::Config(format!("No private key found in '{}'", path.display())))
}
