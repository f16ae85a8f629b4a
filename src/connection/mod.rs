//! Connection management
//!
//! This module handles:
//! * Connection configuration and TLS bundle handling
//! * The driver seam (connect, text query, close)
//! * Connection lifecycle (query execution, release exactly once)
//! * The sqlx-backed MySQL driver

mod config;
mod conn;
mod driver;
mod mysql;
mod state;
mod tls;

pub use config::{ConnectionConfig, ConnectionConfigBuilder, DEFAULT_PORT};
pub use conn::Connection;
pub use driver::{Driver, Session, TextRow};
pub use mysql::{MySqlDriver, MySqlSession};
pub use state::ConnectionState;
pub use tls::{TlsBundle, TlsMode};
