//! MySQL driver backed by sqlx

use super::driver::{Driver, Session, TextRow};
use super::ConnectionConfig;
use crate::{Error, Result};
use sqlx::mysql::{MySqlConnection, MySqlRow};
use sqlx::{ConnectOptions, Executor, Row};

/// Opens single MySQL connections (no pool)
#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlDriver;

impl Driver for MySqlDriver {
    type Session = MySqlSession;

    async fn connect(&self, config: &ConnectionConfig) -> Result<MySqlSession> {
        let tls_required = config.tls_required();
        if let Some(bundle) = &config.tls {
            bundle.validate()?;
            if !bundle.mode().requires_verification() {
                tracing::warn!(mode = %bundle.mode(), "server certificate will not be verified");
            }
        }

        let options = config.to_connect_options();
        let connecting = options.connect();

        let result = match config.connect_timeout {
            Some(limit) => tokio::time::timeout(limit, connecting)
                .await
                .map_err(|_| {
                    Error::connection(
                        format!("timed out after {}ms", limit.as_millis()),
                        tls_required,
                    )
                })?,
            None => connecting.await,
        };

        let inner = result.map_err(|e| Error::from_connect(e, tls_required))?;
        tracing::debug!(host = %config.host, port = config.port, tls_required, "session opened");
        Ok(MySqlSession { inner })
    }
}

/// Open MySQL session
pub struct MySqlSession {
    inner: MySqlConnection,
}

impl std::fmt::Debug for MySqlSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("MySqlSession(MySqlConnection)")
    }
}

impl Session for MySqlSession {
    async fn query_text(&mut self, sql: &str) -> Result<Vec<TextRow>> {
        // A bare &str carries no arguments, so sqlx sends it over the text
        // protocol instead of preparing it. SHOW statements are not all
        // preparable.
        let rows = (&mut self.inner)
            .fetch_all(sql)
            .await
            .map_err(Error::from_query)?;
        Ok(rows.iter().map(decode_row).collect())
    }

    async fn close(self) -> Result<()> {
        sqlx::Connection::close(self.inner)
            .await
            .map_err(|e| Error::connection(e.to_string(), false))
    }
}

fn decode_row(row: &MySqlRow) -> TextRow {
    (0..row.len()).map(|i| decode_column(row, i)).collect()
}

// SHOW output columns may carry a binary collation, which sqlx refuses to
// decode as String; fall back to the raw bytes.
fn decode_column(row: &MySqlRow, index: usize) -> Option<String> {
    if let Ok(value) = row.try_get::<Option<String>, _>(index) {
        return value;
    }
    row.try_get::<Option<Vec<u8>>, _>(index)
        .ok()
        .flatten()
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
}
