//! Core connection type

use super::driver::{Session, TextRow};
use super::state::ConnectionState;
use crate::{Error, Result};
use tracing::Instrument;

/// Open connection owned by a single probe run
///
/// Wraps a driver [`Session`] and enforces the lifecycle: queries run one at a
/// time, and the session is released exactly once through [`Connection::close`].
pub struct Connection<S: Session> {
    session: Option<S>,
    state: ConnectionState,
}

impl<S: Session> Connection<S> {
    /// Wrap a freshly opened session
    pub fn new(session: S) -> Self {
        Self {
            session: Some(session),
            state: ConnectionState::Idle,
        }
    }

    /// Get current connection state
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Execute a simple text query and return its rows
    ///
    /// A server-side rejection comes back as [`Error::Query`]; the connection
    /// returns to idle and stays usable.
    pub async fn simple_query(&mut self, query: &str) -> Result<Vec<TextRow>> {
        self.state.transition(ConnectionState::QueryInProgress)?;

        let session = self.session.as_mut().ok_or_else(|| Error::InvalidState {
            expected: "open session".into(),
            actual: "session released".into(),
        })?;

        let result = session
            .query_text(query)
            .instrument(tracing::debug_span!("query", sql = %query))
            .await;

        self.state.transition(ConnectionState::Idle)?;

        let status = if result.is_ok() { "ok" } else { "error" };
        crate::metrics::counters::query_completed(query, status);
        if let Err(e) = &result {
            tracing::debug!(error = %e, "query rejected");
        }

        result
    }

    /// Close the connection
    pub async fn close(mut self) -> Result<()> {
        self.state.transition(ConnectionState::Closed)?;
        let session = self.session.take().ok_or_else(|| Error::InvalidState {
            expected: "open session".into(),
            actual: "session released".into(),
        })?;
        session.close().await?;
        tracing::info!("connection closed");
        Ok(())
    }
}

impl<S: Session> Drop for Connection<S> {
    fn drop(&mut self) {
        if self.state != ConnectionState::Closed {
            tracing::warn!(state = %self.state, "connection dropped without being closed");
        }
    }
}

impl<S: Session> std::fmt::Debug for Connection<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("state", &self.state)
            .field("session", &"<Session>")
            .finish()
    }
}
