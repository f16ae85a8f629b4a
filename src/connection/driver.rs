//! Driver abstraction
//!
//! The probe needs only three capabilities from a database client: open a
//! session, run a text query, and close the session. Keeping them behind
//! traits lets the retry and reporting logic run against fakes in tests.

use super::ConnectionConfig;
use crate::Result;
use std::future::Future;

/// One result row, each column decoded as text (None = SQL NULL)
pub type TextRow = Vec<Option<String>>;

/// An open database session
pub trait Session {
    /// Run a read-only query using the text protocol and return every row
    fn query_text(&mut self, sql: &str) -> impl Future<Output = Result<Vec<TextRow>>>;

    /// Release the session
    fn close(self) -> impl Future<Output = Result<()>>;
}

/// Opens sessions
pub trait Driver {
    /// Session type produced by a successful connect
    type Session: Session;

    /// Make a single connection attempt.
    ///
    /// Implementations must not retry; [`crate::retry::connect`] owns the
    /// attempt budget.
    fn connect(&self, config: &ConnectionConfig) -> impl Future<Output = Result<Self::Session>>;
}
