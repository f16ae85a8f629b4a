//! Bounded connection retry
//!
//! A fixed number of attempts separated by a fixed delay: no jitter, no
//! exponential growth. The delay goes through a [`Sleeper`] so the policy can
//! be exercised without real time passing.

use crate::config::Strictness;
use crate::connection::{Connection, ConnectionConfig, Driver, Session};
use crate::{Error, Result};
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::Instrument;

/// Default attempt budget for the retrying variant
pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;

/// Default delay between attempts
pub const DEFAULT_BACKOFF: Duration = Duration::from_secs(2);

/// Attempt budget and delay between attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff: Duration,
}

impl RetryPolicy {
    /// Retry up to `max_attempts` attempts in total, sleeping `backoff` between them.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `max_attempts` is zero.
    pub fn bounded(max_attempts: u32, backoff: Duration) -> Result<Self> {
        if max_attempts == 0 {
            return Err(Error::Config("max attempts must be at least 1".into()));
        }
        Ok(Self {
            max_attempts,
            backoff,
        })
    }

    /// Single attempt, never sleeps
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            backoff: Duration::ZERO,
        }
    }

    /// Total attempt budget
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay between attempts
    pub fn backoff(&self) -> Duration {
        self.backoff
    }

    /// Longest time [`connect`] can spend sleeping: `(max_attempts - 1) * backoff`
    pub fn max_sleep(&self) -> Duration {
        self.backoff.saturating_mul(self.max_attempts - 1)
    }

    fn allows_another(&self, attempts_so_far: u32) -> bool {
        attempts_so_far < self.max_attempts
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff: DEFAULT_BACKOFF,
        }
    }
}

/// Suspends the caller between attempts
pub trait Sleeper {
    /// Wait for `duration`
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()>;
}

/// Sleeps on the tokio timer
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

impl Sleeper for TokioSleeper {
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> {
        tokio::time::sleep(duration)
    }
}

/// Outcome of connecting
pub enum ConnectionAttemptResult<S: Session> {
    /// Connected; no further attempts are made
    Success {
        /// The open connection
        connection: Connection<S>,
        /// Attempts made, including the successful one
        attempts: u32,
    },
    /// A single attempt failed in a way another attempt could fix
    TransientFailure(Error),
    /// No connection will be made: budget exhausted or the failure is permanent
    FatalFailure {
        /// Last observed error
        error: Error,
        /// Attempts made
        attempts: u32,
    },
}

impl<S: Session> ConnectionAttemptResult<S> {
    /// Whether a connection was obtained
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Attempts made (a lone transient failure counts as one)
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Success { attempts, .. } | Self::FatalFailure { attempts, .. } => *attempts,
            Self::TransientFailure(_) => 1,
        }
    }

    /// Convert into the connection or the error that prevented it
    pub fn into_result(self) -> Result<Connection<S>> {
        match self {
            Self::Success { connection, .. } => Ok(connection),
            Self::TransientFailure(error) | Self::FatalFailure { error, .. } => Err(error),
        }
    }
}

impl<S: Session> std::fmt::Debug for ConnectionAttemptResult<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success { connection, attempts } => f
                .debug_struct("Success")
                .field("connection", connection)
                .field("attempts", attempts)
                .finish(),
            Self::TransientFailure(error) => f.debug_tuple("TransientFailure").field(error).finish(),
            Self::FatalFailure { error, attempts } => f
                .debug_struct("FatalFailure")
                .field("error", error)
                .field("attempts", attempts)
                .finish(),
        }
    }
}

/// Make exactly one connection attempt and classify the outcome
pub async fn attempt<D: Driver>(
    driver: &D,
    config: &ConnectionConfig,
) -> ConnectionAttemptResult<D::Session> {
    match driver.connect(config).await {
        Ok(session) => ConnectionAttemptResult::Success {
            connection: Connection::new(session),
            attempts: 1,
        },
        Err(error) if error.is_retriable() => ConnectionAttemptResult::TransientFailure(error),
        Err(error) => ConnectionAttemptResult::FatalFailure { error, attempts: 1 },
    }
}

/// Connect with bounded retry.
///
/// Never returns [`ConnectionAttemptResult::TransientFailure`]: transient
/// failures are retried until the budget runs out and then reported as fatal.
/// Failed attempts are logged at `warn` in strict mode and `debug` otherwise.
pub async fn connect<D: Driver, Z: Sleeper>(
    driver: &D,
    config: &ConnectionConfig,
    policy: &RetryPolicy,
    sleeper: &Z,
    strictness: Strictness,
) -> ConnectionAttemptResult<D::Session> {
    let span = tracing::info_span!(
        "connect",
        host = %config.host,
        port = config.port,
        tls = config.tls_required(),
        max_attempts = policy.max_attempts(),
        max_sleep_ms = policy.max_sleep().as_millis() as u64
    );

    async {
        let mut attempts = 0u32;
        loop {
            let started = Instant::now();
            let outcome = attempt(driver, config).await;
            attempts += 1;
            crate::metrics::histograms::connect_duration(started.elapsed());

            match outcome {
                ConnectionAttemptResult::Success { connection, .. } => {
                    crate::metrics::counters::connection_attempt("success");
                    tracing::info!(attempts, "connected");
                    return ConnectionAttemptResult::Success {
                        connection,
                        attempts,
                    };
                }
                ConnectionAttemptResult::FatalFailure { error, .. } => {
                    crate::metrics::counters::connection_attempt("fatal");
                    tracing::error!(attempt = attempts, error = %error, "connection failed permanently");
                    return ConnectionAttemptResult::FatalFailure { error, attempts };
                }
                ConnectionAttemptResult::TransientFailure(error) => {
                    crate::metrics::counters::connection_attempt("transient");
                    log_failed_attempt(strictness, attempts, policy, &error);

                    if !policy.allows_another(attempts) {
                        let error = if policy.max_attempts() > 1 {
                            Error::RetriesExhausted {
                                attempts,
                                source: Box::new(error),
                            }
                        } else {
                            error
                        };
                        return ConnectionAttemptResult::FatalFailure { error, attempts };
                    }

                    sleeper.sleep(policy.backoff()).await;
                }
            }
        }
    }
    .instrument(span)
    .await
}

fn log_failed_attempt(strictness: Strictness, attempt: u32, policy: &RetryPolicy, error: &Error) {
    let max_attempts = policy.max_attempts();
    match strictness {
        Strictness::Strict => tracing::warn!(
            attempt,
            max_attempts,
            error = %error,
            "connection attempt failed"
        ),
        Strictness::Permissive => tracing::debug!(
            attempt,
            max_attempts,
            error = %error,
            "connection attempt failed"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::TextRow;
    use std::cell::{Cell, RefCell};
    use std::sync::{Arc, Mutex};
    use tracing_subscriber::fmt::MakeWriter;

    struct NullSession;

    impl Session for NullSession {
        async fn query_text(&mut self, _sql: &str) -> Result<Vec<TextRow>> {
            Ok(Vec::new())
        }

        async fn close(self) -> Result<()> {
            Ok(())
        }
    }

    /// Fails `failures` times, then connects
    struct FlakyDriver {
        failures: u32,
        permanent: bool,
        calls: Cell<u32>,
    }

    impl FlakyDriver {
        fn failing(failures: u32) -> Self {
            Self {
                failures,
                permanent: false,
                calls: Cell::new(0),
            }
        }

        fn permanent() -> Self {
            Self {
                failures: u32::MAX,
                permanent: true,
                calls: Cell::new(0),
            }
        }
    }

    impl Driver for FlakyDriver {
        type Session = NullSession;

        async fn connect(&self, config: &ConnectionConfig) -> Result<NullSession> {
            let call = self.calls.get() + 1;
            self.calls.set(call);
            if self.permanent {
                return Err(Error::Config("unreadable CA certificate".into()));
            }
            if call <= self.failures {
                return Err(Error::connection(
                    format!("Connection refused (attempt {})", call),
                    config.tls_required(),
                ));
            }
            Ok(NullSession)
        }
    }

    #[derive(Default)]
    struct RecordingSleeper {
        sleeps: RefCell<Vec<Duration>>,
    }

    impl Sleeper for RecordingSleeper {
        fn sleep(&self, duration: Duration) -> impl Future<Output = ()> {
            self.sleeps.borrow_mut().push(duration);
            std::future::ready(())
        }
    }

    fn config() -> ConnectionConfig {
        ConnectionConfig::new("db.internal", "app", "secret")
    }

    #[test]
    fn test_policy_defaults() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts(), 10);
        assert_eq!(policy.backoff(), Duration::from_secs(2));
        assert_eq!(policy.max_sleep(), Duration::from_secs(18));
    }

    #[test]
    fn test_policy_none_is_single_attempt() {
        let policy = RetryPolicy::none();
        assert_eq!(policy.max_attempts(), 1);
        assert_eq!(policy.max_sleep(), Duration::ZERO);
    }

    #[test]
    fn test_policy_rejects_zero_attempts() {
        assert!(RetryPolicy::bounded(0, DEFAULT_BACKOFF).is_err());
    }

    #[tokio::test]
    async fn test_succeeds_after_transient_failures() {
        let driver = FlakyDriver::failing(3);
        let sleeper = RecordingSleeper::default();
        let policy = RetryPolicy::bounded(10, Duration::from_secs(2)).unwrap();

        let outcome = connect(&driver, &config(), &policy, &sleeper, Strictness::Strict).await;

        assert!(outcome.is_success());
        assert_eq!(outcome.attempts(), 4);
        assert_eq!(driver.calls.get(), 4);
        assert_eq!(*sleeper.sleeps.borrow(), vec![Duration::from_secs(2); 3]);
        outcome.into_result().unwrap().close().await.unwrap();
    }

    #[tokio::test]
    async fn test_first_attempt_success_never_sleeps() {
        let driver = FlakyDriver::failing(0);
        let sleeper = RecordingSleeper::default();

        let outcome = connect(
            &driver,
            &config(),
            &RetryPolicy::default(),
            &sleeper,
            Strictness::Strict,
        )
        .await;

        assert_eq!(outcome.attempts(), 1);
        assert!(sleeper.sleeps.borrow().is_empty());
        outcome.into_result().unwrap().close().await.unwrap();
    }

    #[tokio::test]
    async fn test_gives_up_after_budget() {
        let driver = FlakyDriver::failing(u32::MAX);
        let sleeper = RecordingSleeper::default();
        let policy = RetryPolicy::bounded(10, Duration::from_secs(2)).unwrap();

        let outcome = connect(&driver, &config(), &policy, &sleeper, Strictness::Strict).await;

        assert!(!outcome.is_success());
        assert_eq!(outcome.attempts(), 10);
        assert_eq!(driver.calls.get(), 10);
        assert_eq!(sleeper.sleeps.borrow().len(), 9);

        match outcome {
            ConnectionAttemptResult::FatalFailure { error, attempts } => {
                assert_eq!(attempts, 10);
                let text = error.to_string();
                assert!(text.contains("attempt 10"), "last error kept: {}", text);
                assert!(matches!(error, Error::RetriesExhausted { attempts: 10, .. }));
            }
            other => panic!("expected fatal failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_single_attempt_surfaces_raw_error() {
        let driver = FlakyDriver::failing(u32::MAX);
        let sleeper = RecordingSleeper::default();

        let outcome = connect(
            &driver,
            &config(),
            &RetryPolicy::none(),
            &sleeper,
            Strictness::Permissive,
        )
        .await;

        assert_eq!(driver.calls.get(), 1);
        assert!(sleeper.sleeps.borrow().is_empty());
        let err = outcome.into_result().unwrap_err();
        assert_eq!(err.to_string(), "Connection failed: Connection refused (attempt 1)");
    }

    #[test]
    fn test_permanent_failure_is_not_retried() {
        let driver = FlakyDriver::permanent();
        let sleeper = RecordingSleeper::default();

        let outcome = tokio_test::block_on(connect(
            &driver,
            &config(),
            &RetryPolicy::default(),
            &sleeper,
            Strictness::Strict,
        ));

        assert_eq!(driver.calls.get(), 1);
        assert!(sleeper.sleeps.borrow().is_empty());
        assert!(matches!(
            outcome,
            ConnectionAttemptResult::FatalFailure {
                error: Error::Config(_),
                attempts: 1
            }
        ));
    }

    #[test]
    fn test_single_attempt_classification() {
        let transient = tokio_test::block_on(attempt(&FlakyDriver::failing(1), &config()));
        assert!(matches!(
            transient,
            ConnectionAttemptResult::TransientFailure(Error::Connection { .. })
        ));

        let fatal = tokio_test::block_on(attempt(&FlakyDriver::permanent(), &config()));
        assert!(matches!(fatal, ConnectionAttemptResult::FatalFailure { .. }));
    }

    #[tokio::test]
    async fn test_tls_failure_reports_ssl_required() {
        let bundle = crate::connection::TlsBundle::new("/k.pem", "/c.pem", "/ca.pem").unwrap();
        let config = ConnectionConfig::builder("db.internal", "app", "secret")
            .tls(bundle)
            .build();

        let outcome = connect(
            &FlakyDriver::failing(u32::MAX),
            &config,
            &RetryPolicy::none(),
            &RecordingSleeper::default(),
            Strictness::Strict,
        )
        .await;

        let err = outcome.into_result().unwrap_err();
        assert!(err
            .to_string()
            .starts_with("SSL connection required but failed"));
    }

    /// Collects formatted log output in memory
    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl CapturedLogs {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for CapturedLogs {
        type Writer = CapturedLogs;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    /// Run an always-failing 10-attempt connect and count WARN lines for failed attempts
    fn warned_attempts(strictness: Strictness) -> usize {
        let logs = CapturedLogs::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(logs.clone())
            .with_max_level(tracing::Level::WARN)
            .with_ansi(false)
            .finish();

        let driver = FlakyDriver::failing(u32::MAX);
        let policy = RetryPolicy::bounded(10, Duration::from_secs(2)).unwrap();
        let outcome = tracing::subscriber::with_default(subscriber, || {
            tokio_test::block_on(connect(
                &driver,
                &config(),
                &policy,
                &RecordingSleeper::default(),
                strictness,
            ))
        });
        assert_eq!(outcome.attempts(), 10);

        logs.contents()
            .lines()
            .filter(|line| line.contains("WARN") && line.contains("connection attempt failed"))
            .count()
    }

    #[test]
    fn test_strict_logs_every_failed_attempt() {
        assert_eq!(warned_attempts(Strictness::Strict), 10);
    }

    #[test]
    fn test_permissive_failed_attempts_stay_below_warn() {
        assert_eq!(warned_attempts(Strictness::Permissive), 0);
    }
}
