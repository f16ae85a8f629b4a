//! Connectivity probe
//!
//! Connects with bounded retry, runs the two diagnostic queries and renders
//! the report. The connection, once obtained, is closed exactly once whatever
//! the queries return.

use crate::config::ProbeSettings;
use crate::connection::{Connection, ConnectionConfig, Driver, Session};
use crate::report::{self, DatabaseListing, TlsStatus};
use crate::retry::{self, Sleeper};
use crate::Result;

/// Query reporting the negotiated cipher (empty value = plaintext)
pub const TLS_STATUS_QUERY: &str = "SHOW STATUS LIKE 'Ssl_cipher'";

/// Query listing visible databases
pub const LIST_DATABASES_QUERY: &str = "SHOW DATABASES";

/// Ask the server which cipher the session uses.
///
/// Advisory only: a failed query or a missing row reports TLS as inactive.
pub async fn check_tls_status<S: Session>(conn: &mut Connection<S>) -> TlsStatus {
    match conn.simple_query(TLS_STATUS_QUERY).await {
        // Columns: Variable_name, Value
        Ok(rows) => {
            let cipher = rows
                .first()
                .and_then(|row| row.get(1))
                .and_then(|value| value.as_deref());
            TlsStatus::from_cipher(cipher)
        }
        Err(e) => {
            tracing::debug!(error = %e, "TLS status query failed, reporting plaintext");
            TlsStatus::inactive()
        }
    }
}

/// List databases in server order.
///
/// # Errors
///
/// Returns [`crate::Error::Query`] with the server's text if the query is
/// rejected. The connection stays usable.
pub async fn list_databases<S: Session>(conn: &mut Connection<S>) -> Result<DatabaseListing> {
    let rows = conn.simple_query(LIST_DATABASES_QUERY).await?;
    Ok(rows
        .into_iter()
        .filter_map(|row| row.into_iter().next().flatten())
        .collect())
}

/// One probe run
#[derive(Debug)]
pub struct Probe<D, Z> {
    driver: D,
    sleeper: Z,
    settings: ProbeSettings,
}

impl<D: Driver, Z: Sleeper> Probe<D, Z> {
    /// Create a probe
    pub fn new(driver: D, sleeper: Z, settings: ProbeSettings) -> Self {
        Self {
            driver,
            sleeper,
            settings,
        }
    }

    /// Settings this probe runs with
    pub fn settings(&self) -> &ProbeSettings {
        &self.settings
    }

    /// Run the probe and return the rendered report.
    ///
    /// # Errors
    ///
    /// Only connection failures are returned; no partial report is produced
    /// in that case. A rejected diagnostic query is rendered into the report
    /// instead.
    pub async fn run(&self, config: &ConnectionConfig) -> Result<String> {
        let mut conn = retry::connect(
            &self.driver,
            config,
            &self.settings.retry,
            &self.sleeper,
            self.settings.strictness,
        )
        .await
        .into_result()?;

        let tls = check_tls_status(&mut conn).await;
        if config.tls_required() && !tls.active() {
            tracing::warn!("TLS was required but the server reports no cipher");
        }

        let listing = list_databases(&mut conn).await;
        match &listing {
            Ok(listing) => tracing::info!(databases = listing.len(), "listed databases"),
            Err(e) => tracing::warn!(error = %e, "listing databases failed"),
        }

        let report = report::render(&self.settings.label, &listing, &tls);

        if let Err(e) = conn.close().await {
            tracing::warn!(error = %e, "failed to close connection cleanly");
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Strictness;
    use crate::connection::TextRow;
    use crate::retry::RetryPolicy;
    use crate::Error;
    use std::cell::{Cell, RefCell};
    use std::future::Future;
    use std::rc::Rc;
    use std::time::Duration;

    #[derive(Default)]
    struct Script {
        databases: Option<Vec<&'static str>>,
        cipher: Option<&'static str>,
        fail_connects: u32,
    }

    #[derive(Default)]
    struct Counters {
        connects: Cell<u32>,
        closes: Cell<u32>,
        queries: RefCell<Vec<String>>,
    }

    struct FakeDriver {
        script: Rc<Script>,
        counters: Rc<Counters>,
    }

    struct FakeSession {
        script: Rc<Script>,
        counters: Rc<Counters>,
    }

    impl Driver for FakeDriver {
        type Session = FakeSession;

        async fn connect(&self, _config: &ConnectionConfig) -> Result<FakeSession> {
            let n = self.counters.connects.get() + 1;
            self.counters.connects.set(n);
            if n <= self.script.fail_connects {
                return Err(Error::connection("Can't connect to MySQL server", false));
            }
            Ok(FakeSession {
                script: self.script.clone(),
                counters: self.counters.clone(),
            })
        }
    }

    impl Session for FakeSession {
        async fn query_text(&mut self, sql: &str) -> Result<Vec<TextRow>> {
            self.counters.queries.borrow_mut().push(sql.to_string());
            match sql {
                LIST_DATABASES_QUERY => match &self.script.databases {
                    Some(names) => Ok(names.iter().map(|n| vec![Some(n.to_string())]).collect()),
                    None => Err(Error::Query(
                        "Access denied; you need the SHOW DATABASES privilege <here>".into(),
                    )),
                },
                TLS_STATUS_QUERY => Ok(vec![vec![
                    Some("Ssl_cipher".to_string()),
                    Some(self.script.cipher.unwrap_or("").to_string()),
                ]]),
                other => panic!("unexpected query {}", other),
            }
        }

        async fn close(self) -> Result<()> {
            self.counters.closes.set(self.counters.closes.get() + 1);
            Ok(())
        }
    }

    struct NoSleep;

    impl Sleeper for NoSleep {
        fn sleep(&self, _duration: Duration) -> impl Future<Output = ()> {
            std::future::ready(())
        }
    }

    fn probe(script: Script, settings: ProbeSettings) -> (Probe<FakeDriver, NoSleep>, Rc<Counters>) {
        let counters = Rc::new(Counters::default());
        let driver = FakeDriver {
            script: Rc::new(script),
            counters: counters.clone(),
        };
        (Probe::new(driver, NoSleep, settings), counters)
    }

    fn config() -> ConnectionConfig {
        ConnectionConfig::new("db.internal", "app", "secret")
    }

    #[tokio::test]
    async fn test_run_success() {
        let (probe, counters) = probe(
            Script {
                databases: Some(vec!["information_schema", "app_db"]),
                ..Default::default()
            },
            ProbeSettings::default(),
        );

        let report = probe.run(&config()).await.unwrap();

        assert!(report.contains("<li>information_schema</li>\n<li>app_db</li>"));
        assert!(!report.contains("SSL Encrypted"));
        assert_eq!(counters.closes.get(), 1);
        assert_eq!(
            *counters.queries.borrow(),
            vec![TLS_STATUS_QUERY.to_string(), LIST_DATABASES_QUERY.to_string()]
        );
    }

    #[tokio::test]
    async fn test_run_reports_cipher() {
        let (probe, counters) = probe(
            Script {
                databases: Some(vec!["app_db"]),
                cipher: Some("TLS_AES_256_GCM_SHA384"),
                ..Default::default()
            },
            ProbeSettings::default(),
        );

        let report = probe.run(&config()).await.unwrap();
        assert!(report.contains("Database List (SSL Encrypted)"));
        assert!(report.contains("<p>SSL Cipher: TLS_AES_256_GCM_SHA384</p>"));
        assert_eq!(counters.closes.get(), 1);
    }

    #[tokio::test]
    async fn test_rejected_query_is_rendered_and_connection_closed() {
        let (probe, counters) = probe(Script::default(), ProbeSettings::default());

        let report = probe.run(&config()).await.expect("query errors are not fatal");

        assert!(report.contains(
            "<p>Error: Access denied; you need the SHOW DATABASES privilege &lt;here&gt;</p>"
        ));
        assert_eq!(counters.closes.get(), 1);
    }

    #[tokio::test]
    async fn test_fatal_connection_produces_no_report() {
        let settings = ProbeSettings {
            retry: RetryPolicy::bounded(3, Duration::from_secs(2)).unwrap(),
            strictness: Strictness::Strict,
            ..ProbeSettings::default()
        };
        let (probe, counters) = probe(
            Script {
                fail_connects: u32::MAX,
                ..Default::default()
            },
            settings,
        );

        let err = probe.run(&config()).await.unwrap_err();
        assert!(matches!(err, Error::RetriesExhausted { attempts: 3, .. }));
        assert_eq!(counters.connects.get(), 3);
        assert_eq!(counters.closes.get(), 0);
        assert!(counters.queries.borrow().is_empty());
    }

    #[tokio::test]
    async fn test_retry_then_report() {
        let (probe, counters) = probe(
            Script {
                databases: Some(vec!["app_db"]),
                fail_connects: 2,
                ..Default::default()
            },
            ProbeSettings::strict(),
        );
        assert_eq!(probe.settings().strictness, Strictness::Strict);

        let report = probe.run(&config()).await.unwrap();
        assert!(report.contains("<li>app_db</li>"));
        assert_eq!(counters.connects.get(), 3);
        assert_eq!(counters.closes.get(), 1);
    }

    #[tokio::test]
    async fn test_list_databases_skips_null_rows() {
        struct NullRows;

        impl Session for NullRows {
            async fn query_text(&mut self, _sql: &str) -> Result<Vec<TextRow>> {
                Ok(vec![vec![Some("a".into())], vec![None], vec![Some("b".into())]])
            }

            async fn close(self) -> Result<()> {
                Ok(())
            }
        }

        let mut conn = Connection::new(NullRows);
        let listing = list_databases(&mut conn).await.unwrap();
        assert_eq!(listing.names(), ["a".to_string(), "b".to_string()]);
        conn.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_check_tls_status_never_fails() {
        struct Rejecting;

        impl Session for Rejecting {
            async fn query_text(&mut self, _sql: &str) -> Result<Vec<TextRow>> {
                Err(Error::Query("denied".into()))
            }

            async fn close(self) -> Result<()> {
                Ok(())
            }
        }

        let mut conn = Connection::new(Rejecting);
        let status = check_tls_status(&mut conn).await;
        assert!(!status.active());
        conn.close().await.unwrap();
    }
}
