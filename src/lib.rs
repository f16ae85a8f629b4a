//! dbprobe: connectivity probe for MySQL-compatible servers
//!
//! Connects (optionally requiring TLS with a client certificate bundle),
//! retries a bounded number of times with a fixed delay, runs two read-only
//! diagnostic queries and renders the outcome as an HTML fragment.
//!
//! ```no_run
//! # async fn example() -> dbprobe::Result<()> {
//! use dbprobe::config::{self, EnvProvider, PermissiveDefaults, ProbeSettings};
//! use dbprobe::connection::MySqlDriver;
//! use dbprobe::probe::Probe;
//! use dbprobe::retry::TokioSleeper;
//!
//! let settings = ProbeSettings::from_provider(&EnvProvider)?;
//! let config = config::load_config(&EnvProvider, settings.strictness, &PermissiveDefaults::default())?;
//! let report = Probe::new(MySqlDriver, TokioSleeper, settings).run(&config).await?;
//! println!("{}", report);
//! # Ok(())
//! # }
//! ```

#![warn(missing_debug_implementations)]

pub mod config;
pub mod connection;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod probe;
pub mod report;
pub mod retry;

pub use error::{Error, Result};
pub use probe::Probe;
