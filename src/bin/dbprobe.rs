//! dbprobe - list the databases visible on a MySQL-compatible server
//!
//! Reads `DB_*` variables from the environment, connects (requiring TLS when a
//! client certificate bundle is configured), and prints an HTML fragment on
//! stdout. Configuration and connection failures print a single line on stderr
//! and exit with status 1, with nothing on stdout.

use clap::Parser;
use std::process::ExitCode;

use dbprobe::config::{
    self, EnvProvider, MapProvider, Overlay, PermissiveDefaults, ProbeSettings,
};
use dbprobe::connection::MySqlDriver;
use dbprobe::retry::TokioSleeper;
use dbprobe::{logging, Probe, Result};

#[derive(Parser, Debug)]
#[command(name = "dbprobe")]
#[command(version)]
#[command(about = "Probe a MySQL-compatible server and render its databases as HTML")]
struct Cli {
    /// Fail on missing DB_* variables and retry the connection (env: DB_PROBE_STRICT)
    #[arg(long)]
    strict: bool,

    /// Total connection attempts (env: DB_PROBE_MAX_ATTEMPTS)
    #[arg(long)]
    max_attempts: Option<u32>,

    /// Seconds to wait between attempts (env: DB_PROBE_BACKOFF_SECS)
    #[arg(long)]
    backoff_secs: Option<u64>,

    /// Engine label shown in the report heading (env: DB_PROBE_LABEL)
    #[arg(long)]
    label: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    /// Command-line flags as provider values, layered over the environment
    fn overrides(&self) -> MapProvider {
        let mut overrides = MapProvider::new();
        if self.strict {
            overrides = overrides.with(config::DB_PROBE_STRICT, "true");
        }
        if let Some(max_attempts) = self.max_attempts {
            overrides = overrides.with(config::DB_PROBE_MAX_ATTEMPTS, max_attempts.to_string());
        }
        if let Some(backoff) = self.backoff_secs {
            overrides = overrides.with(config::DB_PROBE_BACKOFF_SECS, backoff.to_string());
        }
        if let Some(label) = &self.label {
            overrides = overrides.with(config::DB_PROBE_LABEL, label.as_str());
        }
        overrides
    }
}

async fn run(cli: &Cli) -> Result<String> {
    let provider = Overlay::new(cli.overrides(), EnvProvider);

    let settings = ProbeSettings::from_provider(&provider)?;
    let connection = config::load_config(
        &provider,
        settings.strictness,
        &PermissiveDefaults::default(),
    )?;

    let probe = Probe::new(MySqlDriver, TokioSleeper, settings);
    tracing::info!(
        host = %connection.host,
        port = connection.port,
        strictness = %probe.settings().strictness,
        max_attempts = probe.settings().retry.max_attempts(),
        tls = connection.tls_required(),
        "starting probe"
    );

    probe.run(&connection).await
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init_tracing(cli.verbose);

    match run(&cli).await {
        Ok(report) => {
            print!("{}", report);
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(category = e.category(), "probe failed");
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}
