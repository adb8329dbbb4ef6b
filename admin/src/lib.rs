//! Operator CLI for order sequence counters.
//!
//! ```text
//! order-sequence-admin init [--month YYYYMM]
//! order-sequence-admin list [--json]
//! order-sequence-admin next [--count N]
//! ```
//!
//! Every command accepts `--metrics` to print the Prometheus rendering of the
//! run's metrics before exiting.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use order_sequence_core::counter::{CounterRecord, RecordCount};
use order_sequence_core::counter_store::CounterStore;
use order_sequence_core::environment::{Clock, SystemClock};
use order_sequence_core::month::MonthKey;
use order_sequence_postgres::{DEFAULT_MAX_CONNECTIONS, PostgresCounterStore};
use order_sequence_runtime::metrics::MetricsServer;
use order_sequence_runtime::{
    ConfigError, CounterAdmin, MonthKeyResolver, OrderNumberGenerator, SequenceConfig,
};
use std::io::Write;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;

/// Environment variable with the Postgres connection string.
pub const DATABASE_URL_VAR: &str = "DATABASE_URL";
/// Environment variable with the connection pool size.
pub const DATABASE_MAX_CONNECTIONS_VAR: &str = "DATABASE_MAX_CONNECTIONS";

/// Command line of `order-sequence-admin`.
#[derive(Parser, Debug)]
#[command(name = "order-sequence-admin")]
#[command(about = "Inspect and provision monthly order number counters", long_about = None)]
pub struct Cli {
    /// Print Prometheus metrics before exiting
    #[arg(long, global = true)]
    pub metrics: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Admin subcommands.
#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Create the counter for a month if it does not exist yet
    Init {
        /// Month key (YYYYMM); defaults to the current month in the business time zone
        #[arg(long)]
        month: Option<MonthKey>,
    },

    /// List every counter, oldest month first
    List {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Issue order numbers through the full numbering chain
    Next {
        /// How many numbers to issue
        #[arg(long, default_value_t = 1)]
        count: u32,
    },
}

/// Configuration of the admin binary.
#[derive(Debug, Clone, PartialEq)]
pub struct AdminConfig {
    /// Postgres connection string.
    pub database_url: String,
    /// Connection pool size.
    pub max_connections: u32,
    /// Generator settings.
    pub sequence: SequenceConfig,
}

impl AdminConfig {
    /// Load configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if `DATABASE_URL` is unset or any variable is
    /// invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if `DATABASE_URL` is unset or any variable is
    /// invalid.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup(DATABASE_URL_VAR).ok_or(ConfigError::Missing(DATABASE_URL_VAR))?;
        let max_connections = match lookup(DATABASE_MAX_CONNECTIONS_VAR) {
            Some(raw) => raw.trim().parse().map_err(|e: std::num::ParseIntError| {
                ConfigError::InvalidValue {
                    name: DATABASE_MAX_CONNECTIONS_VAR,
                    value: raw.clone(),
                    reason: e.to_string(),
                }
            })?,
            None => DEFAULT_MAX_CONNECTIONS,
        };

        Ok(Self {
            database_url,
            max_connections,
            sequence: SequenceConfig::from_lookup(lookup)?,
        })
    }
}

/// Load configuration, open the counter store and run `cli`'s command.
///
/// # Errors
///
/// Returns an error if configuration is invalid, the store cannot be opened,
/// or the command fails.
pub async fn run(cli: Cli) -> Result<()> {
    let config = AdminConfig::from_env().context("Invalid configuration")?;
    tracing::info!(
        time_zone = %config.sequence.time_zone,
        max_connections = config.max_connections,
        "Configuration loaded"
    );

    let mut metrics = cli
        .metrics
        .then(|| MetricsServer::new(SocketAddr::from((Ipv4Addr::LOCALHOST, 0))));
    if let Some(server) = metrics.as_mut() {
        server.start()?;
    }

    let store = PostgresCounterStore::connect(&config.database_url, config.max_connections)
        .await
        .context("Failed to open counter store")?;
    store.migrate().await?;

    let shared: Arc<dyn CounterStore> = Arc::new(store.clone());
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let generator =
        OrderNumberGenerator::from_config(Arc::clone(&shared), Arc::clone(&clock), &config.sequence);
    let admin = CounterAdmin::new(shared, MonthKeyResolver::new(config.sequence.time_zone, clock));

    let mut out = std::io::stdout();
    let result = execute(&cli.command, &generator, &admin, &mut out).await;
    store.close().await;

    if let Some(rendered) = metrics.as_ref().and_then(MetricsServer::render) {
        writeln!(out, "{rendered}")?;
    }
    result
}

/// Run one command against already opened services, writing to `out`.
///
/// # Errors
///
/// Returns an error if a store operation or the write fails.
pub async fn execute<W: Write>(
    command: &Command,
    generator: &OrderNumberGenerator,
    admin: &CounterAdmin,
    out: &mut W,
) -> Result<()> {
    match command {
        Command::Init { month } => {
            let record = admin.initialize_counter(*month).await?;
            write_table(out, std::slice::from_ref(&record))?;
        }
        Command::List { json: true } => {
            let counters = admin.list_counters().await?;
            serde_json::to_writer_pretty(&mut *out, &counters)?;
            writeln!(out)?;
        }
        Command::List { json: false } => {
            let counters = admin.list_counters().await?;
            if counters.is_empty() {
                writeln!(out, "No counters")?;
            } else {
                write_table(out, &counters)?;
            }
        }
        Command::Next { count } => {
            for _ in 0..*count {
                let number = generator.next_order_number().await;
                writeln!(out, "{number}\t{}", number.mode())?;
            }
        }
    }
    Ok(())
}

fn write_table<W: Write>(out: &mut W, counters: &[CounterRecord]) -> std::io::Result<()> {
    writeln!(out, "{:<8} {:>12} {:<32} INITIALIZED", "MONTH", "COUNT", "LAST UPDATED")?;
    for counter in counters {
        let count = match &counter.count {
            RecordCount::Value(count) => count.to_string(),
            RecordCount::Missing => "-".to_string(),
            RecordCount::Corrupt(raw) => format!("corrupt:{raw}"),
        };
        let last_updated = counter
            .last_updated
            .map_or_else(|| "-".to_string(), |at| at.to_rfc3339());
        writeln!(
            out,
            "{:<8} {:>12} {:<32} {}",
            counter.month_key, count, last_updated, counter.initialized
        )?;
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect
mod tests {
    use super::*;
    use order_sequence_testing::mocks::{InMemoryCounterStore, test_clock};
    use std::collections::HashMap;

    fn services() -> (OrderNumberGenerator, CounterAdmin) {
        let store: Arc<dyn CounterStore> = Arc::new(InMemoryCounterStore::new());
        let clock: Arc<dyn Clock> = Arc::new(test_clock());
        let config = SequenceConfig::default();
        (
            OrderNumberGenerator::from_config(Arc::clone(&store), Arc::clone(&clock), &config),
            CounterAdmin::new(store, MonthKeyResolver::new(config.time_zone, clock)),
        )
    }

    async fn output(command: Command, generator: &OrderNumberGenerator, admin: &CounterAdmin) -> String {
        let mut out = Vec::new();
        execute(&command, generator, admin, &mut out).await.unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn parses_subcommands() {
        let cli = Cli::try_parse_from(["order-sequence-admin", "init", "--month", "202507"]).unwrap();
        assert_eq!(cli.command, Command::Init { month: Some("202507".parse().unwrap()) });
        assert!(!cli.metrics);

        let cli = Cli::try_parse_from(["order-sequence-admin", "list", "--json", "--metrics"]).unwrap();
        assert_eq!(cli.command, Command::List { json: true });
        assert!(cli.metrics);

        let cli = Cli::try_parse_from(["order-sequence-admin", "next"]).unwrap();
        assert_eq!(cli.command, Command::Next { count: 1 });
    }

    #[test]
    fn rejects_malformed_month() {
        assert!(Cli::try_parse_from(["order-sequence-admin", "init", "--month", "2025-07"]).is_err());
        assert!(Cli::try_parse_from(["order-sequence-admin", "init", "--month", "202513"]).is_err());
    }

    #[test]
    fn database_url_is_required() {
        assert_eq!(
            AdminConfig::from_lookup(|_| None),
            Err(ConfigError::Missing(DATABASE_URL_VAR))
        );
    }

    #[test]
    fn loads_database_settings() {
        let vars: HashMap<&str, &str> = [
            (DATABASE_URL_VAR, "postgres://localhost/orders"),
            (DATABASE_MAX_CONNECTIONS_VAR, "12"),
        ]
        .into_iter()
        .collect();

        let config = AdminConfig::from_lookup(|name| vars.get(name).map(ToString::to_string)).unwrap();
        assert_eq!(config.database_url, "postgres://localhost/orders");
        assert_eq!(config.max_connections, 12);
        assert_eq!(config.sequence, SequenceConfig::default());
    }

    #[tokio::test]
    async fn init_then_next_then_list() {
        let (generator, admin) = services();

        let init = output(Command::Init { month: None }, &generator, &admin).await;
        assert!(init.contains("202508"));
        assert!(init.contains("true"));

        let next = output(Command::Next { count: 2 }, &generator, &admin).await;
        assert_eq!(next, "20250801\ttransactional\n20250802\ttransactional\n");

        let table = output(Command::List { json: false }, &generator, &admin).await;
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[1].starts_with("202508"));
        assert!(lines[1].contains(" 2 "));
    }

    #[tokio::test]
    async fn list_as_json() {
        let (generator, admin) = services();
        admin.initialize_counter(Some("202507".parse().unwrap())).await.unwrap();

        let json = output(Command::List { json: true }, &generator, &admin).await;
        let parsed: Vec<CounterRecord> = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].month_key.to_string(), "202507");
        assert_eq!(parsed[0].count, RecordCount::Value(0));
    }

    #[tokio::test]
    async fn empty_list_says_so() {
        let (generator, admin) = services();
        let table = output(Command::List { json: false }, &generator, &admin).await;
        assert_eq!(table, "No counters\n");
    }
}
