//! HRMS API Server
//!
//! # Usage
//!
//! ```bash
//! # Start with default settings (0.0.0.0:8080, in-memory storage)
//! hrms-server
//!
//! # Load a configuration file and override the port
//! hrms-server --config hrms.toml --port 9090
//!
//! # Enable debug logging
//! RUST_LOG=debug hrms-server
//! ```
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: log filter, takes precedence over `--log-level`
//! - `HRMS_CONFIG`: TOML configuration file
//! - `HRMS_HOST`, `HRMS_PORT`: listen address
//! - `HRMS_TRANSACTION_TIMEOUT_MS`: unit-of-work deadline
//! - `HRMS_ACCESS_CONTROL`: grants and hierarchy file
//! - `DATABASE_URL`: PostgreSQL connection string (selects the postgres backend)

use anyhow::{Context, Result};
use clap::Parser;
use hrms_api_server::{config::HrmsConfig, server::ServerBuilder, state::AppState};
use hrms_authz::{AuthorizationGate, PermissionResolver};
use hrms_org::{
    Employee, EmployeeId, InMemoryOrgStore, OrgConsistencyEngine, OrgStore, User, UserId,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// HRMS API Server
#[derive(Parser, Debug)]
#[command(
    name = "hrms-server",
    version,
    about = "REST API server for the HRMS organization engine",
    long_about = None
)]
struct Args {
    /// TOML configuration file
    #[arg(short = 'c', long, env = "HRMS_CONFIG")]
    config: Option<PathBuf>,

    /// Host to bind to
    #[arg(short = 'H', long, env = "HRMS_HOST")]
    host: Option<String>,

    /// Port to listen on
    #[arg(short = 'p', long, env = "HRMS_PORT")]
    port: Option<u16>,

    /// Maximum concurrent requests
    #[arg(long, env = "HRMS_MAX_CONNECTIONS")]
    max_connections: Option<usize>,

    /// Request timeout in seconds
    #[arg(long, env = "HRMS_REQUEST_TIMEOUT")]
    request_timeout: Option<u64>,

    /// Unit-of-work deadline in milliseconds
    #[arg(long, env = "HRMS_TRANSACTION_TIMEOUT_MS")]
    transaction_timeout_ms: Option<u64>,

    /// Grants and hierarchy file
    #[arg(long, env = "HRMS_ACCESS_CONTROL")]
    access_control: Option<PathBuf>,

    /// PostgreSQL connection string
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// Enable JSON logging format
    #[arg(long, env = "HRMS_JSON_LOGS")]
    json_logs: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, default_value = "info", env = "HRMS_LOG_LEVEL")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_tracing(&args)?;

    info!(version = env!("CARGO_PKG_VERSION"), "Starting HRMS API server");

    let config = resolve_config(&args)?;

    let access = config.access_control()?;
    if let Some(cycle) = access.hierarchy.detect_cycle() {
        let path: Vec<String> = cycle.iter().map(|r| r.to_string()).collect();
        warn!(cycle = %path.join(" -> "), "Role hierarchy contains a cycle");
    }
    let gate = AuthorizationGate::new(PermissionResolver::new(Arc::new(access)));

    let store = build_store(&config).await?;
    let engine = OrgConsistencyEngine::new(config.engine_config(), store);
    let state = Arc::new(AppState::new(engine, gate));

    let server = ServerBuilder::new()
        .config(config.server_config())
        .state(state)
        .build()?;

    if let Err(e) = server.run().await {
        error!("Server error: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}

/// File configuration with command-line and environment overrides applied
fn resolve_config(args: &Args) -> Result<HrmsConfig> {
    let mut config = match &args.config {
        Some(path) => HrmsConfig::load(path)?,
        None => HrmsConfig::default(),
    };

    if let Some(host) = &args.host {
        config.server.host = host.clone();
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(max) = args.max_connections {
        config.server.max_connections = max;
    }
    if let Some(timeout) = args.request_timeout {
        config.server.request_timeout_secs = timeout;
    }
    if let Some(timeout) = args.transaction_timeout_ms {
        config.engine.transaction_timeout_ms = timeout;
    }
    if let Some(path) = &args.access_control {
        config.access_control.path = Some(path.clone());
    }
    if let Some(url) = &args.database_url {
        config.storage.backend = "postgres".to_string();
        config.storage.database_url = Some(url.clone());
    }

    config.validate()?;
    Ok(config)
}

async fn build_store(config: &HrmsConfig) -> Result<Arc<dyn OrgStore>> {
    match config.storage.backend.as_str() {
        #[cfg(feature = "postgres")]
        "postgres" => {
            let url = config
                .storage
                .database_url
                .as_deref()
                .context("storage.database_url is required for the postgres backend")?;
            let store = hrms_org::PgOrgStore::new(url)
                .await
                .context("Failed to connect to PostgreSQL")?;
            store
                .run_migrations()
                .await
                .context("Failed to run database migrations")?;
            info!("Using PostgreSQL storage");
            Ok(Arc::new(store))
        }
        #[cfg(not(feature = "postgres"))]
        "postgres" => {
            anyhow::bail!("This build has no postgres backend; rebuild with --features postgres")
        }
        _ => {
            let store = InMemoryOrgStore::new();
            for person in &config.storage.seed {
                store
                    .insert_employee(Employee {
                        id: EmployeeId(person.employee_id),
                        user_id: UserId(person.user_id),
                    })
                    .await;
                store
                    .insert_user(User {
                        id: UserId(person.user_id),
                        role: person.role,
                        employee_id: EmployeeId(person.employee_id),
                        is_active: true,
                    })
                    .await;
            }
            info!(seeded = config.storage.seed.len(), "Using in-memory storage");
            Ok(Arc::new(store))
        }
    }
}

fn init_tracing(args: &Args) -> Result<()> {
    let log_level = args.log_level.parse::<tracing::Level>().unwrap_or_else(|_| {
        eprintln!("Invalid log level '{}', using 'info'", args.log_level);
        tracing::Level::INFO
    });
    let framework_level = if log_level >= tracing::Level::DEBUG { "debug" } else { "info" };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "hrms_api_server={level},hrms_org={level},hrms_authz={level},tower_http={fw},axum={fw}",
            level = log_level,
            fw = framework_level
        )
        .into()
    });

    if args.json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
            .context("Failed to initialize logging")?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_file(true)
                    .with_line_number(true),
            )
            .try_init()
            .context("Failed to initialize logging")?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use hrms_org::UnitOfWork;

    #[test]
    fn test_args_defaults() {
        let args = Args::parse_from(vec!["hrms-server"]);

        assert!(args.config.is_none());
        assert!(args.port.is_none());
        assert!(!args.json_logs);
        assert_eq!(args.log_level, "info");
    }

    #[test]
    fn test_args_override_config() {
        let args = Args::parse_from(vec![
            "hrms-server",
            "--host",
            "127.0.0.1",
            "--port",
            "9090",
            "--transaction-timeout-ms",
            "1500",
        ]);

        let config = resolve_config(&args).unwrap();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.engine.transaction_timeout_ms, 1500);
        assert_eq!(config.storage.backend, "memory");
    }

    #[test]
    fn test_database_url_selects_postgres() {
        let args = Args::parse_from(vec![
            "hrms-server",
            "--database-url",
            "postgres://localhost/hrms",
        ]);

        let config = resolve_config(&args).unwrap();
        assert_eq!(config.storage.backend, "postgres");
    }

    #[test]
    fn test_zero_transaction_timeout_rejected() {
        let args = Args::parse_from(vec!["hrms-server", "--transaction-timeout-ms", "0"]);
        assert!(resolve_config(&args).is_err());
    }

    #[tokio::test]
    async fn test_seeded_memory_store() {
        let mut config = HrmsConfig::default();
        config.storage.seed.push(hrms_api_server::config::SeedPerson {
            employee_id: uuid::Uuid::new_v4(),
            user_id: uuid::Uuid::new_v4(),
            role: hrms_authz::Role::Employee,
        });

        let store = build_store(&config).await.unwrap();
        let mut uow = store.begin().await.unwrap();
        let employee = uow
            .employee(EmployeeId(config.storage.seed[0].employee_id))
            .await
            .unwrap();

        assert!(employee.is_some());
    }
}
