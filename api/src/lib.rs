pub mod dialog;
pub mod routes;
pub mod scheduler;
pub mod store;
pub mod telemetry;
pub mod time;
pub mod validate;

use std::path::PathBuf;
use std::time::{Duration, Instant};

use actix_web::dev::Server;
use actix_web::{App, HttpServer, web};
use anyhow::Context;
use secrecy::SecretBox;
use std::net::TcpListener;

use crate::routes::AppState;
use crate::scheduler::SchedulerConfig;
use crate::store::{StoreConfig, UserId};
use crate::time::TimeSource;

/// Build the health-probe server, but not await it.
///
/// Returns the port that the server has bound to by modifying the config.
pub fn build(
    config: &mut Config,
    time_source: TimeSource,
) -> std::io::Result<Server> {
    // OS assigns the port if binding to 0
    let listener = TcpListener::bind(format!("{}:{}", config.ip, config.port))?;
    config.port = listener.local_addr()?.port();
    let started = Instant::now();
    let server = HttpServer::new(move || {
        App::new()
            .service(routes::api_services())
            .default_service(web::route().to(routes::not_found))
            .app_data(web::Data::new(AppState {
                started,
                time_source: time_source.clone(),
            }))
    })
    .listen(listener)?
    .run();
    Ok(server)
}

/// Configuration loaded from environment variables at startup.
pub struct Config {
    /// Chat transport credential; startup fails without it.
    pub bot_token: SecretBox<String>,
    /// The sole allowlisted principal; startup fails without it.
    pub authorized_user: UserId,
    pub database_path: PathBuf,
    pub database_timeout: Duration,
    /// Conversation-state capacity bound.
    pub max_user_states: usize,
    /// Connection-pool cap.
    pub max_db_connections: u32,
    pub backup_enabled: bool,
    pub backup_retention_days: u32,
    /// set to "0.0.0.0" for public access, "127.0.0.1" for local dev
    pub ip: String,
    /// set to 0 to get an os-assigned port
    pub port: u16,
    pub log_level: String,
    pub log_file: Option<PathBuf>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        use std::env::var;

        let bot_token = var("BOT_TOKEN").context("BOT_TOKEN must be set")?;
        let authorized_user = var("AUTHORIZED_USER_ID")
            .context("AUTHORIZED_USER_ID must be set")?
            .parse::<i64>()
            .context("AUTHORIZED_USER_ID must be an integer")?;

        Ok(Config {
            bot_token: SecretBox::new(Box::new(bot_token)),
            authorized_user: UserId(authorized_user),
            database_path: var("DATABASE_PATH")
                .unwrap_or_else(|_| "finanzas.db".to_string())
                .into(),
            database_timeout: Duration::from_secs(
                var("DATABASE_TIMEOUT")
                    .unwrap_or_else(|_| "30".to_string())
                    .parse()
                    .context("DATABASE_TIMEOUT must be seconds")?,
            ),
            max_user_states: var("MAX_USER_STATES")
                .unwrap_or_else(|_| "100".to_string())
                .parse()
                .context("MAX_USER_STATES must be an integer")?,
            max_db_connections: var("MAX_DB_CONNECTIONS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .context("MAX_DB_CONNECTIONS must be an integer")?,
            backup_enabled: var("BACKUP_ENABLED")
                .unwrap_or_else(|_| "true".to_string())
                .to_lowercase()
                == "true",
            backup_retention_days: var("BACKUP_RETENTION_DAYS")
                .unwrap_or_else(|_| "7".to_string())
                .parse()
                .context("BACKUP_RETENTION_DAYS must be an integer")?,
            ip: var("IP_ADDRESS").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: var("PORT")
                .unwrap_or_else(|_| "5000".to_string())
                .parse()
                .context("PORT must be a port number")?,
            log_level: var("LOG_LEVEL")
                .unwrap_or_else(|_| "info".to_string()),
            log_file: var("LOG_FILE").ok().map(Into::into),
        })
    }

    pub fn store_config(&self) -> StoreConfig {
        StoreConfig {
            database_path: self.database_path.clone(),
            timeout: self.database_timeout,
            max_connections: self.max_db_connections,
        }
    }

    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            principal: self.authorized_user,
            backup_enabled: self.backup_enabled,
            retention_days: self.backup_retention_days,
        }
    }
}
