use std::sync::Arc;
use std::time::Duration;

use api::{
    Config,
    dialog::state::StateStore,
    scheduler::{Scheduler, SchedulerConfig},
    telemetry::{get_subscriber, init_subscriber},
    time::TimeSource,
};

/// Finance ledger service
///
/// Environment variables can be set directly or loaded from a .env file in
/// the project root.
///
/// Required environment variables:
/// - BOT_TOKEN: chat transport credential
/// - AUTHORIZED_USER_ID: the sole allowlisted principal
///
/// Optional (with defaults):
/// - DATABASE_PATH (finanzas.db), DATABASE_TIMEOUT (30)
/// - MAX_USER_STATES (100), MAX_DB_CONNECTIONS (5)
/// - BACKUP_ENABLED (true), BACKUP_RETENTION_DAYS (7)
/// - IP_ADDRESS (0.0.0.0), PORT (5000)
/// - LOG_LEVEL (info), LOG_FILE (unset)
///
/// Example development command:
/// BOT_TOKEN=... AUTHORIZED_USER_ID=42 IP_ADDRESS=127.0.0.1 cargo run
#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from a .env file if available; silently
    // ignored when the file doesn't exist.
    let _ = dotenvy::dotenv();

    let mut config = Config::from_env()?;

    let subscriber = get_subscriber(
        config.log_level.clone(),
        config.log_file.as_deref(),
    );
    init_subscriber(subscriber);

    let pool = api::store::connect(&config.store_config()).await?;

    // Run database migrations embedded in the binary; schema creation is
    // idempotent.
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run database migrations");

    #[cfg(not(feature = "mock-time"))]
    let time_source = TimeSource::new();
    #[cfg(feature = "mock-time")]
    let time_source = TimeSource::new(jiff::Timestamp::now());

    // Conversation state is shared between the dialog dispatcher (owned
    // by the chat transport, which is wired up out of process) and the
    // scheduler's GC task.
    let states = Arc::new(StateStore::new(config.max_user_states));

    let scheduler_config: SchedulerConfig = config.scheduler_config();
    let scheduler_handle = Scheduler::new(
        pool.clone(),
        time_source.clone(),
        states,
        scheduler_config,
    )
    .start();

    let server = api::build(&mut config, time_source)?;
    tracing::info!(port = config.port, "health surface listening");
    let result = server.await;

    // Orderly shutdown: scheduler first, storage pool last.
    scheduler_handle.stop(Duration::from_secs(10)).await;
    api::store::close_all(&pool).await;

    result.map_err(Into::into)
}
