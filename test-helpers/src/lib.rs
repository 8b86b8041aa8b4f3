use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use api::dialog::state::StateStore;
use api::dialog::{Dispatcher, Inbound, Reply};
use api::scheduler::{Scheduler, SchedulerConfig};
use api::store::{Money, StoreConfig, UserId};
use api::time::TimeSource;
use api::{Config, telemetry};
use rust_decimal::Decimal;
use secrecy::SecretBox;
use sqlx::SqlitePool;
use sqlx::migrate::Migrator;
use tracing_log::LogTracer;
use tracing_subscriber::util::SubscriberInitExt;

static MIGRATOR: Migrator = sqlx::migrate!("../api/migrations");
static DB_COUNTER: AtomicU32 = AtomicU32::new(0);

/// The allowlisted principal every test app is configured with.
pub const TEST_USER: UserId = UserId(42);
/// Any other id, for authorization tests.
pub const STRANGER: UserId = UserId(999);

/// The mocked clock all tests start at: 2024-03-15, midday UTC.
pub const TEST_START_TIME: &str = "2024-03-15T12:00:00Z";

pub struct TestApp {
    #[allow(unused)]
    pub port: u16,
    pub address: String,
    pub pool: SqlitePool,
    pub time_source: TimeSource,
    pub states: Arc<StateStore>,
    pub dispatcher: Dispatcher,
    pub client: reqwest::Client,
}

impl TestApp {
    /// Dispatch an inbound event as the allowlisted principal.
    pub async fn dispatch(&self, inbound: Inbound) -> Option<Reply> {
        self.dispatcher.dispatch(TEST_USER, inbound).await
    }

    pub async fn send_command(
        &self,
        name: &str,
        args: &str,
    ) -> Option<Reply> {
        self.dispatch(Inbound::Command {
            name: name.to_string(),
            args: args.to_string(),
        })
        .await
    }

    pub async fn send_text(&self, text: &str) -> Option<Reply> {
        self.dispatch(Inbound::Text(text.to_string())).await
    }

    pub async fn send_callback(&self, data: &str) -> Option<Reply> {
        self.dispatch(Inbound::Callback(data.to_string())).await
    }

    /// Run first-time setup for the test principal with the given initial
    /// balance, through the dialog machine itself.
    pub async fn configure_principal(&self, initial_balance: &str) {
        self.send_command("start", "").await.expect("setup prompt");
        let reply = self
            .send_text(initial_balance)
            .await
            .expect("setup confirmation");
        assert!(
            reply.text.contains("Configuración Completada"),
            "setup did not complete: {}",
            reply.text
        );
    }

    /// A scheduler wired to this app's pool, clock and state store.
    pub fn scheduler(&self) -> Scheduler {
        Scheduler::new(
            self.pool.clone(),
            self.time_source.clone(),
            self.states.clone(),
            SchedulerConfig {
                principal: TEST_USER,
                backup_enabled: true,
                retention_days: 7,
            },
        )
    }
}

/// Parse a decimal literal into fixed-point money.
pub fn money(value: &str) -> Money {
    let decimal: Decimal = value.parse().expect("decimal literal");
    Money::from_decimal(decimal).expect("in range")
}

/// Start an app instance against a fresh database file with the mocked
/// clock, and spawn its health server on an OS-assigned port.
pub async fn spawn_app() -> TestApp {
    let subscriber = telemetry::get_subscriber("error".into(), None);
    let _ = LogTracer::init();
    let _ = subscriber.try_init();

    #[cfg(feature = "mock-time")]
    let time_source = TimeSource::new(TEST_START_TIME.parse().unwrap());
    #[cfg(not(feature = "mock-time"))]
    let time_source = TimeSource::new();

    let database_path = std::env::temp_dir().join(format!(
        "finance-ledger-test-{}-{}.db",
        std::process::id(),
        DB_COUNTER.fetch_add(1, Ordering::Relaxed),
    ));
    let store_config = StoreConfig {
        database_path: database_path.clone(),
        timeout: Duration::from_secs(30),
        max_connections: 5,
    };
    let pool = api::store::connect(&store_config).await.unwrap();
    MIGRATOR.run(&pool).await.unwrap();

    let states = Arc::new(StateStore::new(100));
    let dispatcher = Dispatcher::new(
        pool.clone(),
        time_source.clone(),
        states.clone(),
        TEST_USER,
    );

    let mut config = Config {
        bot_token: SecretBox::new(Box::new("test-token".to_string())),
        authorized_user: TEST_USER,
        database_path,
        database_timeout: Duration::from_secs(30),
        max_user_states: 100,
        max_db_connections: 5,
        backup_enabled: true,
        backup_retention_days: 7,
        ip: "127.0.0.1".into(),
        port: 0,
        log_level: "error".into(),
        log_file: None,
    };
    let server = api::build(&mut config, time_source.clone()).unwrap();
    tokio::spawn(server);

    TestApp {
        port: config.port,
        address: format!("http://127.0.0.1:{}", config.port),
        pool,
        time_source,
        states,
        dispatcher,
        client: reqwest::Client::new(),
    }
}
