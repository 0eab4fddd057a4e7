use std::sync::Arc;

use horizon_agent::{ConciergeRuntime, MessageParser, ToolRegistry};
use horizon_core::config::{AppConfig, ConfigError, LoadOptions};
use horizon_db::repositories::{SqlBookingRepository, SqlCallLogRepository, SqlRoomRepository};
use horizon_db::{connect, migrations, DbPool};
use horizon_telnyx::{GatewayError, NoopTelephony, TelnyxClient, Telephony};
use thiserror::Error;
use tracing::info;

use crate::routes::AppState;
use crate::templates;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub state: AppState,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("telnyx client could not be built: {0}")]
    Gateway(#[source] GatewayError),
    #[error("message patterns failed to compile: {0}")]
    Patterns(#[source] regex::Error),
    #[error("templates failed to compile: {0}")]
    Templates(#[source] tera::Error),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    config.validate()?;
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let db_pool = connect(&config.database).await.map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let telephony: Arc<dyn Telephony> = if config.telnyx.is_configured() {
        Arc::new(TelnyxClient::from_config(&config.telnyx).map_err(BootstrapError::Gateway)?)
    } else {
        Arc::new(NoopTelephony)
    };
    info!(
        event_name = "system.bootstrap.telephony",
        correlation_id = "bootstrap",
        transport_mode = if config.telnyx.is_configured() { "telnyx" } else { "noop" },
        "telephony transport initialized"
    );

    let state = build_state(&config, &db_pool, telephony)?;
    Ok(Application { config, db_pool, state })
}

fn build_state(
    config: &AppConfig,
    db_pool: &DbPool,
    telephony: Arc<dyn Telephony>,
) -> Result<AppState, BootstrapError> {
    let rooms = Arc::new(SqlRoomRepository::new(db_pool.clone()));
    let bookings = Arc::new(SqlBookingRepository::new(db_pool.clone()));
    let call_logs = Arc::new(SqlCallLogRepository::new(db_pool.clone()));
    let parser = MessageParser::new().map_err(BootstrapError::Patterns)?;

    Ok(AppState {
        concierge: Arc::new(ConciergeRuntime::new(
            parser,
            rooms.clone(),
            bookings.clone(),
            telephony.clone(),
        )),
        tools: Arc::new(ToolRegistry::hotel(rooms.clone(), bookings.clone(), telephony.clone())),
        templates: templates::load().map_err(BootstrapError::Templates)?,
        rooms,
        bookings,
        call_logs,
        telephony,
        transcript: config.transcript.clone(),
        public_base_url: config.server.public_base_url.clone(),
    })
}
