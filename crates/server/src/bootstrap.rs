use std::sync::Arc;

use secrecy::ExposeSecret;
use thiserror::Error;
use tracing::info;

use procflow_core::config::{AppConfig, ConfigError, LoadOptions};
use procflow_db::repositories::{
    AuditRepository, RequestRepository, SqlAuditRepository, SqlRequestRepository,
    SqlSettingsRepository, SqlUserRepository,
};
use procflow_db::{connect_with_settings, migrations, DbPool};
use procflow_notify::{NoopNotifier, NotificationError, Notifier, RetryPolicy, WebhookNotifier};
use procflow_workflow::TransitionService;

use crate::api::ApiState;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub api_state: ApiState,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("notifier construction failed: {0}")]
    Notifier(#[source] NotificationError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
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

    let notifier = build_notifier(&config)?;
    let requests: Arc<dyn RequestRepository> =
        Arc::new(SqlRequestRepository::new(db_pool.clone()));
    let audit: Arc<dyn AuditRepository> = Arc::new(SqlAuditRepository::new(db_pool.clone()));
    let service = TransitionService::new(
        requests.clone(),
        Arc::new(SqlUserRepository::new(db_pool.clone())),
        Arc::new(SqlSettingsRepository::new(db_pool.clone())),
        audit.clone(),
        notifier,
    );

    let api_state = ApiState::new(Arc::new(service), requests, audit);

    Ok(Application { config, db_pool, api_state })
}

fn build_notifier(config: &AppConfig) -> Result<Arc<dyn Notifier>, BootstrapError> {
    if !config.notifications.enabled {
        info!(
            event_name = "system.bootstrap.notifications_disabled",
            correlation_id = "bootstrap",
            "notifications disabled; using noop notifier"
        );
        return Ok(Arc::new(NoopNotifier));
    }

    // Config validation guarantees the URL is present when enabled.
    let webhook_url = config
        .notifications
        .webhook_url
        .as_ref()
        .map(|url| url.expose_secret().to_string())
        .unwrap_or_default();

    let notifier = WebhookNotifier::new(
        webhook_url.into(),
        config.notifications.timeout_secs,
        RetryPolicy {
            max_retries: config.notifications.max_retries,
            ..RetryPolicy::default()
        },
    )
    .map_err(BootstrapError::Notifier)?;

    Ok(Arc::new(notifier))
}
