/// Main entry point for the collector daemon
use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use foliod::{
    auth::{FileTokenStore, FyersAuthBroker, TokenLifecycleManager},
    broker::KiteBrokerApi,
    collector::CollectorLoop,
    config::load_config,
    error::{CollectorError, Result},
    scheduler::{
        AccessRenewalTask, Cadence, CollectTask, RefreshCheckTask, RetentionTask, Scheduler,
    },
    store::{ClickHouseStore, RetentionJob, TimeSeriesStore},
    time::SessionWindow,
    types::Config,
};

enum RunMode {
    /// Continuous scheduling
    Daemon,
    /// Single reconcile pass, then exit
    CheckTokens,
    /// Single access-token renewal pass, then exit
    GenerateAccessToken,
}

fn parse_mode() -> RunMode {
    let args: Vec<String> = std::env::args().collect();
    if args.iter().any(|a| a == "--check-tokens") {
        RunMode::CheckTokens
    } else if args.iter().any(|a| a == "--generate-access-token") {
        RunMode::GenerateAccessToken
    } else {
        RunMode::Daemon
    }
}

/// Application wiring: every capability is constructed once here and passed
/// down explicitly; no ambient singletons.
///
/// Only the token pipeline is built up front. The time-series store belongs
/// to the daemon path alone, so the token-only modes keep working through a
/// store outage - exactly when unattended token maintenance matters most.
struct CollectorApp {
    config: Arc<Config>,
    window: SessionWindow,
    token_store: Arc<FileTokenStore>,
    lifecycle: Arc<TokenLifecycleManager>,
}

impl CollectorApp {
    fn new(config: Arc<Config>) -> Result<Self> {
        let token_store = Arc::new(FileTokenStore::new(&config.token_dir));
        let auth_broker = Arc::new(FyersAuthBroker::new(&config)?);
        let lifecycle = Arc::new(TokenLifecycleManager::new(
            Arc::clone(&token_store) as _,
            Arc::clone(&auth_broker) as _,
            config.refresh_renew_after_days,
        ));
        let window = SessionWindow::from_config(&config)?;

        Ok(CollectorApp {
            config,
            window,
            token_store,
            lifecycle,
        })
    }

    async fn run_daemon(&self) -> Result<()> {
        let store: Arc<dyn TimeSeriesStore> = Arc::new(ClickHouseStore::new(&self.config));

        // The one fatal startup step: refuse to run degraded without the store
        store
            .ensure_schema()
            .await
            .map_err(|e| CollectorError::StoreUnavailable(e.to_string()))?;
        info!("Time-series store ready");

        let broker_api = Arc::new(KiteBrokerApi::new(
            &self.config,
            Arc::clone(&self.token_store) as _,
        )?);
        let collector = Arc::new(CollectorLoop::new(
            self.window,
            Arc::clone(&broker_api) as _,
            Arc::clone(&store),
        ));
        let retention = Arc::new(RetentionJob::new(Arc::clone(&store)));

        let mut scheduler = Scheduler::new(self.window.timezone());

        // Registration order is execution order: token maintenance first so
        // the collector never races a token write
        scheduler.add(
            Cadence::DailyAt(foliod::config::loader::parse_time_of_day(
                &self.config.refresh_check_time,
            )?),
            true,
            Box::new(RefreshCheckTask::new(Arc::clone(&self.lifecycle))),
        );
        scheduler.add(
            Cadence::DailyAt(foliod::config::loader::parse_time_of_day(
                &self.config.access_renewal_time,
            )?),
            false,
            Box::new(AccessRenewalTask::new(Arc::clone(&self.lifecycle))),
        );
        scheduler.add(
            Cadence::Every(chrono::Duration::seconds(
                self.config.collect_interval_sec as i64,
            )),
            true,
            Box::new(CollectTask::new(Arc::clone(&collector))),
        );
        scheduler.add(
            Cadence::DailyAt(foliod::config::loader::parse_time_of_day(
                &self.config.retention_time,
            )?),
            false,
            Box::new(RetentionTask::new(Arc::clone(&retention))),
        );

        scheduler.run().await
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config_path =
        std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());

    let config = match load_config(&config_path) {
        Ok(config) => Arc::new(config),
        Err(e) => {
            eprintln!("Startup failed: {}", e);
            return Err(e);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(format!("foliod={},info", config.log_level)))
        .init();

    info!("Starting collector daemon...");
    info!("Configuration loaded from {}", config_path);

    let app = CollectorApp::new(config)?;

    match parse_mode() {
        RunMode::CheckTokens => {
            info!("Running in token check mode");
            if let Err(e) = app.lifecycle.reconcile(Utc::now()).await {
                error!("Token check failed: {} ({})", e, e.error_code());
                return Err(e);
            }
            Ok(())
        }
        RunMode::GenerateAccessToken => {
            info!("Running in access token generation mode");
            if let Err(e) = app.lifecycle.reconcile(Utc::now()).await {
                error!("Access token renewal failed: {} ({})", e, e.error_code());
                return Err(e);
            }
            Ok(())
        }
        RunMode::Daemon => {
            info!("Collector daemon entering scheduled mode at {}", Utc::now());
            app.run_daemon().await
        }
    }
}
