use application::command::interaction::InteractionService;
use application::command::shared::Clock;
use application::event::handler::projector::registry::register_handlers;
use domain::interaction::InteractionRecordStore;
use infra::config::{AppConfigImpl, LogConfig};
use infra::event_bus::in_memory::InMemoryEventBus;
use infra::repository::in_memory::{
    InMemoryInteractionRecordStore, InMemoryItemStatsRepository, InMemoryViewHistoryRepository,
};
use infra::repository::postgres::command::InteractionRecordStoreImpl;
use infra::repository::postgres::query::{ItemStatsRepositoryImpl, ViewHistoryRepositoryImpl};
use infra::SystemClock;
use log::info;
use log4rs::{
    append::console::ConsoleAppender,
    append::file::FileAppender,
    config::{Appender, Config, Root},
    encode::pattern::PatternEncoder,
};
use migration::{Migrator, MigratorTrait};
use model::item_stats::AggregateStatsUpdater;
use model::view_history::RecentHistoryLog;
use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbBackend, DbErr, Statement,
};
use std::error::Error;
use std::sync::Arc;

const LOG_PATTERN: &str = "{d(%Y-%m-%d %H:%M:%S%.3f)} [{l}] {m}{n}";

/// Console and file logging. `RUST_LOG` overrides the configured level.
pub fn init_logging(cfg: &LogConfig) -> Result<(), Box<dyn Error>> {
    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| cfg.level.clone());

    let file_appender = FileAppender::builder()
        .encoder(Box::new(PatternEncoder::new(LOG_PATTERN)))
        .build(&cfg.file)?;

    let config = Config::builder()
        .appender(Appender::builder().build("file", Box::new(file_appender)))
        .appender(Appender::builder().build(
            "stdout",
            Box::new(
                ConsoleAppender::builder()
                    .encoder(Box::new(PatternEncoder::new(LOG_PATTERN)))
                    .build(),
            ),
        ))
        .build(
            Root::builder()
                .appender("file")
                .appender("stdout")
                .build(log_level.parse().unwrap_or(log::LevelFilter::Info)),
        )?;

    log4rs::init_config(config)?;
    Ok(())
}

/// Implementations of the ports the interaction service depends on.
pub struct Adapters {
    pub record_store: Arc<dyn InteractionRecordStore>,
    pub stats_updater: Arc<dyn AggregateStatsUpdater>,
    pub history_log: Arc<dyn RecentHistoryLog>,
    pub clock: Arc<dyn Clock>,
}

impl Adapters {
    pub fn postgres(db: DatabaseConnection) -> Self {
        Self {
            record_store: Arc::new(InteractionRecordStoreImpl::new(db.clone())),
            stats_updater: Arc::new(ItemStatsRepositoryImpl::new(db.clone())),
            history_log: Arc::new(ViewHistoryRepositoryImpl::new(db)),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn in_memory() -> Self {
        Self {
            record_store: Arc::new(InMemoryInteractionRecordStore::new()),
            stats_updater: Arc::new(InMemoryItemStatsRepository::new()),
            history_log: Arc::new(InMemoryViewHistoryRepository::new()),
            clock: Arc::new(SystemClock),
        }
    }
}

pub struct AppState {
    pub app_cfg: AppConfigImpl,
    pub event_bus: InMemoryEventBus,
    pub interaction_service: Arc<InteractionService<InMemoryEventBus>>,
    pub history_log: Arc<dyn RecentHistoryLog>,
}

impl AppState {
    pub async fn init_db(app_cfg: &AppConfigImpl) -> Result<DatabaseConnection, DbErr> {
        let pool = app_cfg.database();
        let mut opt = ConnectOptions::new(app_cfg.database_url());
        opt.max_connections(pool.max_connections)
            .min_connections(pool.min_connections)
            .connect_timeout(pool.connect_timeout)
            .acquire_timeout(pool.acquire_timeout)
            .idle_timeout(pool.idle_timeout)
            .max_lifetime(pool.max_lifetime)
            .sqlx_logging(false)
            .sqlx_logging_level(log::LevelFilter::Info);

        let db = Database::connect(opt).await?;

        let backend = DbBackend::Postgres;
        db.execute(Statement::from_string(backend, "SELECT 1".to_owned()))
            .await?;

        if app_cfg.run_migrations {
            Migrator::up(&db, None).await?;
            info!("Database migrations applied");
        }

        info!("Database connection pool initialized successfully");
        Ok(db)
    }

    pub async fn new(app_cfg: AppConfigImpl, adapters: Adapters) -> Self {
        let mut event_bus = InMemoryEventBus::with_policy(app_cfg.effects());
        register_handlers(
            &mut event_bus,
            adapters.stats_updater,
            adapters.history_log.clone(),
        )
        .await;

        let interaction_service = InteractionService::new(
            adapters.record_store,
            adapters.clock,
            Arc::new(event_bus.clone()),
            Arc::new(app_cfg.clone()),
        );

        Self {
            app_cfg,
            event_bus,
            interaction_service: Arc::new(interaction_service),
            history_log: adapters.history_log,
        }
    }

    /// Wait for effects still in flight, then report what was delivered.
    pub async fn shutdown(&self) {
        self.event_bus.wait_idle().await;
        let stats = self.event_bus.stats();
        info!(
            "Effect dispatcher idle: {} delivered, {} retried, {} failed",
            stats.delivered, stats.retried, stats.failed
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use application::command::interaction::{RecordPlayCmd, SetLikeStateCmd};
    use application::context::AppContext;
    use application::error::AppError;
    use async_trait::async_trait;
    use domain::interaction::{Counter, Desired, InteractionError, Polarity, SwapDirection};
    use domain::value::{ItemId, UserId};
    use infra::DispatchStats;
    use model::item_stats::ItemStats;
    use model::ModelError;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct Harness {
        state: AppState,
        stats: InMemoryItemStatsRepository,
        history: InMemoryViewHistoryRepository,
    }

    fn fast_config() -> AppConfigImpl {
        let cfg = AppConfigImpl::default();
        {
            let mut effects = cfg.effects.write().unwrap();
            effects.retry_backoff = std::time::Duration::from_millis(1);
        }
        cfg
    }

    async fn harness_with(stats_updater: Option<Arc<dyn AggregateStatsUpdater>>) -> Harness {
        let stats = InMemoryItemStatsRepository::new();
        let history = InMemoryViewHistoryRepository::new();
        let adapters = Adapters {
            stats_updater: stats_updater.unwrap_or_else(|| Arc::new(stats.clone())),
            history_log: Arc::new(history.clone()),
            ..Adapters::in_memory()
        };
        Harness {
            state: AppState::new(fast_config(), adapters).await,
            stats,
            history,
        }
    }

    async fn harness() -> Harness {
        harness_with(None).await
    }

    fn play(user_id: i64, item_id: i64) -> RecordPlayCmd {
        RecordPlayCmd {
            user_id: UserId::from(user_id),
            item_id: ItemId::from(item_id),
        }
    }

    fn like(user_id: i64, polarity: Polarity, desired: Desired) -> SetLikeStateCmd {
        SetLikeStateCmd {
            user_id: UserId::from(user_id),
            item_id: ItemId::from(42),
            polarity,
            desired,
        }
    }

    #[tokio::test]
    async fn test_first_play_updates_stats_and_history() {
        let h = harness().await;
        let service = &h.state.interaction_service;

        let record = service
            .record_play(&AppContext::new(), play(7, 42))
            .await
            .unwrap();
        h.state.shutdown().await;

        assert_eq!(record.play_count, 1);
        assert_eq!(
            h.stats.stats(ItemId::from(42)),
            ItemStats {
                play: 1,
                good: 0,
                bad: 0,
            }
        );
        assert_eq!(
            h.history.recent(UserId::from(7), 10).await.unwrap(),
            vec![ItemId::from(42)]
        );
        assert_eq!(
            h.state.history_log.recent(UserId::from(7), 10).await.unwrap(),
            vec![ItemId::from(42)]
        );
    }

    #[tokio::test]
    async fn test_immediate_replay_is_not_counted() {
        let h = harness().await;
        let service = &h.state.interaction_service;
        let ctx = AppContext::new();

        service.record_play(&ctx, play(7, 42)).await.unwrap();
        let record = service.record_play(&ctx, play(7, 42)).await.unwrap();
        h.state.shutdown().await;

        assert_eq!(record.play_count, 1);
        assert_eq!(h.stats.stats(ItemId::from(42)).play, 1);
        assert_eq!(h.state.event_bus.stats().delivered, 2);
    }

    #[tokio::test]
    async fn test_throttle_window_set_at_runtime_reaches_the_service() {
        let h = harness().await;
        let service = &h.state.interaction_service;
        let ctx = AppContext::new();
        service.record_play(&ctx, play(7, 42)).await.unwrap();

        h.state.app_cfg.set_play_throttle_secs(0);
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let record = service.record_play(&ctx, play(7, 42)).await.unwrap();
        h.state.shutdown().await;

        assert_eq!(record.play_count, 2);
        assert_eq!(h.stats.stats(ItemId::from(42)).play, 2);
    }

    #[tokio::test]
    async fn test_like_then_dislike_then_clear() {
        let h = harness().await;
        let service = &h.state.interaction_service;
        let ctx = AppContext::new();
        service.record_play(&ctx, play(7, 42)).await.unwrap();

        service
            .set_like_state(&ctx, like(7, Polarity::Like, Desired::Set))
            .await
            .unwrap();
        h.state.event_bus.wait_idle().await;
        assert_eq!(h.stats.stats(ItemId::from(42)).good, 1);

        let record = service
            .set_like_state(&ctx, like(7, Polarity::Dislike, Desired::Set))
            .await
            .unwrap();
        assert!(record.disliked());
        assert!(!record.liked());
        h.state.event_bus.wait_idle().await;
        assert_eq!(
            h.stats.stats(ItemId::from(42)),
            ItemStats {
                play: 1,
                good: 0,
                bad: 1,
            }
        );

        service
            .set_like_state(&ctx, like(7, Polarity::Dislike, Desired::Clear))
            .await
            .unwrap();
        h.state.shutdown().await;
        assert_eq!(
            h.stats.stats(ItemId::from(42)),
            ItemStats {
                play: 1,
                good: 0,
                bad: 0,
            }
        );
    }

    #[tokio::test]
    async fn test_like_before_any_play_is_rejected() {
        let h = harness().await;

        let result = h
            .state
            .interaction_service
            .set_like_state(&AppContext::new(), like(7, Polarity::Like, Desired::Set))
            .await;
        h.state.shutdown().await;

        assert!(matches!(
            result,
            Err(AppError::InteractionError(InteractionError::NotFound(_)))
        ));
        assert_eq!(h.state.event_bus.stats(), DispatchStats::default());
    }

    /// Fails the first `failures` stat updates, then delegates
    struct FlakyStats {
        failures: u32,
        calls: AtomicU32,
        inner: InMemoryItemStatsRepository,
    }

    impl FlakyStats {
        fn check(&self) -> Result<(), ModelError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) < self.failures {
                return Err(ModelError::DbErr("connection reset".to_string()));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl AggregateStatsUpdater for FlakyStats {
        async fn adjust_counter(
            &self,
            item_id: ItemId,
            counter: Counter,
            delta: i64,
        ) -> Result<(), ModelError> {
            self.check()?;
            self.inner.adjust_counter(item_id, counter, delta).await
        }

        async fn swap_good_bad(
            &self,
            item_id: ItemId,
            direction: SwapDirection,
        ) -> Result<(), ModelError> {
            self.check()?;
            self.inner.swap_good_bad(item_id, direction).await
        }
    }

    #[tokio::test]
    async fn test_failing_stats_store_is_retried_without_affecting_caller() {
        let inner = InMemoryItemStatsRepository::new();
        let flaky = Arc::new(FlakyStats {
            failures: 2,
            calls: AtomicU32::new(0),
            inner: inner.clone(),
        });
        let h = harness_with(Some(flaky.clone())).await;

        let record = h
            .state
            .interaction_service
            .record_play(&AppContext::new(), play(7, 42))
            .await
            .unwrap();
        h.state.shutdown().await;

        assert_eq!(record.play_count, 1);
        assert_eq!(inner.stats(ItemId::from(42)).play, 1);
        let stats = h.state.event_bus.stats();
        assert_eq!(stats.retried, 2);
        assert_eq!(stats.failed, 0);
    }

    #[tokio::test]
    async fn test_exhausted_effect_keeps_committed_state() {
        let inner = InMemoryItemStatsRepository::new();
        let broken = Arc::new(FlakyStats {
            failures: u32::MAX,
            calls: AtomicU32::new(0),
            inner: inner.clone(),
        });
        let h = harness_with(Some(broken)).await;
        let service = &h.state.interaction_service;

        service
            .record_play(&AppContext::new(), play(7, 42))
            .await
            .unwrap();
        h.state.shutdown().await;

        let found = service
            .find(UserId::from(7), ItemId::from(42))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.play_count, 1);
        assert_eq!(inner.stats(ItemId::from(42)), ItemStats::default());
        assert_eq!(h.state.event_bus.stats().failed, 1);
        assert_eq!(
            h.history.recent(UserId::from(7), 10).await.unwrap(),
            vec![ItemId::from(42)]
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_users_keep_item_counters_consistent() {
        let h = harness().await;
        let service = h.state.interaction_service.clone();

        let mut handles = vec![];
        for user_id in 0..16i64 {
            let service = service.clone();
            handles.push(tokio::spawn(async move {
                let ctx = AppContext::new();
                service.record_play(&ctx, play(user_id, 42)).await.unwrap();
                for i in 0..20i64 {
                    let polarity = if (user_id + i) % 3 == 0 {
                        Polarity::Dislike
                    } else {
                        Polarity::Like
                    };
                    let desired = if i % 4 == 3 { Desired::Clear } else { Desired::Set };
                    service
                        .set_like_state(&ctx, like(user_id, polarity, desired))
                        .await
                        .unwrap();
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        h.state.shutdown().await;

        let mut liked = 0;
        let mut disliked = 0;
        for user_id in 0..16i64 {
            let record = service
                .find(UserId::from(user_id), ItemId::from(42))
                .await
                .unwrap()
                .unwrap();
            assert!(!(record.liked() && record.disliked()));
            liked += record.liked() as i64;
            disliked += record.disliked() as i64;
        }
        assert_eq!(
            h.stats.stats(ItemId::from(42)),
            ItemStats {
                play: 16,
                good: liked,
                bad: disliked,
            }
        );
        assert_eq!(h.state.event_bus.stats().failed, 0);
    }
}
