use super::shared::Clock;
use crate::config::InteractionConfig;
use crate::context::AppContext;
use crate::error::AppError;
use crate::event::event_bus::{EventBus, EventEnvelope};
use dashmap::DashMap;
use domain::event::DomainEvent;
use domain::interaction::{
    Desired, InteractionEffect, InteractionError, InteractionRecord, InteractionRecordStore,
    Polarity,
};
use domain::value::{InteractionKey, ItemId, UserId};
use log::{debug, error, warn};
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy)]
pub struct RecordPlayCmd {
    pub user_id: UserId,
    pub item_id: ItemId,
}

#[derive(Debug, Clone, Copy)]
pub struct SetLikeStateCmd {
    pub user_id: UserId,
    pub item_id: ItemId,
    pub polarity: Polarity,
    pub desired: Desired,
}

type LockMap = DashMap<InteractionKey, Arc<Mutex<()>>>;

/// Play and like/dislike transitions of interaction records.
///
/// The read-decide-write sequence of a record runs under a lock owned by its
/// (user, item) key, so calls on the same key are serialized while calls on
/// different keys never wait for each other. Effects of a committed
/// transition are published to the bus after the lock is released.
///
/// Each call runs as its own task. A caller that stops waiting does not stop
/// the call, so a committed write always has its effects handed to the bus.
pub struct InteractionService<B: EventBus> {
    record_store: Arc<dyn InteractionRecordStore>,
    clock: Arc<dyn Clock>,
    event_bus: Arc<B>,
    config: Arc<dyn InteractionConfig>,
    /// One lock per (user, item) key, removed once nobody holds or waits for it
    locks: Arc<LockMap>,
}

impl<B: EventBus> Clone for InteractionService<B> {
    fn clone(&self) -> Self {
        Self {
            record_store: self.record_store.clone(),
            clock: self.clock.clone(),
            event_bus: self.event_bus.clone(),
            config: self.config.clone(),
            locks: self.locks.clone(),
        }
    }
}

/// A caller's registration on the lock of one key. Dropping it removes the
/// map entry when no other caller holds or waits for that lock.
struct KeyLock {
    key: InteractionKey,
    lock: Arc<Mutex<()>>,
    locks: Arc<LockMap>,
}

impl KeyLock {
    fn register(locks: &Arc<LockMap>, key: InteractionKey) -> Self {
        let lock = locks
            .entry(key)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        Self {
            key,
            lock,
            locks: locks.clone(),
        }
    }

    async fn lock(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().await
    }
}

impl Drop for KeyLock {
    fn drop(&mut self) {
        // clones are only taken under the shard lock; the map's copy plus ours means no other caller
        self.locks.remove_if(&self.key, |_, lock| {
            Arc::ptr_eq(lock, &self.lock) && Arc::strong_count(lock) == 2
        });
    }
}

impl<B: EventBus + 'static> InteractionService<B> {
    pub fn new(
        record_store: Arc<dyn InteractionRecordStore>,
        clock: Arc<dyn Clock>,
        event_bus: Arc<B>,
        config: Arc<dyn InteractionConfig>,
    ) -> Self {
        Self {
            record_store,
            clock,
            event_bus,
            config,
            locks: Arc::new(DashMap::new()),
        }
    }

    async fn join<T>(task: JoinHandle<Result<T, AppError>>) -> Result<T, AppError> {
        task.await
            .map_err(|e| AppError::UnknownError(format!("interaction task failed: {}", e)))?
    }

    /// Count a play of the item. The first play creates the record; repeat
    /// plays inside the throttle window change nothing.
    pub async fn record_play(
        &self,
        ctx: &AppContext,
        cmd: RecordPlayCmd,
    ) -> Result<InteractionRecord, AppError> {
        let this = self.clone();
        let ctx = ctx.clone();
        let key = InteractionKey::new(cmd.user_id, cmd.item_id);
        Self::join(tokio::spawn(async move {
            let (record, effects) = {
                let entry = KeyLock::register(&this.locks, key);
                let _guard = entry.lock().await;
                this.record_play_locked(&key).await?
            };
            this.dispatch(&ctx, effects).await;
            Ok::<_, AppError>(record)
        }))
        .await
    }

    async fn record_play_locked(
        &self,
        key: &InteractionKey,
    ) -> Result<(InteractionRecord, Vec<InteractionEffect>), AppError> {
        let now = self.clock.now();
        let mut record = match self.record_store.find(key).await? {
            Some(record) => record,
            None => {
                let mut record = InteractionRecord::first_play(key.user_id, key.item_id, now);
                match self.record_store.insert(&record).await {
                    Ok(()) => {
                        let effects = record.pop_effects();
                        return Ok((record, effects));
                    }
                    Err(InteractionError::DuplicateKey(_)) => {
                        // created by another writer between our read and insert
                        warn!("Record for {} appeared during first play, recounting", key);
                        self.record_store
                            .find(key)
                            .await?
                            .ok_or(InteractionError::NotFound(*key))?
                    }
                    Err(e) => return Err(e.into()),
                }
            }
        };

        let changes = record.play(now, self.config.play_throttle_window());
        if changes.is_empty() {
            debug!("Play of {} inside throttle window, not counted", key);
            return Ok((record, Vec::new()));
        }
        self.record_store.update_fields(key, &changes).await?;
        let effects = record.pop_effects();
        Ok((record, effects))
    }

    /// Set or clear like/dislike. Requests that do not change the state
    /// write nothing and produce no effects.
    pub async fn set_like_state(
        &self,
        ctx: &AppContext,
        cmd: SetLikeStateCmd,
    ) -> Result<InteractionRecord, AppError> {
        let this = self.clone();
        let ctx = ctx.clone();
        let key = InteractionKey::new(cmd.user_id, cmd.item_id);
        Self::join(tokio::spawn(async move {
            let (record, effects) = {
                let entry = KeyLock::register(&this.locks, key);
                let _guard = entry.lock().await;
                this.set_like_state_locked(&key, cmd.polarity, cmd.desired)
                    .await?
            };
            this.dispatch(&ctx, effects).await;
            Ok::<_, AppError>(record)
        }))
        .await
    }

    async fn set_like_state_locked(
        &self,
        key: &InteractionKey,
        polarity: Polarity,
        desired: Desired,
    ) -> Result<(InteractionRecord, Vec<InteractionEffect>), AppError> {
        let mut record = self
            .record_store
            .find(key)
            .await?
            .ok_or(InteractionError::NotFound(*key))?;

        let changes = record.set_like_state(polarity, desired);
        if changes.is_empty() {
            debug!("{:?} {:?} on {} is a no-op", desired, polarity, key);
            return Ok((record, Vec::new()));
        }
        self.record_store.update_fields(key, &changes).await?;
        let effects = record.pop_effects();
        Ok((record, effects))
    }

    pub async fn find(
        &self,
        user_id: UserId,
        item_id: ItemId,
    ) -> Result<Option<InteractionRecord>, AppError> {
        let key = InteractionKey::new(user_id, item_id);
        Ok(self.record_store.find(&key).await?)
    }

    /// Hand effects to the bus in issuance order. Failures are logged, never returned.
    async fn dispatch(&self, ctx: &AppContext, effects: Vec<InteractionEffect>) {
        if effects.is_empty() {
            return;
        }
        let ctx = ctx.inherit();
        for effect in effects {
            let kind = effect.kind();
            let aggregate_id = effect.aggregate_id();
            let envelope = EventEnvelope::from_domain_event(
                effect,
                ctx.correlation_id.clone(),
                ctx.event_id.clone(),
            );
            if let Err(e) = self.event_bus.publish(envelope).await {
                error!(
                    "Failed to dispatch {} effect for item {} (correlation {}): {}",
                    kind, aggregate_id, ctx.correlation_id, e
                );
            }
        }
    }
}
