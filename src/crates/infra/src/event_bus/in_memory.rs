use super::{DispatchPolicy, DispatchStats};
use application::error::AppError;
use application::event::event_bus::EventEnvelope;
use application::event::event_bus::{ErasedHandler, EventBus, Handler};
use async_trait::async_trait;
use futures::future::join_all;
use log::{debug, error, warn};
use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{Notify, RwLock, Semaphore};

/// Bridge erasing `Handler<E>` into `ErasedHandler`
pub struct HandlerWrapper<E> {
    inner: Arc<dyn Handler<E>>,
}

#[async_trait]
impl<E> ErasedHandler for HandlerWrapper<E>
where
    E: Send + Sync + 'static,
{
    async fn handle_erased(&self, event: &(dyn Any + Send + Sync)) -> Result<(), AppError> {
        match event.downcast_ref::<EventEnvelope<E>>() {
            Some(e) => self.inner.handle(e).await,
            None => Ok(()),
        }
    }

    fn accepts_erased(&self, event: &(dyn Any + Send + Sync)) -> bool {
        event
            .downcast_ref::<EventEnvelope<E>>()
            .is_some_and(|e| self.inner.accepts(e))
    }

    fn name(&self) -> &'static str {
        self.inner.name()
    }
}

#[derive(Default)]
struct Counters {
    delivered: AtomicU64,
    retried: AtomicU64,
    failed: AtomicU64,
}

/// Tracks deliveries that have been accepted but not finished.
#[derive(Default)]
struct InFlight {
    count: AtomicUsize,
    idle: Notify,
}

impl InFlight {
    fn enter(&self, n: usize) {
        self.count.fetch_add(n, Ordering::SeqCst);
    }

    fn leave(&self) {
        if self.count.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.idle.notify_waiters();
        }
    }
}

/// Label used in delivery logs
struct Delivery {
    event_type: &'static str,
    aggregate_id: i64,
    correlation_id: String,
}

/// In-memory event bus, the asynchronous dispatcher of effects.
///
/// Every (envelope, handler) pair is one delivery. Deliveries are retried
/// with exponential backoff and limited by a semaphore; a failing handler
/// never affects the other handlers of the same envelope.
#[derive(Clone)]
pub struct InMemoryEventBus {
    handlers: Arc<RwLock<HashMap<TypeId, Vec<Arc<dyn ErasedHandler>>>>>,
    policy: DispatchPolicy,
    permits: Arc<Semaphore>,
    counters: Arc<Counters>,
    in_flight: Arc<InFlight>,
}

impl InMemoryEventBus {
    /// Synchronous bus, `publish` returns after every handler finished.
    pub fn new() -> Self {
        Self::with_policy(DispatchPolicy {
            fire_and_forget: false,
            ..DispatchPolicy::default()
        })
    }

    /// Asynchronous bus, `publish` returns once deliveries are spawned.
    pub fn new_async() -> Self {
        Self::with_policy(DispatchPolicy::default())
    }

    pub fn with_policy(policy: DispatchPolicy) -> Self {
        let permits = Arc::new(Semaphore::new(policy.max_in_flight.max(1)));
        Self {
            handlers: Arc::new(RwLock::new(HashMap::new())),
            policy,
            permits,
            counters: Arc::new(Counters::default()),
            in_flight: Arc::new(InFlight::default()),
        }
    }

    pub fn policy(&self) -> &DispatchPolicy {
        &self.policy
    }

    pub fn stats(&self) -> DispatchStats {
        DispatchStats {
            delivered: self.counters.delivered.load(Ordering::SeqCst),
            retried: self.counters.retried.load(Ordering::SeqCst),
            failed: self.counters.failed.load(Ordering::SeqCst),
        }
    }

    /// Resolves once no delivery is in flight.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.in_flight.idle.notified();
            if self.in_flight.count.load(Ordering::SeqCst) == 0 {
                return;
            }
            notified.await;
        }
    }

    async fn deliver(
        handler: Arc<dyn ErasedHandler>,
        event: Arc<dyn Any + Send + Sync>,
        delivery: Arc<Delivery>,
        policy: DispatchPolicy,
        permits: Arc<Semaphore>,
        counters: Arc<Counters>,
        in_flight: Arc<InFlight>,
    ) {
        // the semaphore is never closed
        let _permit = permits.acquire_owned().await.ok();
        let max_attempts = policy.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match handler.handle_erased(event.as_ref()).await {
                Ok(()) => {
                    counters.delivered.fetch_add(1, Ordering::SeqCst);
                    break;
                }
                Err(e) if attempt < max_attempts => {
                    let backoff = policy.backoff_for(attempt);
                    warn!(
                        "Handler {} failed on {} for aggregate {} (correlation {}), attempt {}/{}, retrying in {:?}: {}",
                        handler.name(),
                        delivery.event_type,
                        delivery.aggregate_id,
                        delivery.correlation_id,
                        attempt,
                        max_attempts,
                        backoff,
                        e
                    );
                    counters.retried.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                Err(e) => {
                    let failure = AppError::EffectFailed(format!(
                        "handler {} gave up on {} for aggregate {} (correlation {}) after {} attempts: {}",
                        handler.name(),
                        delivery.event_type,
                        delivery.aggregate_id,
                        delivery.correlation_id,
                        attempt,
                        e
                    ));
                    error!("{}", failure);
                    counters.failed.fetch_add(1, Ordering::SeqCst);
                    break;
                }
            }
        }
        in_flight.leave();
    }
}

impl Default for InMemoryEventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventBus for InMemoryEventBus {
    async fn publish<E>(&self, event: EventEnvelope<E>) -> Result<(), AppError>
    where
        E: Send + Sync + 'static,
    {
        let type_id = TypeId::of::<E>();

        let handlers: Option<Vec<Arc<dyn ErasedHandler>>> = {
            let guard = self.handlers.read().await;
            guard.get(&type_id).cloned()
        };

        let list: Vec<Arc<dyn ErasedHandler>> = handlers
            .unwrap_or_default()
            .into_iter()
            .filter(|handler| handler.accepts_erased(&event))
            .collect();
        if list.is_empty() {
            debug!(
                "No handler takes {} for aggregate {}",
                type_name::<E>(),
                event.aggregate_id
            );
            return Ok(());
        }

        let delivery = Arc::new(Delivery {
            event_type: type_name::<E>(),
            aggregate_id: event.aggregate_id,
            correlation_id: event.correlation_id.to_string(),
        });
        let event: Arc<dyn Any + Send + Sync> = Arc::new(event);
        self.in_flight.enter(list.len());

        let deliveries = list.into_iter().map(|handler| {
            Self::deliver(
                handler,
                event.clone(),
                delivery.clone(),
                self.policy.clone(),
                self.permits.clone(),
                self.counters.clone(),
                self.in_flight.clone(),
            )
        });

        if self.policy.fire_and_forget {
            for delivery in deliveries {
                tokio::spawn(delivery);
            }
        } else {
            join_all(deliveries).await;
        }
        Ok(())
    }

    async fn subscribe<E>(&mut self, handler: Arc<dyn Handler<E>>)
    where
        E: Send + Sync + 'static,
    {
        let wrapper = Arc::new(HandlerWrapper { inner: handler }) as Arc<dyn ErasedHandler>;
        self.handlers
            .write()
            .await
            .entry(TypeId::of::<E>())
            .or_default()
            .push(wrapper);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use application::event::event_bus::{CorrelationId, EventId};
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Debug, Clone, PartialEq)]
    struct Ping(u32);

    #[derive(Debug, Clone, PartialEq)]
    struct Other;

    fn envelope<T>(payload: T) -> EventEnvelope<T> {
        EventEnvelope::new(42, payload, CorrelationId::new(), EventId::new())
    }

    /// Fails the first `failures` calls, then records payloads
    #[derive(Default)]
    struct Flaky {
        failures: u32,
        calls: AtomicUsize,
        seen: Mutex<Vec<u32>>,
    }

    #[async_trait]
    impl Handler<Ping> for Flaky {
        async fn handle(&self, event: &EventEnvelope<Ping>) -> Result<(), AppError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) as u32;
            if call < self.failures {
                return Err(AppError::UnknownError("flaky".to_string()));
            }
            self.seen.lock().unwrap().push(event.payload.0);
            Ok(())
        }
    }

    /// Sleeps while tracking how many calls overlap
    #[derive(Default)]
    struct Slow {
        running: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl Handler<Ping> for Slow {
        async fn handle(&self, _event: &EventEnvelope<Ping>) -> Result<(), AppError> {
            let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.running.fetch_sub(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn fast_policy(fire_and_forget: bool) -> DispatchPolicy {
        DispatchPolicy {
            fire_and_forget,
            max_attempts: 3,
            retry_backoff: Duration::from_millis(1),
            max_in_flight: 8,
        }
    }

    #[tokio::test]
    async fn test_sync_publish_waits_for_handlers() {
        let mut bus = InMemoryEventBus::with_policy(fast_policy(false));
        let first = Arc::new(Flaky::default());
        let second = Arc::new(Flaky::default());
        bus.subscribe::<Ping>(first.clone()).await;
        bus.subscribe::<Ping>(second.clone()).await;

        bus.publish(envelope(Ping(1))).await.unwrap();

        assert_eq!(*first.seen.lock().unwrap(), vec![1]);
        assert_eq!(*second.seen.lock().unwrap(), vec![1]);
        assert_eq!(bus.stats().delivered, 2);
    }

    #[tokio::test]
    async fn test_async_publish_delivers_in_background() {
        let mut bus = InMemoryEventBus::with_policy(fast_policy(true));
        let handler = Arc::new(Flaky::default());
        bus.subscribe::<Ping>(handler.clone()).await;

        for i in 0..5 {
            bus.publish(envelope(Ping(i))).await.unwrap();
        }
        bus.wait_idle().await;

        let mut seen = handler.seen.lock().unwrap().clone();
        seen.sort();
        assert_eq!(seen, vec![0, 1, 2, 3, 4]);
        assert_eq!(
            bus.stats(),
            DispatchStats {
                delivered: 5,
                retried: 0,
                failed: 0,
            }
        );
    }

    #[tokio::test]
    async fn test_failed_delivery_is_retried() {
        let mut bus = InMemoryEventBus::with_policy(fast_policy(false));
        let handler = Arc::new(Flaky {
            failures: 2,
            ..Default::default()
        });
        bus.subscribe::<Ping>(handler.clone()).await;

        bus.publish(envelope(Ping(9))).await.unwrap();

        assert_eq!(handler.calls.load(Ordering::SeqCst), 3);
        assert_eq!(*handler.seen.lock().unwrap(), vec![9]);
        assert_eq!(
            bus.stats(),
            DispatchStats {
                delivered: 1,
                retried: 2,
                failed: 0,
            }
        );
    }

    #[tokio::test]
    async fn test_exhausted_delivery_does_not_affect_other_handlers() {
        let mut bus = InMemoryEventBus::with_policy(fast_policy(true));
        let broken = Arc::new(Flaky {
            failures: u32::MAX,
            ..Default::default()
        });
        let healthy = Arc::new(Flaky::default());
        bus.subscribe::<Ping>(broken.clone()).await;
        bus.subscribe::<Ping>(healthy.clone()).await;

        let result = bus.publish(envelope(Ping(3))).await;
        bus.wait_idle().await;

        assert!(result.is_ok());
        assert_eq!(broken.calls.load(Ordering::SeqCst), 3);
        assert_eq!(*healthy.seen.lock().unwrap(), vec![3]);
        assert_eq!(
            bus.stats(),
            DispatchStats {
                delivered: 1,
                retried: 2,
                failed: 1,
            }
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_in_flight_deliveries_are_bounded() {
        let mut bus = InMemoryEventBus::with_policy(DispatchPolicy {
            max_in_flight: 2,
            ..fast_policy(true)
        });
        let handler = Arc::new(Slow::default());
        bus.subscribe::<Ping>(handler.clone()).await;

        for i in 0..10 {
            bus.publish(envelope(Ping(i))).await.unwrap();
        }
        bus.wait_idle().await;

        assert!(handler.peak.load(Ordering::SeqCst) <= 2);
        assert_eq!(bus.stats().delivered, 10);
    }

    #[tokio::test]
    async fn test_handlers_only_see_their_event_type() {
        let mut bus = InMemoryEventBus::with_policy(fast_policy(false));
        let handler = Arc::new(Flaky::default());
        bus.subscribe::<Ping>(handler.clone()).await;

        bus.publish(envelope(Other)).await.unwrap();

        assert_eq!(handler.calls.load(Ordering::SeqCst), 0);
        assert_eq!(bus.stats(), DispatchStats::default());
    }

    /// Takes only even pings
    #[derive(Default)]
    struct EvenOnly {
        seen: Mutex<Vec<u32>>,
    }

    #[async_trait]
    impl Handler<Ping> for EvenOnly {
        async fn handle(&self, event: &EventEnvelope<Ping>) -> Result<(), AppError> {
            self.seen.lock().unwrap().push(event.payload.0);
            Ok(())
        }

        fn accepts(&self, event: &EventEnvelope<Ping>) -> bool {
            event.payload.0 % 2 == 0
        }
    }

    #[tokio::test]
    async fn test_declined_envelopes_are_not_delivered() {
        let mut bus = InMemoryEventBus::with_policy(fast_policy(true));
        let even = Arc::new(EvenOnly::default());
        let all = Arc::new(Flaky::default());
        bus.subscribe::<Ping>(even.clone()).await;
        bus.subscribe::<Ping>(all.clone()).await;

        for i in 0..4 {
            bus.publish(envelope(Ping(i))).await.unwrap();
        }
        bus.wait_idle().await;

        let mut seen = even.seen.lock().unwrap().clone();
        seen.sort();
        assert_eq!(seen, vec![0, 2]);
        assert_eq!(all.calls.load(Ordering::SeqCst), 4);
        assert_eq!(bus.stats().delivered, 6);
    }

    #[tokio::test]
    async fn test_wait_idle_returns_immediately_without_deliveries() {
        let bus = InMemoryEventBus::new_async();
        bus.wait_idle().await;
        assert_eq!(bus.stats(), DispatchStats::default());
    }
}
