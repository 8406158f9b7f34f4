use crate::error::AppError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::event::DomainEvent;
use std::any::Any;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Envelope around an effect handed to the bus.
#[derive(Debug, Clone)]
pub struct EventEnvelope<T> {
    pub id: EventId,
    pub aggregate_id: i64,
    pub timestamp: DateTime<Utc>,
    pub payload: T,
    // correlation_id ties together every effect caused by one request
    pub correlation_id: CorrelationId,
    // causation_id is the event id of the context that produced this event
    pub causation_id: EventId,
}

impl<T> EventEnvelope<T> {
    pub fn new(
        aggregate_id: i64,
        payload: T,
        correlation_id: CorrelationId,
        causation_id: EventId,
    ) -> Self {
        Self {
            id: EventId::new(),
            aggregate_id,
            timestamp: Utc::now(),
            payload,
            correlation_id,
            causation_id,
        }
    }
}

impl<E: DomainEvent> EventEnvelope<E> {
    pub fn from_domain_event(
        event: E,
        correlation_id: CorrelationId,
        causation_id: EventId,
    ) -> Self {
        Self::new(event.aggregate_id(), event, correlation_id, causation_id)
    }
}

#[derive(Debug, Clone, Eq, Hash, PartialEq)]
pub struct EventId(Uuid);

impl EventId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Eq, Hash, PartialEq)]
pub struct CorrelationId(Uuid);

impl CorrelationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Typed handler. An `Err` marks the delivery as failed; the bus decides about retries.
#[async_trait]
pub trait Handler<E>: Send + Sync {
    async fn handle(&self, event: &EventEnvelope<E>) -> Result<(), AppError>;

    /// Envelopes this handler declines are never delivered to it and do not
    /// count as deliveries.
    fn accepts(&self, _event: &EventEnvelope<E>) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Type-erased handler, events are erased through `Any`.
#[async_trait]
pub trait ErasedHandler: Send + Sync {
    async fn handle_erased(&self, event: &(dyn Any + Send + Sync)) -> Result<(), AppError>;

    fn accepts_erased(&self, event: &(dyn Any + Send + Sync)) -> bool;

    fn name(&self) -> &'static str;
}

/// Event bus abstraction
#[async_trait]
pub trait EventBus: Send + Sync {
    async fn publish<E>(&self, event: EventEnvelope<E>) -> Result<(), AppError>
    where
        E: Send + Sync + 'static;

    async fn subscribe<E>(&mut self, handler: Arc<dyn Handler<E>>)
    where
        E: Send + Sync + 'static;
}
