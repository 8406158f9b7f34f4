use crate::event::DomainEvent;
use crate::value::{InteractionKey, ItemId, UserId};
use async_trait::async_trait;
use chrono::{Duration, NaiveDateTime};
use std::{fmt, str::FromStr};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum InteractionError {
    #[error("Interaction record not found: {0}")]
    NotFound(InteractionKey),
    #[error("Duplicate interaction record: {0}")]
    DuplicateKey(InteractionKey),
    #[error("Record store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("Corrupt interaction record {key}: {reason}")]
    CorruptRecord { key: InteractionKey, reason: String },
    #[error("Unknown counter: {0}")]
    UnknownCounter(String),
}

/// Which of like/dislike a request targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Polarity {
    Like,
    Dislike,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Desired {
    Set,
    Clear,
}

/// Aggregate counters kept per item by the stats collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Counter {
    Play,
    Good,
    Bad,
}

impl Counter {
    pub fn name(&self) -> &'static str {
        match self {
            Counter::Play => "play",
            Counter::Good => "good",
            Counter::Bad => "bad",
        }
    }
}

impl FromStr for Counter {
    type Err = InteractionError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "play" => Ok(Counter::Play),
            "good" => Ok(Counter::Good),
            "bad" => Ok(Counter::Bad),
            _ => Err(InteractionError::UnknownCounter(s.to_string())),
        }
    }
}

impl fmt::Display for Counter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SwapDirection {
    /// good + 1, bad - 1
    DislikeToLike,
    /// good - 1, bad + 1
    LikeToDislike,
}

impl fmt::Display for SwapDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SwapDirection::DislikeToLike => write!(f, "dislike_to_like"),
            SwapDirection::LikeToDislike => write!(f, "like_to_dislike"),
        }
    }
}

/// Side effect produced by a committed transition, executed outside the request path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InteractionEffect {
    AppendHistory {
        user_id: UserId,
        item_id: ItemId,
        viewed_at: NaiveDateTime,
    },
    AdjustCounter {
        item_id: ItemId,
        counter: Counter,
        delta: i64,
    },
    SwapGoodBad {
        item_id: ItemId,
        direction: SwapDirection,
    },
}

impl InteractionEffect {
    pub fn item_id(&self) -> ItemId {
        match self {
            InteractionEffect::AppendHistory { item_id, .. } => *item_id,
            InteractionEffect::AdjustCounter { item_id, .. } => *item_id,
            InteractionEffect::SwapGoodBad { item_id, .. } => *item_id,
        }
    }
}

impl DomainEvent for InteractionEffect {
    fn aggregate_id(&self) -> i64 {
        self.item_id().as_i64()
    }

    fn kind(&self) -> &'static str {
        match self {
            InteractionEffect::AppendHistory { .. } => "history-append",
            InteractionEffect::AdjustCounter { .. } => "counter-adjust",
            InteractionEffect::SwapGoodBad { .. } => "counter-swap",
        }
    }
}

/// Like/dislike state of a record. Both flags set at once is not representable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LikeState {
    #[default]
    Neutral,
    Liked,
    Disliked,
}

impl LikeState {
    pub fn from_flags(liked: bool, disliked: bool) -> Option<Self> {
        match (liked, disliked) {
            (false, false) => Some(LikeState::Neutral),
            (true, false) => Some(LikeState::Liked),
            (false, true) => Some(LikeState::Disliked),
            (true, true) => None,
        }
    }

    pub fn liked(self) -> bool {
        self == LikeState::Liked
    }

    pub fn disliked(self) -> bool {
        self == LikeState::Disliked
    }

    /// Next state and the stats effect for a like/dislike request.
    ///
    /// Switching polarity yields a single swap instead of two adjustments;
    /// requests that do not change the state yield no effect.
    pub fn transition(
        self,
        item_id: ItemId,
        polarity: Polarity,
        desired: Desired,
    ) -> (LikeState, Option<InteractionEffect>) {
        let adjust = |counter, delta| InteractionEffect::AdjustCounter {
            item_id,
            counter,
            delta,
        };
        let swap = |direction| InteractionEffect::SwapGoodBad { item_id, direction };

        match (self, polarity, desired) {
            (LikeState::Neutral, Polarity::Like, Desired::Set) => {
                (LikeState::Liked, Some(adjust(Counter::Good, 1)))
            }
            (LikeState::Disliked, Polarity::Like, Desired::Set) => {
                (LikeState::Liked, Some(swap(SwapDirection::DislikeToLike)))
            }
            (LikeState::Liked, Polarity::Like, Desired::Clear) => {
                (LikeState::Neutral, Some(adjust(Counter::Good, -1)))
            }
            (LikeState::Neutral, Polarity::Dislike, Desired::Set) => {
                (LikeState::Disliked, Some(adjust(Counter::Bad, 1)))
            }
            (LikeState::Liked, Polarity::Dislike, Desired::Set) => {
                (LikeState::Disliked, Some(swap(SwapDirection::LikeToDislike)))
            }
            (LikeState::Disliked, Polarity::Dislike, Desired::Clear) => {
                (LikeState::Neutral, Some(adjust(Counter::Bad, -1)))
            }
            (state, _, _) => (state, None),
        }
    }
}

/// Fields to write for one transition. `None` leaves the stored column untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InteractionChanges {
    pub play_count: Option<i32>,
    pub last_played_at: Option<NaiveDateTime>,
    pub liked: Option<bool>,
    pub disliked: Option<bool>,
}

impl InteractionChanges {
    pub fn is_empty(&self) -> bool {
        self.play_count.is_none()
            && self.last_played_at.is_none()
            && self.liked.is_none()
            && self.disliked.is_none()
    }

    /// Apply onto a stored record, rejecting a result with both like flags set.
    pub fn apply_to(&self, record: &mut InteractionRecord) -> Result<(), InteractionError> {
        let liked = self.liked.unwrap_or(record.liked());
        let disliked = self.disliked.unwrap_or(record.disliked());
        let like_state =
            LikeState::from_flags(liked, disliked).ok_or(InteractionError::CorruptRecord {
                key: record.key(),
                reason: "liked and disliked both set".to_string(),
            })?;
        if let Some(play_count) = self.play_count {
            record.play_count = play_count;
        }
        if let Some(at) = self.last_played_at {
            record.last_played_at = Some(at);
        }
        record.like_state = like_state;
        Ok(())
    }
}

/// Per-user-per-item interaction state.
#[derive(Debug, Clone, PartialEq)]
pub struct InteractionRecord {
    pub user_id: UserId,
    pub item_id: ItemId,
    pub play_count: i32,
    pub like_state: LikeState,
    pub favorited: bool,
    pub last_played_at: Option<NaiveDateTime>,
    pub pending_effects: Vec<InteractionEffect>,
}

impl InteractionRecord {
    /// Record created by the first play of an item. Emits history and play effects.
    pub fn first_play(user_id: UserId, item_id: ItemId, now: NaiveDateTime) -> Self {
        let mut record = Self {
            user_id,
            item_id,
            play_count: 1,
            like_state: LikeState::Neutral,
            favorited: false,
            last_played_at: Some(now),
            pending_effects: Vec::new(),
        };
        record.record_play_effects(now);
        record
    }

    /// Rebuild a record from stored columns.
    pub fn restore(
        user_id: UserId,
        item_id: ItemId,
        play_count: i32,
        liked: bool,
        disliked: bool,
        favorited: bool,
        last_played_at: Option<NaiveDateTime>,
    ) -> Result<Self, InteractionError> {
        let key = InteractionKey::new(user_id, item_id);
        let like_state =
            LikeState::from_flags(liked, disliked).ok_or(InteractionError::CorruptRecord {
                key,
                reason: "liked and disliked both set".to_string(),
            })?;
        if play_count < 0 {
            return Err(InteractionError::CorruptRecord {
                key,
                reason: format!("negative play count {}", play_count),
            });
        }
        Ok(Self {
            user_id,
            item_id,
            play_count,
            like_state,
            favorited,
            last_played_at,
            pending_effects: Vec::new(),
        })
    }

    pub fn key(&self) -> InteractionKey {
        InteractionKey::new(self.user_id, self.item_id)
    }

    pub fn liked(&self) -> bool {
        self.like_state.liked()
    }

    pub fn disliked(&self) -> bool {
        self.like_state.disliked()
    }

    /// True while `now` is within `window` of the last counted play.
    pub fn is_throttled(&self, now: NaiveDateTime, window: Duration) -> bool {
        match self.last_played_at {
            Some(at) => now - at <= window,
            None => false,
        }
    }

    /// Count a repeat play unless it falls inside the throttle window.
    pub fn play(&mut self, now: NaiveDateTime, window: Duration) -> InteractionChanges {
        if self.is_throttled(now, window) {
            return InteractionChanges::default();
        }
        self.play_count = self.play_count.saturating_add(1);
        self.last_played_at = Some(now);
        self.record_play_effects(now);
        InteractionChanges {
            play_count: Some(self.play_count),
            last_played_at: Some(now),
            ..Default::default()
        }
    }

    /// Apply a like/dislike request. No-op requests return empty changes and emit nothing.
    pub fn set_like_state(&mut self, polarity: Polarity, desired: Desired) -> InteractionChanges {
        let current = self.like_state;
        let (next, effect) = current.transition(self.item_id, polarity, desired);
        let Some(effect) = effect else {
            return InteractionChanges::default();
        };
        self.like_state = next;
        self.record(effect);

        let mut changes = InteractionChanges::default();
        if current.liked() != next.liked() {
            changes.liked = Some(next.liked());
        }
        if current.disliked() != next.disliked() {
            changes.disliked = Some(next.disliked());
        }
        changes
    }

    fn record_play_effects(&mut self, now: NaiveDateTime) {
        self.record(InteractionEffect::AppendHistory {
            user_id: self.user_id,
            item_id: self.item_id,
            viewed_at: now,
        });
        self.record(InteractionEffect::AdjustCounter {
            item_id: self.item_id,
            counter: Counter::Play,
            delta: 1,
        });
    }

    fn record(&mut self, effect: InteractionEffect) {
        self.pending_effects.push(effect);
    }

    pub fn pop_effects(&mut self) -> Vec<InteractionEffect> {
        std::mem::take(&mut self.pending_effects)
    }
}

/// Keyed storage with one record per (user, item) pair.
#[async_trait]
pub trait InteractionRecordStore: Send + Sync {
    async fn find(
        &self,
        key: &InteractionKey,
    ) -> Result<Option<InteractionRecord>, InteractionError>;
    /// Fails with `DuplicateKey` when a record for the key already exists.
    async fn insert(&self, record: &InteractionRecord) -> Result<(), InteractionError>;
    /// Fails with `NotFound` when no record exists for the key.
    async fn update_fields(
        &self,
        key: &InteractionKey,
        changes: &InteractionChanges,
    ) -> Result<(), InteractionError>;
}
