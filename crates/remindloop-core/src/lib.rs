//! # Remindloop Core Library
//!
//! This library provides the reminder lifecycle engine behind remindloop: an
//! assistant that keeps nagging about tasks and events until they are
//! resolved, while staying quiet during declared breaks and tracking long
//! hyperfocus sessions.
//!
//! ## Architecture
//!
//! - **Lifecycle controller**: the single decision point. Every delivery, user
//!   action and remote completion produces a [`Decision`] plus a queue of
//!   outbound [`Event`]s; the controller never performs effects itself
//! - **Suppression windows**: [`BreakMode`] (time-bounded, lazily expiring)
//!   and [`HyperfocusSession`] (open-ended, staged), both persisted through a
//!   [`KvStore`] and both driven by an explicit `now`
//! - **Storage**: a SQLite [`Database`] implementing the trigger store and
//!   kv contracts, plus TOML [`Config`]
//! - **Runtime**: a tokio task that polls due triggers and ticks hyperfocus
//!
//! ## Key Components
//!
//! - [`LifecycleController`]: reschedule / suppress / resolve decisions
//! - [`TriggerStore`]: trait the controller schedules into
//! - [`MessageTable`]: personality-flavoured message composition
//! - [`Runtime`]: background loop and [`RuntimeHandle`]

pub mod break_mode;
pub mod controller;
pub mod error;
pub mod events;
pub mod hyperfocus;
pub mod messages;
pub mod relay;
pub mod runtime;
pub mod storage;
pub mod trigger;

pub use break_mode::{BreakMode, BreakModeState};
pub use controller::{ControllerConfig, ControllerSnapshot, Decision, LifecycleController, UserAction};
pub use error::{ConfigError, CoreError, DatabaseError, ValidationError};
pub use events::{Event, LogKind, Outbox};
pub use hyperfocus::{format_duration, HyperfocusNotice, HyperfocusSession, HyperfocusStage};
pub use messages::{MessageKind, MessageTable, Personality};
pub use relay::RemoteMessage;
pub use runtime::{EffectSink, Runtime, RuntimeHandle, RuntimeOptions};
pub use storage::{Config, Database, KvStore, MemoryKvStore};
pub use trigger::{
    EntityId, MemoryTriggerStore, RawDelivery, ReminderTrigger, ScheduleRequest, TriggerHandle,
    TriggerKind, TriggerPayload, TriggerStore,
};
