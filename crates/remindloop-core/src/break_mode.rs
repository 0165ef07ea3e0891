//! Break mode: an explicit, time-bounded window in which no continuation is
//! scheduled.
//!
//! Expiry is lazy. Nothing clears the flag when the window runs out; the next
//! read notices `now >= end_time`, normalizes the state to disabled and
//! persists that.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::ValidationError;
use crate::storage::kv::{self, KvStore};

pub const BREAK_MODE_ENABLED_KEY: &str = "break_mode_enabled";
pub const BREAK_MODE_END_TIME_KEY: &str = "break_mode_end_time";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BreakModeState {
    pub enabled: bool,
    pub end_time: Option<DateTime<Utc>>,
}

impl BreakModeState {
    /// Active iff enabled and the end time is still ahead.
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.enabled && self.end_time.is_some_and(|end| now < end)
    }

    /// Time left in the window, zero once it has lapsed.
    pub fn remaining(&self, now: DateTime<Utc>) -> Duration {
        match self.end_time {
            Some(end) if self.is_active_at(now) => end - now,
            _ => Duration::zero(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct BreakMode {
    state: BreakModeState,
}

impl BreakMode {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restore from persisted keys. Missing or corrupt values fail open to
    /// a disabled break.
    pub fn load(kv: &dyn KvStore) -> Self {
        let enabled = match kv::read_bool(kv, BREAK_MODE_ENABLED_KEY) {
            Ok(v) => v.unwrap_or(false),
            Err(e) => {
                warn!(error = %e, "break mode flag unreadable, treating as disabled");
                return Self::new();
            }
        };
        let end_time = match kv::read_time(kv, BREAK_MODE_END_TIME_KEY) {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "break mode end time unreadable, treating as disabled");
                return Self::new();
            }
        };
        Self {
            state: BreakModeState { enabled, end_time },
        }
    }

    /// Raw state, without lazy expiry.
    pub fn state(&self) -> BreakModeState {
        self.state
    }

    /// Start a break lasting `minutes`. Overwrites any running break.
    pub fn start_for(
        &mut self,
        kv: &mut dyn KvStore,
        minutes: i64,
        now: DateTime<Utc>,
    ) -> Result<DateTime<Utc>, ValidationError> {
        if minutes <= 0 {
            return Err(ValidationError::BreakInPast);
        }
        let until = Duration::try_minutes(minutes)
            .and_then(|d| now.checked_add_signed(d))
            .ok_or(ValidationError::DelayOutOfRange { minutes })?;
        self.start_until(kv, until, now)
    }

    /// Start a break ending at `until`. Overwrites any running break.
    pub fn start_until(
        &mut self,
        kv: &mut dyn KvStore,
        until: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<DateTime<Utc>, ValidationError> {
        if until <= now {
            return Err(ValidationError::BreakInPast);
        }
        self.state = BreakModeState {
            enabled: true,
            end_time: Some(until),
        };
        self.persist(kv);
        debug!(end_time = %until, "break mode started");
        Ok(until)
    }

    /// User-initiated clear. Returns whether a break was running.
    pub fn end(&mut self, kv: &mut dyn KvStore, now: DateTime<Utc>) -> bool {
        let was_active = self.state.is_active_at(now);
        self.clear(kv);
        was_active
    }

    /// Check the window, normalizing an expired or dangling state first.
    pub fn is_active(&mut self, kv: &mut dyn KvStore, now: DateTime<Utc>) -> bool {
        if self.state.is_active_at(now) {
            return true;
        }
        if self.state.enabled || self.state.end_time.is_some() {
            debug!("break mode lapsed, normalizing");
            self.clear(kv);
        }
        false
    }

    fn clear(&mut self, kv: &mut dyn KvStore) {
        self.state = BreakModeState::default();
        if let Err(e) = kv::write_bool(kv, BREAK_MODE_ENABLED_KEY, false) {
            warn!(error = %e, "failed to persist break mode flag");
        }
        if let Err(e) = kv.kv_remove(BREAK_MODE_END_TIME_KEY) {
            warn!(error = %e, "failed to clear break mode end time");
        }
    }

    fn persist(&self, kv: &mut dyn KvStore) {
        if let Err(e) = kv::write_bool(kv, BREAK_MODE_ENABLED_KEY, self.state.enabled) {
            warn!(error = %e, "failed to persist break mode flag");
        }
        if let Some(end) = self.state.end_time {
            if let Err(e) = kv::write_time(kv, BREAK_MODE_END_TIME_KEY, end) {
                warn!(error = %e, "failed to persist break mode end time");
            }
        }
    }
}
