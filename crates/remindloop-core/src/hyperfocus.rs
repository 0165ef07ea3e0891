//! Hyperfocus session tracking.
//!
//! A hyperfocus session is an open-ended deep-work window. Like the timer
//! engine it is wall-clock based with no internal thread: the caller invokes
//! `tick()` (once a second in the runtime) and gets back whatever notices the
//! new elapsed time produces.
//!
//! Elapsed time is always derived from the persisted start time, never
//! counted, so a restarted process picks up exactly where it left off.
//!
//! ## Stages
//!
//! ```text
//! elapsed  [0,30)  [30,60)  [60,90)  [90,120)  [120,..)
//! stage       1       2        3        4          5
//! ```
//!
//! Reaching a stage raises one notice, except stage 2 which is silent. In
//! stage 5 a reminder repeats at every further multiple of 30 minutes.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::storage::kv::{self, KvStore};

pub const HYPERFOCUS_IS_ACTIVE_KEY: &str = "hyperfocus_is_active";
pub const HYPERFOCUS_START_TIME_KEY: &str = "hyperfocus_start_time";

/// Minutes at which stages 2, 3, 4 and 5 begin.
const STAGE_BREAKPOINTS: [i64; 4] = [30, 60, 90, 120];
const REPEAT_EVERY_MINUTES: i64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HyperfocusStage {
    None,
    Stage1,
    Stage2,
    Stage3,
    Stage4,
    Stage5,
}

impl HyperfocusStage {
    /// Stage for an active session `elapsed_minutes` in.
    pub fn for_elapsed(elapsed_minutes: i64) -> Self {
        let passed = STAGE_BREAKPOINTS
            .iter()
            .filter(|&&b| elapsed_minutes >= b)
            .count();
        match passed {
            0 => HyperfocusStage::Stage1,
            1 => HyperfocusStage::Stage2,
            2 => HyperfocusStage::Stage3,
            3 => HyperfocusStage::Stage4,
            _ => HyperfocusStage::Stage5,
        }
    }

    pub fn number(self) -> u8 {
        match self {
            HyperfocusStage::None => 0,
            HyperfocusStage::Stage1 => 1,
            HyperfocusStage::Stage2 => 2,
            HyperfocusStage::Stage3 => 3,
            HyperfocusStage::Stage4 => 4,
            HyperfocusStage::Stage5 => 5,
        }
    }

    /// Stage 2 is reached without a word.
    pub fn announces(self) -> bool {
        !matches!(self, HyperfocusStage::None | HyperfocusStage::Stage2)
    }
}

/// Something the session wants said.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HyperfocusNotice {
    Started,
    StageReached {
        stage: HyperfocusStage,
        elapsed_minutes: i64,
    },
    /// Periodic reminder while in stage 5.
    StillGoing { elapsed_minutes: i64 },
    Ended { elapsed: Duration },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HyperfocusSnapshot {
    pub is_active: bool,
    pub start_time: Option<DateTime<Utc>>,
    pub stage: HyperfocusStage,
    pub elapsed_minutes: i64,
}

#[derive(Debug, Clone)]
pub struct HyperfocusSession {
    is_active: bool,
    start_time: Option<DateTime<Utc>>,
    stage: HyperfocusStage,
    /// Elapsed minute of the last stage-5 repeat, so a minute fires once
    /// no matter how many ticks land in it.
    last_repeat_minute: Option<i64>,
}

impl Default for HyperfocusSession {
    fn default() -> Self {
        Self {
            is_active: false,
            start_time: None,
            stage: HyperfocusStage::None,
            last_repeat_minute: None,
        }
    }
}

impl HyperfocusSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from persisted state, computing the stage from the stored
    /// start time right away. Unreadable state fails open to inactive.
    pub fn restore(kv: &mut dyn KvStore, now: DateTime<Utc>) -> Self {
        let active = match kv::read_bool(kv, HYPERFOCUS_IS_ACTIVE_KEY) {
            Ok(v) => v.unwrap_or(false),
            Err(e) => {
                warn!(error = %e, "hyperfocus flag unreadable, treating as inactive");
                false
            }
        };
        if !active {
            return Self::new();
        }
        let start = match kv::read_time(kv, HYPERFOCUS_START_TIME_KEY) {
            Ok(Some(start)) => start,
            Ok(None) | Err(_) => {
                warn!("hyperfocus marked active without a readable start time, clearing");
                clear_persisted(kv);
                return Self::new();
            }
        };

        let mut session = Self {
            is_active: true,
            start_time: Some(start),
            stage: HyperfocusStage::None,
            last_repeat_minute: None,
        };
        let elapsed = session.elapsed_minutes(now);
        session.stage = HyperfocusStage::for_elapsed(elapsed);
        session.last_repeat_minute = Some(elapsed);
        info!(elapsed_minutes = elapsed, stage = session.stage.number(), "hyperfocus restored");
        session
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    pub fn stage(&self) -> HyperfocusStage {
        self.stage
    }

    pub fn start_time(&self) -> Option<DateTime<Utc>> {
        self.start_time
    }

    pub fn elapsed(&self, now: DateTime<Utc>) -> Duration {
        match self.start_time {
            Some(start) if self.is_active => (now - start).max(Duration::zero()),
            _ => Duration::zero(),
        }
    }

    pub fn elapsed_minutes(&self, now: DateTime<Utc>) -> i64 {
        self.elapsed(now).num_minutes()
    }

    pub fn snapshot(&self, now: DateTime<Utc>) -> HyperfocusSnapshot {
        HyperfocusSnapshot {
            is_active: self.is_active,
            start_time: self.start_time,
            stage: self.stage,
            elapsed_minutes: self.elapsed_minutes(now),
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    pub fn toggle(&mut self, kv: &mut dyn KvStore, now: DateTime<Utc>) -> Option<HyperfocusNotice> {
        if self.is_active {
            self.deactivate(kv, now)
        } else {
            self.activate(kv, now)
        }
    }

    /// Start a session. `None` if one is already running.
    pub fn activate(&mut self, kv: &mut dyn KvStore, now: DateTime<Utc>) -> Option<HyperfocusNotice> {
        if self.is_active {
            return None;
        }
        self.is_active = true;
        self.start_time = Some(now);
        self.stage = HyperfocusStage::Stage1;
        self.last_repeat_minute = None;

        if let Err(e) = kv::write_bool(kv, HYPERFOCUS_IS_ACTIVE_KEY, true)
            .and_then(|_| kv::write_time(kv, HYPERFOCUS_START_TIME_KEY, now))
        {
            warn!(error = %e, "failed to persist hyperfocus start");
        }
        info!("hyperfocus started");
        Some(HyperfocusNotice::Started)
    }

    /// End the session. `None` if none was running.
    pub fn deactivate(&mut self, kv: &mut dyn KvStore, now: DateTime<Utc>) -> Option<HyperfocusNotice> {
        if !self.is_active {
            return None;
        }
        let elapsed = self.elapsed(now);
        clear_persisted(kv);
        *self = Self::new();
        info!(elapsed_secs = elapsed.num_seconds(), "hyperfocus ended");
        Some(HyperfocusNotice::Ended { elapsed })
    }

    /// Recompute stage from wall-clock time. A tick after deactivation is
    /// a no-op.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Vec<HyperfocusNotice> {
        if !self.is_active {
            return Vec::new();
        }
        let elapsed = self.elapsed_minutes(now);
        let stage = HyperfocusStage::for_elapsed(elapsed);
        let mut notices = Vec::new();

        if stage > self.stage {
            debug!(from = self.stage.number(), to = stage.number(), elapsed, "hyperfocus stage changed");
            self.stage = stage;
            if stage.announces() {
                notices.push(HyperfocusNotice::StageReached {
                    stage,
                    elapsed_minutes: elapsed,
                });
            }
        }

        let repeat_due = self.stage == HyperfocusStage::Stage5
            && elapsed > STAGE_BREAKPOINTS[3]
            && elapsed % REPEAT_EVERY_MINUTES == 0
            && self.last_repeat_minute != Some(elapsed);
        if repeat_due {
            self.last_repeat_minute = Some(elapsed);
            notices.push(HyperfocusNotice::StillGoing {
                elapsed_minutes: elapsed,
            });
        }

        notices
    }
}

fn clear_persisted(kv: &mut dyn KvStore) {
    if let Err(e) = kv::write_bool(kv, HYPERFOCUS_IS_ACTIVE_KEY, false) {
        warn!(error = %e, "failed to persist hyperfocus flag");
    }
    if let Err(e) = kv.kv_remove(HYPERFOCUS_START_TIME_KEY) {
        warn!(error = %e, "failed to clear hyperfocus start time");
    }
}

/// Render a duration in its largest applicable unit: hours and minutes,
/// else minutes, else seconds.
pub fn format_duration(d: Duration) -> String {
    let total_secs = d.num_seconds().max(0);
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;

    if hours > 0 {
        if minutes > 0 {
            format!("{} and {}", plural(hours, "hour"), plural(minutes, "minute"))
        } else {
            plural(hours, "hour")
        }
    } else if minutes > 0 {
        plural(minutes, "minute")
    } else {
        plural(total_secs, "second")
    }
}

fn plural(n: i64, unit: &str) -> String {
    if n == 1 {
        format!("1 {unit}")
    } else {
        format!("{n} {unit}s")
    }
}
