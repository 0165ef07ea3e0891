//! Background runtime.
//!
//! Owns the [`LifecycleController`] inside one tokio task and serializes every
//! input through a command channel, so deliveries, user actions, remote
//! messages and timer ticks never interleave. Two intervals drive the clock:
//! one polls the trigger store for due triggers, the other ticks hyperfocus
//! while a session is active. After each step the controller's outbox is
//! drained into an [`EffectSink`].

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::controller::{ControllerSnapshot, Decision, LifecycleController, UserAction};
use crate::error::{CoreError, Result, ValidationError};
use crate::events::Event;
use crate::relay::RemoteMessage;
use crate::storage::RuntimeConfig;
use crate::trigger::ReminderTrigger;

const COMMAND_BUFFER: usize = 64;

/// Receives the side effects the controller decided on.
pub trait EffectSink: Send + 'static {
    fn handle(&mut self, event: Event);
}

impl EffectSink for mpsc::UnboundedSender<Event> {
    fn handle(&mut self, event: Event) {
        if self.send(event).is_err() {
            debug!("effect receiver dropped");
        }
    }
}

impl EffectSink for Box<dyn FnMut(Event) + Send> {
    fn handle(&mut self, event: Event) {
        (self)(event)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeOptions {
    pub poll_interval: Duration,
    pub hyperfocus_tick: Duration,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            hyperfocus_tick: Duration::from_secs(1),
        }
    }
}

impl From<&RuntimeConfig> for RuntimeOptions {
    fn from(cfg: &RuntimeConfig) -> Self {
        Self {
            poll_interval: Duration::from_secs(cfg.poll_interval_secs.max(1)),
            hyperfocus_tick: Duration::from_secs(cfg.hyperfocus_tick_secs.max(1)),
        }
    }
}

enum Command {
    Deliver {
        trigger: ReminderTrigger,
        foreground: bool,
        reply: oneshot::Sender<Decision>,
    },
    Action {
        action: UserAction,
        trigger: ReminderTrigger,
        reply: oneshot::Sender<Decision>,
    },
    Remote {
        message: RemoteMessage,
        reply: oneshot::Sender<Decision>,
    },
    StartBreak {
        minutes: i64,
        reply: oneshot::Sender<Result<DateTime<Utc>, ValidationError>>,
    },
    EndBreak {
        reply: oneshot::Sender<bool>,
    },
    ToggleHyperfocus {
        reply: oneshot::Sender<bool>,
    },
    Snapshot {
        reply: oneshot::Sender<ControllerSnapshot>,
    },
    Shutdown,
}

/// Cloneable handle for talking to a running [`Runtime`].
#[derive(Clone)]
pub struct RuntimeHandle {
    tx: mpsc::Sender<Command>,
}

impl RuntimeHandle {
    async fn request<T>(&self, build: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(build(reply))
            .await
            .map_err(|_| CoreError::RuntimeStopped)?;
        rx.await.map_err(|_| CoreError::RuntimeStopped)
    }

    pub async fn deliver(&self, trigger: ReminderTrigger, foreground: bool) -> Result<Decision> {
        self.request(|reply| Command::Deliver {
            trigger,
            foreground,
            reply,
        })
        .await
    }

    pub async fn action(&self, action: UserAction, trigger: ReminderTrigger) -> Result<Decision> {
        self.request(|reply| Command::Action {
            action,
            trigger,
            reply,
        })
        .await
    }

    pub async fn remote(&self, message: RemoteMessage) -> Result<Decision> {
        self.request(|reply| Command::Remote { message, reply }).await
    }

    pub async fn start_break(&self, minutes: i64) -> Result<DateTime<Utc>> {
        let end = self
            .request(|reply| Command::StartBreak { minutes, reply })
            .await?;
        Ok(end?)
    }

    pub async fn end_break(&self) -> Result<bool> {
        self.request(|reply| Command::EndBreak { reply }).await
    }

    /// Returns whether hyperfocus is active after the toggle.
    pub async fn toggle_hyperfocus(&self) -> Result<bool> {
        self.request(|reply| Command::ToggleHyperfocus { reply }).await
    }

    pub async fn snapshot(&self) -> Result<ControllerSnapshot> {
        self.request(|reply| Command::Snapshot { reply }).await
    }

    /// Ask the runtime to stop after the current step.
    pub async fn shutdown(&self) -> Result<()> {
        self.tx
            .send(Command::Shutdown)
            .await
            .map_err(|_| CoreError::RuntimeStopped)
    }
}

pub struct Runtime {
    controller: LifecycleController,
    sink: Box<dyn EffectSink>,
    rx: mpsc::Receiver<Command>,
    options: RuntimeOptions,
}

impl Runtime {
    /// Start the runtime loop. The join handle yields the controller back
    /// once the loop stops.
    pub fn spawn(
        controller: LifecycleController,
        sink: impl EffectSink,
        options: RuntimeOptions,
    ) -> (RuntimeHandle, JoinHandle<LifecycleController>) {
        let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
        let runtime = Runtime {
            controller,
            sink: Box::new(sink),
            rx,
            options,
        };
        (RuntimeHandle { tx }, tokio::spawn(runtime.run()))
    }

    async fn run(mut self) -> LifecycleController {
        info!(
            poll_ms = self.options.poll_interval.as_millis() as u64,
            "reminder runtime started"
        );
        let mut poll = tokio::time::interval(self.options.poll_interval);
        poll.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut hyperfocus_tick = tokio::time::interval(self.options.hyperfocus_tick);
        hyperfocus_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                cmd = self.rx.recv() => match cmd {
                    Some(Command::Shutdown) | None => break,
                    Some(cmd) => self.handle_command(cmd),
                },
                _ = poll.tick() => self.poll_due(Utc::now()),
                _ = hyperfocus_tick.tick() => {
                    if self.controller.hyperfocus().is_active() {
                        self.controller.tick_hyperfocus(Utc::now());
                    }
                }
            }
            self.flush();
        }

        info!("reminder runtime stopped");
        self.controller
    }

    fn handle_command(&mut self, cmd: Command) {
        let now = Utc::now();
        // A dropped reply receiver only means the caller stopped waiting.
        match cmd {
            Command::Deliver {
                trigger,
                foreground,
                reply,
            } => {
                let _ = reply.send(self.controller.on_delivery(&trigger, foreground, now));
            }
            Command::Action {
                action,
                trigger,
                reply,
            } => {
                let _ = reply.send(self.controller.on_action(action, &trigger, now));
            }
            Command::Remote { message, reply } => {
                let _ = reply.send(self.controller.on_remote(&message, now));
            }
            Command::StartBreak { minutes, reply } => {
                let _ = reply.send(self.controller.start_break_for(minutes, now));
            }
            Command::EndBreak { reply } => {
                let _ = reply.send(self.controller.end_break(now));
            }
            Command::ToggleHyperfocus { reply } => {
                let _ = reply.send(self.controller.toggle_hyperfocus(now));
            }
            Command::Snapshot { reply } => {
                let _ = reply.send(self.controller.snapshot(now));
            }
            Command::Shutdown => {}
        }
    }

    fn poll_due(&mut self, now: DateTime<Utc>) {
        let due = match self.controller.store_mut().take_due(now) {
            Ok(due) => due,
            Err(e) => {
                warn!(error = %e, "could not poll due triggers");
                return;
            }
        };
        for trigger in due {
            let decision = self.controller.on_delivery(&trigger, true, now);
            debug!(entity_id = %trigger.entity_id, ?decision, "due trigger handled");
        }
    }

    fn flush(&mut self) {
        for event in self.controller.drain_events() {
            self.sink.handle(event);
        }
    }
}
