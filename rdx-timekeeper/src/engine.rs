//! The core engine that owns every timekeeping component and drives them.

use crate::common::{AlarmId, SamplerKind};
use crate::components::alarm::{Alarm, AlarmDraft, AlarmError};
use crate::components::countdown::{Countdown, CountdownPhase, CountdownTick};
use crate::components::scheduler::{AlarmScheduler, SnoozePolicy};
use crate::components::stopwatch::{Lap, Stopwatch};
use crate::components::watcher::SamplerRegistry;
use crate::config::TimekeeperConfig;
use crate::events::{
    AlarmEvent, AlertEvent, CountdownEvent, StopwatchEvent, SystemEvent, ALARM_RING_PULSE,
    COUNTDOWN_EXPIRED_PULSE, LAP_PULSE, STOPWATCH_START_PULSE,
};
use crate::storage::{Store, ALARMS_KEY, BACKGROUND_KEY};
use crate::time::{SystemClock, SystemWallClock, TickEvent, WallClock};
use chrono::NaiveDateTime;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, error, info, trace, warn};

/// A point-in-time view of the stopwatch.
#[derive(Debug, Clone)]
pub struct StopwatchSnapshot {
    pub running: bool,
    pub elapsed: Duration,
    /// Most recent first.
    pub laps: Vec<Lap>,
}

/// A point-in-time view of the countdown.
#[derive(Debug, Clone)]
pub struct CountdownSnapshot {
    pub phase: CountdownPhase,
    pub configured: Duration,
    pub total: Duration,
    pub remaining: Duration,
    pub progress: f64,
    pub minutes_left: u64,
}

/// The main Timekeeper engine.
///
/// This struct owns the stopwatch, the countdown and the alarm scheduler, the
/// samplers that advance them, and the event channels they report on. It is
/// a cheap handle: clones share the same running instance.
#[derive(Clone)]
pub struct TimekeeperEngine {
    config: Arc<TimekeeperConfig>,
    wall_clock: Arc<dyn WallClock>,
    store: Store,
    tick_sender: broadcast::Sender<Arc<TickEvent>>,
    system_event_sender: broadcast::Sender<SystemEvent>,
    stopwatch_event_sender: broadcast::Sender<StopwatchEvent>,
    countdown_event_sender: broadcast::Sender<CountdownEvent>,
    alarm_event_sender: broadcast::Sender<AlarmEvent>,
    alert_event_sender: broadcast::Sender<AlertEvent>,
    stopwatch: Arc<RwLock<Stopwatch>>,
    countdown: Arc<RwLock<Countdown>>,
    scheduler: Arc<RwLock<AlarmScheduler>>,
    samplers: Arc<RwLock<SamplerRegistry>>,
    background: Arc<RwLock<Option<String>>>,
}

// Core implementation block for internal logic.
impl TimekeeperEngine {
    /// Creates an engine reading wall time in the configured timezone and
    /// restores the persisted alarms and background from `store`.
    pub async fn new(config: TimekeeperConfig, store: Store) -> Self {
        let wall_clock = Arc::new(SystemWallClock::new(config.timezone));
        Self::with_wall_clock(config, store, wall_clock).await
    }

    /// Creates an engine with a caller-provided wall clock.
    pub async fn with_wall_clock(
        config: TimekeeperConfig,
        store: Store,
        wall_clock: Arc<dyn WallClock>,
    ) -> Self {
        const CHANNEL_CAPACITY: usize = 256;
        let (tick_sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        let (system_event_sender, _) = broadcast::channel(64);
        let (stopwatch_event_sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        let (countdown_event_sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        let (alarm_event_sender, _) = broadcast::channel(64);
        let (alert_event_sender, _) = broadcast::channel(64);

        let alarms = store.load_alarms().await;
        let background = store.load_background().await;
        info!("Restored {} alarm(s) from storage.", alarms.len());

        let scheduler = AlarmScheduler::new(alarms, SnoozePolicy::from(&config.alarm));
        let mut samplers = SamplerRegistry::default();
        samplers.start(
            SamplerKind::AlarmPoll,
            config.cadence.alarm_poll(),
            Instant::now(),
        );

        Self {
            config: Arc::new(config),
            wall_clock,
            store,
            tick_sender,
            system_event_sender,
            stopwatch_event_sender,
            countdown_event_sender,
            alarm_event_sender,
            alert_event_sender,
            stopwatch: Arc::new(RwLock::new(Stopwatch::new())),
            countdown: Arc::new(RwLock::new(Countdown::new())),
            scheduler: Arc::new(RwLock::new(scheduler)),
            samplers: Arc::new(RwLock::new(samplers)),
            background: Arc::new(RwLock::new(background)),
        }
    }

    /// Runs the engine's main loop until Ctrl+C is received.
    ///
    /// This method will:
    /// 1. Spawn the `SystemClock` task.
    /// 2. Spawn the dispatcher task that turns ticks into component samples.
    /// 3. Wait for a Ctrl+C signal to initiate a graceful shutdown.
    pub async fn run(&self) -> anyhow::Result<()> {
        let shutdown_tx = self.spawn_tasks();
        info!(
            "Engine running at {:?}. Press Ctrl+C to shut down.",
            self.config.resolution
        );
        tokio::signal::ctrl_c().await?;
        self.shutdown(shutdown_tx).await;
        Ok(())
    }

    /// Runs the engine until `signal` completes.
    pub async fn run_until(&self, signal: impl Future<Output = ()>) {
        let shutdown_tx = self.spawn_tasks();
        info!("Engine running at {:?}.", self.config.resolution);
        signal.await;
        self.shutdown(shutdown_tx).await;
    }

    fn spawn_tasks(&self) -> broadcast::Sender<()> {
        info!("TimekeeperEngine starting up...");
        let (shutdown_tx, _) = broadcast::channel(1);

        let clock = SystemClock::new(self.config.resolution.clone(), self.tick_sender.clone());
        let clock_shutdown_rx = shutdown_tx.subscribe();
        tokio::spawn(async move { clock.run(clock_shutdown_rx).await });

        let dispatcher = self.clone();
        let tick_rx = self.tick_sender.subscribe();
        let dispatcher_shutdown_rx = shutdown_tx.subscribe();
        tokio::spawn(async move {
            dispatcher
                .dispatcher_loop(tick_rx, dispatcher_shutdown_rx)
                .await
        });
        shutdown_tx
    }

    async fn shutdown(&self, shutdown_tx: broadcast::Sender<()>) {
        info!("Shutdown signal received. Broadcasting to all tasks...");
        if shutdown_tx.send(()).is_err() {
            error!("Failed to send shutdown signal. Some tasks may not terminate gracefully.");
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
        self.system_event_sender
            .send(SystemEvent::EngineShutdown)
            .ok();
        info!("TimekeeperEngine has shut down.");
    }

    #[doc(hidden)]
    async fn dispatcher_loop(
        self,
        mut tick_rx: broadcast::Receiver<Arc<TickEvent>>,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) {
        self.system_event_sender
            .send(SystemEvent::EngineStarted {
                timestamp: Instant::now(),
            })
            .ok();
        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.recv() => break,
                tick = tick_rx.recv() => match tick {
                    Ok(tick) => {
                        trace!("Tick #{} received.", tick.tick_count);
                        self.dispatch_tick(tick.timestamp).await;
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("Dispatcher lagged behind the clock by {} ticks.", skipped);
                    }
                    Err(RecvError::Closed) => break,
                },
            }
        }
    }

    /// Runs every sampler whose interval has elapsed at `now`.
    ///
    /// The dispatcher calls this once per clock tick.
    pub async fn dispatch_tick(&self, now: Instant) {
        let due = self.samplers.write().await.due(now);
        for kind in due {
            match kind {
                SamplerKind::Stopwatch => self.sample_stopwatch(now).await,
                SamplerKind::Countdown => self.sample_countdown(now).await,
                SamplerKind::AlarmPoll => self.poll_alarms().await,
            }
        }
    }

    async fn sample_stopwatch(&self, now: Instant) {
        let elapsed = self.stopwatch.write().await.sample(now);
        self.stopwatch_event_sender
            .send(StopwatchEvent::Elapsed { elapsed })
            .ok();
    }

    async fn sample_countdown(&self, now: Instant) {
        let (tick, total, progress) = {
            let mut countdown = self.countdown.write().await;
            let tick = countdown.tick(now);
            (tick, countdown.total(), countdown.progress())
        };
        match tick {
            Some(CountdownTick::Remaining(remaining)) => {
                self.countdown_event_sender
                    .send(CountdownEvent::Remaining {
                        remaining,
                        progress,
                    })
                    .ok();
            }
            Some(CountdownTick::Expired) => {
                info!("Countdown of {:?} expired.", total);
                self.stop_sampler(SamplerKind::Countdown).await;
                self.countdown_event_sender
                    .send(CountdownEvent::Expired { total })
                    .ok();
                self.haptic(COUNTDOWN_EXPIRED_PULSE);
                self.sound(self.config.alerts.countdown_sound.clone());
            }
            None => {}
        }
    }

    async fn poll_alarms(&self) {
        let now = self.wall_clock.now();
        let event = self.scheduler.write().await.poll(now);
        if let Some(event) = event {
            self.publish_alarm_event(event).await;
        }
    }

    async fn publish_alarm_event(&self, event: AlarmEvent) {
        match &event {
            AlarmEvent::Ringing { alarm } => {
                self.haptic(ALARM_RING_PULSE);
                self.sound(alarm.sound.clone());
            }
            AlarmEvent::Dismissed {
                deactivated: true, ..
            } => self.persist_alarms().await,
            _ => {}
        }
        self.alarm_event_sender.send(event).ok();
    }

    async fn persist_alarms(&self) {
        let alarms = self.scheduler.read().await.alarms().to_vec();
        if let Err(err) = self.store.save_alarms(&alarms).await {
            error!("Failed to persist alarms: {err}");
            self.system_event_sender
                .send(SystemEvent::PersistenceFailed {
                    key: ALARMS_KEY,
                    reason: err.to_string(),
                })
                .ok();
        }
    }

    async fn start_sampler(&self, kind: SamplerKind, interval: Duration, now: Instant) {
        if self.samplers.write().await.start(kind, interval, now).is_some() {
            debug!("{:?} sampler started every {:?}.", kind, interval);
            self.system_event_sender
                .send(SystemEvent::SamplerStarted { kind })
                .ok();
        }
    }

    async fn stop_sampler(&self, kind: SamplerKind) {
        if self.samplers.write().await.stop(kind) {
            debug!("{:?} sampler stopped.", kind);
            self.system_event_sender
                .send(SystemEvent::SamplerStopped { kind })
                .ok();
        }
    }

    fn haptic(&self, pattern: &'static [u64]) {
        if self.config.alerts.haptics {
            self.alert_event_sender
                .send(AlertEvent::Haptic { pattern })
                .ok();
        }
    }

    fn sound(&self, name: String) {
        self.alert_event_sender
            .send(AlertEvent::Sound { name })
            .ok();
    }
}

// Stopwatch API.
impl TimekeeperEngine {
    /// Starts or resumes the stopwatch. Returns `false` if it was running.
    pub async fn start_stopwatch(&self) -> bool {
        let now = Instant::now();
        let (started, elapsed) = {
            let mut stopwatch = self.stopwatch.write().await;
            (stopwatch.start(now), stopwatch.elapsed())
        };
        if started {
            self.start_sampler(SamplerKind::Stopwatch, self.config.cadence.stopwatch(), now)
                .await;
            self.stopwatch_event_sender
                .send(StopwatchEvent::Started { elapsed })
                .ok();
            self.haptic(STOPWATCH_START_PULSE);
        }
        started
    }

    /// Pauses the stopwatch. Returns `false` if it was not running.
    pub async fn pause_stopwatch(&self) -> bool {
        let (paused, elapsed) = {
            let mut stopwatch = self.stopwatch.write().await;
            (stopwatch.pause(Instant::now()), stopwatch.elapsed())
        };
        if paused {
            self.stop_sampler(SamplerKind::Stopwatch).await;
            self.stopwatch_event_sender
                .send(StopwatchEvent::Paused { elapsed })
                .ok();
        }
        paused
    }

    pub async fn reset_stopwatch(&self) {
        self.stopwatch.write().await.reset();
        self.stop_sampler(SamplerKind::Stopwatch).await;
        self.stopwatch_event_sender.send(StopwatchEvent::Reset).ok();
    }

    /// Records a lap. `None` while the stopwatch is stopped at zero.
    pub async fn record_lap(&self) -> Option<Lap> {
        let lap = self.stopwatch.write().await.record_lap(Instant::now())?;
        debug!("Lap #{} recorded at {:?}.", lap.sequence, lap.cumulative);
        self.stopwatch_event_sender
            .send(StopwatchEvent::LapRecorded { lap })
            .ok();
        self.haptic(LAP_PULSE);
        Some(lap)
    }

    pub async fn stopwatch_snapshot(&self) -> StopwatchSnapshot {
        let mut stopwatch = self.stopwatch.write().await;
        let elapsed = stopwatch.sample(Instant::now());
        StopwatchSnapshot {
            running: stopwatch.is_running(),
            elapsed,
            laps: stopwatch.laps().copied().collect(),
        }
    }
}

// Countdown API.
impl TimekeeperEngine {
    /// Sets the countdown duration. Non-positive totals, and any call outside
    /// the setting phase, are ignored and return `false`.
    pub async fn configure_timer(&self, hours: u64, minutes: u64, seconds: u64) -> bool {
        let (accepted, duration) = {
            let mut countdown = self.countdown.write().await;
            (countdown.configure(hours, minutes, seconds), countdown.configured())
        };
        if accepted {
            self.countdown_event_sender
                .send(CountdownEvent::Configured { duration })
                .ok();
        } else {
            debug!("Ignored countdown configuration {hours}h {minutes}m {seconds}s.");
        }
        accepted
    }

    /// Starts a configured countdown or resumes a paused one.
    pub async fn start_timer(&self) -> bool {
        let now = Instant::now();
        let (started, remaining, total) = {
            let mut countdown = self.countdown.write().await;
            (countdown.start(now), countdown.remaining(), countdown.total())
        };
        if started {
            self.start_sampler(SamplerKind::Countdown, self.config.cadence.countdown(), now)
                .await;
            self.countdown_event_sender
                .send(CountdownEvent::Started { remaining, total })
                .ok();
        }
        started
    }

    pub async fn pause_timer(&self) -> bool {
        let (paused, remaining) = {
            let mut countdown = self.countdown.write().await;
            (countdown.pause(), countdown.remaining())
        };
        if paused {
            self.stop_sampler(SamplerKind::Countdown).await;
            self.countdown_event_sender
                .send(CountdownEvent::Paused { remaining })
                .ok();
        }
        paused
    }

    pub async fn reset_timer(&self) {
        self.countdown.write().await.reset();
        self.stop_sampler(SamplerKind::Countdown).await;
        self.countdown_event_sender.send(CountdownEvent::Reset).ok();
    }

    pub async fn timer_snapshot(&self) -> CountdownSnapshot {
        let countdown = self.countdown.read().await;
        CountdownSnapshot {
            phase: countdown.phase(),
            configured: countdown.configured(),
            total: countdown.total(),
            remaining: countdown.remaining(),
            progress: countdown.progress(),
            minutes_left: countdown.minutes_left(),
        }
    }
}

// Alarm API. Every mutation rewrites the stored alarm list.
impl TimekeeperEngine {
    pub async fn add_alarm(&self, draft: AlarmDraft) -> Result<Alarm, AlarmError> {
        let alarm = self.scheduler.write().await.add(draft)?;
        info!("Alarm {} set for {}.", alarm.id, alarm.time);
        self.persist_alarms().await;
        self.publish_alarm_event(AlarmEvent::Added {
            alarm: alarm.clone(),
        })
        .await;
        Ok(alarm)
    }

    pub async fn update_alarm(&self, id: &AlarmId, draft: AlarmDraft) -> Result<Alarm, AlarmError> {
        let alarm = self.scheduler.write().await.update(id, draft)?;
        self.persist_alarms().await;
        self.publish_alarm_event(AlarmEvent::Updated {
            alarm: alarm.clone(),
        })
        .await;
        Ok(alarm)
    }

    pub async fn remove_alarm(&self, id: &AlarmId) -> Result<Alarm, AlarmError> {
        let alarm = self.scheduler.write().await.remove(id)?;
        self.persist_alarms().await;
        self.publish_alarm_event(AlarmEvent::Removed { id: id.clone() })
            .await;
        Ok(alarm)
    }

    pub async fn set_alarm_active(&self, id: &AlarmId, active: bool) -> Result<(), AlarmError> {
        self.scheduler.write().await.set_active(id, active)?;
        self.persist_alarms().await;
        self.publish_alarm_event(AlarmEvent::ActiveChanged {
            id: id.clone(),
            active,
        })
        .await;
        Ok(())
    }

    /// Dismisses the ringing alarm. Returns `false` if nothing was ringing.
    pub async fn dismiss_alarm(&self) -> bool {
        let event = self.scheduler.write().await.dismiss();
        match event {
            Some(event) => {
                self.publish_alarm_event(event).await;
                true
            }
            None => false,
        }
    }

    /// Snoozes the ringing alarm. Returns `false` if nothing was ringing.
    pub async fn snooze_alarm(&self) -> bool {
        let now = self.wall_clock.now();
        let event = self.scheduler.write().await.snooze(now);
        match event {
            Some(event) => {
                self.publish_alarm_event(event).await;
                true
            }
            None => false,
        }
    }

    pub async fn alarms(&self) -> Vec<Alarm> {
        self.scheduler.read().await.alarms().to_vec()
    }

    pub async fn ringing_alarm(&self) -> Option<Alarm> {
        self.scheduler.read().await.ringing().cloned()
    }

    pub async fn snoozed_until(&self, id: &AlarmId) -> Option<NaiveDateTime> {
        self.scheduler.read().await.snoozed_until(id)
    }

    /// The current local wall-clock time, as alarms see it.
    pub fn wall_time(&self) -> NaiveDateTime {
        self.wall_clock.now()
    }
}

// Public API implementation block.
impl TimekeeperEngine {
    pub fn config(&self) -> &TimekeeperConfig {
        &self.config
    }

    /// Whether a sampler of `kind` is currently registered.
    pub async fn is_sampling(&self, kind: SamplerKind) -> bool {
        self.samplers.read().await.is_running(kind)
    }

    /// The saved background image as a data URL.
    pub async fn background(&self) -> Option<String> {
        self.background.read().await.clone()
    }

    /// Replaces or clears the background image and persists the change.
    pub async fn set_background(&self, data_url: Option<String>) {
        *self.background.write().await = data_url.clone();
        if let Err(err) = self.store.save_background(data_url.as_deref()).await {
            error!("Failed to persist background: {err}");
            self.system_event_sender
                .send(SystemEvent::PersistenceFailed {
                    key: BACKGROUND_KEY,
                    reason: err.to_string(),
                })
                .ok();
        }
    }

    /// Subscribes to the raw `TickEvent` stream.
    pub fn subscribe_tick_events(&self) -> broadcast::Receiver<Arc<TickEvent>> {
        self.tick_sender.subscribe()
    }

    /// Subscribes to the `SystemEvent` stream.
    pub fn subscribe_system_events(&self) -> broadcast::Receiver<SystemEvent> {
        self.system_event_sender.subscribe()
    }

    /// Subscribes to the `StopwatchEvent` stream.
    pub fn subscribe_stopwatch_events(&self) -> broadcast::Receiver<StopwatchEvent> {
        self.stopwatch_event_sender.subscribe()
    }

    /// Subscribes to the `CountdownEvent` stream.
    pub fn subscribe_countdown_events(&self) -> broadcast::Receiver<CountdownEvent> {
        self.countdown_event_sender.subscribe()
    }

    /// Subscribes to the `AlarmEvent` stream.
    pub fn subscribe_alarm_events(&self) -> broadcast::Receiver<AlarmEvent> {
        self.alarm_event_sender.subscribe()
    }

    /// Subscribes to the `AlertEvent` stream.
    pub fn subscribe_alert_events(&self) -> broadcast::Receiver<AlertEvent> {
        self.alert_event_sender.subscribe()
    }
}
