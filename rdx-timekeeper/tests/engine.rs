use chrono::{NaiveDate, NaiveDateTime};
use std::sync::Arc;
use std::time::Duration;
use timekeeper::events::{COUNTDOWN_EXPIRED_PULSE, STOPWATCH_START_PULSE};
use timekeeper::prelude::*;
use timekeeper::storage::ALARMS_KEY;
use timekeeper::time::{ManualWallClock, WallClock};
use tokio::sync::broadcast;
use tokio::time::{advance, Instant};

fn monday(hour: u32, minute: u32, second: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2026, 3, 2)
        .unwrap()
        .and_hms_opt(hour, minute, second)
        .unwrap()
}

async fn engine_at(start: NaiveDateTime, store: Store) -> (TimekeeperEngine, ManualWallClock) {
    let clock = ManualWallClock::new(start);
    let engine =
        TimekeeperEngine::with_wall_clock(TimekeeperConfig::default(), store, Arc::new(clock.clone()))
            .await;
    (engine, clock)
}

/// Moves both clocks forward one second and runs a dispatcher pass.
async fn step_second(engine: &TimekeeperEngine, clock: &ManualWallClock) {
    advance(Duration::from_secs(1)).await;
    clock.advance(Duration::from_secs(1));
    engine.dispatch_tick(Instant::now()).await;
}

fn drain<T: Clone>(rx: &mut broadcast::Receiver<T>) -> Vec<T> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

#[tokio::test(start_paused = true)]
async fn stopwatch_accumulates_only_while_running() {
    let (engine, _) = engine_at(monday(9, 0, 0), Store::in_memory()).await;
    let mut alerts = engine.subscribe_alert_events();

    assert!(engine.record_lap().await.is_none());
    assert!(engine.start_stopwatch().await);
    assert!(!engine.start_stopwatch().await);
    assert!(engine.is_sampling(SamplerKind::Stopwatch).await);

    advance(Duration::from_millis(1_500)).await;
    let lap = engine.record_lap().await.unwrap();
    assert_eq!(lap.sequence, 1);
    assert_eq!(lap.split, Duration::from_millis(1_500));

    assert!(engine.pause_stopwatch().await);
    assert!(!engine.is_sampling(SamplerKind::Stopwatch).await);
    advance(Duration::from_secs(10)).await;

    engine.start_stopwatch().await;
    advance(Duration::from_millis(500)).await;
    let snapshot = engine.stopwatch_snapshot().await;
    assert!(snapshot.running);
    assert_eq!(snapshot.elapsed, Duration::from_secs(2));
    assert_eq!(snapshot.laps, vec![lap]);

    engine.reset_stopwatch().await;
    let snapshot = engine.stopwatch_snapshot().await;
    assert!(!snapshot.running);
    assert_eq!(snapshot.elapsed, Duration::ZERO);
    assert!(snapshot.laps.is_empty());

    let alerts = drain(&mut alerts);
    assert_eq!(
        alerts.first(),
        Some(&AlertEvent::Haptic {
            pattern: STOPWATCH_START_PULSE
        })
    );
}

#[tokio::test(start_paused = true)]
async fn stopwatch_sampler_republishes_elapsed_time() {
    let (engine, _) = engine_at(monday(9, 0, 0), Store::in_memory()).await;
    let mut events = engine.subscribe_stopwatch_events();
    engine.start_stopwatch().await;
    for _ in 0..5 {
        advance(Duration::from_millis(10)).await;
        engine.dispatch_tick(Instant::now()).await;
    }
    let published: Vec<Duration> = drain(&mut events)
        .into_iter()
        .filter_map(|event| match event {
            StopwatchEvent::Elapsed { elapsed } => Some(elapsed),
            _ => None,
        })
        .collect();
    assert_eq!(published.len(), 5);
    assert_eq!(published.last(), Some(&Duration::from_millis(50)));
}

#[tokio::test(start_paused = true)]
async fn countdown_expires_exactly_once_and_alerts() {
    let (engine, _) = engine_at(monday(9, 0, 0), Store::in_memory()).await;
    let mut events = engine.subscribe_countdown_events();
    let mut alerts = engine.subscribe_alert_events();

    assert!(!engine.configure_timer(0, 0, 0).await);
    assert!(!engine.start_timer().await);
    assert!(engine.configure_timer(0, 0, 1).await);
    assert!(engine.start_timer().await);

    for _ in 0..20 {
        advance(Duration::from_millis(100)).await;
        engine.dispatch_tick(Instant::now()).await;
    }

    let events = drain(&mut events);
    let expirations = events
        .iter()
        .filter(|event| matches!(event, CountdownEvent::Expired { .. }))
        .count();
    assert_eq!(expirations, 1);
    assert!(!engine.is_sampling(SamplerKind::Countdown).await);

    let snapshot = engine.timer_snapshot().await;
    assert_eq!(snapshot.phase, CountdownPhase::Expired);
    assert_eq!(snapshot.remaining, Duration::ZERO);
    assert_eq!(snapshot.progress, 0.0);

    let alerts = drain(&mut alerts);
    assert!(alerts.contains(&AlertEvent::Haptic {
        pattern: COUNTDOWN_EXPIRED_PULSE
    }));
    assert!(alerts.contains(&AlertEvent::Sound {
        name: "chime".to_string()
    }));

    engine.reset_timer().await;
    assert_eq!(engine.timer_snapshot().await.phase, CountdownPhase::Setting);
}

#[tokio::test(start_paused = true)]
async fn paused_countdown_does_not_advance() {
    let (engine, _) = engine_at(monday(9, 0, 0), Store::in_memory()).await;
    engine.configure_timer(0, 1, 0).await;
    engine.start_timer().await;
    advance(Duration::from_secs(20)).await;
    engine.dispatch_tick(Instant::now()).await;
    assert!(engine.pause_timer().await);

    advance(Duration::from_secs(120)).await;
    engine.dispatch_tick(Instant::now()).await;
    let snapshot = engine.timer_snapshot().await;
    assert_eq!(snapshot.phase, CountdownPhase::Paused);
    assert_eq!(snapshot.remaining, Duration::from_secs(40));

    assert!(engine.start_timer().await);
    advance(Duration::from_secs(10)).await;
    engine.dispatch_tick(Instant::now()).await;
    assert_eq!(engine.timer_snapshot().await.remaining, Duration::from_secs(30));
}

#[tokio::test(start_paused = true)]
async fn alarm_rings_and_one_shot_is_disarmed_after_dismiss() {
    let store = Store::in_memory();
    let (engine, clock) = engine_at(monday(6, 59, 58), store.clone()).await;
    let mut alarm_events = engine.subscribe_alarm_events();

    let alarm = engine
        .add_alarm(AlarmDraft::new("07:00".parse().unwrap()).label("Wake"))
        .await
        .unwrap();
    assert_eq!(store.load_alarms().await, vec![alarm.clone()]);

    step_second(&engine, &clock).await;
    assert!(engine.ringing_alarm().await.is_none());
    step_second(&engine, &clock).await;
    assert_eq!(engine.ringing_alarm().await.map(|a| a.id), Some(alarm.id.clone()));

    assert!(engine.dismiss_alarm().await);
    assert!(!engine.dismiss_alarm().await);
    let stored = store.load_alarms().await;
    assert!(!stored[0].is_active);

    let events = drain(&mut alarm_events);
    assert!(matches!(events[0], AlarmEvent::Added { .. }));
    assert!(matches!(events[1], AlarmEvent::Ringing { .. }));
    assert!(matches!(
        events[2],
        AlarmEvent::Dismissed {
            deactivated: true,
            ..
        }
    ));

    // Same time next day: still disarmed.
    clock.set(monday(6, 59, 59) + chrono::Duration::days(1));
    step_second(&engine, &clock).await;
    assert!(engine.ringing_alarm().await.is_none());
}

#[tokio::test(start_paused = true)]
async fn unanswered_alarm_is_snoozed_and_rings_again() {
    let (engine, clock) = engine_at(monday(7, 29, 59), Store::in_memory()).await;
    let alarm = engine
        .add_alarm(
            AlarmDraft::new("07:30".parse().unwrap())
                .repeat_on([1])
                .snooze_minutes(2),
        )
        .await
        .unwrap();

    step_second(&engine, &clock).await;
    assert!(engine.ringing_alarm().await.is_some());

    for _ in 0..60 {
        step_second(&engine, &clock).await;
    }
    assert!(engine.ringing_alarm().await.is_none());
    assert_eq!(
        engine.snoozed_until(&alarm.id).await,
        Some(monday(7, 33, 0))
    );

    while clock.now() < monday(7, 33, 0) {
        step_second(&engine, &clock).await;
    }
    assert!(engine.ringing_alarm().await.is_some());
    assert!(engine.snooze_alarm().await);
    assert_eq!(
        engine.snoozed_until(&alarm.id).await,
        Some(monday(7, 35, 0))
    );

    engine.set_alarm_active(&alarm.id, false).await.unwrap();
    assert_eq!(engine.snoozed_until(&alarm.id).await, None);
}

#[tokio::test(start_paused = true)]
async fn every_alarm_rings_at_a_thirty_tick_resolution() {
    let (engine, clock) = engine_at(monday(6, 59, 50), Store::in_memory()).await;
    for minute in 0..10 {
        engine
            .add_alarm(AlarmDraft::new(TimeOfDay::new(7, minute).unwrap()))
            .await
            .unwrap();
    }

    let tick = ClockResolution::Medium.period();
    let mut rings = 0;
    while clock.now() < monday(7, 10, 0) {
        advance(tick).await;
        clock.advance(tick);
        engine.dispatch_tick(Instant::now()).await;
        if engine.ringing_alarm().await.is_some() {
            rings += 1;
            assert!(engine.dismiss_alarm().await);
        }
    }
    assert_eq!(rings, 10);
}

#[tokio::test(start_paused = true)]
async fn alarms_survive_a_restart_and_bad_data_is_ignored() {
    let store = Store::in_memory();
    {
        let (engine, _) = engine_at(monday(9, 0, 0), store.clone()).await;
        let alarm = engine
            .add_alarm(AlarmDraft::new("08:00".parse().unwrap()))
            .await
            .unwrap();
        engine
            .update_alarm(&alarm.id, AlarmDraft::new("08:15".parse().unwrap()).label("Late"))
            .await
            .unwrap();
        engine
            .add_alarm(AlarmDraft::new("09:00".parse().unwrap()))
            .await
            .unwrap();
        engine.remove_alarm(&alarm.id).await.unwrap();
        assert!(engine.remove_alarm(&alarm.id).await.is_err());
        engine
            .set_background(Some("data:image/png;base64,AAAA".to_string()))
            .await;
    }

    let (engine, _) = engine_at(monday(9, 0, 0), store.clone()).await;
    let alarms = engine.alarms().await;
    assert_eq!(alarms.len(), 1);
    assert_eq!(alarms[0].time.to_string(), "09:00");
    assert_eq!(
        engine.background().await.as_deref(),
        Some("data:image/png;base64,AAAA")
    );

    store.write(ALARMS_KEY, "[{\"broken\"").await.unwrap();
    let (engine, _) = engine_at(monday(9, 0, 0), store).await;
    assert!(engine.alarms().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn running_engine_drives_samplers_until_shutdown() {
    let (engine, _) = engine_at(monday(9, 0, 0), Store::in_memory()).await;
    let mut stopwatch_events = engine.subscribe_stopwatch_events();
    let mut system_events = engine.subscribe_system_events();
    engine.start_stopwatch().await;

    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
    let runner = engine.clone();
    let handle = tokio::spawn(async move {
        runner
            .run_until(async {
                stop_rx.await.ok();
            })
            .await
    });

    loop {
        match stopwatch_events.recv().await.unwrap() {
            StopwatchEvent::Elapsed { elapsed } if elapsed >= Duration::from_millis(50) => break,
            _ => {}
        }
    }
    stop_tx.send(()).unwrap();
    handle.await.unwrap();

    let events = drain(&mut system_events);
    assert!(events
        .iter()
        .any(|event| matches!(event, SystemEvent::EngineStarted { .. })));
    assert!(matches!(events.last(), Some(SystemEvent::EngineShutdown)));
}
