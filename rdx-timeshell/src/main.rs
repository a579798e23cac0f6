use anyhow::Result;
use colored::{ColoredString, Colorize};
use rustyline::highlight::Highlighter;
use rustyline::Editor;
use rustyline_derive::{Completer, Helper, Hinter, Validator};
use std::borrow::Cow;
use std::env;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use timekeeper::prelude::*;
use timekeeper::{ENGINE_NAME, VERSION as LIB_VERSION};
use tracing::info;
use tracing_subscriber::EnvFilter;

const SHELL_VERSION: &str = env!("CARGO_PKG_VERSION");
const WEEKDAYS: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];

/// A custom helper struct for rustyline that enables syntax highlighting.
#[derive(Completer, Helper, Hinter, Validator)]
struct CommandHighlighter;

impl Highlighter for CommandHighlighter {
    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        if let Some((command, rest)) = line.split_once(' ') {
            Cow::Owned(format!("{} {}", command.yellow().bold(), rest.yellow()))
        } else {
            Cow::Owned(line.yellow().bold().to_string())
        }
    }
    fn highlight_char(&self, _line: &str, _pos: usize, _forced: bool) -> bool {
        true
    }
}

fn print_banner() {
    if env::var("QUIET_MODE").is_ok() {
        return;
    }
    println!("{}", "  timeshell :: stopwatch / timer / alarm".cyan().bold());
    println!(
        "          Shell   v{:<8} Library   v{:<8}",
        SHELL_VERSION, LIB_VERSION
    );
    println!("{}", "-".repeat(64).dimmed());
}

/// Colors text for the current theme.
fn accent(text: &str, view: DisplayConfig) -> ColoredString {
    match view.theme {
        Theme::Dark => text.cyan().bold(),
        Theme::Light => text.blue().bold(),
    }
}

fn muted(text: &str, view: DisplayConfig) -> ColoredString {
    match view.theme {
        Theme::Dark => text.dimmed(),
        Theme::Light => text.black(),
    }
}

fn millis(duration: Duration) -> u64 {
    duration.as_millis() as u64
}

fn progress_bar(progress: f64) -> String {
    const WIDTH: usize = 24;
    let filled = ((progress.clamp(0.0, 1.0) * WIDTH as f64).round()) as usize;
    format!("[{}{}]", "#".repeat(filled), ".".repeat(WIDTH - filled))
}

fn describe_days(alarm: &Alarm) -> String {
    if alarm.is_one_shot() {
        return "once".to_string();
    }
    alarm
        .repeat_days
        .iter()
        .filter_map(|day| WEEKDAYS.get(*day as usize).copied())
        .collect::<Vec<_>>()
        .join(",")
}

async fn render(engine: &TimekeeperEngine, view: DisplayConfig) {
    if view.fullscreen {
        print!("\x1B[2J\x1B[H");
    }
    match view.default_tab {
        Tab::Stopwatch => render_stopwatch(engine, view).await,
        Tab::Timer => render_timer(engine, view).await,
        Tab::Alarm => render_alarms(engine, view).await,
    }
}

async fn render_stopwatch(engine: &TimekeeperEngine, view: DisplayConfig) {
    let snapshot = engine.stopwatch_snapshot().await;
    let state = if snapshot.running { "running" } else { "stopped" };
    println!(
        "{}  {}",
        accent(&format_time(millis(snapshot.elapsed), true), view),
        muted(state, view)
    );
    for lap in &snapshot.laps {
        println!(
            "  Lap {:>3}  {:>9}  {}",
            lap.sequence,
            format_split(millis(lap.split)),
            muted(&format_time(millis(lap.cumulative), true), view)
        );
    }
}

async fn render_timer(engine: &TimekeeperEngine, view: DisplayConfig) {
    let snapshot = engine.timer_snapshot().await;
    match snapshot.phase {
        CountdownPhase::Setting => println!(
            "{}  {}",
            accent(&format_time(millis(snapshot.configured), false), view),
            muted("ready (use 'timer set H M S')", view)
        ),
        phase => println!(
            "{}  {}  {}m left  {}",
            accent(&format_time(millis(snapshot.remaining), false), view),
            progress_bar(snapshot.progress),
            snapshot.minutes_left,
            muted(&format!("{phase:?}").to_lowercase(), view)
        ),
    }
}

async fn render_alarms(engine: &TimekeeperEngine, view: DisplayConfig) {
    let now = engine.wall_time();
    println!(
        "{} {}",
        accent(&now.format("%-I:%M %p").to_string(), view),
        muted(&now.format("%S").to_string(), view)
    );
    let alarms = engine.alarms().await;
    if alarms.is_empty() {
        println!("{}", muted("No alarms set", view));
    }
    let ringing = engine.ringing_alarm().await.map(|alarm| alarm.id);
    for (index, alarm) in alarms.iter().enumerate() {
        let state = if ringing.as_ref() == Some(&alarm.id) {
            "RINGING".red().bold()
        } else if alarm.is_active {
            accent("on", view)
        } else {
            muted("off", view)
        };
        let mut line = format!(
            "  #{:<2} [{}] {:>8}  {}  {}  snooze {}m",
            index + 1,
            state,
            alarm.time.to_12h(),
            alarm.label,
            describe_days(alarm),
            alarm.snooze_minutes
        );
        if let Some(until) = engine.snoozed_until(&alarm.id).await {
            line.push_str(&format!("  (snoozed until {})", until.format("%H:%M:%S")));
        }
        println!("{line}");
    }
}

/// Parses `<HH:MM> [label words] [days=1,3,5] [snooze=N] [sound=NAME]`.
fn parse_draft(args: &[&str]) -> Result<AlarmDraft, String> {
    let (time, rest) = args.split_first().ok_or("missing time (HH:MM)")?;
    let time: TimeOfDay = time.parse().map_err(|err: AlarmError| err.to_string())?;
    let mut draft = AlarmDraft::new(time);
    let mut label = Vec::new();
    for arg in rest {
        if let Some(days) = arg.strip_prefix("days=") {
            let days = days
                .split(',')
                .filter(|day| !day.is_empty())
                .map(|day| day.parse::<u8>().map_err(|_| format!("bad weekday '{day}'")))
                .collect::<Result<Vec<_>, _>>()?;
            draft = draft.repeat_on(days);
        } else if let Some(minutes) = arg.strip_prefix("snooze=") {
            let minutes = minutes
                .parse()
                .map_err(|_| format!("bad snooze minutes '{minutes}'"))?;
            draft = draft.snooze_minutes(minutes);
        } else if let Some(sound) = arg.strip_prefix("sound=") {
            draft = draft.sound(sound);
        } else {
            label.push(*arg);
        }
    }
    if !label.is_empty() {
        draft = draft.label(label.join(" "));
    }
    Ok(draft)
}

/// Resolves a `#n` handle from `alarm list` to an alarm id.
async fn resolve_handle(engine: &TimekeeperEngine, handle: Option<&&str>) -> Option<AlarmId> {
    let index = handle?.trim_start_matches('#').parse::<usize>().ok()?;
    engine
        .alarms()
        .await
        .get(index.checked_sub(1)?)
        .map(|alarm| alarm.id.clone())
}

/// Spawns several tasks, each subscribing to a different event stream from the engine.
fn spawn_event_listeners(engine: &TimekeeperEngine, live: Arc<AtomicBool>) {
    let mut alarm_rx = engine.subscribe_alarm_events();
    tokio::spawn(async move {
        while let Ok(event) = alarm_rx.recv().await {
            match event {
                AlarmEvent::Ringing { alarm } => println!(
                    "\n<-- {} {} {}  (type 'dismiss' or 'snooze')\n>> ",
                    "[ALARM]".red().bold(),
                    alarm.time.to_12h(),
                    alarm.label
                ),
                AlarmEvent::Snoozed {
                    until,
                    automatic: true,
                    ..
                } => println!(
                    "\n<-- [ALARM] No answer, snoozed until {}\n>> ",
                    until.format("%H:%M")
                ),
                _ => {}
            }
        }
    });

    let mut countdown_rx = engine.subscribe_countdown_events();
    tokio::spawn(async move {
        while let Ok(event) = countdown_rx.recv().await {
            if let CountdownEvent::Expired { total } = event {
                println!(
                    "\n<-- {} {} is up!\n>> ",
                    "[TIMER]".magenta().bold(),
                    format_time(millis(total), false)
                );
            }
        }
    });

    let mut alert_rx = engine.subscribe_alert_events();
    tokio::spawn(async move {
        while let Ok(event) = alert_rx.recv().await {
            if let AlertEvent::Sound { .. } = event {
                print!("\x07");
            }
        }
    });

    // Live stopwatch readout, controlled by the shared flag.
    let mut stopwatch_rx = engine.subscribe_stopwatch_events();
    tokio::spawn(async move {
        let mut last_second = None;
        while let Ok(event) = stopwatch_rx.recv().await {
            if let StopwatchEvent::Elapsed { elapsed } = event {
                let second = elapsed.as_secs();
                if live.load(Ordering::Relaxed) && last_second != Some(second) {
                    println!("<-- [STOPWATCH] {}", format_time(millis(elapsed), false));
                }
                last_second = Some(second);
            }
        }
    });
}

fn print_help() {
    println!("Available commands:");
    println!("  sw start|pause|reset|lap      - Stopwatch controls.");
    println!("  timer set <H> <M> <S>         - Configure the countdown.");
    println!("  timer start|pause|reset       - Countdown controls.");
    println!("  alarm add <HH:MM> [label] [days=1,3,5] [snooze=N] [sound=NAME]");
    println!("  alarm edit <#> <HH:MM> [...]  - Replace an alarm's settings.");
    println!("  alarm list|on <#>|off <#>|rm <#>");
    println!("  dismiss | snooze              - Resolve the ringing alarm.");
    println!("  tab stopwatch|timer|alarm     - Switch the active view.");
    println!("  theme | fullscreen            - Toggle presentation settings.");
    println!("  bg set <DATA-URL> | bg clear  - Manage the background image.");
    println!("  live on|off                   - Print the running stopwatch every second.");
    println!("  tip                           - Fetch a productivity tip.");
    println!("  status                        - Show the active view.");
    println!("  exit                          - Quits the shell.");
}

#[tokio::main]
async fn main() -> Result<()> {
    print_banner();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_target(false)
        .init();

    let config_path = env::var_os("TIMEKEEPER_CONFIG").map(PathBuf::from);
    let config = TimekeeperConfig::load(config_path.as_deref())?;
    let store = Store::from_dir(config.storage.data_dir.as_deref());
    let tips = Arc::new(TipDeck::from(&config.tips));
    let mut view = config.display;

    let engine = TimekeeperEngine::new(config, store).await;
    let engine_handle = engine.clone();

    let live = Arc::new(AtomicBool::new(false));
    spawn_event_listeners(&engine_handle, live.clone());

    info!("Spawning {} in the background...", ENGINE_NAME);
    tokio::spawn(async move {
        if let Err(e) = engine.run().await {
            eprintln!("\nEngine stopped with an error: {}", e);
        }
    });

    tokio::time::sleep(Duration::from_millis(100)).await;

    let mut rl = Editor::new()?;
    rl.set_helper(Some(CommandHighlighter {}));

    println!(
        "{} is running. Type 'help' for commands or 'exit' to quit.",
        accent(ENGINE_NAME, view)
    );
    render(&engine_handle, view).await;

    loop {
        let prompt = format!("{}", accent(">> ", view));
        let line = match rl.readline(&prompt) {
            Ok(line) => line,
            Err(_) => {
                println!("Exiting timeshell...");
                break;
            }
        };
        rl.add_history_entry(line.as_str())?;
        let args = line.split_whitespace().collect::<Vec<_>>();
        let Some(command) = args.first() else {
            continue;
        };

        match (*command, args.get(1).copied()) {
            ("sw", Some("start")) => {
                if !engine_handle.start_stopwatch().await {
                    println!("Stopwatch is already running.");
                }
            }
            ("sw", Some("pause")) => {
                if !engine_handle.pause_stopwatch().await {
                    println!("Stopwatch is not running.");
                }
            }
            ("sw", Some("reset")) => engine_handle.reset_stopwatch().await,
            ("sw", Some("lap")) => match engine_handle.record_lap().await {
                Some(lap) => println!(
                    "--> Lap {} {}",
                    lap.sequence,
                    format_split(millis(lap.split))
                ),
                None => println!("Start the stopwatch before recording laps."),
            },
            ("sw", _) => render_stopwatch(&engine_handle, view).await,
            ("timer", Some("set")) => {
                let fields = args[2..]
                    .iter()
                    .map(|field| field.parse::<u64>())
                    .collect::<Result<Vec<_>, _>>();
                match fields.as_deref() {
                    Ok([h, m, s]) => {
                        if !engine_handle.configure_timer(*h, *m, *s).await {
                            println!("Duration must be positive and the timer reset.");
                        }
                    }
                    _ => println!("Usage: timer set <H> <M> <S>"),
                }
            }
            ("timer", Some("start")) => {
                if !engine_handle.start_timer().await {
                    println!("Nothing to start. Configure or reset the timer first.");
                }
            }
            ("timer", Some("pause")) => {
                engine_handle.pause_timer().await;
            }
            ("timer", Some("reset")) => engine_handle.reset_timer().await,
            ("timer", _) => render_timer(&engine_handle, view).await,
            ("alarm", Some("add")) => match parse_draft(&args[2..]) {
                Ok(draft) => match engine_handle.add_alarm(draft).await {
                    Ok(alarm) => println!("--> Alarm set for {}.", alarm.time.to_12h()),
                    Err(err) => println!("Error: {err}"),
                },
                Err(err) => println!("Error: {err}"),
            },
            ("alarm", Some("edit")) => {
                match resolve_handle(&engine_handle, args.get(2)).await {
                    Some(id) => match parse_draft(args.get(3..).unwrap_or_default()) {
                        Ok(draft) => match engine_handle.update_alarm(&id, draft).await {
                            Ok(alarm) => println!("--> Alarm now at {}.", alarm.time.to_12h()),
                            Err(err) => println!("Error: {err}"),
                        },
                        Err(err) => println!("Error: {err}"),
                    },
                    None => println!("Error: unknown alarm handle. Use 'alarm list'."),
                }
            }
            ("alarm", Some(action @ ("on" | "off" | "rm"))) => {
                match resolve_handle(&engine_handle, args.get(2)).await {
                    Some(id) => {
                        let result = match action {
                            "rm" => engine_handle.remove_alarm(&id).await.map(|_| ()),
                            other => engine_handle.set_alarm_active(&id, other == "on").await,
                        };
                        match result {
                            Ok(()) => render_alarms(&engine_handle, view).await,
                            Err(err) => println!("Error: {err}"),
                        }
                    }
                    None => println!("Error: unknown alarm handle. Use 'alarm list'."),
                }
            }
            ("alarm", _) => render_alarms(&engine_handle, view).await,
            ("dismiss", _) => {
                if !engine_handle.dismiss_alarm().await {
                    println!("No alarm is ringing.");
                }
            }
            ("snooze", _) => {
                if !engine_handle.snooze_alarm().await {
                    println!("No alarm is ringing.");
                }
            }
            ("tab", Some(name)) => match name.parse::<Tab>() {
                Ok(tab) => {
                    view = view.with_tab(tab);
                    render(&engine_handle, view).await;
                }
                Err(err) => println!("Error: {err}"),
            },
            ("theme", _) => {
                view = view.with_theme_toggled();
                println!("--> Theme is now {:?}.", view.theme);
            }
            ("fullscreen", _) => {
                view = view.with_fullscreen_toggled();
                render(&engine_handle, view).await;
            }
            ("bg", Some("set")) => match args.get(2) {
                Some(data_url) if data_url.starts_with("data:") => {
                    engine_handle.set_background(Some(data_url.to_string())).await;
                    println!("--> Background saved.");
                }
                _ => println!("Usage: bg set <DATA-URL>"),
            },
            ("bg", Some("clear")) => {
                engine_handle.set_background(None).await;
                println!("--> Background cleared.");
            }
            ("bg", _) => match engine_handle.background().await {
                Some(data_url) => println!("Background: {} bytes", data_url.len()),
                None => println!("No background set."),
            },
            ("live", Some(state @ ("on" | "off"))) => {
                live.store(state == "on", Ordering::Relaxed);
            }
            ("tip", _) => {
                println!("{}", muted("Fetching a tip...", view));
                let tips = tips.clone();
                tokio::spawn(async move {
                    let tip = tip_or_fallback(tips.as_ref()).await;
                    println!("\n<-- [TIP] {}: {}\n>> ", tip.title.bold(), tip.tip);
                });
            }
            ("status", _) => render(&engine_handle, view).await,
            ("help", _) => print_help(),
            ("exit", _) => break,
            _ => println!("Unknown command: '{}'. Type 'help'.", line),
        }
    }

    Ok(())
}
