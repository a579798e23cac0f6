//! Text rendering for durations.

/// Renders a millisecond duration as `MM:SS.cc`, or `HH:MM:SS.cc` once an hour
/// has elapsed.
///
/// Every field is truncated, never rounded, and zero-padded to two digits. The
/// `.cc` centisecond suffix is only appended when `include_subsecond` is set.
///
/// ```
/// use timekeeper::format::format_time;
///
/// assert_eq!(format_time(0, true), "00:00.00");
/// assert_eq!(format_time(3_661_000, true), "01:01:01.00");
/// assert_eq!(format_time(500, false), "00:00");
/// ```
pub fn format_time(ms: u64, include_subsecond: bool) -> String {
    let hours = ms / 3_600_000;
    let minutes = (ms % 3_600_000) / 60_000;
    let seconds = (ms % 60_000) / 1_000;
    let centis = (ms % 1_000) / 10;

    let mut out = if hours > 0 {
        format!("{hours:02}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes:02}:{seconds:02}")
    };
    if include_subsecond {
        out.push_str(&format!(".{centis:02}"));
    }
    out
}

/// Renders a lap split as seconds with two decimals, e.g. `+1.50s`.
pub fn format_split(ms: u64) -> String {
    format!("+{}.{:02}s", ms / 1_000, (ms % 1_000) / 10)
}
