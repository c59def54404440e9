//! Human-readable durations for list rows and the status bar.

/// Format a duration in milliseconds as `1h02m03s`, `02m03s` or `3.25s`.
pub fn format_millis(ms: u64) -> String {
    let total_secs = ms as f64 / 1000.0;
    let seconds = total_secs % 60.0;
    let minutes = (ms / 1000 / 60) % 60;
    let hours = ms / 1000 / 60 / 60;
    if hours > 0 {
        format!("{hours}h{minutes:02}m{:02.0}s", seconds.floor())
    } else if minutes > 0 {
        format!("{minutes:02}m{:02.0}s", seconds.floor())
    } else {
        format!("{seconds:.2}s")
    }
}
