//! Time formatting utilities

use std::time::Duration;

/// Format milliseconds as `HH:MM:SS.mmm`, the form accepted by ffmpeg `-ss` and `-t`
pub fn format_hms_millis(millis: u64) -> String {
    let hours = millis / 3_600_000;
    let minutes = (millis % 3_600_000) / 60_000;
    let seconds = (millis % 60_000) / 1_000;
    let ms = millis % 1_000;

    format!("{:02}:{:02}:{:02}.{:03}", hours, minutes, seconds, ms)
}

/// Format milliseconds as `M:SS.mmm` for human display
pub fn format_minutes_millis(millis: u64) -> String {
    let minutes = millis / 60_000;
    let seconds = (millis % 60_000) / 1_000;
    let ms = millis % 1_000;

    format!("{}:{:02}.{:03}", minutes, seconds, ms)
}

/// Format an elapsed wall-clock time as `H:MM:SS`
pub fn format_elapsed(elapsed: Duration) -> String {
    let total = elapsed.as_secs();
    format!("{}:{:02}:{:02}", total / 3600, (total % 3600) / 60, total % 60)
}

/// Throughput in KiB/s; zero for an empty interval
pub fn throughput_kib(bytes: u64, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs <= 0.0 {
        0.0
    } else {
        bytes as f64 / secs / 1024.0
    }
}
