//! Time utilities for the room simulation

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Wall-clock milliseconds, the time base every room timer is keyed on
pub type Millis = u64;

/// Get current Unix timestamp in milliseconds
pub fn unix_millis() -> Millis {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_millis() as u64
}

/// Server start time for uptime tracking
static SERVER_START: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();

/// Initialize server start time (call once at startup)
pub fn init_server_time() {
    SERVER_START.get_or_init(Instant::now);
}

/// Get server uptime in seconds
pub fn uptime_secs() -> u64 {
    SERVER_START
        .get()
        .map(|start| start.elapsed().as_secs())
        .unwrap_or(0)
}

/// Default broadcast/simulation rate
pub const DEFAULT_TICK_RATE: u32 = 60;

/// Interval between scheduler ticks for a given rate in Hz
pub fn tick_interval(tick_rate: u32) -> Duration {
    Duration::from_micros(1_000_000 / tick_rate.max(1) as u64)
}

/// Elapsed seconds between two wall-clock readings.
/// A clock that stepped backwards yields zero rather than a negative step.
pub fn delta_seconds(last: Millis, now: Millis) -> f32 {
    now.saturating_sub(last) as f32 / 1000.0
}
