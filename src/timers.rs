//! Named stopwatch timers. The table itself lives inside the logger
//! (under its lock); this module holds the entry type, the duration
//! math and the scope guard.

use std::time::Instant;

use crate::logger::Logger;

/// Fixed capacity of the per-logger timer table.
pub const MAX_TIMERS: usize = 5;

/// Timer names are bounded; longer ones are cut (at a char boundary).
pub const TIMER_NAME_MAX: usize = 64;

#[derive(Debug, Clone)]
pub(crate) struct Timer {
    pub name: String,
    /// When the current live interval began. Meaningless while paused.
    pub started: Instant,
    pub accumulated_ns: u64,
    pub running: bool,
}

pub(crate) fn clamp_name(name: &str) -> String {
    if name.len() <= TIMER_NAME_MAX {
        return name.to_string();
    }
    let mut end = TIMER_NAME_MAX;
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    name[..end].to_string()
}

/// Nanoseconds since `since`. `Instant` cannot go backwards; only
/// overflow of the u64 needs clamping.
pub(crate) fn elapsed_ns(since: Instant) -> u64 {
    u64::try_from(since.elapsed().as_nanos()).unwrap_or(u64::MAX)
}

/// `<H>h:<M>m:<S>s:<MS>ms`, the shape of the line a stopped timer
/// reports.
pub fn format_duration(ns: u64) -> String {
    let ms_total = ns / 1_000_000;
    let h = ms_total / (1000 * 60 * 60);
    let rest = ms_total % (1000 * 60 * 60);
    let m = rest / (1000 * 60);
    let rest = rest % (1000 * 60);
    let s = rest / 1000;
    let ms = rest % 1000;
    format!("{h}h:{m}m:{s}s:{ms}ms")
}

/// Stops the named timer when dropped, on every exit path including
/// early returns and propagated errors.
pub struct TimerGuard<'a> {
    logger: &'a Logger,
    name: String,
}

impl<'a> TimerGuard<'a> {
    pub(crate) fn new(logger: &'a Logger, name: String) -> Self {
        TimerGuard { logger, name }
    }
}

impl Drop for TimerGuard<'_> {
    fn drop(&mut self) {
        self.logger.timer_stop(&self.name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_formatting() {
        assert_eq!(format_duration(0), "0h:0m:0s:0ms");
        assert_eq!(format_duration(5_000_000), "0h:0m:0s:5ms");
        assert_eq!(format_duration(2_005_000_000), "0h:0m:2s:5ms");
        assert_eq!(format_duration(61_000_000_000), "0h:1m:1s:0ms");
        assert_eq!(
            format_duration((3600 + 2 * 60 + 3) * 1_000_000_000 + 45_000_000),
            "1h:2m:3s:45ms"
        );
        // sub-millisecond remainders are dropped, not rounded
        assert_eq!(format_duration(999_999), "0h:0m:0s:0ms");
    }

    #[test]
    fn name_at_bound_kept_one_over_cut() {
        let exact = "n".repeat(TIMER_NAME_MAX);
        assert_eq!(clamp_name(&exact), exact);
        let over = "n".repeat(TIMER_NAME_MAX + 1);
        assert_eq!(clamp_name(&over).len(), TIMER_NAME_MAX);
    }
}
