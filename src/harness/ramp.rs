// Ramp scheduler module
//
// Pure computation module that converts (users, spawn_rate) into a
// staggered activation timeline. Does not spawn anything - the run
// controller uses it to schedule virtual user starts.

use std::time::Duration;

/// Returns the activation offset of each virtual user relative to run
/// start: offset(k) = k / spawn_rate seconds, 0-indexed, FIFO.
///
/// spawn_rate users become active each second in a linear ramp. Offsets
/// past the test deadline are still produced; such users may start with
/// near-zero active time, and the requested user count is never reduced.
/// Deterministic given its inputs.
///
/// `spawn_rate` must be positive and finite; callers validate before
/// scheduling.
pub fn activation_offsets(users: u64, spawn_rate: f64) -> Vec<Duration> {
    (0..users)
        .map(|k| Duration::from_secs_f64(k as f64 / spawn_rate))
        .collect()
}

/// Returns the offset of the last activation, i.e. when the ramp is
/// complete and the run is at full strength.
pub fn ramp_duration(users: u64, spawn_rate: f64) -> Duration {
    if users == 0 {
        return Duration::ZERO;
    }
    Duration::from_secs_f64((users - 1) as f64 / spawn_rate)
}
