#![allow(dead_code)]
/// All engine constants. Time is counted in integer ticks; one tick is
/// 100 ms of simulation time regardless of how fast the host steps the loop.

pub const TICKS_PER_SECOND: u64 = 10;
pub const TICK_SECONDS: f64 = 0.1;
/// Wall-clock tick length for realtime-paced replay (1000 / TICKS_PER_SECOND).
pub const TICK_INTERVAL_MS: u64 = 100;

/// Snapshot cadence: one full-state snapshot per simulated second.
pub const SNAPSHOT_INTERVAL_TICKS: u64 = TICKS_PER_SECOND;

/// Hard combat timeout (120 simulated seconds).
pub const TIMEOUT_TICKS: u64 = 120 * TICKS_PER_SECOND;

/// Basic attacks always deal at least this much damage, regardless of defense.
pub const MIN_ATTACK_DAMAGE: i64 = 1;

/// Attack speed is stored in centi-attacks-per-second (100 = 1.0 attacks/s).
pub const ATTACK_SPEED_SCALE: i64 = 100;

/// Attack speed can never be debuffed below this floor.
pub const MIN_ATTACK_SPEED: i64 = 1;

/// Skill validation limits.
pub const MAX_SKILL_DEPTH: usize = 8;
pub const MAX_REPEAT_COUNT: u32 = 10;

/// Flat player damage added to the winning side's surviving star-sum.
pub const BASE_LOSER_HP_DAMAGE: i64 = 2;

/// Convert a tick count to the wire timestamp in seconds.
pub fn ticks_to_secs(ticks: u64) -> f64 {
    ticks as f64 / TICKS_PER_SECOND as f64
}

/// Convert a duration in seconds (from skill/synergy data) to ticks, rounded.
pub fn secs_to_ticks(secs: f64) -> u64 {
    (secs * TICKS_PER_SECOND as f64).round() as u64
}

/// Ticks between attacks for a given attack speed in centi-attacks/s.
/// `1 / speed` seconds, rounded to the nearest tick, never zero.
pub fn attack_interval_ticks(speed_centi: i64) -> u64 {
    let speed = speed_centi.max(MIN_ATTACK_SPEED);
    let ticks = (TICKS_PER_SECOND as i64 * ATTACK_SPEED_SCALE + speed / 2) / speed;
    ticks.max(1) as u64
}
