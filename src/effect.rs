//! Active effect records: buffs, debuffs, shields, stuns, and
//! damage-over-time, plus the integer stat arithmetic they rely on.
//!
//! An effect exists on a unit only between its application event and its
//! expiration event. `applied_delta` stores the exact integer a buff or
//! debuff added to the stat, so expiration reverts it exactly.

use serde::{Deserialize, Serialize};

use crate::config;

// ─── Stat and value kinds ────────────────────────────────────────────

/// Stats a buff or debuff can touch. `attack_speed` values are in
/// centi-attacks/s like the unit field they modify.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stat {
    Attack,
    Defense,
    AttackSpeed,
    MaxHp,
    MaxMana,
    HpRegen,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    Flat,
    Percentage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectKind {
    Buff,
    Debuff,
    Shield,
    Stun,
    DamageOverTime,
}

/// Presentation tag on damage. Does not change damage arithmetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DamageKind {
    Physical,
    Magical,
    Poison,
    Holy,
    True,
}

// ─── Integer percentage resolution ───────────────────────────────────

/// Resolve a percentage against a base stat to an integer delta, rounding
/// half away from zero. `percent_delta(27, 10) == 3`.
pub fn percent_delta(base: i64, percent: i64) -> i64 {
    let num = base * percent;
    let half = if num >= 0 { 50 } else { -50 };
    (num + half) / 100
}

// ─── Effect ──────────────────────────────────────────────────────────

/// An active modifier on a unit. Timing fields are tick counts on the
/// combat clock.
#[derive(Debug, Clone, PartialEq)]
pub struct Effect {
    pub id: String,
    pub kind: EffectKind,
    /// Stat touched by buff/debuff effects.
    pub stat: Option<Stat>,
    /// Declared value (flat amount or percent).
    pub value: i64,
    pub value_type: ValueKind,
    /// Exact signed integer applied to the stat; reverted on expiration.
    pub applied_delta: i64,
    /// Shield: absorption granted. DoT: damage per tick.
    pub amount: i64,
    pub damage_kind: Option<DamageKind>,
    /// DoT cadence.
    pub interval_ticks: u64,
    pub total_ticks: u32,
    pub ticks_remaining: u32,
    pub next_tick_at: u64,
    /// Expiration tick; `None` means permanent (lives until host death).
    pub expires_at: Option<u64>,
    /// Applying unit id; `None` for synergy-sourced effects.
    pub source: Option<String>,
}

impl Effect {
    pub fn is_dot(&self) -> bool {
        self.kind == EffectKind::DamageOverTime
    }

    /// Wire shape for snapshots. Times convert from ticks to seconds.
    pub fn to_record(&self) -> EffectRecord {
        EffectRecord {
            effect_id: self.id.clone(),
            kind: self.kind,
            stat: self.stat,
            value: self.value,
            value_type: self.value_type,
            applied_delta: self.applied_delta,
            amount: self.amount,
            damage_kind: self.damage_kind,
            interval: if self.is_dot() {
                Some(config::ticks_to_secs(self.interval_ticks))
            } else {
                None
            },
            total_ticks: if self.is_dot() {
                Some(self.total_ticks)
            } else {
                None
            },
            ticks_remaining: if self.is_dot() {
                Some(self.ticks_remaining)
            } else {
                None
            },
            next_tick_at: if self.is_dot() && self.ticks_remaining > 0 {
                Some(config::ticks_to_secs(self.next_tick_at))
            } else {
                None
            },
            expires_at: self.expires_at.map(config::ticks_to_secs),
            source: self.source.clone(),
        }
    }
}

/// The effect as it appears on the wire (snapshots). All times are
/// absolute seconds; consumers store these verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectRecord {
    pub effect_id: String,
    pub kind: EffectKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stat: Option<Stat>,
    pub value: i64,
    pub value_type: ValueKind,
    pub applied_delta: i64,
    pub amount: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub damage_kind: Option<DamageKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interval: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_ticks: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ticks_remaining: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_tick_at: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_delta_rounds_half_away_from_zero() {
        // round(27 * 0.10) = 3
        assert_eq!(percent_delta(27, 10), 3);
        // round(25 * 0.10) = round(2.5) = 3
        assert_eq!(percent_delta(25, 10), 3);
        // round(24 * 0.10) = 2
        assert_eq!(percent_delta(24, 10), 2);
        // negative percents mirror
        assert_eq!(percent_delta(27, -10), -3);
        assert_eq!(percent_delta(25, -10), -3);
    }

    #[test]
    fn percent_delta_zero_cases() {
        assert_eq!(percent_delta(0, 50), 0);
        assert_eq!(percent_delta(100, 0), 0);
    }

    #[test]
    fn dot_record_carries_cadence_fields() {
        let fx = Effect {
            id: "fx-1".into(),
            kind: EffectKind::DamageOverTime,
            stat: None,
            value: 0,
            value_type: ValueKind::Flat,
            applied_delta: 0,
            amount: 5,
            damage_kind: Some(DamageKind::Poison),
            interval_ticks: 10,
            total_ticks: 4,
            ticks_remaining: 3,
            next_tick_at: 15,
            expires_at: None,
            source: Some("b-front-0".into()),
        };
        let rec = fx.to_record();
        assert_eq!(rec.interval, Some(1.0));
        assert_eq!(rec.total_ticks, Some(4));
        assert_eq!(rec.ticks_remaining, Some(3));
        assert_eq!(rec.next_tick_at, Some(1.5));
        assert_eq!(rec.expires_at, None);
    }

    #[test]
    fn buff_record_skips_dot_fields() {
        let fx = Effect {
            id: "fx-2".into(),
            kind: EffectKind::Buff,
            stat: Some(Stat::Attack),
            value: 20,
            value_type: ValueKind::Flat,
            applied_delta: 20,
            amount: 0,
            damage_kind: None,
            interval_ticks: 0,
            total_ticks: 0,
            ticks_remaining: 0,
            next_tick_at: 0,
            expires_at: Some(30),
            source: None,
        };
        let rec = fx.to_record();
        assert_eq!(rec.interval, None);
        assert_eq!(rec.next_tick_at, None);
        assert_eq!(rec.expires_at, Some(3.0));
        assert_eq!(rec.applied_delta, 20);
    }
}
