//! Wire payloads, one struct per event type.
//!
//! Every payload carries the *post-mutation* authoritative values — never
//! deltas alone. A consumer that cannot find an authoritative field it
//! needs is looking at a protocol bug, not something to compute around.

use serde::{Deserialize, Serialize};

use crate::effect::{DamageKind, EffectKind, EffectRecord, Stat, ValueKind};
use crate::unit::{Row, Side};

// ─── Shared enums ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DamageCause {
    Attack,
    Skill,
    Dot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ManaReason {
    Attack,
    OnHit,
    SkillCast,
    Regen,
    SkillEffect,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Winner {
    TeamA,
    TeamB,
    Draw,
}

// ─── Initialization ──────────────────────────────────────────────────

/// One roster entry as it entered combat. Base stats only; current state
/// lives in snapshots and mutation events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitInitRecord {
    pub unit_id: String,
    pub name: String,
    pub side: Side,
    pub row: Row,
    pub index: usize,
    pub max_hp: i64,
    pub attack: i64,
    pub defense: i64,
    pub attack_speed: i64,
    pub max_mana: i64,
    pub mana_on_attack: i64,
    pub mana_on_hit: i64,
    pub star_level: u32,
    pub traits: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skill_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitsInitPayload {
    pub units: Vec<UnitInitRecord>,
}

// ─── Snapshots ───────────────────────────────────────────────────────

/// Full authoritative state of one unit at a snapshot boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitSnapshot {
    pub unit_id: String,
    pub hp: i64,
    pub max_hp: i64,
    pub mana: i64,
    pub max_mana: i64,
    pub shield: i64,
    pub attack: i64,
    pub defense: i64,
    pub attack_speed: i64,
    pub hp_regen: i64,
    pub alive: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stun_until: Option<f64>,
    pub effects: Vec<EffectRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateSnapshotPayload {
    pub time: f64,
    pub units: Vec<UnitSnapshot>,
}

// ─── Damage / heal / mana ────────────────────────────────────────────

/// Any damage application, whatever its cause. Shield absorbs first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttackPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attacker_id: Option<String>,
    pub target_id: String,
    pub pre_hp: i64,
    pub post_hp: i64,
    pub applied_damage: i64,
    pub shield_absorbed: i64,
    pub post_shield: i64,
    pub damage_kind: DamageKind,
    pub cause: DamageCause,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub healer_id: Option<String>,
    pub target_id: String,
    pub amount: i64,
    pub pre_hp: i64,
    pub post_hp: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManaUpdatePayload {
    pub unit_id: String,
    pub pre_mana: i64,
    pub post_mana: i64,
    pub delta: i64,
    pub reason: ManaReason,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillCastPayload {
    pub caster_id: String,
    pub skill_id: String,
}

// ─── Effect application / expiry ─────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatBuffPayload {
    pub unit_id: String,
    pub stat: Stat,
    pub value: i64,
    pub value_type: ValueKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    /// Absolute expiry in seconds; absent = permanent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<f64>,
    /// Exact integer applied to the stat (percentages already resolved).
    pub applied_delta: i64,
    /// Authoritative stat value after application.
    pub post_value: i64,
    /// Post-clamp current values when a max stat shrank under them.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_hp: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_mana: Option<i64>,
    pub effect_id: String,
    pub is_debuff: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShieldAppliedPayload {
    pub unit_id: String,
    pub amount: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<f64>,
    pub effect_id: String,
    /// Authoritative absorption pool after application.
    pub post_shield: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitStunnedPayload {
    pub unit_id: String,
    pub duration: f64,
    /// Authoritative wake-up time after the stun landed.
    pub stun_until: f64,
    /// When this particular stun effect record expires (an earlier, longer
    /// stun may keep the unit down past it).
    pub expires_at: f64,
    pub effect_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectExpiredPayload {
    pub unit_id: String,
    pub effect_id: String,
    pub effect_kind: EffectKind,
    /// Delta reverted from the stat (0 for shield/stun).
    pub reverted_delta: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stat: Option<Stat>,
    /// Authoritative stat value after the revert (buff/debuff only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_value: Option<i64>,
}

// ─── Damage over time ────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DamageOverTimeAppliedPayload {
    pub unit_id: String,
    pub per_tick: i64,
    pub interval: f64,
    pub total_ticks: u32,
    pub damage_kind: DamageKind,
    pub effect_id: String,
    pub first_tick_at: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DamageOverTimeTickPayload {
    pub unit_id: String,
    pub effect_id: String,
    pub per_tick: i64,
    /// 1-based tick counter.
    pub tick_index: u32,
    pub ticks_remaining: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_tick_at: Option<f64>,
    pub post_hp: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DamageOverTimeExpiredPayload {
    pub unit_id: String,
    pub effect_id: String,
}

// ─── Terminal events ─────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitDiedPayload {
    pub unit_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub killer_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SurvivorRecord {
    pub unit_id: String,
    pub hp: i64,
    pub star_level: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CombatEndPayload {
    pub winner: Winner,
    /// Simulated seconds elapsed.
    pub duration: f64,
    pub survivors_a: Vec<SurvivorRecord>,
    pub survivors_b: Vec<SurvivorRecord>,
    /// Star-sum of the winning side's survivors (0 on draw).
    pub survivor_star_sum: u32,
    /// Player HP the losing side takes; consumed by the economy.
    pub loser_hp_damage: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CombatErrorPayload {
    pub reason: String,
}
