//! Canonical event stream types.
//!
//! Every state mutation in a combat is sourced from exactly one event
//! dispatched here. `EventRecord` is the sealed envelope: ordering metadata
//! plus an internally-tagged payload, serializing to one JSON object per
//! event with a `type` discriminator.

pub mod dispatcher;
pub mod payloads;

use serde::{Deserialize, Serialize};

use payloads::*;

/// The closed set of event types.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventPayload {
    UnitsInit(UnitsInitPayload),
    StateSnapshot(StateSnapshotPayload),
    UnitAttack(AttackPayload),
    ManaUpdate(ManaUpdatePayload),
    SkillCast(SkillCastPayload),
    UnitHeal(HealPayload),
    StatBuff(StatBuffPayload),
    EffectExpired(EffectExpiredPayload),
    ShieldApplied(ShieldAppliedPayload),
    UnitStunned(UnitStunnedPayload),
    DamageOverTimeApplied(DamageOverTimeAppliedPayload),
    DamageOverTimeTick(DamageOverTimeTickPayload),
    DamageOverTimeExpired(DamageOverTimeExpiredPayload),
    UnitDied(UnitDiedPayload),
    CombatEnd(CombatEndPayload),
    CombatError(CombatErrorPayload),
}

impl EventPayload {
    /// Wire name of the event type, for logs and diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            EventPayload::UnitsInit(_) => "units_init",
            EventPayload::StateSnapshot(_) => "state_snapshot",
            EventPayload::UnitAttack(_) => "unit_attack",
            EventPayload::ManaUpdate(_) => "mana_update",
            EventPayload::SkillCast(_) => "skill_cast",
            EventPayload::UnitHeal(_) => "unit_heal",
            EventPayload::StatBuff(_) => "stat_buff",
            EventPayload::EffectExpired(_) => "effect_expired",
            EventPayload::ShieldApplied(_) => "shield_applied",
            EventPayload::UnitStunned(_) => "unit_stunned",
            EventPayload::DamageOverTimeApplied(_) => "damage_over_time_applied",
            EventPayload::DamageOverTimeTick(_) => "damage_over_time_tick",
            EventPayload::DamageOverTimeExpired(_) => "damage_over_time_expired",
            EventPayload::UnitDied(_) => "unit_died",
            EventPayload::CombatEnd(_) => "combat_end",
            EventPayload::CombatError(_) => "combat_error",
        }
    }
}

/// A sealed event: ordering metadata stamped by the dispatcher plus the
/// payload. `seq` starts at 1 and is strictly increasing per combat;
/// `event_id` is unique per event and enables idempotent replay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRecord {
    pub seq: u64,
    pub event_id: String,
    /// Simulation time in seconds at emission.
    pub timestamp: f64,
    #[serde(flatten)]
    pub payload: EventPayload,
}
