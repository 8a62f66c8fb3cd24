//! Authoritative battle state and the event-sourced mutators.
//!
//! Every state change in a combat goes through exactly one `emit_*` method
//! here. Each method does two things, in order: mutate the authoritative
//! unit state, then build a payload carrying the post-mutation values and
//! hand it to the dispatcher. Nothing else in the crate writes unit fields.

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::config;
use crate::effect::{DamageKind, Effect, EffectKind, Stat, ValueKind};
use crate::event::dispatcher::EventDispatcher;
use crate::event::payloads::*;
use crate::event::EventPayload;
use crate::skill::SkillNode;
use crate::unit::{Side, Unit};

/// Attack-target selection override installed by synergies, team-scoped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetingPreference {
    LowestHp,
    BackRowFirst,
}

/// A death observed during a processor phase, drained by the scheduler so
/// synergy kill-hooks fire in a defined place.
#[derive(Debug, Clone)]
pub struct DeathNote {
    pub victim: usize,
    pub killer_id: Option<String>,
}

/// Delayed skill nodes waiting for their due tick.
#[derive(Debug, Clone)]
pub struct PendingBatch {
    pub due_tick: u64,
    pub order: u64,
    pub caster: usize,
    pub nodes: Vec<SkillNode>,
}

/// Summary a damage mutator hands back to its caller.
#[derive(Debug, Clone, Copy)]
pub struct DamageOutcome {
    pub applied_damage: i64,
    pub shield_absorbed: i64,
    pub killed: bool,
}

pub struct BattleState {
    pub(crate) units: Vec<Unit>,
    /// Simulation clock in ticks.
    pub(crate) now: u64,
    /// Gameplay RNG: target rolls, random stats, synergy chance checks.
    pub(crate) rng: StdRng,
    pub(crate) dispatcher: EventDispatcher,
    /// Deaths since the last drain.
    pub(crate) deaths: Vec<DeathNote>,
    /// Scheduled delayed skill batches.
    pub(crate) batches: Vec<PendingBatch>,
    /// Per-side targeting override (index by `Side::index()`).
    pub(crate) targeting: [Option<TargetingPreference>; 2],
    /// First internal protocol violation observed, if any. Fatal for the
    /// combat; the scheduler aborts on it.
    pub(crate) violation: Option<String>,
    next_effect_id: u64,
    next_batch_order: u64,
}

impl BattleState {
    pub fn new(units: Vec<Unit>, seed: u64) -> BattleState {
        BattleState {
            units,
            now: 0,
            // Gameplay stream; the dispatcher derives a separate id stream
            // from the same seed.
            rng: StdRng::seed_from_u64(seed),
            dispatcher: EventDispatcher::new(seed),
            deaths: Vec::new(),
            batches: Vec::new(),
            targeting: [None, None],
            violation: None,
            next_effect_id: 0,
            next_batch_order: 0,
        }
    }

    // ── Lookup helpers ──────────────────────────────────────────────

    pub fn unit(&self, idx: usize) -> &Unit {
        &self.units[idx]
    }

    pub fn unit_idx(&self, unit_id: &str) -> Option<usize> {
        self.units.iter().position(|u| u.unit_id() == unit_id)
    }

    pub fn alive_of(&self, side: Side) -> Vec<usize> {
        self.units
            .iter()
            .enumerate()
            .filter(|(_, u)| u.side() == side && u.alive())
            .map(|(i, _)| i)
            .collect()
    }

    pub fn alive_count(&self, side: Side) -> usize {
        self.units
            .iter()
            .filter(|u| u.side() == side && u.alive())
            .count()
    }

    pub(crate) fn alloc_effect_id(&mut self) -> String {
        self.next_effect_id += 1;
        format!("fx-{}", self.next_effect_id)
    }

    pub(crate) fn schedule_batch(&mut self, due_tick: u64, caster: usize, nodes: Vec<SkillNode>) {
        self.next_batch_order += 1;
        self.batches.push(PendingBatch {
            due_tick,
            order: self.next_batch_order,
            caster,
            nodes,
        });
    }

    pub(crate) fn drain_deaths(&mut self) -> Vec<DeathNote> {
        std::mem::take(&mut self.deaths)
    }

    // ── Mutators ────────────────────────────────────────────────────
    //
    // Order inside each mutator is fixed: mutate, build payload with
    // post-state, dispatch.

    /// Apply raw damage: shield absorbs first, the remainder hits HP. Kills
    /// are handled inline (death event + effect cleanup) so the event order
    /// around a kill is always damage -> died -> expirations.
    pub(crate) fn emit_damage(
        &mut self,
        attacker_id: Option<String>,
        target: usize,
        raw: i64,
        damage_kind: DamageKind,
        cause: DamageCause,
    ) -> DamageOutcome {
        let unit = &mut self.units[target];
        let pre_hp = unit.hp();
        let pre_shield = unit.shield();

        let shield_absorbed = pre_shield.min(raw.max(0));
        let hp_damage = (raw.max(0) - shield_absorbed).min(pre_hp);
        unit.set_shield(pre_shield - shield_absorbed);
        unit.set_hp(pre_hp - hp_damage);

        let post_hp = unit.hp();
        let post_shield = unit.shield();
        let target_id = unit.unit_id().to_string();
        let was_alive = unit.alive();

        self.dispatcher.dispatch(
            self.now,
            EventPayload::UnitAttack(AttackPayload {
                attacker_id: attacker_id.clone(),
                target_id,
                pre_hp,
                post_hp,
                applied_damage: hp_damage,
                shield_absorbed,
                post_shield,
                damage_kind,
                cause,
            }),
        );

        let killed = was_alive && post_hp == 0;
        if killed {
            self.emit_unit_died(target, attacker_id);
        }

        DamageOutcome {
            applied_damage: hp_damage,
            shield_absorbed,
            killed,
        }
    }

    /// Death: flag the unit, emit `unit_died`, then expire every effect
    /// still on it (buff/debuff/stun/shield via `effect_expired`, DoTs via
    /// `damage_over_time_expired`). Effects the unit *sourced* on others
    /// are left alone.
    fn emit_unit_died(&mut self, target: usize, killer_id: Option<String>) {
        let unit = &mut self.units[target];
        unit.set_alive(false);
        let unit_id = unit.unit_id().to_string();

        self.dispatcher.dispatch(
            self.now,
            EventPayload::UnitDied(UnitDiedPayload {
                unit_id,
                killer_id: killer_id.clone(),
            }),
        );

        let effect_ids: Vec<(String, bool)> = self.units[target]
            .effects()
            .iter()
            .map(|e| (e.id.clone(), e.is_dot()))
            .collect();
        for (effect_id, is_dot) in effect_ids {
            if is_dot {
                self.emit_dot_expired(target, &effect_id);
            } else {
                self.emit_effect_expired(target, &effect_id);
            }
        }

        self.deaths.push(DeathNote {
            victim: target,
            killer_id,
        });
    }

    /// Heal, clamped to max HP. No-op on dead targets.
    pub(crate) fn emit_heal(&mut self, healer_id: Option<String>, target: usize, amount: i64) {
        let unit = &mut self.units[target];
        if !unit.alive() {
            return;
        }
        let pre_hp = unit.hp();
        unit.set_hp(pre_hp + amount.max(0));
        let post_hp = unit.hp();
        let target_id = unit.unit_id().to_string();

        self.dispatcher.dispatch(
            self.now,
            EventPayload::UnitHeal(HealPayload {
                healer_id,
                target_id,
                amount: amount.max(0),
                pre_hp,
                post_hp,
            }),
        );
    }

    /// Set mana to `new_mana`, clamped to `[0, max_mana]`. Emits only when
    /// the clamped value actually changes.
    pub(crate) fn emit_mana_update(&mut self, target: usize, new_mana: i64, reason: ManaReason) {
        let unit = &mut self.units[target];
        if !unit.alive() {
            return;
        }
        let pre_mana = unit.mana();
        unit.set_mana(new_mana);
        let post_mana = unit.mana();
        if post_mana == pre_mana {
            return;
        }
        let unit_id = unit.unit_id().to_string();

        self.dispatcher.dispatch(
            self.now,
            EventPayload::ManaUpdate(ManaUpdatePayload {
                unit_id,
                pre_mana,
                post_mana,
                delta: post_mana - pre_mana,
                reason,
            }),
        );
    }

    /// Apply a stat buff or debuff. Percentages resolve to an integer delta
    /// against the unit's base stat at application time; the event carries
    /// the exact delta applied and the post value. Negative values are
    /// debuffs.
    pub(crate) fn emit_stat_buff(
        &mut self,
        target: usize,
        stat: Stat,
        value: i64,
        value_type: ValueKind,
        duration_ticks: Option<u64>,
        source: Option<String>,
    ) -> String {
        let effect_id = self.alloc_effect_id();
        let expires_at = duration_ticks.map(|d| self.now + d);

        let unit = &mut self.units[target];
        let desired = match value_type {
            ValueKind::Flat => value,
            ValueKind::Percentage => crate::effect::percent_delta(unit.base_value(stat), value),
        };
        let applied_delta = unit.apply_stat_delta(stat, desired);
        let post_value = unit.stat_value(stat);
        let is_debuff = value < 0;
        let unit_id = unit.unit_id().to_string();
        // Shrinking a max stat clamps the current value; the event carries
        // the post-clamp number so consumers never re-derive it.
        let post_hp = (stat == Stat::MaxHp).then(|| unit.hp());
        let post_mana = (stat == Stat::MaxMana).then(|| unit.mana());

        unit.push_effect(Effect {
            id: effect_id.clone(),
            kind: if is_debuff {
                EffectKind::Debuff
            } else {
                EffectKind::Buff
            },
            stat: Some(stat),
            value,
            value_type,
            applied_delta,
            amount: 0,
            damage_kind: None,
            interval_ticks: 0,
            total_ticks: 0,
            ticks_remaining: 0,
            next_tick_at: 0,
            expires_at,
            source: source.clone(),
        });

        self.dispatcher.dispatch(
            self.now,
            EventPayload::StatBuff(StatBuffPayload {
                unit_id,
                stat,
                value,
                value_type,
                duration: duration_ticks.map(config::ticks_to_secs),
                expires_at: expires_at.map(config::ticks_to_secs),
                applied_delta,
                post_value,
                post_hp,
                post_mana,
                effect_id: effect_id.clone(),
                is_debuff,
                source,
            }),
        );
        effect_id
    }

    /// Grant shield absorption. The pool is a single integer on the unit;
    /// the effect record only tracks the grant's lifetime.
    pub(crate) fn emit_shield_applied(
        &mut self,
        target: usize,
        amount: i64,
        duration_ticks: Option<u64>,
        source: Option<String>,
    ) -> String {
        let effect_id = self.alloc_effect_id();
        let expires_at = duration_ticks.map(|d| self.now + d);

        let unit = &mut self.units[target];
        unit.set_shield(unit.shield() + amount.max(0));
        let post_shield = unit.shield();
        let unit_id = unit.unit_id().to_string();

        unit.push_effect(Effect {
            id: effect_id.clone(),
            kind: EffectKind::Shield,
            stat: None,
            value: amount.max(0),
            value_type: ValueKind::Flat,
            applied_delta: 0,
            amount: amount.max(0),
            damage_kind: None,
            interval_ticks: 0,
            total_ticks: 0,
            ticks_remaining: 0,
            next_tick_at: 0,
            expires_at,
            source: source.clone(),
        });

        self.dispatcher.dispatch(
            self.now,
            EventPayload::ShieldApplied(ShieldAppliedPayload {
                unit_id,
                amount: amount.max(0),
                duration: duration_ticks.map(config::ticks_to_secs),
                expires_at: expires_at.map(config::ticks_to_secs),
                effect_id: effect_id.clone(),
                post_shield,
                source,
            }),
        );
        effect_id
    }

    /// Stun: pushes `stun_until` forward (never backward) and records an
    /// expiring effect.
    pub(crate) fn emit_unit_stunned(
        &mut self,
        target: usize,
        duration_ticks: u64,
        source: Option<String>,
    ) -> String {
        let effect_id = self.alloc_effect_id();
        let until = self.now + duration_ticks;

        let unit = &mut self.units[target];
        unit.raise_stun_until(until);
        let stun_until = unit.stun_until().unwrap_or(until);
        let unit_id = unit.unit_id().to_string();

        unit.push_effect(Effect {
            id: effect_id.clone(),
            kind: EffectKind::Stun,
            stat: None,
            value: 0,
            value_type: ValueKind::Flat,
            applied_delta: 0,
            amount: 0,
            damage_kind: None,
            interval_ticks: 0,
            total_ticks: 0,
            ticks_remaining: 0,
            next_tick_at: 0,
            expires_at: Some(until),
            source: source.clone(),
        });

        self.dispatcher.dispatch(
            self.now,
            EventPayload::UnitStunned(UnitStunnedPayload {
                unit_id,
                duration: config::ticks_to_secs(duration_ticks),
                stun_until: config::ticks_to_secs(stun_until),
                expires_at: config::ticks_to_secs(until),
                effect_id: effect_id.clone(),
                source,
            }),
        );
        effect_id
    }

    /// Attach a damage-over-time effect. First tick lands one interval in.
    pub(crate) fn emit_dot_applied(
        &mut self,
        target: usize,
        per_tick: i64,
        interval_ticks: u64,
        total_ticks: u32,
        damage_kind: DamageKind,
        source: Option<String>,
    ) -> String {
        let effect_id = self.alloc_effect_id();
        let first_tick_at = self.now + interval_ticks;

        let unit = &mut self.units[target];
        let unit_id = unit.unit_id().to_string();
        unit.push_effect(Effect {
            id: effect_id.clone(),
            kind: EffectKind::DamageOverTime,
            stat: None,
            value: per_tick,
            value_type: ValueKind::Flat,
            applied_delta: 0,
            amount: per_tick,
            damage_kind: Some(damage_kind),
            interval_ticks,
            total_ticks,
            ticks_remaining: total_ticks,
            next_tick_at: first_tick_at,
            expires_at: None,
            source: source.clone(),
        });

        self.dispatcher.dispatch(
            self.now,
            EventPayload::DamageOverTimeApplied(DamageOverTimeAppliedPayload {
                unit_id,
                per_tick,
                interval: config::ticks_to_secs(interval_ticks),
                total_ticks,
                damage_kind,
                effect_id: effect_id.clone(),
                first_tick_at: config::ticks_to_secs(first_tick_at),
                source,
            }),
        );
        effect_id
    }

    /// One DoT pulse: damage (cause = dot), then cadence bookkeeping, then
    /// natural expiry when the last tick fires. If the pulse kills the
    /// host, death cleanup has already ended the effect and no tick or
    /// expiry bookkeeping is emitted.
    pub(crate) fn emit_dot_tick(&mut self, target: usize, effect_id: &str) {
        let found = self.units[target]
            .effects()
            .iter()
            .find(|e| e.id == effect_id)
            .map(|fx| {
                (
                    fx.amount,
                    fx.damage_kind.unwrap_or(DamageKind::Physical),
                    fx.source.clone(),
                )
            });
        let Some((per_tick, damage_kind, source)) = found else {
            self.flag_violation(format!("dot tick references unknown effect `{effect_id}`"));
            return;
        };

        let outcome = self.emit_damage(source, target, per_tick, damage_kind, DamageCause::Dot);
        if outcome.killed {
            return;
        }

        let post_hp = self.units[target].hp();
        let unit_id = self.units[target].unit_id().to_string();
        let (tick_index, ticks_remaining, next_tick_at) = {
            let Some(fx) = self.units[target].effect_mut(effect_id) else {
                return;
            };
            fx.ticks_remaining = fx.ticks_remaining.saturating_sub(1);
            let idx = fx.total_ticks - fx.ticks_remaining;
            if fx.ticks_remaining > 0 {
                fx.next_tick_at += fx.interval_ticks;
                (idx, fx.ticks_remaining, Some(fx.next_tick_at))
            } else {
                (idx, 0, None)
            }
        };

        self.dispatcher.dispatch(
            self.now,
            EventPayload::DamageOverTimeTick(DamageOverTimeTickPayload {
                unit_id,
                effect_id: effect_id.to_string(),
                per_tick,
                tick_index,
                ticks_remaining,
                next_tick_at: next_tick_at.map(config::ticks_to_secs),
                post_hp,
            }),
        );

        if ticks_remaining == 0 {
            self.emit_dot_expired(target, effect_id);
        }
    }

    /// Remove a non-DoT effect: revert the applied delta for buffs and
    /// debuffs, drop the record for shields (remaining absorption stays in
    /// the pool) and stuns (`stun_until` is monotonic, never rolled back).
    pub(crate) fn emit_effect_expired(&mut self, target: usize, effect_id: &str) {
        let Some(effect) = self.units[target].take_effect(effect_id) else {
            self.flag_violation(format!(
                "expiration references unknown effect `{effect_id}`"
            ));
            return;
        };
        let unit = &mut self.units[target];
        let unit_id = unit.unit_id().to_string();

        let (reverted_delta, stat, post_value) = match (effect.kind, effect.stat) {
            (EffectKind::Buff | EffectKind::Debuff, Some(stat)) => {
                unit.apply_stat_delta(stat, -effect.applied_delta);
                (effect.applied_delta, Some(stat), Some(unit.stat_value(stat)))
            }
            _ => (0, None, None),
        };

        self.dispatcher.dispatch(
            self.now,
            EventPayload::EffectExpired(EffectExpiredPayload {
                unit_id,
                effect_id: effect_id.to_string(),
                effect_kind: effect.kind,
                reverted_delta,
                stat,
                post_value,
            }),
        );
    }

    pub(crate) fn emit_dot_expired(&mut self, target: usize, effect_id: &str) {
        if self.units[target].take_effect(effect_id).is_none() {
            self.flag_violation(format!(
                "dot expiry references unknown effect `{effect_id}`"
            ));
            return;
        }
        let unit_id = self.units[target].unit_id().to_string();
        self.dispatcher.dispatch(
            self.now,
            EventPayload::DamageOverTimeExpired(DamageOverTimeExpiredPayload {
                unit_id,
                effect_id: effect_id.to_string(),
            }),
        );
    }

    /// Advisory cast marker. The mana deduction is a separate, preceding
    /// `mana_update(reason = skill_cast)`.
    pub(crate) fn emit_skill_cast(&mut self, caster: usize, skill_id: &str) {
        let caster_id = self.units[caster].unit_id().to_string();
        self.dispatcher.dispatch(
            self.now,
            EventPayload::SkillCast(SkillCastPayload {
                caster_id,
                skill_id: skill_id.to_string(),
            }),
        );
    }

    /// Roster announcement, before any other event.
    pub(crate) fn emit_units_init(&mut self) {
        let units = self
            .units
            .iter()
            .map(|u| UnitInitRecord {
                unit_id: u.unit_id().to_string(),
                name: u.name().to_string(),
                side: u.side(),
                row: u.row(),
                index: u.index(),
                max_hp: u.base_value(Stat::MaxHp),
                attack: u.base_value(Stat::Attack),
                defense: u.base_value(Stat::Defense),
                attack_speed: u.base_value(Stat::AttackSpeed),
                max_mana: u.base_value(Stat::MaxMana),
                mana_on_attack: u.mana_on_attack(),
                mana_on_hit: u.mana_on_hit(),
                star_level: u.star_level(),
                traits: u.traits().to_vec(),
                skill_id: u.skill().map(|s| s.skill_id.clone()),
            })
            .collect();
        self.dispatcher
            .dispatch(self.now, EventPayload::UnitsInit(UnitsInitPayload { units }));
    }

    pub(crate) fn emit_combat_end(&mut self, payload: CombatEndPayload) {
        self.dispatcher
            .dispatch(self.now, EventPayload::CombatEnd(payload));
    }

    pub(crate) fn emit_combat_error(&mut self, reason: String) {
        self.dispatcher.dispatch(
            self.now,
            EventPayload::CombatError(CombatErrorPayload { reason }),
        );
    }

    fn flag_violation(&mut self, reason: String) {
        tracing::error!(%reason, "protocol violation");
        if self.violation.is_none() {
            self.violation = Some(reason);
        }
    }

    /// Full authoritative snapshot of every unit, in roster order. Reflects
    /// every event already dispatched this tick.
    pub(crate) fn emit_snapshot(&mut self) {
        let units = self.units.iter().map(snapshot_of).collect();
        self.dispatcher.dispatch(
            self.now,
            EventPayload::StateSnapshot(StateSnapshotPayload {
                time: config::ticks_to_secs(self.now),
                units,
            }),
        );
    }
}

/// Build the wire snapshot for one unit.
pub fn snapshot_of(unit: &Unit) -> UnitSnapshot {
    UnitSnapshot {
        unit_id: unit.unit_id().to_string(),
        hp: unit.hp(),
        max_hp: unit.max_hp(),
        mana: unit.mana(),
        max_mana: unit.max_mana(),
        shield: unit.shield(),
        attack: unit.attack(),
        defense: unit.defense(),
        attack_speed: unit.attack_speed(),
        hp_regen: unit.hp_regen(),
        alive: unit.alive(),
        stun_until: unit.stun_until().map(config::ticks_to_secs),
        effects: unit.effects().iter().map(Effect::to_record).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unit::{Row, UnitSpec};

    fn spec(id: &str, hp: i64, attack: i64, defense: i64) -> UnitSpec {
        UnitSpec {
            unit_id: id.into(),
            name: id.into(),
            row: Row::Front,
            max_hp: hp,
            attack,
            defense,
            attack_speed: 100,
            max_mana: 100,
            mana_on_attack: 10,
            mana_on_hit: 5,
            star_level: 1,
            traits: vec![],
            skill: None,
        }
    }

    fn two_unit_state() -> BattleState {
        let a = Unit::from_spec(&spec("a-0", 100, 10, 0), Side::A, 0);
        let b = Unit::from_spec(&spec("b-0", 100, 10, 0), Side::B, 0);
        BattleState::new(vec![a, b], 1)
    }

    fn last_payload(state: &BattleState) -> &EventPayload {
        &state.dispatcher.log().last().unwrap().payload
    }

    #[test]
    fn damage_consumes_shield_before_hp() {
        let mut state = two_unit_state();
        state.emit_shield_applied(1, 50, None, None);
        let outcome = state.emit_damage(
            Some("a-0".into()),
            1,
            70,
            DamageKind::Physical,
            DamageCause::Attack,
        );
        assert_eq!(outcome.shield_absorbed, 50);
        assert_eq!(outcome.applied_damage, 20);
        assert!(!outcome.killed);
        assert_eq!(state.unit(1).shield(), 0);
        assert_eq!(state.unit(1).hp(), 80);

        match last_payload(&state) {
            EventPayload::UnitAttack(p) => {
                assert_eq!(p.pre_hp, 100);
                assert_eq!(p.post_hp, 80);
                assert_eq!(p.shield_absorbed, 50);
                assert_eq!(p.post_shield, 0);
            }
            other => panic!("expected unit_attack, got {:?}", other.kind_name()),
        }
    }

    #[test]
    fn exact_shield_blocks_all_hp_damage() {
        let mut state = two_unit_state();
        state.emit_shield_applied(1, 70, None, None);
        let outcome = state.emit_damage(
            Some("a-0".into()),
            1,
            70,
            DamageKind::Physical,
            DamageCause::Attack,
        );
        assert_eq!(outcome.shield_absorbed, 70);
        assert_eq!(outcome.applied_damage, 0);
        assert_eq!(state.unit(1).hp(), 100);
        assert_eq!(state.unit(1).shield(), 0);
    }

    #[test]
    fn lethal_damage_emits_death_and_expires_effects() {
        let mut state = two_unit_state();
        state.emit_stat_buff(1, Stat::Attack, 20, ValueKind::Flat, Some(100), None);
        let outcome = state.emit_damage(
            Some("a-0".into()),
            1,
            999,
            DamageKind::Physical,
            DamageCause::Skill,
        );
        assert!(outcome.killed);
        assert!(!state.unit(1).alive());
        assert!(state.unit(1).effects().is_empty());

        let kinds: Vec<&str> = state
            .dispatcher
            .log()
            .iter()
            .map(|e| e.payload.kind_name())
            .collect();
        assert_eq!(
            kinds,
            vec!["stat_buff", "unit_attack", "unit_died", "effect_expired"]
        );
        assert_eq!(state.deaths.len(), 1);
    }

    #[test]
    fn heal_clamps_to_max_hp_and_skips_dead() {
        let mut state = two_unit_state();
        state.emit_damage(None, 1, 30, DamageKind::True, DamageCause::Skill);
        state.emit_heal(None, 1, 500);
        assert_eq!(state.unit(1).hp(), 100);
        match last_payload(&state) {
            EventPayload::UnitHeal(p) => {
                assert_eq!(p.pre_hp, 70);
                assert_eq!(p.post_hp, 100);
            }
            other => panic!("expected unit_heal, got {:?}", other.kind_name()),
        }

        let events_before = state.dispatcher.log().len();
        state.emit_damage(None, 1, 999, DamageKind::True, DamageCause::Skill);
        state.emit_heal(None, 1, 50);
        // No heal event for the dead unit
        let tail: Vec<&str> = state.dispatcher.log()[events_before..]
            .iter()
            .map(|e| e.payload.kind_name())
            .collect();
        assert!(!tail.contains(&"unit_heal"));
    }

    #[test]
    fn mana_clamps_and_skips_no_ops() {
        let mut state = two_unit_state();
        state.emit_mana_update(0, 250, ManaReason::SkillEffect);
        assert_eq!(state.unit(0).mana(), 100);

        let len = state.dispatcher.log().len();
        state.emit_mana_update(0, 100, ManaReason::Attack);
        assert_eq!(state.dispatcher.log().len(), len, "no event for no-op");

        state.emit_mana_update(0, 0, ManaReason::SkillCast);
        match last_payload(&state) {
            EventPayload::ManaUpdate(p) => {
                assert_eq!(p.pre_mana, 100);
                assert_eq!(p.post_mana, 0);
                assert_eq!(p.delta, -100);
            }
            other => panic!("expected mana_update, got {:?}", other.kind_name()),
        }
    }

    #[test]
    fn percentage_buff_resolves_against_base() {
        let mut state = {
            let a = Unit::from_spec(&spec("a-0", 100, 10, 27), Side::A, 0);
            let b = Unit::from_spec(&spec("b-0", 100, 10, 0), Side::B, 0);
            BattleState::new(vec![a, b], 1)
        };
        state.emit_stat_buff(0, Stat::Defense, 10, ValueKind::Percentage, None, None);
        assert_eq!(state.unit(0).defense(), 30);
        match last_payload(&state) {
            EventPayload::StatBuff(p) => {
                assert_eq!(p.applied_delta, 3);
                assert_eq!(p.post_value, 30);
                assert!(!p.is_debuff);
            }
            other => panic!("expected stat_buff, got {:?}", other.kind_name()),
        }
        // Stacking a second +10% still resolves against base 27
        state.emit_stat_buff(0, Stat::Defense, 10, ValueKind::Percentage, None, None);
        assert_eq!(state.unit(0).defense(), 33);
    }

    #[test]
    fn buff_expiry_reverts_exact_delta() {
        let mut state = two_unit_state();
        let id = state.emit_stat_buff(0, Stat::Attack, 20, ValueKind::Flat, Some(20), None);
        assert_eq!(state.unit(0).attack(), 30);
        state.emit_effect_expired(0, &id);
        assert_eq!(state.unit(0).attack(), 10);
        match last_payload(&state) {
            EventPayload::EffectExpired(p) => {
                assert_eq!(p.reverted_delta, 20);
                assert_eq!(p.post_value, Some(10));
                assert_eq!(p.effect_kind, EffectKind::Buff);
            }
            other => panic!("expected effect_expired, got {:?}", other.kind_name()),
        }
    }

    #[test]
    fn shield_expiry_keeps_remaining_pool() {
        let mut state = two_unit_state();
        let id = state.emit_shield_applied(1, 50, Some(30), None);
        state.emit_damage(None, 1, 20, DamageKind::Physical, DamageCause::Attack);
        assert_eq!(state.unit(1).shield(), 30);
        state.emit_effect_expired(1, &id);
        // Record is gone, absorption pool is authoritative and stays
        assert!(state.unit(1).effects().is_empty());
        assert_eq!(state.unit(1).shield(), 30);
    }

    #[test]
    fn stun_extends_never_shrinks() {
        let mut state = two_unit_state();
        state.now = 10;
        state.emit_unit_stunned(1, 20, None);
        assert_eq!(state.unit(1).stun_until(), Some(30));
        state.emit_unit_stunned(1, 5, None);
        assert_eq!(state.unit(1).stun_until(), Some(30));
        state.emit_unit_stunned(1, 40, None);
        assert_eq!(state.unit(1).stun_until(), Some(50));
        assert_eq!(state.unit(1).effects().len(), 3);
    }

    #[test]
    fn dot_ticks_then_expires() {
        let mut state = two_unit_state();
        state.now = 5;
        let id = state.emit_dot_applied(1, 5, 10, 3, DamageKind::Poison, Some("a-0".into()));
        for tick_at in [15u64, 25, 35] {
            state.now = tick_at;
            state.emit_dot_tick(1, &id);
        }
        assert!(state.unit(1).effects().is_empty());
        assert_eq!(state.unit(1).hp(), 85);

        let kinds: Vec<&str> = state
            .dispatcher
            .log()
            .iter()
            .map(|e| e.payload.kind_name())
            .collect();
        assert_eq!(
            kinds,
            vec![
                "damage_over_time_applied",
                "unit_attack",
                "damage_over_time_tick",
                "unit_attack",
                "damage_over_time_tick",
                "unit_attack",
                "damage_over_time_tick",
                "damage_over_time_expired",
            ]
        );
    }

    #[test]
    fn dot_kill_skips_tick_bookkeeping() {
        let mut state = two_unit_state();
        state.emit_damage(None, 1, 98, DamageKind::True, DamageCause::Skill);
        let id = state.emit_dot_applied(1, 5, 10, 3, DamageKind::Poison, None);
        state.now = 10;
        state.emit_dot_tick(1, &id);
        assert!(!state.unit(1).alive());

        let kinds: Vec<&str> = state
            .dispatcher
            .log()
            .iter()
            .map(|e| e.payload.kind_name())
            .collect();
        // The killing pulse: damage, death, dot cleanup — no tick event
        assert_eq!(
            kinds,
            vec![
                "unit_attack",
                "damage_over_time_applied",
                "unit_attack",
                "unit_died",
                "damage_over_time_expired",
            ]
        );
    }

    #[test]
    fn snapshot_reflects_dispatched_state() {
        let mut state = two_unit_state();
        state.emit_shield_applied(0, 40, None, None);
        state.emit_stat_buff(0, Stat::Attack, 5, ValueKind::Flat, None, None);
        state.emit_snapshot();
        match last_payload(&state) {
            EventPayload::StateSnapshot(p) => {
                assert_eq!(p.units.len(), 2);
                assert_eq!(p.units[0].shield, 40);
                assert_eq!(p.units[0].attack, 15);
                assert_eq!(p.units[0].effects.len(), 2);
            }
            other => panic!("expected state_snapshot, got {:?}", other.kind_name()),
        }
    }
}
