//! Event-stream reconstructor.
//!
//! A pure consumer that rebuilds per-unit state from the event log using
//! only the authoritative fields each event carries — no formulas, no
//! inference. Snapshots embedded in the stream are validators: at each one
//! the reconstructed state must match field-for-field, and a mismatch is a
//! loud failure naming the unit, the field, and both values. Snapshots are
//! never used to repair state.
//!
//! Replay is idempotent over `event_id`: a duplicated event is skipped.

use std::collections::{HashMap, HashSet};

use crate::effect::{EffectKind, EffectRecord, Stat, ValueKind};
use crate::error::EngineError;
use crate::event::payloads::*;
use crate::event::{EventPayload, EventRecord};

#[derive(Debug)]
pub struct Reconstructor {
    units: Vec<UnitSnapshot>,
    index: HashMap<String, usize>,
    seen_event_ids: HashSet<String>,
    snapshots_verified: u64,
}

impl Default for Reconstructor {
    fn default() -> Self {
        Self::new()
    }
}

impl Reconstructor {
    pub fn new() -> Reconstructor {
        Reconstructor {
            units: Vec::new(),
            index: HashMap::new(),
            seen_event_ids: HashSet::new(),
            snapshots_verified: 0,
        }
    }

    pub fn units(&self) -> &[UnitSnapshot] {
        &self.units
    }

    pub fn unit(&self, unit_id: &str) -> Option<&UnitSnapshot> {
        self.index.get(unit_id).map(|&i| &self.units[i])
    }

    /// Snapshots the stream carried and this reconstructor checked.
    pub fn snapshots_verified(&self) -> u64 {
        self.snapshots_verified
    }

    /// Apply one event. Events already seen (by `event_id`) are skipped.
    pub fn apply(&mut self, record: &EventRecord) -> Result<(), EngineError> {
        if !self.seen_event_ids.insert(record.event_id.clone()) {
            return Ok(());
        }
        match &record.payload {
            EventPayload::UnitsInit(p) => self.init_units(p),
            EventPayload::StateSnapshot(p) => self.verify_snapshot(record.seq, p),
            EventPayload::UnitAttack(p) => {
                let u = self.unit_mut(&p.target_id)?;
                u.hp = p.post_hp;
                u.shield = p.post_shield;
                Ok(())
            }
            EventPayload::UnitHeal(p) => {
                let u = self.unit_mut(&p.target_id)?;
                u.hp = p.post_hp;
                Ok(())
            }
            EventPayload::ManaUpdate(p) => {
                let u = self.unit_mut(&p.unit_id)?;
                u.mana = p.post_mana;
                Ok(())
            }
            EventPayload::SkillCast(_) => Ok(()),
            EventPayload::StatBuff(p) => self.apply_stat_buff(p),
            EventPayload::EffectExpired(p) => self.apply_effect_expired(p),
            EventPayload::ShieldApplied(p) => self.apply_shield(p),
            EventPayload::UnitStunned(p) => self.apply_stun(p),
            EventPayload::DamageOverTimeApplied(p) => self.apply_dot(p),
            EventPayload::DamageOverTimeTick(p) => {
                let u = self.unit_mut(&p.unit_id)?;
                u.hp = p.post_hp;
                let unit_id = p.unit_id.clone();
                let fx = self
                    .effect_mut(&unit_id, &p.effect_id)
                    .ok_or_else(|| EngineError::UnknownEffect {
                        unit_id: p.unit_id.clone(),
                        effect_id: p.effect_id.clone(),
                    })?;
                fx.ticks_remaining = Some(p.ticks_remaining);
                fx.next_tick_at = p.next_tick_at;
                Ok(())
            }
            EventPayload::DamageOverTimeExpired(p) => {
                self.remove_effect(&p.unit_id, &p.effect_id)?;
                Ok(())
            }
            EventPayload::UnitDied(p) => {
                let u = self.unit_mut(&p.unit_id)?;
                u.alive = false;
                Ok(())
            }
            EventPayload::CombatEnd(_) | EventPayload::CombatError(_) => Ok(()),
        }
    }

    /// Apply a whole ordered log.
    pub fn apply_all(&mut self, events: &[EventRecord]) -> Result<(), EngineError> {
        for record in events {
            self.apply(record)?;
        }
        Ok(())
    }

    fn init_units(&mut self, p: &UnitsInitPayload) -> Result<(), EngineError> {
        self.units = p
            .units
            .iter()
            .map(|r| UnitSnapshot {
                unit_id: r.unit_id.clone(),
                hp: r.max_hp,
                max_hp: r.max_hp,
                mana: 0,
                max_mana: r.max_mana,
                shield: 0,
                attack: r.attack,
                defense: r.defense,
                attack_speed: r.attack_speed,
                hp_regen: 0,
                alive: true,
                stun_until: None,
                effects: Vec::new(),
            })
            .collect();
        self.index = self
            .units
            .iter()
            .enumerate()
            .map(|(i, u)| (u.unit_id.clone(), i))
            .collect();
        Ok(())
    }

    fn apply_stat_buff(&mut self, p: &StatBuffPayload) -> Result<(), EngineError> {
        let u = self.unit_mut(&p.unit_id)?;
        set_stat(u, p.stat, p.post_value);
        if let Some(hp) = p.post_hp {
            u.hp = hp;
        }
        if let Some(mana) = p.post_mana {
            u.mana = mana;
        }
        u.effects.push(EffectRecord {
            effect_id: p.effect_id.clone(),
            kind: if p.is_debuff {
                EffectKind::Debuff
            } else {
                EffectKind::Buff
            },
            stat: Some(p.stat),
            value: p.value,
            value_type: p.value_type,
            applied_delta: p.applied_delta,
            amount: 0,
            damage_kind: None,
            interval: None,
            total_ticks: None,
            ticks_remaining: None,
            next_tick_at: None,
            expires_at: p.expires_at,
            source: p.source.clone(),
        });
        Ok(())
    }

    fn apply_effect_expired(&mut self, p: &EffectExpiredPayload) -> Result<(), EngineError> {
        self.remove_effect(&p.unit_id, &p.effect_id)?;
        if let (Some(stat), Some(post_value)) = (p.stat, p.post_value) {
            let u = self.unit_mut(&p.unit_id)?;
            set_stat(u, stat, post_value);
        }
        Ok(())
    }

    fn apply_shield(&mut self, p: &ShieldAppliedPayload) -> Result<(), EngineError> {
        let u = self.unit_mut(&p.unit_id)?;
        u.shield = p.post_shield;
        u.effects.push(EffectRecord {
            effect_id: p.effect_id.clone(),
            kind: EffectKind::Shield,
            stat: None,
            value: p.amount,
            value_type: ValueKind::Flat,
            applied_delta: 0,
            amount: p.amount,
            damage_kind: None,
            interval: None,
            total_ticks: None,
            ticks_remaining: None,
            next_tick_at: None,
            expires_at: p.expires_at,
            source: p.source.clone(),
        });
        Ok(())
    }

    fn apply_stun(&mut self, p: &UnitStunnedPayload) -> Result<(), EngineError> {
        let u = self.unit_mut(&p.unit_id)?;
        u.stun_until = Some(p.stun_until);
        u.effects.push(EffectRecord {
            effect_id: p.effect_id.clone(),
            kind: EffectKind::Stun,
            stat: None,
            value: 0,
            value_type: ValueKind::Flat,
            applied_delta: 0,
            amount: 0,
            damage_kind: None,
            interval: None,
            total_ticks: None,
            ticks_remaining: None,
            next_tick_at: None,
            expires_at: Some(p.expires_at),
            source: p.source.clone(),
        });
        Ok(())
    }

    fn apply_dot(&mut self, p: &DamageOverTimeAppliedPayload) -> Result<(), EngineError> {
        let u = self.unit_mut(&p.unit_id)?;
        u.effects.push(EffectRecord {
            effect_id: p.effect_id.clone(),
            kind: EffectKind::DamageOverTime,
            stat: None,
            value: p.per_tick,
            value_type: ValueKind::Flat,
            applied_delta: 0,
            amount: p.per_tick,
            damage_kind: Some(p.damage_kind),
            interval: Some(p.interval),
            total_ticks: Some(p.total_ticks),
            ticks_remaining: Some(p.total_ticks),
            next_tick_at: Some(p.first_tick_at),
            expires_at: None,
            source: p.source.clone(),
        });
        Ok(())
    }

    /// Compare reconstructed state with the embedded snapshot. The first
    /// differing field fails the whole replay.
    fn verify_snapshot(&mut self, seq: u64, p: &StateSnapshotPayload) -> Result<(), EngineError> {
        if p.units.len() != self.units.len() {
            return Err(EngineError::SnapshotMismatch {
                seq,
                unit_id: "<roster>".into(),
                field: "unit_count".into(),
                reconstructed: self.units.len().to_string(),
                snapshot: p.units.len().to_string(),
            });
        }
        for (mine, theirs) in self.units.iter().zip(p.units.iter()) {
            compare_unit(seq, mine, theirs)?;
        }
        self.snapshots_verified += 1;
        Ok(())
    }

    fn unit_mut(&mut self, unit_id: &str) -> Result<&mut UnitSnapshot, EngineError> {
        match self.index.get(unit_id) {
            Some(&i) => Ok(&mut self.units[i]),
            None => Err(EngineError::UnknownUnit(unit_id.to_string())),
        }
    }

    fn effect_mut(&mut self, unit_id: &str, effect_id: &str) -> Option<&mut EffectRecord> {
        let &i = self.index.get(unit_id)?;
        self.units[i]
            .effects
            .iter_mut()
            .find(|e| e.effect_id == effect_id)
    }

    fn remove_effect(&mut self, unit_id: &str, effect_id: &str) -> Result<(), EngineError> {
        let u = self.unit_mut(unit_id)?;
        let pos = u.effects.iter().position(|e| e.effect_id == effect_id);
        match pos {
            Some(pos) => {
                u.effects.remove(pos);
                Ok(())
            }
            None => Err(EngineError::UnknownEffect {
                unit_id: unit_id.to_string(),
                effect_id: effect_id.to_string(),
            }),
        }
    }
}

fn set_stat(u: &mut UnitSnapshot, stat: Stat, value: i64) {
    match stat {
        Stat::Attack => u.attack = value,
        Stat::Defense => u.defense = value,
        Stat::AttackSpeed => u.attack_speed = value,
        Stat::MaxHp => u.max_hp = value,
        Stat::MaxMana => u.max_mana = value,
        Stat::HpRegen => u.hp_regen = value,
    }
}

fn compare_unit(seq: u64, mine: &UnitSnapshot, theirs: &UnitSnapshot) -> Result<(), EngineError> {
    let mismatch = |field: &str, reconstructed: String, snapshot: String| {
        Err(EngineError::SnapshotMismatch {
            seq,
            unit_id: theirs.unit_id.clone(),
            field: field.into(),
            reconstructed,
            snapshot,
        })
    };
    if mine.unit_id != theirs.unit_id {
        return mismatch("unit_id", mine.unit_id.clone(), theirs.unit_id.clone());
    }
    macro_rules! check {
        ($field:ident) => {
            if mine.$field != theirs.$field {
                return mismatch(
                    stringify!($field),
                    format!("{:?}", mine.$field),
                    format!("{:?}", theirs.$field),
                );
            }
        };
    }
    check!(hp);
    check!(max_hp);
    check!(mana);
    check!(max_mana);
    check!(shield);
    check!(attack);
    check!(defense);
    check!(attack_speed);
    check!(hp_regen);
    check!(alive);
    check!(stun_until);
    if mine.effects != theirs.effects {
        return mismatch(
            "effects",
            format!("{:?}", mine.effects),
            format!("{:?}", theirs.effects),
        );
    }
    Ok(())
}

/// Replay a full log, verifying every embedded snapshot. Returns the
/// reconstructor for final-state inspection.
pub fn verify_log(events: &[EventRecord]) -> Result<Reconstructor, EngineError> {
    let mut rec = Reconstructor::new();
    rec.apply_all(events)?;
    Ok(rec)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::battle::{simulate, CombatConfig, Simulator};
    use crate::effect::{DamageKind, ValueKind};
    use crate::skill::{Skill, SkillNode, SkillStat, TargetSelector};
    use crate::unit::{Row, UnitSpec};

    fn fighter(id: &str, hp: i64, attack: i64, speed: i64, skill: Option<Skill>) -> UnitSpec {
        UnitSpec {
            unit_id: id.into(),
            name: id.into(),
            row: Row::Front,
            max_hp: hp,
            attack,
            defense: 5,
            attack_speed: speed,
            max_mana: 60,
            mana_on_attack: 15,
            mana_on_hit: 10,
            star_level: 1,
            traits: vec![],
            skill,
        }
    }

    fn busy_skill() -> Skill {
        Skill {
            skill_id: "storm".into(),
            name: "Storm".into(),
            nodes: vec![
                SkillNode::Damage {
                    amount: 40,
                    damage_kind: DamageKind::Magical,
                    target: TargetSelector::RandomEnemy,
                },
                SkillNode::DamageOverTime {
                    per_tick: 6,
                    duration: 2.0,
                    interval: 1.0,
                    damage_kind: DamageKind::Poison,
                    target: TargetSelector::RandomEnemy,
                },
                SkillNode::Buff {
                    stat: SkillStat::Attack,
                    value: 15,
                    value_type: ValueKind::Percentage,
                    duration: Some(3.0),
                    target: TargetSelector::Caster,
                },
                SkillNode::Shield {
                    amount: 60,
                    duration: Some(2.5),
                    target: TargetSelector::Caster,
                },
                SkillNode::Stun {
                    duration: 0.5,
                    target: TargetSelector::RandomEnemy,
                },
            ],
        }
    }

    #[test]
    fn full_combat_replays_to_identical_snapshots() {
        let report = simulate(
            vec![
                fighter("a-0", 700, 40, 110, Some(busy_skill())),
                fighter("a-1", 500, 35, 90, None),
            ],
            vec![
                fighter("b-0", 650, 45, 100, Some(busy_skill())),
                fighter("b-1", 550, 30, 80, None),
            ],
            vec![],
            2024,
            None,
        )
        .unwrap();

        let rec = verify_log(&report.events).expect("replay must match every snapshot");
        assert!(rec.snapshots_verified() > 0);
    }

    #[test]
    fn replaying_twice_is_idempotent() {
        let report = simulate(
            vec![fighter("a-0", 300, 40, 100, None)],
            vec![fighter("b-0", 300, 45, 100, None)],
            vec![],
            5,
            None,
        )
        .unwrap();

        let mut once = Reconstructor::new();
        once.apply_all(&report.events).unwrap();

        let mut twice = Reconstructor::new();
        twice.apply_all(&report.events).unwrap();
        twice.apply_all(&report.events).unwrap();

        assert_eq!(once.units(), twice.units());
    }

    #[test]
    fn tampered_event_fails_loudly_at_next_snapshot() {
        let report = simulate(
            vec![fighter("a-0", 3000, 10, 100, None)],
            vec![fighter("b-0", 3000, 10, 100, None)],
            vec![],
            5,
            None,
        )
        .unwrap();

        let mut events = report.events.clone();
        // Corrupt the first attack's authoritative post_hp
        let idx = events
            .iter()
            .position(|e| matches!(e.payload, EventPayload::UnitAttack(_)))
            .unwrap();
        if let EventPayload::UnitAttack(p) = &mut events[idx].payload {
            p.post_hp += 7;
        }

        let err = verify_log(&events).unwrap_err();
        match err {
            EngineError::SnapshotMismatch { field, .. } => assert_eq!(field, "hp"),
            other => panic!("expected snapshot mismatch, got {other}"),
        }
    }

    #[test]
    fn unknown_effect_expiry_is_an_error() {
        let report = simulate(
            vec![fighter("a-0", 300, 40, 100, None)],
            vec![fighter("b-0", 300, 45, 100, None)],
            vec![],
            5,
            None,
        )
        .unwrap();

        let mut rec = Reconstructor::new();
        rec.apply(&report.events[0]).unwrap();

        let bogus = EventRecord {
            seq: 999,
            event_id: "ffffffff-ffff-ffff-ffff-ffffffffffff".into(),
            timestamp: 1.0,
            payload: EventPayload::EffectExpired(EffectExpiredPayload {
                unit_id: "a-0".into(),
                effect_id: "fx-404".into(),
                effect_kind: EffectKind::Buff,
                reverted_delta: 5,
                stat: Some(Stat::Attack),
                post_value: Some(40),
            }),
        };
        assert!(matches!(
            rec.apply(&bogus),
            Err(EngineError::UnknownEffect { .. })
        ));
    }

    #[test]
    fn cancelled_combat_log_still_replays() {
        let mut sim = Simulator::new(CombatConfig {
            team_a: vec![fighter("a-0", 300, 10, 100, None)],
            team_b: vec![fighter("b-0", 300, 10, 100, None)],
            synergies: vec![],
            seed: 8,
        })
        .unwrap();
        sim.handle().cancel();
        let report = sim.run().unwrap();
        verify_log(&report.events).expect("partial log replays cleanly");
    }
}
