//! Skill executor.
//!
//! Runs during the skill-cast phase of each tick: first the delayed node
//! batches that have come due (ordered by due tick, then scheduling order),
//! then fresh casts from units whose mana is full. Mana is zeroed before
//! any node resolves; target sets are evaluated at the moment each node
//! executes and an empty set silently skips the node.

use rand::Rng;

use crate::config;
use crate::effect::Stat;
use crate::event::payloads::{DamageCause, ManaReason};
use crate::skill::{Predicate, SkillNode, SkillStat, TargetSelector};
use crate::unit::Row;

use super::state::BattleState;

pub fn process_skills(state: &mut BattleState) {
    run_due_batches(state);

    for idx in 0..state.units.len() {
        let unit = state.unit(idx);
        let ready = unit.alive()
            && !unit.is_stunned(state.now)
            && unit.skill().is_some()
            && unit.max_mana() > 0
            && unit.mana() == unit.max_mana();
        if ready {
            cast(state, idx);
        }
    }
}

/// Execute every delayed batch whose tick has arrived. Batches scheduled
/// by nodes running *now* land strictly in the future, so one pass drains
/// everything due.
fn run_due_batches(state: &mut BattleState) {
    let now = state.now;
    let mut due: Vec<_> = Vec::new();
    state.batches.retain(|b| {
        if b.due_tick <= now {
            due.push(b.clone());
            false
        } else {
            true
        }
    });
    due.sort_by_key(|b| (b.due_tick, b.order));

    for batch in due {
        // A dead caster's pending nodes die with it.
        if state.unit(batch.caster).alive() {
            exec_nodes(state, batch.caster, &batch.nodes);
        }
    }
}

fn cast(state: &mut BattleState, caster: usize) {
    let Some(skill) = state.unit(caster).skill().cloned() else {
        return;
    };
    state.emit_mana_update(caster, 0, ManaReason::SkillCast);
    state.emit_skill_cast(caster, &skill.skill_id);
    exec_nodes(state, caster, &skill.nodes);
}

/// Run nodes in order. Execution stops if the caster dies mid-skill.
pub(crate) fn exec_nodes(state: &mut BattleState, caster: usize, nodes: &[SkillNode]) {
    for node in nodes {
        if !state.unit(caster).alive() {
            return;
        }
        exec_node(state, caster, node);
    }
}

fn exec_node(state: &mut BattleState, caster: usize, node: &SkillNode) {
    let caster_id = state.unit(caster).unit_id().to_string();
    match node {
        SkillNode::Damage {
            amount,
            damage_kind,
            target,
        } => {
            for t in resolve_targets(state, caster, *target) {
                if state.unit(t).alive() {
                    state.emit_damage(
                        Some(caster_id.clone()),
                        t,
                        *amount,
                        *damage_kind,
                        DamageCause::Skill,
                    );
                }
            }
        }
        SkillNode::Heal { amount, target } => {
            for t in resolve_targets(state, caster, *target) {
                state.emit_heal(Some(caster_id.clone()), t, *amount);
            }
        }
        SkillNode::Shield {
            amount,
            duration,
            target,
        } => {
            let ticks = duration.map(config::secs_to_ticks);
            for t in resolve_targets(state, caster, *target) {
                state.emit_shield_applied(t, *amount, ticks, Some(caster_id.clone()));
            }
        }
        SkillNode::Buff {
            stat,
            value,
            value_type,
            duration,
            target,
        } => {
            // `random` resolves to a concrete stat before anything is
            // emitted; events never carry it.
            let concrete = resolve_stat(state, *stat);
            let ticks = duration.map(config::secs_to_ticks);
            for t in resolve_targets(state, caster, *target) {
                state.emit_stat_buff(
                    t,
                    concrete,
                    *value,
                    *value_type,
                    ticks,
                    Some(caster_id.clone()),
                );
            }
        }
        SkillNode::Stun { duration, target } => {
            let ticks = config::secs_to_ticks(*duration);
            for t in resolve_targets(state, caster, *target) {
                state.emit_unit_stunned(t, ticks, Some(caster_id.clone()));
            }
        }
        SkillNode::DamageOverTime {
            per_tick,
            duration,
            interval,
            damage_kind,
            target,
        } => {
            let interval_ticks = config::secs_to_ticks(*interval).max(1);
            let total = (config::secs_to_ticks(*duration) / interval_ticks).max(1) as u32;
            for t in resolve_targets(state, caster, *target) {
                state.emit_dot_applied(
                    t,
                    *per_tick,
                    interval_ticks,
                    total,
                    *damage_kind,
                    Some(caster_id.clone()),
                );
            }
        }
        SkillNode::Delay { seconds, children } => {
            let due = state.now + config::secs_to_ticks(*seconds);
            state.schedule_batch(due, caster, children.clone());
        }
        SkillNode::Repeat { count, children } => {
            for _ in 0..*count {
                if !state.unit(caster).alive() {
                    return;
                }
                exec_nodes(state, caster, children);
            }
        }
        SkillNode::Conditional {
            predicate,
            then,
            r#else,
        } => {
            if eval_predicate(state, caster, predicate) {
                exec_nodes(state, caster, then);
            } else {
                exec_nodes(state, caster, r#else);
            }
        }
    }
}

/// Evaluate a selector against the current board. Empty results are the
/// caller's signal to skip silently.
fn resolve_targets(state: &mut BattleState, caster: usize, sel: TargetSelector) -> Vec<usize> {
    let side = state.unit(caster).side();
    match sel {
        TargetSelector::Caster => {
            if state.unit(caster).alive() {
                vec![caster]
            } else {
                Vec::new()
            }
        }
        TargetSelector::RandomEnemy => {
            let enemies = state.alive_of(side.opponent());
            if enemies.is_empty() {
                Vec::new()
            } else {
                let pick = state.rng.gen_range(0..enemies.len());
                vec![enemies[pick]]
            }
        }
        TargetSelector::EnemyTeam => state.alive_of(side.opponent()),
        TargetSelector::EnemyFront => state
            .alive_of(side.opponent())
            .into_iter()
            .filter(|&i| state.unit(i).row() == Row::Front)
            .collect(),
        TargetSelector::AllyTeam => state.alive_of(side),
        TargetSelector::AllyFront => state
            .alive_of(side)
            .into_iter()
            .filter(|&i| state.unit(i).row() == Row::Front)
            .collect(),
    }
}

fn resolve_stat(state: &mut BattleState, stat: SkillStat) -> Stat {
    match stat.as_concrete() {
        Some(s) => s,
        None => {
            const ALL: [Stat; 6] = [
                Stat::Attack,
                Stat::Defense,
                Stat::AttackSpeed,
                Stat::MaxHp,
                Stat::MaxMana,
                Stat::HpRegen,
            ];
            ALL[state.rng.gen_range(0..ALL.len())]
        }
    }
}

fn eval_predicate(state: &mut BattleState, caster: usize, predicate: &Predicate) -> bool {
    match predicate {
        Predicate::TargetHpBelowPercent { percent } => {
            let enemies = state.alive_of(state.unit(caster).side().opponent());
            if enemies.is_empty() {
                return false;
            }
            let pick = enemies[state.rng.gen_range(0..enemies.len())];
            let u = state.unit(pick);
            u.hp() * 100 < percent * u.max_hp()
        }
        Predicate::CasterHpBelowPercent { percent } => {
            let u = state.unit(caster);
            u.hp() * 100 < percent * u.max_hp()
        }
        Predicate::HasEffect { effect } => state
            .unit(caster)
            .effects()
            .iter()
            .any(|e| e.kind == *effect),
        Predicate::AllyCountAbove { count } => {
            let side = state.unit(caster).side();
            let allies = state
                .alive_of(side)
                .into_iter()
                .filter(|&i| i != caster)
                .count();
            allies > *count
        }
    }
}
