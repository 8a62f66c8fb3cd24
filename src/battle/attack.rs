//! Attack processor.
//!
//! Once per tick, every alive, un-stunned unit whose attack timer is due
//! swings at the standard target (lowest-indexed alive front-row enemy,
//! falling back to the back row) unless a synergy targeting override is
//! installed for its team. Processing order is side A then side B, index
//! ascending — reconstructors rely on this ordering.

use crate::config;
use crate::effect::DamageKind;
use crate::event::payloads::{DamageCause, ManaReason};
use crate::unit::Side;

use super::state::{BattleState, TargetingPreference};

pub fn process_attacks(state: &mut BattleState) {
    // Units are stored A then B, each in roster index order, so a plain
    // index scan is the canonical tie-break order.
    for idx in 0..state.units.len() {
        let unit = state.unit(idx);
        if !unit.alive() || unit.is_stunned(state.now) || unit.next_attack_at() > state.now {
            continue;
        }
        let side = unit.side();
        let Some(target) = select_target(state, side) else {
            continue;
        };

        let attacker_id = state.unit(idx).unit_id().to_string();
        let raw = (state.unit(idx).attack() - state.unit(target).defense())
            .max(config::MIN_ATTACK_DAMAGE);

        state.emit_damage(
            Some(attacker_id),
            target,
            raw,
            DamageKind::Physical,
            DamageCause::Attack,
        );

        // Mana flows from the exchange; the dead earn nothing.
        let gain = state.unit(idx).mana() + state.unit(idx).mana_on_attack();
        state.emit_mana_update(idx, gain, ManaReason::Attack);
        let on_hit = state.unit(target).mana() + state.unit(target).mana_on_hit();
        state.emit_mana_update(target, on_hit, ManaReason::OnHit);

        let interval = config::attack_interval_ticks(state.unit(idx).attack_speed());
        let next = state.now + interval;
        state.units[idx].set_next_attack_at(next);
    }
}

/// Pick the attack target for a unit on `side`, honoring the team's
/// targeting override. Returns `None` when no enemy is alive.
pub fn select_target(state: &BattleState, side: Side) -> Option<usize> {
    let enemies = state.alive_of(side.opponent());
    if enemies.is_empty() {
        return None;
    }
    match state.targeting[side.index()] {
        Some(TargetingPreference::LowestHp) => enemies
            .iter()
            .copied()
            .min_by_key(|&i| (state.unit(i).hp(), state.unit(i).index())),
        Some(TargetingPreference::BackRowFirst) => row_target(state, &enemies, true),
        None => row_target(state, &enemies, false),
    }
}

fn row_target(state: &BattleState, enemies: &[usize], back_first: bool) -> Option<usize> {
    use crate::unit::Row;
    let (first, second) = if back_first {
        (Row::Back, Row::Front)
    } else {
        (Row::Front, Row::Back)
    };
    enemies
        .iter()
        .copied()
        .find(|&i| state.unit(i).row() == first)
        .or_else(|| enemies.iter().copied().find(|&i| state.unit(i).row() == second))
}
