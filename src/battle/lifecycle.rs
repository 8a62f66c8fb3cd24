//! Effect lifecycle processor: DoT pulses, timed expirations, and the
//! per-second regeneration pass.

use super::state::BattleState;

/// Fire every DoT whose tick has come due. A pulse that kills its host is
/// cleaned up inside the damage mutator; remaining due effects on that
/// host are gone with it.
pub fn process_dot_ticks(state: &mut BattleState) {
    for idx in 0..state.units.len() {
        if !state.unit(idx).alive() {
            continue;
        }
        let due: Vec<String> = state
            .unit(idx)
            .effects()
            .iter()
            .filter(|e| e.is_dot() && e.ticks_remaining > 0 && e.next_tick_at <= state.now)
            .map(|e| e.id.clone())
            .collect();
        for effect_id in due {
            if state.unit(idx).alive() {
                state.emit_dot_tick(idx, &effect_id);
            }
        }
    }
}

/// Expire every timed buff/debuff/shield/stun that has run out. DoTs end
/// through their tick counter, not through `expires_at`.
pub fn process_expirations(state: &mut BattleState) {
    for idx in 0..state.units.len() {
        if !state.unit(idx).alive() {
            continue;
        }
        let due: Vec<String> = state
            .unit(idx)
            .effects()
            .iter()
            .filter(|e| !e.is_dot())
            .filter(|e| matches!(e.expires_at, Some(at) if at <= state.now))
            .map(|e| e.id.clone())
            .collect();
        for effect_id in due {
            state.emit_effect_expired(idx, &effect_id);
        }
    }
}

/// Per-second regeneration: units with a positive hp_regen stat heal that
/// amount at each integer-second crossing. The heal is self-sourced.
pub fn process_regen(state: &mut BattleState) {
    for idx in 0..state.units.len() {
        let unit = state.unit(idx);
        if !unit.alive() || unit.hp_regen() <= 0 || unit.hp() >= unit.max_hp() {
            continue;
        }
        let healer = Some(unit.unit_id().to_string());
        let amount = unit.hp_regen();
        state.emit_heal(healer, idx, amount);
    }
}
