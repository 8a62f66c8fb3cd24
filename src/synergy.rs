//! Synergy engine: team-scoped trait effects.
//!
//! Two flavors: static buffs emitted as permanent `stat_buff` events at
//! combat start (the reconstructor must see them — nothing is applied
//! silently), and declarative hooks that fire on combat events. Hook
//! rewards either resolve to battle mutator calls or are forwarded to the
//! external economy over a channel; gold and xp never appear as combat
//! events.
//!
//! Descriptors arrive as input, resolved from external trait data. The
//! built-in catalog at the bottom serves the demo binary and the tests.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::debug;

use crate::battle::state::{BattleState, TargetingPreference};
use crate::config;
use crate::effect::{percent_delta, Stat, ValueKind};
use crate::event::payloads::{ManaReason, Winner};
use crate::unit::Side;

// ─── Descriptor shapes (serde-loadable) ──────────────────────────────

/// A flat or percentage buff applied to each trait member at combat start,
/// permanent for the combat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaticBuff {
    pub stat: Stat,
    pub value: i64,
    pub value_type: ValueKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookTrigger {
    OnEnemyDeath,
    OnAllyDeath,
    PerSecond,
    PerRound,
    OnAllyHpBelow,
    OnCombatStart,
    OnWin,
    OnLoss,
    PerTrait,
}

/// Gate conditions evaluated in order before a hook fires. `once_per_round`
/// and `once_per_combat` are equivalent at engine scope: one combat per
/// engine instance; the between-rounds reset belongs to the economy layer.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HookConditions {
    pub chance_percent: Option<i64>,
    pub once_per_round: bool,
    pub once_per_combat: bool,
    pub max_triggers: Option<u32>,
    /// Seconds between firings.
    pub cooldown: Option<f64>,
    /// HP percentage for `on_ally_hp_below`.
    pub threshold_percent: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RewardTarget {
    TraitMembers,
    AllAllies,
    TriggeringUnit,
    RandomAlly,
    RandomEnemy,
    EnemyTeam,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Reward {
    StatBuff {
        stat: Stat,
        value: i64,
        value_type: ValueKind,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        duration: Option<f64>,
        target: RewardTarget,
    },
    EnemyDebuff {
        stat: Stat,
        /// Positive magnitude; applied negated.
        value: i64,
        value_type: ValueKind,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        duration: Option<f64>,
        target: RewardTarget,
    },
    Heal {
        amount: i64,
        target: RewardTarget,
    },
    ManaRegen {
        amount: i64,
        target: RewardTarget,
    },
    /// Scales subsequent synergy buff/debuff values for this team.
    BuffAmplifier {
        percent: i64,
    },
    /// Flat buff whose value scales with the live trait-member count.
    DynamicScaling {
        stat: Stat,
        value_per_member: i64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        duration: Option<f64>,
        target: RewardTarget,
    },
    TargetingPreference {
        preference: TargetingPreference,
    },
    /// Forwarded to the economy; no combat event.
    Resource {
        resource: String,
        amount: i64,
    },
    /// Opaque reward tag forwarded to the economy.
    Special {
        tag: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SynergyHook {
    pub trigger: HookTrigger,
    #[serde(default)]
    pub conditions: HookConditions,
    pub rewards: Vec<Reward>,
}

/// One active trait for one team.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SynergyDescriptor {
    pub trait_name: String,
    pub side: Side,
    /// Minimum trait members for the synergy to switch on.
    pub tier: u32,
    #[serde(default)]
    pub static_buffs: Vec<StaticBuff>,
    #[serde(default)]
    pub hooks: Vec<SynergyHook>,
}

/// A reward that crosses the core/economy boundary.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EconomyReward {
    pub side: Side,
    pub trait_name: String,
    pub kind: String,
    pub amount: i64,
}

// ─── Runtime state ───────────────────────────────────────────────────

#[derive(Debug, Default)]
struct HookState {
    triggers: u32,
    fired: bool,
    last_trigger: Option<u64>,
    /// Units a threshold hook already fired for.
    fired_for: HashSet<String>,
}

struct ActiveSynergy {
    desc: SynergyDescriptor,
    states: Vec<HookState>,
    /// Tier membership, decided once at combat start.
    active: bool,
}

pub struct SynergyEngine {
    synergies: Vec<ActiveSynergy>,
    /// Per-side buff value multiplier in percent (100 = neutral).
    amplifier: [i64; 2],
    economy: Option<mpsc::UnboundedSender<EconomyReward>>,
}

impl SynergyEngine {
    /// Descriptors are re-ordered team A first (input order within a team)
    /// so hook firing order is deterministic and documented.
    pub fn new(
        descriptors: Vec<SynergyDescriptor>,
        economy: Option<mpsc::UnboundedSender<EconomyReward>>,
    ) -> SynergyEngine {
        let mut ordered: Vec<SynergyDescriptor> = Vec::with_capacity(descriptors.len());
        for side in [Side::A, Side::B] {
            ordered.extend(descriptors.iter().filter(|d| d.side == side).cloned());
        }
        let synergies = ordered
            .into_iter()
            .map(|desc| {
                let states = desc.hooks.iter().map(|_| HookState::default()).collect();
                ActiveSynergy {
                    desc,
                    states,
                    active: false,
                }
            })
            .collect();
        SynergyEngine {
            synergies,
            amplifier: [100, 100],
            economy,
        }
    }

    /// Install (or replace) the economy forwarding channel.
    pub fn set_economy(&mut self, tx: mpsc::UnboundedSender<EconomyReward>) {
        self.economy = Some(tx);
    }

    fn members(state: &BattleState, side: Side, trait_name: &str) -> Vec<usize> {
        state
            .alive_of(side)
            .into_iter()
            .filter(|&i| state.unit(i).has_trait(trait_name))
            .collect()
    }

    /// Combat start: decide activation, emit static buffs as real events,
    /// then fire `per_trait`, `on_combat_start`, and `per_round` hooks.
    pub fn apply_combat_start(&mut self, state: &mut BattleState) {
        for i in 0..self.synergies.len() {
            let (side, trait_name, tier) = {
                let d = &self.synergies[i].desc;
                (d.side, d.trait_name.clone(), d.tier)
            };
            let members = Self::members(state, side, &trait_name);
            let active = members.len() as u32 >= tier.max(1);
            self.synergies[i].active = active;
            if !active {
                continue;
            }
            let static_buffs = self.synergies[i].desc.static_buffs.clone();
            for buff in &static_buffs {
                for &m in &members {
                    state.emit_stat_buff(m, buff.stat, buff.value, buff.value_type, None, None);
                }
            }
        }

        for trigger in [
            HookTrigger::PerTrait,
            HookTrigger::OnCombatStart,
            HookTrigger::PerRound,
        ] {
            self.fire_matching(state, trigger, |_, _| true, None);
        }
    }

    /// A unit died; fire kill and loss triggers. The killer (if it belongs
    /// to the hook's team) is the triggering unit for `on_enemy_death`;
    /// the victim's side drives `on_ally_death` with no triggering unit
    /// (the victim is already gone).
    pub fn on_death(
        &mut self,
        state: &mut BattleState,
        victim_side: Side,
        killer_id: Option<&str>,
    ) {
        let killer_idx = killer_id
            .and_then(|id| state.unit_idx(id))
            .filter(|&i| state.unit(i).alive())
            .filter(|&i| state.unit(i).side() == victim_side.opponent());

        self.fire_matching(
            state,
            HookTrigger::OnEnemyDeath,
            |side, _| side == victim_side.opponent(),
            killer_idx,
        );
        self.fire_matching(
            state,
            HookTrigger::OnAllyDeath,
            |side, _| side == victim_side,
            None,
        );
    }

    /// Integer-second crossing.
    pub fn on_second(&mut self, state: &mut BattleState) {
        self.fire_matching(state, HookTrigger::PerSecond, |_, _| true, None);
    }

    /// Scan for allies under their hook's HP threshold. Each unit trips a
    /// given hook at most once per combat.
    pub fn check_hp_thresholds(&mut self, state: &mut BattleState) {
        for i in 0..self.synergies.len() {
            if !self.synergies[i].active {
                continue;
            }
            let side = self.synergies[i].desc.side;
            for h in 0..self.synergies[i].desc.hooks.len() {
                if self.synergies[i].desc.hooks[h].trigger != HookTrigger::OnAllyHpBelow {
                    continue;
                }
                let threshold = self.synergies[i].desc.hooks[h]
                    .conditions
                    .threshold_percent
                    .unwrap_or(50);
                let candidates: Vec<usize> = state
                    .alive_of(side)
                    .into_iter()
                    .filter(|&u| {
                        let unit = state.unit(u);
                        unit.hp() * 100 < threshold * unit.max_hp()
                    })
                    .collect();
                for unit_idx in candidates {
                    let unit_id = state.unit(unit_idx).unit_id().to_string();
                    if self.synergies[i].states[h].fired_for.contains(&unit_id) {
                        continue;
                    }
                    if self.try_fire(state, i, h, Some(unit_idx)) {
                        self.synergies[i].states[h].fired_for.insert(unit_id);
                    }
                }
            }
        }
    }

    /// Outcome is decided; `on_win`/`on_loss` fire before `combat_end`.
    /// A draw satisfies neither.
    pub fn on_result(&mut self, state: &mut BattleState, winner: Winner) {
        let winning_side = match winner {
            Winner::TeamA => Some(Side::A),
            Winner::TeamB => Some(Side::B),
            Winner::Draw => None,
        };
        let Some(winning_side) = winning_side else {
            return;
        };
        self.fire_matching(
            state,
            HookTrigger::OnWin,
            |side, _| side == winning_side,
            None,
        );
        self.fire_matching(
            state,
            HookTrigger::OnLoss,
            |side, _| side == winning_side.opponent(),
            None,
        );
    }

    fn fire_matching(
        &mut self,
        state: &mut BattleState,
        trigger: HookTrigger,
        side_filter: impl Fn(Side, &str) -> bool,
        trigger_unit: Option<usize>,
    ) {
        for i in 0..self.synergies.len() {
            if !self.synergies[i].active {
                continue;
            }
            let side = self.synergies[i].desc.side;
            let trait_name = self.synergies[i].desc.trait_name.clone();
            if !side_filter(side, &trait_name) {
                continue;
            }
            for h in 0..self.synergies[i].desc.hooks.len() {
                if self.synergies[i].desc.hooks[h].trigger == trigger {
                    self.try_fire(state, i, h, trigger_unit);
                }
            }
        }
    }

    /// Evaluate conditions in a fixed order, then resolve rewards.
    /// Returns whether the hook fired.
    fn try_fire(
        &mut self,
        state: &mut BattleState,
        syn_idx: usize,
        hook_idx: usize,
        trigger_unit: Option<usize>,
    ) -> bool {
        let hook = self.synergies[syn_idx].desc.hooks[hook_idx].clone();
        {
            let hs = &self.synergies[syn_idx].states[hook_idx];
            let once = hook.conditions.once_per_combat || hook.conditions.once_per_round;
            if once && hs.fired {
                return false;
            }
            if matches!(hook.conditions.max_triggers, Some(max) if hs.triggers >= max) {
                return false;
            }
            if let (Some(cd), Some(last)) = (hook.conditions.cooldown, hs.last_trigger) {
                if state.now < last + config::secs_to_ticks(cd) {
                    return false;
                }
            }
        }
        if let Some(chance) = hook.conditions.chance_percent {
            if state.rng.gen_range(0..100) >= chance {
                return false;
            }
        }

        let (side, trait_name) = {
            let d = &self.synergies[syn_idx].desc;
            (d.side, d.trait_name.clone())
        };
        for reward in &hook.rewards {
            self.apply_reward(state, side, &trait_name, reward, trigger_unit);
        }

        let hs = &mut self.synergies[syn_idx].states[hook_idx];
        hs.fired = true;
        hs.triggers += 1;
        hs.last_trigger = Some(state.now);
        true
    }

    fn resolve_reward_targets(
        state: &mut BattleState,
        side: Side,
        trait_name: &str,
        target: RewardTarget,
        trigger_unit: Option<usize>,
    ) -> Vec<usize> {
        match target {
            RewardTarget::TraitMembers => Self::members(state, side, trait_name),
            RewardTarget::AllAllies => state.alive_of(side),
            RewardTarget::TriggeringUnit => trigger_unit
                .filter(|&i| state.unit(i).alive())
                .map(|i| vec![i])
                .unwrap_or_default(),
            RewardTarget::RandomAlly => {
                let allies = state.alive_of(side);
                pick_one(state, allies)
            }
            RewardTarget::RandomEnemy => {
                let enemies = state.alive_of(side.opponent());
                pick_one(state, enemies)
            }
            RewardTarget::EnemyTeam => state.alive_of(side.opponent()),
        }
    }

    fn apply_reward(
        &mut self,
        state: &mut BattleState,
        side: Side,
        trait_name: &str,
        reward: &Reward,
        trigger_unit: Option<usize>,
    ) {
        let amp = self.amplifier[side.index()];
        match reward {
            Reward::StatBuff {
                stat,
                value,
                value_type,
                duration,
                target,
            } => {
                let value = percent_delta(*value, amp);
                let ticks = duration.map(config::secs_to_ticks);
                for t in
                    Self::resolve_reward_targets(state, side, trait_name, *target, trigger_unit)
                {
                    state.emit_stat_buff(t, *stat, value, *value_type, ticks, None);
                }
            }
            Reward::EnemyDebuff {
                stat,
                value,
                value_type,
                duration,
                target,
            } => {
                let value = -percent_delta(value.abs(), amp);
                let ticks = duration.map(config::secs_to_ticks);
                for t in
                    Self::resolve_reward_targets(state, side, trait_name, *target, trigger_unit)
                {
                    state.emit_stat_buff(t, *stat, value, *value_type, ticks, None);
                }
            }
            Reward::Heal { amount, target } => {
                for t in
                    Self::resolve_reward_targets(state, side, trait_name, *target, trigger_unit)
                {
                    state.emit_heal(None, t, *amount);
                }
            }
            Reward::ManaRegen { amount, target } => {
                for t in
                    Self::resolve_reward_targets(state, side, trait_name, *target, trigger_unit)
                {
                    let mana = state.unit(t).mana() + amount;
                    state.emit_mana_update(t, mana, ManaReason::Regen);
                }
            }
            Reward::BuffAmplifier { percent } => {
                self.amplifier[side.index()] = *percent;
            }
            Reward::DynamicScaling {
                stat,
                value_per_member,
                duration,
                target,
            } => {
                let count = Self::members(state, side, trait_name).len() as i64;
                let value = percent_delta(value_per_member * count, amp);
                let ticks = duration.map(config::secs_to_ticks);
                for t in
                    Self::resolve_reward_targets(state, side, trait_name, *target, trigger_unit)
                {
                    state.emit_stat_buff(t, *stat, value, ValueKind::Flat, ticks, None);
                }
            }
            Reward::TargetingPreference { preference } => {
                state.targeting[side.index()] = Some(*preference);
            }
            Reward::Resource { resource, amount } => {
                self.forward(side, trait_name, resource, *amount);
            }
            Reward::Special { tag } => {
                self.forward(side, trait_name, tag, 0);
            }
        }
    }

    fn forward(&mut self, side: Side, trait_name: &str, kind: &str, amount: i64) {
        let reward = EconomyReward {
            side,
            trait_name: trait_name.to_string(),
            kind: kind.to_string(),
            amount,
        };
        match &self.economy {
            Some(tx) => {
                if tx.send(reward).is_err() {
                    debug!(kind, "economy receiver gone, reward discarded");
                }
            }
            None => debug!(kind, "no economy sink configured, reward discarded"),
        }
    }
}

fn pick_one(state: &mut BattleState, pool: Vec<usize>) -> Vec<usize> {
    if pool.is_empty() {
        Vec::new()
    } else {
        let pick = state.rng.gen_range(0..pool.len());
        vec![pool[pick]]
    }
}

// ─── Built-in catalog ────────────────────────────────────────────────

/// Trait templates without a side; `descriptors_for` binds them to the
/// traits actually present on a roster.
#[derive(Debug, Clone)]
pub struct CatalogEntry {
    pub trait_name: &'static str,
    pub tier: u32,
    pub static_buffs: Vec<StaticBuff>,
    pub hooks: Vec<SynergyHook>,
}

pub static CATALOG: Lazy<Vec<CatalogEntry>> = Lazy::new(|| {
    vec![
        CatalogEntry {
            trait_name: "ironclad",
            tier: 2,
            static_buffs: vec![StaticBuff {
                stat: Stat::Defense,
                value: 15,
                value_type: ValueKind::Percentage,
            }],
            hooks: vec![SynergyHook {
                trigger: HookTrigger::OnAllyHpBelow,
                conditions: HookConditions {
                    threshold_percent: Some(40),
                    ..HookConditions::default()
                },
                rewards: vec![Reward::StatBuff {
                    stat: Stat::Defense,
                    value: 20,
                    value_type: ValueKind::Flat,
                    duration: Some(5.0),
                    target: RewardTarget::TriggeringUnit,
                }],
            }],
        },
        CatalogEntry {
            trait_name: "emberborn",
            tier: 1,
            static_buffs: vec![StaticBuff {
                stat: Stat::Attack,
                value: 10,
                value_type: ValueKind::Percentage,
            }],
            hooks: vec![SynergyHook {
                trigger: HookTrigger::OnEnemyDeath,
                conditions: HookConditions::default(),
                rewards: vec![Reward::StatBuff {
                    stat: Stat::Attack,
                    value: 5,
                    value_type: ValueKind::Flat,
                    duration: None,
                    target: RewardTarget::TraitMembers,
                }],
            }],
        },
        CatalogEntry {
            trait_name: "devoted",
            tier: 1,
            static_buffs: vec![],
            hooks: vec![SynergyHook {
                trigger: HookTrigger::PerSecond,
                conditions: HookConditions::default(),
                rewards: vec![Reward::ManaRegen {
                    amount: 5,
                    target: RewardTarget::TraitMembers,
                }],
            }],
        },
        CatalogEntry {
            trait_name: "swift",
            tier: 1,
            static_buffs: vec![StaticBuff {
                stat: Stat::AttackSpeed,
                value: 10,
                value_type: ValueKind::Percentage,
            }],
            hooks: vec![SynergyHook {
                trigger: HookTrigger::OnWin,
                conditions: HookConditions {
                    once_per_combat: true,
                    ..HookConditions::default()
                },
                rewards: vec![Reward::Resource {
                    resource: "gold".into(),
                    amount: 1,
                }],
            }],
        },
    ]
});

/// Bind catalog entries to one team's roster: a descriptor per catalog
/// trait that at least one unit on the team carries.
pub fn descriptors_for(side: Side, specs: &[crate::unit::UnitSpec]) -> Vec<SynergyDescriptor> {
    CATALOG
        .iter()
        .filter(|entry| {
            specs
                .iter()
                .any(|s| s.traits.iter().any(|t| t == entry.trait_name))
        })
        .map(|entry| SynergyDescriptor {
            trait_name: entry.trait_name.to_string(),
            side,
            tier: entry.tier,
            static_buffs: entry.static_buffs.clone(),
            hooks: entry.hooks.clone(),
        })
        .collect()
}
