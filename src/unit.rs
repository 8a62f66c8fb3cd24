//! Unit configuration and authoritative runtime state.
//!
//! `UnitSpec` is the fully-specified input a roster carries; `Unit` is the
//! single authoritative representation of a combatant during a fight. All
//! mutable fields on `Unit` are private — state changes go through the
//! crate-internal setters, which only the battle mutators call. Consumers
//! read through getters and the event stream.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::config;
use crate::effect::{Effect, Stat};
use crate::error::EngineError;
use crate::skill::{Skill, SkillNode, SkillStat, TargetSelector};

// ─── Sides and rows ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    A,
    B,
}

impl Side {
    pub fn opponent(self) -> Side {
        match self {
            Side::A => Side::B,
            Side::B => Side::A,
        }
    }

    pub fn index(self) -> usize {
        match self {
            Side::A => 0,
            Side::B => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Row {
    Front,
    Back,
}

// ─── Input configuration ─────────────────────────────────────────────

/// One fully-specified combatant, as provided by the roster input. Any
/// cross-combat carryover (persistent buffs, star upgrades) must already be
/// folded into these numbers by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitSpec {
    pub unit_id: String,
    pub name: String,
    pub row: Row,
    pub max_hp: i64,
    pub attack: i64,
    pub defense: i64,
    /// Centi-attacks per second (100 = 1.0 attacks/s).
    pub attack_speed: i64,
    pub max_mana: i64,
    pub mana_on_attack: i64,
    pub mana_on_hit: i64,
    pub star_level: u32,
    #[serde(default)]
    pub traits: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skill: Option<Skill>,
}

impl UnitSpec {
    fn validate(&self) -> Result<(), EngineError> {
        let fail = |reason: String| Err(EngineError::InvalidRoster(reason));
        if self.unit_id.is_empty() {
            return fail("empty unit id".into());
        }
        if self.max_hp <= 0 {
            return fail(format!("unit `{}` has non-positive max_hp", self.unit_id));
        }
        if self.attack < 0 || self.defense < 0 {
            return fail(format!("unit `{}` has negative combat stats", self.unit_id));
        }
        if self.attack_speed <= 0 {
            return fail(format!("unit `{}` has non-positive attack speed", self.unit_id));
        }
        if self.max_mana < 0 || self.mana_on_attack < 0 || self.mana_on_hit < 0 {
            return fail(format!("unit `{}` has negative mana stats", self.unit_id));
        }
        if self.star_level == 0 {
            return fail(format!("unit `{}` has star level 0", self.unit_id));
        }
        if let Some(skill) = &self.skill {
            skill.validate()?;
            // A zero-mana caster would cast every tick.
            if self.max_mana == 0 {
                return fail(format!("unit `{}` has a skill but no mana pool", self.unit_id));
            }
        }
        Ok(())
    }
}

/// Validate both rosters before any event is emitted: non-empty teams,
/// in-range stats, valid skills, and unit ids unique across *both* teams.
pub fn validate_rosters(team_a: &[UnitSpec], team_b: &[UnitSpec]) -> Result<(), EngineError> {
    if team_a.is_empty() || team_b.is_empty() {
        return Err(EngineError::InvalidRoster("empty team".into()));
    }
    let mut seen = std::collections::HashSet::new();
    for spec in team_a.iter().chain(team_b.iter()) {
        spec.validate()?;
        if !seen.insert(spec.unit_id.as_str()) {
            return Err(EngineError::DuplicateUnitId(spec.unit_id.clone()));
        }
    }
    Ok(())
}

// ─── Runtime unit ────────────────────────────────────────────────────

/// Authoritative per-combatant state. Constructed once per combat.
#[derive(Debug, Clone)]
pub struct Unit {
    // Identity
    unit_id: String,
    name: String,
    side: Side,
    row: Row,
    index: usize,

    // Immutable base stats
    base_max_hp: i64,
    base_attack: i64,
    base_defense: i64,
    base_attack_speed: i64,
    base_max_mana: i64,
    mana_on_attack: i64,
    mana_on_hit: i64,
    star_level: u32,
    traits: Vec<String>,
    skill: Option<Skill>,

    // Authoritative mutable state
    hp: i64,
    mana: i64,
    shield: i64,
    attack: i64,
    defense: i64,
    attack_speed: i64,
    max_hp: i64,
    max_mana: i64,
    hp_regen: i64,
    alive: bool,
    effects: Vec<Effect>,

    // Scheduling
    next_attack_at: u64,
    stun_until: Option<u64>,
}

impl Unit {
    pub fn from_spec(spec: &UnitSpec, side: Side, index: usize) -> Unit {
        Unit {
            unit_id: spec.unit_id.clone(),
            name: spec.name.clone(),
            side,
            row: spec.row,
            index,
            base_max_hp: spec.max_hp,
            base_attack: spec.attack,
            base_defense: spec.defense,
            base_attack_speed: spec.attack_speed,
            base_max_mana: spec.max_mana,
            mana_on_attack: spec.mana_on_attack,
            mana_on_hit: spec.mana_on_hit,
            star_level: spec.star_level,
            traits: spec.traits.clone(),
            skill: spec.skill.clone(),
            hp: spec.max_hp,
            mana: 0,
            shield: 0,
            attack: spec.attack,
            defense: spec.defense,
            attack_speed: spec.attack_speed,
            max_hp: spec.max_hp,
            max_mana: spec.max_mana,
            hp_regen: 0,
            alive: true,
            effects: Vec::new(),
            next_attack_at: config::attack_interval_ticks(spec.attack_speed),
            stun_until: None,
        }
    }

    // ── Read access ─────────────────────────────────────────────────

    pub fn unit_id(&self) -> &str {
        &self.unit_id
    }
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn side(&self) -> Side {
        self.side
    }
    pub fn row(&self) -> Row {
        self.row
    }
    pub fn index(&self) -> usize {
        self.index
    }
    pub fn hp(&self) -> i64 {
        self.hp
    }
    pub fn max_hp(&self) -> i64 {
        self.max_hp
    }
    pub fn mana(&self) -> i64 {
        self.mana
    }
    pub fn max_mana(&self) -> i64 {
        self.max_mana
    }
    pub fn shield(&self) -> i64 {
        self.shield
    }
    pub fn attack(&self) -> i64 {
        self.attack
    }
    pub fn defense(&self) -> i64 {
        self.defense
    }
    pub fn attack_speed(&self) -> i64 {
        self.attack_speed
    }
    pub fn hp_regen(&self) -> i64 {
        self.hp_regen
    }
    pub fn alive(&self) -> bool {
        self.alive
    }
    pub fn star_level(&self) -> u32 {
        self.star_level
    }
    pub fn traits(&self) -> &[String] {
        &self.traits
    }
    pub fn skill(&self) -> Option<&Skill> {
        self.skill.as_ref()
    }
    pub fn effects(&self) -> &[Effect] {
        &self.effects
    }
    pub fn next_attack_at(&self) -> u64 {
        self.next_attack_at
    }
    pub fn stun_until(&self) -> Option<u64> {
        self.stun_until
    }
    pub fn mana_on_attack(&self) -> i64 {
        self.mana_on_attack
    }
    pub fn mana_on_hit(&self) -> i64 {
        self.mana_on_hit
    }

    pub fn is_stunned(&self, now: u64) -> bool {
        matches!(self.stun_until, Some(until) if until > now)
    }

    pub fn has_trait(&self, name: &str) -> bool {
        self.traits.iter().any(|t| t == name)
    }

    /// Current value of a buffable stat.
    pub fn stat_value(&self, stat: Stat) -> i64 {
        match stat {
            Stat::Attack => self.attack,
            Stat::Defense => self.defense,
            Stat::AttackSpeed => self.attack_speed,
            Stat::MaxHp => self.max_hp,
            Stat::MaxMana => self.max_mana,
            Stat::HpRegen => self.hp_regen,
        }
    }

    /// Base (pre-effect) value of a buffable stat. Percentage buffs resolve
    /// against this, not the already-buffed current value.
    pub fn base_value(&self, stat: Stat) -> i64 {
        match stat {
            Stat::Attack => self.base_attack,
            Stat::Defense => self.base_defense,
            Stat::AttackSpeed => self.base_attack_speed,
            Stat::MaxHp => self.base_max_hp,
            Stat::MaxMana => self.base_max_mana,
            Stat::HpRegen => 0,
        }
    }

    // ── Crate-internal mutation (battle mutators only) ──────────────

    pub(crate) fn set_hp(&mut self, hp: i64) {
        self.hp = hp.clamp(0, self.max_hp);
    }

    pub(crate) fn set_mana(&mut self, mana: i64) {
        self.mana = mana.clamp(0, self.max_mana);
    }

    pub(crate) fn set_shield(&mut self, shield: i64) {
        self.shield = shield.max(0);
    }

    pub(crate) fn set_alive(&mut self, alive: bool) {
        self.alive = alive;
    }

    pub(crate) fn set_next_attack_at(&mut self, tick: u64) {
        self.next_attack_at = tick;
    }

    /// Stuns only ever push the wake-up time later.
    pub(crate) fn raise_stun_until(&mut self, until: u64) {
        self.stun_until = Some(self.stun_until.map_or(until, |cur| cur.max(until)));
    }

    /// Apply a signed delta to a stat, clamping at the stat's floor.
    /// Returns the delta actually applied, which is what the effect records
    /// and what expiration reverts.
    pub(crate) fn apply_stat_delta(&mut self, stat: Stat, delta: i64) -> i64 {
        let floor = match stat {
            Stat::AttackSpeed => config::MIN_ATTACK_SPEED,
            Stat::MaxHp => 1,
            _ => 0,
        };
        let current = self.stat_value(stat);
        let next = (current + delta).max(floor);
        let applied = next - current;
        match stat {
            Stat::Attack => self.attack = next,
            Stat::Defense => self.defense = next,
            Stat::AttackSpeed => self.attack_speed = next,
            Stat::MaxHp => {
                self.max_hp = next;
                // Shrinking max clamps current hp; growing max never heals.
                self.hp = self.hp.min(self.max_hp);
            }
            Stat::MaxMana => {
                self.max_mana = next;
                self.mana = self.mana.min(self.max_mana);
            }
            Stat::HpRegen => self.hp_regen = next,
        }
        applied
    }

    pub(crate) fn push_effect(&mut self, effect: Effect) {
        self.effects.push(effect);
    }

    pub(crate) fn take_effect(&mut self, effect_id: &str) -> Option<Effect> {
        let pos = self.effects.iter().position(|e| e.id == effect_id)?;
        Some(self.effects.remove(pos))
    }

    pub(crate) fn effect_mut(&mut self, effect_id: &str) -> Option<&mut Effect> {
        self.effects.iter_mut().find(|e| e.id == effect_id)
    }
}

// ─── Demo archetypes ─────────────────────────────────────────────────

/// Small built-in roster templates used by the demo binary and the test
/// suite. Real deployments construct `UnitSpec`s from their own data.
pub static ARCHETYPES: Lazy<Vec<UnitSpec>> = Lazy::new(|| {
    use crate::effect::{DamageKind, ValueKind};
    vec![
        UnitSpec {
            unit_id: "vanguard".into(),
            name: "Vanguard".into(),
            row: Row::Front,
            max_hp: 900,
            attack: 45,
            defense: 30,
            attack_speed: 80,
            max_mana: 100,
            mana_on_attack: 10,
            mana_on_hit: 8,
            star_level: 1,
            traits: vec!["ironclad".into()],
            skill: Some(Skill {
                skill_id: "bulwark".into(),
                name: "Bulwark".into(),
                nodes: vec![
                    SkillNode::Shield {
                        amount: 200,
                        duration: Some(4.0),
                        target: TargetSelector::Caster,
                    },
                    SkillNode::Buff {
                        stat: SkillStat::Defense,
                        value: 20,
                        value_type: ValueKind::Percentage,
                        duration: Some(4.0),
                        target: TargetSelector::AllyFront,
                    },
                ],
            }),
        },
        UnitSpec {
            unit_id: "pyromancer".into(),
            name: "Pyromancer".into(),
            row: Row::Back,
            max_hp: 550,
            attack: 40,
            defense: 10,
            attack_speed: 70,
            max_mana: 80,
            mana_on_attack: 12,
            mana_on_hit: 6,
            star_level: 1,
            traits: vec!["emberborn".into()],
            skill: Some(Skill {
                skill_id: "immolate".into(),
                name: "Immolate".into(),
                nodes: vec![
                    SkillNode::Damage {
                        amount: 120,
                        damage_kind: DamageKind::Magical,
                        target: TargetSelector::RandomEnemy,
                    },
                    SkillNode::DamageOverTime {
                        per_tick: 15,
                        duration: 3.0,
                        interval: 1.0,
                        damage_kind: DamageKind::Magical,
                        target: TargetSelector::RandomEnemy,
                    },
                ],
            }),
        },
        UnitSpec {
            unit_id: "cleric".into(),
            name: "Cleric".into(),
            row: Row::Back,
            max_hp: 600,
            attack: 25,
            defense: 15,
            attack_speed: 90,
            max_mana: 60,
            mana_on_attack: 10,
            mana_on_hit: 10,
            star_level: 1,
            traits: vec!["devoted".into()],
            skill: Some(Skill {
                skill_id: "radiance".into(),
                name: "Radiance".into(),
                nodes: vec![
                    SkillNode::Heal {
                        amount: 90,
                        target: TargetSelector::AllyTeam,
                    },
                    SkillNode::Conditional {
                        predicate: crate::skill::Predicate::TargetHpBelowPercent { percent: 40 },
                        then: vec![SkillNode::Stun {
                            duration: 1.0,
                            target: TargetSelector::RandomEnemy,
                        }],
                        r#else: vec![SkillNode::Damage {
                            amount: 45,
                            damage_kind: DamageKind::Holy,
                            target: TargetSelector::RandomEnemy,
                        }],
                    },
                ],
            }),
        },
        UnitSpec {
            unit_id: "duelist".into(),
            name: "Duelist".into(),
            row: Row::Front,
            max_hp: 700,
            attack: 55,
            defense: 20,
            attack_speed: 120,
            max_mana: 90,
            mana_on_attack: 9,
            mana_on_hit: 7,
            star_level: 1,
            traits: vec!["ironclad".into(), "swift".into()],
            skill: Some(Skill {
                skill_id: "flurry".into(),
                name: "Flurry".into(),
                nodes: vec![SkillNode::Repeat {
                    count: 3,
                    children: vec![SkillNode::Damage {
                        amount: 35,
                        damage_kind: DamageKind::Physical,
                        target: TargetSelector::RandomEnemy,
                    }],
                }],
            }),
        },
    ]
});

/// Build a demo team from the archetype catalog, re-keying unit ids so
/// both sides can use the same templates.
pub fn demo_team(prefix: &str) -> Vec<UnitSpec> {
    ARCHETYPES
        .iter()
        .enumerate()
        .map(|(i, spec)| {
            let mut s = spec.clone();
            s.unit_id = format!("{prefix}-{}-{i}", spec.unit_id);
            s
        })
        .collect()
}
