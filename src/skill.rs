//! Declarative skill trees.
//!
//! A skill is a list of typed nodes executed in order when a unit's mana
//! fills. Trees come from external data (serde), are validated once at
//! roster load, and never change during combat. Execution lives in
//! `battle::executor`; this module owns the shapes and the load-time checks.

use serde::{Deserialize, Serialize};

use crate::config;
use crate::effect::{DamageKind, Stat, ValueKind};
use crate::error::EngineError;

// ─── Target selectors and predicates ─────────────────────────────────

/// Where a node's output lands. Evaluated fresh at node execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetSelector {
    #[serde(rename = "self")]
    Caster,
    RandomEnemy,
    EnemyTeam,
    EnemyFront,
    AllyTeam,
    AllyFront,
}

/// Conditional predicates (closed set).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Predicate {
    /// A fresh random enemy draw is below the given HP percentage.
    TargetHpBelowPercent { percent: i64 },
    CasterHpBelowPercent { percent: i64 },
    /// The caster carries an effect of the given kind.
    HasEffect { effect: crate::effect::EffectKind },
    /// Alive allies, excluding the caster, number more than `count`.
    AllyCountAbove { count: usize },
}

/// Stat reference inside a skill node. `Random` resolves to a concrete
/// stat at execution time; events never carry it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkillStat {
    Attack,
    Defense,
    AttackSpeed,
    MaxHp,
    MaxMana,
    HpRegen,
    Random,
}

impl SkillStat {
    pub fn as_concrete(self) -> Option<Stat> {
        match self {
            SkillStat::Attack => Some(Stat::Attack),
            SkillStat::Defense => Some(Stat::Defense),
            SkillStat::AttackSpeed => Some(Stat::AttackSpeed),
            SkillStat::MaxHp => Some(Stat::MaxHp),
            SkillStat::MaxMana => Some(Stat::MaxMana),
            SkillStat::HpRegen => Some(Stat::HpRegen),
            SkillStat::Random => None,
        }
    }
}

// ─── Skill tree ──────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SkillNode {
    Damage {
        amount: i64,
        damage_kind: DamageKind,
        target: TargetSelector,
    },
    Heal {
        amount: i64,
        target: TargetSelector,
    },
    Shield {
        amount: i64,
        /// Seconds; absent = lives until host death.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        duration: Option<f64>,
        target: TargetSelector,
    },
    Buff {
        stat: SkillStat,
        value: i64,
        value_type: ValueKind,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        duration: Option<f64>,
        target: TargetSelector,
    },
    Stun {
        duration: f64,
        target: TargetSelector,
    },
    DamageOverTime {
        per_tick: i64,
        /// Total duration in seconds; tick count = duration / interval.
        duration: f64,
        interval: f64,
        damage_kind: DamageKind,
        target: TargetSelector,
    },
    /// Children run `seconds` of simulation time after this node executes,
    /// scheduled absolutely.
    Delay {
        seconds: f64,
        children: Vec<SkillNode>,
    },
    /// Children run `count` times in order; targets re-resolve each pass.
    Repeat {
        count: u32,
        children: Vec<SkillNode>,
    },
    Conditional {
        predicate: Predicate,
        then: Vec<SkillNode>,
        #[serde(default)]
        r#else: Vec<SkillNode>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Skill {
    pub skill_id: String,
    pub name: String,
    pub nodes: Vec<SkillNode>,
}

impl Skill {
    /// Load-time validation. Invalid skills never reach combat.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.nodes.is_empty() {
            return Err(self.invalid("skill has no nodes"));
        }
        self.check_nodes(&self.nodes, 1)
    }

    fn check_nodes(&self, nodes: &[SkillNode], depth: usize) -> Result<(), EngineError> {
        if depth > config::MAX_SKILL_DEPTH {
            return Err(self.invalid("tree exceeds maximum depth"));
        }
        for node in nodes {
            match node {
                SkillNode::Damage { amount, .. } | SkillNode::Heal { amount, .. } => {
                    if *amount < 0 {
                        return Err(self.invalid("negative amount"));
                    }
                }
                SkillNode::Shield {
                    amount, duration, ..
                } => {
                    if *amount < 0 {
                        return Err(self.invalid("negative shield amount"));
                    }
                    if matches!(duration, Some(d) if *d <= 0.0) {
                        return Err(self.invalid("non-positive shield duration"));
                    }
                }
                SkillNode::Buff { duration, .. } => {
                    if matches!(duration, Some(d) if *d <= 0.0) {
                        return Err(self.invalid("non-positive buff duration"));
                    }
                }
                SkillNode::Stun { duration, .. } => {
                    if *duration <= 0.0 {
                        return Err(self.invalid("non-positive stun duration"));
                    }
                }
                SkillNode::DamageOverTime {
                    per_tick,
                    duration,
                    interval,
                    ..
                } => {
                    if *per_tick < 0 {
                        return Err(self.invalid("negative DoT damage"));
                    }
                    if *interval <= 0.0 || *duration < *interval {
                        return Err(self.invalid("DoT duration shorter than interval"));
                    }
                }
                SkillNode::Delay { seconds, children } => {
                    if *seconds <= 0.0 {
                        return Err(self.invalid("non-positive delay"));
                    }
                    if children.is_empty() {
                        return Err(self.invalid("delay with no children"));
                    }
                    self.check_nodes(children, depth + 1)?;
                }
                SkillNode::Repeat { count, children } => {
                    if *count == 0 || *count > config::MAX_REPEAT_COUNT {
                        return Err(self.invalid("repeat count out of range"));
                    }
                    if children.is_empty() {
                        return Err(self.invalid("repeat with no children"));
                    }
                    self.check_nodes(children, depth + 1)?;
                }
                SkillNode::Conditional { then, r#else, .. } => {
                    if then.is_empty() && r#else.is_empty() {
                        return Err(self.invalid("conditional with no branches"));
                    }
                    self.check_nodes(then, depth + 1)?;
                    self.check_nodes(r#else, depth + 1)?;
                }
            }
        }
        Ok(())
    }

    fn invalid(&self, reason: &str) -> EngineError {
        EngineError::InvalidSkill {
            skill_id: self.skill_id.clone(),
            reason: reason.to_string(),
        }
    }
}
