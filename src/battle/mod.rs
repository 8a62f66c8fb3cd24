//! Combat scheduler.
//!
//! Owns one combat from roster validation to the `combat_end` event. The
//! tick is the unit of atomicity: processors run to completion inside a
//! tick, and cancellation is only observed between ticks — a cancelled
//! combat emits nothing after the last complete tick.
//!
//! Phase order inside a tick is part of the protocol: attacks, skill
//! casts, DoT ticks, expirations, hp-threshold hooks, then (on integer
//! seconds) regeneration, per-second hooks, and the snapshot.

pub mod attack;
pub mod executor;
pub mod lifecycle;
pub mod state;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{error, info};

use crate::config;
use crate::error::EngineError;
use crate::event::payloads::{CombatEndPayload, SurvivorRecord, Winner};
use crate::event::EventRecord;
use crate::replay;
use crate::synergy::{EconomyReward, SynergyDescriptor, SynergyEngine};
use crate::unit::{validate_rosters, Side, Unit, UnitSpec};

use state::BattleState;

// ─── Inputs and outputs ──────────────────────────────────────────────

/// Everything a combat needs. Serde-friendly so match setups can be
/// stored and replayed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CombatConfig {
    pub team_a: Vec<UnitSpec>,
    pub team_b: Vec<UnitSpec>,
    #[serde(default)]
    pub synergies: Vec<SynergyDescriptor>,
    pub seed: u64,
}

/// How the combat ended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Winner(Winner),
    Cancelled,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CombatReport {
    pub verdict: Verdict,
    /// Simulated seconds elapsed.
    pub duration: f64,
    pub survivors_a: Vec<SurvivorRecord>,
    pub survivors_b: Vec<SurvivorRecord>,
    pub survivor_star_sum: u32,
    pub loser_hp_damage: i64,
    /// The full authoritative event log.
    pub events: Vec<EventRecord>,
}

/// Cancellation handle; safe to share with the caller. The flag is read
/// between ticks only.
#[derive(Debug, Clone)]
pub struct CombatHandle {
    cancel: Arc<AtomicBool>,
}

impl CombatHandle {
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }
}

// ─── Simulator ───────────────────────────────────────────────────────

pub struct Simulator {
    state: BattleState,
    synergy: SynergyEngine,
    cancel: Arc<AtomicBool>,
}

impl Simulator {
    /// Validate rosters and build the combat. No events are emitted until
    /// `run`.
    pub fn new(config: CombatConfig) -> Result<Simulator, EngineError> {
        validate_rosters(&config.team_a, &config.team_b)?;

        let mut units = Vec::with_capacity(config.team_a.len() + config.team_b.len());
        for (i, spec) in config.team_a.iter().enumerate() {
            units.push(Unit::from_spec(spec, Side::A, i));
        }
        for (i, spec) in config.team_b.iter().enumerate() {
            units.push(Unit::from_spec(spec, Side::B, i));
        }

        Ok(Simulator {
            state: BattleState::new(units, config.seed),
            synergy: SynergyEngine::new(config.synergies, None),
            cancel: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Open a live event channel. Combine with `events_since` for catch-up
    /// subscriptions (see `stream`).
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<EventRecord> {
        self.state.dispatcher.subscribe()
    }

    pub fn add_consumer(&mut self, tx: mpsc::UnboundedSender<EventRecord>) {
        self.state.dispatcher.add_consumer(tx);
    }

    /// Events already sealed, with `seq` strictly after `after_seq`.
    pub fn events_since(&self, after_seq: u64) -> Vec<EventRecord> {
        self.state.dispatcher.events_since(after_seq)
    }

    /// Route `resource`/`special` synergy rewards to the economy.
    pub fn set_economy_sink(&mut self, tx: mpsc::UnboundedSender<EconomyReward>) {
        self.synergy.set_economy(tx);
    }

    pub fn handle(&self) -> CombatHandle {
        CombatHandle {
            cancel: Arc::clone(&self.cancel),
        }
    }

    /// Run the combat to completion synchronously.
    pub fn run(mut self) -> Result<CombatReport, EngineError> {
        self.init();
        loop {
            if let Some(report) = self.step()? {
                return Ok(report);
            }
        }
    }

    /// Run the combat with one tick per `tick_duration` of wall time,
    /// yielding between ticks so consumers can drain. This is the
    /// realtime-paced replay mode.
    pub async fn run_paced(
        mut self,
        tick_duration: std::time::Duration,
    ) -> Result<CombatReport, EngineError> {
        self.init();
        let mut interval = tokio::time::interval(tick_duration.max(std::time::Duration::from_millis(1)));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            interval.tick().await;
            if let Some(report) = self.step()? {
                return Ok(report);
            }
        }
    }

    /// Initialization events, in protocol order, before time advances:
    /// roster, synergy statics + start hooks, then the t=0 snapshot.
    fn init(&mut self) {
        info!(
            team_a = self.state.alive_count(Side::A),
            team_b = self.state.alive_count(Side::B),
            "combat starting"
        );
        self.state.emit_units_init();
        self.synergy.apply_combat_start(&mut self.state);
        self.state.emit_snapshot();
    }

    /// One tick: advance the clock, run the phases, settle deaths, then
    /// check for termination. `Ok(Some(report))` ends the combat.
    fn step(&mut self) -> Result<Option<CombatReport>, EngineError> {
        if self.cancel.load(Ordering::Relaxed) {
            info!("combat cancelled between ticks");
            return Ok(Some(self.report(Verdict::Cancelled, Winner::Draw, true)));
        }

        self.state.now += 1;

        attack::process_attacks(&mut self.state);
        self.settle_deaths();
        executor::process_skills(&mut self.state);
        self.settle_deaths();
        lifecycle::process_dot_ticks(&mut self.state);
        self.settle_deaths();
        lifecycle::process_expirations(&mut self.state);
        self.synergy.check_hp_thresholds(&mut self.state);

        if self.state.now % config::SNAPSHOT_INTERVAL_TICKS == 0 {
            lifecycle::process_regen(&mut self.state);
            self.synergy.on_second(&mut self.state);
            self.state.emit_snapshot();
        }

        if let Some(reason) = self.state.violation.clone() {
            self.state.emit_combat_error(reason.clone());
            error!(%reason, "combat aborted");
            return Err(EngineError::ProtocolViolation(reason));
        }

        Ok(self.decide_outcome().map(|winner| {
            self.synergy.on_result(&mut self.state, winner);
            let report = self.report(Verdict::Winner(winner), winner, false);
            self.state.emit_combat_end(CombatEndPayload {
                winner,
                duration: report.duration,
                survivors_a: report.survivors_a.clone(),
                survivors_b: report.survivors_b.clone(),
                survivor_star_sum: report.survivor_star_sum,
                loser_hp_damage: report.loser_hp_damage,
            });
            info!(
                winner = ?winner,
                duration = report.duration,
                "combat finished"
            );
            // The report carries the complete log, combat_end included.
            CombatReport {
                events: self.state.dispatcher.log().to_vec(),
                ..report
            }
        }))
    }

    /// Kill hooks fire after the phase that produced the deaths. Reward
    /// resolution cannot deal damage, so one drain settles everything.
    fn settle_deaths(&mut self) {
        for note in self.state.drain_deaths() {
            let victim_side = self.state.unit(note.victim).side();
            self.synergy
                .on_death(&mut self.state, victim_side, note.killer_id.as_deref());
        }
    }

    /// Defeat when a team has no alive units; both at once is a draw. At
    /// the hard timeout the side with more total surviving HP wins.
    fn decide_outcome(&self) -> Option<Winner> {
        let a = self.state.alive_count(Side::A);
        let b = self.state.alive_count(Side::B);
        match (a, b) {
            (0, 0) => return Some(Winner::Draw),
            (0, _) => return Some(Winner::TeamB),
            (_, 0) => return Some(Winner::TeamA),
            _ => {}
        }
        if self.state.now >= config::TIMEOUT_TICKS {
            let hp_a: i64 = self.surviving_hp(Side::A);
            let hp_b: i64 = self.surviving_hp(Side::B);
            return Some(match hp_a.cmp(&hp_b) {
                std::cmp::Ordering::Greater => Winner::TeamA,
                std::cmp::Ordering::Less => Winner::TeamB,
                std::cmp::Ordering::Equal => Winner::Draw,
            });
        }
        None
    }

    fn surviving_hp(&self, side: Side) -> i64 {
        self.state
            .units
            .iter()
            .filter(|u| u.side() == side && u.alive())
            .map(|u| u.hp())
            .sum()
    }

    fn survivors(&self, side: Side) -> Vec<SurvivorRecord> {
        self.state
            .units
            .iter()
            .filter(|u| u.side() == side && u.alive())
            .map(|u| SurvivorRecord {
                unit_id: u.unit_id().to_string(),
                hp: u.hp(),
                star_level: u.star_level(),
            })
            .collect()
    }

    fn report(&self, verdict: Verdict, winner: Winner, cancelled: bool) -> CombatReport {
        let survivors_a = self.survivors(Side::A);
        let survivors_b = self.survivors(Side::B);
        let star_sum: u32 = if cancelled {
            0
        } else {
            match winner {
                Winner::TeamA => survivors_a.iter().map(|s| s.star_level).sum(),
                Winner::TeamB => survivors_b.iter().map(|s| s.star_level).sum(),
                Winner::Draw => 0,
            }
        };
        let loser_hp_damage = if cancelled || winner == Winner::Draw {
            0
        } else {
            config::BASE_LOSER_HP_DAMAGE + star_sum as i64
        };
        CombatReport {
            verdict,
            duration: config::ticks_to_secs(self.state.now),
            survivors_a,
            survivors_b,
            survivor_star_sum: star_sum,
            loser_hp_damage,
            events: self.state.dispatcher.log().to_vec(),
        }
    }
}

// ─── Contract entry points ───────────────────────────────────────────

/// One-call interface: validate, simulate, return the report. The optional
/// consumer receives every event as it is sealed.
pub fn simulate(
    team_a: Vec<UnitSpec>,
    team_b: Vec<UnitSpec>,
    synergies: Vec<SynergyDescriptor>,
    seed: u64,
    consumer: Option<mpsc::UnboundedSender<EventRecord>>,
) -> Result<CombatReport, EngineError> {
    let mut sim = Simulator::new(CombatConfig {
        team_a,
        team_b,
        synergies,
        seed,
    })?;
    if let Some(tx) = consumer {
        sim.add_consumer(tx);
    }
    sim.run()
}

/// Watchdog mode: simulate, then replay the event log through the
/// reconstructor and verify every embedded snapshot. A mismatch means the
/// combat output cannot be trusted and must be discarded.
pub fn simulate_verified(
    team_a: Vec<UnitSpec>,
    team_b: Vec<UnitSpec>,
    synergies: Vec<SynergyDescriptor>,
    seed: u64,
) -> Result<CombatReport, EngineError> {
    let report = simulate(team_a, team_b, synergies, seed, None)?;
    replay::verify_log(&report.events)?;
    Ok(report)
}
