//! Deterministic combat engine for an auto-battler.
//!
//! Two fixed rosters fight a timed melee on a 10 Hz simulation clock. The
//! engine is event-sourced: every state mutation is emitted as exactly one
//! authoritative event, the full stream reconstructs every intermediate
//! state, and periodic snapshots let the `replay` module verify that the
//! stream and the simulation never diverge.
//!
//! Entry points: [`battle::simulate`] for a one-call fight,
//! [`battle::Simulator`] for subscriptions, pacing, and cancellation.

pub mod battle;
pub mod config;
pub mod effect;
pub mod error;
pub mod event;
pub mod replay;
pub mod skill;
pub mod stream;
pub mod synergy;
pub mod unit;

pub use battle::{
    simulate, simulate_verified, CombatConfig, CombatHandle, CombatReport, Simulator, Verdict,
};
pub use error::EngineError;
pub use event::{EventPayload, EventRecord};
