//! Engine error taxonomy.
//!
//! Input problems (`InvalidRoster`, `InvalidSkill`) are rejected before any
//! event is emitted. Protocol problems (`ProtocolViolation`,
//! `SnapshotMismatch`, unknown ids) are fatal for the combat that raised
//! them: the output must be discarded.

use thiserror::Error;

#[derive(Clone, Debug, Error)]
pub enum EngineError {
    #[error("invalid roster: {0}")]
    InvalidRoster(String),

    #[error("invalid skill `{skill_id}`: {reason}")]
    InvalidSkill { skill_id: String, reason: String },

    #[error("duplicate unit id `{0}` across rosters")]
    DuplicateUnitId(String),

    #[error("event references unknown unit `{0}`")]
    UnknownUnit(String),

    #[error("event references unknown effect `{effect_id}` on unit `{unit_id}`")]
    UnknownEffect { unit_id: String, effect_id: String },

    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    #[error(
        "snapshot mismatch at seq {seq}: unit `{unit_id}` field `{field}` \
         reconstructed={reconstructed} snapshot={snapshot}"
    )]
    SnapshotMismatch {
        seq: u64,
        unit_id: String,
        field: String,
        reconstructed: String,
        snapshot: String,
    },
}
