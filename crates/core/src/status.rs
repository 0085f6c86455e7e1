//! Generation job status and the transition decision.
//!
//! Statuses follow a fixed total order:
//! `pending < starting < processing < {succeeded, failed, canceled}`.
//! The three terminal statuses share the highest rank; once a job holds
//! one of them it never moves again.
//!
//! Each variant's discriminant matches the seed data order (1-based) in the
//! `generation_statuses` lookup table.

use std::fmt;
use std::str::FromStr;

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::types::Timestamp;

/// Status ID type matching SMALLINT in the database.
pub type StatusId = i16;

// ---------------------------------------------------------------------------
// GenerationStatus
// ---------------------------------------------------------------------------

#[repr(i16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationStatus {
    Pending = 1,
    Starting = 2,
    Processing = 3,
    Succeeded = 4,
    Failed = 5,
    Canceled = 6,
}

impl GenerationStatus {
    /// Every status, in seed-data order.
    pub const ALL: [GenerationStatus; 6] = [
        GenerationStatus::Pending,
        GenerationStatus::Starting,
        GenerationStatus::Processing,
        GenerationStatus::Succeeded,
        GenerationStatus::Failed,
        GenerationStatus::Canceled,
    ];

    /// Return the database status ID.
    pub fn id(self) -> StatusId {
        self as StatusId
    }

    /// Look up a status by its database ID.
    pub fn from_id(id: StatusId) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.id() == id)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            GenerationStatus::Pending => "pending",
            GenerationStatus::Starting => "starting",
            GenerationStatus::Processing => "processing",
            GenerationStatus::Succeeded => "succeeded",
            GenerationStatus::Failed => "failed",
            GenerationStatus::Canceled => "canceled",
        }
    }

    /// Position in the total order. Terminal statuses share the top rank.
    pub fn rank(self) -> u8 {
        match self {
            GenerationStatus::Pending => 0,
            GenerationStatus::Starting => 1,
            GenerationStatus::Processing => 2,
            GenerationStatus::Succeeded | GenerationStatus::Failed | GenerationStatus::Canceled => 3,
        }
    }

    pub fn is_terminal(self) -> bool {
        self.rank() == 3
    }

    /// `failed` and `canceled` carry an error message; `succeeded` carries output.
    pub fn carries_error(self) -> bool {
        matches!(self, GenerationStatus::Failed | GenerationStatus::Canceled)
    }
}

impl From<GenerationStatus> for StatusId {
    fn from(value: GenerationStatus) -> Self {
        value as StatusId
    }
}

impl fmt::Display for GenerationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned for a database status ID outside the seed data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Unknown generation status id {0}")]
pub struct UnknownStatusId(pub StatusId);

impl TryFrom<StatusId> for GenerationStatus {
    type Error = UnknownStatusId;

    fn try_from(id: StatusId) -> Result<Self, Self::Error> {
        Self::from_id(id).ok_or(UnknownStatusId(id))
    }
}

/// Error returned when parsing a status name that is not part of the enum.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown generation status '{0}'")]
pub struct UnknownStatus(pub String);

impl FromStr for GenerationStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| UnknownStatus(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Transition decision
// ---------------------------------------------------------------------------

/// What to do with a requested status change, given the persisted status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The requested status is ahead of the current one: write it.
    Advance,
    /// The job already holds exactly this terminal status: accept, write nothing.
    Duplicate,
    /// The requested status is behind or level with the current one, or the
    /// job is already terminal: discard.
    Stale,
}

/// Decide how a requested status relates to the persisted one.
///
/// - terminal `current` equal to `requested` -> [`Transition::Duplicate`]
/// - terminal `current` otherwise -> [`Transition::Stale`]
/// - `requested` ranked at or below `current` -> [`Transition::Stale`]
/// - anything else -> [`Transition::Advance`]
pub fn decide_transition(current: GenerationStatus, requested: GenerationStatus) -> Transition {
    if current.is_terminal() {
        if current == requested {
            Transition::Duplicate
        } else {
            Transition::Stale
        }
    } else if requested.rank() <= current.rank() {
        Transition::Stale
    } else {
        Transition::Advance
    }
}

// ---------------------------------------------------------------------------
// Stuck-job detection
// ---------------------------------------------------------------------------

/// Default age after which a non-terminal job counts as stuck.
pub const DEFAULT_STALE_JOB_SECS: i64 = 900;

/// Whether a job has sat in a non-terminal status for longer than `threshold`.
///
/// The core never times jobs out; this only lets an external monitor flag them.
pub fn is_stuck(
    status: GenerationStatus,
    updated_at: Timestamp,
    now: Timestamp,
    threshold: Duration,
) -> bool {
    !status.is_terminal() && now - updated_at > threshold
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
