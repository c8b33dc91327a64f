//! Error taxonomy for the tracker.
//!
//! The engine itself is total; errors only arise while validating new records,
//! resolving ids, reading persisted documents, or talking to collaborators.
use thiserror::Error;

use crate::attributes::Attribute;
use crate::habit::{DayKey, HabitId};
use crate::quest::QuestId;

/// Rejected quest, habit or suggestion definition.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("quest text must not be empty")]
    EmptyText,
    #[error("habit name must not be empty")]
    EmptyName,
    #[error("quest xp must be a positive integer")]
    NonPositiveXp,
    #[error("quest xp '{0}' is not a number")]
    InvalidXp(String),
    #[error("select at least one day for the habit")]
    NoDaysSelected,
    #[error("day '{0}' selected more than once")]
    DuplicateDay(DayKey),
    #[error("unknown attribute '{0}'")]
    UnknownAttribute(String),
    #[error("attribute '{0}' has a zero contribution")]
    ZeroStatDelta(Attribute),
    #[error("suggested xp {xp} outside {min}..={max}")]
    SuggestionXpOutOfRange { xp: u32, min: u32, max: u32 },
    #[error("unknown weekday '{0}'")]
    UnknownDay(String),
    #[error("invalid week key '{0}', expected the Monday as YYYY-MM-DD")]
    InvalidWeekKey(String),
    #[error("invalid habit completion key '{0}'")]
    InvalidCompletionKey(String),
}

/// Persisted profile document that violates the schema.
#[derive(Debug, Error)]
pub enum ProfileLoadError {
    #[error("profile is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("progression out of range: level {level}, xp {xp}")]
    InvalidProgression { level: u32, xp: u32 },
    #[error("habit id {0} appears more than once")]
    DuplicateHabitId(HabitId),
    #[error("quest {id} is invalid: {source}")]
    InvalidQuest {
        id: QuestId,
        #[source]
        source: ValidationError,
    },
    #[error("habit {id} is invalid: {source}")]
    InvalidHabit {
        id: HabitId,
        #[source]
        source: ValidationError,
    },
}

/// Failures surfaced by the [`crate::Tracker`] facade.
#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("quest {0} not found")]
    QuestNotFound(QuestId),
    #[error("habit {0} not found")]
    HabitNotFound(HabitId),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("storage collaborator failed: {0}")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("suggestion collaborator failed: {0}")]
    Suggestion(#[source] Box<dyn std::error::Error + Send + Sync>),
}
