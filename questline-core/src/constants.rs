//! Centralized progression constants for Questline.
//!
//! The level curve is flat: every level costs the same amount of XP. Keeping
//! these values in code means a change to the curve is reviewed like any
//! other logic change instead of drifting through persisted documents.

// Level curve --------------------------------------------------------------
/// XP required to advance one level. Within-level XP always stays below this.
pub const XP_PER_LEVEL: u32 = 100;
/// Level every fresh profile starts at and the floor for level-down.
pub const STARTING_LEVEL: u32 = 1;

// Suggestion tuning ---------------------------------------------------------
pub(crate) const SUGGESTION_XP_MIN: u32 = 10;
pub(crate) const SUGGESTION_XP_MAX: u32 = 100;
pub(crate) const SUGGESTION_DEFAULT_XP: u32 = 20;
pub(crate) const SUGGESTION_COUNT_HABIT: usize = 2;
pub(crate) const SUGGESTION_COUNT_MATERIAL: usize = 3;
pub(crate) const SUGGESTION_COUNT_CROWDED: usize = 1;
pub(crate) const CROWDED_QUEST_THRESHOLD: usize = 8;
pub(crate) const CROWDED_GOAL_THRESHOLD: usize = 5;
pub(crate) const CROWDED_PER_GOAL_THRESHOLD: usize = 2;

// Identifier allocation -----------------------------------------------------
pub(crate) const FIRST_ID: u64 = 1;
