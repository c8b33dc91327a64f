//! Progression engine: converts quest completion toggles into XP, level and
//! attribute transitions.
//!
//! Everything here is a pure transform over in-memory snapshots. Callers own
//! persistence and must serialize toggles per profile.
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::attributes::AttributeTotals;
use crate::constants::{STARTING_LEVEL, XP_PER_LEVEL};
use crate::quest::{Quest, QuestId};

/// Level, within-level XP and accumulated attribute totals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressionState {
    pub level: u32,
    pub xp: u32,
    #[serde(default, alias = "stats")]
    pub attribute_totals: AttributeTotals,
}

impl Default for ProgressionState {
    fn default() -> Self {
        Self {
            level: STARTING_LEVEL,
            xp: 0,
            attribute_totals: AttributeTotals::new(),
        }
    }
}

impl ProgressionState {
    #[must_use]
    pub fn new(level: u32, xp: u32) -> Self {
        Self {
            level,
            xp,
            attribute_totals: AttributeTotals::new(),
        }
    }

    #[must_use]
    pub fn with_totals(mut self, totals: AttributeTotals) -> Self {
        self.attribute_totals = totals;
        self
    }

    /// XP earned across all levels, as if the curve were a single counter.
    #[must_use]
    pub fn lifetime_xp(&self) -> u64 {
        u64::from(self.level.saturating_sub(STARTING_LEVEL)) * u64::from(XP_PER_LEVEL)
            + u64::from(self.xp)
    }

    /// XP still needed to reach the next level.
    #[must_use]
    pub const fn xp_to_next_level(&self) -> u32 {
        XP_PER_LEVEL.saturating_sub(self.xp)
    }

    /// True when the state satisfies the level and XP range invariants.
    #[must_use]
    pub const fn is_well_formed(&self) -> bool {
        self.level >= STARTING_LEVEL && self.xp < XP_PER_LEVEL
    }
}

/// Quest ids completed in the current session.
///
/// Stored as a set; older documents recorded it as an `{id: true}` object,
/// which is still accepted on read.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "LedgerRepr", into = "Vec<QuestId>")]
pub struct CompletionLedger(BTreeSet<QuestId>);

#[derive(Deserialize)]
#[serde(untagged)]
enum LedgerRepr {
    List(Vec<QuestId>),
    Flags(BTreeMap<String, bool>),
}

impl TryFrom<LedgerRepr> for CompletionLedger {
    type Error = String;

    fn try_from(value: LedgerRepr) -> Result<Self, Self::Error> {
        match value {
            LedgerRepr::List(ids) => Ok(ids.into_iter().collect()),
            LedgerRepr::Flags(flags) => flags
                .into_iter()
                .filter(|(_, done)| *done)
                .map(|(key, _)| {
                    key.parse::<QuestId>()
                        .map_err(|err| format!("invalid quest id '{key}': {err}"))
                })
                .collect(),
        }
    }
}

impl From<CompletionLedger> for Vec<QuestId> {
    fn from(value: CompletionLedger) -> Self {
        value.0.into_iter().collect()
    }
}

impl FromIterator<QuestId> for CompletionLedger {
    fn from_iter<T: IntoIterator<Item = QuestId>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl CompletionLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn contains(&self, id: QuestId) -> bool {
        self.0.contains(&id)
    }

    pub fn insert(&mut self, id: QuestId) -> bool {
        self.0.insert(id)
    }

    pub fn remove(&mut self, id: QuestId) -> bool {
        self.0.remove(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = QuestId> + '_ {
        self.0.iter().copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Forget every completion (a new day starts).
    pub fn clear(&mut self) {
        self.0.clear();
    }
}

/// Which way a toggle moved the quest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToggleDirection {
    Completed,
    Uncompleted,
}

/// Result of a single quest toggle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestToggle {
    pub state: ProgressionState,
    pub ledger: CompletionLedger,
    pub direction: ToggleDirection,
    /// Signed level change caused by this toggle.
    pub level_delta: i64,
}

impl QuestToggle {
    #[must_use]
    pub fn into_parts(self) -> (ProgressionState, CompletionLedger) {
        (self.state, self.ledger)
    }
}

/// Flip the completion state of `quest` and derive the next progression.
///
/// Completing adds the quest's XP, gaining `floor(total / 100)` levels at once.
/// Un-completing subtracts it and borrows at most one level; at level 1 the
/// XP clamps to zero and the excess loss is discarded. A deficit larger than
/// one full level also clamps to zero after the single borrow, so repeated
/// jumps are not exactly reversible.
///
/// Attribute totals gain the quest's deltas on completion and lose them,
/// floored at zero, on un-completion.
#[must_use]
pub fn toggle_quest_completion(
    state: &ProgressionState,
    ledger: &CompletionLedger,
    quest: &Quest,
) -> QuestToggle {
    let level = state.level.max(STARTING_LEVEL);
    let mut totals = state.attribute_totals.clone();
    let mut next_ledger = ledger.clone();

    let (direction, next_level, next_xp) = if ledger.contains(quest.id) {
        totals.apply_loss(&quest.stat_deltas);
        next_ledger.remove(quest.id);
        let (next_level, next_xp) = level_down(level, state.xp, quest.xp);
        (ToggleDirection::Uncompleted, next_level, next_xp)
    } else {
        totals.apply_gain(&quest.stat_deltas);
        next_ledger.insert(quest.id);
        let (next_level, next_xp) = level_up(level, state.xp, quest.xp);
        (ToggleDirection::Completed, next_level, next_xp)
    };

    QuestToggle {
        state: ProgressionState {
            level: next_level,
            xp: next_xp,
            attribute_totals: totals,
        },
        ledger: next_ledger,
        direction,
        level_delta: i64::from(next_level) - i64::from(state.level),
    }
}

fn level_up(level: u32, xp: u32, gained: u32) -> (u32, u32) {
    let total = xp.saturating_add(gained);
    let levels_gained = total / XP_PER_LEVEL;
    (level.saturating_add(levels_gained), total % XP_PER_LEVEL)
}

fn level_down(level: u32, xp: u32, lost: u32) -> (u32, u32) {
    if lost <= xp {
        return (level, xp - lost);
    }
    let deficit = lost - xp;
    if level > STARTING_LEVEL {
        (level - 1, XP_PER_LEVEL.saturating_sub(deficit))
    } else {
        (level, 0)
    }
}

/// Attribute totals as the sum of deltas over currently completed quests.
///
/// Incremental totals drift when a completed quest is later deleted; comparing
/// against this reveals the stale contribution.
#[must_use]
pub fn recompute_attribute_totals(quests: &[Quest], ledger: &CompletionLedger) -> AttributeTotals {
    let mut totals = AttributeTotals::new();
    for quest in quests.iter().filter(|q| ledger.contains(q.id)) {
        totals.apply_gain(&quest.stat_deltas);
    }
    totals
}
