//! Quest and habit catalogs with collision-free id allocation.
use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::attributes::Attribute;
use crate::constants::FIRST_ID;
use crate::error::{ProfileLoadError, ValidationError};
use crate::habit::{Habit, HabitDraft, HabitId};
use crate::quest::{Quest, QuestDraft, QuestId};
use crate::suggestion::{QuestSuggestion, SuggestionBounds};

/// Monotonic id source. The counter is persisted and only ever moves forward,
/// so ids stay unique even after deletions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdAllocator {
    next: u64,
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self { next: FIRST_ID }
    }
}

impl IdAllocator {
    /// Resume from a persisted counter, never going below ids already in use.
    #[must_use]
    pub fn resume(hint: Option<u64>, used: impl IntoIterator<Item = u64>) -> Self {
        let mut allocator = Self {
            next: hint.unwrap_or(FIRST_ID).max(FIRST_ID),
        };
        for id in used {
            allocator.observe(id);
        }
        allocator
    }

    #[must_use]
    pub const fn peek(&self) -> u64 {
        self.next
    }

    pub fn issue(&mut self) -> u64 {
        let id = self.next;
        self.next = self.next.saturating_add(1);
        id
    }

    fn observe(&mut self, id: u64) {
        if id >= self.next {
            self.next = id.saturating_add(1);
        }
    }
}

/// Catalog of built-in, custom and suggested quests.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct QuestRegistry {
    quests: Vec<Quest>,
    ids: IdAllocator,
}

impl QuestRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry seeded with the starter quests.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        for draft in default_quests() {
            registry.insert_draft(draft);
        }
        registry
    }

    /// Rebuild a registry from a persisted document.
    ///
    /// Older documents numbered quests by list length, so an id can repeat
    /// after a deletion. The first quest keeps the id; later ones are
    /// renumbered from the allocator.
    ///
    /// # Errors
    ///
    /// Returns `InvalidQuest` when a stored quest breaks a field rule.
    pub fn from_parts(
        mut quests: Vec<Quest>,
        next_id: Option<u64>,
    ) -> Result<Self, ProfileLoadError> {
        for quest in &quests {
            quest.validate().map_err(|source| ProfileLoadError::InvalidQuest {
                id: quest.id,
                source,
            })?;
        }
        let mut ids = IdAllocator::resume(next_id, quests.iter().map(|q| q.id.0));
        let mut seen = BTreeSet::new();
        for quest in &mut quests {
            if !seen.insert(quest.id) {
                let fresh = QuestId(ids.issue());
                warn!("quest id {} repeats in stored document, renumbered to {fresh}", quest.id);
                quest.id = fresh;
                seen.insert(fresh);
            }
        }
        Ok(Self { quests, ids })
    }

    #[must_use]
    pub fn quests(&self) -> &[Quest] {
        &self.quests
    }

    #[must_use]
    pub fn get(&self, id: QuestId) -> Option<&Quest> {
        self.quests.iter().find(|quest| quest.id == id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.quests.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.quests.is_empty()
    }

    /// Counter value the next added quest will receive.
    #[must_use]
    pub const fn next_id(&self) -> u64 {
        self.ids.peek()
    }

    /// Validate and register a user-authored quest.
    ///
    /// # Errors
    ///
    /// Returns the draft's validation failure; the registry is left untouched.
    pub fn add_quest(&mut self, draft: QuestDraft) -> Result<&Quest, ValidationError> {
        draft.validate()?;
        Ok(self.insert_draft(draft))
    }

    /// Register an externally suggested quest under a fresh id.
    ///
    /// # Errors
    ///
    /// Returns a validation failure when the suggestion does not fit the quest shape.
    pub fn accept_suggestion(
        &mut self,
        suggestion: QuestSuggestion,
        bounds: &SuggestionBounds,
    ) -> Result<&Quest, ValidationError> {
        suggestion.validate(bounds)?;
        let id = QuestId(self.ids.issue());
        self.quests.push(suggestion.into_quest(id));
        Ok(&self.quests[self.quests.len() - 1])
    }

    /// Delete a quest. Returns it when it existed.
    pub fn remove_quest(&mut self, id: QuestId) -> Option<Quest> {
        let idx = self.quests.iter().position(|quest| quest.id == id)?;
        Some(self.quests.remove(idx))
    }

    /// Quests previously suggested for `goal`.
    #[must_use]
    pub fn count_for_goal(&self, goal: &str) -> usize {
        self.quests
            .iter()
            .filter(|quest| quest.source_goal.as_deref() == Some(goal))
            .count()
    }

    fn insert_draft(&mut self, draft: QuestDraft) -> &Quest {
        let id = QuestId(self.ids.issue());
        self.quests.push(draft.into_quest(id));
        &self.quests[self.quests.len() - 1]
    }
}

fn default_quests() -> [QuestDraft; 4] {
    [
        QuestDraft::new("🧠 Read 30 mins", 20).with_delta(Attribute::Mindset, 2),
        QuestDraft::new("🏋️ Workout", 25)
            .with_delta(Attribute::HealthWellness, 3)
            .with_delta(Attribute::Discipline, 1),
        QuestDraft::new("📈 Study coding 1hr", 30).with_delta(Attribute::Discipline, 3),
        QuestDraft::new("🤝 Network with 1 person", 25).with_delta(Attribute::Charisma, 2),
    ]
}

/// Catalog of recurring habits.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HabitRegistry {
    habits: Vec<Habit>,
    ids: IdAllocator,
}

impl HabitRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a registry from a persisted document.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateHabitId` or `InvalidHabit` when the document is inconsistent.
    pub fn from_parts(habits: Vec<Habit>, next_id: Option<u64>) -> Result<Self, ProfileLoadError> {
        let mut seen = BTreeSet::new();
        for habit in &habits {
            if !seen.insert(habit.id) {
                return Err(ProfileLoadError::DuplicateHabitId(habit.id));
            }
            habit.validate().map_err(|source| ProfileLoadError::InvalidHabit {
                id: habit.id,
                source,
            })?;
        }
        let ids = IdAllocator::resume(next_id, habits.iter().map(|h| h.id.0));
        Ok(Self { habits, ids })
    }

    #[must_use]
    pub fn habits(&self) -> &[Habit] {
        &self.habits
    }

    #[must_use]
    pub fn get(&self, id: HabitId) -> Option<&Habit> {
        self.habits.iter().find(|habit| habit.id == id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.habits.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.habits.is_empty()
    }

    #[must_use]
    pub const fn next_id(&self) -> u64 {
        self.ids.peek()
    }

    /// Validate and register a new habit.
    ///
    /// # Errors
    ///
    /// Returns the draft's validation failure; the registry is left untouched.
    pub fn add_habit(
        &mut self,
        draft: HabitDraft,
        created_at: Option<String>,
    ) -> Result<&Habit, ValidationError> {
        draft.validate()?;
        let id = HabitId(self.ids.issue());
        self.habits.push(draft.into_habit(id, created_at));
        Ok(&self.habits[self.habits.len() - 1])
    }

    /// Replace a habit's name and schedule in place, keeping its id and
    /// creation time. `Ok(None)` when the id is unknown.
    ///
    /// # Errors
    ///
    /// Returns the draft's validation failure; the registry is left untouched.
    pub fn update_habit(
        &mut self,
        id: HabitId,
        draft: HabitDraft,
    ) -> Result<Option<&Habit>, ValidationError> {
        draft.validate()?;
        let Some(slot) = self.habits.iter_mut().find(|habit| habit.id == id) else {
            return Ok(None);
        };
        let created_at = slot.created_at.take();
        *slot = draft.into_habit(id, created_at);
        Ok(Some(&*slot))
    }

    pub(crate) fn remove(&mut self, id: HabitId) -> Option<Habit> {
        let idx = self.habits.iter().position(|habit| habit.id == id)?;
        Some(self.habits.remove(idx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::habit::DayKey;

    #[test]
    fn defaults_get_sequential_ids() {
        let registry = QuestRegistry::with_defaults();
        let ids: Vec<u64> = registry.quests().iter().map(|q| q.id.0).collect();
        assert_eq!(ids, vec![1, 2, 3, 4]);
        assert_eq!(registry.next_id(), 5);
        let workout = registry.get(QuestId(2)).unwrap();
        assert_eq!(workout.xp, 25);
        assert_eq!(workout.delta(Attribute::HealthWellness), 3);
    }

    #[test]
    fn ids_are_not_reused_after_deletion() {
        let mut registry = QuestRegistry::with_defaults();
        registry.remove_quest(QuestId(4)).unwrap();
        registry.remove_quest(QuestId(3)).unwrap();
        let added = registry.add_quest(QuestDraft::new("Meditate 10 mins", 15)).unwrap();
        assert_eq!(added.id, QuestId(5));
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn resume_never_goes_below_used_ids() {
        let quests = QuestRegistry::with_defaults().quests().to_vec();
        let registry = QuestRegistry::from_parts(quests.clone(), Some(2)).unwrap();
        assert_eq!(registry.next_id(), 5);
        let registry = QuestRegistry::from_parts(quests, Some(40)).unwrap();
        assert_eq!(registry.next_id(), 40);
    }

    #[test]
    fn repeated_ids_are_renumbered_on_load() {
        let mut quests = QuestRegistry::with_defaults().quests().to_vec();
        let mut repeat = quests[2].clone();
        repeat.text = "Custom after delete".to_string();
        quests.push(repeat);
        let mut registry = QuestRegistry::from_parts(quests, None).unwrap();
        assert_eq!(registry.get(QuestId(3)).unwrap().text, "📈 Study coding 1hr");
        assert_eq!(registry.get(QuestId(5)).unwrap().text, "Custom after delete");
        let next = registry.add_quest(QuestDraft::new("Stretch", 5)).unwrap();
        assert_eq!(next.id, QuestId(6));
    }

    #[test]
    fn invalid_draft_leaves_registry_untouched() {
        let mut registry = QuestRegistry::new();
        assert_eq!(
            registry.add_quest(QuestDraft::new("", 10)).unwrap_err(),
            ValidationError::EmptyText
        );
        assert!(registry.is_empty());
        assert_eq!(registry.next_id(), 1);
    }

    #[test]
    fn habit_update_preserves_id_and_creation_time() {
        let mut registry = HabitRegistry::new();
        let id = registry
            .add_habit(
                HabitDraft::new("Clean room", [DayKey::Saturday]),
                Some("2026-10-01T08:00:00Z".to_string()),
            )
            .unwrap()
            .id;
        let updated = registry
            .update_habit(id, HabitDraft::new("Tidy desk", [DayKey::Friday, DayKey::Monday]))
            .unwrap()
            .unwrap();
        assert_eq!(updated.id, id);
        assert_eq!(updated.name, "Tidy desk");
        assert_eq!(updated.days.as_slice(), &[DayKey::Monday, DayKey::Friday]);
        assert_eq!(updated.total_per_week, 2);
        assert_eq!(updated.created_at.as_deref(), Some("2026-10-01T08:00:00Z"));
        assert!(registry
            .update_habit(HabitId(99), HabitDraft::new("x", [DayKey::Monday]))
            .unwrap()
            .is_none());
    }
}
