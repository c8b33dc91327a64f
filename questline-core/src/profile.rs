//! The per-user profile and its persisted document shape.
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::attributes::AttributeTotals;
use crate::constants::STARTING_LEVEL;
use crate::error::ProfileLoadError;
use crate::habit::{Habit, HabitLedger};
use crate::progression::{CompletionLedger, ProgressionState};
use crate::quest::Quest;
use crate::registry::{HabitRegistry, QuestRegistry};

/// Validated in-memory snapshot of everything a user has tracked.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Profile {
    pub progression: ProgressionState,
    pub completed: CompletionLedger,
    pub quests: QuestRegistry,
    pub habits: HabitRegistry,
    pub habit_completions: HabitLedger,
}

impl Profile {
    /// Fresh profile, optionally seeded with the starter quests.
    #[must_use]
    pub fn new(seed_default_quests: bool) -> Self {
        Self {
            quests: if seed_default_quests {
                QuestRegistry::with_defaults()
            } else {
                QuestRegistry::new()
            },
            ..Self::default()
        }
    }

    /// Validate a persisted document.
    ///
    /// # Errors
    ///
    /// Returns `ProfileLoadError` when progression is out of range or either
    /// registry is inconsistent.
    pub fn from_document(
        doc: ProfileDocument,
        seed_default_quests: bool,
    ) -> Result<Self, ProfileLoadError> {
        let progression = ProgressionState {
            level: doc.level,
            xp: doc.xp,
            attribute_totals: doc.attribute_totals,
        };
        if !progression.is_well_formed() {
            return Err(ProfileLoadError::InvalidProgression {
                level: doc.level,
                xp: doc.xp,
            });
        }
        let quests = match doc.quests {
            Some(quests) => QuestRegistry::from_parts(quests, doc.next_quest_id)?,
            None if seed_default_quests => QuestRegistry::with_defaults(),
            None => QuestRegistry::new(),
        };
        let habits = HabitRegistry::from_parts(doc.weekly_habits, doc.next_habit_id)?;
        Ok(Self {
            progression,
            completed: doc.completed_quests,
            quests,
            habits,
            habit_completions: doc.habit_completions,
        })
    }

    /// Parse and validate a JSON value as handed over by a storage collaborator.
    ///
    /// # Errors
    ///
    /// Returns `ProfileLoadError::Json` on schema mismatches and the
    /// validation errors of [`Profile::from_document`].
    pub fn from_value(value: Value, seed_default_quests: bool) -> Result<Self, ProfileLoadError> {
        let doc: ProfileDocument = serde_json::from_value(value)?;
        Self::from_document(doc, seed_default_quests)
    }

    #[must_use]
    pub fn to_document(&self) -> ProfileDocument {
        ProfileDocument {
            level: self.progression.level,
            xp: self.progression.xp,
            attribute_totals: self.progression.attribute_totals.clone(),
            completed_quests: self.completed.clone(),
            quests: Some(self.quests.quests().to_vec()),
            next_quest_id: Some(self.quests.next_id()),
            weekly_habits: self.habits.habits().to_vec(),
            next_habit_id: Some(self.habits.next_id()),
            habit_completions: self.habit_completions.clone(),
        }
    }
}

/// JSON-compatible record exchanged with persistence collaborators.
///
/// Field names follow the document written by earlier versions of the app,
/// so `stats` is still accepted for the attribute totals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileDocument {
    #[serde(default = "default_level")]
    pub level: u32,
    #[serde(default)]
    pub xp: u32,
    #[serde(default, alias = "stats")]
    pub attribute_totals: AttributeTotals,
    #[serde(default)]
    pub completed_quests: CompletionLedger,
    /// `None` means the user never had a quest list; `Some(vec![])` means they deleted every quest.
    #[serde(default)]
    pub quests: Option<Vec<Quest>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_quest_id: Option<u64>,
    #[serde(default)]
    pub weekly_habits: Vec<Habit>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_habit_id: Option<u64>,
    #[serde(default)]
    pub habit_completions: HabitLedger,
}

const fn default_level() -> u32 {
    STARTING_LEVEL
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::Attribute;
    use crate::quest::QuestId;
    use serde_json::json;

    #[test]
    fn empty_document_yields_seeded_profile() {
        let profile = Profile::from_value(json!({}), true).unwrap();
        assert_eq!(profile.progression, ProgressionState::default());
        assert_eq!(profile.quests.len(), 4);
        assert!(profile.habits.is_empty());
    }

    #[test]
    fn explicit_empty_quest_list_is_respected() {
        let profile = Profile::from_value(json!({"quests": []}), true).unwrap();
        assert!(profile.quests.is_empty());
    }

    #[test]
    fn legacy_document_loads() {
        let doc = json!({
            "xp": 45,
            "level": 3,
            "stats": {"spiritual": 0, "mindfulness": 4, "strength": 6},
            "completedQuests": {"2": true},
            "quests": [
                {"id": 1, "text": "Read", "xp": 20, "stats": {"mindfulness": 2}},
                {"id": 2, "text": "Workout", "xp": 25, "stats": {"strength": 3}}
            ],
            "weeklyHabits": [
                {"id": 1728000000000u64, "name": "Clean room", "days": ["monday", "thursday"],
                 "frequency": 2, "totalPerWeek": 2, "createdAt": "2024-10-04T00:00:00.000Z"}
            ],
            "habitCompletions": {"1728000000000-monday-2024-09-30": true}
        });
        let profile = Profile::from_value(doc, true).unwrap();
        assert_eq!(profile.progression.level, 3);
        assert_eq!(profile.progression.attribute_totals.get(Attribute::HealthWellness), 6);
        assert!(profile.completed.contains(QuestId(2)));
        assert_eq!(profile.quests.next_id(), 3);
        assert_eq!(profile.habits.next_id(), 1_728_000_000_001);
        assert_eq!(profile.habit_completions.len(), 1);
    }

    #[test]
    fn out_of_range_progression_is_rejected() {
        let err = Profile::from_value(json!({"level": 0, "xp": 10}), true).unwrap_err();
        assert!(matches!(err, ProfileLoadError::InvalidProgression { level: 0, xp: 10 }));
        let err = Profile::from_value(json!({"level": 2, "xp": 100}), true).unwrap_err();
        assert!(matches!(err, ProfileLoadError::InvalidProgression { .. }));
    }

    #[test]
    fn schema_violation_is_a_json_error() {
        let err = Profile::from_value(json!({"xp": -5}), true).unwrap_err();
        assert!(matches!(err, ProfileLoadError::Json(_)));
        let err = Profile::from_value(json!({"quests": [{"id": 1, "text": "", "xp": 10}]}), true)
            .unwrap_err();
        assert!(matches!(err, ProfileLoadError::InvalidQuest { .. }));
    }

    #[test]
    fn document_round_trip_preserves_counters() {
        let mut profile = Profile::new(true);
        profile.quests.remove_quest(QuestId(4));
        let value = serde_json::to_value(profile.to_document()).unwrap();
        assert_eq!(value["nextQuestId"], json!(5));
        let restored = Profile::from_value(value, true).unwrap();
        assert_eq!(restored, profile);
        assert_eq!(restored.quests.next_id(), 5);
    }
}
