//! Questline Core
//!
//! Platform-agnostic progression logic for the Questline tracker: quest
//! completion toggles drive XP, level and attribute totals, and a separate
//! ledger records habit completions per weekday and calendar week.
//! Profile storage and quest suggestions are supplied by the embedding
//! application through the traits below. The only file this crate reads on
//! its own is an optional config passed to [`TrackerConfig::from_file`].

pub mod attributes;
pub mod config;
pub mod constants;
pub mod error;
pub mod habit;
pub mod profile;
pub mod progression;
pub mod quest;
pub mod registry;
pub mod suggestion;

// Re-export commonly used types
pub use attributes::{Attribute, AttributeTotals, StatDeltas};
pub use config::{ConfigError, TrackerConfig};
pub use constants::{STARTING_LEVEL, XP_PER_LEVEL};
pub use error::{ProfileLoadError, TrackerError, ValidationError};
pub use habit::{
    DayKey, Habit, HabitCompletionKey, HabitDraft, HabitId, HabitLedger, HabitRemoval,
    HabitSummary, WeekKey, habits_scheduled_on, is_habit_completed, remove_habit,
    toggle_habit_completion, weekly_summary,
};
pub use profile::{Profile, ProfileDocument};
pub use progression::{
    CompletionLedger, ProgressionState, QuestToggle, ToggleDirection, recompute_attribute_totals,
    toggle_quest_completion,
};
pub use quest::{Quest, QuestDraft, QuestId, parse_quest_xp, parse_stat_delta};
pub use registry::{HabitRegistry, IdAllocator, QuestRegistry};
pub use suggestion::{
    FallbackSuggester, GoalKind, QuestSuggester, QuestSuggestion, SuggestionBatch,
    SuggestionBounds, SuggestionConfig, SuggestionParseError, SuggestionPlan, SuggestionRequest,
    build_prompt, fallback_plan, fallback_suggestions, parse_suggestions, suggestion_plan,
};

use log::{debug, info, warn};
use serde::Serialize;
use serde_json::Value;

/// Trait for abstracting profile persistence.
/// Local device storage or a remote per-user document store implement this.
pub trait ProfileStorage {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Load the raw profile document for `user_id`, if one was saved.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be read.
    fn load_profile(&self, user_id: &str) -> Result<Option<Value>, Self::Error>;

    /// Replace the stored profile document.
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be written.
    fn save_profile(&self, user_id: &str, document: &Value) -> Result<(), Self::Error>;

    /// Delete the stored profile.
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be removed.
    fn delete_profile(&self, user_id: &str) -> Result<(), Self::Error>;

    /// Keep a copy of a stored document that failed to load, before the
    /// next save replaces it. Stores without a backup location do nothing.
    ///
    /// # Errors
    ///
    /// Returns an error if the copy cannot be written.
    fn archive_profile(&self, _user_id: &str) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// How the profile came to be in memory.
#[derive(Debug)]
pub enum LoadOutcome {
    /// Nothing was stored; a fresh profile was created.
    Fresh,
    /// The stored document was read and validated.
    Loaded,
    /// The stored document was malformed; it was archived and the defaults
    /// were used instead.
    Recovered(ProfileLoadError),
}

/// Attribute whose incremental total differs from the registry-derived one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeDrift {
    pub attribute: Attribute,
    pub tracked: u32,
    pub derived: u32,
}

/// Suggestions the registry accepted and those it rejected.
#[derive(Debug, Default)]
pub struct AcceptedSuggestions {
    pub accepted: Vec<Quest>,
    pub rejected: Vec<(QuestSuggestion, ValidationError)>,
}

/// Stateful facade for one user's profile.
///
/// Each mutation runs the pure engine on a copy of the current snapshot,
/// saves the copy and only then swaps it in. A failed save leaves the
/// in-memory profile as it was.
pub struct Tracker<S>
where
    S: ProfileStorage,
{
    storage: S,
    user_id: String,
    config: TrackerConfig,
    profile: Profile,
}

impl<S> Tracker<S>
where
    S: ProfileStorage,
{
    /// Load `user_id`'s profile. A malformed document is archived through
    /// the storage collaborator and replaced by defaults in memory.
    ///
    /// # Errors
    ///
    /// Returns `TrackerError::Storage` if the storage collaborator fails,
    /// including when a malformed document cannot be archived.
    pub fn open(
        storage: S,
        user_id: impl Into<String>,
        config: TrackerConfig,
    ) -> Result<(Self, LoadOutcome), TrackerError> {
        let user_id = user_id.into();
        let stored = storage
            .load_profile(&user_id)
            .map_err(|err| TrackerError::Storage(Box::new(err)))?;
        let (profile, outcome) = match stored {
            None => (Profile::new(config.seed_default_quests), LoadOutcome::Fresh),
            Some(value) => match Profile::from_value(value, config.seed_default_quests) {
                Ok(profile) => (profile, LoadOutcome::Loaded),
                Err(err) => {
                    warn!(
                        "profile for {user_id} is malformed, archiving it and using defaults: {err}"
                    );
                    storage
                        .archive_profile(&user_id)
                        .map_err(|err| TrackerError::Storage(Box::new(err)))?;
                    (Profile::new(config.seed_default_quests), LoadOutcome::Recovered(err))
                }
            },
        };
        debug!("opened profile for {user_id}: {outcome:?}");
        Ok((
            Self {
                storage,
                user_id,
                config,
                profile,
            },
            outcome,
        ))
    }

    #[must_use]
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    #[must_use]
    pub const fn config(&self) -> &TrackerConfig {
        &self.config
    }

    #[must_use]
    pub const fn profile(&self) -> &Profile {
        &self.profile
    }

    #[must_use]
    pub const fn progression(&self) -> &ProgressionState {
        &self.profile.progression
    }

    #[must_use]
    pub const fn storage(&self) -> &S {
        &self.storage
    }

    /// Toggle a quest's completion and persist the new progression.
    ///
    /// # Errors
    ///
    /// Returns `QuestNotFound` or `Storage`; neither changes the profile.
    pub fn toggle_quest(&mut self, id: QuestId) -> Result<QuestToggle, TrackerError> {
        let quest = self
            .profile
            .quests
            .get(id)
            .ok_or(TrackerError::QuestNotFound(id))?;
        let outcome =
            toggle_quest_completion(&self.profile.progression, &self.profile.completed, quest);
        self.commit(Profile {
            progression: outcome.state.clone(),
            completed: outcome.ledger.clone(),
            ..self.profile.clone()
        })?;
        debug!(
            "quest {id} {:?}: level {} xp {}",
            outcome.direction, outcome.state.level, outcome.state.xp
        );
        if outcome.level_delta != 0 {
            info!(
                "level changed by {} to {} for {}",
                outcome.level_delta, outcome.state.level, self.user_id
            );
        }
        Ok(outcome)
    }

    /// # Errors
    ///
    /// Returns `Validation` or `Storage`; neither changes the registry.
    pub fn add_quest(&mut self, draft: QuestDraft) -> Result<Quest, TrackerError> {
        let mut quests = self.profile.quests.clone();
        let quest = quests.add_quest(draft)?.clone();
        self.commit(Profile {
            quests,
            ..self.profile.clone()
        })?;
        debug!("added quest {} ({} xp)", quest.id, quest.xp);
        Ok(quest)
    }

    /// Delete a quest and forget its completion. Attribute totals keep any
    /// contribution it made; see [`Tracker::attribute_drift`].
    ///
    /// # Errors
    ///
    /// Returns `QuestNotFound` or `Storage`.
    pub fn remove_quest(&mut self, id: QuestId) -> Result<Quest, TrackerError> {
        let mut next = self.profile.clone();
        let quest = next
            .quests
            .remove_quest(id)
            .ok_or(TrackerError::QuestNotFound(id))?;
        next.completed.remove(id);
        self.commit(next)?;
        debug!("removed quest {id}");
        Ok(quest)
    }

    /// Clear today's quest completions, keeping earned XP and totals.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if the profile cannot be saved.
    pub fn start_new_day(&mut self) -> Result<usize, TrackerError> {
        let mut next = self.profile.clone();
        let cleared = next.completed.len();
        next.completed.clear();
        self.commit(next)?;
        Ok(cleared)
    }

    /// Attributes whose tracked total no longer matches the completed quests.
    #[must_use]
    pub fn attribute_drift(&self) -> Vec<AttributeDrift> {
        let derived =
            recompute_attribute_totals(self.profile.quests.quests(), &self.profile.completed);
        self.profile
            .progression
            .attribute_totals
            .iter_all()
            .filter_map(|(attribute, tracked)| {
                let derived = derived.get(attribute);
                (tracked != derived).then_some(AttributeDrift {
                    attribute,
                    tracked,
                    derived,
                })
            })
            .collect()
    }

    /// Describe the current quest load for a suggestion collaborator.
    #[must_use]
    pub fn suggestion_request(
        &self,
        goal: &str,
        kind: GoalKind,
        total_goals: usize,
    ) -> SuggestionRequest {
        SuggestionRequest::from_registry(
            goal,
            kind,
            &self.profile.quests,
            &self.profile.completed,
            total_goals,
        )
    }

    /// Ask the suggester for quests. Nothing is registered.
    ///
    /// # Errors
    ///
    /// Returns `Suggestion` when the collaborator fails.
    pub fn request_suggestions<G>(
        &self,
        suggester: &G,
        goal: &str,
        kind: GoalKind,
        total_goals: usize,
    ) -> Result<SuggestionBatch, TrackerError>
    where
        G: QuestSuggester,
    {
        let request = self.suggestion_request(goal, kind, total_goals);
        suggester
            .suggest(&request)
            .map_err(|err| TrackerError::Suggestion(Box::new(err)))
    }

    /// Register every valid suggestion under a fresh id.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if the profile cannot be saved; nothing is
    /// registered in that case.
    pub fn accept_suggestions(
        &mut self,
        suggestions: Vec<QuestSuggestion>,
    ) -> Result<AcceptedSuggestions, TrackerError> {
        let bounds = self.config.suggestions.bounds;
        let mut quests = self.profile.quests.clone();
        let mut result = AcceptedSuggestions::default();
        for suggestion in suggestions {
            match suggestion.validate(&bounds) {
                Ok(()) => {
                    let quest = quests.accept_suggestion(suggestion, &bounds)?;
                    result.accepted.push(quest.clone());
                }
                Err(err) => {
                    debug!("rejected suggestion '{}': {err}", suggestion.text);
                    result.rejected.push((suggestion, err));
                }
            }
        }
        if !result.accepted.is_empty() {
            self.commit(Profile {
                quests,
                ..self.profile.clone()
            })?;
        }
        Ok(result)
    }

    /// # Errors
    ///
    /// Returns `Validation` or `Storage`; neither changes the registry.
    pub fn add_habit(&mut self, draft: HabitDraft) -> Result<Habit, TrackerError> {
        let created_at = chrono::Utc::now().to_rfc3339();
        let mut habits = self.profile.habits.clone();
        let habit = habits.add_habit(draft, Some(created_at))?.clone();
        self.commit(Profile {
            habits,
            ..self.profile.clone()
        })?;
        debug!("added habit {} on {} days", habit.id, habit.total_per_week);
        Ok(habit)
    }

    /// Replace a habit's name and schedule, keeping its id and history.
    ///
    /// # Errors
    ///
    /// Returns `Validation`, `HabitNotFound` or `Storage`.
    pub fn update_habit(&mut self, id: HabitId, draft: HabitDraft) -> Result<Habit, TrackerError> {
        let mut habits = self.profile.habits.clone();
        let habit = habits
            .update_habit(id, draft)?
            .ok_or(TrackerError::HabitNotFound(id))?
            .clone();
        self.commit(Profile {
            habits,
            ..self.profile.clone()
        })?;
        Ok(habit)
    }

    /// Delete a habit together with its completion history.
    ///
    /// # Errors
    ///
    /// Returns `HabitNotFound` or `Storage`.
    pub fn remove_habit(&mut self, id: HabitId) -> Result<(Habit, usize), TrackerError> {
        let removal = remove_habit(&self.profile.habits, &self.profile.habit_completions, id)
            .ok_or(TrackerError::HabitNotFound(id))?;
        self.commit(Profile {
            habits: removal.registry,
            habit_completions: removal.ledger,
            ..self.profile.clone()
        })?;
        debug!("removed habit {id}, purged {} entries", removal.purged_entries);
        Ok((removal.removed, removal.purged_entries))
    }

    /// Flip a habit's completion for `day` of `week`; returns the new flag.
    ///
    /// # Errors
    ///
    /// Returns `HabitNotFound` or `Storage`; neither changes the ledger.
    pub fn toggle_habit(
        &mut self,
        id: HabitId,
        day: DayKey,
        week: WeekKey,
    ) -> Result<bool, TrackerError> {
        if self.profile.habits.get(id).is_none() {
            return Err(TrackerError::HabitNotFound(id));
        }
        let habit_completions =
            toggle_habit_completion(&self.profile.habit_completions, id, day, week);
        let done = is_habit_completed(&habit_completions, id, day, week);
        self.commit(Profile {
            habit_completions,
            ..self.profile.clone()
        })?;
        Ok(done)
    }

    #[must_use]
    pub fn habits_on(&self, day: DayKey) -> Vec<&Habit> {
        habits_scheduled_on(&self.profile.habits, day)
    }

    #[must_use]
    pub fn summary(&self, week: WeekKey) -> HabitSummary {
        weekly_summary(&self.profile.habits, &self.profile.habit_completions, week)
    }

    /// Delete the stored profile and start over.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if the document cannot be removed.
    pub fn reset(&mut self) -> Result<(), TrackerError> {
        self.storage
            .delete_profile(&self.user_id)
            .map_err(|err| TrackerError::Storage(Box::new(err)))?;
        self.profile = Profile::new(self.config.seed_default_quests);
        info!("reset profile for {}", self.user_id);
        Ok(())
    }

    /// Save the current snapshot.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if serialization or the collaborator fails.
    pub fn persist(&self) -> Result<(), TrackerError> {
        self.save(&self.profile)
    }

    fn commit(&mut self, next: Profile) -> Result<(), TrackerError> {
        self.save(&next)?;
        self.profile = next;
        Ok(())
    }

    fn save(&self, profile: &Profile) -> Result<(), TrackerError> {
        let document = serde_json::to_value(profile.to_document())
            .map_err(|err| TrackerError::Storage(Box::new(err)))?;
        self.storage
            .save_profile(&self.user_id, &document)
            .map_err(|err| TrackerError::Storage(Box::new(err)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::cell::{Cell, RefCell};
    use std::collections::HashMap;
    use std::convert::Infallible;
    use std::rc::Rc;

    #[derive(Clone, Default)]
    struct MemoryStorage {
        docs: Rc<RefCell<HashMap<String, Value>>>,
    }

    impl ProfileStorage for MemoryStorage {
        type Error = Infallible;

        fn load_profile(&self, user_id: &str) -> Result<Option<Value>, Self::Error> {
            Ok(self.docs.borrow().get(user_id).cloned())
        }

        fn save_profile(&self, user_id: &str, document: &Value) -> Result<(), Self::Error> {
            self.docs
                .borrow_mut()
                .insert(user_id.to_string(), document.clone());
            Ok(())
        }

        fn delete_profile(&self, user_id: &str) -> Result<(), Self::Error> {
            self.docs.borrow_mut().remove(user_id);
            Ok(())
        }

        fn archive_profile(&self, user_id: &str) -> Result<(), Self::Error> {
            let mut docs = self.docs.borrow_mut();
            if let Some(doc) = docs.get(user_id).cloned() {
                docs.insert(format!("{user_id}.bak"), doc);
            }
            Ok(())
        }
    }

    #[derive(Debug, thiserror::Error)]
    #[error("disk full")]
    struct DiskFull;

    /// Memory store whose saves fail while `full` is set.
    #[derive(Clone, Default)]
    struct FlakyStorage {
        docs: MemoryStorage,
        full: Rc<Cell<bool>>,
    }

    impl ProfileStorage for FlakyStorage {
        type Error = DiskFull;

        fn load_profile(&self, user_id: &str) -> Result<Option<Value>, Self::Error> {
            Ok(self.docs.docs.borrow().get(user_id).cloned())
        }

        fn save_profile(&self, user_id: &str, document: &Value) -> Result<(), Self::Error> {
            if self.full.get() {
                return Err(DiskFull);
            }
            self.docs
                .docs
                .borrow_mut()
                .insert(user_id.to_string(), document.clone());
            Ok(())
        }

        fn delete_profile(&self, user_id: &str) -> Result<(), Self::Error> {
            self.docs.docs.borrow_mut().remove(user_id);
            Ok(())
        }
    }

    fn week() -> WeekKey {
        "2026-10-12".parse().unwrap()
    }

    #[test]
    fn toggles_persist_and_reload() {
        let storage = MemoryStorage::default();
        let (mut tracker, outcome) =
            Tracker::open(storage.clone(), "ada", TrackerConfig::default()).unwrap();
        assert!(matches!(outcome, LoadOutcome::Fresh));

        let toggle = tracker.toggle_quest(QuestId(3)).unwrap();
        assert_eq!(toggle.direction, ToggleDirection::Completed);
        assert_eq!(tracker.progression().xp, 30);

        let (reloaded, outcome) = Tracker::open(storage, "ada", TrackerConfig::default()).unwrap();
        assert!(matches!(outcome, LoadOutcome::Loaded));
        assert_eq!(reloaded.progression().xp, 30);
        assert_eq!(reloaded.progression().attribute_totals.get(Attribute::Discipline), 3);
        assert!(reloaded.profile().completed.contains(QuestId(3)));
    }

    #[test]
    fn unknown_quest_leaves_state_untouched() {
        let storage = MemoryStorage::default();
        let (mut tracker, _) =
            Tracker::open(storage.clone(), "ada", TrackerConfig::default()).unwrap();
        let before = tracker.profile().clone();
        assert!(matches!(
            tracker.toggle_quest(QuestId(99)),
            Err(TrackerError::QuestNotFound(QuestId(99)))
        ));
        assert_eq!(tracker.profile(), &before);
        assert!(storage.docs.borrow().is_empty());
    }

    #[test]
    fn malformed_document_is_archived_before_defaults_are_saved() {
        let storage = MemoryStorage::default();
        let stored = json!({"level": "seven", "xp": 40});
        storage
            .docs
            .borrow_mut()
            .insert("ada".to_string(), stored.clone());
        let (mut tracker, outcome) =
            Tracker::open(storage.clone(), "ada", TrackerConfig::default()).unwrap();
        assert!(matches!(outcome, LoadOutcome::Recovered(ProfileLoadError::Json(_))));
        assert_eq!(tracker.progression(), &ProgressionState::default());
        assert_eq!(tracker.profile().quests.len(), 4);

        tracker.toggle_quest(QuestId(1)).unwrap();
        let docs = storage.docs.borrow();
        assert_eq!(docs.get("ada.bak"), Some(&stored));
        assert_eq!(docs["ada"]["xp"], 20);
    }

    #[test]
    fn failed_save_leaves_profile_unchanged() {
        let storage = FlakyStorage::default();
        let (mut tracker, _) =
            Tracker::open(storage.clone(), "ada", TrackerConfig::default()).unwrap();
        let before = tracker.profile().clone();

        storage.full.set(true);
        assert!(matches!(
            tracker.toggle_quest(QuestId(3)),
            Err(TrackerError::Storage(_))
        ));
        assert!(matches!(
            tracker.add_habit(HabitDraft::new("Stretch", [DayKey::Monday])),
            Err(TrackerError::Storage(_))
        ));
        assert_eq!(tracker.profile(), &before);

        storage.full.set(false);
        let toggle = tracker.toggle_quest(QuestId(3)).unwrap();
        assert_eq!(toggle.direction, ToggleDirection::Completed);
        assert_eq!(tracker.progression().xp, 30);
        assert_eq!(storage.docs.docs.borrow()["ada"]["xp"], 30);
    }

    #[test]
    fn removing_a_completed_quest_reports_drift() {
        let (mut tracker, _) =
            Tracker::open(MemoryStorage::default(), "ada", TrackerConfig::default()).unwrap();
        tracker.toggle_quest(QuestId(4)).unwrap();
        assert!(tracker.attribute_drift().is_empty());
        tracker.remove_quest(QuestId(4)).unwrap();
        assert_eq!(
            tracker.attribute_drift(),
            vec![AttributeDrift {
                attribute: Attribute::Charisma,
                tracked: 2,
                derived: 0,
            }]
        );
        assert!(tracker.profile().completed.is_empty());
    }

    #[test]
    fn habit_lifecycle_through_tracker() {
        let (mut tracker, _) =
            Tracker::open(MemoryStorage::default(), "ada", TrackerConfig::default()).unwrap();
        let habit = tracker
            .add_habit(HabitDraft::new("Exercise", [DayKey::Monday, DayKey::Wednesday]))
            .unwrap();
        assert!(habit.created_at.is_some());
        assert!(tracker.toggle_habit(habit.id, DayKey::Monday, week()).unwrap());
        let summary = tracker.summary(week());
        assert_eq!((summary.total_habits, summary.completed, summary.weekly_goal), (1, 1, 2));
        assert_eq!(tracker.habits_on(DayKey::Wednesday).len(), 1);
        assert!(tracker.habits_on(DayKey::Friday).is_empty());

        let (removed, purged) = tracker.remove_habit(habit.id).unwrap();
        assert_eq!(removed.name, "Exercise");
        assert_eq!(purged, 1);
        assert!(matches!(
            tracker.toggle_habit(habit.id, DayKey::Monday, week()),
            Err(TrackerError::HabitNotFound(_))
        ));
    }

    #[test]
    fn suggestions_are_validated_before_registration() {
        let (mut tracker, _) =
            Tracker::open(MemoryStorage::default(), "ada", TrackerConfig::default()).unwrap();
        let mut batch = tracker
            .request_suggestions(
                &FallbackSuggester::default(),
                "write a novel",
                GoalKind::Material,
                1,
            )
            .unwrap();
        batch.quests.push(QuestSuggestion {
            text: "Write 10,000 words".to_string(),
            xp: 500,
            stat_deltas: StatDeltas::new(),
            ai_generated: true,
            source_goal: Some("write a novel".to_string()),
        });
        let result = tracker.accept_suggestions(batch.quests).unwrap();
        assert_eq!(result.accepted.len(), 3);
        assert_eq!(result.rejected.len(), 1);
        assert_eq!(result.accepted[0].id, QuestId(5));
        assert_eq!(tracker.profile().quests.count_for_goal("write a novel"), 3);
    }
}
