//! Recurring habits and the per-day, per-week completion ledger.
use chrono::{Datelike, Days, NaiveDate, Weekday};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use smallvec::SmallVec;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;
use crate::registry::HabitRegistry;

/// Canonical weekday keys, Monday first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DayKey {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl DayKey {
    pub const ALL: [Self; 7] = [
        Self::Monday,
        Self::Tuesday,
        Self::Wednesday,
        Self::Thursday,
        Self::Friday,
        Self::Saturday,
        Self::Sunday,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Monday => "monday",
            Self::Tuesday => "tuesday",
            Self::Wednesday => "wednesday",
            Self::Thursday => "thursday",
            Self::Friday => "friday",
            Self::Saturday => "saturday",
            Self::Sunday => "sunday",
        }
    }

    #[must_use]
    pub const fn short_label(self) -> &'static str {
        match self {
            Self::Monday => "Mon",
            Self::Tuesday => "Tue",
            Self::Wednesday => "Wed",
            Self::Thursday => "Thu",
            Self::Friday => "Fri",
            Self::Saturday => "Sat",
            Self::Sunday => "Sun",
        }
    }

    /// Zero-based offset from Monday.
    #[must_use]
    pub const fn offset(self) -> u32 {
        match self {
            Self::Monday => 0,
            Self::Tuesday => 1,
            Self::Wednesday => 2,
            Self::Thursday => 3,
            Self::Friday => 4,
            Self::Saturday => 5,
            Self::Sunday => 6,
        }
    }
}

impl fmt::Display for DayKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DayKey {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|day| day.as_str() == lowered || day.short_label().eq_ignore_ascii_case(&lowered))
            .ok_or_else(|| ValidationError::UnknownDay(s.to_string()))
    }
}

impl From<Weekday> for DayKey {
    fn from(value: Weekday) -> Self {
        match value {
            Weekday::Mon => Self::Monday,
            Weekday::Tue => Self::Tuesday,
            Weekday::Wed => Self::Wednesday,
            Weekday::Thu => Self::Thursday,
            Weekday::Fri => Self::Friday,
            Weekday::Sat => Self::Saturday,
            Weekday::Sun => Self::Sunday,
        }
    }
}

/// Opaque habit identifier. Issued once and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HabitId(pub u64);

impl fmt::Display for HabitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for HabitId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(Self)
    }
}

/// Scheduled weekdays; a week never holds more than seven.
pub type DaySet = SmallVec<[DayKey; 7]>;

/// A recurring task scheduled on specific weekdays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Habit {
    pub id: HabitId,
    pub name: String,
    pub days: DaySet,
    /// Redundant copy of `days.len()`, kept for display.
    pub frequency: u32,
    pub total_per_week: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl Habit {
    #[must_use]
    pub fn is_scheduled_on(&self, day: DayKey) -> bool {
        self.days.contains(&day)
    }

    /// # Errors
    ///
    /// Returns the first violated field rule.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_fields(&self.name, &self.days)
    }
}

/// User-supplied habit fields, used for both creation and whole-record edits.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct HabitDraft {
    pub name: String,
    pub days: Vec<DayKey>,
}

impl HabitDraft {
    #[must_use]
    pub fn new(name: impl Into<String>, days: impl IntoIterator<Item = DayKey>) -> Self {
        Self {
            name: name.into(),
            days: days.into_iter().collect(),
        }
    }

    /// # Errors
    ///
    /// Returns `EmptyName`, `NoDaysSelected` or `DuplicateDay`.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_fields(&self.name, &self.days)
    }

    pub(crate) fn into_habit(self, id: HabitId, created_at: Option<String>) -> Habit {
        let mut days: DaySet = self.days.into_iter().collect();
        days.sort_unstable();
        let count = u32::try_from(days.len()).unwrap_or(u32::MAX);
        Habit {
            id,
            name: self.name.trim().to_string(),
            days,
            frequency: count,
            total_per_week: count,
            created_at,
        }
    }
}

fn validate_fields(name: &str, days: &[DayKey]) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        return Err(ValidationError::EmptyName);
    }
    if days.is_empty() {
        return Err(ValidationError::NoDaysSelected);
    }
    for (idx, day) in days.iter().enumerate() {
        if days[..idx].contains(day) {
            return Err(ValidationError::DuplicateDay(*day));
        }
    }
    Ok(())
}

/// Identifies a calendar week by the date of its Monday.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WeekKey(NaiveDate);

impl WeekKey {
    /// Week containing `date`; Sunday closes the week that began six days earlier.
    #[must_use]
    pub fn containing(date: NaiveDate) -> Self {
        let back = u64::from(date.weekday().num_days_from_monday());
        Self(date.checked_sub_days(Days::new(back)).unwrap_or(date))
    }

    /// Week for a Monday date that was recorded up to a day off, as happens
    /// when a local Monday is written out in UTC. A Sunday rounds forward to
    /// the following Monday; any other date maps to the week containing it.
    #[must_use]
    pub fn from_recorded_monday(date: NaiveDate) -> Self {
        if date.weekday() == Weekday::Sun {
            Self::containing(date.succ_opt().unwrap_or(date))
        } else {
            Self::containing(date)
        }
    }

    #[must_use]
    pub const fn monday(self) -> NaiveDate {
        self.0
    }

    /// Calendar date of `day` within this week.
    #[must_use]
    pub fn date_of(self, day: DayKey) -> Option<NaiveDate> {
        self.0.checked_add_days(Days::new(u64::from(day.offset())))
    }

    /// The seven dates of the week, Monday first.
    #[must_use]
    pub fn dates(self) -> Vec<(DayKey, NaiveDate)> {
        DayKey::ALL
            .into_iter()
            .filter_map(|day| self.date_of(day).map(|date| (day, date)))
            .collect()
    }
}

impl fmt::Display for WeekKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

impl FromStr for WeekKey {
    type Err = ValidationError;

    /// Parses the Monday date; any other weekday is rejected.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let date = NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
            .map_err(|_| ValidationError::InvalidWeekKey(s.to_string()))?;
        if date.weekday() != Weekday::Mon {
            return Err(ValidationError::InvalidWeekKey(s.to_string()));
        }
        Ok(Self(date))
    }
}

impl Serialize for WeekKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for WeekKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Composite ledger key. Serialized as `"{habitId}-{day}-{weekKey}"`.
///
/// Parsing tolerates a week date one day off its Monday; see
/// [`WeekKey::from_recorded_monday`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HabitCompletionKey {
    pub habit_id: HabitId,
    pub week: WeekKey,
    pub day: DayKey,
}

impl HabitCompletionKey {
    #[must_use]
    pub const fn new(habit_id: HabitId, day: DayKey, week: WeekKey) -> Self {
        Self { habit_id, week, day }
    }
}

impl fmt::Display for HabitCompletionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.habit_id, self.day, self.week)
    }
}

impl FromStr for HabitCompletionKey {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ValidationError::InvalidCompletionKey(s.to_string());
        let mut parts = s.splitn(3, '-');
        let (Some(id), Some(day), Some(week)) = (parts.next(), parts.next(), parts.next()) else {
            return Err(invalid());
        };
        let habit_id = id.parse::<HabitId>().map_err(|_| invalid())?;
        let day = day.parse::<DayKey>().map_err(|_| invalid())?;
        let recorded = NaiveDate::parse_from_str(week, "%Y-%m-%d").map_err(|_| invalid())?;
        Ok(Self::new(habit_id, day, WeekKey::from_recorded_monday(recorded)))
    }
}

impl Serialize for HabitCompletionKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for HabitCompletionKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// `(habit, weekday, week) → done` flags. Absent keys read as not done.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HabitLedger(BTreeMap<HabitCompletionKey, bool>);

impl HabitLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_completed(&self, key: &HabitCompletionKey) -> bool {
        self.0.get(key).copied().unwrap_or(false)
    }

    /// Stored entries, including explicit `false` flags left by un-toggling.
    pub fn entries(&self) -> impl Iterator<Item = (&HabitCompletionKey, bool)> {
        self.0.iter().map(|(key, done)| (key, *done))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Keys marked done within `week`.
    #[must_use]
    pub fn completed_in_week(&self, week: WeekKey) -> usize {
        self.0
            .iter()
            .filter(|(key, done)| key.week == week && **done)
            .count()
    }

    fn flip(&mut self, key: HabitCompletionKey) -> bool {
        let entry = self.0.entry(key).or_insert(false);
        *entry = !*entry;
        *entry
    }

    fn purge_habit(&mut self, habit_id: HabitId) -> usize {
        let before = self.0.len();
        self.0.retain(|key, _| key.habit_id != habit_id);
        before - self.0.len()
    }
}

impl FromIterator<(HabitCompletionKey, bool)> for HabitLedger {
    fn from_iter<T: IntoIterator<Item = (HabitCompletionKey, bool)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Flip the completion flag for one habit on one day of one week.
#[must_use]
pub fn toggle_habit_completion(
    ledger: &HabitLedger,
    habit_id: HabitId,
    day: DayKey,
    week: WeekKey,
) -> HabitLedger {
    let mut next = ledger.clone();
    let key = HabitCompletionKey::new(habit_id, day, week);
    let done = next.flip(key);
    log::debug!("habit {key} toggled to {done}");
    next
}

#[must_use]
pub fn is_habit_completed(
    ledger: &HabitLedger,
    habit_id: HabitId,
    day: DayKey,
    week: WeekKey,
) -> bool {
    ledger.is_completed(&HabitCompletionKey::new(habit_id, day, week))
}

/// Habits whose schedule includes `day`, in registry order.
#[must_use]
pub fn habits_scheduled_on(registry: &HabitRegistry, day: DayKey) -> Vec<&Habit> {
    registry
        .habits()
        .iter()
        .filter(|habit| habit.is_scheduled_on(day))
        .collect()
}

/// Aggregate counts shown under the weekly calendar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HabitSummary {
    pub week: WeekKey,
    pub total_habits: usize,
    pub completed: usize,
    pub weekly_goal: u64,
}

#[must_use]
pub fn weekly_summary(
    registry: &HabitRegistry,
    ledger: &HabitLedger,
    week: WeekKey,
) -> HabitSummary {
    HabitSummary {
        week,
        total_habits: registry.len(),
        completed: ledger.completed_in_week(week),
        weekly_goal: registry
            .habits()
            .iter()
            .map(|habit| u64::from(habit.total_per_week))
            .sum(),
    }
}

/// Registry and ledger after a habit was deleted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HabitRemoval {
    pub registry: HabitRegistry,
    pub ledger: HabitLedger,
    pub removed: Habit,
    pub purged_entries: usize,
}

/// Delete a habit and every ledger entry keyed on it. `None` when the id is unknown.
#[must_use]
pub fn remove_habit(
    registry: &HabitRegistry,
    ledger: &HabitLedger,
    habit_id: HabitId,
) -> Option<HabitRemoval> {
    let mut next_registry = registry.clone();
    let removed = next_registry.remove(habit_id)?;
    let mut next_ledger = ledger.clone();
    let purged_entries = next_ledger.purge_habit(habit_id);
    Some(HabitRemoval {
        registry: next_registry,
        ledger: next_ledger,
        removed,
        purged_entries,
    })
}
