use chrono::NaiveDate;
use questline_core::{
    DayKey, HabitDraft, HabitId, HabitLedger, HabitRegistry, WeekKey, is_habit_completed,
    remove_habit, toggle_habit_completion, weekly_summary,
};

fn week(date: &str) -> WeekKey {
    date.parse().unwrap()
}

fn registry() -> HabitRegistry {
    let mut registry = HabitRegistry::new();
    registry
        .add_habit(HabitDraft::new("Exercise", [DayKey::Monday, DayKey::Thursday]), None)
        .unwrap();
    registry
        .add_habit(HabitDraft::new("Journal", DayKey::ALL), None)
        .unwrap();
    registry
}

#[test]
fn toggles_are_isolated_by_week_and_habit() {
    let w1 = week("2026-10-05");
    let w2 = week("2026-10-12");
    let (a, b) = (HabitId(1), HabitId(2));

    let mut ledger = toggle_habit_completion(&HabitLedger::new(), b, DayKey::Monday, w1);
    ledger = toggle_habit_completion(&ledger, a, DayKey::Monday, w2);
    let before_w1_b = is_habit_completed(&ledger, b, DayKey::Monday, w1);

    ledger = toggle_habit_completion(&ledger, a, DayKey::Monday, w1);

    assert!(is_habit_completed(&ledger, a, DayKey::Monday, w1));
    assert!(is_habit_completed(&ledger, a, DayKey::Monday, w2));
    assert_eq!(is_habit_completed(&ledger, b, DayKey::Monday, w1), before_w1_b);
    assert!(!is_habit_completed(&ledger, a, DayKey::Tuesday, w1));
}

#[test]
fn toggling_twice_records_an_explicit_false() {
    let w = week("2026-10-12");
    let once = toggle_habit_completion(&HabitLedger::new(), HabitId(1), DayKey::Friday, w);
    let twice = toggle_habit_completion(&once, HabitId(1), DayKey::Friday, w);
    assert!(!is_habit_completed(&twice, HabitId(1), DayKey::Friday, w));
    assert_eq!(twice.len(), 1);
    assert_eq!(twice.completed_in_week(w), 0);
}

#[test]
fn deletion_purges_only_that_habit() {
    let registry = registry();
    let w = week("2026-10-12");
    let mut ledger = HabitLedger::new();
    for day in [DayKey::Monday, DayKey::Thursday] {
        ledger = toggle_habit_completion(&ledger, HabitId(1), day, w);
    }
    ledger = toggle_habit_completion(&ledger, HabitId(2), DayKey::Sunday, w);

    let removal = remove_habit(&registry, &ledger, HabitId(1)).unwrap();
    assert_eq!(removal.purged_entries, 2);
    assert!(removal.ledger.entries().all(|(key, _)| key.habit_id != HabitId(1)));
    assert!(is_habit_completed(&removal.ledger, HabitId(2), DayKey::Sunday, w));
    assert!(removal.registry.get(HabitId(1)).is_none());
    assert_eq!(registry.len(), 2);
}

#[test]
fn summary_counts_the_requested_week_only() {
    let registry = registry();
    let this_week = week("2026-10-12");
    let last_week = week("2026-10-05");
    let mut ledger = HabitLedger::new();
    ledger = toggle_habit_completion(&ledger, HabitId(1), DayKey::Monday, this_week);
    ledger = toggle_habit_completion(&ledger, HabitId(2), DayKey::Tuesday, this_week);
    ledger = toggle_habit_completion(&ledger, HabitId(2), DayKey::Monday, last_week);

    let summary = weekly_summary(&registry, &ledger, this_week);
    assert_eq!(summary.total_habits, 2);
    assert_eq!(summary.completed, 2);
    assert_eq!(summary.weekly_goal, 9);
}

#[test]
fn week_keys_anchor_on_monday() {
    let sunday = NaiveDate::from_ymd_opt(2026, 10, 18).unwrap();
    let w = WeekKey::containing(sunday);
    assert_eq!(w.to_string(), "2026-10-12");
    assert_eq!(w.date_of(DayKey::Sunday), Some(sunday));
    assert!("2026-10-13".parse::<WeekKey>().is_err());
}
