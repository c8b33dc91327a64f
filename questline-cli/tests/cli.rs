use serde_json::Value;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

fn temp_path(label: &str) -> PathBuf {
    std::env::temp_dir().join(format!(
        "questline-cli-{label}-{}",
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos()
    ))
}

fn questline(data_dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_questline"))
        .arg("--data-dir")
        .arg(data_dir)
        .args(["--user", "ada", "--report", "json", "--week", "2026-10-14"])
        .args(args)
        .output()
        .expect("run cli")
}

fn json(output: &Output) -> Value {
    assert!(
        output.status.success(),
        "command failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("json report")
}

#[test]
fn fresh_profile_has_default_quests_and_persists_toggles() {
    let dir = temp_path("quests");
    let status = json(&questline(&dir, &["status"]));
    assert_eq!(status["level"], 1);
    assert_eq!(status["xp"], 0);

    let quests = json(&questline(&dir, &["quests"]));
    assert_eq!(quests["quests"].as_array().unwrap().len(), 4);

    let toggle = json(&questline(&dir, &["toggle-quest", "3"]));
    assert_eq!(toggle["direction"], "completed");
    assert_eq!(toggle["xp"], 30);

    let status = json(&questline(&dir, &["status"]));
    assert_eq!(status["xp"], 30);
    assert_eq!(status["completedToday"], 1);
    assert!(dir.join("ada.json").is_file());

    let toggle = json(&questline(&dir, &["toggle-quest", "3"]));
    assert_eq!(toggle["direction"], "uncompleted");
    assert_eq!(toggle["xp"], 0);
    let _ = std::fs::remove_dir_all(dir);
}

#[test]
fn custom_quests_level_up_and_keep_unique_ids() {
    let dir = temp_path("custom");
    let added = json(&questline(
        &dir,
        &["add-quest", "--text", "Run 5k", "--xp", "120", "--stat", "health=4"],
    ));
    assert_eq!(added["quest"]["id"], 5);

    let toggle = json(&questline(&dir, &["toggle-quest", "5"]));
    assert_eq!(toggle["level"], 2);
    assert_eq!(toggle["xp"], 20);
    assert_eq!(toggle["levelDelta"], 1);

    json(&questline(&dir, &["remove-quest", "5"]));
    let status = json(&questline(&dir, &["status"]));
    assert_eq!(status["drift"][0]["attribute"], "healthWellness");
    assert_eq!(status["drift"][0]["tracked"], 4);

    let again = json(&questline(&dir, &["add-quest", "--text", "Swim", "--xp", "10"]));
    assert_eq!(again["quest"]["id"], 6);
    let _ = std::fs::remove_dir_all(dir);
}

#[test]
fn unknown_quest_fails_without_touching_the_profile() {
    let dir = temp_path("missing");
    let output = questline(&dir, &["toggle-quest", "42"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("42"));
    assert!(!dir.join("ada.json").exists());
}

#[test]
fn habits_track_weekly_completion() {
    let dir = temp_path("habits");
    let habit = json(&questline(
        &dir,
        &["add-habit", "--name", "Exercise", "--days", "mon,wed,fri"],
    ));
    assert_eq!(habit["habit"]["totalPerWeek"], 3);
    assert!(habit["habit"]["createdAt"].is_string());

    let toggled = json(&questline(&dir, &["toggle-habit", "1", "--day", "wed"]));
    assert_eq!(toggled["completed"], true);
    assert_eq!(toggled["week"], "2026-10-12");

    let summary = json(&questline(&dir, &["summary"]));
    assert_eq!(summary["completed"], 1);
    assert_eq!(summary["weeklyGoal"], 3);

    let next_week = Command::new(env!("CARGO_BIN_EXE_questline"))
        .arg("--data-dir")
        .arg(&dir)
        .args(["--user", "ada", "--report", "json", "--week", "2026-10-19", "summary"])
        .output()
        .expect("run cli");
    assert_eq!(json(&next_week)["completed"], 0);

    let tuesday = json(&questline(&dir, &["habits", "--day", "tue"]));
    assert!(tuesday["habits"].as_array().unwrap().is_empty());

    let removed = json(&questline(&dir, &["remove-habit", "1"]));
    assert_eq!(removed["purgedEntries"], 1);
    let _ = std::fs::remove_dir_all(dir);
}

#[test]
fn suggestions_can_be_replayed_and_accepted() {
    let dir = temp_path("suggest");
    std::fs::create_dir_all(&dir).unwrap();
    let reply = dir.join("reply.txt");
    std::fs::write(
        &reply,
        "Here you go:\n[{\"text\": \"Practice scales\", \"xp\": 30, \
         \"stats\": {\"discipline\": 2}}, {\"text\": \"Learn a song\", \"xp\": 500}]",
    )
    .unwrap();

    let output = questline(
        &dir,
        &["suggest", "learn piano", "--response", reply.to_str().unwrap(), "--accept", "--prompt"],
    );
    let view = json(&output);
    assert_eq!(view["suggestions"].as_array().unwrap().len(), 2);
    assert_eq!(view["accepted"][0]["text"], "Practice scales");
    assert_eq!(view["accepted"][0]["sourceGoal"], "learn piano");
    assert_eq!(view["rejected"].as_array().unwrap().len(), 1);
    assert!(view["prompt"].as_str().unwrap().contains("learn piano"));

    let offline = json(&questline(&dir, &["suggest", "buy a bike", "--kind", "material"]));
    assert_eq!(offline["suggestions"].as_array().unwrap().len(), 3);
    assert!(offline["accepted"].as_array().unwrap().is_empty());
    let _ = std::fs::remove_dir_all(dir);
}

#[test]
fn corrupt_profile_falls_back_and_reset_requires_confirmation() {
    let dir = temp_path("corrupt");
    std::fs::create_dir_all(&dir).unwrap();
    let original = r#"{"level": 0, "xp": 5}"#;
    std::fs::write(dir.join("ada.json"), original).unwrap();

    let output = questline(&dir, &["status"]);
    let status = json(&output);
    assert_eq!(status["level"], 1);
    assert!(status["recoveredFrom"].is_string());
    assert!(String::from_utf8_lossy(&output.stderr).contains("ada.json.bak"));

    json(&questline(&dir, &["toggle-quest", "1"]));
    let backup = std::fs::read_to_string(dir.join("ada.json.bak")).unwrap();
    assert_eq!(backup, original);

    assert!(!questline(&dir, &["reset"]).status.success());
    json(&questline(&dir, &["reset", "--yes"]));
    assert!(!dir.join("ada.json").exists());
    let _ = std::fs::remove_dir_all(dir);
}

#[test]
fn console_report_writes_to_output_file() {
    let dir = temp_path("console");
    let report = temp_path("console-report.txt");
    let status = Command::new(env!("CARGO_BIN_EXE_questline"))
        .arg("--data-dir")
        .arg(&dir)
        .args(["quests", "--output"])
        .arg(&report)
        .status()
        .expect("run cli");
    assert!(status.success());
    let content = std::fs::read_to_string(&report).expect("read output");
    assert!(content.contains("Workout"));
    let _ = std::fs::remove_file(report);
}
