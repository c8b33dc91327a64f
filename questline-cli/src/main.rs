mod report;
mod storage;
mod suggest;

use anyhow::{Context, Result, bail};
use chrono::{Datelike, Local, NaiveDate};
use clap::{Parser, Subcommand};
use colored::Colorize;
use questline_core::{
    Attribute, DayKey, FallbackSuggester, GoalKind, HabitDraft, HabitId, LoadOutcome, QuestDraft,
    QuestId, Tracker, TrackerConfig, TrackerError, WeekKey, build_prompt, parse_quest_xp,
    parse_stat_delta, suggestion_plan,
};
use std::fs::File;
use std::io::{BufWriter, Write, stdout};
use std::path::{Path, PathBuf};

use report::{
    HabitChangeView, HabitLine, HabitListView, HabitToggleView, NoticeView,
    QuestChangeView, QuestLine, QuestListView, QuestToggleView, RejectedLine, ReportFormat,
    StatusView, SuggestionView, SummaryView, emit,
};
use storage::FileStorage;
use suggest::ResponseFileSuggester;

const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Parser)]
#[command(name = "questline", version)]
#[command(about = "Track quests and weekly habits, earn XP and level up attributes")]
struct Args {
    /// Directory holding one profile document per user
    #[arg(long, global = true, default_value = "questline-data")]
    data_dir: PathBuf,

    /// Profile to operate on
    #[arg(long, global = true, default_value = "default")]
    user: String,

    /// Tracker configuration (JSON); defaults to <data-dir>/config.json when present
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output report format
    #[arg(long, global = true, value_enum, default_value_t = ReportFormat::Console)]
    report: ReportFormat,

    /// Any date inside the week to use for habits (YYYY-MM-DD); defaults to this week
    #[arg(long, global = true, value_parser = parse_week)]
    week: Option<WeekKey>,

    /// Optional path to write the report output instead of stdout
    #[arg(long, global = true)]
    output: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Level, XP and attribute totals
    Status,
    /// List quests and today's completions
    Quests,
    /// Create a custom quest
    AddQuest {
        #[arg(long)]
        text: String,
        /// XP reward, a positive whole number
        #[arg(long, value_parser = parse_quest_xp)]
        xp: u32,
        /// Attribute reward as attribute=amount (repeatable)
        #[arg(long = "stat", value_parser = parse_stat_delta)]
        stats: Vec<(Attribute, u32)>,
    },
    /// Complete a quest, or reopen it when already completed
    ToggleQuest { id: QuestId },
    /// Delete a quest
    RemoveQuest { id: QuestId },
    /// Clear today's completions, keeping XP and attributes
    NewDay,
    /// Show habits for the week, or only those scheduled on one day
    Habits {
        #[arg(long)]
        day: Option<DayKey>,
    },
    /// Create a weekly habit
    AddHabit {
        #[arg(long)]
        name: String,
        /// Comma-separated weekdays, e.g. mon,wed,fri
        #[arg(long, value_delimiter = ',', required = true)]
        days: Vec<DayKey>,
    },
    /// Rename or reschedule a habit, keeping its history
    EditHabit {
        id: HabitId,
        #[arg(long)]
        name: Option<String>,
        #[arg(long, value_delimiter = ',')]
        days: Option<Vec<DayKey>>,
    },
    /// Mark a habit done (or not done) for a day of the selected week
    ToggleHabit {
        id: HabitId,
        /// Defaults to today
        #[arg(long)]
        day: Option<DayKey>,
    },
    /// Delete a habit and its completion history
    RemoveHabit { id: HabitId },
    /// Weekly habit completion summary
    Summary,
    /// Suggest quests for a goal
    Suggest {
        goal: String,
        #[arg(long, default_value_t = GoalKind::Habit)]
        kind: GoalKind,
        /// How many goals the user is pursuing in total
        #[arg(long, default_value_t = 1)]
        goals: usize,
        /// Parse a saved text-generation reply instead of using the offline templates
        #[arg(long)]
        response: Option<PathBuf>,
        /// Also print the prompt for a text-generation service
        #[arg(long)]
        prompt: bool,
        /// Register the valid suggestions as quests
        #[arg(long)]
        accept: bool,
    },
    /// Delete the profile and start over
    Reset {
        #[arg(long)]
        yes: bool,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    run(&args)
}

fn parse_week(input: &str) -> Result<WeekKey, chrono::ParseError> {
    NaiveDate::parse_from_str(input.trim(), "%Y-%m-%d").map(WeekKey::containing)
}

fn current_week() -> WeekKey {
    WeekKey::containing(Local::now().date_naive())
}

fn today() -> DayKey {
    DayKey::from(Local::now().weekday())
}

fn load_config(explicit: Option<&Path>, data_dir: &Path) -> Result<TrackerConfig> {
    if let Some(path) = explicit {
        return TrackerConfig::from_file(path)
            .with_context(|| format!("failed to load config {}", path.display()));
    }
    let path = data_dir.join(CONFIG_FILE);
    if path.is_file() {
        TrackerConfig::from_file(&path)
            .with_context(|| format!("failed to load config {}", path.display()))
    } else {
        Ok(TrackerConfig::default())
    }
}

fn run(args: &Args) -> Result<()> {
    let config = load_config(args.config.as_deref(), &args.data_dir)?;
    let storage = FileStorage::new(&args.data_dir);
    let (mut tracker, outcome) = Tracker::open(storage, args.user.as_str(), config)
        .with_context(|| format!("failed to open profile '{}'", args.user))?;
    let recovered = match outcome {
        LoadOutcome::Recovered(err) => {
            let backup = tracker.storage().backup_path(&args.user)?;
            eprintln!(
                "{} profile '{}' could not be read ({err}); saved a copy to {} and started fresh",
                "⚠️ ".yellow(),
                args.user,
                backup.display()
            );
            Some(err.to_string())
        }
        LoadOutcome::Fresh | LoadOutcome::Loaded => None,
    };
    let week = args.week.unwrap_or_else(current_week);
    let mut output = OutputTarget::new(args.output.clone())?;

    execute(&mut tracker, &args.command, week, recovered, args.report, &mut output)?;
    output.flush_inner()?;
    Ok(())
}

fn execute(
    tracker: &mut Tracker<FileStorage>,
    command: &Command,
    week: WeekKey,
    recovered: Option<String>,
    format: ReportFormat,
    out: &mut dyn Write,
) -> Result<()> {
    match command {
        Command::Status => {
            let view = StatusView::new(
                tracker.user_id(),
                tracker.profile(),
                tracker.attribute_drift(),
                recovered,
            );
            emit(out, format, &view)
        }
        Command::Quests => emit(out, format, &QuestListView::new(tracker.profile())),
        Command::AddQuest { text, xp, stats } => {
            let draft = stats
                .iter()
                .fold(QuestDraft::new(text.as_str(), *xp), |draft, (attr, amount)| {
                    draft.with_delta(*attr, *amount)
                });
            let quest = tracker.add_quest(draft)?;
            let view = QuestChangeView {
                action: "Added",
                quest: QuestLine {
                    quest,
                    completed: false,
                },
            };
            emit(out, format, &view)
        }
        Command::ToggleQuest { id } => {
            let quest = tracker
                .profile()
                .quests
                .get(*id)
                .cloned()
                .ok_or(TrackerError::QuestNotFound(*id))?;
            let toggle = tracker.toggle_quest(*id)?;
            emit(out, format, &QuestToggleView::new(&quest, &toggle))
        }
        Command::RemoveQuest { id } => {
            let quest = tracker.remove_quest(*id)?;
            let view = QuestChangeView {
                action: "Removed",
                quest: QuestLine {
                    quest,
                    completed: false,
                },
            };
            emit(out, format, &view)
        }
        Command::NewDay => {
            let cleared = tracker.start_new_day()?;
            let view = NoticeView {
                message: format!("New day started, {cleared} completed quests reopened"),
            };
            emit(out, format, &view)
        }
        Command::Habits { day } => {
            let habits = match day {
                Some(day) => tracker.habits_on(*day),
                None => tracker.profile().habits.habits().iter().collect(),
            };
            let view = HabitListView {
                week,
                day: *day,
                habits: habits
                    .into_iter()
                    .map(|habit| HabitLine::new(habit, tracker.profile(), week))
                    .collect(),
            };
            emit(out, format, &view)
        }
        Command::AddHabit { name, days } => {
            let habit = tracker.add_habit(HabitDraft::new(name.as_str(), days.iter().copied()))?;
            let view = HabitChangeView {
                action: "Added",
                habit,
                purged_entries: None,
            };
            emit(out, format, &view)
        }
        Command::EditHabit { id, name, days } => {
            let existing = tracker
                .profile()
                .habits
                .get(*id)
                .cloned()
                .ok_or(TrackerError::HabitNotFound(*id))?;
            let draft = HabitDraft::new(
                name.clone().unwrap_or(existing.name),
                days.clone().unwrap_or_else(|| existing.days.to_vec()),
            );
            let habit = tracker.update_habit(*id, draft)?;
            let view = HabitChangeView {
                action: "Updated",
                habit,
                purged_entries: None,
            };
            emit(out, format, &view)
        }
        Command::ToggleHabit { id, day } => {
            let day = day.unwrap_or_else(today);
            let completed = tracker.toggle_habit(*id, day, week)?;
            let habit = tracker
                .profile()
                .habits
                .get(*id)
                .ok_or(TrackerError::HabitNotFound(*id))?;
            let view = HabitToggleView {
                habit_id: habit.id,
                name: habit.name.clone(),
                day,
                week,
                completed,
                scheduled: habit.is_scheduled_on(day),
            };
            emit(out, format, &view)
        }
        Command::RemoveHabit { id } => {
            let (habit, purged) = tracker.remove_habit(*id)?;
            let view = HabitChangeView {
                action: "Removed",
                habit,
                purged_entries: Some(purged),
            };
            emit(out, format, &view)
        }
        Command::Summary => emit(out, format, &SummaryView { summary: tracker.summary(week) }),
        Command::Suggest {
            goal,
            kind,
            goals,
            response,
            prompt,
            accept,
        } => {
            let config = tracker.config().suggestions.clone();
            let request = tracker.suggestion_request(goal, *kind, *goals);
            let batch = match response {
                Some(path) => tracker.request_suggestions(
                    &ResponseFileSuggester::new(path.clone(), config.clone()),
                    goal,
                    *kind,
                    *goals,
                )?,
                None => tracker.request_suggestions(
                    &FallbackSuggester::new(config.clone()),
                    goal,
                    *kind,
                    *goals,
                )?,
            };
            let prompt = prompt
                .then(|| build_prompt(&request, &suggestion_plan(&request, &config), &config));
            let (accepted, rejected) = if *accept {
                let result = tracker.accept_suggestions(batch.quests.clone())?;
                let rejected = result
                    .rejected
                    .into_iter()
                    .map(|(suggestion, err)| RejectedLine {
                        text: suggestion.text,
                        reason: err.to_string(),
                    })
                    .collect();
                (result.accepted, rejected)
            } else {
                (Vec::new(), Vec::new())
            };
            let view = SuggestionView {
                goal: goal.clone(),
                prompt,
                advice: batch.advice,
                suggestions: batch.quests,
                accepted,
                rejected,
            };
            emit(out, format, &view)
        }
        Command::Reset { yes } => {
            if !yes {
                bail!("refusing to reset profile '{}' without --yes", tracker.user_id());
            }
            tracker.reset()?;
            let view = NoticeView {
                message: format!("Profile '{}' reset", tracker.user_id()),
            };
            emit(out, format, &view)
        }
    }
}

enum OutputTarget {
    Stdout(BufWriter<std::io::Stdout>),
    File(BufWriter<File>),
}

impl OutputTarget {
    fn new(path: Option<PathBuf>) -> Result<Self> {
        if let Some(path) = path {
            let file = File::create(&path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            Ok(Self::File(BufWriter::new(file)))
        } else {
            Ok(Self::Stdout(BufWriter::new(stdout())))
        }
    }

    fn writer(&mut self) -> &mut dyn Write {
        match self {
            Self::Stdout(w) => w,
            Self::File(w) => w,
        }
    }

    fn flush_inner(&mut self) -> std::io::Result<()> {
        match self {
            Self::Stdout(w) => w.flush(),
            Self::File(w) => w.flush(),
        }
    }
}

impl Write for OutputTarget {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.writer().write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.flush_inner()
    }
}
