use anyhow::Result;
use clap::ValueEnum;
use colored::Colorize;
use questline_core::{
    Attribute, AttributeDrift, DayKey, Habit, HabitSummary, Profile, Quest, QuestSuggestion,
    QuestToggle, StatDeltas, ToggleDirection, WeekKey, XP_PER_LEVEL, is_habit_completed,
};
use serde::Serialize;
use std::io::Write;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    /// Human-readable, colored output
    Console,
    /// Pretty-printed JSON
    Json,
}

/// Something the CLI can print in either report format.
pub trait ConsoleView {
    fn render(&self, out: &mut dyn Write) -> std::io::Result<()>;
}

pub fn emit<V>(out: &mut dyn Write, format: ReportFormat, view: &V) -> Result<()>
where
    V: Serialize + ConsoleView,
{
    match format {
        ReportFormat::Json => {
            serde_json::to_writer_pretty(&mut *out, view)?;
            writeln!(out)?;
        }
        ReportFormat::Console => view.render(out)?,
    }
    Ok(())
}

fn format_deltas(deltas: &StatDeltas) -> String {
    if deltas.is_empty() {
        return "-".to_string();
    }
    deltas
        .iter()
        .map(|(attr, amount)| format!("{} +{amount}", attr.label()))
        .collect::<Vec<_>>()
        .join(", ")
}

fn progress_bar(xp: u32) -> String {
    let filled = usize::try_from(xp.min(XP_PER_LEVEL) * 20 / XP_PER_LEVEL).unwrap_or(20);
    format!("[{}{}]", "#".repeat(filled), ".".repeat(20 - filled))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeLine {
    pub attribute: Attribute,
    pub total: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusView {
    pub user: String,
    pub level: u32,
    pub xp: u32,
    pub xp_to_next_level: u32,
    pub lifetime_xp: u64,
    pub completed_today: usize,
    pub attributes: Vec<AttributeLine>,
    pub drift: Vec<AttributeDrift>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recovered_from: Option<String>,
}

impl StatusView {
    pub fn new(
        user: &str,
        profile: &Profile,
        drift: Vec<AttributeDrift>,
        recovered_from: Option<String>,
    ) -> Self {
        let progression = &profile.progression;
        Self {
            user: user.to_string(),
            level: progression.level,
            xp: progression.xp,
            xp_to_next_level: progression.xp_to_next_level(),
            lifetime_xp: progression.lifetime_xp(),
            completed_today: profile.completed.len(),
            attributes: progression
                .attribute_totals
                .iter_all()
                .map(|(attribute, total)| AttributeLine { attribute, total })
                .collect(),
            drift,
            recovered_from,
        }
    }
}

impl ConsoleView for StatusView {
    fn render(&self, out: &mut dyn Write) -> std::io::Result<()> {
        if let Some(reason) = &self.recovered_from {
            writeln!(
                out,
                "{} stored profile was unreadable ({reason}); started fresh",
                "⚠️ ".yellow()
            )?;
        }
        let title = format!("⚔️  {} - Level {}", self.user, self.level);
        writeln!(out, "{}", title.bright_cyan().bold())?;
        writeln!(
            out,
            "XP {} {}/{} ({} to next level, {} lifetime)",
            progress_bar(self.xp),
            self.xp,
            XP_PER_LEVEL,
            self.xp_to_next_level,
            self.lifetime_xp
        )?;
        writeln!(out, "Quests completed today: {}", self.completed_today)?;
        writeln!(out)?;
        writeln!(out, "{}", "Attributes".bold())?;
        for line in &self.attributes {
            writeln!(out, "  {:18} {}", line.attribute.label(), line.total.to_string().green())?;
        }
        if !self.drift.is_empty() {
            writeln!(out)?;
            writeln!(out, "{}", "Attribute drift (deleted or edited quests)".yellow())?;
            for line in &self.drift {
                writeln!(
                    out,
                    "  {:18} tracked {} / from quests {}",
                    line.attribute.label(),
                    line.tracked,
                    line.derived
                )?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestLine {
    #[serde(flatten)]
    pub quest: Quest,
    pub completed: bool,
}

impl QuestLine {
    fn render(&self, out: &mut dyn Write) -> std::io::Result<()> {
        let mark = if self.completed { "✅".to_string() } else { "⬜".to_string() };
        let origin = match &self.quest.source_goal {
            Some(goal) => format!(" (for: {goal})").dimmed().to_string(),
            None => String::new(),
        };
        writeln!(
            out,
            "{mark} #{:<3} {} {} [{}]{origin}",
            self.quest.id,
            self.quest.text.bold(),
            format!("{} xp", self.quest.xp).cyan(),
            format_deltas(&self.quest.stat_deltas)
        )
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestListView {
    pub quests: Vec<QuestLine>,
}

impl QuestListView {
    pub fn new(profile: &Profile) -> Self {
        Self {
            quests: profile
                .quests
                .quests()
                .iter()
                .map(|quest| QuestLine {
                    quest: quest.clone(),
                    completed: profile.completed.contains(quest.id),
                })
                .collect(),
        }
    }
}

impl ConsoleView for QuestListView {
    fn render(&self, out: &mut dyn Write) -> std::io::Result<()> {
        if self.quests.is_empty() {
            return writeln!(out, "No quests yet. Add one with `questline add-quest`.");
        }
        for line in &self.quests {
            line.render(out)?;
        }
        Ok(())
    }
}

/// A single quest that was just added or removed.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestChangeView {
    pub action: &'static str,
    pub quest: QuestLine,
}

impl ConsoleView for QuestChangeView {
    fn render(&self, out: &mut dyn Write) -> std::io::Result<()> {
        write!(out, "{} ", self.action.green().bold())?;
        self.quest.render(out)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestToggleView {
    pub quest_id: questline_core::QuestId,
    pub text: String,
    pub direction: ToggleDirection,
    pub level: u32,
    pub xp: u32,
    pub level_delta: i64,
}

impl QuestToggleView {
    pub fn new(quest: &Quest, toggle: &QuestToggle) -> Self {
        Self {
            quest_id: quest.id,
            text: quest.text.clone(),
            direction: toggle.direction,
            level: toggle.state.level,
            xp: toggle.state.xp,
            level_delta: toggle.level_delta,
        }
    }
}

impl ConsoleView for QuestToggleView {
    fn render(&self, out: &mut dyn Write) -> std::io::Result<()> {
        let verb = match self.direction {
            ToggleDirection::Completed => "Completed".green().bold(),
            ToggleDirection::Uncompleted => "Reopened".yellow().bold(),
        };
        writeln!(out, "{verb} #{} {}", self.quest_id, self.text)?;
        match self.level_delta {
            0 => {}
            d if d > 0 => {
                let banner = format!("🎉 Level up! Now level {}", self.level);
                writeln!(out, "{}", banner.bright_green().bold())?;
            }
            _ => writeln!(out, "{}", format!("Level down to {}", self.level).red())?,
        }
        writeln!(
            out,
            "Level {} - XP {} {}/{}",
            self.level,
            progress_bar(self.xp),
            self.xp,
            XP_PER_LEVEL
        )
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HabitLine {
    #[serde(flatten)]
    pub habit: Habit,
    pub done: Vec<DayKey>,
}

impl HabitLine {
    pub fn new(habit: &Habit, profile: &Profile, week: WeekKey) -> Self {
        Self {
            done: habit
                .days
                .iter()
                .copied()
                .filter(|day| is_habit_completed(&profile.habit_completions, habit.id, *day, week))
                .collect(),
            habit: habit.clone(),
        }
    }

    fn render(&self, out: &mut dyn Write) -> std::io::Result<()> {
        let calendar = DayKey::ALL
            .iter()
            .map(|day| {
                if self.done.contains(day) {
                    day.short_label().green().bold().to_string()
                } else if self.habit.is_scheduled_on(*day) {
                    day.short_label().to_string()
                } else {
                    "·".dimmed().to_string()
                }
            })
            .collect::<Vec<_>>()
            .join(" ");
        writeln!(
            out,
            "#{:<3} {:24} {calendar}  {}/{}",
            self.habit.id,
            self.habit.name.bold(),
            self.done.len(),
            self.habit.total_per_week
        )
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HabitListView {
    pub week: WeekKey,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub day: Option<DayKey>,
    pub habits: Vec<HabitLine>,
}

impl ConsoleView for HabitListView {
    fn render(&self, out: &mut dyn Write) -> std::io::Result<()> {
        match self.day {
            Some(day) => {
                let heading = format!("Habits for {} (week of {})", day.short_label(), self.week);
                writeln!(out, "{}", heading.bold())?;
            }
            None => writeln!(out, "{}", format!("Week of {}", self.week).bold())?,
        }
        if self.habits.is_empty() {
            return writeln!(out, "No habits scheduled.");
        }
        for line in &self.habits {
            line.render(out)?;
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HabitChangeView {
    pub action: &'static str,
    pub habit: Habit,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub purged_entries: Option<usize>,
}

impl ConsoleView for HabitChangeView {
    fn render(&self, out: &mut dyn Write) -> std::io::Result<()> {
        let days = self
            .habit
            .days
            .iter()
            .map(|day| day.short_label())
            .collect::<Vec<_>>()
            .join(", ");
        writeln!(
            out,
            "{} habit #{} {} ({days})",
            self.action.green().bold(),
            self.habit.id,
            self.habit.name.bold()
        )?;
        if let Some(purged) = self.purged_entries {
            writeln!(out, "Removed {purged} completion entries")?;
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HabitToggleView {
    pub habit_id: questline_core::HabitId,
    pub name: String,
    pub day: DayKey,
    pub week: WeekKey,
    pub completed: bool,
    pub scheduled: bool,
}

impl ConsoleView for HabitToggleView {
    fn render(&self, out: &mut dyn Write) -> std::io::Result<()> {
        let state = if self.completed {
            "done".green().bold()
        } else {
            "not done".yellow()
        };
        writeln!(
            out,
            "{} on {} (week of {}): {state}",
            self.name.bold(),
            self.day.short_label(),
            self.week
        )?;
        if !self.scheduled {
            writeln!(out, "{}", "note: this habit is not scheduled on that day".dimmed())?;
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryView {
    #[serde(flatten)]
    pub summary: HabitSummary,
}

impl ConsoleView for SummaryView {
    fn render(&self, out: &mut dyn Write) -> std::io::Result<()> {
        let s = &self.summary;
        writeln!(out, "{}", format!("📊 Week of {}", s.week).bright_cyan().bold())?;
        writeln!(out, "Habits tracked: {}", s.total_habits)?;
        writeln!(out, "Completed: {} / {}", s.completed.to_string().green(), s.weekly_goal)?;
        if s.weekly_goal > 0 {
            #[allow(clippy::cast_precision_loss)]
            let rate = s.completed as f64 / s.weekly_goal as f64 * 100.0;
            writeln!(out, "Completion rate: {rate:.1}%")?;
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectedLine {
    pub text: String,
    pub reason: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestionView {
    pub goal: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub advice: Option<String>,
    pub suggestions: Vec<QuestSuggestion>,
    pub accepted: Vec<Quest>,
    pub rejected: Vec<RejectedLine>,
}

impl ConsoleView for SuggestionView {
    fn render(&self, out: &mut dyn Write) -> std::io::Result<()> {
        if let Some(prompt) = &self.prompt {
            writeln!(out, "{}", "Prompt".bold())?;
            writeln!(out, "{prompt}")?;
            writeln!(out)?;
        }
        let heading = format!("💡 Suggestions for \"{}\"", self.goal);
        writeln!(out, "{}", heading.bright_yellow().bold())?;
        if let Some(advice) = &self.advice {
            writeln!(out, "{}", advice.italic())?;
        }
        for suggestion in &self.suggestions {
            writeln!(
                out,
                "  • {} {} [{}]",
                suggestion.text,
                format!("{} xp", suggestion.xp).cyan(),
                format_deltas(&suggestion.stat_deltas)
            )?;
        }
        for quest in &self.accepted {
            writeln!(out, "{} #{} {}", "Added".green().bold(), quest.id, quest.text)?;
        }
        for rejected in &self.rejected {
            writeln!(out, "{} {}: {}", "Skipped".red(), rejected.text, rejected.reason)?;
        }
        Ok(())
    }
}

/// Outcome of a command that only changes bookkeeping.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NoticeView {
    pub message: String,
}

impl ConsoleView for NoticeView {
    fn render(&self, out: &mut dyn Write) -> std::io::Result<()> {
        writeln!(out, "{}", self.message.green())
    }
}
