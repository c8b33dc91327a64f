//! Quest suggestions from an external text-generation service.
//!
//! The engine never calls the service. It plans the request, parses whatever
//! text comes back into candidate quests, and validates each candidate before
//! the registry accepts it. A deterministic template fallback covers the case
//! where no service is reachable.
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;
use thiserror::Error;

use crate::attributes::{Attribute, StatDeltas, lenient_u32, validate_deltas};
use crate::constants::{
    CROWDED_GOAL_THRESHOLD, CROWDED_PER_GOAL_THRESHOLD, CROWDED_QUEST_THRESHOLD,
    SUGGESTION_COUNT_CROWDED, SUGGESTION_COUNT_HABIT, SUGGESTION_COUNT_MATERIAL,
    SUGGESTION_DEFAULT_XP, SUGGESTION_XP_MAX, SUGGESTION_XP_MIN,
};
use crate::error::ValidationError;
use crate::progression::CompletionLedger;
use crate::quest::{Quest, QuestId};
use crate::registry::QuestRegistry;

/// Flavor of the user's goal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GoalKind {
    /// Behavior to build up over time.
    #[default]
    Habit,
    /// Concrete outcome to achieve.
    Material,
}

impl GoalKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Habit => "habit",
            Self::Material => "material",
        }
    }
}

impl fmt::Display for GoalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GoalKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "habit" => Ok(Self::Habit),
            "material" => Ok(Self::Material),
            other => Err(format!("unknown goal kind '{other}'")),
        }
    }
}

/// Accepted XP range for suggested quests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SuggestionBounds {
    pub min_xp: u32,
    pub max_xp: u32,
}

impl Default for SuggestionBounds {
    fn default() -> Self {
        Self {
            min_xp: SUGGESTION_XP_MIN,
            max_xp: SUGGESTION_XP_MAX,
        }
    }
}

/// Tuning for how many suggestions to ask for and how to repair them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SuggestionConfig {
    pub bounds: SuggestionBounds,
    /// XP assigned when a suggestion carries none or an unreadable value.
    pub default_xp: u32,
    /// Attribute credited when a suggestion names none.
    pub default_attribute: Attribute,
    pub crowded_quest_threshold: usize,
    pub crowded_goal_threshold: usize,
    pub crowded_per_goal_threshold: usize,
}

impl Default for SuggestionConfig {
    fn default() -> Self {
        Self {
            bounds: SuggestionBounds::default(),
            default_xp: SUGGESTION_DEFAULT_XP,
            default_attribute: Attribute::Education,
            crowded_quest_threshold: CROWDED_QUEST_THRESHOLD,
            crowded_goal_threshold: CROWDED_GOAL_THRESHOLD,
            crowded_per_goal_threshold: CROWDED_PER_GOAL_THRESHOLD,
        }
    }
}

/// Everything a suggester needs to know about the user's current load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestionRequest {
    pub goal: String,
    pub kind: GoalKind,
    pub active_quests: usize,
    pub completed_quests: usize,
    pub quests_for_goal: usize,
    pub total_goals: usize,
}

impl SuggestionRequest {
    #[must_use]
    pub fn from_registry(
        goal: impl Into<String>,
        kind: GoalKind,
        registry: &QuestRegistry,
        ledger: &CompletionLedger,
        total_goals: usize,
    ) -> Self {
        let goal = goal.into();
        Self {
            quests_for_goal: registry.count_for_goal(&goal),
            goal,
            kind,
            active_quests: registry.len(),
            completed_quests: ledger.len(),
            total_goals,
        }
    }
}

const ADVICE_MANY_QUESTS: &str =
    "You have many active quests. Focusing on fewer goals makes it easier to stay motivated.";
const ADVICE_MANY_GOALS: &str =
    "You have many goals. Realistic expectations and consistency beat volume.";

/// How many quests to ask for, plus advice for an overloaded user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestionPlan {
    pub count: usize,
    pub advice: Option<String>,
}

/// Material goals get three quests. Habit goals get two, reduced to one when
/// the goal already has quests or the user is carrying too many quests or goals.
#[must_use]
pub fn suggestion_plan(
    request: &SuggestionRequest,
    config: &SuggestionConfig,
) -> SuggestionPlan {
    if request.kind == GoalKind::Material {
        return SuggestionPlan {
            count: SUGGESTION_COUNT_MATERIAL,
            advice: None,
        };
    }
    let advice = if request.quests_for_goal >= config.crowded_per_goal_threshold {
        Some("You already have quests for this goal. Adding one focused quest to keep momentum.")
    } else if request.active_quests >= config.crowded_quest_threshold {
        Some(ADVICE_MANY_QUESTS)
    } else if request.total_goals >= config.crowded_goal_threshold {
        Some(ADVICE_MANY_GOALS)
    } else {
        None
    };
    SuggestionPlan {
        count: if advice.is_some() {
            SUGGESTION_COUNT_CROWDED
        } else {
            SUGGESTION_COUNT_HABIT
        },
        advice: advice.map(str::to_string),
    }
}

/// Plan for the offline templates. Advice is checked in the order active
/// quests, total goals, quests for this goal, for either goal kind. Habit
/// goals drop to a single quest only when the goal already has quests or
/// the user carries many active quests.
#[must_use]
pub fn fallback_plan(request: &SuggestionRequest, config: &SuggestionConfig) -> SuggestionPlan {
    let many_quests = request.active_quests >= config.crowded_quest_threshold;
    let repeat_goal = request.quests_for_goal >= config.crowded_per_goal_threshold;
    let advice = if many_quests {
        Some(ADVICE_MANY_QUESTS)
    } else if request.total_goals >= config.crowded_goal_threshold {
        Some(ADVICE_MANY_GOALS)
    } else if repeat_goal {
        Some("You already have quests for this goal. Finish those before adding more.")
    } else {
        None
    };
    let count = match request.kind {
        GoalKind::Material => SUGGESTION_COUNT_MATERIAL,
        GoalKind::Habit if repeat_goal || many_quests => SUGGESTION_COUNT_CROWDED,
        GoalKind::Habit => SUGGESTION_COUNT_HABIT,
    };
    SuggestionPlan {
        count,
        advice: advice.map(str::to_string),
    }
}

/// Prompt text for a text-generation service.
#[must_use]
pub fn build_prompt(
    request: &SuggestionRequest,
    plan: &SuggestionPlan,
    config: &SuggestionConfig,
) -> String {
    let attributes = Attribute::ALL
        .iter()
        .map(|attr| attr.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "The user has a {kind} goal: \"{goal}\".\n\n\
         Context:\n\
         - Active quests: {active}\n\
         - Completed quests: {completed}\n\
         - Quests already serving this goal: {for_goal}\n\
         - Total goals: {goals}\n\n\
         Suggest {count} specific, measurable daily quests for this goal.\n\
         Each quest needs an xp value between {min} and {max} (harder tasks earn more) \
         and one attribute from: {attributes}.\n\n\
         Reply with only a JSON array such as:\n\
         [{{\"text\": \"Review notes for 1 hour\", \"xp\": 25, \"stats\": {{\"education\": 3}}}}]",
        kind = request.kind,
        goal = request.goal,
        active = request.active_quests,
        completed = request.completed_quests,
        for_goal = request.quests_for_goal,
        goals = request.total_goals,
        count = plan.count,
        min = config.bounds.min_xp,
        max = config.bounds.max_xp,
    )
}

/// A candidate quest proposed by a suggester.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestSuggestion {
    pub text: String,
    pub xp: u32,
    #[serde(default, alias = "stats")]
    pub stat_deltas: StatDeltas,
    #[serde(default)]
    pub ai_generated: bool,
    #[serde(default)]
    pub source_goal: Option<String>,
}

impl QuestSuggestion {
    /// # Errors
    ///
    /// Returns `EmptyText`, `SuggestionXpOutOfRange` or `ZeroStatDelta`.
    pub fn validate(&self, bounds: &SuggestionBounds) -> Result<(), ValidationError> {
        if self.text.trim().is_empty() {
            return Err(ValidationError::EmptyText);
        }
        if self.xp == 0 {
            return Err(ValidationError::NonPositiveXp);
        }
        if self.xp < bounds.min_xp || self.xp > bounds.max_xp {
            return Err(ValidationError::SuggestionXpOutOfRange {
                xp: self.xp,
                min: bounds.min_xp,
                max: bounds.max_xp,
            });
        }
        validate_deltas(&self.stat_deltas)
    }

    pub(crate) fn into_quest(self, id: QuestId) -> Quest {
        Quest {
            id,
            text: self.text.trim().to_string(),
            xp: self.xp,
            stat_deltas: self.stat_deltas,
            ai_generated: self.ai_generated,
            source_goal: self.source_goal,
        }
    }
}

/// Suggested quests together with the plan's advice.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SuggestionBatch {
    pub quests: Vec<QuestSuggestion>,
    pub advice: Option<String>,
}

/// Raw service output that could not be read as a quest list.
#[derive(Debug, Error)]
pub enum SuggestionParseError {
    #[error("response contains no JSON array")]
    NoJsonArray,
    #[error("response array is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Deserialize)]
struct RawSuggestion {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    xp: Option<Value>,
    #[serde(default)]
    stats: Option<BTreeMap<String, Value>>,
}

/// Opening brackets that may start a quest array: `[` followed by `{` or `]`.
fn array_start_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\[\s*[\{\]]").expect("static pattern compiles"))
}

/// First candidate array in `raw` that parses, reading each candidate only
/// as far as its closing bracket.
fn first_json_array(raw: &str) -> Result<Vec<RawSuggestion>, SuggestionParseError> {
    let mut last_error = None;
    for candidate in array_start_pattern().find_iter(raw) {
        let mut stream = serde_json::Deserializer::from_str(&raw[candidate.start()..])
            .into_iter::<Vec<RawSuggestion>>();
        match stream.next() {
            Some(Ok(items)) => return Ok(items),
            Some(Err(err)) => last_error = Some(err),
            None => {}
        }
    }
    Err(last_error.map_or(SuggestionParseError::NoJsonArray, SuggestionParseError::Json))
}

/// Extract suggested quests from free-form generated text.
///
/// Missing or unreadable XP falls back to `config.default_xp`; unknown or
/// empty attributes are dropped and an empty reward map falls back to
/// `config.default_attribute: 1`. Candidates are not range-checked here.
///
/// # Errors
///
/// Returns `NoJsonArray` when nothing in the text looks like an array of
/// objects and `Json` when no candidate array parses.
pub fn parse_suggestions(
    raw: &str,
    goal: &str,
    config: &SuggestionConfig,
) -> Result<Vec<QuestSuggestion>, SuggestionParseError> {
    let items = first_json_array(raw)?;
    Ok(items
        .into_iter()
        .map(|item| {
            let mut stat_deltas: StatDeltas = item
                .stats
                .unwrap_or_default()
                .iter()
                .filter_map(|(name, value)| {
                    let attr = name.parse::<Attribute>().ok()?;
                    let amount = lenient_u32(value).filter(|v| *v > 0)?;
                    Some((attr, amount))
                })
                .collect();
            if stat_deltas.is_empty() {
                stat_deltas.insert(config.default_attribute, 1);
            }
            QuestSuggestion {
                text: item.text.unwrap_or_default().trim().to_string(),
                xp: item
                    .xp
                    .as_ref()
                    .and_then(lenient_u32)
                    .filter(|v| *v > 0)
                    .unwrap_or(config.default_xp),
                stat_deltas,
                ai_generated: true,
                source_goal: Some(goal.to_string()),
            }
        })
        .collect())
}

/// Deterministic template quests used when no service answers.
#[must_use]
pub fn fallback_suggestions(
    request: &SuggestionRequest,
    config: &SuggestionConfig,
) -> SuggestionBatch {
    let goal = request.goal.as_str();
    let templates: Vec<(String, u32, Attribute, u32)> = match request.kind {
        GoalKind::Habit => vec![
            (format!("Set aside 30 minutes for {goal}"), 20, Attribute::Education, 2),
            (format!("Create a checklist for {goal}"), 15, Attribute::Mindset, 1),
        ],
        GoalKind::Material => vec![
            (
                format!("Research best practices for {goal}"),
                30,
                Attribute::Education,
                2,
            ),
            (format!("Create a plan to achieve {goal}"), 25, Attribute::Mindset, 2),
            (format!("Set milestones for {goal}"), 20, Attribute::Education, 1),
        ],
    };
    let plan = fallback_plan(request, config);
    SuggestionBatch {
        quests: templates
            .into_iter()
            .take(plan.count)
            .map(|(text, xp, attr, amount)| QuestSuggestion {
                text,
                xp,
                stat_deltas: StatDeltas::from([(attr, amount)]),
                ai_generated: false,
                source_goal: Some(goal.to_string()),
            })
            .collect(),
        advice: plan.advice,
    }
}

/// External quest-suggestion collaborator.
///
/// Implementations typically wrap a remote text-generation service and use
/// [`build_prompt`] and [`parse_suggestions`]. Calls happen outside the engine.
pub trait QuestSuggester {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Propose quests for the goal described by `request`.
    ///
    /// # Errors
    ///
    /// Returns the collaborator's own failure (network, quota, parsing).
    fn suggest(&self, request: &SuggestionRequest) -> Result<SuggestionBatch, Self::Error>;
}

/// Offline suggester backed by [`fallback_suggestions`].
#[derive(Debug, Clone, Default)]
pub struct FallbackSuggester {
    config: SuggestionConfig,
}

impl FallbackSuggester {
    #[must_use]
    pub const fn new(config: SuggestionConfig) -> Self {
        Self { config }
    }
}

impl QuestSuggester for FallbackSuggester {
    type Error = Infallible;

    fn suggest(&self, request: &SuggestionRequest) -> Result<SuggestionBatch, Self::Error> {
        Ok(fallback_suggestions(request, &self.config))
    }
}
