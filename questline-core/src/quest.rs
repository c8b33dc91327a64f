//! Quest records and their validation.
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::attributes::{Attribute, StatDeltas, validate_deltas};
use crate::error::ValidationError;

/// Opaque quest identifier. Issued once and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuestId(pub u64);

impl fmt::Display for QuestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for QuestId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(Self)
    }
}

/// A one-off completable task carrying XP and attribute rewards.
///
/// Quests are immutable once registered; the advisory fields describe where a
/// suggested quest came from and never influence progression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quest {
    pub id: QuestId,
    pub text: String,
    pub xp: u32,
    #[serde(
        default,
        alias = "stats",
        deserialize_with = "crate::attributes::deserialize_deltas"
    )]
    pub stat_deltas: StatDeltas,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub ai_generated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_goal: Option<String>,
}

impl Quest {
    /// Re-check a quest that arrived from a persisted document.
    ///
    /// # Errors
    ///
    /// Returns the first violated field rule.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_fields(&self.text, self.xp, &self.stat_deltas)
    }

    /// Contribution of this quest to one attribute.
    #[must_use]
    pub fn delta(&self, attr: Attribute) -> u32 {
        self.stat_deltas.get(&attr).copied().unwrap_or(0)
    }
}

/// User-supplied quest fields awaiting an id.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestDraft {
    pub text: String,
    pub xp: u32,
    #[serde(default, alias = "stats")]
    pub stat_deltas: StatDeltas,
}

impl QuestDraft {
    #[must_use]
    pub fn new(text: impl Into<String>, xp: u32) -> Self {
        Self {
            text: text.into(),
            xp,
            stat_deltas: StatDeltas::new(),
        }
    }

    #[must_use]
    pub fn with_delta(mut self, attr: Attribute, delta: u32) -> Self {
        self.stat_deltas.insert(attr, delta);
        self
    }

    /// # Errors
    ///
    /// Returns the first violated field rule.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_fields(&self.text, self.xp, &self.stat_deltas)
    }

    /// Attach an id, trimming the display text.
    #[must_use]
    pub(crate) fn into_quest(self, id: QuestId) -> Quest {
        Quest {
            id,
            text: self.text.trim().to_string(),
            xp: self.xp,
            stat_deltas: self.stat_deltas,
            ai_generated: false,
            source_goal: None,
        }
    }
}

fn validate_fields(text: &str, xp: u32, deltas: &StatDeltas) -> Result<(), ValidationError> {
    if text.trim().is_empty() {
        return Err(ValidationError::EmptyText);
    }
    if xp == 0 {
        return Err(ValidationError::NonPositiveXp);
    }
    validate_deltas(deltas)
}

/// Parse XP typed into a free-text field.
///
/// # Errors
///
/// Returns `InvalidXp` for non-numeric input and `NonPositiveXp` for zero or
/// negative values.
pub fn parse_quest_xp(input: &str) -> Result<u32, ValidationError> {
    let trimmed = input.trim();
    let value: i64 = trimmed
        .parse()
        .map_err(|_| ValidationError::InvalidXp(trimmed.to_string()))?;
    if value <= 0 {
        return Err(ValidationError::NonPositiveXp);
    }
    u32::try_from(value).map_err(|_| ValidationError::InvalidXp(trimmed.to_string()))
}

/// Parse an `attribute=amount` pair as typed on a command line.
///
/// # Errors
///
/// Returns `UnknownAttribute` or `InvalidXp` when either side does not parse.
pub fn parse_stat_delta(input: &str) -> Result<(Attribute, u32), ValidationError> {
    let (name, amount) = input
        .split_once('=')
        .ok_or_else(|| ValidationError::UnknownAttribute(input.to_string()))?;
    let attr = name.parse::<Attribute>()?;
    let amount = amount
        .trim()
        .parse::<u32>()
        .map_err(|_| ValidationError::InvalidXp(amount.trim().to_string()))?;
    if amount == 0 {
        return Err(ValidationError::ZeroStatDelta(attr));
    }
    Ok((attr, amount))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn draft_validation_rejects_blank_text_and_zero_xp() {
        assert_eq!(QuestDraft::new("   ", 10).validate(), Err(ValidationError::EmptyText));
        assert_eq!(QuestDraft::new("Stretch", 0).validate(), Err(ValidationError::NonPositiveXp));
        assert!(QuestDraft::new("Stretch", 5).validate().is_ok());
    }

    #[test]
    fn xp_input_parsing() {
        assert_eq!(parse_quest_xp(" 25 "), Ok(25));
        assert_eq!(parse_quest_xp("-4"), Err(ValidationError::NonPositiveXp));
        assert_eq!(parse_quest_xp("0"), Err(ValidationError::NonPositiveXp));
        assert_eq!(
            parse_quest_xp("lots"),
            Err(ValidationError::InvalidXp("lots".to_string()))
        );
    }

    #[test]
    fn stat_delta_pairs() {
        assert_eq!(parse_stat_delta("education=2"), Ok((Attribute::Education, 2)));
        assert_eq!(
            parse_stat_delta("charisma=0"),
            Err(ValidationError::ZeroStatDelta(Attribute::Charisma))
        );
        assert!(parse_stat_delta("education").is_err());
    }

    #[test]
    fn legacy_quest_document_deserializes() {
        let json =
            r#"{"id": 2, "text": "Workout", "xp": 25, "stats": {"strength": 3, "discipline": 1}}"#;
        let quest: Quest = serde_json::from_str(json).unwrap();
        assert_eq!(quest.id, QuestId(2));
        assert_eq!(quest.delta(Attribute::HealthWellness), 3);
        assert!(!quest.ai_generated);
        assert!(quest.validate().is_ok());
    }
}
