//! Character attributes and the saturating arithmetic shared by every
//! progression transition.
use log::warn;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;

/// Closed set of character traits a quest can reward.
///
/// Serialized in camelCase (`healthWellness`). Older documents used a looser
/// vocabulary; the aliases fold those keys onto the closest attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Attribute {
    #[serde(alias = "mindfulness")]
    Mindset,
    #[serde(alias = "health", alias = "strength")]
    HealthWellness,
    Charisma,
    #[serde(alias = "spiritual")]
    Spirituality,
    Education,
    Discipline,
}

impl Attribute {
    /// Every attribute in display order.
    pub const ALL: [Self; 6] = [
        Self::Mindset,
        Self::HealthWellness,
        Self::Charisma,
        Self::Spirituality,
        Self::Education,
        Self::Discipline,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Mindset => "mindset",
            Self::HealthWellness => "healthWellness",
            Self::Charisma => "charisma",
            Self::Spirituality => "spirituality",
            Self::Education => "education",
            Self::Discipline => "discipline",
        }
    }

    /// Human-facing label used by reports.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Mindset => "Mindset",
            Self::HealthWellness => "Health & Wellness",
            Self::Charisma => "Charisma",
            Self::Spirituality => "Spirituality",
            Self::Education => "Education",
            Self::Discipline => "Discipline",
        }
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Attribute {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .chars()
            .filter(|c| !matches!(c, '_' | '-' | ' ' | '&'))
            .flat_map(char::to_lowercase)
            .collect();
        match normalized.as_str() {
            "mindset" | "mindfulness" => Ok(Self::Mindset),
            "healthwellness" | "health" | "wellness" | "strength" => Ok(Self::HealthWellness),
            "charisma" => Ok(Self::Charisma),
            "spirituality" | "spiritual" => Ok(Self::Spirituality),
            "education" => Ok(Self::Education),
            "discipline" => Ok(Self::Discipline),
            _ => Err(ValidationError::UnknownAttribute(s.to_string())),
        }
    }
}

/// Per-quest attribute rewards. Every value is a positive contribution.
pub type StatDeltas = BTreeMap<Attribute, u32>;

/// Reject zero contributions; a delta of zero is a malformed quest.
///
/// # Errors
///
/// Returns `ValidationError::ZeroStatDelta` naming the first empty entry.
pub fn validate_deltas(deltas: &StatDeltas) -> Result<(), ValidationError> {
    match deltas.iter().find(|(_, value)| **value == 0) {
        Some((attr, _)) => Err(ValidationError::ZeroStatDelta(*attr)),
        None => Ok(()),
    }
}

/// Numbers may arrive as floats or as strings with trailing junk ("25xp").
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub(crate) fn lenient_u32(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| {
                n.as_f64()
                    .filter(|f| f.is_finite() && *f >= 0.0)
                    .map(|f| f.trunc() as u64)
            })
            .and_then(|v| u32::try_from(v).ok()),
        Value::String(s) => {
            let digits: String = s.trim().chars().take_while(char::is_ascii_digit).collect();
            digits.parse().ok()
        }
        _ => None,
    }
}

// Stored documents may name attributes outside the closed set; those entries are dropped.
fn lenient_entries<'de, D>(deserializer: D) -> Result<Vec<(Attribute, u32)>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = BTreeMap::<String, Value>::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .filter_map(|(name, value)| {
            let Ok(attr) = name.parse::<Attribute>() else {
                warn!("dropping unknown attribute '{name}' from stored document");
                return None;
            };
            let Some(amount) = lenient_u32(&value) else {
                warn!("dropping unreadable amount {value} for attribute '{name}'");
                return None;
            };
            Some((attr, amount))
        })
        .collect())
}

/// Deserialize stat deltas from a stored quest, skipping unknown attributes
/// and zero contributions. Aliased keys that land on one attribute are summed.
///
/// # Errors
///
/// Fails only when the value is not a JSON object.
pub(crate) fn deserialize_deltas<'de, D>(deserializer: D) -> Result<StatDeltas, D::Error>
where
    D: Deserializer<'de>,
{
    let mut deltas = StatDeltas::new();
    for (attr, amount) in lenient_entries(deserializer)? {
        if amount > 0 {
            let entry = deltas.entry(attr).or_insert(0);
            *entry = entry.saturating_add(amount);
        }
    }
    Ok(deltas)
}

/// Running attribute totals. Absent attributes read as zero and totals can
/// never go negative.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct AttributeTotals(BTreeMap<Attribute, u32>);

impl<'de> Deserialize<'de> for AttributeTotals {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(lenient_entries(deserializer)?.into_iter().collect())
    }
}

impl AttributeTotals {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, attr: Attribute) -> u32 {
        self.0.get(&attr).copied().unwrap_or(0)
    }

    /// Add every delta onto the running totals.
    pub fn apply_gain(&mut self, deltas: &StatDeltas) {
        for (attr, delta) in deltas {
            let entry = self.0.entry(*attr).or_insert(0);
            *entry = entry.saturating_add(*delta);
        }
    }

    /// Subtract every delta, flooring each total at zero.
    pub fn apply_loss(&mut self, deltas: &StatDeltas) {
        for (attr, delta) in deltas {
            let remaining = self.get(*attr).saturating_sub(*delta);
            if remaining == 0 {
                self.0.remove(attr);
            } else {
                self.0.insert(*attr, remaining);
            }
        }
    }

    /// Sum of every attribute total.
    #[must_use]
    pub fn sum(&self) -> u64 {
        self.0.values().map(|v| u64::from(*v)).sum()
    }

    /// Attributes paired with their totals, including zeros, in display order.
    pub fn iter_all(&self) -> impl Iterator<Item = (Attribute, u32)> + '_ {
        Attribute::ALL.into_iter().map(|attr| (attr, self.get(attr)))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.values().all(|v| *v == 0)
    }
}

// Explicit zeros and missing keys mean the same thing.
impl PartialEq for AttributeTotals {
    fn eq(&self, other: &Self) -> bool {
        Attribute::ALL
            .into_iter()
            .all(|attr| self.get(attr) == other.get(attr))
    }
}

impl Eq for AttributeTotals {}

impl FromIterator<(Attribute, u32)> for AttributeTotals {
    fn from_iter<T: IntoIterator<Item = (Attribute, u32)>>(iter: T) -> Self {
        let mut totals = Self::new();
        for (attr, value) in iter {
            totals.apply_gain(&StatDeltas::from([(attr, value)]));
        }
        totals
    }
}
