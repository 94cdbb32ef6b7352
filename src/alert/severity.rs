//! Severity classification over ordered threshold rules.
//!
//! A rule fires when the observed count is at or above its threshold. When
//! several rules fire, the one with the highest threshold wins; rules sharing
//! a threshold keep their declared order.

#![allow(missing_docs)]
#![allow(clippy::cast_precision_loss)]

use std::fmt;

use serde::{Deserialize, Serialize};

/// Sentinel label for "no alert".
pub const NONE: &str = "none";

/// Alert level attached to a widget.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum SeverityLevel {
    #[default]
    None,
    /// A configured severity label such as `warning` or `critical`.
    Named(String),
}

impl SeverityLevel {
    /// Build a level from a configured label. `"none"` (any case) and the
    /// empty string map to [`SeverityLevel::None`].
    #[must_use]
    pub fn from_label(label: &str) -> Self {
        let trimmed = label.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case(NONE) {
            Self::None
        } else {
            Self::Named(trimmed.to_string())
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::None => NONE,
            Self::Named(label) => label,
        }
    }

    #[must_use]
    pub const fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }
}

impl fmt::Display for SeverityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for SeverityLevel {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for SeverityLevel {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::from_label(&raw))
    }
}

/// One `{severity, value}` threshold rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRule {
    pub severity: String,
    pub value: f64,
}

impl AlertRule {
    #[must_use]
    pub fn new(severity: impl Into<String>, value: f64) -> Self {
        Self {
            severity: severity.into(),
            value,
        }
    }

    /// Whether `count` meets this rule's threshold.
    #[must_use]
    pub fn matches(&self, count: u64) -> bool {
        count as f64 >= self.value
    }
}

/// Map a hit count to a severity using the given rules.
///
/// No rules, or no rule whose threshold is met, yields [`SeverityLevel::None`].
#[must_use]
pub fn classify(count: u64, rules: &[AlertRule]) -> SeverityLevel {
    let mut ranked: Vec<&AlertRule> = rules.iter().collect();
    // Stable sort: equal thresholds keep declared order.
    ranked.sort_by(|a, b| b.value.total_cmp(&a.value));
    ranked
        .into_iter()
        .find(|rule| rule.matches(count))
        .map_or(SeverityLevel::None, |rule| {
            SeverityLevel::from_label(&rule.severity)
        })
}
