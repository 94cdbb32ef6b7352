//! Widget props: schema validation and the typed `WidgetConfig`.
//!
//! Props arrive as a loosely-typed map (a `[[widgets]]` table from the
//! dashboard file, or any JSON object). Validation walks the whole map and
//! reports every violated constraint instead of stopping at the first, so an
//! operator can fix a broken widget in one pass.

#![allow(missing_docs)]

use std::time::Duration;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::alert::severity::AlertRule;
use crate::core::errors::{HcmError, Result};

/// Component name used in validation logs.
pub const WIDGET_NAME: &str = "ElasticsearchHitCount";
/// Five minutes.
pub const DEFAULT_INTERVAL_MS: u64 = 1000 * 60 * 5;
pub const DEFAULT_TITLE: &str = "Elasticsearch Hit Count";

/// Validated, immutable widget configuration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WidgetConfig {
    pub url: String,
    pub index: String,
    pub query: String,
    pub interval: Duration,
    pub title: String,
    pub auth_key: Option<String>,
    pub alert: Vec<AlertRule>,
}

impl WidgetConfig {
    /// Validate raw props and build the typed config.
    ///
    /// Fails with [`HcmError::WidgetValidation`] listing every violation.
    pub fn from_props(props: &Value) -> Result<Self> {
        let mut violations = Vec::new();
        let Some(obj) = props.as_object() else {
            return Err(HcmError::WidgetValidation {
                widget: WIDGET_NAME,
                violations: vec!["props must be an `object` type".to_string()],
            });
        };

        let url = required_string(obj, "url", &mut violations);
        if let Some(raw) = url.as_deref()
            && !is_valid_url(raw)
        {
            violations.push("url must be a valid URL".to_string());
        }
        let index = required_string(obj, "index", &mut violations);
        let query = required_string(obj, "query", &mut violations);

        let interval_ms = optional_number(obj, "interval", &mut violations);
        let title = optional_string(obj, "title", &mut violations);
        let auth_key = optional_string(obj, "authKey", &mut violations);
        let alert = alert_rules(obj, &mut violations);

        if !violations.is_empty() {
            return Err(HcmError::WidgetValidation {
                widget: WIDGET_NAME,
                violations,
            });
        }

        Ok(Self {
            url: url.unwrap_or_default(),
            index: index.unwrap_or_default(),
            query: query.unwrap_or_default(),
            interval: interval_ms.map_or(Duration::from_millis(DEFAULT_INTERVAL_MS), millis),
            title: title.unwrap_or_else(|| DEFAULT_TITLE.to_string()),
            auth_key,
            alert,
        })
    }

    /// Convenience for TOML-sourced props.
    pub fn from_toml(table: &toml::Value) -> Result<Self> {
        let props = serde_json::to_value(table)?;
        Self::from_props(&props)
    }

    /// `{url}/{index}/_search?q={query}` with the query percent-encoded.
    #[must_use]
    pub fn search_url(&self) -> String {
        format!(
            "{}/{}/_search?q={}",
            self.url,
            self.index,
            urlencoding::encode(&self.query)
        )
    }
}

/// Run validation only, returning the violation list (empty when valid).
#[must_use]
pub fn validate(props: &Value) -> Vec<String> {
    match WidgetConfig::from_props(props) {
        Ok(_) => Vec::new(),
        Err(HcmError::WidgetValidation { violations, .. }) => violations,
        Err(other) => vec![other.to_string()],
    }
}

/// Negative intervals poll back-to-back, like a zero delay.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn millis(ms: f64) -> Duration {
    Duration::from_millis(ms.max(0.0).round() as u64)
}

/// Absolute `http`, `https` or `ftp` URL with a host.
fn is_valid_url(raw: &str) -> bool {
    url::Url::parse(raw).is_ok_and(|parsed| {
        matches!(parsed.scheme(), "http" | "https" | "ftp")
            && parsed.host_str().is_some_and(|h| !h.is_empty())
    })
}

fn required_string(
    obj: &Map<String, Value>,
    field: &str,
    violations: &mut Vec<String>,
) -> Option<String> {
    required_string_at(obj, field, field, violations)
}

/// `label` is the path reported in violations, e.g. `alert[2].severity`.
fn required_string_at(
    obj: &Map<String, Value>,
    field: &str,
    label: &str,
    violations: &mut Vec<String>,
) -> Option<String> {
    match obj.get(field) {
        None | Some(Value::Null) => {
            violations.push(format!("{label} is a required field"));
            None
        }
        Some(Value::String(s)) if s.is_empty() => {
            violations.push(format!("{label} is a required field"));
            None
        }
        Some(Value::String(s)) => Some(s.clone()),
        Some(_) => {
            violations.push(format!("{label} must be a `string` type"));
            None
        }
    }
}

fn optional_string(
    obj: &Map<String, Value>,
    field: &str,
    violations: &mut Vec<String>,
) -> Option<String> {
    match obj.get(field) {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(_) => {
            violations.push(format!("{field} must be a `string` type"));
            None
        }
    }
}

fn optional_number(
    obj: &Map<String, Value>,
    field: &str,
    violations: &mut Vec<String>,
) -> Option<f64> {
    match obj.get(field) {
        None | Some(Value::Null) => None,
        Some(Value::Number(n)) => n.as_f64(),
        Some(_) => {
            violations.push(format!("{field} must be a `number` type"));
            None
        }
    }
}

fn alert_rules(obj: &Map<String, Value>, violations: &mut Vec<String>) -> Vec<AlertRule> {
    let entries = match obj.get("alert") {
        None | Some(Value::Null) => return Vec::new(),
        Some(Value::Array(entries)) => entries,
        Some(_) => {
            violations.push("alert must be a `array` type".to_string());
            return Vec::new();
        }
    };

    let mut rules = Vec::with_capacity(entries.len());
    for (i, entry) in entries.iter().enumerate() {
        let Some(rule) = entry.as_object() else {
            violations.push(format!("alert[{i}] must be a `object` type"));
            continue;
        };
        let severity =
            required_string_at(rule, "severity", &format!("alert[{i}].severity"), violations);
        let value = match rule.get("value") {
            None | Some(Value::Null) => {
                violations.push(format!("alert[{i}].value is a required field"));
                None
            }
            Some(Value::Number(n)) => n.as_f64(),
            Some(_) => {
                violations.push(format!("alert[{i}].value must be a `number` type"));
                None
            }
        };
        if let (Some(severity), Some(value)) = (severity, value) {
            rules.push(AlertRule::new(severity, value));
        }
    }
    rules
}
