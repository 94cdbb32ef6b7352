//! Presentation shell: the card chrome around a numeric counter.

#![allow(missing_docs)]

use std::fmt::Write as _;

use serde::Serialize;

use crate::alert::severity::SeverityLevel;
use crate::widget::state::DisplayState;

/// Counter display primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CounterView {
    pub value: u64,
}

impl CounterView {
    /// `1234567` → `1,234,567`.
    #[must_use]
    pub fn formatted(&self) -> String {
        let digits = self.value.to_string();
        let mut out = String::with_capacity(digits.len() + digits.len() / 3);
        for (i, ch) in digits.chars().enumerate() {
            if i > 0 && (digits.len() - i) % 3 == 0 {
                out.push(',');
            }
            out.push(ch);
        }
        out
    }
}

/// Everything the shell needs to draw one widget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WidgetView {
    pub title: String,
    pub is_loading: bool,
    pub has_error: bool,
    pub alert_severity: SeverityLevel,
    pub counter: CounterView,
}

impl WidgetView {
    #[must_use]
    pub fn new(title: impl Into<String>, state: &DisplayState) -> Self {
        Self {
            title: title.into(),
            is_loading: state.is_loading,
            has_error: state.has_error,
            alert_severity: state.alert_severity.clone(),
            counter: CounterView { value: state.count },
        }
    }
}

/// One-line terminal card.
///
/// Loading shows a placeholder; an error shows a marker next to the last
/// good count; an active alert prefixes the severity label.
#[must_use]
pub fn render_text(view: &WidgetView, color: bool) -> String {
    let mut line = String::new();
    if !view.alert_severity.is_none() {
        let label = format!("[{}]", view.alert_severity);
        let _ = write!(line, "{} ", paint_severity(&label, &view.alert_severity, color));
    }
    let _ = write!(line, "{}: ", view.title);

    if view.is_loading {
        line.push_str("loading…");
    } else if view.has_error {
        let marker = paint("error", Tone::Error, color);
        let _ = write!(line, "{marker} (last {})", view.counter.formatted());
    } else {
        line.push_str(&view.counter.formatted());
    }
    line
}

#[derive(Debug, Clone, Copy)]
enum Tone {
    Error,
    Warning,
    Notice,
}

fn paint_severity(text: &str, level: &SeverityLevel, color: bool) -> String {
    let tone = match level.as_str().to_ascii_lowercase().as_str() {
        "critical" | "error" | "red" => Tone::Error,
        "warning" | "warn" | "yellow" | "orange" => Tone::Warning,
        _ => Tone::Notice,
    };
    paint(text, tone, color)
}

#[cfg(feature = "cli")]
fn paint(text: &str, tone: Tone, color: bool) -> String {
    use colored::Colorize;
    if !color {
        return text.to_string();
    }
    match tone {
        Tone::Error => text.red().bold().to_string(),
        Tone::Warning => text.yellow().bold().to_string(),
        Tone::Notice => text.cyan().to_string(),
    }
}

#[cfg(not(feature = "cli"))]
fn paint(text: &str, _tone: Tone, _color: bool) -> String {
    text.to_string()
}
