//! Display state owned by a mounted widget.

#![allow(missing_docs)]

use serde::Serialize;

use crate::alert::severity::SeverityLevel;

/// What the widget currently shows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DisplayState {
    /// Last successfully observed hit total. Kept across failed polls.
    pub count: u64,
    pub has_error: bool,
    /// True from construction until the first fetch settles, never again.
    pub is_loading: bool,
    pub alert_severity: SeverityLevel,
}

impl Default for DisplayState {
    fn default() -> Self {
        Self {
            count: 0,
            has_error: false,
            is_loading: true,
            alert_severity: SeverityLevel::None,
        }
    }
}

impl DisplayState {
    /// Terminal state after props fail validation.
    pub fn mark_invalid(&mut self) {
        self.has_error = true;
        self.is_loading = false;
    }

    /// Apply a successful poll.
    pub fn apply_success(&mut self, total: u64, severity: SeverityLevel) {
        self.count = total;
        self.has_error = false;
        self.is_loading = false;
        self.alert_severity = severity;
    }

    /// Apply a failed poll. `count` is left at the last good value.
    pub fn apply_failure(&mut self) {
        self.has_error = true;
        self.is_loading = false;
        self.alert_severity = SeverityLevel::None;
    }
}
