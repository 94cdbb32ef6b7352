//! Convenience re-exports for library consumers.
//!
//! ```rust,no_run
//! use hit_count_monitor::prelude::*;
//! ```

// Core
pub use crate::core::config::DashboardConfig;
pub use crate::core::errors::{ErrorKind, HcmError, Result};

// Alert
pub use crate::alert::severity::{AlertRule, SeverityLevel, classify};

// Search
pub use crate::search::auth::{CredentialStore, Credentials};
pub use crate::search::client::{HttpSearchClient, SearchRequest, SearchResponse, SearchTransport};

// Widget
pub use crate::widget::hit_count::{HitCountWidget, WidgetContext, WidgetUpdate};
pub use crate::widget::props::WidgetConfig;
pub use crate::widget::state::DisplayState;
pub use crate::widget::view::{CounterView, WidgetView, render_text};

// Runtime
#[cfg(feature = "daemon")]
pub use crate::daemon::dashboard::Dashboard;
pub use crate::daemon::scheduler::PollTask;
