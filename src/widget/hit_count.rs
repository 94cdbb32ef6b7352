//! The Elasticsearch hit count widget: validate on mount, then poll.
//!
//! Lifecycle:
//! - `mount` validates the props. Invalid props put the widget in a permanent
//!   error state; no worker is started and no request is ever sent.
//! - Valid props start a [`PollTask`] whose first cycle runs immediately.
//!   Each cycle fetches, classifies, updates the state, and asks for the
//!   next run `interval` later, whatever the outcome.
//! - `unmount` (or drop) clears the `mounted` flag under the state lock and
//!   cancels the task. A fetch still in flight finishes on its own thread,
//!   sees the flag, and throws its result away.

#![allow(missing_docs)]

use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::Sender;
use parking_lot::Mutex;
use serde_json::Value;

use crate::alert::severity::{SeverityLevel, classify};
use crate::core::errors::HcmError;
use crate::daemon::scheduler::PollTask;
use crate::logger::activity::{ActivityEvent, ActivityLoggerHandle};
use crate::search::auth::CredentialStore;
use crate::search::client::{SearchRequest, SearchTransport, fetch_hit_total};
use crate::widget::props::{DEFAULT_TITLE, WIDGET_NAME, WidgetConfig};
use crate::widget::state::DisplayState;
use crate::widget::view::WidgetView;

/// State change notification, sent after every applied update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WidgetUpdate {
    pub widget_id: usize,
    pub view: WidgetView,
}

/// Collaborators shared by every widget on a dashboard.
#[derive(Clone)]
pub struct WidgetContext {
    pub transport: Arc<dyn SearchTransport>,
    pub credentials: Arc<CredentialStore>,
    pub activity: ActivityLoggerHandle,
    /// Receives a [`WidgetUpdate`] per state change. `try_send`, never blocks.
    pub updates: Option<Sender<WidgetUpdate>>,
}

impl WidgetContext {
    #[must_use]
    pub fn new(transport: Arc<dyn SearchTransport>, credentials: CredentialStore) -> Self {
        Self {
            transport,
            credentials: Arc::new(credentials),
            activity: ActivityLoggerHandle::disabled(),
            updates: None,
        }
    }

    #[must_use]
    pub fn with_activity(mut self, activity: ActivityLoggerHandle) -> Self {
        self.activity = activity;
        self
    }

    #[must_use]
    pub fn with_updates(mut self, updates: Sender<WidgetUpdate>) -> Self {
        self.updates = Some(updates);
        self
    }
}

struct Inner {
    state: DisplayState,
    mounted: bool,
    settled_polls: u64,
}

/// Everything a poll cycle needs, moved onto the worker thread.
struct PollScope {
    id: usize,
    config: Arc<WidgetConfig>,
    ctx: WidgetContext,
    shared: Arc<Mutex<Inner>>,
}

/// A mounted hit count widget.
pub struct HitCountWidget {
    id: usize,
    title: String,
    config: Option<Arc<WidgetConfig>>,
    violations: Vec<String>,
    shared: Arc<Mutex<Inner>>,
    task: Option<PollTask>,
    activity: ActivityLoggerHandle,
}

impl HitCountWidget {
    /// Validate `props` and, when valid, start polling. Never fails: every
    /// problem ends up in the display state.
    pub fn mount(id: usize, props: &Value, ctx: WidgetContext) -> Self {
        let shared = Arc::new(Mutex::new(Inner {
            state: DisplayState::default(),
            mounted: true,
            settled_polls: 0,
        }));
        let mut widget = Self {
            id,
            title: display_title(props),
            config: None,
            violations: Vec::new(),
            shared,
            task: None,
            activity: ctx.activity.clone(),
        };

        let config = match WidgetConfig::from_props(props) {
            Ok(config) => Arc::new(config),
            Err(err) => {
                widget.fail_closed(&ctx, err);
                return widget;
            }
        };

        ctx.activity.send(ActivityEvent::WidgetMounted {
            widget: config.title.clone(),
            url: config.search_url(),
            interval_ms: duration_ms(config.interval),
        });

        let scope = PollScope {
            id,
            config: Arc::clone(&config),
            ctx: ctx.clone(),
            shared: Arc::clone(&widget.shared),
        };
        widget.config = Some(config);

        match PollTask::spawn(format!("hcm-widget-{id}"), move || scope.run_cycle()) {
            Ok(task) => widget.task = Some(task),
            Err(err) => {
                eprintln!("[HCM-WIDGET] {err}");
                ctx.activity.send(ActivityEvent::Error {
                    code: err.code().to_string(),
                    message: err.to_string(),
                });
                let mut inner = widget.shared.lock();
                inner.state.apply_failure();
                publish(&ctx, id, &widget.title, &inner.state);
            }
        }
        widget
    }

    fn fail_closed(&mut self, ctx: &WidgetContext, err: HcmError) {
        let violations = match err {
            HcmError::WidgetValidation { violations, .. } => violations,
            other => vec![other.to_string()],
        };
        eprintln!("[HCM-WIDGET] ValidationError @ {WIDGET_NAME}: {violations:?}");
        ctx.activity.send(ActivityEvent::ValidationFailed {
            widget: self.title.clone(),
            violations: violations.clone(),
        });
        self.violations = violations;

        let mut inner = self.shared.lock();
        inner.state.mark_invalid();
        publish(ctx, self.id, &self.title, &inner.state);
    }

    #[must_use]
    pub fn id(&self) -> usize {
        self.id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Validated config, or `None` when the props were rejected.
    #[must_use]
    pub fn config(&self) -> Option<&WidgetConfig> {
        self.config.as_deref()
    }

    /// Validation violations (empty for a valid widget).
    #[must_use]
    pub fn violations(&self) -> &[String] {
        &self.violations
    }

    /// Snapshot of the current display state.
    #[must_use]
    pub fn state(&self) -> DisplayState {
        self.shared.lock().state.clone()
    }

    #[must_use]
    pub fn view(&self) -> WidgetView {
        WidgetView::new(self.title.clone(), &self.shared.lock().state)
    }

    /// Poll cycles whose result was applied.
    #[must_use]
    pub fn settled_polls(&self) -> u64 {
        self.shared.lock().settled_polls
    }

    #[must_use]
    pub fn is_mounted(&self) -> bool {
        self.shared.lock().mounted
    }

    /// Whether a poll loop is scheduled.
    #[must_use]
    pub fn is_polling(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_cancelled())
    }

    /// Tear down: no state change is applied after this returns.
    pub fn unmount(&mut self) {
        {
            let mut inner = self.shared.lock();
            if !inner.mounted {
                return;
            }
            inner.mounted = false;
        }
        if let Some(task) = self.task.as_mut() {
            task.cancel();
        }
        self.activity.send(ActivityEvent::WidgetUnmounted {
            widget: self.title.clone(),
        });
    }
}

impl Drop for HitCountWidget {
    fn drop(&mut self) {
        self.unmount();
    }
}

impl PollScope {
    /// One fetch-and-update iteration. Returns the delay before the next one.
    fn run_cycle(&self) -> Duration {
        let config = &self.config;
        let started = Instant::now();
        let outcome = SearchRequest::for_widget(config, &self.ctx.credentials)
            .and_then(|request| fetch_hit_total(self.ctx.transport.as_ref(), &request));
        let elapsed_ms = duration_ms(started.elapsed());

        let mut inner = self.shared.lock();
        if !inner.mounted {
            // Torn down while the request was in flight.
            return config.interval;
        }

        let previous = inner.state.alert_severity.clone();
        match outcome {
            Ok(total) => {
                let severity = classify(total, &config.alert);
                inner.state.apply_success(total, severity.clone());
                self.ctx.activity.send(ActivityEvent::PollSucceeded {
                    widget: config.title.clone(),
                    url: config.search_url(),
                    count: total,
                    alert_severity: severity.to_string(),
                    duration_ms: elapsed_ms,
                });
            }
            Err(err) => {
                inner.state.apply_failure();
                self.ctx.activity.send(ActivityEvent::PollFailed {
                    widget: config.title.clone(),
                    url: config.search_url(),
                    error_code: err.code().to_string(),
                    error_message: err.to_string(),
                    retryable: err.is_retryable(),
                    duration_ms: elapsed_ms,
                });
            }
        }
        inner.settled_polls += 1;

        let current = &inner.state.alert_severity;
        if *current != previous {
            self.log_severity_change(&previous, current, inner.state.count);
        }
        publish(&self.ctx, self.id, &config.title, &inner.state);

        config.interval
    }

    fn log_severity_change(&self, from: &SeverityLevel, to: &SeverityLevel, count: u64) {
        self.ctx.activity.send(ActivityEvent::SeverityChanged {
            widget: self.config.title.clone(),
            from: from.to_string(),
            to: to.to_string(),
            count,
        });
    }
}

/// Called with the state lock held so no update is published after unmount.
fn publish(ctx: &WidgetContext, id: usize, title: &str, state: &DisplayState) {
    if let Some(tx) = &ctx.updates {
        let _ = tx.try_send(WidgetUpdate {
            widget_id: id,
            view: WidgetView::new(title, state),
        });
    }
}

/// Title shown even when the rest of the props are invalid.
fn display_title(props: &Value) -> String {
    props
        .get("title")
        .and_then(Value::as_str)
        .unwrap_or(DEFAULT_TITLE)
        .to_string()
}

fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
