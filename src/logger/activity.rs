//! Activity logger thread: widget and dashboard events → JSONL.
//!
//! A dedicated thread owns the [`JsonlWriter`]. Widget workers send
//! [`ActivityEvent`]s through a bounded crossbeam channel with `try_send`, so a
//! slow disk never stalls a poll cycle; overflow is counted and reported.

#![allow(missing_docs)]

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};

use crate::core::errors::{HcmError, Result};
use crate::logger::jsonl::{EventType, JsonlConfig, JsonlWriter, LogEntry, Severity};

const CHANNEL_CAPACITY: usize = 1024;

/// Events accepted by the activity logger.
#[derive(Debug, Clone)]
pub enum ActivityEvent {
    DashboardStarted {
        version: String,
        config_hash: String,
        widgets: usize,
    },
    DashboardStopped {
        reason: String,
        uptime_secs: u64,
    },
    ConfigReloaded {
        details: String,
    },
    WidgetMounted {
        widget: String,
        url: String,
        interval_ms: u64,
    },
    WidgetUnmounted {
        widget: String,
    },
    ValidationFailed {
        widget: String,
        violations: Vec<String>,
    },
    PollSucceeded {
        widget: String,
        url: String,
        count: u64,
        alert_severity: String,
        duration_ms: u64,
    },
    /// `retryable` is false when the next cycle cannot succeed without a
    /// config change (e.g. an unknown `authKey`).
    PollFailed {
        widget: String,
        url: String,
        error_code: String,
        error_message: String,
        retryable: bool,
        duration_ms: u64,
    },
    SeverityChanged {
        widget: String,
        from: String,
        to: String,
        count: u64,
    },
    Error {
        code: String,
        message: String,
    },
    /// Sentinel: flush and stop the logger thread.
    Shutdown,
}

/// Cheaply cloneable, non-blocking sender for activity events.
#[derive(Clone)]
pub struct ActivityLoggerHandle {
    tx: Sender<ActivityEvent>,
    dropped_events: Arc<AtomicU64>,
}

impl ActivityLoggerHandle {
    /// A handle whose events go nowhere. Used when logging is disabled.
    #[must_use]
    pub fn disabled() -> Self {
        let (tx, _rx) = bounded(1);
        Self {
            tx,
            dropped_events: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Queue an event. Never blocks; a full channel drops the event.
    pub fn send(&self, event: ActivityEvent) {
        if let Err(TrySendError::Full(_)) = self.tx.try_send(event) {
            self.dropped_events.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn dropped_events(&self) -> u64 {
        self.dropped_events.load(Ordering::Relaxed)
    }

    /// Ask the logger thread to flush and exit.
    pub fn shutdown(&self) {
        let _ = self.tx.send(ActivityEvent::Shutdown);
    }
}

/// Spawn the logger thread.
pub fn spawn_logger(
    config: JsonlConfig,
) -> Result<(ActivityLoggerHandle, thread::JoinHandle<()>)> {
    spawn_logger_with_capacity(config, CHANNEL_CAPACITY)
}

pub fn spawn_logger_with_capacity(
    config: JsonlConfig,
    capacity: usize,
) -> Result<(ActivityLoggerHandle, thread::JoinHandle<()>)> {
    let (tx, rx) = bounded::<ActivityEvent>(capacity);
    let dropped = Arc::new(AtomicU64::new(0));
    let handle = ActivityLoggerHandle {
        tx,
        dropped_events: Arc::clone(&dropped),
    };

    let join = thread::Builder::new()
        .name("hcm-logger".to_string())
        .spawn(move || logger_thread_main(&rx, config, &dropped))
        .map_err(|e| HcmError::Runtime {
            details: format!("failed to spawn logger thread: {e}"),
        })?;

    Ok((handle, join))
}

fn logger_thread_main(rx: &Receiver<ActivityEvent>, config: JsonlConfig, dropped: &AtomicU64) {
    let mut jsonl = JsonlWriter::open(config);

    while let Ok(event) = rx.recv() {
        let lost = dropped.swap(0, Ordering::Relaxed);
        if lost > 0 {
            let mut warn = LogEntry::new(EventType::Error, Severity::Warning);
            warn.details = Some(format!("{lost} activity events dropped due to back-pressure"));
            jsonl.write_entry(&warn);
        }

        if matches!(event, ActivityEvent::Shutdown) {
            break;
        }
        jsonl.write_entry(&to_log_entry(&event));
        // Events are sparse (one per poll); keep the file tail current.
        jsonl.flush();
    }

    jsonl.flush();
}

fn to_log_entry(event: &ActivityEvent) -> LogEntry {
    match event {
        ActivityEvent::DashboardStarted {
            version,
            config_hash,
            widgets,
        } => {
            let mut e = LogEntry::new(EventType::DashboardStart, Severity::Info);
            e.details = Some(format!(
                "version={version} config_hash={config_hash} widgets={widgets}"
            ));
            e
        }
        ActivityEvent::DashboardStopped {
            reason,
            uptime_secs,
        } => {
            let mut e = LogEntry::new(EventType::DashboardStop, Severity::Info);
            e.details = Some(format!("reason={reason} uptime={uptime_secs}s"));
            e
        }
        ActivityEvent::ConfigReloaded { details } => {
            let mut e = LogEntry::new(EventType::ConfigReload, Severity::Info);
            e.details = Some(details.clone());
            e
        }
        ActivityEvent::WidgetMounted {
            widget,
            url,
            interval_ms,
        } => {
            let mut e = LogEntry::new(EventType::WidgetMount, Severity::Info);
            e.widget = Some(widget.clone());
            e.url = Some(url.clone());
            e.details = Some(format!("interval_ms={interval_ms}"));
            e
        }
        ActivityEvent::WidgetUnmounted { widget } => {
            let mut e = LogEntry::new(EventType::WidgetUnmount, Severity::Info);
            e.widget = Some(widget.clone());
            e
        }
        ActivityEvent::ValidationFailed { widget, violations } => {
            let mut e = LogEntry::new(EventType::ValidationFailed, Severity::Critical);
            e.widget = Some(widget.clone());
            e.error_code = Some("HCM-1101".to_string());
            e.error_message = Some(violations.join("; "));
            e
        }
        ActivityEvent::PollSucceeded {
            widget,
            url,
            count,
            alert_severity,
            duration_ms,
        } => {
            let mut e = LogEntry::new(EventType::PollSuccess, Severity::Info);
            e.widget = Some(widget.clone());
            e.url = Some(url.clone());
            e.count = Some(*count);
            e.alert_severity = Some(alert_severity.clone());
            e.duration_ms = Some(*duration_ms);
            e
        }
        ActivityEvent::PollFailed {
            widget,
            url,
            error_code,
            error_message,
            retryable,
            duration_ms,
        } => {
            let severity = if *retryable {
                Severity::Warning
            } else {
                Severity::Critical
            };
            let mut e = LogEntry::new(EventType::PollFailure, severity);
            e.widget = Some(widget.clone());
            e.url = Some(url.clone());
            e.error_code = Some(error_code.clone());
            e.error_message = Some(error_message.clone());
            e.duration_ms = Some(*duration_ms);
            e.details = Some(format!("retryable={retryable}"));
            e
        }
        ActivityEvent::SeverityChanged {
            widget,
            from,
            to,
            count,
        } => {
            let mut e = LogEntry::new(EventType::SeverityChange, Severity::Warning);
            e.widget = Some(widget.clone());
            e.alert_severity = Some(to.clone());
            e.count = Some(*count);
            e.details = Some(format!("{from}->{to}"));
            e
        }
        ActivityEvent::Error { code, message } => {
            let mut e = LogEntry::new(EventType::Error, Severity::Critical);
            e.error_code = Some(code.clone());
            e.error_message = Some(message.clone());
            e
        }
        ActivityEvent::Shutdown => LogEntry::new(EventType::DashboardStop, Severity::Info),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config(dir: &std::path::Path) -> JsonlConfig {
        JsonlConfig {
            path: dir.join("activity.jsonl"),
            fallback_path: None,
            max_size_bytes: 1024 * 1024,
            max_rotated_files: 2,
        }
    }

    fn read_events(dir: &std::path::Path) -> Vec<serde_json::Value> {
        std::fs::read_to_string(dir.join("activity.jsonl"))
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[test]
    fn spawn_log_and_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        let (handle, join) = spawn_logger(test_config(dir.path())).unwrap();

        handle.send(ActivityEvent::PollSucceeded {
            widget: "Errors".to_string(),
            url: "http://es/logs/_search?q=x".to_string(),
            count: 42,
            alert_severity: "none".to_string(),
            duration_ms: 12,
        });
        handle.send(ActivityEvent::ValidationFailed {
            widget: "Broken".to_string(),
            violations: vec!["query is a required field".to_string()],
        });
        handle.shutdown();
        join.join().unwrap();

        let events = read_events(dir.path());
        assert_eq!(events.len(), 2);
        assert_eq!(events[0]["event"], "poll_success");
        assert_eq!(events[0]["count"], 42);
        assert_eq!(events[1]["event"], "validation_failed");
        assert_eq!(events[1]["error_message"], "query is a required field");
    }

    #[test]
    fn disabled_handle_swallows_events() {
        let handle = ActivityLoggerHandle::disabled();
        handle.send(ActivityEvent::WidgetUnmounted {
            widget: "x".to_string(),
        });
        handle.shutdown();
        assert_eq!(handle.dropped_events(), 0);
    }

    #[test]
    fn handles_are_cloneable_across_threads() {
        let dir = tempfile::tempdir().unwrap();
        let (handle, join) = spawn_logger(test_config(dir.path())).unwrap();
        let workers: Vec<_> = (0..4)
            .map(|i| {
                let h = handle.clone();
                std::thread::spawn(move || {
                    h.send(ActivityEvent::WidgetUnmounted {
                        widget: format!("w{i}"),
                    });
                })
            })
            .collect();
        for w in workers {
            w.join().unwrap();
        }
        handle.shutdown();
        join.join().unwrap();
        assert_eq!(read_events(dir.path()).len(), 4);
    }

    #[test]
    fn severity_change_records_transition() {
        let entry = to_log_entry(&ActivityEvent::SeverityChanged {
            widget: "Errors".to_string(),
            from: "none".to_string(),
            to: "critical".to_string(),
            count: 150,
        });
        assert_eq!(entry.event, EventType::SeverityChange);
        assert_eq!(entry.details.as_deref(), Some("none->critical"));
        assert_eq!(entry.alert_severity.as_deref(), Some("critical"));
    }

    #[test]
    fn credential_failures_log_as_critical() {
        let failure = |retryable| {
            to_log_entry(&ActivityEvent::PollFailed {
                widget: "Errors".to_string(),
                url: "http://es/logs/_search?q=x".to_string(),
                error_code: "HCM-2004".to_string(),
                error_message: "no credentials".to_string(),
                retryable,
                duration_ms: 3,
            })
        };
        let transient = failure(true);
        assert_eq!(transient.event, EventType::PollFailure);
        assert_eq!(transient.severity, Severity::Warning);
        assert_eq!(transient.details.as_deref(), Some("retryable=true"));

        let permanent = failure(false);
        assert_eq!(permanent.severity, Severity::Critical);
        assert_eq!(permanent.details.as_deref(), Some("retryable=false"));
    }
}
