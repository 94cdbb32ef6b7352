//! Dashboard runner: mounts every configured widget and pumps their updates.
//!
//! Each widget polls on its own worker thread, so widgets with different
//! intervals never wait on each other. The runner only consumes the shared
//! update channel, reacts to shutdown/reload signals, and unmounts widgets
//! on the way out.

#![allow(missing_docs)]

use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, unbounded};
use serde_json::Value;

use crate::core::config::DashboardConfig;
use crate::core::errors::Result;
use crate::daemon::signals::SignalHandler;
use crate::logger::activity::{ActivityEvent, ActivityLoggerHandle};
use crate::search::client::SearchTransport;
use crate::widget::hit_count::{HitCountWidget, WidgetContext, WidgetUpdate};
use crate::widget::view::WidgetView;

/// How long the loop blocks on the update channel before re-checking signals.
const LOOP_TICK: Duration = Duration::from_millis(200);

/// A set of mounted widgets sharing one transport and one activity log.
pub struct Dashboard {
    config: DashboardConfig,
    transport: Arc<dyn SearchTransport>,
    activity: ActivityLoggerHandle,
    widgets: Vec<HitCountWidget>,
    updates_tx: Sender<WidgetUpdate>,
    updates_rx: Receiver<WidgetUpdate>,
    start_time: Instant,
}

impl Dashboard {
    /// Mount every widget in `config`. Invalid widgets fail closed individually.
    pub fn mount(
        config: DashboardConfig,
        transport: Arc<dyn SearchTransport>,
        activity: ActivityLoggerHandle,
    ) -> Self {
        let (updates_tx, updates_rx) = unbounded();
        let mut dashboard = Self {
            config,
            transport,
            activity,
            widgets: Vec::new(),
            updates_tx,
            updates_rx,
            start_time: Instant::now(),
        };
        dashboard.activity.send(ActivityEvent::DashboardStarted {
            version: env!("CARGO_PKG_VERSION").to_string(),
            config_hash: dashboard
                .config
                .stable_hash()
                .unwrap_or_else(|_| "unknown".to_string()),
            widgets: dashboard.config.widgets.len(),
        });
        dashboard.mount_widgets();
        dashboard
    }

    fn mount_widgets(&mut self) {
        let ctx = WidgetContext::new(Arc::clone(&self.transport), self.config.credential_store())
            .with_activity(self.activity.clone())
            .with_updates(self.updates_tx.clone());

        self.widgets = self
            .config
            .widgets
            .iter()
            .enumerate()
            .map(|(id, raw)| {
                let props = serde_json::to_value(raw).unwrap_or(Value::Null);
                HitCountWidget::mount(id, &props, ctx.clone())
            })
            .collect();
    }

    #[must_use]
    pub fn widgets(&self) -> &[HitCountWidget] {
        &self.widgets
    }

    #[must_use]
    pub fn config(&self) -> &DashboardConfig {
        &self.config
    }

    /// State change stream for all widgets.
    #[must_use]
    pub fn updates(&self) -> &Receiver<WidgetUpdate> {
        &self.updates_rx
    }

    /// Current view of every widget, in config order.
    #[must_use]
    pub fn views(&self) -> Vec<WidgetView> {
        self.widgets.iter().map(HitCountWidget::view).collect()
    }

    /// Block until every widget has left the loading state or `timeout` passes.
    /// Returns whether all widgets settled.
    pub fn wait_until_settled(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if self.widgets.iter().all(|w| !w.state().is_loading) {
                return true;
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return false;
            }
            let _ = self.updates_rx.recv_timeout(remaining.min(LOOP_TICK));
        }
    }

    /// Swap in a new config: unmount everything, drop stale updates, remount.
    pub fn reload(&mut self, config: DashboardConfig) {
        self.unmount_all();
        while self.updates_rx.try_recv().is_ok() {}
        let details = format!(
            "widgets={} config_hash={}",
            config.widgets.len(),
            config.stable_hash().unwrap_or_else(|_| "unknown".to_string())
        );
        self.config = config;
        self.activity.send(ActivityEvent::ConfigReloaded { details });
        eprintln!("[HCM-DASH] config reloaded");
        self.mount_widgets();
    }

    pub fn unmount_all(&mut self) {
        for widget in &mut self.widgets {
            widget.unmount();
        }
        self.widgets.clear();
    }

    /// Pump updates into `on_update` until a shutdown signal arrives.
    ///
    /// On SIGHUP, `reload_config` is called; a failed reload keeps the
    /// current widgets running.
    pub fn run<R, F>(&mut self, signals: &SignalHandler, mut reload_config: R, mut on_update: F)
    where
        R: FnMut() -> Result<DashboardConfig>,
        F: FnMut(&Self, &WidgetUpdate),
    {
        loop {
            if signals.should_shutdown() {
                break;
            }
            if signals.should_reload() {
                match reload_config() {
                    Ok(config) => self.reload(config),
                    Err(err) => {
                        eprintln!("[HCM-DASH] reload failed, keeping current config: {err}");
                        self.activity.send(ActivityEvent::Error {
                            code: err.code().to_string(),
                            message: err.to_string(),
                        });
                    }
                }
            }
            match self.updates_rx.recv_timeout(LOOP_TICK) {
                Ok(update) => on_update(self, &update),
                Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => {}
            }
        }
        self.shutdown("signal");
    }

    /// Unmount all widgets and record the stop.
    pub fn shutdown(&mut self, reason: &str) {
        self.unmount_all();
        let uptime_secs = self.start_time.elapsed().as_secs();
        self.activity.send(ActivityEvent::DashboardStopped {
            reason: reason.to_string(),
            uptime_secs,
        });
        eprintln!("[HCM-DASH] shutdown complete (reason={reason}, uptime={uptime_secs}s)");
    }
}

impl Drop for Dashboard {
    fn drop(&mut self) {
        self.unmount_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::client::{SearchRequest, SearchResponse};

    /// Answers every request with `{"hits":{"total":<len of index name>}}`.
    struct IndexLength;

    impl SearchTransport for IndexLength {
        fn get(&self, request: &SearchRequest) -> Result<SearchResponse> {
            let index = request
                .url
                .split('/')
                .rev()
                .nth(1)
                .unwrap_or_default()
                .to_string();
            Ok(SearchResponse::ok(format!(
                r#"{{"hits":{{"total":{}}}}}"#,
                index.len()
            )))
        }
    }

    const TWO_WIDGETS: &str = r#"
        [[widgets]]
        url = "http://es:9200"
        index = "abc"
        query = "x"
        title = "A"

        [[widgets]]
        url = "http://es:9200"
        index = "abcdef"
    "#;

    fn dashboard(raw: &str) -> Dashboard {
        Dashboard::mount(
            DashboardConfig::from_toml_str(raw).unwrap(),
            Arc::new(IndexLength),
            ActivityLoggerHandle::disabled(),
        )
    }

    #[test]
    fn invalid_widget_fails_closed_while_others_poll() {
        let dash = dashboard(TWO_WIDGETS);
        assert!(dash.wait_until_settled(Duration::from_secs(5)));

        let views = dash.views();
        assert_eq!(views.len(), 2);
        assert_eq!(views[0].title, "A");
        assert_eq!(views[0].counter.value, 3);
        assert!(!views[0].has_error);
        // Second widget has no query.
        assert!(views[1].has_error);
        assert!(!dash.widgets()[1].is_polling());
    }

    #[test]
    fn reload_replaces_widgets() {
        let mut dash = dashboard(TWO_WIDGETS);
        assert!(dash.wait_until_settled(Duration::from_secs(5)));

        let replacement = DashboardConfig::from_toml_str(
            r#"
            [[widgets]]
            url = "http://es:9200"
            index = "abcdefgh"
            query = "y"
            "#,
        )
        .unwrap();
        dash.reload(replacement);
        assert_eq!(dash.widgets().len(), 1);
        assert!(dash.wait_until_settled(Duration::from_secs(5)));
        assert_eq!(dash.views()[0].counter.value, 8);
    }

    #[test]
    fn run_exits_on_shutdown_signal() {
        let mut dash = dashboard(TWO_WIDGETS);
        let signals = SignalHandler::unregistered();
        let mut seen = 0;
        let stopper = signals.clone();
        dash.run(
            &signals,
            || Ok(DashboardConfig::default()),
            |_, _| {
                seen += 1;
                stopper.request_shutdown();
            },
        );
        assert!(seen >= 1);
        assert!(dash.widgets().is_empty());
    }
}
