#![forbid(unsafe_code)]

//! Hit Count Monitor (hcm): an Elasticsearch hit count dashboard widget.
//!
//! Each widget polls `GET {url}/{index}/_search?q={query}`, shows the hit
//! total, and raises an alert severity once the total crosses configured
//! thresholds. Props are validated once at mount; a widget with bad props
//! shows a permanent error and never polls.
//!
//! # Library usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use hit_count_monitor::prelude::*;
//!
//! let config = DashboardConfig::load(None).unwrap();
//! let transport = Arc::new(HttpSearchClient::new(&config.http).unwrap());
//! let ctx = WidgetContext::new(transport, config.credential_store());
//! let props = serde_json::json!({
//!     "url": "http://localhost:9200",
//!     "index": "logs-*",
//!     "query": "level:error",
//!     "alert": [{ "severity": "critical", "value": 100 }],
//! });
//! let widget = HitCountWidget::mount(0, &props, ctx);
//! println!("{:?}", widget.view());
//! ```

pub mod prelude;

pub mod alert;
pub mod core;
pub mod daemon;
pub mod logger;
pub mod search;
pub mod widget;
