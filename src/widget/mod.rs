//! The Elasticsearch hit count widget: props validation, display state,
//! polling lifecycle, and the presentation shell.

pub mod hit_count;
pub mod props;
pub mod state;
pub mod view;
