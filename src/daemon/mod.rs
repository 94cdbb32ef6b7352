//! Runtime plumbing: the cancellable poll scheduler, the dashboard runner,
//! and signal handling.

#[cfg(feature = "daemon")]
pub mod dashboard;
pub mod scheduler;
#[cfg(feature = "daemon")]
pub mod signals;
