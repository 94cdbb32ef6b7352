//! Alert severity: threshold rules and the count → severity classifier.

pub mod severity;
