//! Scan result analysis.
//!
//! Turns a raw scan result into a severity tally and a build decision.

pub mod aggregator;

pub use aggregator::*;
