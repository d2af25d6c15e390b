//! Structural tree diff
//!
//! [`diff_trees`] compares two trees and feeds the differences to a
//! [`crate::change::ChangeSink`]. Feeding a plain change set and applying it
//! makes the left tree match the right one; the union and intersect sets
//! merge the two trees instead.

pub mod engine;

pub use engine::diff_trees;
