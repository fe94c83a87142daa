//! Ready-made checks and the chains commonly assembled from them.

pub mod presets;
pub mod rules;

pub use presets::{capped, counter, probability, terminal};
