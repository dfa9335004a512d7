//! Cross-cutting domain utilities.

mod descriptions;

pub use descriptions::squash_descriptions;
