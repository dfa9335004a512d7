//! # SheetBinder Domain Types
//!
//! Shared vocabulary types for the sheet editor core.
//!
//! ## Design Principles
//!
//! 1. **Pure data types** - No I/O, no async, no side effects
//! 2. **Serializable** - All types derive Serialize/Deserialize

pub mod sheet;

pub use sheet::{CharacterSheet, SheetValue};
