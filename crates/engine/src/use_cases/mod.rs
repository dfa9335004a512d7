//! Use cases: one module per editor-facing operation group.

pub mod history;
