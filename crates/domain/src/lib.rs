extern crate self as sheetbinder_domain;

pub mod common;
pub mod entities;
pub mod error;
pub mod ids;
pub mod types;

pub use common::squash_descriptions;
pub use entities::Version;
pub use error::DomainError;
pub use ids::{CharacterId, VersionId};
pub use types::{CharacterSheet, SheetValue};
