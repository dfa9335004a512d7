use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ids::CharacterId;

/// A single field value on a character sheet.
///
/// Sheets are schema-driven in the editor layer; the domain only cares that
/// values serialize stably and compare by value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum SheetValue {
    Integer(i64),
    Float(f64),
    Boolean(bool),
    String(String),
    List(Vec<SheetValue>),
    Null,
}

impl SheetValue {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            SheetValue::Integer(value) => Some(*value),
            SheetValue::Float(value) => Some(*value as i64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            SheetValue::Boolean(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            SheetValue::String(value) => Some(value.as_str()),
            _ => None,
        }
    }
}

/// The character document that versions capture.
///
/// A sheet is a plain value: cloning produces an independent copy, so a
/// snapshot stored in history can never be altered by later edits to the
/// live document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CharacterSheet {
    character_id: CharacterId,
    name: String,
    /// Sheet fields keyed by field ID (e.g. "MIGHT_POOL", "BACKGROUND").
    /// BTreeMap keeps serialization order stable.
    values: BTreeMap<String, SheetValue>,
}

impl CharacterSheet {
    pub fn new(character_id: CharacterId, name: impl Into<String>) -> Self {
        Self {
            character_id,
            name: name.into(),
            values: BTreeMap::new(),
        }
    }

    pub fn character_id(&self) -> CharacterId {
        self.character_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn get(&self, field_id: &str) -> Option<&SheetValue> {
        self.values.get(field_id)
    }

    pub fn set(&mut self, field_id: impl Into<String>, value: SheetValue) {
        self.values.insert(field_id.into(), value);
    }

    pub fn remove(&mut self, field_id: &str) -> Option<SheetValue> {
        self.values.remove(field_id)
    }

    pub fn values(&self) -> &BTreeMap<String, SheetValue> {
        &self.values
    }

    /// Builder-style field setter, handy for fixtures.
    pub fn with_value(mut self, field_id: impl Into<String>, value: SheetValue) -> Self {
        self.set(field_id, value);
        self
    }
}
