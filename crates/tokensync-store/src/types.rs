use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub type CollectionId = String;
pub type VariableId = String;
pub type ModeId = String;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResolvedType {
    Color,
    Float,
    String,
    Boolean,
}

impl ResolvedType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Color => "COLOR",
            Self::Float => "FLOAT",
            Self::String => "STRING",
            Self::Boolean => "BOOLEAN",
        }
    }
}

impl std::fmt::Display for ResolvedType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// RGBA color with every channel in `[0, 1]`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub r: f64,
    pub g: f64,
    pub b: f64,
    #[serde(default = "opaque")]
    pub a: f64,
}

fn opaque() -> f64 {
    1.0
}

impl Color {
    pub fn rgb(r: f64, g: f64, b: f64) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    pub fn rgba(r: f64, g: f64, b: f64, a: f64) -> Self {
        Self { r, g, b, a }
    }

    pub fn is_opaque(&self) -> bool {
        self.a == 1.0
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VariableValue {
    Color(Color),
    Float(f64),
    String(String),
    Boolean(bool),
    #[serde(rename = "VARIABLE_ALIAS")]
    Alias { id: VariableId },
}

impl VariableValue {
    pub fn alias(id: impl Into<VariableId>) -> Self {
        Self::Alias { id: id.into() }
    }

    pub fn alias_target(&self) -> Option<&VariableId> {
        match self {
            Self::Alias { id } => Some(id),
            _ => None,
        }
    }

    /// Type carried by a concrete value; `None` for alias references.
    pub fn concrete_type(&self) -> Option<ResolvedType> {
        match self {
            Self::Color(_) => Some(ResolvedType::Color),
            Self::Float(_) => Some(ResolvedType::Float),
            Self::String(_) => Some(ResolvedType::String),
            Self::Boolean(_) => Some(ResolvedType::Boolean),
            Self::Alias { .. } => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mode {
    pub mode_id: ModeId,
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collection {
    pub id: CollectionId,
    pub name: String,
    pub modes: Vec<Mode>,
    pub variable_ids: Vec<VariableId>,
}

impl Collection {
    pub fn default_mode(&self) -> Option<&Mode> {
        self.modes.first()
    }

    pub fn mode_by_name(&self, name: &str) -> Option<&Mode> {
        self.modes.iter().find(|mode| mode.name == name)
    }

    pub fn has_mode(&self, mode_id: &str) -> bool {
        self.modes.iter().any(|mode| mode.mode_id == mode_id)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    pub id: VariableId,
    pub name: String,
    pub collection_id: CollectionId,
    pub resolved_type: ResolvedType,
    pub values_by_mode: BTreeMap<ModeId, VariableValue>,
}

impl Variable {
    pub fn value_for_mode(&self, mode_id: &str) -> Option<&VariableValue> {
        self.values_by_mode.get(mode_id)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedCollection {
    pub collection_id: CollectionId,
    pub default_mode_id: ModeId,
}
