use crate::{
    Diagnostic, ItemError, TokenLeaf, TokenSyncError, TokenType, flatten_document,
    parse_color, resolve_aliases,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tokensync_store::{
    CollectionId, Color, ModeId, ResolvedType, Variable, VariableId, VariableValue,
    VariableWriter,
};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ImportTarget {
    /// Create a collection; its default mode receives the values.
    NewCollection {
        name: String,
        mode_name: Option<String>,
    },
    /// Write into a named mode of an existing collection, adding the mode if
    /// needed and reusing variables that already carry a token's name.
    ExistingMode {
        collection_id: CollectionId,
        mode_name: String,
    },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportOptions {
    pub target: ImportTarget,
}

impl ImportOptions {
    pub fn new_collection(name: impl Into<String>) -> Self {
        Self {
            target: ImportTarget::NewCollection {
                name: name.into(),
                mode_name: None,
            },
        }
    }

    pub fn existing_mode(collection_id: impl Into<String>, mode_name: impl Into<String>) -> Self {
        Self {
            target: ImportTarget::ExistingMode {
                collection_id: collection_id.into(),
                mode_name: mode_name.into(),
            },
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ImportedVariable {
    pub key: String,
    pub variable_id: VariableId,
    pub resolved_type: ResolvedType,
    /// Target token key when the variable was written as an alias.
    pub alias_of: Option<String>,
    /// False when an existing variable of the same name was reused.
    pub created: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ImportReport {
    pub collection_id: CollectionId,
    pub mode_id: ModeId,
    pub imported: Vec<ImportedVariable>,
    pub diagnostics: Vec<Diagnostic>,
    /// Fixpoint rounds spent on deferred aliases.
    pub rounds: usize,
}

pub async fn import_str(
    store: &dyn VariableWriter,
    source: &str,
    options: &ImportOptions,
) -> Result<ImportReport, TokenSyncError> {
    let document: Value = serde_json::from_str(source)
        .map_err(|err| TokenSyncError::DocumentParse(err.to_string()))?;
    import_document(store, &document, options).await
}

pub async fn import_document(
    store: &dyn VariableWriter,
    document: &Value,
    options: &ImportOptions,
) -> Result<ImportReport, TokenSyncError> {
    let flattened = flatten_document(document)?;
    let mut session = ImportSession::open(store, &options.target).await?;
    session.diagnostics.extend(flattened.diagnostics);

    let mut materialized: BTreeMap<String, TokenType> = BTreeMap::new();
    for leaf in flattened.materialized {
        let value = match leaf_value(&leaf) {
            Ok(value) => value,
            Err(error) => {
                tracing::warn!(key = %leaf.key, "skipping token: {error}");
                session.report(error, &leaf.key, None);
                continue;
            }
        };
        if session
            .write(&leaf.key, leaf.token_type.resolved_type(), value, None)
            .await
        {
            materialized.insert(leaf.key, leaf.token_type);
        }
    }

    let resolution = resolve_aliases(flattened.deferred, &materialized);
    session.diagnostics.extend(resolution.diagnostics());

    for alias in &resolution.resolved {
        let Some(target_id) = session.ids.get(&alias.target_key).cloned() else {
            // Target was resolved but its own write failed.
            let error = ItemError::AliasTargetUnresolved {
                target: alias.target_key.clone(),
            };
            session.report(error, &alias.key, None);
            continue;
        };
        session
            .write(
                &alias.key,
                alias.resolved_type.resolved_type(),
                VariableValue::alias(target_id),
                Some(alias.target_key.clone()),
            )
            .await;
    }

    tracing::info!(
        collection_id = %session.collection_id,
        imported = session.imported.len(),
        diagnostics = session.diagnostics.len(),
        rounds = resolution.rounds,
        "token import finished"
    );

    Ok(ImportReport {
        collection_id: session.collection_id,
        mode_id: session.mode_id,
        imported: session.imported,
        diagnostics: session.diagnostics,
        rounds: resolution.rounds,
    })
}

/// Mutable state of one import run.
struct ImportSession<'a> {
    store: &'a dyn VariableWriter,
    collection_id: CollectionId,
    mode_id: ModeId,
    mode_name: String,
    existing: BTreeMap<String, Variable>,
    ids: BTreeMap<String, VariableId>,
    imported: Vec<ImportedVariable>,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> ImportSession<'a> {
    async fn open(
        store: &'a dyn VariableWriter,
        target: &ImportTarget,
    ) -> Result<Self, TokenSyncError> {
        match target {
            ImportTarget::NewCollection { name, mode_name } => {
                let created = store.create_collection(name).await?;
                if let Some(mode_name) = mode_name {
                    store
                        .rename_mode(&created.collection_id, &created.default_mode_id, mode_name)
                        .await?;
                }
                let collection = store.get_collection_by_id(&created.collection_id).await?;
                let mode_name = collection
                    .modes
                    .iter()
                    .find(|mode| mode.mode_id == created.default_mode_id)
                    .map(|mode| mode.name.clone())
                    .unwrap_or_default();
                Ok(Self::new(
                    store,
                    created.collection_id,
                    created.default_mode_id,
                    mode_name,
                    BTreeMap::new(),
                    Vec::new(),
                ))
            }
            ImportTarget::ExistingMode {
                collection_id,
                mode_name,
            } => {
                let collection = store.get_collection_by_id(collection_id).await?;
                let mode_id = match collection.mode_by_name(mode_name) {
                    Some(mode) => mode.mode_id.clone(),
                    None => store.add_mode(collection_id, mode_name).await?,
                };

                let mut existing = BTreeMap::new();
                let mut diagnostics = Vec::new();
                for variable_id in &collection.variable_ids {
                    match store.get_variable_by_id(variable_id).await {
                        Ok(Some(variable)) => {
                            existing.insert(variable.name.clone(), variable);
                        }
                        Ok(None) => diagnostics.push(
                            ItemError::VariableNotFound(variable_id.clone())
                                .to_diagnostic()
                                .with_id(variable_id.clone()),
                        ),
                        Err(error) => diagnostics.push(
                            ItemError::from(error)
                                .to_diagnostic()
                                .with_id(variable_id.clone()),
                        ),
                    }
                }

                Ok(Self::new(
                    store,
                    collection_id.clone(),
                    mode_id,
                    mode_name.clone(),
                    existing,
                    diagnostics,
                ))
            }
        }
    }

    fn new(
        store: &'a dyn VariableWriter,
        collection_id: CollectionId,
        mode_id: ModeId,
        mode_name: String,
        existing: BTreeMap<String, Variable>,
        diagnostics: Vec<Diagnostic>,
    ) -> Self {
        Self {
            store,
            collection_id,
            mode_id,
            mode_name,
            existing,
            ids: BTreeMap::new(),
            imported: Vec::new(),
            diagnostics,
        }
    }

    fn report(&mut self, error: ItemError, key: &str, id: Option<&VariableId>) {
        let mut diagnostic = error
            .to_diagnostic()
            .with_name(key)
            .with_mode(self.mode_name.clone());
        if let Some(id) = id {
            diagnostic = diagnostic.with_id(id.clone());
        }
        self.diagnostics.push(diagnostic);
    }

    /// Creates or reuses the variable named `key` and sets its value for the
    /// session mode. Returns false when the token could not be written.
    async fn write(
        &mut self,
        key: &str,
        resolved_type: ResolvedType,
        value: VariableValue,
        alias_of: Option<String>,
    ) -> bool {
        let (variable_id, created) = match self.existing.get(key) {
            Some(variable) if variable.resolved_type != resolved_type => {
                let error = ItemError::ValueShapeMismatch {
                    expected: variable.resolved_type.to_string(),
                    found: resolved_type.to_string(),
                };
                let id = variable.id.clone();
                self.report(error, key, Some(&id));
                return false;
            }
            Some(variable) => (variable.id.clone(), false),
            None => {
                match self
                    .store
                    .create_variable(key, &self.collection_id, resolved_type)
                    .await
                {
                    Ok(id) => (id, true),
                    Err(error) => {
                        tracing::warn!(key, "create variable failed: {error}");
                        self.report(ItemError::from(error), key, None);
                        return false;
                    }
                }
            }
        };

        if let Err(error) = self
            .store
            .set_value_for_mode(&variable_id, &self.mode_id, value)
            .await
        {
            tracing::warn!(key, variable_id = %variable_id, "set value failed: {error}");
            self.report(ItemError::from(error), key, Some(&variable_id));
            return false;
        }

        tracing::debug!(key, variable_id = %variable_id, created, "token written");
        self.ids.insert(key.to_string(), variable_id.clone());
        self.imported.push(ImportedVariable {
            key: key.to_string(),
            variable_id,
            resolved_type,
            alias_of,
            created,
        });
        true
    }
}

/// Converts an authored `$value` into a store value for the leaf's type.
pub fn leaf_value(leaf: &TokenLeaf) -> Result<VariableValue, ItemError> {
    let shape = |expected: &str| ItemError::ValueShapeMismatch {
        expected: expected.to_string(),
        found: json_kind(&leaf.raw).to_string(),
    };

    match (leaf.token_type, &leaf.raw) {
        (TokenType::Color, Value::String(raw)) => parse_color(raw).map(VariableValue::Color),
        (TokenType::Color, Value::Object(fields)) => {
            float_object_color(fields, &leaf.raw).map(VariableValue::Color)
        }
        (TokenType::Color, _) => Err(shape("color")),
        (TokenType::Number, Value::Number(number)) => number
            .as_f64()
            .map(VariableValue::Float)
            .ok_or_else(|| ItemError::InvalidNumber(number.to_string())),
        (TokenType::Number, Value::String(raw)) => raw
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|number| number.is_finite())
            .map(VariableValue::Float)
            .ok_or_else(|| ItemError::InvalidNumber(raw.clone())),
        (TokenType::Dimension, Value::Number(number)) => number
            .as_f64()
            .map(VariableValue::Float)
            .ok_or_else(|| ItemError::InvalidNumber(number.to_string())),
        (TokenType::Dimension, Value::String(raw)) => {
            let trimmed = raw.trim();
            trimmed
                .strip_suffix("px")
                .unwrap_or(trimmed)
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|number| number.is_finite())
                .map(VariableValue::Float)
                .ok_or_else(|| ItemError::InvalidNumber(raw.clone()))
        }
        (TokenType::Number | TokenType::Dimension, _) => Err(shape("number")),
        (TokenType::String, Value::String(raw)) => Ok(VariableValue::String(raw.clone())),
        (TokenType::String, _) => Err(shape("string")),
        (TokenType::Boolean, Value::Bool(flag)) => Ok(VariableValue::Boolean(*flag)),
        (TokenType::Boolean, Value::String(raw)) => match raw.trim() {
            "true" => Ok(VariableValue::Boolean(true)),
            "false" => Ok(VariableValue::Boolean(false)),
            _ => Err(shape("boolean")),
        },
        (TokenType::Boolean, _) => Err(shape("boolean")),
    }
}

/// Float-object form `{r, g, b, opacity?}` with channels already in `[0, 1]`.
fn float_object_color(fields: &Map<String, Value>, raw: &Value) -> Result<Color, ItemError> {
    let channel = |key: &str, default: Option<f64>| {
        let value = match fields.get(key) {
            Some(value) => value.as_f64(),
            None => default,
        };
        value
            .filter(|value| (0.0..=1.0).contains(value))
            .ok_or_else(|| ItemError::InvalidColorFormat(raw.to_string()))
    };

    Ok(Color::rgba(
        channel("r", None)?,
        channel("g", None)?,
        channel("b", None)?,
        channel("opacity", Some(1.0))?,
    ))
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
