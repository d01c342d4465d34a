//! Flattening of `$type`/`$value` token documents into keyed leaves.

use crate::{Diagnostic, ItemError, Severity, TokenSyncError};
use serde_json::{Map, Value};
use tokensync_store::ResolvedType;

const METADATA_SIGIL: char = '$';
const VALUE_FIELD: &str = "$value";
const TYPE_FIELD: &str = "$type";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenType {
    Color,
    Number,
    Dimension,
    String,
    Boolean,
}

impl TokenType {
    pub fn from_declared(declared: &str) -> Option<Self> {
        match declared {
            "color" => Some(Self::Color),
            "number" => Some(Self::Number),
            "dimension" => Some(Self::Dimension),
            "string" => Some(Self::String),
            "boolean" => Some(Self::Boolean),
            _ => None,
        }
    }

    pub fn resolved_type(self) -> ResolvedType {
        match self {
            Self::Color => ResolvedType::Color,
            Self::Number | Self::Dimension => ResolvedType::Float,
            Self::String => ResolvedType::String,
            Self::Boolean => ResolvedType::Boolean,
        }
    }
}

/// Concrete leaf ready to become a variable.
#[derive(Clone, Debug, PartialEq)]
pub struct TokenLeaf {
    pub key: String,
    pub token_type: TokenType,
    pub raw: Value,
}

/// Leaf whose `$value` references another token.
#[derive(Clone, Debug, PartialEq)]
pub struct AliasToken {
    pub key: String,
    pub target_key: String,
    pub declared_type: Option<TokenType>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct FlattenedTokens {
    pub materialized: Vec<TokenLeaf>,
    pub deferred: Vec<AliasToken>,
    pub diagnostics: Vec<Diagnostic>,
}

pub fn parse_document(source: &str) -> Result<FlattenedTokens, TokenSyncError> {
    let document: Value =
        serde_json::from_str(source).map_err(|err| TokenSyncError::DocumentParse(err.to_string()))?;
    flatten_document(&document)
}

pub fn is_alias(value: &Value) -> bool {
    value
        .as_str()
        .is_some_and(|raw| raw.trim_start().starts_with('{'))
}

/// `{color.primary}` -> `color/primary`.
pub fn normalize_alias_target(raw: &str) -> String {
    raw.trim()
        .replace('.', "/")
        .chars()
        .filter(|ch| *ch != '{' && *ch != '}')
        .collect()
}

pub fn flatten_document(document: &Value) -> Result<FlattenedTokens, TokenSyncError> {
    let Some(root) = document.as_object() else {
        return Err(TokenSyncError::DocumentParse(
            "token document must be a JSON object".to_string(),
        ));
    };

    let document_type = declared_type(root);
    let mut flattened = FlattenedTokens::default();

    // Explicit stack of (key, node, inherited type); children are pushed in
    // reverse so leaves come out in document order.
    let mut stack: Vec<(String, &Value, Option<&str>)> = root
        .iter()
        .filter(|(key, _)| !is_metadata(key))
        .rev()
        .map(|(key, node)| (key.clone(), node, document_type))
        .collect();

    while let Some((key, node, inherited)) = stack.pop() {
        let Some(object) = node.as_object() else {
            flattened.diagnostics.push(
                Diagnostic::new(
                    "malformed_token",
                    Severity::Warning,
                    "expected a group or a token with $value",
                )
                .with_name(key),
            );
            continue;
        };

        let effective = declared_type(object).or(inherited);

        if let Some(value) = object.get(VALUE_FIELD) {
            classify_leaf(key, value, effective, &mut flattened);
            continue;
        }

        let children: Vec<_> = object
            .iter()
            .filter(|(child, _)| !is_metadata(child))
            .collect();
        for (child, child_node) in children.into_iter().rev() {
            stack.push((format!("{key}/{child}"), child_node, effective));
        }
    }

    Ok(flattened)
}

fn classify_leaf(key: String, value: &Value, declared: Option<&str>, out: &mut FlattenedTokens) {
    let token_type = declared.and_then(TokenType::from_declared);

    if is_alias(value) {
        let target_key = normalize_alias_target(value.as_str().unwrap_or_default());
        out.deferred.push(AliasToken {
            key,
            target_key,
            declared_type: token_type,
        });
        return;
    }

    match token_type {
        Some(token_type) => out.materialized.push(TokenLeaf {
            key,
            token_type,
            raw: value.clone(),
        }),
        None => {
            let error = ItemError::UnsupportedLeafType {
                token_type: declared.unwrap_or("<none>").to_string(),
            };
            tracing::debug!(key = %key, "dropping leaf: {error}");
            out.diagnostics.push(error.to_diagnostic().with_name(key));
        }
    }
}

fn declared_type(object: &Map<String, Value>) -> Option<&str> {
    object.get(TYPE_FIELD).and_then(Value::as_str)
}

fn is_metadata(key: &str) -> bool {
    key.starts_with(METADATA_SIGIL)
}
