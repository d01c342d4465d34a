use crate::{ExportConfig, ItemError};
use serde::Serialize;
use tokensync_store::{Color, ResolvedType, Variable, VariableValue};

/// Format-agnostic value of one variable in one mode.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CanonicalValue {
    Color(Color),
    Number { value: f64, unit_eligible: bool },
    Text { value: String },
    Bool { value: bool },
    AliasRef { target_name: String },
}

/// Normalizes a concrete (non-alias) mode value of `variable`.
///
/// Alias values are resolved by the exporter, which has access to the store.
pub fn normalize(
    variable: &Variable,
    value: &VariableValue,
    config: &ExportConfig,
) -> Result<CanonicalValue, ItemError> {
    let mismatch = || ItemError::ValueShapeMismatch {
        expected: variable.resolved_type.to_string(),
        found: describe(value).to_string(),
    };

    match (variable.resolved_type, value) {
        (_, VariableValue::Alias { .. }) => Err(mismatch()),
        (ResolvedType::Color, VariableValue::Color(color)) => Ok(CanonicalValue::Color(*color)),
        (ResolvedType::Color, VariableValue::String(raw)) => {
            crate::parse_color(raw).map(CanonicalValue::Color)
        }
        (ResolvedType::Float, VariableValue::Float(number)) => {
            number_value(&variable.name, *number, &number.to_string(), config)
        }
        (ResolvedType::Float, VariableValue::String(raw)) => {
            let number =
                parse_float_prefix(raw).ok_or_else(|| ItemError::InvalidNumber(raw.clone()))?;
            number_value(&variable.name, number, raw, config)
        }
        (ResolvedType::String, VariableValue::String(text)) => Ok(CanonicalValue::Text {
            value: text.clone(),
        }),
        (ResolvedType::Boolean, VariableValue::Boolean(flag)) => {
            Ok(CanonicalValue::Bool { value: *flag })
        }
        _ => Err(mismatch()),
    }
}

fn number_value(
    name: &str,
    number: f64,
    raw: &str,
    config: &ExportConfig,
) -> Result<CanonicalValue, ItemError> {
    if !number.is_finite() {
        return Err(ItemError::InvalidNumber(raw.to_string()));
    }
    Ok(CanonicalValue::Number {
        value: number,
        unit_eligible: !config.unit_exempt_patterns.matches(name),
    })
}

/// Leading float of `raw` (`"12px"` -> 12).
pub fn parse_float_prefix(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    let end = trimmed
        .char_indices()
        .take_while(|(index, ch)| {
            ch.is_ascii_digit() || *ch == '.' || (*index == 0 && (*ch == '-' || *ch == '+'))
        })
        .map(|(index, ch)| index + ch.len_utf8())
        .last()?;
    trimmed[..end].parse::<f64>().ok()
}

fn describe(value: &VariableValue) -> &'static str {
    match value {
        VariableValue::Color(_) => "COLOR",
        VariableValue::Float(_) => "FLOAT",
        VariableValue::String(_) => "STRING",
        VariableValue::Boolean(_) => "BOOLEAN",
        VariableValue::Alias { .. } => "VARIABLE_ALIAS",
    }
}
