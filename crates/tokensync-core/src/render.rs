use crate::{CanonicalValue, ExportConfig, render_color};
use serde_json::{Number, Value};

/// `color/brand primary` -> `--color-brand-primary`.
pub fn css_property_name(name: &str) -> String {
    format!("--{}", kebab_path(name))
}

/// Lower-cased mode name with whitespace runs collapsed to `-`.
pub fn mode_slug(mode_name: &str) -> String {
    mode_name
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
}

pub fn css_file_name(mode_name: &str) -> String {
    format!("variables-{}.css", mode_slug(mode_name))
}

fn kebab_path(name: &str) -> String {
    name.replace('/', "-")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
}

pub fn render_css_value(name: &str, value: &CanonicalValue, config: &ExportConfig) -> String {
    if let Some(literal) = config.value_overrides.get(name) {
        return literal.clone();
    }

    match value {
        CanonicalValue::Color(color) => render_color(color, &config.color_style()),
        CanonicalValue::Number {
            value,
            unit_eligible,
        } => {
            if *unit_eligible {
                format!("{value}{}", config.unit_suffix)
            } else {
                value.to_string()
            }
        }
        CanonicalValue::Text { value } => {
            if config.quoted_string_patterns.matches(name) {
                format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
            } else {
                value.clone()
            }
        }
        CanonicalValue::Bool { value } => match config.boolean_rendering(name) {
            Some(rendering) if *value => rendering.true_text.clone(),
            Some(rendering) => rendering.false_text.clone(),
            None => value.to_string(),
        },
        CanonicalValue::AliasRef { target_name } => {
            format!("var({})", css_property_name(target_name))
        }
    }
}

/// Machine-readable form of a value; aliases use `{dotted.path}` token syntax.
pub fn render_json_value(name: &str, value: &CanonicalValue, config: &ExportConfig) -> Value {
    if let Some(literal) = config.value_overrides.get(name) {
        return Value::String(literal.clone());
    }

    match value {
        CanonicalValue::Color(color) => Value::String(render_color(color, &config.color_style())),
        CanonicalValue::Number { value, .. } => Number::from_f64(*value)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        CanonicalValue::Text { value } => Value::String(value.clone()),
        CanonicalValue::Bool { value } => Value::Bool(*value),
        CanonicalValue::AliasRef { target_name } => {
            Value::String(format!("{{{}}}", target_name.replace('/', ".")))
        }
    }
}
