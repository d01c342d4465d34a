use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

/// One skipped or failed item: a token on import, a variable/mode pair on export.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub code: String,
    pub severity: Severity,
    pub reason: String,
    pub id: Option<String>,
    pub name: Option<String>,
    pub mode: Option<String>,
}

impl Diagnostic {
    pub fn new(code: impl Into<String>, severity: Severity, reason: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            severity,
            reason: reason.into(),
            id: None,
            name: None,
            mode: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_mode(mut self, mode: impl Into<String>) -> Self {
        self.mode = Some(mode.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let severity = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
        };
        write!(f, "{severity}[{}]", self.code)?;
        if let Some(name) = &self.name {
            write!(f, " {name}")?;
        }
        if let Some(id) = &self.id {
            write!(f, " ({id})")?;
        }
        if let Some(mode) = &self.mode {
            write!(f, " mode={mode}")?;
        }
        write!(f, ": {}", self.reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostic_display_all_fields_expected_single_line() {
        let diagnostic = Diagnostic::new("invalid_number", Severity::Warning, "value is NaN")
            .with_id("VariableID:4")
            .with_name("spacing/small")
            .with_mode("Dark");

        assert_eq!(
            diagnostic.to_string(),
            "warning[invalid_number] spacing/small (VariableID:4) mode=Dark: value is NaN"
        );
        assert!(!diagnostic.is_error());
    }
}
