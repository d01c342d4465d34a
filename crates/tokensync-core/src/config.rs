use crate::{ColorStyle, TokenSyncError};
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

const REGEX_PREFIX: &str = "re:";

#[derive(Clone, Debug)]
enum NamePattern {
    Substring(String),
    Regex(Regex),
}

/// Case-insensitive name matcher.
///
/// Entries are plain substrings unless prefixed with `re:`, in which case the
/// remainder is compiled as a case-insensitive regular expression.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct PatternSet {
    sources: Vec<String>,
    patterns: Vec<NamePattern>,
}

impl PatternSet {
    pub fn new<I, S>(entries: I) -> Result<Self, TokenSyncError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut sources = Vec::new();
        let mut patterns = Vec::new();
        for entry in entries {
            let entry = entry.into();
            let pattern = match entry.strip_prefix(REGEX_PREFIX) {
                Some(expression) => NamePattern::Regex(
                    RegexBuilder::new(expression)
                        .case_insensitive(true)
                        .build()
                        .map_err(|err| {
                            TokenSyncError::Config(format!("invalid pattern '{entry}': {err}"))
                        })?,
                ),
                None => NamePattern::Substring(entry.to_lowercase()),
            };
            sources.push(entry);
            patterns.push(pattern);
        }
        Ok(Self { sources, patterns })
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn matches(&self, name: &str) -> bool {
        let lowered = name.to_lowercase();
        self.patterns.iter().any(|pattern| match pattern {
            NamePattern::Substring(needle) => lowered.contains(needle.as_str()),
            NamePattern::Regex(regex) => regex.is_match(name),
        })
    }

    pub fn sources(&self) -> &[String] {
        &self.sources
    }
}

impl PartialEq for PatternSet {
    fn eq(&self, other: &Self) -> bool {
        self.sources == other.sources
    }
}

impl TryFrom<Vec<String>> for PatternSet {
    type Error = TokenSyncError;

    fn try_from(entries: Vec<String>) -> Result<Self, Self::Error> {
        Self::new(entries)
    }
}

impl From<PatternSet> for Vec<String> {
    fn from(set: PatternSet) -> Self {
        set.sources
    }
}

/// Literal pair used for BOOLEAN variables whose name matches `pattern`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BooleanRendering {
    pub pattern: PatternSet,
    pub true_text: String,
    pub false_text: String,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchStrategy {
    /// Fetch and process one variable at a time.
    #[default]
    Sequential,
    /// Fetch every variable concurrently into a snapshot, then process it.
    Prefetch,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Mode names to export; empty selects every mode.
    pub selected_modes: BTreeSet<String>,
    pub exclusion_patterns: PatternSet,
    pub unit_exempt_patterns: PatternSet,
    pub quoted_string_patterns: PatternSet,
    pub boolean_render_map: Vec<BooleanRendering>,
    pub alpha_zero_keyword: Option<String>,
    pub alpha_precision: usize,
    pub unit_suffix: String,
    /// Variable name -> literal output, applied after every other rendering rule.
    pub value_overrides: BTreeMap<String, String>,
    pub strategy: FetchStrategy,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            selected_modes: BTreeSet::new(),
            exclusion_patterns: default_patterns(&["internal"]),
            unit_exempt_patterns: default_patterns(&["weight", "bold", "regular", "visibility"]),
            quoted_string_patterns: default_patterns(&["family"]),
            boolean_render_map: Vec::new(),
            alpha_zero_keyword: None,
            alpha_precision: 4,
            unit_suffix: "px".to_string(),
            value_overrides: BTreeMap::new(),
            strategy: FetchStrategy::Sequential,
        }
    }
}

fn default_patterns(entries: &[&str]) -> PatternSet {
    PatternSet {
        sources: entries.iter().map(|entry| entry.to_string()).collect(),
        patterns: entries
            .iter()
            .map(|entry| NamePattern::Substring(entry.to_lowercase()))
            .collect(),
    }
}

impl ExportConfig {
    pub fn load(path: &Path) -> Result<Self, TokenSyncError> {
        let raw = std::fs::read_to_string(path).map_err(|err| {
            TokenSyncError::Config(format!("failed reading '{}': {err}", path.display()))
        })?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, TokenSyncError> {
        serde_json::from_str(raw).map_err(|err| TokenSyncError::Config(err.to_string()))
    }

    pub fn mode_selected(&self, mode_name: &str) -> bool {
        self.selected_modes.is_empty() || self.selected_modes.contains(mode_name)
    }

    pub fn is_excluded(&self, name: &str) -> bool {
        self.exclusion_patterns.matches(name)
    }

    pub fn boolean_rendering(&self, name: &str) -> Option<&BooleanRendering> {
        self.boolean_render_map
            .iter()
            .find(|rendering| rendering.pattern.matches(name))
    }

    pub fn color_style(&self) -> ColorStyle {
        ColorStyle {
            alpha_precision: self.alpha_precision,
            alpha_zero_keyword: self.alpha_zero_keyword.clone(),
        }
    }
}
