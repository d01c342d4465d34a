use crate::{
    CanonicalValue, Diagnostic, ExportConfig, FetchStrategy, ItemError, Severity, TokenSyncError,
    css_file_name, css_property_name, normalize, render_css_value, render_json_value,
};
use futures::future::join_all;
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use tokensync_store::{
    Collection, CollectionId, Mode, ResolvedType, Variable, VariableId, VariableStore,
};

/// One rendered stylesheet.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ExportedFile {
    pub file_name: String,
    pub mode_name: String,
    pub body: String,
    /// blake3 hex digest of `body`.
    pub digest: String,
}

impl ExportedFile {
    fn new(mode_name: String, body: String) -> Self {
        Self {
            file_name: css_file_name(&mode_name),
            digest: blake3::hash(body.as_bytes()).to_hex().to_string(),
            mode_name,
            body,
        }
    }
}

struct CssDocument {
    file_name: String,
    mode_name: String,
    lines: Vec<String>,
    /// Property names already emitted.
    seen: HashSet<String>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ExportStats {
    /// (variable, mode) pairs considered.
    pub processed: usize,
    pub emitted: usize,
    pub excluded: usize,
    /// Missing values, duplicates and per-item failures.
    pub skipped: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CssExport {
    pub files: Vec<ExportedFile>,
    pub diagnostics: Vec<Diagnostic>,
    pub stats: ExportStats,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ExportedValue {
    #[serde(rename = "type")]
    pub value_type: String,
    pub value: Value,
}

/// collection name -> mode name -> variable name -> value.
pub type JsonCollections = BTreeMap<String, BTreeMap<String, BTreeMap<String, ExportedValue>>>;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct JsonExport {
    pub collections: JsonCollections,
    pub diagnostics: Vec<Diagnostic>,
    pub stats: ExportStats,
}

/// Distinct mode names across all collections, in enumeration order.
pub async fn available_modes(store: &dyn VariableStore) -> Result<Vec<String>, TokenSyncError> {
    let collections = store.list_collections().await?;
    let mut seen = HashSet::new();
    Ok(collections
        .iter()
        .flat_map(|collection| collection.modes.iter())
        .filter(|mode| seen.insert(mode.name.clone()))
        .map(|mode| mode.name.clone())
        .collect())
}

pub async fn export_css(
    store: &dyn VariableStore,
    config: &ExportConfig,
) -> Result<CssExport, TokenSyncError> {
    let Collected {
        entries,
        mut diagnostics,
        mut stats,
    } = collect(store, config).await?;

    // One document per output file; modes whose names share a slug merge into
    // the first one seen.
    let mut documents: Vec<CssDocument> = Vec::new();
    for entry in entries {
        let file_name = css_file_name(&entry.mode_name);
        let index = match documents
            .iter()
            .position(|document| document.file_name == file_name)
        {
            Some(index) => index,
            None => {
                documents.push(CssDocument {
                    file_name,
                    mode_name: entry.mode_name.clone(),
                    lines: Vec::new(),
                    seen: HashSet::new(),
                });
                documents.len() - 1
            }
        };
        let CssDocument { lines, seen, .. } = &mut documents[index];

        let property = css_property_name(&entry.variable.name);
        if !seen.insert(property.clone()) {
            stats.skipped += 1;
            diagnostics.push(entry.duplicate(&property));
            continue;
        }
        let rendered = render_css_value(&entry.variable.name, &entry.value, config);
        lines.push(format!("    {property}: {rendered};"));
        stats.emitted += 1;
    }

    let files: Vec<ExportedFile> = documents
        .into_iter()
        .filter(|document| !document.lines.is_empty())
        .map(|document| {
            let body = format!(":root {{\n{}\n}}\n", document.lines.join("\n"));
            ExportedFile::new(document.mode_name, body)
        })
        .collect();

    tracing::info!(
        files = files.len(),
        emitted = stats.emitted,
        excluded = stats.excluded,
        skipped = stats.skipped,
        "css export finished"
    );

    Ok(CssExport {
        files,
        diagnostics,
        stats,
    })
}

pub async fn export_json(
    store: &dyn VariableStore,
    config: &ExportConfig,
) -> Result<JsonExport, TokenSyncError> {
    let Collected {
        entries,
        mut diagnostics,
        mut stats,
    } = collect(store, config).await?;

    let mut collections = JsonCollections::new();
    for entry in entries {
        let document = collections
            .entry(entry.collection_name.clone())
            .or_default()
            .entry(entry.mode_name.clone())
            .or_default();
        if document.contains_key(&entry.variable.name) {
            stats.skipped += 1;
            diagnostics.push(entry.duplicate(&entry.variable.name));
            continue;
        }

        let value_type = exported_type(entry.variable.resolved_type, &entry.value);
        let value = render_json_value(&entry.variable.name, &entry.value, config);
        document.insert(
            entry.variable.name.clone(),
            ExportedValue { value_type, value },
        );
        stats.emitted += 1;
    }

    tracing::info!(
        collections = collections.len(),
        emitted = stats.emitted,
        excluded = stats.excluded,
        skipped = stats.skipped,
        "json export finished"
    );

    Ok(JsonExport {
        collections,
        diagnostics,
        stats,
    })
}

/// Variables fetched up front, keyed by id. Store changes made afterwards are
/// not observed.
#[derive(Clone, Debug, Default)]
pub struct VariableIndex {
    variables: HashMap<VariableId, Result<Variable, ItemError>>,
}

impl VariableIndex {
    /// Fetches every variable of `collections` concurrently.
    pub async fn prefetch(store: &dyn VariableStore, collections: &[Collection]) -> Self {
        let ids: Vec<&VariableId> = collections
            .iter()
            .flat_map(|collection| collection.variable_ids.iter())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let fetched = join_all(ids.iter().map(|id| fetch_live(store, id))).await;

        let variables: HashMap<_, _> = ids.into_iter().cloned().zip(fetched).collect();
        tracing::debug!(variables = variables.len(), "prefetched variable index");
        Self { variables }
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    fn get(&self, id: &VariableId) -> Result<Variable, ItemError> {
        self.variables
            .get(id)
            .cloned()
            .unwrap_or_else(|| Err(ItemError::VariableNotFound(id.clone())))
    }
}

async fn fetch_live(store: &dyn VariableStore, id: &VariableId) -> Result<Variable, ItemError> {
    match store.get_variable_by_id(id).await {
        Ok(Some(variable)) => Ok(variable),
        Ok(None) => Err(ItemError::VariableNotFound(id.clone())),
        Err(error) => Err(ItemError::from(error)),
    }
}

enum VariableSource<'a> {
    Live(&'a dyn VariableStore),
    Snapshot(VariableIndex),
}

/// Per-invocation variable lookup; each id is fetched at most once.
struct Lookup<'a> {
    source: VariableSource<'a>,
    collections: HashMap<CollectionId, Collection>,
    cache: HashMap<VariableId, Result<Variable, ItemError>>,
}

impl<'a> Lookup<'a> {
    async fn get(&mut self, id: &VariableId) -> Result<Variable, ItemError> {
        if let Some(cached) = self.cache.get(id) {
            return cached.clone();
        }
        let fetched = match &self.source {
            VariableSource::Live(store) => fetch_live(*store, id).await,
            VariableSource::Snapshot(index) => index.get(id),
        };
        self.cache.insert(id.clone(), fetched.clone());
        fetched
    }

    /// Follows the alias chain of `variable` in `mode` and returns the name
    /// of the first excluded variable on it.
    ///
    /// A hop into another collection continues in that collection's mode of
    /// the same name, or its default mode when it has none.
    async fn excluded_alias_target(
        &mut self,
        variable: &Variable,
        mode: &Mode,
        config: &ExportConfig,
    ) -> Option<String> {
        let mut visited = HashSet::from([variable.id.clone()]);
        let mut collection_id = variable.collection_id.clone();
        let mut mode_id = mode.mode_id.clone();
        let mut current = variable.value_for_mode(&mode_id)?.alias_target()?.clone();

        while visited.insert(current.clone()) {
            let target = self.get(&current).await.ok()?;
            if config.is_excluded(&target.name) {
                return Some(target.name);
            }
            if target.collection_id != collection_id {
                let collection = self.collections.get(&target.collection_id)?;
                mode_id = collection
                    .mode_by_name(&mode.name)
                    .or_else(|| collection.default_mode())?
                    .mode_id
                    .clone();
                collection_id = target.collection_id.clone();
            }
            current = target.value_for_mode(&mode_id)?.alias_target()?.clone();
        }
        None
    }
}

struct Entry {
    collection_name: String,
    mode_name: String,
    variable: Variable,
    value: CanonicalValue,
}

impl Entry {
    fn duplicate(&self, key: &str) -> Diagnostic {
        Diagnostic::new(
            "duplicate_output_key",
            Severity::Info,
            format!("'{key}' already emitted for this mode"),
        )
        .with_id(self.variable.id.clone())
        .with_name(self.variable.name.clone())
        .with_mode(self.mode_name.clone())
    }
}

struct Collected {
    entries: Vec<Entry>,
    diagnostics: Vec<Diagnostic>,
    stats: ExportStats,
}

/// Shared walk over collections x selected modes x variables.
async fn collect(
    store: &dyn VariableStore,
    config: &ExportConfig,
) -> Result<Collected, TokenSyncError> {
    let collections = store.list_collections().await?;
    let source = match config.strategy {
        FetchStrategy::Sequential => VariableSource::Live(store),
        FetchStrategy::Prefetch => {
            VariableSource::Snapshot(VariableIndex::prefetch(store, &collections).await)
        }
    };
    let mut lookup = Lookup {
        source,
        collections: collections
            .iter()
            .map(|collection| (collection.id.clone(), collection.clone()))
            .collect(),
        cache: HashMap::new(),
    };

    let mut collected = Collected {
        entries: Vec::new(),
        diagnostics: Vec::new(),
        stats: ExportStats::default(),
    };

    for collection in &collections {
        let modes: Vec<_> = collection
            .modes
            .iter()
            .filter(|mode| config.mode_selected(&mode.name))
            .collect();
        if modes.is_empty() {
            continue;
        }

        let mut variables = Vec::with_capacity(collection.variable_ids.len());
        for id in &collection.variable_ids {
            match lookup.get(id).await {
                Ok(variable) => variables.push(variable),
                Err(error) => {
                    tracing::warn!(variable_id = %id, "skipping variable: {error}");
                    collected.stats.skipped += 1;
                    collected.diagnostics.push(error.to_diagnostic().with_id(id.clone()));
                }
            }
        }

        for mode in modes {
            for variable in &variables {
                collected.stats.processed += 1;
                let info = |code: &str, reason: String| {
                    Diagnostic::new(code, Severity::Info, reason)
                        .with_id(variable.id.clone())
                        .with_name(variable.name.clone())
                        .with_mode(mode.name.clone())
                };

                if config.is_excluded(&variable.name) {
                    collected.stats.excluded += 1;
                    collected
                        .diagnostics
                        .push(info("excluded", "name matches an exclusion pattern".into()));
                    continue;
                }
                if let Some(target) = lookup
                    .excluded_alias_target(variable, mode, config)
                    .await
                {
                    collected.stats.excluded += 1;
                    collected
                        .diagnostics
                        .push(info("excluded", format!("aliases excluded variable '{target}'")));
                    continue;
                }

                let Some(raw) = variable.value_for_mode(&mode.mode_id) else {
                    collected.stats.skipped += 1;
                    collected
                        .diagnostics
                        .push(info("missing_mode_value", "no value for this mode".into()));
                    continue;
                };

                let value = match raw.alias_target() {
                    Some(target_id) => match lookup.get(target_id).await {
                        Ok(target) => Ok(CanonicalValue::AliasRef {
                            target_name: target.name,
                        }),
                        Err(_) => Err(ItemError::AliasTargetUnresolved {
                            target: target_id.clone(),
                        }),
                    },
                    None => normalize(variable, raw, config),
                };

                match value {
                    Ok(value) => collected.entries.push(Entry {
                        collection_name: collection.name.clone(),
                        mode_name: mode.name.clone(),
                        variable: variable.clone(),
                        value,
                    }),
                    Err(error) => {
                        tracing::warn!(
                            variable = %variable.name,
                            mode = %mode.name,
                            "skipping value: {error}"
                        );
                        collected.stats.skipped += 1;
                        collected.diagnostics.push(
                            error
                                .to_diagnostic()
                                .with_id(variable.id.clone())
                                .with_name(variable.name.clone())
                                .with_mode(mode.name.clone()),
                        );
                    }
                }
            }
        }
    }

    tracing::debug!(
        collections = collections.len(),
        processed = collected.stats.processed,
        "export walk finished"
    );
    Ok(collected)
}

fn exported_type(resolved_type: ResolvedType, value: &CanonicalValue) -> String {
    match value {
        CanonicalValue::AliasRef { .. } => "VARIABLE_ALIAS".to_string(),
        _ => resolved_type.to_string(),
    }
}
