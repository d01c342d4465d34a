use serde_json::json;
use tokensync_core::{
    ExportConfig, FetchStrategy, ImportOptions, ImportTarget, PatternSet, Severity,
    TokenSyncError, export_css, export_json, import_document,
};
use tokensync_store::{
    Collection, CollectionId, Color, CreatedCollection, FsVariableStore, MemoryVariableStore,
    ResolvedType, Variable, VariableId, VariableStore, VariableStoreError, VariableStoreResult,
    VariableValue, VariableWriter,
};

fn config_with(strategy: FetchStrategy) -> ExportConfig {
    ExportConfig {
        strategy,
        ..ExportConfig::default()
    }
}

async fn import_into(store: &MemoryVariableStore, document: serde_json::Value) -> CollectionId {
    let report = import_document(store, &document, &ImportOptions::new_collection("Tokens"))
        .await
        .expect("import should succeed");
    report.collection_id
}

#[tokio::test(flavor = "current_thread")]
async fn import_then_export_css_numbers_expected_units_except_exempt_names() {
    let store = MemoryVariableStore::new();
    import_into(
        &store,
        json!({
            "spacing": {"$type": "number", "small": {"$value": 8}},
            "font": {"weight": {"$type": "number", "bold": {"$value": 700}}}
        }),
    )
    .await;

    let export = export_css(&store, &ExportConfig::default())
        .await
        .expect("export should succeed");

    assert_eq!(export.files.len(), 1);
    assert_eq!(
        export.files[0].body,
        ":root {\n    --spacing-small: 8px;\n    --font-weight-bold: 700;\n}\n"
    );
}

#[tokio::test(flavor = "current_thread")]
async fn export_css_alias_to_excluded_variable_expected_no_dangling_reference() {
    let store = MemoryVariableStore::new();
    import_into(
        &store,
        json!({
            "internal": {"$type": "color", "ux-token": {"$value": "#123456"}},
            "button": {
                "$type": "color",
                "bg": {"$value": "{internal.ux-token}"},
                "hover": {"$value": "{button.bg}"},
                "text": {"$value": "#ffffff"}
            }
        }),
    )
    .await;
    let config = ExportConfig {
        exclusion_patterns: PatternSet::new(["ux"]).expect("patterns should compile"),
        ..ExportConfig::default()
    };

    let export = export_css(&store, &config)
        .await
        .expect("export should succeed");

    let body = &export.files[0].body;
    assert_eq!(body, ":root {\n    --button-text: #ffffff;\n}\n");
    assert!(!body.contains("var(--internal-ux-token)"));
    assert_eq!(export.stats.excluded, 3);
    assert!(
        export
            .diagnostics
            .iter()
            .all(|diagnostic| diagnostic.code == "excluded" && diagnostic.severity == Severity::Info)
    );
}

#[tokio::test(flavor = "current_thread")]
async fn export_css_repeated_runs_expected_identical_under_both_strategies() {
    let store = MemoryVariableStore::new();
    import_into(
        &store,
        json!({
            "color": {
                "$type": "color",
                "red": {"$value": "rgba(255, 0, 0, 0.5)"},
                "danger": {"$value": "{color.red}"}
            },
            "font": {"family": {"$type": "string", "body": {"$value": "Inter"}}},
            "flag": {"$type": "boolean", "beta": {"$value": true}}
        }),
    )
    .await;

    let sequential = config_with(FetchStrategy::Sequential);
    let prefetch = config_with(FetchStrategy::Prefetch);
    let first = export_css(&store, &sequential).await.expect("export should succeed");
    let second = export_css(&store, &sequential).await.expect("export should succeed");
    let third = export_css(&store, &prefetch).await.expect("export should succeed");
    let fourth = export_css(&store, &prefetch).await.expect("export should succeed");

    assert_eq!(first, second);
    assert_eq!(third, fourth);
    assert_eq!(first, third);
    assert_eq!(
        first.files[0].body,
        ":root {\n    --color-red: rgba(255, 0, 0, 0.5000);\n    --font-family-body: \"Inter\";\n    --flag-beta: true;\n    --color-danger: var(--color-red);\n}\n"
    );
}

#[tokio::test(flavor = "current_thread")]
async fn import_alias_chain_listed_backwards_expected_resolution_order() {
    let store = MemoryVariableStore::new();
    let report = import_document(
        &store,
        &json!({
            "size": {
                "$type": "dimension",
                "lg": {"$value": "{size.md}"},
                "md": {"$value": "{size.sm}"},
                "sm": {"$value": "{size.base}"},
                "base": {"$value": "4px"}
            }
        }),
        &ImportOptions::new_collection("Sizes"),
    )
    .await
    .expect("import should succeed");

    let keys: Vec<_> = report.imported.iter().map(|item| item.key.as_str()).collect();
    assert_eq!(keys, vec!["size/base", "size/sm", "size/md", "size/lg"]);
    assert_eq!(report.rounds, 3);
    assert!(report.diagnostics.is_empty());

    let export = export_css(&store, &ExportConfig::default())
        .await
        .expect("export should succeed");
    assert_eq!(
        export.files[0].body,
        ":root {\n    --size-base: 4px;\n    --size-sm: var(--size-base);\n    --size-md: var(--size-sm);\n    --size-lg: var(--size-md);\n}\n"
    );
}

#[tokio::test(flavor = "current_thread")]
async fn import_alias_cycle_expected_diagnostics_and_remaining_tokens_created() {
    let store = MemoryVariableStore::new();
    let report = import_document(
        &store,
        &json!({
            "$type": "number",
            "a": {"$value": "{b}"},
            "b": {"$value": "{a}"},
            "c": {"$value": 4},
            "d": {"$value": "twelve"}
        }),
        &ImportOptions::new_collection("Loops"),
    )
    .await
    .expect("import should succeed");

    let keys: Vec<_> = report.imported.iter().map(|item| item.key.as_str()).collect();
    assert_eq!(keys, vec!["c"]);
    let codes: Vec<_> = report
        .diagnostics
        .iter()
        .map(|diagnostic| diagnostic.code.as_str())
        .collect();
    assert_eq!(
        codes,
        vec!["invalid_number", "alias_target_unresolved", "alias_target_unresolved"]
    );
}

#[tokio::test(flavor = "current_thread")]
async fn import_existing_mode_expected_second_stylesheet_and_reused_variables() {
    let store = MemoryVariableStore::new();
    let light = import_document(
        &store,
        &json!({
            "color": {
                "$type": "color",
                "bg": {"$value": "#ffffff"},
                "fg": {"$value": "{color.bg}"}
            }
        }),
        &ImportOptions {
            target: ImportTarget::NewCollection {
                name: "Theme".to_string(),
                mode_name: Some("Light".to_string()),
            },
        },
    )
    .await
    .expect("light import should succeed");

    let dark = import_document(
        &store,
        &json!({
            "color": {
                "$type": "color",
                "bg": {"$value": "hsl(0, 0%, 0%)"},
                "fg": {"$value": "{color.bg}"}
            }
        }),
        &ImportOptions::existing_mode(light.collection_id.clone(), "Dark Mode"),
    )
    .await
    .expect("dark import should succeed");

    assert_eq!(dark.collection_id, light.collection_id);
    assert_ne!(dark.mode_id, light.mode_id);
    assert!(dark.imported.iter().all(|item| !item.created));
    assert_eq!(dark.imported[1].alias_of.as_deref(), Some("color/bg"));

    let export = export_css(&store, &ExportConfig::default())
        .await
        .expect("export should succeed");
    let files: Vec<_> = export
        .files
        .iter()
        .map(|file| (file.file_name.as_str(), file.body.as_str()))
        .collect();
    assert_eq!(
        files,
        vec![
            (
                "variables-light.css",
                ":root {\n    --color-bg: #ffffff;\n    --color-fg: var(--color-bg);\n}\n"
            ),
            (
                "variables-dark-mode.css",
                ":root {\n    --color-bg: #000000;\n    --color-fg: var(--color-bg);\n}\n"
            ),
        ]
    );
}

#[tokio::test(flavor = "current_thread")]
async fn import_existing_mode_type_change_expected_value_shape_mismatch() {
    let store = MemoryVariableStore::new();
    let collection_id = import_into(
        &store,
        json!({"radius": {"$type": "number", "card": {"$value": 4}}}),
    )
    .await;

    let report = import_document(
        &store,
        &json!({"radius": {"$type": "string", "card": {"$value": "round"}}}),
        &ImportOptions::existing_mode(collection_id, "Alt"),
    )
    .await
    .expect("import should succeed");

    assert!(report.imported.is_empty());
    assert_eq!(report.diagnostics.len(), 1);
    assert_eq!(report.diagnostics[0].code, "value_shape_mismatch");
}

#[tokio::test(flavor = "current_thread")]
async fn export_json_expected_nested_by_collection_and_mode() {
    let store = MemoryVariableStore::new();
    import_into(
        &store,
        json!({
            "color": {
                "$type": "color",
                "brand": {"$value": "#16CB7F"},
                "link": {"$value": "{color.brand}"}
            },
            "spacing": {"$type": "dimension", "md": {"$value": "16px"}}
        }),
    )
    .await;

    let export = export_json(&store, &ExportConfig::default())
        .await
        .expect("export should succeed");

    let rendered = serde_json::to_value(&export.collections).expect("export should serialize");
    assert_eq!(
        rendered,
        json!({
            "Tokens": {
                "Mode 1": {
                    "color/brand": {"type": "COLOR", "value": "#16cb7f"},
                    "color/link": {"type": "VARIABLE_ALIAS", "value": "{color.brand}"},
                    "spacing/md": {"type": "FLOAT", "value": 16.0}
                }
            }
        })
    );
    assert_eq!(export.stats.emitted, 3);
}

#[tokio::test(flavor = "current_thread")]
async fn fs_store_import_then_reopen_expected_same_export() {
    let temp = tempfile::tempdir().expect("tempdir should be created");
    let document = json!({"spacing": {"$type": "number", "lg": {"$value": 24}}});

    let before = {
        let store = FsVariableStore::new(temp.path()).expect("fs store should open");
        import_document(&store, &document, &ImportOptions::new_collection("Tokens"))
            .await
            .expect("import should succeed");
        export_css(&store, &ExportConfig::default())
            .await
            .expect("export should succeed")
    };

    let reopened = FsVariableStore::new(temp.path()).expect("fs store should reopen");
    let after = export_css(&reopened, &ExportConfig::default())
        .await
        .expect("export should succeed");

    assert_eq!(before, after);
    assert_eq!(after.files[0].body, ":root {\n    --spacing-lg: 24px;\n}\n");
}

/// Delegates to a memory store but can fail listing or a single variable read.
struct FlakyStore {
    inner: MemoryVariableStore,
    fail_listing: bool,
    broken_variable: Option<VariableId>,
}

#[async_trait::async_trait]
impl VariableStore for FlakyStore {
    async fn list_collections(&self) -> VariableStoreResult<Vec<Collection>> {
        if self.fail_listing {
            return Err(VariableStoreError::Backend("listing unavailable".to_string()));
        }
        self.inner.list_collections().await
    }

    async fn get_collection_by_id(&self, id: &CollectionId) -> VariableStoreResult<Collection> {
        self.inner.get_collection_by_id(id).await
    }

    async fn get_variable_by_id(&self, id: &VariableId) -> VariableStoreResult<Option<Variable>> {
        if self.broken_variable.as_ref() == Some(id) {
            return Err(VariableStoreError::Backend("read timed out".to_string()));
        }
        self.inner.get_variable_by_id(id).await
    }
}

#[tokio::test(flavor = "current_thread")]
async fn export_css_listing_failure_expected_fatal_store_error() {
    let store = FlakyStore {
        inner: MemoryVariableStore::new(),
        fail_listing: true,
        broken_variable: None,
    };

    let error = export_css(&store, &ExportConfig::default())
        .await
        .expect_err("listing failure should abort the export");

    assert!(matches!(
        error,
        TokenSyncError::Store(VariableStoreError::Backend(_))
    ));
}

#[tokio::test(flavor = "current_thread")]
async fn export_css_single_read_failure_expected_error_diagnostic_and_partial_output() {
    let inner = MemoryVariableStore::new();
    import_into(
        &inner,
        json!({
            "$type": "number",
            "gap": {"$value": 4},
            "pad": {"$value": 8}
        }),
    )
    .await;

    for strategy in [FetchStrategy::Sequential, FetchStrategy::Prefetch] {
        let store = FlakyStore {
            inner: inner.clone(),
            fail_listing: false,
            broken_variable: Some("VariableID:1".to_string()),
        };

        let export = export_css(&store, &config_with(strategy))
            .await
            .expect("export should succeed");

        assert_eq!(export.files[0].body, ":root {\n    --pad: 8px;\n}\n");
        assert_eq!(export.diagnostics.len(), 1);
        assert_eq!(export.diagnostics[0].code, "store_failure");
        assert!(export.diagnostics[0].is_error());
        assert_eq!(export.stats.skipped, 1);
    }
}

async fn collection_with_mode(
    store: &MemoryVariableStore,
    name: &str,
    mode: &str,
) -> CreatedCollection {
    let created = store
        .create_collection(name)
        .await
        .expect("collection should be created");
    store
        .rename_mode(&created.collection_id, &created.default_mode_id, mode)
        .await
        .expect("mode should be renamed");
    created
}

async fn put_variable(
    store: &MemoryVariableStore,
    collection: &CreatedCollection,
    name: &str,
    resolved_type: ResolvedType,
    value: VariableValue,
) -> VariableId {
    let id = store
        .create_variable(name, &collection.collection_id, resolved_type)
        .await
        .expect("variable should be created");
    store
        .set_value_for_mode(&id, &collection.default_mode_id, value)
        .await
        .expect("value should be set");
    id
}

#[tokio::test(flavor = "current_thread")]
async fn export_css_alias_across_collections_to_excluded_chain_expected_dropped() {
    let store = MemoryVariableStore::new();
    let primitives = collection_with_mode(&store, "Primitives", "Base").await;
    let semantic = collection_with_mode(&store, "Semantic", "Light").await;

    let hidden = put_variable(
        &store,
        &primitives,
        "internal/ux-token",
        ResolvedType::Color,
        VariableValue::Color(Color::rgb(0.0, 0.0, 1.0)),
    )
    .await;
    let brand = put_variable(
        &store,
        &primitives,
        "brand/primary",
        ResolvedType::Color,
        VariableValue::alias(hidden),
    )
    .await;
    put_variable(
        &store,
        &semantic,
        "button/bg",
        ResolvedType::Color,
        VariableValue::alias(brand),
    )
    .await;
    put_variable(
        &store,
        &semantic,
        "button/text",
        ResolvedType::Color,
        VariableValue::Color(Color::rgb(1.0, 1.0, 1.0)),
    )
    .await;

    for strategy in [FetchStrategy::Sequential, FetchStrategy::Prefetch] {
        let config = ExportConfig {
            exclusion_patterns: PatternSet::new(["ux"]).expect("patterns should compile"),
            strategy,
            ..ExportConfig::default()
        };

        let export = export_css(&store, &config)
            .await
            .expect("export should succeed");

        let files: Vec<_> = export
            .files
            .iter()
            .map(|file| (file.file_name.as_str(), file.body.as_str()))
            .collect();
        assert_eq!(
            files,
            vec![("variables-light.css", ":root {\n    --button-text: #ffffff;\n}\n")]
        );
        assert_eq!(export.stats.excluded, 3);
    }
}

#[tokio::test(flavor = "current_thread")]
async fn export_css_colliding_property_names_expected_first_value_wins() {
    let store = MemoryVariableStore::new();
    let first = store
        .create_collection("Spacing")
        .await
        .expect("collection should be created");
    let second = store
        .create_collection("Overrides")
        .await
        .expect("collection should be created");
    put_variable(&store, &first, "a/b", ResolvedType::Float, VariableValue::Float(1.0)).await;
    put_variable(&store, &first, "a b", ResolvedType::Float, VariableValue::Float(2.0)).await;
    put_variable(&store, &second, "a/b", ResolvedType::Float, VariableValue::Float(3.0)).await;

    let export = export_css(&store, &ExportConfig::default())
        .await
        .expect("export should succeed");

    assert_eq!(export.files.len(), 1);
    assert_eq!(export.files[0].body, ":root {\n    --a-b: 1px;\n}\n");
    assert_eq!(export.stats.emitted, 1);
    assert_eq!(export.stats.skipped, 2);
    let duplicates: Vec<_> = export
        .diagnostics
        .iter()
        .map(|diagnostic| {
            (
                diagnostic.code.as_str(),
                diagnostic.severity,
                diagnostic.name.as_deref(),
            )
        })
        .collect();
    assert_eq!(
        duplicates,
        vec![
            ("duplicate_output_key", Severity::Info, Some("a b")),
            ("duplicate_output_key", Severity::Info, Some("a/b")),
        ]
    );
}

#[tokio::test(flavor = "current_thread")]
async fn export_css_modes_sharing_a_slug_expected_single_merged_file() {
    let store = MemoryVariableStore::new();
    let first = collection_with_mode(&store, "Theme", "Dark Mode").await;
    let second = collection_with_mode(&store, "Brand", "dark  mode").await;
    put_variable(&store, &first, "x", ResolvedType::Float, VariableValue::Float(1.0)).await;
    put_variable(&store, &second, "y", ResolvedType::Float, VariableValue::Float(2.0)).await;
    put_variable(&store, &second, "x", ResolvedType::Float, VariableValue::Float(9.0)).await;

    let export = export_css(&store, &ExportConfig::default())
        .await
        .expect("export should succeed");

    assert_eq!(export.files.len(), 1);
    let file = &export.files[0];
    assert_eq!(file.file_name, "variables-dark-mode.css");
    assert_eq!(file.mode_name, "Dark Mode");
    assert_eq!(file.body, ":root {\n    --x: 1px;\n    --y: 2px;\n}\n");
    assert_eq!(export.stats.skipped, 1);
}
