use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tokensync_core::{
    Diagnostic, ExportConfig, FetchStrategy, ImportOptions, ImportTarget, available_modes,
    export_css, export_json, import_str,
};
use tokensync_store::FsVariableStore;

const JSON_EXPORT_FILE: &str = "variables.json";

#[derive(Parser, Debug)]
#[command(name = "tokensync")]
#[command(about = "Import design tokens into variables and export them as CSS or JSON")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    Import(ImportArgs),
    Export(ExportArgs),
    Modes(ModesArgs),
}

#[derive(clap::Args, Debug)]
struct ImportArgs {
    #[arg(long)]
    store: PathBuf,
    #[arg(long)]
    file: PathBuf,
    /// Name of the collection to create.
    #[arg(long, default_value = "Tokens", conflicts_with = "into")]
    collection: String,
    /// Existing collection id to import into; requires --mode.
    #[arg(long, requires = "mode")]
    into: Option<String>,
    #[arg(long)]
    mode: Option<String>,
    #[arg(long, action = ArgAction::SetTrue)]
    json: bool,
}

#[derive(clap::Args, Debug)]
struct ExportArgs {
    #[arg(long)]
    store: PathBuf,
    #[arg(long)]
    out: PathBuf,
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long, value_enum, default_value_t = ExportFormat::Css)]
    format: ExportFormat,
    /// Mode names to export; repeatable. Overrides the config selection.
    #[arg(long = "mode")]
    modes: Vec<String>,
    #[arg(long, action = ArgAction::SetTrue)]
    prefetch: bool,
    #[arg(long, action = ArgAction::SetTrue)]
    json: bool,
}

#[derive(clap::Args, Debug)]
struct ModesArgs {
    #[arg(long)]
    store: PathBuf,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ExportFormat {
    Css,
    Json,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Import(args) => import_command(args).await,
        Commands::Export(args) => export_command(args).await,
        Commands::Modes(args) => modes_command(args).await,
    };

    match result {
        Ok(code) => code,
        Err(error) => {
            eprintln!("error: {error}");
            ExitCode::from(1)
        }
    }
}

async fn import_command(args: ImportArgs) -> Result<ExitCode, String> {
    let store = open_store(&args.store)?;
    let source = std::fs::read_to_string(&args.file)
        .map_err(|e| format!("failed reading token file '{}': {e}", args.file.display()))?;

    let target = match (args.into, args.mode) {
        (Some(collection_id), Some(mode_name)) => ImportTarget::ExistingMode {
            collection_id,
            mode_name,
        },
        (Some(_), None) => return Err("--into requires --mode".to_string()),
        (None, mode_name) => ImportTarget::NewCollection {
            name: args.collection,
            mode_name,
        },
    };

    let report = import_str(&store, &source, &ImportOptions { target })
        .await
        .map_err(|error| error.to_string())?;

    if args.json {
        let json = serde_json::to_string_pretty(&report).map_err(|e| e.to_string())?;
        println!("{json}");
    } else {
        println!("collection_id: {}", report.collection_id);
        println!("mode_id: {}", report.mode_id);
        println!("imported: {}", report.imported.len());
        println!("alias_rounds: {}", report.rounds);
        print_diagnostics(&report.diagnostics);
    }
    Ok(exit_code_for(&report.diagnostics))
}

async fn export_command(args: ExportArgs) -> Result<ExitCode, String> {
    let store = open_store(&args.store)?;
    let mut config = match args.config.as_deref() {
        Some(path) => ExportConfig::load(path).map_err(|error| error.to_string())?,
        None => ExportConfig::default(),
    };
    if !args.modes.is_empty() {
        config.selected_modes = args.modes.into_iter().collect();
    }
    if args.prefetch {
        config.strategy = FetchStrategy::Prefetch;
    }

    std::fs::create_dir_all(&args.out)
        .map_err(|e| format!("failed creating '{}': {e}", args.out.display()))?;

    let (written, diagnostics, summary) = match args.format {
        ExportFormat::Css => {
            let export = export_css(&store, &config)
                .await
                .map_err(|error| error.to_string())?;
            let mut written = Vec::new();
            for file in &export.files {
                let path = args.out.join(&file.file_name);
                write_output(&path, &file.body)?;
                tracing::debug!(path = %path.display(), digest = %file.digest, "wrote stylesheet");
                written.push(json!({
                    "path": path.display().to_string(),
                    "mode": file.mode_name,
                    "digest": file.digest,
                }));
            }
            (written, export.diagnostics, json!(export.stats))
        }
        ExportFormat::Json => {
            let export = export_json(&store, &config)
                .await
                .map_err(|error| error.to_string())?;
            let body =
                serde_json::to_string_pretty(&export.collections).map_err(|e| e.to_string())?;
            let path = args.out.join(JSON_EXPORT_FILE);
            write_output(&path, &body)?;
            let written = vec![json!({"path": path.display().to_string()})];
            (written, export.diagnostics, json!(export.stats))
        }
    };

    if args.json {
        let report = json!({
            "files": written,
            "stats": summary,
            "diagnostics": diagnostics,
        });
        let json = serde_json::to_string_pretty(&report).map_err(|e| e.to_string())?;
        println!("{json}");
    } else {
        for file in &written {
            if let Some(path) = file.get("path").and_then(serde_json::Value::as_str) {
                println!("wrote: {path}");
            }
        }
        println!("stats: {summary}");
        print_diagnostics(&diagnostics);
    }
    Ok(exit_code_for(&diagnostics))
}

async fn modes_command(args: ModesArgs) -> Result<ExitCode, String> {
    let store = open_store(&args.store)?;
    let modes = available_modes(&store)
        .await
        .map_err(|error| error.to_string())?;
    for mode in modes {
        println!("{mode}");
    }
    Ok(ExitCode::SUCCESS)
}

fn open_store(root: &Path) -> Result<FsVariableStore, String> {
    FsVariableStore::new(root)
        .map_err(|e| format!("failed opening variable store '{}': {e}", root.display()))
}

fn write_output(path: &Path, body: &str) -> Result<(), String> {
    std::fs::write(path, body).map_err(|e| format!("failed writing '{}': {e}", path.display()))
}

fn print_diagnostics(diagnostics: &[Diagnostic]) {
    for diagnostic in diagnostics {
        eprintln!("{diagnostic}");
    }
}

fn exit_code_for(diagnostics: &[Diagnostic]) -> ExitCode {
    if diagnostics.iter().any(Diagnostic::is_error) {
        ExitCode::from(2)
    } else {
        ExitCode::SUCCESS
    }
}
