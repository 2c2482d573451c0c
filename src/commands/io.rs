//! Import and export command handlers.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use themeport::config::PorterConfig;
use themeport::io::{
    Conflict, ExportKind, ExportService, ImportPreview, ImportService, ImportSession, Resolution,
    ResolutionEntry, Selection,
};
use themeport::storage::ContentStore;
use themeport::{Error, Result};

/// Maximum number of warnings or errors listed before truncating.
const LIST_LIMIT: usize = 10;

/// Executes the export command.
pub fn cmd_export(
    store: Arc<dyn ContentStore>,
    config: &PorterConfig,
    kind: &str,
    ids: Vec<String>,
    output: Option<PathBuf>,
) -> Result<()> {
    let kind = kind.parse::<ExportKind>()?;
    let selection = Selection::from_kind(kind, ids)?;
    let service = ExportService::new(store);

    let (bundle, path) = match output {
        Some(path) if !path.is_dir() => {
            let bundle = service.export_to_file(&selection, &path)?;
            (bundle, path)
        },
        Some(dir) => service.export_to_dir(&selection, &dir)?,
        None => service.export_to_dir(&selection, &config.export_dir)?,
    };

    println!("Export completed:");
    println!("  Kind:          {kind}");
    println!("  Themes:        {}", bundle.metadata.total_themes);
    println!("  Theme groups:  {}", bundle.metadata.total_theme_groups);
    println!("  Extracts:      {}", bundle.metadata.total_extracts);
    println!("  Output:        {}", path.display());

    Ok(())
}

/// Executes the preview command.
pub fn cmd_preview(store: Arc<dyn ContentStore>, file: &Path) -> Result<()> {
    let data = read_file(file)?;
    let preview = ImportService::new(store).preview_import(&data)?;
    print_preview(&preview);
    Ok(())
}

/// Executes the import command.
///
/// Every conflict is first resolved with `on_conflict`; entries from the
/// resolutions file then override individual conflicts.
pub fn cmd_import(
    store: Arc<dyn ContentStore>,
    file: &Path,
    resolutions: Option<PathBuf>,
    on_conflict: &str,
) -> Result<()> {
    let default = on_conflict.parse::<Resolution>()?;
    let overrides = match resolutions {
        Some(path) => read_resolutions(&path)?,
        None => Vec::new(),
    };

    let session = ImportSession::new(Arc::new(ImportService::new(store)));
    let preview = session.upload(read_file(file)?)?;
    print_preview(&preview);

    session.resolve_all(default)?;
    for entry in &overrides {
        if let Err(e) =
            session.set_resolution(entry.conflict_type, &entry.original_id, entry.resolution)
        {
            println!("  Ignoring resolution: {e}");
        }
    }
    if preview.summary.conflicts_count > 0 {
        session.review_conflicts()?;
    }

    let result = session.execute()?;

    println!();
    println!("Import completed:");
    println!("  Themes created:       {}", result.created_themes);
    println!("  Theme groups created: {}", result.created_theme_groups);
    println!("  Extracts created:     {}", result.created_extracts);
    println!("  Skipped:              {}", result.skipped_items);

    let errors: Vec<String> = result.errors.iter().map(ToString::to_string).collect();
    print_list("Errors", &errors);

    Ok(())
}

fn read_file(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|e| Error::OperationFailed {
        operation: "read_snapshot_file".to_string(),
        cause: format!("{}: {e}", path.display()),
    })
}

/// Reads a JSON array of resolution entries.
fn read_resolutions(path: &Path) -> Result<Vec<ResolutionEntry>> {
    let data = std::fs::read(path).map_err(|e| Error::OperationFailed {
        operation: "read_resolutions_file".to_string(),
        cause: format!("{}: {e}", path.display()),
    })?;
    serde_json::from_slice(&data)
        .map_err(|e| Error::InvalidInput(format!("invalid resolutions file: {e}")))
}

fn print_preview(preview: &ImportPreview) {
    println!("Snapshot contents:");
    println!("  Themes:        {}", preview.summary.total_themes);
    println!("  Theme groups:  {}", preview.summary.total_theme_groups);
    println!("  Extracts:      {}", preview.summary.total_extracts);
    println!("  Conflicts:     {}", preview.summary.conflicts_count);

    let conflicts: Vec<String> = preview.conflicts.iter().map(describe_conflict).collect();
    print_list("Conflicts", &conflicts);
    print_list("Warnings", &preview.warnings);
}

fn describe_conflict(conflict: &Conflict) -> String {
    format!(
        "{} '{}' ({}) matches existing {} ({} extracts)",
        conflict.conflict_type,
        conflict.imported_item.name,
        conflict.imported_item.id,
        conflict.existing_item.id,
        conflict.existing_item.extract_count
    )
}

fn print_list(title: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    println!();
    println!("{title} ({}):", items.len());
    for item in items.iter().take(LIST_LIMIT) {
        println!("  - {item}");
    }
    if items.len() > LIST_LIMIT {
        println!("  ... and {} more", items.len() - LIST_LIMIT);
    }
}
