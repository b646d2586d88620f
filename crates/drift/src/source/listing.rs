//! Source discovery.

use tracing::info;

use drift_core::emit;
use drift_core::metrics::events::FilesDiscovered;
use drift_core::storage::StorageProvider;

use crate::error::StorageError;

/// File extension for CSV sources.
pub const CSV_EXTENSION: &str = ".csv";

/// List CSV files under the storage root, narrowed by an optional prefix.
///
/// Matching on the `.csv` suffix is case-insensitive. Returns paths relative
/// to the storage root, sorted lexicographically. An empty prefix lists
/// everything.
pub async fn list_csv_files(
    storage: &StorageProvider,
    prefix: Option<&str>,
    target: &str,
) -> Result<Vec<String>, StorageError> {
    let prefix = prefix.filter(|p| !p.is_empty());
    let files = storage
        .list_files_with_extension(prefix, CSV_EXTENSION)
        .await?;

    for file in &files {
        info!(target = %target, file = %file, "Found CSV file");
    }
    info!(
        target = %target,
        "Found {} file(s) matching '{}' under {}{}",
        files.len(),
        CSV_EXTENSION,
        storage.url(),
        prefix.map(|p| format!(" with prefix '{p}'")).unwrap_or_default()
    );

    emit!(FilesDiscovered {
        count: files.len() as u64,
        target: target.to_string(),
    });

    Ok(files)
}
