//! End-to-end merge run: storage setup, discovery and the merge itself.

use std::sync::Arc;

use snafu::prelude::*;
use tracing::info;

use drift_core::StorageProvider;

use crate::config::Config;
use crate::error::{DestinationUnreachableSnafu, PipelineError};
use crate::merge::{MergeEngine, MergeSummary};
use crate::sink::ObjectSink;
use crate::source::list_csv_files;

/// What a run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Nothing matched at the source; the destination was not touched.
    NoSources,
    /// Sources were listed but nothing was written.
    DryRun { files: Vec<String> },
    /// Sources were merged into the destination.
    Merged(MergeSummary),
}

/// Run one merge as configured.
///
/// The destination is checked for reachability before any source is read,
/// so credential and URL problems fail the run before it does any work.
pub async fn run_merge(config: &Config, dry_run: bool) -> Result<RunOutcome, PipelineError> {
    let target = config.sink.object_name.as_str();

    let source_storage = StorageProvider::for_url_with_options(
        &config.source.path,
        config.source.storage_options.clone(),
    )
    .await?;
    let sink_storage = Arc::new(
        StorageProvider::for_url_with_options(
            &config.sink.path,
            config.sink.storage_options.clone(),
        )
        .await?,
    );

    sink_storage
        .check_reachable()
        .await
        .context(DestinationUnreachableSnafu {
            url: sink_storage.url(),
        })?;
    info!(target = %target, "Destination {} is reachable", sink_storage.url());

    let files = list_csv_files(&source_storage, config.source.prefix.as_deref(), target).await?;

    if files.is_empty() {
        info!(target = %target, "No CSV files found under {}", source_storage.url());
        return Ok(RunOutcome::NoSources);
    }

    if dry_run {
        info!(
            target = %target,
            "Dry run: {} file(s) would be merged into {}/{}",
            files.len(),
            sink_storage.url(),
            target
        );
        return Ok(RunOutcome::DryRun { files });
    }

    let mut sink = ObjectSink::new(Arc::clone(&sink_storage), target);
    info!(
        target = %target,
        "Writing to {}/{} ({} block staging)",
        sink_storage.url(),
        target,
        if sink.uses_native_blocks() { "native" } else { "emulated" }
    );

    let summary = MergeEngine::new(config.merge_options())
        .run(&source_storage, &files, &mut sink)
        .await?;

    Ok(RunOutcome::Merged(summary))
}

/// Log the closing banner for a run.
pub fn log_outcome(config: &Config, outcome: &RunOutcome) {
    let target = config.sink.object_name.as_str();
    match outcome {
        RunOutcome::NoSources => {
            info!(target = %target, "Finished: no files merged");
        }
        RunOutcome::DryRun { files } => {
            info!(target = %target, "Finished dry run: {} file(s) listed", files.len());
        }
        RunOutcome::Merged(summary) => {
            info!(target = %target, "========================================");
            info!(target = %target, "Merge completed ({} strategy)", summary.strategy);
            info!(target = %target, "  Files processed: {}", summary.files_processed);
            info!(target = %target, "  Total rows:      {}", summary.total_rows);
            if summary.rewrites > 0 {
                info!(target = %target, "  Rewrites:        {}", summary.rewrites);
            }
            if summary.blocks_committed > 0 {
                info!(target = %target, "  Blocks:          {}", summary.blocks_committed);
            }
            info!(target = %target, "  Bytes sent:      {}", summary.bytes_written);
            info!(
                target = %target,
                "  Output:          {}/{}",
                config.sink.path.trim_end_matches('/'),
                target
            );
            info!(target = %target, "========================================");
        }
    }
}
