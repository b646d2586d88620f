//! Integration tests for the merge engine and the end-to-end pipeline.
//!
//! The engine tests run against hand-written stores and sinks so that reads,
//! writes and staged blocks can be inspected and failures injected. The
//! pipeline tests run against local directories.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use tempfile::TempDir;

use drift::config::Config;
use drift::error::{MergeError, SinkError, StorageError};
use drift::merge::{MergeEngine, MergeOptions, MergeStrategy};
use drift::pipeline::{RunOutcome, run_merge};
use drift::sink::{BlockSink, RewriteSink};
use drift::source::SourceStore;
use drift::staging::{BlockDescriptor, BlockId};

// ============================================================================
// Fakes
// ============================================================================

/// Source store over an in-memory map that records every read.
#[derive(Default)]
struct RecordingStore {
    files: HashMap<String, Bytes>,
    reads: Mutex<Vec<String>>,
}

impl RecordingStore {
    fn with(files: &[(&str, &str)]) -> Self {
        Self {
            files: files
                .iter()
                .map(|(name, body)| (name.to_string(), Bytes::from(body.to_string())))
                .collect(),
            reads: Mutex::new(Vec::new()),
        }
    }

    fn reads(&self) -> Vec<String> {
        self.reads.lock().unwrap().clone()
    }
}

#[async_trait]
impl SourceStore for RecordingStore {
    async fn read(&self, source_ref: &str) -> Result<Bytes, StorageError> {
        self.reads.lock().unwrap().push(source_ref.to_string());
        self.files
            .get(source_ref)
            .cloned()
            .ok_or_else(|| StorageError::ObjectStore {
                source: object_store::Error::NotFound {
                    path: source_ref.to_string(),
                    source: "no such source".into(),
                },
            })
    }
}

fn injected_failure() -> SinkError {
    SinkError::SinkStorage {
        source: StorageError::ObjectStore {
            source: object_store::Error::Generic {
                store: "fake",
                source: "injected failure".into(),
            },
        },
    }
}

/// Destination keeping one object plus unordered staged blocks.
#[derive(Default)]
struct MemorySink {
    object: Option<Bytes>,
    blocks: HashMap<BlockId, Bytes>,
    staged: Vec<(BlockId, String)>,
    committed: Option<Vec<BlockId>>,
    writes: usize,
    read_backs: AtomicUsize,
    fail_on_write: Option<usize>,
    fail_on_stage: Option<usize>,
    fail_on_commit: bool,
}

impl MemorySink {
    fn content(&self) -> String {
        self.object
            .as_ref()
            .map(|b| String::from_utf8(b.to_vec()).unwrap())
            .unwrap_or_default()
    }

    fn touched(&self) -> bool {
        self.writes > 0 || !self.staged.is_empty() || self.committed.is_some()
    }
}

#[async_trait]
impl RewriteSink for MemorySink {
    async fn write_new(&mut self, data: Bytes) -> Result<(), SinkError> {
        if self.fail_on_write == Some(self.writes) {
            return Err(injected_failure());
        }
        self.writes += 1;
        self.object = Some(data);
        Ok(())
    }

    async fn read_all(&self) -> Result<Bytes, SinkError> {
        self.read_backs.fetch_add(1, Ordering::SeqCst);
        self.object.clone().ok_or_else(injected_failure)
    }
}

#[async_trait]
impl BlockSink for MemorySink {
    async fn stage_block(&mut self, block: BlockDescriptor) -> Result<(), SinkError> {
        if self.fail_on_stage == Some(self.staged.len()) {
            return Err(injected_failure());
        }
        self.staged.push((block.id, block.source_ref));
        self.blocks.insert(block.id, block.payload);
        Ok(())
    }

    async fn commit(&mut self, block_ids: &[BlockId]) -> Result<(), SinkError> {
        if self.fail_on_commit {
            return Err(injected_failure());
        }
        let mut out = Vec::new();
        for id in block_ids {
            let block = self.blocks.get(id).ok_or_else(|| SinkError::UnknownBlock {
                block_id: id.to_string(),
            })?;
            out.extend_from_slice(block);
        }
        self.object = Some(Bytes::from(out));
        self.committed = Some(block_ids.to_vec());
        Ok(())
    }
}

fn options(strategy: MergeStrategy) -> MergeOptions {
    MergeOptions {
        strategy,
        target: "merged.csv".to_string(),
        ..MergeOptions::default()
    }
}

fn names(sources: &[&str]) -> Vec<String> {
    sources.iter().map(|s| s.to_string()).collect()
}

const A_CSV: &str = "id,name\n1,a\n2,b\n";
const B_CSV: &str = "id,name\n3,c\n4,d\n5,e\n";
const MERGED_AB: &str = "id,name\n1,a\n2,b\n3,c\n4,d\n5,e\n";

async fn merge(
    strategy: MergeStrategy,
    store: &RecordingStore,
    sources: &[&str],
) -> (Result<drift::MergeSummary, MergeError>, MemorySink) {
    let mut sink = MemorySink::default();
    let result = MergeEngine::new(options(strategy))
        .run(store, &names(sources), &mut sink)
        .await;
    (result, sink)
}

// ============================================================================
// Engine behaviour
// ============================================================================

#[tokio::test]
async fn test_both_strategies_produce_same_output() {
    let store = RecordingStore::with(&[("a.csv", A_CSV), ("b.csv", B_CSV)]);

    let (rewrite, rewrite_sink) = merge(MergeStrategy::AppendRewrite, &store, &["a.csv", "b.csv"]).await;
    let (staged, staged_sink) = merge(MergeStrategy::Staged, &store, &["a.csv", "b.csv"]).await;

    let rewrite = rewrite.unwrap();
    let staged = staged.unwrap();
    assert_eq!(rewrite_sink.content(), MERGED_AB);
    assert_eq!(staged_sink.content(), MERGED_AB);
    assert_eq!(rewrite.total_rows, 5);
    assert_eq!(staged.total_rows, 5);
    assert_eq!(rewrite.files_processed, 2);
    assert_eq!(staged.files_processed, 2);
    assert_eq!(staged.blocks_committed, 2);
}

#[tokio::test]
async fn test_header_appears_once_and_rows_keep_order() {
    let store = RecordingStore::with(&[
        ("1.csv", "v\n1\n2\n"),
        ("2.csv", "v\n3\n"),
        ("3.csv", "v\n4\n5\n6\n"),
    ]);

    for strategy in [MergeStrategy::AppendRewrite, MergeStrategy::Staged] {
        let (summary, sink) = merge(strategy, &store, &["1.csv", "2.csv", "3.csv"]).await;
        assert_eq!(summary.unwrap().total_rows, 6);
        assert_eq!(sink.content(), "v\n1\n2\n3\n4\n5\n6\n", "strategy: {strategy}");
        assert_eq!(sink.content().matches('v').count(), 1);
    }
}

#[tokio::test]
async fn test_chunk_bound_does_not_change_rewrite_output() {
    let store = RecordingStore::with(&[("a.csv", A_CSV), ("b.csv", B_CSV)]);
    let sources = names(&["a.csv", "b.csv"]);

    let mut outputs = Vec::new();
    for chunk_size in [1, 1_000_000] {
        let mut sink = MemorySink::default();
        let summary = MergeEngine::new(MergeOptions {
            chunk_size,
            ..options(MergeStrategy::AppendRewrite)
        })
        .append_rewrite(&store, &sources, &mut sink)
        .await
        .unwrap();
        outputs.push((summary, sink));
    }

    let (small, small_sink) = &outputs[0];
    let (large, large_sink) = &outputs[1];
    assert_eq!(small_sink.object, large_sink.object);
    assert_eq!(small.rewrites, 5);
    assert_eq!(large.rewrites, 2);
    assert_eq!(small.total_rows, large.total_rows);
    assert!(small.bytes_written > large.bytes_written);
}

#[tokio::test]
async fn test_rewrite_reads_back_before_every_later_write() {
    let store = RecordingStore::with(&[("a.csv", A_CSV)]);
    let mut sink = MemorySink::default();

    MergeEngine::new(MergeOptions {
        chunk_size: 1,
        ..options(MergeStrategy::AppendRewrite)
    })
    .append_rewrite(&store, &names(&["a.csv"]), &mut sink)
    .await
    .unwrap();

    assert_eq!(sink.writes, 2);
    assert_eq!(sink.read_backs.load(Ordering::SeqCst), 1);
    assert_eq!(sink.content(), "id,name\n1,a\n2,b\n");
}

#[tokio::test]
async fn test_empty_source_list_writes_nothing() {
    let store = RecordingStore::default();

    for strategy in [MergeStrategy::AppendRewrite, MergeStrategy::Staged] {
        let (summary, sink) = merge(strategy, &store, &[]).await;
        let summary = summary.unwrap();
        assert_eq!(summary.total_rows, 0);
        assert_eq!(summary.files_processed, 0);
        assert!(!sink.touched(), "strategy: {strategy}");
        assert!(sink.object.is_none());
    }
}

#[tokio::test]
async fn test_corrupt_source_aborts_before_later_sources() {
    let files = [
        ("good.csv", "id,name\n1,a\n"),
        ("corrupt.csv", "id,name\n2,b\n3\n"),
        ("good2.csv", "id,name\n4,d\n"),
    ];
    let sources = ["good.csv", "corrupt.csv", "good2.csv"];

    let store = RecordingStore::with(&files);
    let (result, sink) = merge(MergeStrategy::AppendRewrite, &store, &sources).await;
    let err = result.unwrap_err();
    assert!(matches!(err, MergeError::Decode { .. }));
    assert!(err.to_string().contains("corrupt.csv"));
    assert_eq!(store.reads(), vec!["good.csv", "corrupt.csv"]);
    assert!(!sink.content().contains("4,d"));

    let store = RecordingStore::with(&files);
    let (result, sink) = merge(MergeStrategy::Staged, &store, &sources).await;
    assert!(matches!(result.unwrap_err(), MergeError::Decode { .. }));
    assert_eq!(store.reads(), vec!["good.csv", "corrupt.csv"]);
    assert_eq!(sink.staged.len(), 1);
    assert!(sink.committed.is_none());
}

#[tokio::test]
async fn test_missing_source_is_a_read_error() {
    let store = RecordingStore::with(&[("a.csv", A_CSV)]);
    let (result, sink) = merge(MergeStrategy::Staged, &store, &["a.csv", "gone.csv"]).await;

    match result.unwrap_err() {
        MergeError::SourceRead { source_ref, source } => {
            assert_eq!(source_ref, "gone.csv");
            assert!(source.is_not_found());
        }
        other => panic!("expected SourceRead, got {other:?}"),
    }
    assert!(sink.committed.is_none());
}

#[tokio::test]
async fn test_write_failure_is_surfaced() {
    let store = RecordingStore::with(&[("a.csv", A_CSV), ("b.csv", B_CSV)]);
    let mut sink = MemorySink {
        fail_on_write: Some(1),
        ..MemorySink::default()
    };

    let err = MergeEngine::new(options(MergeStrategy::AppendRewrite))
        .run(&store, &names(&["a.csv", "b.csv"]), &mut sink)
        .await
        .unwrap_err();

    assert!(matches!(err, MergeError::Write { .. }));
    assert_eq!(sink.content(), A_CSV);
}

#[tokio::test]
async fn test_tagging_adds_source_column_to_every_row() {
    let store = RecordingStore::with(&[("in/a.csv", A_CSV), ("in/b.csv", "id,name\n3,c\n")]);
    let sources = names(&["in/a.csv", "in/b.csv"]);

    for strategy in [MergeStrategy::AppendRewrite, MergeStrategy::Staged] {
        let mut sink = MemorySink::default();
        MergeEngine::new(MergeOptions {
            tag_column: Some("source_file".to_string()),
            chunk_size: 1,
            ..options(strategy)
        })
        .run(&store, &sources, &mut sink)
        .await
        .unwrap();

        assert_eq!(
            sink.content(),
            "id,name,source_file\n1,a,in/a.csv\n2,b,in/a.csv\n3,c,in/b.csv\n",
            "strategy: {strategy}"
        );
    }
}

#[tokio::test]
async fn test_no_tag_column_when_disabled() {
    let store = RecordingStore::with(&[("a.csv", A_CSV)]);
    let (_, sink) = merge(MergeStrategy::Staged, &store, &["a.csv"]).await;
    assert!(!sink.content().contains("source_file"));
    assert!(!sink.content().contains("a.csv"));
}

#[tokio::test]
async fn test_staged_ids_follow_processing_order() {
    let store = RecordingStore::with(&[
        ("z.csv", "k\nz\n"),
        ("a.csv", "k\na\n"),
        ("m.csv", "k\nm\n"),
    ]);
    let (summary, sink) = merge(MergeStrategy::Staged, &store, &["z.csv", "a.csv", "m.csv"]).await;
    summary.unwrap();

    let ids: Vec<BlockId> = sink.staged.iter().map(|(id, _)| *id).collect();
    assert!(ids.windows(2).all(|pair| pair[0] < pair[1]));
    let staged_sources: Vec<&str> = sink.staged.iter().map(|(_, s)| s.as_str()).collect();
    assert_eq!(staged_sources, vec!["z.csv", "a.csv", "m.csv"]);
    assert_eq!(sink.committed.as_deref(), Some(ids.as_slice()));
    assert_eq!(sink.content(), "k\nz\na\nm\n");
}

#[tokio::test]
async fn test_empty_first_source_takes_header_from_next() {
    let store = RecordingStore::with(&[
        ("empty.csv", "id,name\n"),
        ("a.csv", A_CSV),
    ]);

    for strategy in [MergeStrategy::AppendRewrite, MergeStrategy::Staged] {
        let (summary, sink) = merge(strategy, &store, &["empty.csv", "a.csv"]).await;
        let summary = summary.unwrap();
        assert_eq!(summary.files_processed, 2);
        assert_eq!(summary.total_rows, 2);
        assert_eq!(sink.content(), A_CSV, "strategy: {strategy}");
    }

    let (summary, sink) = merge(MergeStrategy::Staged, &store, &["empty.csv", "a.csv"]).await;
    assert_eq!(summary.unwrap().blocks_committed, 1);
    assert_eq!(sink.staged.len(), 1);
}

#[tokio::test]
async fn test_all_sources_empty() {
    let store = RecordingStore::with(&[("e1.csv", "id\n"), ("e2.csv", "id\r\n")]);

    let (summary, sink) = merge(MergeStrategy::AppendRewrite, &store, &["e1.csv", "e2.csv"]).await;
    assert_eq!(summary.unwrap().rewrites, 0);
    assert!(sink.object.is_none());

    let (summary, sink) = merge(MergeStrategy::Staged, &store, &["e1.csv", "e2.csv"]).await;
    assert_eq!(summary.unwrap().blocks_committed, 0);
    assert_eq!(sink.committed, Some(Vec::new()));
    assert_eq!(sink.content(), "");
}

#[tokio::test]
async fn test_zero_byte_source_aborts_merge() {
    let store = RecordingStore::with(&[("a.csv", A_CSV), ("empty.csv", ""), ("b.csv", B_CSV)]);

    for strategy in [MergeStrategy::AppendRewrite, MergeStrategy::Staged] {
        let (result, sink) = merge(strategy, &store, &["a.csv", "empty.csv", "b.csv"]).await;
        let err = result.unwrap_err();
        assert!(
            matches!(err, MergeError::Decode { .. }),
            "strategy: {strategy}, got {err:?}"
        );
        assert!(err.to_string().contains("empty.csv"));
        assert!(!sink.content().contains("3,c"));
        assert!(sink.committed.is_none());
    }
    assert!(!store.reads().contains(&"b.csv".to_string()));
}

#[tokio::test]
async fn test_stage_failure_aborts_before_later_sources() {
    let store = RecordingStore::with(&[("a.csv", A_CSV), ("b.csv", B_CSV), ("c.csv", "id,name\n6,f\n")]);
    let mut sink = MemorySink {
        fail_on_stage: Some(1),
        ..MemorySink::default()
    };

    let err = MergeEngine::new(options(MergeStrategy::Staged))
        .run(&store, &names(&["a.csv", "b.csv", "c.csv"]), &mut sink)
        .await
        .unwrap_err();

    match err {
        MergeError::Stage { source_ref, .. } => assert_eq!(source_ref, "b.csv"),
        other => panic!("expected Stage, got {other:?}"),
    }
    assert_eq!(store.reads(), vec!["a.csv", "b.csv"]);
    assert_eq!(sink.staged.len(), 1);
    assert!(sink.committed.is_none());
    assert!(sink.object.is_none());
}

#[tokio::test]
async fn test_commit_failure_leaves_staged_blocks() {
    let store = RecordingStore::with(&[("a.csv", A_CSV), ("b.csv", B_CSV)]);
    let mut sink = MemorySink {
        fail_on_commit: true,
        ..MemorySink::default()
    };

    let err = MergeEngine::new(options(MergeStrategy::Staged))
        .run(&store, &names(&["a.csv", "b.csv"]), &mut sink)
        .await
        .unwrap_err();

    match err {
        MergeError::Commit { block_count, .. } => assert_eq!(block_count, 2),
        other => panic!("expected Commit, got {other:?}"),
    }
    assert_eq!(sink.staged.len(), 2);
    assert_eq!(sink.blocks.len(), 2);
    assert!(sink.committed.is_none());
    assert!(sink.object.is_none());
}

// ============================================================================
// Pipeline
// ============================================================================

fn write_sources(dir: &TempDir, files: &[(&str, &str)]) {
    for (name, body) in files {
        let path = dir.path().join(name);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, body).unwrap();
    }
}

fn pipeline_config(source: &TempDir, sink: &TempDir, merge: &str) -> Config {
    let yaml = format!(
        "source:\n  path: \"{}\"\nsink:\n  path: \"{}\"\n  object_name: out/merged.csv\n{merge}",
        source.path().display(),
        sink.path().display(),
    );
    Config::parse(&yaml).unwrap()
}

#[tokio::test]
async fn test_pipeline_merges_local_directory() {
    let source = TempDir::new().unwrap();
    let sink = TempDir::new().unwrap();
    write_sources(&source, &[("b.csv", B_CSV), ("a.csv", A_CSV), ("notes.txt", "skip")]);

    for merge in [
        "merge:\n  strategy: staged\n",
        "merge:\n  strategy: append_rewrite\n  chunk_size: 2\n",
    ] {
        let config = pipeline_config(&source, &sink, merge);
        let outcome = run_merge(&config, false).await.unwrap();

        match outcome {
            RunOutcome::Merged(summary) => {
                assert_eq!(summary.files_processed, 2);
                assert_eq!(summary.total_rows, 5);
            }
            other => panic!("expected Merged, got {other:?}"),
        }
        let merged = std::fs::read_to_string(sink.path().join("out/merged.csv")).unwrap();
        assert_eq!(merged, MERGED_AB, "config: {merge}");
    }

    assert!(!sink.path().join("_drift_staging/out/merged.csv/0000000000.block").exists());
}

#[tokio::test]
async fn test_pipeline_prefix_and_tagging() {
    let source = TempDir::new().unwrap();
    let sink = TempDir::new().unwrap();
    write_sources(
        &source,
        &[("daily/a.csv", A_CSV), ("monthly/m.csv", "id,name\n9,z\n")],
    );

    let mut config = pipeline_config(
        &source,
        &sink,
        "merge:\n  include_source_filename: true\n",
    );
    config.source.prefix = Some("daily/".to_string());

    run_merge(&config, false).await.unwrap();
    let merged = std::fs::read_to_string(sink.path().join("out/merged.csv")).unwrap();
    assert_eq!(
        merged,
        "id,name,source_file\n1,a,daily/a.csv\n2,b,daily/a.csv\n"
    );
}

#[tokio::test]
async fn test_pipeline_dry_run_writes_nothing() {
    let source = TempDir::new().unwrap();
    let sink = TempDir::new().unwrap();
    write_sources(&source, &[("a.csv", A_CSV)]);

    let config = pipeline_config(&source, &sink, "");
    let outcome = run_merge(&config, true).await.unwrap();

    assert_eq!(
        outcome,
        RunOutcome::DryRun {
            files: vec!["a.csv".to_string()]
        }
    );
    assert!(!sink.path().join("out/merged.csv").exists());
}

#[tokio::test]
async fn test_pipeline_without_sources_succeeds() {
    let source = TempDir::new().unwrap();
    let sink = TempDir::new().unwrap();

    let config = pipeline_config(&source, &sink, "");
    let outcome = run_merge(&config, false).await.unwrap();

    assert_eq!(outcome, RunOutcome::NoSources);
    assert!(!sink.path().join("out/merged.csv").exists());
}

#[tokio::test]
async fn test_pipeline_rejects_invalid_sink_url() {
    let source = TempDir::new().unwrap();
    let mut config = Config::parse("source:\n  path: /tmp\nsink:\n  path: /tmp\n").unwrap();
    config.source.path = source.path().display().to_string();
    config.sink.path = "ftp://nowhere/merged".to_string();

    let err = run_merge(&config, false).await.unwrap_err();
    assert!(matches!(err, drift::PipelineError::Storage { .. }));
}
