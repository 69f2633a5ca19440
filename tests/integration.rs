//! End-to-end tests for the fixture runner
//!
//! These run the real runner against the in-process mock node:
//! 1. Staging fixture files and program blobs in a temp directory
//! 2. Running reset, deploy, send and check phases
//! 3. Verifying the reported outcome and the calls the node received

use std::fs;
use std::path::PathBuf;

use gear_fixtures::chain::{AccountId, Chain, MockNode};
use gear_fixtures::common::config::{Config, StorageLayout};
use gear_fixtures::runner::{RunOptions, RunSummary, Runner};

const SUDO: AccountId = AccountId([0xd4; 32]);

/// Test context with a staging directory
struct TestContext {
    /// Holds staged fixtures and program blobs
    temp_dir: tempfile::TempDir,
    /// Path to the checked-in fixtures
    fixtures_dir: PathBuf,
}

impl TestContext {
    fn new() -> Self {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        fs::write(temp_dir.path().join("program.wasm"), b"\0asm\x01\0\0\0").expect("Failed to write program");

        let manifest_dir = env!("CARGO_MANIFEST_DIR");
        let fixtures_dir = PathBuf::from(manifest_dir).join("tests").join("fixtures");

        Self {
            temp_dir,
            fixtures_dir,
        }
    }

    /// Copy a fixture file next to the program blob
    fn stage(&self, name: &str) -> PathBuf {
        let target = self.temp_dir.path().join(name);
        fs::copy(self.fixtures_dir.join(name), &target)
            .unwrap_or_else(|e| panic!("Failed to stage fixture {}: {}", name, e));
        target
    }
}

fn config(layout: StorageLayout) -> Config {
    let mut config = Config::default();
    config.storage = layout;
    config.polling.interval_ms = 0;
    config.polling.max_attempts = Some(50);
    config
}

fn options(fail_fast: bool) -> RunOptions {
    RunOptions {
        fail_fast,
        verbose: false,
    }
}

async fn run(
    node: MockNode,
    config: Config,
    options: RunOptions,
    files: &[PathBuf],
) -> (RunSummary, MockNode) {
    let mut runner = Runner::new(node, config, options);
    let summary = runner.run_files(files).await.expect("Run failed");
    (summary, runner.into_chain())
}

#[tokio::test]
async fn test_init_then_i32_scenario_passes() {
    let ctx = TestContext::new();
    let file = ctx.stage("init_then_i32.json");
    let node = MockNode::new(StorageLayout::default(), SUDO).unwrap();

    let (summary, node) = run(node, config(StorageLayout::default()), options(true), &[file]).await;

    assert!(summary.success(), "{:?}", summary);
    assert_eq!(summary.fixtures_passed, 1);

    let queued = node.queued().unwrap();
    assert_eq!(queued.len(), 1);
    assert_eq!(queued[0].payload, 42i32.to_le_bytes().to_vec());
    assert_eq!(queued[0].destination, node.programs()[0]);
}

#[tokio::test]
async fn test_limit_written_only_when_it_differs() {
    let ctx = TestContext::new();
    let file = ctx.stage("init_then_i32.json");
    let node = MockNode::new(StorageLayout::default(), SUDO).unwrap();

    let (_, node) = run(node, config(StorageLayout::default()), options(true), &[file]).await;

    // Only the write made before sending; the checker finds the limit in place
    assert_eq!(node.storage_writes(b"g::msg::limit"), 1);
}

#[tokio::test]
async fn test_each_step_moves_the_limit_once() {
    let ctx = TestContext::new();
    let file = ctx.stage("two_steps.json");
    let node = MockNode::new(StorageLayout::default(), SUDO).unwrap();

    let (summary, mut node) = run(node, config(StorageLayout::default()), options(true), &[file]).await;

    assert!(summary.success(), "{:?}", summary);
    assert_eq!(node.storage_writes(b"g::msg::limit"), 2);
    assert_eq!(node.dequeue_limit().await.unwrap(), Some(2));
    assert_eq!(node.messages_processed().await.unwrap(), Some(2));
}

#[tokio::test]
async fn test_fail_fast_stops_at_first_failure() {
    let ctx = TestContext::new();
    let failing = ctx.stage("failing_then_passing.json");
    let passing = ctx.stage("init_then_i32.json");
    let node = MockNode::new(StorageLayout::default(), SUDO).unwrap();

    let (summary, node) = run(
        node,
        config(StorageLayout::default()),
        options(true),
        &[failing, passing],
    )
    .await;

    assert!(!summary.success());
    assert!(summary.stopped_early);
    assert_eq!(summary.fixtures_failed, 1);
    assert_eq!(summary.fixtures_passed, 0);
    // The second fixture never deployed anything
    assert_eq!(node.programs().len(), 1);
}

#[tokio::test]
async fn test_keep_going_runs_every_fixture() {
    let ctx = TestContext::new();
    let failing = ctx.stage("failing_then_passing.json");
    let passing = ctx.stage("init_then_i32.json");
    let node = MockNode::new(StorageLayout::default(), SUDO).unwrap();

    let (summary, node) = run(
        node,
        config(StorageLayout::default()),
        options(false),
        &[failing, passing],
    )
    .await;

    assert!(!summary.success());
    assert!(!summary.stopped_early);
    assert_eq!(summary.fixtures_failed, 1);
    assert_eq!(summary.fixtures_passed, 2);
    assert_eq!(node.programs().len(), 3);
}

#[tokio::test]
async fn test_salt_changes_program_address_per_fixture() {
    let ctx = TestContext::new();
    let file = ctx.stage("failing_then_passing.json");
    let node = MockNode::new(StorageLayout::default(), SUDO).unwrap();

    let (_, node) = run(node, config(StorageLayout::default()), options(false), &[file]).await;

    let programs = node.programs();
    assert_eq!(programs.len(), 2);
    assert_ne!(programs[0], programs[1]);
}

#[tokio::test]
async fn test_shared_memory_regions() {
    let ctx = TestContext::new();
    let file = ctx.stage("shared_memory.yaml");

    // Keep the snapshot outside the prefix wiped by the reset
    let layout = StorageLayout {
        shared_memory: "mem::shared".to_string(),
        ..StorageLayout::default()
    };
    let mut node = MockNode::new(layout.clone(), SUDO).unwrap();
    let mut memory = vec![0u8; 64];
    memory[16..20].copy_from_slice(&[0xde, 0xad, 0xbe, 0xef]);
    node.set_shared_memory(memory).unwrap();

    let (summary, _) = run(node, config(layout), options(false), &[file]).await;

    assert_eq!(summary.fixtures_passed, 1);
    assert_eq!(summary.fixtures_failed, 1);
}

#[tokio::test]
async fn test_missing_memory_snapshot_is_a_mismatch() {
    let ctx = TestContext::new();
    let file = ctx.stage("shared_memory.yaml");
    let node = MockNode::new(StorageLayout::default(), SUDO).unwrap();

    let (summary, _) = run(node, config(StorageLayout::default()), options(false), &[file]).await;

    assert_eq!(summary.fixtures_passed, 0);
    assert_eq!(summary.fixtures_failed, 2);
}

#[tokio::test]
async fn test_unparsable_files_are_skipped() {
    let ctx = TestContext::new();
    let truncated = ctx.stage("truncated.json");
    let no_step = ctx.stage("no_step.json");
    let missing = ctx.temp_dir.path().join("missing.json");
    let passing = ctx.stage("init_then_i32.json");
    let node = MockNode::new(StorageLayout::default(), SUDO).unwrap();

    let (summary, node) = run(
        node,
        config(StorageLayout::default()),
        options(true),
        &[truncated, no_step, missing, passing],
    )
    .await;

    assert_eq!(summary.files, 4);
    assert_eq!(summary.parse_failures, 3);
    assert_eq!(summary.fixtures_passed, 1);
    assert!(!summary.success());
    assert_eq!(node.programs().len(), 1);
}

#[tokio::test]
async fn test_calls_are_signed_by_sudo() {
    let ctx = TestContext::new();
    let file = ctx.stage("init_then_i32.json");
    let node = MockNode::new(StorageLayout::default(), SUDO).unwrap();

    let (_, node) = run(node, config(StorageLayout::default()), options(true), &[file]).await;

    let names: Vec<_> = node.submitted().iter().map(|(_, call)| call.name()).collect();
    assert_eq!(
        names,
        vec!["sudo.sudo", "utility.batch", "sudo.sudo", "utility.batch"]
    );
    assert!(node.submitted().iter().all(|(signer, _)| *signer == SUDO));
}

#[tokio::test]
async fn test_unreachable_step_exhausts_polling() {
    let ctx = TestContext::new();
    let file = ctx.stage("init_then_i32.json");
    let mut node = MockNode::new(StorageLayout::default(), SUDO).unwrap();
    node.set_paused(true);

    let mut runner = Runner::new(node, config(StorageLayout::default()), options(true));
    let err = runner.run_files(&[file]).await.unwrap_err();
    assert!(matches!(err, gear_fixtures::Error::PollExhausted { .. }));
}
