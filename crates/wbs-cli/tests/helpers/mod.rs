#![allow(dead_code)]

use assert_cmd::Command;
use serde_json::Value;
use std::path::PathBuf;
use tempfile::TempDir;

/// Test harness for running CLI commands with temporary databases
pub struct CliTestHarness {
    temp_dir: TempDir,
    db_path: PathBuf,
}

impl CliTestHarness {
    /// Create a new test harness with a temporary database
    pub fn new() -> Self {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
        let db_path = temp_dir.path().join("test.db");

        Self { temp_dir, db_path }
    }

    /// Get a Command instance configured for testing
    pub fn command(&self) -> Command {
        let mut cmd = Command::cargo_bin("wbs").expect("Failed to find wbs binary");

        // Run from the temp dir so no stray wbs.toml is picked up
        cmd.current_dir(self.temp_dir.path());
        cmd.env("WBS_DATABASE_PATH", &self.db_path);
        cmd.env_remove("RUST_LOG");

        cmd
    }

    /// Get the database path for this test instance
    pub fn db_path(&self) -> &std::path::Path {
        &self.db_path
    }

    /// Helper to run a command and assert success
    pub fn run_success(&self, args: &[&str]) -> assert_cmd::assert::Assert {
        self.command().args(args).assert().success()
    }

    /// Helper to run a command and assert failure
    pub fn run_failure(&self, args: &[&str]) -> assert_cmd::assert::Assert {
        self.command().args(args).assert().failure()
    }

    /// The project's tree as printed by `list --json`
    pub fn tree_json(&self, project: &str) -> Value {
        let output = self
            .command()
            .args(["list", "-p", project, "--json"])
            .output()
            .expect("Failed to run list");
        assert!(output.status.success(), "list failed: {:?}", output);
        serde_json::from_slice(&output.stdout).expect("list --json should print JSON")
    }

    /// Finds a node by name anywhere in the project's tree
    pub fn task(&self, project: &str, name: &str) -> Value {
        fn find(nodes: &Value, name: &str) -> Option<Value> {
            nodes.as_array()?.iter().find_map(|node| {
                if node["name"] == name {
                    Some(node.clone())
                } else {
                    find(&node["children"], name)
                }
            })
        }
        find(&self.tree_json(project), name)
            .unwrap_or_else(|| panic!("task '{}' not found in project '{}'", name, project))
    }

    pub fn task_id(&self, project: &str, name: &str) -> String {
        self.task(project, name)["id"]
            .as_str()
            .expect("id should be a string")
            .to_string()
    }
}

/// Common test fixtures
pub struct TestFixtures;

impl TestFixtures {
    /// A project with one building holding two scheduled tasks
    pub fn site(harness: &CliTestHarness) {
        harness.run_success(&["project", "add", "Site", "-d", "Test site"]);
        harness.run_success(&["add", "Block A", "-p", "Site", "-l", "building"]);
        let block = harness.task_id("Site", "Block A");
        harness.run_success(&[
            "add", "Foundations", "-p", "Site", "--parent", &block,
            "--start", "2026-03-01", "--end", "2026-03-05",
        ]);
        harness.run_success(&[
            "add", "Frame", "-p", "Site", "--parent", &block,
            "--start", "2026-03-05", "--end", "2026-03-06",
        ]);
    }
}

/// Utility functions for test assertions
pub mod assertions {
    use predicates::prelude::*;

    pub fn has_task_table_headers() -> impl Predicate<str> {
        predicate::str::contains("ID")
            .and(predicate::str::contains("Name"))
            .and(predicate::str::contains("Progress"))
    }

    pub fn task_created_successfully() -> impl Predicate<str> {
        predicate::str::contains("Created task")
    }

    pub fn has_error() -> impl Predicate<str> {
        predicate::str::contains("Error").or(predicate::str::contains("error"))
    }
}
