//! Smoke tests for the branchscope binary
//!
//! Each test writes method bodies to a temporary file and checks that the
//! command runs, picks the right output format and fails cleanly on bad
//! input.

use std::path::PathBuf;
use std::process::{Command, ExitStatus};
use tempfile::TempDir;

const METHODS: &str = r#"[
  {
    "class_name": "Demo",
    "method_name": "check",
    "descriptor": "(I)V",
    "max_stack": 1,
    "instructions": [
      {"op": "simple", "mnemonic": "iload_1", "pushes": 1, "line": 3},
      {"op": "if", "condition": "lt", "operand": "int", "target": 4, "line": 3},
      {"op": "simple", "mnemonic": "nop", "line": 4},
      {"op": "return", "values": 0, "line": 4},
      {"op": "simple", "mnemonic": "nop", "line": 6},
      {"op": "return", "values": 0, "line": 6}
    ],
    "mutations": [{"instruction": 4, "mutation_id": 11}]
  },
  {
    "class_name": "Demo",
    "method_name": "plain",
    "descriptor": "()V",
    "instructions": [{"op": "return", "values": 0}]
  }
]"#;

/// Test context holding the fixture file and binary path
struct TestContext {
    bin: PathBuf,
    input: PathBuf,
    dir: TempDir,
}

struct TestOutput {
    stdout: String,
    stderr: String,
    status: ExitStatus,
}

impl TestContext {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("methods.json");
        std::fs::write(&input, METHODS).unwrap();

        let bin = std::env::var("CARGO_BIN_EXE_branchscope")
            .ok()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./target/debug/branchscope"));

        Self { bin, input, dir }
    }

    fn run(&self, args: &[&str]) -> TestOutput {
        let output = Command::new(&self.bin)
            .args(args)
            .env_remove("BRANCHSCOPE_CONFIG")
            .output()
            .expect("Failed to run branchscope");

        TestOutput {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            status: output.status,
        }
    }

    fn input(&self) -> &str {
        self.input.to_str().unwrap()
    }
}

fn json(output: &TestOutput) -> serde_json::Value {
    serde_json::from_str(&output.stdout).unwrap_or_else(|e| {
        panic!("invalid JSON ({}): {}", e, output.stdout);
    })
}

#[test]
fn test_cfg_command_human() {
    let ctx = TestContext::new();
    let out = ctx.run(&["cfg", ctx.input(), "--method", "check"]);
    assert!(out.status.success(), "stderr: {}", out.stderr);
    assert!(out.stdout.contains("Demo.check(I)V"));
    assert!(out.stdout.contains("branch=0"));
}

#[test]
fn test_cfg_command_dot() {
    let ctx = TestContext::new();
    let out = ctx.run(&["cfg", ctx.input(), "--format", "dot"]);
    assert!(out.status.success());
    assert!(out.stdout.starts_with("digraph"));
}

#[test]
fn test_cfg_command_json() {
    let ctx = TestContext::new();
    let out = ctx.run(&["cfg", ctx.input(), "--output", "json"]);
    assert!(out.status.success());
    let value = json(&out);
    assert_eq!(value["tool"], "branchscope");
    assert_eq!(value["data"]["vertices"].as_array().unwrap().len(), 6);
    assert_eq!(value["data"]["entry"], 0);
}

#[test]
fn test_distances_with_path() {
    let ctx = TestContext::new();
    let out = ctx.run(&["distances", ctx.input(), "--path", "0,1:2.5", "--output", "json"]);
    assert!(out.status.success(), "stderr: {}", out.stderr);
    let value = json(&out);
    let mutant = &value["data"]["mutations"][0];
    assert_eq!(mutant["mutation_id"], 11);
    assert_eq!(mutant["control_distance"], 1);
    assert_eq!(mutant["branch_distance"], 2.5);
    assert_eq!(value["data"]["diameter"], 3);
}

#[test]
fn test_distances_rejects_bad_path() {
    let ctx = TestContext::new();
    let out = ctx.run(&["distances", ctx.input(), "--path", "x:y", "--output", "json"]);
    assert_eq!(out.status.code(), Some(2));
    assert_eq!(json(&out)["data"]["code"], "E005");
}

#[test]
fn test_instrument_command() {
    let ctx = TestContext::new();
    let out = ctx.run(&["instrument", ctx.input(), "--rewritten", "--output", "pretty"]);
    assert!(out.status.success(), "stderr: {}", out.stderr);
    let value = json(&out);
    assert_eq!(value["data"]["max_stack"], 5);
    assert_eq!(value["data"]["edits"].as_array().unwrap().len(), 1);
    assert_eq!(value["data"]["rewritten"]["code"].as_array().unwrap().len(), 11);
}

#[test]
fn test_registry_command() {
    let ctx = TestContext::new();
    let out = ctx.run(&["registry", ctx.input(), "--output", "json"]);
    assert!(out.status.success(), "stderr: {}", out.stderr);
    let value = json(&out);
    assert_eq!(value["data"]["total_branches"], 1);
    assert_eq!(value["data"]["branchless_methods"][0], "Demo.plain()V");
}

#[test]
fn test_registry_honours_config() {
    let ctx = TestContext::new();
    let config = ctx.dir.path().join("config.json");
    std::fs::write(&config, r#"{"excluded_methods": ["check"]}"#).unwrap();
    let out = ctx.run(&[
        "registry",
        ctx.input(),
        "--config",
        config.to_str().unwrap(),
        "--output",
        "json",
    ]);
    assert!(out.status.success(), "stderr: {}", out.stderr);
    let value = json(&out);
    assert_eq!(value["data"]["total_branches"], 0);
    assert_eq!(value["data"]["classes"]["Demo"][0]["outcome"], "excluded");
}

#[test]
fn test_missing_input_file() {
    let ctx = TestContext::new();
    let out = ctx.run(&["cfg", "/nonexistent/methods.json", "--output", "json"]);
    assert_eq!(out.status.code(), Some(4));
    assert_eq!(json(&out)["data"]["code"], "E001");
}

#[test]
fn test_unknown_method() {
    let ctx = TestContext::new();
    let out = ctx.run(&["cfg", ctx.input(), "--method", "nope"]);
    assert_eq!(out.status.code(), Some(6));
    assert!(out.stderr.contains("nope"));
}
