//! End-to-end tests for the scaffold-e2e binary
//!
//! These tests run the real binary against fake cluster, scaffold and
//! container CLIs: small shell scripts that record every invocation to a
//! shared log and fail or hang on request.

#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Test context with paths and cleanup
struct TestContext {
    /// Temporary directory for this test, removed on drop
    temp_dir: tempfile::TempDir,
    /// Project directory handed to the scaffold CLI
    project_dir: PathBuf,
    /// Every fake tool appends one line per invocation here
    calls_log: PathBuf,
    /// Generated configuration file
    config_path: PathBuf,
}

impl TestContext {
    /// Create a new test context with fake tools and a config pointing at them
    fn new() -> Self {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let project_dir = temp_dir.path().join("project");
        let bin_dir = temp_dir.path().join("bin");
        fs::create_dir_all(&project_dir).expect("Failed to create project dir");
        fs::create_dir_all(&bin_dir).expect("Failed to create bin dir");

        let calls_log = temp_dir.path().join("calls.log");
        for tool in ["kubectl", "kubebuilder", "docker"] {
            write_fake_tool(&bin_dir.join(tool), tool, &calls_log);
        }

        let config_path = temp_dir.path().join("config.toml");
        let config = format!(
            r#"
[tools]
cluster = "{bin}/kubectl"
scaffold = "{bin}/kubebuilder"
container = "{bin}/docker"

[project]
dir = "{project}"

[timeouts]
probe_delay_ms = 10
probe_secs = 5
"#,
            bin = bin_dir.display(),
            project = project_dir.display(),
        );
        fs::write(&config_path, config).expect("Failed to write config");

        Self {
            temp_dir,
            project_dir,
            calls_log,
            config_path,
        }
    }

    /// Write a scenario file and return its path
    fn scenario(&self, name: &str, content: &str) -> PathBuf {
        let path = self.temp_dir.path().join(format!("{}.yaml", name));
        fs::write(&path, content).expect("Failed to write scenario");
        path
    }

    /// Run the harness binary
    fn run(&self, args: &[&str]) -> HarnessOutput {
        let output = Command::new(env!("CARGO_BIN_EXE_scaffold-e2e"))
            .arg("--config")
            .arg(&self.config_path)
            .args(args)
            .env("NO_COLOR", "1")
            .env("RUST_LOG", "scaffold_e2e=info")
            .output()
            .expect("Failed to run scaffold-e2e");

        HarnessOutput {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            success: output.status.success(),
        }
    }

    /// Invocations recorded by the fake tools, one per line
    fn calls(&self) -> Vec<String> {
        fs::read_to_string(&self.calls_log)
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }
}

struct HarnessOutput {
    stdout: String,
    stderr: String,
    success: bool,
}

/// A tool that logs `<name> <cwd> <args>`, fails on `fail-me` and hangs on `hang`
fn write_fake_tool(path: &Path, name: &str, calls_log: &Path) {
    let script = format!(
        r#"#!/bin/sh
echo "{name} $(pwd -P) $*" >> "{log}"
case "$*" in
  *fail-me*) echo "{name} refused" >&2; exit 3 ;;
  *hang*) exec sleep 30 ;;
esac
echo "{name} ok"
"#,
        name = name,
        log = calls_log.display(),
    );
    fs::write(path, script).expect("Failed to write fake tool");
    fs::set_permissions(path, fs::Permissions::from_mode(0o755))
        .expect("Failed to make fake tool executable");
}

/// Drop the working-directory column from a recorded call
fn without_cwd(call: &str) -> String {
    let mut parts = call.splitn(3, ' ');
    let tool = parts.next().unwrap_or_default();
    let _cwd = parts.next();
    match parts.next() {
        Some(args) => format!("{} {}", tool, args),
        None => tool.to_string(),
    }
}

#[test]
fn test_builtin_workflow_runs_every_step_in_order() {
    let ctx = TestContext::new();
    let output = ctx.run(&["run"]);
    assert!(output.success, "stdout: {}\nstderr: {}", output.stdout, output.stderr);
    assert!(output.stdout.contains("STEP: init project"));
    assert!(output.stdout.contains("Scenario Passed"));

    let calls: Vec<String> = ctx.calls().iter().map(|c| without_cwd(c)).collect();
    assert_eq!(calls.len(), 8, "{:?}", calls);
    assert_eq!(calls[0], "kubebuilder init --domain example.com");
    assert!(calls[3].starts_with("docker build "));
    assert!(calls[5].starts_with("kubectl apply -f "));
    assert!(calls[5].ends_with("/hack/install.yaml"));
    assert!(calls[6].starts_with("kubectl create -f "));
    // Image cleanup is deferred until after the last step
    assert!(calls[7].starts_with("docker rmi -f gcr.io/kubeships/controller-manager:"));

    // The scaffold CLI runs inside the project directory
    let project = ctx.project_dir.canonicalize().unwrap();
    let first = ctx.calls()[0].clone();
    assert!(
        first.starts_with(&format!("kubebuilder {} ", project.display())),
        "{}",
        first
    );
}

#[test]
fn test_failed_step_reports_code_and_cleans_up() {
    let ctx = TestContext::new();
    let scenario = ctx.scenario(
        "failing",
        r#"
name: failing workflow
steps:
  - by: building image
    run: container
    args: [build, -t, img]
    defer:
      run: container
      args: [rmi, -f, img]
  - by: creating config
    run: scaffold
    args: [create, config, fail-me]
  - by: never reached
    run: cluster
    args: [get, pods]
"#,
    );

    let output = ctx.run(&["run", scenario.to_str().unwrap()]);
    assert!(!output.success);
    assert!(output.stdout.contains("code: 3"), "{}", output.stdout);
    assert!(output.stdout.contains("kubebuilder refused"), "{}", output.stdout);
    assert!(output.stdout.contains("Scenario Failed"));
    assert!(output.stderr.contains("Scenario 'failing workflow' failed at step 2/3"));
    // The runner reports the failure; the panic hook stays quiet
    assert!(!output.stderr.contains("panicked at"), "{}", output.stderr);

    let calls: Vec<String> = ctx.calls().iter().map(|c| without_cwd(c)).collect();
    assert_eq!(
        calls,
        [
            "docker build -t img",
            "kubebuilder create config fail-me",
            "docker rmi -f img",
        ]
    );
}

#[test]
fn test_run_json_result() {
    let ctx = TestContext::new();
    let scenario = ctx.scenario(
        "json",
        r#"
name: json
steps:
  - by: version
    run: cluster
    args: [version]
    expect:
      contains: kubectl ok
"#,
    );

    let output = ctx.run(&["run", scenario.to_str().unwrap(), "--json"]);
    assert!(output.success, "{}", output.stderr);

    let result: serde_json::Value = serde_json::from_str(&output.stdout).expect("valid JSON");
    assert_eq!(result["name"], "json");
    assert_eq!(result["passed"], true);
    assert_eq!(result["steps_run"], 1);
    assert!(result["error"].is_null());
}

#[test]
fn test_exec_prints_stdout() {
    let ctx = TestContext::new();
    let output = ctx.run(&["exec", "container", "--", "images"]);
    assert!(output.success, "{}", output.stderr);
    assert_eq!(output.stdout, "docker ok\n");
    assert!(output.stderr.contains("Running '"));
}

#[test]
fn test_exec_cluster_gets_context_flags() {
    let ctx = TestContext::new();
    let output = ctx.run(&[
        "--host",
        "https://10.0.0.1:6443",
        "--kubeconfig",
        "/tmp/kubeconfig",
        "--kube-context",
        "kind-e2e",
        "exec",
        "cluster",
        "--",
        "get",
        "pods",
    ]);
    assert!(output.success, "{}", output.stderr);

    let calls: Vec<String> = ctx.calls().iter().map(|c| without_cwd(c)).collect();
    assert_eq!(
        calls,
        ["kubectl --server=https://10.0.0.1:6443 --kubeconfig=/tmp/kubeconfig --context=kind-e2e get pods"]
    );
}

#[test]
fn test_exec_unknown_kind() {
    let ctx = TestContext::new();
    let output = ctx.run(&["exec", "helm", "--", "install"]);
    assert!(!output.success);
    assert!(output.stderr.contains("Invalid command type: helm"), "{}", output.stderr);
    assert!(ctx.calls().is_empty());
}

#[test]
fn test_exec_nonzero_exit() {
    let ctx = TestContext::new();
    let output = ctx.run(&["exec", "container", "--", "fail-me"]);
    assert!(!output.success);
    assert!(output.stderr.contains("code: 3"), "{}", output.stderr);
}

#[test]
fn test_exec_timeout() {
    let ctx = TestContext::new();
    let started = std::time::Instant::now();
    let output = ctx.run(&["exec", "container", "--timeout", "1", "--", "hang"]);
    assert!(!output.success);
    assert!(started.elapsed() < std::time::Duration::from_secs(20));
    assert!(
        output.stderr.contains("timed out waiting for command"),
        "{}",
        output.stderr
    );
}

#[test]
fn test_cluster_timeout_in_scenario_probes_version() {
    let ctx = TestContext::new();
    let scenario = ctx.scenario(
        "timeout",
        r#"
name: timeout
steps:
  - by: waiting on the cluster
    run: cluster
    args: [wait, hang]
    timeout_secs: 1
"#,
    );

    let output = ctx.run(&["run", scenario.to_str().unwrap()]);
    assert!(!output.success);
    assert!(output.stdout.contains("Hit i/o timeout error."), "{}", output.stdout);
    assert!(output.stdout.contains("Talking to the server"), "{}", output.stdout);

    let calls: Vec<String> = ctx.calls().iter().map(|c| without_cwd(c)).collect();
    assert_eq!(calls, ["kubectl wait hang", "kubectl version"]);
}

#[test]
fn test_check_json() {
    let ctx = TestContext::new();
    let output = ctx.run(&["check", "--json"]);
    assert!(output.success, "{}", output.stderr);

    let report: serde_json::Value = serde_json::from_str(&output.stdout).expect("valid JSON");
    let tools = report["tools"].as_array().unwrap();
    assert_eq!(tools.len(), 3);
    assert!(tools.iter().all(|t| t["found"] == true));
    assert_eq!(tools[0]["kind"], "cluster");
}
