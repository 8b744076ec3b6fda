//! Integration tests for the MCP stdio server.
//!
//! A session spawns `eg mcp serve`, so pending edits survive between
//! calls and the two-phase flow can be driven across requests.

mod common;

use common::TestEnv;
use predicates::prelude::*;
use serde_json::{Value, json};
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Stdio};

/// A running `eg mcp serve` process.
struct McpServerHandle {
    child: Child,
    stdin: ChildStdin,
    reader: BufReader<ChildStdout>,
    next_id: u64,
}

impl McpServerHandle {
    fn spawn(env: &TestEnv, extra_env: &[(&str, &str)]) -> Self {
        let mut cmd = std::process::Command::new(env!("CARGO_BIN_EXE_eg"));
        cmd.args(["mcp", "serve"])
            .current_dir(env.path())
            .env("EG_CONFIG_DIR", env.config_path())
            .env("EG_DATA_DIR", env.data_path())
            .env_remove("EG_CONFIG")
            .env_remove("EG_ACTION_LOG")
            .env_remove("EG_PENDING_TTL_SECS")
            .env_remove("EG_LOG")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null());
        for (key, value) in extra_env {
            cmd.env(key, value);
        }
        let mut child = cmd.spawn().expect("Failed to spawn MCP server");
        let stdin = child.stdin.take().expect("Failed to get stdin");
        let reader = BufReader::new(child.stdout.take().expect("Failed to get stdout"));
        Self {
            child,
            stdin,
            reader,
            next_id: 1,
        }
    }

    fn send_line(&mut self, line: &str) {
        writeln!(self.stdin, "{}", line).expect("Failed to write");
        self.stdin.flush().expect("Failed to flush");
    }

    fn recv(&mut self) -> Value {
        let mut response = String::new();
        self.reader
            .read_line(&mut response)
            .expect("Failed to read");
        serde_json::from_str(&response).expect("Invalid JSON")
    }

    fn send_recv(&mut self, line: &str) -> Value {
        self.send_line(line);
        self.recv()
    }

    fn request(&mut self, method: &str, params: Value) -> Value {
        let id = self.next_id;
        self.next_id += 1;
        let response = self.send_recv(
            &json!({"jsonrpc": "2.0", "id": id, "method": method, "params": params}).to_string(),
        );
        assert_eq!(response["id"], id);
        response
    }

    fn initialize(&mut self) -> Value {
        let resp = self.request(
            "initialize",
            json!({
                "protocolVersion": "2024-11-05",
                "capabilities": {},
                "clientInfo": {"name": "test", "version": "1.0"}
            }),
        );
        self.send_line(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#);
        resp
    }

    /// Call a tool and return the decoded `EditResult` plus `isError`.
    fn call(&mut self, name: &str, arguments: Value) -> (Value, bool) {
        let resp = self.request("tools/call", json!({"name": name, "arguments": arguments}));
        let text = resp["result"]["content"][0]["text"]
            .as_str()
            .expect("Should have text content");
        let is_error = resp["result"]["isError"].as_bool().unwrap();
        (serde_json::from_str(text).unwrap(), is_error)
    }

    fn version_token(&mut self, path: &str) -> String {
        let (result, _) = self.call("get_version_token", json!({"path": path}));
        result["version_token"].as_str().unwrap().to_string()
    }
}

impl Drop for McpServerHandle {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

// === Manifest ===

#[test]
fn test_mcp_manifest_has_server_info() {
    let env = TestEnv::new();
    let output = env.eg().args(["mcp", "manifest"]).output().unwrap();
    assert!(output.status.success());

    let manifest: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(manifest["name"], "editgate");
    assert!(manifest["version"].is_string());
    assert!(manifest["protocolVersion"].is_string());
}

#[test]
fn test_mcp_manifest_lists_tools_with_schemas() {
    let env = TestEnv::new();
    env.eg()
        .args(["mcp", "manifest"])
        .assert()
        .success()
        .stdout(predicate::str::contains("prepare_replace_lines"))
        .stdout(predicate::str::contains("approve_edit"))
        .stdout(predicate::str::contains("inputSchema"));

    let output = env.eg().args(["mcp", "manifest"]).output().unwrap();
    let manifest: Value = serde_json::from_slice(&output.stdout).unwrap();
    let tools = manifest["tools"].as_array().unwrap();
    assert_eq!(tools.len(), 9);
    for tool in tools {
        assert!(tool["description"].is_string());
        assert_eq!(tool["inputSchema"]["type"], "object");
    }
    let approve = tools.iter().find(|t| t["name"] == "approve_edit").unwrap();
    assert_eq!(
        approve["inputSchema"]["required"],
        json!(["approval_token", "confirmation"])
    );
}

// === Protocol ===

#[test]
fn test_initialize_and_list_tools() {
    let env = TestEnv::new();
    let mut server = McpServerHandle::spawn(&env, &[]);

    let init = server.initialize();
    assert!(init["result"]["protocolVersion"].is_string());
    assert_eq!(init["result"]["serverInfo"]["name"], "editgate");
    assert!(init["result"]["capabilities"]["tools"].is_object());

    // The notification sent by initialize() got no response, so the next
    // line read belongs to this request.
    let ping = server.request("ping", json!({}));
    assert_eq!(ping["result"], json!({}));

    let tools = server.request("tools/list", json!({}));
    assert_eq!(tools["result"]["tools"].as_array().unwrap().len(), 9);

    let bad_tool = server.request("tools/call", json!({"name": "format_disk", "arguments": {}}));
    assert_eq!(bad_tool["error"]["code"], -32602);
}

// === Two-phase edits ===

#[test]
fn test_prepare_then_approve_across_calls() {
    let env = TestEnv::new();
    env.numbered_file("ten.txt", 10);
    let mut server = McpServerHandle::spawn(&env, &[]);
    server.initialize();

    let t0 = server.version_token("ten.txt");
    let (prepared, is_error) = server.call(
        "prepare_replace_lines",
        json!({
            "path": "ten.txt",
            "start_line": 5,
            "end_line": 7,
            "new_content": "X\nY",
            "expected_version_token": t0,
        }),
    );
    assert!(!is_error);
    assert_eq!(prepared["success"], true);
    let approval = prepared["approval_token"].as_str().unwrap().to_string();

    let (pending, _) = server.call("list_pending_edits", json!({}));
    assert_eq!(pending["count"], 1);
    assert_eq!(pending["pending_edits"][0]["approval_token"], approval.as_str());

    // Wrong phrase leaves the edit pending.
    let (wrong, is_error) = server.call(
        "approve_edit",
        json!({"approval_token": approval, "confirmation": "approve"}),
    );
    assert!(is_error);
    assert_eq!(wrong["error"]["kind"], "confirmation_mismatch");
    assert_eq!(env.read("ten.txt").lines().count(), 10);

    let (applied, is_error) = server.call(
        "approve_edit",
        json!({"approval_token": approval, "confirmation": "APPROVE"}),
    );
    assert!(!is_error);
    assert_eq!(applied["lines_after"], 9);
    assert_ne!(applied["new_version_token"], t0.as_str());
    assert!(env.read("ten.txt").contains("line 4\nX\nY\nline 8\n"));

    // A token is good for exactly one apply.
    let (again, _) = server.call(
        "approve_edit",
        json!({"approval_token": approval, "confirmation": "APPROVE"}),
    );
    assert_eq!(again["error"]["kind"], "token_expired_or_invalid");

    let (pending, _) = server.call("list_pending_edits", json!({}));
    assert_eq!(pending["count"], 0);
}

#[test]
fn test_external_change_between_prepare_and_approve() {
    let env = TestEnv::new();
    env.numbered_file("a.txt", 5);
    let mut server = McpServerHandle::spawn(&env, &[]);
    server.initialize();

    let t0 = server.version_token("a.txt");
    let (prepared, _) = server.call(
        "prepare_delete_lines",
        json!({"path": "a.txt", "start_line": 1, "end_line": 2, "expected_version_token": t0}),
    );
    let approval = prepared["approval_token"].as_str().unwrap().to_string();

    let external = "line 1\nline 2\nline 3\nline 4\nline 5\nexternal\n";
    std::fs::write(env.path().join("a.txt"), external).unwrap();

    let (result, is_error) = server.call(
        "approve_edit",
        json!({"approval_token": approval, "confirmation": "APPROVE"}),
    );
    assert!(is_error);
    assert_eq!(result["error"]["kind"], "version_conflict");
    assert!(
        result["error"]["message"]
            .as_str()
            .unwrap()
            .contains("prepare the edit again")
    );
    assert_eq!(env.read("a.txt"), external);

    // The conflicting plan is gone.
    let (pending, _) = server.call("list_pending_edits", json!({}));
    assert_eq!(pending["count"], 0);
}

#[test]
fn test_cancel_then_approve_fails() {
    let env = TestEnv::new();
    env.numbered_file("a.txt", 3);
    let mut server = McpServerHandle::spawn(&env, &[]);
    server.initialize();

    let t0 = server.version_token("a.txt");
    let (prepared, _) = server.call(
        "prepare_insert_after_line",
        json!({"path": "a.txt", "after_line": 3, "content": "line 4", "expected_version_token": t0}),
    );
    let approval = prepared["approval_token"].as_str().unwrap().to_string();

    let (cancelled, _) = server.call("cancel_edit", json!({"approval_token": approval}));
    assert_eq!(cancelled["removed"], true);

    let (result, _) = server.call(
        "approve_edit",
        json!({"approval_token": approval, "confirmation": "APPROVE"}),
    );
    assert_eq!(result["error"]["kind"], "token_expired_or_invalid");
    assert_eq!(env.read("a.txt"), "line 1\nline 2\nline 3\n");
}

#[test]
fn test_expired_token_is_rejected() {
    let env = TestEnv::new();
    env.numbered_file("a.txt", 3);
    let mut server = McpServerHandle::spawn(&env, &[("EG_PENDING_TTL_SECS", "1")]);
    server.initialize();

    let t0 = server.version_token("a.txt");
    let (prepared, _) = server.call(
        "prepare_delete_lines",
        json!({"path": "a.txt", "start_line": 1, "end_line": 1, "expected_version_token": t0}),
    );
    let approval = prepared["approval_token"].as_str().unwrap().to_string();

    std::thread::sleep(std::time::Duration::from_millis(1500));

    let (result, is_error) = server.call(
        "approve_edit",
        json!({"approval_token": approval, "confirmation": "APPROVE"}),
    );
    assert!(is_error);
    assert_eq!(result["error"]["kind"], "token_expired_or_invalid");
    assert_eq!(env.read("a.txt"), "line 1\nline 2\nline 3\n");
}

#[test]
fn test_missing_arguments_are_invalid_params() {
    let env = TestEnv::new();
    let mut server = McpServerHandle::spawn(&env, &[]);
    server.initialize();

    let resp = server.request(
        "tools/call",
        json!({"name": "prepare_replace_lines", "arguments": {"path": "a.txt"}}),
    );
    assert_eq!(resp["error"]["code"], -32602);
    assert!(resp.get("result").is_none());
}

#[test]
fn test_session_writes_action_log() {
    let env = TestEnv::new();
    env.numbered_file("a.txt", 2);
    let mut server = McpServerHandle::spawn(&env, &[]);
    server.initialize();
    server.version_token("a.txt");
    drop(server);

    let log = std::fs::read_to_string(env.data_path().join("action.log")).unwrap();
    let entry: Value = serde_json::from_str(log.lines().next().unwrap()).unwrap();
    assert_eq!(entry["operation"], "get_version_token");
    assert_eq!(entry["success"], true);
    assert_eq!(entry["args"]["path"], "a.txt");
}
