#![allow(dead_code)]

use serde_json::{json, Value};
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

pub fn temp_dir(prefix: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("{}-{}", prefix, uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&dir).expect("create temp dir");
    dir
}

pub fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let mut child = Command::new(env!("CARGO_BIN_EXE_coursed"))
        .env("COURSED_LOG", "off")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn coursed");
    let stdin = child.stdin.take().expect("stdin");
    let stdout = child.stdout.take().expect("stdout");
    (child, stdin, BufReader::new(stdout))
}

pub fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: Value,
) -> Value {
    let line = json!({ "id": id, "method": method, "params": params }).to_string();
    writeln!(stdin, "{}", line).expect("write request");
    stdin.flush().expect("flush");
    let mut out = String::new();
    reader.read_line(&mut out).expect("read response");
    let resp: Value = serde_json::from_str(&out).expect("parse response");
    assert_eq!(resp.get("id").and_then(|v| v.as_str()), Some(id));
    resp
}

pub fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: Value,
) -> Value {
    let resp = request(stdin, reader, id, method, params);
    assert_eq!(
        resp.get("ok").and_then(|v| v.as_bool()),
        Some(true),
        "{} failed: {}",
        method,
        resp
    );
    resp.get("result").cloned().unwrap_or(Value::Null)
}

pub fn request_err_code(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: Value,
) -> String {
    let resp = request(stdin, reader, id, method, params);
    assert_eq!(resp.get("ok").and_then(|v| v.as_bool()), Some(false), "{}", resp);
    resp.pointer("/error/code")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string()
}

pub fn str_field(v: &Value, key: &str) -> String {
    v.get(key)
        .and_then(|v| v.as_str())
        .unwrap_or_else(|| panic!("missing {} in {}", key, v))
        .to_string()
}

/// `(id, position)` pairs of the chapters in a structure response tree.
pub fn tree_chapters(result: &Value) -> Vec<(String, i64)> {
    result
        .pointer("/tree/chapters")
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default()
        .iter()
        .map(|c| (str_field(c, "id"), c.get("position").and_then(|v| v.as_i64()).unwrap_or(-1)))
        .collect()
}

pub fn tree_lessons(result: &Value, chapter_id: &str) -> Vec<(String, i64)> {
    result
        .pointer("/tree/chapters")
        .and_then(|v| v.as_array())
        .and_then(|chapters| {
            chapters
                .iter()
                .find(|c| c.get("id").and_then(|v| v.as_str()) == Some(chapter_id))
                .cloned()
        })
        .and_then(|c| c.get("lessons").and_then(|v| v.as_array()).cloned())
        .unwrap_or_default()
        .iter()
        .map(|l| (str_field(l, "id"), l.get("position").and_then(|v| v.as_i64()).unwrap_or(-1)))
        .collect()
}
