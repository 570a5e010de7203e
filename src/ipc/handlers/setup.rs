use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::structure::{SessionOptions, TitleRules};
use serde_json::{json, Map, Value};

#[derive(Clone, Copy)]
enum SetupSection {
    Structure,
}

impl SetupSection {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "structure" => Some(Self::Structure),
            _ => None,
        }
    }

    fn key(self) -> &'static str {
        match self {
            Self::Structure => "setup.structure",
        }
    }
}

fn default_section(section: SetupSection) -> Value {
    match section {
        SetupSection::Structure => json!({
            "expandChaptersByDefault": true,
            "maxTitleLength": 200
        }),
    }
}

fn as_object_mut(value: &mut Value) -> Result<&mut Map<String, Value>, String> {
    value
        .as_object_mut()
        .ok_or_else(|| "internal setup object must be a JSON object".to_string())
}

fn parse_bool(v: &Value, key: &str) -> Result<bool, String> {
    v.as_bool()
        .ok_or_else(|| format!("{} must be boolean", key))
}

fn parse_i64_range(v: &Value, key: &str, min: i64, max: i64) -> Result<i64, String> {
    let n = v
        .as_i64()
        .ok_or_else(|| format!("{} must be integer", key))?;
    if !(min..=max).contains(&n) {
        return Err(format!("{} must be in {}..={}", key, min, max));
    }
    Ok(n)
}

fn merge_section_patch(
    section: SetupSection,
    current: &mut Value,
    patch: &Map<String, Value>,
) -> Result<(), String> {
    let obj = as_object_mut(current)?;
    for (k, v) in patch {
        match section {
            SetupSection::Structure => match k.as_str() {
                "expandChaptersByDefault" => {
                    obj.insert(k.clone(), Value::Bool(parse_bool(v, k)?));
                }
                "maxTitleLength" => {
                    obj.insert(k.clone(), Value::from(parse_i64_range(v, k, 1, 500)?));
                }
                _ => return Err(format!("unknown structure field: {}", k)),
            },
        }
    }
    Ok(())
}

fn load_section(conn: &rusqlite::Connection, section: SetupSection) -> anyhow::Result<Value> {
    let mut current = default_section(section);
    if let Some(saved) = db::settings_get_json(conn, section.key())? {
        if let Some(saved_obj) = saved.as_object() {
            // Best-effort apply: malformed historical values should not block the editor.
            let _ = merge_section_patch(section, &mut current, saved_obj);
        }
    }
    Ok(current)
}

/// Session options from the workspace's structure settings.
pub fn load_session_options(conn: &rusqlite::Connection) -> anyhow::Result<SessionOptions> {
    let section = load_section(conn, SetupSection::Structure)?;
    let defaults = SessionOptions::default();
    let expand_chapters = section
        .get("expandChaptersByDefault")
        .and_then(|v| v.as_bool())
        .unwrap_or(defaults.expand_chapters);
    let max_len = section
        .get("maxTitleLength")
        .and_then(|v| v.as_u64())
        .map(|n| n as usize)
        .unwrap_or(defaults.title_rules.max_len);
    Ok(SessionOptions {
        title_rules: TitleRules { max_len },
        expand_chapters,
    })
}

fn handle_setup_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let structure = match load_section(conn, SetupSection::Structure) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    ok(&req.id, json!({ "structure": structure }))
}

fn handle_setup_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(section_raw) = req.params.get("section").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing section", None);
    };
    let Some(section) = SetupSection::parse(section_raw) else {
        return err(&req.id, "bad_params", "unknown section", None);
    };
    let Some(patch_obj) = req.params.get("patch").and_then(|v| v.as_object()) else {
        return err(&req.id, "bad_params", "patch must be an object", None);
    };

    let mut current = match load_section(conn, section) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    if let Err(msg) = merge_section_patch(section, &mut current, patch_obj) {
        return err(&req.id, "bad_params", msg, None);
    }
    if let Err(e) = db::settings_set_json(conn, section.key(), &current) {
        return err(&req.id, "db_update_failed", e.to_string(), None);
    }
    ok(&req.id, json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "setup.get" => Some(handle_setup_get(state, req)),
        "setup.update" => Some(handle_setup_update(state, req)),
        _ => None,
    }
}
