//! Interpretation of update procedure results
//!
//! Turns the loosely typed value an update procedure returns into an
//! `UpdateOutcome`. Property names are matched case-insensitively, the way
//! the procedures themselves treat them.

use super::executor::RawProcedureOutput;
use crate::domain::{list_artifacts, IgnoreReason, PackageDirectory, UpdateOutcome, UpdatedPackage};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

/// Sentinel string a procedure returns to opt out of the run
pub const IGNORE_SENTINEL: &str = "Ignore";

/// Property holding nested stream information
pub const STREAMS_PROPERTY: &str = "Streams";

/// Classifies the output of one procedure run
pub fn interpret(package: &PackageDirectory, raw: RawProcedureOutput) -> UpdateOutcome {
    if let Some(exception) = raw.exception {
        return UpdateOutcome::procedure_error(&package.name, exception);
    }
    if raw.had_errors {
        return UpdateOutcome::procedure_error(
            &package.name,
            "update procedure reported errors",
        );
    }

    match raw.values.into_iter().next() {
        None => UpdateOutcome::no_change(&package.name),
        Some(Value::String(s)) if s.trim().eq_ignore_ascii_case(IGNORE_SENTINEL) => {
            UpdateOutcome::ignored(&package.name, IgnoreReason::Sentinel)
        }
        Some(Value::Object(map)) => interpret_object(package, map),
        Some(_) => UpdateOutcome::no_change(&package.name),
    }
}

fn interpret_object(package: &PackageDirectory, mut properties: Map<String, Value>) -> UpdateOutcome {
    let name = take(&mut properties, "Name")
        .and_then(|v| version_string(&v))
        .unwrap_or_else(|| package.name.clone());
    let remote_version = take(&mut properties, "RemoteVersion").and_then(|v| version_string(&v));
    let nuspec_version = take(&mut properties, "NuspecVersion").and_then(|v| version_string(&v));
    let files = take(&mut properties, "Files");

    let mut artifacts = files
        .map(|files| resolve_files(&package.path, &files))
        .unwrap_or_default();
    if artifacts.is_empty() {
        artifacts = list_artifacts(&package.path);
    }
    if artifacts.is_empty() {
        return UpdateOutcome::no_change(name);
    }

    let Some(remote_version) = remote_version.or_else(|| nuspec_version.clone()) else {
        return UpdateOutcome::procedure_error(
            name,
            "update produced a package but reported neither RemoteVersion nor NuspecVersion",
        );
    };

    UpdateOutcome::Updated(UpdatedPackage {
        name,
        remote_version,
        nuspec_version,
        artifacts,
        properties,
    })
}

/// Removes a property by case-insensitive name, keeping the others in order
fn take(properties: &mut Map<String, Value>, name: &str) -> Option<Value> {
    let key = properties
        .keys()
        .find(|k| k.eq_ignore_ascii_case(name))
        .cloned()?;
    properties.shift_remove(&key).filter(|v| !v.is_null())
}

/// Renders a name or version value.
///
/// Accepts strings, numbers and serialized version objects
/// (`{"Major":1,"Minor":2,"Build":3,"Revision":-1}`).
fn version_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        Value::Object(map) => {
            let parts: Vec<String> = ["Major", "Minor", "Build", "Revision"]
                .iter()
                .map_while(|field| map.get(*field).and_then(Value::as_i64))
                .take_while(|n| *n >= 0)
                .map(|n| n.to_string())
                .collect();
            (parts.len() >= 2).then(|| parts.join("."))
        }
        _ => None,
    }
}

/// Resolves `Files` entries against the package directory, keeping existing
/// files inside it. Entries escaping the directory (`..`, absolute paths,
/// symlinks pointing elsewhere) are dropped.
fn resolve_files(dir: &Path, files: &Value) -> Vec<PathBuf> {
    let entries: Vec<&str> = match files {
        Value::String(s) => vec![s.as_str()],
        Value::Array(items) => items.iter().filter_map(Value::as_str).collect(),
        _ => Vec::new(),
    };
    let Ok(base) = dir.canonicalize() else {
        return Vec::new();
    };

    let mut resolved: Vec<PathBuf> = Vec::new();
    for entry in entries.into_iter().map(str::trim).filter(|e| !e.is_empty()) {
        let path = dir.join(entry);
        let inside = path
            .canonicalize()
            .map(|real| real.starts_with(&base))
            .unwrap_or(false);
        if inside && path.is_file() && !resolved.contains(&path) {
            resolved.push(path);
        }
    }
    resolved
}

fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(render)
            .collect::<Vec<_>>()
            .join("\n\t\t"),
        other => other.to_string(),
    }
}

/// Describes every property of a returned object, one `\t{Name}: {value}`
/// line each. Null properties are omitted; `Streams` is left to
/// [`flatten_streams`].
pub fn describe_properties(properties: &Map<String, Value>) -> Vec<String> {
    properties
        .iter()
        .filter(|(name, value)| !value.is_null() && !name.eq_ignore_ascii_case(STREAMS_PROPERTY))
        .map(|(name, value)| format!("\t{}: {}", name, render(value)))
        .collect()
}

/// Expands the nested `Streams` map into readable lines
pub fn flatten_streams(streams: &Value) -> Vec<String> {
    let Value::Object(streams) = streams else {
        return Vec::new();
    };

    let mut lines = Vec::new();
    for (key, entry) in streams {
        match entry {
            Value::Object(fields) => {
                lines.push(format!("{}:", key));
                for (field, value) in fields.iter().filter(|(_, v)| !v.is_null()) {
                    lines.push(format!("\t{}.{}: {}", key, field, render(value)));
                }
            }
            Value::Null => {}
            other => lines.push(format!("{}: {}", key, render(other))),
        }
    }
    lines
}

/// Finds the `Streams` property of a returned object, if any
pub fn streams_of(properties: &Map<String, Value>) -> Option<&Value> {
    properties
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(STREAMS_PROPERTY))
        .map(|(_, v)| v)
}
