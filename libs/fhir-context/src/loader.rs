//! Directory loader
//!
//! Reads every `*.json` file of a directory (an unpacked package or a folder of
//! exported definitions) into a [`DefinitionIndex`]. `Bundle` resources are
//! flattened into their entries. `package.json` and `.index.json` are skipped.

use crate::error::{Error, Result};
use crate::index::DefinitionIndex;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

const EXCLUDED_FILES: &[&str] = &["package.json", ".index.json"];

/// Load all definitions found directly under `dir`, in file-name order.
pub fn load_directory(dir: &Path) -> Result<DefinitionIndex> {
    let mut index = DefinitionIndex::new();
    load_directory_into(dir, &mut index)?;
    Ok(index)
}

/// Load all definitions found directly under `dir` into an existing index.
///
/// Returns the number of resources added. Files that are not FHIR resources are
/// skipped with a warning; unreadable files fail the load.
pub fn load_directory_into(dir: &Path, index: &mut DefinitionIndex) -> Result<usize> {
    if !dir.is_dir() {
        return Err(Error::Loader(format!(
            "'{}' is not a directory",
            dir.display()
        )));
    }

    let mut files: Vec<PathBuf> = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let is_json = path.extension() == Some("json".as_ref());
        let excluded = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| EXCLUDED_FILES.contains(&n));
        if is_json && !excluded {
            files.push(path);
        }
    }
    files.sort();

    let mut added = 0;
    for path in files {
        let resource = parse_json(&fs::read(&path)?)?;
        for resource in flatten_bundle(resource) {
            if resource.get("resourceType").and_then(Value::as_str).is_none() {
                tracing::warn!(file = %path.display(), "Skipping JSON without resourceType");
                continue;
            }
            index.add(resource)?;
            added += 1;
        }
    }

    tracing::debug!(dir = %dir.display(), count = added, "Loaded definitions");
    Ok(added)
}

fn flatten_bundle(resource: Value) -> Vec<Value> {
    if resource.get("resourceType").and_then(Value::as_str) != Some("Bundle") {
        return vec![resource];
    }
    resource
        .get("entry")
        .and_then(Value::as_array)
        .map(|entries| {
            entries
                .iter()
                .filter_map(|entry| entry.get("resource").cloned())
                .collect()
        })
        .unwrap_or_default()
}

fn parse_json(bytes: &[u8]) -> Result<Value> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    let content = std::str::from_utf8(bytes)
        .map_err(|e| Error::Loader(format!("Invalid UTF-8: {}", e)))?;
    Ok(serde_json::from_str(content.trim())?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fishable::{FishKind, Fishable};
    use serde_json::json;

    #[test]
    fn loads_resources_and_bundle_entries() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("ValueSet-colors.json"),
            json!({
                "resourceType": "ValueSet",
                "id": "colors",
                "url": "http://example.org/ValueSet/colors"
            })
            .to_string(),
        )
        .unwrap();
        fs::write(
            dir.path().join("bundle.json"),
            json!({
                "resourceType": "Bundle",
                "type": "collection",
                "entry": [
                    { "resource": { "resourceType": "CodeSystem", "id": "shapes" } },
                    { "resource": { "resourceType": "Patient", "id": "pat-1" } }
                ]
            })
            .to_string(),
        )
        .unwrap();
        fs::write(dir.path().join("package.json"), "{\"name\": \"x\"}").unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let index = load_directory(dir.path()).unwrap();
        assert_eq!(index.len(), 3);
        assert!(index.fish_for_metadata("colors", &[FishKind::ValueSet]).is_some());
        assert!(index.fish_for_metadata("shapes", &[FishKind::CodeSystem]).is_some());
        assert!(index.fish_for_metadata("pat-1", &[FishKind::Instance]).is_some());
    }

    #[test]
    fn strips_byte_order_mark() {
        let value = parse_json(b"\xEF\xBB\xBF {\"resourceType\": \"Patient\"}").unwrap();
        assert_eq!(value["resourceType"], "Patient");
    }

    #[test]
    fn rejects_missing_directory() {
        assert!(load_directory(Path::new("/definitely/not/here")).is_err());
    }
}
