//! Named page scenes and engine configs shared by the glide test suites.
//!
//! `fixtures/manifest.json` maps a scene or config name to a file under
//! `fixtures/`. Scenes are deserialized into whatever shape the calling test
//! declares; configs are returned as raw JSON, the way a host would pass them.

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use once_cell::sync::Lazy;
use serde::de::DeserializeOwned;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct Manifest {
    scenes: BTreeMap<String, String>,
    configs: BTreeMap<String, String>,
}

static MANIFEST: Lazy<Result<Manifest, String>> = Lazy::new(|| {
    serde_json::from_str(include_str!("../../../../fixtures/manifest.json"))
        .map_err(|e| format!("fixtures/manifest.json: {e}"))
});

fn manifest() -> Result<&'static Manifest> {
    match &*MANIFEST {
        Ok(m) => Ok(m),
        Err(e) => Err(anyhow!("{e}")),
    }
}

fn file(section: &BTreeMap<String, String>, kind: &str, name: &str) -> Result<PathBuf> {
    let rel = section
        .get(name)
        .ok_or_else(|| anyhow!("no {kind} named '{name}' in the fixtures manifest"))?;
    Ok(PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../../fixtures").join(rel))
}

fn read(path: PathBuf) -> Result<String> {
    std::fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))
}

/// Load scene `name` into the test's own scene type.
pub fn scene<T: DeserializeOwned>(name: &str) -> Result<T> {
    let text = read(file(&manifest()?.scenes, "scene", name)?)?;
    serde_json::from_str(&text).with_context(|| format!("scene '{name}' does not match the expected shape"))
}

/// Raw JSON of config `name`.
pub fn config_json(name: &str) -> Result<String> {
    read(file(&manifest()?.configs, "config", name)?)
}

/// Every scene and config name listed in the manifest.
pub fn names() -> Result<Vec<String>> {
    let m = manifest()?;
    Ok(m.scenes.keys().chain(m.configs.keys()).cloned().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manifest_entries_point_at_files() {
        let m = manifest().unwrap();
        for name in m.scenes.keys() {
            assert!(file(&m.scenes, "scene", name).unwrap().exists(), "scene {name}");
        }
        for name in m.configs.keys() {
            assert!(file(&m.configs, "config", name).unwrap().exists(), "config {name}");
        }
        assert_eq!(names().unwrap().len(), m.scenes.len() + m.configs.len());
    }

    #[test]
    fn unknown_names_are_errors() {
        assert!(scene::<serde_json::Value>("nope").is_err());
        assert!(config_json("nope").is_err());
    }
}
