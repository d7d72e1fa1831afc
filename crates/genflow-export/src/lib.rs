//! # genflow-export
//!
//! Result export for Genflow.
//!
//! The pipeline hands the exporter a name and a JSON payload after
//! every phase and once at the end of a run. Export is best-effort:
//! callers log failures but never fail the pipeline over them.

use genflow_core::{GenflowError, Result};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Best-effort sink for phase results and session snapshots
pub trait Exporter: Send + Sync {
    /// Persist one named payload
    fn save(&self, name: &str, payload: &serde_json::Value) -> Result<()>;
}

/// Writes each payload to `<dir>/<name>.json`
pub struct FileExporter {
    dir: PathBuf,
}

impl FileExporter {
    /// Create the exporter, ensuring the target directory exists
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl Exporter for FileExporter {
    fn save(&self, name: &str, payload: &serde_json::Value) -> Result<()> {
        let path = self.dir.join(format!("{}.json", name));
        let content = serde_json::to_string_pretty(payload)?;
        std::fs::write(&path, content)
            .map_err(|e| GenflowError::Export(format!("writing {}: {}", path.display(), e)))?;
        tracing::debug!(path = %path.display(), "Saved export");
        Ok(())
    }
}

/// Keeps payloads in memory; for tests
#[derive(Default)]
pub struct MemoryExporter {
    saved: Mutex<Vec<(String, serde_json::Value)>>,
}

impl MemoryExporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Names saved so far, in order
    pub fn names(&self) -> Vec<String> {
        self.saved.lock().unwrap().iter().map(|(n, _)| n.clone()).collect()
    }

    /// Last payload saved under `name`
    pub fn get(&self, name: &str) -> Option<serde_json::Value> {
        self.saved
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.clone())
    }
}

impl Exporter for MemoryExporter {
    fn save(&self, name: &str, payload: &serde_json::Value) -> Result<()> {
        self.saved
            .lock()
            .unwrap()
            .push((name.to_string(), payload.clone()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_file_exporter_writes_json() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = FileExporter::new(dir.path().join("session-1")).unwrap();

        exporter
            .save("phase1_results", &json!({"phase_number": 1, "status": "completed"}))
            .unwrap();

        let content =
            std::fs::read_to_string(dir.path().join("session-1/phase1_results.json")).unwrap();
        let value: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(value["phase_number"], 1);
    }

    #[test]
    fn test_file_exporter_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a/b/c");
        let exporter = FileExporter::new(&nested).unwrap();
        assert!(nested.exists());
        assert_eq!(exporter.dir(), nested.as_path());
    }

    #[test]
    fn test_memory_exporter_records_order() {
        let exporter = MemoryExporter::new();
        exporter.save("phase1_results", &json!({"n": 1})).unwrap();
        exporter.save("pipeline_state", &json!({"state": "failed"})).unwrap();

        assert_eq!(exporter.names(), vec!["phase1_results", "pipeline_state"]);
        assert_eq!(exporter.get("pipeline_state").unwrap()["state"], "failed");
        assert!(exporter.get("missing").is_none());
    }
}
