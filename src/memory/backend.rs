//! Pluggable persistence backends for the site memory.
//!
//! Enum dispatch, same as the LLM providers: `InMemory` for tests,
//! `JsonFile` for production. A backend only loads and saves the full
//! record mapping; all memory logic lives in [`super::SiteMemory`].

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

use crate::error::AppError;
use crate::model::RunWarning;

use super::MemoryRecord;

pub type RecordMap = BTreeMap<String, MemoryRecord>;

#[derive(Debug)]
pub enum MemoryBackend {
    /// Volatile backend — holds the mapping in memory. Test use.
    InMemory(Mutex<Option<RecordMap>>),
    /// Durable backend — one JSON file, written via temp file + atomic rename.
    JsonFile(PathBuf),
}

impl MemoryBackend {
    pub fn in_memory() -> Self {
        MemoryBackend::InMemory(Mutex::new(None))
    }

    pub fn json_file(path: impl Into<PathBuf>) -> Self {
        MemoryBackend::JsonFile(path.into())
    }

    /// Load the persisted mapping. `Ok(None)` means no store exists yet
    /// (first run — not an error). Unparseable content is
    /// [`AppError::MemoryCorrupt`]; the backend never touches the bytes.
    pub fn load(&self) -> Result<Option<RecordMap>, AppError> {
        match self {
            MemoryBackend::InMemory(slot) => {
                let guard = slot.lock().map_err(|_| poisoned())?;
                Ok(guard.clone())
            }
            MemoryBackend::JsonFile(path) => {
                let raw = match fs::read_to_string(path) {
                    Ok(raw) => raw,
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
                    Err(e) => {
                        return Err(AppError::Memory(format!(
                            "cannot read {}: {e}",
                            path.display()
                        )))
                    }
                };
                if raw.trim().is_empty() {
                    return Ok(None);
                }
                serde_json::from_str(&raw).map(Some).map_err(|e| {
                    AppError::MemoryCorrupt(format!("{}: {e}", path.display()))
                })
            }
        }
    }

    /// Persist the full mapping atomically.
    pub fn save(&self, records: &RecordMap) -> Result<(), AppError> {
        match self {
            MemoryBackend::InMemory(slot) => {
                let mut guard = slot.lock().map_err(|_| poisoned())?;
                *guard = Some(records.clone());
                Ok(())
            }
            MemoryBackend::JsonFile(path) => {
                if let Some(parent) = path.parent() {
                    if !parent.as_os_str().is_empty() {
                        fs::create_dir_all(parent).map_err(|e| {
                            AppError::Memory(format!(
                                "cannot create {}: {e}",
                                parent.display()
                            ))
                        })?;
                    }
                }
                let json = serde_json::to_string_pretty(records)
                    .map_err(|e| AppError::Memory(format!("serialize memory: {e}")))?;
                let tmp = path.with_extension("json.tmp");
                fs::write(&tmp, json).map_err(|e| {
                    AppError::Memory(format!("cannot write {}: {e}", tmp.display()))
                })?;
                fs::rename(&tmp, path).map_err(|e| {
                    AppError::Memory(format!(
                        "cannot rename {} -> {}: {e}",
                        tmp.display(),
                        path.display()
                    ))
                })
            }
        }
    }

    /// Human-readable location, for degraded-run warnings.
    pub fn describe(&self) -> String {
        match self {
            MemoryBackend::InMemory(_) => "<in-memory>".into(),
            MemoryBackend::JsonFile(path) => path.display().to_string(),
        }
    }
}

fn poisoned() -> AppError {
    AppError::Memory("in-memory backend mutex poisoned".into())
}

impl RunWarning {
    /// Warning emitted when a corrupt store forces an empty-memory run.
    pub fn memory_corrupt(detail: impl std::fmt::Display) -> Self {
        RunWarning::new("memory_corrupt", format!("{detail}; proceeding with empty memory"))
    }
}
