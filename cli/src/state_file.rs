//! On-disk stand-in for the browser's cookie jar and `localStorage`.
//!
//! The CLI is a fresh process per command, so the two storage media are
//! loaded from a JSON file before the command runs and written back after.

#[cfg(test)]
#[path = "state_file_test.rs"]
mod tests;

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::Path;
use std::sync::Arc;

use client::state::storage::{MemoryCookieJar, MemoryStorage};
use serde::{Deserialize, Serialize};

use crate::CliError;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StateFile {
    pub cookies: BTreeMap<String, String>,
    pub storage: BTreeMap<String, String>,
}

impl StateFile {
    /// Read the state file; a missing file is an empty state.
    ///
    /// # Errors
    ///
    /// Unreadable or malformed files.
    pub fn load(path: &Path) -> Result<Self, CliError> {
        match std::fs::read_to_string(path) {
            Ok(raw) => Ok(serde_json::from_str(&raw)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// # Errors
    ///
    /// Any filesystem failure.
    pub fn save(&self, path: &Path) -> Result<(), CliError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let rendered = serde_json::to_string_pretty(self)?;
        std::fs::write(path, rendered)?;
        Ok(())
    }

    /// Live media seeded from this state.
    #[must_use]
    pub fn media(self) -> (Arc<MemoryCookieJar>, Arc<MemoryStorage>) {
        (
            Arc::new(MemoryCookieJar::from_snapshot(self.cookies)),
            Arc::new(MemoryStorage::from_snapshot(self.storage)),
        )
    }

    /// Capture the media after a command ran.
    #[must_use]
    pub fn capture(jar: &MemoryCookieJar, storage: &MemoryStorage) -> Self {
        Self { cookies: jar.snapshot(), storage: storage.snapshot() }
    }
}
