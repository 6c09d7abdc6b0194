// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Per-component snapshot archives.
//!
//! Each component writes one JSON file named after itself inside a
//! caller-supplied directory. Loading is all-or-nothing: the archive must
//! exist and hold exactly the keys the component asks for.

use super::compartment::Tensor;
use super::error::{NeuralError, Result};
use super::key::PrngKey;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// A single archived value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ArchiveEntry {
    Tensor(Tensor),
    Key(PrngKey),
}

/// Key-indexed snapshot of one component's persistent state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Archive {
    component: String,
    entries: BTreeMap<String, ArchiveEntry>,
}

impl Archive {
    pub fn new(component: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            entries: BTreeMap::new(),
        }
    }

    /// File path used for a component inside `directory`
    pub fn path_for(directory: &Path, component: &str) -> PathBuf {
        directory.join(format!("{}.json", component))
    }

    pub fn with_tensor(mut self, key: &str, value: Tensor) -> Self {
        self.entries.insert(key.to_string(), ArchiveEntry::Tensor(value));
        self
    }

    pub fn with_key(mut self, key: &str, value: PrngKey) -> Self {
        self.entries.insert(key.to_string(), ArchiveEntry::Key(value));
        self
    }

    pub fn keys(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Write `<directory>/<component>.json`
    pub fn write(&self, directory: &Path) -> Result<PathBuf> {
        fs::create_dir_all(directory)?;
        let path = Self::path_for(directory, &self.component);
        let json = serde_json::to_string(self)?;
        fs::write(&path, json)?;
        debug!(component = %self.component, path = %path.display(), "archive written");
        Ok(path)
    }

    /// Read `<directory>/<component>.json`
    pub fn read(directory: &Path, component: &str) -> Result<Self> {
        let path = Self::path_for(directory, component);
        if !path.exists() {
            return Err(NeuralError::MissingArchive(path));
        }
        let content = fs::read_to_string(&path)?;
        let archive: Archive = serde_json::from_str(&content)?;
        debug!(component, path = %path.display(), keys = ?archive.keys(), "archive read");
        Ok(archive)
    }

    /// Fail unless the archive holds exactly `expected`
    pub fn expect_exact_keys(&self, expected: &[&str]) -> Result<()> {
        let mut wanted: Vec<String> = expected.iter().map(|k| k.to_string()).collect();
        wanted.sort();
        let found = self.keys();
        if wanted != found {
            return Err(NeuralError::ArchiveKeyMismatch {
                component: self.component.clone(),
                expected: wanted,
                found,
            });
        }
        Ok(())
    }

    pub fn tensor(&self, key: &str) -> Result<Tensor> {
        match self.entries.get(key) {
            Some(ArchiveEntry::Tensor(t)) => Ok(t.clone()),
            _ => Err(self.key_error(key)),
        }
    }

    pub fn key(&self, key: &str) -> Result<PrngKey> {
        match self.entries.get(key) {
            Some(ArchiveEntry::Key(k)) => Ok(*k),
            _ => Err(self.key_error(key)),
        }
    }

    fn key_error(&self, key: &str) -> NeuralError {
        NeuralError::ArchiveKeyMismatch {
            component: self.component.clone(),
            expected: vec![key.to_string()],
            found: self.keys(),
        }
    }
}
