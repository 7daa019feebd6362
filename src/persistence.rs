//! Load/save hooks. Transport (device storage, sheet-backed storage, HTTP
//! sync) lives outside this crate; anything that can move a
//! [`StoreSnapshot`] implements [`MisPersistence`].

use crate::error::Result;
use crate::record::MonthlyMisRecord;
use crate::rules::ClassificationRule;
use log::info;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreSnapshot {
    #[serde(default)]
    pub records: Vec<MonthlyMisRecord>,
    #[serde(default)]
    pub rules: Vec<ClassificationRule>,
}

impl StoreSnapshot {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

pub trait MisPersistence {
    fn load(&self) -> Result<StoreSnapshot>;
    fn save(&self, snapshot: &StoreSnapshot) -> Result<()>;
}

/// Keeps the whole store in one pretty-printed JSON file. A missing file
/// loads as an empty snapshot.
#[derive(Debug, Clone)]
pub struct JsonFilePersistence {
    path: PathBuf,
}

impl JsonFilePersistence {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl MisPersistence for JsonFilePersistence {
    fn load(&self) -> Result<StoreSnapshot> {
        if !self.path.exists() {
            info!("{} does not exist, starting empty", self.path.display());
            return Ok(StoreSnapshot::default());
        }
        let contents = std::fs::read_to_string(&self.path)?;
        StoreSnapshot::from_json(&contents)
    }

    fn save(&self, snapshot: &StoreSnapshot) -> Result<()> {
        std::fs::write(&self.path, snapshot.to_json()?)?;
        info!(
            "Saved {} months and {} rules to {}",
            snapshot.records.len(),
            snapshot.rules.len(),
            self.path.display()
        );
        Ok(())
    }
}
