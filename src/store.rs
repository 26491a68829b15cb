use std::{
    marker::PhantomData,
    path::{Path, PathBuf},
};

use serde::{Serialize, de::DeserializeOwned};

use crate::error::Result;

/// Single-slot JSON record. Every save replaces the whole file.
#[derive(Debug, Clone)]
pub struct JsonFile<T> {
    path: PathBuf,
    _record: PhantomData<T>,
}

impl<T> JsonFile<T>
where
    T: Serialize + DeserializeOwned,
{
    pub fn new(path: impl Into<PathBuf>) -> Self {
        JsonFile {
            path: path.into(),
            _record: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<Option<T>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&self.path).inspect_err(|err| {
            tracing::error!("Error reading {}: {}", self.path.display(), err)
        })?;
        let record = serde_json::from_str(&content).inspect_err(|err| {
            tracing::error!("Error parsing {}: {}", self.path.display(), err)
        })?;
        Ok(Some(record))
    }

    pub fn save(&self, record: &T) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let content = serde_json::to_string_pretty(record)?;

        // Write beside the target and rename so a crash never leaves half a record.
        let mut tmp_path = self.path.clone().into_os_string();
        tmp_path.push(".tmp");
        std::fs::write(&tmp_path, content)?;
        std::fs::rename(&tmp_path, &self.path).inspect_err(|err| {
            tracing::error!("Error replacing {}: {}", self.path.display(), err)
        })?;
        Ok(())
    }

    pub fn clear(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}
