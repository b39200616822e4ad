//! State store and lock writer
//!
//! Each access config `<name>.json` has a sibling `<name>.json.lock` holding
//! the checksum of the desired bytes last processed and a full copy of the
//! document as applied. The lock is written only by this module.

use crate::checksum;
use crate::codec::{DocumentCodec, to_canonical_json};
use crate::error::{Error, Result};
use crate::types::AccessDocument;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Last applied state plus the checksum of the desired bytes it came from
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LockedDocument {
    pub checksum: String,
    pub document: AccessDocument,
}

impl LockedDocument {
    /// Lock contents for a document whose canonical bytes were just written
    pub fn from_applied(written: &[u8], document: AccessDocument) -> Self {
        Self {
            checksum: checksum::digest(written),
            document,
        }
    }

    /// Whether this is the bootstrap (no lock yet) state
    pub fn is_empty(&self) -> bool {
        self.checksum.is_empty() && self.document.is_empty()
    }
}

/// On-disk lock layout
#[derive(Debug, Serialize, Deserialize)]
struct LockFile {
    #[serde(default)]
    checksum: String,
    #[serde(default)]
    locked_config: Value,
}

/// Loads and persists the desired and locked documents of one access config
#[derive(Debug, Clone)]
pub struct StateStore {
    desired_path: PathBuf,
    lock_path: PathBuf,
}

impl StateStore {
    /// Store for a desired document, with the lock file next to it
    pub fn for_config(desired_path: impl Into<PathBuf>) -> Self {
        let desired_path = desired_path.into();
        let mut lock_name = desired_path.clone().into_os_string();
        lock_name.push(".lock");
        Self {
            desired_path,
            lock_path: PathBuf::from(lock_name),
        }
    }

    pub fn desired_path(&self) -> &Path {
        &self.desired_path
    }

    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }

    /// Read the raw desired bytes
    pub fn read_desired_raw(&self) -> Result<Vec<u8>> {
        fs::read(&self.desired_path).map_err(|e| Error::unreadable(&self.desired_path, e))
    }

    /// Load the desired document, returning its raw bytes alongside
    pub fn load_desired(&self, codec: &dyn DocumentCodec) -> Result<(Vec<u8>, AccessDocument)> {
        let raw = self.read_desired_raw()?;
        let document = codec
            .decode(&raw)
            .map_err(|e| Error::unreadable(&self.desired_path, e))?;

        log::debug!(
            "Loaded {} subjects from {}",
            document.len(),
            self.desired_path.display()
        );
        Ok((raw, document))
    }

    /// Load the locked document; a missing lock file is the empty bootstrap state
    pub fn load_locked(&self, codec: &dyn DocumentCodec) -> Result<LockedDocument> {
        let raw = match fs::read(&self.lock_path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                log::debug!(
                    "Lock file {} does not exist, starting from empty state",
                    self.lock_path.display()
                );
                return Ok(LockedDocument::default());
            }
            Err(e) => return Err(Error::unreadable(&self.lock_path, e)),
        };

        let lock: LockFile =
            serde_json::from_slice(&raw).map_err(|e| Error::unreadable(&self.lock_path, e))?;

        let document = match lock.locked_config {
            Value::Null => AccessDocument::new(),
            value => codec
                .from_value(value)
                .map_err(|e| Error::unreadable(&self.lock_path, e))?,
        };

        Ok(LockedDocument {
            checksum: lock.checksum,
            document,
        })
    }

    /// Rewrite the desired document in canonical form, returning the bytes written
    pub fn persist(&self, codec: &dyn DocumentCodec, document: &AccessDocument) -> Result<Vec<u8>> {
        let bytes = codec
            .encode(document)
            .map_err(|e| self.write_failed(&self.desired_path, e.into()))?;
        fs::write(&self.desired_path, &bytes)
            .map_err(|e| self.write_failed(&self.desired_path, e))?;

        log::debug!("Rewrote {}", self.desired_path.display());
        Ok(bytes)
    }

    /// Overwrite the lock file
    pub fn persist_lock(&self, codec: &dyn DocumentCodec, locked: &LockedDocument) -> Result<()> {
        let lock = LockFile {
            checksum: locked.checksum.clone(),
            locked_config: codec
                .to_value(&locked.document)
                .map_err(|e| self.write_failed(&self.lock_path, e.into()))?,
        };
        let bytes =
            to_canonical_json(&lock).map_err(|e| self.write_failed(&self.lock_path, e.into()))?;
        fs::write(&self.lock_path, bytes).map_err(|e| self.write_failed(&self.lock_path, e))?;

        log::debug!("Saved lock to {}", self.lock_path.display());
        Ok(())
    }

    fn write_failed(&self, path: &Path, source: io::Error) -> Error {
        Error::WriteFailed {
            path: path.to_path_buf(),
            source,
        }
    }
}
