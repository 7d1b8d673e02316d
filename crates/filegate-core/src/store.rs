use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use filegate_util::filename::split_name;
use thiserror::Error;

/// Upper bound on `name(n).ext` probes before giving up.
const MAX_NAME_PROBES: u32 = 10_000;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("no free name for {0} after {max} attempts", max = MAX_NAME_PROBES)]
    Exhausted(String),
}

/// Candidate names for `desired`: the name itself, then `stem(1)suffix`,
/// `stem(2)suffix` and so on.
fn candidates(desired: &str) -> impl Iterator<Item = String> + '_ {
    let (stem, suffix) = split_name(desired);
    std::iter::once(desired.to_string())
        .chain((1..=MAX_NAME_PROBES).map(move |n| format!("{stem}({n}){suffix}")))
}

/// First name in the candidate sequence not present in `directory`.
///
/// Probe only: another writer may take the name before the caller writes.
/// `ReceivedStore::persist` reserves and writes in one step.
pub fn next_available_name(directory: &Path, desired: &str) -> Result<String, StoreError> {
    for name in candidates(desired) {
        if !directory.join(&name).try_exists()? {
            return Ok(name);
        }
    }
    Err(StoreError::Exhausted(desired.to_string()))
}

/// Directory that receives uploads which passed the gate.
#[derive(Debug, Clone)]
pub struct ReceivedStore {
    root: PathBuf,
}

impl ReceivedStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn ensure_dir(&self) -> Result<(), StoreError> {
        std::fs::create_dir_all(&self.root)?;
        Ok(())
    }

    /// Write `bytes` under the first free candidate name. Names are reserved
    /// with exclusive create, so concurrent uploads never share a file.
    /// Returns the final file name.
    pub fn persist(&self, desired: &str, bytes: &[u8]) -> Result<String, StoreError> {
        for name in candidates(desired) {
            let path = self.root.join(&name);
            let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => file,
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e.into()),
            };
            if let Err(e) = file.write_all(bytes).and_then(|_| file.sync_all()) {
                let _ = std::fs::remove_file(&path);
                return Err(e.into());
            }
            tracing::info!("Stored upload as {}", path.display());
            return Ok(name);
        }
        Err(StoreError::Exhausted(desired.to_string()))
    }
}
