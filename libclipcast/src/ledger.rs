//! Flat-file bookkeeping
//!
//! Two append-only text files stand in for a database: the processed ledger
//! holds one clipping identity per line, the unfollow journal one
//! `"{account_id} - {handle}"` line per account we have dropped.

use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use crate::clippings::Clipping;
use crate::error::{LedgerError, Result};

fn io_error(path: &Path, source: std::io::Error) -> LedgerError {
    LedgerError::Io {
        path: path.display().to_string(),
        source,
    }
}

/// Read a ledger file; a missing file reads as empty
fn read_lines(path: &Path) -> Result<Vec<String>> {
    match fs::read_to_string(path) {
        Ok(contents) => Ok(contents
            .lines()
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(io_error(path, e).into()),
    }
}

fn append_line(path: &Path, line: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| io_error(parent, e))?;
        }
    }

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| io_error(path, e))?;
    writeln!(file, "{}", line).map_err(|e| io_error(path, e))?;

    Ok(())
}

/// Set of clipping identities that have been posted or skipped
#[derive(Debug, Clone)]
pub struct ProcessedLedger {
    path: PathBuf,
}

impl ProcessedLedger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn load(&self) -> Result<HashSet<String>> {
        Ok(read_lines(&self.path)?.into_iter().collect())
    }

    pub fn contains(&self, id: &str) -> Result<bool> {
        Ok(self.load()?.contains(id))
    }

    /// Record a clipping as processed
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::AlreadyProcessed` if the clipping is already recorded.
    pub fn mark(&self, clipping: &Clipping) -> Result<()> {
        let id = clipping.id();
        if self.contains(&id)? {
            return Err(LedgerError::AlreadyProcessed(id).into());
        }

        append_line(&self.path, &id)?;
        tracing::debug!("Marked clipping as processed: {}", id);
        Ok(())
    }
}

/// Accounts we have unfollowed before and should leave alone
#[derive(Debug, Clone)]
pub struct UnfollowJournal {
    path: PathBuf,
}

impl UnfollowJournal {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn load_ids(&self) -> Result<HashSet<String>> {
        Ok(read_lines(&self.path)?
            .iter()
            .map(|line| match line.split_once(" - ") {
                Some((id, _)) => id.to_string(),
                None => line.trim().to_string(),
            })
            .collect())
    }

    pub fn record(&self, account_id: &str, handle: &str) -> Result<()> {
        append_line(&self.path, &format!("{} - {}", account_id, handle))
    }
}
