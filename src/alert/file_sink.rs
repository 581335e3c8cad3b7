// SPDX-License-Identifier: AGPL-3.0-or-later

use std::{
    fs::{File, OpenOptions},
    io::Write,
    path::PathBuf,
};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FileSinkError {
    #[error("failed to open alert log {path:?}: {source}")]
    Open { path: PathBuf, #[source] source: std::io::Error },

    #[error("failed to write alert record after {attempts} attempt(s): {source}")]
    Write { attempts: u32, #[source] source: std::io::Error },
}

/// The file sink half of the alert manager: one append-only file, behind
/// the single mutex the manager holds around it (§5 shared-resource
/// policy: "one mutex around the file handle").
pub struct FileSink {
    path: PathBuf,
    file: File,
}

impl FileSink {
    pub fn open(path: &str) -> Result<Self, FileSinkError> {
        let path = PathBuf::from(path);
        let file = open_append(&path)?;
        Ok(Self { path, file })
    }

    /// Writes one newline-terminated record, retrying up to `retries` times
    /// by reopening the file between attempts (§4.C failure policy).
    pub fn write_with_retry(&mut self, line: &str, retries: u32) -> Result<(), FileSinkError> {
        let mut attempts = 0;
        loop {
            attempts += 1;
            let result = writeln!(self.file, "{line}");
            match result {
                Ok(()) => return Ok(()),
                Err(source) if attempts <= retries => {
                    tracing::warn!(attempt = attempts, %source, "retrying alert file write after reopen");
                    self.file = open_append(&self.path)?;
                },
                Err(source) => return Err(FileSinkError::Write { attempts, source }),
            }
        }
    }

    pub fn reopen(&mut self) -> Result<(), FileSinkError> {
        self.file = open_append(&self.path)?;
        Ok(())
    }
}

fn open_append(path: &PathBuf) -> Result<File, FileSinkError> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| FileSinkError::Open { path: path.clone(), source })
}
