// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;

use crate::errors::EngineError;
use crate::types::Credential;

/// Append-only durable sink for confirmed credentials. Writes are serialized
/// through a mutex and synced to disk immediately so a partial run never
/// loses results. Durability over throughput on this path: successes are
/// rare relative to attempts.
pub struct SuccessSink {
    file: Mutex<File>,
}

impl SuccessSink {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, EngineError> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|source| EngineError::OutputUnwritable {
                path: path.display().to_string(),
                source,
            })?;

        Ok(Self {
            file: Mutex::new(file),
        })
    }

    /// Append one `host;username;password` line and flush it to disk.
    pub fn record(&self, cred: &Credential) -> std::io::Result<()> {
        let line = cred.as_line();
        let mut file = self.file.lock();
        writeln!(file, "{}", line)?;
        file.flush()?;
        file.sync_all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_one_line_per_success() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("valid.txt");
        let sink = SuccessSink::open(&path).unwrap();

        sink.record(&Credential::new("10.0.0.1", "admin", "admin"))
            .unwrap();
        sink.record(&Credential::new("10.0.0.2", "root", "toor"))
            .unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "10.0.0.1;admin;admin\n10.0.0.2;root;toor\n");
    }

    #[test]
    fn appends_across_reopens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("valid.txt");

        {
            let sink = SuccessSink::open(&path).unwrap();
            sink.record(&Credential::new("10.0.0.1", "admin", "admin"))
                .unwrap();
        }
        {
            let sink = SuccessSink::open(&path).unwrap();
            sink.record(&Credential::new("10.0.0.1", "admin", "admin"))
                .unwrap();
        }

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 2);
    }

    #[test]
    fn unwritable_path_is_a_setup_error() {
        let result = SuccessSink::open("/nonexistent-dir/valid.txt");
        assert!(matches!(result, Err(EngineError::OutputUnwritable { .. })));
    }
}
