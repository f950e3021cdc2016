use crate::error::Result;
use adresx_core::{ProcessingLogEntry, ProcessingLogSink};
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Append-only processing log, one JSON entry per line
pub struct JsonlProcessingLog {
    file: Arc<Mutex<BufWriter<File>>>,
    raw_file: Arc<Mutex<File>>, // for fsync
    path: PathBuf,
}

impl JsonlProcessingLog {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let raw_file = file.try_clone()?;

        Ok(Self {
            file: Arc::new(Mutex::new(BufWriter::new(file))),
            raw_file: Arc::new(Mutex::new(raw_file)),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one entry and flush it to the OS
    #[inline]
    pub fn write_entry(&self, entry: &ProcessingLogEntry) -> Result<()> {
        let line = serde_json::to_vec(entry)?;
        let mut writer = self.file.lock();
        writer.write_all(&line)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        Ok(())
    }

    /// Flush and fdatasync
    #[inline]
    pub fn sync(&self) -> Result<()> {
        let mut writer = self.file.lock();
        writer.flush()?;
        let raw = self.raw_file.lock();
        raw.sync_data()?;
        Ok(())
    }

    /// Every entry in the file, oldest first. Blank lines are skipped.
    pub fn read_entries(&self) -> Result<Vec<ProcessingLogEntry>> {
        self.file.lock().flush()?;
        let reader = BufReader::new(File::open(&self.path)?);
        let mut entries = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            entries.push(serde_json::from_str(&line)?);
        }
        Ok(entries)
    }
}

impl ProcessingLogSink for JsonlProcessingLog {
    fn append(&self, entry: &ProcessingLogEntry) -> adresx_core::Result<()> {
        Ok(self.write_entry(entry)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use adresx_core::OperationType;
    use serde_json::json;

    #[test]
    fn test_append_and_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let log = JsonlProcessingLog::open(dir.path().join("processing.jsonl")).unwrap();

        let ok = ProcessingLogEntry::new(OperationType::ProcessAddress, json!({"raw": "moda"}))
            .with_output(json!({"status": "needs_review"}))
            .with_duration_ms(2);
        let failed = ProcessingLogEntry::new(OperationType::ProcessAddress, json!({"raw": ""}))
            .with_error("address text is empty");
        log.append(&ok).unwrap();
        log.append(&failed).unwrap();
        log.sync().unwrap();

        let entries = log.read_entries().unwrap();
        assert_eq!(entries, vec![ok, failed]);
        assert!(entries[1].is_error());
    }

    #[test]
    fn test_reopen_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("processing.jsonl");
        let first = ProcessingLogEntry::new(OperationType::GroupDuplicates, json!(3));
        JsonlProcessingLog::open(&path).unwrap().append(&first).unwrap();

        let log = JsonlProcessingLog::open(&path).unwrap();
        let second = ProcessingLogEntry::new(OperationType::AddToGroups, json!(4));
        log.append(&second).unwrap();

        let lines = std::fs::read_to_string(&path).unwrap();
        assert_eq!(lines.lines().count(), 2);
        assert_eq!(log.read_entries().unwrap(), vec![first, second]);
    }
}
