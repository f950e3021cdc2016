// Gzip-compressed JSON snapshots of the record store
use crate::error::{Result, StorageError};
use crate::rows::{AddressRow, DuplicateGroupRow, DuplicateRelationshipRow};
use chrono::{DateTime, Utc};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Component, Path, PathBuf};
use tracing::info;

const EXTENSION: &str = "snapshot";

/// Snapshot description returned to callers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotDescription {
    pub name: String,
    pub size: u64,
    /// SHA-256 hex of the compressed file
    pub checksum: String,
}

/// Everything the store holds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreSnapshot {
    pub created_at: DateTime<Utc>,
    pub addresses: Vec<AddressRow>,
    pub groups: Vec<DuplicateGroupRow>,
    pub relationships: Vec<DuplicateRelationshipRow>,
}

pub struct SnapshotManager {
    snapshot_dir: PathBuf,
}

impl SnapshotManager {
    pub fn new<P: AsRef<Path>>(snapshot_dir: P) -> Result<Self> {
        let snapshot_dir = snapshot_dir.as_ref().to_path_buf();
        fs::create_dir_all(&snapshot_dir)?;
        Ok(Self { snapshot_dir })
    }

    /// Snapshot filename with timestamp
    fn generate_name(created_at: DateTime<Utc>) -> String {
        format!(
            "adresx-{}.{}",
            created_at.format("%Y-%m-%d-%H-%M-%S-%6f"),
            EXTENSION
        )
    }

    /// Path of a snapshot inside the directory. Only bare `*.snapshot` file
    /// names are accepted.
    fn path_for(&self, name: &str) -> Result<PathBuf> {
        let mut components = Path::new(name).components();
        let bare = matches!(
            (components.next(), components.next()),
            (Some(Component::Normal(_)), None)
        );
        let is_snapshot = Path::new(name).extension().and_then(|s| s.to_str()) == Some(EXTENSION);
        if !bare || !is_snapshot || name.contains(['/', '\\']) {
            return Err(StorageError::InvalidSnapshotName(name.to_string()));
        }
        Ok(self.snapshot_dir.join(name))
    }

    fn checksum(bytes: &[u8]) -> String {
        format!("{:x}", Sha256::digest(bytes))
    }

    pub fn create(&self, snapshot: &StoreSnapshot) -> Result<SnapshotDescription> {
        let name = Self::generate_name(snapshot.created_at);
        let path = self.snapshot_dir.join(&name);

        let json_data = serde_json::to_vec(snapshot)?;
        let file = File::create(&path)?;
        let mut encoder = GzEncoder::new(BufWriter::new(file), Compression::default());
        encoder.write_all(&json_data)?;
        encoder.finish()?.flush()?;

        let file_data = fs::read(&path)?;
        let description = SnapshotDescription {
            name,
            size: file_data.len() as u64,
            checksum: Self::checksum(&file_data),
        };
        info!(
            snapshot = %description.name,
            addresses = snapshot.addresses.len(),
            groups = snapshot.groups.len(),
            "store snapshot written"
        );
        Ok(description)
    }

    /// Snapshots in the directory, newest first
    pub fn list(&self) -> Result<Vec<SnapshotDescription>> {
        let mut snapshots = Vec::new();
        for entry in fs::read_dir(&self.snapshot_dir)? {
            let path = entry?.path();
            if path.extension().and_then(|s| s.to_str()) != Some(EXTENSION) {
                continue;
            }
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                let file_data = fs::read(&path)?;
                snapshots.push(SnapshotDescription {
                    name: name.to_string(),
                    size: file_data.len() as u64,
                    checksum: Self::checksum(&file_data),
                });
            }
        }
        snapshots.sort_by(|a, b| b.name.cmp(&a.name));
        Ok(snapshots)
    }

    /// Load a snapshot, verifying its checksum when one is given
    pub fn load(&self, name: &str, expected_checksum: Option<&str>) -> Result<StoreSnapshot> {
        let path = self.path_for(name)?;
        if let Some(expected) = expected_checksum {
            let actual = Self::checksum(&fs::read(&path)?);
            if actual != expected {
                return Err(StorageError::ChecksumMismatch {
                    expected: expected.to_string(),
                    actual,
                });
            }
        }

        let file = File::open(&path)?;
        let mut decoder = GzDecoder::new(BufReader::new(file));
        let mut json_data = Vec::new();
        decoder.read_to_end(&mut json_data)?;
        Ok(serde_json::from_slice(&json_data)?)
    }

    /// Newest snapshot, if any
    pub fn load_latest(&self) -> Result<Option<StoreSnapshot>> {
        match self.list()?.first() {
            Some(latest) => self.load(&latest.name, Some(&latest.checksum)).map(Some),
            None => Ok(None),
        }
    }

    pub fn delete(&self, name: &str) -> Result<bool> {
        let path = self.path_for(name)?;
        if path.exists() {
            fs::remove_file(&path)?;
            Ok(true)
        } else {
            Ok(false)
        }
    }
}
