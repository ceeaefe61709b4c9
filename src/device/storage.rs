//! On-device chunk storage.
//!
//! Each chunk is one file under the storage directory. The name is the
//! chunk's timestamp as 10-digit zero-padded decimal, so lexicographic
//! order equals numeric order, plus an extension carrying its state:
//!
//! - `NNNNNNNNNN.part` — being written; excluded from enumeration
//! - `NNNNNNNNNN.mono` — finalized, timestamp is unsynced monotonic time
//! - `NNNNNNNNNN.bin`  — finalized, timestamp is wall-clock time
//!
//! The 17-byte file header holds `data_size = 0` as a placeholder until
//! finalize back-fills the real size. Readers must recover the size from
//! the file length when they see the placeholder; a chunk is never
//! discarded just because its header is stale. Deletion happens only on a
//! host acknowledgment naming the chunk's timestamp.

use crate::defaults;
use crate::device::clock::Timestamp;
use crate::error::{PendantError, Result};
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Magic bytes opening every chunk file.
pub const FILE_MAGIC: [u8; 4] = *b"PNDT";
/// Encoded size of [`ChunkFileHeader`].
pub const FILE_HEADER_SIZE: usize = 17;

const EXT_VISIBLE: &str = "bin";
const EXT_UNSYNCED: &str = "mono";
const EXT_PART: &str = "part";

/// Fixed header at the start of every chunk file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkFileHeader {
    pub timestamp: u32,
    pub codec_id: u8,
    pub sample_rate: u32,
    /// Payload bytes after the header; 0 until the chunk is finalized.
    pub data_size: u32,
}

impl ChunkFileHeader {
    pub fn encode(&self) -> [u8; FILE_HEADER_SIZE] {
        let mut buf = [0u8; FILE_HEADER_SIZE];
        buf[0..4].copy_from_slice(&FILE_MAGIC);
        buf[4..8].copy_from_slice(&self.timestamp.to_le_bytes());
        buf[8] = self.codec_id;
        buf[9..13].copy_from_slice(&self.sample_rate.to_le_bytes());
        buf[13..17].copy_from_slice(&self.data_size.to_le_bytes());
        buf
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < FILE_HEADER_SIZE {
            return Err(PendantError::Storage {
                message: format!("chunk header of {} bytes, expected {}", bytes.len(), FILE_HEADER_SIZE),
            });
        }
        if bytes[0..4] != FILE_MAGIC {
            return Err(PendantError::Storage {
                message: "bad magic in chunk file".to_string(),
            });
        }
        Ok(Self {
            timestamp: u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
            codec_id: bytes[8],
            sample_rate: u32::from_le_bytes([bytes[9], bytes[10], bytes[11], bytes[12]]),
            data_size: u32::from_le_bytes([bytes[13], bytes[14], bytes[15], bytes[16]]),
        })
    }
}

/// One finalized chunk as seen by enumeration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkEntry {
    pub timestamp: u32,
    /// False when the timestamp is unsynced monotonic time.
    pub synced: bool,
    pub path: PathBuf,
}

/// What [`ChunkStore::recover`] found and fixed after a crash.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RecoveryReport {
    /// In-progress files with payload, promoted to finalized chunks.
    pub promoted: usize,
    /// Header-only in-progress files, removed.
    pub removed_empty: usize,
    /// Unsynced files already carrying a corrected header timestamp
    /// (crash mid-retimestamp), renamed into place.
    pub renamed: usize,
}

impl RecoveryReport {
    fn is_empty(&self) -> bool {
        self.promoted == 0 && self.removed_empty == 0 && self.renamed == 0
    }
}

/// Directory of chunk files with crash recovery.
pub struct ChunkStore {
    dir: PathBuf,
}

impl ChunkStore {
    /// Opens (creating if needed) the storage directory and runs crash
    /// recovery over its contents.
    ///
    /// Recovery treats every `.part` file as a crash leftover, so open the
    /// store before any writer is active in the same directory.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let store = Self { dir: dir.into() };
        fs::create_dir_all(&store.dir)?;
        let report = store.recover()?;
        if !report.is_empty() {
            info!(
                promoted = report.promoted,
                removed_empty = report.removed_empty,
                renamed = report.renamed,
                "chunk store recovery"
            );
        }
        Ok(store)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn file_name(timestamp: u32, ext: &str) -> String {
        format!("{:010}.{}", timestamp, ext)
    }

    fn path_for(&self, timestamp: u32, ext: &str) -> PathBuf {
        self.dir.join(Self::file_name(timestamp, ext))
    }

    /// Opens a new in-progress chunk file with a placeholder header.
    pub fn create(&self, timestamp: Timestamp, codec_id: u8, sample_rate: u32) -> Result<ChunkWriter> {
        let part_path = self.path_for(timestamp.secs, EXT_PART);
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&part_path)?;

        let header = ChunkFileHeader {
            timestamp: timestamp.secs,
            codec_id,
            sample_rate,
            data_size: 0,
        };
        file.write_all(&header.encode())?;

        Ok(ChunkWriter {
            file,
            part_path,
            dir: self.dir.clone(),
            timestamp,
            payload_bytes: 0,
        })
    }

    /// Finalized chunks sorted ascending by timestamp, at most `limit`.
    ///
    /// In-progress files are excluded. Unsynced chunks sort first since
    /// monotonic timestamps are tiny next to epoch seconds.
    pub fn enumerate(&self, limit: usize) -> Result<Vec<ChunkEntry>> {
        let mut entries = Vec::new();
        for dirent in fs::read_dir(&self.dir)? {
            let path = dirent?.path();
            if let Some(entry) = parse_entry(&path) {
                entries.push(entry);
            }
        }
        entries.sort_by_key(|e| e.timestamp);
        entries.truncate(limit);
        Ok(entries)
    }

    /// Number of finalized chunks currently stored.
    pub fn pending_count(&self) -> Result<usize> {
        Ok(self.enumerate(usize::MAX)?.len())
    }

    /// Reads a finalized chunk's header and payload.
    ///
    /// A placeholder `data_size` is recovered from the file length. A file
    /// shorter than its declared size is corrupt.
    pub fn read_chunk(&self, entry: &ChunkEntry) -> Result<(ChunkFileHeader, Vec<u8>)> {
        let mut file = File::open(&entry.path)?;
        let mut header_buf = [0u8; FILE_HEADER_SIZE];
        file.read_exact(&mut header_buf).map_err(|e| PendantError::CorruptChunk {
            path: entry.path.display().to_string(),
            message: format!("short header: {}", e),
        })?;
        let mut header = ChunkFileHeader::decode(&header_buf).map_err(|e| {
            PendantError::CorruptChunk {
                path: entry.path.display().to_string(),
                message: e.to_string(),
            }
        })?;

        let mut payload = Vec::new();
        file.read_to_end(&mut payload)?;

        if header.data_size == 0 && !payload.is_empty() {
            // Power loss before finalize; the payload on disk is the truth.
            header.data_size = payload.len() as u32;
            warn!(
                ts = header.timestamp,
                recovered_size = header.data_size,
                "unfinalized chunk header, recovered data size from file length"
            );
        } else if (payload.len() as u32) < header.data_size {
            return Err(PendantError::CorruptChunk {
                path: entry.path.display().to_string(),
                message: format!(
                    "payload of {} bytes shorter than declared {}",
                    payload.len(),
                    header.data_size
                ),
            });
        } else if payload.len() as u32 > header.data_size {
            payload.truncate(header.data_size as usize);
        }

        Ok((header, payload))
    }

    /// Deletes the chunk with this timestamp, the sole removal path.
    ///
    /// Returns false when no such chunk exists; an acknowledgment for an
    /// unknown timestamp is a no-op, not an error.
    pub fn delete(&self, timestamp: u32) -> Result<bool> {
        for ext in [EXT_VISIBLE, EXT_UNSYNCED] {
            let path = self.path_for(timestamp, ext);
            if path.exists() {
                fs::remove_file(&path)?;
                debug!(ts = timestamp, "deleted chunk");
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Rewrites an unsynced chunk's timestamp and renames it into place.
    ///
    /// The header is rewritten and synced before the rename, so a crash in
    /// between leaves a `.mono` file whose header already carries wall time;
    /// [`ChunkStore::recover`] finishes the rename on the next open.
    pub fn retimestamp(&self, old_ts: u32, new_ts: u32) -> Result<()> {
        let old_path = self.path_for(old_ts, EXT_UNSYNCED);
        let mut file = OpenOptions::new().write(true).open(&old_path)?;
        file.seek(SeekFrom::Start(4))?;
        file.write_all(&new_ts.to_le_bytes())?;
        file.sync_all()?;
        drop(file);

        fs::rename(&old_path, self.path_for(new_ts, EXT_VISIBLE))?;
        debug!(old_ts, new_ts, "retimestamped chunk");
        Ok(())
    }

    /// Repairs the directory after a crash. See [`RecoveryReport`].
    pub fn recover(&self) -> Result<RecoveryReport> {
        let mut report = RecoveryReport::default();
        for dirent in fs::read_dir(&self.dir)? {
            let path = dirent?.path();
            let ext = path.extension().and_then(|e| e.to_str());
            match ext {
                Some(EXT_PART) => {
                    if self.recover_part(&path)? {
                        report.promoted += 1;
                    } else {
                        report.removed_empty += 1;
                    }
                }
                Some(EXT_UNSYNCED) => {
                    if self.recover_unsynced(&path)? {
                        report.renamed += 1;
                    }
                }
                _ => {}
            }
        }
        Ok(report)
    }

    /// Promotes an in-progress file left by a crash. Returns true when the
    /// file had payload and became a finalized chunk.
    fn recover_part(&self, path: &Path) -> Result<bool> {
        let len = fs::metadata(path)?.len();
        if len <= FILE_HEADER_SIZE as u64 {
            fs::remove_file(path)?;
            debug!(path = %path.display(), "removed empty in-progress chunk");
            return Ok(false);
        }

        let mut file = OpenOptions::new().read(true).write(true).open(path)?;
        let mut header_buf = [0u8; FILE_HEADER_SIZE];
        file.read_exact(&mut header_buf)?;
        let header = match ChunkFileHeader::decode(&header_buf) {
            Ok(h) => h,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "unreadable in-progress chunk, removing");
                drop(file);
                fs::remove_file(path)?;
                return Ok(false);
            }
        };

        let data_size = (len - FILE_HEADER_SIZE as u64) as u32;
        file.seek(SeekFrom::Start(13))?;
        file.write_all(&data_size.to_le_bytes())?;
        file.sync_all()?;
        drop(file);

        let ext = if header.timestamp >= defaults::EPOCH_SANITY_MIN {
            EXT_VISIBLE
        } else {
            EXT_UNSYNCED
        };
        fs::rename(path, self.path_for(header.timestamp, ext))?;
        warn!(
            ts = header.timestamp,
            data_size, "promoted in-progress chunk left by crash"
        );
        Ok(true)
    }

    /// Finishes a retimestamp interrupted between header rewrite and
    /// rename. Returns true when a rename was performed.
    fn recover_unsynced(&self, path: &Path) -> Result<bool> {
        let mut file = File::open(path)?;
        let mut header_buf = [0u8; FILE_HEADER_SIZE];
        if file.read_exact(&mut header_buf).is_err() {
            return Ok(false);
        }
        drop(file);
        let header = match ChunkFileHeader::decode(&header_buf) {
            Ok(h) => h,
            Err(_) => return Ok(false),
        };
        if header.timestamp < defaults::EPOCH_SANITY_MIN {
            return Ok(false);
        }
        fs::rename(path, self.path_for(header.timestamp, EXT_VISIBLE))?;
        debug!(ts = header.timestamp, "completed interrupted retimestamp");
        Ok(true)
    }
}

fn parse_entry(path: &Path) -> Option<ChunkEntry> {
    let ext = path.extension()?.to_str()?;
    let synced = match ext {
        EXT_VISIBLE => true,
        EXT_UNSYNCED => false,
        _ => return None,
    };
    let stem = path.file_stem()?.to_str()?;
    let timestamp = stem.parse::<u32>().ok()?;
    Some(ChunkEntry {
        timestamp,
        synced,
        path: path.to_path_buf(),
    })
}

/// Writer for one in-progress chunk file.
///
/// Bytes appended here are already length-prefixed frames; the recorder
/// owns buffering. Dropping the writer without finalizing leaves a `.part`
/// file for recovery, never a half-visible chunk.
pub struct ChunkWriter {
    file: File,
    part_path: PathBuf,
    dir: PathBuf,
    timestamp: Timestamp,
    payload_bytes: u32,
}

impl ChunkWriter {
    /// Appends raw payload bytes to the file.
    pub fn append(&mut self, bytes: &[u8]) -> Result<()> {
        self.file.write_all(bytes)?;
        self.payload_bytes += bytes.len() as u32;
        Ok(())
    }

    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    /// Payload bytes written so far.
    pub fn payload_size(&self) -> u32 {
        self.payload_bytes
    }

    /// Rewrites the open chunk's timestamp in place (header and file name).
    /// Used when wall time arrives while this chunk is still recording.
    pub fn set_timestamp(&mut self, new_ts: Timestamp) -> Result<()> {
        self.file.seek(SeekFrom::Start(4))?;
        self.file.write_all(&new_ts.secs.to_le_bytes())?;
        self.file.seek(SeekFrom::End(0))?;

        let new_part = self.dir.join(ChunkStore::file_name(new_ts.secs, EXT_PART));
        fs::rename(&self.part_path, &new_part)?;
        self.part_path = new_part;
        self.timestamp = new_ts;
        Ok(())
    }

    /// Removes the in-progress file without finalizing.
    pub fn discard(self) -> Result<()> {
        drop(self.file);
        fs::remove_file(&self.part_path)?;
        Ok(())
    }

    /// Back-fills the true data size, syncs, and atomically makes the chunk
    /// visible to enumeration.
    pub fn finalize(mut self) -> Result<ChunkEntry> {
        self.file.seek(SeekFrom::Start(13))?;
        self.file.write_all(&self.payload_bytes.to_le_bytes())?;
        self.file.sync_all()?;

        let ext = if self.timestamp.synced {
            EXT_VISIBLE
        } else {
            EXT_UNSYNCED
        };
        let final_path = self.dir.join(ChunkStore::file_name(self.timestamp.secs, ext));
        fs::rename(&self.part_path, &final_path)?;

        debug!(
            ts = self.timestamp.secs,
            bytes = self.payload_bytes,
            synced = self.timestamp.synced,
            "finalized chunk"
        );
        Ok(ChunkEntry {
            timestamp: self.timestamp.secs,
            synced: self.timestamp.synced,
            path: final_path,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::append_frame;
    use tempfile::tempdir;

    fn synced_ts(secs: u32) -> Timestamp {
        Timestamp { secs, synced: true }
    }

    fn write_chunk(store: &ChunkStore, ts: u32, payload: &[u8]) -> ChunkEntry {
        let mut writer = store.create(synced_ts(ts), 1, 16_000).unwrap();
        writer.append(payload).unwrap();
        writer.finalize().unwrap()
    }

    #[test]
    fn test_header_roundtrip() {
        let header = ChunkFileHeader {
            timestamp: 1_700_000_123,
            codec_id: 20,
            sample_rate: 16_000,
            data_size: 4242,
        };
        let buf = header.encode();
        assert_eq!(&buf[0..4], b"PNDT");
        assert_eq!(ChunkFileHeader::decode(&buf).unwrap(), header);
    }

    #[test]
    fn test_header_rejects_bad_magic() {
        let mut buf = ChunkFileHeader {
            timestamp: 1,
            codec_id: 1,
            sample_rate: 16_000,
            data_size: 0,
        }
        .encode();
        buf[0] = b'X';
        assert!(ChunkFileHeader::decode(&buf).is_err());
    }

    #[test]
    fn test_write_and_read_back() {
        let dir = tempdir().unwrap();
        let store = ChunkStore::open(dir.path()).unwrap();

        let mut payload = Vec::new();
        append_frame(&mut payload, &[1, 2, 3]);
        append_frame(&mut payload, &[4, 5]);

        let entry = write_chunk(&store, 1_700_000_000, &payload);
        let (header, read_back) = store.read_chunk(&entry).unwrap();

        assert_eq!(header.timestamp, 1_700_000_000);
        assert_eq!(header.data_size, payload.len() as u32);
        assert_eq!(read_back, payload);
    }

    #[test]
    fn test_enumeration_sorted_and_capped() {
        let dir = tempdir().unwrap();
        let store = ChunkStore::open(dir.path()).unwrap();

        // Insert out of order.
        for ts in [1_700_000_300u32, 1_700_000_100, 1_700_000_200] {
            write_chunk(&store, ts, &[0xAB]);
        }

        let all = store.enumerate(usize::MAX).unwrap();
        let timestamps: Vec<_> = all.iter().map(|e| e.timestamp).collect();
        assert_eq!(timestamps, vec![1_700_000_100, 1_700_000_200, 1_700_000_300]);

        let capped = store.enumerate(2).unwrap();
        assert_eq!(capped.len(), 2);
        assert_eq!(capped[1].timestamp, 1_700_000_200);
    }

    #[test]
    fn test_zero_padded_names_sort_lexicographically() {
        // Numeric order must equal name order even across digit counts.
        assert!(ChunkStore::file_name(99, "bin") < ChunkStore::file_name(100, "bin"));
        assert!(ChunkStore::file_name(999_999_999, "bin") < ChunkStore::file_name(1_700_000_000, "bin"));
    }

    #[test]
    fn test_in_progress_excluded_from_enumeration() {
        let dir = tempdir().unwrap();
        let store = ChunkStore::open(dir.path()).unwrap();

        let _writer = store.create(synced_ts(1_700_000_000), 1, 16_000).unwrap();
        assert!(store.enumerate(usize::MAX).unwrap().is_empty());
    }

    #[test]
    fn test_delete_matching_and_nonmatching() {
        let dir = tempdir().unwrap();
        let store = ChunkStore::open(dir.path()).unwrap();
        write_chunk(&store, 1_700_000_000, &[1]);

        assert!(!store.delete(999).unwrap()); // no-op
        assert_eq!(store.pending_count().unwrap(), 1);
        assert!(store.delete(1_700_000_000).unwrap());
        assert_eq!(store.pending_count().unwrap(), 0);
    }

    #[test]
    fn test_placeholder_data_size_recovered_on_read() {
        let dir = tempdir().unwrap();
        let store = ChunkStore::open(dir.path()).unwrap();

        // Simulate power loss: finalized name, but header still placeholder.
        let header = ChunkFileHeader {
            timestamp: 1_700_000_000,
            codec_id: 1,
            sample_rate: 16_000,
            data_size: 0,
        };
        let payload = vec![0x5A; 342];
        let path = dir.path().join("1700000000.bin");
        let mut bytes = header.encode().to_vec();
        bytes.extend_from_slice(&payload);
        fs::write(&path, &bytes).unwrap();

        let entries = store.enumerate(usize::MAX).unwrap();
        let (read_header, read_payload) = store.read_chunk(&entries[0]).unwrap();
        assert_eq!(read_header.data_size, 342);
        assert_eq!(read_payload, payload);
    }

    #[test]
    fn test_truncated_chunk_is_corrupt() {
        let dir = tempdir().unwrap();
        let store = ChunkStore::open(dir.path()).unwrap();

        let header = ChunkFileHeader {
            timestamp: 1_700_000_000,
            codec_id: 1,
            sample_rate: 16_000,
            data_size: 100,
        };
        let mut bytes = header.encode().to_vec();
        bytes.extend_from_slice(&[0u8; 10]); // 90 bytes short
        fs::write(dir.path().join("1700000000.bin"), &bytes).unwrap();

        let entries = store.enumerate(usize::MAX).unwrap();
        assert!(matches!(
            store.read_chunk(&entries[0]),
            Err(PendantError::CorruptChunk { .. })
        ));
    }

    #[test]
    fn test_recover_promotes_part_with_payload() {
        let dir = tempdir().unwrap();
        {
            let store = ChunkStore::open(dir.path()).unwrap();
            let mut writer = store.create(synced_ts(1_700_000_000), 1, 16_000).unwrap();
            writer.append(&[0xAA; 342]).unwrap();
            // Crash: writer dropped without finalize.
        }

        let store = ChunkStore::open(dir.path()).unwrap();
        let entries = store.enumerate(usize::MAX).unwrap();
        assert_eq!(entries.len(), 1);
        let (header, payload) = store.read_chunk(&entries[0]).unwrap();
        assert_eq!(header.data_size, 342);
        assert_eq!(payload.len(), 342);
    }

    #[test]
    fn test_recover_removes_empty_part() {
        let dir = tempdir().unwrap();
        {
            let store = ChunkStore::open(dir.path()).unwrap();
            let _writer = store.create(synced_ts(1_700_000_000), 1, 16_000).unwrap();
        }

        let store = ChunkStore::open(dir.path()).unwrap();
        assert!(store.enumerate(usize::MAX).unwrap().is_empty());
        assert!(fs::read_dir(store.dir()).unwrap().next().is_none());
    }

    #[test]
    fn test_recover_part_with_monotonic_timestamp_stays_unsynced() {
        let dir = tempdir().unwrap();
        {
            let store = ChunkStore::open(dir.path()).unwrap();
            let mut writer = store
                .create(Timestamp { secs: 120, synced: false }, 1, 16_000)
                .unwrap();
            writer.append(&[1, 2, 3]).unwrap();
        }

        let store = ChunkStore::open(dir.path()).unwrap();
        let entries = store.enumerate(usize::MAX).unwrap();
        assert_eq!(entries.len(), 1);
        assert!(!entries[0].synced);
        assert_eq!(entries[0].timestamp, 120);
    }

    #[test]
    fn test_retimestamp_renames_and_rewrites() {
        let dir = tempdir().unwrap();
        let store = ChunkStore::open(dir.path()).unwrap();

        let mut writer = store
            .create(Timestamp { secs: 77, synced: false }, 1, 16_000)
            .unwrap();
        writer.append(&[9; 5]).unwrap();
        writer.finalize().unwrap();

        store.retimestamp(77, 1_700_000_077).unwrap();

        let entries = store.enumerate(usize::MAX).unwrap();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].synced);
        assert_eq!(entries[0].timestamp, 1_700_000_077);
        let (header, payload) = store.read_chunk(&entries[0]).unwrap();
        assert_eq!(header.timestamp, 1_700_000_077);
        assert_eq!(payload, vec![9; 5]);
    }

    #[test]
    fn test_recover_finishes_interrupted_retimestamp() {
        let dir = tempdir().unwrap();
        let store = ChunkStore::open(dir.path()).unwrap();

        // A .mono file whose header already holds wall time: the crash hit
        // between the header rewrite and the rename.
        let header = ChunkFileHeader {
            timestamp: 1_700_000_500,
            codec_id: 1,
            sample_rate: 16_000,
            data_size: 3,
        };
        let mut bytes = header.encode().to_vec();
        bytes.extend_from_slice(&[1, 2, 3]);
        fs::write(dir.path().join("0000000088.mono"), &bytes).unwrap();

        let report = store.recover().unwrap();
        assert_eq!(report.renamed, 1);

        let entries = store.enumerate(usize::MAX).unwrap();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].synced);
        assert_eq!(entries[0].timestamp, 1_700_000_500);
    }

    #[test]
    fn test_open_chunk_set_timestamp() {
        let dir = tempdir().unwrap();
        let store = ChunkStore::open(dir.path()).unwrap();

        let mut writer = store
            .create(Timestamp { secs: 30, synced: false }, 1, 16_000)
            .unwrap();
        writer.append(&[7; 4]).unwrap();
        writer.set_timestamp(synced_ts(1_700_000_030)).unwrap();
        writer.append(&[8; 4]).unwrap();
        let entry = writer.finalize().unwrap();

        assert!(entry.synced);
        assert_eq!(entry.timestamp, 1_700_000_030);
        let (header, payload) = store.read_chunk(&entry).unwrap();
        assert_eq!(header.timestamp, 1_700_000_030);
        assert_eq!(header.data_size, 8);
        assert_eq!(payload, vec![7, 7, 7, 7, 8, 8, 8, 8]);
    }

    #[test]
    fn test_unrelated_files_ignored() {
        let dir = tempdir().unwrap();
        let store = ChunkStore::open(dir.path()).unwrap();
        fs::write(dir.path().join("notes.txt"), b"hi").unwrap();
        fs::write(dir.path().join("garbage.bin"), b"nope").unwrap();
        assert!(store.enumerate(usize::MAX).unwrap().is_empty());
    }
}
