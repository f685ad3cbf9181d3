use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use rkyv::{Archive, Deserialize as RkyvDeserialize, Serialize as RkyvSerialize};

/// One mutation of the cache, as written to the segment log.
#[derive(Archive, RkyvDeserialize, RkyvSerialize, Debug, Clone, PartialEq)]
#[archive(check_bytes)]
pub enum Entry {
    /// Upsert of a scalar value
    Set { key: String, value: Vec<u8> },
    /// Append to the tail of a list
    Push { key: String, value: String },
}

/// Append-only log file of length-prefixed, rkyv-encoded entries.
#[derive(Debug)]
pub struct Segment {
    pub file_path: PathBuf,
    file: File,
    strict: bool,
    current_offset: u64,
}

impl Segment {
    pub fn new(path: &Path, strict: bool) -> io::Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(path)?;

        let current_offset = file.metadata()?.len();

        Ok(Self {
            file_path: path.to_path_buf(),
            file,
            strict,
            current_offset,
        })
    }

    pub fn append(&mut self, entry: &Entry) -> io::Result<u64> {
        let bytes = rkyv::to_bytes::<_, 1024>(entry)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;

        let start = self.current_offset;

        // Length-prefixed write format: [Length (4b)][Data (N bytes)]
        let len = bytes.len() as u32;
        self.file.write_all(&len.to_le_bytes())?;
        self.file.write_all(&bytes)?;
        if self.strict {
            self.file.sync_data()?;
        }

        self.current_offset += 4 + bytes.len() as u64;
        Ok(start)
    }

    pub fn read(&self, offset: u64) -> io::Result<(Entry, u64)> {
        // Appends ignore the cursor, so seeking a cloned handle is safe
        let mut file = self.file.try_clone()?;
        file.seek(SeekFrom::Start(offset))?;

        let mut len_buf = [0u8; 4];
        file.read_exact(&mut len_buf)?;
        let len = u32::from_le_bytes(len_buf) as usize;

        let mut bytes = vec![0u8; len];
        file.read_exact(&mut bytes)?;

        let mut aligned = rkyv::AlignedVec::with_capacity(len);
        aligned.extend_from_slice(&bytes);

        let archived = rkyv::check_archived_root::<Entry>(&aligned[..])
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?;
        let entry: Entry = archived
            .deserialize(&mut rkyv::Infallible)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "undecodable entry"))?;

        Ok((entry, offset + 4 + len as u64))
    }

    /// Reads every entry in write order.
    pub fn replay(&self) -> io::Result<Vec<Entry>> {
        let mut entries = Vec::new();
        let mut offset = 0;
        while offset < self.current_offset {
            let (entry, next) = self.read(offset)?;
            entries.push(entry);
            offset = next;
        }
        Ok(entries)
    }

    pub fn len_bytes(&self) -> u64 {
        self.current_offset
    }
}
