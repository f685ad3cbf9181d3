use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::{Mutex, RwLock};

use tracing::info;

use crate::error::CacheError;
use crate::storage::{Entry, Segment};

/// Key-value cache over string keys: scalar values plus append-only lists.
pub trait Cache: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError>;

    /// Upserts `value`. Returns true when the key did not exist before.
    fn set(&self, key: &str, value: Vec<u8>) -> Result<bool, CacheError>;

    /// Appends to the list at `key`, returning its new length.
    fn push(&self, key: &str, value: &str) -> Result<usize, CacheError>;

    /// At most `limit` items of the list, starting at `offset`.
    fn range(&self, key: &str, offset: usize, limit: Option<usize>) -> Result<Vec<String>, CacheError>;

    fn list_len(&self, key: &str) -> Result<usize, CacheError>;
}

#[derive(Debug, Default)]
struct Tables {
    values: HashMap<String, Vec<u8>>,
    lists: HashMap<String, Vec<String>>,
}

impl Tables {
    fn apply(&mut self, entry: Entry) -> bool {
        match entry {
            Entry::Set { key, value } => self.values.insert(key, value).is_none(),
            Entry::Push { key, value } => {
                self.lists.entry(key).or_default().push(value);
                true
            }
        }
    }

    fn range(&self, key: &str, offset: usize, limit: Option<usize>) -> Vec<String> {
        let Some(list) = self.lists.get(key) else {
            return vec![];
        };
        let tail = list.get(offset..).unwrap_or(&[]);
        let take = limit.unwrap_or(tail.len()).min(tail.len());
        tail[..take].to_vec()
    }

    fn list_len(&self, key: &str) -> usize {
        self.lists.get(key).map_or(0, Vec::len)
    }
}

// --- IN-MEMORY ---

#[derive(Debug, Default)]
pub struct MemoryCache {
    tables: RwLock<Tables>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Cache for MemoryCache {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let tables = self.tables.read().map_err(|_| CacheError::Poisoned)?;
        Ok(tables.values.get(key).cloned())
    }

    fn set(&self, key: &str, value: Vec<u8>) -> Result<bool, CacheError> {
        let mut tables = self.tables.write().map_err(|_| CacheError::Poisoned)?;
        Ok(tables.apply(Entry::Set { key: key.to_string(), value }))
    }

    fn push(&self, key: &str, value: &str) -> Result<usize, CacheError> {
        let mut tables = self.tables.write().map_err(|_| CacheError::Poisoned)?;
        tables.apply(Entry::Push { key: key.to_string(), value: value.to_string() });
        Ok(tables.list_len(key))
    }

    fn range(&self, key: &str, offset: usize, limit: Option<usize>) -> Result<Vec<String>, CacheError> {
        let tables = self.tables.read().map_err(|_| CacheError::Poisoned)?;
        Ok(tables.range(key, offset, limit))
    }

    fn list_len(&self, key: &str) -> Result<usize, CacheError> {
        let tables = self.tables.read().map_err(|_| CacheError::Poisoned)?;
        Ok(tables.list_len(key))
    }
}

// --- SEGMENT-BACKED ---

/// Cache persisted to an append-only segment file and served from memory.
/// The file is replayed on open; `compact` drops overwritten values.
#[derive(Debug)]
pub struct SegmentCache {
    segment: Mutex<Segment>,
    tables: RwLock<Tables>,
    strict_durability: bool,
}

impl SegmentCache {
    pub fn open(path: &Path, strict_durability: bool) -> Result<Self, CacheError> {
        let segment = Segment::new(path, strict_durability)?;

        let mut tables = Tables::default();
        let entries = segment.replay()?;
        let count = entries.len();
        for entry in entries {
            tables.apply(entry);
        }
        info!(path = %path.display(), entries = count, "cache segment replayed");

        Ok(Self {
            segment: Mutex::new(segment),
            tables: RwLock::new(tables),
            strict_durability,
        })
    }

    fn write(&self, entry: Entry) -> Result<bool, CacheError> {
        // Segment first: memory never holds state the log has not seen
        let mut segment = self.segment.lock().map_err(|_| CacheError::Poisoned)?;
        segment.append(&entry)?;
        let mut tables = self.tables.write().map_err(|_| CacheError::Poisoned)?;
        Ok(tables.apply(entry))
    }

    /// Rewrites the segment with only live state and swaps it in.
    pub fn compact(&self) -> Result<(), CacheError> {
        // Same lock order as `write`: segment, then tables
        let mut segment_lock = self.segment.lock().map_err(|_| CacheError::Poisoned)?;
        let tables = self.tables.read().map_err(|_| CacheError::Poisoned)?;

        let old_path = segment_lock.file_path.clone();
        let new_path = old_path.with_extension("compacted");
        let strict = self.strict_durability;
        let before = segment_lock.len_bytes();

        // Leftover from an interrupted compaction
        if new_path.exists() {
            fs::remove_file(&new_path)?;
        }

        {
            let mut new_segment = Segment::new(&new_path, strict)?;
            for (key, value) in tables.values.iter() {
                new_segment.append(&Entry::Set { key: key.clone(), value: value.clone() })?;
            }
            for (key, list) in tables.lists.iter() {
                for value in list {
                    new_segment.append(&Entry::Push { key: key.clone(), value: value.clone() })?;
                }
            }
        }

        fs::rename(&new_path, &old_path)?;
        *segment_lock = Segment::new(&old_path, strict)?;

        info!(
            before_bytes = before,
            after_bytes = segment_lock.len_bytes(),
            "cache compaction complete"
        );
        Ok(())
    }
}

impl Cache for SegmentCache {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let tables = self.tables.read().map_err(|_| CacheError::Poisoned)?;
        Ok(tables.values.get(key).cloned())
    }

    fn set(&self, key: &str, value: Vec<u8>) -> Result<bool, CacheError> {
        self.write(Entry::Set { key: key.to_string(), value })
    }

    fn push(&self, key: &str, value: &str) -> Result<usize, CacheError> {
        self.write(Entry::Push { key: key.to_string(), value: value.to_string() })?;
        self.list_len(key)
    }

    fn range(&self, key: &str, offset: usize, limit: Option<usize>) -> Result<Vec<String>, CacheError> {
        let tables = self.tables.read().map_err(|_| CacheError::Poisoned)?;
        Ok(tables.range(key, offset, limit))
    }

    fn list_len(&self, key: &str) -> Result<usize, CacheError> {
        let tables = self.tables.read().map_err(|_| CacheError::Poisoned)?;
        Ok(tables.list_len(key))
    }
}
