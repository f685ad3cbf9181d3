use std::sync::Arc;

use crate::cache::Cache;
use crate::error::{CacheError, TrackerResult};
use crate::model::StateVector;

pub const RECORD_PREFIX: &str = "iss_data:";
pub const INDEX_KEY: &str = "iss_epochs";

/// State vectors keyed by epoch, plus the ordered index of known epochs.
///
/// The index is upsert-based: an epoch is appended only the first time its
/// record is written, so repeated loads of the same feed leave it unchanged.
#[derive(Clone)]
pub struct EphemerisStore {
    cache: Arc<dyn Cache>,
}

impl EphemerisStore {
    pub fn new(cache: Arc<dyn Cache>) -> Self {
        Self { cache }
    }

    fn record_key(epoch: &str) -> String {
        format!("{RECORD_PREFIX}{epoch}")
    }

    pub fn put(&self, record: &StateVector) -> TrackerResult<()> {
        let bytes = serde_json::to_vec(record).map_err(|e| CacheError::Codec(e.to_string()))?;
        let inserted = self.cache.set(&Self::record_key(&record.epoch), bytes)?;
        if inserted {
            self.cache.push(INDEX_KEY, &record.epoch)?;
        }
        Ok(())
    }

    pub fn get(&self, epoch: &str) -> TrackerResult<Option<StateVector>> {
        let Some(bytes) = self.cache.get(&Self::record_key(epoch))? else {
            return Ok(None);
        };
        let record = serde_json::from_slice(&bytes).map_err(|e| CacheError::Codec(e.to_string()))?;
        Ok(Some(record))
    }

    pub fn list_all(&self) -> TrackerResult<Vec<String>> {
        Ok(self.cache.range(INDEX_KEY, 0, None)?)
    }

    pub fn list_range(&self, limit: usize, offset: usize) -> TrackerResult<Vec<String>> {
        Ok(self.cache.range(INDEX_KEY, offset, Some(limit))?)
    }

    pub fn len(&self) -> TrackerResult<usize> {
        Ok(self.cache.list_len(INDEX_KEY)?)
    }

    pub fn is_empty(&self) -> TrackerResult<bool> {
        Ok(self.len()? == 0)
    }
}
