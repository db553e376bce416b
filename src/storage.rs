// ============================================================================
// STORAGE — sticker records and the record store seam
// ============================================================================

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, StickerError};

/// Magic string identifying a serialized record store.
const STORE_MAGIC_V1: &str = "STK1";

/// One saved sticker.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StickerRecord {
    pub id: Uuid,
    /// Encoded PNG bytes.
    pub image_png: Vec<u8>,
    pub label: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp_ms: u64,
}

impl StickerRecord {
    /// New record with a fresh id, stamped now.
    pub fn new(image_png: Vec<u8>, label: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            image_png,
            label: label.into(),
            timestamp_ms: now_ms(),
        }
    }

    pub fn data_url(&self) -> String {
        crate::io::to_data_url(&self.image_png)
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Key-value store for sticker records keyed by id.
pub trait RecordStore {
    /// Insert or replace by id.
    fn save(&mut self, record: StickerRecord) -> Result<()>;
    /// All records, oldest first.
    fn load_all(&self) -> Result<Vec<StickerRecord>>;
}

#[derive(Serialize, Deserialize)]
struct StoreFileV1 {
    magic: String,
    records: Vec<StickerRecord>,
}

/// In-memory store; `to_blob`/`from_blob` move it in and out of a single
/// database value.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    records: HashMap<Uuid, StickerRecord>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, id: &Uuid) -> Option<&StickerRecord> {
        self.records.get(id)
    }

    pub fn remove(&mut self, id: &Uuid) -> Option<StickerRecord> {
        self.records.remove(id)
    }

    pub fn to_blob(&self) -> Result<Vec<u8>> {
        let file = StoreFileV1 {
            magic: STORE_MAGIC_V1.to_string(),
            records: self.load_all()?,
        };
        bincode::serialize(&file).map_err(|e| StickerError::Storage(e.to_string()))
    }

    pub fn from_blob(blob: &[u8]) -> Result<Self> {
        let file: StoreFileV1 =
            bincode::deserialize(blob).map_err(|e| StickerError::Storage(e.to_string()))?;
        if file.magic != STORE_MAGIC_V1 {
            return Err(StickerError::Storage(format!("unknown store magic '{}'", file.magic)));
        }
        Ok(Self {
            records: file.records.into_iter().map(|r| (r.id, r)).collect(),
        })
    }
}

impl RecordStore for MemoryStore {
    fn save(&mut self, record: StickerRecord) -> Result<()> {
        self.records.insert(record.id, record);
        Ok(())
    }

    fn load_all(&self) -> Result<Vec<StickerRecord>> {
        let mut all: Vec<StickerRecord> = self.records.values().cloned().collect();
        all.sort_by(|a, b| a.timestamp_ms.cmp(&b.timestamp_ms).then_with(|| a.id.cmp(&b.id)));
        Ok(all)
    }
}
