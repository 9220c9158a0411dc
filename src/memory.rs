use std::sync::{Arc, Mutex};

use crate::arch::{AccessorError, AccessorKind, CacheAccessor, CacheBlob};

/// Process-local accessor. Nothing survives the process; intended for tests and
/// for callers that deliberately opt out of persistence.
///
/// Validation accessors share the same slot, mirroring how the on-disk
/// backends share one file.
#[derive(Clone, Default)]
pub struct InMemoryAccessor {
    slot: Arc<Mutex<Option<Vec<u8>>>>,
}

impl InMemoryAccessor {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Option<Vec<u8>>>, AccessorError> {
        self.slot
            .lock()
            .map_err(|_| AccessorError::Config("in-memory cache lock poisoned".to_string()))
    }
}

impl CacheAccessor for InMemoryAccessor {
    fn read(&self) -> Result<CacheBlob, AccessorError> {
        Ok(self
            .lock()?
            .clone()
            .map(CacheBlob::from)
            .unwrap_or_else(CacheBlob::placeholder))
    }

    fn write(&self, blob: &CacheBlob) -> Result<(), AccessorError> {
        if blob.is_empty() {
            return Err(AccessorError::EmptyBlob);
        }
        *self.lock()? = Some(blob.as_bytes().to_vec());
        Ok(())
    }

    fn clear(&self) -> Result<(), AccessorError> {
        log::info!("Clearing in-memory cache");
        *self.lock()? = None;
        Ok(())
    }

    fn create_for_persistence_validation(&self) -> Box<dyn CacheAccessor> {
        Box::new(self.clone())
    }

    fn kind(&self) -> AccessorKind {
        AccessorKind::InMemory
    }
}
