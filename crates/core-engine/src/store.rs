//! Persisted scroll position, consulted once at startup and written at
//! shutdown.

use anyhow::{Result, anyhow};
use std::sync::{Arc, Mutex};

pub trait ScrollPositionStore: Send {
    fn load(&self) -> Result<Option<usize>>;
    fn save(&mut self, offset: usize) -> Result<()>;
}

/// In-memory store; clones share the same slot.
#[derive(Debug, Clone, Default)]
pub struct MemoryScrollStore {
    slot: Arc<Mutex<Option<usize>>>,
}

impl MemoryScrollStore {
    pub fn new(initial: Option<usize>) -> Self {
        Self {
            slot: Arc::new(Mutex::new(initial)),
        }
    }

    pub fn get(&self) -> Option<usize> {
        self.slot.lock().ok().and_then(|slot| *slot)
    }
}

impl ScrollPositionStore for MemoryScrollStore {
    fn load(&self) -> Result<Option<usize>> {
        let slot = self
            .slot
            .lock()
            .map_err(|_| anyhow!("scroll store lock poisoned"))?;
        Ok(*slot)
    }

    fn save(&mut self, offset: usize) -> Result<()> {
        let mut slot = self
            .slot
            .lock()
            .map_err(|_| anyhow!("scroll store lock poisoned"))?;
        *slot = Some(offset);
        Ok(())
    }
}
