use crate::driver::Driver;
use crate::error::DriverError;
use crate::record::Record;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// Identifier returned by every [`MemoryDriver::send`].
pub const MEMORY_DELIVERY_ID: &str = "memory-log";

/// A driver that keeps every record in memory.
///
/// Useful in unit tests of code that logs through a
/// [`Logger`](crate::logger::Logger): bind the driver, keep the
/// [`MemoryHandle`], and inspect what was sent.
#[derive(Clone, Default)]
pub struct MemoryDriver {
    handle: MemoryHandle,
}

/// Shared view into a [`MemoryDriver`]'s captured state.
#[derive(Clone, Default)]
pub struct MemoryHandle {
    records: Arc<Mutex<Vec<Record>>>,
    closed: Arc<AtomicBool>,
}

impl MemoryDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handle(&self) -> MemoryHandle {
        self.handle.clone()
    }
}

impl MemoryHandle {
    /// Copy of every record sent so far, oldest first.
    pub fn records(&self) -> Vec<Record> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn last(&self) -> Option<Record> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .cloned()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Driver for MemoryDriver {
    async fn send(&mut self, record: &Record) -> Result<String, DriverError> {
        self.handle
            .records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record.clone());
        Ok(MEMORY_DELIVERY_ID.to_string())
    }

    async fn close(&mut self) {
        self.handle.closed.store(true, Ordering::SeqCst);
    }
}
