//! Host side of the binding: storage cells and change notification.
//!
//! The dispatcher only ever talks to a [`ParamStore`]. [`MemoryStore`] is the
//! implementation used by the binary: values live in a map and every batch
//! of changes is pushed to a listener channel.

use crate::codec::Value;
use crate::registry::VariableId;
use chrono::{DateTime, Local};
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, warn};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HostError {
    #[error("storage cell {0} rejected the value: {1}")]
    Rejected(VariableId, String),
}

/// Storage owned by the host framework.
///
/// The dispatcher serializes every call, implementations do not need their
/// own locking.
pub trait ParamStore: Send {
    /// Current value of the cell, `None` while it was never written.
    fn read(&self, id: VariableId) -> Option<Value>;

    fn write(&mut self, id: VariableId, value: Value) -> Result<(), HostError>;

    /// Called once per processed message with every cell that changed.
    fn notify_changed(&mut self, ids: &[VariableId]);
}

/// One notification: the cells that changed together and their new values
#[derive(Debug, Clone)]
pub struct ChangeBatch {
    pub changes: Vec<(VariableId, Value)>,
    pub timestamp: DateTime<Local>,
}

/// In-memory parameter store with a bounded change feed
#[derive(Debug, Default)]
pub struct MemoryStore {
    cells: HashMap<VariableId, Value>,
    listener: Option<mpsc::Sender<ChangeBatch>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store together with the receiving end of its change feed.
    pub fn with_listener(capacity: usize) -> (Self, mpsc::Receiver<ChangeBatch>) {
        let (tx, rx) = mpsc::channel(capacity);
        let store = Self {
            cells: HashMap::new(),
            listener: Some(tx),
        };
        (store, rx)
    }
}

impl ParamStore for MemoryStore {
    fn read(&self, id: VariableId) -> Option<Value> {
        self.cells.get(&id).cloned()
    }

    fn write(&mut self, id: VariableId, value: Value) -> Result<(), HostError> {
        self.cells.insert(id, value);
        Ok(())
    }

    fn notify_changed(&mut self, ids: &[VariableId]) {
        let Some(listener) = &self.listener else {
            return;
        };
        let changes: Vec<_> = ids
            .iter()
            .filter_map(|id| self.cells.get(id).map(|value| (*id, value.clone())))
            .collect();
        debug!("Notifying {} changed cells", changes.len());

        let batch = ChangeBatch {
            changes,
            timestamp: Local::now(),
        };
        if let Err(e) = listener.try_send(batch) {
            warn!("Change listener is not keeping up: {}", e);
        }
    }
}
