#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use topicbind::dispatch::{Transport, TransportError};

/// Transport fake that records every request
#[derive(Default)]
pub struct RecordingTransport {
    pub subscriptions: Mutex<Vec<String>>,
    /// Topic sets passed to `subscribe_many`, one entry per request
    pub batches: Mutex<Vec<Vec<String>>>,
    pub publishes: Mutex<Vec<(String, String, bool)>>,
    pub offline: AtomicBool,
}

impl RecordingTransport {
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn subscribed(&self) -> Vec<String> {
        self.subscriptions.lock().unwrap().clone()
    }

    pub fn batches(&self) -> Vec<Vec<String>> {
        self.batches.lock().unwrap().clone()
    }

    pub fn published(&self) -> Vec<(String, String, bool)> {
        self.publishes.lock().unwrap().clone()
    }
}

impl Transport for RecordingTransport {
    fn subscribe(&self, topic: &str) -> Result<(), TransportError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(TransportError::NotConnected);
        }
        self.subscriptions.lock().unwrap().push(topic.to_string());
        Ok(())
    }

    fn subscribe_many(&self, topics: &[String]) -> Result<(), TransportError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(TransportError::NotConnected);
        }
        self.batches.lock().unwrap().push(topics.to_vec());
        self.subscriptions.lock().unwrap().extend_from_slice(topics);
        Ok(())
    }

    fn publish(&self, topic: &str, payload: String, retained: bool) -> Result<(), TransportError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(TransportError::NotConnected);
        }
        self.publishes
            .lock()
            .unwrap()
            .push((topic.to_string(), payload, retained));
        Ok(())
    }
}
