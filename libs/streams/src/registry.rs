//! Engine-facing registry of named streams.

use crate::stream::{EventStream, StreamConfig, StreamStats};
use crate::{Result, StreamError};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use monitor::Monitor;
use std::sync::Arc;
use tracing::{debug, info};
use types::Event;

/// Map of stream name -> running stream. Stream names are unique within a
/// registry (and therefore within an engine).
pub struct StreamRegistry {
    streams: DashMap<String, Arc<EventStream>>,
    monitor: Arc<Monitor>,
}

impl StreamRegistry {
    pub fn new(monitor: Arc<Monitor>) -> Self {
        Self {
            streams: DashMap::new(),
            monitor,
        }
    }

    /// Create and start a stream. Name collisions are an error, never an
    /// overwrite.
    pub fn create(&self, name: &str, config: StreamConfig) -> Result<Arc<EventStream>> {
        match self.streams.entry(name.to_string()) {
            Entry::Occupied(_) => Err(StreamError::StreamExists(name.to_string())),
            Entry::Vacant(slot) => {
                let stream = Arc::new(EventStream::new(name, config, Arc::clone(&self.monitor)));
                stream.start()?;
                slot.insert(Arc::clone(&stream));
                info!(stream = %name, "stream created");
                Ok(stream)
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<EventStream>> {
        self.streams.get(name).map(|entry| Arc::clone(entry.value()))
    }

    /// Stop and remove a stream.
    pub async fn delete(&self, name: &str) -> Result<()> {
        let (_, stream) = self
            .streams
            .remove(name)
            .ok_or_else(|| StreamError::StreamNotFound(name.to_string()))?;
        stream.stop().await;
        info!(stream = %name, "stream deleted");
        Ok(())
    }

    pub fn list(&self) -> Vec<StreamStats> {
        let mut stats: Vec<StreamStats> = self
            .streams
            .iter()
            .map(|entry| entry.value().stats())
            .collect();
        stats.sort_by(|a, b| a.name.cmp(&b.name));
        stats
    }

    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    /// Best-effort publish to every stream; streams that are not running
    /// simply skip the event.
    pub fn publish_all(&self, event: &Event) {
        for entry in self.streams.iter() {
            let _ = entry.value().publish(event.clone());
        }
    }

    /// Stop every stream, leaving the registry empty.
    pub async fn stop_all(&self) {
        let names: Vec<String> = self.streams.iter().map(|e| e.key().clone()).collect();
        for name in names {
            if let Some((_, stream)) = self.streams.remove(&name) {
                stream.stop().await;
                debug!(stream = %name, "stream stopped during shutdown");
            }
        }
    }
}
