use std::collections::HashMap;

use crate::models::{StationId, TrackMetadata};

/// Latest known track per station. Each update replaces the previous one.
#[derive(Default)]
pub struct StationRegistry {
    latest: HashMap<StationId, TrackMetadata>,
}

impl StationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_update(&mut self, station: StationId, metadata: TrackMetadata) {
        self.latest.insert(station, metadata);
    }

    pub fn latest(&self, station: StationId) -> Option<&TrackMetadata> {
        self.latest.get(&station)
    }

    pub fn stream_url(&self, station: StationId) -> &'static str {
        station.stream_url()
    }
}
