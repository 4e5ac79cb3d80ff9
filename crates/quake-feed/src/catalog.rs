// Copyright 2025 Chris Custine
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Normalized event records and the immutable catalog they live in.
//!
//! A catalog is produced once per fetch and never mutated afterwards.
//! Filtering and aggregation build new views over the shared slice, so a
//! threshold change never touches the source collection.

use chrono::{DateTime, Timelike, Utc};

/// Fixed render pattern for event timestamps (minute precision).
pub const TIME_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Number of hour buckets in the time-of-day histogram.
pub const HOUR_BUCKETS: usize = 24;

/// One normalized earthquake record.
///
/// Every materialized event has a reported magnitude; features without one
/// are dropped during normalization. `visual_radius` is derived from the
/// magnitude at ingestion and never recomputed downstream.
#[derive(Debug, Clone, PartialEq)]
pub struct EarthquakeEvent {
    /// Feed-assigned event identifier, when present.
    pub id: Option<String>,
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
    /// Source-reported magnitude.
    pub magnitude: f64,
    /// Free-text place description.
    pub place: String,
    /// Event time in UTC, truncated to minute precision at ingestion.
    pub time: DateTime<Utc>,
    /// Display radius in meters, derived from the magnitude.
    pub visual_radius: f64,
    /// Link to the source event page, when present.
    pub detail_url: Option<String>,
}

impl EarthquakeEvent {
    /// Render the event time with the fixed minute-precision pattern.
    #[must_use]
    pub fn time_label(&self) -> String {
        self.time.format(TIME_FORMAT).to_string()
    }

    /// Hour-of-day bucket index (0-23).
    #[must_use]
    pub fn hour(&self) -> usize {
        self.time.hour() as usize
    }
}

/// Immutable collection of normalized events from one fetch.
#[derive(Debug, Clone)]
pub struct EventCatalog {
    events: Vec<EarthquakeEvent>,
    fetched_at: DateTime<Utc>,
}

impl EventCatalog {
    /// Wrap a normalized event list, stamping the fetch time.
    #[must_use]
    pub fn new(events: Vec<EarthquakeEvent>) -> Self {
        Self {
            events,
            fetched_at: Utc::now(),
        }
    }

    /// All events in feed order.
    #[must_use]
    pub fn events(&self) -> &[EarthquakeEvent] {
        &self.events
    }

    /// Number of events in the catalog.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Check whether the catalog holds no events.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// When this catalog was fetched.
    #[must_use]
    pub fn fetched_at(&self) -> DateTime<Utc> {
        self.fetched_at
    }

    /// Events with magnitude at or above the threshold, as a new view.
    #[must_use]
    pub fn filter(&self, threshold: f64) -> Vec<&EarthquakeEvent> {
        self.events
            .iter()
            .filter(|event| event.magnitude >= threshold)
            .collect()
    }
}

/// Largest magnitude in a filtered view, `None` when it is empty.
#[must_use]
pub fn max_magnitude(events: &[&EarthquakeEvent]) -> Option<f64> {
    events.iter().map(|event| event.magnitude).reduce(f64::max)
}

/// Count events per hour of day, in ascending hour order.
///
/// The counts always sum to the length of the input view.
#[must_use]
pub fn hourly_counts(events: &[&EarthquakeEvent]) -> [u32; HOUR_BUCKETS] {
    let mut counts = [0u32; HOUR_BUCKETS];
    for event in events {
        counts[event.hour()] += 1;
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn event(magnitude: f64, hour: u32) -> EarthquakeEvent {
        let time = Utc.with_ymd_and_hms(2023, 11, 14, hour, 30, 0).unwrap();
        EarthquakeEvent {
            id: None,
            latitude: 37.1,
            longitude: 142.3,
            magnitude,
            place: "test region".to_string(),
            time,
            visual_radius: crate::geojson::visual_radius(magnitude),
            detail_url: None,
        }
    }

    fn catalog() -> EventCatalog {
        EventCatalog::new(vec![
            event(2.5, 0),
            event(4.5, 0),
            event(5.1, 13),
            event(8.0, 23),
        ])
    }

    #[test]
    fn test_filter_is_inclusive_at_threshold() {
        let catalog = catalog();
        let visible = catalog.filter(4.5);
        assert_eq!(visible.len(), 3);
        assert!(visible.iter().all(|e| e.magnitude >= 4.5));
    }

    #[test]
    fn test_threshold_above_maximum_yields_empty_view() {
        let catalog = catalog();
        assert!(catalog.filter(8.1).is_empty());
    }

    #[test]
    fn test_filter_does_not_mutate_the_catalog() {
        let catalog = catalog();
        let before = catalog.len();
        let _ = catalog.filter(6.0);
        let _ = catalog.filter(2.5);
        assert_eq!(catalog.len(), before);
        assert_eq!(catalog.events().len(), before);
    }

    #[test]
    fn test_max_magnitude() {
        let catalog = catalog();
        let visible = catalog.filter(2.5);
        assert_eq!(max_magnitude(&visible), Some(8.0));
        assert_eq!(max_magnitude(&catalog.filter(8.1)), None);
    }

    #[test]
    fn test_hourly_counts_sum_to_view_length() {
        let catalog = catalog();
        let visible = catalog.filter(2.5);
        let counts = hourly_counts(&visible);
        let total: u32 = counts.iter().sum();
        assert_eq!(total as usize, visible.len());
        assert_eq!(counts[0], 2);
        assert_eq!(counts[13], 1);
        assert_eq!(counts[23], 1);
    }

    #[test]
    fn test_time_label_uses_fixed_pattern() {
        assert_eq!(event(4.0, 7).time_label(), "2023-11-14 07:30");
    }
}
