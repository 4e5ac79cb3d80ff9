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

//! Feed client library for the USGS earthquake geojson feed.
//!
//! This library owns the data-acquisition contract of the dashboard and is
//! independent of any UI framework. It is organized as layers that can be
//! used on their own or composed through the [`FeedClient`]:
//!
//! - **Geojson layer**: wire types and the pure normalization from raw feed
//!   JSON to a validated record list
//! - **Catalog layer**: the immutable event collection with threshold
//!   filtering and hour-of-day aggregation
//! - **Fetch layer**: one blocking HTTP GET per refresh with a fixed timeout
//!
//! # Quick Start
//!
//! Use the [`FeedClient`] for fetch-and-normalize with memoization:
//!
//! ```no_run
//! use quake_feed::{FeedClient, FetchConfig};
//!
//! let mut client = FeedClient::new(FetchConfig::default()).unwrap();
//!
//! // First call fetches; later calls reuse the cached catalog.
//! let catalog = client.events().unwrap();
//! for event in catalog.filter(4.5) {
//!     println!("M{:.1} {} ({})", event.magnitude, event.place, event.time_label());
//! }
//! ```
//!
//! # Using Individual Layers
//!
//! The normalization step is a pure function and needs no network:
//!
//! ```
//! use quake_feed::geojson::parse_feed;
//!
//! let body = r#"{"features": [{
//!     "geometry": {"coordinates": [142.3, 37.1, 35.0]},
//!     "properties": {"mag": 5.2, "place": "off the coast", "time": 1700000000000}
//! }]}"#;
//!
//! let events = parse_feed(body).unwrap();
//! assert_eq!(events.len(), 1);
//! assert!((events[0].longitude - 142.3).abs() < 1e-9);
//! ```

pub mod catalog;
pub mod fetch;
pub mod geojson;

use log::info;
use thiserror::Error;

pub use catalog::{hourly_counts, max_magnitude, EarthquakeEvent, EventCatalog, HOUR_BUCKETS, TIME_FORMAT};
pub use fetch::{FetchConfig, DEFAULT_FEED_URL, DEFAULT_TIMEOUT};
pub use geojson::{parse_feed, visual_radius, UNKNOWN_PLACE};

/// Data acquisition failure.
///
/// Network errors, timeouts, bad statuses, and malformed payloads all share
/// this one taxonomy; callers mask any variant the same way, with an empty
/// result set and a surfaced message.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("feed request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("feed returned status {0}")]
    Status(reqwest::StatusCode),

    #[error("feed document is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("feed document is missing field: {0}")]
    MissingField(&'static str),

    #[error("invalid value for field '{field}': {value}")]
    InvalidValue { field: &'static str, value: String },
}

/// Fetching, normalizing feed client with a memoized catalog.
///
/// The catalog is computed once and reused for every subsequent filter
/// operation; [`FeedClient::refresh`] is the only invalidation.
#[derive(Debug)]
pub struct FeedClient {
    config: FetchConfig,
    http: reqwest::blocking::Client,
    cached: Option<EventCatalog>,
}

impl FeedClient {
    /// Build a client for the given feed endpoint.
    pub fn new(config: FetchConfig) -> Result<Self, FeedError> {
        let http = fetch::build_http_client(config.timeout)?;
        Ok(Self {
            config,
            http,
            cached: None,
        })
    }

    /// The active fetch configuration.
    #[must_use]
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    /// The memoized catalog, if one has been fetched.
    #[must_use]
    pub fn cached(&self) -> Option<&EventCatalog> {
        self.cached.as_ref()
    }

    /// Get the event catalog, fetching and normalizing on first use.
    ///
    /// A failed fetch leaves the cache empty, so the next call tries again.
    pub fn events(&mut self) -> Result<EventCatalog, FeedError> {
        if let Some(catalog) = &self.cached {
            return Ok(catalog.clone());
        }

        let body = fetch::fetch_body(&self.http, &self.config.url)?;
        let events = parse_feed(&body)?;
        info!("Loaded {} events from {}", events.len(), self.config.url);

        let catalog = EventCatalog::new(events);
        self.cached = Some(catalog.clone());
        Ok(catalog)
    }

    /// Drop the memoized catalog and fetch a fresh one.
    pub fn refresh(&mut self) -> Result<EventCatalog, FeedError> {
        self.cached = None;
        self.events()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_starts_with_empty_cache() {
        let client = FeedClient::new(FetchConfig::default()).unwrap();
        assert!(client.cached().is_none());
        assert_eq!(client.config().url, DEFAULT_FEED_URL);
    }
}
