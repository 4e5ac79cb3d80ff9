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

//! Application configuration management.
//!
//! Persistent configuration in TOML format via confy. Holds the configured
//! feed endpoints, map preferences, and the dashboard defaults the UI starts
//! from.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Slider bounds and step for the magnitude threshold control.
pub const THRESHOLD_MIN: f64 = 2.5;
pub const THRESHOLD_MAX: f64 = 8.0;
pub const THRESHOLD_STEP: f64 = 0.1;

const USGS_FEED_BASE: &str = "https://earthquake.usgs.gov/earthquakes/feed/v1.0/summary";

/// One configured feed endpoint.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct FeedSource {
    /// Unique identifier for this feed (stable across renames).
    pub id: String,

    /// User-friendly display name.
    pub name: String,

    /// Feed URL.
    pub url: String,

    /// Whether this feed is the active one; the first enabled entry wins.
    pub enabled: bool,
}

impl FeedSource {
    /// Create a new feed entry with a generated UUID.
    pub fn new(name: &str, url: String, enabled: bool) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            url,
            enabled,
        }
    }

    fn usgs(name: &str, window: &str, enabled: bool) -> Self {
        Self::new(name, format!("{USGS_FEED_BASE}/{window}.geojson"), enabled)
    }
}

/// Application configuration stored in TOML format.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    /// Configuration schema version for migrations.
    #[serde(default = "default_config_version")]
    pub config_version: u32,

    /// Configured feed endpoints.
    #[serde(default = "default_feeds")]
    pub feeds: Vec<FeedSource>,

    /// Magnitude threshold the slider starts at.
    #[serde(default = "default_threshold")]
    pub default_threshold: f64,

    /// Default map zoom level for the world view.
    #[serde(default = "default_zoom")]
    pub default_zoom: f32,

    /// Basemap style: "dark" or "light".
    #[serde(default = "default_map_style")]
    pub map_style: String,

    /// Feed request timeout in seconds.
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,

    /// Automatic re-fetch interval in seconds (0 disables it).
    #[serde(default)]
    pub auto_refresh_secs: u64,

    /// Data table expanded state.
    #[serde(default)]
    pub table_expanded: bool,
}

// Default value functions for serde
fn default_config_version() -> u32 {
    1
}

fn default_feeds() -> Vec<FeedSource> {
    vec![
        FeedSource::usgs("M2.5+ Past Day", "2.5_day", true),
        FeedSource::usgs("All Past Hour", "all_hour", false),
        FeedSource::usgs("M4.5+ Past Week", "4.5_week", false),
    ]
}

fn default_threshold() -> f64 {
    4.5
}

fn default_zoom() -> f32 {
    1.5
}

fn default_map_style() -> String {
    "dark".to_string()
}

fn default_fetch_timeout_secs() -> u64 {
    10
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            config_version: default_config_version(),
            feeds: default_feeds(),
            default_threshold: default_threshold(),
            default_zoom: default_zoom(),
            map_style: default_map_style(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            auto_refresh_secs: 0,
            table_expanded: false,
        }
    }
}

impl AppConfig {
    /// Load configuration from disk, creating defaults on first run.
    pub fn load() -> Result<Self, confy::ConfyError> {
        confy::load("quakewatch-desktop", "config")
    }

    /// Save configuration to disk.
    pub fn save(&self) -> Result<(), confy::ConfyError> {
        confy::store("quakewatch-desktop", "config", self)
    }

    /// Get the config file path for display to user.
    #[allow(dead_code)]
    pub fn get_config_path() -> Result<std::path::PathBuf, confy::ConfyError> {
        confy::get_configuration_file_path("quakewatch-desktop", "config")
    }

    /// The feed the dashboard fetches from: the first enabled entry.
    pub fn active_feed(&self) -> Option<&FeedSource> {
        self.feeds.iter().find(|feed| feed.enabled)
    }

    /// Make the feed with the given id the only enabled one.
    pub fn select_feed(&mut self, id: &str) {
        for feed in &mut self.feeds {
            feed.enabled = feed.id == id;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_dashboard_contract() {
        let config = AppConfig::default();
        assert!((config.default_threshold - 4.5).abs() < f64::EPSILON);
        assert!((f64::from(config.default_zoom) - 1.5).abs() < 1e-9);
        assert_eq!(config.map_style, "dark");
        assert_eq!(config.fetch_timeout_secs, 10);
        assert_eq!(config.auto_refresh_secs, 0);
    }

    #[test]
    fn test_default_active_feed_is_the_daily_window() {
        let config = AppConfig::default();
        let active = config.active_feed().unwrap();
        assert!(active.url.ends_with("2.5_day.geojson"));
        assert!(active.enabled);
    }

    #[test]
    fn test_select_feed_enables_exactly_one() {
        let mut config = AppConfig::default();
        let weekly = config.feeds[2].id.clone();
        config.select_feed(&weekly);
        assert_eq!(config.feeds.iter().filter(|f| f.enabled).count(), 1);
        assert!(config
            .active_feed()
            .unwrap()
            .url
            .ends_with("4.5_week.geojson"));
    }
}
