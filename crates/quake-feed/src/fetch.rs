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

//! Blocking feed retrieval.
//!
//! One HTTP GET per call, bounded by a fixed timeout. There is no retry and
//! no partial-result recovery; every failure mode surfaces as a
//! [`FeedError`](crate::FeedError) for the caller to mask.

use std::time::Duration;

use crate::FeedError;

/// Default USGS feed: magnitude 2.5+ events from the past day.
pub const DEFAULT_FEED_URL: &str =
    "https://earthquake.usgs.gov/earthquakes/feed/v1.0/summary/2.5_day.geojson";

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Feed endpoint and timeout bound for a fetch.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Feed URL to GET.
    pub url: String,
    /// Hard bound on the whole request.
    pub timeout: Duration,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_FEED_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl FetchConfig {
    /// Config for a specific feed URL with the default timeout.
    #[must_use]
    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }
}

/// Build the blocking HTTP client used for all fetches.
pub(crate) fn build_http_client(timeout: Duration) -> Result<reqwest::blocking::Client, FeedError> {
    Ok(reqwest::blocking::Client::builder()
        .timeout(timeout)
        .build()?)
}

/// Perform one GET against the feed and return the raw body.
pub(crate) fn fetch_body(
    http: &reqwest::blocking::Client,
    url: &str,
) -> Result<String, FeedError> {
    let response = http.get(url).send()?;

    let status = response.status();
    if !status.is_success() {
        return Err(FeedError::Status(status));
    }

    Ok(response.text()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = FetchConfig::default();
        assert_eq!(config.url, DEFAULT_FEED_URL);
        assert_eq!(config.timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_with_url_keeps_default_timeout() {
        let config = FetchConfig::with_url("https://example.com/feed.geojson");
        assert_eq!(config.url, "https://example.com/feed.geojson");
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
    }
}
