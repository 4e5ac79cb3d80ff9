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

//! Wire format and normalization for the USGS earthquake geojson feed.
//!
//! The feed is a geojson document with a `features` array. Each feature
//! carries `geometry.coordinates` (longitude first, latitude second, with an
//! optional depth element) and `properties` holding magnitude, place, and an
//! epoch-millisecond timestamp. Normalization flattens each feature into an
//! [`EarthquakeEvent`], dropping features without a reported magnitude.

use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;

use crate::catalog::EarthquakeEvent;
use crate::FeedError;

// Display radius heuristic: magnitude 4 maps to the base radius and each
// whole magnitude above or below scales it by the growth factor.
const BASE_RADIUS_METERS: f64 = 20_000.0;
const RADIUS_GROWTH_PER_MAGNITUDE: f64 = 1.5;
const REFERENCE_MAGNITUDE: f64 = 4.0;

const MILLIS_PER_MINUTE: i64 = 60_000;

/// Placeholder used when the feed reports a null place description.
pub const UNKNOWN_PLACE: &str = "Unknown location";

/// Top-level feed document.
#[derive(Debug, Deserialize)]
struct FeedDocument {
    features: Vec<Feature>,
}

#[derive(Debug, Deserialize)]
struct Feature {
    #[serde(default)]
    id: Option<String>,
    geometry: Option<Geometry>,
    properties: Properties,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    coordinates: Vec<f64>,
}

#[derive(Debug, Deserialize)]
struct Properties {
    mag: Option<f64>,
    place: Option<String>,
    time: Option<i64>,
    #[serde(default)]
    url: Option<String>,
}

/// Compute the display radius in meters for a magnitude.
///
/// This is a presentation heuristic, not a physical model: the result is a
/// pure function of the magnitude and is computed exactly once at ingestion.
#[must_use]
pub fn visual_radius(magnitude: f64) -> f64 {
    BASE_RADIUS_METERS * RADIUS_GROWTH_PER_MAGNITUDE.powf(magnitude - REFERENCE_MAGNITUDE)
}

/// Parse a raw feed body into normalized events.
///
/// Features without a reported magnitude are skipped. Any structural defect
/// (undecodable JSON, missing `features`, a magnitude-bearing feature without
/// geometry, a short coordinate array, a missing or unrepresentable
/// timestamp) fails the whole parse.
pub fn parse_feed(body: &str) -> Result<Vec<EarthquakeEvent>, FeedError> {
    let document: FeedDocument = serde_json::from_str(body)?;

    let mut events = Vec::with_capacity(document.features.len());
    for feature in document.features {
        if let Some(event) = normalize_feature(feature)? {
            events.push(event);
        }
    }

    Ok(events)
}

/// Flatten one feature into an event, or `None` when magnitude is null.
fn normalize_feature(feature: Feature) -> Result<Option<EarthquakeEvent>, FeedError> {
    let Some(magnitude) = feature.properties.mag else {
        return Ok(None);
    };

    let geometry = feature
        .geometry
        .ok_or(FeedError::MissingField("geometry"))?;
    if geometry.coordinates.len() < 2 {
        return Err(FeedError::MissingField("coordinates"));
    }
    // Geojson position order is longitude first, latitude second.
    let longitude = geometry.coordinates[0];
    let latitude = geometry.coordinates[1];

    let millis = feature
        .properties
        .time
        .ok_or(FeedError::MissingField("time"))?;
    let time = minute_from_millis(millis)?;

    Ok(Some(EarthquakeEvent {
        id: feature.id,
        latitude,
        longitude,
        magnitude,
        place: feature
            .properties
            .place
            .unwrap_or_else(|| UNKNOWN_PLACE.to_string()),
        time,
        visual_radius: visual_radius(magnitude),
        detail_url: feature.properties.url,
    }))
}

/// Convert an epoch-millisecond timestamp to UTC, truncated to the minute.
fn minute_from_millis(millis: i64) -> Result<DateTime<Utc>, FeedError> {
    let truncated = millis.div_euclid(MILLIS_PER_MINUTE) * MILLIS_PER_MINUTE;
    Utc.timestamp_millis_opt(truncated)
        .single()
        .ok_or(FeedError::InvalidValue {
            field: "time",
            value: millis.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    const SAMPLE_DOC: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {
                "id": "us7000abcd",
                "geometry": {"type": "Point", "coordinates": [142.373, 37.142, 35.2]},
                "properties": {
                    "mag": 5.2,
                    "place": "off the east coast of Honshu, Japan",
                    "time": 1700000000000,
                    "url": "https://earthquake.usgs.gov/earthquakes/eventpage/us7000abcd"
                }
            },
            {
                "id": "us7000wxyz",
                "geometry": {"type": "Point", "coordinates": [-120.5, 36.0, 4.1]},
                "properties": {"mag": null, "place": "central California", "time": 1700000060000}
            },
            {
                "geometry": {"type": "Point", "coordinates": [10.0, 20.0]},
                "properties": {"mag": 3.0, "place": null, "time": 1700000120000}
            }
        ]
    }"#;

    #[test]
    fn test_null_magnitude_dropped() {
        let events = parse_feed(SAMPLE_DOC).unwrap();
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| e.magnitude > 0.0));
    }

    #[test]
    fn test_coordinate_order_preserved() {
        let events = parse_feed(SAMPLE_DOC).unwrap();
        // Input pair [10.0, 20.0] is longitude first.
        let event = &events[1];
        assert!((event.longitude - 10.0).abs() < f64::EPSILON);
        assert!((event.latitude - 20.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_visual_radius_formula() {
        assert!((visual_radius(4.0) - 20_000.0).abs() < 1e-9);
        assert!((visual_radius(5.0) - 30_000.0).abs() < 1e-9);
        assert!((visual_radius(6.0) - 45_000.0).abs() < 1e-9);
        // One and a half magnitudes below the reference shrinks by 1.5^1.5.
        let expected = 20_000.0 * 1.5_f64.powf(-1.5);
        assert!((visual_radius(2.5) - expected).abs() < 1e-9);

        let events = parse_feed(SAMPLE_DOC).unwrap();
        assert!((events[0].visual_radius - visual_radius(5.2)).abs() < 1e-9);
    }

    #[test]
    fn test_time_truncated_to_minute() {
        // 1700000000000 ms is 2023-11-14 22:13:20 UTC.
        let events = parse_feed(SAMPLE_DOC).unwrap();
        let event = &events[0];
        assert_eq!(event.time.second(), 0);
        assert_eq!(event.time.nanosecond(), 0);
        assert_eq!(event.time_label(), "2023-11-14 22:13");
    }

    #[test]
    fn test_null_place_gets_placeholder() {
        let events = parse_feed(SAMPLE_DOC).unwrap();
        assert_eq!(events[1].place, UNKNOWN_PLACE);
    }

    #[test]
    fn test_detail_url_and_id_carried() {
        let events = parse_feed(SAMPLE_DOC).unwrap();
        assert_eq!(events[0].id.as_deref(), Some("us7000abcd"));
        assert!(events[0]
            .detail_url
            .as_deref()
            .unwrap()
            .contains("eventpage"));
        assert!(events[1].detail_url.is_none());
    }

    #[test]
    fn test_malformed_json_is_an_error() {
        assert!(matches!(parse_feed("not json"), Err(FeedError::Json(_))));
    }

    #[test]
    fn test_missing_features_key_is_an_error() {
        assert!(matches!(parse_feed("{}"), Err(FeedError::Json(_))));
    }

    #[test]
    fn test_short_coordinates_fail_the_parse() {
        let body = r#"{"features":[{
            "geometry": {"coordinates": [10.0]},
            "properties": {"mag": 4.0, "place": "x", "time": 0}
        }]}"#;
        assert!(matches!(
            parse_feed(body),
            Err(FeedError::MissingField("coordinates"))
        ));
    }

    #[test]
    fn test_missing_time_fails_the_parse() {
        let body = r#"{"features":[{
            "geometry": {"coordinates": [10.0, 20.0]},
            "properties": {"mag": 4.0, "place": "x", "time": null}
        }]}"#;
        assert!(matches!(
            parse_feed(body),
            Err(FeedError::MissingField("time"))
        ));
    }

    #[test]
    fn test_empty_feature_list_yields_empty_output() {
        let events = parse_feed(r#"{"features":[]}"#).unwrap();
        assert!(events.is_empty());
    }
}
