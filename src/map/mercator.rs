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

//! Web Mercator projection utilities.

/// Basemap tile edge length in pixels.
pub const TILE_PIXELS: f64 = 256.0;

const EARTH_CIRCUMFERENCE_METERS: f64 = 40_075_016.686;

/// Web Mercator projection utilities
pub struct WebMercator;

impl WebMercator {
    /// Convert latitude to Web Mercator tile-space Y at a zoom level
    pub fn lat_to_y(lat: f64, zoom: u8) -> f64 {
        let lat_rad = lat.to_radians();
        let n = 2_f64.powi(i32::from(zoom));
        let y = (1.0 - (lat_rad.tan() + 1.0 / lat_rad.cos()).ln() / std::f64::consts::PI) / 2.0;
        y * n
    }

    /// Convert longitude to Web Mercator tile-space X at a zoom level
    pub fn lon_to_x(lon: f64, zoom: u8) -> f64 {
        let n = 2_f64.powi(i32::from(zoom));
        ((lon + 180.0) / 360.0) * n
    }

    /// Convert tile-space Y back to latitude
    pub fn tile_to_lat(y: f64, zoom: u8) -> f64 {
        let n = 2_f64.powi(i32::from(zoom));
        let lat_rad = ((std::f64::consts::PI * (1.0 - 2.0 * y / n)).sinh()).atan();
        lat_rad.to_degrees()
    }

    /// Convert tile-space X back to longitude
    pub fn tile_to_lon(x: f64, zoom: u8) -> f64 {
        let n = 2_f64.powi(i32::from(zoom));
        x / n * 360.0 - 180.0
    }

    /// Ground resolution in meters per screen pixel at a latitude and
    /// (fractional) zoom level.
    pub fn meters_per_pixel(lat: f64, zoom: f64) -> f64 {
        EARTH_CIRCUMFERENCE_METERS * lat.to_radians().cos() / (TILE_PIXELS * 2_f64.powf(zoom))
    }

    /// Wrap a longitude into the [-180, 180) range.
    pub fn wrap_lon(lon: f64) -> f64 {
        (lon + 180.0).rem_euclid(360.0) - 180.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_origin_projects_to_tile_center() {
        assert!((WebMercator::lon_to_x(0.0, 0) - 0.5).abs() < 1e-9);
        assert!((WebMercator::lat_to_y(0.0, 0) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_projection_round_trip() {
        for &(lat, lon) in &[(37.142, 142.373), (-33.86, 151.21), (64.13, -21.9)] {
            let zoom = 6;
            let x = WebMercator::lon_to_x(lon, zoom);
            let y = WebMercator::lat_to_y(lat, zoom);
            assert!((WebMercator::tile_to_lon(x, zoom) - lon).abs() < 1e-6);
            assert!((WebMercator::tile_to_lat(y, zoom) - lat).abs() < 1e-6);
        }
    }

    #[test]
    fn test_ground_resolution_at_equator() {
        // Standard Web Mercator ground resolution at zoom 0 is ~156543 m/px.
        let mpp = WebMercator::meters_per_pixel(0.0, 0.0);
        assert!((mpp - 156_543.033_93).abs() < 0.1);
        // Doubling the zoom level halves the resolution.
        assert!((WebMercator::meters_per_pixel(0.0, 1.0) - mpp / 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_wrap_lon() {
        assert!((WebMercator::wrap_lon(190.0) - (-170.0)).abs() < 1e-9);
        assert!((WebMercator::wrap_lon(-190.0) - 170.0).abs() < 1e-9);
        assert!((WebMercator::wrap_lon(45.0) - 45.0).abs() < 1e-9);
    }
}
