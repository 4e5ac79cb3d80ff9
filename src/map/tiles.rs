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

//! Basemap tile fetching and caching.
//!
//! Tiles come from the Carto CDN with subdomain load balancing and are
//! cached on disk under the platform cache directory, keyed by a hash of the
//! tile URL. Downloads run on background threads; the map just skips tiles
//! that are not ready yet.

use egui::{ColorImage, TextureHandle};
use log::{debug, warn};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

use super::mercator::{WebMercator, TILE_PIXELS};

const TILE_SIZE: u32 = 256;
const CACHE_DURATION_DAYS: u64 = 7;

/// Attribution required by the tile provider.
pub const TILE_ATTRIBUTION: &str = "© OpenStreetMap contributors © CARTO";

/// Carto basemap style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MapStyle {
    Dark,
    Light,
}

impl MapStyle {
    /// Parse the config string, falling back to the dark style.
    pub fn from_config(value: &str) -> Self {
        match value {
            "light" => MapStyle::Light,
            _ => MapStyle::Dark,
        }
    }

    /// Carto layer path segment for URL construction.
    fn path(self) -> &'static str {
        match self {
            MapStyle::Dark => "dark_all",
            MapStyle::Light => "light_all",
        }
    }

    /// Fill color shown under tiles that have not loaded yet.
    pub fn background(self) -> egui::Color32 {
        match self {
            MapStyle::Dark => egui::Color32::from_rgb(14, 17, 22),
            MapStyle::Light => egui::Color32::from_rgb(200, 220, 240),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TileCoord {
    pub x: u32,
    pub y: u32,
    pub zoom: u8,
}

impl TileCoord {
    pub fn new(x: u32, y: u32, zoom: u8) -> Self {
        Self { x, y, zoom }
    }

    /// Get the tile URL from the Carto CDN for a style.
    pub fn url(&self, style: MapStyle) -> String {
        // Subdomain load balancing (a, b, c, d) based on tile coordinates
        let subdomain = ['a', 'b', 'c', 'd'][((self.x + self.y) % 4) as usize];
        format!(
            "https://{}.basemaps.cartocdn.com/{}/{}/{}/{}.png",
            subdomain,
            style.path(),
            self.zoom,
            self.x,
            self.y
        )
    }

    /// Cache filename based on hash of URL (styles hash apart).
    fn cache_filename(&self, style: MapStyle) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.url(style).as_bytes());
        let hash = hasher.finalize();
        format!("{hash:x}.png")
    }
}

enum TileState {
    Loading,
    Loaded(TextureHandle),
    Failed,
}

/// Tile texture store with disk cache and background downloads.
pub struct TileManager {
    cache_dir: PathBuf,
    style: MapStyle,
    tiles: Arc<Mutex<HashMap<TileCoord, TileState>>>,
}

impl std::fmt::Debug for TileManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TileManager")
            .field("cache_dir", &self.cache_dir)
            .field("style", &self.style)
            .finish_non_exhaustive()
    }
}

impl TileManager {
    pub fn new(style: MapStyle) -> Self {
        let cache_dir = Self::cache_dir();

        if let Err(e) = fs::create_dir_all(&cache_dir) {
            warn!("Failed to create tile cache directory: {e}");
        }
        Self::cleanup_old_tiles(&cache_dir);

        Self {
            cache_dir,
            style,
            tiles: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// The active basemap style.
    pub fn style(&self) -> MapStyle {
        self.style
    }

    /// Switch styles, dropping loaded textures so tiles re-resolve.
    pub fn set_style(&mut self, style: MapStyle) {
        if self.style != style {
            self.style = style;
            self.tiles
                .lock()
                .expect("Tile state mutex poisoned")
                .clear();
        }
    }

    fn cache_dir() -> PathBuf {
        let mut path = dirs::cache_dir().unwrap_or_else(|| PathBuf::from(".cache"));
        path.push("quakewatch-desktop");
        path.push("tiles");
        path
    }

    fn cleanup_old_tiles(cache_dir: &Path) {
        let now = SystemTime::now();
        let max_age = Duration::from_secs(CACHE_DURATION_DAYS * 24 * 60 * 60);

        let Ok(entries) = fs::read_dir(cache_dir) else {
            return;
        };
        for entry in entries.flatten() {
            let Ok(metadata) = entry.metadata() else {
                continue;
            };
            let expired = metadata
                .modified()
                .ok()
                .and_then(|modified| now.duration_since(modified).ok())
                .is_some_and(|age| age > max_age);
            if expired {
                let _ = fs::remove_file(entry.path());
                debug!("Removed old tile cache entry: {:?}", entry.path());
            }
        }
    }

    /// Get tile texture from memory or disk, or queue it for download.
    pub fn get_tile(&self, coord: TileCoord, ctx: &egui::Context) -> Option<TextureHandle> {
        let mut tiles = self.tiles.lock().expect("Tile state mutex poisoned");

        match tiles.get(&coord) {
            Some(TileState::Loaded(texture)) => Some(texture.clone()),
            Some(TileState::Loading | TileState::Failed) => None,
            None => {
                let cache_path = self.cache_dir.join(coord.cache_filename(self.style));

                if cache_path.exists() {
                    match load_tile_texture(&cache_path, ctx, coord) {
                        Ok(texture) => {
                            tiles.insert(coord, TileState::Loaded(texture.clone()));
                            Some(texture)
                        }
                        Err(e) => {
                            warn!("Failed to load cached tile: {e}");
                            tiles.insert(coord, TileState::Loading);
                            self.spawn_download(coord, ctx.clone());
                            None
                        }
                    }
                } else {
                    tiles.insert(coord, TileState::Loading);
                    self.spawn_download(coord, ctx.clone());
                    None
                }
            }
        }
    }

    fn spawn_download(&self, coord: TileCoord, ctx: egui::Context) {
        let tiles = Arc::clone(&self.tiles);
        let cache_path = self.cache_dir.join(coord.cache_filename(self.style));
        let url = coord.url(self.style);

        std::thread::spawn(move || {
            let state = match download_tile(&url, &cache_path, &ctx, coord) {
                Ok(texture) => {
                    ctx.request_repaint();
                    TileState::Loaded(texture)
                }
                Err(e) => {
                    warn!("Failed to fetch tile {url}: {e}");
                    TileState::Failed
                }
            };
            tiles
                .lock()
                .expect("Tile state mutex poisoned")
                .insert(coord, state);
        });
    }

    /// Get all tiles needed for a viewport, with pixel offsets from center.
    pub fn get_visible_tiles(
        &self,
        center_lat: f64,
        center_lon: f64,
        zoom: u8,
        viewport_width: f32,
        viewport_height: f32,
    ) -> Vec<(TileCoord, f32, f32)> {
        let mut tiles = Vec::new();

        let center_tile_x = WebMercator::lon_to_x(center_lon, zoom);
        let center_tile_y = WebMercator::lat_to_y(center_lat, zoom);

        let tiles_wide = (f64::from(viewport_width) / TILE_PIXELS).ceil() as i32 + 2;
        let tiles_high = (f64::from(viewport_height) / TILE_PIXELS).ceil() as i32 + 2;

        let start_x = center_tile_x.floor() as i32 - tiles_wide / 2;
        let start_y = center_tile_y.floor() as i32 - tiles_high / 2;

        let max_tile = 2_i32.pow(u32::from(zoom));

        for dy in 0..tiles_high {
            for dx in 0..tiles_wide {
                let tile_x = start_x + dx;
                let tile_y = start_y + dy;

                // Longitude wraps around; latitude does not.
                let wrapped_x = ((tile_x % max_tile) + max_tile) % max_tile;
                if tile_y < 0 || tile_y >= max_tile {
                    continue;
                }

                let coord = TileCoord::new(wrapped_x as u32, tile_y as u32, zoom);
                let offset_x = (f64::from(tile_x) - center_tile_x) * TILE_PIXELS;
                let offset_y = (f64::from(tile_y) - center_tile_y) * TILE_PIXELS;
                tiles.push((coord, offset_x as f32, offset_y as f32));
            }
        }

        tiles
    }

    pub fn has_loading_tiles(&self) -> bool {
        let tiles = self.tiles.lock().expect("Tile state mutex poisoned");
        tiles.values().any(|state| matches!(state, TileState::Loading))
    }

    pub fn error_count(&self) -> usize {
        let tiles = self.tiles.lock().expect("Tile state mutex poisoned");
        tiles
            .values()
            .filter(|state| matches!(state, TileState::Failed))
            .count()
    }
}

fn load_tile_texture(
    path: &Path,
    ctx: &egui::Context,
    coord: TileCoord,
) -> Result<TextureHandle, String> {
    let img_data = fs::read(path).map_err(|e| e.to_string())?;
    texture_from_bytes(&img_data, ctx, coord)
}

fn texture_from_bytes(
    bytes: &[u8],
    ctx: &egui::Context,
    coord: TileCoord,
) -> Result<TextureHandle, String> {
    let img = image::load_from_memory(bytes).map_err(|e| e.to_string())?;
    let rgba = img.to_rgba8();

    let color_image =
        ColorImage::from_rgba_unmultiplied([TILE_SIZE as usize, TILE_SIZE as usize], &rgba.into_raw());

    Ok(ctx.load_texture(
        format!("tile_{}_{}/{}", coord.zoom, coord.x, coord.y),
        color_image,
        Default::default(),
    ))
}

fn download_tile(
    url: &str,
    cache_path: &Path,
    ctx: &egui::Context,
    coord: TileCoord,
) -> Result<TextureHandle, String> {
    debug!("Downloading tile: {url}");

    let response = reqwest::blocking::get(url).map_err(|e| e.to_string())?;
    if !response.status().is_success() {
        return Err(format!("HTTP {}", response.status()));
    }
    let bytes = response.bytes().map_err(|e| e.to_string())?;

    if let Err(e) = fs::write(cache_path, &bytes) {
        warn!("Failed to save tile to cache: {e}");
    }

    texture_from_bytes(&bytes, ctx, coord)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tile_url_balances_subdomains_within_style() {
        let coord = TileCoord::new(3, 2, 4);
        let url = coord.url(MapStyle::Dark);
        assert_eq!(url, "https://b.basemaps.cartocdn.com/dark_all/4/3/2.png");
        assert!(coord.url(MapStyle::Light).contains("/light_all/"));
    }

    #[test]
    fn test_cache_filename_differs_per_style() {
        let coord = TileCoord::new(1, 1, 1);
        assert_ne!(
            coord.cache_filename(MapStyle::Dark),
            coord.cache_filename(MapStyle::Light)
        );
    }

    #[test]
    fn test_style_from_config_defaults_to_dark() {
        assert_eq!(MapStyle::from_config("light"), MapStyle::Light);
        assert_eq!(MapStyle::from_config("dark"), MapStyle::Dark);
        assert_eq!(MapStyle::from_config("sepia"), MapStyle::Dark);
    }
}
