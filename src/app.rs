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

//! Dashboard UI: map, control console, and analytics panel.

use eframe::egui;
use log::warn;
use quake_feed::{hourly_counts, max_magnitude, EarthquakeEvent, FetchConfig, HOUR_BUCKETS};
use std::time::Duration;

use crate::config::{AppConfig, THRESHOLD_MAX, THRESHOLD_MIN, THRESHOLD_STEP};
use crate::map::{MapStyle, TileManager, WebMercator, TILE_ATTRIBUTION, TILE_PIXELS};
use crate::worker::{FeedHandle, FeedState};

const MIN_ZOOM: f32 = 1.0;
const MAX_ZOOM: f32 = 10.0;

// Event markers below this size are not legible on a world view.
const MIN_EVENT_RADIUS_PX: f32 = 3.0;
const EVENT_PICK_RADIUS_PX: f32 = 8.0;

// Fixed marker color from the dashboard design (red with alpha).
fn event_color() -> egui::Color32 {
    egui::Color32::from_rgba_unmultiplied(200, 30, 0, 160)
}

/// Session-only overrides from the command line.
#[derive(Debug, Default)]
pub struct Overrides {
    pub feed_url: Option<String>,
    pub threshold: Option<f64>,
    pub refresh_secs: Option<u64>,
}

pub struct QuakeWatchApp {
    config: AppConfig,
    feed: FeedHandle,
    threshold: f64,
    map_center_lat: f64,
    map_center_lon: f64,
    map_zoom_level: f32, // Float for smoother pinch-zoom
    tile_manager: TileManager,
    tile_status: Option<String>,
    selected_event: Option<String>,
}

impl QuakeWatchApp {
    pub fn new(config: AppConfig, overrides: Overrides) -> Self {
        let url = overrides
            .feed_url
            .or_else(|| config.active_feed().map(|feed| feed.url.clone()))
            .unwrap_or_else(|| quake_feed::DEFAULT_FEED_URL.to_string());

        let fetch = FetchConfig {
            url,
            timeout: Duration::from_secs(config.fetch_timeout_secs),
        };

        let refresh_secs = overrides.refresh_secs.unwrap_or(config.auto_refresh_secs);
        let auto_refresh = (refresh_secs > 0).then(|| Duration::from_secs(refresh_secs));

        let threshold = overrides
            .threshold
            .unwrap_or(config.default_threshold)
            .clamp(THRESHOLD_MIN, THRESHOLD_MAX);

        let style = MapStyle::from_config(&config.map_style);

        Self {
            feed: FeedHandle::spawn(fetch, auto_refresh),
            threshold,
            // Fixed initial world view of the dashboard.
            map_center_lat: 20.0,
            map_center_lon: 0.0,
            map_zoom_level: config.default_zoom.clamp(MIN_ZOOM, MAX_ZOOM),
            tile_manager: TileManager::new(style),
            tile_status: None,
            selected_event: None,
            config,
        }
    }

    fn save_config(&self) {
        if let Err(e) = self.config.save() {
            warn!("Failed to save config: {e}");
        }
    }

    fn selected<'a>(&self, visible: &[&'a EarthquakeEvent]) -> Option<&'a EarthquakeEvent> {
        let key = self.selected_event.as_deref()?;
        visible.iter().copied().find(|event| event_key(event) == key)
    }

    fn draw_map(&mut self, ui: &mut egui::Ui, visible: &[&EarthquakeEvent]) {
        let (response, painter) = ui.allocate_painter(
            egui::vec2(ui.available_width(), ui.available_height()),
            egui::Sense::click_and_drag(),
        );

        let rect = response.rect;
        let center = rect.center();

        painter.rect_filled(rect, 0.0, self.tile_manager.style().background());

        // Pinch / trackpad zoom
        let zoom_delta = ui.ctx().input(|i| i.zoom_delta());
        if (zoom_delta - 1.0).abs() > 0.001 {
            self.map_zoom_level += zoom_delta.log2();
            self.map_zoom_level = self.map_zoom_level.clamp(MIN_ZOOM, MAX_ZOOM);
        }

        let tile_zoom_level = self.map_zoom_level.round() as u8;

        // Handle dragging in tile space so panning tracks the cursor at any
        // latitude.
        if response.dragged() {
            let delta = response.drag_delta();
            let center_x = WebMercator::lon_to_x(self.map_center_lon, tile_zoom_level)
                - f64::from(delta.x) / TILE_PIXELS;
            let center_y = WebMercator::lat_to_y(self.map_center_lat, tile_zoom_level)
                - f64::from(delta.y) / TILE_PIXELS;
            self.map_center_lon = WebMercator::wrap_lon(WebMercator::tile_to_lon(center_x, tile_zoom_level));
            self.map_center_lat =
                WebMercator::tile_to_lat(center_y, tile_zoom_level).clamp(-85.0, 85.0);
        }

        // Render basemap tiles
        let visible_tiles = self.tile_manager.get_visible_tiles(
            self.map_center_lat,
            self.map_center_lon,
            tile_zoom_level,
            rect.width(),
            rect.height(),
        );

        let mut tiles_rendered = 0;
        for (tile_coord, offset_x, offset_y) in visible_tiles {
            if let Some(texture) = self.tile_manager.get_tile(tile_coord, ui.ctx()) {
                let tile_pos = egui::pos2(center.x + offset_x, center.y + offset_y);
                let tile_rect =
                    egui::Rect::from_min_size(tile_pos, egui::vec2(TILE_PIXELS as f32, TILE_PIXELS as f32));

                painter.image(
                    texture.id(),
                    tile_rect,
                    egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0)),
                    egui::Color32::WHITE,
                );
                tiles_rendered += 1;
            }
        }

        if self.tile_manager.error_count() > 0 {
            self.tile_status = Some(format!(
                "Failed to load {} tiles",
                self.tile_manager.error_count()
            ));
        } else if self.tile_manager.has_loading_tiles() {
            self.tile_status = Some("Loading map tiles...".to_string());
        } else if tiles_rendered > 0 {
            self.tile_status = None;
        }

        // Convert lat/lon to screen coordinates using Web Mercator
        let to_screen = |lat: f64, lon: f64| -> egui::Pos2 {
            let tile_x = WebMercator::lon_to_x(lon, tile_zoom_level);
            let tile_y = WebMercator::lat_to_y(lat, tile_zoom_level);

            let center_tile_x = WebMercator::lon_to_x(self.map_center_lon, tile_zoom_level);
            let center_tile_y = WebMercator::lat_to_y(self.map_center_lat, tile_zoom_level);

            let pixel_x = (tile_x - center_tile_x) * TILE_PIXELS;
            let pixel_y = (tile_y - center_tile_y) * TILE_PIXELS;

            egui::pos2(center.x + pixel_x as f32, center.y + pixel_y as f32)
        };

        let pointer = response.hover_pos();
        let clicked_at = response.interact_pointer_pos().filter(|_| response.clicked());
        let mut hovered: Option<(&EarthquakeEvent, egui::Pos2)> = None;

        for event in visible {
            let pos = to_screen(event.latitude, event.longitude);
            if !rect.contains(pos) {
                continue;
            }

            // Meter radius computed at ingestion, projected to pixels here.
            let meters_per_pixel =
                WebMercator::meters_per_pixel(event.latitude, f64::from(self.map_zoom_level));
            let radius = ((event.visual_radius / meters_per_pixel) as f32).max(MIN_EVENT_RADIUS_PX);

            painter.circle_filled(pos, radius, event_color());

            let key = event_key(event);
            if self.selected_event.as_deref() == Some(key.as_str()) {
                painter.circle_stroke(
                    pos,
                    radius + 2.0,
                    egui::Stroke::new(1.5, egui::Color32::WHITE),
                );
            }

            let pick_radius = radius.max(EVENT_PICK_RADIUS_PX);
            if let Some(cursor) = pointer {
                if cursor.distance(pos) <= pick_radius {
                    // Later events draw on top, so the last hit wins.
                    hovered = Some((event, pos));
                }
            }
            if let Some(click) = clicked_at {
                if click.distance(pos) <= pick_radius {
                    self.selected_event = Some(key);
                }
            }
        }

        if let Some((event, pos)) = hovered {
            self.draw_event_tooltip(&painter, rect, event, pos);
        }

        // Instructions
        painter.text(
            rect.left_top() + egui::vec2(10.0, 10.0),
            egui::Align2::LEFT_TOP,
            "Drag to pan | Pinch to zoom",
            egui::FontId::proportional(12.0),
            ui.visuals().text_color(),
        );

        // Attribution (required by Carto)
        painter.text(
            rect.right_bottom() + egui::vec2(-10.0, -10.0),
            egui::Align2::RIGHT_BOTTOM,
            TILE_ATTRIBUTION,
            egui::FontId::proportional(10.0),
            ui.visuals().weak_text_color(),
        );

        if let Some(message) = self.tile_status.clone() {
            let is_error = message.contains("Failed");
            draw_status_bubble(&painter, rect, &message, is_error, 20.0);
        }
    }

    fn draw_event_tooltip(
        &self,
        painter: &egui::Painter,
        rect: egui::Rect,
        event: &EarthquakeEvent,
        pos: egui::Pos2,
    ) {
        let lines = [
            (event.place.clone(), egui::FontId::proportional(11.0)),
            (
                format!("Magnitude {:.1}", event.magnitude),
                egui::FontId::proportional(10.0),
            ),
            (event.time_label(), egui::FontId::monospace(10.0)),
        ];

        let mut offset_y = -10.0;
        for (text, font) in lines {
            let text_pos = pos + egui::vec2(12.0, offset_y);

            let galley = painter.layout_no_wrap(text.clone(), font.clone(), egui::Color32::WHITE);

            let padding = egui::vec2(3.0, 2.0);
            let box_rect = egui::Rect::from_min_size(
                text_pos - egui::vec2(padding.x, galley.size().y / 2.0 + padding.y),
                galley.size() + padding * 2.0,
            );
            // Keep the label on the map surface.
            let shift = egui::vec2(
                (rect.right() - box_rect.right()).min(0.0),
                (rect.bottom() - box_rect.bottom()).min(0.0),
            );

            painter.rect_filled(
                box_rect.translate(shift),
                2.0,
                egui::Color32::from_rgba_unmultiplied(0, 0, 0, 180),
            );
            painter.text(
                text_pos + shift,
                egui::Align2::LEFT_CENTER,
                text,
                font,
                egui::Color32::WHITE,
            );

            offset_y += 15.0;
        }
    }

    fn draw_control_panel(
        &mut self,
        ui: &mut egui::Ui,
        state: &FeedState,
        visible: &[&EarthquakeEvent],
    ) {
        ui.vertical(|ui| {
            ui.label(
                egui::RichText::new("◈ GLOBAL SEISMIC MONITOR")
                    .color(egui::Color32::from_rgb(100, 200, 100))
                    .size(14.0)
                    .strong(),
            );
            ui.label(
                egui::RichText::new("Source: USGS Live Feed")
                    .color(egui::Color32::from_rgb(150, 150, 150))
                    .size(10.0)
                    .monospace(),
            );
        });

        ui.add_space(6.0);
        self.draw_feed_selector(ui);
        ui.add_space(6.0);

        ui.add(
            egui::Slider::new(&mut self.threshold, THRESHOLD_MIN..=THRESHOLD_MAX)
                .step_by(THRESHOLD_STEP)
                .fixed_decimals(1)
                .text("Minimum magnitude"),
        );

        ui.add_space(6.0);
        ui.separator();

        let max_mag = max_magnitude(visible).unwrap_or(0.0);
        ui.columns(3, |columns| {
            metric(&mut columns[0], "VISIBLE", &format!("{}", visible.len()));
            metric(&mut columns[1], "MAX MAG", &format!("{max_mag:.1}"));
            metric(&mut columns[2], "THRESHOLD", &format!("{:.1}", self.threshold));
        });

        ui.separator();
        ui.add_space(4.0);

        ui.horizontal(|ui| {
            if ui.button("Refresh").clicked() {
                self.feed.refresh();
            }
            if state.is_loading() {
                ui.spinner();
                ui.label(egui::RichText::new("Fetching feed...").size(10.0));
            } else if let Some(fetched_at) = state.fetched_at() {
                ui.label(
                    egui::RichText::new(format!(
                        "Updated {}",
                        fetched_at.format("%H:%M:%S")
                    ))
                    .color(egui::Color32::from_rgb(150, 150, 150))
                    .size(10.0)
                    .monospace(),
                );
            }
        });

        if let Some(error) = state.error() {
            ui.add_space(4.0);
            ui.label(
                egui::RichText::new(error)
                    .color(egui::Color32::from_rgb(255, 120, 120))
                    .size(11.0),
            );
        } else if !state.is_loading() && visible.is_empty() {
            ui.add_space(4.0);
            ui.label(
                egui::RichText::new("No events above this threshold; lower it to see more.")
                    .color(egui::Color32::from_rgb(255, 200, 100))
                    .size(11.0),
            );
        }

        let style = self.tile_manager.style();
        let mut dark = style == MapStyle::Dark;
        if ui.checkbox(&mut dark, "Dark basemap").changed() {
            let (next, name) = if dark {
                (MapStyle::Dark, "dark")
            } else {
                (MapStyle::Light, "light")
            };
            self.tile_manager.set_style(next);
            self.config.map_style = name.to_string();
            self.save_config();
        }

        if let Some(event) = self.selected(visible) {
            ui.add_space(6.0);
            ui.separator();
            self.draw_selected_detail(ui, event);
        }
    }

    fn draw_feed_selector(&mut self, ui: &mut egui::Ui) {
        let active_name = self
            .config
            .active_feed()
            .map_or_else(|| "No feed".to_string(), |feed| feed.name.clone());

        let mut picked: Option<(String, String)> = None;
        egui::ComboBox::from_label("Feed")
            .selected_text(active_name)
            .show_ui(ui, |ui| {
                for feed in &self.config.feeds {
                    if ui.selectable_label(feed.enabled, &feed.name).clicked() && !feed.enabled {
                        picked = Some((feed.id.clone(), feed.url.clone()));
                    }
                }
            });

        if let Some((id, url)) = picked {
            self.config.select_feed(&id);
            self.save_config();
            self.selected_event = None;
            self.feed.change_feed(url);
        }
    }

    fn draw_selected_detail(&self, ui: &mut egui::Ui, event: &EarthquakeEvent) {
        egui::Frame::group(ui.style()).show(ui, |ui| {
            ui.label(
                egui::RichText::new(&event.place)
                    .color(egui::Color32::from_rgb(200, 220, 255))
                    .size(11.0)
                    .strong(),
            );
            ui.horizontal(|ui| {
                let (color, symbol) = magnitude_badge(event.magnitude);
                ui.label(
                    egui::RichText::new(format!("{symbol} M{:.1}", event.magnitude))
                        .color(color)
                        .size(11.0)
                        .monospace(),
                );
                ui.label(
                    egui::RichText::new(event.time_label())
                        .color(egui::Color32::from_rgb(150, 150, 150))
                        .size(10.0)
                        .monospace(),
                );
            });
            ui.label(
                egui::RichText::new(format!(
                    "{:>7.3}° {:>8.3}°",
                    event.latitude, event.longitude
                ))
                .color(egui::Color32::from_rgb(120, 120, 120))
                .size(9.0)
                .monospace(),
            );
            if let Some(url) = &event.detail_url {
                if ui.small_button("Open event page").clicked() {
                    if let Err(e) = webbrowser::open(url) {
                        warn!("Failed to open event page: {e}");
                    }
                }
            }
        });
    }

    fn draw_analytics(&mut self, ui: &mut egui::Ui, visible: &[&EarthquakeEvent]) {
        ui.add_space(4.0);
        ui.label(
            egui::RichText::new("Events by hour of day (UTC)")
                .size(12.0)
                .strong(),
        );

        let counts = hourly_counts(visible);
        let bars: Vec<egui_plot::Bar> = counts
            .iter()
            .enumerate()
            .map(|(hour, &count)| {
                egui_plot::Bar::new(hour as f64, f64::from(count)).width(0.8)
            })
            .collect();

        let chart = egui_plot::BarChart::new("events_by_hour", bars)
            .color(egui::Color32::from_rgb(200, 60, 30));

        egui_plot::Plot::new("hourly_histogram")
            .height(140.0)
            .allow_drag(false)
            .allow_zoom(false)
            .allow_scroll(false)
            .allow_boxed_zoom(false)
            .include_x(-0.5)
            .include_x((HOUR_BUCKETS as f64) - 0.5)
            .include_y(0.0)
            .show(ui, |plot_ui| {
                plot_ui.bar_chart(chart);
            });

        ui.label(
            egui::RichText::new("X: hour of day (0-23) | Y: event count")
                .color(egui::Color32::from_rgb(130, 130, 130))
                .size(9.0),
        );

        ui.add_space(4.0);
        let table = egui::CollapsingHeader::new("Event table")
            .default_open(self.config.table_expanded)
            .show(ui, |ui| {
                draw_event_table(ui, visible);
            });
        if table.header_response.clicked() {
            self.config.table_expanded = !self.config.table_expanded;
            self.save_config();
        }
    }
}

impl eframe::App for QuakeWatchApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // Repaint periodically so background fetch results appear promptly.
        ctx.request_repaint_after(Duration::from_millis(500));

        let state = self.feed.state();
        let visible: Vec<&EarthquakeEvent> = state
            .catalog()
            .map(|catalog| catalog.filter(self.threshold))
            .unwrap_or_default();

        egui::TopBottomPanel::bottom("analytics")
            .resizable(true)
            .default_height(230.0)
            .show(ctx, |ui| {
                egui::ScrollArea::vertical().show(ui, |ui| {
                    self.draw_analytics(ui, &visible);
                });
            });

        egui::CentralPanel::default()
            .frame(egui::Frame::NONE)
            .show(ctx, |ui| {
                self.draw_map(ui, &visible);

                if let Some(error) = state.error() {
                    draw_status_bubble(ui.painter(), ui.max_rect(), error, true, 48.0);
                }
            });

        let screen_height = ctx.screen_rect().height();
        egui::Window::new("Command Console")
            .anchor(egui::Align2::RIGHT_TOP, egui::vec2(-10.0, 10.0))
            .default_width(320.0)
            .max_height(screen_height - 280.0)
            .resizable(false)
            .collapsible(true)
            .show(ctx, |ui| {
                egui::ScrollArea::vertical().show(ui, |ui| {
                    self.draw_control_panel(ui, &state, &visible);
                });
            });
    }
}

/// Stable identity for selection, surviving refreshes of the same feed.
fn event_key(event: &EarthquakeEvent) -> String {
    event.id.clone().unwrap_or_else(|| {
        format!(
            "{:.4}:{:.4}:{}",
            event.latitude,
            event.longitude,
            event.time.timestamp()
        )
    })
}

fn metric(ui: &mut egui::Ui, label: &str, value: &str) {
    ui.vertical(|ui| {
        ui.label(
            egui::RichText::new(label)
                .color(egui::Color32::from_rgb(150, 150, 150))
                .size(9.0)
                .monospace(),
        );
        ui.label(
            egui::RichText::new(value)
                .color(egui::Color32::from_rgb(200, 220, 255))
                .size(16.0)
                .monospace()
                .strong(),
        );
    });
}

/// Severity accent used in text labels; map markers keep the fixed color.
fn magnitude_badge(magnitude: f64) -> (egui::Color32, &'static str) {
    if magnitude >= 7.0 {
        (egui::Color32::from_rgb(255, 80, 80), "▲")
    } else if magnitude >= 5.5 {
        (egui::Color32::from_rgb(255, 150, 50), "▲")
    } else if magnitude >= 4.0 {
        (egui::Color32::from_rgb(220, 200, 80), "●")
    } else {
        (egui::Color32::from_rgb(100, 200, 200), "●")
    }
}

fn draw_event_table(ui: &mut egui::Ui, visible: &[&EarthquakeEvent]) {
    use egui_extras::{Column, TableBuilder};

    TableBuilder::new(ui)
        .striped(true)
        .max_scroll_height(220.0)
        .column(Column::auto())
        .column(Column::remainder())
        .column(Column::auto())
        .column(Column::auto())
        .column(Column::auto())
        .header(18.0, |mut header| {
            for title in ["Time", "Place", "Mag", "Lat", "Lon"] {
                header.col(|ui| {
                    ui.strong(title);
                });
            }
        })
        .body(|mut body| {
            for event in visible {
                body.row(18.0, |mut row| {
                    row.col(|ui| {
                        ui.monospace(event.time_label());
                    });
                    row.col(|ui| {
                        ui.label(&event.place);
                    });
                    row.col(|ui| {
                        ui.monospace(format!("{:.1}", event.magnitude));
                    });
                    row.col(|ui| {
                        ui.monospace(format!("{:.3}", event.latitude));
                    });
                    row.col(|ui| {
                        ui.monospace(format!("{:.3}", event.longitude));
                    });
                });
            }
        });
}

fn draw_status_bubble(
    painter: &egui::Painter,
    rect: egui::Rect,
    message: &str,
    is_error: bool,
    offset_y: f32,
) {
    let bg_color = if is_error {
        egui::Color32::from_rgb(220, 50, 50)
    } else {
        egui::Color32::from_rgb(255, 200, 100)
    };

    let bubble_pos = rect.center_top() + egui::vec2(0.0, offset_y);
    let galley = painter.layout_no_wrap(
        message.to_string(),
        egui::FontId::proportional(12.0),
        egui::Color32::WHITE,
    );

    let padding = egui::vec2(12.0, 6.0);
    let bubble_rect = egui::Rect::from_center_size(bubble_pos, galley.size() + padding * 2.0);

    painter.rect_filled(bubble_rect, 5.0, bg_color);
    painter.text(
        bubble_pos,
        egui::Align2::CENTER_CENTER,
        message,
        egui::FontId::proportional(12.0),
        egui::Color32::WHITE,
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn event(id: Option<&str>) -> EarthquakeEvent {
        EarthquakeEvent {
            id: id.map(str::to_string),
            latitude: 37.1,
            longitude: 142.3,
            magnitude: 5.0,
            place: "test region".to_string(),
            time: Utc.with_ymd_and_hms(2023, 11, 14, 22, 13, 0).unwrap(),
            visual_radius: quake_feed::visual_radius(5.0),
            detail_url: None,
        }
    }

    #[test]
    fn test_event_key_prefers_feed_id() {
        assert_eq!(event_key(&event(Some("us7000abcd"))), "us7000abcd");
    }

    #[test]
    fn test_event_key_fallback_is_stable() {
        let a = event(None);
        let b = event(None);
        assert_eq!(event_key(&a), event_key(&b));
    }
}
