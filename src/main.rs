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

mod app;
mod config;
mod map;
mod worker;

use app::{Overrides, QuakeWatchApp};
use clap::Parser;
use config::AppConfig;
use eframe::egui;
use log::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "quakewatch-desktop")]
#[command(about = "Desktop dashboard for live USGS earthquake activity")]
struct Args {
    /// Feed URL override for this session
    #[arg(long)]
    feed_url: Option<String>,

    /// Initial magnitude threshold (2.5 - 8.0)
    #[arg(long)]
    threshold: Option<f64>,

    /// Auto-refresh interval in seconds (0 disables it)
    #[arg(long)]
    refresh_secs: Option<u64>,
}

fn main() -> Result<(), eframe::Error> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = AppConfig::load().unwrap_or_else(|e| {
        warn!("Failed to load config, using defaults: {e}");
        AppConfig::default()
    });

    info!("Starting QuakeWatch Desktop...");

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1400.0, 900.0])
            .with_title("QuakeWatch Desktop"),
        ..Default::default()
    };

    eframe::run_native(
        "QuakeWatch Desktop",
        options,
        Box::new(move |_cc| {
            let overrides = Overrides {
                feed_url: args.feed_url,
                threshold: args.threshold,
                refresh_secs: args.refresh_secs,
            };
            Ok(Box::new(QuakeWatchApp::new(config, overrides)))
        }),
    )
}
