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

//! Map rendering and tile management.
//!
//! This module provides map tile fetching, caching, and Web Mercator
//! projection utilities.

pub mod mercator;
pub mod tiles;

pub use mercator::{WebMercator, TILE_PIXELS};
pub use tiles::{MapStyle, TileManager, TILE_ATTRIBUTION};
