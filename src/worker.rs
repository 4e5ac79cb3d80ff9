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

//! Background feed worker.
//!
//! One thread owns the [`FeedClient`] and performs every fetch, so the UI
//! thread never blocks on the network. The UI reads the latest
//! [`FeedState`] from a shared handle each frame and sends commands over a
//! channel. Acquisition failures are masked here: a failed fetch publishes
//! an empty event slice plus a user-visible message, never a partial
//! catalog.

use std::sync::mpsc::{Receiver, RecvTimeoutError, Sender};
use std::sync::{mpsc, Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{info, warn};
use quake_feed::{EarthquakeEvent, EventCatalog, FeedClient, FeedError, FetchConfig};

/// What the dashboard currently knows about the feed.
#[derive(Debug, Clone)]
pub enum FeedState {
    /// A fetch is in flight and nothing has loaded yet this cycle.
    Loading,
    /// A catalog is ready for filtering.
    Ready(EventCatalog),
    /// The last fetch failed; the dashboard shows the message and an empty
    /// event set.
    Failed { message: String },
}

impl FeedState {
    /// The events available for rendering; empty unless a catalog is ready.
    pub fn events(&self) -> &[EarthquakeEvent] {
        match self {
            FeedState::Ready(catalog) => catalog.events(),
            FeedState::Loading | FeedState::Failed { .. } => &[],
        }
    }

    /// The ready catalog, if one is loaded.
    pub fn catalog(&self) -> Option<&EventCatalog> {
        match self {
            FeedState::Ready(catalog) => Some(catalog),
            _ => None,
        }
    }

    /// The surfaced acquisition error, if the last fetch failed.
    pub fn error(&self) -> Option<&str> {
        match self {
            FeedState::Failed { message, .. } => Some(message),
            _ => None,
        }
    }

    /// When the current catalog was fetched.
    pub fn fetched_at(&self) -> Option<DateTime<Utc>> {
        match self {
            FeedState::Ready(catalog) => Some(catalog.fetched_at()),
            _ => None,
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, FeedState::Loading)
    }
}

/// Commands the UI can send to the worker.
enum FeedCommand {
    /// Invalidate the memoized catalog and fetch again.
    Refresh,
    /// Switch to a different feed URL, then fetch.
    ChangeFeed(String),
}

/// UI-side handle to the feed worker.
pub struct FeedHandle {
    state: Arc<Mutex<FeedState>>,
    commands: Sender<FeedCommand>,
}

impl std::fmt::Debug for FeedHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedHandle").finish_non_exhaustive()
    }
}

impl FeedHandle {
    /// Spawn the worker thread and kick off the initial fetch.
    ///
    /// When `auto_refresh` is set, the worker re-fetches each time the
    /// interval elapses without a command arriving.
    pub fn spawn(config: FetchConfig, auto_refresh: Option<Duration>) -> Self {
        let state = Arc::new(Mutex::new(FeedState::Loading));
        let (commands, receiver) = mpsc::channel();

        let shared = Arc::clone(&state);
        std::thread::spawn(move || run_worker(config, auto_refresh, &shared, &receiver));

        Self { state, commands }
    }

    /// Snapshot of the current feed state.
    pub fn state(&self) -> FeedState {
        self.state
            .lock()
            .expect("Feed state mutex poisoned")
            .clone()
    }

    /// Ask the worker for a fresh fetch.
    pub fn refresh(&self) {
        let _ = self.commands.send(FeedCommand::Refresh);
    }

    /// Switch the worker to a different feed URL.
    pub fn change_feed(&self, url: String) {
        let _ = self.commands.send(FeedCommand::ChangeFeed(url));
    }
}

fn run_worker(
    config: FetchConfig,
    auto_refresh: Option<Duration>,
    state: &Arc<Mutex<FeedState>>,
    commands: &Receiver<FeedCommand>,
) {
    let timeout = config.timeout;
    let mut client = match FeedClient::new(config) {
        Ok(client) => client,
        Err(e) => {
            publish(state, Err(e));
            return;
        }
    };

    publish(state, client.events());

    loop {
        let command = match auto_refresh {
            Some(interval) => match commands.recv_timeout(interval) {
                Ok(command) => Some(command),
                // Interval elapsed with no command: refresh on our own.
                Err(RecvTimeoutError::Timeout) => None,
                Err(RecvTimeoutError::Disconnected) => break,
            },
            None => match commands.recv() {
                Ok(command) => Some(command),
                Err(_) => break,
            },
        };

        match command {
            Some(FeedCommand::ChangeFeed(url)) => {
                info!("Switching feed to {url}");
                set_loading(state);
                match FeedClient::new(FetchConfig { url, timeout }) {
                    Ok(next) => client = next,
                    Err(e) => {
                        publish(state, Err(e));
                        continue;
                    }
                }
                publish(state, client.events());
            }
            Some(FeedCommand::Refresh) | None => {
                set_loading(state);
                publish(state, client.refresh());
            }
        }
    }
}

fn set_loading(state: &Arc<Mutex<FeedState>>) {
    *state.lock().expect("Feed state mutex poisoned") = FeedState::Loading;
}

fn publish(state: &Arc<Mutex<FeedState>>, result: Result<EventCatalog, FeedError>) {
    let next = match result {
        Ok(catalog) => {
            info!("Feed ready with {} events", catalog.len());
            FeedState::Ready(catalog)
        }
        Err(e) => {
            warn!("Data acquisition failed: {e}");
            FeedState::Failed {
                message: format!("Data acquisition failed: {e}"),
            }
        }
    };

    *state.lock().expect("Feed state mutex poisoned") = next;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loading_and_failed_states_present_empty_events() {
        let loading = FeedState::Loading;
        assert!(loading.events().is_empty());
        assert!(loading.error().is_none());

        let failed = FeedState::Failed {
            message: "Data acquisition failed: timeout".to_string(),
        };
        assert!(failed.events().is_empty());
        assert_eq!(
            failed.error(),
            Some("Data acquisition failed: timeout")
        );
        assert!(failed.fetched_at().is_none());
    }

    #[test]
    fn test_publish_masks_errors_as_failed_state() {
        let state = Arc::new(Mutex::new(FeedState::Loading));
        let err = quake_feed::parse_feed("not json").unwrap_err();
        publish(&state, Err(err));

        let snapshot = state.lock().unwrap().clone();
        assert!(snapshot.events().is_empty());
        assert!(snapshot.error().unwrap().starts_with("Data acquisition failed"));
    }

    #[test]
    fn test_publish_installs_ready_catalog() {
        let state = Arc::new(Mutex::new(FeedState::Loading));
        let events = quake_feed::parse_feed(
            r#"{"features":[{
                "geometry": {"coordinates": [10.0, 20.0]},
                "properties": {"mag": 4.0, "place": "x", "time": 1700000000000}
            }]}"#,
        )
        .unwrap();
        publish(&state, Ok(EventCatalog::new(events)));

        let snapshot = state.lock().unwrap().clone();
        assert_eq!(snapshot.events().len(), 1);
        assert!(snapshot.fetched_at().is_some());
        assert!(!snapshot.is_loading());
    }
}
