// Application state module
// Read-only shared state: configuration, asset set, process start time

use std::path::Path;

use super::types::Config;
use crate::handler::assets::AssetStore;
use crate::handler::health::StartTime;

/// Application state shared across all request handlers.
///
/// Everything here is immutable after construction, so concurrent
/// requests need no synchronization.
pub struct AppState {
    pub config: Config,
    pub assets: AssetStore,
    pub started: StartTime,
}

impl AppState {
    /// Build the state: walk the asset root once and capture process start
    pub fn new(config: Config) -> Self {
        let assets = AssetStore::load(
            Path::new(&config.site.root),
            &config.site.index_file,
            &config.site.not_found_file,
        );

        Self {
            config,
            assets,
            started: StartTime::now(),
        }
    }
}
