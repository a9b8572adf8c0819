//! Application state shared across routes

use std::sync::Arc;

use crate::config::Config;
use crate::game::{RoomDirectory, Scheduler, SchedulerConfig, SchedulerHandle};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub scheduler: SchedulerHandle,
    pub directory: Arc<RoomDirectory>,
}

impl AppState {
    /// Build the state together with the scheduler the caller must spawn
    pub fn new(config: Config) -> (Self, Scheduler) {
        let config = Arc::new(config);
        let directory = Arc::new(RoomDirectory::new());

        let (scheduler, handle) = Scheduler::new(
            SchedulerConfig {
                tick_rate: config.tick_rate,
                max_room_players: config.max_room_players,
            },
            directory.clone(),
        );

        let state = Self {
            config,
            scheduler: handle,
            directory,
        };
        (state, scheduler)
    }
}
