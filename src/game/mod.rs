//! Game simulation modules

pub mod combat;
pub mod control;
pub mod directory;
pub mod entities;
pub mod layout;
pub mod manager;
pub mod physics;
pub mod room;
pub mod scheduler;
pub mod snapshot;
pub mod timers;

pub use directory::{RoomDirectory, RoomSummary};
pub use manager::RoomManager;
pub use room::{Room, RoomId, RoomPhase};
pub use scheduler::{RoomCommand, Scheduler, SchedulerConfig, SchedulerHandle};
