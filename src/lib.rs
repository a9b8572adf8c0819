//! Naval Battle Server - authoritative room-based game server
//!
//! Clients join named rooms over WebSocket, ready up and steer their fleets;
//! the server simulates every room at a fixed rate and streams full snapshots
//! back. HTTP exposes health and a room directory.

pub mod app;
pub mod config;
pub mod game;
pub mod http;
pub mod util;
pub mod ws;
