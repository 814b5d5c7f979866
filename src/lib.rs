//! Windowed buffering of remote Spotify collections into a local playback queue

pub mod auth;
pub mod config;
pub mod controller;
pub mod logging;
pub mod model;
pub mod queue;
pub mod session;
