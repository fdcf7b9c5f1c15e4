//! Game-flow control core.
//!
//! A single-threaded orchestrator that decides which application phase is
//! active (boot, title, gameplay, paused, result) and sequences the scene
//! loads, overlays, signal subscriptions and saves each phase needs.  The
//! [`plugin::FlowPlugin`] hosts it inside a Bevy app.

pub mod config;
pub mod constants;
pub mod director;
pub mod error;
pub mod events;
pub mod mode;
pub mod persistence;
pub mod phase;
pub mod plugin;
pub mod scene;
pub mod scheduler;
pub mod services;
pub mod ui_stack;
