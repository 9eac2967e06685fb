//! Digital-signage player.
//!
//! Resolves a device key to a display, keeps it fresh by polling, reports
//! liveness with heartbeats and cycles the display's playlist on a
//! [`surface::Surface`].

pub mod api;
pub mod backoff;
pub mod cache;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod model;
pub mod page;
pub mod player;
pub mod render;
pub mod scheduler;
pub mod surface;
pub mod timers;

#[cfg(feature = "kiosk")]
pub mod renderer;
#[cfg(feature = "kiosk")]
pub mod video;
