//! Render surfaces: where a [`RenderMode`] ends up.

use crate::model::PlaylistItem;
use crate::render::{Frame, RenderMode};
use anyhow::Result;
use futures_util::future::BoxFuture;
use std::path::PathBuf;
use std::time::Duration;

/// Download of the local file behind a frame.
pub type AssetFuture = BoxFuture<'static, Result<PathBuf>>;

/// Input and playback events reported by a surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceEvent {
    /// Operator asked to exit.
    Quit,
    /// Click anywhere: enter or leave full-screen.
    ToggleFullscreen,
    /// Manual retry from the connection-failed screen.
    Retry,
    /// The video of the item at `index` reached its natural end.
    VideoEnded { index: usize },
}

/// Something that paints render modes.
///
/// Surfaces live on the player loop's thread and need not be `Send`. Every
/// call must return promptly; anything that waits on the network goes
/// through [`fetch_asset`](Self::fetch_asset), which the loop drives
/// alongside its timers.
pub trait Surface {
    /// Paint a new render mode. Called only when the mode changes.
    fn present(&mut self, mode: &RenderMode) -> Result<()>;

    /// Start fetching the asset a newly shown frame needs. `None` when the
    /// frame needs no local file.
    fn fetch_asset(&mut self, _frame: &Frame) -> Option<AssetFuture> {
        None
    }

    /// An asset started by [`fetch_asset`](Self::fetch_asset) for
    /// `item_id` finished. The item may no longer be on screen.
    fn asset_ready(&mut self, _item_id: &str, _result: Result<PathBuf>) {}

    /// Drain pending events.
    fn poll_events(&mut self) -> Vec<SurfaceEvent> {
        Vec::new()
    }

    /// Repaint between mode changes (animations, video frames).
    fn redraw(&mut self) -> Result<()> {
        Ok(())
    }

    /// How often the loop should call [`poll_events`](Self::poll_events)
    /// and [`redraw`](Self::redraw). `None` for surfaces without input.
    fn frame_interval(&self) -> Option<Duration> {
        None
    }

    fn is_fullscreen(&self) -> bool;

    fn set_fullscreen(&mut self, fullscreen: bool);

    /// Restart the current video in place.
    fn restart_video(&mut self) {}

    /// A new item list was scheduled.
    fn playlist_changed(&mut self, _items: &[PlaylistItem]) {}
}

/// Headless surface that reports every mode change through `tracing`.
#[derive(Debug, Default)]
pub struct LogSurface {
    fullscreen: bool,
}

impl LogSurface {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Surface for LogSurface {
    fn present(&mut self, mode: &RenderMode) -> Result<()> {
        match mode {
            RenderMode::Loading => tracing::info!("Loading display..."),
            RenderMode::Error(view) => {
                tracing::warn!("{}: {}", view.title, view.message);
            }
            RenderMode::Empty { display_name } => {
                tracing::info!("Display '{}' has no content assigned", display_name);
            }
            RenderMode::Playing(frame) => {
                tracing::info!(
                    "Showing {}/{} {:?} (opacity {:.1})",
                    frame.index + 1,
                    frame.count,
                    frame.visual,
                    frame.opacity
                );
            }
        }
        Ok(())
    }

    fn is_fullscreen(&self) -> bool {
        self.fullscreen
    }

    fn set_fullscreen(&mut self, fullscreen: bool) {
        self.fullscreen = fullscreen;
    }
}
