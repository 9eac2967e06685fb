//! What the screen should show, derived from fetch and slide state.
//!
//! [`compose`] is a pure function; surfaces only paint what it returns.

use crate::error::PlayerError;
use crate::fetcher::FetchState;
use crate::model::{resolve_url, MediaKind, Transition};
use crate::scheduler::SlideScheduler;

/// Top-level render mode.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderMode {
    /// First fetch still in flight.
    Loading,
    /// Nothing to show but an error.
    Error(ErrorView),
    /// Display exists but has no playlist, or the playlist is empty.
    Empty { display_name: String },
    /// Normal slideshow.
    Playing(Frame),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Unreachable,
    Server,
    Malformed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ErrorView {
    pub kind: ErrorKind,
    pub title: &'static str,
    pub message: String,
    pub status: Option<u16>,
    /// Offer the manual retry affordance.
    pub can_retry: bool,
}

impl From<&PlayerError> for ErrorView {
    fn from(err: &PlayerError) -> Self {
        let (kind, title) = match err {
            PlayerError::NotFound { .. } => (ErrorKind::NotFound, "Display not found"),
            PlayerError::Unreachable(_) => (ErrorKind::Unreachable, "Connection failed"),
            PlayerError::Server { .. } => (ErrorKind::Server, "Server error"),
            PlayerError::Malformed(_) => (ErrorKind::Malformed, "Invalid response"),
        };
        Self {
            kind,
            title,
            message: err.to_string(),
            status: err.status(),
            can_retry: kind == ErrorKind::Unreachable,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fit {
    /// Whole media visible, letterboxed as needed.
    Contain,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Visual {
    Image { url: String, fit: Fit },
    Video {
        url: String,
        muted: bool,
        autoplay: bool,
        looping: bool,
    },
    /// Embedded page in an isolated frame.
    Page { url: String },
}

/// One painted slide.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub item_id: String,
    pub content_id: String,
    pub visual: Visual,
    pub index: usize,
    pub count: usize,
    /// Width fraction of the progress bar.
    pub progress: f32,
    /// Target opacity; 0.0 during a fade-out.
    pub opacity: f32,
}

/// Build the render mode for the current state.
pub fn compose(fetch: &FetchState, slides: &SlideScheduler, api_base: &str) -> RenderMode {
    let Some(display) = fetch.snapshot() else {
        return match fetch.error() {
            Some(err) => RenderMode::Error(err.into()),
            None => RenderMode::Loading,
        };
    };

    let Some(item) = slides.current().filter(|_| !display.items().is_empty()) else {
        return RenderMode::Empty {
            display_name: display.name.clone(),
        };
    };

    let url = resolve_url(api_base, &item.content.url);
    let count = slides.len();
    let visual = match item.content.kind {
        MediaKind::Image => Visual::Image {
            url,
            fit: Fit::Contain,
        },
        MediaKind::Video => Visual::Video {
            url,
            muted: true,
            autoplay: true,
            looping: count == 1,
        },
        MediaKind::Embed => Visual::Page { url },
    };

    let opacity = if slides.is_transitioning() && item.transition == Transition::Fade {
        0.0
    } else {
        1.0
    };

    RenderMode::Playing(Frame {
        item_id: item.id.clone(),
        content_id: item.content.id.clone(),
        visual,
        index: slides.index(),
        count,
        progress: slides.progress(),
        opacity,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

/// Aspect-fit `media` inside `frame`, centred, without cropping.
pub fn fit_contain(media_w: u32, media_h: u32, frame_w: u32, frame_h: u32) -> Rect {
    if media_w == 0 || media_h == 0 || frame_w == 0 || frame_h == 0 {
        return Rect {
            x: 0,
            y: 0,
            width: frame_w,
            height: frame_h,
        };
    }

    let frame_ratio = frame_w as f64 / frame_h as f64;
    let media_ratio = media_w as f64 / media_h as f64;

    let (width, height) = if media_ratio > frame_ratio {
        // Wider than the frame, fit to width
        let height = (frame_w as f64 / media_ratio).round() as u32;
        (frame_w, height.min(frame_h))
    } else {
        // Taller than the frame, fit to height
        let width = (frame_h as f64 * media_ratio).round() as u32;
        (width.min(frame_w), frame_h)
    };

    Rect {
        x: ((frame_w - width) / 2) as i32,
        y: ((frame_h - height) / 2) as i32,
        width,
        height,
    }
}

/// Width in pixels of the progress bar for a frame `frame_w` wide.
pub fn progress_width(progress: f32, frame_w: u32) -> u32 {
    (progress.clamp(0.0, 1.0) * frame_w as f32).round() as u32
}
