//! Slide scheduler: which playlist item is on screen and when to move on.
//!
//! Pure state machine. The player loop owns the actual timers and feeds
//! their expirations back in through [`SlideScheduler::on_timer`] and
//! [`SlideScheduler::on_transition_complete`].

use crate::model::PlaylistItem;
use std::time::Duration;

/// Default length of the cross-dissolve between two items.
pub const TRANSITION_WINDOW: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlideState {
    Showing(usize),
    Transitioning { from: usize, to: usize },
}

/// What a natural end-of-video means for the slideshow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoEnd {
    /// Stale or mistimed event; nothing to do.
    Ignored,
    /// Sole item: the surface restarts the video in place.
    Loop,
    /// Transition started; complete it after the given window.
    Advance(Duration),
}

#[derive(Debug)]
pub struct SlideScheduler {
    items: Vec<PlaylistItem>,
    state: SlideState,
    transition: Duration,
}

impl SlideScheduler {
    pub fn new(transition: Duration) -> Self {
        Self {
            items: Vec::new(),
            state: SlideState::Showing(0),
            transition,
        }
    }

    /// Swap in a freshly fetched item list.
    ///
    /// Returns `true` when the list actually changed, in which case the
    /// caller must cancel the running dwell timer and re-arm from
    /// [`dwell`](Self::dwell). An in-flight transition is abandoned and the
    /// current index wraps into the new list.
    pub fn set_items(&mut self, items: &[PlaylistItem]) -> bool {
        if self.items.as_slice() == items {
            return false;
        }
        let index = self.index();
        self.items = items.to_vec();
        let index = if self.items.is_empty() {
            0
        } else {
            index % self.items.len()
        };
        self.state = SlideState::Showing(index);
        true
    }

    /// Index of the item currently on screen (the outgoing one during a transition).
    pub fn index(&self) -> usize {
        match self.state {
            SlideState::Showing(i) => i,
            SlideState::Transitioning { from, .. } => from,
        }
    }

    pub fn state(&self) -> SlideState {
        self.state
    }

    pub fn items(&self) -> &[PlaylistItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn current(&self) -> Option<&PlaylistItem> {
        self.items.get(self.index())
    }

    pub fn is_transitioning(&self) -> bool {
        matches!(self.state, SlideState::Transitioning { .. })
    }

    /// How long the current item stays up.
    ///
    /// `None` while transitioning, when empty, and for a sole video, which
    /// loops instead of advancing.
    pub fn dwell(&self) -> Option<Duration> {
        let SlideState::Showing(i) = self.state else {
            return None;
        };
        let item = self.items.get(i)?;
        if item.is_video() && self.items.len() == 1 {
            return None;
        }
        item.dwell()
    }

    /// Dwell timer expired: start the transition to the next item.
    ///
    /// Returns the transition window to wait before completing it.
    pub fn on_timer(&mut self) -> Option<Duration> {
        let SlideState::Showing(from) = self.state else {
            return None;
        };
        if self.items.is_empty() {
            return None;
        }
        let to = (from + 1) % self.items.len();
        self.state = SlideState::Transitioning { from, to };
        tracing::trace!("Transition {} -> {}", from, to);
        Some(self.transition)
    }

    /// Transition window elapsed: show the incoming item.
    pub fn on_transition_complete(&mut self) -> bool {
        match self.state {
            SlideState::Transitioning { to, .. } => {
                self.state = SlideState::Showing(to);
                true
            }
            SlideState::Showing(_) => false,
        }
    }

    /// The video at `index` played to its end.
    pub fn on_video_end(&mut self, index: usize) -> VideoEnd {
        match self.state {
            SlideState::Showing(i) if i == index => {}
            _ => return VideoEnd::Ignored,
        }
        match self.items.get(index) {
            Some(item) if item.is_video() => {}
            _ => return VideoEnd::Ignored,
        }
        if self.items.len() == 1 {
            return VideoEnd::Loop;
        }
        match self.on_timer() {
            Some(window) => VideoEnd::Advance(window),
            None => VideoEnd::Ignored,
        }
    }

    /// Fraction of the playlist reached, `(index + 1) / n`.
    pub fn progress(&self) -> f32 {
        if self.items.is_empty() {
            return 0.0;
        }
        (self.index() + 1) as f32 / self.items.len() as f32
    }
}
