//! The player loop: fetch, heartbeat, slide advance and painting, all on
//! one cooperative event loop.
//!
//! Timers are owned handles local to [`PlayerLoop::run`]; leaving the loop
//! drops them together with any in-flight request or asset download, so
//! nothing fires after teardown. Surfaces are called synchronously; asset
//! downloads run as one more `select!` branch.

use crate::api::DisplaySource;
use crate::backoff::Backoff;
use crate::error::PlayerError;
use crate::fetcher::FetchState;
use crate::model::Display;
use crate::render::{compose, RenderMode};
use crate::scheduler::{SlideScheduler, VideoEnd, TRANSITION_WINDOW};
use crate::surface::{Surface, SurfaceEvent};
use crate::timers::{Ticker, Timer};
use anyhow::Result;
use futures_util::future::BoxFuture;
use std::future::pending;
use std::mem::discriminant;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Cadences of the loop's timers.
#[derive(Debug, Clone, PartialEq)]
pub struct LoopTimings {
    pub poll_interval: Duration,
    pub heartbeat_interval: Duration,
    pub retry_base: Duration,
    pub retry_cap: Duration,
    pub transition: Duration,
}

impl Default for LoopTimings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(30),
            heartbeat_interval: Duration::from_secs(60),
            retry_base: Duration::from_secs(5),
            retry_cap: Duration::from_secs(30),
            transition: TRANSITION_WINDOW,
        }
    }
}

type FetchFuture = BoxFuture<'static, Result<Display, PlayerError>>;
type HeartbeatFuture = BoxFuture<'static, ()>;
type AssetLoad = BoxFuture<'static, (String, Result<PathBuf>)>;

/// One display's player.
pub struct PlayerLoop<S: Surface> {
    source: Arc<dyn DisplaySource>,
    surface: S,
    api_base: String,
    timings: LoopTimings,
    fetch: FetchState,
    slides: SlideScheduler,
    shown: Option<RenderMode>,
}

impl<S: Surface> PlayerLoop<S> {
    pub fn new(
        source: Arc<dyn DisplaySource>,
        surface: S,
        device_key: impl Into<String>,
        api_base: impl Into<String>,
        timings: LoopTimings,
    ) -> Self {
        let backoff = Backoff::new(timings.retry_base, timings.retry_cap);
        Self {
            source,
            surface,
            api_base: api_base.into(),
            fetch: FetchState::new(device_key, backoff),
            slides: SlideScheduler::new(timings.transition),
            timings,
            shown: None,
        }
    }

    /// Run until `shutdown` flips to `true` (or its sender goes away) or the
    /// surface reports [`SurfaceEvent::Quit`].
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        tracing::info!(
            "Starting player for device key '{}' against {}",
            self.fetch.device_key(),
            self.api_base
        );

        let mut poll = Ticker::start("poll", self.timings.poll_interval, false);
        let mut heartbeat = Ticker::start("heartbeat", self.timings.heartbeat_interval, true);
        let mut frame = match self.surface.frame_interval() {
            Some(period) => Ticker::start("frame", period, true),
            None => Ticker::idle("frame"),
        };
        let mut retry = Timer::new("retry");
        let mut advance = Timer::new("advance");
        let mut transition = Timer::new("transition");

        let mut fetching: Option<FetchFuture> = Some(self.request_display());
        let mut beating: Option<HeartbeatFuture> = None;
        let mut loading: Option<AssetLoad> = None;

        self.present(&mut loading)?;

        'run: loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break 'run;
                    }
                }
                result = in_flight(&mut fetching) => {
                    fetching = None;
                    self.on_fetch_result(result, &mut retry, &mut advance, &mut transition);
                }
                () = in_flight(&mut beating) => {
                    beating = None;
                }
                (item_id, result) = in_flight(&mut loading) => {
                    loading = None;
                    self.surface.asset_ready(&item_id, result);
                }
                () = poll.tick() => {
                    if fetching.is_none() && self.fetch.should_poll(retry.is_armed()) {
                        fetching = Some(self.request_display());
                    }
                }
                () = heartbeat.tick() => {
                    if beating.is_none() {
                        beating = Some(self.send_heartbeat());
                    }
                }
                () = retry.fired() => {
                    if fetching.is_none() {
                        fetching = Some(self.request_display());
                    }
                }
                () = advance.fired() => {
                    if let Some(window) = self.slides.on_timer() {
                        transition.arm(window);
                    }
                }
                () = transition.fired() => {
                    if self.slides.on_transition_complete() {
                        self.arm_dwell(&mut advance);
                    }
                }
                () = frame.tick() => {
                    for event in self.surface.poll_events() {
                        match event {
                            SurfaceEvent::Quit => break 'run,
                            SurfaceEvent::ToggleFullscreen => {
                                let fullscreen = !self.surface.is_fullscreen();
                                self.surface.set_fullscreen(fullscreen);
                            }
                            SurfaceEvent::Retry => {
                                retry.cancel();
                                if fetching.is_none() {
                                    tracing::info!("Manual retry requested");
                                    fetching = Some(self.request_display());
                                }
                            }
                            SurfaceEvent::VideoEnded { index } => {
                                match self.slides.on_video_end(index) {
                                    VideoEnd::Loop => self.surface.restart_video(),
                                    VideoEnd::Advance(window) => {
                                        advance.cancel();
                                        transition.arm(window);
                                    }
                                    VideoEnd::Ignored => {}
                                }
                            }
                        }
                    }
                    self.surface.redraw()?;
                }
            }

            self.present(&mut loading)?;
        }

        poll.stop();
        heartbeat.stop();
        frame.stop();
        retry.cancel();
        advance.cancel();
        transition.cancel();
        drop(fetching);
        drop(beating);
        drop(loading);
        tracing::info!("Player stopped");
        Ok(())
    }

    fn request_display(&self) -> FetchFuture {
        let source = Arc::clone(&self.source);
        let key = self.fetch.device_key().to_string();
        Box::pin(async move { source.fetch_display(&key).await })
    }

    fn send_heartbeat(&self) -> HeartbeatFuture {
        let source = Arc::clone(&self.source);
        let key = self.fetch.device_key().to_string();
        Box::pin(async move {
            if let Err(e) = source.heartbeat(&key).await {
                tracing::debug!("Heartbeat failed: {:#}", e);
            }
        })
    }

    fn on_fetch_result(
        &mut self,
        result: Result<Display, PlayerError>,
        retry: &mut Timer,
        advance: &mut Timer,
        transition: &mut Timer,
    ) {
        match self.fetch.apply(result) {
            Some(delay) => retry.arm(delay),
            None => {
                if self.fetch.error().is_none() {
                    retry.cancel();
                }
            }
        }

        let Some(display) = self.fetch.snapshot().cloned() else {
            return;
        };
        if self.slides.set_items(display.items()) {
            tracing::info!(
                "Playlist changed: {} items, resuming at {}",
                self.slides.len(),
                self.slides.index()
            );
            transition.cancel();
            advance.cancel();
            self.arm_dwell(advance);
            self.surface.playlist_changed(self.slides.items());
        }
    }

    fn arm_dwell(&self, advance: &mut Timer) {
        match self.slides.dwell() {
            Some(dwell) => advance.arm(dwell),
            None => {
                advance.cancel();
            }
        }
    }

    /// Paint the current mode if it changed, and start the asset download
    /// when a new item comes up. A pending download for an item that left
    /// the screen is dropped.
    fn present(&mut self, loading: &mut Option<AssetLoad>) -> Result<()> {
        let mode = compose(&self.fetch, &self.slides, &self.api_base);
        if self.shown.as_ref() == Some(&mode) {
            return Ok(());
        }
        if let Some(previous) = &self.shown {
            if discriminant(previous) != discriminant(&mode) {
                tracing::info!("Render mode {} -> {}", mode_name(previous), mode_name(&mode));
            }
        }
        self.surface.present(&mode)?;

        match &mode {
            RenderMode::Playing(frame) => {
                let same_item = matches!(
                    &self.shown,
                    Some(RenderMode::Playing(shown)) if shown.item_id == frame.item_id
                );
                if !same_item {
                    *loading = self.surface.fetch_asset(frame).map(|download| {
                        let item_id = frame.item_id.clone();
                        let load: AssetLoad = Box::pin(async move { (item_id, download.await) });
                        load
                    });
                }
            }
            _ => *loading = None,
        }

        self.shown = Some(mode);
        Ok(())
    }
}

async fn in_flight<T>(slot: &mut Option<BoxFuture<'static, T>>) -> T {
    match slot.as_mut() {
        Some(fut) => fut.await,
        None => pending().await,
    }
}

fn mode_name(mode: &RenderMode) -> &'static str {
    match mode {
        RenderMode::Loading => "loading",
        RenderMode::Error(_) => "error",
        RenderMode::Empty { .. } => "empty",
        RenderMode::Playing(_) => "playing",
    }
}
