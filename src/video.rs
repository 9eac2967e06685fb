//! GStreamer-based video playback for the kiosk surface.
//!
//! Decodes to RGBA frames pulled by the renderer. A sole playlist video
//! loops seamlessly by seeking to zero on end-of-stream; otherwise the end
//! is reported so the slideshow can advance.

use anyhow::{Context, Result};
use gstreamer as gst;
use gstreamer::prelude::*;
use gstreamer_app as gst_app;
use gstreamer_video as gst_video;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Video frame extracted from the pipeline.
#[derive(Clone)]
pub struct VideoFrame {
    pub pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// One playing video.
pub struct VideoPlayer {
    pipeline: gst::Pipeline,
    current_frame: Arc<Mutex<Option<VideoFrame>>>,
    looping: bool,
}

impl VideoPlayer {
    /// Initialize GStreamer (call once at startup).
    pub fn init() -> Result<()> {
        gst::init().context("Failed to initialize GStreamer")?;
        tracing::info!("GStreamer initialized: {}", gst::version_string());
        Ok(())
    }

    /// Build a muted pipeline for `path`. Audio pads are never linked.
    pub fn new(path: &Path, looping: bool) -> Result<Self> {
        let path = std::fs::canonicalize(path).context("Video file missing")?;
        let uri = format!("file://{}", path.display());
        tracing::debug!("Creating video player for: {} (loop: {})", uri, looping);

        let pipeline = gst::Pipeline::new();

        let src = gst::ElementFactory::make("uridecodebin")
            .name("source")
            .property("uri", &uri)
            .build()
            .context("Failed to create uridecodebin")?;
        let convert = gst::ElementFactory::make("videoconvert")
            .name("convert")
            .build()
            .context("Failed to create videoconvert")?;
        let scale = gst::ElementFactory::make("videoscale")
            .name("scale")
            .build()
            .context("Failed to create videoscale")?;
        let appsink = gst_app::AppSink::builder()
            .name("sink")
            .caps(
                &gst_video::VideoCapsBuilder::new()
                    .format(gst_video::VideoFormat::Rgba)
                    .build(),
            )
            .build();

        pipeline
            .add_many([&src, &convert, &scale, appsink.upcast_ref()])
            .context("Failed to add elements to pipeline")?;
        gst::Element::link_many([&convert, &scale, appsink.upcast_ref()])
            .context("Failed to link elements")?;

        let convert_weak = convert.downgrade();
        src.connect_pad_added(move |_src, src_pad| {
            let Some(convert) = convert_weak.upgrade() else {
                return;
            };
            let Some(sink_pad) = convert.static_pad("sink") else {
                return;
            };
            if sink_pad.is_linked() {
                return;
            }
            let caps = src_pad
                .current_caps()
                .unwrap_or_else(|| src_pad.query_caps(None));
            let is_video = caps
                .structure(0)
                .map(|s| s.name().starts_with("video/"))
                .unwrap_or(false);
            if is_video {
                if let Err(e) = src_pad.link(&sink_pad) {
                    tracing::error!("Failed to link pads: {:?}", e);
                }
            }
        });

        let current_frame = Arc::new(Mutex::new(None::<VideoFrame>));
        let frame_slot = current_frame.clone();
        appsink.set_callbacks(
            gst_app::AppSinkCallbacks::builder()
                .new_sample(move |appsink| {
                    let sample = appsink.pull_sample().map_err(|_| gst::FlowError::Eos)?;
                    let buffer = sample.buffer().ok_or(gst::FlowError::Error)?;
                    let caps = sample.caps().ok_or(gst::FlowError::Error)?;
                    let info =
                        gst_video::VideoInfo::from_caps(caps).map_err(|_| gst::FlowError::Error)?;
                    let map = buffer.map_readable().map_err(|_| gst::FlowError::Error)?;

                    if let Ok(mut guard) = frame_slot.lock() {
                        *guard = Some(VideoFrame {
                            pixels: map.as_slice().to_vec(),
                            width: info.width(),
                            height: info.height(),
                        });
                    }
                    Ok(gst::FlowSuccess::Ok)
                })
                .build(),
        );

        Ok(Self {
            pipeline,
            current_frame,
            looping,
        })
    }

    pub fn play(&self) -> Result<()> {
        self.pipeline
            .set_state(gst::State::Playing)
            .context("Failed to set pipeline to playing")?;
        Ok(())
    }

    pub fn stop(&self) -> Result<()> {
        self.pipeline
            .set_state(gst::State::Null)
            .context("Failed to set pipeline to null")?;
        Ok(())
    }

    /// Seek back to the first frame and keep playing.
    pub fn restart(&self) -> Result<()> {
        self.pipeline
            .seek_simple(
                gst::SeekFlags::FLUSH | gst::SeekFlags::KEY_UNIT,
                gst::ClockTime::ZERO,
            )
            .context("Failed to seek to start")?;
        self.play()
    }

    pub fn current_frame(&self) -> Option<VideoFrame> {
        self.current_frame.lock().ok()?.clone()
    }

    /// Drain the pipeline bus. Returns `true` when a non-looping video
    /// reached its end or the pipeline failed.
    ///
    /// Polled from the render loop; there is no GLib main loop to run watches.
    pub fn take_ended(&self) -> bool {
        let Some(bus) = self.pipeline.bus() else {
            return false;
        };
        let mut ended = false;
        while let Some(msg) = bus.pop() {
            match msg.view() {
                gst::MessageView::Eos(_) => {
                    if self.looping {
                        let _ = self.pipeline.seek_simple(
                            gst::SeekFlags::FLUSH | gst::SeekFlags::KEY_UNIT,
                            gst::ClockTime::ZERO,
                        );
                    } else {
                        ended = true;
                    }
                }
                gst::MessageView::Error(err) => {
                    tracing::error!("GStreamer error: {} ({:?})", err.error(), err.debug());
                    ended = true;
                }
                _ => {}
            }
        }
        ended
    }
}

impl Drop for VideoPlayer {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

/// Holds the single video currently on screen.
#[derive(Default)]
pub struct VideoManager {
    current: Option<VideoPlayer>,
}

impl VideoManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the current video with `path` and start it.
    pub fn play_video(&mut self, path: &Path, looping: bool) -> Result<()> {
        self.stop();
        let player = VideoPlayer::new(path, looping)?;
        player.play()?;
        self.current = Some(player);
        Ok(())
    }

    pub fn stop(&mut self) {
        if let Some(player) = self.current.take() {
            let _ = player.stop();
        }
    }

    pub fn restart(&mut self) {
        if let Some(player) = &self.current {
            if let Err(e) = player.restart() {
                tracing::warn!("Failed to restart video: {}", e);
            }
        }
    }

    pub fn current_frame(&self) -> Option<VideoFrame> {
        self.current.as_ref()?.current_frame()
    }

    pub fn take_ended(&self) -> bool {
        self.current
            .as_ref()
            .map(|p| p.take_ended())
            .unwrap_or(false)
    }
}
