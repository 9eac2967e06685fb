//! SDL2 kiosk surface.
//!
//! Paints render modes full-screen: aspect-fit images and video frames with
//! a fade, a thin progress bar along the bottom edge, and flat colour
//! screens for loading, error and idle. Embedded pages are handed to the
//! external [`PageViewer`].

use crate::cache::{asset_client, AssetCache};
use crate::config::PlayerConfig;
use crate::model::PlaylistItem;
use crate::page::PageViewer;
use crate::render::{fit_contain, progress_width, ErrorKind, Frame, RenderMode, Visual};
use crate::surface::{AssetFuture, Surface, SurfaceEvent};
use crate::video::{VideoManager, VideoPlayer};
use anyhow::{anyhow, Context, Result};
use sdl2::event::Event;
use sdl2::keyboard::Keycode;
use sdl2::pixels::{Color, PixelFormatEnum};
use sdl2::rect::Rect as SdlRect;
use sdl2::render::{BlendMode, Canvas, Texture, TextureCreator};
use sdl2::video::{FullscreenType, Window, WindowContext};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

const FRAME_INTERVAL: Duration = Duration::from_millis(16);
const PROGRESS_HEIGHT: u32 = 4;
const PROGRESS_COLOR: Color = Color::RGBA(255, 255, 255, 160);

/// Image slide held on the GPU.
struct ImageSlide {
    texture: Texture,
    width: u32,
    height: u32,
}

impl ImageSlide {
    fn release(self) {
        // SAFETY: the texture creator outlives every slide; slides are
        // released before the surface is dropped.
        unsafe { self.texture.destroy() };
    }
}

/// What is currently loaded for painting.
enum Content {
    None,
    /// Asset download in flight.
    Pending { video: bool, looping: bool },
    Image(ImageSlide),
    Video,
    Page,
}

pub struct SdlSurface {
    sdl: sdl2::Sdl,
    canvas: Canvas<Window>,
    texture_creator: TextureCreator<WindowContext>,
    event_pump: sdl2::EventPump,
    screen_width: u32,
    screen_height: u32,
    fullscreen: bool,
    fade: Duration,
    cache: AssetCache,
    client: reqwest::Client,
    videos: VideoManager,
    pages: PageViewer,
    background: Color,
    content: Content,
    item_id: Option<String>,
    index: usize,
    progress: f32,
    opacity: f32,
    target_opacity: f32,
    last_redraw: Instant,
}

impl SdlSurface {
    /// Initialize SDL2 and GStreamer and open the player window.
    pub fn new(config: &PlayerConfig) -> Result<Self> {
        VideoPlayer::init()?;

        let sdl = sdl2::init().map_err(|e| anyhow!("SDL init failed: {}", e))?;
        let video_subsystem = sdl
            .video()
            .map_err(|e| anyhow!("SDL video init failed: {}", e))?;
        let display_mode = video_subsystem
            .desktop_display_mode(0)
            .map_err(|e| anyhow!("Failed to get display mode: {}", e))?;

        let screen_width = display_mode.w as u32;
        let screen_height = display_mode.h as u32;
        tracing::info!("Creating player window: {}x{}", screen_width, screen_height);

        let mut builder = video_subsystem.window("Signage Player", screen_width, screen_height);
        if config.fullscreen {
            builder.fullscreen_desktop();
        }
        let window = builder.build().context("Failed to create window")?;

        let mut canvas = window
            .into_canvas()
            .accelerated()
            .present_vsync()
            .build()
            .context("Failed to create canvas")?;
        canvas.set_blend_mode(BlendMode::Blend);
        sdl.mouse().show_cursor(false);

        canvas.set_draw_color(Color::RGB(0, 0, 0));
        canvas.clear();
        canvas.present();

        let event_pump = sdl
            .event_pump()
            .map_err(|e| anyhow!("Failed to get event pump: {}", e))?;
        let texture_creator = canvas.texture_creator();
        let cache = AssetCache::new(config.cache_dir.clone(), config.cache_max_bytes())?;
        let client = asset_client(config.request_timeout())?;

        Ok(Self {
            sdl,
            canvas,
            texture_creator,
            event_pump,
            screen_width,
            screen_height,
            fullscreen: config.fullscreen,
            fade: Duration::from_millis(config.transition_ms.max(1)),
            cache,
            client,
            videos: VideoManager::new(),
            pages: PageViewer::new(config.page_command.clone()),
            background: Color::RGB(0, 0, 0),
            content: Content::None,
            item_id: None,
            index: 0,
            progress: 0.0,
            opacity: 1.0,
            target_opacity: 1.0,
            last_redraw: Instant::now(),
        })
    }

    fn load_image(&self, path: &Path) -> Result<ImageSlide> {
        let rgba = image::open(path).context("Failed to open image")?.to_rgba8();
        let (width, height) = rgba.dimensions();
        let texture = self.texture_from_rgba(rgba.as_raw(), width, height)?;
        Ok(ImageSlide {
            texture,
            width,
            height,
        })
    }

    fn texture_from_rgba(&self, pixels: &[u8], width: u32, height: u32) -> Result<Texture> {
        let mut texture = self
            .texture_creator
            .create_texture_streaming(PixelFormatEnum::ABGR8888, width, height)
            .context("Failed to create texture")?;
        let row_bytes = width as usize * 4;
        texture
            .with_lock(None, |buffer: &mut [u8], pitch: usize| {
                for y in 0..height as usize {
                    let src = y * row_bytes;
                    let dst = y * pitch;
                    buffer[dst..dst + row_bytes].copy_from_slice(&pixels[src..src + row_bytes]);
                }
            })
            .map_err(|e| anyhow!("Failed to update texture: {}", e))?;
        texture.set_blend_mode(BlendMode::Blend);
        Ok(texture)
    }

    fn clear_content(&mut self) {
        match std::mem::replace(&mut self.content, Content::None) {
            Content::Image(slide) => slide.release(),
            Content::Video => self.videos.stop(),
            Content::Page => self.pages.hide(),
            Content::Pending { .. } | Content::None => {}
        }
        self.item_id = None;
    }

    /// Switch to a new slide. Images and videos stay pending until their
    /// asset arrives through [`Surface::asset_ready`].
    fn begin_frame(&mut self, frame: &Frame) -> Result<()> {
        self.clear_content();
        self.item_id = Some(frame.item_id.clone());

        self.content = match &frame.visual {
            Visual::Image { .. } => Content::Pending {
                video: false,
                looping: false,
            },
            Visual::Video { looping, .. } => Content::Pending {
                video: true,
                looping: *looping,
            },
            Visual::Page { url } => {
                self.pages.show(url)?;
                Content::Page
            }
        };
        Ok(())
    }

    /// Replace the pending placeholder with the downloaded asset.
    fn load_asset(&mut self, path: &Path) -> Result<()> {
        match self.content {
            Content::Pending { video: true, looping } => {
                self.videos.play_video(path, looping)?;
                self.content = Content::Video;
            }
            Content::Pending { video: false, .. } => {
                self.content = Content::Image(self.load_image(path)?);
            }
            _ => {}
        }
        Ok(())
    }

    fn paint(&mut self) -> Result<()> {
        self.canvas.set_draw_color(self.background);
        self.canvas.clear();

        let alpha = (self.opacity.clamp(0.0, 1.0) * 255.0) as u8;
        if let Content::Image(slide) = &mut self.content {
            let rect = fit_contain(slide.width, slide.height, self.screen_width, self.screen_height);
            slide.texture.set_alpha_mod(alpha);
            self.canvas
                .copy(&slide.texture, None, to_sdl(rect))
                .map_err(|e| anyhow!("Failed to render image: {}", e))?;
        }
        if matches!(self.content, Content::Video) {
            if let Some(frame) = self.videos.current_frame() {
                let mut texture = self.texture_from_rgba(&frame.pixels, frame.width, frame.height)?;
                texture.set_alpha_mod(alpha);
                let rect = fit_contain(frame.width, frame.height, self.screen_width, self.screen_height);
                let result = self.canvas.copy(&texture, None, to_sdl(rect));
                // SAFETY: the texture is local to this frame and unused afterwards.
                unsafe { texture.destroy() };
                result.map_err(|e| anyhow!("Failed to render video frame: {}", e))?;
            }
        }

        if self.item_id.is_some() {
            let width = progress_width(self.progress, self.screen_width);
            if width > 0 {
                self.canvas.set_draw_color(PROGRESS_COLOR);
                self.canvas
                    .fill_rect(SdlRect::new(
                        0,
                        (self.screen_height - PROGRESS_HEIGHT) as i32,
                        width,
                        PROGRESS_HEIGHT,
                    ))
                    .map_err(|e| anyhow!("Failed to render progress: {}", e))?;
            }
        }

        self.canvas.present();
        Ok(())
    }
}

fn to_sdl(rect: crate::render::Rect) -> SdlRect {
    SdlRect::new(rect.x, rect.y, rect.width, rect.height)
}

fn error_color(kind: ErrorKind) -> Color {
    match kind {
        ErrorKind::NotFound => Color::RGB(40, 40, 90),
        ErrorKind::Unreachable => Color::RGB(110, 70, 0),
        ErrorKind::Server | ErrorKind::Malformed => Color::RGB(110, 0, 0),
    }
}

impl Surface for SdlSurface {
    fn present(&mut self, mode: &RenderMode) -> Result<()> {
        match mode {
            RenderMode::Playing(frame) => {
                self.background = Color::RGB(0, 0, 0);
                if self.item_id.as_deref() != Some(frame.item_id.as_str()) {
                    if let Err(e) = self.begin_frame(frame) {
                        tracing::warn!("Failed to show {}: {:#}", frame.item_id, e);
                    }
                    // Fade the new slide in from black.
                    self.opacity = 0.0;
                }
                self.index = frame.index;
                self.progress = frame.progress;
                self.target_opacity = frame.opacity;
            }
            RenderMode::Loading => {
                self.clear_content();
                self.background = Color::RGB(20, 20, 20);
            }
            RenderMode::Error(view) => {
                self.clear_content();
                self.background = error_color(view.kind);
                tracing::warn!("{}: {}", view.title, view.message);
                if view.can_retry {
                    tracing::info!("Press R to retry now");
                }
            }
            RenderMode::Empty { display_name } => {
                self.clear_content();
                self.background = Color::RGB(15, 23, 42);
                tracing::info!("Display '{}' is idle", display_name);
            }
        }
        self.paint()
    }

    fn fetch_asset(&mut self, frame: &Frame) -> Option<AssetFuture> {
        let url = match &frame.visual {
            Visual::Image { url, .. } | Visual::Video { url, .. } => url.clone(),
            Visual::Page { .. } => return None,
        };
        let cache = self.cache.clone();
        let client = self.client.clone();
        let content_id = frame.content_id.clone();
        Some(Box::pin(async move {
            cache.fetch(&client, &content_id, &url).await
        }))
    }

    fn asset_ready(&mut self, item_id: &str, result: Result<PathBuf>) {
        if self.item_id.as_deref() != Some(item_id) {
            return;
        }
        let loaded = result.and_then(|path| self.load_asset(&path));
        if let Err(e) = loaded {
            tracing::warn!("Failed to load {}: {:#}", item_id, e);
        }
        // Fade in from black once the asset is on screen.
        self.opacity = 0.0;
    }

    fn poll_events(&mut self) -> Vec<SurfaceEvent> {
        let mut events: Vec<SurfaceEvent> = self
            .event_pump
            .poll_iter()
            .filter_map(|event| match event {
                Event::Quit { .. }
                | Event::KeyDown {
                    keycode: Some(Keycode::Escape | Keycode::Q),
                    ..
                } => Some(SurfaceEvent::Quit),
                Event::KeyDown {
                    keycode: Some(Keycode::R),
                    ..
                } => Some(SurfaceEvent::Retry),
                Event::MouseButtonDown { .. } => Some(SurfaceEvent::ToggleFullscreen),
                _ => None,
            })
            .collect();

        if self.videos.take_ended() {
            events.push(SurfaceEvent::VideoEnded { index: self.index });
        }
        events
    }

    fn redraw(&mut self) -> Result<()> {
        let elapsed = self.last_redraw.elapsed();
        self.last_redraw = Instant::now();

        let step = elapsed.as_secs_f32() / self.fade.as_secs_f32();
        if self.opacity < self.target_opacity {
            self.opacity = (self.opacity + step).min(self.target_opacity);
        } else if self.opacity > self.target_opacity {
            self.opacity = (self.opacity - step).max(self.target_opacity);
        }
        self.paint()
    }

    fn frame_interval(&self) -> Option<Duration> {
        Some(FRAME_INTERVAL)
    }

    fn is_fullscreen(&self) -> bool {
        self.fullscreen
    }

    fn set_fullscreen(&mut self, fullscreen: bool) {
        let mode = if fullscreen {
            FullscreenType::Desktop
        } else {
            FullscreenType::Off
        };
        match self.canvas.window_mut().set_fullscreen(mode) {
            Ok(()) => {
                self.fullscreen = fullscreen;
                self.sdl.mouse().show_cursor(!fullscreen);
            }
            Err(e) => tracing::warn!("Failed to toggle full-screen: {}", e),
        }
    }

    fn restart_video(&mut self) {
        self.videos.restart();
    }

    fn playlist_changed(&mut self, items: &[PlaylistItem]) {
        self.cache
            .retain_content(items.iter().map(|item| item.content.id.as_str()));
    }
}

impl Drop for SdlSurface {
    fn drop(&mut self) {
        self.clear_content();
    }
}
