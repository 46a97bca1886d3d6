use anyhow::{anyhow, Context, Result};
use pixels::{Pixels, SurfaceTexture};
use rand::rngs::ThreadRng;
use std::sync::Arc;
use winit::{
    application::ApplicationHandler,
    dpi::{LogicalSize, PhysicalSize},
    event::WindowEvent,
    event_loop::{ActiveEventLoop, EventLoop},
    keyboard::{Key, NamedKey},
    window::{Fullscreen, Window, WindowId},
};
use wordface_experiment::{Control, SessionStateMachine};
use wordface_render::{load_font, SkiaRenderer, StimulusPixmaps};
use wordface_timing::{HighPrecisionTimer, Timer};

pub type Experiment = SessionStateMachine<HighPrecisionTimer, ThreadRng>;

pub struct App {
    window: Option<Arc<Window>>,
    pixels: Option<Pixels<'static>>,
    experiment: Experiment,
    renderer: Option<SkiaRenderer>,
    render_timer: HighPrecisionTimer,
    windowed: bool,
    refresh_rate: Option<f64>,
    error: Option<anyhow::Error>,

    should_exit: bool,
}

impl App {
    pub fn new(experiment: Experiment, windowed: bool) -> Self {
        Self {
            window: None,
            pixels: None,
            experiment,
            renderer: None,
            render_timer: HighPrecisionTimer::new(),
            windowed,
            refresh_rate: None,
            error: None,
            should_exit: false,
        }
    }

    pub fn run(mut self) -> Result<()> {
        let event_loop = EventLoop::new()?;
        log::info!(
            "platform {} / {}, waiting for the window",
            std::env::consts::OS,
            std::env::consts::ARCH
        );

        event_loop.run_app(&mut self)?;
        if let Some(err) = self.error.take() {
            return Err(err);
        }

        let stats = self.experiment.timer.frame_stats();
        log::info!(
            "{} trials completed; {} frames at {:.2} Hz, jitter {:.3} ms",
            self.experiment.completed().len(),
            stats.samples,
            stats.effective_fps,
            stats.jitter_ns / 1e6
        );
        if let Some(renderer) = &self.renderer {
            let draw = renderer.draw_stats();
            log::debug!(
                "draw time avg {:.3} ms, max {:.3} ms",
                draw.average_frame_time_ns / 1e6,
                draw.max_frame_time_ns / 1e6
            );
        }
        Ok(())
    }

    fn create_window_and_surface(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let monitor = event_loop
            .primary_monitor()
            .or_else(|| event_loop.available_monitors().next())
            .ok_or_else(|| anyhow!("no monitor available"))?;

        self.refresh_rate = monitor
            .refresh_rate_millihertz()
            .map(|rate| rate as f64 / 1000.0);

        let mut attributes = Window::default_attributes()
            .with_title("wordface")
            .with_resizable(self.windowed);
        attributes = if self.windowed {
            attributes.with_inner_size(LogicalSize::new(1280.0, 720.0))
        } else {
            attributes.with_fullscreen(Some(Fullscreen::Borderless(Some(monitor))))
        };

        let window = Arc::new(event_loop.create_window(attributes)?);
        let size = window.inner_size();
        log::info!(
            "display {}x{} px, scale {:.2}, refresh {}",
            size.width,
            size.height,
            window.scale_factor(),
            self.refresh_rate
                .map_or_else(|| "unknown".to_string(), |r| format!("{r:.1} Hz"))
        );
        let expected = self.experiment.config().frame_rate as f64;
        if let Some(rate) = self.refresh_rate {
            if (rate - expected).abs() > 1.0 {
                log::warn!("monitor reports {rate:.1} Hz but durations assume {expected} Hz");
            }
        }

        let surface = SurfaceTexture::new(size.width, size.height, window.clone());
        self.pixels = Some(Pixels::new(size.width, size.height, surface)?);

        let config = self.experiment.config();
        let font = load_font(&config.display.font)?;
        let pixmaps =
            StimulusPixmaps::load(&config.display, &config.intro, &config.images, &font)?;
        self.renderer = Some(SkiaRenderer::new(
            size.width,
            size.height,
            &config.display,
            pixmaps,
            Some(font),
        )?);

        if !self.windowed {
            window.set_cursor_visible(false);
        }
        window.request_redraw();
        self.window = Some(window);
        Ok(())
    }

    /// Plans, draws and presents one frame, then lets the state machine
    /// react to the flip.
    fn frame(&mut self) -> Result<()> {
        let plan = self.experiment.next_frame()?;
        let (Some(pixels), Some(renderer)) = (self.pixels.as_mut(), self.renderer.as_mut()) else {
            return Ok(());
        };

        let stats = renderer.render_frame(&plan, pixels.frame_mut(), &mut self.render_timer)?;
        pixels.render().context("presenting frame")?;
        if let Some(slept) = self.experiment.pace() {
            log::trace!("present returned early, slept {:.3} ms", slept.as_secs_f64() * 1e3);
        }
        self.experiment.flipped()?;

        log::trace!(
            "{:?}: clear {:.3} ms, draw {:.3} ms, copy {:.3} ms, {} dirty",
            plan.stimulus,
            stats.clear.as_secs_f64() * 1e3,
            stats.draw.as_secs_f64() * 1e3,
            stats.copy.as_secs_f64() * 1e3,
            stats.dirty_count,
        );
        Ok(())
    }

    fn handle_key(&mut self, name: &str, event_loop: &ActiveEventLoop) {
        match self.experiment.handle_key(name) {
            Ok(Control::Continue) => {}
            Ok(Control::Quit) => self.cleanup_and_exit(event_loop),
            Err(e) => self.fail(e.into(), event_loop),
        }
    }

    fn handle_resize(&mut self, new_size: PhysicalSize<u32>) -> Result<()> {
        let unchanged = self
            .renderer
            .as_ref()
            .is_some_and(|r| r.size() == (new_size.width, new_size.height));
        if unchanged {
            return Ok(());
        }
        if let Some(pixels) = &mut self.pixels {
            pixels.resize_surface(new_size.width, new_size.height)?;
            pixels.resize_buffer(new_size.width, new_size.height)?;
        }
        if let Some(renderer) = &mut self.renderer {
            renderer.resize(new_size.width, new_size.height)?;
        }
        log::info!("display resized to {}x{}", new_size.width, new_size.height);
        Ok(())
    }

    fn fail(&mut self, err: anyhow::Error, event_loop: &ActiveEventLoop) {
        log::error!("{err:#}");
        self.error = Some(err);
        self.cleanup_and_exit(event_loop);
    }

    fn cleanup_and_exit(&mut self, event_loop: &ActiveEventLoop) {
        if let Some(window) = &self.window {
            window.set_cursor_visible(true);
        }
        if self.experiment.is_done() {
            log::info!("experiment finished");
        }
        self.should_exit = true;
        event_loop.exit();
    }
}

/// Name of a pressed key as the key map spells it.
pub fn key_name(key: &Key) -> Option<String> {
    match key {
        Key::Character(s) => Some(s.to_lowercase()),
        Key::Named(NamedKey::Escape) => Some("escape".into()),
        _ => None,
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_none() {
            if let Err(e) = self.create_window_and_surface(event_loop) {
                self.fail(e.context("creating window and surface"), event_loop);
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        if self.should_exit {
            return;
        }
        match event {
            WindowEvent::CloseRequested => self.cleanup_and_exit(event_loop),
            WindowEvent::RedrawRequested => {
                if let Err(e) = self.frame() {
                    self.fail(e, event_loop);
                } else if self.experiment.is_done() {
                    self.cleanup_and_exit(event_loop);
                } else if let Some(win) = &self.window {
                    win.request_redraw();
                }
            }
            WindowEvent::KeyboardInput { event, .. } if event.state.is_pressed() && !event.repeat => {
                if let Some(name) = key_name(&event.logical_key) {
                    self.handle_key(&name, event_loop);
                }
            }
            WindowEvent::Resized(size) => {
                if let Err(e) = self.handle_resize(size) {
                    self.fail(e, event_loop);
                }
            }
            WindowEvent::ScaleFactorChanged { .. } => {
                if let Some(size) = self.window.as_ref().map(|w| w.inner_size()) {
                    if let Err(e) = self.handle_resize(size) {
                        self.fail(e, event_loop);
                    }
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self.should_exit {
            event_loop.exit();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_names_match_the_key_map() {
        assert_eq!(key_name(&Key::Character("T".into())).as_deref(), Some("t"));
        assert_eq!(key_name(&Key::Character("1".into())).as_deref(), Some("1"));
        assert_eq!(key_name(&Key::Named(NamedKey::Escape)).as_deref(), Some("escape"));
        assert_eq!(key_name(&Key::Named(NamedKey::Shift)), None);
    }
}
