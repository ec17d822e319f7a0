use std::path::PathBuf;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use glam::Mat4;
use image::{Rgba, RgbaImage};
use winit::application::ApplicationHandler;
use winit::dpi::LogicalSize;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowId};

use sprig_engine::device::{FrameOutcome, Gpu, GpuInit};
use sprig_engine::gfx::wgpu_backend::WgpuBackend;
use sprig_engine::logging::{init_logging, LoggingConfig};
use sprig_engine::shader::builtin;
use sprig_engine::sprite::{DrawParams, Sprite};
use sprig_engine::{Color, Renderer, RendererConfig};

const SHEET_FRAME: u32 = 32;
const SHEET_FRAMES: u32 = 4;
const SHEET_PER_LINE: u32 = 2;
const FRAMES_PER_SECOND: f32 = 4.0;

#[derive(Debug, Clone)]
struct DemoConfig {
    title: String,
    initial_size: LogicalSize<f64>,
    /// Extra image drawn next to the built-in sheet.
    sprite_path: Option<PathBuf>,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            title: "sprig demo".to_owned(),
            initial_size: LogicalSize::new(800.0, 600.0),
            sprite_path: None,
        }
    }
}

struct Scene {
    gpu: Gpu,
    renderer: Renderer<WgpuBackend>,
    sheet: Rc<Sprite>,
    badge: Rc<Sprite>,
    extra: Option<Rc<Sprite>>,
}

impl Scene {
    fn new(window: Arc<Window>, config: &DemoConfig) -> Result<Self> {
        let gpu = Gpu::new_blocking(window, GpuInit::default())?;
        let backend = WgpuBackend::for_gpu(&gpu);
        let mut renderer =
            Renderer::new(backend, RendererConfig::default()).context("failed to set up shaders")?;

        let image = checker_sheet();
        let sheet = renderer
            .sprite_from_image(
                "demo:sheet",
                &image,
                SHEET_FRAME,
                SHEET_FRAME,
                SHEET_FRAMES,
                SHEET_PER_LINE,
            )
            .context("failed to build the demo sheet")?;
        let badge = renderer
            .sprite_from_image("demo:badge", &image, 96, 96, 0, 0)
            .context("failed to build the demo badge")?;

        let extra = match &config.sprite_path {
            Some(path) => match renderer.load_sprite(path, 128, 128) {
                Ok(sprite) => Some(sprite),
                Err(e) => {
                    log::error!("failed to load {}: {e:#}", path.display());
                    None
                }
            },
            None => None,
        };

        renderer
            .activate(builtin::SPRITE)
            .context("failed to compile the sprite program")?;

        Ok(Self { gpu, renderer, sheet, badge, extra })
    }

    fn redraw(&mut self, elapsed: f32) -> FrameOutcome {
        let size = self.gpu.size();
        let projection =
            Mat4::orthographic_rh(0.0, size.width as f32, size.height as f32, 0.0, -1.0, 1.0);

        let Scene { gpu, renderer, sheet, badge, extra } = self;
        renderer.set_uniform_mat4("projection", &projection);
        renderer.set_uniform_mat4("camera", &Mat4::IDENTITY);

        let frame = (elapsed * FRAMES_PER_SECOND) as u32 % sheet.frame_count().max(1);
        let sheet_params = DrawParams::at(48.0, 48.0, 0.0).scaled(4.0, 4.0, 1.0).with_frame(frame);
        renderer.draw_frame(sheet, &sheet_params);

        let pulse = 0.5 + 0.5 * (elapsed * 2.0).sin();
        renderer.draw(
            badge,
            &DrawParams::at(400.0, 300.0, 0.0)
                .rotated(0.0, 0.0, elapsed * 45.0)
                .tinted(Color::rgba(1.0, pulse, 0.4, 0.9)),
        );

        if let Some(extra) = extra {
            renderer.draw(extra, &DrawParams::at(560.0, 64.0, 0.0));
        }

        let outcome = gpu.render(Color::rgb(0.08, 0.09, 0.12), |encoder, view| {
            renderer.backend_mut().flush(encoder, view);
        });
        if outcome != FrameOutcome::Presented {
            renderer.backend_mut().discard_pending();
        }
        outcome
    }
}

/// Four 32x32 frames laid out 2x2, each a different checker color.
fn checker_sheet() -> RgbaImage {
    const TINTS: [[u8; 3]; 4] = [[230, 80, 70], [240, 200, 60], [80, 190, 110], [70, 130, 230]];
    let size = SHEET_FRAME * SHEET_PER_LINE;
    RgbaImage::from_fn(size, size, |x, y| {
        let frame = (y / SHEET_FRAME * SHEET_PER_LINE + x / SHEET_FRAME) as usize;
        let [r, g, b] = TINTS[frame % TINTS.len()];
        if (x / 8 + y / 8) % 2 == 0 {
            Rgba([r, g, b, 255])
        } else {
            Rgba([r / 3, g / 3, b / 3, 255])
        }
    })
}

struct Demo {
    config: DemoConfig,
    scene: Option<Scene>,
    started: Instant,
}

impl Demo {
    fn new(config: DemoConfig) -> Self {
        Self { config, scene: None, started: Instant::now() }
    }

    fn create_scene(&self, event_loop: &ActiveEventLoop) -> Result<Scene> {
        let attrs = Window::default_attributes()
            .with_title(self.config.title.clone())
            .with_inner_size(self.config.initial_size);
        let window = event_loop.create_window(attrs).context("failed to create window")?;
        Scene::new(Arc::new(window), &self.config)
    }
}

impl ApplicationHandler for Demo {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.scene.is_some() {
            return;
        }

        match self.create_scene(event_loop) {
            Ok(scene) => {
                scene.gpu.window().request_redraw();
                self.scene = Some(scene);
            }
            Err(e) => {
                log::error!("failed to start: {e:#}");
                event_loop.exit();
            }
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        event_loop.set_control_flow(ControlFlow::Wait);
        if let Some(scene) = &self.scene {
            scene.gpu.window().request_redraw();
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        let Some(scene) = self.scene.as_mut() else { return };

        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::Resized(size) => scene.gpu.resize(size),
            WindowEvent::RedrawRequested => {
                let elapsed = self.started.elapsed().as_secs_f32();
                if scene.redraw(elapsed) == FrameOutcome::Fatal {
                    log::error!("surface lost; exiting");
                    event_loop.exit();
                }
            }
            _ => {}
        }
    }
}

fn main() -> Result<()> {
    init_logging(LoggingConfig::default());

    let config = DemoConfig {
        sprite_path: std::env::args_os().nth(1).map(PathBuf::from),
        ..DemoConfig::default()
    };

    let event_loop = EventLoop::new().context("failed to create winit EventLoop")?;
    let mut demo = Demo::new(config);
    event_loop
        .run_app(&mut demo)
        .context("winit event loop terminated with error")?;

    Ok(())
}
