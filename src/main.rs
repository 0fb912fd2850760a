// =============================================================================
// VORTEX RENDERER - Demo loop
// =============================================================================
//
// Opens a window, clears it every frame and uploads an orbiting camera
// matrix into the per-image uniform range. Exercises every path of the
// renderer: resize, out-of-date surfaces, frames-in-flight changes.
//
// ARCHITECTURE OVERVIEW:
// ┌─────────────────────────────────────────────────────────────────┐
// │  winit App (window, input, timing)                              │
// │    └── VulkanInstance + surface                                 │
// │          └── VulkanDevice (Arc, shared)                         │
// │                └── Renderer (swapchain, frame slots, uniforms)  │
// └─────────────────────────────────────────────────────────────────┘
//
// CONTROLS:
//   1-4  frames in flight
//   F11  toggle fullscreen
//   Esc  quit
//
// =============================================================================

use anyhow::{Context, Result};
use ash::vk;
use glam::{Mat4, Vec3};
use raw_window_handle::{HasRawDisplayHandle, HasRawWindowHandle};
use std::sync::Arc;
use std::time::Instant;
use winit::{
    application::ApplicationHandler,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, EventLoop},
    window::{Fullscreen, Window, WindowAttributes},
};

use vortex_renderer::backend::render_pass::{create_render_pass, destroy_render_pass};
use vortex_renderer::backend::{VulkanDevice, VulkanInstance};
use vortex_renderer::config::Config;
use vortex_renderer::renderer::{DrawOutcome, Renderer, RendererCreateInfo};

// =============================================================================
// ENTRY POINT
// =============================================================================

fn main() -> Result<()> {
    // Load configuration from config.toml
    let config = Config::load();

    init_logging(&config);
    log::info!("Starting Vortex renderer");
    log::info!("Window: {}x{} ({})",
        config.window.width,
        config.window.height,
        if config.window.fullscreen { "fullscreen" } else { "windowed" }
    );
    log::info!("Present mode: {}, target: {:?}, frames in flight: {}",
        config.graphics.present_mode,
        config.graphics.render_target,
        config.frames_in_flight()
    );

    let event_loop = EventLoop::new()?;
    let mut app = App::new(config);
    event_loop.run_app(&mut app)?;
    Ok(())
}

/// RUST_LOG wins over the configured level
fn init_logging(config: &Config) {
    let env = env_logger::Env::default().default_filter_or(config.debug.log_level.as_str());
    env_logger::Builder::from_env(env).init();
}

/// View-projection of a camera circling the origin.
fn camera_matrix(seconds: f32, aspect: f32) -> Mat4 {
    let eye = Vec3::new(seconds.cos() * 3.0, 1.5, seconds.sin() * 3.0);
    let view = Mat4::look_at_rh(eye, Vec3::ZERO, Vec3::Y);
    let mut projection = Mat4::perspective_rh(45f32.to_radians(), aspect, 0.1, 100.0);
    // Vulkan clip space has Y pointing down
    projection.y_axis.y *= -1.0;
    projection * view
}

// =============================================================================
// GPU STATE
// =============================================================================

/// Everything that exists once the window does.
///
/// Teardown is explicit in Drop: renderer, render pass, device, surface, and
/// the instance last (it is the final field to drop).
struct Gpu {
    renderer: Option<Renderer<VulkanDevice>>,
    render_pass: vk::RenderPass,
    device: Option<Arc<VulkanDevice>>,
    surface: vk::SurfaceKHR,

    // Fixed at startup; the render pass was built for them
    surface_format: vk::SurfaceFormatKHR,
    depth_format: vk::Format,
    present_mode: vk::PresentModeKHR,

    instance: VulkanInstance,
}

impl Gpu {
    fn new(window: &Window, config: &Config) -> Result<Self> {
        log::info!("Initializing Vulkan...");

        // ─────────────────────────────────────────────────────────────────────
        // STEP 1: Instance + surface
        // ─────────────────────────────────────────────────────────────────────
        let enable_validation = config.debug.validation_layers;
        let instance = VulkanInstance::new(
            &config.window.title,
            window.raw_display_handle(),
            enable_validation,
        )?;
        let surface =
            instance.create_surface(window.raw_display_handle(), window.raw_window_handle())?;

        // ─────────────────────────────────────────────────────────────────────
        // STEP 2: Device and the formats everything else is built around
        // ─────────────────────────────────────────────────────────────────────
        let device = VulkanDevice::new(&instance, surface, config.device_requirements())?;
        let surface_format = device.surface_format(surface)?;
        let depth_format = device.depth_format()?;
        let present_mode = device.present_mode(surface, &config.present_mode_preference())?;

        log::info!("Surface format: {:?}, depth format: {:?}",
            surface_format.format, depth_format);

        // ─────────────────────────────────────────────────────────────────────
        // STEP 3: Render pass + renderer
        // ─────────────────────────────────────────────────────────────────────
        let render_pass = create_render_pass(
            &device,
            config.graphics.render_target,
            surface_format.format,
            depth_format,
        )?;

        let mut gpu = Self {
            renderer: None,
            render_pass,
            device: Some(device),
            surface,
            surface_format,
            depth_format,
            present_mode,
            instance,
        };

        let info = gpu.create_info(window, config, config.frames_in_flight())?;
        let device = Arc::clone(gpu.device()?);
        let mut renderer = Renderer::new(device, info)?;
        renderer.record_command_buffers(|_, _| {})?;
        gpu.renderer = Some(renderer);

        log::info!("Vulkan initialized successfully!");
        Ok(gpu)
    }

    fn device(&self) -> Result<&Arc<VulkanDevice>> {
        self.device.as_ref().context("Device already destroyed")
    }

    fn renderer(&mut self) -> Result<&mut Renderer<VulkanDevice>> {
        self.renderer.as_mut().context("Renderer not initialized")
    }

    /// Fresh surface capabilities wrapped into a create info.
    fn create_info(
        &self,
        window: &Window,
        config: &Config,
        frames_in_flight: usize,
    ) -> Result<RendererCreateInfo> {
        let device = self.device()?;
        let size = window.inner_size();

        Ok(RendererCreateInfo {
            surface: self.surface,
            surface_capabilities: device
                .surface_capabilities(self.surface, (size.width, size.height))?,
            surface_format: self.surface_format,
            present_mode: self.present_mode,
            depth_format: self.depth_format,
            render_pass: self.render_pass,
            frame_data_size: std::mem::size_of::<Mat4>(),
            frames_in_flight,
            graphics_queue: device.queue(0),
            present_queue: device.queue(1),
            target: config.graphics.render_target,
            clear_color: config.graphics.clear_color,
        })
    }
}

impl Drop for Gpu {
    fn drop(&mut self) {
        log::info!("Cleaning up Vulkan resources...");

        // 1. Renderer (waits for its own frames)
        drop(self.renderer.take());

        // 2. Render pass and device
        if let Some(device) = self.device.take() {
            if let Err(e) = device.wait_idle() {
                log::error!("Failed to wait for device idle: {:#}", e);
            }
            destroy_render_pass(&device, self.render_pass);
        }

        // 3. Surface; the instance follows as the last field
        self.instance.destroy_surface(self.surface);

        log::info!("Cleanup complete");
    }
}

// =============================================================================
// APPLICATION STATE
// =============================================================================

struct App {
    config: Config,

    // ─────────────────────────────────────────────────────────────────────────
    // WINDOW & GPU
    // ─────────────────────────────────────────────────────────────────────────
    // gpu is declared first so it drops before the window it renders into
    gpu: Option<Gpu>,
    window: Option<Arc<Window>>,
    is_fullscreen: bool,
    frames_in_flight: usize,

    // ─────────────────────────────────────────────────────────────────────────
    // STATE FLAGS
    // ─────────────────────────────────────────────────────────────────────────
    /// Set when the surface changed - triggers renderer recreation
    needs_resize: bool,
    /// Set when window is minimized (size = 0) - skip rendering
    is_minimized: bool,

    // ─────────────────────────────────────────────────────────────────────────
    // TIMING
    // ─────────────────────────────────────────────────────────────────────────
    start_time: Instant,
    frame_count: u32,
    last_fps_update: Instant,
    last_frame_time: Instant,
}

impl App {
    fn new(config: Config) -> Self {
        let is_fullscreen = config.window.fullscreen;
        let frames_in_flight = config.frames_in_flight();
        let now = Instant::now();
        Self {
            config,
            gpu: None,
            window: None,
            is_fullscreen,
            frames_in_flight,
            needs_resize: false,
            is_minimized: false,
            start_time: now,
            frame_count: 0,
            last_fps_update: now,
            last_frame_time: now,
        }
    }

    // =========================================================================
    // RENDER LOOP
    // =========================================================================

    /// Render a single frame. Returns whether anything was presented.
    fn render_frame(&mut self) -> Result<bool> {
        // Nothing to draw into, or already torn down on close
        if self.is_minimized || self.gpu.is_none() {
            return Ok(false);
        }

        if self.needs_resize && !self.recreate()? {
            return Ok(false);
        }

        let window = self.window.as_ref().context("Window not created")?;
        let size = window.inner_size();
        let aspect = size.width as f32 / size.height.max(1) as f32;
        let camera = camera_matrix(self.start_time.elapsed().as_secs_f32(), aspect);

        let gpu = self.gpu.as_mut().context("Vulkan not initialized")?;
        let outcome = gpu.renderer()?.draw(bytemuck::bytes_of(&camera))?;
        match outcome {
            DrawOutcome::Presented => Ok(true),
            DrawOutcome::Suboptimal => {
                self.needs_resize = true;
                Ok(true)
            }
            DrawOutcome::SurfaceOutOfDate => {
                log::debug!("Surface out of date, recreating");
                self.needs_resize = true;
                Ok(false)
            }
        }
    }

    /// Rebuild for the current surface. Returns false while there is nothing
    /// to render into.
    fn recreate(&mut self) -> Result<bool> {
        let window = self.window.as_ref().context("Window not created")?;
        let gpu = self.gpu.as_mut().context("Vulkan not initialized")?;

        let info = gpu.create_info(window, &self.config, self.frames_in_flight)?;
        let extent = info.surface_capabilities.current_extent;
        if extent.width == 0 || extent.height == 0 {
            return Ok(false);
        }

        log::info!("Recreating renderer at {}x{}", extent.width, extent.height);

        let renderer = gpu.renderer()?;
        renderer.wait_idle()?;
        renderer.recreate(info)?;
        renderer.record_command_buffers(|_, _| {})?;

        self.needs_resize = false;
        Ok(true)
    }

    fn set_frames_in_flight(&mut self, frames_in_flight: usize) -> Result<()> {
        if frames_in_flight == self.frames_in_flight {
            return Ok(());
        }

        let window = self.window.as_ref().context("Window not created")?;
        let gpu = self.gpu.as_mut().context("Vulkan not initialized")?;

        let info = gpu.create_info(window, &self.config, frames_in_flight)?;
        let renderer = gpu.renderer()?;
        renderer.wait_idle()?;
        renderer.set_frames_in_flight(info)?;

        self.frames_in_flight = frames_in_flight;
        Ok(())
    }

    // =========================================================================
    // FULLSCREEN TOGGLE
    // =========================================================================

    fn toggle_fullscreen(&mut self) {
        if let Some(ref window) = self.window {
            self.is_fullscreen = !self.is_fullscreen;

            if self.is_fullscreen {
                window.set_fullscreen(Some(Fullscreen::Borderless(None)));
                log::info!("Entered fullscreen mode");
            } else {
                window.set_fullscreen(None);
                log::info!("Exited fullscreen mode");
            }

            self.needs_resize = true;
        }
    }

    // =========================================================================
    // FPS TRACKING
    // =========================================================================

    fn update_fps(&mut self) {
        if !self.config.debug.show_fps {
            return;
        }

        let now = Instant::now();
        let frame_time = now.duration_since(self.last_frame_time).as_secs_f32();
        self.last_frame_time = now;
        self.frame_count += 1;

        // Update title every second
        let elapsed = now.duration_since(self.last_fps_update).as_secs_f32();
        if elapsed >= 1.0 {
            let fps = self.frame_count as f32 / elapsed;

            if let Some(ref window) = self.window {
                window.set_title(&format!(
                    "{} - {:.0} FPS ({:.2}ms) [{} in flight]",
                    self.config.window.title,
                    fps,
                    frame_time * 1000.0,
                    self.frames_in_flight
                ));
            }

            self.frame_count = 0;
            self.last_fps_update = now;
        }
    }
}

// =============================================================================
// EVENT HANDLING
// =============================================================================

impl ApplicationHandler for App {
    /// Called when the application is ready to create windows.
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let mut window_attributes = WindowAttributes::default()
            .with_title(&self.config.window.title)
            .with_inner_size(winit::dpi::PhysicalSize::new(
                self.config.window.width,
                self.config.window.height,
            ));

        if self.config.window.fullscreen {
            window_attributes = window_attributes.with_fullscreen(Some(Fullscreen::Borderless(None)));
        }

        let window = match event_loop.create_window(window_attributes) {
            Ok(w) => Arc::new(w),
            Err(e) => {
                log::error!("Failed to create window: {:?}", e);
                event_loop.exit();
                return;
            }
        };

        match Gpu::new(&window, &self.config) {
            Ok(gpu) => self.gpu = Some(gpu),
            Err(e) => {
                log::error!("Failed to initialize Vulkan: {:?}", e);
                event_loop.exit();
                return;
            }
        }

        self.window = Some(window);
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _id: winit::window::WindowId,
        event: WindowEvent,
    ) {
        match event {
            // ─────────────────────────────────────────────────────────────────
            // CLOSE REQUEST
            // ─────────────────────────────────────────────────────────────────
            WindowEvent::CloseRequested => {
                log::info!("Close requested, shutting down...");
                self.gpu = None;
                event_loop.exit();
            }

            // ─────────────────────────────────────────────────────────────────
            // WINDOW RESIZED
            // ─────────────────────────────────────────────────────────────────
            WindowEvent::Resized(size) => {
                log::debug!("Window resized to {}x{}", size.width, size.height);

                if size.width == 0 || size.height == 0 {
                    self.is_minimized = true;
                } else {
                    self.is_minimized = false;
                    self.needs_resize = true;
                }
            }

            // ─────────────────────────────────────────────────────────────────
            // REDRAW REQUESTED
            // ─────────────────────────────────────────────────────────────────
            WindowEvent::RedrawRequested => match self.render_frame() {
                Ok(true) => self.update_fps(),
                Ok(false) => {}
                Err(e) => {
                    log::error!("Render error: {:?}", e);
                    event_loop.exit();
                }
            },

            // ─────────────────────────────────────────────────────────────────
            // KEYBOARD INPUT
            // ─────────────────────────────────────────────────────────────────
            WindowEvent::KeyboardInput { event, .. } => {
                use winit::keyboard::{KeyCode, PhysicalKey};

                if !event.state.is_pressed() {
                    return;
                }
                let PhysicalKey::Code(key) = event.physical_key else {
                    return;
                };

                let frames = match key {
                    KeyCode::Escape => {
                        log::info!("ESC pressed, exiting...");
                        self.gpu = None;
                        event_loop.exit();
                        return;
                    }
                    KeyCode::F11 => {
                        self.toggle_fullscreen();
                        return;
                    }
                    KeyCode::Digit1 => 1,
                    KeyCode::Digit2 => 2,
                    KeyCode::Digit3 => 3,
                    KeyCode::Digit4 => 4,
                    _ => return,
                };

                if let Err(e) = self.set_frames_in_flight(frames) {
                    log::error!("Failed to change frames in flight: {:?}", e);
                    event_loop.exit();
                }
            }

            _ => {}
        }
    }

    /// Request continuous redraws.
    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(ref window) = self.window {
            window.request_redraw();
        }
    }
}
