//! Windowed application shell: winit events in, Vello frames out.

use std::sync::Arc;
use std::time::Instant;

use kurbo::{Point, Size};
use peniko::Color;
use vello::util::RenderSurface;
use vello::wgpu::PresentMode;
use vello::{AaConfig, RenderParams, RendererOptions};
use winit::application::ApplicationHandler;
use winit::dpi::LogicalSize;
use winit::event::{ElementState, WindowEvent};
use winit::event_loop::{ActiveEventLoop, EventLoop};
use winit::window::{CursorIcon, Window, WindowId};
use wirecanvas_core::{
    AnimationOptions, Canvas, CanvasConfig, Graph, Key, KeyEvent, Modifiers, PointerButton,
    PointerEvent, WheelEvent,
};
use wirecanvas_render::{RenderContext, Renderer, VelloRenderer};

use crate::AppResult;

/// Application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Window title.
    pub title: String,
    /// Initial window width.
    pub width: u32,
    /// Initial window height.
    pub height: u32,
    /// Background color.
    pub background_color: Color,
    pub canvas: CanvasConfig,
    /// Font for titles and labels. Text shows as placeholder boxes without one.
    pub font: Option<Vec<u8>>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            title: "WireCanvas".to_string(),
            width: 1280,
            height: 800,
            background_color: Color::from_rgba8(34, 34, 34, 255),
            canvas: CanvasConfig::default(),
            font: None,
        }
    }
}

/// Runtime state for the application.
struct AppState {
    // Windowing
    window: Arc<Window>,
    surface: RenderSurface<'static>,

    // Rendering
    vello_renderer: vello::Renderer,
    scene_renderer: VelloRenderer,
    /// Copies the Rgba8 render target onto the surface format.
    texture_blitter: vello::wgpu::util::TextureBlitter,

    // Input
    canvas: Canvas,
    modifiers: Modifiers,
    cursor: Point,
    buttons: u8,
    started: Instant,
}

impl AppState {
    fn now_ms(&self) -> f64 {
        self.started.elapsed().as_secs_f64() * 1000.0
    }

    fn logical_size(&self) -> Size {
        let scale = self.window.scale_factor();
        Size::new(
            self.surface.config.width as f64 / scale,
            self.surface.config.height as f64 / scale,
        )
    }
}

/// Main application struct.
pub struct App {
    config: AppConfig,
    graph: Option<Graph>,
    state: Option<AppState>,
    render_cx: Option<vello::util::RenderContext>,
}

impl App {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            graph: None,
            state: None,
            render_cx: None,
        }
    }

    /// Graph to show once the window is up.
    pub fn with_graph(mut self, graph: Graph) -> Self {
        self.graph = Some(graph);
        self
    }

    /// Run the event loop until the window closes.
    pub fn run(mut self) -> AppResult<()> {
        let event_loop = EventLoop::new()?;
        event_loop.run_app(&mut self)?;
        Ok(())
    }

    /// Finish initialization after surface is created.
    fn finish_init(&mut self, event_loop: &ActiveEventLoop, window: Arc<Window>, surface: RenderSurface<'static>) {
        let Some(render_cx) = self.render_cx.as_ref() else {
            return;
        };
        let device = &render_cx.devices[surface.dev_id].device;

        let vello_renderer = match vello::Renderer::new(device, RendererOptions::default()) {
            Ok(renderer) => renderer,
            Err(e) => {
                log::error!("Failed to create Vello renderer: {:?}", e);
                event_loop.exit();
                return;
            }
        };
        let texture_blitter = vello::wgpu::util::TextureBlitter::new(device, surface.config.format);

        let mut scene_renderer = VelloRenderer::new();
        if let Some(font) = self.config.font.clone() {
            scene_renderer.register_font(font);
        }

        let mut canvas = Canvas::new(self.config.canvas.clone());
        if let Some(graph) = self.graph.take() {
            canvas.set_graph(graph);
        }
        let scale = window.scale_factor();
        canvas.viewport_size = Size::new(
            surface.config.width as f64 / scale,
            surface.config.height as f64 / scale,
        );
        let fit = AnimationOptions {
            duration_ms: 0.0,
            ..AnimationOptions::default()
        };
        if let Err(e) = canvas.fit_view_to_selection(fit, 0.0) {
            log::debug!("Nothing to fit: {}", e);
        }
        canvas.start_rendering();

        log::info!("WireCanvas initialized - {}x{}", surface.config.width, surface.config.height);

        self.state = Some(AppState {
            window: window.clone(),
            surface,
            vello_renderer,
            scene_renderer,
            texture_blitter,
            canvas,
            modifiers: Modifiers::NONE,
            cursor: Point::ZERO,
            buttons: 0,
            started: Instant::now(),
        });

        window.request_redraw();
    }

    fn render(&mut self) {
        let Some(state) = self.state.as_mut() else {
            return;
        };
        let Some(render_cx) = self.render_cx.as_ref() else {
            return;
        };

        let now = state.now_ms();
        state.canvas.tick(now);
        let logical = state.logical_size();
        state.canvas.prepare_frame(logical);

        let width = state.surface.config.width;
        let height = state.surface.config.height;
        let ctx = RenderContext::new(&state.canvas, Size::new(width as f64, height as f64))
            .with_scale_factor(state.window.scale_factor())
            .with_background(self.config.background_color);
        state.scene_renderer.build_scene(&ctx);
        let base_color = state.scene_renderer.background_color(&ctx);
        let scene = state.scene_renderer.take_scene();

        let device_handle = &render_cx.devices[state.surface.dev_id];
        let device = &device_handle.device;
        let queue = &device_handle.queue;

        let surface_texture = match state.surface.surface.get_current_texture() {
            Ok(t) => t,
            Err(e) => {
                log::warn!("Failed to get surface texture: {:?}", e);
                return;
            }
        };

        let params = RenderParams {
            base_color,
            width,
            height,
            antialiasing_method: AaConfig::Area,
        };

        // Vello needs a storage-bindable Rgba8 target; the surface may be Bgra8.
        let render_texture = device.create_texture(&vello::wgpu::TextureDescriptor {
            label: Some("vello render texture"),
            size: vello::wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: vello::wgpu::TextureDimension::D2,
            format: vello::wgpu::TextureFormat::Rgba8Unorm,
            usage: vello::wgpu::TextureUsages::STORAGE_BINDING
                | vello::wgpu::TextureUsages::COPY_SRC
                | vello::wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let render_texture_view = render_texture.create_view(&vello::wgpu::TextureViewDescriptor::default());

        if let Err(e) = state
            .vello_renderer
            .render_to_texture(device, queue, &scene, &render_texture_view, &params)
        {
            log::error!("Failed to render: {:?}", e);
            return;
        }

        let surface_view = surface_texture
            .texture
            .create_view(&vello::wgpu::TextureViewDescriptor::default());
        let mut encoder = device.create_command_encoder(&vello::wgpu::CommandEncoderDescriptor {
            label: Some("blit encoder"),
        });
        state
            .texture_blitter
            .copy(device, &mut encoder, &render_texture_view, &surface_view);
        queue.submit(std::iter::once(encoder.finish()));
        surface_texture.present();

        state.canvas.frame.frame_drawn(now);
        if state.canvas.viewport.is_animating() {
            state.window.request_redraw();
        }
    }
}

/// Handle an input event. Returns true if the canvas wants a redraw.
fn handle_input(state: &mut AppState, event: &WindowEvent) -> bool {
    let now = state.now_ms();
    match event {
        WindowEvent::ModifiersChanged(modifiers) => {
            state.modifiers = modifiers.state().into();
        }
        WindowEvent::CursorMoved { position, .. } => {
            let logical = position.to_logical::<f64>(state.window.scale_factor());
            state.cursor = Point::new(logical.x, logical.y);
            let event = PointerEvent::moved(state.cursor, state.buttons, now).with_modifiers(state.modifiers);
            state.canvas.process_pointer_move(event);
        }
        WindowEvent::MouseInput { state: button_state, button, .. } => {
            let button = PointerButton::from(*button);
            match button_state {
                ElementState::Pressed => {
                    state.buttons |= button.mask();
                    let event = PointerEvent::down(state.cursor, button, now).with_modifiers(state.modifiers);
                    state.canvas.process_pointer_down(PointerEvent {
                        buttons: state.buttons,
                        ..event
                    });
                }
                ElementState::Released => {
                    state.buttons &= !button.mask();
                    let event = PointerEvent::up(state.cursor, button, now).with_modifiers(state.modifiers);
                    state.canvas.process_pointer_up(event);
                }
            }
        }
        WindowEvent::MouseWheel { delta, .. } => {
            let mut event = WheelEvent::new(state.cursor, WheelEvent::delta_from_winit(*delta), now);
            event.modifiers = state.modifiers;
            state.canvas.process_wheel(&event);
        }
        WindowEvent::KeyboardInput { event, .. } => {
            let Some(key) = Key::from_winit(&event.logical_key) else {
                return false;
            };
            let key_event = match event.state {
                ElementState::Pressed => KeyEvent::pressed(key, state.modifiers),
                ElementState::Released => KeyEvent::released(key, state.modifiers),
            };
            state.canvas.process_key(&key_event);
        }
        _ => return false,
    }

    for event in state.canvas.take_events() {
        log::debug!("canvas event: {:?}", event);
    }
    let cursor = state.canvas.cursor.parse::<CursorIcon>().unwrap_or_default();
    state.window.set_cursor(cursor);
    state.canvas.frame.is_dirty()
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.state.is_some() {
            return;
        }

        log::info!("Creating window...");
        let window_attrs = Window::default_attributes()
            .with_title(&self.config.title)
            .with_inner_size(LogicalSize::new(self.config.width, self.config.height));
        let window = match event_loop.create_window(window_attrs) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                log::error!("Failed to create window: {}", e);
                event_loop.exit();
                return;
            }
        };

        let size = window.inner_size();
        let (width, height) = if size.width == 0 || size.height == 0 {
            (self.config.width, self.config.height)
        } else {
            (size.width, size.height)
        };

        let render_cx = self.render_cx.get_or_insert_with(vello::util::RenderContext::new);
        let surface = match pollster::block_on(render_cx.create_surface(
            window.clone(),
            width,
            height,
            PresentMode::AutoVsync,
        )) {
            Ok(surface) => surface,
            Err(e) => {
                log::error!("Failed to create surface: {:?}", e);
                event_loop.exit();
                return;
            }
        };
        self.finish_init(event_loop, window, surface);
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                if size.width == 0 || size.height == 0 {
                    return;
                }
                let Some(state) = self.state.as_mut() else { return };
                if let Some(render_cx) = self.render_cx.as_mut() {
                    render_cx.resize_surface(&mut state.surface, size.width, size.height);
                }
                state.canvas.mark_dirty();
                state.window.request_redraw();
            }
            WindowEvent::RedrawRequested => self.render(),
            event => {
                let Some(state) = self.state.as_mut() else { return };
                if handle_input(state, &event) {
                    state.window.request_redraw();
                }
            }
        }
    }
}
