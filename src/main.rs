//! Water Surface entry point
//!
//! Browser builds draw the surface on `#canvas`; native builds run a headless
//! scroll demo and log what the simulation is doing.

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

/// World units scrolled per second
const SCROLL_SPEED: f32 = 120.0;
/// Strength of an impact ripple
const IMPACT_AMPLITUDE: f32 = 0.02;
/// Spatial frequency of an impact ripple
const IMPACT_FREQUENCY: f32 = 8.0;

#[cfg(target_arch = "wasm32")]
mod wasm_app {
    use std::cell::RefCell;
    use std::rc::Rc;

    use glam::Vec2;
    use wasm_bindgen::prelude::*;
    use web_sys::{HtmlCanvasElement, PointerEvent};

    use water_surface::platform::{FrameClock, PerformanceClock};
    use water_surface::renderer::WaterRenderState;
    use water_surface::{Settings, SurfaceController};

    use super::{IMPACT_AMPLITUDE, IMPACT_FREQUENCY, SCROLL_SPEED};

    struct App {
        controller: SurfaceController,
        render_state: WaterRenderState,
        clock: PerformanceClock,
        canvas: HtmlCanvasElement,
        start_time: Option<f64>,
    }

    impl App {
        fn frame(&mut self) {
            let now = self.clock.now();
            let start = *self.start_time.get_or_insert(now);
            self.controller
                .set_scroll((now - start) as f32 * SCROLL_SPEED);
            self.controller.advance_to(now);
            self.render();
        }

        fn render(&mut self) {
            match self.render_state.render(self.controller.render_params()) {
                Ok(_) => {}
                Err(wgpu::SurfaceError::Lost) => {
                    let (w, h) = self.render_state.size;
                    self.render_state.resize(w, h);
                }
                Err(wgpu::SurfaceError::OutOfMemory) => {
                    log::error!("Out of memory!");
                }
                Err(e) => log::warn!("Render error: {:?}", e),
            }
        }

        /// Pointer position (CSS pixels from the canvas top-left) to view space
        fn pointer_to_view(&self, x: f32, y: f32) -> Vec2 {
            let dpr = web_sys::window()
                .map(|w| w.device_pixel_ratio() as f32)
                .unwrap_or(1.0);
            let w = self.canvas.width() as f32;
            let h = self.canvas.height() as f32;
            Vec2::new(x * dpr - w * 0.5, h * 0.5 - y * dpr)
        }

        fn impact(&mut self, x: f32, y: f32) {
            let view = self.pointer_to_view(x, y);
            let world = self
                .controller
                .render_params()
                .view_to_world
                .transform_point2(view);
            log::debug!("Impact at view {:?} -> world {:?}", view, world);
            self.controller
                .add_ripple(world, IMPACT_AMPLITUDE, IMPACT_FREQUENCY);
        }

        /// Swap settings and push the (possibly reseeded) noise table to the GPU
        fn apply_settings(&mut self, settings: Settings) {
            self.controller.apply_settings(settings);
            self.render_state
                .set_noise_permutation(self.controller.field().noise().permutation());
            log::info!("Settings applied");
        }

        fn resize(&mut self) {
            let Some(window) = web_sys::window() else {
                return;
            };
            let dpr = window.device_pixel_ratio();
            let width = (self.canvas.client_width() as f64 * dpr) as u32;
            let height = (self.canvas.client_height() as f64 * dpr) as u32;
            if width == 0 || height == 0 || (width, height) == self.render_state.size {
                return;
            }
            self.canvas.set_width(width);
            self.canvas.set_height(height);
            self.render_state.resize(width, height);
            self.controller
                .resize(Vec2::new(width as f32, height as f32));
            log::info!("Resized to {}x{}", width, height);
        }
    }

    pub async fn run() {
        console_error_panic_hook::set_once();
        if console_log::init_with_level(log::Level::Info).is_err() {
            web_sys::console::warn_1(&"Logger already initialised".into());
        }

        log::info!("Water Surface starting...");

        let Some(document) = web_sys::window().and_then(|w| w.document()) else {
            log::error!("No document to mount on");
            return;
        };

        // Hide loading indicator
        if let Some(loading) = document.get_element_by_id("loading") {
            let _ = loading.set_attribute("class", "hidden");
        }

        let Some(canvas) = document
            .get_element_by_id("canvas")
            .and_then(|el| el.dyn_into::<HtmlCanvasElement>().ok())
        else {
            log::error!("No #canvas element");
            return;
        };

        // Set canvas size
        let dpr = web_sys::window().map_or(1.0, |w| w.device_pixel_ratio());
        let width = ((canvas.client_width() as f64 * dpr) as u32).max(1);
        let height = ((canvas.client_height() as f64 * dpr) as u32).max(1);
        canvas.set_width(width);
        canvas.set_height(height);

        let settings = Settings::load();
        let mut controller = SurfaceController::new(settings);

        // Initialize WebGPU
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::BROWSER_WEBGPU,
            ..Default::default()
        });

        let surface = match instance.create_surface(wgpu::SurfaceTarget::Canvas(canvas.clone())) {
            Ok(surface) => surface,
            Err(e) => {
                log::error!("Failed to create surface: {}", e);
                return;
            }
        };

        let adapter = match instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
        {
            Ok(adapter) => adapter,
            Err(e) => {
                log::error!("Failed to get adapter: {}", e);
                return;
            }
        };

        log::info!("Using adapter: {:?}", adapter.get_info().name);

        let permutation = controller.field().noise().permutation().to_vec();
        let render_state =
            match WaterRenderState::new(surface, &adapter, width, height, &permutation).await {
                Ok(state) => state,
                Err(e) => {
                    log::error!("Renderer unavailable: {}", e);
                    return;
                }
            };

        // No texture decoder in the browser build; the grid falls back to a flat colour
        controller.setup(Vec2::new(width as f32, height as f32), None);

        let app = Rc::new(RefCell::new(App {
            controller,
            render_state,
            clock: PerformanceClock::new(),
            canvas: canvas.clone(),
            start_time: None,
        }));

        setup_input_handlers(&canvas, app.clone());
        setup_resize_handler(app.clone());
        setup_settings_sync(app.clone());

        request_animation_frame(app);

        log::info!("Water Surface running!");
    }

    fn setup_input_handlers(canvas: &HtmlCanvasElement, app: Rc<RefCell<App>>) {
        let closure = Closure::<dyn FnMut(_)>::new(move |event: PointerEvent| {
            app.borrow_mut()
                .impact(event.offset_x() as f32, event.offset_y() as f32);
        });
        let _ = canvas
            .add_event_listener_with_callback("pointerdown", closure.as_ref().unchecked_ref());
        closure.forget();
    }

    fn setup_resize_handler(app: Rc<RefCell<App>>) {
        let Some(window) = web_sys::window() else {
            return;
        };
        let closure = Closure::<dyn FnMut(_)>::new(move |_event: web_sys::Event| {
            app.borrow_mut().resize();
        });
        let _ = window.add_event_listener_with_callback("resize", closure.as_ref().unchecked_ref());
        closure.forget();
    }

    /// Settings saved from another tab arrive as a `storage` event
    fn setup_settings_sync(app: Rc<RefCell<App>>) {
        let Some(window) = web_sys::window() else {
            return;
        };
        let closure = Closure::<dyn FnMut(_)>::new(move |_event: web_sys::Event| {
            app.borrow_mut().apply_settings(Settings::load());
        });
        let _ = window.add_event_listener_with_callback("storage", closure.as_ref().unchecked_ref());
        closure.forget();
    }

    fn request_animation_frame(app: Rc<RefCell<App>>) {
        let Some(window) = web_sys::window() else {
            return;
        };
        let closure = Closure::once(move |_time: f64| {
            app.borrow_mut().frame();
            request_animation_frame(app);
        });
        let _ = window.request_animation_frame(closure.as_ref().unchecked_ref());
        closure.forget();
    }
}

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub async fn wasm_main() {
    wasm_app::run().await;
}

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("Water Surface (native) starting...");
    log::info!("Native mode runs headless - run with `trunk serve` for the rendered surface");

    let settings = match std::env::args().nth(1) {
        Some(path) => water_surface::Settings::load_from(path),
        None => water_surface::Settings::load(),
    };
    headless_demo(settings, 6.0, 0xC0FFEE);
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // WASM entry point is wasm_main, this is just to satisfy the compiler
}

/// Scroll a 1280x720 surface for `seconds` at 60 fps with random impacts
#[cfg(not(target_arch = "wasm32"))]
fn headless_demo(settings: water_surface::Settings, seconds: f64, seed: u64) {
    use glam::{UVec2, Vec2};
    use rand::{Rng, SeedableRng};
    use rand_pcg::Pcg32;
    use water_surface::SurfaceController;
    use water_surface::platform::{FrameClock, ManualClock};

    const FRAME: f64 = 1.0 / 60.0;
    const IMPACT_CHANCE: f64 = 0.04;

    let viewport = Vec2::new(1280.0, 720.0);
    let mut rng = Pcg32::seed_from_u64(seed);
    let clock = ManualClock::new(0.0);
    let mut controller = SurfaceController::new(settings);
    controller.setup(viewport, Some(UVec2::new(512, 512)));

    let grid = controller.grid();
    log::info!(
        "Grid: {} rows x {} cols of {:?} (fill {:?})",
        grid.row_count(),
        grid.col_count(),
        grid.tile_size(),
        grid.fill()
    );

    let frames = (seconds / FRAME).round() as u64;
    let mut impacts = 0u32;
    for frame in 0..frames {
        clock.advance(FRAME);
        controller.set_scroll(clock.now() as f32 * SCROLL_SPEED);

        if rng.random_bool(IMPACT_CHANCE) {
            let view = Vec2::new(
                rng.random_range(-0.5f32..0.5) * viewport.x,
                rng.random_range(-0.5f32..0.5) * viewport.y,
            );
            let world = controller.view_to_world(view);
            controller.add_ripple(world, IMPACT_AMPLITUDE, IMPACT_FREQUENCY);
            impacts += 1;
        }

        controller.advance_to(clock.now());

        if frame % 60 == 59 {
            let params = controller.render_params();
            let centre = controller.view_to_world(Vec2::ZERO);
            log::info!(
                "t={:.2}s scroll={:.0} tiles={} ripples={} d(centre)={:+.5}",
                params.time,
                controller.camera().offset,
                params.tiles.len(),
                params.ripples.active_count(),
                controller.displacement_at(centre)
            );
        }
    }

    log::info!(
        "Done: {} frames, {} impacts, {} ripples still live",
        frames,
        impacts,
        controller.ripples().active_count()
    );
}
