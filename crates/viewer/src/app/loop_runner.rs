use std::process::ExitCode;
use std::time::{Duration, Instant};

use decals::{FrameContext, GroundDecals, MapDims, PlayerView};
use pixels::{Error as PixelsError, Pixels, SurfaceTexture};
use thiserror::Error;
use tracing::{error, info, warn};
use winit::dpi::LogicalSize;
use winit::error::{EventLoopError, OsError};
use winit::event::{ElementState, Event, MouseButton, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::WindowBuilder;

use super::backend::CpuBackend;
use super::battlefield::{build_images, Battlefield};
use super::bootstrap::AppWiring;
use super::terrain::WaveTerrain;

const WINDOW_TITLE: &str = "Ground Decals";
const WINDOW_SIZE: u32 = 960;
const MAP_SQUARES: i32 = 256;
const TARGET_TPS: u32 = 30;
const MAX_FRAME_DELTA: Duration = Duration::from_millis(250);
const MAX_TICKS_PER_FRAME: u32 = 5;
const METRICS_LOG_INTERVAL: Duration = Duration::from_secs(1);
const TERRAIN_AMPLITUDE: f32 = 6.0;
const TERRAIN_WAVELENGTH: f32 = 160.0;
const BATTLEFIELD_SEED: u64 = 0x6dec;

#[derive(Debug, Error)]
pub(crate) enum AppError {
    #[error("failed to create event loop: {0}")]
    CreateEventLoop(#[source] EventLoopError),
    #[error("failed to create application window: {0}")]
    CreateWindow(#[source] OsError),
    #[error("failed to initialize framebuffer: {0}")]
    CreateFramebuffer(#[source] PixelsError),
    #[error("event loop failed: {0}")]
    EventLoopRun(#[source] EventLoopError),
}

pub(crate) fn run(app: AppWiring) -> ExitCode {
    if let Err(err) = run_loop(app) {
        error!(error = %err, "startup_failed");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

fn run_loop(app: AppWiring) -> Result<(), AppError> {
    let dims = MapDims::new(MAP_SQUARES, MAP_SQUARES);
    let terrain = WaveTerrain::new(dims, TERRAIN_AMPLITUDE, TERRAIN_WAVELENGTH);
    let images = build_images(&app.config);
    let mut decals = GroundDecals::new(app.config, dims, Box::new(images));
    let mut battlefield = Battlefield::new(dims, BATTLEFIELD_SEED);
    let mut backend = CpuBackend::new(WINDOW_SIZE, WINDOW_SIZE, dims);

    let event_loop = EventLoop::new().map_err(AppError::CreateEventLoop)?;
    let window: &'static winit::window::Window = Box::leak(Box::new(
        WindowBuilder::new()
            .with_title(WINDOW_TITLE)
            .with_inner_size(LogicalSize::new(WINDOW_SIZE as f64, WINDOW_SIZE as f64))
            .build(&event_loop)
            .map_err(AppError::CreateWindow)?,
    ));
    let surface_size = window.inner_size();
    let surface = SurfaceTexture::new(surface_size.width, surface_size.height, window);
    let mut pixels = Pixels::new(WINDOW_SIZE, WINDOW_SIZE, surface)
        .map_err(AppError::CreateFramebuffer)?;

    event_loop.set_control_flow(ControlFlow::Poll);

    let fixed_dt = Duration::from_secs_f64(1.0 / TARGET_TPS as f64);
    let mut accumulator = Duration::ZERO;
    let mut last_frame_instant = Instant::now();
    let mut last_metrics_instant = Instant::now();
    let mut frames_since_metrics = 0u32;
    let mut ticks_since_metrics = 0u32;
    let mut draw_frame = 0u32;
    let mut input = InputCollector::default();

    info!(
        target_tps = TARGET_TPS,
        map_squares = MAP_SQUARES,
        window = WINDOW_SIZE,
        "loop_config"
    );

    event_loop
        .run(move |event, window_target| match event {
            Event::WindowEvent { window_id, event } if window_id == window.id() => match event {
                WindowEvent::CloseRequested => {
                    info!(reason = "window_close", "shutdown_requested");
                    window_target.exit();
                }
                WindowEvent::Resized(new_size) => {
                    if let Err(err) = pixels.resize_surface(new_size.width, new_size.height) {
                        warn!(error = %err, "framebuffer_resize_failed");
                        window_target.exit();
                    }
                    input.set_surface_size(new_size.width, new_size.height);
                }
                WindowEvent::CursorMoved { position, .. } => {
                    input.set_cursor(position.x as f32, position.y as f32);
                }
                WindowEvent::CursorLeft { .. } => {
                    input.clear_cursor();
                }
                WindowEvent::MouseInput { state, button, .. } => {
                    input.handle_mouse_input(button, state);
                }
                WindowEvent::KeyboardInput { event, .. } => {
                    input.handle_keyboard_input(&event);
                    if input.quit_requested {
                        info!(reason = "escape_key", "shutdown_requested");
                        window_target.exit();
                    }
                }
                WindowEvent::RedrawRequested => {
                    let now = Instant::now();
                    let raw_frame_dt = now.saturating_duration_since(last_frame_instant);
                    last_frame_instant = now;

                    if input.take_pause_pressed() {
                        input.paused = !input.paused;
                        info!(paused = input.paused, "pause_toggled");
                    }

                    if let Some((px, py)) = input.take_click() {
                        let (scaled_x, scaled_y) = input.scale_to_canvas(px, py);
                        let (wx, wz) = backend.screen_to_world(scaled_x, scaled_y);
                        battlefield.drop_explosion(wx, wz, &mut decals, &terrain);
                        info!(x = wx, z = wz, "explosion_dropped");
                    }

                    let frame_dt = clamp_frame_delta(raw_frame_dt, MAX_FRAME_DELTA);
                    if !input.paused {
                        accumulator = accumulator.saturating_add(frame_dt);
                    }
                    let plan = plan_sim_steps(accumulator, fixed_dt, MAX_TICKS_PER_FRAME);
                    for _ in 0..plan.ticks_to_run {
                        battlefield.tick(&mut decals, &terrain, draw_frame);
                        ticks_since_metrics += 1;
                    }
                    accumulator = plan.remaining_accumulator;
                    if plan.dropped_backlog > Duration::ZERO {
                        warn!(
                            dropped_backlog_ms = plan.dropped_backlog.as_millis() as u64,
                            "sim_clamp_triggered"
                        );
                    }

                    draw_frame += 1;
                    let frame = FrameContext {
                        sim_frame: battlefield.sim_frame(),
                        draw_frame,
                        frame_time_ms: frame_dt.as_secs_f32() * 1000.0,
                        speed_factor: 1.0,
                        camera: None,
                        player: PlayerView {
                            spectating_full_view: true,
                            ghosted_buildings: true,
                        },
                    };
                    backend.clear();
                    decals.render_frame(&frame, &terrain, &battlefield, &mut backend);
                    pixels.frame_mut().copy_from_slice(backend.canvas());
                    if let Err(err) = pixels.render() {
                        warn!(error = %err, "framebuffer_present_failed");
                        window_target.exit();
                    }
                    frames_since_metrics += 1;

                    if now.saturating_duration_since(last_metrics_instant) >= METRICS_LOG_INTERVAL
                    {
                        let elapsed =
                            now.saturating_duration_since(last_metrics_instant).as_secs_f32();
                        info!(
                            fps = (frames_since_metrics as f32 / elapsed).round() as u32,
                            tps = (ticks_since_metrics as f32 / elapsed).round() as u32,
                            decals = decals.live_decal_count(),
                            scars = decals.live_scar_count(),
                            dropped_decals = decals.dropped_decal_count(),
                            dropped_scars = decals.dropped_scar_count(),
                            "loop_metrics"
                        );
                        frames_since_metrics = 0;
                        ticks_since_metrics = 0;
                        last_metrics_instant = now;
                    }
                }
                _ => {}
            },
            Event::AboutToWait => {
                window.request_redraw();
            }
            Event::LoopExiting => {
                decals.teardown(&mut backend);
                info!("shutdown");
            }
            _ => {}
        })
        .map_err(AppError::EventLoopRun)
}

#[derive(Debug)]
struct StepPlan {
    ticks_to_run: u32,
    remaining_accumulator: Duration,
    dropped_backlog: Duration,
}

fn plan_sim_steps(
    mut accumulator: Duration,
    fixed_dt: Duration,
    max_ticks_per_frame: u32,
) -> StepPlan {
    let mut ticks_to_run = 0u32;

    while accumulator >= fixed_dt && ticks_to_run < max_ticks_per_frame {
        accumulator = accumulator.saturating_sub(fixed_dt);
        ticks_to_run = ticks_to_run.saturating_add(1);
    }

    if accumulator >= fixed_dt {
        StepPlan {
            ticks_to_run,
            remaining_accumulator: Duration::ZERO,
            dropped_backlog: accumulator,
        }
    } else {
        StepPlan {
            ticks_to_run,
            remaining_accumulator: accumulator,
            dropped_backlog: Duration::ZERO,
        }
    }
}

fn clamp_frame_delta(frame_dt: Duration, max_frame_delta: Duration) -> Duration {
    frame_dt.min(max_frame_delta)
}

/// Collects window input between ticks; click and pause are edge-triggered.
#[derive(Debug)]
struct InputCollector {
    quit_requested: bool,
    paused: bool,
    space_is_down: bool,
    pause_pressed_edge: bool,
    left_mouse_is_down: bool,
    click_position: Option<(f32, f32)>,
    cursor_position: Option<(f32, f32)>,
    surface_width: u32,
    surface_height: u32,
}

impl Default for InputCollector {
    fn default() -> Self {
        Self {
            quit_requested: false,
            paused: false,
            space_is_down: false,
            pause_pressed_edge: false,
            left_mouse_is_down: false,
            click_position: None,
            cursor_position: None,
            surface_width: WINDOW_SIZE,
            surface_height: WINDOW_SIZE,
        }
    }
}

impl InputCollector {
    fn set_surface_size(&mut self, width: u32, height: u32) {
        self.surface_width = width.max(1);
        self.surface_height = height.max(1);
    }

    fn set_cursor(&mut self, x: f32, y: f32) {
        self.cursor_position = Some((x, y));
    }

    fn clear_cursor(&mut self) {
        self.cursor_position = None;
    }

    fn handle_mouse_input(&mut self, button: MouseButton, state: ElementState) {
        if button != MouseButton::Left {
            return;
        }
        match state {
            ElementState::Pressed => {
                if !self.left_mouse_is_down {
                    self.click_position = self.cursor_position;
                }
                self.left_mouse_is_down = true;
            }
            ElementState::Released => self.left_mouse_is_down = false,
        }
    }

    fn handle_keyboard_input(&mut self, key_event: &winit::event::KeyEvent) {
        match key_event.physical_key {
            PhysicalKey::Code(KeyCode::Escape) => {
                if key_event.state == ElementState::Pressed {
                    self.quit_requested = true;
                }
            }
            PhysicalKey::Code(KeyCode::Space) => match key_event.state {
                ElementState::Pressed => {
                    if !self.space_is_down {
                        self.pause_pressed_edge = true;
                    }
                    self.space_is_down = true;
                }
                ElementState::Released => self.space_is_down = false,
            },
            _ => {}
        }
    }

    fn take_pause_pressed(&mut self) -> bool {
        let pressed = self.pause_pressed_edge;
        self.pause_pressed_edge = false;
        pressed
    }

    fn take_click(&mut self) -> Option<(f32, f32)> {
        self.click_position.take()
    }

    /// Maps a surface-space cursor position onto the fixed-size canvas.
    fn scale_to_canvas(&self, x: f32, y: f32) -> (f32, f32) {
        (
            x * WINDOW_SIZE as f32 / self.surface_width as f32,
            y * WINDOW_SIZE as f32 / self.surface_height as f32,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plan_sim_steps_runs_expected_ticks_without_drop() {
        let fixed_dt = Duration::from_millis(16);
        let result = plan_sim_steps(Duration::from_millis(48), fixed_dt, 5);

        assert_eq!(result.ticks_to_run, 3);
        assert_eq!(result.remaining_accumulator, Duration::ZERO);
        assert_eq!(result.dropped_backlog, Duration::ZERO);
    }

    #[test]
    fn plan_sim_steps_drops_backlog_when_tick_cap_hit() {
        let fixed_dt = Duration::from_millis(16);
        let result = plan_sim_steps(Duration::from_millis(120), fixed_dt, 3);

        assert_eq!(result.ticks_to_run, 3);
        assert_eq!(result.remaining_accumulator, Duration::ZERO);
        assert_eq!(result.dropped_backlog, Duration::from_millis(72));
    }

    #[test]
    fn clamp_frame_delta_caps_large_frames() {
        assert_eq!(
            clamp_frame_delta(Duration::from_millis(600), MAX_FRAME_DELTA),
            MAX_FRAME_DELTA
        );
        assert_eq!(
            clamp_frame_delta(Duration::from_millis(10), MAX_FRAME_DELTA),
            Duration::from_millis(10)
        );
    }

    #[test]
    fn click_is_edge_triggered_and_consumed_once() {
        let mut input = InputCollector::default();
        input.set_cursor(10.0, 20.0);

        input.handle_mouse_input(MouseButton::Left, ElementState::Pressed);
        // held button does not re-arm the click
        input.handle_mouse_input(MouseButton::Left, ElementState::Pressed);

        assert_eq!(input.take_click(), Some((10.0, 20.0)));
        assert_eq!(input.take_click(), None);
    }

    #[test]
    fn pause_edge_fires_once_per_press() {
        let mut input = InputCollector::default();
        input.space_is_down = false;
        input.pause_pressed_edge = true;

        assert!(input.take_pause_pressed());
        assert!(!input.take_pause_pressed());
    }

    #[test]
    fn cursor_scaling_tracks_resized_surface() {
        let mut input = InputCollector::default();
        input.set_surface_size(WINDOW_SIZE * 2, WINDOW_SIZE * 2);

        let (x, y) = input.scale_to_canvas(960.0, 480.0);
        assert_eq!(x, 480.0);
        assert_eq!(y, 240.0);
    }
}
