// --- File: main.rs ---
use std::{sync::Arc, time::Instant};

use glam::Vec2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use winit::{
    dpi::PhysicalSize,
    event::{ElementState, Event, WindowEvent},
    event_loop::{ControlFlow, EventLoop, EventLoopWindowTarget},
    keyboard::{KeyCode, PhysicalKey},
    window::WindowBuilder,
};

use protoplasm::constants::{
    FPS_UPDATE_INTERVAL_SECS, MEMBRANE_COUNT, WINDOW_HEIGHT, WINDOW_WIDTH,
};
use protoplasm::{
    Camera2D, FixedTimestep, MicrobeSolver, OrganismKind, Renderer, Settings, SolverConfig,
    SpawnPacer,
};

// Fraction of the world bounds new organisms are dropped into.
const SPAWN_AREA_FRACTION: f32 = 0.85;

/// Demo-side state around the solver: seeding, pacing, pause and the cursor.
struct Demo {
    solver: MicrobeSolver,
    settings: Settings,
    rng: StdRng,
    pacer: SpawnPacer,
    clock: FixedTimestep,
    camera: Camera2D,
    cursor_px: Option<Vec2>,
    is_paused: bool,
    restarts: u64,
}

impl Demo {
    fn new(settings: Settings) -> Result<Self, protoplasm::SolverError> {
        let mut config = SolverConfig::default();
        config.worker_threads = settings.worker_threads;
        let solver = MicrobeSolver::with_config(settings.max_organisms, config)?;

        let camera = Camera2D {
            center: Vec2::ZERO,
            half_height: settings.bounds_z * 1.1,
        };

        Ok(Self {
            solver,
            rng: StdRng::seed_from_u64(settings.seed),
            pacer: SpawnPacer::new(settings.spawn_rate, settings.initial_organisms),
            clock: FixedTimestep::default(),
            camera,
            cursor_px: None,
            is_paused: false,
            restarts: 0,
            settings,
        })
    }

    fn bounds(&self) -> Vec2 {
        Vec2::new(self.settings.bounds_x, self.settings.bounds_z)
    }

    fn spawn_random(&mut self) {
        let area = self.bounds() * SPAWN_AREA_FRACTION;
        let x = self.rng.gen_range(-area.x..=area.x);
        let z = self.rng.gen_range(-area.y..=area.y);
        let seed = self.rng.gen_range(0..=u32::MAX);
        if self.solver.spawn(x, z, OrganismKind::Amoeba, seed).is_none() {
            self.pacer = SpawnPacer::new(0.0, 0);
        }
    }

    fn update(&mut self, frame_dt: f64, cursor: Option<Vec2>) {
        for _ in 0..self.pacer.due(frame_dt as f32) {
            self.spawn_random();
        }
        let steps = self.clock.advance(frame_dt);
        let bounds = self.bounds();
        let cursor = cursor.unwrap_or(Vec2::NAN);
        for _ in 0..steps {
            self.solver
                .update(self.clock.step(), bounds.x, bounds.y, cursor.x, cursor.y);
        }
    }

    fn toggle_pause(&mut self) {
        self.is_paused = !self.is_paused;
        self.clock.reset();
        log::info!("Simulation {}", if self.is_paused { "paused" } else { "resumed" });
    }

    fn restart(&mut self) {
        self.restarts += 1;
        let seed = self.settings.seed.wrapping_add(self.restarts);
        log::info!("Restarting simulation with seed {}", seed);
        self.solver.reset();
        self.rng = StdRng::seed_from_u64(seed);
        self.pacer = SpawnPacer::new(self.settings.spawn_rate, self.settings.initial_organisms);
        self.clock.reset();
    }
}

// --- Main Function ---
fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let settings = Settings::from_env();
    log::info!("Starting with {:?}", settings);

    let event_loop = EventLoop::new()?;
    let window = Arc::new(
        WindowBuilder::new()
            .with_title("protoplasm")
            .with_inner_size(PhysicalSize::new(WINDOW_WIDTH, WINDOW_HEIGHT))
            .build(&event_loop)?,
    );

    let mut demo = Demo::new(settings)?;
    let max_splats = demo.solver.capacity() * (MEMBRANE_COUNT + 1);
    let mut renderer = pollster::block_on(Renderer::new(window.clone(), max_splats))?;

    let mut last_frame_time = Instant::now();
    let mut last_fps_update_time = Instant::now();
    let mut frames_since_last_fps_update = 0;
    let mut current_fps = 0.0;

    event_loop.run(move |event, elwt: &EventLoopWindowTarget<()>| {
        elwt.set_control_flow(ControlFlow::Poll);
        match event {
            Event::AboutToWait => {
                let now = Instant::now();
                let frame_dt = now.duration_since(last_frame_time).as_secs_f64();
                last_frame_time = now;
                if !demo.is_paused {
                    let cursor = demo
                        .cursor_px
                        .map(|px| demo.camera.screen_to_world(px, renderer.size));
                    demo.update(frame_dt, cursor);
                }
                window.request_redraw();
            }
            Event::WindowEvent { window_id, event } if window_id == window.id() => match event {
                WindowEvent::CloseRequested => elwt.exit(),
                WindowEvent::Resized(physical_size) => renderer.resize(physical_size),
                WindowEvent::ScaleFactorChanged { .. } => renderer.resize(window.inner_size()),
                WindowEvent::CursorMoved { position, .. } => {
                    demo.cursor_px = Some(Vec2::new(position.x as f32, position.y as f32));
                }
                WindowEvent::CursorLeft { .. } => demo.cursor_px = None,
                WindowEvent::KeyboardInput {
                    event: key_event, ..
                } => {
                    if key_event.state == ElementState::Pressed && !key_event.repeat {
                        match key_event.physical_key {
                            PhysicalKey::Code(KeyCode::ArrowUp) => demo.camera.zoom_in(),
                            PhysicalKey::Code(KeyCode::ArrowDown) => demo.camera.zoom_out(),
                            PhysicalKey::Code(KeyCode::Space) => demo.toggle_pause(),
                            PhysicalKey::Code(KeyCode::KeyR) => demo.restart(),
                            PhysicalKey::Code(KeyCode::Escape) => elwt.exit(),
                            _ => {}
                        }
                    }
                }
                WindowEvent::RedrawRequested => {
                    frames_since_last_fps_update += 1;
                    let now = Instant::now();
                    let elapsed_secs = now.duration_since(last_fps_update_time).as_secs_f64();
                    if elapsed_secs >= FPS_UPDATE_INTERVAL_SECS {
                        current_fps = frames_since_last_fps_update as f64 / elapsed_secs;
                        last_fps_update_time = now;
                        frames_since_last_fps_update = 0;
                        demo.solver.profile().report();
                    }

                    let view = demo.solver.render_view(demo.clock.alpha());
                    match renderer.render(&view, &demo.camera) {
                        Ok(_) => {}
                        Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                            renderer.reconfigure()
                        }
                        Err(wgpu::SurfaceError::OutOfMemory) => {
                            log::error!("Surface out of memory, exiting");
                            elwt.exit();
                        }
                        Err(e) => log::warn!("Surface error: {:?}", e),
                    }

                    let paused_text = if demo.is_paused { " [PAUSED]" } else { "" };
                    window.set_title(&format!(
                        "protoplasm - Organisms: {}/{}, Particles: {} - FPS: {:.1}{}",
                        demo.solver.organism_count(),
                        demo.solver.capacity(),
                        demo.solver.particle_count(),
                        current_fps,
                        paused_text
                    ));
                }
                _ => {}
            },
            _ => {}
        }
    })?;
    Ok(())
}
