//! Viewer application
//!
//! [`TrellisApp`] owns the event loop; all mutable state lives in
//! [`AppState`], which is the winit [`ApplicationHandler`]. GPU objects are
//! created on the first `resumed` call. One frame is: animate the scene, compile
//! it into the geometry pass, build the UI, then render the pass and the UI
//! into the same encoder.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use cgmath::{InnerSpace, Vector3};
use rand::Rng;
use winit::{
    application::ApplicationHandler,
    dpi::{LogicalSize, PhysicalSize},
    event::{DeviceEvent, DeviceId, ElementState, KeyEvent, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::{ModifiersState, PhysicalKey},
    window::{Window, WindowId},
};

use crate::config::AppConfig;
use crate::gfx::device::RenderDevice;
use crate::gfx::geometry_pass::{GeometryPass, MeshBoxDesc, ModelDesc};
use crate::gfx::rendering::{RenderEngine, WgpuDevice};
use crate::logging::SharedConsole;
use crate::math::{quat_from_euler, Transform};
use crate::scene::{CameraController, NodeDesc, NodeId, Scene};
use crate::stats::Stats;
use crate::ui::{panels, PanelContext, UiManager, UiState};
use crate::wavefront::{self, ModelShape, WavefrontImage, WavefrontModel};

/// Texel size of the flat colour tile each OBJ shape gets in the atlas
const SHAPE_TILE_SIZE: u32 = 4;
const DEMO_CUBES: usize = 24;

pub struct TrellisApp {
    event_loop: Option<EventLoop<()>>,
    app_state: AppState,
}

struct Gpu {
    engine: RenderEngine,
    device: WgpuDevice,
    ui: UiManager,
}

struct AppState {
    config: AppConfig,
    console: SharedConsole,
    window: Option<Arc<Window>>,
    gpu: Option<Gpu>,
    pass: GeometryPass,
    scene: Scene,
    stats: Stats,
    controller: CameraController,
    ui_state: UiState,
    modifiers: ModifiersState,
    spinner: Option<NodeId>,
    started: Instant,
    error: Option<anyhow::Error>,
}

impl TrellisApp {
    pub fn new(config: AppConfig, console: SharedConsole) -> anyhow::Result<Self> {
        let event_loop = EventLoop::new().context("failed to create the event loop")?;

        let mut scene = Scene::new();
        scene.camera.resize(config.width, config.height);
        scene.camera.eye_pos = Vector3::new(6.0, 5.0, 12.0);

        Ok(Self {
            event_loop: Some(event_loop),
            app_state: AppState {
                stats: Stats::new(config.stats_frames),
                ui_state: UiState::new(config.vsync),
                config,
                console,
                window: None,
                gpu: None,
                pass: GeometryPass::new(),
                scene,
                controller: CameraController::default(),
                modifiers: ModifiersState::empty(),
                spinner: None,
                started: Instant::now(),
                error: None,
            },
        })
    }

    /// Runs until the window closes; errors raised while setting up are returned here
    pub fn run(mut self) -> anyhow::Result<()> {
        let event_loop = self
            .event_loop
            .take()
            .context("event loop already consumed")?;
        event_loop.set_control_flow(ControlFlow::Poll);
        event_loop
            .run_app(&mut self.app_state)
            .context("event loop failed")?;

        match self.app_state.error.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl AppState {
    fn init(&mut self, event_loop: &ActiveEventLoop) -> anyhow::Result<()> {
        let window = event_loop
            .create_window(
                Window::default_attributes()
                    .with_title(self.config.title.clone())
                    .with_inner_size(LogicalSize::new(self.config.width, self.config.height)),
            )
            .context("failed to create the window")?;
        let window = Arc::new(window);

        let PhysicalSize { width, height } = window.inner_size();
        let engine = pollster::block_on(RenderEngine::new(
            window.clone(),
            width,
            height,
            self.config.vsync,
        ))?;
        let mut device = engine.create_resource_device();
        let ui = UiManager::new(engine.device(), engine.queue(), engine.surface_format(), &window);

        self.scene.camera.resize(width, height);
        match self.config.wavefront.clone() {
            Some(path) => self.load_wavefront(&path, &mut device)?,
            None => self.build_demo_scene(&mut device)?,
        }

        self.window = Some(window);
        self.gpu = Some(Gpu { engine, device, ui });
        Ok(())
    }

    fn build_demo_scene(&mut self, device: &mut dyn RenderDevice) -> anyhow::Result<()> {
        let mesh = self.pass.make_mesh_box(
            device,
            &MeshBoxDesc {
                width: 1.0,
                height: 1.0,
                length: 1.0,
                label: "cube",
            },
        );
        let material = self.pass.make_material_default(device);
        let model = self.pass.create_model(
            device,
            &ModelDesc {
                mesh,
                material,
                label: "cube",
            },
        );
        if model.is_invalid() {
            anyhow::bail!("failed to create the demo model");
        }

        self.scene.add_node(&NodeDesc {
            transform: Transform {
                position: Vector3::new(0.0, -1.0, 0.0),
                scale: Vector3::new(16.0, 0.2, 16.0),
                ..Default::default()
            },
            color: [0.55, 0.55, 0.6, 1.0],
            model,
            label: "floor",
            ..Default::default()
        });

        // pivot -> arm -> hand, the pivot spins every frame
        let pivot = self.scene.add_node(&NodeDesc {
            model,
            color: [0.9, 0.9, 0.9, 1.0],
            label: "pivot",
            ..Default::default()
        });
        let arm = self.scene.add_node(&NodeDesc {
            transform: Transform {
                position: Vector3::new(2.0, 0.0, 0.0),
                scale: Vector3::new(0.5, 0.5, 0.5),
                ..Default::default()
            },
            color: [0.9, 0.3, 0.3, 1.0],
            model,
            parent: pivot,
            label: "arm",
            ..Default::default()
        });
        self.scene.add_node(&NodeDesc {
            transform: Transform::from_position(Vector3::new(0.0, 2.0, 0.0)),
            color: [0.3, 0.9, 0.3, 1.0],
            model,
            parent: arm,
            label: "hand",
            ..Default::default()
        });
        self.spinner = Some(pivot);

        let mut rng = rand::rng();
        for _ in 0..DEMO_CUBES {
            let size = rng.random_range(0.2..0.7);
            self.scene.add_node(&NodeDesc {
                transform: Transform {
                    position: Vector3::new(
                        rng.random_range(-7.0..7.0),
                        rng.random_range(-0.5..3.0),
                        rng.random_range(-7.0..7.0),
                    ),
                    scale: Vector3::new(size, size, size),
                    rotation: quat_from_euler(Vector3::new(
                        rng.random_range(0.0..std::f32::consts::TAU),
                        rng.random_range(0.0..std::f32::consts::TAU),
                        rng.random_range(0.0..std::f32::consts::TAU),
                    )),
                },
                color: [
                    rng.random_range(0.2..1.0),
                    rng.random_range(0.2..1.0),
                    rng.random_range(0.2..1.0),
                    1.0,
                ],
                model,
                label: "scatter",
                ..Default::default()
            });
        }

        log::info!("Demo scene ready ({} nodes)", self.scene.len());
        Ok(())
    }

    fn load_wavefront(&mut self, path: &Path, device: &mut dyn RenderDevice) -> anyhow::Result<()> {
        let data =
            std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
        let obj = wavefront::load_obj(&data, path.parent())
            .with_context(|| format!("failed to parse {}", path.display()))?;

        let images: Vec<WavefrontImage> = obj
            .shapes
            .iter()
            .map(|shape| {
                if let Some(texture) = &shape.texture {
                    log::warn!(
                        "Texture '{}' of shape '{}' is not decoded, using its diffuse colour",
                        texture,
                        shape.name
                    );
                }
                WavefrontImage::solid(shape.color, SHAPE_TILE_SIZE)
            })
            .collect();
        let shapes: Vec<ModelShape> = obj
            .shapes
            .iter()
            .zip(&images)
            .map(|(shape, image)| ModelShape {
                mesh: &shape.mesh,
                diffuse: image,
            })
            .collect();

        let label = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "wavefront".to_string());

        let model = wavefront::make_model(
            &mut self.pass,
            device,
            &WavefrontModel {
                shapes: &shapes,
                label: &label,
            },
            self.config.atlas_size,
        )
        .with_context(|| format!("failed to build a model from {}", path.display()))?;

        self.scene.add_node(&NodeDesc {
            model,
            label: &label,
            ..Default::default()
        });
        self.frame_shapes(&obj.shapes);
        Ok(())
    }

    /// Points the camera at the bounding sphere of the loaded shapes
    fn frame_shapes(&mut self, shapes: &[wavefront::WavefrontShape]) {
        let positions = shapes
            .iter()
            .flat_map(|shape| shape.mesh.vertices.iter())
            .map(|vertex| Vector3::from(vertex.position));

        let mut min = Vector3::new(f32::MAX, f32::MAX, f32::MAX);
        let mut max = Vector3::new(f32::MIN, f32::MIN, f32::MIN);
        let mut any = false;
        for position in positions {
            min = Vector3::new(min.x.min(position.x), min.y.min(position.y), min.z.min(position.z));
            max = Vector3::new(max.x.max(position.x), max.y.max(position.y), max.z.max(position.z));
            any = true;
        }
        if !any {
            return;
        }

        let center = (min + max) * 0.5;
        let radius = ((max - min).magnitude() * 0.5).max(0.5);
        self.scene.camera.target = center;
        self.scene.camera.eye_pos = center + Vector3::new(0.0, radius * 0.5, radius * 2.5);
    }

    fn handle_key(&mut self, event_loop: &ActiveEventLoop, event: &KeyEvent) {
        self.controller.process_keyed_events(event);

        if event.state != ElementState::Pressed || event.repeat {
            return;
        }
        if let PhysicalKey::Code(code) = event.physical_key {
            self.ui_state.handle_shortcut(code, self.modifiers);
        }
        if self.ui_state.exit_requested {
            event_loop.exit();
        }
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        let (Some(window), Some(gpu)) = (self.window.as_ref(), self.gpu.as_mut()) else {
            return;
        };

        let update_start = Instant::now();

        if let Some(spinner) = self.spinner {
            let angle = self.started.elapsed().as_secs_f32() * 0.8;
            if let Some(node) = self.scene.node_mut(spinner) {
                node.transform.rotation = quat_from_euler(Vector3::new(0.0, angle, 0.0));
            }
        }

        if gpu.engine.vsync() != self.ui_state.vsync {
            gpu.engine.set_vsync(self.ui_state.vsync);
        }

        self.pass.reset_instances();
        let summary = self.scene.update_geometry_pass(&mut self.pass, &mut gpu.device);
        log::trace!(
            "Compiled {} nodes into {} instances of {} models",
            summary.nodes,
            summary.instances,
            summary.models
        );

        let show_ui = self.ui_state.show_ui;
        if show_ui {
            let ui_state = &mut self.ui_state;
            let mut ctx = PanelContext {
                scene: &mut self.scene,
                stats: &self.stats,
                console: &self.console,
                controller: &self.controller,
                surface_size: gpu.engine.surface_size(),
                scale_factor: window.scale_factor(),
            };
            gpu.ui
                .build_frame(window, |ui| panels::draw(ui, ui_state, &mut ctx));
        }

        let update_time = update_start.elapsed().as_secs_f32();
        let render_start = Instant::now();

        let ui = &mut gpu.ui;
        let ui_callback = show_ui.then_some(
            |device: &wgpu::Device,
             queue: &wgpu::Queue,
             encoder: &mut wgpu::CommandEncoder,
             view: &wgpu::TextureView| {
                ui.render_overlay(device, queue, encoder, view);
            },
        );
        let result = gpu.engine.render_frame(
            &self.pass,
            &gpu.device,
            self.ui_state.clear_color,
            self.ui_state.render_scene,
            ui_callback,
        );

        match result {
            Ok(()) => {}
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                gpu.engine.reconfigure();
            }
            Err(wgpu::SurfaceError::OutOfMemory) => {
                log::error!("Surface out of memory, exiting");
                event_loop.exit();
            }
            Err(err) => log::warn!("Dropped frame: {}", err),
        }

        self.stats
            .tick(update_time, render_start.elapsed().as_secs_f32());

        if self.ui_state.exit_requested {
            event_loop.exit();
        }
    }
}

impl ApplicationHandler for AppState {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() || self.error.is_some() {
            return;
        }

        if let Err(err) = self.init(event_loop) {
            log::error!("Startup failed: {:#}", err);
            self.error = Some(err);
            event_loop.exit();
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, window_id: WindowId, event: WindowEvent) {
        let (Some(window), Some(gpu)) = (self.window.as_ref(), self.gpu.as_mut()) else {
            return;
        };

        let captured = self.ui_state.show_ui && gpu.ui.handle_input(window, window_id, &event);

        match event {
            WindowEvent::ModifiersChanged(modifiers) => {
                self.modifiers = modifiers.state();
            }
            WindowEvent::KeyboardInput { event, .. } => {
                if !captured {
                    self.handle_key(event_loop, &event);
                }
            }
            WindowEvent::Resized(PhysicalSize { width, height }) => {
                gpu.engine.resize(width, height);
                self.scene.camera.resize(width, height);
            }
            WindowEvent::CloseRequested => {
                event_loop.exit();
            }
            WindowEvent::RedrawRequested => {
                self.redraw(event_loop);
            }
            _ => (),
        }
    }

    fn device_event(&mut self, _event_loop: &ActiveEventLoop, _device_id: DeviceId, event: DeviceEvent) {
        let Some(gpu) = self.gpu.as_ref() else {
            return;
        };
        if self.ui_state.show_ui && gpu.ui.wants_mouse() {
            return;
        }

        self.controller.process_events(&event, &mut self.scene.camera);
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = self.window.as_ref() {
            window.request_redraw();
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(gpu) = self.gpu.as_mut() {
            self.pass.cleanup(&mut gpu.device);
            log::info!("Released GPU resources");
        }
    }
}
