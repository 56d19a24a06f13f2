//! # User Interface
//!
//! Dear ImGui overlay drawn on top of the geometry pass.
//!
//! - [`UiManager`] - imgui context, winit platform glue and the imgui-wgpu renderer
//! - [`panels`] - menu bar, Window / Input / Stats / Log / Scene panels and the
//!   keyboard shortcuts that toggle them
//!
//! Input capture is decided per event kind: the overlay only swallows mouse
//! events while imgui wants the mouse and key events while it wants the
//! keyboard, so global shortcuts keep working while the cursor hovers a panel.

pub mod panels;

use std::time::Instant;

use imgui::{Context, FontConfig, FontSource, MouseCursor};
use imgui_wgpu::{Renderer, RendererConfig};
use imgui_winit_support::{HiDpiMode, WinitPlatform};
use wgpu::{CommandEncoder, Device, Queue, TextureFormat, TextureView};
use winit::{
    event::{Event, WindowEvent},
    window::{Window, WindowId},
};

pub use panels::{Corner, PanelContext, UiState};

/// Logical font size, scaled up for the rasterized atlas on HiDPI screens
const FONT_SIZE: f32 = 15.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InputKind {
    Mouse,
    Keyboard,
    /// Forwarded to imgui but never captured
    Window,
}

fn input_kind(event: &WindowEvent) -> Option<InputKind> {
    match event {
        WindowEvent::CursorMoved { .. }
        | WindowEvent::CursorLeft { .. }
        | WindowEvent::MouseInput { .. }
        | WindowEvent::MouseWheel { .. } => Some(InputKind::Mouse),
        WindowEvent::KeyboardInput { .. } | WindowEvent::ModifiersChanged(_) => {
            Some(InputKind::Keyboard)
        }
        WindowEvent::Resized(_)
        | WindowEvent::ScaleFactorChanged { .. }
        | WindowEvent::Focused(_) => Some(InputKind::Window),
        _ => None,
    }
}

fn is_captured(kind: InputKind, wants_mouse: bool, wants_keyboard: bool) -> bool {
    match kind {
        InputKind::Mouse => wants_mouse,
        InputKind::Keyboard => wants_keyboard,
        InputKind::Window => false,
    }
}

pub struct UiManager {
    context: Context,
    platform: WinitPlatform,
    renderer: Renderer,
    last_frame: Instant,
    last_cursor: Option<MouseCursor>,
}

impl UiManager {
    pub fn new(device: &Device, queue: &Queue, target_format: TextureFormat, window: &Window) -> Self {
        let mut context = Context::create();
        context.set_ini_filename(None);

        let mut platform = WinitPlatform::new(&mut context);
        platform.attach_window(context.io_mut(), window, HiDpiMode::Default);

        // rasterize at physical size, draw at logical size
        let hidpi = platform.hidpi_factor() as f32;
        context.io_mut().font_global_scale = 1.0 / hidpi;
        context.fonts().add_font(&[FontSource::DefaultFontData {
            config: Some(FontConfig {
                size_pixels: FONT_SIZE * hidpi,
                oversample_h: 1,
                pixel_snap_h: true,
                ..Default::default()
            }),
        }]);

        let renderer = Renderer::new(
            &mut context,
            device,
            queue,
            RendererConfig {
                texture_format: target_format,
                ..Default::default()
            },
        );
        log::debug!("UI overlay ready (hidpi factor {:.2})", hidpi);

        Self {
            context,
            platform,
            renderer,
            last_frame: Instant::now(),
            last_cursor: None,
        }
    }

    /// Forwards `event` to imgui; true when the overlay keeps it for itself
    pub fn handle_input(&mut self, window: &Window, window_id: WindowId, event: &WindowEvent) -> bool {
        let Some(kind) = input_kind(event) else {
            return false;
        };

        let wrapped: Event<()> = Event::WindowEvent {
            window_id,
            event: event.clone(),
        };
        self.platform
            .handle_event(self.context.io_mut(), window, &wrapped);

        let io = self.context.io();
        is_captured(kind, io.want_capture_mouse, io.want_capture_keyboard)
    }

    /// True while the cursor is over a panel or a widget is being dragged
    pub fn wants_mouse(&self) -> bool {
        self.context.io().want_capture_mouse
    }

    /// Starts a frame and records the widgets built by `build`
    ///
    /// The result is drawn by the next [`render_overlay`](Self::render_overlay).
    pub fn build_frame<F>(&mut self, window: &Window, build: F)
    where
        F: FnOnce(&imgui::Ui),
    {
        let now = Instant::now();
        self.context.io_mut().update_delta_time(now - self.last_frame);
        self.last_frame = now;

        if let Err(err) = self.platform.prepare_frame(self.context.io_mut(), window) {
            log::warn!("Failed to prepare UI frame: {}", err);
        }

        let ui = self.context.frame();
        build(ui);

        let cursor = ui.mouse_cursor();
        if self.last_cursor != cursor {
            self.last_cursor = cursor;
            self.platform.prepare_render(ui, window);
        }
    }

    /// Draws the last built frame over `target` without clearing it
    pub fn render_overlay(
        &mut self,
        device: &Device,
        queue: &Queue,
        encoder: &mut CommandEncoder,
        target: &TextureView,
    ) {
        let draw_data = self.context.render();
        if draw_data.total_vtx_count == 0
            || draw_data.display_size[0] <= 0.0
            || draw_data.display_size[1] <= 0.0
        {
            return;
        }

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("ui_overlay"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Load,
                    store: wgpu::StoreOp::Store,
                },
            })],
            ..Default::default()
        });

        if let Err(err) = self.renderer.render(draw_data, queue, device, &mut pass) {
            log::error!("Failed to render UI: {:?}", err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use winit::dpi::PhysicalSize;
    use winit::event::Modifiers;

    #[test]
    fn test_input_kinds() {
        assert_eq!(
            input_kind(&WindowEvent::ModifiersChanged(Modifiers::default())),
            Some(InputKind::Keyboard)
        );
        assert_eq!(
            input_kind(&WindowEvent::Resized(PhysicalSize::new(640, 480))),
            Some(InputKind::Window)
        );
        assert_eq!(input_kind(&WindowEvent::Focused(true)), Some(InputKind::Window));
        assert_eq!(input_kind(&WindowEvent::CloseRequested), None);
        assert_eq!(input_kind(&WindowEvent::RedrawRequested), None);
    }

    #[test]
    fn test_capture_follows_event_kind() {
        // hovering a panel does not swallow keys
        assert!(is_captured(InputKind::Mouse, true, false));
        assert!(!is_captured(InputKind::Keyboard, true, false));

        // a focused text field does not swallow the mouse
        assert!(is_captured(InputKind::Keyboard, false, true));
        assert!(!is_captured(InputKind::Mouse, false, true));

        assert!(!is_captured(InputKind::Window, true, true));
    }
}
