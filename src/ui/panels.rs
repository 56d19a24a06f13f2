//! Debug panels
//!
//! All panel visibility lives in [`UiState`]; [`draw`] builds the menu bar and
//! every open panel for one frame. [`UiState::handle_shortcut`] applies the
//! keyboard toggles:
//!
//! | Keys   | Toggle       |
//! |--------|--------------|
//! | Alt+M  | menu bar     |
//! | Alt+W  | Window panel |
//! | Alt+I  | Input panel  |
//! | Alt+S  | Stats        |
//! | Alt+L  | Log panel    |
//! | Alt+N  | Scene panel  |
//! | Ctrl+G | whole UI     |
//! | Ctrl+R | scene drawing|
//! | Esc    | exit         |

use cgmath::{Deg, Rad, Vector3};
use imgui::{Condition, Drag, Ui};
use winit::keyboard::{KeyCode, ModifiersState};

use crate::logging::{LogLine, SharedConsole};
use crate::math::{quat_from_euler, quat_to_euler};
use crate::scene::{CameraController, NodeId, Scene};
use crate::stats::Stats;

/// Plot ceiling for frame timings, two 60 Hz frames
const PLOT_MAX_SECONDS: f32 = 0.033;
const OVERLAY_MARGIN: f32 = 10.0;
const MENU_BAR_HEIGHT: f32 = 22.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Corner {
    TopLeft,
    #[default]
    TopRight,
    BottomLeft,
    BottomRight,
}

impl Corner {
    pub const ALL: [Corner; 4] = [
        Corner::TopLeft,
        Corner::TopRight,
        Corner::BottomLeft,
        Corner::BottomRight,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Corner::TopLeft => "Top-left",
            Corner::TopRight => "Top-right",
            Corner::BottomLeft => "Bottom-left",
            Corner::BottomRight => "Bottom-right",
        }
    }

    /// Window position and pivot that pin an overlay to this corner
    pub fn placement(&self, display_size: [f32; 2], top_offset: f32) -> ([f32; 2], [f32; 2]) {
        let left = OVERLAY_MARGIN;
        let right = display_size[0] - OVERLAY_MARGIN;
        let top = OVERLAY_MARGIN + top_offset;
        let bottom = display_size[1] - OVERLAY_MARGIN;

        match self {
            Corner::TopLeft => ([left, top], [0.0, 0.0]),
            Corner::TopRight => ([right, top], [1.0, 0.0]),
            Corner::BottomLeft => ([left, bottom], [0.0, 1.0]),
            Corner::BottomRight => ([right, bottom], [1.0, 1.0]),
        }
    }
}

#[derive(Debug, Clone)]
pub struct UiState {
    pub show_menu: bool,
    pub show_ui: bool,
    pub render_scene: bool,
    pub show_window: bool,
    pub show_input: bool,
    pub show_stats: bool,
    pub show_log: bool,
    pub show_scene: bool,
    pub stats_corner: Corner,
    pub clear_color: [f32; 4],
    pub vsync: bool,
    pub exit_requested: bool,
    pub selected_node: Option<NodeId>,
}

impl Default for UiState {
    fn default() -> Self {
        Self {
            show_menu: true,
            show_ui: true,
            render_scene: true,
            show_window: false,
            show_input: false,
            show_stats: true,
            show_log: false,
            show_scene: false,
            stats_corner: Corner::default(),
            clear_color: [0.1, 0.2, 0.3, 1.0],
            vsync: false,
            exit_requested: false,
            selected_node: None,
        }
    }
}

impl UiState {
    pub fn new(vsync: bool) -> Self {
        Self {
            vsync,
            ..Default::default()
        }
    }

    /// Applies a toggle shortcut; returns true when `key` was one
    pub fn handle_shortcut(&mut self, key: KeyCode, modifiers: ModifiersState) -> bool {
        let alt = modifiers.alt_key();
        let ctrl = modifiers.control_key();

        let toggle = match (key, alt, ctrl) {
            (KeyCode::Escape, _, _) => {
                self.exit_requested = true;
                return true;
            }
            (KeyCode::KeyM, true, false) => &mut self.show_menu,
            (KeyCode::KeyW, true, false) => &mut self.show_window,
            (KeyCode::KeyI, true, false) => &mut self.show_input,
            (KeyCode::KeyS, true, false) => &mut self.show_stats,
            (KeyCode::KeyL, true, false) => &mut self.show_log,
            (KeyCode::KeyN, true, false) => &mut self.show_scene,
            (KeyCode::KeyG, false, true) => &mut self.show_ui,
            (KeyCode::KeyR, false, true) => &mut self.render_scene,
            _ => return false,
        };

        *toggle = !*toggle;
        true
    }
}

/// Everything the panels read or edit besides their own toggles
pub struct PanelContext<'a> {
    pub scene: &'a mut Scene,
    pub stats: &'a Stats,
    pub console: &'a SharedConsole,
    pub controller: &'a CameraController,
    pub surface_size: (u32, u32),
    pub scale_factor: f64,
}

pub fn draw(ui: &Ui, state: &mut UiState, ctx: &mut PanelContext) {
    if state.show_menu {
        menu_bar(ui, state);
    }
    if state.show_window {
        window_panel(ui, state, ctx);
    }
    if state.show_input {
        input_panel(ui, state, ctx);
    }
    if state.show_stats {
        stats_overlay(ui, state, ctx);
    }
    if state.show_log {
        log_panel(ui, state, ctx);
    }
    if state.show_scene {
        scene_panel(ui, state, ctx);
    }
}

fn menu_bar(ui: &Ui, state: &mut UiState) {
    ui.main_menu_bar(|| {
        ui.menu("App", || {
            ui.menu_item_config("Window")
                .shortcut("Alt+W")
                .build_with_ref(&mut state.show_window);
            ui.menu_item_config("Input")
                .shortcut("Alt+I")
                .build_with_ref(&mut state.show_input);
            ui.menu_item_config("Stats")
                .shortcut("Alt+S")
                .build_with_ref(&mut state.show_stats);
            ui.menu_item_config("Log")
                .shortcut("Alt+L")
                .build_with_ref(&mut state.show_log);
            ui.menu_item_config("Scene")
                .shortcut("Alt+N")
                .build_with_ref(&mut state.show_scene);

            ui.separator();
            ui.menu("Settings", || {
                ui.menu_item_config("Show Menu")
                    .shortcut("Alt+M")
                    .build_with_ref(&mut state.show_menu);
                ui.menu_item_config("Show UI")
                    .shortcut("Ctrl+G")
                    .build_with_ref(&mut state.show_ui);
                ui.menu_item_config("Render Scene")
                    .shortcut("Ctrl+R")
                    .build_with_ref(&mut state.render_scene);
                ui.menu("Stats Corner", || {
                    for corner in Corner::ALL {
                        if ui
                            .menu_item_config(corner.label())
                            .selected(state.stats_corner == corner)
                            .build()
                        {
                            state.stats_corner = corner;
                        }
                    }
                });
            });

            ui.separator();
            if ui.menu_item_config("Exit").shortcut("Esc").build() {
                state.exit_requested = true;
            }
        });
    });
}

fn window_panel(ui: &Ui, state: &mut UiState, ctx: &PanelContext) {
    let mut open = state.show_window;
    ui.window("Window")
        .opened(&mut open)
        .size([300.0, 180.0], Condition::FirstUseEver)
        .position([20.0, 40.0], Condition::FirstUseEver)
        .build(|| {
            let (width, height) = ctx.surface_size;
            ui.text(format!("Framebuffer: {} x {}", width, height));
            ui.text(format!("DPI scale: {:.2}", ctx.scale_factor));
            ui.separator();
            ui.checkbox("VSync", &mut state.vsync);
            ui.color_edit4("Background", &mut state.clear_color);
        });
    state.show_window = open;
}

fn input_panel(ui: &Ui, state: &mut UiState, ctx: &PanelContext) {
    let mut open = state.show_input;
    ui.window("Input")
        .opened(&mut open)
        .size([300.0, 260.0], Condition::FirstUseEver)
        .position([20.0, 240.0], Condition::FirstUseEver)
        .build(|| {
            let io = ui.io();
            ui.text(format!(
                "Mouse: ({:.0}, {:.0})",
                io.mouse_pos[0], io.mouse_pos[1]
            ));
            ui.text(format!("Scroll: {:.2}", io.mouse_wheel));
            ui.text(format!(
                "Buttons: L {} R {} M {}",
                io.mouse_down[0] as u8, io.mouse_down[1] as u8, io.mouse_down[2] as u8
            ));

            ui.separator();
            let controller = ctx.controller;
            let mode = if controller.is_panning() {
                "panning"
            } else if controller.is_orbiting() {
                "orbiting"
            } else {
                "idle"
            };
            ui.text(format!("Camera: {}", mode));
            ui.text(format!(
                "Orbit: ({:.4}, {:.4})",
                controller.orbit[0], controller.orbit[1]
            ));
            ui.text(format!(
                "Pan: ({:.4}, {:.4})",
                controller.panning[0], controller.panning[1]
            ));
            ui.text(format!("Speed: {:.4}", controller.speed));

            let camera = &ctx.scene.camera;
            ui.text(format!(
                "Eye: ({:.2}, {:.2}, {:.2})",
                camera.eye_pos.x, camera.eye_pos.y, camera.eye_pos.z
            ));
            ui.text(format!("Distance: {:.2}", camera.distance()));
        });
    state.show_input = open;
}

fn stats_overlay(ui: &Ui, state: &mut UiState, ctx: &PanelContext) {
    let top_offset = if state.show_menu { MENU_BAR_HEIGHT } else { 0.0 };
    let (position, pivot) = state
        .stats_corner
        .placement(ui.io().display_size, top_offset);

    ui.window("Stats")
        .position(position, Condition::Always)
        .position_pivot(pivot)
        .bg_alpha(0.35)
        .no_decoration()
        .always_auto_resize(true)
        .save_settings(false)
        .focus_on_appearing(false)
        .no_nav()
        .build(|| {
            let stats = ctx.stats;
            let frame = stats.average_frame();
            let fps = if frame > 0.0 { 1.0 / frame } else { 0.0 };

            ui.text(format!("{:.1} fps ({:.2} ms)", fps, frame * 1000.0));
            ui.text(format!(
                "update {:.2} ms  render {:.2} ms",
                stats.average_update() * 1000.0,
                stats.average_render() * 1000.0
            ));

            if !stats.is_empty() {
                ui.plot_lines("##update", &stats.update_times())
                    .overlay_text("update")
                    .scale_min(0.0)
                    .scale_max(PLOT_MAX_SECONDS)
                    .graph_size([200.0, 40.0])
                    .build();
                ui.plot_lines("##render", &stats.render_times())
                    .overlay_text("render")
                    .scale_min(0.0)
                    .scale_max(PLOT_MAX_SECONDS)
                    .graph_size([200.0, 40.0])
                    .build();
            }

            for corner in Corner::ALL {
                ui.radio_button(corner.label(), &mut state.stats_corner, corner);
                if corner == Corner::TopLeft || corner == Corner::BottomLeft {
                    ui.same_line();
                }
            }
        });
}

fn level_color(line: &LogLine) -> [f32; 4] {
    match line.level {
        log::Level::Error => [1.0, 0.35, 0.35, 1.0],
        log::Level::Warn => [1.0, 0.8, 0.3, 1.0],
        log::Level::Info => [0.9, 0.9, 0.9, 1.0],
        log::Level::Debug | log::Level::Trace => [0.6, 0.6, 0.6, 1.0],
    }
}

fn log_panel(ui: &Ui, state: &mut UiState, ctx: &PanelContext) {
    // copied out so nothing logs while the console is locked
    let (lines, dropped) = match ctx.console.lock() {
        Ok(mut console) => {
            console.drain();
            (console.lines().cloned().collect::<Vec<_>>(), console.dropped())
        }
        Err(_) => (Vec::new(), 0),
    };

    let mut open = state.show_log;
    let mut clear = false;
    ui.window("Log")
        .opened(&mut open)
        .size([520.0, 260.0], Condition::FirstUseEver)
        .position([340.0, 40.0], Condition::FirstUseEver)
        .build(|| {
            clear = ui.button("Clear");
            ui.same_line();
            ui.text(format!("{} lines, {} dropped", lines.len(), dropped));
            ui.separator();

            ui.child_window("log_lines").build(|| {
                for line in &lines {
                    ui.text_colored(level_color(line), &line.text);
                }
                if ui.scroll_y() >= ui.scroll_max_y() {
                    ui.set_scroll_here_y_with_ratio(1.0);
                }
            });
        });
    state.show_log = open;

    if clear {
        if let Ok(mut console) = ctx.console.lock() {
            console.clear();
        }
    }
}

fn scene_panel(ui: &Ui, state: &mut UiState, ctx: &mut PanelContext) {
    let nodes: Vec<(NodeId, String)> = ctx
        .scene
        .nodes()
        .map(|(id, node)| (id, format!("{} #{}", node.trace, id.id())))
        .collect();

    if let Some(selected) = state.selected_node {
        if ctx.scene.node(selected).is_none() {
            state.selected_node = None;
        }
    }

    let mut open = state.show_scene;
    let mut removal: Option<(NodeId, bool)> = None;
    ui.window("Scene")
        .opened(&mut open)
        .size([340.0, 420.0], Condition::FirstUseEver)
        .position([20.0, 520.0], Condition::FirstUseEver)
        .build(|| {
            ui.text(format!("{} nodes", nodes.len()));
            ui.child_window("scene_nodes")
                .size([0.0, 160.0])
                .border(true)
                .build(|| {
                    for (id, label) in &nodes {
                        if ui
                            .selectable_config(label)
                            .selected(state.selected_node == Some(*id))
                            .build()
                        {
                            state.selected_node = Some(*id);
                        }
                    }
                });

            let Some(selected) = state.selected_node else {
                ui.text("No node selected");
                return;
            };
            let Some(node) = ctx.scene.node_mut(selected) else {
                return;
            };

            ui.separator();
            let mut position: [f32; 3] = node.transform.position.into();
            if Drag::new("Position")
                .speed(0.05)
                .build_array(ui, &mut position)
            {
                node.transform.position = position.into();
            }

            let euler = quat_to_euler(node.transform.rotation);
            let mut degrees = [
                Deg::from(Rad(euler.x)).0,
                Deg::from(Rad(euler.y)).0,
                Deg::from(Rad(euler.z)).0,
            ];
            if Drag::new("Rotation").speed(0.5).build_array(ui, &mut degrees) {
                node.transform.rotation = quat_from_euler(Vector3::new(
                    Rad::from(Deg(degrees[0])).0,
                    Rad::from(Deg(degrees[1])).0,
                    Rad::from(Deg(degrees[2])).0,
                ));
            }

            let mut scale: [f32; 3] = node.transform.scale.into();
            if Drag::new("Scale").speed(0.01).build_array(ui, &mut scale) {
                node.transform.scale = scale.into();
            }

            ui.color_edit4("Color", &mut node.color);
            ui.text(format!(
                "Parent: {}",
                if node.parent.is_invalid() {
                    "root".to_string()
                } else {
                    format!("#{}", node.parent.id())
                }
            ));

            if ui.button("Remove") {
                removal = Some((selected, false));
            }
            ui.same_line();
            if ui.button("Remove subtree") {
                removal = Some((selected, true));
            }
        });
    state.show_scene = open;

    if let Some((node, recursive)) = removal {
        ctx.scene.remove_node(node, recursive);
        state.selected_node = None;
        log::info!("Removed node #{} (recursive: {})", node.id(), recursive);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alt_toggles_panels() {
        let mut state = UiState::default();
        assert!(!state.show_log);
        assert!(state.handle_shortcut(KeyCode::KeyL, ModifiersState::ALT));
        assert!(state.show_log);
        assert!(state.handle_shortcut(KeyCode::KeyL, ModifiersState::ALT));
        assert!(!state.show_log);
    }

    #[test]
    fn test_ctrl_toggles_ui_and_scene() {
        let mut state = UiState::default();
        assert!(state.handle_shortcut(KeyCode::KeyG, ModifiersState::CONTROL));
        assert!(!state.show_ui);
        assert!(state.handle_shortcut(KeyCode::KeyR, ModifiersState::CONTROL));
        assert!(!state.render_scene);
    }

    #[test]
    fn test_plain_keys_are_ignored() {
        let mut state = UiState::default();
        let before = state.clone();
        assert!(!state.handle_shortcut(KeyCode::KeyW, ModifiersState::empty()));
        assert!(!state.handle_shortcut(KeyCode::KeyG, ModifiersState::ALT));
        assert_eq!(state.show_window, before.show_window);
        assert_eq!(state.show_ui, before.show_ui);
    }

    #[test]
    fn test_escape_requests_exit() {
        let mut state = UiState::default();
        assert!(state.handle_shortcut(KeyCode::Escape, ModifiersState::empty()));
        assert!(state.exit_requested);
    }

    #[test]
    fn test_corner_placement() {
        let display = [800.0, 600.0];
        assert_eq!(
            Corner::TopLeft.placement(display, 0.0),
            ([10.0, 10.0], [0.0, 0.0])
        );
        assert_eq!(
            Corner::BottomRight.placement(display, 22.0),
            ([790.0, 590.0], [1.0, 1.0])
        );
        assert_eq!(Corner::TopRight.placement(display, 22.0).0, [790.0, 32.0]);
    }
}
